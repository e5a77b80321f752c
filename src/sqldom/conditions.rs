use serde::{Deserialize, Serialize};

use super::render::SqlContext;
use super::statements::Select;
use super::values::Value;

/// Right-hand side of an `IN` / `NOT IN` membership test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InSource {
    List(Vec<Value>),
    Select(Box<Select>),
}

/// A boolean condition tree. `And`/`Or` render each child parenthesised, so
/// nested composition keeps the grouping visible in the emitted SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Equals(Value, Value),
    NotEquals(Value, Value),
    GreaterThan(Value, Value),
    GreaterThanEqual(Value, Value),
    LessThan(Value, Value),
    LessThanEqual(Value, Value),
    IsNull(Value),
    In(Value, InSource),
    NotIn(Value, InSource),
    Exists(Box<Select>),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// AND together a list of conditions; a single condition stays unwrapped.
    pub fn and(mut conditions: Vec<Condition>) -> Condition {
        assert!(!conditions.is_empty(), "malformed statement: AND over no conditions");
        if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Condition::And(conditions)
        }
    }

    pub fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }

    pub fn exists(select: Select) -> Condition {
        Condition::Exists(Box::new(select))
    }

    pub fn render(&self, buf: &mut String, ctx: &SqlContext) {
        match self {
            Condition::Equals(l, r) => binary(buf, ctx, l, "=", r),
            Condition::NotEquals(l, r) => binary(buf, ctx, l, "<>", r),
            Condition::GreaterThan(l, r) => binary(buf, ctx, l, ">", r),
            Condition::GreaterThanEqual(l, r) => binary(buf, ctx, l, ">=", r),
            Condition::LessThan(l, r) => binary(buf, ctx, l, "<", r),
            Condition::LessThanEqual(l, r) => binary(buf, ctx, l, "<=", r),
            Condition::IsNull(v) => {
                v.render(buf, ctx);
                buf.push_str(" IS NULL");
            }
            Condition::In(v, source) => membership(buf, ctx, v, "IN", source),
            Condition::NotIn(v, source) => membership(buf, ctx, v, "NOT IN", source),
            Condition::Exists(select) => {
                buf.push_str("EXISTS (");
                select.render(buf, ctx);
                buf.push(')');
            }
            Condition::Not(inner) => {
                buf.push_str("NOT (");
                inner.render(buf, ctx);
                buf.push(')');
            }
            Condition::And(children) => junction(buf, ctx, children, " AND "),
            Condition::Or(children) => junction(buf, ctx, children, " OR "),
        }
    }
}

fn binary(buf: &mut String, ctx: &SqlContext, l: &Value, op: &str, r: &Value) {
    l.render(buf, ctx);
    buf.push(' ');
    buf.push_str(op);
    buf.push(' ');
    r.render(buf, ctx);
}

fn membership(buf: &mut String, ctx: &SqlContext, v: &Value, op: &str, source: &InSource) {
    v.render(buf, ctx);
    buf.push(' ');
    buf.push_str(op);
    buf.push_str(" (");
    match source {
        InSource::List(values) => {
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                value.render(buf, ctx);
            }
        }
        InSource::Select(select) => select.render(buf, ctx),
    }
    buf.push(')');
}

fn junction(buf: &mut String, ctx: &SqlContext, children: &[Condition], sep: &str) {
    assert!(!children.is_empty(), "malformed statement: empty AND/OR");
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            buf.push_str(sep);
        }
        buf.push('(');
        child.render(buf, ctx);
        buf.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqldom::render::CaseConversion;

    fn render(c: &Condition) -> String {
        let mut buf = String::new();
        c.render(&mut buf, &SqlContext::new(Some('"'), CaseConversion::None, "2000-01-01 00:00:00"));
        buf
    }

    #[test]
    fn test_nested_and_keeps_grouping() {
        let pk_match = Condition::And(vec![
            Condition::Equals(Value::field("sink", "id"), Value::field("stage", "id")),
            Condition::Equals(Value::field("sink", "name"), Value::field("stage", "name")),
        ]);
        let digest = Condition::Equals(Value::field("sink", "digest"), Value::field("stage", "digest"));
        let combined = Condition::And(vec![pk_match, digest]);
        assert_eq!(
            render(&combined),
            "((sink.\"id\" = stage.\"id\") AND (sink.\"name\" = stage.\"name\")) AND (sink.\"digest\" = stage.\"digest\")"
        );
    }

    #[test]
    fn test_not_in_list() {
        let c = Condition::NotIn(
            Value::field("stage", "delete_indicator"),
            InSource::List(vec![Value::string("yes"), Value::string("1"), Value::string("true")]),
        );
        assert_eq!(render(&c), "stage.\"delete_indicator\" NOT IN ('yes','1','true')");
    }

    #[test]
    fn test_and_of_one_stays_unwrapped() {
        let c = Condition::and(vec![Condition::IsNull(Value::bare_field("id"))]);
        assert_eq!(render(&c), "\"id\" IS NULL");
    }
}
