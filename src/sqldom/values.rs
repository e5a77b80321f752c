use serde::{Deserialize, Serialize};

use super::conditions::Condition;
use super::render::SqlContext;
use super::statements::Select;
use crate::error::{PlanError, PlanResult};

/// Sentinel batch id marking an open (not yet milestoned) row version.
pub const INFINITE_BATCH_ID: i64 = 999_999_999;

/// Sentinel timestamp marking an open row version under date-time milestoning.
pub const INFINITE_BATCH_TIME: &str = "9999-12-31 23:59:59";

/// A value node: anything that can appear in a select list, a SET pair or a
/// comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// `*`
    All,
    /// NULL literal (open sentinel for opaque milestoning)
    Null,
    /// A column reference, optionally qualified by a dataset alias.
    Field {
        dataset: Option<String>,
        name: String,
    },
    /// Quoted string literal
    StringLiteral(String),
    /// Bare numeric literal
    Numeric(i64),
    /// The open-version batch id sentinel (`999999999`)
    InfiniteBatchId,
    /// The injected execution timestamp, rendered as a quoted literal
    BatchStartTimestamp,
    /// The batch end timestamp, resolved by the database at execution time
    BatchEndTimestamp,
    /// Function call over a closed set of function names
    Function {
        name: FunctionName,
        args: Vec<Value>,
    },
    /// Scalar subquery: `(SELECT ...)`
    Select(Box<Select>),
    /// `CASE (WHEN cond THEN val)* ELSE else END`; the else branch is
    /// mandatory at render time.
    Case {
        whens: Vec<(Condition, Value)>,
        otherwise: Option<Box<Value>>,
    },
    /// `a+b`
    Sum(Box<Value>, Box<Value>),
    /// `a-b`
    Diff(Box<Value>, Box<Value>),
    /// `value as "alias"`
    Alias(Box<Value>, String),
}

impl Value {
    pub fn field(dataset: impl Into<String>, name: impl Into<String>) -> Self {
        Value::Field {
            dataset: Some(dataset.into()),
            name: name.into(),
        }
    }

    pub fn bare_field(name: impl Into<String>) -> Self {
        Value::Field {
            dataset: None,
            name: name.into(),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::StringLiteral(s.into())
    }

    pub fn function(name: FunctionName, args: Vec<Value>) -> Self {
        Value::Function { name, args }
    }

    pub fn aliased(self, alias: impl Into<String>) -> Self {
        Value::Alias(Box::new(self), alias.into())
    }

    pub fn render(&self, buf: &mut String, ctx: &SqlContext) {
        match self {
            Value::All => buf.push('*'),
            Value::Null => buf.push_str("NULL"),
            Value::Field { dataset, name } => {
                if let Some(alias) = dataset {
                    buf.push_str(alias);
                    buf.push('.');
                }
                ctx.push_identifier(buf, name);
            }
            Value::StringLiteral(s) => {
                buf.push('\'');
                buf.push_str(s);
                buf.push('\'');
            }
            Value::Numeric(n) => buf.push_str(&n.to_string()),
            Value::InfiniteBatchId => buf.push_str(&INFINITE_BATCH_ID.to_string()),
            Value::BatchStartTimestamp => {
                buf.push('\'');
                buf.push_str(&ctx.batch_start_ts);
                buf.push('\'');
            }
            Value::BatchEndTimestamp => buf.push_str("CURRENT_TIMESTAMP()"),
            Value::Function { name, args } => {
                buf.push_str(name.keyword());
                buf.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    arg.render(buf, ctx);
                }
                buf.push(')');
            }
            Value::Select(select) => {
                buf.push('(');
                select.render(buf, ctx);
                buf.push(')');
            }
            Value::Case { whens, otherwise } => {
                assert!(!whens.is_empty(), "malformed statement: CASE with no WHEN branches");
                let otherwise = otherwise
                    .as_ref()
                    .expect("malformed statement: CASE requires an ELSE branch");
                buf.push_str("CASE");
                for (cond, val) in whens {
                    buf.push_str(" WHEN ");
                    cond.render(buf, ctx);
                    buf.push_str(" THEN ");
                    val.render(buf, ctx);
                }
                buf.push_str(" ELSE ");
                otherwise.render(buf, ctx);
                buf.push_str(" END");
            }
            Value::Sum(a, b) => {
                a.render(buf, ctx);
                buf.push('+');
                b.render(buf, ctx);
            }
            Value::Diff(a, b) => {
                a.render(buf, ctx);
                buf.push('-');
                b.render(buf, ctx);
            }
            Value::Alias(inner, alias) => {
                inner.render(buf, ctx);
                buf.push_str(" as ");
                ctx.push_identifier(buf, alias);
            }
        }
    }
}

/// Closed set of SQL function names. Lookups by name are case-sensitive
/// exact matches; unknown names surface as a configuration error instead of
/// rendering nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionName {
    Count,
    Max,
    Min,
    Sum,
    Coalesce,
    CurrentTimestamp,
    Md5,
    Concat,
    CsvRead,
}

impl FunctionName {
    pub fn keyword(&self) -> &'static str {
        match self {
            FunctionName::Count => "COUNT",
            FunctionName::Max => "MAX",
            FunctionName::Min => "MIN",
            FunctionName::Sum => "SUM",
            FunctionName::Coalesce => "COALESCE",
            FunctionName::CurrentTimestamp => "CURRENT_TIMESTAMP",
            FunctionName::Md5 => "MD5",
            FunctionName::Concat => "CONCAT",
            FunctionName::CsvRead => "CSVREAD",
        }
    }

    /// Case-sensitive lookup by keyword.
    pub fn lookup(name: &str) -> PlanResult<Self> {
        match name {
            "COUNT" => Ok(FunctionName::Count),
            "MAX" => Ok(FunctionName::Max),
            "MIN" => Ok(FunctionName::Min),
            "SUM" => Ok(FunctionName::Sum),
            "COALESCE" => Ok(FunctionName::Coalesce),
            "CURRENT_TIMESTAMP" => Ok(FunctionName::CurrentTimestamp),
            "MD5" => Ok(FunctionName::Md5),
            "CONCAT" => Ok(FunctionName::Concat),
            "CSVREAD" => Ok(FunctionName::CsvRead),
            other => Err(PlanError::UnknownFunction(other.to_string())),
        }
    }
}
