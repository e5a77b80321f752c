use serde::{Deserialize, Serialize};

use super::conditions::Condition;
use super::render::SqlContext;
use super::values::{FunctionName, Value};
use crate::datasets::Column;

/// A (possibly db/schema-qualified) table reference. Only non-empty
/// qualifiers are emitted: `"db"."schema"."table"`, `"schema"."table"` or
/// just `"table"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub database: Option<String>,
    pub group: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            group: None,
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Render the qualified name without the alias.
    pub fn render_name(&self, buf: &mut String, ctx: &SqlContext) {
        assert!(!self.name.is_empty(), "malformed statement: table without a name");
        for qualifier in [&self.database, &self.group].into_iter().flatten() {
            if !qualifier.is_empty() {
                ctx.push_identifier(buf, qualifier);
                buf.push('.');
            }
        }
        ctx.push_identifier(buf, &self.name);
    }

    /// Render the qualified name followed by ` as alias` when present.
    /// Aliases are generator-internal names and stay unquoted and unfolded.
    pub fn render(&self, buf: &mut String, ctx: &SqlContext) {
        self.render_name(buf, ctx);
        if let Some(alias) = &self.alias {
            buf.push_str(" as ");
            buf.push_str(alias);
        }
    }
}

/// FROM source of a selection: a table or a table-valued function
/// (e.g. H2's `CSVREAD('/path/file.csv')`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectSource {
    Table(TableRef),
    TableFunction { name: FunctionName, args: Vec<Value> },
}

impl SelectSource {
    fn render(&self, buf: &mut String, ctx: &SqlContext) {
        match self {
            SelectSource::Table(table) => table.render(buf, ctx),
            SelectSource::TableFunction { name, args } => {
                Value::Function {
                    name: *name,
                    args: args.clone(),
                }
                .render(buf, ctx);
            }
        }
    }
}

/// A SELECT, usable standalone, as an INSERT source or as a scalar subquery.
/// `source` is optional so constant selections (`SELECT 'main',1`) render
/// without a FROM clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub fields: Vec<Value>,
    pub source: Option<SelectSource>,
    pub condition: Option<Condition>,
}

impl Select {
    pub fn new(fields: Vec<Value>) -> Self {
        Self {
            fields,
            source: None,
            condition: None,
        }
    }

    pub fn from_table(fields: Vec<Value>, table: TableRef) -> Self {
        Self {
            fields,
            source: Some(SelectSource::Table(table)),
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn render(&self, buf: &mut String, ctx: &SqlContext) {
        assert!(!self.fields.is_empty(), "malformed statement: SELECT with no fields");
        buf.push_str("SELECT ");
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                buf.push(',');
            }
            field.render(buf, ctx);
        }
        if let Some(source) = &self.source {
            buf.push_str(" FROM ");
            source.render(buf, ctx);
        }
        if let Some(condition) = &self.condition {
            buf.push_str(" WHERE ");
            condition.render(buf, ctx);
        }
    }
}

/// A complete SQL operation, the unit of the generated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlStatement {
    CreateTable {
        table: TableRef,
        columns: Vec<Column>,
        if_not_exists: bool,
    },
    DropTable {
        table: TableRef,
        if_exists: bool,
    },
    Insert {
        into: TableRef,
        columns: Vec<String>,
        source: Select,
    },
    Update {
        table: TableRef,
        set: Vec<(Value, Value)>,
        condition: Option<Condition>,
    },
    Delete {
        from: TableRef,
        condition: Option<Condition>,
    },
    Merge {
        into: TableRef,
        using: TableRef,
        on: Condition,
        matched_condition: Option<Condition>,
        update_set: Vec<(Value, Value)>,
        matched_delete: Option<Condition>,
        insert_columns: Vec<String>,
        insert_values: Vec<Value>,
    },
    Select(Select),
}

impl SqlStatement {
    /// Render this statement to its final SQL text.
    pub fn render(&self, ctx: &SqlContext) -> String {
        let mut buf = String::new();
        match self {
            SqlStatement::CreateTable {
                table,
                columns,
                if_not_exists,
            } => {
                buf.push_str("CREATE TABLE ");
                if *if_not_exists {
                    buf.push_str("IF NOT EXISTS ");
                }
                table.render_name(&mut buf, ctx);
                buf.push('(');
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    ctx.push_identifier(&mut buf, &column.name);
                    buf.push(' ');
                    buf.push_str(&column.sql_type());
                }
                let primary_keys: Vec<&str> = columns
                    .iter()
                    .filter(|c| c.primary_key)
                    .map(|c| c.name.as_str())
                    .collect();
                if !primary_keys.is_empty() {
                    buf.push_str(",PRIMARY KEY (");
                    for (i, pk) in primary_keys.iter().enumerate() {
                        if i > 0 {
                            buf.push_str(", ");
                        }
                        ctx.push_identifier(&mut buf, pk);
                    }
                    buf.push(')');
                }
                buf.push(')');
            }
            SqlStatement::DropTable { table, if_exists } => {
                buf.push_str("DROP TABLE ");
                if *if_exists {
                    buf.push_str("IF EXISTS ");
                }
                table.render_name(&mut buf, ctx);
            }
            SqlStatement::Insert {
                into,
                columns,
                source,
            } => {
                assert!(!columns.is_empty(), "malformed statement: INSERT with no columns");
                buf.push_str("INSERT INTO ");
                into.render_name(&mut buf, ctx);
                buf.push_str(" (");
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    ctx.push_identifier(&mut buf, column);
                }
                buf.push_str(") (");
                source.render(&mut buf, ctx);
                buf.push(')');
            }
            SqlStatement::Update {
                table,
                set,
                condition,
            } => {
                assert!(!set.is_empty(), "malformed statement: UPDATE with no SET pairs");
                buf.push_str("UPDATE ");
                table.render(&mut buf, ctx);
                buf.push_str(" SET ");
                for (i, (lhs, rhs)) in set.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    lhs.render(&mut buf, ctx);
                    buf.push_str(" = ");
                    rhs.render(&mut buf, ctx);
                }
                if let Some(condition) = condition {
                    buf.push_str(" WHERE ");
                    condition.render(&mut buf, ctx);
                }
            }
            SqlStatement::Delete { from, condition } => {
                buf.push_str("DELETE FROM ");
                from.render(&mut buf, ctx);
                if let Some(condition) = condition {
                    buf.push_str(" WHERE ");
                    condition.render(&mut buf, ctx);
                }
            }
            SqlStatement::Merge {
                into,
                using,
                on,
                matched_condition,
                update_set,
                matched_delete,
                insert_columns,
                insert_values,
            } => {
                buf.push_str("MERGE INTO ");
                into.render(&mut buf, ctx);
                buf.push_str(" USING ");
                using.render(&mut buf, ctx);
                buf.push_str(" ON ");
                on.render(&mut buf, ctx);
                if let Some(delete_condition) = matched_delete {
                    buf.push_str(" WHEN MATCHED AND ");
                    delete_condition.render(&mut buf, ctx);
                    buf.push_str(" THEN DELETE");
                }
                if !update_set.is_empty() {
                    buf.push_str(" WHEN MATCHED");
                    if let Some(matched) = matched_condition {
                        buf.push_str(" AND ");
                        matched.render(&mut buf, ctx);
                    }
                    buf.push_str(" THEN UPDATE SET ");
                    for (i, (lhs, rhs)) in update_set.iter().enumerate() {
                        if i > 0 {
                            buf.push(',');
                        }
                        lhs.render(&mut buf, ctx);
                        buf.push_str(" = ");
                        rhs.render(&mut buf, ctx);
                    }
                }
                assert!(
                    !insert_columns.is_empty() && insert_columns.len() == insert_values.len(),
                    "malformed statement: MERGE insert columns and values must align"
                );
                buf.push_str(" WHEN NOT MATCHED THEN INSERT (");
                for (i, column) in insert_columns.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    ctx.push_identifier(&mut buf, column);
                }
                buf.push_str(") VALUES (");
                for (i, value) in insert_values.iter().enumerate() {
                    if i > 0 {
                        buf.push(',');
                    }
                    value.render(&mut buf, ctx);
                }
                buf.push(')');
            }
            SqlStatement::Select(select) => select.render(&mut buf, ctx),
        }
        buf
    }
}
