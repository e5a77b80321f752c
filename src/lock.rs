//! Cooperative lock-table protocol for concurrent-safe ingestion.
//!
//! One row per main table in `<main>_lock`. Acquiring the lock is an UPDATE
//! of that row; executors that run the plan inside a transaction serialise
//! on it. The protocol is plain SQL, nothing dialect-specific.

use crate::datasets::{Column, DataType};
use crate::sqldom::{Condition, Select, SqlStatement, TableRef, Value};

pub const LOCK_TABLE_SUFFIX: &str = "_lock";

/// The lock table guarding one main dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct LockDataset {
    pub name: String,
    main_table_name: String,
}

impl LockDataset {
    pub fn for_main_table(main_table_name: &str) -> Self {
        Self {
            name: format!("{main_table_name}{LOCK_TABLE_SUFFIX}"),
            main_table_name: main_table_name.to_string(),
        }
    }

    fn table_ref(&self) -> TableRef {
        TableRef::new(&self.name)
    }

    pub fn create_table(&self) -> SqlStatement {
        SqlStatement::CreateTable {
            table: self.table_ref(),
            columns: vec![
                Column::new("table_name", DataType::Varchar).with_length(255),
                Column::new("acquired_ts_utc", DataType::DateTime),
                Column::new("released_ts_utc", DataType::DateTime),
            ],
            if_not_exists: true,
        }
    }

    /// Seed the single lock row, once. Re-runs are no-ops because the
    /// insert is guarded by a NOT EXISTS over the same table.
    pub fn initialize(&self) -> SqlStatement {
        let already_seeded = Condition::exists(
            Select::from_table(vec![Value::All], self.table_ref()).with_condition(
                Condition::Equals(
                    Value::bare_field("table_name"),
                    Value::string(&self.main_table_name),
                ),
            ),
        );
        SqlStatement::Insert {
            into: self.table_ref(),
            columns: vec!["table_name".to_string()],
            source: Select {
                fields: vec![Value::string(&self.main_table_name)],
                source: None,
                condition: Some(already_seeded.not()),
            },
        }
    }

    /// First ingest-phase statement: touch the lock row.
    pub fn acquire(&self) -> SqlStatement {
        SqlStatement::Update {
            table: self.table_ref(),
            set: vec![(
                Value::bare_field("acquired_ts_utc"),
                Value::BatchStartTimestamp,
            )],
            condition: Some(Condition::Equals(
                Value::bare_field("table_name"),
                Value::string(&self.main_table_name),
            )),
        }
    }

    /// Last ingest-phase statement: record the release time.
    pub fn release(&self) -> SqlStatement {
        SqlStatement::Update {
            table: self.table_ref(),
            set: vec![(
                Value::bare_field("released_ts_utc"),
                Value::BatchEndTimestamp,
            )],
            condition: Some(Condition::Equals(
                Value::bare_field("table_name"),
                Value::string(&self.main_table_name),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqldom::{CaseConversion, SqlContext};

    fn ctx() -> SqlContext {
        SqlContext::new(Some('"'), CaseConversion::None, "2000-01-01 00:00:00")
    }

    #[test]
    fn test_initialize_is_guarded() {
        let lock = LockDataset::for_main_table("main");
        assert_eq!(
            lock.initialize().render(&ctx()),
            "INSERT INTO \"main_lock\" (\"table_name\") \
             (SELECT 'main' WHERE NOT (EXISTS \
             (SELECT * FROM \"main_lock\" WHERE \"table_name\" = 'main')))"
        );
    }

    #[test]
    fn test_acquire_uses_batch_start() {
        let lock = LockDataset::for_main_table("main");
        assert_eq!(
            lock.acquire().render(&ctx()),
            "UPDATE \"main_lock\" SET \"acquired_ts_utc\" = '2000-01-01 00:00:00' \
             WHERE \"table_name\" = 'main'"
        );
    }

    #[test]
    fn test_release_uses_database_clock() {
        let lock = LockDataset::for_main_table("main");
        assert_eq!(
            lock.release().render(&ctx()),
            "UPDATE \"main_lock\" SET \"released_ts_utc\" = CURRENT_TIMESTAMP() \
             WHERE \"table_name\" = 'main'"
        );
    }
}
