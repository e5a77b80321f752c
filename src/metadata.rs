//! Batch-metadata table model.
//!
//! Every successful ingestion records one row in the metadata table: the
//! main table name, the batch id, the batch window timestamps, a status and
//! (when configured) the ingest-request id used for idempotent re-submission.

use serde::{Deserialize, Serialize};

use crate::datasets::{Column, DataType};
use crate::sqldom::{Condition, FunctionName, Select, SqlStatement, TableRef, Value};

pub const DEFAULT_META_TABLE: &str = "batch_metadata";
pub const BATCH_STATUS_DONE: &str = "DONE";

/// Description of the metadata table plus the ingest-request ids already
/// recorded in it (supplied by the caller's introspection collaborator; the
/// generator itself never reads the database).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDataset {
    pub name: String,
    pub table_name_field: String,
    pub batch_id_field: String,
    pub batch_start_field: String,
    pub batch_end_field: String,
    pub batch_status_field: String,
    pub ingest_request_id_field: String,
    pub ingested_request_ids: Vec<String>,
}

impl Default for MetadataDataset {
    fn default() -> Self {
        Self {
            name: DEFAULT_META_TABLE.to_string(),
            table_name_field: "table_name".to_string(),
            batch_id_field: "table_batch_id".to_string(),
            batch_start_field: "batch_start_ts_utc".to_string(),
            batch_end_field: "batch_end_ts_utc".to_string(),
            batch_status_field: "batch_status".to_string(),
            ingest_request_id_field: "ingest_request_id".to_string(),
            ingested_request_ids: Vec::new(),
        }
    }
}

impl MetadataDataset {
    pub fn with_ingested_request_ids(mut self, ids: Vec<String>) -> Self {
        self.ingested_request_ids = ids;
        self
    }

    pub fn is_already_ingested(&self, request_id: &str) -> bool {
        self.ingested_request_ids.iter().any(|id| id == request_id)
    }

    /// The metadata table reference; the alias matches the table's base name
    /// so correlated lookups read naturally.
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.name).with_alias(&self.name)
    }

    /// Scalar subquery computing the batch id of the running ingestion:
    /// one greater than the highest batch id already recorded for the table.
    pub fn batch_id(&self, main_table_name: &str) -> Value {
        let max_existing = Value::function(
            FunctionName::Coalesce,
            vec![
                Value::function(
                    FunctionName::Max,
                    vec![Value::field(&self.name, &self.batch_id_field)],
                ),
                Value::Numeric(0),
            ],
        );
        let select = Select::from_table(
            vec![Value::Sum(Box::new(max_existing), Box::new(Value::Numeric(1)))],
            self.table_ref(),
        )
        .with_condition(Condition::Equals(
            Value::field(&self.name, &self.table_name_field),
            Value::string(main_table_name),
        ));
        Value::Select(Box::new(select))
    }

    /// The batch id of the previous ingestion, i.e. the current one minus 1.
    pub fn prev_batch_id(&self, main_table_name: &str) -> Value {
        Value::Diff(Box::new(self.batch_id(main_table_name)), Box::new(Value::Numeric(1)))
    }

    /// CREATE TABLE IF NOT EXISTS for the metadata table.
    pub fn create_table(&self) -> SqlStatement {
        SqlStatement::CreateTable {
            table: TableRef::new(&self.name),
            columns: vec![
                Column::new(&self.table_name_field, DataType::Varchar).with_length(255),
                Column::new(&self.batch_start_field, DataType::DateTime),
                Column::new(&self.batch_end_field, DataType::DateTime),
                Column::new(&self.batch_status_field, DataType::Varchar).with_length(32),
                Column::new(&self.batch_id_field, DataType::Integer),
                Column::new(&self.ingest_request_id_field, DataType::Varchar).with_length(64),
            ],
            if_not_exists: true,
        }
    }

    /// INSERT recording the completed batch, including the ingest-request id
    /// when the request carries one.
    pub fn insert_metadata(&self, main_table_name: &str, ingest_request_id: Option<&str>) -> SqlStatement {
        let mut columns = vec![
            self.table_name_field.clone(),
            self.batch_id_field.clone(),
            self.batch_start_field.clone(),
            self.batch_end_field.clone(),
            self.batch_status_field.clone(),
        ];
        let mut fields = vec![
            Value::string(main_table_name),
            self.batch_id(main_table_name),
            Value::BatchStartTimestamp,
            Value::BatchEndTimestamp,
            Value::string(BATCH_STATUS_DONE),
        ];
        if let Some(request_id) = ingest_request_id {
            columns.push(self.ingest_request_id_field.clone());
            fields.push(Value::string(request_id));
        }
        SqlStatement::Insert {
            into: TableRef::new(&self.name),
            columns,
            source: Select {
                fields,
                source: None,
                condition: None,
            },
        }
    }
}
