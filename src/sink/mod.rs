//! Sink abstraction: per-dialect quoting, capabilities and bulk loading.
//!
//! A sink never changes the logical shape of a plan. It only decides how
//! identifiers are quoted, which optional capabilities the strategies may
//! use, and how external staging files reach a temp table.

mod ansi;
mod bigquery;
mod h2;
mod memsql;

pub use ansi::AnsiSink;
pub use bigquery::BigQuerySink;
pub use h2::H2Sink;
pub use memsql::MemSqlSink;

use serde::{Deserialize, Serialize};

use crate::datasets::DatasetDefinition;
use crate::error::{PlanError, PlanResult};
use crate::sqldom::{SqlStatement, TableRef};

/// Optional features a sink may advertise. Strategies consult these and
/// either take the capability path or a portable fallback; asking a sink to
/// do something it never advertised is a hard error, not silent degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    MergeInto,
    BulkCsvLoad,
}

/// How staged data enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionMethod {
    SqlInsert,
    BulkCsvLoad,
}

/// Target platform identity. Carried in options and resolved to a sink once,
/// at generator construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    Ansi,
    H2,
    MemSql,
    BigQuery,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Ansi => "ANSI",
            Dialect::H2 => "H2",
            Dialect::MemSql => "MemSQL",
            Dialect::BigQuery => "BigQuery",
        }
    }

    pub fn sink(&self) -> Box<dyn RelationalSink> {
        match self {
            Dialect::Ansi => Box::new(AnsiSink),
            Dialect::H2 => Box::new(H2Sink),
            Dialect::MemSql => Box::new(MemSqlSink),
            Dialect::BigQuery => Box::new(BigQuerySink),
        }
    }
}

/// A target database platform.
pub trait RelationalSink {
    fn dialect_name(&self) -> &'static str;

    fn quote_character(&self) -> Option<char> {
        Some('"')
    }

    fn capabilities(&self) -> &'static [Capability];

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    fn default_ingestion_method(&self) -> IngestionMethod {
        IngestionMethod::SqlInsert
    }

    /// Statements that create the temp table and fill it from the staging
    /// dataset's external file. Sinks without `BulkCsvLoad` fail here.
    fn create_and_load_temp_table(
        &self,
        staging: &DatasetDefinition,
        temp_table: &TableRef,
        location: &str,
    ) -> PlanResult<Vec<SqlStatement>> {
        let _ = (staging, temp_table, location);
        Err(PlanError::unsupported(self.dialect_name(), "bulk CSV load"))
    }

    fn drop_temp_table(&self, temp_table: &TableRef) -> Vec<SqlStatement> {
        vec![SqlStatement::DropTable {
            table: temp_table.clone(),
            if_exists: true,
        }]
    }
}
