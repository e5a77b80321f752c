//! Dataset model: schemas, columns and the staging/main/metadata roles.

use serde::{Deserialize, Serialize};

use crate::metadata::MetadataDataset;
use crate::sqldom::TableRef;

/// Closed set of logical column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Integer,
    BigInt,
    TinyInt,
    Varchar,
    String,
    Double,
    Float,
    Decimal,
    Date,
    DateTime,
    Timestamp,
    Boolean,
}

impl DataType {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            DataType::Int | DataType::Integer => "INTEGER",
            DataType::BigInt => "BIGINT",
            DataType::TinyInt => "TINYINT",
            DataType::Varchar | DataType::String => "VARCHAR",
            DataType::Double => "DOUBLE",
            DataType::Float => "FLOAT",
            DataType::Decimal => "DECIMAL",
            DataType::Date => "DATE",
            DataType::DateTime => "DATETIME",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Boolean => "BOOLEAN",
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Varchar | DataType::String)
    }
}

/// A single column of a dataset schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub length: Option<u32>,
    pub nullable: bool,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            length: None,
            nullable: true,
            primary_key: false,
        }
    }

    pub fn primary(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            nullable: false,
            primary_key: true,
            ..Self::new(name, data_type)
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// The column's SQL type text, e.g. `VARCHAR(64)`.
    pub fn sql_type(&self) -> String {
        match self.length {
            Some(length) => format!("{}({})", self.data_type.sql_keyword(), length),
            None => self.data_type.sql_keyword().to_string(),
        }
    }
}

/// Ordered column list of a dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<Column>,
}

impl SchemaDefinition {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_keys(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Role of a dataset within one ingestion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetRole {
    Main,
    Staging,
    Metadata,
}

/// A named relation with schema and role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDefinition {
    pub database: Option<String>,
    pub group: Option<String>,
    pub name: String,
    pub alias: Option<String>,
    pub schema: SchemaDefinition,
    pub role: DatasetRole,
    /// External file location for staging datasets loaded through the sink's
    /// bulk-load mechanism; `None` when the staging table already holds data.
    pub source_location: Option<String>,
}

impl DatasetDefinition {
    pub fn new(name: impl Into<String>, schema: SchemaDefinition, role: DatasetRole) -> Self {
        Self {
            database: None,
            group: None,
            name: name.into(),
            alias: None,
            schema,
            role,
            source_location: None,
        }
    }

    pub fn in_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_source_location(mut self, location: impl Into<String>) -> Self {
        self.source_location = Some(location.into());
        self
    }

    /// sqldom reference for this dataset, including its alias.
    pub fn table_ref(&self) -> TableRef {
        TableRef {
            database: self.database.clone(),
            group: self.group.clone(),
            name: self.name.clone(),
            alias: self.alias.clone(),
        }
    }

    /// The alias used to qualify this dataset's columns in generated SQL.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// The dataset pair (plus metadata table) one ingestion request operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datasets {
    pub main: DatasetDefinition,
    pub staging: DatasetDefinition,
    pub metadata: MetadataDataset,
}

impl Datasets {
    /// Build the dataset pair with the conventional `sink` / `stage` aliases
    /// and the default `batch_metadata` table.
    pub fn new(mut main: DatasetDefinition, mut staging: DatasetDefinition) -> Self {
        if main.alias.is_none() {
            main.alias = Some("sink".to_string());
        }
        if staging.alias.is_none() {
            staging.alias = Some("stage".to_string());
        }
        Self {
            main,
            staging,
            metadata: MetadataDataset::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataDataset) -> Self {
        self.metadata = metadata;
        self
    }

    /// Primary keys shared by main and staging; row-matching strategies join
    /// on exactly these.
    pub fn common_primary_keys(&self) -> Vec<String> {
        let staging_keys = self.staging.schema.primary_keys();
        self.main
            .schema
            .primary_keys()
            .into_iter()
            .filter(|k| staging_keys.contains(k))
            .collect()
    }
}
