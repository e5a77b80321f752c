use super::{Capability, RelationalSink};
use crate::datasets::DatasetDefinition;
use crate::error::PlanResult;
use crate::sqldom::{FunctionName, Select, SelectSource, SqlStatement, TableRef, Value};

/// H2 sink. ANSI quoting, plus bulk CSV loading through the `CSVREAD`
/// table function.
pub struct H2Sink;

impl RelationalSink for H2Sink {
    fn dialect_name(&self) -> &'static str {
        "H2"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::BulkCsvLoad]
    }

    fn create_and_load_temp_table(
        &self,
        staging: &DatasetDefinition,
        temp_table: &TableRef,
        location: &str,
    ) -> PlanResult<Vec<SqlStatement>> {
        let columns = staging.schema.column_names();
        let fields = columns.iter().map(Value::bare_field).collect();
        Ok(vec![
            SqlStatement::CreateTable {
                table: temp_table.clone(),
                columns: staging.schema.columns.clone(),
                if_not_exists: true,
            },
            SqlStatement::Insert {
                into: temp_table.clone(),
                columns,
                source: Select {
                    fields,
                    source: Some(SelectSource::TableFunction {
                        name: FunctionName::CsvRead,
                        args: vec![Value::string(location)],
                    }),
                    condition: None,
                },
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Column, DataType, DatasetRole, SchemaDefinition};
    use crate::sqldom::{CaseConversion, SqlContext};

    #[test]
    fn test_csvread_load() {
        let staging = DatasetDefinition::new(
            "staging",
            SchemaDefinition::new(vec![
                Column::primary("id", DataType::Int),
                Column::new("name", DataType::Varchar),
            ]),
            DatasetRole::Staging,
        )
        .with_source_location("/data/staging.csv");
        let statements = H2Sink
            .create_and_load_temp_table(
                &staging,
                &TableRef::new("staging_tmp"),
                "/data/staging.csv",
            )
            .unwrap();
        let ctx = SqlContext::new(Some('"'), CaseConversion::None, "2000-01-01 00:00:00");
        assert_eq!(
            statements[1].render(&ctx),
            "INSERT INTO \"staging_tmp\" (\"id\", \"name\") \
             (SELECT \"id\",\"name\" FROM CSVREAD('/data/staging.csv'))"
        );
    }
}
