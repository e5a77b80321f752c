//! Non-temporal snapshot: wipe the main table, reload it from staging.

use super::{incoming_record_count, record_count, StatisticName, StrategyPlan};
use crate::datasets::Datasets;
use crate::ingest_mode::Auditing;
use crate::sqldom::{Select, SqlStatement, Value};

pub fn plan(datasets: &Datasets, auditing: &Auditing, staging_empty: bool) -> StrategyPlan {
    let mut plan = StrategyPlan::new();
    let (stat, count) = incoming_record_count(datasets);
    plan.pre_ingest_statistics.insert(stat, count);
    plan.pre_ingest_statistics.insert(
        StatisticName::RowsDeleted,
        record_count(datasets.main.table_ref(), StatisticName::RowsDeleted),
    );

    plan.ingest.push(SqlStatement::Delete {
        from: datasets.main.table_ref(),
        condition: None,
    });
    // Empty staging still clears the table; there is just nothing to load.
    if !staging_empty {
        let stage = datasets.staging.qualifier();
        let mut columns = datasets.staging.schema.column_names();
        let mut fields: Vec<Value> = columns.iter().map(|c| Value::field(stage, c)).collect();
        if let Auditing::DateTime { field } = auditing {
            columns.push(field.clone());
            fields.push(Value::BatchStartTimestamp);
        }
        plan.ingest.push(SqlStatement::Insert {
            into: datasets.main.table_ref(),
            columns,
            source: Select::from_table(fields, datasets.staging.table_ref()),
        });
        plan.post_ingest_statistics.insert(
            StatisticName::RowsInserted,
            record_count(datasets.main.table_ref(), StatisticName::RowsInserted),
        );
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Column, DataType, DatasetDefinition, DatasetRole, SchemaDefinition};
    use crate::sqldom::{CaseConversion, SqlContext};

    fn datasets() -> Datasets {
        let schema = SchemaDefinition::new(vec![
            Column::primary("id", DataType::Int),
            Column::new("amount", DataType::Double),
        ]);
        Datasets::new(
            DatasetDefinition::new("main", schema.clone(), DatasetRole::Main),
            DatasetDefinition::new("staging", schema, DatasetRole::Staging),
        )
    }

    #[test]
    fn test_delete_then_insert() {
        let plan = plan(&datasets(), &Auditing::None, false);
        let ctx = SqlContext::new(Some('"'), CaseConversion::None, "2000-01-01 00:00:00");
        assert_eq!(plan.ingest[0].render(&ctx), "DELETE FROM \"main\" as sink");
        assert_eq!(
            plan.ingest[1].render(&ctx),
            "INSERT INTO \"main\" (\"id\", \"amount\") \
             (SELECT stage.\"id\",stage.\"amount\" FROM \"staging\" as stage)"
        );
    }

    #[test]
    fn test_empty_staging_only_clears() {
        let plan = plan(&datasets(), &Auditing::None, true);
        assert_eq!(plan.ingest.len(), 1);
    }
}
