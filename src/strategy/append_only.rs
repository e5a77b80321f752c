//! Append-only ingestion: insert staging rows, never update or delete.

use super::{
    incoming_record_count, primary_key_match, record_count_where, StatisticName, StrategyPlan,
};
use crate::datasets::Datasets;
use crate::ingest_mode::{Auditing, Deduplication};
use crate::sqldom::{Condition, Select, SqlStatement, Value};

pub fn plan(
    datasets: &Datasets,
    deduplication: Deduplication,
    auditing: &Auditing,
    staging_empty: bool,
) -> StrategyPlan {
    let mut plan = StrategyPlan::new();
    let (stat, count) = incoming_record_count(datasets);
    plan.pre_ingest_statistics.insert(stat, count);
    if staging_empty {
        return plan;
    }

    let stage = datasets.staging.qualifier();
    let mut columns = datasets.staging.schema.column_names();
    let mut fields: Vec<Value> = columns.iter().map(|c| Value::field(stage, c)).collect();
    if let Auditing::DateTime { field } = auditing {
        columns.push(field.clone());
        fields.push(Value::BatchStartTimestamp);
    }

    let dedup_filter = (deduplication == Deduplication::FilterDuplicates).then(|| {
        Condition::exists(
            Select::from_table(vec![Value::All], datasets.main.table_ref())
                .with_condition(primary_key_match(datasets)),
        )
        .not()
    });

    let mut source = Select::from_table(fields, datasets.staging.table_ref());
    if let Some(filter) = dedup_filter.clone() {
        source = source.with_condition(filter);
    }

    plan.ingest.push(SqlStatement::Insert {
        into: datasets.main.table_ref(),
        columns,
        source,
    });

    // Staging is emptied by the clean-staging post-action, so the inserted
    // count never reads staging after the ingest phase: audited rows are
    // counted on main by their batch stamp, unaudited ones on staging
    // beforehand, under the same filter the insert uses.
    match auditing {
        Auditing::DateTime { field } => {
            plan.post_ingest_statistics.insert(
                StatisticName::RowsInserted,
                record_count_where(
                    datasets.main.table_ref(),
                    StatisticName::RowsInserted,
                    Some(Condition::Equals(
                        Value::field(datasets.main.qualifier(), field),
                        Value::BatchStartTimestamp,
                    )),
                ),
            );
        }
        Auditing::None => {
            plan.pre_ingest_statistics.insert(
                StatisticName::RowsInserted,
                record_count_where(
                    datasets.staging.table_ref(),
                    StatisticName::RowsInserted,
                    dedup_filter,
                ),
            );
        }
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

    fn ctx() -> SqlContext {
        SqlContext::new(Some('"'), CaseConversion::None, "2000-01-01 00:00:00")
    }

    #[test]
    fn test_plain_append() {
        let plan = plan(&datasets(), Deduplication::AllowDuplicates, &Auditing::None, false);
        assert_eq!(plan.ingest.len(), 1);
        assert_eq!(
            plan.ingest[0].render(&ctx()),
            "INSERT INTO \"main\" (\"id\", \"amount\") \
             (SELECT stage.\"id\",stage.\"amount\" FROM \"staging\" as stage)"
        );
    }

    #[test]
    fn test_filter_duplicates_with_audit() {
        let plan = plan(
            &datasets(),
            Deduplication::FilterDuplicates,
            &Auditing::DateTime {
                field: "audit_ts".to_string(),
            },
            false,
        );
        assert_eq!(
            plan.ingest[0].render(&ctx()),
            "INSERT INTO \"main\" (\"id\", \"amount\", \"audit_ts\") \
             (SELECT stage.\"id\",stage.\"amount\",'2000-01-01 00:00:00' \
             FROM \"staging\" as stage \
             WHERE NOT (EXISTS (SELECT * FROM \"main\" as sink WHERE sink.\"id\" = stage.\"id\")))"
        );
    }

    #[test]
    fn test_empty_staging_is_noop() {
        let plan = plan(&datasets(), Deduplication::AllowDuplicates, &Auditing::None, true);
        assert!(plan.ingest.is_empty());
    }

    #[test]
    fn test_audited_inserted_count_reads_main() {
        let plan = plan(
            &datasets(),
            Deduplication::FilterDuplicates,
            &Auditing::DateTime {
                field: "audit_ts".to_string(),
            },
            false,
        );
        assert_eq!(
            plan.post_ingest_statistics[&StatisticName::RowsInserted].render(&ctx()),
            "SELECT COUNT(*) as \"rowsInserted\" FROM \"main\" as sink \
             WHERE sink.\"audit_ts\" = '2000-01-01 00:00:00'"
        );
    }

    #[test]
    fn test_unaudited_inserted_count_reads_staging_before_cleanup() {
        let unfiltered = plan(&datasets(), Deduplication::AllowDuplicates, &Auditing::None, false);
        assert!(unfiltered.post_ingest_statistics.is_empty());
        assert_eq!(
            unfiltered.pre_ingest_statistics[&StatisticName::RowsInserted].render(&ctx()),
            "SELECT COUNT(*) as \"rowsInserted\" FROM \"staging\" as stage"
        );

        let filtered = plan(&datasets(), Deduplication::FilterDuplicates, &Auditing::None, false);
        assert_eq!(
            filtered.pre_ingest_statistics[&StatisticName::RowsInserted].render(&ctx()),
            "SELECT COUNT(*) as \"rowsInserted\" FROM \"staging\" as stage \
             WHERE NOT (EXISTS (SELECT * FROM \"main\" as sink WHERE sink.\"id\" = stage.\"id\"))"
        );
    }
}
