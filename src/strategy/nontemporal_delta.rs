//! Non-temporal delta: reconcile staging into main in place, no history.
//!
//! Sinks with `MergeInto` get a single MERGE; everybody else gets the
//! portable two-statement plan (delete changed/deleted keys, insert missing
//! ones), which is equivalent row-for-row.

use super::{
    delete_indicator_not_set, digest_differs, incoming_record_count, merge_delete_condition,
    primary_key_match, record_count_where, StatisticName, StrategyPlan,
};
use crate::datasets::Datasets;
use crate::ingest_mode::{Auditing, MergeStrategy};
use crate::sink::{Capability, RelationalSink};
use crate::sqldom::{Condition, Select, SqlStatement, Value};

pub fn plan(
    datasets: &Datasets,
    digest_field: &str,
    merge_strategy: &MergeStrategy,
    auditing: &Auditing,
    sink: &dyn RelationalSink,
    staging_empty: bool,
) -> StrategyPlan {
    let mut plan = StrategyPlan::new();
    let (stat, count) = incoming_record_count(datasets);
    plan.pre_ingest_statistics.insert(stat, count);
    if let Some(deleted) = merge_delete_condition(datasets, merge_strategy) {
        plan.pre_ingest_statistics.insert(
            StatisticName::RowsDeleted,
            record_count_where(
                datasets.staging.table_ref(),
                StatisticName::RowsDeleted,
                Some(deleted),
            ),
        );
    }
    if staging_empty {
        return plan;
    }

    if sink.supports(Capability::MergeInto) {
        plan.ingest.push(merge_plan(datasets, digest_field, merge_strategy, auditing));
    } else {
        plan.ingest
            .extend(delete_insert_plan(datasets, digest_field, merge_strategy, auditing));
    }
    plan
}

fn staging_columns_and_values(datasets: &Datasets, auditing: &Auditing) -> (Vec<String>, Vec<Value>) {
    let stage = datasets.staging.qualifier();
    let mut columns = datasets.staging.schema.column_names();
    let mut values: Vec<Value> = columns.iter().map(|c| Value::field(stage, c)).collect();
    if let Auditing::DateTime { field } = auditing {
        columns.push(field.clone());
        values.push(Value::BatchStartTimestamp);
    }
    (columns, values)
}

fn merge_plan(
    datasets: &Datasets,
    digest_field: &str,
    merge_strategy: &MergeStrategy,
    auditing: &Auditing,
) -> SqlStatement {
    let sink = datasets.main.qualifier();
    let stage = datasets.staging.qualifier();
    let primary_keys = datasets.common_primary_keys();
    let mut update_set: Vec<(Value, Value)> = datasets
        .staging
        .schema
        .column_names()
        .into_iter()
        .filter(|c| !primary_keys.contains(c))
        .map(|c| (Value::field(sink, &c), Value::field(stage, &c)))
        .collect();
    if let Auditing::DateTime { field } = auditing {
        update_set.push((Value::field(sink, field), Value::BatchStartTimestamp));
    }
    let (insert_columns, insert_values) = staging_columns_and_values(datasets, auditing);
    SqlStatement::Merge {
        into: datasets.main.table_ref(),
        using: datasets.staging.table_ref(),
        on: primary_key_match(datasets),
        matched_condition: Some(digest_differs(datasets, digest_field)),
        update_set,
        matched_delete: merge_delete_condition(datasets, merge_strategy),
        insert_columns,
        insert_values,
    }
}

fn delete_insert_plan(
    datasets: &Datasets,
    digest_field: &str,
    merge_strategy: &MergeStrategy,
    auditing: &Auditing,
) -> Vec<SqlStatement> {
    // Changed rows (and rows flagged deleted) leave first; the insert then
    // only has to skip keys that survived, which all carry an equal digest.
    let mut stale = digest_differs(datasets, digest_field);
    if let Some(deleted) = merge_delete_condition(datasets, merge_strategy) {
        stale = Condition::Or(vec![stale, deleted]);
    }
    let delete = SqlStatement::Delete {
        from: datasets.main.table_ref(),
        condition: Some(Condition::exists(
            Select::from_table(vec![Value::All], datasets.staging.table_ref())
                .with_condition(Condition::And(vec![primary_key_match(datasets), stale])),
        )),
    };

    let (columns, values) = staging_columns_and_values(datasets, auditing);
    let survived = Condition::exists(
        Select::from_table(vec![Value::All], datasets.main.table_ref())
            .with_condition(primary_key_match(datasets)),
    );
    let mut insert_filter = vec![survived.not()];
    if let MergeStrategy::DeleteIndicator { field, values } = merge_strategy {
        insert_filter.push(delete_indicator_not_set(datasets, field, values));
    }
    let insert = SqlStatement::Insert {
        into: datasets.main.table_ref(),
        columns,
        source: Select::from_table(values, datasets.staging.table_ref())
            .with_condition(Condition::and(insert_filter)),
    };
    vec![delete, insert]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Column, DataType, DatasetDefinition, DatasetRole, SchemaDefinition};
    use crate::sink::Dialect;
    use crate::sqldom::{CaseConversion, SqlContext};

    fn datasets() -> Datasets {
        let schema = SchemaDefinition::new(vec![
            Column::primary("id", DataType::Int),
            Column::new("amount", DataType::Double),
            Column::new("digest", DataType::Varchar),
        ]);
        Datasets::new(
            DatasetDefinition::new("main", schema.clone(), DatasetRole::Main),
            DatasetDefinition::new("staging", schema, DatasetRole::Staging),
        )
    }

    #[test]
    fn test_merge_when_supported() {
        let sink = Dialect::BigQuery.sink();
        let plan = plan(
            &datasets(),
            "digest",
            &MergeStrategy::NoDeletes,
            &Auditing::None,
            sink.as_ref(),
            false,
        );
        let ctx = SqlContext::new(Some('`'), CaseConversion::None, "2000-01-01 00:00:00");
        assert_eq!(
            plan.ingest[0].render(&ctx),
            "MERGE INTO `main` as sink USING `staging` as stage \
             ON sink.`id` = stage.`id` \
             WHEN MATCHED AND sink.`digest` <> stage.`digest` \
             THEN UPDATE SET sink.`amount` = stage.`amount`,sink.`digest` = stage.`digest` \
             WHEN NOT MATCHED THEN INSERT (`id`, `amount`, `digest`) \
             VALUES (stage.`id`,stage.`amount`,stage.`digest`)"
        );
    }

    #[test]
    fn test_delete_insert_fallback() {
        let sink = Dialect::Ansi.sink();
        let plan = plan(
            &datasets(),
            "digest",
            &MergeStrategy::NoDeletes,
            &Auditing::None,
            sink.as_ref(),
            false,
        );
        let ctx = SqlContext::new(Some('"'), CaseConversion::None, "2000-01-01 00:00:00");
        assert_eq!(plan.ingest.len(), 2);
        assert_eq!(
            plan.ingest[0].render(&ctx),
            "DELETE FROM \"main\" as sink WHERE EXISTS \
             (SELECT * FROM \"staging\" as stage \
             WHERE (sink.\"id\" = stage.\"id\") AND (sink.\"digest\" <> stage.\"digest\"))"
        );
        assert_eq!(
            plan.ingest[1].render(&ctx),
            "INSERT INTO \"main\" (\"id\", \"amount\", \"digest\") \
             (SELECT stage.\"id\",stage.\"amount\",stage.\"digest\" FROM \"staging\" as stage \
             WHERE NOT (EXISTS (SELECT * FROM \"main\" as sink WHERE sink.\"id\" = stage.\"id\")))"
        );
    }

    #[test]
    fn test_empty_staging_is_noop() {
        let sink = Dialect::Ansi.sink();
        let plan = plan(
            &datasets(),
            "digest",
            &MergeStrategy::NoDeletes,
            &Auditing::None,
            sink.as_ref(),
            true,
        );
        assert!(plan.ingest.is_empty());
    }
}
