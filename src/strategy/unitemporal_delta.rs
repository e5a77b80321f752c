//! Unitemporal delta: staging carries only new/changed (and optionally
//! deleted) rows; matching open versions are closed and replaced.

use super::{
    delete_indicator_not_set, digest_differs, digest_matches, incoming_record_count,
    merge_delete_condition, milestoned_statistics, milestoning_close_pairs,
    milestoning_insert_columns, milestoning_insert_values, open_record_condition,
    primary_key_match, record_count_where, StatisticName, StrategyPlan,
};
use crate::datasets::Datasets;
use crate::ingest_mode::{MergeStrategy, TransactionMilestoning};
use crate::sqldom::{Condition, Select, SqlStatement, Value};

pub fn plan(
    datasets: &Datasets,
    digest_field: &str,
    milestoning: &TransactionMilestoning,
    merge_strategy: &MergeStrategy,
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
    // An empty delta changes nothing.
    if staging_empty {
        return plan;
    }

    plan.ingest.push(milestone_statement(datasets, digest_field, milestoning, merge_strategy));
    plan.ingest.push(insert_statement(datasets, digest_field, milestoning, merge_strategy));
    plan.post_ingest_statistics = milestoned_statistics(datasets, milestoning);
    plan
}

/// Close open versions whose key matches a staging row that changed (or is
/// flagged deleted).
fn milestone_statement(
    datasets: &Datasets,
    digest_field: &str,
    milestoning: &TransactionMilestoning,
    merge_strategy: &MergeStrategy,
) -> SqlStatement {
    let sink = datasets.main.qualifier();
    let mut stale = digest_differs(datasets, digest_field);
    if let Some(deleted) = merge_delete_condition(datasets, merge_strategy) {
        stale = Condition::Or(vec![stale, deleted]);
    }
    let superseded = Condition::exists(
        Select::from_table(vec![Value::All], datasets.staging.table_ref())
            .with_condition(Condition::And(vec![primary_key_match(datasets), stale])),
    );
    SqlStatement::Update {
        table: datasets.main.table_ref(),
        set: milestoning_close_pairs(milestoning, &datasets.metadata, &datasets.main.name, sink),
        condition: Some(Condition::And(vec![
            open_record_condition(milestoning, sink),
            superseded,
        ])),
    }
}

/// Insert new open versions for staging rows with no identical open
/// counterpart, skipping rows flagged deleted.
fn insert_statement(
    datasets: &Datasets,
    digest_field: &str,
    milestoning: &TransactionMilestoning,
    merge_strategy: &MergeStrategy,
) -> SqlStatement {
    let sink = datasets.main.qualifier();
    let stage = datasets.staging.qualifier();
    let mut columns = datasets.staging.schema.column_names();
    let mut fields: Vec<Value> = columns.iter().map(|c| Value::field(stage, c)).collect();
    columns.extend(milestoning_insert_columns(milestoning));
    fields.extend(milestoning_insert_values(
        milestoning,
        &datasets.metadata,
        &datasets.main.name,
    ));

    let unchanged_open = Condition::exists(
        Select::from_table(vec![Value::All], datasets.main.table_ref()).with_condition(
            Condition::And(vec![
                Condition::And(vec![
                    primary_key_match(datasets),
                    digest_matches(datasets, digest_field),
                ]),
                open_record_condition(milestoning, sink),
            ]),
        ),
    );
    let mut filter = vec![unchanged_open.not()];
    if let MergeStrategy::DeleteIndicator { field, values } = merge_strategy {
        filter.push(delete_indicator_not_set(datasets, field, values));
    }
    SqlStatement::Insert {
        into: datasets.main.table_ref(),
        columns,
        source: Select::from_table(fields, datasets.staging.table_ref())
            .with_condition(Condition::and(filter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Column, DataType, DatasetDefinition, DatasetRole, SchemaDefinition};
    use crate::sqldom::{CaseConversion, SqlContext};

    fn datasets(delete_indicator: bool) -> Datasets {
        let mut staging = SchemaDefinition::new(vec![
            Column::primary("id", DataType::Int),
            Column::new("amount", DataType::Double),
            Column::new("digest", DataType::Varchar),
        ]);
        if delete_indicator {
            staging.columns.push(Column::new("delete_indicator", DataType::Varchar));
        }
        let mut main = SchemaDefinition::new(vec![
            Column::primary("id", DataType::Int),
            Column::new("amount", DataType::Double),
            Column::new("digest", DataType::Varchar),
        ]);
        main.columns.push(Column::new("batch_id_in", DataType::Integer));
        main.columns.push(Column::new("batch_id_out", DataType::Integer));
        Datasets::new(
            DatasetDefinition::new("main", main, DatasetRole::Main),
            DatasetDefinition::new("staging", staging, DatasetRole::Staging),
        )
    }

    fn milestoning() -> TransactionMilestoning {
        TransactionMilestoning::BatchId {
            batch_id_in: "batch_id_in".to_string(),
            batch_id_out: "batch_id_out".to_string(),
        }
    }

    fn ctx() -> SqlContext {
        SqlContext::new(Some('"'), CaseConversion::None, "2000-01-01 00:00:00")
    }

    const BATCH_ID: &str = "(SELECT COALESCE(MAX(batch_metadata.\"table_batch_id\"),0)+1 \
         FROM \"batch_metadata\" as batch_metadata \
         WHERE batch_metadata.\"table_name\" = 'main')";

    #[test]
    fn test_close_changed_then_insert() {
        let plan = plan(
            &datasets(false),
            "digest",
            &milestoning(),
            &MergeStrategy::NoDeletes,
            false,
        );
        assert_eq!(
            plan.ingest[0].render(&ctx()),
            format!(
                "UPDATE \"main\" as sink SET sink.\"batch_id_out\" = {BATCH_ID}-1 \
                 WHERE (sink.\"batch_id_out\" = 999999999) AND \
                 (EXISTS (SELECT * FROM \"staging\" as stage \
                 WHERE (sink.\"id\" = stage.\"id\") AND (sink.\"digest\" <> stage.\"digest\")))"
            )
        );
        assert_eq!(
            plan.ingest[1].render(&ctx()),
            format!(
                "INSERT INTO \"main\" (\"id\", \"amount\", \"digest\", \"batch_id_in\", \"batch_id_out\") \
                 (SELECT stage.\"id\",stage.\"amount\",stage.\"digest\",{BATCH_ID},999999999 \
                 FROM \"staging\" as stage \
                 WHERE NOT (EXISTS (SELECT * FROM \"main\" as sink \
                 WHERE ((sink.\"id\" = stage.\"id\") AND (sink.\"digest\" = stage.\"digest\")) \
                 AND (sink.\"batch_id_out\" = 999999999))))"
            )
        );
    }

    #[test]
    fn test_delete_indicator_filters_insert() {
        let merge = MergeStrategy::DeleteIndicator {
            field: "delete_indicator".to_string(),
            values: vec!["yes".to_string(), "1".to_string(), "true".to_string()],
        };
        let plan = plan(&datasets(true), "digest", &milestoning(), &merge, false);
        let insert = plan.ingest[1].render(&ctx());
        assert!(insert.ends_with(
            "AND (stage.\"delete_indicator\" NOT IN ('yes','1','true')))"
        ));
        let update = plan.ingest[0].render(&ctx());
        assert!(update.contains(
            "(sink.\"digest\" <> stage.\"digest\") OR (stage.\"delete_indicator\" IN ('yes','1','true'))"
        ));
        assert!(plan
            .pre_ingest_statistics
            .contains_key(&StatisticName::RowsDeleted));
    }

    #[test]
    fn test_opaque_milestoning_uses_null_sentinels() {
        let milestoning = TransactionMilestoning::Opaque {
            in_field: "in_ts".to_string(),
            out_field: "out_ts".to_string(),
        };
        let plan = plan(
            &datasets(false),
            "digest",
            &milestoning,
            &MergeStrategy::NoDeletes,
            false,
        );
        // Open rows match on NULL, closing stamps the batch-start time.
        assert_eq!(
            plan.ingest[0].render(&ctx()),
            "UPDATE \"main\" as sink SET sink.\"out_ts\" = '2000-01-01 00:00:00' \
             WHERE (sink.\"out_ts\" IS NULL) AND \
             (EXISTS (SELECT * FROM \"staging\" as stage \
             WHERE (sink.\"id\" = stage.\"id\") AND (sink.\"digest\" <> stage.\"digest\")))"
        );
        assert_eq!(
            plan.ingest[1].render(&ctx()),
            "INSERT INTO \"main\" (\"id\", \"amount\", \"digest\", \"in_ts\", \"out_ts\") \
             (SELECT stage.\"id\",stage.\"amount\",stage.\"digest\",'2000-01-01 00:00:00',NULL \
             FROM \"staging\" as stage \
             WHERE NOT (EXISTS (SELECT * FROM \"main\" as sink \
             WHERE ((sink.\"id\" = stage.\"id\") AND (sink.\"digest\" = stage.\"digest\")) \
             AND (sink.\"out_ts\" IS NULL))))"
        );
    }

    #[test]
    fn test_empty_staging_is_noop() {
        let plan = plan(
            &datasets(false),
            "digest",
            &milestoning(),
            &MergeStrategy::NoDeletes,
            true,
        );
        assert!(plan.ingest.is_empty());
    }
}
