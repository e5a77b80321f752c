//! Unitemporal snapshot: staging is the complete current state.
//!
//! Open main rows without an identical (same key, same digest) staging row
//! are milestoned closed; staging rows whose digest is not already open are
//! inserted as new open versions. Unchanged rows are untouched, so re-loading
//! an identical snapshot causes no churn.

use super::{
    digest_matches, incoming_record_count, milestoned_statistics, milestoning_close_pairs,
    milestoning_insert_columns, milestoning_insert_values, open_record_condition,
    primary_key_match, StrategyPlan,
};
use crate::datasets::Datasets;
use crate::ingest_mode::TransactionMilestoning;
use crate::sqldom::{Condition, InSource, Select, SqlStatement, Value};

pub fn plan(
    datasets: &Datasets,
    digest_field: &str,
    milestoning: &TransactionMilestoning,
    staging_empty: bool,
) -> StrategyPlan {
    let mut plan = StrategyPlan::new();
    let (stat, count) = incoming_record_count(datasets);
    plan.pre_ingest_statistics.insert(stat, count);

    let sink = datasets.main.qualifier();
    let open = open_record_condition(milestoning, sink);
    let close_pairs =
        milestoning_close_pairs(milestoning, &datasets.metadata, &datasets.main.name, sink);

    // An empty snapshot closes every open version and inserts nothing.
    let close_condition = if staging_empty {
        open.clone()
    } else {
        let survives = Condition::exists(
            Select::from_table(vec![Value::All], datasets.staging.table_ref()).with_condition(
                Condition::And(vec![
                    primary_key_match(datasets),
                    digest_matches(datasets, digest_field),
                ]),
            ),
        );
        Condition::And(vec![open.clone(), survives.not()])
    };
    plan.ingest.push(SqlStatement::Update {
        table: datasets.main.table_ref(),
        set: close_pairs,
        condition: Some(close_condition),
    });

    if !staging_empty {
        let stage = datasets.staging.qualifier();
        let mut columns = datasets.staging.schema.column_names();
        let mut fields: Vec<Value> = columns.iter().map(|c| Value::field(stage, c)).collect();
        columns.extend(milestoning_insert_columns(milestoning));
        fields.extend(milestoning_insert_values(
            milestoning,
            &datasets.metadata,
            &datasets.main.name,
        ));

        let open_digests = Select::from_table(
            vec![Value::field(sink, digest_field)],
            datasets.main.table_ref(),
        )
        .with_condition(open);
        let already_open = Condition::In(
            Value::field(stage, digest_field),
            InSource::Select(Box::new(open_digests)),
        );
        plan.ingest.push(SqlStatement::Insert {
            into: datasets.main.table_ref(),
            columns,
            source: Select::from_table(fields, datasets.staging.table_ref())
                .with_condition(already_open.not()),
        });
    }

    plan.post_ingest_statistics = milestoned_statistics(datasets, milestoning);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Column, DataType, DatasetDefinition, DatasetRole, SchemaDefinition};
    use crate::sqldom::{CaseConversion, SqlContext};

    fn datasets() -> Datasets {
        let staging = SchemaDefinition::new(vec![
            Column::primary("id", DataType::Int),
            Column::new("amount", DataType::Double),
            Column::new("digest", DataType::Varchar),
        ]);
        let mut main = staging.clone();
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
    fn test_milestone_then_upsert() {
        let plan = plan(&datasets(), "digest", &milestoning(), false);
        assert_eq!(
            plan.ingest[0].render(&ctx()),
            format!(
                "UPDATE \"main\" as sink SET sink.\"batch_id_out\" = {BATCH_ID}-1 \
                 WHERE (sink.\"batch_id_out\" = 999999999) AND \
                 (NOT (EXISTS (SELECT * FROM \"staging\" as stage \
                 WHERE (sink.\"id\" = stage.\"id\") AND (sink.\"digest\" = stage.\"digest\"))))"
            )
        );
        assert_eq!(
            plan.ingest[1].render(&ctx()),
            format!(
                "INSERT INTO \"main\" (\"id\", \"amount\", \"digest\", \"batch_id_in\", \"batch_id_out\") \
                 (SELECT stage.\"id\",stage.\"amount\",stage.\"digest\",{BATCH_ID},999999999 \
                 FROM \"staging\" as stage \
                 WHERE NOT (stage.\"digest\" IN (SELECT sink.\"digest\" FROM \"main\" as sink \
                 WHERE sink.\"batch_id_out\" = 999999999)))"
            )
        );
    }

    #[test]
    fn test_empty_staging_closes_everything() {
        let plan = plan(&datasets(), "digest", &milestoning(), true);
        assert_eq!(plan.ingest.len(), 1);
        assert_eq!(
            plan.ingest[0].render(&ctx()),
            format!(
                "UPDATE \"main\" as sink SET sink.\"batch_id_out\" = {BATCH_ID}-1 \
                 WHERE sink.\"batch_id_out\" = 999999999"
            )
        );
    }
}
