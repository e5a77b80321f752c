//! Bitemporal delta: the unitemporal-delta close/insert pair with validity
//! bounds on inserted versions.

use super::{
    delete_indicator_not_set, digest_differs, digest_matches, incoming_record_count,
    merge_delete_condition, milestoned_statistics, milestoning_close_pairs,
    milestoning_insert_columns, milestoning_insert_values, open_record_condition,
    primary_key_match, record_count_where, staging_columns_without_validity_sources,
    validity_insert_columns, validity_insert_values, validity_through_close, StatisticName,
    StrategyPlan,
};
use crate::datasets::Datasets;
use crate::ingest_mode::{MergeStrategy, TransactionMilestoning, ValidityMilestoning};
use crate::sqldom::{Condition, Select, SqlStatement, Value};

pub fn plan(
    datasets: &Datasets,
    digest_field: &str,
    milestoning: &TransactionMilestoning,
    validity: &ValidityMilestoning,
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
    if staging_empty {
        return plan;
    }

    let sink = datasets.main.qualifier();
    let stage = datasets.staging.qualifier();

    let mut stale = digest_differs(datasets, digest_field);
    if let Some(deleted) = merge_delete_condition(datasets, merge_strategy) {
        stale = Condition::Or(vec![stale, deleted]);
    }
    let superseded = Condition::exists(
        Select::from_table(vec![Value::All], datasets.staging.table_ref())
            .with_condition(Condition::And(vec![primary_key_match(datasets), stale])),
    );
    plan.ingest.push(SqlStatement::Update {
        table: datasets.main.table_ref(),
        set: milestoning_close_pairs(milestoning, &datasets.metadata, &datasets.main.name, sink),
        condition: Some(Condition::And(vec![
            open_record_condition(milestoning, sink),
            superseded,
        ])),
    });

    let mut columns = staging_columns_without_validity_sources(datasets, validity);
    let mut fields: Vec<Value> = columns.iter().map(|c| Value::field(stage, c)).collect();
    columns.extend(validity_insert_columns(validity));
    fields.extend(validity_insert_values(validity, stage));
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
    plan.ingest.push(SqlStatement::Insert {
        into: datasets.main.table_ref(),
        columns,
        source: Select::from_table(fields, datasets.staging.table_ref())
            .with_condition(Condition::and(filter)),
    });
    if let Some(close_through) = validity_through_close(datasets, milestoning, validity) {
        plan.ingest.push(close_through);
    }

    plan.post_ingest_statistics = milestoned_statistics(datasets, milestoning);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Column, DataType, DatasetDefinition, DatasetRole, SchemaDefinition};
    use crate::ingest_mode::ValidityDerivation;
    use crate::sqldom::{CaseConversion, SqlContext};

    fn datasets() -> Datasets {
        let staging = SchemaDefinition::new(vec![
            Column::primary("id", DataType::Int),
            Column::new("amount", DataType::Double),
            Column::new("valid_from", DataType::DateTime),
            Column::new("digest", DataType::Varchar),
        ]);
        let main = SchemaDefinition::new(vec![
            Column::primary("id", DataType::Int),
            Column::new("amount", DataType::Double),
            Column::new("digest", DataType::Varchar),
            Column::new("validity_from", DataType::DateTime),
            Column::new("validity_through", DataType::DateTime),
            Column::new("batch_time_in", DataType::DateTime),
            Column::new("batch_time_out", DataType::DateTime),
        ]);
        Datasets::new(
            DatasetDefinition::new("main", main, DatasetRole::Main),
            DatasetDefinition::new("staging", staging, DatasetRole::Staging),
        )
    }

    #[test]
    fn test_datetime_milestoning_with_derived_through() {
        let milestoning = TransactionMilestoning::DateTime {
            datetime_in: "batch_time_in".to_string(),
            datetime_out: "batch_time_out".to_string(),
        };
        let validity = ValidityMilestoning::DateTime {
            from_field: "validity_from".to_string(),
            through_field: "validity_through".to_string(),
            derivation: ValidityDerivation::SourceSpecifiesFromOnly {
                source_from: "valid_from".to_string(),
            },
        };
        let plan = plan(
            &datasets(),
            "digest",
            &milestoning,
            &validity,
            &MergeStrategy::NoDeletes,
            false,
        );
        let ctx = SqlContext::new(Some('"'), CaseConversion::None, "2000-01-01 00:00:00");
        assert_eq!(plan.ingest.len(), 3);
        assert_eq!(
            plan.ingest[0].render(&ctx),
            "UPDATE \"main\" as sink SET sink.\"batch_time_out\" = '2000-01-01 00:00:00' \
             WHERE (sink.\"batch_time_out\" = '9999-12-31 23:59:59') AND \
             (EXISTS (SELECT * FROM \"staging\" as stage \
             WHERE (sink.\"id\" = stage.\"id\") AND (sink.\"digest\" <> stage.\"digest\")))"
        );
        let insert = plan.ingest[1].render(&ctx);
        assert!(insert.contains(
            "stage.\"valid_from\",'9999-12-31 23:59:59','2000-01-01 00:00:00','9999-12-31 23:59:59'"
        ));
    }

    #[test]
    fn test_empty_staging_is_noop() {
        let milestoning = TransactionMilestoning::DateTime {
            datetime_in: "batch_time_in".to_string(),
            datetime_out: "batch_time_out".to_string(),
        };
        let validity = ValidityMilestoning::DateTime {
            from_field: "validity_from".to_string(),
            through_field: "validity_through".to_string(),
            derivation: ValidityDerivation::SourceSpecifiesFromOnly {
                source_from: "valid_from".to_string(),
            },
        };
        let plan = plan(
            &datasets(),
            "digest",
            &milestoning,
            &validity,
            &MergeStrategy::NoDeletes,
            true,
        );
        assert!(plan.ingest.is_empty());
    }
}
