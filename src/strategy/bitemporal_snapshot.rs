//! Bitemporal snapshot: transaction-time milestoning as in the unitemporal
//! snapshot, plus validity bounds on every inserted version.

use super::{
    digest_matches, incoming_record_count, milestoned_statistics, milestoning_close_pairs,
    milestoning_insert_columns, milestoning_insert_values, open_record_condition,
    primary_key_match, staging_columns_without_validity_sources, validity_insert_columns,
    validity_insert_values, validity_through_close, StrategyPlan,
};
use crate::datasets::Datasets;
use crate::ingest_mode::{TransactionMilestoning, ValidityMilestoning};
use crate::sqldom::{Condition, InSource, Select, SqlStatement, Value};

pub fn plan(
    datasets: &Datasets,
    digest_field: &str,
    milestoning: &TransactionMilestoning,
    validity: &ValidityMilestoning,
    staging_empty: bool,
) -> StrategyPlan {
    let mut plan = StrategyPlan::new();
    let (stat, count) = incoming_record_count(datasets);
    plan.pre_ingest_statistics.insert(stat, count);

    let sink = datasets.main.qualifier();
    let open = open_record_condition(milestoning, sink);
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
        set: milestoning_close_pairs(milestoning, &datasets.metadata, &datasets.main.name, sink),
        condition: Some(close_condition),
    });

    if !staging_empty {
        let stage = datasets.staging.qualifier();
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
        if let Some(close_through) = validity_through_close(datasets, milestoning, validity) {
            plan.ingest.push(close_through);
        }
    }

    plan.post_ingest_statistics = milestoned_statistics(datasets, milestoning);
    plan
}
