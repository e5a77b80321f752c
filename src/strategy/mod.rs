//! Strategy implementations, one module per ingest-mode variant.
//!
//! Each strategy is a pure function from its mode configuration and the
//! dataset pair to sqldom statements. Dialect variation never appears here;
//! anything vendor-specific flows through the sink's capability set.

pub mod append_only;
pub mod bitemporal_delta;
pub mod bitemporal_snapshot;
pub mod nontemporal_delta;
pub mod nontemporal_snapshot;
pub mod noop;
pub mod unitemporal_delta;
pub mod unitemporal_snapshot;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::datasets::Datasets;
use crate::ingest_mode::{MergeStrategy, TransactionMilestoning, ValidityDerivation, ValidityMilestoning};
use crate::metadata::MetadataDataset;
use crate::sqldom::{
    Condition, FunctionName, InSource, Select, SqlStatement, TableRef, Value, INFINITE_BATCH_TIME,
};

/// Row-count categories reported when statistics collection is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatisticName {
    IncomingRecordCount,
    RowsInserted,
    RowsUpdated,
    RowsTerminated,
    RowsDeleted,
}

impl StatisticName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticName::IncomingRecordCount => "incomingRecordCount",
            StatisticName::RowsInserted => "rowsInserted",
            StatisticName::RowsUpdated => "rowsUpdated",
            StatisticName::RowsTerminated => "rowsTerminated",
            StatisticName::RowsDeleted => "rowsDeleted",
        }
    }
}

/// The statements one strategy contributes, before the generator wraps them
/// with DDL, locking and metadata recording.
#[derive(Debug, Default)]
pub struct StrategyPlan {
    pub ingest: Vec<SqlStatement>,
    pub post_actions: Vec<SqlStatement>,
    pub pre_ingest_statistics: BTreeMap<StatisticName, SqlStatement>,
    pub post_ingest_statistics: BTreeMap<StatisticName, SqlStatement>,
}

impl StrategyPlan {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `sink."k" = stage."k"` over the common primary keys.
pub(crate) fn primary_key_match(datasets: &Datasets) -> Condition {
    let sink = datasets.main.qualifier();
    let stage = datasets.staging.qualifier();
    Condition::and(
        datasets
            .common_primary_keys()
            .iter()
            .map(|key| {
                Condition::Equals(Value::field(sink, key), Value::field(stage, key))
            })
            .collect(),
    )
}

pub(crate) fn digest_matches(datasets: &Datasets, digest_field: &str) -> Condition {
    Condition::Equals(
        Value::field(datasets.main.qualifier(), digest_field),
        Value::field(datasets.staging.qualifier(), digest_field),
    )
}

pub(crate) fn digest_differs(datasets: &Datasets, digest_field: &str) -> Condition {
    Condition::NotEquals(
        Value::field(datasets.main.qualifier(), digest_field),
        Value::field(datasets.staging.qualifier(), digest_field),
    )
}

fn delete_indicator_values(datasets: &Datasets, field: &str, values: &[String]) -> Vec<Value> {
    let is_string = datasets
        .staging
        .schema
        .column(field)
        .map(|c| c.data_type.is_string())
        .unwrap_or(true);
    values
        .iter()
        .map(|v| {
            if is_string {
                Value::string(v)
            } else {
                v.parse::<i64>().map(Value::Numeric).unwrap_or_else(|_| Value::string(v))
            }
        })
        .collect()
}

pub(crate) fn delete_indicator_is_set(datasets: &Datasets, field: &str, values: &[String]) -> Condition {
    Condition::In(
        Value::field(datasets.staging.qualifier(), field),
        InSource::List(delete_indicator_values(datasets, field, values)),
    )
}

pub(crate) fn delete_indicator_not_set(datasets: &Datasets, field: &str, values: &[String]) -> Condition {
    Condition::NotIn(
        Value::field(datasets.staging.qualifier(), field),
        InSource::List(delete_indicator_values(datasets, field, values)),
    )
}

/// Condition selecting the open (current) row versions of the main dataset.
pub(crate) fn open_record_condition(milestoning: &TransactionMilestoning, sink: &str) -> Condition {
    match milestoning {
        TransactionMilestoning::BatchId { batch_id_out, .. }
        | TransactionMilestoning::BatchIdAndDateTime { batch_id_out, .. } => {
            Condition::Equals(Value::field(sink, batch_id_out), Value::InfiniteBatchId)
        }
        TransactionMilestoning::DateTime { datetime_out, .. } => Condition::Equals(
            Value::field(sink, datetime_out),
            Value::string(INFINITE_BATCH_TIME),
        ),
        TransactionMilestoning::Opaque { out_field, .. } => {
            Condition::IsNull(Value::field(sink, out_field))
        }
    }
}

/// SET pairs that close a row version: out columns become the previous batch
/// id and/or the batch-start timestamp.
pub(crate) fn milestoning_close_pairs(
    milestoning: &TransactionMilestoning,
    metadata: &MetadataDataset,
    main_table_name: &str,
    sink: &str,
) -> Vec<(Value, Value)> {
    match milestoning {
        TransactionMilestoning::BatchId { batch_id_out, .. } => vec![(
            Value::field(sink, batch_id_out),
            metadata.prev_batch_id(main_table_name),
        )],
        TransactionMilestoning::DateTime { datetime_out, .. } => {
            vec![(Value::field(sink, datetime_out), Value::BatchStartTimestamp)]
        }
        TransactionMilestoning::BatchIdAndDateTime {
            batch_id_out,
            datetime_out,
            ..
        } => vec![
            (
                Value::field(sink, batch_id_out),
                metadata.prev_batch_id(main_table_name),
            ),
            (Value::field(sink, datetime_out), Value::BatchStartTimestamp),
        ],
        TransactionMilestoning::Opaque { out_field, .. } => {
            vec![(Value::field(sink, out_field), Value::BatchStartTimestamp)]
        }
    }
}

/// Milestoning columns appended to the insert column list, in declaration
/// order (in before out).
pub(crate) fn milestoning_insert_columns(milestoning: &TransactionMilestoning) -> Vec<String> {
    milestoning.fields().into_iter().map(str::to_string).collect()
}

/// Values matching [`milestoning_insert_columns`]: in = current batch id /
/// batch-start time, out = the open sentinel for the scheme.
pub(crate) fn milestoning_insert_values(
    milestoning: &TransactionMilestoning,
    metadata: &MetadataDataset,
    main_table_name: &str,
) -> Vec<Value> {
    match milestoning {
        TransactionMilestoning::BatchId { .. } => {
            vec![metadata.batch_id(main_table_name), Value::InfiniteBatchId]
        }
        TransactionMilestoning::DateTime { .. } => vec![
            Value::BatchStartTimestamp,
            Value::string(INFINITE_BATCH_TIME),
        ],
        TransactionMilestoning::BatchIdAndDateTime { .. } => vec![
            metadata.batch_id(main_table_name),
            Value::InfiniteBatchId,
            Value::BatchStartTimestamp,
            Value::string(INFINITE_BATCH_TIME),
        ],
        TransactionMilestoning::Opaque { .. } => vec![Value::BatchStartTimestamp, Value::Null],
    }
}

/// Validity columns appended to the insert column list (from before through).
pub(crate) fn validity_insert_columns(validity: &ValidityMilestoning) -> Vec<String> {
    let ValidityMilestoning::DateTime {
        from_field,
        through_field,
        ..
    } = validity;
    vec![from_field.clone(), through_field.clone()]
}

/// Values matching [`validity_insert_columns`], taken from staging per the
/// derivation; a missing source through-bound becomes the open sentinel.
pub(crate) fn validity_insert_values(validity: &ValidityMilestoning, stage: &str) -> Vec<Value> {
    let ValidityMilestoning::DateTime { derivation, .. } = validity;
    match derivation {
        ValidityDerivation::SourceSpecifiesFromAndThrough {
            source_from,
            source_through,
        } => vec![
            Value::field(stage, source_from),
            Value::field(stage, source_through),
        ],
        ValidityDerivation::SourceSpecifiesFromOnly { source_from } => vec![
            Value::field(stage, source_from),
            Value::string(INFINITE_BATCH_TIME),
        ],
    }
}

/// `SELECT COUNT(*) as "<stat>" FROM <table>`.
pub(crate) fn record_count(table: TableRef, stat: StatisticName) -> SqlStatement {
    record_count_where(table, stat, None)
}

pub(crate) fn record_count_where(
    table: TableRef,
    stat: StatisticName,
    condition: Option<Condition>,
) -> SqlStatement {
    let mut select = Select::from_table(
        vec![Value::function(FunctionName::Count, vec![Value::All]).aliased(stat.as_str())],
        table,
    );
    if let Some(condition) = condition {
        select = select.with_condition(condition);
    }
    SqlStatement::Select(select)
}

/// Condition filter on the delete indicator, when the merge strategy has one.
pub(crate) fn merge_delete_condition(
    datasets: &Datasets,
    merge_strategy: &MergeStrategy,
) -> Option<Condition> {
    match merge_strategy {
        MergeStrategy::NoDeletes => None,
        MergeStrategy::DeleteIndicator { field, values } => {
            Some(delete_indicator_is_set(datasets, field, values))
        }
    }
}

/// Post-ingest statistics for the transaction-milestoned modes, computed
/// from the in/out columns. After the metadata row is recorded the batch
/// that just ran is `prev_batch_id`, so inserted rows carry in = prev and
/// closed rows carry out = prev-1 (resp. the batch-start timestamp under
/// date-time milestoning).
pub(crate) fn milestoned_statistics(
    datasets: &Datasets,
    milestoning: &TransactionMilestoning,
) -> BTreeMap<StatisticName, SqlStatement> {
    let sink = datasets.main.qualifier();
    let main = datasets.main.table_ref();
    let metadata = &datasets.metadata;
    let (in_field, out_field, in_value, out_value) = match milestoning {
        TransactionMilestoning::BatchId {
            batch_id_in,
            batch_id_out,
        }
        | TransactionMilestoning::BatchIdAndDateTime {
            batch_id_in,
            batch_id_out,
            ..
        } => (
            batch_id_in,
            batch_id_out,
            metadata.prev_batch_id(&datasets.main.name),
            Value::Diff(
                Box::new(metadata.prev_batch_id(&datasets.main.name)),
                Box::new(Value::Numeric(1)),
            ),
        ),
        TransactionMilestoning::DateTime {
            datetime_in,
            datetime_out,
        } => (
            datetime_in,
            datetime_out,
            Value::BatchStartTimestamp,
            Value::BatchStartTimestamp,
        ),
        TransactionMilestoning::Opaque { in_field, out_field } => (
            in_field,
            out_field,
            Value::BatchStartTimestamp,
            Value::BatchStartTimestamp,
        ),
    };

    // A closed row was updated when a same-key open replacement exists in
    // this batch, terminated otherwise.
    let replacement_exists = || {
        let second = datasets.main.table_ref().with_alias("sink2");
        let mut match_keys: Vec<Condition> = datasets
            .common_primary_keys()
            .iter()
            .map(|key| Condition::Equals(Value::field("sink2", key), Value::field(sink, key)))
            .collect();
        match_keys.push(Condition::Equals(
            Value::field("sink2", in_field),
            in_value.clone(),
        ));
        Condition::exists(
            Select::from_table(vec![Value::All], second).with_condition(Condition::and(match_keys)),
        )
    };
    let closed = Condition::Equals(Value::field(sink, out_field), out_value);

    let mut stats = BTreeMap::new();
    stats.insert(
        StatisticName::RowsInserted,
        record_count_where(
            main.clone(),
            StatisticName::RowsInserted,
            Some(Condition::Equals(Value::field(sink, in_field), in_value.clone())),
        ),
    );
    stats.insert(
        StatisticName::RowsUpdated,
        record_count_where(
            main.clone(),
            StatisticName::RowsUpdated,
            Some(Condition::And(vec![closed.clone(), replacement_exists()])),
        ),
    );
    stats.insert(
        StatisticName::RowsTerminated,
        record_count_where(
            main,
            StatisticName::RowsTerminated,
            Some(Condition::And(vec![closed, replacement_exists().not()])),
        ),
    );
    stats
}

/// Staging column names minus the validity source fields, which exist only
/// to derive the main dataset's validity bounds.
pub(crate) fn staging_columns_without_validity_sources(
    datasets: &Datasets,
    validity: &ValidityMilestoning,
) -> Vec<String> {
    let ValidityMilestoning::DateTime { derivation, .. } = validity;
    let source_fields: Vec<&str> = match derivation {
        ValidityDerivation::SourceSpecifiesFromAndThrough {
            source_from,
            source_through,
        } => vec![source_from, source_through],
        ValidityDerivation::SourceSpecifiesFromOnly { source_from } => vec![source_from],
    };
    datasets
        .staging
        .schema
        .column_names()
        .into_iter()
        .filter(|c| !source_fields.contains(&c.as_str()))
        .collect()
}

/// For from-only validity derivation: cap each open version's
/// validity-through at the earliest later validity-from arriving for the
/// same key, so consecutive versions tile the validity axis without gaps.
pub(crate) fn validity_through_close(
    datasets: &Datasets,
    milestoning: &TransactionMilestoning,
    validity: &ValidityMilestoning,
) -> Option<SqlStatement> {
    let ValidityMilestoning::DateTime {
        from_field,
        derivation,
        through_field,
    } = validity;
    let ValidityDerivation::SourceSpecifiesFromOnly { source_from } = derivation else {
        return None;
    };
    let sink = datasets.main.qualifier();
    let stage = datasets.staging.qualifier();
    let later_version = Condition::And(vec![
        primary_key_match(datasets),
        Condition::GreaterThan(
            Value::field(stage, source_from),
            Value::field(sink, from_field),
        ),
    ]);
    let next_from = Select::from_table(
        vec![Value::function(
            FunctionName::Min,
            vec![Value::field(stage, source_from)],
        )],
        datasets.staging.table_ref(),
    )
    .with_condition(later_version.clone());
    let has_later_version = Condition::exists(
        Select::from_table(vec![Value::All], datasets.staging.table_ref())
            .with_condition(later_version),
    );
    Some(SqlStatement::Update {
        table: datasets.main.table_ref(),
        set: vec![(
            Value::field(sink, through_field),
            Value::Select(Box::new(next_from)),
        )],
        condition: Some(Condition::And(vec![
            open_record_condition(milestoning, sink),
            has_later_version,
        ])),
    })
}

/// The incoming record count, shared by every mode.
pub(crate) fn incoming_record_count(datasets: &Datasets) -> (StatisticName, SqlStatement) {
    (
        StatisticName::IncomingRecordCount,
        record_count(datasets.staging.table_ref(), StatisticName::IncomingRecordCount),
    )
}
