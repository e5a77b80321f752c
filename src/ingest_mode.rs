//! Ingest-mode model: closed sum types for milestoning and merge policy.
//!
//! Every family that the source platform modelled as an open visitor
//! hierarchy is a closed enum here; strategy dispatch and the per-scheme
//! helpers are exhaustive `match`es, so a missing case is a compile error.

use serde::{Deserialize, Serialize};

/// Audit policy for non-temporal modes: optionally stamp each written row
/// with the batch-start timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Auditing {
    None,
    DateTime { field: String },
}

/// Deduplication policy for append-only ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deduplication {
    AllowDuplicates,
    FilterDuplicates,
}

/// How staging rows reconcile with existing main rows under delta modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeStrategy {
    NoDeletes,
    DeleteIndicator { field: String, values: Vec<String> },
}

/// Transaction-time milestoning scheme: which columns open/close a version
/// and what the open sentinel is.
///
/// `Opaque` is a date-time pair whose open sentinel is NULL instead of the
/// max-date literal; the engine generates values for it like `DateTime` but
/// matches open rows on `out IS NULL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionMilestoning {
    BatchId {
        batch_id_in: String,
        batch_id_out: String,
    },
    DateTime {
        datetime_in: String,
        datetime_out: String,
    },
    BatchIdAndDateTime {
        batch_id_in: String,
        batch_id_out: String,
        datetime_in: String,
        datetime_out: String,
    },
    Opaque {
        in_field: String,
        out_field: String,
    },
}

impl TransactionMilestoning {
    /// All milestoning columns, in the order they appear in generated SQL.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            TransactionMilestoning::BatchId {
                batch_id_in,
                batch_id_out,
            } => vec![batch_id_in, batch_id_out],
            TransactionMilestoning::DateTime {
                datetime_in,
                datetime_out,
            } => vec![datetime_in, datetime_out],
            TransactionMilestoning::BatchIdAndDateTime {
                batch_id_in,
                batch_id_out,
                datetime_in,
                datetime_out,
            } => vec![batch_id_in, batch_id_out, datetime_in, datetime_out],
            TransactionMilestoning::Opaque { in_field, out_field } => vec![in_field, out_field],
        }
    }
}

/// Validity-time (real world) milestoning for bitemporal modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidityMilestoning {
    DateTime {
        from_field: String,
        through_field: String,
        derivation: ValidityDerivation,
    },
}

/// Where validity bounds come from when the engine inserts a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidityDerivation {
    /// Staging carries both bounds.
    SourceSpecifiesFromAndThrough {
        source_from: String,
        source_through: String,
    },
    /// Staging carries only the from bound; through is derived (open
    /// sentinel on insert, closed by the next version's from date).
    SourceSpecifiesFromOnly { source_from: String },
}

/// The closed set of ingestion modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IngestMode {
    AppendOnly {
        deduplication: Deduplication,
        auditing: Auditing,
    },
    NontemporalSnapshot {
        auditing: Auditing,
    },
    NontemporalDelta {
        digest_field: String,
        merge_strategy: MergeStrategy,
        auditing: Auditing,
    },
    UnitemporalSnapshot {
        digest_field: String,
        transaction_milestoning: TransactionMilestoning,
    },
    UnitemporalDelta {
        digest_field: String,
        transaction_milestoning: TransactionMilestoning,
        merge_strategy: MergeStrategy,
    },
    BitemporalSnapshot {
        digest_field: String,
        transaction_milestoning: TransactionMilestoning,
        validity_milestoning: ValidityMilestoning,
    },
    BitemporalDelta {
        digest_field: String,
        transaction_milestoning: TransactionMilestoning,
        validity_milestoning: ValidityMilestoning,
        merge_strategy: MergeStrategy,
    },
}

impl IngestMode {
    pub fn name(&self) -> &'static str {
        match self {
            IngestMode::AppendOnly { .. } => "AppendOnly",
            IngestMode::NontemporalSnapshot { .. } => "NontemporalSnapshot",
            IngestMode::NontemporalDelta { .. } => "NontemporalDelta",
            IngestMode::UnitemporalSnapshot { .. } => "UnitemporalSnapshot",
            IngestMode::UnitemporalDelta { .. } => "UnitemporalDelta",
            IngestMode::BitemporalSnapshot { .. } => "BitemporalSnapshot",
            IngestMode::BitemporalDelta { .. } => "BitemporalDelta",
        }
    }

    pub fn digest_field(&self) -> Option<&str> {
        match self {
            IngestMode::AppendOnly { .. } | IngestMode::NontemporalSnapshot { .. } => None,
            IngestMode::NontemporalDelta { digest_field, .. }
            | IngestMode::UnitemporalSnapshot { digest_field, .. }
            | IngestMode::UnitemporalDelta { digest_field, .. }
            | IngestMode::BitemporalSnapshot { digest_field, .. }
            | IngestMode::BitemporalDelta { digest_field, .. } => Some(digest_field),
        }
    }

    pub fn transaction_milestoning(&self) -> Option<&TransactionMilestoning> {
        match self {
            IngestMode::AppendOnly { .. }
            | IngestMode::NontemporalSnapshot { .. }
            | IngestMode::NontemporalDelta { .. } => None,
            IngestMode::UnitemporalSnapshot {
                transaction_milestoning, ..
            }
            | IngestMode::UnitemporalDelta {
                transaction_milestoning, ..
            }
            | IngestMode::BitemporalSnapshot {
                transaction_milestoning, ..
            }
            | IngestMode::BitemporalDelta {
                transaction_milestoning, ..
            } => Some(transaction_milestoning),
        }
    }

    pub fn validity_milestoning(&self) -> Option<&ValidityMilestoning> {
        match self {
            IngestMode::BitemporalSnapshot {
                validity_milestoning, ..
            }
            | IngestMode::BitemporalDelta {
                validity_milestoning, ..
            } => Some(validity_milestoning),
            _ => None,
        }
    }

    pub fn merge_strategy(&self) -> Option<&MergeStrategy> {
        match self {
            IngestMode::NontemporalDelta { merge_strategy, .. }
            | IngestMode::UnitemporalDelta { merge_strategy, .. }
            | IngestMode::BitemporalDelta { merge_strategy, .. } => Some(merge_strategy),
            _ => None,
        }
    }

    /// Whether this mode matches rows by key and therefore needs primary
    /// keys on both datasets. Plain append only needs them when duplicates
    /// are filtered; a non-temporal snapshot replaces the whole table.
    pub fn requires_primary_keys(&self) -> bool {
        match self {
            IngestMode::AppendOnly { deduplication, .. } => {
                *deduplication == Deduplication::FilterDuplicates
            }
            IngestMode::NontemporalSnapshot { .. } => false,
            IngestMode::NontemporalDelta { .. }
            | IngestMode::UnitemporalSnapshot { .. }
            | IngestMode::UnitemporalDelta { .. }
            | IngestMode::BitemporalSnapshot { .. }
            | IngestMode::BitemporalDelta { .. } => true,
        }
    }
}
