//! Pre-generation validation.
//!
//! Every rule runs, in registration order, and every failure reason is
//! collected; callers get the complete picture in one pass rather than a
//! fix-one-resubmit loop.

use crate::datasets::Datasets;
use crate::generator::GeneratorOptions;
use crate::ingest_mode::{IngestMode, MergeStrategy, ValidityDerivation, ValidityMilestoning};
use crate::sqldom::CaseConversion;

pub const MIN_DATA_PROCESSING_UNITS: u32 = 2;
pub const DPU_TOO_LOW: &str = "Data processing units value must be at least 2";

/// Everything a rule may inspect.
pub struct ValidationContext<'a> {
    pub ingest_mode: &'a IngestMode,
    pub options: &'a GeneratorOptions,
    pub datasets: &'a Datasets,
}

/// A named check producing zero or more failure reasons.
pub struct ValidationRule {
    pub name: &'static str,
    check: fn(&ValidationContext) -> Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub reasons: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// The fixed rule set, in the order reasons are reported.
pub fn rule_set() -> Vec<ValidationRule> {
    vec![
        ValidationRule {
            name: "data-processing-units",
            check: check_data_processing_units,
        },
        ValidationRule {
            name: "primary-keys",
            check: check_primary_keys,
        },
        ValidationRule {
            name: "transaction-milestoning-columns",
            check: check_transaction_milestoning_columns,
        },
        ValidationRule {
            name: "validity-columns",
            check: check_validity_columns,
        },
        ValidationRule {
            name: "digest-column",
            check: check_digest_column,
        },
        ValidationRule {
            name: "delete-indicator-column",
            check: check_delete_indicator_column,
        },
        ValidationRule {
            name: "case-conversion-collisions",
            check: check_case_conversion_collisions,
        },
    ]
}

/// Run every rule and collect all reasons.
pub fn validate(ctx: &ValidationContext) -> ValidationResult {
    let mut reasons = Vec::new();
    for rule in rule_set() {
        reasons.extend((rule.check)(ctx));
    }
    ValidationResult { reasons }
}

fn check_data_processing_units(ctx: &ValidationContext) -> Vec<String> {
    match ctx.options.data_processing_units {
        Some(units) if units < MIN_DATA_PROCESSING_UNITS => vec![DPU_TOO_LOW.to_string()],
        _ => Vec::new(),
    }
}

fn check_primary_keys(ctx: &ValidationContext) -> Vec<String> {
    if !ctx.ingest_mode.requires_primary_keys() {
        return Vec::new();
    }
    if ctx.datasets.common_primary_keys().is_empty() {
        vec![format!(
            "Primary keys are mandatory for ingest mode {}",
            ctx.ingest_mode.name()
        )]
    } else {
        Vec::new()
    }
}

fn check_transaction_milestoning_columns(ctx: &ValidationContext) -> Vec<String> {
    let Some(milestoning) = ctx.ingest_mode.transaction_milestoning() else {
        return Vec::new();
    };
    milestoning
        .fields()
        .into_iter()
        .filter(|field| !ctx.datasets.main.schema.has_column(field))
        .map(|field| {
            format!(
                "Transaction milestoning column '{field}' not found in main dataset '{}'",
                ctx.datasets.main.name
            )
        })
        .collect()
}

fn check_validity_columns(ctx: &ValidationContext) -> Vec<String> {
    let Some(ValidityMilestoning::DateTime {
        from_field,
        through_field,
        derivation,
    }) = ctx.ingest_mode.validity_milestoning()
    else {
        return Vec::new();
    };
    let mut reasons = Vec::new();
    for field in [from_field, through_field] {
        if !ctx.datasets.main.schema.has_column(field) {
            reasons.push(format!(
                "Validity milestoning column '{field}' not found in main dataset '{}'",
                ctx.datasets.main.name
            ));
        }
    }
    let source_fields = match derivation {
        ValidityDerivation::SourceSpecifiesFromAndThrough {
            source_from,
            source_through,
        } => vec![source_from, source_through],
        ValidityDerivation::SourceSpecifiesFromOnly { source_from } => vec![source_from],
    };
    for field in source_fields {
        if !ctx.datasets.staging.schema.has_column(field) {
            reasons.push(format!(
                "Validity source column '{field}' not found in staging dataset '{}'",
                ctx.datasets.staging.name
            ));
        }
    }
    reasons
}

fn check_digest_column(ctx: &ValidationContext) -> Vec<String> {
    let Some(digest) = ctx.ingest_mode.digest_field() else {
        return Vec::new();
    };
    if ctx.datasets.staging.schema.has_column(digest) {
        Vec::new()
    } else {
        vec![format!(
            "Digest column '{digest}' not found in staging dataset '{}'",
            ctx.datasets.staging.name
        )]
    }
}

fn check_delete_indicator_column(ctx: &ValidationContext) -> Vec<String> {
    let Some(MergeStrategy::DeleteIndicator { field, values }) = ctx.ingest_mode.merge_strategy()
    else {
        return Vec::new();
    };
    let mut reasons = Vec::new();
    if !ctx.datasets.staging.schema.has_column(field) {
        reasons.push(format!(
            "Delete indicator column '{field}' not found in staging dataset '{}'",
            ctx.datasets.staging.name
        ));
    }
    if values.is_empty() {
        reasons.push("Delete indicator values must not be empty".to_string());
    }
    reasons
}

fn check_case_conversion_collisions(ctx: &ValidationContext) -> Vec<String> {
    if ctx.options.case_conversion == CaseConversion::None {
        return Vec::new();
    }
    let fold = |name: &str| match ctx.options.case_conversion {
        CaseConversion::None => name.to_string(),
        CaseConversion::ToUpper => name.to_uppercase(),
        CaseConversion::ToLower => name.to_lowercase(),
    };
    let mut reasons = Vec::new();
    for dataset in [&ctx.datasets.main, &ctx.datasets.staging] {
        let mut seen: Vec<String> = Vec::new();
        for column in &dataset.schema.columns {
            let folded = fold(&column.name);
            if seen.contains(&folded) {
                reasons.push(format!(
                    "Case conversion folds multiple columns of dataset '{}' to '{folded}'",
                    dataset.name
                ));
            } else {
                seen.push(folded);
            }
        }
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Column, DataType, DatasetDefinition, DatasetRole, SchemaDefinition};
    use crate::ingest_mode::{Auditing, TransactionMilestoning};

    fn staging_schema() -> SchemaDefinition {
        SchemaDefinition::new(vec![
            Column::primary("id", DataType::Int),
            Column::new("amount", DataType::Double),
            Column::new("digest", DataType::Varchar),
        ])
    }

    fn main_schema() -> SchemaDefinition {
        let mut schema = staging_schema();
        schema.columns.push(Column::new("batch_id_in", DataType::Integer));
        schema.columns.push(Column::new("batch_id_out", DataType::Integer));
        schema
    }

    fn datasets() -> Datasets {
        Datasets::new(
            DatasetDefinition::new("main", main_schema(), DatasetRole::Main),
            DatasetDefinition::new("staging", staging_schema(), DatasetRole::Staging),
        )
    }

    #[test]
    fn test_valid_unitemporal_delta() {
        let mode = IngestMode::UnitemporalDelta {
            digest_field: "digest".to_string(),
            transaction_milestoning: TransactionMilestoning::BatchId {
                batch_id_in: "batch_id_in".to_string(),
                batch_id_out: "batch_id_out".to_string(),
            },
            merge_strategy: MergeStrategy::NoDeletes,
        };
        let options = GeneratorOptions::default();
        let datasets = datasets();
        let result = validate(&ValidationContext {
            ingest_mode: &mode,
            options: &options,
            datasets: &datasets,
        });
        assert!(result.is_valid(), "unexpected reasons: {:?}", result.reasons);
    }

    #[test]
    fn test_all_reasons_collected() {
        let mode = IngestMode::UnitemporalDelta {
            digest_field: "missing_digest".to_string(),
            transaction_milestoning: TransactionMilestoning::BatchId {
                batch_id_in: "batch_id_in".to_string(),
                batch_id_out: "batch_id_out".to_string(),
            },
            merge_strategy: MergeStrategy::NoDeletes,
        };
        let options = GeneratorOptions {
            data_processing_units: Some(1),
            ..GeneratorOptions::default()
        };
        let datasets = datasets();
        let result = validate(&ValidationContext {
            ingest_mode: &mode,
            options: &options,
            datasets: &datasets,
        });
        assert_eq!(
            result.reasons,
            vec![
                DPU_TOO_LOW.to_string(),
                "Digest column 'missing_digest' not found in staging dataset 'staging'".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_primary_keys() {
        let mode = IngestMode::AppendOnly {
            deduplication: crate::ingest_mode::Deduplication::FilterDuplicates,
            auditing: Auditing::None,
        };
        let options = GeneratorOptions::default();
        let no_pk = SchemaDefinition::new(vec![Column::new("id", DataType::Int)]);
        let datasets = Datasets::new(
            DatasetDefinition::new("main", no_pk.clone(), DatasetRole::Main),
            DatasetDefinition::new("staging", no_pk, DatasetRole::Staging),
        );
        let result = validate(&ValidationContext {
            ingest_mode: &mode,
            options: &options,
            datasets: &datasets,
        });
        assert_eq!(
            result.reasons,
            vec!["Primary keys are mandatory for ingest mode AppendOnly".to_string()]
        );
    }

    #[test]
    fn test_case_collision() {
        let mode = IngestMode::NontemporalSnapshot {
            auditing: Auditing::None,
        };
        let options = GeneratorOptions {
            case_conversion: CaseConversion::ToUpper,
            ..GeneratorOptions::default()
        };
        let schema = SchemaDefinition::new(vec![
            Column::new("amount", DataType::Double),
            Column::new("AMOUNT", DataType::Double),
        ]);
        let datasets = Datasets::new(
            DatasetDefinition::new("main", schema.clone(), DatasetRole::Main),
            DatasetDefinition::new("staging", schema, DatasetRole::Staging),
        );
        let result = validate(&ValidationContext {
            ingest_mode: &mode,
            options: &options,
            datasets: &datasets,
        });
        assert_eq!(result.reasons.len(), 2);
        assert!(result.reasons[0].contains("'AMOUNT'"));
    }
}
