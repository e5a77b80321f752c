//! The orchestrator: validation, strategy dispatch, and plan assembly.
//!
//! Generation is a pure synchronous computation. Nothing here touches a
//! database or the wall clock; the injected [`Clock`] is the only time
//! source, so two calls with the same inputs yield byte-identical SQL.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datasets::Datasets;
use crate::error::{PlanError, PlanResult};
use crate::ingest_mode::IngestMode;
use crate::lock::LockDataset;
use crate::sink::{Dialect, RelationalSink};
use crate::sqldom::{CaseConversion, SqlContext, SqlStatement, TableRef};
use crate::strategy::{self, StatisticName, StrategyPlan};
use crate::validation::{self, ValidationContext};

/// The execution-timestamp source. `Fixed` makes planning fully
/// deterministic and is what tests use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Clock {
    Fixed(NaiveDateTime),
    Utc,
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::Fixed(ts) => *ts,
            Clock::Utc => chrono::Utc::now().naive_utc(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::Utc
    }
}

/// Generation options. Immutable once the generator is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorOptions {
    pub collect_statistics: bool,
    pub skip_main_and_metadata_dataset_creation: bool,
    pub enable_concurrent_safety: bool,
    /// Append a staging DELETE post-action so re-running the plan does not
    /// re-ingest consumed rows.
    pub clean_staging_data: bool,
    pub case_conversion: CaseConversion,
    /// Idempotency token; when it is already recorded in the metadata
    /// dataset the generated plan is empty.
    pub ingest_request_id: Option<String>,
    pub data_processing_units: Option<u32>,
    pub clock: Clock,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            collect_statistics: false,
            skip_main_and_metadata_dataset_creation: false,
            enable_concurrent_safety: false,
            clean_staging_data: true,
            case_conversion: CaseConversion::None,
            ingest_request_id: None,
            data_processing_units: None,
            clock: Clock::Utc,
        }
    }
}

/// Facts about the live datasets that the caller's introspection
/// collaborator supplies; the generator itself performs no I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resources {
    pub staging_dataset_empty: bool,
}

/// The ordered plan, rendered to SQL text per phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorResult {
    pub pre_actions_sql: Vec<String>,
    pub ingest_sql: Vec<String>,
    pub metadata_ingest_sql: Vec<String>,
    pub post_actions_sql: Vec<String>,
    pub pre_ingest_statistics_sql: BTreeMap<StatisticName, String>,
    pub post_ingest_statistics_sql: BTreeMap<StatisticName, String>,
}

/// Entry point of the engine.
pub struct RelationalGenerator {
    dialect: Dialect,
    ingest_mode: IngestMode,
    options: GeneratorOptions,
    sink: Box<dyn RelationalSink>,
}

impl RelationalGenerator {
    pub fn try_new(
        dialect: Dialect,
        ingest_mode: IngestMode,
        options: GeneratorOptions,
    ) -> PlanResult<Self> {
        if matches!(options.ingest_request_id.as_deref(), Some("")) {
            return Err(PlanError::validation("Ingest request id must not be empty"));
        }
        Ok(Self {
            dialect,
            ingest_mode,
            options,
            sink: dialect.sink(),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn generate_operations(&self, datasets: &Datasets) -> PlanResult<GeneratorResult> {
        self.generate_operations_with_resources(datasets, Resources::default())
    }

    pub fn generate_operations_with_resources(
        &self,
        datasets: &Datasets,
        resources: Resources,
    ) -> PlanResult<GeneratorResult> {
        let ctx = SqlContext::new(
            self.sink.quote_character(),
            self.options.case_conversion,
            self.options.clock.now().format("%Y-%m-%d %H:%M:%S").to_string(),
        );

        let result = validation::validate(&ValidationContext {
            ingest_mode: &self.ingest_mode,
            options: &self.options,
            datasets,
        });
        if !result.is_valid() {
            debug!(
                "rejecting {} request against '{}': {} validation reason(s)",
                self.ingest_mode.name(),
                datasets.main.name,
                result.reasons.len()
            );
            return Err(PlanError::Validation {
                reasons: result.reasons,
            });
        }
        check_staging_key_quality(datasets)?;

        if let Some(request_id) = &self.options.ingest_request_id {
            if datasets.metadata.is_already_ingested(request_id) {
                debug!(
                    "ingest request '{request_id}' already recorded for '{}', planning no-op",
                    datasets.main.name
                );
                return Ok(render(
                    &strategy::noop::plan(),
                    Phases::default(),
                    &self.options,
                    &ctx,
                ));
            }
        }

        let mut datasets = datasets.clone();
        let mut pre_actions: Vec<SqlStatement> = Vec::new();
        let mut post_actions: Vec<SqlStatement> = Vec::new();

        if !self.options.skip_main_and_metadata_dataset_creation {
            pre_actions.push(SqlStatement::CreateTable {
                table: datasets.main.table_ref(),
                columns: datasets.main.schema.columns.clone(),
                if_not_exists: true,
            });
            if datasets.staging.source_location.is_none() {
                pre_actions.push(SqlStatement::CreateTable {
                    table: datasets.staging.table_ref(),
                    columns: datasets.staging.schema.columns.clone(),
                    if_not_exists: true,
                });
            }
            pre_actions.push(datasets.metadata.create_table());
        }

        let lock = self
            .options
            .enable_concurrent_safety
            .then(|| LockDataset::for_main_table(&datasets.main.name));
        if let Some(lock) = &lock {
            pre_actions.push(lock.create_table());
            pre_actions.push(lock.initialize());
        }

        // External staging files load into a temp table that takes the
        // staging dataset's place for the rest of the plan. The suffix is a
        // v5 UUID of the request identity, so re-planning the same request
        // names the same table.
        let mut staging_is_temp = false;
        if let Some(location) = datasets.staging.source_location.clone() {
            let seed = self
                .options
                .ingest_request_id
                .as_deref()
                .unwrap_or(&datasets.main.name);
            let suffix = Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
                .simple()
                .to_string();
            let temp_name = format!("{}_{}", datasets.staging.name, &suffix[..8]);
            let temp_ref = TableRef::new(&temp_name);
            pre_actions.extend(self.sink.create_and_load_temp_table(
                &datasets.staging,
                &temp_ref,
                &location,
            )?);
            post_actions.extend(self.sink.drop_temp_table(&temp_ref));
            datasets.staging.name = temp_name;
            datasets.staging.source_location = None;
            staging_is_temp = true;
        }

        debug!(
            "planning {} ingestion into '{}' for the {} sink",
            self.ingest_mode.name(),
            datasets.main.name,
            self.sink.dialect_name()
        );
        let plan = self.dispatch(&datasets, resources);

        let mut ingest: Vec<SqlStatement> = Vec::new();
        if let Some(lock) = &lock {
            ingest.push(lock.acquire());
        }
        ingest.extend(plan.ingest.iter().cloned());
        if let Some(lock) = &lock {
            ingest.push(lock.release());
        }

        post_actions.extend(plan.post_actions.iter().cloned());
        if self.options.clean_staging_data && !staging_is_temp {
            post_actions.push(SqlStatement::Delete {
                from: datasets.staging.table_ref(),
                condition: None,
            });
        }

        let metadata_ingest = vec![datasets
            .metadata
            .insert_metadata(&datasets.main.name, self.options.ingest_request_id.as_deref())];

        Ok(render(
            &plan,
            Phases {
                pre_actions,
                ingest,
                metadata_ingest,
                post_actions,
            },
            &self.options,
            &ctx,
        ))
    }

    /// Exhaustive dispatch over every ingest-mode variant.
    fn dispatch(&self, datasets: &Datasets, resources: Resources) -> StrategyPlan {
        let empty = resources.staging_dataset_empty;
        match &self.ingest_mode {
            IngestMode::AppendOnly {
                deduplication,
                auditing,
            } => strategy::append_only::plan(datasets, *deduplication, auditing, empty),
            IngestMode::NontemporalSnapshot { auditing } => {
                strategy::nontemporal_snapshot::plan(datasets, auditing, empty)
            }
            IngestMode::NontemporalDelta {
                digest_field,
                merge_strategy,
                auditing,
            } => strategy::nontemporal_delta::plan(
                datasets,
                digest_field,
                merge_strategy,
                auditing,
                self.sink.as_ref(),
                empty,
            ),
            IngestMode::UnitemporalSnapshot {
                digest_field,
                transaction_milestoning,
            } => strategy::unitemporal_snapshot::plan(
                datasets,
                digest_field,
                transaction_milestoning,
                empty,
            ),
            IngestMode::UnitemporalDelta {
                digest_field,
                transaction_milestoning,
                merge_strategy,
            } => strategy::unitemporal_delta::plan(
                datasets,
                digest_field,
                transaction_milestoning,
                merge_strategy,
                empty,
            ),
            IngestMode::BitemporalSnapshot {
                digest_field,
                transaction_milestoning,
                validity_milestoning,
            } => strategy::bitemporal_snapshot::plan(
                datasets,
                digest_field,
                transaction_milestoning,
                validity_milestoning,
                empty,
            ),
            IngestMode::BitemporalDelta {
                digest_field,
                transaction_milestoning,
                validity_milestoning,
                merge_strategy,
            } => strategy::bitemporal_delta::plan(
                datasets,
                digest_field,
                transaction_milestoning,
                validity_milestoning,
                merge_strategy,
                empty,
            ),
        }
    }
}

/// A nullable key in staging could silently match several main rows.
fn check_staging_key_quality(datasets: &Datasets) -> PlanResult<()> {
    for column in &datasets.staging.schema.columns {
        if column.primary_key && column.nullable {
            return Err(PlanError::DataQuality(format!(
                "primary key column '{}' of staging dataset '{}' must not be nullable",
                column.name, datasets.staging.name
            )));
        }
    }
    Ok(())
}

#[derive(Default)]
struct Phases {
    pre_actions: Vec<SqlStatement>,
    ingest: Vec<SqlStatement>,
    metadata_ingest: Vec<SqlStatement>,
    post_actions: Vec<SqlStatement>,
}

fn render(
    plan: &StrategyPlan,
    phases: Phases,
    options: &GeneratorOptions,
    ctx: &SqlContext,
) -> GeneratorResult {
    let render_all = |statements: &[SqlStatement]| -> Vec<String> {
        statements.iter().map(|s| s.render(ctx)).collect()
    };
    let render_stats = |stats: &BTreeMap<StatisticName, SqlStatement>| {
        stats
            .iter()
            .map(|(name, stmt)| (*name, stmt.render(ctx)))
            .collect::<BTreeMap<_, _>>()
    };
    GeneratorResult {
        pre_actions_sql: render_all(&phases.pre_actions),
        ingest_sql: render_all(&phases.ingest),
        metadata_ingest_sql: render_all(&phases.metadata_ingest),
        post_actions_sql: render_all(&phases.post_actions),
        pre_ingest_statistics_sql: if options.collect_statistics {
            render_stats(&plan.pre_ingest_statistics)
        } else {
            BTreeMap::new()
        },
        post_ingest_statistics_sql: if options.collect_statistics {
            render_stats(&plan.post_ingest_statistics)
        } else {
            BTreeMap::new()
        },
    }
}
