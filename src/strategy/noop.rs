//! The dedup short-circuit: an ingest-request id already recorded in the
//! metadata table yields an empty plan, making re-submission safe.

use super::StrategyPlan;

pub fn plan() -> StrategyPlan {
    StrategyPlan::new()
}
