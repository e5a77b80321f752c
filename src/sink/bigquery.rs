use super::{Capability, RelationalSink};

/// BigQuery sink: backtick-quoted identifiers and native `MERGE INTO`,
/// which the delta strategies prefer over the portable two-statement plan.
pub struct BigQuerySink;

impl RelationalSink for BigQuerySink {
    fn dialect_name(&self) -> &'static str {
        "BigQuery"
    }

    fn quote_character(&self) -> Option<char> {
        Some('`')
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::MergeInto]
    }
}
