use super::{Capability, RelationalSink};

/// MemSQL sink: backtick-quoted identifiers, no optional capabilities.
pub struct MemSqlSink;

impl RelationalSink for MemSqlSink {
    fn dialect_name(&self) -> &'static str {
        "MemSQL"
    }

    fn quote_character(&self) -> Option<char> {
        Some('`')
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }
}
