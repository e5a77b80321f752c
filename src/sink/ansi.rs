use super::{Capability, RelationalSink};

/// Lowest-common-denominator sink: double-quoted identifiers, no optional
/// capabilities. Every strategy must have a plan that works here.
pub struct AnsiSink;

impl RelationalSink for AnsiSink {
    fn dialect_name(&self) -> &'static str {
        "ANSI"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }
}
