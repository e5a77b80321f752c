//! Rendering context shared by every sqldom node.

use serde::{Deserialize, Serialize};

/// Case-folding policy applied uniformly to all generated identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaseConversion {
    #[default]
    None,
    ToUpper,
    ToLower,
}

/// Everything a node needs to render itself: the sink's quote character,
/// the case-conversion policy, and the execution timestamp (taken from the
/// injected clock, never the wall clock) used for batch-start literals.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlContext {
    pub quote: Option<char>,
    pub case_conversion: CaseConversion,
    pub batch_start_ts: String,
}

impl SqlContext {
    pub fn new(quote: Option<char>, case_conversion: CaseConversion, batch_start_ts: impl Into<String>) -> Self {
        Self {
            quote,
            case_conversion,
            batch_start_ts: batch_start_ts.into(),
        }
    }

    /// Quote and case-fold an identifier. Aliases are rendered elsewhere,
    /// unquoted and unfolded; this is for real identifiers only.
    pub fn identifier(&self, name: &str) -> String {
        let folded = match self.case_conversion {
            CaseConversion::None => name.to_string(),
            CaseConversion::ToUpper => name.to_uppercase(),
            CaseConversion::ToLower => name.to_lowercase(),
        };
        match self.quote {
            Some(q) => format!("{q}{folded}{q}"),
            None => folded,
        }
    }

    pub fn push_identifier(&self, buf: &mut String, name: &str) {
        buf.push_str(&self.identifier(name));
    }
}
