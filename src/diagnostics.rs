//! Recoverable conditions reported during generation.
//!
//! Unlike [`Error`](crate::Error), a diagnostic never stops a run. Each one is
//! logged at warn level as it is reported and kept on the collector so callers
//! can inspect what was tolerated.

use std::fmt;

use thiserror::Error;

use crate::logging::warn;

/// Member shapes the conversion synthesizer detects but does not convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedShape {
    /// Fixed-size array whose element type needs conversion.
    FixedArray,
    /// Dynamic array needing conversion inside a callee-filled record.
    ReturnedArray,
}

impl fmt::Display for UnsupportedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedShape::FixedArray => f.write_str("static array"),
            UnsupportedShape::ReturnedArray => f.write_str("returned-only dynamic array"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("Bitmask '{alias}' links to enum '{companion}' which is not defined")]
    UnresolvedEnumLink { alias: String, companion: String },

    #[error("Unsupported conversion of {shape} member {record}.{member}")]
    UnsupportedConversionShape {
        record: String,
        member: String,
        shape: UnsupportedShape,
    },

    #[error("No trace format for parameter '{param}' of type '{type_name}' in {function}")]
    UnhandledTraceType {
        function: String,
        param: String,
        type_name: String,
    },
}

/// Collector for [`Diagnostic`]s.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and keep a diagnostic. Identical reports are kept once.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if self.items.contains(&diagnostic) {
            return;
        }
        warn!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move every diagnostic of `other` into `self`.
    pub fn merge(&mut self, other: Diagnostics) {
        for d in other.items {
            if !self.items.contains(&d) {
                self.items.push(d);
            }
        }
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_deduplicates() {
        let mut diags = Diagnostics::new();
        let d = Diagnostic::UnresolvedEnumLink {
            alias: "VkFooFlags".to_string(),
            companion: "VkFooFlagBits".to_string(),
        };
        diags.report(d.clone());
        diags.report(d);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_unsupported_shape_message_names_member() {
        let d = Diagnostic::UnsupportedConversionShape {
            record: "VkBindSparseInfo".to_string(),
            member: "pBufferBinds".to_string(),
            shape: UnsupportedShape::ReturnedArray,
        };
        assert_eq!(
            d.to_string(),
            "Unsupported conversion of returned-only dynamic array member VkBindSparseInfo.pBufferBinds"
        );
    }
}
