//! Error types for executing conversion routines.

use thiserror::Error;

use crate::abi::{HeapError, LayoutError};

use super::Direction;

#[derive(Error, Debug)]
pub enum MarshalError {
    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("No {direction} conversion planned for '{record}'")]
    NotPlanned { record: String, direction: Direction },

    #[error("Conversion of {record}.{member} is not supported")]
    Unsupported { record: String, member: String },

    #[error("Record '{record}' has no member '{member}'")]
    MissingField { record: String, member: String },
}
