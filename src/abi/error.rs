//! Error types for ABI analysis, layout and the simulated heap.

use thiserror::Error;

use crate::model::EntityKind;

/// Errors raised while classifying records.
#[derive(Error, Debug)]
pub enum AbiError {
    #[error("Record '{record}' contains itself")]
    CyclicDependency { record: String },

    #[error("'{0}' is not a record")]
    NotARecord(String),
}

/// Errors raised while computing concrete layouts.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Member {record}.{member} has no size (type '{type_name}')")]
    Unsized {
        record: String,
        member: String,
        type_name: String,
    },

    #[error("Member {record}.{member} has unknown array length '{len}'")]
    UnknownArrayLength {
        record: String,
        member: String,
        len: String,
    },

    #[error("Member {record}.{member} refers to a {kind}, which has no layout")]
    NotAType {
        record: String,
        member: String,
        kind: EntityKind,
    },

    #[error("Record '{0}' contains itself")]
    CyclicDependency(String),

    #[error("'{0}' is not a record")]
    NotARecord(String),
}

/// Errors raised by the simulated heap.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HeapError {
    #[error("Access of {len} bytes at {ptr:#x} is outside any live allocation")]
    OutOfBounds { ptr: u32, len: u32 },

    #[error("Free of {0:#x}, which is not a live allocation")]
    InvalidFree(u32),

    #[error("Heap exhausted allocating {0} bytes")]
    Exhausted(u32),

    #[error("Array of {count} elements of {size} bytes does not fit in 32 bits")]
    ArrayTooLarge { size: u32, count: u32 },

    #[error("Address {ptr:#x} + {offset:#x} does not fit in 32 bits")]
    AddressOverflow { ptr: u32, offset: u32 },
}
