//! Error types for record ordering.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OrderError {
    #[error("Cyclic record dependency among: {}", .remaining.join(", "))]
    CyclicDependency { remaining: Vec<String> },
}
