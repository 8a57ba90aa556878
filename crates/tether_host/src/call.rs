use crate::variant::{Variant, VariantType};
use thiserror::Error;

/// Outcome of a dynamic call that did not produce a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("too few arguments (expected {expected})")]
    TooFewArguments { expected: usize },

    #[error("too many arguments (expected {expected})")]
    TooManyArguments { expected: usize },

    #[error("invalid argument at index {index} (expected {expected})")]
    InvalidArgument { index: usize, expected: VariantType },

    #[error("invalid method")]
    InvalidMethod,

    #[error("instance is null")]
    InstanceIsNull,

    #[error("script exception: {message}")]
    Exception { message: String },

    #[error("value nesting exceeds {limit} levels")]
    RecursionLimit { limit: usize },
}

pub type CallResult = Result<Variant, CallError>;
