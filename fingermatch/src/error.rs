use thiserror::Error;

use crate::config::DescriptorKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid feature type: matcher expects {expected} features, got {found}")]
    InvalidFeatureType {
        expected: DescriptorKind,
        found: DescriptorKind,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed minutia encoding: {0} bytes is not a multiple of 4")]
    MalformedLength(usize),

    #[error("{0} was not configured")]
    UnconfiguredDependency(&'static str),

    #[error("matching was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed template: {0}")]
    MalformedTemplate(String),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
