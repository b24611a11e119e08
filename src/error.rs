use std::{fmt, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Restaurant,
    Submission,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restaurant => f.write_str("Restaurant"),
            Self::Submission => f.write_str("Submission"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("'{field}' is required")]
    Validation { field: &'static str },

    #[error("{resource} with id {id} not found")]
    NotFound { resource: Resource, id: String },

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("malformed document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("fail to read seed fixture {}: {source}", path.display())]
    Fixture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn not_found(resource: Resource, id: &str) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::Validation {
            field: err.field_name(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
