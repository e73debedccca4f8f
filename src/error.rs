// dir2iso/src/error.rs
use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal failures of the image pipeline.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("input directory not found or not a directory: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("symbolic link cycle: {} points back to {}", path.display(), ancestor.display())]
    Cycle { path: PathBuf, ancestor: PathBuf },

    #[error("image needs {sectors} sectors, the format addresses at most {max}")]
    Oversize { sectors: u64, max: u64 },

    #[error("{field} does not fit its field: {detail}")]
    FieldOverflow { field: String, detail: String },

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("serialization fault: {0}")]
    SerializationFault(String),

    #[error("writing the image failed after {attempts} attempt(s): {source}")]
    Write {
        attempts: u32,
        #[source]
        source: io::Error,
    },
}

impl ImageError {
    pub(crate) fn overflow(field: impl Into<String>, detail: impl Into<String>) -> Self {
        ImageError::FieldOverflow {
            field: field.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn fault(detail: impl Into<String>) -> Self {
        ImageError::SerializationFault(detail.into())
    }
}

pub type Result<T> = std::result::Result<T, ImageError>;

/// Two sibling names mapped to the same encoded name; `encoded` is the
/// disambiguated name that was actually written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollisionWarning {
    pub directory: String,
    pub original: String,
    pub encoded: String,
}

impl fmt::Display for NameCollisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name collision in '{}': '{}' renamed to '{}'",
            self.directory, self.original, self.encoded
        )
    }
}
