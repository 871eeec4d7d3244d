use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported crop type: {0}")]
    UnsupportedCropType(String),

    #[error("Unsupported crop mode: {0}")]
    UnsupportedCropMode(String),

    #[error("Unsupported input type: {0}")]
    UnsupportedInputType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to decode image {path:?}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry {path:?}: {reason}")]
    CacheDecode { path: PathBuf, reason: String },

    #[error("Failed to encode cache entry: {0}")]
    CacheEncode(#[from] bincode::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Track {index} ({ped_id}) has {actual} frames, window needs {required}")]
    TrackTooShort {
        index: usize,
        ped_id: String,
        required: usize,
        actual: usize,
    },

    #[error("Field `{field}` is ragged: expected length {expected}, got (index, len) {entries:?}")]
    RaggedField {
        field: &'static str,
        expected: usize,
        entries: Vec<(usize, usize)>,
    },

    #[error("Column `{field}` has {actual} entries at track {index}, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Shape Error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Feature extractor failed: {0}")]
    Extractor(String),
}

pub type Result<T> = std::result::Result<T, Error>;
