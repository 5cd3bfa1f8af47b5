//! Definition of errors returned by the functions of this crate

use thiserror::Error;

/// Errors returned by the crate functions.
///
/// Grid geometry errors are never downgraded: an unsupported grid type, a missing
/// key combination or two redundant keys that disagree always reach the caller.
#[derive(Error, Debug)]
pub enum CodesError {
    /// Returned when the `gridType` of a message or a [`GridSpec`](crate::GridSpec)
    /// has no registered maker or converter.
    #[error("Cannot make GridSpec, unsupported grid_type={0}")]
    UnsupportedGridType(String),

    /// Returned when none of the keys that can provide a value are present.
    #[error("Could not determine {desc}, none of the keys have valid value: {keys:?}")]
    MissingKeys { desc: String, keys: Vec<String> },

    /// Returned when neither `iScansNegatively` nor `iScansPositively` is available.
    #[error("Could not determine i-direction scanning mode, tried keys: {0:?}")]
    ScanDirection(Vec<String>),

    /// Returned when two keys expected to carry the same value disagree.
    #[error("Inconsistent geometry: {first_key}={first} and {second_key}={second} are expected to be equal")]
    InconsistentGeometry {
        first_key: String,
        first: f64,
        second_key: String,
        second: f64,
    },

    /// Returned when the underlying library is too old to give correct geometry.
    #[error("{feature} requires {required}, found {found}")]
    FeatureUnsupported {
        feature: String,
        required: String,
        found: String,
    },

    /// Returned when a restricted view is requested over metadata that does not own its handle.
    #[error("Restricted metadata can only wrap standalone metadata owning its handle")]
    NotStandalone,

    /// Returned when a raw key is copied into a GridSpec but has no GridSpec name.
    #[error("key={0} not found in vocabulary")]
    NotInVocabulary(String),

    /// Returned when the value buffer of an overridden message has unexpected length.
    #[error("Value buffer has {actual} values after override, expected {expected}")]
    ValueSizeMismatch { expected: usize, actual: usize },

    #[error("Key {key} cannot be read as {requested}")]
    WrongRequestedKeyType { key: String, requested: &'static str },

    #[error("Key {0} not found")]
    MissingKey(String),

    #[error("Invalid GridSpec: {0}")]
    InvalidGridSpec(String),

    #[error("Unsupported GRIB edition {0}")]
    UnsupportedEdition(i64),

    #[error("Cannot build datetime from date={date} time={time}")]
    InvalidDateTime { date: i64, time: i64 },

    #[error("Cannot convert step={0} to timedelta")]
    InvalidStep(String),

    #[error("Cannot parse projection string: {0}")]
    InvalidProjection(String),

    #[error("Serialization failed")]
    Serialization(#[from] serde_json::Error),

    /// Returned when coordinates cannot be reshaped to the grid shape.
    #[cfg(feature = "message_ndarray")]
    #[error("error occured while converting coordinates to ndarray {0}")]
    NdarrayError(#[from] MessageNdarrayError),

    /// Internal ecCodes error with the returned code.
    #[cfg(feature = "eccodes")]
    #[error("Internal ecCodes error occured with code {0}")]
    Internal(i32),

    #[cfg(feature = "eccodes")]
    #[error("Internal libc error occured")]
    Libc(#[from] LibcError),

    #[cfg(feature = "eccodes")]
    #[error("ecCodes failed to clone the message")]
    CloneFailed,

    #[cfg(feature = "eccodes")]
    #[error("ecCodes returned a null pointer")]
    NullPtr,

    #[cfg(feature = "eccodes")]
    #[error("String returned by ecCodes is not valid UTF-8")]
    CstrUTF8(#[from] std::str::Utf8Error),

    #[cfg(feature = "eccodes")]
    #[error("String returned by ecCodes has misplaced nul byte")]
    NulChar(#[from] std::ffi::FromBytesWithNulError),
}

#[cfg(feature = "message_ndarray")]
#[derive(Error, Debug)]
pub enum MessageNdarrayError {
    #[error("Coordinate arrays have {0} values but the grid has {1} points")]
    UnexpectedValuesLength(usize, usize),

    #[error("Grid dimension cannot be negative: {0}")]
    NegativeDimension(#[from] std::num::TryFromIntError),

    #[error("Error occured while converting to ndarray: {0}")]
    InvalidShape(#[from] ndarray::ShapeError),
}

#[cfg(feature = "eccodes")]
#[derive(Clone, Error, Debug)]
pub enum LibcError {
    #[error("Libc function returned null pointer, errno code {0} with error {1}")]
    NullPtr(i32, errno::Errno),

    #[error(transparent)]
    CStringNull(#[from] std::ffi::NulError),
}
