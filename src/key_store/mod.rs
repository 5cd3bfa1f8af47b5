//! Definition of the `KeyStore` contract through which all GRIB keys are accessed
//! and of the value types exchanged with it

#[cfg(feature = "eccodes")]
mod codes;
mod memory;
mod temporary;

#[cfg(feature = "eccodes")]
pub use codes::CodesKeyStore;
pub use memory::MemoryKeyStore;
pub use temporary::TemporaryKey;

use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, fmt::Debug};

use crate::errors::CodesError;

/// Integer value used by GRIB to mark an absent point count.
pub const MISSING_VALUE: i64 = 2_147_483_647;

/// Ordered set of keys and values written to a message in one batch.
///
/// Order matters: ecCodes re-derives dependent keys on every set,
/// so `gridType` must come before the geometry keys it governs.
pub type KeyPatch = IndexMap<String, DynamicKeyType>;

/// Returns `None` for the GRIB missing sentinel.
pub fn missing_is_none(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != MISSING_VALUE)
}

/// Enum representing the value of a key in the message.
///
/// Messages can contain arbitrary keys and the type of a given key is only known
/// at runtime, so values are exchanged with the [`KeyStore`] in this form and
/// converted to static types with [`FromKeyValue`].
///
/// In JSON, values are written without a tag; bytes are written as `{"bytes": [...]}`
/// so that they are not read back as an integer array. An empty float array is
/// read back as an empty integer array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DynamicKeyType {
    Int(i64),
    Float(f64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    Bytes(#[serde(with = "tagged_bytes")] Vec<u8>),
}

mod tagged_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Tagged<T> {
        bytes: T,
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        Tagged { bytes }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(Tagged::<Vec<u8>>::deserialize(deserializer)?.bytes)
    }
}

impl fmt::Display for DynamicKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
            Self::IntArray(v) => write!(f, "{v:?}"),
            Self::FloatArray(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

macro_rules! impl_from_for_dynamic {
    ($variant:ident, $gen_type:ty) => {
        impl From<$gen_type> for DynamicKeyType {
            fn from(value: $gen_type) -> Self {
                Self::$variant(value.into())
            }
        }
    };
}

impl_from_for_dynamic!(Int, i64);
impl_from_for_dynamic!(Int, i32);
impl_from_for_dynamic!(Float, f64);
impl_from_for_dynamic!(Str, String);
impl_from_for_dynamic!(Str, &str);
impl_from_for_dynamic!(IntArray, Vec<i64>);
impl_from_for_dynamic!(FloatArray, Vec<f64>);

/// Conversion from [`DynamicKeyType`] to a static type.
///
/// Conversions follow ecCodes: integers widen to floats, integral floats narrow to
/// integers, numbers format as strings and numeric strings parse.
pub trait FromKeyValue: Sized {
    /// Name of the type reported in [`CodesError::WrongRequestedKeyType`].
    const TYPE_NAME: &'static str;

    fn from_key_value(value: DynamicKeyType) -> Option<Self>;
}

impl FromKeyValue for DynamicKeyType {
    const TYPE_NAME: &'static str = "dynamic";

    fn from_key_value(value: DynamicKeyType) -> Option<Self> {
        Some(value)
    }
}

impl FromKeyValue for i64 {
    const TYPE_NAME: &'static str = "i64";

    #[allow(clippy::cast_possible_truncation)]
    fn from_key_value(value: DynamicKeyType) -> Option<Self> {
        match value {
            DynamicKeyType::Int(v) => Some(v),
            DynamicKeyType::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
            DynamicKeyType::Str(v) => v.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromKeyValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    #[allow(clippy::cast_precision_loss)]
    fn from_key_value(value: DynamicKeyType) -> Option<Self> {
        match value {
            DynamicKeyType::Int(v) => Some(v as f64),
            DynamicKeyType::Float(v) => Some(v),
            DynamicKeyType::Str(v) => v.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromKeyValue for String {
    const TYPE_NAME: &'static str = "String";

    fn from_key_value(value: DynamicKeyType) -> Option<Self> {
        match value {
            DynamicKeyType::Str(v) => Some(v),
            DynamicKeyType::Int(v) => Some(v.to_string()),
            DynamicKeyType::Float(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl FromKeyValue for Vec<f64> {
    const TYPE_NAME: &'static str = "Vec<f64>";

    #[allow(clippy::cast_precision_loss)]
    fn from_key_value(value: DynamicKeyType) -> Option<Self> {
        match value {
            DynamicKeyType::FloatArray(v) => Some(v),
            DynamicKeyType::IntArray(v) => Some(v.into_iter().map(|x| x as f64).collect()),
            _ => None,
        }
    }
}

impl FromKeyValue for Vec<i64> {
    const TYPE_NAME: &'static str = "Vec<i64>";

    fn from_key_value(value: DynamicKeyType) -> Option<Self> {
        match value {
            DynamicKeyType::IntArray(v) => Some(v),
            _ => None,
        }
    }
}

/// Provides typed key reading on top of a single dynamic lookup.
///
/// Implemented by the metadata facades so that GridSpec makers and the geography
/// accessor can read keys regardless of how the handle is owned or filtered.
pub trait KeyRead {
    /// Reads the key as [`DynamicKeyType`], returning `None` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying [`KeyStore`] when the key cannot be read.
    fn read_key_dynamic(&self, name: &str) -> Result<Option<DynamicKeyType>, CodesError>;

    /// Reads the key converted to `T`, returning `None` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CodesError::WrongRequestedKeyType`] when the value cannot be converted to `T`.
    fn read_key<T: FromKeyValue>(&self, name: &str) -> Result<Option<T>, CodesError> {
        match self.read_key_dynamic(name)? {
            None => Ok(None),
            Some(value) => T::from_key_value(value).map(Some).ok_or_else(|| {
                CodesError::WrongRequestedKeyType {
                    key: name.to_owned(),
                    requested: T::TYPE_NAME,
                }
            }),
        }
    }

    /// Same as [`read_key()`](KeyRead::read_key) but returns `default` for an absent key.
    ///
    /// # Errors
    ///
    /// Returns [`CodesError::WrongRequestedKeyType`] when the value cannot be converted to `T`.
    fn read_key_or<T: FromKeyValue>(&self, name: &str, default: T) -> Result<T, CodesError> {
        Ok(self.read_key(name)?.unwrap_or(default))
    }

    /// Same as [`read_key()`](KeyRead::read_key) but an absent key is an error.
    ///
    /// # Errors
    ///
    /// Returns [`CodesError::MissingKey`] when the key is absent.
    fn require_key<T: FromKeyValue>(&self, name: &str) -> Result<T, CodesError> {
        self.read_key(name)?
            .ok_or_else(|| CodesError::MissingKey(name.to_owned()))
    }
}

/// Version of the library backing a [`KeyStore`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl LibraryVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Decodes the integer returned by `codes_get_api_version()`, eg. `23500` for 2.35.0.
    pub const fn from_api_version(version: u32) -> Self {
        Self {
            major: version / 10_000,
            minor: (version % 10_000) / 100,
            patch: version % 100,
        }
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Contract of the per-message key-value handle consumed by this crate.
///
/// The handle decodes and encodes the message; this crate only reads and writes
/// keys through it. [`MemoryKeyStore`] is the in-memory implementation and
/// `CodesKeyStore` (feature `eccodes`) the one backed by the ecCodes library.
pub trait KeyStore: Debug + Sized {
    /// Reads the key, returning `None` when it is not defined in the message.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is defined but cannot be read.
    fn get(&self, key: &str) -> Result<Option<DynamicKeyType>, CodesError>;

    /// # Errors
    ///
    /// Returns an error when the message cannot be queried.
    fn contains(&self, key: &str) -> Result<bool, CodesError> {
        Ok(self.get(key)?.is_some())
    }

    /// Names of all keys in the default namespace.
    ///
    /// # Errors
    ///
    /// Returns an error when the keys cannot be iterated.
    fn keys(&self) -> Result<Vec<String>, CodesError>;

    /// Keys and values of `namespace`, or of all keys for `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when a key of the namespace cannot be read.
    fn namespace_items(
        &self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, DynamicKeyType>, CodesError>;

    /// # Errors
    ///
    /// Returns an error when the key cannot be written.
    fn set(&mut self, key: &str, value: &DynamicKeyType) -> Result<(), CodesError>;

    /// Writes all keys of the patch in order.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered, keys before it stay written.
    fn set_many(&mut self, patch: &KeyPatch) -> Result<(), CodesError> {
        for (key, value) in patch {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Clones the handle. With `headers_only` the data section is not copied.
    ///
    /// # Errors
    ///
    /// Returns an error when the handle cannot be cloned.
    fn try_clone(&self, headers_only: bool) -> Result<Self, CodesError>;

    /// Replaces the value buffer.
    ///
    /// # Errors
    ///
    /// Returns an error when the values cannot be encoded.
    fn set_values(&mut self, values: &[f64]) -> Result<(), CodesError>;

    /// Number of values in the value buffer.
    ///
    /// # Errors
    ///
    /// Returns an error when the value count cannot be read.
    fn value_count(&self) -> Result<usize, CodesError>;

    /// Encoded message bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the message cannot be encoded.
    fn get_buffer(&self) -> Result<Bytes, CodesError>;

    /// Rebuilds a handle from bytes produced by [`get_buffer()`](KeyStore::get_buffer).
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes do not decode to a message.
    fn from_buffer(buffer: &[u8]) -> Result<Self, CodesError>;

    /// Latitudes of the gridpoints as produced by the handle's coordinate iterator.
    ///
    /// # Errors
    ///
    /// Returns an error when the iterator cannot be created for the grid.
    fn latitudes(&self) -> Result<Vec<f64>, CodesError>;

    /// Longitudes of the gridpoints as produced by the handle's coordinate iterator.
    ///
    /// # Errors
    ///
    /// Returns an error when the iterator cannot be created for the grid.
    fn longitudes(&self) -> Result<Vec<f64>, CodesError>;

    /// Writes a key that only alters how the handle is read, not the message itself.
    /// Used through [`TemporaryKey`], which restores the previous value.
    ///
    /// # Errors
    ///
    /// Returns an error when the key cannot be written.
    fn set_temporary(&self, key: &str, value: &DynamicKeyType) -> Result<(), CodesError>;

    /// Ends a temporary value set with [`set_temporary()`](KeyStore::set_temporary).
    ///
    /// `restore` is the value the key had before, or the reset value for keys that
    /// were not defined. Stores able to tell the two apart leave undefined keys undefined.
    ///
    /// # Errors
    ///
    /// Returns an error when the key cannot be written.
    fn clear_temporary(&self, key: &str, restore: &DynamicKeyType) -> Result<(), CodesError>;

    fn library_version(&self) -> LibraryVersion;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_follow_eccodes() {
        assert_eq!(i64::from_key_value(DynamicKeyType::Float(4.0)), Some(4));
        assert_eq!(i64::from_key_value(DynamicKeyType::Float(4.5)), None);
        assert_eq!(f64::from_key_value(DynamicKeyType::Int(3)), Some(3.0));
        assert_eq!(
            String::from_key_value(DynamicKeyType::Int(128)),
            Some("128".to_string())
        );
        assert_eq!(
            i64::from_key_value(DynamicKeyType::Str(" 20240101".into())),
            Some(20_240_101)
        );
        assert_eq!(
            Vec::<f64>::from_key_value(DynamicKeyType::IntArray(vec![1, 2])),
            Some(vec![1.0, 2.0])
        );
        assert_eq!(Vec::<i64>::from_key_value(DynamicKeyType::Int(1)), None);
    }

    #[test]
    fn missing_sentinel() {
        assert_eq!(missing_is_none(Some(MISSING_VALUE)), None);
        assert_eq!(missing_is_none(Some(12)), Some(12));
        assert_eq!(missing_is_none(None), None);
    }

    #[test]
    fn library_version_from_api() {
        let version = LibraryVersion::from_api_version(23_802);
        assert_eq!(version, LibraryVersion::new(2, 38, 2));
        assert_eq!(version.to_string(), "2.38.2");
        assert!(LibraryVersion::new(2, 34, 1) < LibraryVersion::new(2, 35, 0));
    }

    #[test]
    fn dynamic_value_json_shape() -> anyhow::Result<()> {
        let values = vec![
            DynamicKeyType::Int(3),
            DynamicKeyType::Float(0.25),
            DynamicKeyType::Str("regular_ll".into()),
        ];
        let json = serde_json::to_string(&values)?;
        assert_eq!(json, r#"[3,0.25,"regular_ll"]"#);

        let back: Vec<DynamicKeyType> = serde_json::from_str(&json)?;
        assert_eq!(back, values);
        Ok(())
    }

    #[test]
    fn bytes_keep_their_variant() -> anyhow::Result<()> {
        let values = vec![
            DynamicKeyType::IntArray(vec![1, 2]),
            DynamicKeyType::Bytes(vec![1, 2]),
        ];
        let json = serde_json::to_string(&values)?;
        assert_eq!(json, r#"[[1,2],{"bytes":[1,2]}]"#);

        let back: Vec<DynamicKeyType> = serde_json::from_str(&json)?;
        assert_eq!(back, values);
        Ok(())
    }
}
