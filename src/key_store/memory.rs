use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

use super::{DynamicKeyType, KeyStore, LibraryVersion};
use crate::errors::CodesError;

/// Keys belonging to the data section, which a headers-only clone does not carry.
const DATA_SECTION_KEYS: [&str; 2] = ["values", "numberOfValues"];

/// Keys of the grid definition, dropped when `gridType` changes.
///
/// Scanning mode and shape of the earth are shared by all grid definitions and kept.
const GRID_DEFINITION_KEYS: [&str; 38] = [
    "numberOfDataPoints",
    "Ni",
    "Nj",
    "Nx",
    "Ny",
    "N",
    "isOctahedral",
    "pl",
    "global",
    "gridName",
    "md5GridSection",
    "projTargetString",
    "numberOfPointsAlongAParallel",
    "numberOfPointsAlongAMeridian",
    "iDirectionIncrementInDegrees",
    "jDirectionIncrementInDegrees",
    "DxInDegrees",
    "DyInDegrees",
    "DxInMetres",
    "DyInMetres",
    "DiInMetres",
    "DjInMetres",
    "xDirectionGridLengthInMetres",
    "yDirectionGridLengthInMetres",
    "latitudeOfFirstGridPointInDegrees",
    "longitudeOfFirstGridPointInDegrees",
    "latitudeOfLastGridPointInDegrees",
    "longitudeOfLastGridPointInDegrees",
    "latitudeOfSouthernPoleInDegrees",
    "longitudeOfSouthernPoleInDegrees",
    "angleOfRotationInDegrees",
    "LaDInDegrees",
    "LoVInDegrees",
    "Latin1InDegrees",
    "Latin2InDegrees",
    "orientationOfTheGridInDegrees",
    "standardParallelInDegrees",
    "centralLongitudeInDegrees",
];

/// In-memory [`KeyStore`] holding key values, namespaces and gridpoint coordinates.
///
/// It behaves like an ecCodes handle for everything this crate needs:
///
/// - a headers-only clone drops the value buffer and resets `bitsPerValue` to `0`,
/// - setting a different `gridType` drops the keys of the previous grid definition,
/// - setting the values updates `numberOfValues` and `numberOfDataPoints`,
/// - `namespace.key` lookups resolve through the registered namespaces,
/// - the coordinate iterator returns the native (rotated frame) coordinates when
///   `iteratorDisableUnrotate` is `1` and such coordinates were provided,
/// - the message buffer is the JSON encoding of the store.
///
/// Temporary keys live in a [`RefCell`], so the store is not `Sync`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryKeyStore {
    entries: BTreeMap<String, DynamicKeyType>,
    namespaces: BTreeMap<String, Vec<String>>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    native_coordinates: Option<(Vec<f64>, Vec<f64>)>,
    version: Option<LibraryVersion>,
    #[serde(skip)]
    temporary: RefCell<BTreeMap<String, DynamicKeyType>>,
}

impl MemoryKeyStore {
    /// Version reported when none was set with [`with_library_version()`](MemoryKeyStore::with_library_version).
    pub const DEFAULT_VERSION: LibraryVersion = LibraryVersion::new(2, 38, 0);

    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_key<V: Into<DynamicKeyType>>(mut self, key: &str, value: V) -> Self {
        self.entries.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: &str, keys: &[&str]) -> Self {
        self.namespaces.insert(
            namespace.to_owned(),
            keys.iter().map(|k| (*k).to_owned()).collect(),
        );
        self
    }

    /// Coordinates returned by the iterator in its default (geographic) mode.
    #[must_use]
    pub fn with_coordinates(mut self, latitudes: Vec<f64>, longitudes: Vec<f64>) -> Self {
        self.latitudes = latitudes;
        self.longitudes = longitudes;
        self
    }

    /// Coordinates returned by the iterator when `iteratorDisableUnrotate` is `1`.
    #[must_use]
    pub fn with_native_coordinates(mut self, latitudes: Vec<f64>, longitudes: Vec<f64>) -> Self {
        self.native_coordinates = Some((latitudes, longitudes));
        self
    }

    #[must_use]
    pub fn with_library_version(mut self, version: LibraryVersion) -> Self {
        self.version = Some(version);
        self
    }

    fn lookup(&self, key: &str) -> Option<DynamicKeyType> {
        if let Some(value) = self.temporary.borrow().get(key) {
            return Some(value.clone());
        }

        if let Some(value) = self.entries.get(key) {
            return Some(value.clone());
        }

        let (namespace, name) = key.split_once('.')?;
        let members = self.namespaces.get(namespace)?;
        if members.iter().any(|m| m == name) {
            self.entries.get(name).cloned()
        } else {
            None
        }
    }

    fn unrotate_disabled(&self) -> bool {
        matches!(
            self.lookup("iteratorDisableUnrotate"),
            Some(DynamicKeyType::Int(1))
        )
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, key: &str) -> Result<Option<DynamicKeyType>, CodesError> {
        Ok(self.lookup(key))
    }

    fn keys(&self) -> Result<Vec<String>, CodesError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn namespace_items(
        &self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, DynamicKeyType>, CodesError> {
        let Some(namespace) = namespace else {
            return Ok(self.entries.clone());
        };

        // unknown namespaces are empty, as in ecCodes
        let Some(members) = self.namespaces.get(namespace) else {
            return Ok(BTreeMap::new());
        };

        Ok(members
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    fn set(&mut self, key: &str, value: &DynamicKeyType) -> Result<(), CodesError> {
        if key == "gridType" && self.entries.get(key) != Some(value) {
            for grid_key in GRID_DEFINITION_KEYS {
                self.entries.remove(grid_key);
            }
        }

        self.entries.insert(key.to_owned(), value.clone());
        Ok(())
    }

    fn try_clone(&self, headers_only: bool) -> Result<Self, CodesError> {
        let mut clone = Self {
            entries: self.entries.clone(),
            namespaces: self.namespaces.clone(),
            latitudes: self.latitudes.clone(),
            longitudes: self.longitudes.clone(),
            native_coordinates: self.native_coordinates.clone(),
            version: self.version,
            temporary: RefCell::default(),
        };

        if headers_only {
            for key in DATA_SECTION_KEYS {
                clone.entries.remove(key);
            }
            if let Some(bits) = clone.entries.get_mut("bitsPerValue") {
                *bits = DynamicKeyType::Int(0);
            }
        }

        Ok(clone)
    }

    fn set_values(&mut self, values: &[f64]) -> Result<(), CodesError> {
        self.entries.insert(
            "values".to_owned(),
            DynamicKeyType::FloatArray(values.to_vec()),
        );
        let count = DynamicKeyType::Int(i64::try_from(values.len()).unwrap_or(i64::MAX));
        self.entries.insert("numberOfValues".to_owned(), count.clone());
        self.entries.insert("numberOfDataPoints".to_owned(), count);
        Ok(())
    }

    fn value_count(&self) -> Result<usize, CodesError> {
        match self.entries.get("values") {
            Some(DynamicKeyType::FloatArray(values)) => Ok(values.len()),
            Some(DynamicKeyType::IntArray(values)) => Ok(values.len()),
            Some(_) => Err(CodesError::WrongRequestedKeyType {
                key: "values".to_owned(),
                requested: "Vec<f64>",
            }),
            None => Ok(0),
        }
    }

    fn get_buffer(&self) -> Result<Bytes, CodesError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    fn from_buffer(buffer: &[u8]) -> Result<Self, CodesError> {
        Ok(serde_json::from_slice(buffer)?)
    }

    fn latitudes(&self) -> Result<Vec<f64>, CodesError> {
        match &self.native_coordinates {
            Some((lats, _)) if self.unrotate_disabled() => Ok(lats.clone()),
            _ => Ok(self.latitudes.clone()),
        }
    }

    fn longitudes(&self) -> Result<Vec<f64>, CodesError> {
        match &self.native_coordinates {
            Some((_, lons)) if self.unrotate_disabled() => Ok(lons.clone()),
            _ => Ok(self.longitudes.clone()),
        }
    }

    fn set_temporary(&self, key: &str, value: &DynamicKeyType) -> Result<(), CodesError> {
        self.temporary
            .borrow_mut()
            .insert(key.to_owned(), value.clone());
        Ok(())
    }

    fn clear_temporary(&self, key: &str, _restore: &DynamicKeyType) -> Result<(), CodesError> {
        // entries still hold the value from before the temporary one
        self.temporary.borrow_mut().remove(key);
        Ok(())
    }

    fn library_version(&self) -> LibraryVersion {
        self.version.unwrap_or(Self::DEFAULT_VERSION)
    }
}
