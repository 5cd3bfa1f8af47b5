//! Definition of `GribMetadata`, the facade through which the keys of a GRIB message
//! are read, dumped and overridden

mod datetime;
mod dump;
mod patch;
mod restricted;

pub use datetime::{datetime_from_grib, to_timedelta, CustomKey, CustomValue};
pub use dump::{DumpSelection, NamespaceDump, NamespaceSection, NAMESPACES};
pub use patch::{MetadataPatch, OverrideOptions};
pub use restricted::{RestrictedMetadata, ESCAPE_NAMESPACE, INTERNAL_KEYS, INTERNAL_NAMESPACES};

use bytes::Bytes;
use chrono::{Duration, NaiveDateTime};
use fallible_iterator::FallibleIterator;
use indexmap::IndexMap;
use std::{collections::BTreeMap, fmt::Debug};

use crate::{
    errors::CodesError,
    geography::Geography,
    gridspec::{make_gridspec, GridSpec},
    key_store::{DynamicKeyType, KeyRead, KeyStore},
};

/// Keys listed by [`GribMetadata::ls()`], in display order.
pub const LS_KEYS: [&str; 10] = [
    "centre",
    "shortName",
    "typeOfLevel",
    "level",
    "dataDate",
    "dataTime",
    "stepRange",
    "dataType",
    "number",
    "gridType",
];

/// Keys summarising a field in a description table.
pub const DESCRIBE_KEYS: [&str; 12] = [
    "shortName",
    "typeOfLevel",
    "level",
    "date",
    "time",
    "step",
    "number",
    "paramId",
    "marsClass",
    "marsStream",
    "marsType",
    "experimentVersionNumber",
];

/// Value returned for `shortName` when ecCodes cannot resolve the parameter.
const UNRESOLVED_SHORT_NAME: &str = "~";

/// Access to the handle wrapped by [`GribMetadata`].
///
/// Implemented by [`Borrowed`] and [`Owned`] only.
pub trait HandleAccess: Debug + Sized {
    type Store: KeyStore;

    /// Name of the metadata kind shown in dumps.
    const KIND: &'static str;

    fn store(&self) -> &Self::Store;

    /// The owned handle, `None` when the handle is borrowed.
    fn into_store(self) -> Option<Self::Store>;
}

/// Handle borrowed from the field that owns it.
#[derive(Debug)]
#[doc(hidden)]
pub struct Borrowed<'a, S: KeyStore>(&'a S);

/// Handle owned by the metadata.
#[derive(Debug)]
#[doc(hidden)]
pub struct Owned<S: KeyStore>(S);

impl<'a, S: KeyStore> HandleAccess for Borrowed<'a, S> {
    type Store = S;
    const KIND: &'static str = "FieldMetadata";

    fn store(&self) -> &S {
        self.0
    }

    fn into_store(self) -> Option<S> {
        None
    }
}

impl<S: KeyStore> HandleAccess for Owned<S> {
    type Store = S;
    const KIND: &'static str = "StandaloneMetadata";

    fn store(&self) -> &S {
        &self.0
    }

    fn into_store(self) -> Option<S> {
        Some(self.0)
    }
}

/// Base structure for [`FieldMetadata`] and [`StandaloneMetadata`] that provides access to
/// the keys of one GRIB message.
///
/// `FieldMetadata` borrows the handle of a field and has its lifetime tied to it.
///
/// `StandaloneMetadata` owns its handle, is created by [`override_with()`](GribMetadata::override_with)
/// and can be serialized with [`to_buffer()`](StandaloneMetadata::to_buffer).
///
/// All key lookups go through [`get()`](GribMetadata::get), which resolves the `param` and
/// `_param_id` aliases and replaces an unresolved `shortName` with the `paramId`.
/// Typed reads are provided by [`KeyRead`].
///
/// The metadata is never modified: [`override_with()`](GribMetadata::override_with) clones the
/// handle and returns new metadata.
#[derive(Debug)]
pub struct GribMetadata<H: HandleAccess> {
    handle: H,
}

/// [`GribMetadata`] borrowing the handle of a field.
pub type FieldMetadata<'a, S> = GribMetadata<Borrowed<'a, S>>;

/// [`GribMetadata`] owning its handle.
pub type StandaloneMetadata<S> = GribMetadata<Owned<S>>;

impl<'a, S: KeyStore> FieldMetadata<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            handle: Borrowed(store),
        }
    }

    /// Returns a [`RestrictedMetadata`] over a standalone copy of this metadata.
    ///
    /// # Errors
    ///
    /// Returns an error when the handle cannot be cloned.
    pub fn hide_internal_keys(&self) -> Result<RestrictedMetadata<S>, CodesError> {
        Ok(RestrictedMetadata::new(self.override_with(MetadataPatch::new())?))
    }
}

impl<S: KeyStore> StandaloneMetadata<S> {
    pub fn new(store: S) -> Self {
        Self {
            handle: Owned(store),
        }
    }

    /// Rebuilds metadata from bytes returned by [`to_buffer()`](StandaloneMetadata::to_buffer).
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes do not decode to a message.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self, CodesError> {
        Ok(Self::new(S::from_buffer(buffer)?))
    }

    /// Encoded message bytes of the owned handle.
    ///
    /// # Errors
    ///
    /// Returns an error when the message cannot be encoded.
    pub fn to_buffer(&self) -> Result<Bytes, CodesError> {
        self.store().get_buffer()
    }

    pub fn hide_internal_keys(self) -> RestrictedMetadata<S> {
        RestrictedMetadata::new(self)
    }

    pub fn into_store(self) -> S {
        self.handle.0
    }
}

impl<H: HandleAccess> GribMetadata<H> {
    pub(crate) fn store(&self) -> &H::Store {
        self.handle.store()
    }

    pub(crate) fn into_handle(self) -> H {
        self.handle
    }

    /// Reads the key, returning `None` when it is absent.
    ///
    /// `param` is read as `shortName` and `_param_id` as `paramId`. When `shortName` is
    /// `"~"` the `paramId` is returned as a string instead.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is defined but cannot be read.
    pub fn get(&self, key: &str) -> Result<Option<DynamicKeyType>, CodesError> {
        let key = match key {
            "param" => "shortName",
            "_param_id" => "paramId",
            _ => key,
        };

        let value = self.store().get(key)?;

        if key == "shortName" {
            if let Some(DynamicKeyType::Str(name)) = &value {
                if name == UNRESOLVED_SHORT_NAME {
                    let param_id: Option<String> = self.read_key_unaliased("paramId")?;
                    return Ok(param_id.map(DynamicKeyType::Str));
                }
            }
        }

        Ok(value)
    }

    fn read_key_unaliased(&self, key: &str) -> Result<Option<String>, CodesError> {
        match self.store().get(key)? {
            None => Ok(None),
            Some(value) => Ok(Some(value.to_string())),
        }
    }

    /// # Errors
    ///
    /// Returns an error when the message cannot be queried.
    pub fn contains(&self, key: &str) -> Result<bool, CodesError> {
        self.store().contains(key)
    }

    /// Names of all keys in the default namespace.
    ///
    /// # Errors
    ///
    /// Returns an error when the keys cannot be iterated.
    pub fn keys(&self) -> Result<Vec<String>, CodesError> {
        self.store().keys()
    }

    /// Number of keys in the default namespace.
    ///
    /// # Errors
    ///
    /// Returns an error when the keys cannot be iterated.
    pub fn len(&self) -> Result<usize, CodesError> {
        Ok(self.keys()?.len())
    }

    /// # Errors
    ///
    /// Returns an error when the keys cannot be iterated.
    pub fn is_empty(&self) -> Result<bool, CodesError> {
        Ok(self.len()? == 0)
    }

    /// Iterator over the keys of the default namespace and their values.
    ///
    /// Values are read lazily, so reading errors are returned by the iterator.
    ///
    /// # Errors
    ///
    /// Returns an error when the keys cannot be listed.
    pub fn items(&self) -> Result<MetadataItems<'_, H::Store>, CodesError> {
        Ok(MetadataItems {
            store: self.store(),
            keys: self.keys()?.into_iter(),
        })
    }

    pub fn namespaces(&self) -> Vec<&'static str> {
        NAMESPACES.to_vec()
    }

    /// Keys and values of `namespace`.
    ///
    /// `None`, `""` and `"default"` all return every key of the message.
    ///
    /// # Errors
    ///
    /// Returns an error when a key of the namespace cannot be read.
    pub fn as_namespace(
        &self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, DynamicKeyType>, CodesError> {
        let namespace = match namespace {
            None | Some("" | "default") => None,
            Some(ns) => Some(ns),
        };
        self.store().namespace_items(namespace)
    }

    /// Dumps the selected namespaces, skipping the empty ones.
    ///
    /// # Errors
    ///
    /// Returns an error when a key of a namespace cannot be read.
    pub fn dump(&self, selection: &DumpSelection) -> Result<NamespaceDump, CodesError> {
        let mut dump = NamespaceDump::new(H::KIND);
        for namespace in selection.resolve(&self.namespaces()) {
            let data = self.as_namespace(Some(&namespace))?;
            dump.push(&namespace, data);
        }
        Ok(dump)
    }

    /// Values of the [`LS_KEYS`], `None` for absent keys.
    ///
    /// # Errors
    ///
    /// Returns an error when a key cannot be read.
    pub fn ls(&self) -> Result<IndexMap<&'static str, Option<DynamicKeyType>>, CodesError> {
        LS_KEYS
            .iter()
            .map(|key| -> Result<_, CodesError> { Ok((*key, self.get(key)?)) })
            .collect()
    }

    pub fn describe_keys(&self) -> &'static [&'static str] {
        &DESCRIBE_KEYS
    }

    pub fn data_format(&self) -> &'static str {
        "grib"
    }

    fn datetime(&self, date_key: &str, time_key: &str) -> Result<Option<NaiveDateTime>, CodesError> {
        let Some(date) = self.read_key::<i64>(date_key)? else {
            return Ok(None);
        };
        let Some(time) = self.read_key::<i64>(time_key)? else {
            return Ok(None);
        };
        datetime_from_grib(date, time).map(Some)
    }

    /// Analysis or forecast start from `dataDate` and `dataTime`.
    ///
    /// # Errors
    ///
    /// Returns an error when the keys do not form a valid datetime.
    pub fn base_datetime(&self) -> Result<Option<NaiveDateTime>, CodesError> {
        self.datetime("dataDate", "dataTime")
    }

    /// # Errors
    ///
    /// Returns an error when the keys do not form a valid datetime.
    pub fn valid_datetime(&self) -> Result<Option<NaiveDateTime>, CodesError> {
        self.datetime("validityDate", "validityTime")
    }

    /// # Errors
    ///
    /// Returns an error when the keys do not form a valid datetime.
    pub fn reference_datetime(&self) -> Result<Option<NaiveDateTime>, CodesError> {
        self.datetime("referenceDate", "referenceTime")
    }

    /// # Errors
    ///
    /// Returns an error when the keys do not form a valid datetime.
    pub fn indexing_datetime(&self) -> Result<Option<NaiveDateTime>, CodesError> {
        self.datetime("indexingDate", "indexingTime")
    }

    /// # Errors
    ///
    /// Returns an error when `step` cannot be converted to a duration.
    pub fn step_timedelta(&self) -> Result<Option<Duration>, CodesError> {
        match self.get("step")? {
            None => Ok(None),
            Some(step) => to_timedelta(&step).map(Some),
        }
    }

    /// Computes the value of a [`CustomKey`]. Use [`CustomKey::from_name()`] to resolve names.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying accessor.
    pub fn custom(&self, key: CustomKey) -> Result<Option<CustomValue>, CodesError> {
        Ok(match key {
            CustomKey::ValidDatetime => self.valid_datetime()?.map(CustomValue::DateTime),
            CustomKey::BaseDatetime => self.base_datetime()?.map(CustomValue::DateTime),
            CustomKey::ReferenceDatetime => self.reference_datetime()?.map(CustomValue::DateTime),
            CustomKey::IndexingDatetime => self.indexing_datetime()?.map(CustomValue::DateTime),
            CustomKey::StepTimedelta => self.step_timedelta()?.map(CustomValue::TimeDelta),
            CustomKey::GridSpec => Some(CustomValue::GridSpec(self.gridspec()?)),
        })
    }

    /// [`GridSpec`] of the message.
    ///
    /// # Errors
    ///
    /// Returns an error when the grid type is not supported or its keys are incomplete.
    pub fn gridspec(&self) -> Result<GridSpec, CodesError> {
        make_gridspec(self)
    }

    /// Geometry accessor of the message.
    ///
    /// # Errors
    ///
    /// Returns [`CodesError::FeatureUnsupported`] when the library cannot compute
    /// the coordinates of the grid.
    pub fn geography(&self) -> Result<Geography<'_, H>, CodesError> {
        Geography::new(self)
    }
}

impl<H: HandleAccess> KeyRead for GribMetadata<H> {
    fn read_key_dynamic(&self, name: &str) -> Result<Option<DynamicKeyType>, CodesError> {
        self.get(name)
    }
}

/// [`FallibleIterator`] over the keys of a message and their values.
///
/// Keys removed between listing and reading are skipped.
#[derive(Debug)]
pub struct MetadataItems<'m, S: KeyStore> {
    store: &'m S,
    keys: std::vec::IntoIter<String>,
}

impl<S: KeyStore> FallibleIterator for MetadataItems<'_, S> {
    type Item = (String, DynamicKeyType);
    type Error = CodesError;

    fn next(&mut self) -> Result<Option<Self::Item>, Self::Error> {
        for key in self.keys.by_ref() {
            if let Some(value) = self.store.get(&key)? {
                return Ok(Some((key, value)));
            }
        }
        Ok(None)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.keys.len()))
    }
}
