use fallible_iterator::FallibleIterator;
use std::collections::BTreeMap;

use super::{
    CustomKey, CustomValue, DumpSelection, GribMetadata, HandleAccess, MetadataItems,
    MetadataPatch, NamespaceDump, StandaloneMetadata,
};
use crate::{
    errors::CodesError,
    geography::Geography,
    gridspec::GridSpec,
    key_store::{DynamicKeyType, KeyRead, KeyStore},
};

/// Namespace prefix giving access to hidden keys, eg. `grib.values`.
pub const ESCAPE_NAMESPACE: &str = "grib";

/// Keys hidden by [`RestrictedMetadata`].
///
/// `bitsPerValue` is not hidden as it must survive an override.
pub const INTERNAL_KEYS: [&str; 24] = [
    "minimum",
    "maximum",
    "average",
    "standardDeviation",
    "skewness",
    "kurtosis",
    "min",
    "max",
    "avg",
    "sd",
    "skew",
    "kurt",
    "const",
    "isConstant",
    "numberOfMissing",
    "numberOfCodedValues",
    "bitmapPresent",
    "offsetValuesBy",
    "packingError",
    "referenceValue",
    "referenceValueError",
    "unpackedError",
    "values",
    "latLonValues",
];

/// Namespaces hidden by [`RestrictedMetadata`].
pub const INTERNAL_NAMESPACES: [&str; 1] = ["statistics"];

fn is_internal_key(name: &str) -> bool {
    INTERNAL_KEYS.contains(&name)
}

fn is_internal_namespace(namespace: &str) -> bool {
    INTERNAL_NAMESPACES.contains(&namespace)
}

/// [`StandaloneMetadata`] with its internal keys and namespaces hidden.
///
/// Hidden keys behave as absent, whether requested by name or through a namespace
/// (`statistics.max`). They are only reachable through the [`ESCAPE_NAMESPACE`]:
///
/// ```
/// # use eccodes_metadata::{MemoryKeyStore, StandaloneMetadata, DynamicKeyType};
/// # fn main() -> anyhow::Result<()> {
/// let store = MemoryKeyStore::new()
///     .with_key("shortName", "2t")
///     .with_key("max", 311.5);
/// let restricted = StandaloneMetadata::new(store).hide_internal_keys();
///
/// assert_eq!(restricted.get("max")?, None);
/// assert_eq!(restricted.get("grib.max")?, Some(DynamicKeyType::Float(311.5)));
/// # Ok(())
/// # }
/// ```
///
/// Only standalone metadata can be restricted, so a restricted view is always
/// independently serializable.
#[derive(Debug)]
pub struct RestrictedMetadata<S: KeyStore> {
    metadata: StandaloneMetadata<S>,
}

impl<S: KeyStore> RestrictedMetadata<S> {
    pub fn new(metadata: StandaloneMetadata<S>) -> Self {
        Self { metadata }
    }

    /// Restricts metadata of any kind that owns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`CodesError::NotStandalone`] when the metadata borrows its handle.
    pub fn try_from_metadata<H: HandleAccess<Store = S>>(
        metadata: GribMetadata<H>,
    ) -> Result<Self, CodesError> {
        metadata
            .into_handle()
            .into_store()
            .map(|store| Self::new(StandaloneMetadata::new(store)))
            .ok_or(CodesError::NotStandalone)
    }

    /// Reads a key that is not hidden, or any key prefixed with [`ESCAPE_NAMESPACE`].
    ///
    /// # Errors
    ///
    /// Returns the error of [`GribMetadata::get()`].
    pub fn get(&self, key: &str) -> Result<Option<DynamicKeyType>, CodesError> {
        match key.split_once('.') {
            Some((ESCAPE_NAMESPACE, name)) => self.metadata.get(name),
            Some((_, name)) if is_internal_key(name) => Ok(None),
            None if is_internal_key(key) => Ok(None),
            _ => self.metadata.get(key),
        }
    }

    fn is_hidden(key: &str) -> bool {
        match key.split_once('.') {
            Some((ESCAPE_NAMESPACE, _)) => false,
            Some((_, name)) => is_internal_key(name),
            None => is_internal_key(key),
        }
    }

    /// # Errors
    ///
    /// Returns an error when the message cannot be queried.
    pub fn contains(&self, key: &str) -> Result<bool, CodesError> {
        match key.split_once('.') {
            Some((ESCAPE_NAMESPACE, name)) => self.metadata.contains(name),
            _ if Self::is_hidden(key) => Ok(false),
            _ => self.metadata.contains(key),
        }
    }

    /// Names of the keys of the default namespace that are not hidden.
    ///
    /// # Errors
    ///
    /// Returns an error when the keys cannot be iterated.
    pub fn keys(&self) -> Result<Vec<String>, CodesError> {
        Ok(self
            .metadata
            .keys()?
            .into_iter()
            .filter(|k| !Self::is_hidden(k))
            .collect())
    }

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

    /// Same as [`GribMetadata::items()`] without the hidden keys.
    ///
    /// # Errors
    ///
    /// Returns an error when the keys cannot be listed.
    pub fn items(
        &self,
    ) -> Result<
        impl FallibleIterator<Item = (String, DynamicKeyType), Error = CodesError> + '_,
        CodesError,
    > {
        let items: MetadataItems<'_, S> = self.metadata.items()?;
        Ok(items.filter(|(key, _)| Ok(!Self::is_hidden(key))))
    }

    pub fn namespaces(&self) -> Vec<&'static str> {
        self.metadata
            .namespaces()
            .into_iter()
            .filter(|ns| !is_internal_namespace(ns))
            .collect()
    }

    /// Same as [`GribMetadata::as_namespace()`]. Hidden namespaces are empty and
    /// hidden keys are removed from the others.
    ///
    /// # Errors
    ///
    /// Returns an error when a key of the namespace cannot be read.
    pub fn as_namespace(
        &self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, DynamicKeyType>, CodesError> {
        if namespace.is_some_and(is_internal_namespace) {
            return Ok(BTreeMap::new());
        }

        let mut items = self.metadata.as_namespace(namespace)?;
        items.retain(|key, _| !is_internal_key(key));
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns an error when a key of a namespace cannot be read.
    pub fn dump(&self, selection: &DumpSelection) -> Result<NamespaceDump, CodesError> {
        let mut dump = NamespaceDump::new("RestrictedMetadata");
        for namespace in selection.resolve(&self.namespaces()) {
            let data = self.as_namespace(Some(&namespace))?;
            dump.push(&namespace, data);
        }
        Ok(dump)
    }

    /// Overrides the wrapped metadata, keeping the restriction on the result.
    ///
    /// # Errors
    ///
    /// Same as [`GribMetadata::override_with()`].
    pub fn override_with(&self, patch: MetadataPatch) -> Result<Self, CodesError> {
        Ok(Self::new(self.metadata.override_with(patch)?))
    }

    pub fn hide_internal_keys(self) -> Self {
        self
    }

    /// # Errors
    ///
    /// Returns an error when the message cannot be encoded.
    pub fn to_buffer(&self) -> Result<bytes::Bytes, CodesError> {
        self.metadata.to_buffer()
    }

    /// # Errors
    ///
    /// Returns an error when the bytes do not decode to a message.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self, CodesError> {
        Ok(Self::new(StandaloneMetadata::from_buffer(buffer)?))
    }

    /// # Errors
    ///
    /// Same as [`GribMetadata::gridspec()`].
    pub fn gridspec(&self) -> Result<GridSpec, CodesError> {
        self.metadata.gridspec()
    }

    /// # Errors
    ///
    /// Same as [`GribMetadata::geography()`].
    pub fn geography(&self) -> Result<Geography<'_, super::Owned<S>>, CodesError> {
        self.metadata.geography()
    }

    /// # Errors
    ///
    /// Same as [`GribMetadata::custom()`].
    pub fn custom(&self, key: CustomKey) -> Result<Option<CustomValue>, CodesError> {
        self.metadata.custom(key)
    }

    pub fn data_format(&self) -> &'static str {
        self.metadata.data_format()
    }
}

impl<S: KeyStore> KeyRead for RestrictedMetadata<S> {
    fn read_key_dynamic(&self, name: &str) -> Result<Option<DynamicKeyType>, CodesError> {
        self.get(name)
    }
}
