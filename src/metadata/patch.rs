use log::debug;

use super::{GribMetadata, HandleAccess, StandaloneMetadata};
use crate::{
    errors::CodesError,
    gridspec::{GridSpec, GridSpecConverter},
    key_store::{DynamicKeyType, KeyPatch, KeyRead, KeyStore},
};

/// Key set only partially carried by a headers-only clone.
const VALUE_PRECISION_KEY: &str = "bitsPerValue";

/// Changes applied by [`GribMetadata::override_with()`].
///
/// Holds raw GRIB keys and, optionally, a new [`GridSpec`] and the GRIB edition to
/// encode it in. Keys are written in insertion order.
///
/// ```
/// # use eccodes_metadata::{Grid, GridSpec, GridType, MetadataPatch};
/// let patch = MetadataPatch::new()
///     .key("shortName", "2d")
///     .gridspec(GridSpec::new(GridType::ReducedGg, Grid::Name("O32".into())))
///     .edition(2);
/// assert!(!patch.is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataPatch {
    keys: KeyPatch,
    gridspec: Option<GridSpec>,
    edition: Option<i64>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key<V: Into<DynamicKeyType>>(mut self, key: &str, value: V) -> Self {
        self.keys.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn gridspec(mut self, gridspec: GridSpec) -> Self {
        self.gridspec = Some(gridspec);
        self
    }

    /// GRIB edition of the new message. The GridSpec is encoded for this edition and
    /// `edition` is written first.
    #[must_use]
    pub fn edition(mut self, edition: i64) -> Self {
        self.edition = Some(edition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.gridspec.is_none() && self.edition.is_none()
    }
}

impl From<KeyPatch> for MetadataPatch {
    fn from(keys: KeyPatch) -> Self {
        Self {
            keys,
            ..Self::default()
        }
    }
}

/// Options of [`GribMetadata::override_with_options()`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OverrideOptions {
    /// Clone only the message headers, without the value buffer.
    pub headers_only_clone: bool,
}

impl Default for OverrideOptions {
    fn default() -> Self {
        Self {
            headers_only_clone: true,
        }
    }
}

impl<H: HandleAccess> GribMetadata<H> {
    /// Returns new standalone metadata with the patch applied to a headers-only
    /// clone of the handle.
    ///
    /// See [`override_with_options()`](GribMetadata::override_with_options).
    ///
    /// # Errors
    ///
    /// Same as [`override_with_options()`](GribMetadata::override_with_options).
    pub fn override_with(
        &self,
        patch: MetadataPatch,
    ) -> Result<StandaloneMetadata<H::Store>, CodesError> {
        self.override_with_options(patch, OverrideOptions::default())
    }

    /// Returns new standalone metadata with the patch applied to a clone of the handle.
    /// This metadata is not modified.
    ///
    /// A GridSpec in the patch is converted to keys for the patch edition, or the
    /// edition of this message. Keys from the GridSpec take precedence over raw keys of the patch.
    /// When the new grid has a known number of points, the value buffer of the clone is
    /// replaced by zeros of that length.
    ///
    /// # Errors
    ///
    /// - When the GridSpec cannot be converted
    /// - When the handle cannot be cloned or a key cannot be written
    /// - [`CodesError::ValueSizeMismatch`] when the clone does not hold the expected number of values
    pub fn override_with_options(
        &self,
        patch: MetadataPatch,
        options: OverrideOptions,
    ) -> Result<StandaloneMetadata<H::Store>, CodesError> {
        let MetadataPatch {
            keys,
            gridspec,
            edition,
        } = patch;

        let mut merged = KeyPatch::new();
        if let Some(edition) = edition {
            merged.insert("edition".into(), edition.into());
        }

        let mut new_value_size = None;
        if let Some(gridspec) = gridspec {
            let edition = match edition {
                Some(edition) => edition,
                None => self.require_key("edition")?,
            };
            let (grid_keys, size) = GridSpecConverter::to_metadata(&gridspec, edition)?;
            merged.extend(grid_keys);
            new_value_size = size;
        }

        for (key, value) in keys {
            merged.entry(key).or_insert(value);
        }

        let mut store = self.store().try_clone(options.headers_only_clone)?;
        debug!(
            "cloned handle, headers_only={}, applying {} keys",
            options.headers_only_clone,
            merged.len()
        );

        if !merged.contains_key(VALUE_PRECISION_KEY) {
            self.copy_key(&mut store, VALUE_PRECISION_KEY)?;
        }

        if !merged.is_empty() {
            store.set_many(&merged)?;
        }

        if let Some(size) = new_value_size.filter(|size| *size > 0) {
            debug!("resizing value buffer to {size}");
            store.set_values(&vec![0.0; size])?;

            let actual = store.value_count()?;
            if actual != size {
                return Err(CodesError::ValueSizeMismatch {
                    expected: size,
                    actual,
                });
            }
        }

        Ok(StandaloneMetadata::new(store))
    }

    /// Writes the value of `key` to `target` when both have it and the values differ.
    fn copy_key(&self, target: &mut H::Store, key: &str) -> Result<(), CodesError> {
        let original = self.store().get(key)?;
        let cloned = target.get(key)?;

        if let (Some(original), Some(cloned)) = (original, cloned) {
            if original != cloned {
                debug!("restoring {key}={original} in clone");
                target.set(key, &original)?;
            }
        }
        Ok(())
    }
}
