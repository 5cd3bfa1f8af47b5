use log::error;

use super::{DynamicKeyType, KeyStore};
use crate::errors::CodesError;

/// Guard holding a temporary key value on a [`KeyStore`].
///
/// The previous value of the key is recorded on construction and written back when
/// the guard is dropped, on every exit path. Keys not defined before the guard was
/// created stay undefined in stores that can drop them, and are reset to `fallback`
/// otherwise.
///
/// The guard is not reentrant: two guards on the same key and store interleave
/// their restores.
#[derive(Debug)]
pub struct TemporaryKey<'s, S: KeyStore> {
    store: &'s S,
    key: String,
    restore: DynamicKeyType,
}

impl<'s, S: KeyStore> TemporaryKey<'s, S> {
    /// Sets `key` to `value` until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when the previous value cannot be read or the new one written.
    pub fn set(
        store: &'s S,
        key: &str,
        value: DynamicKeyType,
        fallback: DynamicKeyType,
    ) -> Result<Self, CodesError> {
        let restore = store.get(key)?.unwrap_or(fallback);
        store.set_temporary(key, &value)?;

        Ok(Self {
            store,
            key: key.to_owned(),
            restore,
        })
    }
}

impl<S: KeyStore> Drop for TemporaryKey<'_, S> {
    fn drop(&mut self) {
        self.store
            .clear_temporary(&self.key, &self.restore)
            .unwrap_or_else(|error| {
                error!(
                    "restoring temporary key {} returned an error: {:?}",
                    self.key, &error
                );
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_store::MemoryKeyStore;
    use anyhow::Result;

    #[test]
    fn restores_previous_value() -> Result<()> {
        let store = MemoryKeyStore::new().with_key("iteratorDisableUnrotate", 0);

        {
            let _guard = TemporaryKey::set(
                &store,
                "iteratorDisableUnrotate",
                1.into(),
                0.into(),
            )?;
            assert_eq!(
                store.get("iteratorDisableUnrotate")?,
                Some(DynamicKeyType::Int(1))
            );
        }

        assert_eq!(
            store.get("iteratorDisableUnrotate")?,
            Some(DynamicKeyType::Int(0))
        );
        Ok(())
    }

    #[test]
    fn restores_on_error_path() -> Result<()> {
        let store = MemoryKeyStore::new();

        let failing = || -> Result<(), CodesError> {
            let _guard = TemporaryKey::set(&store, "iteratorDisableUnrotate", 1.into(), 0.into())?;
            Err(CodesError::MissingKey("latitudes".into()))
        };

        assert!(failing().is_err());
        assert!(!store.contains("iteratorDisableUnrotate")?);
        Ok(())
    }

    #[test]
    fn undefined_key_stays_undefined() -> Result<()> {
        let store = MemoryKeyStore::new().with_key("gridType", "rotated_ll");

        {
            let _guard = TemporaryKey::set(
                &store,
                "iteratorDisableUnrotate",
                1.into(),
                0.into(),
            )?;
            assert!(store.contains("iteratorDisableUnrotate")?);
        }

        assert!(!store.contains("iteratorDisableUnrotate")?);
        assert_eq!(store.get("iteratorDisableUnrotate")?, None);
        assert_eq!(store.keys()?, vec!["gridType".to_owned()]);
        Ok(())
    }
}
