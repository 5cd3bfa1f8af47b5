use bytes::Bytes;
use eccodes_sys::codes_handle;
use log::{debug, error};
use std::collections::BTreeMap;

use super::{DynamicKeyType, KeyStore, LibraryVersion};
use crate::{
    errors::CodesError,
    intermediate_bindings::{
        codes_get_api_version, codes_get_bytes, codes_get_double, codes_get_double_array,
        codes_get_long, codes_get_long_array, codes_get_message, codes_get_native_type,
        codes_get_size, codes_get_string, codes_handle_clone, codes_handle_delete,
        codes_handle_new_from_message_copy, codes_is_defined, codes_keys_iterator_delete,
        codes_keys_iterator_get_name, codes_keys_iterator_new, codes_keys_iterator_next,
        codes_set_bytes, codes_set_double, codes_set_double_array, codes_set_long,
        codes_set_long_array, codes_set_string, NativeKeyType,
    },
};

/// [`KeyStore`] backed by an ecCodes `codes_handle`.
///
/// The store owns the handle and deletes it on drop. It can be moved across threads
/// but not shared, as ecCodes handles are not safe for concurrent access.
#[derive(Debug)]
pub struct CodesKeyStore {
    handle: *mut codes_handle,
}

// the handle is exclusively owned by the store
unsafe impl Send for CodesKeyStore {}

impl CodesKeyStore {
    /// Takes ownership of a handle created by ecCodes.
    ///
    /// # Safety
    ///
    /// The handle must be valid and not owned by anything else, it is deleted
    /// when the store is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CodesError::NullPtr`] for a null handle.
    pub unsafe fn from_raw(handle: *mut codes_handle) -> Result<Self, CodesError> {
        if handle.is_null() {
            return Err(CodesError::NullPtr);
        }
        Ok(Self { handle })
    }

    fn key_names(&self, namespace: &str) -> Result<Vec<String>, CodesError> {
        let flags = eccodes_sys::CODES_KEYS_ITERATOR_SKIP_DUPLICATES as u32;
        let mut names = Vec::new();

        unsafe {
            let keys_iterator = codes_keys_iterator_new(self.handle, flags, namespace)?;

            let collected = (|| {
                while codes_keys_iterator_next(keys_iterator)? {
                    names.push(codes_keys_iterator_get_name(keys_iterator)?);
                }
                Ok::<(), CodesError>(())
            })();

            codes_keys_iterator_delete(keys_iterator)?;
            collected?;
        }

        Ok(names)
    }

    unsafe fn write(
        handle: *mut codes_handle,
        key: &str,
        value: &DynamicKeyType,
    ) -> Result<(), CodesError> {
        match value {
            DynamicKeyType::Int(v) => codes_set_long(handle, key, *v),
            DynamicKeyType::Float(v) => codes_set_double(handle, key, *v),
            DynamicKeyType::Str(v) => codes_set_string(handle, key, v),
            DynamicKeyType::IntArray(v) => codes_set_long_array(handle, key, v),
            DynamicKeyType::FloatArray(v) => codes_set_double_array(handle, key, v),
            DynamicKeyType::Bytes(v) => codes_set_bytes(handle, key, v),
        }
    }
}

impl KeyStore for CodesKeyStore {
    fn get(&self, key: &str) -> Result<Option<DynamicKeyType>, CodesError> {
        unsafe {
            if !codes_is_defined(self.handle, key)? {
                return Ok(None);
            }

            let value = match codes_get_native_type(self.handle, key)? {
                NativeKeyType::Long => {
                    if codes_get_size(self.handle, key)? > 1 {
                        DynamicKeyType::IntArray(codes_get_long_array(self.handle, key)?)
                    } else {
                        DynamicKeyType::Int(codes_get_long(self.handle, key)?)
                    }
                }
                NativeKeyType::Double => {
                    if codes_get_size(self.handle, key)? > 1 {
                        DynamicKeyType::FloatArray(codes_get_double_array(self.handle, key)?)
                    } else {
                        DynamicKeyType::Float(codes_get_double(self.handle, key)?)
                    }
                }
                NativeKeyType::Bytes => DynamicKeyType::Bytes(codes_get_bytes(self.handle, key)?),
                NativeKeyType::Missing => return Ok(None),
                _ => DynamicKeyType::Str(codes_get_string(self.handle, key)?),
            };

            Ok(Some(value))
        }
    }

    fn contains(&self, key: &str) -> Result<bool, CodesError> {
        unsafe { codes_is_defined(self.handle, key) }
    }

    fn keys(&self) -> Result<Vec<String>, CodesError> {
        self.key_names("")
    }

    fn namespace_items(
        &self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, DynamicKeyType>, CodesError> {
        let mut items = BTreeMap::new();

        for name in self.key_names(namespace.unwrap_or_default())? {
            if let Some(value) = self.get(&name)? {
                items.insert(name, value);
            }
        }

        Ok(items)
    }

    fn set(&mut self, key: &str, value: &DynamicKeyType) -> Result<(), CodesError> {
        unsafe { Self::write(self.handle, key, value) }
    }

    fn try_clone(&self, headers_only: bool) -> Result<Self, CodesError> {
        if headers_only {
            // eccodes-sys does not bind the headers-only clone
            debug!("headers-only clone requested, cloning the full message");
        }

        let handle = unsafe { codes_handle_clone(self.handle)? };
        Ok(Self { handle })
    }

    fn set_values(&mut self, values: &[f64]) -> Result<(), CodesError> {
        unsafe { codes_set_double_array(self.handle, "values", values) }
    }

    fn value_count(&self) -> Result<usize, CodesError> {
        unsafe { codes_get_size(self.handle, "values") }
    }

    fn get_buffer(&self) -> Result<Bytes, CodesError> {
        unsafe { codes_get_message(self.handle) }
    }

    fn from_buffer(buffer: &[u8]) -> Result<Self, CodesError> {
        let handle = unsafe { codes_handle_new_from_message_copy(buffer)? };
        Ok(Self { handle })
    }

    fn latitudes(&self) -> Result<Vec<f64>, CodesError> {
        unsafe { codes_get_double_array(self.handle, "latitudes") }
    }

    fn longitudes(&self) -> Result<Vec<f64>, CodesError> {
        unsafe { codes_get_double_array(self.handle, "longitudes") }
    }

    fn set_temporary(&self, key: &str, value: &DynamicKeyType) -> Result<(), CodesError> {
        unsafe { Self::write(self.handle, key, value) }
    }

    fn clear_temporary(&self, key: &str, restore: &DynamicKeyType) -> Result<(), CodesError> {
        // keys cannot be undefined in a handle
        unsafe { Self::write(self.handle, key, restore) }
    }

    fn library_version(&self) -> LibraryVersion {
        let version = u32::try_from(codes_get_api_version()).unwrap_or_default();
        LibraryVersion::from_api_version(version)
    }
}

impl Drop for CodesKeyStore {
    fn drop(&mut self) {
        unsafe {
            codes_handle_delete(self.handle).unwrap_or_else(|error| {
                error!("codes_handle_delete() returned an error: {:?}", &error);
            });
        }

        self.handle = std::ptr::null_mut();
    }
}
