use std::ffi::CStr;

use eccodes_sys::{codes_handle, codes_keys_iterator};

use crate::{errors::CodesError, pointer_guard};

use super::{c_string, check_code};

pub unsafe fn codes_keys_iterator_new(
    handle: *mut codes_handle,
    flags: u32,
    namespace: &str,
) -> Result<*mut codes_keys_iterator, CodesError> {
    pointer_guard::non_null!(handle);

    let namespace = c_string(namespace)?;

    let kiter = eccodes_sys::codes_keys_iterator_new(handle, u64::from(flags), namespace.as_ptr());

    if kiter.is_null() {
        return Err(CodesError::NullPtr);
    }

    Ok(kiter)
}

pub unsafe fn codes_keys_iterator_delete(
    keys_iterator: *mut codes_keys_iterator,
) -> Result<(), CodesError> {
    if keys_iterator.is_null() {
        return Ok(());
    }

    let error_code = eccodes_sys::codes_keys_iterator_delete(keys_iterator);
    check_code(error_code)
}

pub unsafe fn codes_keys_iterator_next(
    keys_iterator: *mut codes_keys_iterator,
) -> Result<bool, CodesError> {
    pointer_guard::non_null!(keys_iterator);

    let next_item_exists = eccodes_sys::codes_keys_iterator_next(keys_iterator);

    Ok(next_item_exists == 1)
}

pub unsafe fn codes_keys_iterator_get_name(
    keys_iterator: *mut codes_keys_iterator,
) -> Result<String, CodesError> {
    pointer_guard::non_null!(keys_iterator);

    let name_pointer = eccodes_sys::codes_keys_iterator_get_name(keys_iterator);
    if name_pointer.is_null() {
        return Err(CodesError::NullPtr);
    }

    let name_c_str = CStr::from_ptr(name_pointer);
    let name_str = name_c_str.to_str()?;

    Ok(name_str.to_owned())
}
