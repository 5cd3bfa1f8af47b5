#![allow(clippy::module_name_repetitions)]

use std::{ffi::CStr, ptr, slice};

use bytes::Bytes;
use eccodes_sys::codes_handle;
use libc::{c_char, c_void};
use num_traits::FromPrimitive;

use crate::{errors::CodesError, pointer_guard};

use super::{c_string, check_code, NativeKeyType};

pub unsafe fn codes_is_defined(handle: *mut codes_handle, key: &str) -> Result<bool, CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;

    Ok(eccodes_sys::codes_is_defined(handle, key.as_ptr()) == 1)
}

pub unsafe fn codes_get_native_type(
    handle: *mut codes_handle,
    key: &str,
) -> Result<NativeKeyType, CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;
    let mut key_type: i32 = 0;

    let error_code = eccodes_sys::codes_get_native_type(handle, key.as_ptr(), &mut key_type);
    check_code(error_code)?;

    Ok(FromPrimitive::from_i32(key_type).unwrap_or(NativeKeyType::Undefined))
}

pub unsafe fn codes_get_size(handle: *mut codes_handle, key: &str) -> Result<usize, CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;
    let mut key_size: usize = 0;

    let error_code = eccodes_sys::codes_get_size(handle, key.as_ptr(), &mut key_size);
    check_code(error_code)?;

    Ok(key_size)
}

pub unsafe fn codes_get_long(handle: *mut codes_handle, key: &str) -> Result<i64, CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;
    let mut key_value: i64 = 0;

    let error_code = eccodes_sys::codes_get_long(handle, key.as_ptr(), &mut key_value);
    check_code(error_code)?;

    Ok(key_value)
}

pub unsafe fn codes_get_double(handle: *mut codes_handle, key: &str) -> Result<f64, CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;
    let mut key_value: f64 = 0.0;

    let error_code = eccodes_sys::codes_get_double(handle, key.as_ptr(), &mut key_value);
    check_code(error_code)?;

    Ok(key_value)
}

pub unsafe fn codes_get_double_array(
    handle: *mut codes_handle,
    key: &str,
) -> Result<Vec<f64>, CodesError> {
    pointer_guard::non_null!(handle);

    let mut key_size = codes_get_size(handle, key)?;
    let key = c_string(key)?;

    let mut key_values: Vec<f64> = vec![0.0; key_size];

    let error_code = eccodes_sys::codes_get_double_array(
        handle,
        key.as_ptr(),
        key_values.as_mut_ptr(),
        &mut key_size,
    );
    check_code(error_code)?;

    key_values.truncate(key_size);
    Ok(key_values)
}

pub unsafe fn codes_get_long_array(
    handle: *mut codes_handle,
    key: &str,
) -> Result<Vec<i64>, CodesError> {
    pointer_guard::non_null!(handle);

    let mut key_size = codes_get_size(handle, key)?;
    let key = c_string(key)?;

    let mut key_values: Vec<i64> = vec![0; key_size];

    let error_code = eccodes_sys::codes_get_long_array(
        handle,
        key.as_ptr(),
        key_values.as_mut_ptr(),
        &mut key_size,
    );
    check_code(error_code)?;

    key_values.truncate(key_size);
    Ok(key_values)
}

unsafe fn codes_get_length(handle: *mut codes_handle, key: &str) -> Result<usize, CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;
    let mut key_length: usize = 0;

    let error_code = eccodes_sys::codes_get_length(handle, key.as_ptr(), &mut key_length);
    check_code(error_code)?;

    Ok(key_length)
}

pub unsafe fn codes_get_string(handle: *mut codes_handle, key: &str) -> Result<String, CodesError> {
    pointer_guard::non_null!(handle);

    let mut key_length = codes_get_length(handle, key)?;
    let key = c_string(key)?;

    let mut key_message: Vec<u8> = vec![0; key_length];

    let error_code = eccodes_sys::codes_get_string(
        handle,
        key.as_ptr(),
        key_message.as_mut_ptr().cast::<c_char>(),
        &mut key_length,
    );
    check_code(error_code)?;

    key_message.truncate(key_length);
    if key_message.last() != Some(&0) {
        key_message.push(0);
    }

    let key_message_cstr = CStr::from_bytes_with_nul(key_message.as_ref())?;

    Ok(key_message_cstr.to_str()?.to_string())
}

pub unsafe fn codes_get_bytes(handle: *mut codes_handle, key: &str) -> Result<Vec<u8>, CodesError> {
    pointer_guard::non_null!(handle);

    let mut key_size = codes_get_length(handle, key)?;
    let key = c_string(key)?;

    let mut buffer: Vec<u8> = vec![0; key_size];

    let error_code =
        eccodes_sys::codes_get_bytes(handle, key.as_ptr(), buffer.as_mut_ptr(), &mut key_size);
    check_code(error_code)?;

    buffer.truncate(key_size);
    Ok(buffer)
}

/// Copies the encoded message out of the handle.
pub unsafe fn codes_get_message(handle: *mut codes_handle) -> Result<Bytes, CodesError> {
    pointer_guard::non_null!(handle);

    let mut message_ptr: *const c_void = ptr::null();
    let mut message_size: usize = 0;

    let error_code = eccodes_sys::codes_get_message(handle, &mut message_ptr, &mut message_size);
    check_code(error_code)?;

    if message_ptr.is_null() {
        return Err(CodesError::NullPtr);
    }

    // the buffer is owned by the handle, copy it before the handle is modified
    let message = slice::from_raw_parts(message_ptr.cast::<u8>(), message_size);

    Ok(Bytes::copy_from_slice(message))
}

pub fn codes_get_api_version() -> i64 {
    i64::from(unsafe { eccodes_sys::codes_get_api_version() })
}
