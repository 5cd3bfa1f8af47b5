#![allow(clippy::module_name_repetitions)]

use eccodes_sys::codes_handle;

use crate::{errors::CodesError, pointer_guard};

use super::{c_string, check_code};

pub unsafe fn codes_set_long(
    handle: *mut codes_handle,
    key: &str,
    value: i64,
) -> Result<(), CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;

    let error_code = eccodes_sys::codes_set_long(handle, key.as_ptr(), value);
    check_code(error_code)
}

pub unsafe fn codes_set_double(
    handle: *mut codes_handle,
    key: &str,
    value: f64,
) -> Result<(), CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;

    let error_code = eccodes_sys::codes_set_double(handle, key.as_ptr(), value);
    check_code(error_code)
}

pub unsafe fn codes_set_long_array(
    handle: *mut codes_handle,
    key: &str,
    values: &[i64],
) -> Result<(), CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;

    let error_code =
        eccodes_sys::codes_set_long_array(handle, key.as_ptr(), values.as_ptr(), values.len());
    check_code(error_code)
}

pub unsafe fn codes_set_double_array(
    handle: *mut codes_handle,
    key: &str,
    values: &[f64],
) -> Result<(), CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;

    let error_code =
        eccodes_sys::codes_set_double_array(handle, key.as_ptr(), values.as_ptr(), values.len());
    check_code(error_code)
}

pub unsafe fn codes_set_string(
    handle: *mut codes_handle,
    key: &str,
    value: &str,
) -> Result<(), CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;
    let mut length = value.len();
    let value = c_string(value)?;

    let error_code =
        eccodes_sys::codes_set_string(handle, key.as_ptr(), value.as_ptr(), &mut length);
    check_code(error_code)
}

pub unsafe fn codes_set_bytes(
    handle: *mut codes_handle,
    key: &str,
    values: &[u8],
) -> Result<(), CodesError> {
    pointer_guard::non_null!(handle);

    let key = c_string(key)?;
    let mut length = values.len();

    let error_code =
        eccodes_sys::codes_set_bytes(handle, key.as_ptr(), values.as_ptr(), &mut length);
    check_code(error_code)
}
