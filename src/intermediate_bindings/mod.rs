#![allow(non_camel_case_types)]

//!Module containing intermediate (type) bindings to ecCodes functions.
//!
//!These bindings convert Rust types to correct C types
//!and map ecCodes error codes to [`CodesError`],
//!but they are unsafe as they operate on raw `codes_handle`.

mod codes_get;
mod codes_handle;
mod codes_keys;
mod codes_set;

use std::ffi::CString;

use crate::errors::{CodesError, LibcError};

#[derive(Copy, Eq, PartialEq, Clone, Ord, PartialOrd, Hash, Debug, num_derive::FromPrimitive)]
pub enum NativeKeyType {
    Undefined = eccodes_sys::CODES_TYPE_UNDEFINED as isize,
    Long = eccodes_sys::CODES_TYPE_LONG as isize,
    Double = eccodes_sys::CODES_TYPE_DOUBLE as isize,
    Str = eccodes_sys::CODES_TYPE_STRING as isize,
    Bytes = eccodes_sys::CODES_TYPE_BYTES as isize,
    Section = eccodes_sys::CODES_TYPE_SECTION as isize,
    Label = eccodes_sys::CODES_TYPE_LABEL as isize,
    Missing = eccodes_sys::CODES_TYPE_MISSING as isize,
}

pub use codes_get::{
    codes_get_api_version, codes_get_bytes, codes_get_double, codes_get_double_array,
    codes_get_long, codes_get_long_array, codes_get_message, codes_get_native_type,
    codes_get_size, codes_get_string, codes_is_defined,
};
pub use codes_handle::{
    codes_handle_clone, codes_handle_delete, codes_handle_new_from_message_copy,
};
pub use codes_keys::{
    codes_keys_iterator_delete, codes_keys_iterator_get_name, codes_keys_iterator_new,
    codes_keys_iterator_next,
};
pub use codes_set::{
    codes_set_bytes, codes_set_double, codes_set_double_array, codes_set_long,
    codes_set_long_array, codes_set_string,
};

fn check_code(error_code: i32) -> Result<(), CodesError> {
    if error_code != 0 {
        return Err(CodesError::Internal(error_code));
    }
    Ok(())
}

fn c_string(value: &str) -> Result<CString, CodesError> {
    Ok(CString::new(value).map_err(LibcError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert!(check_code(0).is_ok());
        assert!(matches!(check_code(-10), Err(CodesError::Internal(-10))));
    }

    #[test]
    fn interior_nul_is_error() {
        assert!(c_string("gridType").is_ok());
        assert!(matches!(
            c_string("grid\0Type"),
            Err(CodesError::Libc(LibcError::CStringNull(_)))
        ));
    }
}
