use std::ptr;

use eccodes_sys::{codes_context, codes_handle};
use libc::c_void;

use crate::{errors::CodesError, pointer_guard};

use super::check_code;

/// Decodes a message from a buffer. ecCodes copies the buffer, so it can be dropped afterwards.
pub unsafe fn codes_handle_new_from_message_copy(
    message: &[u8],
) -> Result<*mut codes_handle, CodesError> {
    let context: *mut codes_context = ptr::null_mut(); //default context

    let handle = eccodes_sys::codes_handle_new_from_message_copy(
        context,
        message.as_ptr().cast::<c_void>(),
        message.len(),
    );

    if handle.is_null() {
        return Err(CodesError::NullPtr);
    }

    Ok(handle)
}

pub unsafe fn codes_handle_delete(handle: *mut codes_handle) -> Result<(), CodesError> {
    if handle.is_null() {
        return Ok(());
    }

    let error_code = eccodes_sys::codes_handle_delete(handle);
    check_code(error_code)
}

pub unsafe fn codes_handle_clone(
    source_handle: *mut codes_handle,
) -> Result<*mut codes_handle, CodesError> {
    pointer_guard::non_null!(source_handle);

    let clone_handle = eccodes_sys::codes_handle_clone(source_handle);

    if clone_handle.is_null() {
        return Err(CodesError::CloneFailed);
    }

    Ok(clone_handle)
}
