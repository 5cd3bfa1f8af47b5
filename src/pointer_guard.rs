//! Guard for raw handles passed to ecCodes

/// Returns [`CodesError::NullPtr`](crate::CodesError::NullPtr) from the enclosing
/// function when the pointer is null. Panics in debug builds, as a null handle
/// reaching the bindings is a bug of this crate.
macro_rules! non_null {
    ($ptr:expr) => {
        if $ptr.is_null() {
            debug_assert!(false, "Null pointer encountered");
            return Err(CodesError::NullPtr);
        }
    };
}
pub(crate) use non_null;
