//! Common FFI utilities for the imageflow response bindings.
//!
//! Small helpers for moving NUL-terminated strings and boxed values across
//! the C boundary, shared by the response view and its reference native
//! writer.
//!
//! # Memory Ownership
//!
//! - Functions returning `*mut c_char` transfer ownership to the caller
//! - Callers must use the corresponding `free_*` function to deallocate
//! - NULL pointers are handled safely (no-op for free functions)

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::slice;

/// Convert a Rust string to a C string pointer, with a fallback on failure.
///
/// If the input contains null bytes, returns the fallback string instead.
/// The returned pointer is owned by the caller and must be freed.
///
/// # Example
/// ```
/// use imageflow_ffi_common::{cstring_new_or_fallback, free_cstring};
///
/// let ptr = cstring_new_or_fallback("decode failed", "error");
/// unsafe { free_cstring(ptr) };
/// ```
#[inline]
pub fn cstring_new_or_fallback(s: &str, fallback: &'static str) -> *mut c_char {
    CString::new(s)
        .or_else(|_| CString::new(fallback))
        .unwrap_or_default()
        .into_raw()
}

/// Convert a Rust string to a C string pointer, using empty string as fallback.
#[inline]
pub fn cstring_new_or_empty(s: &str) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

/// Safely free a C string pointer.
///
/// Does nothing if the pointer is null.
///
/// # Safety
/// The pointer must have been allocated by `CString::into_raw()` or be null.
#[inline]
pub unsafe fn free_cstring(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}

/// Safely free a boxed value.
///
/// Does nothing if the pointer is null.
///
/// # Safety
/// The pointer must have been allocated by `Box::into_raw()` or be null.
#[inline]
pub unsafe fn free_boxed<T>(ptr: *mut T) {
    if !ptr.is_null() {
        unsafe {
            let _ = Box::from_raw(ptr);
        }
    }
}

/// Safely convert a C string pointer to a Rust string reference.
///
/// # Returns
/// `Ok(&str)` on success, `Err(&'static str)` with error message on failure.
///
/// # Safety
/// The pointer must be valid and null-terminated, or null.
pub unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Result<&'a str, &'static str> {
    if ptr.is_null() {
        return Err("null pointer");
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| "invalid UTF-8")
}

/// Borrow the bytes of a C string, scanning at most `max_len` bytes for the
/// terminator.
///
/// Returns `Ok(None)` for a null pointer. The returned slice excludes the
/// terminator. Unlike `CStr::from_ptr`, a missing terminator never turns
/// into an unbounded read.
///
/// # Safety
/// The pointer must be null, or readable up to its terminator or up to
/// `max_len + 1` bytes, whichever comes first.
pub unsafe fn cstr_bytes_bounded<'a>(
    ptr: *const c_char,
    max_len: usize,
) -> Result<Option<&'a [u8]>, &'static str> {
    if ptr.is_null() {
        return Ok(None);
    }

    let bytes = ptr as *const u8;
    for i in 0..=max_len {
        if unsafe { *bytes.add(i) } == 0 {
            return Ok(Some(unsafe { slice::from_raw_parts(bytes, i) }));
        }
    }

    Err("missing terminator")
}

/// Trait for FFI result types with standardized error handling.
///
/// Types implementing this trait get a consistent `.error()` method
/// that converts error messages to C strings with fallback handling.
///
/// # Example
/// ```ignore
/// #[repr(C)]
/// pub struct MyResponseC {
///     pub success: bool,
///     pub data: *const c_char,
/// }
///
/// impl FfiResult for MyResponseC {
///     const ERROR_FALLBACK: &'static str = "unknown error";
///
///     fn error_fields(error_msg: *mut c_char) -> Self {
///         Self { success: false, data: error_msg }
///     }
/// }
///
/// let response = MyResponseC::error("operation failed");
/// ```
pub trait FfiResult: Sized {
    /// Fallback message used when the error message contains null bytes.
    const ERROR_FALLBACK: &'static str;

    /// Construct the result struct with the given error message pointer.
    fn error_fields(error_msg: *mut c_char) -> Self;

    /// Create an error result with the given message.
    #[inline]
    fn error(msg: &str) -> Self {
        let error_msg = cstring_new_or_fallback(msg, Self::ERROR_FALLBACK);
        Self::error_fields(error_msg)
    }
}

/// Generate a version function that returns a static C string.
///
/// # Example
/// ```ignore
/// imageflow_ffi_common::define_version_fn!(my_lib_version);
/// // Expands to:
/// // #[no_mangle]
/// // pub extern "C" fn my_lib_version() -> *const c_char {
/// //     concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
/// // }
/// ```
#[macro_export]
macro_rules! define_version_fn {
    ($fn_name:ident) => {
        #[no_mangle]
        pub extern "C" fn $fn_name() -> *const std::os::raw::c_char {
            concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const std::os::raw::c_char
        }
    };
}
