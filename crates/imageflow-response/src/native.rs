//! Reference native writer for the response struct
//!
//! Produces responses exactly as the native library lays them out, for C
//! consumers checking their declaration against ours and for exercising
//! views without linking the real library.
//!
//! # Memory Ownership Rules
//!
//! - `imageflow_response_new()` allocates on Rust heap, caller owns pointer
//! - `imageflow_response_free()` frees the struct and its data string
//! - Passing NULL to `imageflow_response_free()` is a no-op

use std::os::raw::c_char;
use std::ptr;

use imageflow_ffi_common::{cstr_to_str, cstring_new_or_empty, free_boxed, free_cstring, FfiResult};

use crate::layout::ImageFlowResponseC;

impl ImageFlowResponseC {
    /// Successful response carrying `data`.
    pub fn ok(data: &str) -> Self {
        Self {
            success: true,
            data: cstring_new_or_empty(data),
        }
    }

    /// Failed response with a NULL data pointer.
    pub fn empty_failure() -> Self {
        Self {
            success: false,
            data: ptr::null(),
        }
    }
}

impl FfiResult for ImageFlowResponseC {
    const ERROR_FALLBACK: &'static str = "unknown error";

    fn error_fields(error_msg: *mut c_char) -> Self {
        Self {
            success: false,
            data: error_msg,
        }
    }
}

/// Allocate a response with a copy of `data`.
///
/// `data` may be NULL. Non-UTF-8 input yields a failed response carrying
/// an error message.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn imageflow_response_new(
    success: bool,
    data: *const c_char,
) -> *mut ImageFlowResponseC {
    let response = if data.is_null() {
        ImageFlowResponseC {
            success,
            data: ptr::null(),
        }
    } else {
        match unsafe { cstr_to_str(data) } {
            Ok(s) => ImageFlowResponseC {
                success,
                data: cstring_new_or_empty(s),
            },
            Err(e) => ImageFlowResponseC::error(e),
        }
    };

    Box::into_raw(Box::new(response))
}

/// Free a response and its data string.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn imageflow_response_free(response: *mut ImageFlowResponseC) {
    if response.is_null() {
        return;
    }
    unsafe {
        free_cstring((*response).data as *mut c_char);
        free_boxed(response);
    }
}

imageflow_ffi_common::define_version_fn!(imageflow_response_version);
