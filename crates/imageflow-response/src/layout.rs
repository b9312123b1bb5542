//! Memory layout of the native response struct
//!
//! The native library writes a two-field struct: a boolean success flag at
//! offset 0 followed by a pointer to a NUL-terminated UTF-8 string. Field
//! order and widths must match the library's C declaration exactly.
//!
//! `ImageFlowResponseC` is the static binding for the common case (C99
//! `bool`). `ResponseLayout` describes the same struct as offsets so the
//! view can read it for either flag width without a typed overlay.

use std::mem::{align_of, offset_of, size_of};
use std::os::raw::{c_char, c_int};
use std::ptr;

/// Width of the native success flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolWidth {
    /// C99 `bool` / `_Bool` (1 byte)
    #[default]
    Byte,
    /// C `int` used as a boolean
    Int,
}

impl BoolWidth {
    pub const fn size(self) -> usize {
        match self {
            BoolWidth::Byte => size_of::<bool>(),
            BoolWidth::Int => size_of::<c_int>(),
        }
    }
}

/// Field offsets of the response struct for a given flag width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseLayout {
    pub bool_width: BoolWidth,
    /// Offset of the success flag (always 0)
    pub success_offset: usize,
    /// Offset of the data pointer
    pub data_offset: usize,
    /// Total struct size including trailing padding
    pub size: usize,
}

impl ResponseLayout {
    /// Compute the C layout for the given flag width.
    pub const fn for_width(bool_width: BoolWidth) -> Self {
        let ptr_size = size_of::<*const c_char>();
        let ptr_align = align_of::<*const c_char>();
        let data_offset = align_up(bool_width.size(), ptr_align);

        Self {
            bool_width,
            success_offset: 0,
            data_offset,
            size: data_offset + ptr_size,
        }
    }

    /// Read the success flag from a struct at `base`.
    ///
    /// # Safety
    /// `base` must be readable for `self.size` bytes.
    pub(crate) unsafe fn read_success(&self, base: *const u8) -> bool {
        let field = unsafe { base.add(self.success_offset) };
        match self.bool_width {
            BoolWidth::Byte => unsafe { ptr::read(field) != 0 },
            BoolWidth::Int => unsafe { ptr::read_unaligned(field as *const c_int) != 0 },
        }
    }

    /// Read the data pointer from a struct at `base`.
    ///
    /// # Safety
    /// `base` must be readable for `self.size` bytes.
    pub(crate) unsafe fn read_data_ptr(&self, base: *const u8) -> *const c_char {
        let field = unsafe { base.add(self.data_offset) };
        unsafe { ptr::read_unaligned(field as *const *const c_char) }
    }
}

impl Default for ResponseLayout {
    fn default() -> Self {
        Self::for_width(BoolWidth::default())
    }
}

const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// C-compatible response written by the native library (`bool` flag)
#[repr(C)]
#[derive(Debug)]
pub struct ImageFlowResponseC {
    /// True if the native operation succeeded
    pub success: bool,
    /// Response text, NUL-terminated UTF-8 (may be NULL on failure)
    pub data: *const c_char,
}

/// C-compatible response for libraries that declare the flag as `int`
#[repr(C)]
#[derive(Debug)]
pub struct ImageFlowResponseIntC {
    /// Non-zero if the native operation succeeded
    pub success: c_int,
    /// Response text, NUL-terminated UTF-8 (may be NULL on failure)
    pub data: *const c_char,
}

const BYTE_LAYOUT: ResponseLayout = ResponseLayout::for_width(BoolWidth::Byte);
const INT_LAYOUT: ResponseLayout = ResponseLayout::for_width(BoolWidth::Int);

const _: () = assert!(offset_of!(ImageFlowResponseC, success) == BYTE_LAYOUT.success_offset);
const _: () = assert!(offset_of!(ImageFlowResponseC, data) == BYTE_LAYOUT.data_offset);
const _: () = assert!(size_of::<ImageFlowResponseC>() == BYTE_LAYOUT.size);
const _: () = assert!(offset_of!(ImageFlowResponseIntC, data) == INT_LAYOUT.data_offset);
const _: () = assert!(size_of::<ImageFlowResponseIntC>() == INT_LAYOUT.size);
