//! Response view for the native imageflow library
//!
//! imageflow answers every call by writing a two-field C struct: a success
//! flag and a pointer to a NUL-terminated UTF-8 string. This crate reads
//! that struct back safely.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  bind   ┌───────────────────┐  read   ┌──────────┐
//! │ ResponseView │───────▶│ BoundResponseView │───────▶│ Response │
//! │  (unbound)   │ region  │ (native memory)   │  once   │  (owned) │
//! └──────────────┘         └───────────────────┘         └──────────┘
//!         ▲                          │
//!         └──────── Runtime ─────────┘  layout + region registry
//! ```
//!
//! All structured content travels inside the single data string and is
//! parsed after extraction (see [`JsonEnvelope`]).
//!
//! ## Example
//!
//! ```rust
//! use imageflow_response::{imageflow_response_free, imageflow_response_new, ResponseView, Runtime};
//! use std::ffi::CString;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Runtime::system();
//! let view = ResponseView::new();
//!
//! // Stand-in for the native call that returns a response pointer
//! let data = CString::new("ok")?;
//! let native = imageflow_response_new(true, data.as_ptr());
//!
//! let region = unsafe { runtime.track_response(native.cast_const())? };
//! let response = view.bind(region)?.into_response()?;
//! assert!(response.success);
//! assert_eq!(response.data.as_deref(), Some("ok"));
//!
//! runtime.release(region);
//! imageflow_response_free(native);
//! # Ok(())
//! # }
//! ```
//!
//! ## Memory Ownership
//!
//! - The native side owns the response struct and its string
//! - A tracked region must stay valid until `Runtime::release` is called
//! - Reads after release fail with `ViewError::MemoryAccessFault`

pub mod error;
pub mod layout;
#[cfg(feature = "ffi")]
pub mod native;
pub mod response;
pub mod runtime;
pub mod view;

// Re-export main types
pub use error::{Result, ViewError};
pub use layout::{BoolWidth, ImageFlowResponseC, ImageFlowResponseIntC, ResponseLayout};
pub use response::{JsonEnvelope, Response};
pub use runtime::{RegionId, Runtime, RuntimeConfig, DEFAULT_MAX_DATA_LEN, REGION_WARN_THRESHOLD};
pub use view::{BoundResponseView, ResponseView};

// Re-export FFI functions for C consumers
#[cfg(feature = "ffi")]
pub use native::{imageflow_response_free, imageflow_response_new, imageflow_response_version};
