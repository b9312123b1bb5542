//! Response view over native-written memory
//!
//! A view is created unbound, before the native call is issued. Binding it
//! to the region the native call wrote into yields a `BoundResponseView`,
//! which reads the success flag and the data string at fixed offsets.
//! Binding consumes the unbound view, so one view serves exactly one call.
//!
//! The view never writes to native memory and never caches field values:
//! every read goes back to the region and faults if the region is gone.

use imageflow_ffi_common::cstr_bytes_bounded;
use tracing::{debug, warn};

use crate::error::{Result, ViewError};
use crate::layout::ResponseLayout;
use crate::response::Response;
use crate::runtime::{RegionId, Runtime};

/// Unbound response view. Holds only layout metadata.
#[derive(Debug, Clone)]
pub struct ResponseView {
    runtime: Runtime,
    layout: ResponseLayout,
}

impl ResponseView {
    /// Create a view against the process-wide default runtime.
    pub fn new() -> Self {
        Self::with_runtime(&Runtime::system())
    }

    /// Create a view against an explicit runtime.
    pub fn with_runtime(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            layout: runtime.layout(),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn layout(&self) -> ResponseLayout {
        self.layout
    }

    /// Bind the view to a region populated by a native call.
    ///
    /// Checks that the region is live and large enough for the layout.
    /// No field is read.
    pub fn bind(self, region: RegionId) -> Result<BoundResponseView> {
        let required = self.layout.size;
        let len = self.runtime.with_region(region, |_, len| Ok(len))?;
        if len < required {
            return Err(ViewError::RegionTooSmall {
                region,
                len,
                required,
            });
        }

        debug!(runtime = %self.runtime.name(), region = %region, "Response view bound");
        Ok(BoundResponseView {
            runtime: self.runtime,
            layout: self.layout,
            region,
        })
    }
}

impl Default for ResponseView {
    fn default() -> Self {
        Self::new()
    }
}

/// Response view bound to a live native region
#[derive(Debug)]
pub struct BoundResponseView {
    runtime: Runtime,
    layout: ResponseLayout,
    region: RegionId,
}

impl BoundResponseView {
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Read the success flag.
    pub fn success(&self) -> Result<bool> {
        self.runtime
            .with_region(self.region, |base, _| Ok(unsafe { self.layout.read_success(base) }))
    }

    /// Read the raw bytes of the data string, excluding the terminator.
    ///
    /// Returns `None` when the native call failed or left the pointer NULL.
    /// The pointer is only followed when the success flag is set.
    pub fn data_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.read_data(false)
    }

    /// Read the data string of a failed call, e.g. an error message.
    ///
    /// # Safety
    /// The native library must guarantee that it sets the data pointer to
    /// NULL or to a valid string even when the call fails.
    pub unsafe fn failure_data(&self) -> Result<Option<String>> {
        self.read_data(true)?.map(into_text).transpose()
    }

    fn read_data(&self, follow_on_failure: bool) -> Result<Option<Vec<u8>>> {
        let limit = self.runtime.config().max_data_len;

        self.runtime.with_region(self.region, |base, _| {
            let success = unsafe { self.layout.read_success(base) };
            if !success && !follow_on_failure {
                return Ok(None);
            }
            let ptr = unsafe { self.layout.read_data_ptr(base) };

            match unsafe { cstr_bytes_bounded(ptr, limit) } {
                Ok(data) => Ok(data.map(<[u8]>::to_vec)),
                Err(_) => {
                    warn!(
                        runtime = %self.runtime.name(),
                        region = %self.region,
                        limit,
                        "Response data has no terminator within limit"
                    );
                    Err(ViewError::DataTooLarge { limit })
                }
            }
        })
    }

    /// Read the data string as UTF-8 text.
    pub fn data(&self) -> Result<Option<String>> {
        self.data_bytes()?.map(into_text).transpose()
    }

    /// Read the response once and discard the view.
    ///
    /// `data` is read only when the native call succeeded.
    pub fn into_response(self) -> Result<Response> {
        let success = self.success()?;
        let data = if success { self.data()? } else { None };
        Ok(Response { success, data })
    }
}

fn into_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| ViewError::InvalidUtf8 {
        valid_up_to: e.utf8_error().valid_up_to(),
    })
}
