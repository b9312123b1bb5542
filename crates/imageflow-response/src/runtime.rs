//! Runtime context for response views
//!
//! A `Runtime` describes how native responses are laid out (flag width,
//! read limits) and tracks the native memory regions views are allowed to
//! read. A region is readable from the moment it is tracked or allocated
//! until it is released; reads after that fail with
//! `ViewError::MemoryAccessFault` instead of touching freed memory.
//!
//! `Runtime::system()` is the process-wide default, created on first use
//! and valid for the life of the process.

use std::collections::HashMap;
use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, ViewError};
use crate::layout::{BoolWidth, ResponseLayout};

/// Default upper bound on the length of the data string (16 MiB)
pub const DEFAULT_MAX_DATA_LEN: usize = 16 * 1024 * 1024;

/// Live region count at which a runtime warns about unreleased regions
pub const REGION_WARN_THRESHOLD: usize = 1024;

const SYSTEM_RUNTIME_NAME: &str = "system";

lazy_static! {
    static ref SYSTEM: Runtime = Runtime::build(RuntimeConfig::default(), true);
}

/// Identifier of a tracked memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub(crate) u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for a runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Name used in log output
    pub name: String,
    /// Width of the native success flag
    pub bool_width: BoolWidth,
    /// Maximum number of bytes scanned for the data terminator
    pub max_data_len: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: SYSTEM_RUNTIME_NAME.to_string(),
            bool_width: BoolWidth::Byte,
            max_data_len: DEFAULT_MAX_DATA_LEN,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_data_len == 0 {
            return Err(ViewError::InvalidConfig(
                "max_data_len must be greater than 0".to_string(),
            ));
        }
        if self.name.is_empty() {
            return Err(ViewError::InvalidConfig(
                "runtime name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Handle to a runtime context. Clones share the same registry.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    layout: ResponseLayout,
    /// The system runtime cannot be shut down
    persistent: bool,
    state: Mutex<RegistryState>,
}

struct RegistryState {
    valid: bool,
    next_id: u64,
    regions: HashMap<RegionId, Region>,
}

struct Region {
    /// Start address of the block
    base: usize,
    len: usize,
    /// Backing storage when the runtime allocated the block itself
    storage: Option<*mut [u64]>,
}

// `storage` is only ever touched through `Drop`, under the registry lock.
unsafe impl Send for Region {}

impl Drop for Region {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.take() {
            unsafe {
                let _ = Box::from_raw(storage);
            }
        }
    }
}

impl Runtime {
    /// The process-wide default runtime.
    ///
    /// It is never shut down, so regions tracked on it live until
    /// `release` is called. A warning is logged each time the live count
    /// reaches a multiple of [`REGION_WARN_THRESHOLD`].
    pub fn system() -> Runtime {
        SYSTEM.clone()
    }

    /// Create an explicit runtime with the given configuration.
    pub fn new(config: RuntimeConfig) -> Result<Runtime> {
        config.validate()?;
        Ok(Self::build(config, false))
    }

    fn build(config: RuntimeConfig, persistent: bool) -> Runtime {
        let layout = ResponseLayout::for_width(config.bool_width);
        debug!(
            runtime = %config.name,
            bool_width = ?config.bool_width,
            size = layout.size,
            "Runtime created"
        );

        Runtime {
            inner: Arc::new(RuntimeInner {
                config,
                layout,
                persistent,
                state: Mutex::new(RegistryState {
                    valid: true,
                    next_id: 1,
                    regions: HashMap::new(),
                }),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Layout of the response struct under this runtime.
    pub fn layout(&self) -> ResponseLayout {
        self.inner.layout
    }

    pub fn is_valid(&self) -> bool {
        self.inner.state.lock().valid
    }

    /// Whether `id` names a region that is still readable.
    pub fn is_live(&self, id: RegionId) -> bool {
        let state = self.inner.state.lock();
        state.valid && state.regions.contains_key(&id)
    }

    /// Number of live regions.
    pub fn region_count(&self) -> usize {
        self.inner.state.lock().regions.len()
    }

    /// Track a block of memory owned by the native side.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `len` bytes until `release` is called
    /// for the returned id. For a response struct whose success flag is set,
    /// the data pointer must be NULL or a valid string for the same span.
    /// When the flag is clear the data pointer may hold anything.
    pub unsafe fn track(&self, ptr: *const u8, len: usize) -> Result<RegionId> {
        if ptr.is_null() {
            return Err(ViewError::NullRegion);
        }
        self.insert(ptr as usize, len, None)
    }

    /// Track a native response struct returned by pointer.
    ///
    /// # Safety
    /// Same contract as [`Runtime::track`] for `size_of::<T>()` bytes.
    pub unsafe fn track_response<T>(&self, ptr: *const T) -> Result<RegionId> {
        unsafe { self.track(ptr as *const u8, size_of::<T>()) }
    }

    /// Allocate a zeroed, pointer-aligned block for the native side to
    /// write into. The block is owned by the runtime and freed on release.
    pub fn allocate(&self, len: usize) -> Result<RegionId> {
        let words = len.div_ceil(size_of::<u64>()).max(1);
        let mut storage: Vec<u64> = Vec::new();
        if storage.try_reserve_exact(words).is_err() {
            warn!(runtime = %self.name(), len, "Region allocation failed");
            return Err(ViewError::AllocationFailed { len });
        }
        storage.resize(words, 0);

        let storage = Box::into_raw(storage.into_boxed_slice());
        let base = storage as *mut u64 as usize;
        self.insert(base, len, Some(storage))
    }

    /// Allocate a block sized for one response struct.
    pub fn allocate_response(&self) -> Result<RegionId> {
        self.allocate(self.inner.layout.size)
    }

    /// Address of a live region, to hand to a native call as an out-parameter.
    pub fn region_ptr(&self, id: RegionId) -> Result<*mut u8> {
        let state = self.inner.state.lock();
        let region = self.lookup(&state, id)?;
        Ok(region.base as *mut u8)
    }

    /// Release a region. Returns false if it was not live.
    pub fn release(&self, id: RegionId) -> bool {
        let released = self.inner.state.lock().regions.remove(&id).is_some();
        if released {
            debug!(runtime = %self.name(), region = %id, "Region released");
        }
        released
    }

    /// Invalidate the runtime. Every region becomes unreadable.
    ///
    /// Returns false for the system runtime, which lives for the whole
    /// process.
    pub fn shutdown(&self) -> bool {
        if self.inner.persistent {
            return false;
        }
        let mut state = self.inner.state.lock();
        state.valid = false;
        state.regions.clear();
        debug!(runtime = %self.name(), "Runtime shut down");
        true
    }

    fn insert(&self, base: usize, len: usize, storage: Option<*mut [u64]>) -> Result<RegionId> {
        let mut state = self.inner.state.lock();
        if !state.valid {
            // Dropping the region frees runtime-owned storage
            drop(Region { base, len, storage });
            return Err(ViewError::RuntimeShutdown(self.name().to_string()));
        }

        let id = RegionId(state.next_id);
        state.next_id += 1;
        let owned = storage.is_some();
        state.regions.insert(
            id,
            Region { base, len, storage },
        );

        let live = state.regions.len();
        if live % REGION_WARN_THRESHOLD == 0 {
            warn!(
                runtime = %self.name(),
                live,
                "Many regions still tracked, release them after each read"
            );
        }

        debug!(runtime = %self.name(), region = %id, len, owned, "Region tracked");
        Ok(id)
    }

    fn lookup<'a>(&self, state: &'a RegistryState, id: RegionId) -> Result<&'a Region> {
        let reason = if !state.valid {
            "runtime shut down"
        } else if let Some(region) = state.regions.get(&id) {
            return Ok(region);
        } else if id.0 < state.next_id {
            "region released"
        } else {
            "region not tracked"
        };

        warn!(runtime = %self.name(), region = %id, reason, "Memory access fault");
        Err(ViewError::MemoryAccessFault { region: id, reason })
    }

    /// Run `f` with the base address and length of a live region.
    ///
    /// The registry lock is held for the duration of `f`, so the region
    /// cannot be released mid-read.
    pub(crate) fn with_region<R>(
        &self,
        id: RegionId,
        f: impl FnOnce(*const u8, usize) -> Result<R>,
    ) -> Result<R> {
        let state = self.inner.state.lock();
        let region = self.lookup(&state, id)?;
        f(region.base as *const u8, region.len)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Runtime")
            .field("name", &self.inner.config.name)
            .field("layout", &self.inner.layout)
            .field("valid", &state.valid)
            .field("regions", &state.regions.len())
            .finish()
    }
}
