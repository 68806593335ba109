// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use tracing::debug;
use tracing::warn;

use crate::allocator::AllocatorStats;
use crate::allocator::BufferAllocator;
use crate::error::BridgeError;

/// Process-wide engine settings, applied once by [`Platform::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformConfig {
  thread_pool_size: u32,
  idle_task_support: bool,
  single_threaded: bool,
  flags: Option<String>,
}

impl PlatformConfig {
  /// Number of worker threads of the platform. Zero lets V8 choose based on
  /// the number of processors.
  pub fn thread_pool_size(mut self, size: u32) -> Self {
    self.thread_pool_size = size;
    self
  }

  pub fn idle_task_support(mut self, enabled: bool) -> Self {
    self.idle_task_support = enabled;
    self
  }

  /// Use a platform that runs background tasks on the calling thread.
  pub fn single_threaded(mut self, enabled: bool) -> Self {
    self.single_threaded = enabled;
    self
  }

  /// V8 command line flags, e.g. `"--expose-gc --stack-size=2048"`.
  pub fn flags(mut self, flags: impl Into<String>) -> Self {
    self.flags = Some(flags.into());
    self
  }

  /// Reads `V8_BRIDGE_FLAGS`, `V8_BRIDGE_THREAD_POOL_SIZE` and
  /// `V8_BRIDGE_SINGLE_THREADED`. Unparseable values are ignored.
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let mut config = Self::default();
    if let Some(flags) = lookup("V8_BRIDGE_FLAGS") {
      if !flags.trim().is_empty() {
        config = config.flags(flags);
      }
    }
    if let Some(size) = lookup("V8_BRIDGE_THREAD_POOL_SIZE") {
      match size.trim().parse() {
        Ok(size) => config = config.thread_pool_size(size),
        Err(_) => warn!(value = %size, "ignoring V8_BRIDGE_THREAD_POOL_SIZE"),
      }
    }
    if let Some(value) = lookup("V8_BRIDGE_SINGLE_THREADED") {
      let enabled = matches!(value.trim(), "1" | "true" | "yes");
      config = config.single_threaded(enabled);
    }
    config
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalState {
  Uninitialized,
  Initialized,
  Disposed,
}
use GlobalState::*;

static GLOBAL_STATE: Mutex<GlobalState> = Mutex::new(Uninitialized);

/// The initialized engine: ICU, the platform thread pool and V8 itself.
///
/// Exactly one `Platform` can exist per process, and once disposed V8 cannot
/// be started again. Every isolate created from it must be disposed before
/// [`Platform::dispose`] is called.
pub struct Platform {
  platform: v8::SharedRef<v8::Platform>,
  allocator: Arc<BufferAllocator>,
}

// SAFETY: the V8 platform is shared by all isolates and their worker
// threads; its task runners are internally synchronized.
unsafe impl Send for Platform {}
unsafe impl Sync for Platform {}

impl Platform {
  pub fn initialize(config: &PlatformConfig) -> Result<Self, BridgeError> {
    let mut state = GLOBAL_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    match *state {
      Uninitialized => {}
      Initialized => return Err(BridgeError::AlreadyInitialized),
      Disposed => return Err(BridgeError::Disposed),
    }

    if let Some(flags) = &config.flags {
      v8::V8::set_flags_from_string(flags);
    }
    let platform = if config.single_threaded {
      v8::new_single_threaded_default_platform(config.idle_task_support)
    } else {
      v8::new_default_platform(
        config.thread_pool_size,
        config.idle_task_support,
      )
    }
    .make_shared();
    v8::V8::initialize_platform(platform.clone());
    v8::V8::initialize();
    *state = Initialized;

    debug!(version = v8::V8::get_version(), ?config, "V8 initialized");
    Ok(Self {
      platform,
      allocator: BufferAllocator::new(),
    })
  }

  /// The buffer allocator injected into every isolate of this platform.
  pub fn allocator(&self) -> &Arc<BufferAllocator> {
    &self.allocator
  }

  pub fn allocator_stats(&self) -> AllocatorStats {
    self.allocator.stats()
  }

  pub fn is_initialized() -> bool {
    *GLOBAL_STATE.lock().unwrap_or_else(PoisonError::into_inner) == Initialized
  }

  /// Tears V8 down for the rest of the process lifetime.
  pub fn dispose(self) {
    let mut state = GLOBAL_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    unsafe { v8::V8::dispose() };
    v8::V8::dispose_platform();
    drop(self.platform);
    *state = Disposed;
    debug!(stats = ?self.allocator.stats(), "V8 disposed");
  }
}
