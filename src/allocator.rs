// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// Backing memory for `ArrayBuffer`s of every isolate in the process.
///
/// A single instance is created by [`crate::Platform::initialize`] and
/// injected into each isolate. All entry points may be called concurrently
/// from the threads driving different isolates.
///
/// Note that it is unsafe to call back into V8 from any of the allocator
/// functions.
#[derive(Debug, Default)]
pub struct BufferAllocator {
  live_bytes: AtomicUsize,
  total_allocations: AtomicUsize,
}

/// Point-in-time counters of a [`BufferAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
  pub live_bytes: usize,
  pub total_allocations: usize,
}

impl BufferAllocator {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn stats(&self) -> AllocatorStats {
    AllocatorStats {
      live_bytes: self.live_bytes.load(Ordering::Relaxed),
      total_allocations: self.total_allocations.load(Ordering::Relaxed),
    }
  }

  fn allocate(&self, len: usize, zeroed: bool) -> *mut c_void {
    // malloc(0) may legitimately return null, which V8 reads as OOM.
    let size = len.max(1);
    let data = unsafe {
      if zeroed {
        libc::calloc(size, 1)
      } else {
        libc::malloc(size)
      }
    };
    if !data.is_null() {
      self.live_bytes.fetch_add(len, Ordering::Relaxed);
      self.total_allocations.fetch_add(1, Ordering::Relaxed);
    }
    data
  }

  fn free(&self, data: *mut c_void, len: usize) {
    if data.is_null() {
      return;
    }
    unsafe { libc::free(data) };
    self.live_bytes.fetch_sub(len, Ordering::Relaxed);
  }

  /// Wraps this allocator in the engine's allocator interface. The engine
  /// holds one strong reference until it releases the allocator.
  pub(crate) fn to_v8(self: &Arc<Self>) -> v8::SharedRef<v8::Allocator> {
    let handle = Arc::into_raw(Arc::clone(self));
    unsafe { v8::new_rust_allocator(handle, &VTABLE) }.make_shared()
  }
}

static VTABLE: v8::RustAllocatorVtable<BufferAllocator> =
  v8::RustAllocatorVtable {
    allocate,
    allocate_uninitialized,
    free,
    drop: drop_allocator,
  };

unsafe extern "C" fn allocate(
  allocator: &BufferAllocator,
  len: usize,
) -> *mut c_void {
  allocator.allocate(len, true)
}

unsafe extern "C" fn allocate_uninitialized(
  allocator: &BufferAllocator,
  len: usize,
) -> *mut c_void {
  allocator.allocate(len, false)
}

unsafe extern "C" fn free(
  allocator: &BufferAllocator,
  data: *mut c_void,
  len: usize,
) {
  allocator.free(data, len)
}

unsafe extern "C" fn drop_allocator(allocator: *const BufferAllocator) {
  drop(unsafe { Arc::from_raw(allocator) });
}
