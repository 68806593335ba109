// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::cell::UnsafeCell;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::sync::Mutex;

use tracing::debug;

use crate::function::BridgeSlot;
use crate::function::Dispatch;
use crate::function::ReturnSink;
use crate::global::Value;
use crate::platform::Platform;

/// Per-isolate engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsolateConfig {
  heap_limits: Option<(usize, usize)>,
}

impl IsolateConfig {
  /// Initial and maximum size of the V8 heap, in bytes.
  pub fn heap_limits(mut self, initial: usize, max: usize) -> Self {
    self.heap_limits = Some((initial, max));
    self
  }
}

/// One independent V8 heap.
///
/// The isolate is created unentered: it is only ever touched while locked by
/// a `v8::Locker`, so it may be driven from any thread, one thread at a time.
/// The gate serializes threads before the Locker is even constructed.
/// Isolates are boxed because script callbacks find their way back to the
/// owning `Isolate` through its address.
pub struct Isolate {
  pub(crate) isolate: UnsafeCell<v8::UnenteredIsolate>,
  pub(crate) gate: Mutex<()>,
}

// SAFETY: the inner isolate is only borrowed with `gate` held, or on the
// thread holding it (see `Isolate::locked`).
unsafe impl Sync for Isolate {}

impl Isolate {
  pub fn new(platform: &Platform, config: &IsolateConfig) -> Box<Self> {
    let mut params = v8::CreateParams::default()
      .array_buffer_allocator(platform.allocator().to_v8());
    if let Some((initial, max)) = config.heap_limits {
      params = params.heap_limits(initial, max);
    }

    let isolate = Box::new(Self {
      isolate: UnsafeCell::new(v8::Isolate::new_unentered(params)),
      gate: Mutex::new(()),
    });
    let this: *const Isolate = &*isolate;
    isolate.locked(|isolate| {
      isolate.set_slot(BridgeSlot {
        isolate: this,
        dispatcher: None,
      });
    });
    debug!(isolate = ?this, ?config, "isolate created");
    isolate
  }

  /// Installs the handler that receives every call of a function registered
  /// with [`crate::Context::register_function`] in this isolate.
  pub fn set_dispatcher(&self, dispatcher: impl Dispatch + 'static) {
    self.install_dispatcher(Some(Arc::new(dispatcher)));
  }

  /// Like [`Isolate::set_dispatcher`], for a plain closure.
  pub fn set_dispatch_fn<F>(&self, dispatch: F)
  where
    F: for<'a> Fn(&'a Isolate, i32, Vec<Value<'a>>, &mut ReturnSink)
      + Send
      + Sync
      + 'static,
  {
    self.set_dispatcher(dispatch);
  }

  pub fn clear_dispatcher(&self) {
    self.install_dispatcher(None);
  }

  fn install_dispatcher(&self, dispatcher: Option<Arc<dyn Dispatch>>) {
    self.locked(|isolate| {
      if let Some(slot) = isolate.get_slot_mut::<BridgeSlot>() {
        slot.dispatcher = dispatcher;
      }
    });
  }

  /// Disposes the isolate. Every template, context and value created from it
  /// must already be gone.
  pub fn dispose(self: Box<Self>) {
    drop(self);
  }
}

impl Drop for Isolate {
  fn drop(&mut self) {
    debug!(isolate = ?(self as *const Isolate), "isolate disposed");
  }
}

impl Debug for Isolate {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.debug_struct("Isolate")
      .field("address", &(self as *const Isolate))
      .finish()
  }
}
