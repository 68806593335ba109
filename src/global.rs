// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::fmt::{self, Debug, Formatter};
use std::mem::ManuallyDrop;

use crate::isolate::Isolate;

/// A `v8::Global` tied to the isolate that owns it. Dropping it takes the
/// isolate lock before the global handle is reset.
pub(crate) struct Persistent<'i, T> {
  isolate: &'i Isolate,
  handle: ManuallyDrop<v8::Global<T>>,
}

impl<'i, T> Persistent<'i, T> {
  pub(crate) fn new(
    isolate: &'i Isolate,
    scope: &v8::PinScope<'_, '_, ()>,
    local: v8::Local<'_, T>,
  ) -> Self {
    Self {
      isolate,
      handle: ManuallyDrop::new(v8::Global::new(scope, local)),
    }
  }

  pub(crate) fn isolate(&self) -> &'i Isolate {
    self.isolate
  }

  pub(crate) fn global(&self) -> &v8::Global<T> {
    &self.handle
  }

  pub(crate) fn open<'s>(
    &self,
    scope: &v8::PinScope<'s, '_, ()>,
  ) -> v8::Local<'s, T> {
    v8::Local::new(scope, &*self.handle)
  }
}

impl<T> Drop for Persistent<'_, T> {
  fn drop(&mut self) {
    let handle = &mut self.handle;
    self.isolate.locked(|_| unsafe { ManuallyDrop::drop(handle) });
  }
}

/// A persistent handle to any JavaScript value: primitive, string, object,
/// function or a thrown exception.
///
/// The referenced value stays alive until the `Value` is dropped. Each
/// `Value` is a separate handle, even when two of them refer to the same
/// JavaScript value. Besides the value itself it remembers the context that
/// was current when it was created; conversions run in that context.
pub struct Value<'i> {
  context: Persistent<'i, v8::Context>,
  value: Persistent<'i, v8::Value>,
}

impl<'i> Value<'i> {
  /// Promotes a local handle to a `Value`. `scope` must be the scope of a
  /// guard on `isolate`, inside a context.
  pub(crate) fn promote(
    isolate: &'i Isolate,
    scope: &v8::PinScope<'_, '_>,
    value: v8::Local<'_, v8::Value>,
  ) -> Self {
    let context = scope.get_current_context();
    Self {
      context: Persistent::new(isolate, scope, context),
      value: Persistent::new(isolate, scope, value),
    }
  }

  pub fn isolate(&self) -> &'i Isolate {
    self.value.isolate()
  }

  /// Re-establishes the guard and the value's context, and hands the value
  /// to `f` as a local. The local never outlives the call.
  pub(crate) fn open<R>(
    &self,
    f: impl FnOnce(&mut v8::PinScope<'_, '_>, v8::Local<'_, v8::Value>) -> R,
  ) -> R {
    self.isolate().with_context(self.context.global(), |scope| {
      let value = self.value.open(scope);
      f(scope, value)
    })
  }

  /// Releases the handle. Same as dropping it.
  pub fn dispose(self) {
    drop(self);
  }
}

impl Debug for Value<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.debug_struct("Value")
      .field("kind", &self.kind())
      .finish_non_exhaustive()
  }
}
