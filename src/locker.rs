// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::cell::RefCell;
use std::pin::pin;
use std::sync::PoisonError;

use crate::isolate::Isolate;

// Every engine call of this crate happens inside these guards:
//
//   gate              Rust-side exclusion, taken before any `&mut` exists
//   v8::Locker        lock + Isolate::Scope
//   v8::HandleScope   transient locals
//   v8::ContextScope  (values only) the context the value came from
//
// The guards are stack values, so they unwind in reverse order on return
// and on panic.

thread_local! {
  /// Isolates locked by this thread, innermost last, with the engine
  /// isolate their guard handed out.
  static HELD: RefCell<Vec<(*const Isolate, *mut v8::Isolate)>> =
    const { RefCell::new(Vec::new()) };
}

fn held(owner: *const Isolate) -> Option<*mut v8::Isolate> {
  HELD.with_borrow(|held| {
    held
      .iter()
      .rev()
      .find(|(isolate, _)| *isolate == owner)
      .map(|(_, locked)| *locked)
  })
}

struct Held;

impl Held {
  fn push(owner: *const Isolate, locked: *mut v8::Isolate) -> Self {
    HELD.with_borrow_mut(|held| held.push((owner, locked)));
    Self
  }
}

impl Drop for Held {
  fn drop(&mut self) {
    HELD.with_borrow_mut(|held| {
      held.pop();
    });
  }
}

impl Isolate {
  /// Locks and enters the isolate for the duration of `f`.
  ///
  /// Other threads block until the lock is released. A nested call on the
  /// thread that already holds the lock (i.e. from a script callback) does
  /// not lock again: it is handed the isolate of the outer guard.
  pub(crate) fn locked<R>(&self, f: impl FnOnce(&mut v8::Isolate) -> R) -> R {
    if let Some(locked) = held(self) {
      // SAFETY: the outer guard on this thread is parked inside V8 until
      // the callback that led here returns, so it does not touch the
      // isolate meanwhile.
      return f(unsafe { &mut *locked });
    }

    let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
    // SAFETY: the gate is held, so this is the only reference to the
    // unentered isolate.
    let isolate = unsafe { &mut *self.isolate.get() };
    let mut locker = v8::Locker::new(isolate);
    let locked: *mut v8::Isolate = &mut *locker;
    let _held = Held::push(self, locked);
    f(unsafe { &mut *locked })
  }

  /// Runs `f` with a fresh handle scope on the locked isolate.
  pub(crate) fn with_scope<R>(
    &self,
    f: impl FnOnce(&mut v8::PinScope<'_, '_, ()>) -> R,
  ) -> R {
    self.locked(|isolate| {
      let scope = pin!(v8::HandleScope::new(isolate));
      let scope = &mut scope.init();
      f(scope)
    })
  }

  /// Runs `f` with a fresh handle scope, inside `context`.
  pub(crate) fn with_context<R>(
    &self,
    context: &v8::Global<v8::Context>,
    f: impl FnOnce(&mut v8::PinScope<'_, '_>) -> R,
  ) -> R {
    self.with_scope(|scope| {
      let context = v8::Local::new(scope, context);
      let scope = &mut v8::ContextScope::new(scope, context);
      f(scope)
    })
  }
}
