// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;

use tracing::trace;
use tracing::warn;

use crate::global::Value;
use crate::isolate::Isolate;

/// Receives every call from script to a function registered with
/// [`crate::Context::register_function`].
///
/// `args` holds one new [`Value`] per argument, in order; they belong to the
/// dispatcher like any other value. The result of the call is whatever was
/// last written into `sink`, or `undefined` if nothing was.
///
/// Dispatch happens synchronously on the thread running the script, with the
/// isolate already locked. The dispatcher may use the isolate, including
/// the values it receives.
pub trait Dispatch: Send + Sync {
  fn dispatch<'i>(
    &self,
    isolate: &'i Isolate,
    call_id: i32,
    args: Vec<Value<'i>>,
    sink: &mut ReturnSink,
  );
}

impl<F> Dispatch for F
where
  F: for<'a> Fn(&'a Isolate, i32, Vec<Value<'a>>, &mut ReturnSink)
    + Send
    + Sync,
{
  fn dispatch<'i>(
    &self,
    isolate: &'i Isolate,
    call_id: i32,
    args: Vec<Value<'i>>,
    sink: &mut ReturnSink,
  ) {
    self(isolate, call_id, args, sink)
  }
}

/// A result a dispatcher can hand back to script.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnKind {
  Undefined,
  Null,
  Boolean(bool),
  Number(f64),
  String(String),
  EmptyString,
}

/// The return value of one bridged call. Only valid during the dispatch it
/// was passed to.
#[derive(Debug, Default)]
pub struct ReturnSink {
  value: Option<ReturnKind>,
}

impl ReturnSink {
  pub fn set(&mut self, value: ReturnKind) {
    self.value = Some(value);
  }

  pub fn set_undefined(&mut self) {
    self.set(ReturnKind::Undefined);
  }

  pub fn set_null(&mut self) {
    self.set(ReturnKind::Null);
  }

  pub fn set_boolean(&mut self, value: bool) {
    self.set(ReturnKind::Boolean(value));
  }

  pub fn set_number(&mut self, value: f64) {
    self.set(ReturnKind::Number(value));
  }

  pub fn set_string(&mut self, value: impl Into<String>) {
    self.set(ReturnKind::String(value.into()));
  }

  pub fn set_empty_string(&mut self) {
    self.set(ReturnKind::EmptyString);
  }

  /// The value written last, if any.
  pub fn get(&self) -> Option<&ReturnKind> {
    self.value.as_ref()
  }

  fn apply(
    self,
    scope: &mut v8::PinScope<'_, '_>,
    rv: &mut v8::ReturnValue<v8::Value>,
  ) {
    match self.value {
      None | Some(ReturnKind::Undefined) => rv.set_undefined(),
      Some(ReturnKind::Null) => rv.set_null(),
      Some(ReturnKind::Boolean(value)) => rv.set_bool(value),
      Some(ReturnKind::Number(value)) => rv.set_double(value),
      Some(ReturnKind::EmptyString) => rv.set_empty_string(),
      Some(ReturnKind::String(value)) => match v8::String::new(scope, &value) {
        Some(string) => rv.set(string.into()),
        None => throw_error(scope, "return value is too long", true),
      },
    }
  }
}

/// Per-isolate state reachable from inside script callbacks.
pub(crate) struct BridgeSlot {
  pub(crate) isolate: *const Isolate,
  pub(crate) dispatcher: Option<Arc<dyn Dispatch>>,
}

fn throw_error(scope: &mut v8::PinScope<'_, '_>, message: &str, range: bool) {
  let Some(message) = v8::String::new(scope, message) else {
    return;
  };
  let exception = if range {
    v8::Exception::range_error(scope, message)
  } else {
    v8::Exception::error(scope, message)
  };
  scope.throw_exception(exception);
}

/// The engine-side entry point of every registered function. The call id
/// travels as the function's data.
pub(crate) fn bridge_callback(
  scope: &mut v8::PinScope<'_, '_>,
  args: v8::FunctionCallbackArguments,
  mut rv: v8::ReturnValue<v8::Value>,
) {
  let call_id = args.data().cast::<v8::Integer>().value() as i32;

  let Some((isolate, dispatcher)) = scope
    .get_slot::<BridgeSlot>()
    .map(|slot| (slot.isolate, slot.dispatcher.clone()))
  else {
    return;
  };
  // SAFETY: the slot is installed by `Isolate::new` with the address of the
  // boxed `Isolate`, which outlives every script it runs.
  let isolate = unsafe { &*isolate };

  let Some(dispatcher) = dispatcher else {
    warn!(call_id, "bridged function called without a dispatcher");
    let message = format!("no dispatcher registered for call id {call_id}");
    throw_error(scope, &message, false);
    return;
  };

  let argc = args.length();
  let values = (0..argc)
    .map(|i| Value::promote(isolate, scope, args.get(i)))
    .collect::<Vec<_>>();
  trace!(call_id, argc, "dispatching bridged call");

  let mut sink = ReturnSink::default();
  let outcome = catch_unwind(AssertUnwindSafe(|| {
    dispatcher.dispatch(isolate, call_id, values, &mut sink)
  }));
  if outcome.is_err() {
    warn!(call_id, "dispatcher panicked");
    throw_error(scope, "dispatcher panicked", false);
    return;
  }
  sink.apply(scope, &mut rv);
}
