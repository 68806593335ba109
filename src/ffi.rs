// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.

//! C calling convention for the bridge.
//!
//! Every engine object crosses the boundary as an opaque pointer to the
//! corresponding Rust type: `Platform`, `Isolate`, `Template`, `Context`,
//! `Value`, `ReturnSink`. The host never looks inside them and passes them
//! back unchanged. Each pointer returned by a `create_*`, `evaluate` or
//! `get_property` entry is owned by the caller and released with the
//! matching `dispose_*` entry, exactly once.
//!
//! Nothing unwinds across this boundary. Misuse the bridge can detect (a
//! null token, text that is not UTF-8) is logged and answered with a null
//! pointer, zero or `false`.

use std::ffi::CStr;
use std::ffi::c_char;
use std::ffi::c_int;
use std::ptr;
use std::slice;

use paste::paste;
use tracing::error;

use crate::context::Context;
use crate::error::BridgeError;
use crate::exception::Completion;
use crate::function::Dispatch;
use crate::function::ReturnSink;
use crate::global::Value;
use crate::isolate::Isolate;
use crate::isolate::IsolateConfig;
use crate::platform::Platform;
use crate::platform::PlatformConfig;
use crate::template::Template;

/// The host's handler for calls from script. Receives the isolate, the call
/// id given at registration, `argc` argument values (owned by the callee)
/// and the sink for the call's result.
pub type DispatchFn = unsafe extern "C" fn(
  isolate: *const Isolate,
  call_id: i32,
  args: *const *mut Value<'static>,
  argc: c_int,
  sink: *mut ReturnSink,
);

struct ExternDispatch(DispatchFn);

impl Dispatch for ExternDispatch {
  fn dispatch<'i>(
    &self,
    isolate: &'i Isolate,
    call_id: i32,
    args: Vec<Value<'i>>,
    sink: &mut ReturnSink,
  ) {
    let args = args
      .into_iter()
      .map(|arg| Box::into_raw(Box::new(arg)) as *mut Value<'static>)
      .collect::<Vec<_>>();
    unsafe {
      (self.0)(
        isolate,
        call_id,
        args.as_ptr(),
        args.len() as c_int,
        sink,
      )
    };
  }
}

unsafe fn token<'a, T>(
  ptr: *const T,
  kind: &'static str,
) -> Result<&'a T, BridgeError> {
  unsafe { ptr.as_ref() }.ok_or(BridgeError::NullHandle(kind))
}

unsafe fn token_mut<'a, T>(
  ptr: *mut T,
  kind: &'static str,
) -> Result<&'a mut T, BridgeError> {
  unsafe { ptr.as_mut() }.ok_or(BridgeError::NullHandle(kind))
}

unsafe fn text<'a>(
  ptr: *const c_char,
  what: &'static str,
) -> Result<&'a str, BridgeError> {
  if ptr.is_null() {
    return Err(BridgeError::NullHandle(what));
  }
  unsafe { CStr::from_ptr(ptr) }
    .to_str()
    .map_err(|_| BridgeError::InvalidUtf8(what))
}

fn report<T>(entry: &str, result: Result<T, BridgeError>, fallback: T) -> T {
  result.unwrap_or_else(|err| {
    error!(entry, %err, "bridge call rejected");
    fallback
  })
}

fn into_token<T>(value: T) -> *mut T {
  Box::into_raw(Box::new(value))
}

/// Splits a completion into the value token returned and the exception token
/// written to `exception`. Exactly one of the two is non-null.
unsafe fn complete(
  completion: Completion<'static>,
  exception: *mut *mut Value<'static>,
) -> *mut Value<'static> {
  let (value, thrown) = match completion {
    Ok(value) => (into_token(value), ptr::null_mut()),
    Err(thrown) => (ptr::null_mut(), into_token(thrown.into_value())),
  };
  if !exception.is_null() {
    unsafe { *exception = thrown };
  } else if !thrown.is_null() {
    drop(unsafe { Box::from_raw(thrown) });
  }
  value
}

/// Initializes the engine, configured from the environment (see
/// [`PlatformConfig::from_env`]).
#[unsafe(no_mangle)]
pub extern "C" fn v8_bridge_initialize() -> *mut Platform {
  let result = Platform::initialize(&PlatformConfig::from_env());
  report("initialize", result.map(into_token), ptr::null_mut())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_dispose(platform: *mut Platform) {
  if platform.is_null() {
    return report("dispose", Err(BridgeError::NullHandle("platform")), ());
  }
  unsafe { Box::from_raw(platform) }.dispose();
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_create_isolate(
  platform: *const Platform,
) -> *mut Isolate {
  let result = unsafe { token(platform, "platform") }
    .map(|platform| Isolate::new(platform, &IsolateConfig::default()))
    .map(Box::into_raw);
  report("create_isolate", result, ptr::null_mut())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_dispose_isolate(isolate: *mut Isolate) {
  if !isolate.is_null() {
    unsafe { Box::from_raw(isolate) }.dispose();
  }
}

/// Installs `dispatch` as the isolate's handler for bridged calls; `None`
/// removes it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_set_dispatcher(
  isolate: *const Isolate,
  dispatch: Option<DispatchFn>,
) {
  let result = unsafe { token(isolate, "isolate") }.map(|isolate| {
    match dispatch {
      Some(dispatch) => isolate.set_dispatcher(ExternDispatch(dispatch)),
      None => isolate.clear_dispatcher(),
    }
  });
  report("set_dispatcher", result, ())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_create_template(
  isolate: *const Isolate,
) -> *mut Template<'static> {
  let result = unsafe { token(isolate, "isolate") }
    .map(|isolate| into_token(Template::new(isolate)));
  report("create_template", result, ptr::null_mut())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_dispose_template(
  template: *mut Template<'static>,
) {
  if !template.is_null() {
    drop(unsafe { Box::from_raw(template) });
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_create_context(
  isolate: *const Isolate,
  template: *const Template<'static>,
) -> *mut Context<'static> {
  let result = unsafe { token(isolate, "isolate") }.and_then(|isolate| {
    let template = unsafe { token(template, "template") }?;
    Ok(into_token(Context::new(isolate, template)))
  });
  report("create_context", result, ptr::null_mut())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_dispose_context(
  context: *mut Context<'static>,
) {
  if !context.is_null() {
    drop(unsafe { Box::from_raw(context) });
  }
}

/// Runs `source` in `context`. Returns the result, or null with the thrown
/// value stored in `*exception`. `*exception` is set to null on success.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_evaluate(
  isolate: *const Isolate,
  context: *const Context<'static>,
  source: *const c_char,
  exception: *mut *mut Value<'static>,
) -> *mut Value<'static> {
  let result = (|| -> Result<_, BridgeError> {
    unsafe { token(isolate, "isolate") }?;
    let context = unsafe { token(context, "context") }?;
    let source = unsafe { text(source, "script source") }?;
    Ok(context.evaluate(source))
  })();
  match result {
    Ok(completion) => unsafe { complete(completion, exception) },
    Err(err) => {
      if !exception.is_null() {
        unsafe { *exception = ptr::null_mut() };
      }
      report("evaluate", Err(err), ptr::null_mut())
    }
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_dispose_value(value: *mut Value<'static>) {
  if !value.is_null() {
    drop(unsafe { Box::from_raw(value) });
  }
}

unsafe fn with_value<R>(
  entry: &str,
  isolate: *const Isolate,
  value: *const Value<'static>,
  fallback: R,
  f: impl FnOnce(&Value<'static>) -> R,
) -> R {
  let result = unsafe { token(isolate, "isolate") }
    .and_then(|_| unsafe { token(value, "value") })
    .map(f);
  report(entry, result, fallback)
}

macro_rules! value_predicate {
  ($($name:ident),* $(,)?) => {
    paste! {
      $(
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn [<v8_bridge_ $name>](
          isolate: *const Isolate,
          value: *const Value<'static>,
        ) -> bool {
          unsafe {
            with_value(stringify!($name), isolate, value, false, |value| {
              value.$name()
            })
          }
        }
      )*
    }
  };
}

value_predicate!(
  is_null,
  is_undefined,
  is_boolean,
  is_number,
  is_string,
  is_object,
  is_function,
);

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_value_to_int(
  isolate: *const Isolate,
  value: *const Value<'static>,
) -> i64 {
  unsafe { with_value("value_to_int", isolate, value, 0, Value::to_integer) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_value_to_number(
  isolate: *const Isolate,
  value: *const Value<'static>,
) -> f64 {
  unsafe {
    with_value("value_to_number", isolate, value, f64::NAN, Value::to_number)
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_value_to_boolean(
  isolate: *const Isolate,
  value: *const Value<'static>,
) -> bool {
  unsafe {
    with_value("value_to_boolean", isolate, value, false, Value::to_boolean)
  }
}

/// The [`crate::ValueKind`] bits of `value`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_value_kind(
  isolate: *const Isolate,
  value: *const Value<'static>,
) -> u32 {
  unsafe {
    with_value("value_kind", isolate, value, 0, |value| value.kind().bits())
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_utf8_length(
  isolate: *const Isolate,
  value: *const Value<'static>,
) -> usize {
  unsafe { with_value("utf8_length", isolate, value, 0, Value::utf8_length) }
}

/// Copies at most `length` bytes of the value's UTF-8 string into `buffer`
/// and returns the number of bytes copied. No NUL is appended.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_copy_utf8(
  isolate: *const Isolate,
  value: *const Value<'static>,
  buffer: *mut c_char,
  length: usize,
) -> usize {
  if buffer.is_null() {
    return report("copy_utf8", Err(BridgeError::NullHandle("buffer")), 0);
  }
  let buffer =
    unsafe { slice::from_raw_parts_mut(buffer.cast::<u8>(), length) };
  unsafe {
    with_value("copy_utf8", isolate, value, 0, |value| {
      value.copy_utf8(buffer)
    })
  }
}

/// Registers `name` as a bridged function with `call_id`, on `template` and
/// on the global object of `context`. Returns `false` when nothing was
/// registered.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_register_function(
  isolate: *const Isolate,
  context: *const Context<'static>,
  template: *const Template<'static>,
  name: *const c_char,
  call_id: i32,
) -> bool {
  let result = (|| -> Result<_, BridgeError> {
    unsafe { token(isolate, "isolate") }?;
    let context = unsafe { token(context, "context") }?;
    let template = unsafe { token(template, "template") }?;
    let name = unsafe { text(name, "function name") }?;
    context.register_function(template, name, call_id)?;
    Ok(true)
  })();
  report("register_function", result, false)
}

unsafe fn with_sink(
  entry: &str,
  isolate: *const Isolate,
  sink: *mut ReturnSink,
  f: impl FnOnce(&mut ReturnSink),
) {
  let result = unsafe { token(isolate, "isolate") }
    .and_then(|_| unsafe { token_mut(sink, "return sink") })
    .map(f);
  report(entry, result, ())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_set_return_value_undefined(
  isolate: *const Isolate,
  sink: *mut ReturnSink,
) {
  unsafe {
    with_sink(
      "set_return_value_undefined",
      isolate,
      sink,
      ReturnSink::set_undefined,
    )
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_set_return_value_null(
  isolate: *const Isolate,
  sink: *mut ReturnSink,
) {
  unsafe {
    with_sink("set_return_value_null", isolate, sink, ReturnSink::set_null)
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_set_return_value_boolean(
  isolate: *const Isolate,
  sink: *mut ReturnSink,
  value: bool,
) {
  unsafe {
    with_sink("set_return_value_boolean", isolate, sink, |sink| {
      sink.set_boolean(value)
    })
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_set_return_value_number(
  isolate: *const Isolate,
  sink: *mut ReturnSink,
  value: f64,
) {
  unsafe {
    with_sink("set_return_value_number", isolate, sink, |sink| {
      sink.set_number(value)
    })
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_set_return_value_string(
  isolate: *const Isolate,
  sink: *mut ReturnSink,
  value: *const c_char,
) {
  let value = match unsafe { text(value, "return value") } {
    Ok(value) => value,
    Err(err) => return report("set_return_value_string", Err(err), ()),
  };
  unsafe {
    with_sink("set_return_value_string", isolate, sink, |sink| {
      sink.set_string(value)
    })
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_set_return_value_empty_string(
  isolate: *const Isolate,
  sink: *mut ReturnSink,
) {
  unsafe {
    with_sink(
      "set_return_value_empty_string",
      isolate,
      sink,
      ReturnSink::set_empty_string,
    )
  }
}

/// Reads property `key` of `value`. Returns the property, or null with the
/// thrown value stored in `*exception`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn v8_bridge_get_property(
  isolate: *const Isolate,
  value: *const Value<'static>,
  key: *const c_char,
  exception: *mut *mut Value<'static>,
) -> *mut Value<'static> {
  let result = (|| -> Result<_, BridgeError> {
    unsafe { token(isolate, "isolate") }?;
    let value = unsafe { token(value, "value") }?;
    let key = unsafe { text(key, "property key") }?;
    Ok(value.get_property(key))
  })();
  match result {
    Ok(completion) => unsafe { complete(completion, exception) },
    Err(err) => {
      if !exception.is_null() {
        unsafe { *exception = ptr::null_mut() };
      }
      report("get_property", Err(err), ptr::null_mut())
    }
  }
}
