// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::Deref;

use crate::global::Value;
use crate::isolate::Isolate;

/// Outcome of an operation that runs JavaScript: the resulting value, or the
/// value that was thrown. Exactly one of the two is produced.
pub type Completion<'i> = Result<Value<'i>, Exception<'i>>;

/// A thrown JavaScript value, captured by a `TryCatch` and promoted to a
/// persistent [`Value`] like any other.
pub struct Exception<'i> {
  value: Value<'i>,
  message: String,
}

impl<'i> Exception<'i> {
  /// Wraps the exception caught by a `TryCatch`. When nothing was thrown
  /// (execution was terminated) the exception value is `undefined`.
  pub(crate) fn caught(
    isolate: &'i Isolate,
    scope: &v8::PinScope<'_, '_>,
    exception: Option<v8::Local<'_, v8::Value>>,
  ) -> Self {
    match exception {
      Some(exception) => {
        let message = match exception.to_string(scope) {
          Some(message) => message.to_rust_string_lossy(scope),
          None => String::from("<unprintable exception>"),
        };
        Self {
          value: Value::promote(isolate, scope, exception),
          message,
        }
      }
      None => {
        let undefined = v8::undefined(scope);
        Self {
          value: Value::promote(isolate, scope, undefined.into()),
          message: String::from("execution terminated"),
        }
      }
    }
  }

  /// A `RangeError` created by the bridge itself, for inputs the engine
  /// refuses before any script runs.
  pub(crate) fn range_error(
    isolate: &'i Isolate,
    scope: &v8::PinScope<'_, '_>,
    message: &str,
  ) -> Self {
    let value = match v8::String::new(scope, message) {
      Some(text) => v8::Exception::range_error(scope, text),
      None => v8::undefined(scope).into(),
    };
    Self {
      value: Value::promote(isolate, scope, value),
      message: format!("RangeError: {message}"),
    }
  }

  /// The engine's string conversion of the thrown value, taken when it was
  /// caught.
  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn value(&self) -> &Value<'i> {
    &self.value
  }

  pub fn into_value(self) -> Value<'i> {
    self.value
  }
}

impl<'i> Deref for Exception<'i> {
  type Target = Value<'i>;

  fn deref(&self) -> &Self::Target {
    &self.value
  }
}

impl Display for Exception<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)
  }
}

impl Debug for Exception<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.debug_struct("Exception")
      .field("message", &self.message)
      .finish_non_exhaustive()
  }
}

impl std::error::Error for Exception<'_> {}
