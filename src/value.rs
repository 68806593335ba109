// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use crate::global::Value;

bitflags::bitflags! {
  /// The type tests a [`Value`] satisfies. More than one bit may be set:
  /// a function is also an object.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  #[repr(transparent)]
  pub struct ValueKind: u32 {
    const NULL = 1 << 0;
    const UNDEFINED = 1 << 1;
    const BOOLEAN = 1 << 2;
    const NUMBER = 1 << 3;
    const STRING = 1 << 4;
    const OBJECT = 1 << 5;
    const FUNCTION = 1 << 6;
  }
}

impl ValueKind {
  fn of(value: v8::Local<'_, v8::Value>) -> Self {
    let mut kind = Self::empty();
    kind.set(Self::NULL, value.is_null());
    kind.set(Self::UNDEFINED, value.is_undefined());
    kind.set(Self::BOOLEAN, value.is_boolean());
    kind.set(Self::NUMBER, value.is_number());
    kind.set(Self::STRING, value.is_string());
    kind.set(Self::OBJECT, value.is_object());
    kind.set(Self::FUNCTION, value.is_function());
    kind
  }
}

impl Value<'_> {
  pub fn kind(&self) -> ValueKind {
    self.open(|_, value| ValueKind::of(value))
  }

  pub fn is_null(&self) -> bool {
    self.open(|_, value| value.is_null())
  }

  pub fn is_undefined(&self) -> bool {
    self.open(|_, value| value.is_undefined())
  }

  pub fn is_boolean(&self) -> bool {
    self.open(|_, value| value.is_boolean())
  }

  pub fn is_number(&self) -> bool {
    self.open(|_, value| value.is_number())
  }

  pub fn is_string(&self) -> bool {
    self.open(|_, value| value.is_string())
  }

  pub fn is_object(&self) -> bool {
    self.open(|_, value| value.is_object())
  }

  pub fn is_function(&self) -> bool {
    self.open(|_, value| value.is_function())
  }

  /// `ToInteger`, as a script would see it: `"12.7"` gives 12, `NaN` gives
  /// 0 and out of range values saturate. When the conversion throws (a
  /// `Symbol`, or an object whose `valueOf` throws) the result is 0 and the
  /// exception is discarded.
  pub fn to_integer(&self) -> i64 {
    self.open(|scope, value| {
      v8::tc_scope!(let tc, scope);
      value.integer_value(tc).unwrap_or(0)
    })
  }

  /// `ToNumber`. NaN when the conversion throws.
  pub fn to_number(&self) -> f64 {
    self.open(|scope, value| {
      v8::tc_scope!(let tc, scope);
      value.number_value(tc).unwrap_or(f64::NAN)
    })
  }

  /// `ToBoolean`. Never throws.
  pub fn to_boolean(&self) -> bool {
    self.open(|scope, value| value.boolean_value(scope))
  }

  /// `ToString`, lossily decoded. Empty when the conversion throws.
  pub fn to_rust_string(&self) -> String {
    self.open(|scope, value| {
      v8::tc_scope!(let tc, scope);
      match value.to_string(tc) {
        Some(string) => string.to_rust_string_lossy(tc),
        None => String::new(),
      }
    })
  }

  /// Number of bytes in the UTF-8 encoding of `ToString(value)`, without
  /// any terminator. Lone surrogates count as U+FFFD.
  pub fn utf8_length(&self) -> usize {
    self.open(|scope, value| {
      v8::tc_scope!(let tc, scope);
      match value.to_string(tc) {
        Some(string) => string.utf8_length(tc),
        None => 0,
      }
    })
  }

  /// Writes the UTF-8 encoding of `ToString(value)` into `buffer` and
  /// returns the number of bytes written.
  ///
  /// Never writes past the end of `buffer` and never splits a character:
  /// a short buffer receives the longest prefix of whole characters that
  /// fits. No NUL terminator is written. Size the buffer with
  /// [`Value::utf8_length`] to get the whole string.
  pub fn copy_utf8(&self, buffer: &mut [u8]) -> usize {
    self.open(|scope, value| {
      v8::tc_scope!(let tc, scope);
      match value.to_string(tc) {
        Some(string) => string.write_utf8_v2(
          tc,
          buffer,
          v8::WriteFlags::kReplaceInvalidUtf8,
          None,
        ),
        None => 0,
      }
    })
  }
}
