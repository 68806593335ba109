// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use crate::exception::Completion;
use crate::exception::Exception;
use crate::global::Value;

impl<'i> Value<'i> {
  /// Reads the named property `key` of `ToObject(self)`.
  ///
  /// The lookup follows the prototype chain but bypasses interceptors.
  /// Accessors do run, so a throwing getter produces an `Err`, as does a
  /// receiver that cannot be converted to an object (`null`,
  /// `undefined`). A property that does not exist anywhere on the chain is
  /// `Ok(undefined)`.
  pub fn get_property(&self, key: &str) -> Completion<'i> {
    let isolate = self.isolate();
    self.open(|scope, value| {
      v8::tc_scope!(let tc, scope);

      let Some(key) = v8::String::new(tc, key) else {
        return Err(Exception::range_error(
          isolate,
          tc,
          "property key is too long",
        ));
      };
      let Some(object) = value.to_object(tc) else {
        let exception = tc.exception();
        return Err(Exception::caught(isolate, tc, exception));
      };

      match object.get_real_named_property(tc, key.into()) {
        Some(property) => Ok(Value::promote(isolate, tc, property)),
        None if tc.has_caught() => {
          let exception = tc.exception();
          Err(Exception::caught(isolate, tc, exception))
        }
        None => {
          let undefined = v8::undefined(tc);
          Ok(Value::promote(isolate, tc, undefined.into()))
        }
      }
    })
  }
}
