// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use crate::context::Context;
use crate::exception::Completion;
use crate::exception::Exception;
use crate::global::Value;

impl<'i> Context<'i> {
  /// Compiles and runs `source` as a classic script in this context.
  ///
  /// Returns the completion value of the script, or the exception thrown
  /// while compiling or running it. Nothing that was thrown escapes into
  /// the engine.
  pub fn evaluate(&self, source: &str) -> Completion<'i> {
    let isolate = self.isolate();
    isolate.with_context(self.context.global(), |scope| {
      v8::tc_scope!(let tc, scope);

      let Some(code) = v8::String::new(tc, source) else {
        return Err(Exception::range_error(
          isolate,
          tc,
          "script source is too long",
        ));
      };

      let result = v8::Script::compile(tc, code, None)
        .and_then(|script| script.run(tc));
      match result {
        Some(value) => Ok(Value::promote(isolate, tc, value)),
        None => {
          let exception = tc.exception();
          Err(Exception::caught(isolate, tc, exception))
        }
      }
    })
  }
}
