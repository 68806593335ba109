// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::fmt::{self, Debug, Formatter};

use tracing::debug;

use crate::error::BridgeError;
use crate::function::bridge_callback;
use crate::global::Persistent;
use crate::isolate::Isolate;
use crate::template::Template;

/// A script execution environment: one global object, shaped by a
/// [`Template`].
pub struct Context<'i> {
  pub(crate) context: Persistent<'i, v8::Context>,
}

impl<'i> Context<'i> {
  pub fn new(isolate: &'i Isolate, template: &Template<'i>) -> Self {
    let context = isolate.with_scope(|scope| {
      let global_template = template.template.open(scope);
      let context = v8::Context::new(
        scope,
        v8::ContextOptions {
          global_template: Some(global_template),
          ..Default::default()
        },
      );
      Persistent::new(isolate, scope, context)
    });
    debug!(?isolate, "context created");
    Self { context }
  }

  pub fn isolate(&self) -> &'i Isolate {
    self.context.isolate()
  }

  /// Makes a host function available to scripts as the global `name`.
  ///
  /// The function is added to `template`, so every context created from it
  /// afterwards has it too. The set of template functions of an existing
  /// context is fixed when the context is created, so the function is also
  /// defined on this context's global object. The global object itself is
  /// left in place: globals defined so far, including functions registered
  /// earlier, survive, and values referring to it stay valid.
  ///
  /// Calls from script are routed to the isolate's [`crate::Dispatch`]
  /// together with `call_id`.
  pub fn register_function(
    &self,
    template: &Template<'i>,
    name: &str,
    call_id: i32,
  ) -> Result<(), BridgeError> {
    let isolate = self.isolate();
    isolate.with_context(self.context.global(), |scope| {
      v8::tc_scope!(let tc, scope);

      let key = v8::String::new(tc, name)
        .ok_or(BridgeError::StringTooLong("function name"))?;
      let data = v8::Integer::new(tc, call_id);
      let function = v8::FunctionTemplate::builder(bridge_callback)
        .data(data.into())
        .build(tc);
      template.template.open(tc).set(key.into(), function.into());

      let global = tc.get_current_context().global(tc);
      let installed = function
        .get_function(tc)
        .and_then(|function| global.set(tc, key.into(), function.into()));
      match installed {
        Some(true) => Ok(()),
        _ => Err(BridgeError::FunctionNotInstalled(name.to_owned())),
      }
    })?;
    debug!(?isolate, name, call_id, "function registered");
    Ok(())
  }

  pub fn dispose(self) {
    drop(self);
  }
}

impl Drop for Context<'_> {
  fn drop(&mut self) {
    debug!(isolate = ?self.isolate(), "context disposed");
  }
}

impl Debug for Context<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context")
      .field("isolate", self.isolate())
      .finish_non_exhaustive()
  }
}
