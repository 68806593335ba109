// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::fmt::{self, Debug, Formatter};

use tracing::debug;

use crate::global::Persistent;
use crate::isolate::Isolate;

/// The blueprint of a context's global object.
///
/// Functions registered through [`crate::Context::register_function`] are
/// added here, so every context created from the template afterwards sees
/// them too.
pub struct Template<'i> {
  pub(crate) template: Persistent<'i, v8::ObjectTemplate>,
}

impl<'i> Template<'i> {
  pub fn new(isolate: &'i Isolate) -> Self {
    let template = isolate.with_scope(|scope| {
      let template = v8::ObjectTemplate::new(scope);
      Persistent::new(isolate, scope, template)
    });
    debug!(?isolate, "template created");
    Self { template }
  }

  pub fn isolate(&self) -> &'i Isolate {
    self.template.isolate()
  }

  pub fn dispose(self) {
    drop(self);
  }
}

impl Drop for Template<'_> {
  fn drop(&mut self) {
    debug!(isolate = ?self.isolate(), "template disposed");
  }
}

impl Debug for Template<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.debug_struct("Template")
      .field("isolate", self.isolate())
      .finish_non_exhaustive()
  }
}
