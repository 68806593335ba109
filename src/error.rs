// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.

/// Failures of the bridge itself. Script-level failures are never reported
/// through this type; they travel as [`crate::Exception`] values.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
  #[error("the V8 platform has already been initialized")]
  AlreadyInitialized,
  #[error("the V8 platform has been disposed")]
  Disposed,
  #[error("null {0} handle")]
  NullHandle(&'static str),
  #[error("{0} is not valid UTF-8")]
  InvalidUtf8(&'static str),
  #[error("{0} is too long for a V8 string")]
  StringTooLong(&'static str),
  #[error("could not install function {0:?} on the global object")]
  FunctionNotInstalled(String),
}
