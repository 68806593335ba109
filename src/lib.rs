// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.

//! # Example
//!
//! ```rust,no_run
//! use v8_bridge::*;
//!
//! let platform = Platform::initialize(&PlatformConfig::default()).unwrap();
//! let isolate = Isolate::new(&platform, &IsolateConfig::default());
//!
//! let template = Template::new(&isolate);
//! let context = Context::new(&isolate, &template);
//!
//! let result = context.evaluate("'Hello' + ' World!'").unwrap();
//! assert!(result.is_string());
//! println!("result: {}", result.to_rust_string());
//! ```
//!
//! # Handles and scopes
//!
//! V8 hands out `Local` handles that are only valid inside a `HandleScope`,
//! which itself is only valid while the isolate is locked and entered. A host
//! language wants the opposite: long-lived handles it can keep anywhere and
//! release one at a time.
//!
//! Every object of this crate ([`Template`], [`Context`], [`Value`]) is
//! therefore a persistent (`Global`) handle bundled with the isolate it
//! belongs to. Each operation on it re-establishes the full scope stack for
//! the duration of the call only: the isolate is locked with a `v8::Locker`
//! (which also enters it), a `HandleScope` is opened, and for values the
//! originating context is entered. Everything is torn down in reverse order
//! when the call returns or unwinds. Nothing `Local` ever escapes.
//!
//! A call made on the thread that already holds the lock reuses it, so a
//! [`Dispatch`] implementation invoked from script may freely use the values
//! it receives. Other threads wait until the lock is released.
//!
//! Script failures are not Rust errors. [`Context::evaluate`] and
//! [`Value::get_property`] return a [`Completion`]: the result value, or the
//! thrown value captured as an [`Exception`].
//!
//! The [`ffi`] module exposes the same operations as opaque pointers for a
//! C calling convention.

#![allow(clippy::missing_safety_doc)]

mod allocator;
mod context;
mod error;
mod exception;
mod function;
mod global;
mod isolate;
mod locker;
mod platform;
mod property;
mod script;
mod template;
mod value;

pub mod ffi;

pub use allocator::AllocatorStats;
pub use allocator::BufferAllocator;
pub use context::Context;
pub use error::BridgeError;
pub use exception::Completion;
pub use exception::Exception;
pub use function::Dispatch;
pub use function::ReturnKind;
pub use function::ReturnSink;
pub use global::Value;
pub use isolate::Isolate;
pub use isolate::IsolateConfig;
pub use platform::Platform;
pub use platform::PlatformConfig;
pub use template::Template;
pub use value::ValueKind;
