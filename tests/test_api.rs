// Copyright 2019-2021 the Deno authors. All rights reserved. MIT license.
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use v8_bridge::*;

fn setup() -> &'static Platform {
  static PLATFORM: OnceLock<Platform> = OnceLock::new();
  PLATFORM.get_or_init(|| {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
    Platform::initialize(&PlatformConfig::default()).unwrap()
  })
}

fn new_isolate() -> Box<Isolate> {
  Isolate::new(setup(), &IsolateConfig::default())
}

#[test]
fn evaluate_number() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let result = context.evaluate("40 + 2").unwrap();
  assert!(result.is_number());
  assert_eq!(result.to_integer(), 42);
  assert_eq!(result.kind(), ValueKind::NUMBER);
}

#[test]
fn classify_values() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let null = context.evaluate("null").unwrap();
  assert!(null.is_null());
  assert!(!null.is_undefined());
  assert!(!null.is_object());

  let undefined = context.evaluate("undefined").unwrap();
  assert!(undefined.is_undefined());
  assert!(!undefined.is_null());

  // A bare `{}` is an empty block, its completion value is undefined.
  let object = context.evaluate("({})").unwrap();
  assert!(object.is_object());
  assert!(!object.is_function());

  let boolean = context.evaluate("1 < 2").unwrap();
  assert!(boolean.is_boolean());
  assert!(boolean.to_boolean());

  let string = context.evaluate("'a' + 'b'").unwrap();
  assert!(string.is_string());
  assert_eq!(string.kind(), ValueKind::STRING);

  let function = context.evaluate("(function f() {})").unwrap();
  assert_eq!(function.kind(), ValueKind::OBJECT | ValueKind::FUNCTION);
}

#[test]
fn values_are_independent_handles() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  context.evaluate("var shared = { n: 1 }").unwrap();
  let a = context.evaluate("shared").unwrap();
  let b = context.evaluate("shared").unwrap();
  a.dispose();
  assert_eq!(b.get_property("n").unwrap().to_integer(), 1);
}

#[test]
fn syntax_error_is_exception() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let err = context.evaluate("{").unwrap_err();
  assert!(err.is_object());
  assert!(err.message().starts_with("SyntaxError"), "{}", err);
}

#[test]
fn thrown_values_are_captured() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let err = context.evaluate("throw new Error('boom')").unwrap_err();
  assert_eq!(err.to_string(), "Error: boom");
  assert_eq!(err.get_property("message").unwrap().to_rust_string(), "boom");

  let err = context.evaluate("throw 42").unwrap_err();
  assert!(err.is_number());
  assert_eq!(err.into_value().to_integer(), 42);

  // The context is still usable after a failure.
  assert_eq!(context.evaluate("1 + 1").unwrap().to_integer(), 2);
}

#[test]
fn globals_persist_between_evaluations() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  context.evaluate("var counter = 10").unwrap();
  context.evaluate("counter += 5").unwrap();
  assert_eq!(context.evaluate("counter").unwrap().to_integer(), 15);
}

#[test]
fn utf8_round_trip() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  for text in ["", "hello", "héllo wörld", "日本語", "emoji 🎉!", "a\u{0}b"] {
    let source = format!("var s = {}; s", js_string_literal(text));
    let value = context.evaluate(&source).unwrap();
    let length = value.utf8_length();
    assert_eq!(length, text.len());

    let mut buffer = vec![0u8; length];
    assert_eq!(value.copy_utf8(&mut buffer), length);
    assert_eq!(buffer, text.as_bytes());
    assert_eq!(value.to_rust_string(), text);
  }
}

fn js_string_literal(text: &str) -> String {
  let mut literal = String::from("\"");
  for c in text.chars() {
    literal.push_str(&format!("\\u{{{:x}}}", c as u32));
  }
  literal.push('"');
  literal
}

#[test]
fn truncated_copy_never_overruns() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let value = context.evaluate("'日本語'").unwrap();
  assert_eq!(value.utf8_length(), 9);

  let mut buffer = [0xaau8; 8];
  let written = value.copy_utf8(&mut buffer[..4]);
  assert_eq!(written, 3);
  assert_eq!(&buffer[..3], "日".as_bytes());
  assert_eq!(&buffer[3..], &[0xaa; 5]);

  assert_eq!(value.copy_utf8(&mut []), 0);
}

#[test]
fn utf8_of_non_strings() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let number = context.evaluate("4.5").unwrap();
  assert_eq!(number.utf8_length(), 3);
  assert_eq!(number.to_rust_string(), "4.5");

  let object = context.evaluate("({})").unwrap();
  assert_eq!(object.to_rust_string(), "[object Object]");
}

#[test]
fn coercions() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let eval = |source: &str| context.evaluate(source).unwrap();
  assert_eq!(eval("'12.7'").to_integer(), 12);
  assert_eq!(eval("-3.9").to_integer(), -3);
  assert_eq!(eval("NaN").to_integer(), 0);
  assert_eq!(eval("true").to_integer(), 1);
  assert_eq!(eval("Symbol()").to_integer(), 0);
  assert_eq!(eval("'0x10'").to_number(), 16.0);
  assert!(eval("'abc'").to_number().is_nan());
  assert!(eval("Symbol()").to_number().is_nan());
  assert!(!eval("''").to_boolean());
  assert!(eval("[]").to_boolean());

  // A failed coercion leaves nothing pending in the isolate.
  assert_eq!(eval("'still' + ' fine'").to_rust_string(), "still fine");
}

#[test]
fn get_property() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let object = context
    .evaluate("({ a: 1, s: 'x', get bad() { throw new Error('nope') } })")
    .unwrap();
  assert_eq!(object.get_property("a").unwrap().to_integer(), 1);
  assert_eq!(object.get_property("s").unwrap().to_rust_string(), "x");

  let missing = object.get_property("missing").unwrap();
  assert!(missing.is_undefined());

  let err = object.get_property("bad").unwrap_err();
  assert_eq!(err.to_string(), "Error: nope");

  let inherited = context.evaluate("Object.create({ up: 5 })").unwrap();
  assert_eq!(inherited.get_property("up").unwrap().to_integer(), 5);
}

#[test]
fn get_property_of_null_throws() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let null = context.evaluate("null").unwrap();
  let err = null.get_property("x").unwrap_err();
  assert!(err.message().starts_with("TypeError"), "{}", err);
}

#[derive(Debug, Clone, PartialEq)]
struct Call {
  call_id: i32,
  args: Vec<String>,
  kinds: Vec<ValueKind>,
}

#[derive(Default)]
struct Recorder {
  calls: Mutex<Vec<Call>>,
}

impl Recorder {
  fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }
}

struct Recording(Arc<Recorder>, ReturnKind);

impl Dispatch for Recording {
  fn dispatch<'i>(
    &self,
    _isolate: &'i Isolate,
    call_id: i32,
    args: Vec<Value<'i>>,
    sink: &mut ReturnSink,
  ) {
    let call = Call {
      call_id,
      args: args.iter().map(|arg| arg.to_rust_string()).collect(),
      kinds: args.iter().map(|arg| arg.kind()).collect(),
    };
    self.0.calls.lock().unwrap().push(call);
    sink.set(self.1.clone());
  }
}

#[test]
fn function_dispatch() {
  let isolate = new_isolate();
  let recorder = Arc::new(Recorder::default());
  isolate.set_dispatcher(Recording(
    recorder.clone(),
    ReturnKind::String("ok".into()),
  ));

  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  context.register_function(&template, "hostCall", 7).unwrap();

  let result = context.evaluate("hostCall(1, 'x')").unwrap();
  assert!(result.is_string());
  assert_eq!(result.to_rust_string(), "ok");

  assert_eq!(
    recorder.calls(),
    vec![Call {
      call_id: 7,
      args: vec!["1".into(), "x".into()],
      kinds: vec![ValueKind::NUMBER, ValueKind::STRING],
    }]
  );
}

#[test]
fn zero_argument_call() {
  let isolate = new_isolate();
  let recorder = Arc::new(Recorder::default());
  isolate.set_dispatcher(Recording(recorder.clone(), ReturnKind::Null));

  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  context.register_function(&template, "noArgs", 1).unwrap();

  assert!(context.evaluate("noArgs()").unwrap().is_null());
  assert_eq!(recorder.calls()[0].args, Vec::<String>::new());
}

#[test]
fn registration_keeps_global_state() {
  let isolate = new_isolate();
  let recorder = Arc::new(Recorder::default());
  isolate.set_dispatcher(Recording(recorder.clone(), ReturnKind::Undefined));

  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  context.evaluate("var before = 'kept'").unwrap();

  context.register_function(&template, "first", 1).unwrap();
  context.register_function(&template, "second", 2).unwrap();

  let result = context.evaluate("first(); second(); before").unwrap();
  assert_eq!(result.to_rust_string(), "kept");

  let same = context.evaluate("globalThis").unwrap();
  assert_eq!(same.get_property("before").unwrap().to_rust_string(), "kept");

  let ids: Vec<_> = recorder.calls().iter().map(|c| c.call_id).collect();
  assert_eq!(ids, [1, 2]);
}

#[test]
fn registration_keeps_global_identity() {
  let isolate = new_isolate();
  isolate
    .set_dispatch_fn(|_, call_id, _, sink| sink.set_number(call_id.into()));

  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  context
    .evaluate("var saved = globalThis; globalThis.marker = 'm'")
    .unwrap();
  let global = context.evaluate("globalThis").unwrap();

  context.register_function(&template, "three", 3).unwrap();

  let same = context.evaluate("saved === globalThis").unwrap();
  assert!(same.to_boolean());
  let via_saved = context.evaluate("saved.three() + saved.marker").unwrap();
  assert_eq!(via_saved.to_rust_string(), "3m");

  // A handle taken before the registration sees the new function.
  let function = global.get_property("three").unwrap();
  assert!(function.is_function());
  assert_eq!(global.get_property("marker").unwrap().to_rust_string(), "m");
}

#[test]
fn registration_is_idempotent_per_name() {
  let isolate = new_isolate();
  isolate
    .set_dispatch_fn(|_, call_id, _, sink| sink.set_number(call_id.into()));

  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  context.register_function(&template, "f", 1).unwrap();
  context.register_function(&template, "f", 2).unwrap();
  assert_eq!(context.evaluate("f()").unwrap().to_integer(), 2);

  let later = Context::new(&isolate, &template);
  assert_eq!(later.evaluate("f()").unwrap().to_integer(), 2);
}

#[test]
fn return_kinds() {
  let isolate = new_isolate();
  isolate.set_dispatch_fn(|_, call_id, _, sink| match call_id {
    1 => sink.set_undefined(),
    2 => sink.set_null(),
    3 => sink.set_boolean(true),
    4 => sink.set_number(2.5),
    5 => sink.set_string("s"),
    6 => sink.set_empty_string(),
    7 => {
      sink.set_number(1.0);
      sink.set_boolean(false);
    }
    _ => {}
  });

  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  for call_id in 0..=7 {
    let name = format!("r{call_id}");
    context.register_function(&template, &name, call_id).unwrap();
  }

  let result = context
    .evaluate(
      "[r0() === undefined, r1() === undefined, r2() === null, \
       r3() === true, r4() === 2.5, r5() === 's', r6() === '', \
       r7() === false].join()",
    )
    .unwrap();
  assert_eq!(
    result.to_rust_string(),
    "true,true,true,true,true,true,true,true"
  );
}

#[test]
fn dispatcher_can_reenter() {
  let isolate = new_isolate();
  isolate.set_dispatch_fn(|_, _, args, sink| {
    let x = args[0].get_property("x").unwrap().to_integer();
    sink.set_number((x * 2) as f64);
  });

  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  context.register_function(&template, "double", 0).unwrap();

  let result = context.evaluate("double({ x: 21 })").unwrap();
  assert_eq!(result.to_integer(), 42);
}

#[test]
fn dispatcher_can_evaluate() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  context.register_function(&template, "outer", 0).unwrap();
  context.evaluate("var inner = 3").unwrap();

  let seen_args = Arc::new(Mutex::new(Vec::new()));
  let seen = seen_args.clone();
  isolate.set_dispatch_fn(move |_, _, args, sink| {
    let n = args[0].to_integer();
    seen.lock().unwrap().push(n);
    sink.set_number((n + 1) as f64);
  });

  let result = context.evaluate("outer(inner) + outer(1)").unwrap();
  assert_eq!(result.to_integer(), 6);
  assert_eq!(*seen_args.lock().unwrap(), [3, 1]);
}

#[test]
fn missing_dispatcher_throws() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  context.register_function(&template, "orphan", 9).unwrap();

  let err = context.evaluate("orphan()").unwrap_err();
  assert_eq!(err.to_string(), "Error: no dispatcher registered for call id 9");

  let caught = context
    .evaluate("try { orphan() } catch (e) { e instanceof Error }")
    .unwrap();
  assert!(caught.to_boolean());

  isolate.set_dispatch_fn(|_, _, _, sink| sink.set_boolean(true));
  assert!(context.evaluate("orphan()").unwrap().to_boolean());
  isolate.clear_dispatcher();
  assert!(context.evaluate("orphan()").is_err());
}

#[test]
fn panicking_dispatcher_throws() {
  let isolate = new_isolate();
  isolate.set_dispatch_fn(|_, _, _, _| panic!("host failure"));

  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  context.register_function(&template, "fragile", 0).unwrap();

  let err = context.evaluate("fragile()").unwrap_err();
  assert_eq!(err.to_string(), "Error: dispatcher panicked");
}

#[test]
fn contexts_share_template_functions() {
  let isolate = new_isolate();
  isolate
    .set_dispatch_fn(|_, call_id, _, sink| sink.set_number(call_id.into()));

  let template = Template::new(&isolate);
  let first = Context::new(&isolate, &template);
  first.register_function(&template, "id", 5).unwrap();

  let second = Context::new(&isolate, &template);
  assert_eq!(second.evaluate("id()").unwrap().to_integer(), 5);

  first.evaluate("var onlyFirst = 1").unwrap();
  let missing = second.evaluate("typeof onlyFirst").unwrap();
  assert_eq!(missing.to_rust_string(), "undefined");
}

#[test]
fn array_buffers_use_bridge_allocator() {
  let platform = setup();
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let before = platform.allocator_stats();
  let buffer = context.evaluate("new ArrayBuffer(4096)").unwrap();
  let after = platform.allocator_stats();
  assert!(buffer.is_object());
  assert!(after.total_allocations > before.total_allocations);

  let zeroed = context
    .evaluate("new Uint8Array(new ArrayBuffer(64)).every(b => b === 0)")
    .unwrap();
  assert!(zeroed.to_boolean());
}

#[test]
fn heap_limits() {
  let config = IsolateConfig::default().heap_limits(0, 64 * 1024 * 1024);
  let isolate = Isolate::new(setup(), &config);
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  let result = context.evaluate("new Array(1000).fill(1).length").unwrap();
  assert_eq!(result.to_integer(), 1000);
}

#[test]
fn dispose_in_dependency_order() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);
  let value = context.evaluate("'bye'").unwrap();

  value.dispose();
  context.dispose();
  template.dispose();
  isolate.dispose();
}

#[test]
fn debug_output() {
  let isolate = new_isolate();
  let template = Template::new(&isolate);
  let context = Context::new(&isolate, &template);

  let value = context.evaluate("1").unwrap();
  assert!(format!("{value:?}").contains("NUMBER"));

  let err = context.evaluate("throw 'x'").unwrap_err();
  assert!(format!("{err:?}").contains("\"x\""));
}
