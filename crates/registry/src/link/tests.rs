use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::catalog::Catalog;
use crate::core::construct::{BuildCx, CtorImpl, CtorSig, CtorSpec, Instance, MethodSpec};
use crate::core::decl::{Candidate, CapabilityDecl, ForwardMarker, ForwardMode, ImplDecl, OverrideDecl};
use crate::core::ids::{CapabilityId, ModuleId, ModulePriority};
use crate::core::value::{Value, ValueKind};
use crate::error::{CallError, CtorError, RuntimeError};
use crate::instance::Runtime;

fn runtime(feed: Vec<Candidate>) -> Runtime {
	let modules: rustc_hash::FxHashMap<ModuleId, ModulePriority> = [
		(ModuleId("core"), ModulePriority(0)),
		(ModuleId("game"), ModulePriority(10)),
	]
	.into_iter()
	.collect();
	match Catalog::build(feed, &modules) {
		Ok(catalog) => Runtime::new(Arc::new(catalog)),
		Err(err) => panic!("catalog build failed: {err}"),
	}
}

fn recv_as<'a, T: Any>(
	recv: &'a (dyn Any + Send + Sync),
	method: &'static str,
) -> Result<&'a T, CallError> {
	recv.downcast_ref::<T>().ok_or(CallError::Invoke {
		method,
		message: "wrong receiver type".to_owned(),
	})
}

// -- base implementation ------------------------------------------------

struct Lower {
	log: Mutex<String>,
}

fn build_lower(_cx: &mut BuildCx, _args: &[Value]) -> Result<Instance, CtorError> {
	Ok(Arc::new(Lower {
		log: Mutex::new(String::new()),
	}))
}

fn lower_who(recv: &(dyn Any + Send + Sync), _args: &[Value]) -> Result<Value, CallError> {
	let _ = recv_as::<Lower>(recv, "who")?;
	Ok(Value::Str("LOWER".to_owned()))
}

fn lower_sum(recv: &(dyn Any + Send + Sync), args: &[Value]) -> Result<Value, CallError> {
	let _ = recv_as::<Lower>(recv, "sum")?;
	Ok(Value::Int(args[0].as_i64()? + args[1].as_i64()?))
}

fn lower_mul2(recv: &(dyn Any + Send + Sync), args: &[Value]) -> Result<Value, CallError> {
	let _ = recv_as::<Lower>(recv, "mul2")?;
	Ok(Value::Int(args[0].as_i64()? * 2))
}

fn lower_half(recv: &(dyn Any + Send + Sync), args: &[Value]) -> Result<Value, CallError> {
	let _ = recv_as::<Lower>(recv, "half")?;
	Ok(Value::Float(args[0].as_f64()? / 2.0))
}

fn lower_append(recv: &(dyn Any + Send + Sync), args: &[Value]) -> Result<Value, CallError> {
	let lower = recv_as::<Lower>(recv, "append")?;
	lower.log.lock().push_str(args[0].as_str()?);
	Ok(Value::Unit)
}

static SVC_CAP: CapabilityDecl = CapabilityDecl {
	id: CapabilityId("svc"),
	allow_multiple: false,
	force_definition: false,
	tokens: &[],
};

static LOWER_IMPL: ImplDecl = ImplDecl {
	capability: Some(CapabilityId("svc")),
	module: Some(ModuleId("core")),
	ctor: CtorSpec::Standard(&[CtorImpl {
		sig: CtorSig(&[]),
		build: build_lower,
	}]),
	methods: &[
		MethodSpec {
			name: "who",
			params: &[],
			ret: ValueKind::Str,
			invoke: lower_who,
		},
		MethodSpec {
			name: "sum",
			params: &[ValueKind::Int, ValueKind::Int],
			ret: ValueKind::Int,
			invoke: lower_sum,
		},
		MethodSpec {
			name: "mul2",
			params: &[ValueKind::Int],
			ret: ValueKind::Int,
			invoke: lower_mul2,
		},
		MethodSpec {
			name: "half",
			params: &[ValueKind::Float],
			ret: ValueKind::Float,
			invoke: lower_half,
		},
		MethodSpec {
			name: "append",
			params: &[ValueKind::Str],
			ret: ValueKind::Unit,
			invoke: lower_append,
		},
	],
	..ImplDecl::minimal("Lower")
};

// -- override implementation --------------------------------------------

struct Upper {
	base: crate::core::construct::BaseRef,
}

fn build_upper(cx: &mut BuildCx, _args: &[Value]) -> Result<Instance, CtorError> {
	let base = cx
		.base
		.take()
		.ok_or_else(|| CtorError::Failed("no base bound".to_owned()))?;
	Ok(Arc::new(Upper { base }))
}

impl Upper {
	fn who(&self) -> Result<String, CallError> {
		let below = self.base.forward("who", &[])?;
		Ok(format!("{}!", below.as_str()?))
	}

	// Replacement arguments: doubles both before handing them down.
	fn sum(&self, a: i64, b: i64) -> Result<i64, CallError> {
		let below = self
			.base
			.forward_with("sum", &[Value::Int(a * 2), Value::Int(b * 2)])?;
		Ok(below.as_i64()? + 10)
	}

	// Current arguments: the local is mutated before the forward.
	fn mul2(&self, x: i64) -> Result<i64, CallError> {
		let x = x + 3;
		self.base.forward("mul2", &[Value::Int(x)])?.as_i64().map_err(Into::into)
	}

	fn half_of(&self, n: i64) -> Result<f64, CallError> {
		self.base
			.forward_with("half", &[Value::Int(n)])?
			.as_f64()
			.map_err(Into::into)
	}

	fn append(&self, s: &str) -> Result<Value, CallError> {
		self.base.forward_with("append", &[Value::from(format!("{s}!"))])
	}
}

static UPPER_OVER: OverrideDecl = OverrideDecl {
	capability: None,
	sub: None,
	base_ctors: &[CtorSig(&[])],
	forwards: &[
		ForwardMarker {
			method: "who",
			mode: ForwardMode::CurrentArgs,
		},
		ForwardMarker {
			method: "sum",
			mode: ForwardMode::ReplaceArgs,
		},
		ForwardMarker {
			method: "mul2",
			mode: ForwardMode::CurrentArgs,
		},
		ForwardMarker {
			method: "half",
			mode: ForwardMode::ReplaceArgs,
		},
		ForwardMarker {
			method: "append",
			mode: ForwardMode::ReplaceArgs,
		},
	],
};

static UPPER_IMPL: ImplDecl = ImplDecl {
	capability: Some(CapabilityId("svc")),
	module: Some(ModuleId("game")),
	ctor: CtorSpec::Standard(&[CtorImpl {
		sig: CtorSig(&[]),
		build: build_upper,
	}]),
	override_of: Some(&UPPER_OVER),
	..ImplDecl::minimal("Upper")
};

fn svc_runtime() -> Runtime {
	runtime(vec![
		Candidate::Capability(&SVC_CAP),
		Candidate::Impl(&LOWER_IMPL),
		Candidate::Impl(&UPPER_IMPL),
	])
}

/// Resolution hands out the override; its base calls reach the
/// next-lower implementation.
#[test]
fn override_wins_and_forwards_to_base() {
	let rt = svc_runtime();
	let upper = rt.instance_of::<Upper>(CapabilityId("svc")).unwrap();
	assert_eq!(upper.who().unwrap(), "LOWER!");
}

/// Replacement arguments are handed down instead of the live ones.
#[test]
fn replace_args_forward() {
	let rt = svc_runtime();
	let upper = rt.instance_of::<Upper>(CapabilityId("svc")).unwrap();
	// base sees (2, 4); 2 + 4 = 6; override adds 10.
	assert_eq!(upper.sum(1, 2).unwrap(), 16);
}

/// A current-args forward carries the caller's mutated locals.
#[test]
fn current_args_forward_sees_mutated_locals() {
	let rt = svc_runtime();
	let upper = rt.instance_of::<Upper>(CapabilityId("svc")).unwrap();
	// local becomes 8; base doubles it.
	assert_eq!(upper.mul2(5).unwrap(), 16);
}

/// Replacement arguments are coerced to the declared parameter kinds.
#[test]
fn replace_args_coerce_kinds() {
	let rt = svc_runtime();
	let upper = rt.instance_of::<Upper>(CapabilityId("svc")).unwrap();
	assert_eq!(upper.half_of(3).unwrap(), 1.5);
}

/// Void base methods come back as the unit value, and side effects land on
/// the shared base instance.
#[test]
fn void_forward_normalizes_to_unit() {
	let rt = svc_runtime();
	let upper = rt.instance_of::<Upper>(CapabilityId("svc")).unwrap();

	let out = upper.append("hi").unwrap();
	assert!(matches!(out, Value::Unit));

	let lower = upper.base.downcast::<Lower>().unwrap();
	assert_eq!(*lower.log.lock(), "hi!");
}

/// Linking runs once; later constructions reuse the cached binding.
#[test]
fn link_outcome_is_cached() {
	let rt = svc_runtime();
	let entry_id = rt.catalog().resolve_one(CapabilityId("svc")).unwrap().id;

	let _ = rt.fresh(CapabilityId("svc"), &[]).unwrap();
	let _ = rt.fresh(CapabilityId("svc"), &[]).unwrap();

	assert!(matches!(
		rt.linker().state_of(entry_id),
		Some(LinkState::Defined(_))
	));

	// Direct linker calls hand back the same binding.
	let entry = rt.catalog().entry(entry_id).unwrap();
	let a = rt.linker().link(rt.catalog(), entry, &UPPER_OVER).unwrap();
	let b = rt.linker().link(rt.catalog(), entry, &UPPER_OVER).unwrap();
	assert!(Arc::ptr_eq(&a, &b));
}

/// Threads racing to link the same type serialize on its cell: the pipeline
/// runs once and every racer receives the same binding.
#[test]
fn concurrent_linking_runs_once() {
	let rt = svc_runtime();
	let entry_id = rt.catalog().resolve_one(CapabilityId("svc")).unwrap().id;

	let bindings = std::thread::scope(|scope| {
		let handles: Vec<_> = (0..16)
			.map(|_| {
				let rt = rt.clone();
				scope.spawn(move || {
					let entry = rt.catalog().entry(entry_id).unwrap();
					rt.linker()
						.link(rt.catalog(), entry, &UPPER_OVER)
						.unwrap()
				})
			})
			.collect();
		handles
			.into_iter()
			.map(|h| h.join().unwrap())
			.collect::<Vec<_>>()
	});

	// One pipeline run produces one binding allocation; racers share it.
	for pair in bindings.windows(2) {
		assert!(Arc::ptr_eq(&pair[0], &pair[1]));
	}
	assert!(matches!(
		rt.linker().state_of(entry_id),
		Some(LinkState::Defined(_))
	));
}

// -- failure paths ------------------------------------------------------

static ORPHAN_CAP: CapabilityDecl = CapabilityDecl {
	id: CapabilityId("orphan"),
	allow_multiple: false,
	force_definition: false,
	tokens: &[],
};

static ORPHAN_OVER: OverrideDecl = OverrideDecl {
	capability: None,
	sub: None,
	base_ctors: &[],
	forwards: &[],
};

static ORPHAN_IMPL: ImplDecl = ImplDecl {
	capability: Some(CapabilityId("orphan")),
	module: Some(ModuleId("core")),
	ctor: CtorSpec::Standard(&[CtorImpl {
		sig: CtorSig(&[]),
		build: build_upper,
	}]),
	override_of: Some(&ORPHAN_OVER),
	..ImplDecl::minimal("Orphan")
};

/// An override with nothing below it fails to link, and the failure is
/// sticky: every later request replays it without relinking.
#[test]
fn missing_base_is_sticky() {
	let rt = runtime(vec![
		Candidate::Capability(&ORPHAN_CAP),
		Candidate::Impl(&ORPHAN_IMPL),
	]);

	let first = rt.instance(CapabilityId("orphan")).unwrap_err();
	assert!(matches!(
		first,
		RuntimeError::Link(LinkError::MissingBase { .. })
	));

	let second = rt.instance(CapabilityId("orphan")).unwrap_err();
	assert_eq!(first, second);

	let id = rt.catalog().resolve_one(CapabilityId("orphan")).unwrap().id;
	assert!(matches!(rt.linker().state_of(id), Some(LinkState::Failed(_))));
}

static BADCTOR_CAP: CapabilityDecl = CapabilityDecl {
	id: CapabilityId("badctor"),
	allow_multiple: false,
	force_definition: false,
	tokens: &[],
};

static BADCTOR_BASE: ImplDecl = ImplDecl {
	capability: Some(CapabilityId("badctor")),
	module: Some(ModuleId("core")),
	ctor: CtorSpec::Standard(&[CtorImpl {
		sig: CtorSig(&[]),
		build: build_lower,
	}]),
	..ImplDecl::minimal("BadCtorBase")
};

static BADCTOR_OVER: OverrideDecl = OverrideDecl {
	capability: None,
	sub: None,
	base_ctors: &[CtorSig(&[ValueKind::Int])],
	forwards: &[],
};

static BADCTOR_IMPL: ImplDecl = ImplDecl {
	capability: Some(CapabilityId("badctor")),
	module: Some(ModuleId("game")),
	ctor: CtorSpec::Standard(&[CtorImpl {
		sig: CtorSig(&[]),
		build: build_upper,
	}]),
	override_of: Some(&BADCTOR_OVER),
	..ImplDecl::minimal("BadCtor")
};

/// A base without the constructor the override hands its arguments to is a
/// link failure.
#[test]
fn incompatible_base_constructor_fails_link() {
	let rt = runtime(vec![
		Candidate::Capability(&BADCTOR_CAP),
		Candidate::Impl(&BADCTOR_BASE),
		Candidate::Impl(&BADCTOR_IMPL),
	]);
	let err = rt.instance(CapabilityId("badctor")).unwrap_err();
	assert!(matches!(
		err,
		RuntimeError::Link(LinkError::IncompatibleConstructor { .. })
	));
}

static BADFWD_CAP: CapabilityDecl = CapabilityDecl {
	id: CapabilityId("badfwd"),
	allow_multiple: false,
	force_definition: false,
	tokens: &[],
};

static BADFWD_OVER: OverrideDecl = OverrideDecl {
	capability: None,
	sub: None,
	base_ctors: &[CtorSig(&[])],
	forwards: &[ForwardMarker {
		method: "nope",
		mode: ForwardMode::CurrentArgs,
	}],
};

static BADFWD_IMPL: ImplDecl = ImplDecl {
	capability: Some(CapabilityId("badfwd")),
	module: Some(ModuleId("game")),
	ctor: CtorSpec::Standard(&[CtorImpl {
		sig: CtorSig(&[]),
		build: build_upper,
	}]),
	override_of: Some(&BADFWD_OVER),
	..ImplDecl::minimal("BadFwd")
};

static BADFWD_BASE: ImplDecl = ImplDecl {
	capability: Some(CapabilityId("badfwd")),
	module: Some(ModuleId("core")),
	ctor: CtorSpec::Standard(&[CtorImpl {
		sig: CtorSig(&[]),
		build: build_lower,
	}]),
	..ImplDecl::minimal("BadFwdBase")
};

/// Forwarding to a method the base does not expose is a link failure.
#[test]
fn missing_base_method_fails_link() {
	let rt = runtime(vec![
		Candidate::Capability(&BADFWD_CAP),
		Candidate::Impl(&BADFWD_BASE),
		Candidate::Impl(&BADFWD_IMPL),
	]);
	let err = rt.instance(CapabilityId("badfwd")).unwrap_err();
	assert!(matches!(
		err,
		RuntimeError::Link(LinkError::MissingBaseMethod { .. })
	));
}

/// Calling an unknown method or the wrong arity through a bound base is a
/// call error, never a panic.
#[test]
fn bad_base_calls_are_typed_errors() {
	let rt = svc_runtime();
	let upper = rt.instance_of::<Upper>(CapabilityId("svc")).unwrap();

	assert!(matches!(
		upper.base.forward("ghost", &[]),
		Err(CallError::UnknownMethod("ghost"))
	));
	assert!(matches!(
		upper.base.forward("sum", &[Value::Int(1)]),
		Err(CallError::Arity { expected: 2, got: 1, .. })
	));
}
