//! End-to-end run through the inventory registration path: three modules
//! layering one capability, with each higher layer forwarding into the one
//! below it.

use std::any::Any;
use std::sync::Arc;

use stratum_registry::{
	BaseRef, BuildCx, CallError, CapabilityDecl, CapabilityId, Catalog, CatalogCell, CtorError,
	CtorImpl, CtorSig, CtorSpec, ForwardMarker, ForwardMode, ImplDecl, Instance, MethodSpec,
	ModuleId, ModulePriority, OverrideDecl, Platform, Runtime, Value, ValueKind,
	declare_capability, declare_impl,
};

fn module_priority(module: ModuleId) -> Option<ModulePriority> {
	match module.0 {
		"core" => Some(ModulePriority(0)),
		"game" => Some(ModulePriority(10)),
		"addon" => Some(ModulePriority(20)),
		_ => None,
	}
}

static CELL: CatalogCell = CatalogCell::new();

fn runtime() -> Runtime {
	let catalog = CELL
		.get_or_build(|| Catalog::from_inventory(&module_priority))
		.expect("catalog builds");
	Runtime::new(catalog)
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

// -- pipeline: three layers ---------------------------------------------

declare_capability! {
	static PIPELINE: CapabilityDecl = CapabilityDecl {
		id: CapabilityId("pipeline"),
		allow_multiple: false,
		force_definition: false,
		tokens: &["pump"],
	};
}

struct Low;

fn build_low(_cx: &mut BuildCx, _args: &[Value]) -> Result<Instance, CtorError> {
	Ok(Arc::new(Low))
}

fn low_tag(recv: &(dyn Any + Send + Sync), _args: &[Value]) -> Result<Value, CallError> {
	let _ = recv_as::<Low>(recv, "tag")?;
	Ok(Value::Str("low".to_owned()))
}

declare_impl! {
	static LOW_IMPL: ImplDecl = ImplDecl {
		capability: Some(CapabilityId("pipeline")),
		module: Some(ModuleId("core")),
		ctor: CtorSpec::Standard(&[CtorImpl { sig: CtorSig(&[]), build: build_low }]),
		methods: &[MethodSpec {
			name: "tag",
			params: &[],
			ret: ValueKind::Str,
			invoke: low_tag,
		}],
		..ImplDecl::minimal("Low")
	};
}

struct Mid {
	base: BaseRef,
}

fn build_mid(cx: &mut BuildCx, _args: &[Value]) -> Result<Instance, CtorError> {
	let base = cx
		.base
		.take()
		.ok_or_else(|| CtorError::Failed("no base bound".to_owned()))?;
	Ok(Arc::new(Mid { base }))
}

fn mid_tag(recv: &(dyn Any + Send + Sync), _args: &[Value]) -> Result<Value, CallError> {
	let mid = recv_as::<Mid>(recv, "tag")?;
	let inner = mid.base.forward("tag", &[])?.as_str()?.to_owned();
	Ok(Value::Str(format!("mid({inner})")))
}

static MID_OVER: OverrideDecl = OverrideDecl {
	capability: None,
	sub: None,
	base_ctors: &[CtorSig(&[])],
	forwards: &[ForwardMarker {
		method: "tag",
		mode: ForwardMode::CurrentArgs,
	}],
};

declare_impl! {
	static MID_IMPL: ImplDecl = ImplDecl {
		capability: Some(CapabilityId("pipeline")),
		module: Some(ModuleId("game")),
		ctor: CtorSpec::Standard(&[CtorImpl { sig: CtorSig(&[]), build: build_mid }]),
		methods: &[MethodSpec {
			name: "tag",
			params: &[],
			ret: ValueKind::Str,
			invoke: mid_tag,
		}],
		override_of: Some(&MID_OVER),
		..ImplDecl::minimal("Mid")
	};
}

struct Top {
	base: BaseRef,
}

fn build_top(cx: &mut BuildCx, _args: &[Value]) -> Result<Instance, CtorError> {
	let base = cx
		.base
		.take()
		.ok_or_else(|| CtorError::Failed("no base bound".to_owned()))?;
	Ok(Arc::new(Top { base }))
}

static TOP_OVER: OverrideDecl = OverrideDecl {
	capability: None,
	sub: None,
	base_ctors: &[CtorSig(&[])],
	forwards: &[ForwardMarker {
		method: "tag",
		mode: ForwardMode::CurrentArgs,
	}],
};

declare_impl! {
	static TOP_IMPL: ImplDecl = ImplDecl {
		capability: Some(CapabilityId("pipeline")),
		module: Some(ModuleId("addon")),
		ctor: CtorSpec::Standard(&[CtorImpl { sig: CtorSig(&[]), build: build_top }]),
		override_of: Some(&TOP_OVER),
		..ImplDecl::minimal("Top")
	};
}

// -- shell: platform-restricted winners ---------------------------------

declare_capability! {
	static SHELL: CapabilityDecl = CapabilityDecl {
		id: CapabilityId("shell"),
		allow_multiple: false,
		force_definition: false,
		tokens: &[],
	};
}

struct ShellAny;
struct ShellWin;

fn build_shell_any(_cx: &mut BuildCx, _args: &[Value]) -> Result<Instance, CtorError> {
	Ok(Arc::new(ShellAny))
}

fn build_shell_win(_cx: &mut BuildCx, _args: &[Value]) -> Result<Instance, CtorError> {
	Ok(Arc::new(ShellWin))
}

declare_impl! {
	static SHELL_ANY_IMPL: ImplDecl = ImplDecl {
		capability: Some(CapabilityId("shell")),
		module: Some(ModuleId("core")),
		ctor: CtorSpec::Standard(&[CtorImpl { sig: CtorSig(&[]), build: build_shell_any }]),
		..ImplDecl::minimal("ShellAny")
	};
}

declare_impl! {
	static SHELL_WIN_IMPL: ImplDecl = ImplDecl {
		capability: Some(CapabilityId("shell")),
		module: Some(ModuleId("game")),
		platform: Platform("windows"),
		ctor: CtorSpec::Standard(&[CtorImpl { sig: CtorSig(&[]), build: build_shell_win }]),
		..ImplDecl::minimal("ShellWin")
	};
}

/// The top of a three-module chain wins, and its base calls thread all the
/// way down.
#[test]
fn chain_threads_through_three_layers() {
	let rt = runtime();
	let top = rt
		.instance_of::<Top>(CapabilityId("pipeline"))
		.expect("pipeline resolves to Top");

	let tag = top.base.forward("tag", &[]).unwrap();
	assert_eq!(tag.as_str().unwrap(), "mid(low)");

	// The middle layer itself reached the bottom one.
	let mid = top.base.downcast::<Mid>().expect("base below Top is Mid");
	assert_eq!(mid.base.forward("tag", &[]).unwrap().as_str().unwrap(), "low");
}

/// Platform-restricted implementations win only on their platform.
#[test]
fn platform_restricted_shell() {
	let rt = runtime();
	let win = rt
		.try_create_platform(CapabilityId("shell"), Platform("windows"), &[])
		.expect("windows shell registered");
	assert!(win.downcast_ref::<ShellWin>().is_some());

	let other = rt
		.try_create_platform(CapabilityId("shell"), Platform("linux"), &[])
		.expect("unrestricted shell backs other platforms");
	assert!(other.downcast_ref::<ShellAny>().is_some());
}

/// The catalog cell builds once per process; token ids come out of the same
/// snapshot everywhere.
#[test]
fn shared_cell_and_tokens() {
	let a = runtime();
	let b = runtime();
	assert!(Arc::ptr_eq(a.catalog(), b.catalog()));
	assert!(a.catalog().token_id(CapabilityId("pipeline"), "pump").is_some());
}
