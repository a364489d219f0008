//! Static candidate declarations.
//!
//! # Role
//!
//! Modules describe their capabilities and implementation types as `'static`
//! descriptor structs, registered through [`inventory`] or fed directly to the
//! catalog build. Fields left as `None` are resolved at build time by walking
//! the declared ancestry chain; `core::meta` holds the resolved form.

use super::construct::{CtorSig, CtorSpec, MethodSpec};
use super::ids::{CapabilityId, ModuleId, Platform, SubCapId};
use super::meta::ImplFlags;

/// Interface-level declaration of a capability.
#[derive(Debug)]
pub struct CapabilityDecl {
	pub id: CapabilityId,
	/// Whether several implementations may win simultaneously, keyed by
	/// distinct sub-capability ids.
	pub allow_multiple: bool,
	/// Whether every implementation must declare a sub-capability id. Only
	/// meaningful together with `allow_multiple`.
	pub force_definition: bool,
	/// Closed set of named singleton tokens owned by this capability.
	pub tokens: &'static [&'static str],
}

/// An ancestor an implementation may inherit unresolved metadata from.
pub enum Ancestor {
	/// A capability declaration; supplies the capability id only.
	Capability(&'static CapabilityDecl),
	/// Another implementation; supplies capability, module, and sub-capability.
	Impl(&'static ImplDecl),
}

/// How a "forward to base" call site supplies its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMode {
	/// Pass the current call's live arguments through unchanged.
	CurrentArgs,
	/// Pass explicitly supplied replacement arguments, coerced to the base
	/// method's declared parameter kinds.
	ReplaceArgs,
}

/// One "forward to base" call site the linker must validate against the
/// resolved base's method table.
#[derive(Debug, Clone, Copy)]
pub struct ForwardMarker {
	pub method: &'static str,
	pub mode: ForwardMode,
}

/// Override-specific declaration data carried by implementations that replace
/// a lower-priority implementation.
pub struct OverrideDecl {
	/// Capability to resolve the base from; `None` inherits from the
	/// declaring implementation's own (possibly ancestry-resolved) capability.
	pub capability: Option<CapabilityId>,
	/// Sub-capability the base must share; `None` inherits likewise.
	pub sub: Option<SubCapId>,
	/// Constructor signatures this override's constructors hand to the base.
	/// The linker requires the resolved base to support every one of them.
	pub base_ctors: &'static [CtorSig],
	/// Forward-to-base call sites to validate at link time.
	pub forwards: &'static [ForwardMarker],
}

/// Declaration of one concrete implementation type.
pub struct ImplDecl {
	/// Diagnostic name, conventionally the Rust type path.
	pub type_name: &'static str,
	/// Implemented capability; `None` resolves through `inherits`.
	pub capability: Option<CapabilityId>,
	/// Sub-capability id; `None` resolves through `inherits`, bottoming out at
	/// [`SubCapId::NONE`].
	pub sub: Option<SubCapId>,
	/// Owning module; `None` resolves through `inherits`.
	pub module: Option<ModuleId>,
	/// Platform restriction.
	pub platform: Platform,
	pub flags: ImplFlags,
	/// Ancestry chain searched in order for unresolved fields.
	pub inherits: &'static [Ancestor],
	pub ctor: CtorSpec,
	/// Methods callable through a link-resolved [`super::construct::BaseRef`].
	pub methods: &'static [MethodSpec],
	/// Present when this type replaces a lower-priority implementation.
	pub override_of: Option<&'static OverrideDecl>,
}

impl ImplDecl {
	/// Baseline declaration for struct-update syntax in statics: everything
	/// unset, no constructors, no methods.
	pub const fn minimal(type_name: &'static str) -> ImplDecl {
		ImplDecl {
			type_name,
			capability: None,
			sub: None,
			module: None,
			platform: Platform::ALL,
			flags: ImplFlags::empty(),
			inherits: &[],
			ctor: CtorSpec::Standard(&[]),
			methods: &[],
			override_of: None,
		}
	}
}

/// One candidate fed to a catalog build.
#[derive(Clone, Copy)]
pub enum Candidate {
	Capability(&'static CapabilityDecl),
	Impl(&'static ImplDecl),
}

/// Inventory wrapper for distributed candidate registration.
pub struct CandidateReg(pub Candidate);

inventory::collect!(CandidateReg);
