//! Error taxonomy, split by layer.
//!
//! Catalog-build problems are fatal and surface once at startup; resolution
//! misses are recoverable and drive the optional `try_create` surface; link
//! failures are cached per type so a broken override chain fails fast on
//! every later request.

use thiserror::Error;

use crate::core::ids::{CapabilityId, ImplId, ModuleId, ModulePriority, Platform, SubCapId};
use crate::core::value::ValueKind;

/// A dynamic value did not have the kind a signature declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValueError {
	#[error("expected {expected:?}, found {found:?}")]
	KindMismatch { expected: ValueKind, found: ValueKind },
}

/// Dispatch through a bound method table failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
	#[error("no method named `{0}` on the bound base")]
	UnknownMethod(&'static str),
	#[error("method `{method}` takes {expected} argument(s), got {got}")]
	Arity {
		method: &'static str,
		expected: usize,
		got: usize,
	},
	#[error("argument kind mismatch: {0}")]
	Arg(#[from] ValueError),
	#[error("method `{method}` failed: {message}")]
	Invoke {
		method: &'static str,
		message: String,
	},
}

/// Fatal problems detected while building a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
	#[error("capability `{0}` declared more than once")]
	DuplicateCapability(CapabilityId),
	#[error("capability `{capability}`: {reason}")]
	InvalidCapability {
		capability: CapabilityId,
		reason: &'static str,
	},
	#[error("`{type_name}` implements unregistered capability `{capability}`")]
	UnregisteredCapability {
		type_name: &'static str,
		capability: CapabilityId,
	},
	#[error("`{type_name}`: `{missing}` unset and not found on any ancestor")]
	MissingCapabilityMetadata {
		type_name: &'static str,
		missing: &'static str,
	},
	#[error("`{type_name}`: owning module `{module}` has no declared priority")]
	UnknownModule {
		type_name: &'static str,
		module: ModuleId,
	},
	#[error(
		"capability `{capability}` forces sub-capability definition but `{type_name}` declares none"
	)]
	MissingSubCapability {
		capability: CapabilityId,
		type_name: &'static str,
	},
	#[error(
		"`{a}` and `{b}` tie at priority {priority} for `{capability}` (sub `{sub}`, platform `{platform}`)"
	)]
	AmbiguousPriority {
		capability: CapabilityId,
		sub: SubCapId,
		platform: Platform,
		priority: ModulePriority,
		a: &'static str,
		b: &'static str,
	},
}

/// A resolution query found no matching implementation, or was malformed for
/// the capability's multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
	#[error("no implementation of `{0}`")]
	UnresolvedCapability(CapabilityId),
	#[error("no implementation of `{capability}` with sub-capability `{sub}`")]
	UnresolvedSubCapability {
		capability: CapabilityId,
		sub: SubCapId,
	},
	#[error("no implementation of `{capability}` for platform `{platform}`")]
	UnresolvedPlatform {
		capability: CapabilityId,
		platform: Platform,
	},
	#[error("`{0}` does not allow multiple implementations")]
	MultiplicityDisallowed(CapabilityId),
}

/// An override chain could not be linked. Cached per type; every later
/// construction of the type observes the same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
	#[error(
		"`{type_name}`: no base implementation of `{capability}` (sub `{sub}`) below priority {below}"
	)]
	MissingBase {
		type_name: &'static str,
		capability: CapabilityId,
		sub: SubCapId,
		below: ModulePriority,
	},
	#[error("`{type_name}`: base `{base}` has no constructor taking {arity} argument(s)")]
	IncompatibleConstructor {
		type_name: &'static str,
		base: &'static str,
		arity: usize,
	},
	#[error("`{type_name}` forwards to `{method}`, which base `{base}` does not expose")]
	MissingBaseMethod {
		type_name: &'static str,
		base: &'static str,
		method: &'static str,
	},
}

/// Construction of one instance failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CtorError {
	#[error("`{type_name}` has no constructor accepting {arity} argument(s)")]
	NoMatchingCtor {
		type_name: &'static str,
		arity: usize,
	},
	#[error("argument kind mismatch: {0}")]
	Arg(#[from] ValueError),
	#[error("constructor failed: {0}")]
	Failed(String),
}

/// Umbrella error for the instance layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
	#[error(transparent)]
	Resolve(#[from] ResolveError),
	#[error(transparent)]
	Link(#[from] LinkError),
	#[error(transparent)]
	Ctor(#[from] CtorError),
	#[error(transparent)]
	Call(#[from] CallError),
	#[error("lazy dependency `{dependent}` could not be materialized")]
	InjectionFailure { dependent: String },
	#[error("instance of `{capability}` is not a `{expected}`")]
	TypeMismatch {
		capability: CapabilityId,
		expected: &'static str,
	},
	#[error("implementation #{0} is not in this catalog")]
	UnknownImpl(ImplId),
}
