//! Construction strategies and the base-call dispatch surface.
//!
//! # Role
//!
//! This module defines how the instance layer turns a resolved implementation
//! into a live object, and the [`BaseRef`] handle through which an override
//! instance calls into its link-resolved base.
//!
//! # Invariants
//!
//! - A [`MethodSpec::invoke`] always yields a [`Value`], with `Value::Unit`
//!   standing in for void; callers observe a uniform result regardless of the
//!   target's declared return kind.
//! - [`BaseRef::forward`] passes live arguments through unchanged;
//!   [`BaseRef::forward_with`] coerces replacement arguments to the declared
//!   parameter kinds before dispatch.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::ids::{CapabilityId, SubCapId};
use super::value::{Value, ValueKind};
use crate::error::{CallError, CtorError, RuntimeError};

/// A live, shared instance of some implementation type.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// The resolution surface constructors may pull dependencies from.
///
/// Implemented by the instance layer's `Runtime`; kept as a trait so
/// declarations do not name the concrete runtime.
pub trait Injector: Send + Sync {
	/// Process-wide singleton for the winning implementation of `cap`.
	fn instance(&self, cap: CapabilityId) -> Result<Instance, RuntimeError>;

	/// Process-wide singleton for the winning implementation of `(cap, sub)`.
	fn instance_sub(&self, cap: CapabilityId, sub: SubCapId) -> Result<Instance, RuntimeError>;

	/// A brand-new private instance; never touches the singleton cache.
	fn fresh(&self, cap: CapabilityId, args: &[Value]) -> Result<Instance, RuntimeError>;
}

/// Shared handle to an [`Injector`].
pub type ArcInjector = Arc<dyn Injector>;

/// Context handed to ordinary constructors.
pub struct BuildCx {
	/// Resolution surface for dependency injection.
	pub injector: ArcInjector,
	/// The link-resolved base, present exactly when the type under
	/// construction is an override. Constructors take it with
	/// `self.base.take()`.
	pub base: Option<BaseRef>,
}

/// An ordinary constructor body.
pub type BuildFn = fn(&mut BuildCx, &[Value]) -> Result<Instance, CtorError>;

/// A constructor signature: the declared kinds of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtorSig(pub &'static [ValueKind]);

impl CtorSig {
	/// Returns true if `args` can be passed to a constructor with this
	/// signature, after kind coercion.
	pub fn accepts(&self, args: &[Value]) -> bool {
		self.0.len() == args.len()
			&& self
				.0
				.iter()
				.zip(args)
				.all(|(kind, arg)| kind.admits(arg.kind()))
	}
}

/// One concrete constructor: signature plus body.
pub struct CtorImpl {
	pub sig: CtorSig,
	pub build: BuildFn,
}

/// How instances of an implementation come to exist.
pub enum CtorSpec {
	/// Ordinary constructors, tried in declaration order.
	Standard(&'static [CtorImpl]),
	/// `external-factory`: a zero-argument accessor the implementation itself
	/// exposes. Called instead of ordinary construction, including in fresh
	/// mode.
	External(fn() -> Instance),
}

impl CtorSpec {
	/// Returns true if this implementation exposes a construction path
	/// compatible with `sig`. An external factory is compatible only with the
	/// zero-argument signature.
	pub fn supports(&self, sig: &CtorSig) -> bool {
		match self {
			CtorSpec::Standard(ctors) => ctors.iter().any(|c| c.sig.0 == sig.0),
			CtorSpec::External(_) => sig.0.is_empty(),
		}
	}
}

/// The method-call body of a [`MethodSpec`].
pub type MethodFn = fn(&(dyn Any + Send + Sync), &[Value]) -> Result<Value, CallError>;

/// One dynamically dispatchable method an implementation exposes to the
/// layers above it (overrides forwarding into it, in particular).
pub struct MethodSpec {
	pub name: &'static str,
	/// Declared parameter kinds; arity and coercion are checked against these.
	pub params: &'static [ValueKind],
	/// Declared return kind. Dispatch always yields a [`Value`]; void methods
	/// declare [`ValueKind::Unit`] and return `Value::Unit`.
	pub ret: ValueKind,
	pub invoke: MethodFn,
}

/// Per-method dispatch table resolved once at link time.
pub type BoundMethods = Arc<FxHashMap<&'static str, &'static MethodSpec>>;

/// An override instance's handle to its link-resolved base.
///
/// Obtained through [`BuildCx::base`] at construction; holds the base instance
/// plus the dispatch table the linker validated. "Forward to base" call sites
/// become ordinary calls through this handle.
pub struct BaseRef {
	instance: Instance,
	methods: BoundMethods,
}

impl BaseRef {
	pub(crate) fn new(instance: Instance, methods: BoundMethods) -> Self {
		Self { instance, methods }
	}

	/// The underlying base instance.
	pub fn instance(&self) -> &Instance {
		&self.instance
	}

	/// Typed view of the base instance, when the caller knows its concrete type.
	pub fn downcast<T: Any>(&self) -> Option<&T> {
		self.instance.as_ref().downcast_ref::<T>()
	}

	/// Calls the named base method with the current call's live arguments,
	/// passed through unchanged.
	pub fn forward(&self, method: &'static str, args: &[Value]) -> Result<Value, CallError> {
		let spec = self.spec(method)?;
		self.check_arity(spec, args.len())?;
		(spec.invoke)(self.instance.as_ref(), args)
	}

	/// Calls the named base method with explicitly supplied replacement
	/// arguments, coercing each to the declared parameter kind.
	pub fn forward_with(&self, method: &'static str, args: &[Value]) -> Result<Value, CallError> {
		let spec = self.spec(method)?;
		self.check_arity(spec, args.len())?;
		let coerced = args
			.iter()
			.zip(spec.params)
			.map(|(arg, kind)| arg.clone().coerce(*kind))
			.collect::<Result<Vec<_>, _>>()?;
		(spec.invoke)(self.instance.as_ref(), &coerced)
	}

	fn spec(&self, method: &'static str) -> Result<&'static MethodSpec, CallError> {
		self.methods
			.get(method)
			.copied()
			.ok_or(CallError::UnknownMethod(method))
	}

	fn check_arity(&self, spec: &MethodSpec, got: usize) -> Result<(), CallError> {
		if spec.params.len() == got {
			Ok(())
		} else {
			Err(CallError::Arity {
				method: spec.name,
				expected: spec.params.len(),
				got,
			})
		}
	}
}
