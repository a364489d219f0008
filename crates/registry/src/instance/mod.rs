//! Instance layer: singleton cache, optional creation, fresh construction,
//! and lazy handles.
//!
//! # Role
//!
//! [`Runtime`] pairs an immutable [`Catalog`] with the mutable state the
//! catalog deliberately excludes: one singleton per `(implementation, sub)`
//! key, link outcomes, and lazy handles. Resolution stays pure; everything
//! stateful lives here.
//!
//! # Invariants
//!
//! - A singleton is constructed exactly once per key, even under concurrent
//!   first requests; losers of the race block on the key's slot and receive
//!   the winner's instance.
//! - Construction of one key never blocks requests for other keys; the cache
//!   map lock is held only to fetch the slot, never across construction.
//! - `fresh` never reads or writes the singleton cache.

pub mod lazy;


use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::catalog::{Catalog, ImplEntry};
use crate::core::construct::{ArcInjector, BaseRef, BuildCx, CtorSpec, Injector, Instance};
use crate::core::ids::{CapabilityId, ImplId, Platform, SubCapId};
use crate::core::value::Value;
use crate::error::{CtorError, ResolveError, RuntimeError};
use crate::link::Linker;

pub use lazy::Lazy;

#[derive(Default)]
struct SingletonSlot {
	value: Mutex<Option<Instance>>,
}

struct RuntimeInner {
	catalog: Arc<Catalog>,
	linker: Linker,
	singletons: Mutex<FxHashMap<(ImplId, SubCapId), Arc<SingletonSlot>>>,
}

/// The stateful layer over a built catalog. Cheap to clone; clones share all
/// caches.
#[derive(Clone)]
pub struct Runtime {
	inner: Arc<RuntimeInner>,
}

impl Runtime {
	pub fn new(catalog: Arc<Catalog>) -> Self {
		Self {
			inner: Arc::new(RuntimeInner {
				catalog,
				linker: Linker::new(),
				singletons: Mutex::new(FxHashMap::default()),
			}),
		}
	}

	pub fn catalog(&self) -> &Arc<Catalog> {
		&self.inner.catalog
	}

	pub fn linker(&self) -> &Linker {
		&self.inner.linker
	}

	/// Process-wide singleton for the winning implementation of `cap`.
	pub fn instance(&self, cap: CapabilityId) -> Result<Instance, RuntimeError> {
		let entry = self.inner.catalog.resolve_one(cap)?;
		self.singleton(entry)
	}

	/// Process-wide singleton for the winning implementation of `(cap, sub)`.
	pub fn instance_sub(
		&self,
		cap: CapabilityId,
		sub: SubCapId,
	) -> Result<Instance, RuntimeError> {
		let entry = self.inner.catalog.resolve_sub(cap, sub)?;
		self.singleton(entry)
	}

	/// Typed singleton access, for callers that know the winning concrete type.
	pub fn instance_of<T: Send + Sync + 'static>(
		&self,
		cap: CapabilityId,
	) -> Result<Arc<T>, RuntimeError> {
		self.instance(cap)?
			.downcast::<T>()
			.map_err(|_| RuntimeError::TypeMismatch {
				capability: cap,
				expected: std::any::type_name::<T>(),
			})
	}

	/// Optional fresh creation, never touching the singleton cache:
	/// `Ok(None)` when `cap` resolves to nothing, an error only when a
	/// resolved implementation fails to come up.
	pub fn try_create(
		&self,
		cap: CapabilityId,
		args: &[Value],
	) -> Result<Option<Instance>, RuntimeError> {
		match self.inner.catalog.resolve_one(cap) {
			Ok(entry) => self.construct(entry, args).map(Some),
			Err(err) => absorb_miss(err).map(|()| None),
		}
	}

	/// Optional fresh creation keyed by sub-capability.
	pub fn try_create_sub(
		&self,
		cap: CapabilityId,
		sub: SubCapId,
		args: &[Value],
	) -> Result<Option<Instance>, RuntimeError> {
		match self.inner.catalog.resolve_sub(cap, sub) {
			Ok(entry) => self.construct(entry, args).map(Some),
			Err(err) => absorb_miss(err).map(|()| None),
		}
	}

	/// Fresh creation for the winner visible on `platform`. Unlike the other
	/// `try_create` variants, a platform miss is an error, not an absent
	/// value.
	pub fn try_create_platform(
		&self,
		cap: CapabilityId,
		platform: Platform,
		args: &[Value],
	) -> Result<Instance, RuntimeError> {
		let entry = self.inner.catalog.resolve_platform(cap, platform)?;
		self.construct(entry, args)
	}

	/// One fresh instance per registered implementation of an allow-multiple
	/// capability, priority order. An unknown or empty capability yields an
	/// empty vec; a capability that disallows multiplicity is an error.
	pub fn try_create_all(
		&self,
		cap: CapabilityId,
		args: &[Value],
	) -> Result<Vec<Instance>, RuntimeError> {
		if let Some(meta) = self.inner.catalog.capability(cap) {
			if !meta.allow_multiple {
				return Err(ResolveError::MultiplicityDisallowed(cap).into());
			}
		}
		self.inner
			.catalog
			.impls(cap)
			.map(|entry| self.construct(entry, args))
			.collect()
	}

	/// A brand-new private instance, bypassing the singleton cache entirely.
	pub fn fresh(&self, cap: CapabilityId, args: &[Value]) -> Result<Instance, RuntimeError> {
		let entry = self.inner.catalog.resolve_one(cap)?;
		self.construct(entry, args)
	}

	/// Idle-evicting handle to the singleton of `cap`. Resolution and
	/// construction errors surface on `get` as injection failures, after
	/// being logged here with full detail.
	pub fn lazy(&self, cap: CapabilityId) -> Lazy<Instance> {
		self.lazy_handle(cap, false)
	}

	/// Like [`Runtime::lazy`], but the materialized value is never evicted.
	pub fn lazy_immortal(&self, cap: CapabilityId) -> Lazy<Instance> {
		self.lazy_handle(cap, true)
	}

	fn lazy_handle(&self, cap: CapabilityId, immortal: bool) -> Lazy<Instance> {
		let runtime = self.clone();
		let factory = move || match runtime.instance(cap) {
			Ok(instance) => Some(instance),
			Err(err) => {
				tracing::error!(capability = %cap, error = %err, "lazy materialization failed");
				None
			}
		};
		if immortal {
			Lazy::immortal(cap.0, factory)
		} else {
			Lazy::new(cap.0, factory)
		}
	}

	/// Fetches or creates the singleton for `entry`.
	fn singleton(&self, entry: &ImplEntry) -> Result<Instance, RuntimeError> {
		let slot = {
			let mut singletons = self.inner.singletons.lock();
			singletons
				.entry((entry.id, entry.meta.sub))
				.or_default()
				.clone()
		};

		// Per-key lock: concurrent first requests for this key serialize,
		// requests for other keys proceed.
		let mut value = slot.value.lock();
		if let Some(existing) = &*value {
			return Ok(existing.clone());
		}
		let built = self.construct(entry, &[])?;
		*value = Some(built.clone());
		Ok(built)
	}

	/// Constructs one instance of `entry`, linking and building its override
	/// base first when one is declared.
	fn construct(&self, entry: &ImplEntry, args: &[Value]) -> Result<Instance, RuntimeError> {
		let base = match entry.decl.override_of {
			Some(over) => {
				let binding = self.inner.linker.link(&self.inner.catalog, entry, over)?;
				let base_entry = self
					.inner
					.catalog
					.entry(binding.base)
					.ok_or(RuntimeError::UnknownImpl(binding.base))?;
				let base_instance = self.construct(base_entry, args)?;
				Some(BaseRef::new(base_instance, binding.methods.clone()))
			}
			None => None,
		};

		match &entry.decl.ctor {
			CtorSpec::External(accessor) => Ok(accessor()),
			CtorSpec::Standard(ctors) => {
				let matched = ctors.iter().find(|c| c.sig.accepts(args));
				// Unmatched argument lists fall back to a declared
				// zero-argument constructor when one exists.
				let (chosen, args): (_, &[Value]) = match matched {
					Some(ctor) => (ctor, args),
					None => {
						let zero = ctors
							.iter()
							.find(|c| c.sig.0.is_empty())
							.ok_or(CtorError::NoMatchingCtor {
								type_name: entry.decl.type_name,
								arity: args.len(),
							})?;
						(zero, &[])
					}
				};
				let coerced = args
					.iter()
					.zip(chosen.sig.0)
					.map(|(arg, kind)| arg.clone().coerce(*kind))
					.collect::<Result<Vec<_>, _>>()
					.map_err(CtorError::from)?;
				let mut cx = BuildCx {
					injector: Arc::new(self.clone()) as ArcInjector,
					base,
				};
				Ok((chosen.build)(&mut cx, &coerced).map_err(RuntimeError::from)?)
			}
		}
	}
}

impl Injector for Runtime {
	fn instance(&self, cap: CapabilityId) -> Result<Instance, RuntimeError> {
		Runtime::instance(self, cap)
	}

	fn instance_sub(&self, cap: CapabilityId, sub: SubCapId) -> Result<Instance, RuntimeError> {
		Runtime::instance_sub(self, cap, sub)
	}

	fn fresh(&self, cap: CapabilityId, args: &[Value]) -> Result<Instance, RuntimeError> {
		Runtime::fresh(self, cap, args)
	}
}

/// Resolution misses become absent values on the optional surface; anything
/// else stays an error.
fn absorb_miss(err: ResolveError) -> Result<(), RuntimeError> {
	match err {
		ResolveError::UnresolvedCapability(_)
		| ResolveError::UnresolvedSubCapability { .. }
		| ResolveError::UnresolvedPlatform { .. } => Ok(()),
		other => Err(other.into()),
	}
}
