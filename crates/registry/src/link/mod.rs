//! Override-chain linking.
//!
//! # Role
//!
//! An implementation that declares an override must be bound to the
//! highest-priority implementation of the same `(capability, sub)` key
//! strictly below its own priority. Linking validates constructor
//! compatibility and every forward-to-base call site, then caches the
//! outcome, success or failure, per type.
//!
//! # Invariants
//!
//! - Linking runs at most once per type; concurrent first requests serialize
//!   on the type's cell and later requests observe the cached outcome.
//! - A failed link is sticky. Every later construction of the type reports
//!   the same [`LinkError`] without re-running the pipeline.
//! - The state of a type only moves forward: `Unlinked`, `Scanned`,
//!   `BaseResolved`, `Rewritten`, then `Defined` or `Failed`.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::catalog::{Catalog, ImplEntry};
use crate::core::construct::{BoundMethods, MethodSpec};
use crate::core::decl::OverrideDecl;
use crate::core::ids::ImplId;
use crate::error::LinkError;

/// Per-type link progress.
#[derive(Clone)]
pub enum LinkState {
	/// No link attempt yet.
	Unlinked,
	/// Override markers collected.
	Scanned,
	/// Base implementation resolved.
	BaseResolved(ImplId),
	/// Constructor and forward sites validated against the base.
	Rewritten,
	/// Link complete; binding available.
	Defined(Arc<BaseBinding>),
	/// Link failed; the error replays on every later request.
	Failed(LinkError),
}

/// A completed link: the base implementation plus its validated method table.
pub struct BaseBinding {
	pub base: ImplId,
	pub methods: BoundMethods,
}

#[derive(Default)]
struct LinkCell {
	state: Mutex<LinkState>,
}

impl Default for LinkState {
	fn default() -> Self {
		LinkState::Unlinked
	}
}

/// Caches link outcomes per override type.
#[derive(Default)]
pub struct Linker {
	cells: Mutex<FxHashMap<ImplId, Arc<LinkCell>>>,
}

impl Linker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Links `entry` against its declared override, returning the cached
	/// binding when one exists.
	pub fn link(
		&self,
		catalog: &Catalog,
		entry: &ImplEntry,
		over: &'static OverrideDecl,
	) -> Result<Arc<BaseBinding>, LinkError> {
		let cell = {
			let mut cells = self.cells.lock();
			cells.entry(entry.id).or_default().clone()
		};

		// Races on a type's first link serialize here; losers observe the
		// winner's cached outcome.
		let mut state = cell.state.lock();
		match &*state {
			LinkState::Defined(binding) => return Ok(binding.clone()),
			LinkState::Failed(err) => return Err(err.clone()),
			_ => {}
		}

		match run_pipeline(catalog, entry, over, &mut state) {
			Ok(binding) => {
				*state = LinkState::Defined(binding.clone());
				tracing::debug!(
					type_name = entry.decl.type_name,
					base = binding.base.as_u32(),
					"override linked"
				);
				Ok(binding)
			}
			Err(err) => {
				tracing::error!(
					type_name = entry.decl.type_name,
					error = %err,
					"override link failed"
				);
				*state = LinkState::Failed(err.clone());
				Err(err)
			}
		}
	}

	/// Current link progress of a type, if it has been touched at all.
	pub fn state_of(&self, id: ImplId) -> Option<LinkState> {
		let cells = self.cells.lock();
		cells.get(&id).map(|cell| cell.state.lock().clone())
	}
}

fn run_pipeline(
	catalog: &Catalog,
	entry: &ImplEntry,
	over: &'static OverrideDecl,
	state: &mut LinkState,
) -> Result<Arc<BaseBinding>, LinkError> {
	let capability = over.capability.unwrap_or(entry.meta.capability);
	let sub = over.sub.unwrap_or(entry.meta.sub);
	*state = LinkState::Scanned;

	let base = catalog
		.resolve_below(capability, sub, entry.meta.priority)
		.ok_or(LinkError::MissingBase {
			type_name: entry.decl.type_name,
			capability,
			sub,
			below: entry.meta.priority,
		})?;
	*state = LinkState::BaseResolved(base.id);

	for sig in over.base_ctors {
		if !base.decl.ctor.supports(sig) {
			return Err(LinkError::IncompatibleConstructor {
				type_name: entry.decl.type_name,
				base: base.decl.type_name,
				arity: sig.0.len(),
			});
		}
	}

	let methods = bind_methods(base.decl.methods);
	for forward in over.forwards {
		if !methods.contains_key(forward.method) {
			return Err(LinkError::MissingBaseMethod {
				type_name: entry.decl.type_name,
				base: base.decl.type_name,
				method: forward.method,
			});
		}
	}
	*state = LinkState::Rewritten;

	Ok(Arc::new(BaseBinding {
		base: base.id,
		methods,
	}))
}

fn bind_methods(methods: &'static [MethodSpec]) -> BoundMethods {
	let mut map = FxHashMap::default();
	for spec in methods {
		map.insert(spec.name, spec);
	}
	Arc::new(map)
}
