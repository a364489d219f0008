//! Catalog build: partition, metadata resolution, validation, ordering.
//!
//! # Role
//!
//! A [`Catalog`] is the immutable, fully validated index of every registered
//! capability and implementation. It is built once from a candidate feed plus
//! a module-priority table; all later resolution queries are pure reads
//! against the built snapshot.
//!
//! # Invariants
//!
//! - Every retained [`ImplEntry`] carries fully resolved metadata; sentinels
//!   appear only where they are meaningful resolved states
//!   ([`SubCapId::NONE`], [`Platform::ALL`]).
//! - Per capability, entries are ordered priority-descending with
//!   registration order breaking ties.
//! - For a capability that disallows multiplicity, an exact priority tie
//!   between two implementations of the same `(sub, platform)` key is a
//!   build failure, never a silent pick.
//! - Token ids are assigned eagerly at build, unique process-wide within the
//!   catalog, and stable across rebuilds of the same feed.

mod resolve;


use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::core::decl::{Ancestor, Candidate, CapabilityDecl, ImplDecl};
use crate::core::ids::{CapabilityId, ImplId, ModuleId, ModulePriority, SubCapId, TokenId};
use crate::core::meta::{CapabilityMeta, ImplMeta};
use crate::error::CatalogError;

/// Supplies the priority of each declared module.
pub trait ModulePriorities {
	fn priority_of(&self, module: ModuleId) -> Option<ModulePriority>;
}

impl ModulePriorities for FxHashMap<ModuleId, ModulePriority> {
	fn priority_of(&self, module: ModuleId) -> Option<ModulePriority> {
		self.get(&module).copied()
	}
}

impl<F> ModulePriorities for F
where
	F: Fn(ModuleId) -> Option<ModulePriority>,
{
	fn priority_of(&self, module: ModuleId) -> Option<ModulePriority> {
		self(module)
	}
}

/// One retained implementation: its declaration plus resolved metadata.
pub struct ImplEntry {
	pub id: ImplId,
	pub decl: &'static ImplDecl,
	pub meta: ImplMeta,
}

/// Immutable index of capabilities and implementations.
pub struct Catalog {
	caps: FxHashMap<CapabilityId, CapabilityMeta>,
	entries: Vec<ImplEntry>,
	by_cap: FxHashMap<CapabilityId, Vec<ImplId>>,
	tokens: FxHashMap<(CapabilityId, &'static str), TokenId>,
}

impl Catalog {
	/// Builds a catalog from a candidate feed and a module-priority table.
	///
	/// Fails loudly on the first structural problem; a catalog either builds
	/// completely or not at all.
	pub fn build<I>(feed: I, modules: &dyn ModulePriorities) -> Result<Catalog, CatalogError>
	where
		I: IntoIterator<Item = Candidate>,
	{
		let mut caps: FxHashMap<CapabilityId, CapabilityMeta> = FxHashMap::default();
		let mut decls: Vec<&'static ImplDecl> = Vec::new();

		for candidate in feed {
			match candidate {
				Candidate::Capability(c) => {
					validate_capability(c)?;
					let meta = CapabilityMeta {
						id: c.id,
						allow_multiple: c.allow_multiple,
						force_definition: c.force_definition,
						tokens: c.tokens,
					};
					if caps.insert(c.id, meta).is_some() {
						return Err(CatalogError::DuplicateCapability(c.id));
					}
				}
				Candidate::Impl(d) => decls.push(d),
			}
		}

		let tokens = assign_tokens(&caps);

		let mut entries = Vec::with_capacity(decls.len());
		for decl in decls {
			let meta = resolve_meta(decl, &caps, modules)?;
			entries.push(ImplEntry {
				id: ImplId(0),
				decl,
				meta,
			});
		}

		let mut by_cap: FxHashMap<CapabilityId, Vec<usize>> = FxHashMap::default();
		for (idx, entry) in entries.iter().enumerate() {
			by_cap.entry(entry.meta.capability).or_default().push(idx);
		}
		// Stable sort: ties keep registration order.
		for group in by_cap.values_mut() {
			group.sort_by(|&a, &b| entries[b].meta.priority.cmp(&entries[a].meta.priority));
		}

		check_ambiguity(&caps, &entries, &by_cap)?;

		// Dense ids follow feed order.
		for (idx, entry) in entries.iter_mut().enumerate() {
			entry.id = ImplId(idx as u32);
		}
		let by_cap = by_cap
			.into_iter()
			.map(|(cap, group)| (cap, group.into_iter().map(|i| ImplId(i as u32)).collect()))
			.collect();

		tracing::debug!(
			capabilities = caps.len(),
			implementations = entries.len(),
			tokens = tokens.len(),
			"catalog built"
		);

		Ok(Catalog {
			caps,
			entries,
			by_cap,
			tokens,
		})
	}

	/// Builds from every candidate registered through [`inventory`].
	pub fn from_inventory(modules: &dyn ModulePriorities) -> Result<Catalog, CatalogError> {
		let feed = inventory::iter::<crate::core::decl::CandidateReg>
			.into_iter()
			.map(|reg| reg.0);
		Self::build(feed, modules)
	}
}

fn validate_capability(c: &CapabilityDecl) -> Result<(), CatalogError> {
	if c.force_definition && !c.allow_multiple {
		return Err(CatalogError::InvalidCapability {
			capability: c.id,
			reason: "forced sub-capability definition requires allowing multiple implementations",
		});
	}
	Ok(())
}

/// Eager, deterministic token-id assignment: capabilities in id order, tokens
/// in declaration order.
fn assign_tokens(
	caps: &FxHashMap<CapabilityId, CapabilityMeta>,
) -> FxHashMap<(CapabilityId, &'static str), TokenId> {
	let mut sorted: Vec<&CapabilityMeta> = caps.values().collect();
	sorted.sort_by_key(|m| m.id);

	let mut out = FxHashMap::default();
	let mut next = 0u32;
	for meta in sorted {
		for token in meta.tokens {
			out.insert((meta.id, *token), TokenId(next));
			next += 1;
		}
	}
	out
}

/// Resolves one declaration's metadata, walking the ancestry chain for any
/// unset field.
fn resolve_meta(
	decl: &'static ImplDecl,
	caps: &FxHashMap<CapabilityId, CapabilityMeta>,
	modules: &dyn ModulePriorities,
) -> Result<ImplMeta, CatalogError> {
	let capability =
		inherited_capability(decl).ok_or(CatalogError::MissingCapabilityMetadata {
			type_name: decl.type_name,
			missing: "capability",
		})?;
	let cap_meta = caps
		.get(&capability)
		.ok_or(CatalogError::UnregisteredCapability {
			type_name: decl.type_name,
			capability,
		})?;

	let module = inherited_module(decl).ok_or(CatalogError::MissingCapabilityMetadata {
		type_name: decl.type_name,
		missing: "module",
	})?;
	let priority = modules
		.priority_of(module)
		.ok_or(CatalogError::UnknownModule {
			type_name: decl.type_name,
			module,
		})?;

	let sub = inherited_sub(decl).unwrap_or(SubCapId::NONE);
	if cap_meta.force_definition && sub.is_none() {
		return Err(CatalogError::MissingSubCapability {
			capability,
			type_name: decl.type_name,
		});
	}

	Ok(ImplMeta {
		capability,
		sub,
		module,
		priority,
		platform: decl.platform,
		flags: decl.flags,
	})
}

fn inherited_capability(decl: &ImplDecl) -> Option<CapabilityId> {
	if let Some(c) = decl.capability {
		return Some(c);
	}
	for ancestor in decl.inherits {
		match ancestor {
			Ancestor::Capability(c) => return Some(c.id),
			Ancestor::Impl(parent) => {
				if let Some(c) = inherited_capability(parent) {
					return Some(c);
				}
			}
		}
	}
	None
}

fn inherited_module(decl: &ImplDecl) -> Option<ModuleId> {
	if let Some(m) = decl.module {
		return Some(m);
	}
	for ancestor in decl.inherits {
		if let Ancestor::Impl(parent) = ancestor {
			if let Some(m) = inherited_module(parent) {
				return Some(m);
			}
		}
	}
	None
}

fn inherited_sub(decl: &ImplDecl) -> Option<SubCapId> {
	if let Some(s) = decl.sub {
		return Some(s);
	}
	for ancestor in decl.inherits {
		if let Ancestor::Impl(parent) = ancestor {
			if let Some(s) = inherited_sub(parent) {
				return Some(s);
			}
		}
	}
	None
}

/// For capabilities that disallow multiplicity, an exact priority tie at the
/// top of any `(sub, platform)` group is fatal.
fn check_ambiguity(
	caps: &FxHashMap<CapabilityId, CapabilityMeta>,
	entries: &[ImplEntry],
	by_cap: &FxHashMap<CapabilityId, Vec<usize>>,
) -> Result<(), CatalogError> {
	for (cap, group) in by_cap {
		let Some(cap_meta) = caps.get(cap) else {
			continue;
		};
		if cap_meta.allow_multiple {
			continue;
		}
		// Group is priority-descending, so the winner of each key is its
		// first occurrence; a later entry at the same priority is a tie.
		let mut seen: FxHashMap<(SubCapId, crate::core::ids::Platform), usize> =
			FxHashMap::default();
		for &idx in group {
			let entry = &entries[idx];
			let key = (entry.meta.sub, entry.meta.platform);
			match seen.get(&key) {
				None => {
					seen.insert(key, idx);
				}
				Some(&winner) if entries[winner].meta.priority == entry.meta.priority => {
					return Err(CatalogError::AmbiguousPriority {
						capability: *cap,
						sub: entry.meta.sub,
						platform: entry.meta.platform,
						priority: entry.meta.priority,
						a: entries[winner].decl.type_name,
						b: entry.decl.type_name,
					});
				}
				Some(_) => {}
			}
		}
	}
	Ok(())
}

/// Process-wide slot for a lazily built catalog.
///
/// `get_or_build` is idempotent: the first caller builds, everyone else gets
/// the same snapshot. Concurrent first callers serialize on the build lock
/// and re-check the slot before building.
pub struct CatalogCell {
	slot: ArcSwapOption<Catalog>,
	build_lock: Mutex<()>,
}

impl CatalogCell {
	pub const fn new() -> Self {
		Self {
			slot: ArcSwapOption::const_empty(),
			build_lock: Mutex::new(()),
		}
	}

	/// The current snapshot, if one has been built.
	pub fn get(&self) -> Option<Arc<Catalog>> {
		self.slot.load_full()
	}

	/// Returns the snapshot, building it with `build` if the slot is empty.
	pub fn get_or_build<F>(&self, build: F) -> Result<Arc<Catalog>, CatalogError>
	where
		F: FnOnce() -> Result<Catalog, CatalogError>,
	{
		if let Some(catalog) = self.slot.load_full() {
			return Ok(catalog);
		}
		let _guard = self.build_lock.lock();
		if let Some(catalog) = self.slot.load_full() {
			return Ok(catalog);
		}
		let catalog = Arc::new(build()?);
		self.slot.store(Some(catalog.clone()));
		Ok(catalog)
	}
}

impl Default for CatalogCell {
	fn default() -> Self {
		Self::new()
	}
}
