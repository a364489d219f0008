//! Pure resolution queries over a built [`Catalog`].
//!
//! Every query reads the priority-descending per-capability ordering fixed at
//! build time; nothing here mutates or caches. Ties within one priority fall
//! to the earliest-registered implementation.

use super::{Catalog, ImplEntry};
use crate::core::ids::{CapabilityId, ImplId, ModulePriority, Platform, SubCapId, TokenId};
use crate::core::meta::CapabilityMeta;
use crate::error::ResolveError;

impl Catalog {
	/// Metadata of a registered capability.
	pub fn capability(&self, cap: CapabilityId) -> Option<&CapabilityMeta> {
		self.caps.get(&cap)
	}

	/// The entry a dense id points at.
	pub fn entry(&self, id: ImplId) -> Option<&ImplEntry> {
		self.entries.get(id.as_u32() as usize)
	}

	/// All implementations of `cap`, priority-descending.
	pub fn impls(&self, cap: CapabilityId) -> impl Iterator<Item = &ImplEntry> {
		self.by_cap
			.get(&cap)
			.into_iter()
			.flatten()
			.filter_map(|id| self.entry(*id))
	}

	/// The single winning implementation of `cap`: highest priority among
	/// those carrying no sub-capability.
	pub fn resolve_one(&self, cap: CapabilityId) -> Result<&ImplEntry, ResolveError> {
		self.impls(cap)
			.find(|e| e.meta.sub.is_none())
			.ok_or(ResolveError::UnresolvedCapability(cap))
	}

	/// Every no-sub implementation of `cap`, priority-descending. Possibly
	/// empty; callers wanting a hard failure use [`Catalog::resolve_one`].
	pub fn resolve_all(&self, cap: CapabilityId) -> Vec<&ImplEntry> {
		self.impls(cap).filter(|e| e.meta.sub.is_none()).collect()
	}

	/// The winning implementation of `(cap, sub)`. The capability must permit
	/// multiplicity.
	pub fn resolve_sub(&self, cap: CapabilityId, sub: SubCapId) -> Result<&ImplEntry, ResolveError> {
		debug_assert!(sub.is_some(), "use resolve_one for the no-sub lookup");
		self.require_multiple(cap)?;
		self.impls(cap)
			.find(|e| e.meta.sub == sub)
			.ok_or(ResolveError::UnresolvedSubCapability {
				capability: cap,
				sub,
			})
	}

	/// Every implementation of `cap` carrying a sub-capability,
	/// priority-descending. Possibly empty.
	pub fn resolve_all_sub(&self, cap: CapabilityId) -> Vec<&ImplEntry> {
		self.impls(cap).filter(|e| e.meta.sub.is_some()).collect()
	}

	/// The winning implementation of `cap` visible on `platform`.
	///
	/// Unrestricted implementations match every platform; restricted ones
	/// match only their own.
	pub fn resolve_platform(
		&self,
		cap: CapabilityId,
		platform: Platform,
	) -> Result<&ImplEntry, ResolveError> {
		self.impls(cap)
			.find(|e| e.meta.platform.matches(platform))
			.ok_or(ResolveError::UnresolvedPlatform {
				capability: cap,
				platform,
			})
	}

	/// The highest-priority implementation of `(cap, sub)` strictly below
	/// `bound`. This is the linker's base-resolution primitive.
	pub fn resolve_below(
		&self,
		cap: CapabilityId,
		sub: SubCapId,
		bound: ModulePriority,
	) -> Option<&ImplEntry> {
		let found = self
			.impls(cap)
			.find(|e| e.meta.sub == sub && e.meta.priority < bound);
		tracing::trace!(
			capability = %cap,
			sub = %sub,
			bound = %bound,
			base = found.map(|e| e.decl.type_name),
			"base lookup"
		);
		found
	}

	/// The eagerly assigned id of a named singleton token.
	pub fn token_id(&self, cap: CapabilityId, token: &'static str) -> Option<TokenId> {
		self.tokens.get(&(cap, token)).copied()
	}

	/// All token ids in the catalog, for uniqueness audits.
	pub fn token_ids(&self) -> impl Iterator<Item = TokenId> + '_ {
		self.tokens.values().copied()
	}

	fn require_multiple(&self, cap: CapabilityId) -> Result<(), ResolveError> {
		match self.caps.get(&cap) {
			None => Err(ResolveError::UnresolvedCapability(cap)),
			Some(meta) if !meta.allow_multiple => {
				Err(ResolveError::MultiplicityDisallowed(cap))
			}
			Some(_) => Ok(()),
		}
	}
}
