//! Resolved descriptors.
//!
//! # Role
//!
//! Declarations (`core::decl`) may leave metadata unset and inherit it from an
//! ancestry chain. The catalog build resolves every field exactly once and
//! stores the result here; descriptors are immutable from then on.

use super::ids::{CapabilityId, ModuleId, ModulePriority, Platform, SubCapId};

bitflags::bitflags! {
	/// Behavior flags carried by an implementation descriptor.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct ImplFlags: u8 {
		/// Instances come from a zero-argument accessor the implementation
		/// itself exposes, never from ordinary construction.
		const EXTERNAL_FACTORY = 1 << 0;
		/// Declaration-side echo of the capability's multiplicity; the
		/// capability descriptor is authoritative.
		const ALLOW_MULTIPLE = 1 << 1;
	}
}

/// A contract dependents can request: capability id plus the rules every
/// implementation of it must follow.
///
/// The owning module priority of a capability is always
/// [`ModulePriority::INTERFACE`]; it never competes with implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityMeta {
	/// Unique capability id.
	pub id: CapabilityId,
	/// Whether several implementations may win simultaneously (under distinct
	/// sub-capability ids).
	pub allow_multiple: bool,
	/// Whether every implementation must declare a sub-capability id.
	pub force_definition: bool,
	/// Closed set of named singleton tokens; each gets a process-wide unique
	/// [`super::ids::TokenId`] at catalog build.
	pub tokens: &'static [&'static str],
}

/// A concrete implementation's fully resolved metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplMeta {
	/// Capability this type implements. Never a sentinel after resolution.
	pub capability: CapabilityId,
	/// Sub-capability id, [`SubCapId::NONE`] when not applicable.
	pub sub: SubCapId,
	/// Owning module.
	pub module: ModuleId,
	/// Owning module's priority. Never [`ModulePriority::INTERFACE`] after
	/// resolution.
	pub priority: ModulePriority,
	/// Platform restriction, [`Platform::ALL`] when unrestricted.
	pub platform: Platform,
	/// Behavior flags.
	pub flags: ImplFlags,
}
