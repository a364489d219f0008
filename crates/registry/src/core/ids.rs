//! Identifier newtypes shared by the catalog, resolver, instance layer, and linker.
//!
//! Ids are `Copy` wrappers over `&'static str` so descriptors can be declared
//! in statics and compared without allocation. Sentinel values are associated
//! consts rather than `Option`s where the sentinel is itself a meaningful
//! resolved state (`SubCapId::NONE`, `Platform::ALL`).

use std::fmt;

/// Names a contract dependents can request an implementation for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityId(pub &'static str);

impl fmt::Display for CapabilityId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.0)
	}
}

/// Secondary key distinguishing simultaneous implementations of one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubCapId(pub &'static str);

impl SubCapId {
	/// Resolved state for implementations that carry no sub-capability.
	pub const NONE: SubCapId = SubCapId("none");

	/// Returns true if this is the NONE sentinel.
	pub fn is_none(self) -> bool {
		self == Self::NONE
	}

	/// Returns true if this names an actual sub-capability.
	pub fn is_some(self) -> bool {
		!self.is_none()
	}
}

impl fmt::Display for SubCapId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.0)
	}
}

/// Identifies the module that owns an implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub &'static str);

impl fmt::Display for ModuleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.0)
	}
}

/// Platform restriction on an implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform(pub &'static str);

impl Platform {
	/// Unrestricted: matches every requested platform.
	pub const ALL: Platform = Platform("all");

	/// Returns true if this is the unrestricted sentinel.
	pub fn is_all(self) -> bool {
		self == Self::ALL
	}

	/// Returns true if an implementation restricted to `self` satisfies a
	/// request for `requested`. ALL matches in either direction.
	pub fn matches(self, requested: Platform) -> bool {
		self.is_all() || requested.is_all() || self == requested
	}
}

impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.0)
	}
}

/// Numeric rank of an owning module; higher wins when multiplicity is disallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePriority(pub i16);

impl ModulePriority {
	/// Fixed sentinel carried by interface-level (capability) declarations.
	/// Never valid on a resolved implementation descriptor.
	pub const INTERFACE: ModulePriority = ModulePriority(i16::MIN);

	/// Returns true if this is the interface sentinel.
	pub fn is_sentinel(self) -> bool {
		self == Self::INTERFACE
	}
}

impl fmt::Display for ModulePriority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Dense index of a retained implementation inside a built catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImplId(pub u32);

impl ImplId {
	/// Returns the raw index.
	pub fn as_u32(self) -> u32 {
		self.0
	}
}

impl fmt::Display for ImplId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Process-wide unique id eagerly assigned to a named singleton token at
/// catalog-build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u32);

impl fmt::Display for TokenId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
