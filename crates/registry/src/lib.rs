//! Priority-layered capability resolution and override linking.
//!
//! Modules declare capabilities (contracts) and implementations of them as
//! `'static` descriptors. A [`Catalog`] build partitions the candidates,
//! resolves inherited metadata, validates multiplicity rules, and freezes a
//! priority-descending ordering per capability. On top of that immutable
//! snapshot sit two stateful layers:
//!
//! - the instance layer ([`Runtime`]): one lazily built singleton per
//!   `(implementation, sub)` key, an optional `try_create` surface, fresh
//!   construction that bypasses the cache, and idle-evicting [`Lazy`]
//!   handles;
//! - the linker ([`Linker`]): binds each override declaration to the
//!   highest-priority implementation of the same key strictly below its own
//!   priority, validating constructor compatibility and every
//!   forward-to-base call site, and caching the outcome per type.
//!
//! Candidates usually arrive through [`inventory`] via
//! [`declare_capability!`] / [`declare_impl!`], but a catalog can equally be
//! built from an explicit feed, which is how the unit tests drive it.

pub mod catalog;
pub mod core;
pub mod error;
pub mod instance;
pub mod link;

mod macros;

pub use inventory;

pub use crate::catalog::{Catalog, CatalogCell, ImplEntry, ModulePriorities};
pub use crate::core::construct::{
	ArcInjector, BaseRef, BoundMethods, BuildCx, BuildFn, CtorImpl, CtorSig, CtorSpec, Injector,
	Instance, MethodFn, MethodSpec,
};
pub use crate::core::decl::{
	Ancestor, Candidate, CandidateReg, CapabilityDecl, ForwardMarker, ForwardMode, ImplDecl,
	OverrideDecl,
};
pub use crate::core::ids::{
	CapabilityId, ImplId, ModuleId, ModulePriority, Platform, SubCapId, TokenId,
};
pub use crate::core::meta::{CapabilityMeta, ImplFlags, ImplMeta};
pub use crate::core::value::{Value, ValueKind};
pub use crate::error::{
	CallError, CatalogError, CtorError, LinkError, ResolveError, RuntimeError, ValueError,
};
pub use crate::instance::{Lazy, Runtime};
pub use crate::link::{BaseBinding, LinkState, Linker};
