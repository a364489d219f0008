//! Registration sugar over [`inventory`].

/// Registers an already-declared candidate static.
///
/// ```ignore
/// static RENDERER: CapabilityDecl = CapabilityDecl { .. };
/// register_candidate!(capability RENDERER);
/// ```
#[macro_export]
macro_rules! register_candidate {
	(capability $decl:path) => {
		$crate::inventory::submit! {
			$crate::CandidateReg($crate::Candidate::Capability(&$decl))
		}
	};
	(impl $decl:path) => {
		$crate::inventory::submit! {
			$crate::CandidateReg($crate::Candidate::Impl(&$decl))
		}
	};
}

/// Declares a capability static and registers it in one go.
#[macro_export]
macro_rules! declare_capability {
	($vis:vis static $name:ident: $ty:ty = $decl:expr;) => {
		$vis static $name: $ty = $decl;
		$crate::register_candidate!(capability $name);
	};
}

/// Declares an implementation static and registers it in one go.
#[macro_export]
macro_rules! declare_impl {
	($vis:vis static $name:ident: $ty:ty = $decl:expr;) => {
		$vis static $name: $ty = $decl;
		$crate::register_candidate!(impl $name);
	};
}
