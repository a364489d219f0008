//! Shared data model: ids, declarations, resolved metadata, dynamic values,
//! and construction strategies.

pub mod construct;
pub mod decl;
pub mod ids;
pub mod meta;
pub mod value;
