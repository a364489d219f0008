//! Dynamic argument and return model for cross-module calls.
//!
//! Constructor arguments and forwarded base-method calls cross module
//! boundaries without a shared static type, so they travel as [`Value`]s.
//! Kind coercion here is the explicit stand-in for the unboxing a linked
//! call site performs on replacement arguments.

use std::fmt;

use super::construct::Instance;
use crate::error::ValueError;

/// Kind tag for a [`Value`]; used in constructor and method signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
	/// No value (void returns).
	Unit,
	Bool,
	Int,
	Float,
	Str,
	/// A shared instance of some implementation type.
	Obj,
}

impl ValueKind {
	/// Returns true if an argument of kind `found` is acceptable where `self`
	/// is declared, either exactly or via a lossless numeric widening.
	pub fn admits(self, found: ValueKind) -> bool {
		self == found || (self == ValueKind::Float && found == ValueKind::Int)
	}
}

/// A dynamically typed argument or return value.
#[derive(Clone)]
pub enum Value {
	Unit,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	Obj(Instance),
}

impl Value {
	/// Returns the kind tag of this value.
	pub fn kind(&self) -> ValueKind {
		match self {
			Value::Unit => ValueKind::Unit,
			Value::Bool(_) => ValueKind::Bool,
			Value::Int(_) => ValueKind::Int,
			Value::Float(_) => ValueKind::Float,
			Value::Str(_) => ValueKind::Str,
			Value::Obj(_) => ValueKind::Obj,
		}
	}

	/// Coerces this value to the declared kind. Ints widen to floats;
	/// everything else must match exactly.
	pub fn coerce(self, kind: ValueKind) -> Result<Value, ValueError> {
		if self.kind() == kind {
			return Ok(self);
		}
		match (self, kind) {
			(Value::Int(i), ValueKind::Float) => Ok(Value::Float(i as f64)),
			(v, expected) => Err(ValueError::KindMismatch {
				expected,
				found: v.kind(),
			}),
		}
	}

	/// Reads a bool, erring on any other kind.
	pub fn as_bool(&self) -> Result<bool, ValueError> {
		match self {
			Value::Bool(b) => Ok(*b),
			v => Err(ValueError::KindMismatch {
				expected: ValueKind::Bool,
				found: v.kind(),
			}),
		}
	}

	/// Reads an integer, erring on any other kind.
	pub fn as_i64(&self) -> Result<i64, ValueError> {
		match self {
			Value::Int(i) => Ok(*i),
			v => Err(ValueError::KindMismatch {
				expected: ValueKind::Int,
				found: v.kind(),
			}),
		}
	}

	/// Reads a float; integers widen.
	pub fn as_f64(&self) -> Result<f64, ValueError> {
		match self {
			Value::Float(f) => Ok(*f),
			Value::Int(i) => Ok(*i as f64),
			v => Err(ValueError::KindMismatch {
				expected: ValueKind::Float,
				found: v.kind(),
			}),
		}
	}

	/// Reads a string slice, erring on any other kind.
	pub fn as_str(&self) -> Result<&str, ValueError> {
		match self {
			Value::Str(s) => Ok(s),
			v => Err(ValueError::KindMismatch {
				expected: ValueKind::Str,
				found: v.kind(),
			}),
		}
	}

	/// Reads the held instance, erring on any other kind.
	pub fn as_obj(&self) -> Result<&Instance, ValueError> {
		match self {
			Value::Obj(o) => Ok(o),
			v => Err(ValueError::KindMismatch {
				expected: ValueKind::Obj,
				found: v.kind(),
			}),
		}
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Unit => f.write_str("Unit"),
			Value::Bool(b) => write!(f, "Bool({b})"),
			Value::Int(i) => write!(f, "Int({i})"),
			Value::Float(x) => write!(f, "Float({x})"),
			Value::Str(s) => write!(f, "Str({s:?})"),
			Value::Obj(_) => f.write_str("Obj(..)"),
		}
	}
}

impl From<()> for Value {
	fn from((): ()) -> Self {
		Value::Unit
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Value::Float(f)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::Str(s.to_owned())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::Str(s)
	}
}

impl From<Instance> for Value {
	fn from(o: Instance) -> Self {
		Value::Obj(o)
	}
}
