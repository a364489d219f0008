//! Idle-evicting lazy handles.
//!
//! A [`Lazy`] owns its target and rebuilds it on demand. Eviction is checked
//! inline on every access; there is no background sweep, so an idle value
//! survives until the next `get` observes that its idle time exceeded the
//! TTL.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::RuntimeError;

/// Fallback idle TTL when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

static CONFIGURED_TTL: OnceLock<Duration> = OnceLock::new();

/// Process-wide idle TTL, read once from `STRATUM_LAZY_TTL_MS`.
pub fn default_ttl() -> Duration {
	*CONFIGURED_TTL.get_or_init(|| {
		std::env::var("STRATUM_LAZY_TTL_MS")
			.ok()
			.and_then(|raw| raw.parse::<u64>().ok())
			.map(Duration::from_millis)
			.unwrap_or(DEFAULT_TTL)
	})
}

struct Slot<T> {
	value: Option<T>,
	last_use: Instant,
}

struct LazyInner<T> {
	label: String,
	factory: Box<dyn Fn() -> Option<T> + Send + Sync>,
	ttl: Duration,
	immortal: bool,
	slot: Mutex<Slot<T>>,
}

/// A lazily built, idle-evicted handle to a `T`.
///
/// Cloning shares the slot; all clones see the same cached value.
pub struct Lazy<T> {
	inner: Arc<LazyInner<T>>,
}

impl<T> Clone for Lazy<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T: Clone> Lazy<T> {
	/// Handle with the process-default TTL.
	pub fn new<F>(label: impl Into<String>, factory: F) -> Self
	where
		F: Fn() -> Option<T> + Send + Sync + 'static,
	{
		Self::with_options(label, factory, default_ttl(), false)
	}

	/// Handle whose value, once built, is never evicted.
	pub fn immortal<F>(label: impl Into<String>, factory: F) -> Self
	where
		F: Fn() -> Option<T> + Send + Sync + 'static,
	{
		Self::with_options(label, factory, default_ttl(), true)
	}

	pub fn with_options<F>(label: impl Into<String>, factory: F, ttl: Duration, immortal: bool) -> Self
	where
		F: Fn() -> Option<T> + Send + Sync + 'static,
	{
		Self {
			inner: Arc::new(LazyInner {
				label: label.into(),
				factory: Box::new(factory),
				ttl,
				immortal,
				slot: Mutex::new(Slot {
					value: None,
					last_use: Instant::now(),
				}),
			}),
		}
	}

	/// The current value, building or rebuilding it as needed.
	///
	/// An idle time strictly greater than the TTL evicts before the check;
	/// the access itself then refreshes the idle clock.
	pub fn get(&self) -> Result<T, RuntimeError> {
		let inner = &*self.inner;
		let mut slot = inner.slot.lock();
		let now = Instant::now();

		if slot.value.is_some()
			&& !inner.immortal
			&& now.duration_since(slot.last_use) > inner.ttl
		{
			tracing::debug!(label = %inner.label, "evicting idle lazy value");
			slot.value = None;
		}

		let value = match slot.value.clone() {
			Some(value) => value,
			None => {
				let built =
					(inner.factory)().ok_or_else(|| RuntimeError::InjectionFailure {
						dependent: inner.label.clone(),
					})?;
				slot.value = Some(built.clone());
				built
			}
		};
		slot.last_use = now;
		Ok(value)
	}

	/// True if a value is currently materialized, without touching the idle
	/// clock or triggering construction.
	pub fn is_materialized(&self) -> bool {
		self.inner.slot.lock().value.is_some()
	}
}
