//! Batch preview and apply engines
//!
//! Both engines load a fresh [`RegistrySnapshot`], verify every trait type in
//! the query set is registered, then stream the traits through
//! [`analyze`](crate::analyzer::analyze). Preview never writes; apply writes
//! one trait at a time and keeps going when a single update fails.

mod apply;
mod preview;

pub use apply::{apply, ApplyFailure, ApplyResult};
pub use preview::{preview, BatchResult, PreviewEntry, PREVIEW_LIMIT};

use crate::error::ConversionError;
use crate::registry::{RegistrySnapshot, RegistrySource};
use crate::store::{TraitQuery, TraitStore};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Default bound on concurrently pending updates during apply
pub const DEFAULT_MAX_IN_FLIGHT_UPDATES: usize = 8;

/// Caller-provided cutoffs for one batch
#[derive(Debug, Clone)]
pub struct BatchLimits {
    /// Stop after this many traits have been scanned
    pub max_records: Option<u64>,
    /// Stop scanning once this much time has elapsed
    pub time_budget: Option<Duration>,
    pub max_in_flight_updates: usize,
    pub cancel: Option<CancellationToken>,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_records: None,
            time_budget: None,
            max_in_flight_updates: DEFAULT_MAX_IN_FLIGHT_UPDATES,
            cancel: None,
        }
    }
}

impl BatchLimits {
    pub fn with_max_records(mut self, max_records: u64) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn start(&self) -> Cutoff<'_> {
        Cutoff {
            limits: self,
            started: Instant::now(),
            admitted: AtomicU64::new(0),
            tripped: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
        }
    }
}

/// Scan gate for one batch run
///
/// Checked before each record is processed; once it refuses a record the
/// scan ends and no further records are read.
pub(crate) struct Cutoff<'a> {
    limits: &'a BatchLimits,
    started: Instant,
    admitted: AtomicU64,
    tripped: AtomicBool,
    aborted: AtomicBool,
}

impl Cutoff<'_> {
    /// Whether the next scanned record may be processed
    pub(crate) fn admit(&self) -> bool {
        if self.aborted.load(Ordering::Acquire) {
            return false;
        }

        let admitted = self.admitted.load(Ordering::Acquire);
        let reason = if self.limits.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            Some("cancelled")
        } else if self.limits.max_records.is_some_and(|max| admitted >= max) {
            Some("max_records")
        } else if self
            .limits
            .time_budget
            .is_some_and(|budget| self.started.elapsed() >= budget)
        {
            Some("time_budget")
        } else {
            None
        };

        if let Some(reason) = reason {
            if !self.tripped.swap(true, Ordering::AcqRel) {
                info!(reason, scanned = admitted, "Batch limit reached, stopping scan");
            }
            return false;
        }

        self.admitted.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Refuse every further record
    pub(crate) fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    /// A limit ended the scan while records remained
    pub(crate) fn stopped_early(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}

/// Fail with `UnknownTraitType` if the query set uses an unregistered type
pub(crate) async fn check_types<S>(
    store: &S,
    query: &TraitQuery,
    registry: &RegistrySnapshot,
) -> Result<(), ConversionError>
where
    S: TraitStore + ?Sized,
{
    for usage in store.distinct_types(query).await? {
        if !registry.contains(&usage.trait_type) {
            return Err(ConversionError::UnknownTraitType {
                trait_id: usage.first_id,
                trait_type: usage.trait_type,
            });
        }
    }
    Ok(())
}

/// Load the registry from `store` and preview `query`
pub async fn run_preview<S>(
    store: &S,
    query: &TraitQuery,
    limits: &BatchLimits,
) -> Result<BatchResult, ConversionError>
where
    S: TraitStore + RegistrySource + ?Sized,
{
    let registry = RegistrySnapshot::load(store).await?;
    preview(store, query, &registry, limits).await
}

/// Load the registry from `store` and apply conversions to `query`
pub async fn run_apply<S>(
    store: &S,
    query: &TraitQuery,
    limits: &BatchLimits,
) -> Result<ApplyResult, ConversionError>
where
    S: TraitStore + RegistrySource + ?Sized,
{
    let registry = RegistrySnapshot::load(store).await?;
    apply(store, query, &registry, limits).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_records_cutoff() {
        let limits = BatchLimits::default().with_max_records(2);
        let cutoff = limits.start();
        assert!(cutoff.admit());
        assert!(cutoff.admit());
        assert!(!cutoff.admit());
        assert!(cutoff.stopped_early());
    }

    #[test]
    fn test_unlimited_never_trips() {
        let limits = BatchLimits::default();
        let cutoff = limits.start();
        for _ in 0..1000 {
            assert!(cutoff.admit());
        }
        assert!(!cutoff.stopped_early());
    }

    #[test]
    fn test_cancel_stops_scan() {
        let token = CancellationToken::new();
        let limits = BatchLimits::default().with_cancel(token.clone());
        let cutoff = limits.start();
        assert!(cutoff.admit());
        token.cancel();
        assert!(!cutoff.admit());
        assert!(cutoff.stopped_early());
    }

    #[test]
    fn test_zero_time_budget_stops_immediately() {
        let limits = BatchLimits::default().with_time_budget(Duration::ZERO);
        let cutoff = limits.start();
        assert!(!cutoff.admit());
        assert!(cutoff.stopped_early());
    }

    #[test]
    fn test_abort_is_not_a_limit() {
        let limits = BatchLimits::default();
        let cutoff = limits.start();
        cutoff.abort();
        assert!(!cutoff.admit());
        assert!(!cutoff.stopped_early());
    }
}
