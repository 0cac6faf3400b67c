//! Viewport buffer manager.
//!
//! [`ViewportManager`] keeps a bounded [`Window`] of candles from a dataset
//! that may be far too large to hold in memory. The caller drives it with
//! scroll and zoom decisions:
//! - [`load_initial`](ViewportManager::load_initial) and
//!   [`set_interval`](ViewportManager::set_interval) replace the window with
//!   the most recent `buffer_size` buckets
//! - [`extend_start`](ViewportManager::extend_start) and
//!   [`extend_end`](ViewportManager::extend_end) grow it by one chunk,
//!   evicting from the opposite side once `max_buffer_size` is exceeded
//!
//! At most one fetch is in flight per manager. Calls made while one is
//! outstanding return [`LoadOutcome::Skipped`] with [`SkipReason::Busy`].
//! A failed fetch leaves the previous window and domain untouched.

pub mod domain;
pub mod scroll;
pub mod state;
pub mod window;

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info};

use crate::config::ViewportConfig;
use crate::models::{Candle, Interval};
use crate::source::{DataSource, SourceError};

pub use domain::{ValueDomain, ValueRange};
pub use scroll::{Edge, ScrollCorrection, edge_distance, edge_proximity, tail_position};
pub use state::{InFlight, LoadKind, LoadState, Phase};
pub use window::Window;

/// Why an operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another load is in flight.
    Busy,
    /// No dataset has been loaded yet.
    NotLoaded,
    /// The window already starts at the first bucket.
    AtStart,
    /// The window already ends at the last bucket.
    AtEnd,
    /// The requested interval is already selected.
    SameInterval,
}

/// What a completed load changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Candles received from the data source.
    pub fetched: usize,
    /// Candles evicted to respect `max_buffer_size`.
    pub trimmed: usize,
    /// Scroll adjustment that keeps the same candle under the viewport.
    pub scroll: ScrollCorrection,
}

/// Result of a manager operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied(LoadReport),
    Skipped(SkipReason),
}

impl LoadOutcome {
    pub fn report(&self) -> Option<&LoadReport> {
        match self {
            LoadOutcome::Applied(report) => Some(report),
            LoadOutcome::Skipped(_) => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, LoadOutcome::Applied(_))
    }
}

/// Read-only copy of the manager's state for the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub dataset: String,
    pub interval: Interval,
    pub candles: Vec<Candle>,
    pub logical_offset: usize,
    pub total_count: usize,
    /// Domain to render with; `None` when the window is empty.
    pub stable_domain: Option<ValueRange>,
}

/// A dataset's loaded window and the value domain derived from it.
struct Loaded {
    dataset: String,
    window: Window,
    domain: Option<ValueDomain>,
}

impl Loaded {
    /// Folds the current window range into the domain.
    fn refresh_domain(&mut self) {
        let Some(range) = self.window.value_range() else {
            return;
        };
        match self.domain.as_mut() {
            Some(domain) => domain.update(range),
            None => self.domain = Some(ValueDomain::new(range)),
        }
    }
}

struct Inner {
    state: LoadState,
    interval: Interval,
    loaded: Option<Loaded>,
}

/// Owner of the in-memory window over one dataset.
///
/// Operations take `&self`, so a manager can be shared (for example behind
/// an `Arc`) between the task driving scroll events and readers taking
/// snapshots. Mutation is still serialized by the single-flight rule.
pub struct ViewportManager<S> {
    source: S,
    config: ViewportConfig,
    inner: Mutex<Inner>,
}

/// Range a full reset will fetch.
struct ResetPlan {
    dataset: String,
    interval: Interval,
}

/// Range an extension will fetch.
struct ExtendPlan {
    dataset: String,
    interval: Interval,
    start: usize,
    count: usize,
}

impl<S: DataSource> ViewportManager<S> {
    /// Creates an uninitialized manager reading from `source`.
    #[must_use]
    pub fn new(source: S, config: ViewportConfig) -> Self {
        let interval = config.default_interval;
        Self {
            source,
            config,
            inner: Mutex::new(Inner {
                state: LoadState::new(),
                interval,
                loaded: None,
            }),
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Loads the most recent `buffer_size` buckets of `dataset` at the
    /// current interval, replacing any previous dataset.
    ///
    /// The report's scroll correction puts the last `visible_count` candles
    /// on screen.
    ///
    /// # Errors
    ///
    /// Returns the data source's error unchanged; the previous window stays.
    pub async fn load_initial(
        &self,
        dataset: &str,
        visible_count: usize,
    ) -> Result<LoadOutcome, SourceError> {
        let started = self.begin(LoadKind::Initial, |inner| {
            Ok(ResetPlan {
                dataset: dataset.to_string(),
                interval: inner.interval,
            })
        });
        self.reset(LoadKind::Initial, started, visible_count).await
    }

    /// Switches to `interval`, discarding the window and both domains and
    /// reloading the most recent buckets at the new granularity.
    ///
    /// Before any dataset is loaded this only records the interval.
    ///
    /// # Errors
    ///
    /// Returns the data source's error unchanged; the previous interval and
    /// window stay.
    pub async fn set_interval(
        &self,
        interval: Interval,
        visible_count: usize,
    ) -> Result<LoadOutcome, SourceError> {
        let started = self.begin(LoadKind::Interval, |inner| {
            if inner.interval == interval {
                return Err(SkipReason::SameInterval);
            }
            let Some(loaded) = inner.loaded.as_ref() else {
                inner.interval = interval;
                return Err(SkipReason::NotLoaded);
            };
            Ok(ResetPlan {
                dataset: loaded.dataset.clone(),
                interval,
            })
        });
        self.reset(LoadKind::Interval, started, visible_count).await
    }

    /// Reloads the current dataset at the current interval from scratch,
    /// picking up any change in its length.
    ///
    /// # Errors
    ///
    /// Returns the data source's error unchanged; the previous window stays.
    pub async fn reload(&self, visible_count: usize) -> Result<LoadOutcome, SourceError> {
        let started = self.begin(LoadKind::Reload, |inner| {
            let loaded = inner.loaded.as_ref().ok_or(SkipReason::NotLoaded)?;
            Ok(ResetPlan {
                dataset: loaded.dataset.clone(),
                interval: inner.interval,
            })
        });
        self.reset(LoadKind::Reload, started, visible_count).await
    }

    /// Fetches up to one chunk of older buckets and prepends them.
    ///
    /// If the window then exceeds `max_buffer_size`, candles are evicted from
    /// its end. The caller shifts its scroll position forward by the number
    /// of candles prepended.
    ///
    /// # Errors
    ///
    /// Returns the data source's error unchanged. A source that returns fewer
    /// buckets than requested is reported as [`SourceError::DataError`]
    /// because the result could not be placed contiguously.
    pub async fn extend_start(&self) -> Result<LoadOutcome, SourceError> {
        let started = self.begin(LoadKind::Start, |inner| {
            let loaded = inner.loaded.as_ref().ok_or(SkipReason::NotLoaded)?;
            let offset = loaded.window.logical_offset();
            if offset == 0 {
                return Err(SkipReason::AtStart);
            }
            let count = self.config.load_chunk_size.min(offset);
            Ok(ExtendPlan {
                dataset: loaded.dataset.clone(),
                interval: inner.interval,
                start: offset - count,
                count,
            })
        });
        let (guard, plan) = match started {
            Ok(started) => started,
            Err(reason) => return Ok(skipped(LoadKind::Start, reason)),
        };

        let candles = match self
            .source
            .fetch_range(&plan.dataset, plan.interval, plan.start, plan.count)
            .await
        {
            Ok(candles) => candles,
            Err(e) => return Err(guard.fail(e)),
        };
        if candles.len() != plan.count {
            return Err(guard.fail(SourceError::DataError(format!(
                "expected {} buckets at offset {}, got {}",
                plan.count,
                plan.start,
                candles.len()
            ))));
        }

        let max = self.config.max_buffer_size;
        let report = guard.succeed(|loaded| {
            let fetched = candles.len();
            loaded.window.prepend(candles);
            let trimmed = loaded.window.trim_back(max);
            loaded.refresh_domain();
            info!(
                dataset = %plan.dataset,
                offset = loaded.window.logical_offset(),
                fetched,
                trimmed,
                "extended window toward start"
            );
            LoadReport {
                fetched,
                trimmed,
                scroll: ScrollCorrection::Shift(to_delta(fetched)),
            }
        });
        Ok(report.map_or(
            LoadOutcome::Skipped(SkipReason::NotLoaded),
            LoadOutcome::Applied,
        ))
    }

    /// Fetches up to one chunk of newer buckets and appends them.
    ///
    /// If the window then exceeds `max_buffer_size`, candles are evicted from
    /// its start and the logical offset advances past them. The caller shifts
    /// its scroll position backward by the number evicted.
    ///
    /// # Errors
    ///
    /// Returns the data source's error unchanged.
    pub async fn extend_end(&self) -> Result<LoadOutcome, SourceError> {
        let started = self.begin(LoadKind::End, |inner| {
            let loaded = inner.loaded.as_ref().ok_or(SkipReason::NotLoaded)?;
            let remaining = loaded.window.remaining_after();
            if remaining == 0 {
                return Err(SkipReason::AtEnd);
            }
            Ok(ExtendPlan {
                dataset: loaded.dataset.clone(),
                interval: inner.interval,
                start: loaded.window.end_offset(),
                count: self.config.load_chunk_size.min(remaining),
            })
        });
        let (guard, plan) = match started {
            Ok(started) => started,
            Err(reason) => return Ok(skipped(LoadKind::End, reason)),
        };

        let mut candles = match self
            .source
            .fetch_range(&plan.dataset, plan.interval, plan.start, plan.count)
            .await
        {
            Ok(candles) => candles,
            Err(e) => return Err(guard.fail(e)),
        };
        candles.truncate(plan.count);

        let max = self.config.max_buffer_size;
        let report = guard.succeed(|loaded| {
            let fetched = candles.len();
            loaded.window.append(candles);
            let trimmed = loaded.window.trim_front(max);
            loaded.refresh_domain();
            info!(
                dataset = %plan.dataset,
                offset = loaded.window.logical_offset(),
                fetched,
                trimmed,
                "extended window toward end"
            );
            LoadReport {
                fetched,
                trimmed,
                scroll: ScrollCorrection::Shift(-to_delta(trimmed)),
            }
        });
        Ok(report.map_or(
            LoadOutcome::Skipped(SkipReason::NotLoaded),
            LoadOutcome::Applied,
        ))
    }

    /// Shared body of `load_initial`, `set_interval` and `reload`.
    async fn reset(
        &self,
        kind: LoadKind,
        started: Result<(LoadGuard<'_>, ResetPlan), SkipReason>,
        visible_count: usize,
    ) -> Result<LoadOutcome, SourceError> {
        let (guard, plan) = match started {
            Ok(started) => started,
            Err(reason) => return Ok(skipped(kind, reason)),
        };
        let ResetPlan { dataset, interval } = plan;

        let total = match self.source.get_bucket_count(&dataset, interval).await {
            Ok(total) => total,
            Err(e) => return Err(guard.fail(e)),
        };
        let start = total.saturating_sub(self.config.buffer_size);
        let count = total - start;

        let mut candles = if count == 0 {
            Vec::new()
        } else {
            match self.source.fetch_range(&dataset, interval, start, count).await {
                Ok(candles) => candles,
                Err(e) => return Err(guard.fail(e)),
            }
        };
        candles.truncate(count);

        let window = Window::new(candles, start, total);
        let report = LoadReport {
            fetched: window.len(),
            trimmed: 0,
            scroll: ScrollCorrection::JumpTo(tail_position(window.len(), visible_count)),
        };
        info!(
            dataset = %dataset,
            %interval,
            total,
            offset = start,
            loaded = window.len(),
            "loaded window"
        );
        guard.replace(interval, dataset, window);
        Ok(LoadOutcome::Applied(report))
    }

    /// Runs the busy check and `plan` under the lock, then enters `Loading`.
    fn begin<P>(
        &self,
        kind: LoadKind,
        plan: impl FnOnce(&mut Inner) -> Result<P, SkipReason>,
    ) -> Result<(LoadGuard<'_>, P), SkipReason> {
        let mut inner = self.lock();
        if inner.state.is_loading() {
            return Err(SkipReason::Busy);
        }
        let plan = plan(&mut *inner)?;
        let token = inner.state.begin(kind).ok_or(SkipReason::Busy)?;
        debug!(?kind, "load started");
        Ok((
            LoadGuard {
                inner: &self.inner,
                token: Some(token),
            },
            plan,
        ))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Accessors --

    /// Current phase of the load state machine.
    pub fn phase(&self) -> Phase {
        self.lock().state.phase().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading()
    }

    pub fn current_interval(&self) -> Interval {
        self.lock().interval
    }

    /// Identifier of the loaded dataset.
    pub fn dataset(&self) -> Option<String> {
        self.lock().loaded.as_ref().map(|l| l.dataset.clone())
    }

    /// Copy of the loaded window.
    pub fn window(&self) -> Option<Window> {
        self.lock().loaded.as_ref().map(|l| l.window.clone())
    }

    /// Buckets available at the current interval, or zero before any load.
    pub fn total_count(&self) -> usize {
        self.lock()
            .loaded
            .as_ref()
            .map_or(0, |l| l.window.total_count())
    }

    /// Dataset position of the window's first candle, or zero before any load.
    pub fn logical_offset(&self) -> usize {
        self.lock()
            .loaded
            .as_ref()
            .map_or(0, |l| l.window.logical_offset())
    }

    /// Value range to render with.
    pub fn stable_domain(&self) -> Option<ValueRange> {
        self.lock()
            .loaded
            .as_ref()
            .and_then(|l| l.domain)
            .map(|d| d.stable())
    }

    /// Value range of the currently loaded candles only.
    pub fn instantaneous_domain(&self) -> Option<ValueRange> {
        self.lock()
            .loaded
            .as_ref()
            .and_then(|l| l.domain)
            .map(|d| d.instantaneous())
    }

    /// Owned copy of everything the rendering layer needs.
    pub fn snapshot(&self) -> Option<WindowSnapshot> {
        let inner = self.lock();
        let loaded = inner.loaded.as_ref()?;
        Some(WindowSnapshot {
            dataset: loaded.dataset.clone(),
            interval: inner.interval,
            candles: loaded.window.to_vec(),
            logical_offset: loaded.window.logical_offset(),
            total_count: loaded.window.total_count(),
            stable_domain: loaded.domain.map(|d| d.stable()),
        })
    }
}

/// Holds the in-flight token for one load.
///
/// Settling consumes the guard; dropping it unsettled (the operation's
/// future was cancelled) returns the state machine to its previous phase.
struct LoadGuard<'a> {
    inner: &'a Mutex<Inner>,
    token: Option<InFlight>,
}

impl LoadGuard<'_> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `commit` to the loaded dataset and enters `Ready`.
    ///
    /// Returns `None`, abandoning the load, if nothing is loaded.
    fn succeed<R>(mut self, commit: impl FnOnce(&mut Loaded) -> R) -> Option<R> {
        let token = self.token.take()?;
        let mut inner = self.lock();
        match inner.loaded.as_mut() {
            Some(loaded) => {
                let result = commit(loaded);
                inner.state.succeed(token);
                Some(result)
            }
            None => {
                inner.state.abandon(token);
                None
            }
        }
    }

    /// Replaces the dataset, interval, window and domains, and enters `Ready`.
    fn replace(mut self, interval: Interval, dataset: String, window: Window) {
        let token = self.token.take();
        let mut inner = self.lock();
        let mut loaded = Loaded {
            dataset,
            window,
            domain: None,
        };
        loaded.refresh_domain();
        inner.interval = interval;
        inner.loaded = Some(loaded);
        if let Some(token) = token {
            inner.state.succeed(token);
        }
    }

    /// Enters `Error` without touching loaded data and hands `error` back.
    fn fail(mut self, error: SourceError) -> SourceError {
        let token = self.token.take();
        let mut inner = self.lock();
        if let Some(token) = token {
            error!(kind = ?token.kind(), %error, "load failed");
            inner.state.fail(token, error.clone());
        }
        error
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            debug!(kind = ?token.kind(), "load abandoned");
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.state.abandon(token);
        }
    }
}

fn skipped(kind: LoadKind, reason: SkipReason) -> LoadOutcome {
    debug!(?kind, ?reason, "load skipped");
    LoadOutcome::Skipped(reason)
}

fn to_delta(count: usize) -> isize {
    isize::try_from(count).unwrap_or(isize::MAX)
}
