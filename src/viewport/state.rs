//! Load state machine.
//!
//! ```text
//! Uninitialized | Ready | Error  --begin-->    Loading
//! Loading                        --succeed-->  Ready
//! Loading                        --fail-->     Error
//! Loading                        --abandon-->  (phase before begin)
//! ```
//!
//! [`LoadState::begin`] is the only way into `Loading` and hands out the
//! single [`InFlight`] token; every exit consumes it. While a token is
//! outstanding further `begin` calls are refused, which is how overlapping
//! requests get dropped instead of queued.

use crate::source::SourceError;

/// Which operation a load belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Initial,
    Interval,
    Reload,
    Start,
    End,
}

/// Observable manager phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading(LoadKind),
    Ready,
    /// The last operation failed. Previously loaded data is still intact.
    Error(SourceError),
}

/// Proof that a load is in flight. Exactly one exists per `Loading` phase.
#[must_use = "an in-flight load must be settled"]
#[derive(Debug)]
pub struct InFlight {
    kind: LoadKind,
}

impl InFlight {
    pub fn kind(&self) -> LoadKind {
        self.kind
    }
}

/// Holder of the current [`Phase`]; transitions are its only mutators.
#[derive(Debug)]
pub struct LoadState {
    phase: Phase,
    before_load: Option<Phase>,
}

impl LoadState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
            before_load: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading(_))
    }

    /// Enters `Loading`, or returns `None` if a load is already in flight.
    pub fn begin(&mut self, kind: LoadKind) -> Option<InFlight> {
        if self.is_loading() {
            return None;
        }
        self.before_load = Some(std::mem::replace(&mut self.phase, Phase::Loading(kind)));
        Some(InFlight { kind })
    }

    /// `Loading → Ready`.
    pub fn succeed(&mut self, token: InFlight) {
        let InFlight { .. } = token;
        self.before_load = None;
        self.phase = Phase::Ready;
    }

    /// `Loading → Error`.
    pub fn fail(&mut self, token: InFlight, error: SourceError) {
        let InFlight { .. } = token;
        self.before_load = None;
        self.phase = Phase::Error(error);
    }

    /// Returns to the phase held before `begin`, for loads that never finished.
    pub fn abandon(&mut self, token: InFlight) {
        let InFlight { .. } = token;
        self.phase = self.before_load.take().unwrap_or(Phase::Uninitialized);
    }
}

impl Default for LoadState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_refused() {
        let mut state = LoadState::new();
        let token = state.begin(LoadKind::End).unwrap();

        assert!(state.begin(LoadKind::End).is_none());
        assert!(state.begin(LoadKind::Start).is_none());
        assert_eq!(state.phase(), &Phase::Loading(LoadKind::End));

        state.succeed(token);
        assert_eq!(state.phase(), &Phase::Ready);
        assert!(state.begin(LoadKind::Start).is_some());
    }

    #[test]
    fn failure_records_error() {
        let mut state = LoadState::new();
        let token = state.begin(LoadKind::Initial).unwrap();
        state.fail(token, SourceError::NotConnected);

        assert_eq!(state.phase(), &Phase::Error(SourceError::NotConnected));
        assert!(!state.is_loading());
    }

    #[test]
    fn error_state_allows_retry() {
        let mut state = LoadState::new();
        let token = state.begin(LoadKind::Initial).unwrap();
        state.fail(token, SourceError::DataError("boom".to_string()));

        let retry = state.begin(LoadKind::Initial).unwrap();
        assert_eq!(retry.kind(), LoadKind::Initial);
        state.succeed(retry);
        assert_eq!(state.phase(), &Phase::Ready);
    }

    #[test]
    fn abandon_restores_previous_phase() {
        let mut state = LoadState::new();
        let first = state.begin(LoadKind::Initial).unwrap();
        state.succeed(first);

        let token = state.begin(LoadKind::Start).unwrap();
        state.abandon(token);
        assert_eq!(state.phase(), &Phase::Ready);

        let mut fresh = LoadState::new();
        let token = fresh.begin(LoadKind::Initial).unwrap();
        fresh.abandon(token);
        assert_eq!(fresh.phase(), &Phase::Uninitialized);
    }
}
