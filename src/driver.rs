//! Command loop around a [`ViewportManager`].
//!
//! [`ViewportDriver`] is the single owner task that turns UI commands and
//! directory changes into manager calls. Scroll positions are debounced and
//! only trigger a fetch once the visible range comes within
//! `edge_threshold` candles of either end of the window.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::Interval;
use crate::source::{DataSource, SourceError};
use crate::viewport::{
    Edge, LoadOutcome, LoadReport, SkipReason, ViewportManager, WindowSnapshot, edge_distance,
    edge_proximity,
};
use crate::watch::ChangeEvent;

/// Requests from the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportCommand {
    /// Load a dataset, landing on its most recent candles.
    Open {
        dataset: String,
        visible_count: usize,
    },
    /// Switch to another interval.
    SetInterval(Interval),
    /// The first visible candle or the number of visible candles changed.
    Scrolled {
        first_visible: usize,
        visible_count: usize,
    },
    /// Reload the current dataset from scratch.
    Reload,
    /// Stop the driver.
    Shutdown,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEvent {
    /// The window changed; apply `report.scroll` to the scroll position.
    Updated {
        snapshot: WindowSnapshot,
        report: LoadReport,
    },
    /// A fetch failed. The previous window is still valid.
    Failed(SourceError),
}

/// Task that serializes all manager calls for one viewport.
pub struct ViewportDriver<S> {
    manager: Arc<ViewportManager<S>>,
    commands: mpsc::UnboundedReceiver<ViewportCommand>,
    changes: Option<mpsc::UnboundedReceiver<ChangeEvent>>,
    events: mpsc::UnboundedSender<ViewportEvent>,
}

/// State the command handlers mutate, split from the receivers polled by `select!`.
struct Session<S> {
    manager: Arc<ViewportManager<S>>,
    events: mpsc::UnboundedSender<ViewportEvent>,
    visible_count: usize,
}

impl<S: DataSource + 'static> ViewportDriver<S> {
    #[must_use]
    pub fn new(
        manager: Arc<ViewportManager<S>>,
        commands: mpsc::UnboundedReceiver<ViewportCommand>,
        events: mpsc::UnboundedSender<ViewportEvent>,
    ) -> Self {
        Self {
            manager,
            commands,
            changes: None,
            events,
        }
    }

    /// Reloads the open dataset whenever a [`ChangeEvent`] affecting it arrives.
    #[must_use]
    pub fn with_changes(mut self, changes: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        self.changes = Some(changes);
        self
    }

    /// Runs [`run`](Self::run) on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Processes commands until [`ViewportCommand::Shutdown`], the command
    /// channel closes, or the event receiver is dropped.
    pub async fn run(self) {
        let Self {
            manager,
            mut commands,
            mut changes,
            events,
        } = self;
        let debounce = manager.config().debounce;
        let mut session = Session {
            manager,
            events,
            visible_count: 0,
        };

        let mut pending_scroll: Option<usize> = None;
        let settle = tokio::time::sleep(debounce);
        tokio::pin!(settle);

        loop {
            let keep_going = tokio::select! {
                command = commands.recv() => match command {
                    None | Some(ViewportCommand::Shutdown) => false,
                    Some(ViewportCommand::Scrolled { first_visible, visible_count }) => {
                        session.visible_count = visible_count;
                        pending_scroll = Some(first_visible);
                        settle.as_mut().reset(Instant::now() + debounce);
                        true
                    }
                    Some(command) => {
                        pending_scroll = None;
                        session.handle(command).await
                    }
                },
                Some(change) = next_change(&mut changes) => session.on_change(change).await,
                () = &mut settle, if pending_scroll.is_some() => {
                    match pending_scroll.take() {
                        Some(first_visible) => session.on_scroll(first_visible).await,
                        None => true,
                    }
                }
            };
            if !keep_going {
                break;
            }
        }
        info!("viewport driver stopped");
    }
}

/// Next change event, or never if the driver has no change feed.
async fn next_change(
    changes: &mut Option<mpsc::UnboundedReceiver<ChangeEvent>>,
) -> Option<ChangeEvent> {
    match changes {
        Some(rx) => {
            let change = rx.recv().await;
            if change.is_none() {
                *changes = None;
            }
            change
        }
        None => std::future::pending().await,
    }
}

impl<S: DataSource> Session<S> {
    /// Returns `false` once the UI has stopped listening.
    async fn handle(&mut self, command: ViewportCommand) -> bool {
        let result = match command {
            ViewportCommand::Open {
                dataset,
                visible_count,
            } => {
                self.visible_count = visible_count;
                self.manager.load_initial(&dataset, visible_count).await
            }
            ViewportCommand::SetInterval(interval) => {
                self.manager.set_interval(interval, self.visible_count).await
            }
            ViewportCommand::Reload => self.manager.reload(self.visible_count).await,
            ViewportCommand::Scrolled { .. } | ViewportCommand::Shutdown => return true,
        };
        self.publish(result)
    }

    /// Extends toward the edge the visible range is approaching. If that edge
    /// is already the dataset boundary and the other edge is also within
    /// reach, extends toward the other one instead.
    async fn on_scroll(&self, first_visible: usize) -> bool {
        let Some(window_len) = self.manager.window().map(|w| w.len()) else {
            return true;
        };
        let threshold = self.manager.config().edge_threshold;
        let Some(edge) = edge_proximity(first_visible, self.visible_count, window_len, threshold)
        else {
            return true;
        };

        let mut result = self.extend(edge).await;
        let exhausted = matches!(
            result,
            Ok(LoadOutcome::Skipped(SkipReason::AtStart | SkipReason::AtEnd))
        );
        let other = edge.opposite();
        if exhausted
            && edge_distance(other, first_visible, self.visible_count, window_len) < threshold
        {
            debug!(?edge, ?other, "edge is the dataset boundary, extending the other way");
            result = self.extend(other).await;
        }
        self.publish(result)
    }

    async fn extend(&self, edge: Edge) -> Result<LoadOutcome, SourceError> {
        match edge {
            Edge::Start => self.manager.extend_start().await,
            Edge::End => self.manager.extend_end().await,
        }
    }

    async fn on_change(&self, change: ChangeEvent) -> bool {
        let Some(dataset) = self.manager.dataset() else {
            return true;
        };
        if !change.affects(&dataset) {
            return true;
        }
        info!(%dataset, ?change, "dataset changed on disk, reloading");
        let result = self.manager.reload(self.visible_count).await;
        self.publish(result)
    }

    /// Forwards a manager result to the UI. Returns `false` if nobody is listening.
    fn publish(&self, result: Result<LoadOutcome, SourceError>) -> bool {
        let event = match result {
            Ok(LoadOutcome::Applied(report)) => match self.manager.snapshot() {
                Some(snapshot) => ViewportEvent::Updated { snapshot, report },
                None => return true,
            },
            Ok(LoadOutcome::Skipped(reason)) => {
                debug!(?reason, "nothing to publish");
                return true;
            }
            Err(e) => {
                warn!("viewport load failed: {e}");
                ViewportEvent::Failed(e)
            }
        };
        self.events.send(event).is_ok()
    }
}
