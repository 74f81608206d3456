//! Live polling session.
//!
//! A [`LiveSession`] is `Idle` until [`LiveSession::start`] succeeds, then
//! `Polling`: the first tick fires immediately and later ones follow a fixed
//! cadence that does not depend on the sampling period requested from the
//! backend. Ticks are driven by the caller:
//!
//! ```ignore
//! loop {
//!     session.wait_tick().await;
//!     session.tick().await;
//! }
//! ```
//!
//! Waiting can be raced against other events (commands, shutdown) while the
//! fetch itself runs to completion once started, so a fetch in flight when
//! [`LiveSession::stop`] is called still lands but schedules nothing.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

use crate::backend::BackendClient;
use crate::data::sample::SampleSet;
use crate::error::{Error, Result};
use crate::map::{MapWidget, MarkerUpdate};
use crate::view::PolarView;

/// Default polling cadence.
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(1000);

/// Source of live sample sets.
#[allow(async_fn_in_trait)]
pub trait LiveFeed {
    /// Latest complete sample set.
    async fn fetch(&self) -> Result<SampleSet>;
    /// Ask the producer to start sampling every `period_s` seconds.
    async fn start(&self, period_s: f64) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    /// Persist the running measurement; returns the saved record's name.
    async fn save(&self) -> Result<String> {
        Err(Error::UserIntent("this feed cannot save measurements".into()))
    }
}

impl LiveFeed for BackendClient {
    async fn fetch(&self) -> Result<SampleSet> {
        self.live().await
    }

    async fn start(&self, period_s: f64) -> Result<()> {
        BackendClient::start(self, period_s).await
    }

    async fn stop(&self) -> Result<()> {
        BackendClient::stop(self).await
    }

    async fn save(&self) -> Result<String> {
        BackendClient::save(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Polling,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// New set applied and drawn.
    Updated { count: usize, marker: MarkerUpdate },
    /// Fetch failed; the previous set and frame are kept.
    Failed(String),
}

pub struct LiveSession<F: LiveFeed, W: MapWidget> {
    feed: F,
    view: PolarView<W>,
    cadence: Duration,
    ticker: Option<Interval>,
}

impl<F: LiveFeed, W: MapWidget> LiveSession<F, W> {
    pub fn new(feed: F, view: PolarView<W>) -> Self {
        Self::with_cadence(feed, view, DEFAULT_CADENCE)
    }

    pub fn with_cadence(feed: F, view: PolarView<W>, cadence: Duration) -> Self {
        Self {
            feed,
            view,
            cadence,
            ticker: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.ticker.is_some() {
            SessionState::Polling
        } else {
            SessionState::Idle
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn view(&self) -> &PolarView<W> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut PolarView<W> {
        &mut self.view
    }

    /// Start the remote measurement and begin polling.
    ///
    /// Starting a session that is already polling does nothing. If the
    /// backend refuses, the session stays idle.
    pub async fn start(&mut self, period_s: f64) -> Result<()> {
        if self.ticker.is_some() {
            return Ok(());
        }
        if let Err(e) = self.feed.start(period_s).await {
            tracing::warn!("start refused: {e}");
            self.view.set_status(format!("Start failed: {e}"));
            return Err(e);
        }
        tracing::info!(period_s, cadence_ms = self.cadence.as_millis() as u64, "live session started");
        self.begin_polling();
        Ok(())
    }

    /// Begin polling without asking the backend to start, e.g. to follow a
    /// measurement that is already running.
    pub fn begin_polling(&mut self) {
        if self.ticker.is_none() {
            let mut ticker = tokio::time::interval(self.cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);
        }
    }

    /// Cancel scheduled ticks. Returns `false` if the session was idle.
    pub fn stop(&mut self) -> bool {
        let was_polling = self.ticker.take().is_some();
        if was_polling {
            tracing::info!("live session stopped");
        }
        was_polling
    }

    /// [`Self::stop`], then tell the backend to stop sampling. An idle
    /// session sends nothing.
    pub async fn stop_remote(&mut self) -> Result<()> {
        if !self.stop() {
            return Ok(());
        }
        self.feed.stop().await.inspect_err(|e| {
            tracing::warn!("stop request failed: {e}");
            self.view.set_status(format!("Stop failed: {e}"));
        })
    }

    /// Resolve when the next tick is due. Never resolves while idle.
    pub async fn wait_tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Fetch once and apply the result.
    ///
    /// On failure the current set, hit index and frame stay untouched and
    /// only the status message changes; the cadence is unaffected.
    pub async fn tick(&mut self) -> TickOutcome {
        match self.feed.fetch().await {
            Ok(set) => {
                let count = set.len();
                let marker = self.view.replace_samples(set);
                self.view.clear_status();
                tracing::debug!(count, ?marker, "live frame");
                TickOutcome::Updated { count, marker }
            }
            Err(e) => {
                tracing::warn!("live poll failed: {e}");
                let msg = format!("Live data unavailable: {e}");
                self.view.set_status(msg.clone());
                TickOutcome::Failed(msg)
            }
        }
    }

    /// Wait for and run the next tick; `None` when idle.
    pub async fn next_tick(&mut self) -> Option<TickOutcome> {
        self.ticker.as_ref()?;
        self.wait_tick().await;
        Some(self.tick().await)
    }

    pub fn into_view(self) -> PolarView<W> {
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::LayoutMode;
    use crate::data::sample::{Anchor, Sample};
    use crate::map::{MapAdapter, NoMap};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Default)]
    struct ScriptedFeed {
        replies: RefCell<VecDeque<Result<SampleSet>>>,
        fetches: Cell<usize>,
        starts: RefCell<Vec<f64>>,
        stops: Cell<usize>,
        refuse_start: bool,
    }

    impl ScriptedFeed {
        fn with(replies: Vec<Result<SampleSet>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                ..Self::default()
            }
        }
    }

    impl LiveFeed for ScriptedFeed {
        async fn fetch(&self) -> Result<SampleSet> {
            self.fetches.set(self.fetches.get() + 1);
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(SampleSet::empty()))
        }
        async fn start(&self, period_s: f64) -> Result<()> {
            if self.refuse_start {
                return Err(Error::Backend("already running".into()));
            }
            self.starts.borrow_mut().push(period_s);
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            self.stops.set(self.stops.get() + 1);
            Ok(())
        }
    }

    fn set(n: usize) -> SampleSet {
        let samples = (0..n).map(|i| Sample::new(i as f64 * 30.0, -60.0 + i as f64)).collect();
        SampleSet::new(samples, Some(Anchor { lat: 40.0, lon: -3.0 }))
    }

    fn session(feed: ScriptedFeed) -> LiveSession<ScriptedFeed, NoMap> {
        LiveSession::new(feed, PolarView::new(MapAdapter::new(|| NoMap), LayoutMode::Stacked))
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_then_cadence() {
        let mut s = session(ScriptedFeed::with(vec![Ok(set(2)), Ok(set(3))]));
        s.start(5.0).await.unwrap();
        assert_eq!(s.state(), SessionState::Polling);
        assert_eq!(*s.feed().starts.borrow(), vec![5.0]);

        let t0 = tokio::time::Instant::now();
        let first = s.next_tick().await.unwrap();
        assert_eq!(t0.elapsed(), Duration::ZERO);
        assert_eq!(first, TickOutcome::Updated { count: 2, marker: MarkerUpdate::Created });

        let second = s.next_tick().await.unwrap();
        // cadence is fixed, not the 5 s sampling period
        assert_eq!(t0.elapsed(), DEFAULT_CADENCE);
        assert_eq!(second, TickOutcome::Updated { count: 3, marker: MarkerUpdate::Unchanged });
        assert_eq!(s.view().frame().drawn, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_keeps_previous_state_and_polling() {
        let mut s = session(ScriptedFeed::with(vec![
            Ok(set(4)),
            Err(Error::Backend("timeout".into())),
            Ok(set(1)),
        ]));
        s.start(1.0).await.unwrap();
        s.next_tick().await;
        let samples = s.view().samples();
        let frame = s.view().frame();

        let outcome = s.next_tick().await.unwrap();
        assert!(matches!(outcome, TickOutcome::Failed(ref m) if m.contains("timeout")));
        assert!(Arc::ptr_eq(&samples, &s.view().samples()));
        assert!(Arc::ptr_eq(&frame, &s.view().frame()));
        assert_eq!(s.view().frame().hits.len(), 4);
        assert!(s.view().status().is_some());
        assert_eq!(s.state(), SessionState::Polling);

        assert!(matches!(s.next_tick().await, Some(TickOutcome::Updated { count: 1, .. })));
        assert!(s.view().status().is_none());
    }

    #[tokio::test]
    async fn stop_is_a_no_op_when_idle() {
        let mut s = session(ScriptedFeed::default());
        assert!(!s.stop());
        s.stop_remote().await.unwrap();
        assert_eq!(s.feed().stops.get(), 0);
        assert!(s.next_tick().await.is_none());
        assert_eq!(s.feed().fetches.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_ticks_but_straggler_is_applied() {
        let mut s = session(ScriptedFeed::with(vec![Ok(set(2)), Ok(set(5))]));
        s.start(1.0).await.unwrap();
        s.next_tick().await;
        s.stop_remote().await.unwrap();
        assert_eq!(s.feed().stops.get(), 1);
        assert!(!s.stop());

        // a fetch that was already in flight resolves after the stop
        assert!(matches!(s.tick().await, TickOutcome::Updated { count: 5, .. }));
        assert_eq!(s.view().frame().drawn, 5);
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.next_tick().await.is_none());
    }

    #[tokio::test]
    async fn refused_start_stays_idle() {
        let feed = ScriptedFeed {
            refuse_start: true,
            ..ScriptedFeed::default()
        };
        let mut s = session(feed);
        assert!(s.start(1.0).await.is_err());
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.view().status().unwrap().contains("already running"));
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_keeps_one_ticker() {
        let mut s = session(ScriptedFeed::default());
        s.start(1.0).await.unwrap();
        s.start(2.0).await.unwrap();
        assert_eq!(s.feed().starts.borrow().len(), 1);
    }
}
