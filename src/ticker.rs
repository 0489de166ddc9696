/// Shutdown-coordinated periodic task.
///
/// Runs a [`TickAction`] every `period` until its cancellation token fires,
/// then runs the action's cleanup hook once and returns a [`TickReport`].
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Error type returned by a failed tick.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Work performed by the ticker.
pub trait TickAction: Send + 'static {
    /// Called once per tick with the 1-based tick number.
    fn tick(&mut self, tick: u64) -> impl Future<Output = Result<(), ActionError>> + Send;

    /// Cleanup step, called exactly once after cancellation is observed.
    fn stop(&mut self, report: &TickReport) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    Running,
    Stopped,
}

/// Summary handed back through the join handle when the ticker stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Ticks on which the action ran, including failed ones.
    pub ticks: u64,
    pub failures: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TickerError {
    #[error("ticker period must be greater than zero")]
    ZeroPeriod,
    #[error("ticker period {0:?} is too large to schedule")]
    PeriodTooLarge(Duration),
}

#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    state: TickerState,
    report: TickReport,
}

impl Ticker {
    pub fn new(period: Duration) -> Result<Self, TickerError> {
        if period.is_zero() {
            return Err(TickerError::ZeroPeriod);
        }
        // The interval computes deadline + period after every tick, so leave
        // room for two periods past now.
        let fits = Instant::now()
            .checked_add(period)
            .and_then(|first| first.checked_add(period))
            .is_some();
        if !fits {
            return Err(TickerError::PeriodTooLarge(period));
        }
        Ok(Self {
            period,
            state: TickerState::Running,
            report: TickReport::default(),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    #[cfg(test)]
    pub fn state(&self) -> TickerState {
        self.state
    }

    /// Spawn the ticker onto the current runtime.
    pub fn spawn<A: TickAction>(
        self,
        action: A,
        token: CancellationToken,
    ) -> JoinHandle<TickReport> {
        tokio::spawn(self.run(action, token))
    }

    /// Drive the tick loop until `token` is cancelled.
    ///
    /// The first tick fires one full period after the loop starts. A token
    /// that is already cancelled stops the loop before any tick.
    pub async fn run<A: TickAction>(
        mut self,
        mut action: A,
        token: CancellationToken,
    ) -> TickReport {
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(period_ms = self.period.as_millis() as u64, "ticker started");

        while self.state == TickerState::Running {
            tokio::select! {
                // Cancellation wins a race with a due tick.
                biased;
                _ = token.cancelled() => {
                    self.state = TickerState::Stopped;
                }
                _ = interval.tick() => {
                    self.report.ticks += 1;
                    let tick = self.report.ticks;
                    tracing::debug!(tick, "tick");
                    if let Err(e) = action.tick(tick).await {
                        self.report.failures += 1;
                        tracing::warn!(tick, error = %e, "tick action failed, continuing");
                    }
                }
            }
        }

        tracing::info!(
            ticks = self.report.ticks,
            failures = self.report.failures,
            "ticker stopping"
        );
        action.stop(&self.report).await;
        self.report
    }
}
