/// Process orchestration: start the ticker, wait for a termination request,
/// cancel, then give the ticker a fixed grace period.
///
/// The ticker is not joined. If its cleanup outlasts the grace period the
/// process may exit before the stop notice is emitted.
use crate::ticker::{TickAction, TickReport, Ticker};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome<R> {
    /// Value produced by the shutdown future (e.g. which signal arrived).
    pub reason: R,
    /// Whether the ticker had finished its cleanup when the grace period ended.
    pub ticker_finished: bool,
    /// The ticker's report, when it finished in time.
    pub report: Option<TickReport>,
}

/// Lifecycle notices go to `out` (stdout in the binary).
pub async fn run<A, F, W>(
    ticker: Ticker,
    action: A,
    grace: Duration,
    shutdown: F,
    mut out: W,
) -> RunOutcome<F::Output>
where
    A: TickAction,
    F: Future,
    W: Write,
{
    let token = CancellationToken::new();
    let handle = ticker.spawn(action, token.clone());

    notice(&mut out, "Main program started");
    tracing::info!("main program started");

    let reason = shutdown.await;

    notice(&mut out, "Shutting down...");
    tracing::info!(grace_ms = grace.as_millis() as u64, "shutting down");
    token.cancel();

    tokio::time::sleep(grace).await;

    let ticker_finished = handle.is_finished();
    let report = if ticker_finished {
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "ticker task did not complete cleanly");
                None
            }
        }
    } else {
        tracing::warn!("ticker still running after grace period, abandoning it");
        None
    };

    notice(&mut out, "Program exited");

    RunOutcome {
        reason,
        ticker_finished,
        report,
    }
}

fn notice(out: &mut impl Write, line: &str) {
    if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
        tracing::warn!(error = %e, line, "failed to print notice");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PrintAction;
    use crate::test_support::SharedBuf;
    use crate::ticker::ActionError;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time;

    #[derive(Clone, Default)]
    struct Probe {
        ticks: Arc<Mutex<u64>>,
        stopped: Arc<Mutex<bool>>,
        cleanup: Duration,
    }

    impl TickAction for Probe {
        async fn tick(&mut self, _tick: u64) -> Result<(), ActionError> {
            *self.ticks.lock() += 1;
            Ok(())
        }

        async fn stop(&mut self, _report: &TickReport) {
            if !self.cleanup.is_zero() {
                time::sleep(self.cleanup).await;
            }
            *self.stopped.lock() = true;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_ticker_within_grace() {
        let probe = Probe::default();
        let ticker = Ticker::new(Duration::from_secs(10)).unwrap();

        let outcome = run(
            ticker,
            probe.clone(),
            Duration::from_secs(1),
            time::sleep(Duration::from_secs(25)),
            std::io::sink(),
        )
        .await;

        assert!(outcome.ticker_finished);
        assert_eq!(outcome.report.map(|r| r.ticks), Some(2));
        assert_eq!(*probe.ticks.lock(), 2);
        assert!(*probe.stopped.lock());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reason_is_passed_through() {
        let ticker = Ticker::new(Duration::from_secs(10)).unwrap();
        let outcome = run(
            ticker,
            Probe::default(),
            Duration::from_secs(1),
            async {
                time::sleep(Duration::from_secs(3)).await;
                "operator interrupt"
            },
            std::io::sink(),
        )
        .await;

        assert_eq!(outcome.reason, "operator interrupt");
        assert_eq!(outcome.report.map(|r| r.ticks), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_elapses_before_returning() {
        let ticker = Ticker::new(Duration::from_secs(10)).unwrap();
        let start = time::Instant::now();

        run(
            ticker,
            Probe::default(),
            Duration::from_secs(1),
            time::sleep(Duration::from_secs(5)),
            std::io::sink(),
        )
        .await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_longer_than_grace_is_abandoned() {
        let probe = Probe {
            cleanup: Duration::from_secs(3),
            ..Default::default()
        };
        let ticker = Ticker::new(Duration::from_secs(10)).unwrap();

        let outcome = run(
            ticker,
            probe.clone(),
            Duration::from_secs(1),
            time::sleep(Duration::from_secs(5)),
            std::io::sink(),
        )
        .await;

        assert!(!outcome.ticker_finished);
        assert!(outcome.report.is_none());
        assert!(!*probe.stopped.lock());
    }

    /// Wraps an action and stretches its cleanup step.
    struct SlowStop<A> {
        inner: A,
        delay: Duration,
    }

    impl<A: TickAction> TickAction for SlowStop<A> {
        async fn tick(&mut self, tick: u64) -> Result<(), ActionError> {
            self.inner.tick(tick).await
        }

        async fn stop(&mut self, report: &TickReport) {
            time::sleep(self.delay).await;
            self.inner.stop(report).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_lines_in_order() {
        let buf = SharedBuf::default();
        let action = PrintAction::new("Hello", "Stopping periodic printer...")
            .with_output(Box::new(buf.clone()));
        let ticker = Ticker::new(Duration::from_secs(10)).unwrap();

        let outcome = run(
            ticker,
            action,
            Duration::from_secs(1),
            time::sleep(Duration::from_secs(25)),
            buf.clone(),
        )
        .await;

        assert!(outcome.ticker_finished);
        assert_eq!(
            buf.lines(),
            vec![
                "Main program started",
                "Hello",
                "Hello",
                "Shutting down...",
                "Stopping periodic printer...",
                "Program exited",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_notice_missing_when_cleanup_outlasts_grace() {
        let buf = SharedBuf::default();
        let action = SlowStop {
            inner: PrintAction::new("Hello", "Stopping periodic printer...")
                .with_output(Box::new(buf.clone())),
            delay: Duration::from_secs(3),
        };
        let ticker = Ticker::new(Duration::from_secs(10)).unwrap();

        let outcome = run(
            ticker,
            action,
            Duration::from_secs(1),
            time::sleep(Duration::from_secs(15)),
            buf.clone(),
        )
        .await;

        assert!(!outcome.ticker_finished);
        assert_eq!(
            buf.lines(),
            vec![
                "Main program started",
                "Hello",
                "Shutting down...",
                "Program exited",
            ]
        );
    }
}
