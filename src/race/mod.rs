//! Corrida até o primeiro sucesso entre vários serviços independentes.
//!
//! O [`Racer`] dispara uma tentativa por descritor, cada uma em sua própria
//! task do tokio, todas ligadas ao mesmo [`CancellationToken`]. O primeiro
//! sucesso registrado no [`RaceState`] compartilhado vence e cancela as
//! demais; se todas falharem, a última causa observada é devolvida.

mod state;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::RaceError;
use crate::geo::Fetcher;

pub use state::{Disposition, Won};
use state::{RaceState, Wake};

/// Instrumentation hook notified of every attempt's fate.
pub trait RaceObserver: Send + Sync {
    fn attempt_finished(&self, index: usize, disposition: Disposition);
}

/// Runs one race per call. Cheap to clone and reusable across races.
#[derive(Clone, Default)]
pub struct Racer {
    deadline: Option<Duration>,
    cancel: Option<CancellationToken>,
    observer: Option<Arc<dyn RaceObserver>>,
}

impl Racer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the total latency of a race. `None` waits until some attempt
    /// succeeds or every attempt has failed.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Let the caller abort a race from outside (e.g. on Ctrl-C).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RaceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Race `fetcher` over every descriptor and return the first success.
    ///
    /// Attempts are launched in input order. Cancellation is cooperative: the
    /// racer never aborts a task, it fires the shared token and stops
    /// listening. Outcomes arriving after that are discarded.
    pub async fn run<F, I>(
        &self,
        fetcher: Arc<F>,
        descriptors: I,
    ) -> Result<Won<F::Payload>, RaceError<F::Error>>
    where
        F: Fetcher,
        I: IntoIterator<Item = F::Descriptor>,
    {
        let descriptors: Vec<F::Descriptor> = descriptors.into_iter().collect();
        if descriptors.is_empty() {
            return Err(RaceError::NoCandidates);
        }

        let token = match &self.cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        // Dropping the race before it concludes still stops every attempt.
        let _cancel_on_drop = token.clone().drop_guard();
        let state = Arc::new(Mutex::new(RaceState::new(descriptors.len())));

        tracing::debug!(
            attempts = descriptors.len(),
            deadline = ?self.deadline,
            "race started"
        );

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            tokio::spawn(attempt(
                index,
                descriptor,
                Arc::clone(&fetcher),
                token.clone(),
                Arc::clone(&state),
                self.observer.clone(),
            ));
        }

        let wake = match self.deadline {
            Some(limit) => tokio::select! {
                biased;
                () = token.cancelled() => Wake::Signal,
                () = tokio::time::sleep(limit) => Wake::Deadline,
            },
            None => {
                token.cancelled().await;
                Wake::Signal
            }
        };
        if wake == Wake::Deadline {
            // An attempt woken on the same tick as the deadline gets to record
            // its outcome before the race closes.
            tokio::task::yield_now().await;
        }
        let wake = match &self.cancel {
            Some(parent) if parent.is_cancelled() => Wake::Cancelled,
            _ => wake,
        };

        let result = state.lock().conclude(wake);
        token.cancel();

        match &result {
            Ok(won) => tracing::debug!(winner = won.index, "race won"),
            Err(err) => tracing::debug!(error = %err, "race lost"),
        }
        result
    }
}

async fn attempt<F: Fetcher>(
    index: usize,
    descriptor: F::Descriptor,
    fetcher: Arc<F>,
    token: CancellationToken,
    state: Arc<Mutex<RaceState<F::Payload, F::Error>>>,
    observer: Option<Arc<dyn RaceObserver>>,
) {
    let outcome = fetcher.fetch(descriptor, token.clone()).await;
    if let Err(cause) = &outcome {
        tracing::debug!(attempt = index, error = %cause, "attempt failed");
    }

    let disposition = {
        let mut state = state.lock();
        let disposition = state.record(index, outcome);
        if disposition == Disposition::Won || state.exhausted() {
            token.cancel();
        }
        disposition
    };

    if disposition == Disposition::Discarded {
        tracing::trace!(attempt = index, "outcome arrived after the race closed");
    }
    if let Some(observer) = &observer {
        observer.attempt_finished(index, disposition);
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll, Waker};

    use thiserror::Error;
    use tokio::time::{Instant, sleep};

    use super::*;

    /// What a scripted attempt does. The descriptor *is* the script.
    #[derive(Debug, Clone)]
    enum Step {
        Succeed(u64, &'static str),
        Fail(u64, &'static str),
        /// Never answers on its own; only stops when cancelled.
        Hang,
        /// Ignores cancellation and succeeds anyway.
        Stubborn(u64, &'static str),
    }

    #[derive(Debug, Error, PartialEq)]
    #[error("{0}")]
    struct ScriptError(&'static str);

    #[derive(Default)]
    struct Script {
        saw_cancel: AtomicUsize,
    }

    impl Script {
        async fn wait(&self, ms: u64, cancel: &CancellationToken) -> Result<(), ScriptError> {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.saw_cancel.fetch_add(1, Ordering::SeqCst);
                    Err(ScriptError("cancelled"))
                }
                () = sleep(Duration::from_millis(ms)) => Ok(()),
            }
        }
    }

    impl Fetcher for Script {
        type Descriptor = Step;
        type Payload = &'static str;
        type Error = ScriptError;

        fn fetch(
            &self,
            step: Step,
            cancel: CancellationToken,
        ) -> impl Future<Output = Result<&'static str, ScriptError>> + Send {
            async move {
                match step {
                    Step::Succeed(ms, tz) => self.wait(ms, &cancel).await.map(|()| tz),
                    Step::Fail(ms, cause) => {
                        self.wait(ms, &cancel).await?;
                        Err(ScriptError(cause))
                    }
                    Step::Hang => self.wait(3_600_000, &cancel).await.map(|()| "never"),
                    Step::Stubborn(ms, tz) => {
                        sleep(Duration::from_millis(ms)).await;
                        Ok(tz)
                    }
                }
            }
        }
    }

    #[derive(Default)]
    struct Tally {
        won: AtomicUsize,
        failed: AtomicUsize,
        discarded: AtomicUsize,
    }

    impl Tally {
        fn total(&self) -> usize {
            self.won.load(Ordering::SeqCst)
                + self.failed.load(Ordering::SeqCst)
                + self.discarded.load(Ordering::SeqCst)
        }
    }

    impl RaceObserver for Tally {
        fn attempt_finished(&self, _index: usize, disposition: Disposition) {
            let counter = match disposition {
                Disposition::Won => &self.won,
                Disposition::Failed => &self.failed,
                Disposition::Discarded => &self.discarded,
            };
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Let detached attempts run until `done` holds.
    async fn settle(done: impl Fn() -> bool) {
        for _ in 0..1_000 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("attempts did not settle");
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_wins_and_cancels_the_rest() {
        let script = Arc::new(Script::default());
        let tally = Arc::new(Tally::default());
        let racer = Racer::new().with_observer(tally.clone());

        let won = racer
            .run(
                script.clone(),
                [
                    Step::Fail(10, "a down"),
                    Step::Succeed(20, "Europe/Rome"),
                    Step::Hang,
                    Step::Hang,
                ],
            )
            .await
            .unwrap();

        assert_eq!(won, Won { index: 1, payload: "Europe/Rome" });

        settle(|| tally.total() == 4).await;
        assert_eq!(script.saw_cancel.load(Ordering::SeqCst), 2);
        assert_eq!(tally.won.load(Ordering::SeqCst), 1);
        assert_eq!(tally.failed.load(Ordering::SeqCst), 1);
        assert_eq!(tally.discarded.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_of_many_successes_is_recorded() {
        let tally = Arc::new(Tally::default());
        let racer = Racer::new().with_observer(tally.clone());

        let won = racer
            .run(
                Arc::new(Script::default()),
                [
                    Step::Succeed(10, "Europe/Rome"),
                    Step::Succeed(10, "Europe/Paris"),
                    Step::Succeed(10, "Europe/Berlin"),
                    Step::Fail(5, "down"),
                ],
            )
            .await
            .unwrap();

        assert!(["Europe/Rome", "Europe/Paris", "Europe/Berlin"].contains(&won.payload));

        settle(|| tally.total() == 4).await;
        assert_eq!(tally.won.load(Ordering::SeqCst), 1);
        assert_eq!(tally.discarded.load(Ordering::SeqCst), 2);
        assert_eq!(tally.failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn all_failed_reports_the_last_completing_cause() {
        // Completion order is D, A, C, B; causes are numbered in that order.
        let started = Instant::now();
        let err = Racer::new()
            .run(
                Arc::new(Script::default()),
                [
                    Step::Fail(20, "e2"),
                    Step::Fail(40, "e4"),
                    Step::Fail(30, "e3"),
                    Step::Fail(10, "e1"),
                ],
            )
            .await
            .unwrap_err();

        match err {
            RaceError::AllFailed(cause) => assert_eq!(cause, ScriptError("e4")),
            other => panic!("expected AllFailed, got {other:?}"),
        }
        // Returns as soon as the slowest attempt fails, without a deadline.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(40));
        assert!(elapsed < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_before_any_answer() {
        let tally = Arc::new(Tally::default());
        let racer = Racer::new()
            .with_deadline(Some(Duration::from_millis(50)))
            .with_observer(tally.clone());

        let started = Instant::now();
        let err = racer
            .run(
                Arc::new(Script::default()),
                [Step::Stubborn(100, "Europe/Rome"), Step::Hang],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RaceError::TimedOut));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(60));

        // The stubborn attempt still succeeds later; it must not count.
        sleep(Duration::from_millis(100)).await;
        settle(|| tally.total() == 2).await;
        assert_eq!(tally.discarded.load(Ordering::SeqCst), 2);
        assert_eq!(tally.won.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_the_deadline_tick_wins() {
        for _ in 0..20 {
            let won = Racer::new()
                .with_deadline(Some(Duration::from_millis(50)))
                .run(
                    Arc::new(Script::default()),
                    [Step::Succeed(50, "America/Sao_Paulo")],
                )
                .await
                .unwrap();
            assert_eq!(won, Won { index: 0, payload: "America/Sao_Paulo" });
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_race_cancels_its_attempts() {
        let script = Arc::new(Script::default());
        let racer = Racer::new();
        let race = racer.run(script.clone(), [Step::Hang, Step::Hang]);

        let outcome = tokio::time::timeout(Duration::from_millis(10), race).await;
        assert!(outcome.is_err());

        settle(|| script.saw_cancel.load(Ordering::SeqCst) == 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn success_before_deadline_wins() {
        let won = Racer::new()
            .with_deadline(Some(Duration::from_secs(1)))
            .run(
                Arc::new(Script::default()),
                [Step::Hang, Step::Succeed(10, "Asia/Tokyo")],
            )
            .await
            .unwrap();
        assert_eq!(won.payload, "Asia/Tokyo");
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancellation_stops_the_race() {
        let cancel = CancellationToken::new();
        let script = Arc::new(Script::default());
        let racer = Racer::new().with_cancellation(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = racer
            .run(script.clone(), [Step::Hang, Step::Hang])
            .await
            .unwrap_err();
        assert!(matches!(err, RaceError::Cancelled));

        settle(|| script.saw_cancel.load(Ordering::SeqCst) == 2).await;
    }

    #[test]
    fn empty_input_resolves_on_first_poll() {
        let racer = Racer::new();
        let mut race = pin!(racer.run(Arc::new(Script::default()), Vec::<Step>::new()));
        let mut cx = Context::from_waker(Waker::noop());

        match race.as_mut().poll(&mut cx) {
            Poll::Ready(Err(RaceError::NoCandidates)) => {}
            other => panic!("expected immediate NoCandidates, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn racer_is_reusable() {
        let racer = Racer::new();
        let script = Arc::new(Script::default());

        let first = racer
            .run(script.clone(), [Step::Succeed(1, "Europe/Rome")])
            .await
            .unwrap();
        let second = racer
            .run(script, [Step::Fail(1, "down"), Step::Succeed(2, "Europe/Lisbon")])
            .await
            .unwrap();

        assert_eq!(first.payload, "Europe/Rome");
        assert_eq!(second.payload, "Europe/Lisbon");
    }
}
