//! Bounded waits for work running in the background

use std::future::Future;
use std::panic::resume_unwind;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Time cancelled work is given to wind down before it is left to finish on its own
pub const WIND_DOWN_GRACE: Duration = Duration::from_millis(250);

/// Creates a connected pair of cancellation trigger and signal
pub fn cancellation() -> (CancellationTrigger, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (CancellationTrigger(tx), CancellationSignal(rx))
}

/// Sending half of a cancellation, see [`cancellation`]
pub struct CancellationTrigger(watch::Sender<bool>);

impl CancellationTrigger {
    /// Requests every associated [`CancellationSignal`] to stop
    pub fn cancel(&self) {
        self.0.send(true).ok();
    }
}

/// Receiving half of a cancellation which is handed to background work
///
/// Dropping the [`CancellationTrigger`] counts as a cancellation.
#[derive(Clone)]
pub struct CancellationSignal(watch::Receiver<bool>);

impl CancellationSignal {
    /// Whether the work has been asked to stop
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the work has been asked to stop
    ///
    /// Safe to use as a branch in `tokio::select!`.
    pub async fn cancelled(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Runs work in the background and waits for it at most for the given duration
///
/// The work is spawned onto the runtime and receives a [`CancellationSignal`]. If it finishes
/// before the deadline its output is returned right away. Otherwise the signal fires at the
/// deadline and the caller waits up to [`WIND_DOWN_GRACE`] for the work to wind down. Work that
/// still produces a value within that time (e.g. because the value arrived in the same instant)
/// has that value returned as well; it is up to the work to express "not satisfied" in its output
/// type. Work that takes longer is detached and keeps running on its own.
///
/// Returns `None` if the work was detached or the runtime cancelled the task. Panics inside the
/// work are propagated.
pub async fn with_timeout<T, F, Fut>(duration: Duration, work: F) -> Option<T>
where
    F: FnOnce(CancellationSignal) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (trigger, signal) = cancellation();
    let mut handle = tokio::spawn(work(signal));

    match tokio::time::timeout(duration, &mut handle).await {
        Ok(result) => unwrap_join(result),
        Err(_) => {
            trace!(?duration, "Deadline reached, cancelling background work");
            trigger.cancel();

            match tokio::time::timeout(WIND_DOWN_GRACE, &mut handle).await {
                Ok(result) => unwrap_join(result),
                Err(_) => {
                    warn!(
                        grace = ?WIND_DOWN_GRACE,
                        "Background work did not wind down in time, detaching it"
                    );
                    None
                }
            }
        }
    }
}

fn unwrap_join<T>(result: Result<T, tokio::task::JoinError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_panic() => resume_unwind(e.into_panic()),
        Err(_) => None,
    }
}

/// Handle to work that runs until it is stopped from the outside
pub struct BackgroundWork {
    trigger: CancellationTrigger,
    handle: JoinHandle<()>,
}

impl BackgroundWork {
    /// Spawns the work onto the runtime
    pub fn spawn<F, Fut>(work: F) -> Self
    where
        F: FnOnce(CancellationSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (trigger, signal) = cancellation();
        let handle = tokio::spawn(work(signal));

        Self { trigger, handle }
    }

    /// Whether the work has ended on its own or after being stopped
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Asks the work to stop and waits for it to wind down
    pub async fn stop(self) {
        self.trigger.cancel();
        unwrap_join(self.handle.await);
    }
}
