//! Combined cancellation for one strategy run: the caller's token plus an
//! optional wall-clock deadline.
//!
//! Every suspension point in a strategy goes through [`ExecutionBudget::run`],
//! which drops the in-flight future as soon as either limit fires and says
//! which one it was.

use std::future::Future;
use std::time::Duration;

use task_coordination::FailureKind;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a budgeted call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("timed out")]
    TimedOut,
    #[error("cancelled by caller")]
    Cancelled,
}

impl From<Interrupted> for FailureKind {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::TimedOut => FailureKind::Timeout,
            Interrupted::Cancelled => FailureKind::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionBudget {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
}

impl ExecutionBudget {
    /// Start the clock now. `timeout: None` means only the caller can stop the run.
    pub fn new(cancel: &CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            cancel: cancel.clone(),
            deadline: timeout.map(|t| Instant::now() + t),
            timeout,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Non-blocking check, caller cancellation first.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::TimedOut),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes or the budget runs out.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            () = expired => Err(Interrupted::TimedOut),
            out = fut => Ok(out),
        }
    }

    /// Human-readable description of an interruption for result errors.
    pub fn describe(&self, interrupted: Interrupted, strategy: &str) -> String {
        match (interrupted, self.timeout) {
            (Interrupted::TimedOut, Some(timeout)) => {
                format!("{strategy} timed out after {}s", timeout.as_secs_f64())
            }
            (Interrupted::TimedOut, None) => format!("{strategy} timed out"),
            (Interrupted::Cancelled, _) => format!("{strategy} cancelled by caller"),
        }
    }
}
