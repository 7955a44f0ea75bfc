use crate::config::PollingConfig;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::time::{Sleep, sleep};
use tokio_stream::Stream;
use tracing::{debug, warn};

pub const TIMEOUT_MESSAGE: &str = "Payment verification timed out";

/// Progress of a single polling run.
#[derive(Debug, Clone, PartialEq)]
pub enum PollingResult<T> {
    Checking { attempt: u32, max_attempts: u32 },
    Success(T),
    Failed(String),
}

impl<T> PollingResult<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Checking { .. })
    }
}

/// Stateless polling engine: a fixed attempt budget and a fixed delay between attempts.
///
/// The poller never looks inside a successful check result. Deciding whether a
/// value is final belongs to the check, which returns `Err` to ask for another
/// attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationPoller {
    config: PollingConfig,
}

impl VerificationPoller {
    pub fn new(config: PollingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> PollingConfig {
        self.config
    }

    /// Starts a lazy polling run over `check`.
    ///
    /// Nothing runs until the returned stream is polled. Dropping the stream cancels
    /// any pending delay and schedules no further attempts.
    pub fn poll<F, Fut, T, E>(&self, check: F) -> Polling<F, Fut>
    where
        F: FnMut() -> Fut + Unpin,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        Polling {
            check,
            config: self.config,
            attempt: 0,
            phase: Phase::Idle,
        }
    }
}

enum Phase<Fut> {
    Idle,
    Checking(Pin<Box<Fut>>),
    Waiting(Pin<Box<Sleep>>),
    Done,
}

/// Event stream of one polling run: `Checking` events followed by exactly one
/// `Success` or `Failed`, then the end of the stream.
pub struct Polling<F, Fut> {
    check: F,
    config: PollingConfig,
    attempt: u32,
    phase: Phase<Fut>,
}

impl<F, Fut> Polling<F, Fut> {
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    fn exhausted<T>(&mut self) -> PollingResult<T> {
        self.phase = Phase::Done;
        PollingResult::Failed(TIMEOUT_MESSAGE.to_string())
    }
}

impl<F, Fut, T, E> Stream for Polling<F, Fut>
where
    F: FnMut() -> Fut + Unpin,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    type Item = PollingResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.phase {
                Phase::Idle => {
                    if this.attempt >= this.config.max_attempts {
                        return Poll::Ready(Some(this.exhausted()));
                    }
                    this.attempt += 1;
                    this.phase = Phase::Checking(Box::pin((this.check)()));
                    return Poll::Ready(Some(PollingResult::Checking {
                        attempt: this.attempt,
                        max_attempts: this.config.max_attempts,
                    }));
                }
                Phase::Checking(check) => match ready!(check.as_mut().poll(cx)) {
                    Ok(value) => {
                        debug!(attempt = this.attempt, "status check succeeded");
                        this.phase = Phase::Done;
                        return Poll::Ready(Some(PollingResult::Success(value)));
                    }
                    Err(error) => {
                        warn!(
                            attempt = this.attempt,
                            max_attempts = this.config.max_attempts,
                            %error,
                            "status check failed"
                        );
                        if this.attempt >= this.config.max_attempts {
                            return Poll::Ready(Some(this.exhausted()));
                        }
                        this.phase = Phase::Waiting(Box::pin(sleep(this.config.delay)));
                    }
                },
                Phase::Waiting(delay) => {
                    ready!(delay.as_mut().poll(cx));
                    this.phase = Phase::Idle;
                }
                Phase::Done => return Poll::Ready(None),
            }
        }
    }
}
