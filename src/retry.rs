//! Bounded exponential backoff shared by every external call.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries allowed after the first failed attempt.
    pub limit: u32,
    /// Delay after the first failure; doubled after each subsequent one.
    pub initial: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            limit: 4,
            initial: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.limit + 1
    }
}

/// Sleep abstraction so retry loops can be tested without real delays.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Test sleeper that returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

/// Result of one attempt of a retried call.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    Failed(String),
}

/// Outcome of a retried call once it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    /// `Some` when an attempt succeeded.
    pub value: Option<T>,
    pub attempts: u32,
    pub backoff: Duration,
    pub elapsed: Duration,
}

impl<T> Retried<T> {
    pub fn succeeded(&self) -> bool {
        self.value.is_some()
    }
}

/// Runs `attempt` until it succeeds or the policy is exhausted.
///
/// A failed attempt is always followed by a sleep, including the last one,
/// so an always-failing call sleeps `initial * (2^(limit+1) - 1)` in total.
/// Errors returned by `attempt` are not retried and propagate as-is.
pub fn retry<T, E>(
    policy: &BackoffPolicy,
    sleeper: &dyn Sleeper,
    mut attempt: impl FnMut(u32) -> Result<Attempt<T>, E>,
) -> Result<Retried<T>, E> {
    let started = Instant::now();
    let mut delay = policy.initial;
    let mut backoff = Duration::ZERO;
    let mut attempts = 0;

    while attempts < policy.max_attempts() {
        attempts += 1;
        match attempt(attempts)? {
            Attempt::Success(value) => {
                return Ok(Retried {
                    value: Some(value),
                    attempts,
                    backoff,
                    elapsed: started.elapsed(),
                });
            }
            Attempt::Failed(reason) => {
                warn!(attempt = attempts, ?delay, %reason, "command failed, retrying");
                // 控制台提示，避免退避等待期间看起来像卡住。
                println!("\n{}", retry_notice(delay, &reason));
                sleeper.sleep(delay);
                backoff += delay;
                delay *= 2;
            }
        }
    }

    Ok(Retried {
        value: None,
        attempts,
        backoff,
        elapsed: started.elapsed(),
    })
}

/// Console line printed before each backoff sleep.
pub fn retry_notice(delay: Duration, reason: &str) -> String {
    format!("Command failed, trying again in {delay:?}. Error output: {reason}")
}
