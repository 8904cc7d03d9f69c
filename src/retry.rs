use std::{
    io,
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::errors::{CaptureError, Result};

///
/// Bounded retry with a fixed delay between attempts.
///
/// When `attempt_timeout` is set every attempt runs on its own thread and is
/// abandoned once the timeout expires. Whatever an abandoned attempt
/// eventually returns is dropped.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub delay: Duration,
    #[serde(with = "opt_millis")]
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            attempt_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl RetryPolicy {
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            attempt_timeout: None,
        }
    }

    ///
    /// Runs `attempt` until it succeeds or `max_attempts` is reached.
    /// The closure receives the 1-based attempt number. The last error is
    /// returned when every attempt fails.
    ///
    pub fn run<T, F>(&self, what: &str, attempt: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(u32) -> Result<T> + Send + Sync + 'static,
    {
        let attempt = Arc::new(attempt);
        let max_attempts = self.max_attempts.max(1);
        let mut last_err = None;

        for n in 1..=max_attempts {
            if n > 1 {
                thread::sleep(self.delay);
            }
            match self.run_attempt(&attempt, n) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if n < max_attempts {
                        log::info!("{} failed (attempt {}/{}): {}", what, n, max_attempts, err);
                    } else {
                        log::error!("{} failed after {} attempt(s): {}", what, n, err);
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| CaptureError::InvalidState(format!("{} never ran", what))))
    }

    fn run_attempt<T, F>(&self, attempt: &Arc<F>, n: u32) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(u32) -> Result<T> + Send + Sync + 'static,
    {
        let Some(timeout) = self.attempt_timeout else {
            return attempt(n);
        };

        let (tx, rx) = mpsc::channel();
        let attempt = attempt.clone();
        thread::spawn(move || {
            // the receiver is gone when the attempt timed out
            let _ = tx.send(attempt(n));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(CaptureError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("attempt timed out after {:?}", timeout),
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(CaptureError::InvalidState(
                "attempt panicked".to_string(),
            )),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
