use super::{DeployError, Deployer, StatusRule};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Fixed-interval polling, unbounded unless `max_attempts` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl Deployer<'_> {
    /// Query until the stack leaves `rule.in_progress`. Returns the success
    /// status; any other status is a [`DeployError::PollingMismatch`].
    pub fn poll_until_status(
        &self,
        remote_name: &str,
        rule: StatusRule,
    ) -> Result<String, DeployError> {
        let mut attempts: u32 = 0;
        loop {
            let status = self.current_status(remote_name)?;
            attempts += 1;
            tracing::debug!(stack = remote_name, %status, attempts, "polled stack status");

            if status == rule.in_progress {
                println!("Progress: {status}");
                if self
                    .policy
                    .max_attempts
                    .is_some_and(|max_attempts| attempts >= max_attempts)
                {
                    return Err(DeployError::PollTimeout {
                        stack: remote_name.to_string(),
                        expected: rule.success.to_string(),
                        last: status,
                        attempts,
                    });
                }
                self.sleeper.sleep(self.policy.interval);
                continue;
            }

            if status == rule.success {
                println!("Complete: {status}");
                tracing::info!(
                    stack = remote_name,
                    operation = rule.operation,
                    attempts,
                    "stack reached expected status"
                );
                return Ok(status);
            }

            return Err(DeployError::PollingMismatch {
                stack: remote_name.to_string(),
                expected: rule.success.to_string(),
                actual: status,
            });
        }
    }
}
