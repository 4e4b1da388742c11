//! Execution primitive abstraction.
//!
//! The [`Runner`] trait is the seam between the engine and whatever
//! actually runs a command on a server, allowing for different
//! implementations (the real ssh client, mocks for testing).

pub mod ssh;

use crate::error::Result;
use crate::types::{Execution, Server};
use std::sync::Arc;

/// Execution primitive: runs one command on one server.
///
/// Implementations must report ordinary command failure through
/// [`Execution::success`], never as an `Err`. Connection-class failures
/// are the only ones surfaced as errors, which is what makes them
/// eligible for retry.
pub trait Runner: Send + Sync {
    /// Run `command` on `server` and capture its output.
    fn run(&self, server: &Server, command: &str) -> Result<Execution>;
}

/// A runner shared across worker threads for the lifetime of a dispatch.
pub type SharedRunner = Arc<dyn Runner>;

#[cfg(test)]
pub(crate) mod testing {
    use super::Runner;
    use crate::error::Result;
    use crate::types::{Execution, Server};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    type Behavior = dyn Fn(&Server, &str, u32) -> Result<Execution> + Send + Sync;

    /// Scripted stand-in for the execution primitive.
    ///
    /// The behavior closure receives the server, the command, and the
    /// 1-based attempt number for that server, so tests can script
    /// fail-then-succeed sequences.
    pub(crate) struct MockRunner {
        behavior: Box<Behavior>,
        attempts: Mutex<HashMap<String, u32>>,
        delay: Option<Duration>,
    }

    impl MockRunner {
        pub(crate) fn new(
            behavior: impl Fn(&Server, &str, u32) -> Result<Execution> + Send + Sync + 'static,
        ) -> Self {
            Self {
                behavior: Box::new(behavior),
                attempts: Mutex::new(HashMap::new()),
                delay: None,
            }
        }

        /// A runner where every command succeeds, echoing back the command
        /// with any leading `echo ` stripped.
        pub(crate) fn echoing() -> Self {
            Self::new(|_, command, _| {
                Ok(Execution {
                    success: true,
                    output: command.strip_prefix("echo ").unwrap_or(command).to_string(),
                })
            })
        }

        /// Sleep this long inside every `run` call.
        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// How many times `run` was called for a server id.
        pub(crate) fn attempts_for(&self, id: &str) -> u32 {
            self.attempts.lock().unwrap().get(id).copied().unwrap_or(0)
        }
    }

    impl Runner for MockRunner {
        fn run(&self, server: &Server, command: &str) -> Result<Execution> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let n = attempts.entry(server.id.clone()).or_insert(0);
                *n += 1;
                *n
            };
            (self.behavior)(server, command, attempt)
        }
    }
}
