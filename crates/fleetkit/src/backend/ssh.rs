//! Execution primitive backed by the system ssh client.

use crate::backend::Runner;
use crate::error::{Error, Result};
use crate::types::{Execution, Server};
use std::path::PathBuf;
use std::process::Command;

/// The ssh client reserves exit status 255 for its own failures
/// (unreachable host, auth failure, dropped connection).
const SSH_TRANSPORT_EXIT: i32 = 255;

/// Options controlling how the ssh argv is built.
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Remote user to log in as
    pub user: String,
    /// Private key to authenticate with; `None` lets ssh pick
    pub identity_file: Option<PathBuf>,
    /// Refuse interactive prompts (passwords, host key questions)
    pub batch_mode: bool,
    /// Connection establishment budget in seconds
    pub connect_timeout_secs: Option<u64>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            user: "ops".to_string(),
            identity_file: None,
            batch_mode: true,
            connect_timeout_secs: Some(10),
        }
    }
}

/// Runner that executes commands through the local `ssh` binary.
pub struct SshRunner {
    options: SshOptions,
}

impl SshRunner {
    /// Create a runner with the given options.
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    /// The fixed argv prefix shared by every invocation.
    fn base_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.options.batch_mode {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }
        if let Some(secs) = self.options.connect_timeout_secs {
            args.push("-o".to_string());
            args.push(format!("ConnectTimeout={secs}"));
        }
        args.push("-o".to_string());
        args.push("StrictHostKeyChecking=accept-new".to_string());
        if let Some(identity) = &self.options.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }
}

impl Runner for SshRunner {
    fn run(&self, server: &Server, command: &str) -> Result<Execution> {
        let host = format!("{}@{}", self.options.user, server.address);
        log::debug!("executing on {} ({}): {}", server.name, host, command);

        let output = Command::new("ssh")
            .args(self.base_args())
            .arg(&host)
            .arg(command)
            .output()?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !captured.is_empty() && !captured.ends_with('\n') {
                captured.push('\n');
            }
            captured.push_str(&stderr);
        }

        interpret_exit(server, output.status.code(), captured)
    }
}

/// Map an ssh exit status onto the primitive's contract: transport
/// failures raise (retryable), everything else is an `Execution`.
fn interpret_exit(server: &Server, code: Option<i32>, output: String) -> Result<Execution> {
    match code {
        Some(SSH_TRANSPORT_EXIT) => Err(Error::Connection {
            host: server.address.clone(),
            detail: last_line(&output),
        }),
        Some(code) => {
            if code != 0 {
                log::debug!("command exited {} on {}", code, server.name);
            }
            Ok(Execution {
                success: code == 0,
                output,
            })
        }
        None => Err(Error::Transient {
            detail: format!("ssh terminated by signal while running on {}", server.name),
        }),
    }
}

fn last_line(output: &str) -> String {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("ssh transport failure")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServerType;

    fn server() -> Server {
        Server::new("c1", "compute-1", ServerType::Compute, "10.0.0.11")
    }

    #[test]
    fn test_base_args_default() {
        let runner = SshRunner::new(SshOptions::default());
        let args = runner.base_args();

        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert!(!args.contains(&"-i".to_string()));
    }

    #[test]
    fn test_base_args_identity_file() {
        let options = SshOptions {
            identity_file: Some(PathBuf::from("/home/ops/.ssh/id_ed25519")),
            batch_mode: false,
            connect_timeout_secs: None,
            ..Default::default()
        };
        let args = SshRunner::new(options).base_args();

        assert!(!args.contains(&"BatchMode=yes".to_string()));
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "/home/ops/.ssh/id_ed25519");
    }

    #[test]
    fn test_interpret_exit_success() {
        let execution = interpret_exit(&server(), Some(0), "ok\n".to_string()).unwrap();
        assert!(execution.success);
        assert_eq!(execution.output, "ok\n");
    }

    #[test]
    fn test_interpret_exit_command_failure_is_not_an_error() {
        let execution = interpret_exit(&server(), Some(2), "no such file\n".to_string()).unwrap();
        assert!(!execution.success);
        assert_eq!(execution.output, "no such file\n");
    }

    #[test]
    fn test_interpret_exit_transport_failure_is_retryable() {
        let err = interpret_exit(
            &server(),
            Some(SSH_TRANSPORT_EXIT),
            "ssh: connect to host 10.0.0.11 port 22: Connection refused\n".to_string(),
        )
        .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("Connection refused"));
    }

    #[test]
    fn test_interpret_exit_signal_death_is_retryable() {
        let err = interpret_exit(&server(), None, String::new()).unwrap_err();
        assert!(err.is_retryable());
    }
}
