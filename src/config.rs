use anyhow::{Context, Result};
use fleetkit::backend::ssh::SshOptions;
use fleetkit::{DispatchOptions, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration, loaded from TOML.
///
/// Lookup order: `--config PATH`, then `./armada.toml`, then
/// `~/.config/armada/config.toml`, then built-in defaults. Every value
/// here is a process-wide default; operations override them per call.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub ssh: SshConfig,
    pub execution: ExecutionConfig,
    pub release: ReleaseConfig,
}

/// Where the server registry lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub file: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("./config/servers.json"),
        }
    }
}

/// How the ssh argv is built.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SshConfig {
    pub user: String,
    /// Private key path; `~` is expanded
    pub identity_file: Option<String>,
    pub batch_mode: bool,
    pub connect_timeout: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "ops".to_string(),
            identity_file: None,
            batch_mode: true,
            connect_timeout: 10,
        }
    }
}

/// Dispatch defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Prefer the parallel path when an operation supports both
    pub parallel: bool,
    pub max_workers: usize,
    /// Per-server timeout in seconds (parallel path)
    pub timeout: u64,
    pub retry_count: u32,
    /// Initial retry delay in seconds; doubles per retry
    pub retry_delay: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_workers: 5,
            timeout: 300,
            retry_count: 3,
            retry_delay: 5,
        }
    }
}

/// Release layout on the remote servers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Remote directory holding the release tooling
    pub workdir: String,
    /// Data disk passed to `start_release`
    pub data_disk: String,
    /// Port of the throwaway release file server on build servers
    pub http_port: u16,
    /// Port routers listen on
    pub router_port: u16,
    /// Readiness endpoint polled after starting a router
    pub router_endpoint: String,
    pub router_retries: u32,
    pub router_retry_delay: u64,
    /// Process name pattern targeted by shutdown
    pub process_pattern: String,
    /// Local directory of per-type node configuration files
    pub types_dir: PathBuf,
    /// Node configuration path, relative to `workdir`
    pub remote_config: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            workdir: "node-os".to_string(),
            data_disk: "../cache.img".to_string(),
            http_port: 8000,
            router_port: 80,
            router_endpoint: "/healthz".to_string(),
            router_retries: 30,
            router_retry_delay: 1,
            process_pattern: "qemu-system".to_string(),
            types_dir: PathBuf::from("./config/types"),
            remote_config: "config/node.json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists.
    ///
    /// An explicitly passed path must exist; the implicit locations are
    /// optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = PathBuf::from("armada.toml");
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(home) = dirs::home_dir() {
            let user = home.join(".config").join("armada").join("config.toml");
            if user.exists() {
                return Self::from_file(&user);
            }
        }

        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Materialize the ssh settings for the execution primitive.
    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            user: self.ssh.user.clone(),
            identity_file: self
                .ssh
                .identity_file
                .as_deref()
                .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref())),
            batch_mode: self.ssh.batch_mode,
            connect_timeout_secs: Some(self.ssh.connect_timeout),
        }
    }

    /// Materialize the execution defaults as explicit dispatch options.
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            max_workers: self.execution.max_workers,
            timeout: Some(Duration::from_secs(self.execution.timeout)),
            stop_on_failure: false,
            retry: RetryConfig::new(
                self.execution.retry_count,
                Duration::from_secs(self.execution.retry_delay),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.execution.max_workers, 5);
        assert_eq!(config.execution.retry_count, 3);
        assert!(config.execution.parallel);
        assert_eq!(config.ssh.user, "ops");
        assert_eq!(config.release.http_port, 8000);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[execution]\nmax_workers = 2\n\n[ssh]\nuser = \"deploy\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.execution.max_workers, 2);
        assert_eq!(config.execution.timeout, 300);
        assert_eq!(config.ssh.user, "deploy");
        assert!(config.ssh.batch_mode);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "execution = \"nope\"").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        assert!(Config::load(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }

    #[test]
    fn test_dispatch_options_reflect_execution_config() {
        let mut config = Config::default();
        config.execution.retry_count = 1;
        config.execution.retry_delay = 7;

        let options = config.dispatch_options();
        assert_eq!(options.max_workers, 5);
        assert_eq!(options.timeout, Some(Duration::from_secs(300)));
        assert_eq!(options.retry.max_retries, 1);
        assert_eq!(options.retry.base_delay, Duration::from_secs(7));
        assert!(!options.stop_on_failure);
    }
}
