//! Deployer configuration stored in `deployer.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "deployer.toml";

/// Environment variable overriding `gcp.project`.
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
/// Environment variable overriding `gcp.region`.
pub const REGION_ENV: &str = "GOOGLE_CLOUD_LOCATION";

/// Deployer configuration (TOML).
///
/// Missing fields default to the demo values, so an absent or partial file is
/// always usable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployerConfig {
    /// Bounded wait for `git clone`, in seconds.
    pub clone_timeout_secs: u64,

    /// Bounded wait for each test invocation, in seconds.
    pub test_timeout_secs: u64,

    /// Bounded wait for the deploy command, in seconds.
    pub deploy_timeout_secs: u64,

    /// Keep at most this many bytes of stdout (and of stderr) per command.
    pub output_limit_bytes: usize,

    pub gcp: GcpTarget,
    pub scratch: ScratchConfig,
    pub tools: ToolsConfig,
}

/// Where deployments go.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GcpTarget {
    pub project: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScratchConfig {
    /// Parent directory for checkouts. Defaults to the system temp dir.
    pub root: Option<PathBuf>,
    /// Suffix each checkout directory with a timestamp and random id so
    /// invocations never share a path. When false, the checkout lives at
    /// `<root>/<repo-name>` and is replaced on every clone.
    pub unique: bool,
}

/// External programs invoked by the deployer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub git: String,
    pub python: String,
    /// Deploy command prefix; flags and the source path are appended.
    pub deploy: Vec<String>,
}

impl Default for GcpTarget {
    fn default() -> Self {
        Self {
            project: "mbs-graphrag".to_string(),
            region: "us-central1".to_string(),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            root: None,
            unique: true,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            python: "python".to_string(),
            deploy: vec![
                "adk".to_string(),
                "deploy".to_string(),
                "cloud_run".to_string(),
            ],
        }
    }
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            clone_timeout_secs: 60,
            test_timeout_secs: 120,
            deploy_timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
            gcp: GcpTarget::default(),
            scratch: ScratchConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl DeployerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.clone_timeout_secs == 0 {
            return Err(anyhow!("clone_timeout_secs must be > 0"));
        }
        if self.test_timeout_secs == 0 {
            return Err(anyhow!("test_timeout_secs must be > 0"));
        }
        if self.deploy_timeout_secs == 0 {
            return Err(anyhow!("deploy_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.gcp.project.trim().is_empty() {
            return Err(anyhow!("gcp.project must not be empty"));
        }
        if self.gcp.region.trim().is_empty() {
            return Err(anyhow!("gcp.region must not be empty"));
        }
        if self.tools.git.trim().is_empty() {
            return Err(anyhow!("tools.git must not be empty"));
        }
        if self.tools.python.trim().is_empty() {
            return Err(anyhow!("tools.python must not be empty"));
        }
        if self.tools.deploy.is_empty() || self.tools.deploy[0].trim().is_empty() {
            return Err(anyhow!("tools.deploy must be a non-empty array"));
        }
        Ok(())
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_secs)
    }

    /// Resolved parent directory for checkouts.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch.root.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Replace project/region with values from `lookup` when present and non-empty.
    ///
    /// `lookup` is normally `std::env::var(..).ok()`; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(project) = lookup(PROJECT_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(project = %project, "project overridden from environment");
            self.gcp.project = project;
        }
        if let Some(region) = lookup(REGION_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(region = %region, "region overridden from environment");
            self.gcp.region = region;
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DeployerConfig::default()`.
pub fn load_config(path: &Path) -> Result<DeployerConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        let cfg = DeployerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DeployerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DeployerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, DeployerConfig::default());
        assert_eq!(cfg.clone_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.test_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.deploy_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("deployer.toml");
        let mut cfg = DeployerConfig::default();
        cfg.scratch.root = Some(temp.path().join("scratch"));
        cfg.gcp.region = "europe-west2".to_string();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("deployer.toml");
        fs::write(&path, "deploy_timeout_secs = 30\n\n[gcp]\nproject = \"demo\"\n")
            .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.deploy_timeout_secs, 30);
        assert_eq!(cfg.gcp.project, "demo");
        assert_eq!(cfg.gcp.region, "us-central1");
        assert!(cfg.scratch.unique);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("deployer.toml");
        fs::write(&path, "clone_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("clone_timeout_secs"));
    }

    #[test]
    fn env_overrides_replace_project_and_region() {
        let env: HashMap<&str, &str> = [(PROJECT_ENV, "prod-project"), (REGION_ENV, "asia-east1")]
            .into_iter()
            .collect();
        let mut cfg = DeployerConfig::default();
        cfg.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(cfg.gcp.project, "prod-project");
        assert_eq!(cfg.gcp.region, "asia-east1");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = DeployerConfig::default();
        cfg.apply_env_overrides(|_| Some("  ".to_string()));
        assert_eq!(cfg.gcp, GcpTarget::default());
    }
}
