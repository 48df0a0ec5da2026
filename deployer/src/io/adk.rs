//! Adapter for the agent deploy CLI (`adk deploy cloud_run ...`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::io::config::{GcpTarget, ToolsConfig};
use crate::io::process::{CommandOutput, CommandRunner, CommandSpec};

/// Entry-point file the deploy tool expects in its source directory.
pub const ENTRY_POINT_FILE: &str = "agent.py";

/// Subdirectories probed for the entry point, before the checkout root.
pub const AGENT_DIR_CANDIDATES: [&str; 2] = ["my_agent", "agent"];

/// Service name derived from the repository name.
pub fn service_name(repo_name: &str) -> String {
    format!("deployed-{}", repo_name.to_lowercase())
}

/// Pick the deployment source directory inside a checkout.
///
/// Probes `my_agent/`, `agent/`, then the root for `agent.py`; the first match
/// wins. Falls back to the checkout root when none has it.
pub fn resolve_source_dir(checkout: &Path) -> PathBuf {
    let candidates = AGENT_DIR_CANDIDATES
        .iter()
        .map(|dir| checkout.join(dir))
        .chain(std::iter::once(checkout.to_path_buf()));
    for candidate in candidates {
        if candidate.join(ENTRY_POINT_FILE).is_file() {
            debug!(source = %candidate.display(), "found entry point");
            return candidate;
        }
    }
    debug!(checkout = %checkout.display(), "no entry point found, deploying checkout root");
    checkout.to_path_buf()
}

/// Parameters for one deploy invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub source_dir: PathBuf,
    pub service_name: String,
    pub target: GcpTarget,
    pub timeout: Duration,
}

/// Build `<deploy-prefix> --project=P --region=R --with_ui --service_name=S <source>`.
pub fn deploy_spec(tools: &ToolsConfig, request: &DeployRequest) -> Result<CommandSpec> {
    let (program, prefix) = tools
        .deploy
        .split_first()
        .ok_or_else(|| anyhow!("deploy command is empty"))?;
    Ok(CommandSpec::new(program, request.timeout)
        .args(prefix.iter().cloned())
        .arg(format!("--project={}", request.target.project))
        .arg(format!("--region={}", request.target.region))
        .arg("--with_ui")
        .arg(format!("--service_name={}", request.service_name))
        .arg(request.source_dir.to_string_lossy()))
}

/// Run the deploy command.
#[instrument(skip_all, fields(service = %request.service_name, project = %request.target.project, region = %request.target.region))]
pub fn run_deploy<R: CommandRunner>(
    runner: &R,
    tools: &ToolsConfig,
    request: &DeployRequest,
) -> Result<CommandOutput> {
    let spec = deploy_spec(tools, request)?;
    debug!(command = %spec, "running deploy command");
    runner
        .run(&spec)
        .with_context(|| format!("run {}", spec.program))
}
