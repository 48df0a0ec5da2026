//! Orchestration for deploying a tested checkout to Cloud Run.
//!
//! The invoker trusts its caller: it does not check that the checkout came
//! from a passing (or test-less) tester run. Project and region arrive through
//! an explicit [`GcpTarget`]; nothing here reads process environment.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::service_url::resolve_service_url;
use crate::core::types::{Checkout, DeployReport, Status};
use crate::io::adk::{DeployRequest, resolve_source_dir, run_deploy, service_name};
use crate::io::config::{DeployerConfig, GcpTarget};
use crate::io::process::CommandRunner;

const TIMEOUT_MESSAGE: &str = "Deployment timed out. The service might still be deploying. \
                               Check Google Cloud Console.";

/// Deploy `checkout` to `target`, returning a structured report.
///
/// Never returns an error: spawn failures, non-zero exits and timeouts are all
/// `status=error` reports. A timed-out deployment may still complete on the
/// platform side; it is neither cancelled nor verified.
#[instrument(skip_all, fields(repo = %checkout.repo_name, project = %target.project, region = %target.region))]
pub fn deploy_checkout<R: CommandRunner>(
    runner: &R,
    cfg: &DeployerConfig,
    target: &GcpTarget,
    checkout: &Checkout,
) -> DeployReport {
    match try_deploy(runner, cfg, target, checkout) {
        Ok(report) => report,
        Err(err) => {
            warn!(err = %err, "deployment failed unexpectedly");
            DeployReport::error(format!("Deployment error: {err:#}"))
        }
    }
}

fn try_deploy<R: CommandRunner>(
    runner: &R,
    cfg: &DeployerConfig,
    target: &GcpTarget,
    checkout: &Checkout,
) -> Result<DeployReport> {
    let service_name = service_name(&checkout.repo_name);
    let source_dir = resolve_source_dir(&checkout.clone_path);
    info!(service = %service_name, source = %source_dir.display(), "deploying");

    let request = DeployRequest {
        source_dir,
        service_name: service_name.clone(),
        target: target.clone(),
        timeout: cfg.deploy_timeout(),
    };
    let output = run_deploy(runner, &cfg.tools, &request)?;

    if output.timed_out {
        warn!(
            timeout_secs = cfg.deploy_timeout_secs,
            "deploy command timed out"
        );
        return Ok(DeployReport::error(TIMEOUT_MESSAGE));
    }
    if !output.success() {
        warn!(exit_code = ?output.exit_code, "deploy command failed");
        return Ok(DeployReport {
            details: Some(output.stdout_text()),
            ..DeployReport::error(format!(
                "Deployment failed: {}",
                output.stderr_text().trim()
            ))
        });
    }

    let resolved = resolve_service_url(&output.combined_text(), &service_name, &target.region);
    info!(url = %resolved.url, source = ?resolved.source, "deployment succeeded");
    Ok(DeployReport {
        status: Status::Success,
        message: format!("Deployment successful! Service URL: {}", resolved.url),
        service_url: Some(resolved.url),
        url_source: Some(resolved.source),
        service_name: Some(service_name),
        project: Some(target.project.clone()),
        region: Some(target.region.clone()),
        details: None,
    })
}
