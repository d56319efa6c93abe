//! CloudShell Operator - interactive terminal sessions on OpenShift

mod controller_runner;

use std::time::Duration;

use clap::Parser;
use kube::{Api, Client, CustomResourceExt};

use cloudshell_common::crd::CloudShell;
use cloudshell_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use cloudshell_common::FIELD_MANAGER;
use cloudshell_controller::config::{
    DEFAULT_BASE_DOMAIN, DEFAULT_CONTAINER_MEMORY, DEFAULT_MACHINE_EXEC_IMAGE,
    DEFAULT_OAUTH_PROXY_IMAGE,
};
use cloudshell_controller::{ControllerConfig, WorkloadConfig};

/// CloudShell - reconciles CloudShell sessions into exec-ready workloads
#[derive(Parser, Debug)]
#[command(name = "cloudshell-operator", version, about, long_about = None)]
struct Cli {
    /// Print the CloudShell CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Only watch sessions in this namespace
    #[arg(long, env = "CLOUDSHELL_NAMESPACE")]
    namespace: Option<String>,

    /// Domain appended to session host names
    #[arg(long, env = "CLOUDSHELL_BASE_DOMAIN", default_value = DEFAULT_BASE_DOMAIN)]
    base_domain: String,

    /// Image of the command execution sidecar
    #[arg(long, env = "CLOUDSHELL_MACHINE_EXEC_IMAGE", default_value = DEFAULT_MACHINE_EXEC_IMAGE)]
    machine_exec_image: String,

    /// Image of the authenticating proxy sidecar
    #[arg(long, env = "CLOUDSHELL_OAUTH_PROXY_IMAGE", default_value = DEFAULT_OAUTH_PROXY_IMAGE)]
    oauth_proxy_image: String,

    /// Memory request and limit for each session container
    #[arg(long, env = "CLOUDSHELL_CONTAINER_MEMORY", default_value = DEFAULT_CONTAINER_MEMORY)]
    container_memory: String,

    /// Secret the proxy signs session cookies with
    #[arg(long, env = "CLOUDSHELL_COOKIE_SECRET", hide_env_values = true)]
    cookie_secret: Option<String>,

    /// Seconds before re-checking a session that was just written to
    #[arg(long, env = "CLOUDSHELL_REQUEUE_SECS", default_value_t = 2)]
    requeue_secs: u64,

    /// Seconds before retrying a failed reconciliation
    #[arg(long, env = "CLOUDSHELL_ERROR_REQUEUE_SECS", default_value_t = 30)]
    error_requeue_secs: u64,

    /// Seconds between periodic re-checks of converged sessions
    #[arg(long, env = "CLOUDSHELL_RESYNC_SECS", default_value_t = 300)]
    resync_secs: u64,

    /// Log output format: text or json
    #[arg(long, env = "CLOUDSHELL_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Log filter directives, overriding RUST_LOG
    #[arg(long, env = "CLOUDSHELL_LOG_FILTER")]
    log_filter: Option<String>,
}

impl Cli {
    fn controller_config(&self) -> anyhow::Result<ControllerConfig> {
        let cookie_secret = self
            .cookie_secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("--cookie-secret (CLOUDSHELL_COOKIE_SECRET) is required"))?;

        Ok(ControllerConfig {
            base_domain: self.base_domain.clone(),
            workload: WorkloadConfig {
                machine_exec_image: self.machine_exec_image.clone(),
                oauth_proxy_image: self.oauth_proxy_image.clone(),
                container_memory: self.container_memory.clone(),
                cookie_secret,
            },
            requeue_interval: Duration::from_secs(self.requeue_secs),
            error_requeue_interval: Duration::from_secs(self.error_requeue_secs),
            resync_interval: Duration::from_secs(self.resync_secs),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&CloudShell::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
        filter: cli.log_filter.clone(),
    })?;

    let config = cli.controller_config()?;
    run_controller(cli.namespace.as_deref(), config).await
}

/// Ensure the CloudShell CRD is installed
///
/// The operator installs its own CRD on startup using server-side apply so the
/// schema always matches the operator version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};
    use kube::ResourceExt;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let crd = CloudShell::crd();

    tracing::info!(crd = %crd.name_any(), "Installing CloudShell CRD...");
    crds.patch(&crd.name_any(), &params, &Patch::Apply(&crd))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install CloudShell CRD: {}", e))?;

    tracing::info!("CloudShell CRD installed/updated");
    Ok(())
}

async fn run_controller(namespace: Option<&str>, config: ControllerConfig) -> anyhow::Result<()> {
    tracing::info!(base_domain = %config.base_domain, "CloudShell controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    tracing::info!("Starting controllers:");
    controller_runner::build_cloudshell_controller(client, namespace, config).await;

    tracing::info!("CloudShell controller shut down");
    Ok(())
}
