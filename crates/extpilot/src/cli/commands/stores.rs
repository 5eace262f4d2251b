//! Per-store arguments and the shared verb runner

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use extpilot_stores::chrome::ChromeStore;
use extpilot_stores::clock::{SystemClock, TokioSleeper};
use extpilot_stores::edge::EdgeStore;
use extpilot_stores::firefox::FirefoxStore;
use extpilot_stores::{
    HttpTransport, Outcome, PollDriver, ReqwestTransport, StoreAdapter, StoreKind, StoreRegistry,
    SubmissionRequest, Verb, WorkflowOrchestrator,
};

use crate::cli::{output, Cli, OutputFormat};
use crate::config::{resolve_config, Config};

/// Inputs shared by every store
#[derive(Debug, Clone, Args)]
pub struct PackageArgs {
    /// Store item ID (Firefox: add-on GUID)
    #[arg(short, long)]
    pub app: Option<String>,

    /// Packaged extension archive
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Source code archive
    #[arg(short, long)]
    pub source: Option<PathBuf>,
}

/// Chrome Web Store credentials
#[derive(Debug, Clone, Args)]
pub struct ChromeArgs {
    #[command(flatten)]
    pub package: PackageArgs,

    /// OAuth client ID
    #[arg(long, env = "CHROME_CLIENT_ID", hide_env_values = true)]
    pub client_id: String,

    /// OAuth client secret
    #[arg(long, env = "CHROME_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// OAuth refresh token
    #[arg(long, env = "CHROME_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: String,
}

/// Edge Add-ons credentials
#[derive(Debug, Clone, Args)]
pub struct EdgeArgs {
    #[command(flatten)]
    pub package: PackageArgs,

    /// Azure AD client ID
    #[arg(long, env = "EDGE_CLIENT_ID", hide_env_values = true)]
    pub client_id: String,

    /// Azure AD client secret
    #[arg(long, env = "EDGE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Token endpoint shown in Partner Center
    #[arg(long, env = "EDGE_ACCESS_TOKEN_URL")]
    pub access_token_url: Option<String>,
}

/// addons.mozilla.org credentials
#[derive(Debug, Clone, Args)]
pub struct FirefoxArgs {
    #[command(flatten)]
    pub package: PackageArgs,

    /// AMO API key (JWT issuer)
    #[arg(long, env = "FIREFOX_CLIENT_ID", hide_env_values = true)]
    pub client_id: String,

    /// AMO API secret
    #[arg(long, env = "FIREFOX_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Directory signed packages are written to
    #[arg(long)]
    pub download_dir: Option<PathBuf>,
}

/// A store selected on the command line
#[derive(Debug, Clone, Copy)]
pub enum StoreTarget<'a> {
    Chrome(&'a ChromeArgs),
    Edge(&'a EdgeArgs),
    Firefox(&'a FirefoxArgs),
}

impl StoreTarget<'_> {
    pub fn kind(&self) -> StoreKind {
        match self {
            StoreTarget::Chrome(_) => StoreKind::Chrome,
            StoreTarget::Edge(_) => StoreKind::Edge,
            StoreTarget::Firefox(_) => StoreKind::Firefox,
        }
    }

    fn package(&self) -> &PackageArgs {
        match self {
            StoreTarget::Chrome(args) => &args.package,
            StoreTarget::Edge(args) => &args.package,
            StoreTarget::Firefox(args) => &args.package,
        }
    }

    /// Submission request built from the package flags
    pub fn request(&self) -> SubmissionRequest {
        let package = self.package();
        let mut request = SubmissionRequest::new(self.kind());
        if let Some(app) = &package.app {
            request = request.with_app_id(app.clone());
        }
        if let Some(file) = &package.file {
            request = request.with_archive(file.clone());
        }
        if let Some(source) = &package.source {
            request = request.with_source(source.clone());
        }
        request
    }

    /// Adapter for this store wired to the shared transport and driver
    pub fn adapter(
        &self,
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        driver: PollDriver,
    ) -> anyhow::Result<Arc<dyn StoreAdapter>> {
        let adapter: Arc<dyn StoreAdapter> = match self {
            StoreTarget::Chrome(args) => {
                let config = config.chrome(&args.client_id, &args.client_secret, &args.refresh_token);
                Arc::new(ChromeStore::new(config, transport, driver.clock())?)
            }
            StoreTarget::Edge(args) => {
                let config = config.edge(
                    &args.client_id,
                    &args.client_secret,
                    args.access_token_url.as_deref(),
                )?;
                Arc::new(EdgeStore::new(config, transport, driver)?)
            }
            StoreTarget::Firefox(args) => {
                let mut config = config.firefox(&args.client_id, &args.client_secret);
                if let Some(dir) = &args.download_dir {
                    config.download_dir = dir.clone();
                }
                Arc::new(FirefoxStore::new(config, transport, driver)?)
            }
        };
        Ok(adapter)
    }
}

/// Run one verb against one store and print the outcome
pub fn run_verb(cli: &Cli, verb: Verb, target: StoreTarget<'_>) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(execute_async(cli, verb, target))?;
    output::outcome(cli, &outcome)
}

async fn execute_async(cli: &Cli, verb: Verb, target: StoreTarget<'_>) -> anyhow::Result<Outcome> {
    let cwd = std::env::current_dir()?;
    let config =
        resolve_config(cli.config.as_deref(), &cwd).context("failed to load configuration")?;

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::with_limit(config.http.max_response_bytes)?);
    let cancel = CancellationToken::new();
    let driver = PollDriver::new(
        Arc::new(SystemClock),
        Arc::new(TokioSleeper),
        cancel.clone(),
    );

    let mut registry = StoreRegistry::new();
    registry.register_arc(target.adapter(&config, transport, driver)?);
    let orchestrator = WorkflowOrchestrator::new(registry);
    let request = target.request();
    debug!(?request, %verb, "submission request");

    tokio::spawn(interrupt_on_ctrl_c(cancel));

    let spinner = spinner(cli, verb, target.kind());
    let result = orchestrator.run(verb, &request).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    result.with_context(|| format!("{} failed on {}", verb, target.kind()))
}

/// First Ctrl-C cancels at the next poll checkpoint, a second one exits
///
/// Requests already on the wire are left to finish.
async fn interrupt_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("interrupted, stopping at the next checkpoint (Ctrl-C again to abort)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        output::error("aborted");
        std::process::exit(crate::exit_codes::CANCELLED);
    }
}

fn spinner(cli: &Cli, verb: Verb, store: StoreKind) -> Option<ProgressBar> {
    if cli.quiet || cli.format != OutputFormat::Text {
        return None;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("{} {}", style(verb).bold(), store));
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}
