//! Ember daemon entry point.
//!
//! Wires the fabric, session store, provider chain, peer coordination,
//! and orchestrator together, then runs the terminal channel until
//! ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ember_events::{EventFabric, SessionStore};
use ember_llm::anthropic::{AnthropicConfig, AnthropicProvider};
use ember_llm::openai::{OpenAiConfig, OpenAiProvider};
use ember_llm::{FailoverClient, Provider};
use ember_peers::PeerCoordinator;
use ember_runtime::{DisabledBrowser, NoRecall, Orchestrator, OrchestratorConfig};
use ember_settings::{EmberSettings, load_settings, load_settings_from_path};

mod terminal;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Autonomous agent coordination daemon.
#[derive(Parser, Debug)]
#[command(name = "ember", version, about)]
struct Args {
    /// Settings file (defaults to ember.json / EMBER_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the node identity.
    #[arg(long)]
    identity: Option<String>,

    /// Override the default role persona.
    #[arg(long)]
    role: Option<String>,

    /// Override the git workspace root.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Log filter (overrides EMBER_LOG).
    #[arg(long)]
    log: Option<String>,
}

fn init_tracing(filter: Option<&str>) {
    let filter = filter
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_env("EMBER_LOG").unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load(args: &Args) -> anyhow::Result<EmberSettings> {
    let mut settings = match &args.config {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => load_settings().context("loading settings")?,
    };
    if let Some(identity) = &args.identity {
        settings.identity.identity = Some(identity.clone());
    }
    if let Some(role) = &args.role {
        settings.identity.role = role.clone();
    }
    if let Some(workspace) = &args.workspace {
        settings.git.workspace_root = workspace.display().to_string();
    }
    Ok(settings)
}

fn build_providers(settings: &EmberSettings) -> Vec<Arc<dyn Provider>> {
    let anthropic = AnthropicProvider::new(AnthropicConfig::from_env(
        settings.providers.anthropic_model.clone(),
    ));
    let openai = OpenAiProvider::new(OpenAiConfig::from_env(
        settings.providers.openai_model.clone(),
        settings.providers.embedding_model.clone(),
    ));
    vec![
        Arc::new(anthropic) as Arc<dyn Provider>,
        Arc::new(openai) as Arc<dyn Provider>,
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref());

    let settings = load(&args)?;
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "ember-node".into());
    let identity = settings
        .identity
        .identity
        .clone()
        .unwrap_or_else(|| hostname.clone());

    info!(identity, role = %settings.identity.role, "ember starting");

    let fabric = Arc::new(EventFabric::new());
    let sessions = Arc::new(SessionStore::new(settings.sessions.capacity));
    let client = Arc::new(FailoverClient::new(
        build_providers(&settings),
        &settings.providers.priority,
        Arc::clone(&fabric),
    ));
    for descriptor in client.descriptors() {
        if !descriptor.configured {
            warn!(provider = %descriptor.name, "provider has no credential and will be skipped");
        }
    }

    let peers = Arc::new(
        PeerCoordinator::new(
            Arc::clone(&fabric),
            &settings.peers.shared_dir,
            identity.clone(),
            hostname,
            Some(settings.identity.role.clone()),
            settings.peers.stale_after_secs,
        )
        .context("creating peer coordination directories")?,
    );

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&fabric),
        sessions,
        client,
        Arc::clone(&peers),
        Arc::new(DisabledBrowser),
        Arc::new(NoRecall),
        OrchestratorConfig {
            role: settings.identity.role.clone(),
            safety: settings.safety.clone(),
            workspace_root: PathBuf::from(&settings.git.workspace_root),
            recall_top_k: settings.recall.top_k,
        },
    ));
    orchestrator.attach();

    let cancel = CancellationToken::new();
    let peer_loop = Arc::clone(&peers).spawn(
        Duration::from_millis(settings.peers.poll_interval_ms),
        cancel.clone(),
    );
    terminal::print_replies(&fabric);
    let terminal_loop = terminal::spawn(Arc::clone(&fabric), cancel.clone());

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");
    cancel.cancel();

    for handle in [peer_loop, terminal_loop] {
        if tokio::time::timeout(Duration::from_secs(2), handle).await.is_err() {
            warn!("loop did not stop within the shutdown timeout");
        }
    }
    info!("ember stopped");
    Ok(())
}
