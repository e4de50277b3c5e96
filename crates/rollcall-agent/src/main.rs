//! rollcall-agent — report this machine to a rollcall coordinator.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use rollcall_agent::{
    confirm, locate, AgentError, HostIdentity, HttpCoordinator, HttpProbe, Located, ScanObserver,
    StateStore, UploadAgent,
};
use rollcall_core::config::AgentConfig;
use rollcall_core::Endpoint;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bootstrap config file. Defaults to $ROLLCALL_CONFIG or ~/.rollcall/config.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Coordinator address (`ip` or `ip:port`). Skips scanning.
    #[arg(short, long)]
    server: Option<String>,
}

// ── Scan progress ─────────────────────────────────────────────────────────────

struct TerminalProgress {
    ticks: AtomicUsize,
}

impl ScanObserver for TerminalProgress {
    fn progress(&self, done: usize, total: usize) {
        const SPINNER: [char; 4] = ['-', '\\', '|', '/'];
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        let pct = if total == 0 {
            100.0
        } else {
            done as f64 * 100.0 / total as f64
        };
        let width = total.to_string().len();
        let mut err = std::io::stderr().lock();
        let _ = write!(
            err,
            "\rscanning... [{done:>width$}/{total} | {pct:5.1}%] {}",
            SPINNER[tick % SPINNER.len()]
        );
        if done == total {
            let _ = writeln!(err);
        }
        let _ = err.flush();
    }
}

/// Ask the operator which coordinator to use. EOF means nobody chose.
fn choose(found: Vec<Endpoint>) -> Result<Endpoint, AgentError> {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        eprintln!("found {} coordinators, choose one:", found.len());
        for (i, endpoint) in found.iter().enumerate() {
            eprintln!("[{i}] : {endpoint}");
        }
        eprint!("\n>>> ");
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(AgentError::NoServerFound);
        }
        match line.trim().parse::<usize>() {
            Ok(i) if i < found.len() => return Ok(found[i]),
            _ => eprintln!("not a valid choice: {}", line.trim()),
        }
    }
}

async fn find_coordinator(args: &Args, config: &AgentConfig, probe: Arc<HttpProbe>) -> Result<Endpoint> {
    let port = config.server.port;
    if let Some(server) = &args.server {
        return confirm(probe.as_ref(), server, port)
            .await
            .with_context(|| format!("--server {}", server));
    }

    let observer = TerminalProgress {
        ticks: AtomicUsize::new(0),
    };
    let located = locate(probe, &config.search, port, config.last_ip.as_deref(), &observer).await?;
    let endpoint = match located {
        Located::Cached(endpoint) | Located::Scanned(endpoint) => endpoint,
        Located::Ambiguous(found) => tokio::task::spawn_blocking(move || choose(found)).await??,
    };
    Ok(endpoint)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let bootstrap = args.config.clone().unwrap_or_else(AgentConfig::bootstrap_path);
    let config = AgentConfig::load(&bootstrap)
        .with_context(|| format!("loading {}", bootstrap.display()))?;
    let identity = HostIdentity::resolve(&config.identity);
    tracing::info!(
        config = %config.config_path().display(),
        name = %identity.name,
        user = %identity.user,
        "rollcall-agent starting"
    );

    let probe = Arc::new(HttpProbe::new(config.search.probe_timeout())?);
    let endpoint = find_coordinator(&args, &config, probe).await?;
    tracing::info!(%endpoint, "using coordinator");

    let coordinator = HttpCoordinator::new(endpoint, config.server.retry_policy().timeout)?;
    let store = StateStore::new(bootstrap, config.config_file.clone());
    let mut agent = UploadAgent::new(coordinator, endpoint, identity, &config, store);

    if let Err(e) = agent.run().await {
        if e.is_fatal_config() {
            tracing::error!(config = %agent.store().config_path().display(), "fix the configuration and restart");
        }
        return Err(e.into());
    }
    Ok(())
}
