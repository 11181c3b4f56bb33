use anyhow::Context;
use clap::Parser;
use proxy_sock::config::SockConfig;
use proxy_sock::listener::create_listener_from_config;
use proxy_sock::peer::PeerResolver;
use proxy_sock::server::Server;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "proxy-sock")]
#[command(author, version, about = "Listen for proxy clients and log their requests")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "PROXY_SOCK_CONFIG")]
    config: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Interface address to bind (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &Args) -> anyhow::Result<SockConfig> {
    let mut config = match args.config {
        Some(ref path) => SockConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => SockConfig::default(),
    };

    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if let Some(ref bind) = args.bind {
        config.listen.bind_address = Some(bind.clone());
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = load_config(&args)?;
    let listener = create_listener_from_config(&config.listen)
        .context("Failed to create listening socket")?;

    let server = Server::new(listener, PeerResolver::system());
    let shutdown = Arc::new(AtomicBool::new(false));

    let accept_shutdown = shutdown.clone();
    let accept_loop = tokio::task::spawn_blocking(move || server.serve(&accept_shutdown));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    shutdown.store(true, Ordering::Relaxed);

    accept_loop.await??;
    Ok(())
}
