//! memochat CLI and HTTP server entry point.
//!
//! Binary name: `memochat`
//!
//! Parses CLI arguments, loads `config.toml` from the data directory, then
//! either runs an interactive chat, serves the OpenAI-compatible API, or
//! prints stored memory.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use memochat_infra::config::load_global_config;
use memochat_infra::filesystem::conversation::YamlConversationStore;
use memochat_infra::filesystem::resolve_data_dir;
use memochat_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity; RUST_LOG wins when set.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,memochat=debug",
        _ => "trace",
    };
    init_tracing(cli.otel, filter).map_err(|e| anyhow::anyhow!("{e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "memochat", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    let config = load_global_config(&data_dir).await;

    match cli.command {
        Commands::Chat { user, provider } => {
            let state = AppState::init(&data_dir, config, provider);
            cli::chat::loop_runner::run_chat_loop(&state, &user).await?;
        }

        Commands::Serve {
            port,
            host,
            provider,
        } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let state = AppState::init(&data_dir, config, provider);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!();
                println!(
                    "  {} memochat API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!(
                    "  {}  {}",
                    console::style("Model:").bold(),
                    console::style(state.model()).dim()
                );
                println!(
                    "  {}  {}",
                    console::style("Memory:").bold(),
                    console::style(state.store.root().display()).dim()
                );
                println!();
                println!("  POST /v1/chat/completions");
                println!("  GET  /health");
                println!();
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let registry = state.registry.clone();
            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            let saved = registry.save_idle().await;
            tracing::info!(saved, "flushed memories on shutdown");
            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Show { user } => {
            let store = YamlConversationStore::new(&data_dir);
            cli::show::show_memory(&store, &user, config.memory.importance_threshold, cli.json)
                .await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
