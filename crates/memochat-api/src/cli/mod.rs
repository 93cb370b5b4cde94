//! CLI command definitions for the `memochat` binary.
//!
//! Uses clap derive macros for argument parsing. Provider credentials come
//! from flags or the usual `OPENAI_*` environment variables.

pub mod chat;
pub mod show;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Chat with an LLM that remembers you.
#[derive(Parser)]
#[command(name = "memochat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session.
    Chat {
        /// Whose memory to load and extend.
        #[arg(long, short, env = "USER_ID", default_value = "default_user")]
        user: String,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Start the OpenAI-compatible HTTP server.
    Serve {
        /// Port to listen on (defaults to `server.port` in config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` in config.toml).
        #[arg(long)]
        host: Option<String>,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Show the stored memory of a user.
    Show {
        /// User id to display.
        user: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Upstream provider settings shared by `chat` and `serve`.
///
/// Values given here override the `[provider]` section of config.toml.
#[derive(Args)]
pub struct ProviderArgs {
    /// API key for the upstream endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of an OpenAI-compatible endpoint.
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Model to chat, summarize and reflect with.
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: Option<String>,
}
