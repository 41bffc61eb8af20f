mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    canvas::CanvasSubcommand, config::ConfigSubcommand, key::KeySubcommand,
    playbook::PlaybookSubcommand, session::SessionSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "apb",
    about = "AgentPlaybooks: publish personas, skills, canvas documents and memories to agents",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data directory (default: nearest .agentplaybooks/ above cwd)
    #[arg(long, global = true, env = "APB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, default config, and store
    Init,

    /// Run the HTTP API and MCP endpoint
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage playbooks
    Playbook {
        #[command(subcommand)]
        subcommand: PlaybookSubcommand,
    },

    /// Issue, list, and revoke playbook API keys
    Key {
        #[command(subcommand)]
        subcommand: KeySubcommand,
    },

    /// Issue and revoke user sessions
    Session {
        #[command(subcommand)]
        subcommand: SessionSubcommand,
    },

    /// Inspect canvas markdown
    Canvas {
        #[command(subcommand)]
        subcommand: CanvasSubcommand,
    },

    /// Inspect and validate config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = root::resolve_data_dir(cli.data_dir.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&data_dir, cli.json),
        Commands::Serve { host, port } => cmd::serve::run(&data_dir, host, port),
        Commands::Playbook { subcommand } => cmd::playbook::run(&data_dir, subcommand, cli.json),
        Commands::Key { subcommand } => cmd::key::run(&data_dir, subcommand, cli.json),
        Commands::Session { subcommand } => cmd::session::run(&data_dir, subcommand, cli.json),
        Commands::Canvas { subcommand } => cmd::canvas::run(subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&data_dir, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
