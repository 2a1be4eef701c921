//! Tonebank CLI - render MIDI events through sampled instrument banks.

mod commands;
mod events;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tonebank")]
#[command(author, version, about = "Sample-based MIDI renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render notes or an event file to a WAV file
    Render(commands::render::RenderArgs),

    /// List configured tone banks and drum sets
    Banks(commands::banks::BanksArgs),

    /// Load one instrument and print its regions
    Inspect(commands::inspect::InspectArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    tracing_log::LogTracer::init().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Banks(args) => commands::banks::run(args),
        Commands::Inspect(args) => commands::inspect::run(args),
    }
}
