use anyhow::{Context as _, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bottles::commands::{self, Session};
use bottles::context::Context;
use bottles::manager::Manager;
use bottles::settings::Settings;
use bottles::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing with RUST_LOG env filter
    // e.g., RUST_LOG=bottles=debug
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Schema generation needs no data directory.
    if let Commands::Schema(args) = cli.command {
        return commands::schema::run(args);
    }

    let settings = Settings::load()?;
    let ctx = Context::from_settings(&settings);
    ctx.paths
        .ensure()
        .with_context(|| format!("Failed to create {}", ctx.paths.data.display()))?;
    tracing::debug!(data = %ctx.paths.data.display(), sandboxed = ctx.sandboxed, "Context ready");

    let mut session = Session::new(Manager::new(ctx), cli.json);

    match cli.command {
        Commands::List => commands::bottle::list(&session),
        Commands::Show(args) => commands::bottle::show(args, &session),
        Commands::Create(args) => commands::bottle::create(args, &mut session),
        Commands::Delete(args) => commands::bottle::delete(args, &session),
        Commands::Repair(args) => commands::bottle::repair(args, &session),
        Commands::Runner(args) => commands::runner::run(args, &session),
        Commands::Component(args) => commands::component::run(args, &session),
        Commands::Windows(args) => commands::registry::windows(args, &session),
        Commands::Dpi(args) => commands::registry::dpi(args, &session),
        Commands::Renderer(args) => commands::registry::renderer(args, &session),
        Commands::Config(args) => commands::config::run(args, &session),
        Commands::Registry(args) => commands::registry::run(args, &session),
        Commands::Template(args) => commands::template::run(args, &session),
        Commands::Schema(args) => commands::schema::run(args),
    }
}
