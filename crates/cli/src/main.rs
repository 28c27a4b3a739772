use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use thebook_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "thebook", version, about = "Run and inspect a thebook site")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the site until Ctrl-C
    Serve {
        /// Seed the store from this fixtures file instead of `database.fixtures`
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },
    /// Load the layered configuration and print what it resolved to
    CheckConfig,
}

fn load_settings() -> anyhow::Result<Settings> {
    Settings::load().with_context(|| "failed to load thebook settings")
}

fn check_config(settings: &Settings) {
    println!("environment: {:?}", settings.environment);
    println!("listen: {}:{}", settings.server.host, settings.server.port);
    println!(
        "fixtures: {}",
        settings.database.fixtures.as_deref().unwrap_or("none")
    );
    println!("login_url: {}", settings.auth.login_url);
    println!("dev_login: {}", settings.auth.dev_login);
    println!("page_size: {}", settings.pagination.page_size);
    println!("media_root: {}", settings.media.root);
    println!("book_edit_policy: {:?}", settings.books.edit_policy);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings()?;

    match cli.command {
        Command::CheckConfig => {
            check_config(&settings);
            Ok(())
        }
        Command::Serve { fixtures } => {
            thebook_telemetry::init(&settings.telemetry)?;
            if let Some(path) = fixtures {
                settings.database.fixtures = Some(path.to_string_lossy().into_owned());
            }
            tracing::info!(env = ?settings.environment, "thebook serve starting");
            thebook_app::run(settings).await
        }
    }
}
