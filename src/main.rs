use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sportiq::{
    config::{Settings, create_app},
    import::import_snapshot,
};

#[derive(Parser)]
#[command(about = "Tournament, achievement and training portal")]
struct Cli {
    /// TOML file with the server settings.
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    #[clap(long, global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[clap(long)]
        bind: Option<String>,
    },
    /// Apply any pending database migrations.
    Migrate,
    /// Load a JSON snapshot exported from the old single-document store.
    Import { snapshot: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        settings.database_url = url;
    }
    if let Command::Serve { bind: Some(bind) } = &cli.command {
        settings.bind_addr = bind.clone();
    }

    tracing_subscriber::fmt()
        .with_max_level(settings.log_level())
        .init();

    let pool = settings.open_database()?;

    match cli.command {
        Command::Serve { .. } => {
            let app = create_app(pool, settings.cookie_key());
            let listener =
                tokio::net::TcpListener::bind(&settings.bind_addr).await?;
            tracing::info!("listening on {}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }
        Command::Migrate => {
            tracing::info!("database is up to date");
        }
        Command::Import { snapshot } => {
            let raw = std::fs::read_to_string(&snapshot)?;
            let mut conn = pool.get()?;
            let summary = tokio::task::spawn_blocking(move || {
                import_snapshot(&raw, &mut conn)
            })
            .await??;
            tracing::info!("imported {summary}");
        }
    }

    Ok(())
}
