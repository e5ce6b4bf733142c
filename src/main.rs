mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use rpi_core::config::Config;

/// Read the config file, failing loudly if one was named but is unusable.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(Config::default()),
    }
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting rpimage server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    rpi_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "rpimage=trace,rpi_server=trace,rpi_db=debug,rpi_core=debug,tower_http=debug".to_string()
        } else {
            "rpimage=debug,rpi_server=debug,rpi_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("rpimage {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::HashPassword { password } => hash_password(&password, cli.config.as_deref()),
        Commands::GenerateSecret => {
            println!("{}", rpi_server::token::generate_secret());
            Ok(())
        }
        Commands::DeleteUser { username } => delete_user(&username, cli.config.as_deref()),
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = load_config(Some(p))?;
            println!("✓ Configuration parsed");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.server.db_path.display());
    println!("  Media: {}", config.server.media_dir.display());
    println!(
        "  Tokens: access {} min, refresh {} h",
        config.auth.access_token_minutes, config.auth.refresh_token_hours
    );
    println!(
        "  Uploads: up to {} bytes ({})",
        config.uploads.max_bytes,
        config.uploads.allowed_formats.join(", ")
    );

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("No warnings");
    } else {
        println!("Warnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}

fn hash_password(password: &str, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let hash = rpi_server::accounts::hash_password(password, config.auth.bcrypt_cost)?;
    println!("{hash}");
    Ok(())
}

fn delete_user(username: &str, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let db = rpi_server::open_database(&config)?;
    let blobs = rpi_server::storage::BlobStore::new(&config.server.media_dir);

    let removed = rpi_server::accounts::delete_account(&db, &blobs, username)?;
    println!("Deleted user '{username}' and {removed} image(s)");
    Ok(())
}
