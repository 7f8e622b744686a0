mod commands;
mod config;
mod postgrest;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, fmt};

use crate::commands::{
    ListFilters, cmd_add, cmd_clear_cache, cmd_delete, cmd_filters, cmd_health, cmd_image_delete,
    cmd_image_upload, cmd_list, cmd_show, cmd_update, open_catalog,
};
use crate::config::Config;
use crate::postgrest::PostgrestClient;

#[derive(Parser)]
#[command(
    name = "cookbook",
    version,
    about = "A local-first recipe catalog with optional remote sync"
)]
struct Cli {
    /// Path to the local cache database (default: <data dir>/cookbook.db)
    #[arg(long, global = true, value_name = "PATH")]
    cache: Option<PathBuf>,
    /// Ignore remote settings and work from the local cache only
    #[arg(long, global = true)]
    local_only: bool,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recipes, optionally filtered by text and tags
    List {
        /// Text to match against name, ingredients and description
        #[arg(short, long)]
        query: Option<String>,
        /// Protein values, comma separated (e.g. "chicken,pork")
        #[arg(long)]
        protein: Option<String>,
        /// Vegetable values, comma separated
        #[arg(long)]
        vegetables: Option<String>,
        /// Cuisine values, comma separated
        #[arg(long)]
        cuisine: Option<String>,
        /// Meal types, comma separated (e.g. "lunch,dinner")
        #[arg(long)]
        meal_type: Option<String>,
        /// Cooking methods, comma separated
        #[arg(long)]
        method: Option<String>,
        /// Tags resolved to whichever category contains them
        #[arg(long)]
        tag: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe in full
    Show {
        /// Recipe ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipe from a JSON draft file
    Add {
        /// Path to the draft (camelCase recipe fields without "id")
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a recipe with the contents of a JSON draft file
    Update {
        /// Recipe ID
        id: String,
        /// Path to the draft
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        /// Recipe ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the values available for each filter category
    Filters {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check the remote store connection and recipes table
    Health {
        /// Also insert and remove a throwaway row to check write access
        #[arg(long)]
        write_test: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the cached collection so the next command rehydrates
    ClearCache {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage recipe images (requires a remote store)
    Image {
        #[command(subcommand)]
        command: ImageCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum ImageCommands {
    /// Upload an image and make it the recipe's image
    Upload {
        /// Recipe ID
        id: String,
        /// Image file (png, jpg, webp, gif)
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the recipe's image
    Delete {
        /// Recipe ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.cache, cli.local_only)?;
    let remote = PostgrestClient::new(config.remote)?;
    let catalog = || open_catalog(remote.clone(), &config.cache_path);

    match cli.command {
        Commands::List {
            query,
            protein,
            vegetables,
            cuisine,
            meal_type,
            method,
            tag,
            json,
        } => {
            let filters = ListFilters {
                text: query,
                protein,
                vegetables,
                cuisine,
                meal_type,
                method,
                tag,
            };
            cmd_list(&catalog().await?, &filters, json)
        }
        Commands::Show { id, json } => cmd_show(&catalog().await?, &id, json),
        Commands::Add { file, json } => cmd_add(&mut catalog().await?, &file, json).await,
        Commands::Update { id, file, json } => {
            cmd_update(&mut catalog().await?, &id, &file, json).await
        }
        Commands::Delete { id, json } => cmd_delete(&mut catalog().await?, &id, json).await,
        Commands::Filters { json } => cmd_filters(&catalog().await?, json),
        Commands::Health { write_test, json } => cmd_health(&remote, write_test, json).await,
        Commands::ClearCache { json } => cmd_clear_cache(&config.cache_path, json),
        Commands::Image { command } => match command {
            ImageCommands::Upload { id, file, json } => {
                cmd_image_upload(&mut catalog().await?, &id, &file, json).await
            }
            ImageCommands::Delete { id, json } => {
                cmd_image_delete(&mut catalog().await?, &id, json).await
            }
        },
        Commands::Serve { port, bind } => {
            server::start_server(catalog().await?, remote.clone(), port, &bind).await
        }
    }
}
