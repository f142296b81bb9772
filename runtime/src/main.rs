// Copyright 2026 llm-web Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use llm_web::cache::StoragePolicy;
use llm_web::config::ServeArgs;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "llm-web",
    about = "A fictitious web, written by a language model as you browse it",
    version,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (the default)
    Serve(ServeArgs),
    /// Print the persistent cache directory
    CachePath {
        /// Override the cache directory
        #[arg(long)]
        cache_dir: Option<std::path::PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => serve(cli.serve).await,
        Some(Commands::Serve(args)) => serve(args).await,
        Some(Commands::CachePath { cache_dir }) => {
            let dir = cache_dir.unwrap_or_else(StoragePolicy::default_persistent_dir);
            println!("{}", dir.display());
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "llm-web",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    init_tracing(args.log_json);
    tracing::info!("starting llm-web v{}", env!("CARGO_PKG_VERSION"));

    let bind = args.bind;
    let ctx = args.into_context()?;
    llm_web::server::serve(bind, ctx).await
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("llm_web=info,tower_http=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
