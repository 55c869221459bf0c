use clap::{Parser, Subcommand};
use facet_sync::config::Config;
use facet_sync::core::ProductId;
use facet_sync::index::{IndexWriter, MemoryIndex, SearchIndex};
use facet_sync::query::{AppState, QueryServer};
use facet_sync::storage::{CatalogReader, CatalogSource, SqliteCatalog};
use facet_sync::sync::SyncOrchestrator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facet-sync")]
#[command(about = "Catalog → search index sync with a faceted product query API")]
#[command(version)]
struct Cli {
    /// 配置文件（TOML）；缺省查找 <config_dir>/facet-sync/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP query server
    Serve {
        #[arg(long)]
        port: Option<u16>,

        /// Do not populate the index at startup
        #[arg(long)]
        no_initial_sync: bool,
    },

    /// Run one sync in the foreground and print the report
    Sync {
        #[arg(long, default_value_t = 0, conflicts_with = "resume")]
        from_id: ProductId,

        /// Continue from the persisted checkpoint (requires checkpoint_path)
        #[arg(long)]
        resume: bool,
    },

    /// Check catalog connectivity
    Check,
}

struct Runtime {
    catalog: Arc<SqliteCatalog>,
    index: Arc<MemoryIndex>,
    orchestrator: Arc<SyncOrchestrator>,
}

fn build(config: &Config) -> anyhow::Result<Runtime> {
    let catalog = Arc::new(SqliteCatalog::open(&config.catalog_path)?);
    let index = Arc::new(MemoryIndex::new());
    let reader = CatalogReader::new(catalog.clone());
    let writer = IndexWriter::new(index.clone());
    let orchestrator = Arc::new(SyncOrchestrator::new(
        reader,
        writer,
        config.sync_options(),
    ));
    Ok(Runtime {
        catalog,
        index,
        orchestrator,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting facet-sync (catalog {:?})", config.catalog_path);
    let rt = build(&config)?;

    match cli.command {
        Commands::Serve {
            port,
            no_initial_sync,
        } => {
            let port = port.unwrap_or(config.port);
            if !no_initial_sync {
                rt.orchestrator.spawn(0)?;
            }

            let state = AppState::new(
                CatalogReader::new(rt.catalog.clone()),
                rt.index.clone(),
                rt.orchestrator.clone(),
                config.default_page_size,
            );
            let server = tokio::spawn(QueryServer::new(state).run(port));
            info!("facet-sync ready. Query via: http://localhost:{}/products", port);

            tokio::select! {
                res = server => res??,
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down...");
                    rt.orchestrator.cancel();
                }
            }
        }
        Commands::Sync { from_id, resume } => {
            let orchestrator = rt.orchestrator.clone();
            let handle = tokio::task::spawn_blocking(move || {
                if resume {
                    orchestrator.resume()
                } else {
                    orchestrator.run(from_id)
                }
            });

            let orchestrator = rt.orchestrator.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C received, stopping after the current batch");
                    orchestrator.cancel();
                }
            });

            let report = handle.await??;
            println!("{}", report);
            println!("{}", rt.index.stats());
        }
        Commands::Check => {
            rt.catalog.ping()?;
            let options = CatalogReader::new(rt.catalog.clone()).options()?;
            let values: usize = options.iter().map(|o| o.values.len()).sum();
            println!("SQLite {}", rt.catalog.version()?);
            println!("Catalog reachable: {} options, {} option values", options.len(), values);
        }
    }

    Ok(())
}
