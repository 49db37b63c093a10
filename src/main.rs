use anyhow::Context;
use cinesim_api::{RestApi, ServerSettings};
use cinesim_core::{FusionWeights, HnswParams, IndexConfig, IndexKind, RecallEvaluator};
use cinesim_storage::{CatalogLoader, DataPaths, IndexBuilder};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Content-based movie recommender
#[derive(Parser, Debug)]
#[command(name = "cinesim")]
#[command(about = "Content-based movie recommendations", long_about = None)]
struct Args {
    /// Path to the data directory
    #[arg(short, long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// Index file, defaults to <data-dir>/index/cinesim_index.bin
    #[arg(long, global = true)]
    index_path: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Weight of the sentence-embedding block
    #[arg(long, global = true, default_value_t = cinesim_core::fusion::DEFAULT_EMBEDDING_WEIGHT)]
    embedding_weight: f32,

    /// Weight of the one-hot categorical block
    #[arg(long, global = true, default_value_t = cinesim_core::fusion::DEFAULT_CATEGORICAL_WEIGHT)]
    categorical_weight: f32,

    /// Weight of the numeric block
    #[arg(long, global = true, default_value_t = cinesim_core::fusion::DEFAULT_NUMERIC_WEIGHT)]
    numeric_weight: f32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the catalog and serve the HTTP API
    Serve {
        /// Overrides CINESIM_HOST
        #[arg(long)]
        host: Option<String>,

        /// Overrides CINESIM_PORT
        #[arg(long)]
        port: Option<u16>,
    },

    /// Fuse the catalog and write the similarity index
    BuildIndex {
        #[arg(long, default_value_t = IndexKind::Hnsw)]
        kind: IndexKind,

        #[arg(long, default_value_t = 16)]
        max_connections: usize,

        #[arg(long, default_value_t = 200)]
        ef_construction: usize,

        #[arg(long, default_value_t = 64)]
        ef_search: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Print the nearest movies to a title
    Recommend {
        title: String,

        #[arg(short, default_value_t = 10)]
        k: usize,
    },

    /// Case-insensitive substring search over titles
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Recall@k of the loaded index against exact search
    Evaluate {
        #[arg(required = true)]
        titles: Vec<String>,

        #[arg(short, default_value_t = 10)]
        k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting cinesim v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);

    let weights = FusionWeights::new(
        args.embedding_weight,
        args.categorical_weight,
        args.numeric_weight,
    )?;
    let mut paths = DataPaths::from_data_dir(&args.data_dir);
    if let Some(index_path) = args.index_path {
        paths = paths.with_index(index_path);
    }

    match args.command {
        Command::Serve { host, port } => serve(paths, weights, host, port).await,
        Command::BuildIndex {
            kind,
            max_connections,
            ef_construction,
            ef_search,
            seed,
        } => {
            let config = IndexConfig {
                kind,
                hnsw: HnswParams {
                    max_connections,
                    ef_construction,
                    ef_search,
                    seed,
                    ..HnswParams::default()
                },
            };
            let report = IndexBuilder::new(paths, weights, config).build()?;
            println!(
                "Built {} index: {} items, dimension {}, {} bytes at {} in {:.2?}",
                report.kind,
                report.items,
                report.dimension,
                report.bytes,
                report.path.display(),
                report.elapsed
            );
            Ok(())
        }
        Command::Recommend { title, k } => {
            let engine = CatalogLoader::new(paths, weights).load()?;
            match engine.recommend(&title, k)? {
                Some(recs) => {
                    for (rank, rec) in recs.iter().enumerate() {
                        println!("{:>3}. {} ({:.4})", rank + 1, rec.title, rec.distance);
                    }
                }
                None => println!("Movie '{}' not found in database.", title),
            }
            Ok(())
        }
        Command::Search { query, limit } => {
            let engine = CatalogLoader::new(paths, weights).load()?;
            for title in engine.search(&query, limit) {
                println!("{}", title);
            }
            Ok(())
        }
        Command::Evaluate { titles, k } => {
            let engine = CatalogLoader::new(paths, weights).load()?;
            let summary = RecallEvaluator::new(&engine)?.evaluate(&titles, k)?;
            for report in &summary.reports {
                println!("{:.3}  {}", report.recall, report.query);
            }
            for title in &summary.missing {
                warn!("Skipped unknown title '{}'", title);
            }
            match summary.mean_recall {
                Some(mean) => println!("Mean recall@{}: {:.4}", summary.k, mean),
                None => println!("No known titles to evaluate"),
            }
            Ok(())
        }
    }
}

async fn serve(
    paths: DataPaths,
    weights: FusionWeights,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut settings = ServerSettings::from_env()?;
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }
    settings.validate()?;

    // Refuse to serve until the engine is fully loaded
    let engine = Arc::new(
        CatalogLoader::new(paths, weights)
            .load()
            .context("loading recommendation engine")?,
    );
    info!("Engine ready with {} movies", engine.total_items());

    let http_host = settings.host.clone();
    let http_port = settings.port;
    let http_handle = std::thread::spawn(move || -> std::io::Result<()> {
        info!("Starting HTTP server on {}:{}", http_host, http_port);
        let sys = actix_web::rt::System::new();
        sys.block_on(RestApi::start(engine, settings))
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        joined = tokio::task::spawn_blocking(move || http_handle.join()) => {
            match joined.context("joining HTTP server thread")? {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => {
                    error!("HTTP server error: {}", e);
                    return Err(anyhow::Error::new(e).context("running HTTP server"));
                }
                Err(_) => {
                    error!("HTTP server thread panicked");
                    anyhow::bail!("HTTP server thread panicked");
                }
            }
        }
    }

    info!("Shutting down...");
    Ok(())
}
