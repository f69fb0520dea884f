//! CLI for building, inspecting and serving forest indexes

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use annforest::persistence::read_header;
use annforest::server::{self, AppState};
use annforest::{Catalog, ForestIndex, ForestParams, Metric, Neighbor, Query, SearchParams, Vector};

#[derive(Parser)]
#[command(name = "annforest")]
#[command(about = "Approximate item-to-item similarity with random projection forests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy)]
enum MetricArg {
    Angular,
    Euclidean,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Angular => Metric::Angular,
            MetricArg::Euclidean => Metric::Euclidean,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a JSON-lines catalog
    Build {
        /// Catalog file, one {"item_id", "vector", ...} object per line
        #[arg(short, long)]
        catalog: PathBuf,
        /// Output index file (.afi)
        #[arg(short, long)]
        output: PathBuf,
        /// Number of trees in the forest
        #[arg(long, default_value = "10")]
        trees: usize,
        /// Maximum vectors per leaf
        #[arg(long, default_value = "32")]
        leaf_capacity: usize,
        /// Seed for reproducible builds
        #[arg(long, default_value = "42")]
        seed: u64,
        #[arg(long, value_enum, default_value = "angular")]
        metric: MetricArg,
    },
    /// Recommend items similar to one or more catalog items
    Recommend {
        #[arg(short, long)]
        index: PathBuf,
        /// Item id to recommend for (repeatable)
        #[arg(long = "item-id", required = true)]
        item_ids: Vec<String>,
        #[arg(short = 'n', long, default_value = "5")]
        top_n: usize,
        /// Candidate budget as a multiple of top-n
        #[arg(long, default_value = "10")]
        budget_factor: usize,
    },
    /// Search with an arbitrary query vector
    Search {
        #[arg(short, long)]
        index: PathBuf,
        /// Query vector as comma-separated values (e.g., "1.0,2.0,3.0")
        #[arg(long)]
        vector: String,
        #[arg(short, long, default_value = "5")]
        k: usize,
        #[arg(long, default_value = "10")]
        budget_factor: usize,
    },
    /// Print header fields and per-tree shape of an index file
    Stats {
        #[arg(short, long)]
        index: PathBuf,
    },
    /// Start the HTTP recommendation server
    Serve {
        #[arg(short, long)]
        index: PathBuf,
        /// Optional catalog for titles and image urls
        #[arg(short, long)]
        catalog: Option<PathBuf>,
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
        #[arg(long, default_value = "10")]
        budget_factor: usize,
    },
}

fn print_neighbors(neighbors: &[Neighbor]) {
    if neighbors.is_empty() {
        println!("  (no neighbors)");
    }
    for (i, n) in neighbors.iter().enumerate() {
        println!("  {}. {} (distance: {:.4})", i + 1, n.item_id, n.distance);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            catalog,
            output,
            trees,
            leaf_capacity,
            seed,
            metric,
        } => {
            let catalog = Catalog::open(&catalog)
                .with_context(|| format!("reading catalog {}", catalog.display()))?;
            let params = ForestParams::new(trees, leaf_capacity, seed).with_metric(metric.into());
            let index = ForestIndex::build(catalog.vectors, params)?;
            index.save(&output)?;
            println!(
                "Built index of {} vectors ({} trees) -> {}",
                index.len(),
                index.trees().len(),
                output.display()
            );
        }
        Commands::Recommend {
            index,
            item_ids,
            top_n,
            budget_factor,
        } => {
            let search = SearchParams::new(budget_factor)?;
            let index = ForestIndex::load(&index)?;
            let results = index.recommend_many(&item_ids, top_n, &search);
            for (id, result) in item_ids.iter().zip(results) {
                println!("{}:", id);
                match result {
                    Ok(neighbors) => print_neighbors(&neighbors),
                    Err(e) => println!("  error: {}", e),
                }
            }
        }
        Commands::Search {
            index,
            vector,
            k,
            budget_factor,
        } => {
            let search = SearchParams::new(budget_factor)?;
            let query: Vector = vector.parse()?;
            let index = ForestIndex::load(&index)?;
            let neighbors = index.query(Query::Vector(query.as_slice()), k, &search)?;
            println!("Top {} results:", neighbors.len());
            print_neighbors(&neighbors);
        }
        Commands::Stats { index } => {
            let header = read_header(&index)?;
            println!("format version: {}", header.version);
            println!("metric:         {}", header.metric);
            println!("dimension:      {}", header.dimension);
            println!("vectors:        {}", header.count);
            println!("trees:          {}", header.tree_count);
            println!("leaf capacity:  {}", header.leaf_capacity);
            println!("seed:           {}", header.seed);

            let loaded = ForestIndex::load(&index)?;
            for (i, stats) in loaded.stats().iter().enumerate() {
                println!(
                    "tree {:>3}: {} nodes, {} leaves, depth {}, largest leaf {}",
                    i, stats.node_count, stats.leaf_count, stats.depth, stats.max_leaf_size
                );
            }
        }
        Commands::Serve {
            index,
            catalog,
            addr,
            budget_factor,
        } => {
            let search = SearchParams::new(budget_factor)?;
            let forest = ForestIndex::load(&index)?;
            let mut state = AppState::new(forest, search).with_index_path(&index);
            if let Some(catalog) = catalog {
                let (_, items) = Catalog::open(&catalog)
                    .with_context(|| format!("reading catalog {}", catalog.display()))?
                    .into_parts();
                tracing::info!(items = items.len(), "loaded item metadata");
                state = state.with_items(items);
            }
            server::start(&addr, state).await?;
        }
    }

    Ok(())
}
