use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;

use fog_of_war::config::{Config, default_config_path};
use fog_of_war::logging::init_logging;
use fog_of_war::store::clear_grid;
use fog_of_war::{
    FogError, FsBlobStore, Viewport, ViewportBounds, import_paths, load_grid, persist_grid,
};

#[derive(Parser)]
#[command(name = "fog-of-war")]
#[command(about = "Index location-history exports and query the places you have been", long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the stored grid (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import export files or directories of exports (*.json, *.json.gz)
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List imported files
    List,
    /// Remove imported files by id
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show total point and edge counts
    Stats,
    /// Query the points and edges inside a rectangle
    Query {
        #[arg(long, allow_hyphen_values = true)]
        min_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        max_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        min_lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        max_lon: f64,
        /// Print points and edges as JSON instead of counts
        #[arg(long)]
        json: bool,
    },
    /// Delete the stored grid
    Clear,
}

#[derive(Serialize)]
struct QueryPoint {
    lat: f64,
    lon: f64,
    timestamp: Option<String>,
}

#[derive(Serialize)]
struct QueryEdge {
    a: QueryPoint,
    b: QueryPoint,
    length_km: f64,
}

#[derive(Serialize)]
struct QueryOutput {
    bounds: ViewportBounds,
    points: Vec<QueryPoint>,
    edges: Vec<QueryEdge>,
}

fn query_point(point: &fog_of_war::PointRef) -> QueryPoint {
    QueryPoint {
        lat: point.lat(),
        lon: point.lon(),
        timestamp: point
            .timestamp()
            .as_ref()
            .map(fog_of_war::geo_point::format_timestamp),
    }
}

fn run(args: Args) -> Result<(), FogError> {
    let config_path = args.config.unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;
    if let Some(dir) = args.data_dir {
        config = config.with_data_dir(dir);
    }
    init_logging(&config.logging.filter);

    // the grid is loaded per command so `clear` still works on a corrupt blob
    let mut store = FsBlobStore::new(&config.storage.data_dir);

    match args.command {
        Command::Import { paths } => {
            let mut grid = load_grid(&store)?;
            let report = import_paths(&mut grid, &paths);
            for imported in &report.imported {
                println!(
                    "✓ {} ({}): {} points, {} edges [{}]",
                    imported.name, imported.format, imported.points, imported.edges, imported.id
                );
            }
            for failure in &report.failed {
                println!("✗ {}: {}", failure.name, failure.error);
            }
            if report.processed() > 0 {
                persist_grid(&mut store, &grid)?;
            }
            println!("{}", report.summary());
        }
        Command::List => {
            let files = load_grid(&store)?.file_summaries();
            if files.is_empty() {
                println!("No files imported.");
            }
            for file in files {
                println!(
                    "{}  {}  {} points  {} edges",
                    file.id, file.name, file.points, file.edges
                );
            }
        }
        Command::Remove { ids } => {
            let mut grid = load_grid(&store)?;
            let mut changed = false;
            for id in &ids {
                match grid.remove_file_by_id(id) {
                    Some(file) => {
                        println!("✓ Removed {} ({})", file.name(), file.id());
                        changed = true;
                    }
                    None => println!("No file with id {}", id),
                }
            }
            if changed {
                persist_grid(&mut store, &grid)?;
            }
        }
        Command::Stats => {
            let grid = load_grid(&store)?;
            let stats = grid.get_statistics();
            println!("Files:  {}", grid.files().len());
            println!("Points: {}", stats.points_count);
            println!("Edges:  {}", stats.edges_count);
        }
        Command::Query {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            json,
        } => {
            let viewport = Viewport::new(min_lat, max_lat, min_lon, max_lon)?;
            let grid = load_grid(&store)?;
            let result = grid.query_viewport(&viewport);
            let max_edge_km = config.display.max_edge_km.unwrap_or(f64::INFINITY);
            let edges: Vec<_> = result
                .edges
                .iter()
                .filter(|e| e.length_km() <= max_edge_km)
                .collect();

            if json {
                let output = QueryOutput {
                    bounds: viewport.bounds(),
                    points: result.points.iter().map(query_point).collect(),
                    edges: edges
                        .iter()
                        .map(|e| QueryEdge {
                            a: query_point(e.a()),
                            b: query_point(e.b()),
                            length_km: e.length_km(),
                        })
                        .collect(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Points: {}", result.points.len());
                println!("Edges:  {}", edges.len());
            }
        }
        Command::Clear => {
            clear_grid(&mut store)?;
            println!("✓ Cleared stored grid");
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
