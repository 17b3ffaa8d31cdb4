use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use netlayout::options::parse_assignment;
use netlayout::{EdgeRef, LayoutHost, LayoutOptions, LayoutRegistry, NodePosition};

/// Compute 3D graph layouts from the command line.
#[derive(Parser)]
#[command(name = "netlayout")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available layouts
    List,
    /// Apply a layout to a synthetic graph and print the positions as JSON
    Run {
        /// Layout identifier (see `list`)
        #[arg(short, long)]
        layout: String,

        /// Number of nodes in the generated graph
        #[arg(short, long, default_value = "8")]
        nodes: usize,

        /// Connectivity of the generated graph
        #[arg(short, long, value_enum, default_value = "ring")]
        shape: Shape,

        /// Option override, repeatable (e.g. --set iterations=200)
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_set)]
        overrides: Vec<(String, f64)>,

        /// YAML file of option overrides
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fail if an offloaded layout takes longer than this
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Shape {
    Ring,
    Chain,
    Star,
    Grid,
}

fn parse_set(text: &str) -> Result<(String, f64), String> {
    parse_assignment(text).map_err(|e| e.to_string())
}

/// Unplaced nodes `n0..n{count}` connected according to `shape`
fn synthetic_graph(count: usize, shape: Shape) -> (Vec<NodePosition>, Vec<EdgeRef>) {
    let nodes = (0..count)
        .map(|i| NodePosition::unplaced(format!("n{i}")))
        .collect();

    let edges = match shape {
        Shape::Chain => (1..count).map(|i| EdgeRef::new(i - 1, i)).collect(),
        Shape::Ring if count > 2 => (0..count)
            .map(|i| EdgeRef::new(i, (i + 1) % count))
            .collect(),
        Shape::Ring => (1..count).map(|i| EdgeRef::new(i - 1, i)).collect(),
        Shape::Star => (1..count).map(|i| EdgeRef::new(0, i)).collect(),
        Shape::Grid => {
            let side = (count as f64).sqrt().ceil().max(1.0) as usize;
            let mut edges = Vec::new();
            for i in 0..count {
                if (i + 1) % side != 0 && i + 1 < count {
                    edges.push(EdgeRef::new(i, i + 1));
                }
                if i + side < count {
                    edges.push(EdgeRef::new(i, i + side));
                }
            }
            edges
        }
    };

    (nodes, edges)
}

/// Option overrides from an optional YAML file, then `--set` on top
fn load_overrides(
    config: Option<&Path>,
    assignments: Vec<(String, f64)>,
) -> anyhow::Result<LayoutOptions> {
    let mut options = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_yaml::from_str::<LayoutOptions>(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => LayoutOptions::new(),
    };
    for (key, value) in assignments {
        options.set(key, value);
    }
    Ok(options)
}

fn list(registry: &LayoutRegistry) {
    for summary in registry.list_available() {
        println!("{}\t{}", summary.id, summary.display_name);
    }
}

async fn run(
    registry: LayoutRegistry,
    layout: &str,
    count: usize,
    shape: Shape,
    overrides: LayoutOptions,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let registry = match timeout {
        Some(timeout) => registry.with_timeout(timeout),
        None => registry,
    };
    let (nodes, edges) = synthetic_graph(count, shape);

    let positions = registry
        .apply(layout, &nodes, &edges, &overrides)
        .await
        .with_context(|| format!("layout '{layout}' failed"))?;

    println!("{}", serde_json::to_string_pretty(&positions)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = LayoutRegistry::with_defaults(
        LayoutHost::spawn().context("failed to start layout worker")?,
    );

    match cli.command {
        Commands::List => list(&registry),
        Commands::Run {
            layout,
            nodes,
            shape,
            overrides,
            config,
            timeout_ms,
        } => {
            let overrides = load_overrides(config.as_deref(), overrides)?;
            run(
                registry,
                &layout,
                nodes,
                shape,
                overrides,
                timeout_ms.map(Duration::from_millis),
            )
            .await?;
        }
    }

    Ok(())
}
