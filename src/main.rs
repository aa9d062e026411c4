use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use trendtree::aggregate::{day_window, Aggregator, ConsumptionRequest};
use trendtree::config::Config;
use trendtree::filter::{AttributeFilter, TreeFilter};
use trendtree::fixture::FixtureStore;
use trendtree::model::{Children, Node};
use trendtree::session::{LazyTreeSession, SessionError};
use trendtree::store::NodeStore;

/// Browse an asset tree and total consumption from its trend sources
#[derive(Parser, Debug)]
#[command(name = "trendtree", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "trendtree.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tree pruned to the configured trend sources
    Tree {
        /// Source names to keep; overrides the configured list
        #[arg(short, long)]
        source: Vec<String>,

        /// Walk one level at a time through a lazy session instead of the
        /// eager filter
        #[arg(long)]
        lazy: bool,
    },
    /// Total consumption per leaf for one calendar day
    Total {
        /// Trend source name to integrate
        #[arg(short, long)]
        attribute: String,

        /// Calendar day (YYYY-MM-DD) in the configured zone
        #[arg(short, long)]
        date: chrono::NaiveDate,

        /// Leaf node paths to total
        #[arg(required = true)]
        leaves: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();
    let config = Config::from_file(&args.config)?;
    let store = Arc::new(FixtureStore::from_file(&config.fixture)?);

    match args.command {
        Command::Tree { source, lazy } => {
            let names = if source.is_empty() {
                config.tree.sources.clone()
            } else {
                source
            };
            let filter = AttributeFilter::new(names);
            let root = config
                .tree
                .root
                .clone()
                .unwrap_or_else(|| store.root_path().to_string());

            if lazy {
                let session = LazyTreeSession::new(Arc::clone(&store), root, filter);
                let tree = expand_fully(&session).await?;
                print_node(&tree, 0);
            } else {
                match TreeFilter::new(store).filter(&root, &filter).await? {
                    Some(tree) => print_node(&tree, 0),
                    None => println!("no matching trend sources under {root}"),
                }
            }
        }
        Command::Total {
            attribute,
            date,
            leaves,
        } => {
            let zone = config
                .report
                .zone()
                .ok_or("report.utc_offset_hours is out of range")?;
            let (start, end) = day_window(date, zone);
            info!(%date, %start, %end, "totaling consumption");

            let request = ConsumptionRequest {
                attribute,
                leaf_paths: leaves,
                start,
                end,
            };
            let aggregator = Aggregator::new(Arc::clone(&store), store);
            let report = aggregator.total_consumption(&request).await;

            for total in &report.totals {
                println!("{:<32} {:>10.2} kWh", total.display_name, total.total);
            }
            for failure in &report.failures {
                println!("{:<32} failed: {}", failure.path, failure.error);
            }
        }
    }

    Ok(())
}

/// Drive the session protocol to exhaustion, expanding every container the
/// way a client clicking through the whole tree would. Containers that
/// turn out empty stay in the output, which is exactly how the lazy mode
/// differs from the eager filter.
async fn expand_fully<S: NodeStore>(session: &LazyTreeSession<S>) -> Result<Node, SessionError> {
    let root = session.open_root().await?;
    fill(session, root).await
}

fn fill<'a, S: NodeStore>(
    session: &'a LazyTreeSession<S>,
    node: Node,
) -> Pin<Box<dyn Future<Output = Result<Node, SessionError>> + 'a>> {
    Box::pin(async move {
        if !node.is_container() {
            return Ok(node);
        }
        let children = match node.children {
            Children::Expanded(children) => children,
            _ => session.expand(&node.path).await?,
        };
        let mut filled = Vec::with_capacity(children.len());
        for child in children {
            filled.push(fill(session, child).await?);
        }
        Ok(Node {
            children: Children::Expanded(filled),
            ..node
        })
    })
}

fn print_node(node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    if node.attributes.is_empty() {
        println!("{indent}{}", node.display_name);
    } else {
        let sources: Vec<&str> = node.attributes.iter().map(|a| a.name.as_str()).collect();
        println!("{indent}{} [{}]", node.display_name, sources.join(", "));
    }
    if let Children::Expanded(children) = &node.children {
        for child in children {
            print_node(child, depth + 1);
        }
    }
}
