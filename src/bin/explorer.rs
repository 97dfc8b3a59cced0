//! Explorer CLI
//!
//! Drives an `ExplorerSession` from the terminal.
//!
//! Usage:
//!   cargo run --features cli --bin explorer -- tree
//!   cargo run --features cli --bin explorer -- --user 2 layout
//!   cargo run --features cli --bin explorer -- visit 17 --journal "Great coffee"
//!   cargo run --features cli --bin explorer -- demo

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};

use waypoint_client::Place;
use waypoint_layout::colors::edge_color;
use waypoint_layout::{node_fill, GraphBounds, Rgb};
use waypoint_explorer::config::ConfigLoader;
use waypoint_explorer::telemetry::init_tracing;
use waypoint_explorer::tree::flatten;
use waypoint_explorer::{
    Branch, ExplorerBackend, ExplorerConfig, ExplorerSession, GeoPoint, HttpBackend,
    InMemoryBackend, WaypointId, WaypointNode,
};

/// Waypoint tree explorer
#[derive(Parser, Debug)]
#[command(name = "explorer")]
#[command(about = "Inspect and grow a waypoint exploration tree")]
struct Args {
    /// Backend base URL (overrides config and EXPLORER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// User whose tree to open
    #[arg(long, short = 'u', global = true)]
    user: Option<i64>,

    /// Config file (default: EXPLORER_CONFIG or config/explorer.yaml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tree with depth indentation
    Tree,
    /// Print radial layout tuples and the zoom that fits them
    Layout {
        /// Viewport width used for the fit zoom
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        /// Viewport height used for the fit zoom
        #[arg(long, default_value_t = 800.0)]
        height: f64,
    },
    /// Visit a waypoint: mark visited, explore, save journal
    Visit {
        node_id: WaypointId,
        /// Journal text for this visit
        #[arg(long, short = 'j')]
        journal: Option<String>,
    },
    /// Run an offline exploration against an in-memory backend
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::new(path),
        None => ConfigLoader::from_env(),
    };
    let mut config = loader.load()?;
    if let Some(url) = args.api_url {
        config.api.base_url = url;
    }
    if let Some(user) = args.user {
        config.user_id = user;
    }
    init_tracing(&config.log_filter);

    let output = Output { json: args.json };
    match args.command {
        Command::Demo => run_demo(config, output).await,
        command => run_remote(config, command, output).await,
    }
}

#[derive(Debug, Clone, Copy)]
struct Output {
    json: bool,
}

async fn run_remote(config: ExplorerConfig, command: Command, output: Output) -> Result<()> {
    let backend = Arc::new(HttpBackend::with_timeout(
        &config.api.base_url,
        Duration::from_secs(config.api.timeout_secs),
    )?);
    let mut session = ExplorerSession::new(backend, config);
    session.refresh().await?;

    match command {
        Command::Tree => print_tree(&mut session, output),
        Command::Layout { width, height } => print_layout(&mut session, (width, height), output),
        Command::Visit { node_id, journal } => {
            visit(&mut session, node_id, journal.as_deref(), output).await
        }
        Command::Demo => run_demo(session.config().clone(), output).await,
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

const DEMO_VIEWPORT: (f64, f64) = (1280.0, 800.0);

fn tint(text: &str, rgb: Rgb) -> ColoredString {
    text.truecolor(rgb.0, rgb.1, rgb.2)
}

/// Branch tag in the branch's edge colour
fn branch_label(branch: Branch) -> ColoredString {
    let label = match branch {
        Branch::Root => "root".to_string(),
        Branch::Index(i) => format!("b{i}"),
    };
    tint(&label, edge_color(branch))
}

fn print_tree<B: ExplorerBackend + ?Sized>(
    session: &mut ExplorerSession<B>,
    output: Output,
) -> Result<()> {
    let Some(tree) = session.tree().cloned() else {
        println!("{}", "No tree loaded".red());
        return Ok(());
    };
    let layout = session.layout()?;
    if output.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }
    let presentation = session.presentation();

    println!(
        "{} {}",
        "Tree for".bold(),
        session.user_label().bold().cyan()
    );
    for entry in flatten(&tree, session.config().traversal)? {
        let node = entry.node;
        let glyph = if node.visited {
            "●"
        } else if presentation.is_pulsing(node.id) {
            "◎"
        } else {
            "○"
        };
        let marker = tint(
            glyph,
            node_fill(node.category_tag(), node.visited, entry.depth == 0),
        );
        let selected = if presentation.selected_id == Some(node.id) {
            " ←".cyan().to_string()
        } else {
            String::new()
        };
        let branch = layout
            .node(node.id)
            .map(|n| branch_label(n.branch))
            .unwrap_or_else(|| "".normal());
        let visited_at = node
            .visited_at
            .map(|at| format!(" visited {}", at.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        println!(
            "{}{} {} {} {}{}{}",
            "  ".repeat(entry.depth),
            marker,
            node.name,
            format!("#{}", node.id).as_str().dimmed(),
            branch,
            visited_at.as_str().dimmed(),
            selected
        );
    }
    Ok(())
}

fn print_layout<B: ExplorerBackend + ?Sized>(
    session: &mut ExplorerSession<B>,
    (width, height): (f64, f64),
    output: Output,
) -> Result<()> {
    let layout = session.layout()?;
    let bounds = GraphBounds::from_points(layout.nodes.iter().map(|n| &n.position));
    let fit_zoom = bounds.map(|b| b.fit_zoom(width, height));
    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "layout": layout,
                "bounds": bounds,
                "fit_zoom": fit_zoom,
            }))?
        );
        return Ok(());
    }
    println!(
        "{:>6} {:>10} {:>10} {:>6} {:>5}",
        "id".bold(),
        "x".bold(),
        "y".bold(),
        "branch".bold(),
        "depth".bold()
    );
    for node in &layout.nodes {
        println!(
            "{:>6} {:>10.1} {:>10.1} {:>6} {:>5}",
            node.id,
            node.position.x,
            node.position.y,
            branch_label(node.branch),
            node.depth
        );
    }
    if let (Some(bounds), Some(zoom)) = (bounds, fit_zoom) {
        println!(
            "{}",
            format!(
                "extent {:.0} x {:.0}, fit zoom {zoom:.2} for {width:.0} x {height:.0}",
                bounds.width(),
                bounds.height()
            )
            .as_str()
            .dimmed()
        );
    }
    Ok(())
}

async fn visit<B: ExplorerBackend + ?Sized>(
    session: &mut ExplorerSession<B>,
    node_id: WaypointId,
    journal: Option<&str>,
    output: Output,
) -> Result<()> {
    let report = session.request_visit(node_id, journal).await?;
    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "node_id": report.node_id,
                "marked_visited": report.marked_visited,
                "attached": report.attached,
                "journal_saved": report.journal_saved,
                "error": report.error,
                "presentation": session.presentation(),
            }))?
        );
        return Ok(());
    }

    println!("{} #{}", "Visited".green().bold(), report.node_id);
    if !report.attached.is_empty() {
        println!("  new children: {:?}", report.attached);
    } else if report.marked_visited {
        println!("  {}", "no new children".dimmed());
    }
    if report.journal_saved {
        println!("  journal saved");
    }
    if let Some(err) = &report.error {
        println!("  {} {}", "error:".red().bold(), err);
    }

    let presentation = session.presentation();
    println!(
        "  selected: {:?}  pulsing: {:?}",
        presentation.selected_id, presentation.pulsing_ids
    );
    Ok(())
}

// ============================================================================
// DEMO
// ============================================================================

/// Hoboken waterfront with a handful of nearby places
fn demo_backend() -> InMemoryBackend {
    let start = GeoPoint::new(40.7440, -74.0324);
    let backend = InMemoryBackend::new();
    backend.insert_user_tree(
        1,
        "demo",
        &WaypointNode::new(1, "Hoboken Terminal", start).with_external_ref("node/1"),
    );

    let places = [
        ("node/11", "Pier A Park", 0.0018, 0.0012, "park"),
        ("node/12", "Hoboken Historical Museum", 0.0021, -0.0009, "museum"),
        ("node/13", "Elysian Cafe", -0.0012, 0.0017, "cafe"),
        ("node/14", "Sinatra Park", 0.0030, 0.0020, "park"),
        ("node/15", "Hoboken Terminal", 0.0001, 0.0001, "attraction"),
        ("node/16", "Carlo's Bakery", 0.0009, -0.0022, "shop"),
        ("node/17", "Stevens Park", 0.0035, -0.0004, "park"),
        ("node/18", "Frank Sinatra Drive", 0.0042, 0.0015, "attraction"),
    ];
    backend.add_places(places.iter().map(|(r, name, dlat, dlon, category)| {
        Place::new(*r, *name, GeoPoint::new(start.lat + dlat, start.lon + dlon))
            .with_category(*category)
    }));
    backend
}

async fn run_demo(config: ExplorerConfig, output: Output) -> Result<()> {
    let backend = Arc::new(demo_backend());
    let mut session = ExplorerSession::new(backend, config);
    session.switch_user(1);
    session.refresh().await?;

    println!("{}", "== Initial tree ==".bold());
    print_tree(&mut session, output)?;

    println!("\n{}", "== Visit the root ==".bold());
    visit(&mut session, 1, Some("Starting out"), output).await?;
    print_tree(&mut session, output)?;

    let first_child = session
        .tree()
        .and_then(|t| t.children.first())
        .map(|c| c.id);
    if let Some(child) = first_child {
        session.click(child)?;
        println!("\n{}", format!("== Visit #{child} ==").as_str().bold());
        visit(&mut session, child, None, output).await?;
        print_tree(&mut session, output)?;
    }

    println!("\n{}", "== Layout ==".bold());
    print_layout(&mut session, DEMO_VIEWPORT, output)
}
