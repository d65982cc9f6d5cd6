//! assetdeps CLI - asset dependency queries for sidecar-identified projects.
//!
//! Usage:
//!   assetdeps scan                   # Scan and persist the graph inputs
//!   assetdeps scan --dry-run         # Count what a scan would read
//!   assetdeps depends <from> <to>    # Reachability query
//!   assetdeps size <path>            # Recursive size
//!   assetdeps tree [path] -d 3       # Folder hierarchy
//!   assetdeps report                 # Static analysis findings

use anyhow::{bail, Context, Result};
use assetdeps::cli::{resolve_node, tree, Cli, Commands, NodeSummary, ProjectLayout};
use assetdeps::config::ScanConfig;
use assetdeps::context::{AssetGraphContext, PackageSource, ScanStatus};
use assetdeps::graph::{builder::is_project_root, scan_stats};
use assetdeps::persistence::{config_path, snapshot_path, ScanSnapshot};
use assetdeps::scanner::{CancelToken, NoLookup};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let config_file = cli.config.unwrap_or_else(|| config_path(&root));
    let config = ScanConfig::load(&config_file)
        .compile()
        .with_context(|| format!("invalid config {}", config_file.display()))?;
    let snapshot = snapshot_path(&root);

    if let Commands::Scan { dry_run } = cli.command {
        if !is_project_root(&root) {
            warn!(root = %root.display(), "no Assets directory, scanning packages only");
        }
        let layout = ProjectLayout::new(&root);

        if dry_run {
            let roots = layout.resolve()?;
            println!("{}", scan_stats(&roots, &config));
            return Ok(());
        }

        let mut context = AssetGraphContext::new();
        match context.scan_packages(&layout, &config, &NoLookup, &CancelToken::new())? {
            ScanStatus::Completed { .. } => {}
            ScanStatus::Cancelled => bail!("scan cancelled"),
        }
        context.save(&snapshot)?;

        let summary = context.report().map(|r| r.summary()).unwrap_or_default();
        let stats = context
            .graph()
            .map(|g| g.stats())
            .context("scan produced no graph")?;
        info!(snapshot = %snapshot.display(), "scan complete");
        print_json(&json!({ "graph": stats, "report": summary }))?;
        return Ok(());
    }

    if !snapshot.exists() {
        bail!("no scan found at {}; run `assetdeps scan` first", snapshot.display());
    }
    let saved = ScanSnapshot::load(&snapshot)
        .with_context(|| format!("failed to load {}", snapshot.display()))?;

    if let Commands::Report = cli.command {
        println!("{}", saved.report_json()?);
        return Ok(());
    }

    let mut context = AssetGraphContext::from_snapshot(saved);

    let (graph, graph_root) = context.root_node().context("snapshot holds no records")?;

    match cli.command {
        Commands::Stats => print_json(&graph.stats())?,

        Commands::Depends { from, to } => {
            let a = resolve_node(graph, &from)?;
            let b = resolve_node(graph, &to)?;
            print_json(&json!({
                "from": graph.path_of(a),
                "to": graph.path_of(b),
                "depends": graph.depends_on_cached(a, b),
            }))?;
        }

        Commands::Size { path } => {
            let idx = resolve_node(graph, &path)?;
            print_json(&NodeSummary::of(graph, idx))?;
        }

        Commands::Tree {
            path,
            depth,
            modules,
        } => {
            let start = match (path, modules) {
                (Some(path), _) => resolve_node(graph, &path)?,
                (None, true) => graph.module_root().context("no module definitions found")?,
                (None, false) => graph_root,
            };
            print_json(&tree(graph, start, depth))?;
        }

        Commands::Dependents { path } => {
            let target = resolve_node(graph, &path)?;
            let dependents: Vec<NodeSummary> = graph
                .dependents_of(target)
                .into_iter()
                .map(|idx| NodeSummary::of(graph, idx))
                .collect();
            print_json(&dependents)?;
        }

        Commands::Unused => {
            let unused: Vec<NodeSummary> = graph
                .unreferenced_leaves()
                .into_iter()
                .map(|idx| NodeSummary::of(graph, idx))
                .collect();
            print_json(&unused)?;
        }

        Commands::Cycles => {
            let cycles: Vec<Vec<String>> = graph
                .dependency_cycles()
                .into_iter()
                .map(|cycle| cycle.into_iter().map(|idx| graph.path_of(idx)).collect())
                .collect();
            print_json(&cycles)?;
        }

        Commands::Scan { .. } | Commands::Report => {
            // Already handled above
        }
    }

    Ok(())
}
