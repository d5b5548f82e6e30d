//! CAIRN CLI
//!
//! Plans deployments from a resolved project configuration: prints the
//! reduced graph, its deployment batches, dependency routes, pending
//! changes and the remote-state sources each unit needs.

#![warn(missing_docs)]
#![warn(clippy::all)]

use cairn_config::{DeploymentType, ProjectConfig};
use cairn_plan::{Edge, Graph, GraphOptions, NodeType, target_sites, to_deployment_graph};
use cairn_state::{ChangeDetector, DetectorConfig, FsHashStore, RemoteStateLink, Router, StateRegistry};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(about = "CAIRN - deployment dependency-graph planner", long_about = None)]
struct Cli {
    /// Resolved project configuration (JSON)
    #[arg(short, long, global = true, default_value = "cairn.json")]
    config: PathBuf,

    /// Granularity replacing the project's global default
    #[arg(long, global = true)]
    deployment: Option<DeploymentType>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the reduced deployment graph and its batches
    Plan {
        /// Only target this site
        #[arg(short, long)]
        site: Option<String>,
        /// Maximum units deployed concurrently within a batch
        #[arg(short, long, default_value_t = 4)]
        workers: usize,
    },
    /// List dependency routes between two units
    Routes {
        /// Path of the dependent unit
        #[arg(long)]
        source: String,
        /// Path of the unit depended on
        #[arg(long)]
        target: String,
    },
    /// List units whose configuration changed since the last record
    Changes {
        /// Hash store file
        #[arg(long, default_value = ".cairn/hashes.json")]
        hashes: PathBuf,
        /// Only consider this site
        #[arg(short, long)]
        site: Option<String>,
        /// Record current hashes after listing
        #[arg(long)]
        record: bool,
        /// Lookup timeout in milliseconds
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },
    /// Render the remote-state data sources a unit needs
    RemoteState {
        /// Path of the unit
        #[arg(long)]
        node: String,
        /// Directory holding local state
        #[arg(long, default_value = ".cairn/state")]
        state_dir: String,
    },
}

#[derive(Debug, Serialize)]
struct VertexReport {
    path: String,
    node_type: NodeType,
    state_key: String,
    targeted: bool,
    nested: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PlanReport {
    vertices: Vec<VertexReport>,
    edges: Vec<Edge>,
    waves: Vec<Vec<String>>,
}

fn load_config(path: &Path) -> Result<ProjectConfig> {
    let bytes = std::fs::read(path).wrap_err_with(|| format!("reading {}", path.display()))?;
    let cfg = serde_json::from_slice(&bytes).wrap_err_with(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}

fn build_graph(cli: &Cli) -> Result<Graph> {
    let cfg = load_config(&cli.config)?;
    let mut options = GraphOptions::default();
    if let Some(deployment) = cli.deployment {
        options = options.with_deployment(deployment);
    }
    Ok(to_deployment_graph(&cfg, &options)?)
}

/// Split each topological batch into waves of at most `workers` units.
///
/// Only the root and targeted units are scheduled.
fn waves(graph: &Graph, workers: usize) -> Vec<Vec<String>> {
    let workers = workers.max(1);
    let root = graph.root().map(|node| node.path());
    let targeted = graph.targeted_paths();
    graph
        .batches()
        .into_iter()
        .map(|batch| {
            batch
                .into_iter()
                .filter(|path| Some(path) == root || targeted.contains(path))
                .collect::<Vec<_>>()
        })
        .filter(|batch| !batch.is_empty())
        .flat_map(|batch| {
            batch
                .chunks(workers)
                .map(|chunk| chunk.iter().map(ToString::to_string).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn plan_report(graph: &Graph, workers: usize) -> PlanReport {
    let targeted = graph.targeted_paths();
    PlanReport {
        vertices: graph
            .vertices()
            .map(|node| VertexReport {
                path: node.path().to_string(),
                node_type: node.node_type(),
                state_key: node.state_key().to_string(),
                targeted: targeted.contains(node.path()),
                nested: node
                    .as_site()
                    .map(|s| s.nested_component_names().into_iter().map(String::from).collect())
                    .unwrap_or_default(),
            })
            .collect(),
        edges: graph.edges(),
        waves: waves(graph, workers),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn plan(cli: &Cli, site: Option<&str>, workers: usize) -> Result<()> {
    let mut graph = build_graph(cli)?;
    target_sites(&mut graph, site)?;
    let report = plan_report(&graph, workers);

    if cli.json {
        return print_json(&report);
    }

    println!("Units:");
    for vertex in &report.vertices {
        let marker = if vertex.targeted { "*" } else { " " };
        println!("  {} {} ({})", marker, vertex.path, vertex.node_type);
        for nested in &vertex.nested {
            println!("        + {}", nested);
        }
    }
    println!("Waves:");
    for (i, wave) in report.waves.iter().enumerate() {
        println!("  {}: {}", i + 1, wave.join(", "));
    }
    Ok(())
}

fn route_list(cli: &Cli, source: &str, target: &str) -> Result<Vec<Vec<String>>> {
    let graph = build_graph(cli)?;
    Ok(graph
        .routes(source, target)?
        .into_iter()
        .map(|route| route.iter().map(ToString::to_string).collect())
        .collect())
}

fn routes(cli: &Cli, source: &str, target: &str) -> Result<()> {
    let routes = route_list(cli, source, target)?;

    if cli.json {
        return print_json(&routes);
    }
    if routes.is_empty() {
        println!("no route from {} to {}", source, target);
    }
    for route in routes {
        println!("{}", route.join(" -> "));
    }
    Ok(())
}

/// Options of a change-detection run
struct ChangeRun<'a> {
    hashes: &'a Path,
    site: Option<&'a str>,
    record: bool,
    timeout_ms: u64,
}

/// List changed units, then record hashes for the units in scope.
///
/// With a site filter only the targeted sites and their descendants are
/// reported and recorded; stored hashes for every other unit stay as they
/// were so their pending edits are still detected.
async fn detect_changes(cli: &Cli, run: &ChangeRun<'_>, cancel: &CancellationToken) -> Result<Vec<String>> {
    let mut graph = build_graph(cli)?;
    target_sites(&mut graph, run.site)?;

    if let Some(dir) = run.hashes.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let store = FsHashStore::open(run.hashes).await?;
    let detector = ChangeDetector::new(Arc::new(store), DetectorConfig::new().with_timeout(run.timeout_ms));

    let targeted = graph.targeted_paths();
    let changed: Vec<String> = detector
        .changed_nodes(&graph, cancel)
        .await?
        .into_iter()
        .filter(|path| run.site.is_none() || targeted.contains(path))
        .map(|path| path.to_string())
        .collect();

    if run.record {
        let recorded = match run.site {
            Some(_) => detector.record_paths(&graph, &targeted).await?,
            None => detector.record(&graph).await?,
        };
        info!(recorded, store = %run.hashes.display(), "recorded hashes");
    }
    Ok(changed)
}

async fn changes(cli: &Cli, run: &ChangeRun<'_>) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let changed = detect_changes(cli, run, &cancel).await?;

    if cli.json {
        return print_json(&changed);
    }
    if changed.is_empty() {
        println!("no changes");
    }
    for path in &changed {
        println!("{}", path);
    }
    Ok(())
}

fn remote_state_links(cli: &Cli, node: &str, state_dir: &str) -> Result<Vec<RemoteStateLink>> {
    let graph = build_graph(cli)?;
    let registry = StateRegistry::local_for(&graph, state_dir);
    Ok(Router::new(&graph, &registry).links(node)?)
}

fn remote_state(cli: &Cli, node: &str, state_dir: &str) -> Result<()> {
    let links = remote_state_links(cli, node, state_dir)?;

    if cli.json {
        return print_json(&links);
    }
    if links.is_empty() {
        println!("{} reads no remote state", node);
    }
    for link in links {
        println!("# {} from {}", link.component, link.owner);
        println!("{}", link.remote_state);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Plan { site, workers } => plan(&cli, site.as_deref(), *workers),
        Commands::Routes { source, target } => routes(&cli, source, target),
        Commands::Changes {
            hashes,
            site,
            record,
            timeout_ms,
        } => {
            let run = ChangeRun {
                hashes,
                site: site.as_deref(),
                record: *record,
                timeout_ms: *timeout_ms,
            };
            changes(&cli, &run).await
        }
        Commands::RemoteState { node, state_dir } => remote_state(&cli, node, state_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_config::{ComponentConfig, SiteComponentConfig, SiteConfig, Variable, VariablesMap};
    use cairn_state::HashStore;
    use clap::CommandFactory;

    fn write_config(dir: &Path) -> PathBuf {
        let cfg = ProjectConfig::new("main")
            .with_component(ComponentConfig::new("a", "./a", "1"))
            .with_site(SiteConfig::new("site-1").with_component(SiteComponentConfig::new("a")))
            .with_site(SiteConfig::new("site-2").with_component(SiteComponentConfig::new("a")));
        let path = dir.join("cairn.json");
        std::fs::write(&path, serde_json::to_vec(&cfg).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan_flags() {
        let cli = Cli::try_parse_from([
            "cairn", "--config", "x.json", "--deployment", "site-component", "plan", "--site", "site-1",
        ])
        .unwrap();
        assert_eq!(cli.deployment, Some(DeploymentType::SiteComponent));
        assert!(matches!(cli.command, Commands::Plan { site: Some(ref s), workers: 4 } if s == "site-1"));
    }

    #[test]
    fn test_plan_report_targets_and_waves() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&write_config(dir.path())).unwrap();
        let mut graph = to_deployment_graph(&cfg, &GraphOptions::default()).unwrap();
        target_sites(&mut graph, Some("site-2")).unwrap();

        let report = plan_report(&graph, 1);
        assert_eq!(report.vertices.len(), 3);
        assert!(report.vertices[2].targeted);
        assert!(!report.vertices[1].targeted);
        assert_eq!(report.vertices[1].nested, vec!["a"]);
        assert_eq!(report.waves, vec![vec!["main"], vec!["main/site-2"]]);
    }

    #[test]
    fn test_waves_without_filter_chunk_by_workers() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&write_config(dir.path())).unwrap();
        let mut graph = to_deployment_graph(&cfg, &GraphOptions::default()).unwrap();
        target_sites(&mut graph, None).unwrap();

        assert_eq!(waves(&graph, 4), vec![vec!["main"], vec!["main/site-1", "main/site-2"]]);
        assert_eq!(
            waves(&graph, 1),
            vec![vec!["main"], vec!["main/site-1"], vec!["main/site-2"]]
        );
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    fn run<'a>(hashes: &'a Path, site: Option<&'a str>, record: bool) -> ChangeRun<'a> {
        ChangeRun {
            hashes,
            site,
            record,
            timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn test_changes_first_run_then_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let hashes = dir.path().join(".cairn").join("hashes.json");
        let cli = parse(&["cairn", "--config", config.to_str().unwrap(), "changes"]);
        let cancel = CancellationToken::new();

        let changed = detect_changes(&cli, &run(&hashes, None, false), &cancel).await.unwrap();
        assert_eq!(changed, vec!["main", "main/site-1", "main/site-2"]);

        detect_changes(&cli, &run(&hashes, None, true), &cancel).await.unwrap();
        assert!(hashes.exists());
        assert!(detect_changes(&cli, &run(&hashes, None, false), &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changes_site_filter_only_reports_targeted() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let hashes = dir.path().join("hashes.json");
        let cli = parse(&["cairn", "--config", config.to_str().unwrap(), "changes"]);
        let cancel = CancellationToken::new();

        let changed = detect_changes(&cli, &run(&hashes, Some("site-2"), false), &cancel).await.unwrap();
        assert_eq!(changed, vec!["main/site-2"]);

        let err = detect_changes(&cli, &run(&hashes, Some("site-9"), false), &cancel).await.unwrap_err();
        assert!(err.to_string().contains("site-9"));
    }

    #[tokio::test]
    async fn test_site_record_keeps_other_sites_pending() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let hashes = dir.path().join("hashes.json");
        let cli = parse(&["cairn", "--config", config.to_str().unwrap(), "changes"]);
        let cancel = CancellationToken::new();
        detect_changes(&cli, &run(&hashes, None, true), &cancel).await.unwrap();

        let mut cfg = load_config(&config).unwrap();
        cfg.sites[1].components[0]
            .variables
            .insert("replicas", Variable::scalar("3"));
        std::fs::write(&config, serde_json::to_vec(&cfg).unwrap()).unwrap();

        let changed = detect_changes(&cli, &run(&hashes, Some("site-1"), true), &cancel).await.unwrap();
        assert!(changed.is_empty());

        let graph = build_graph(&cli).unwrap();
        let current = graph.vertex("main/site-2").unwrap().hash().unwrap();
        let store = FsHashStore::open(&hashes).await.unwrap();
        assert_ne!(store.fetch("main/site-2").await.unwrap(), Some(current));

        let changed = detect_changes(&cli, &run(&hashes, None, false), &cancel).await.unwrap();
        assert_eq!(changed, vec!["main/site-2"]);
    }

    #[test]
    fn test_route_list() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let cli = parse(&["cairn", "--config", config.to_str().unwrap(), "routes", "--source", "x", "--target", "y"]);

        assert_eq!(
            route_list(&cli, "main/site-1", "main").unwrap(),
            vec![vec!["main/site-1", "main"]]
        );
        assert!(route_list(&cli, "main", "main/site-1").unwrap().is_empty());
        assert!(route_list(&cli, "main/site-9", "main").is_err());
    }

    fn reference(component: &str, output: &str) -> VariablesMap {
        let mut variables = VariablesMap::new();
        variables.insert(
            "upstream",
            Variable::scalar(format!("${{component.{}.{}}}", component, output)),
        );
        variables
    }

    fn write_linked_config(dir: &Path) -> PathBuf {
        let cfg = ProjectConfig::new("main")
            .with_component(ComponentConfig::new("api", "./api", "1"))
            .with_component(ComponentConfig::new("cache", "./cache", "1"))
            .with_component(ComponentConfig::new("db", "./db", "1"))
            .with_component(ComponentConfig::new("web", "./web", "1"))
            .with_site(
                SiteConfig::new("site-1")
                    .with_component(SiteComponentConfig::new("cache"))
                    .with_component(SiteComponentConfig::new("web").with_variables(reference("cache", "host")))
                    .with_component(
                        SiteComponentConfig::new("api")
                            .with_deployment(DeploymentType::SiteComponent)
                            .with_variables(reference("db", "endpoint")),
                    ),
            )
            .with_site(SiteConfig::new("site-2").with_component(SiteComponentConfig::new("db")));
        let path = dir.join("cairn.json");
        std::fs::write(&path, serde_json::to_vec(&cfg).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_remote_state_elides_folded_components() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_linked_config(dir.path());
        let cli = parse(&["cairn", "--config", config.to_str().unwrap(), "remote-state", "--node", "main/site-1"]);

        assert!(remote_state_links(&cli, "main/site-1", "./state").unwrap().is_empty());
    }

    #[test]
    fn test_remote_state_cross_site() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_linked_config(dir.path());
        let cli = parse(&["cairn", "--config", config.to_str().unwrap(), "remote-state", "--node", "main/site-1/api"]);

        let links = remote_state_links(&cli, "main/site-1/api", "/var/lib/cairn").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].component, "db");
        assert_eq!(links[0].owner.as_str(), "main/site-2");
        assert_eq!(links[0].state_key, "site-2");
        assert!(links[0].remote_state.contains("\"site_2\""));
        assert!(links[0].remote_state.contains("/var/lib/cairn"));
    }
}
