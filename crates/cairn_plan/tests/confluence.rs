use cairn_config::{ComponentConfig, DeploymentType, ProjectConfig, SiteComponentConfig, SiteConfig};
use cairn_plan::{Graph, GraphBuilder, GraphOptions, NodeType, collapse, reduce};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
struct Scenario {
    global: DeploymentType,
    sites: Vec<Vec<Option<DeploymentType>>>,
    extra_edges: Vec<(usize, usize)>,
    order: Vec<u32>,
}

fn deployment() -> impl Strategy<Value = DeploymentType> {
    prop_oneof![
        Just(DeploymentType::Project),
        Just(DeploymentType::Site),
        Just(DeploymentType::SiteComponent),
    ]
}

fn scenario() -> impl Strategy<Value = Scenario> {
    (
        deployment(),
        prop::collection::vec(prop::collection::vec(prop::option::of(deployment()), 1..5), 1..4),
        prop::collection::vec((0usize..16, 0usize..16), 0..8),
        prop::collection::vec(any::<u32>(), 16),
    )
        .prop_map(|(global, sites, extra_edges, order)| Scenario {
            global,
            sites,
            extra_edges,
            order,
        })
}

fn config(scenario: &Scenario) -> ProjectConfig {
    let widest = scenario.sites.iter().map(Vec::len).max().unwrap_or(0);
    let mut cfg = ProjectConfig::new("main").with_deployment(scenario.global);
    for c in 0..widest {
        cfg = cfg.with_component(ComponentConfig::new(format!("c{}", c), "./modules", "1"));
    }
    for (s, components) in scenario.sites.iter().enumerate() {
        let mut site = SiteConfig::new(format!("s{}", s));
        for (c, deployment) in components.iter().enumerate() {
            let mut entry = SiteComponentConfig::new(format!("c{}", c));
            entry.deployment = *deployment;
            site = site.with_component(entry);
        }
        cfg = cfg.with_site(site);
    }
    cfg
}

/// Unreduced tree plus extra component → component edges. Edges always run
/// from an earlier to a later component so the graph stays acyclic.
fn graph(scenario: &Scenario) -> Graph {
    let options = GraphOptions::default().with_validation(false);
    let mut graph = GraphBuilder::new(options).build(&config(scenario)).unwrap();

    let components: Vec<String> = graph
        .vertices_by_type(NodeType::SiteComponent)
        .iter()
        .map(|n| n.path().to_string())
        .collect();
    for &(a, b) in &scenario.extra_edges {
        let (a, b) = (a % components.len(), b % components.len());
        if a < b {
            graph.add_edge(&components[a], &components[b]).unwrap();
        }
    }
    graph
}

type Shape = (BTreeSet<String>, BTreeSet<(String, String)>, BTreeSet<(String, String)>);

fn shape(graph: &Graph) -> Shape {
    let vertices = graph.vertices().map(|n| n.path().to_string()).collect();
    let edges = graph
        .edges()
        .into_iter()
        .map(|e| (e.source.to_string(), e.target.to_string()))
        .collect();
    let nested = graph
        .vertices()
        .filter_map(|n| n.as_site().map(|s| (n.path().to_string(), s)))
        .flat_map(|(path, s)| {
            s.nested_component_names()
                .into_iter()
                .map(move |name| (path.clone(), name.to_string()))
        })
        .collect();
    (vertices, edges, nested)
}

proptest! {
    #[test]
    fn prop_reduction_is_confluent(scenario in scenario()) {
        let mut bfs = graph(&scenario);
        reduce(&mut bfs).unwrap();

        let mut shuffled = graph(&scenario);
        let mut pending: Vec<(u32, String)> = shuffled
            .vertices()
            .filter(|n| !n.independent())
            .enumerate()
            .map(|(i, n)| (scenario.order[i % scenario.order.len()], n.path().to_string()))
            .collect();
        pending.sort();
        for (_, path) in &pending {
            prop_assert!(collapse(&mut shuffled, path).unwrap());
        }

        prop_assert_eq!(shape(&bfs), shape(&shuffled));
        prop_assert!(bfs.vertices().all(|n| n.independent()));
    }

    #[test]
    fn prop_reduction_is_idempotent(scenario in scenario()) {
        let mut graph = graph(&scenario);
        reduce(&mut graph).unwrap();
        let once = graph.clone();

        prop_assert!(reduce(&mut graph).unwrap().is_noop());
        prop_assert_eq!(graph, once);
    }
}
