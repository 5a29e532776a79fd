// SPDX-License-Identifier: MIT

//! Structural validation of graph declarations
//!
//! Checks run category by category and stop at the first failing one; each
//! category reports every offender it found.

use std::collections::{HashMap, HashSet};

use super::config::{EdgeKind, GraphConfig, END, START};
use crate::adk::error::ConfigError;

pub fn validate(config: &GraphConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::MissingName);
    }

    if config.state_keys.is_empty() {
        return Err(ConfigError::MissingStateKeys);
    }

    if config.nodes.is_empty() {
        return Err(ConfigError::MissingNodes);
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for node in &config.nodes {
        *seen.entry(node.id.as_str()).or_default() += 1;
    }
    let mut duplicates: Vec<String> = seen
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    if !duplicates.is_empty() {
        duplicates.sort();
        return Err(ConfigError::DuplicateNodeIds(duplicates));
    }

    if config.edges.is_empty() {
        return Err(ConfigError::MissingEdges);
    }

    let node_ids: HashSet<&str> = config.nodes.iter().map(|n| n.id.as_str()).collect();

    let dangling: Vec<String> = config
        .edges
        .iter()
        .enumerate()
        .flat_map(|(i, edge)| {
            let mut problems = Vec::new();
            if edge.from != START && !node_ids.contains(edge.from.as_str()) {
                problems.push(format!(
                    "{}: unknown source '{}'",
                    edge.describe(i),
                    edge.from
                ));
            }
            if edge.kind == EdgeKind::Simple {
                match edge.to.as_deref() {
                    None => problems.push(format!("{}: missing target", edge.describe(i))),
                    Some(to) if to != END && !node_ids.contains(to) => problems.push(format!(
                        "{}: unknown target '{}'",
                        edge.describe(i),
                        to
                    )),
                    _ => {}
                }
            }
            problems
        })
        .collect();
    if !dangling.is_empty() {
        return Err(ConfigError::DanglingEdges(dangling));
    }

    let invalid_routes: Vec<String> = config
        .edges
        .iter()
        .enumerate()
        .filter(|(_, edge)| edge.kind == EdgeKind::Conditional)
        .flat_map(|(i, edge)| {
            if edge.routes.is_empty() {
                return vec![format!("{}: no routes declared", edge.describe(i))];
            }
            edge.routes
                .iter()
                .filter(|(_, target)| target.as_str() != END && !node_ids.contains(target.as_str()))
                .map(|(label, target)| {
                    format!(
                        "{}: route '{}' targets unknown node '{}'",
                        edge.describe(i),
                        label,
                        target
                    )
                })
                .collect()
        })
        .collect();
    if !invalid_routes.is_empty() {
        return Err(ConfigError::InvalidRoutes(invalid_routes));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::workflow::graph::config::{EdgeConfig, NodeConfig};
    use crate::ensemble::workflow::state::StateKey;

    fn valid() -> GraphConfig {
        GraphConfig::new("pipeline")
            .key(StateKey::replace("text"))
            .node(NodeConfig::new("a", "TRANSFORM_NODE"))
            .node(NodeConfig::new("b", "TRANSFORM_NODE"))
            .edge(EdgeConfig::simple(START, "a"))
            .edge(EdgeConfig::simple("a", "b"))
            .edge(EdgeConfig::conditional("b", &[("again", "a"), ("done", END)]))
    }

    #[test]
    fn test_valid_graph_passes() {
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn test_missing_name() {
        let mut config = valid();
        config.name = "  ".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::MissingName)));
    }

    #[test]
    fn test_missing_state_keys() {
        let mut config = valid();
        config.state_keys.clear();
        assert!(matches!(validate(&config), Err(ConfigError::MissingStateKeys)));
    }

    #[test]
    fn test_missing_nodes_reported_before_edges() {
        let mut config = valid();
        config.nodes.clear();
        config.edges.clear();
        assert!(matches!(validate(&config), Err(ConfigError::MissingNodes)));
    }

    #[test]
    fn test_duplicate_ids() {
        let config = valid().node(NodeConfig::new("a", "LLM_NODE"));
        match validate(&config) {
            Err(ConfigError::DuplicateNodeIds(ids)) => assert_eq!(ids, vec!["a".to_string()]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_edges() {
        let mut config = valid();
        config.edges.clear();
        assert!(matches!(validate(&config), Err(ConfigError::MissingEdges)));
    }

    #[test]
    fn test_dangling_endpoints_name_the_edge() {
        let config = valid()
            .edge(EdgeConfig::simple("a", "ghost"))
            .edge(EdgeConfig::simple("phantom", "b"));

        let err = validate(&config).unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, ConfigError::DanglingEdges(ref list) if list.len() == 2));
        assert!(text.contains("edge[3] 'a' -> 'ghost'"));
        assert!(text.contains("unknown source 'phantom'"));
    }

    #[test]
    fn test_simple_edge_needs_target() {
        let mut edge = EdgeConfig::simple("a", "b");
        edge.to = None;
        let config = valid().edge(edge);
        assert!(matches!(validate(&config), Err(ConfigError::DanglingEdges(_))));
    }

    #[test]
    fn test_end_is_not_a_source() {
        let config = valid().edge(EdgeConfig::simple(END, "a"));
        assert!(matches!(validate(&config), Err(ConfigError::DanglingEdges(_))));
    }

    #[test]
    fn test_conditional_without_routes() {
        let config = valid().edge(EdgeConfig::conditional("a", &[]));
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("no routes"));
    }

    #[test]
    fn test_conditional_route_to_unknown_node() {
        let config = valid().edge(EdgeConfig::conditional("a", &[("x", "nowhere")]));
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoutes(_)));
        assert!(err.to_string().contains("nowhere"));
    }
}
