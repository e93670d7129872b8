//! Graph checks and dependency ordering.
//!
//! `check_graph` enforces the structural invariants a deployment needs:
//! resolvable references, unique names per kind, unique rule priorities per
//! listener, one container per task definition, and matching container and
//! target group ports. `execution_order` computes a topological order using
//! Kahn's algorithm with deterministic (alphabetical) tie-breaking.

use super::parser::ValidationError;
use super::types::*;
use std::collections::{HashMap, HashSet, VecDeque};

/// Check structural invariants. Returns a list of errors (empty = valid).
pub fn check_graph(graph: &ResourceGraph) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_references(graph, &mut errors);
    check_unique_names(graph, &mut errors);
    check_rule_priorities(graph, &mut errors);
    check_containers(graph, &mut errors);
    check_ports(graph, &mut errors);

    errors
}

fn check_references(graph: &ResourceGraph, errors: &mut Vec<ValidationError>) {
    for (id, node) in &graph.nodes {
        for dep in &node.depends_on {
            if dep == id {
                errors.push(ValidationError {
                    message: format!("resource '{}' refers to itself", id),
                });
            } else if !graph.nodes.contains_key(dep) {
                errors.push(ValidationError {
                    message: format!("resource '{}' refers to unknown resource '{}'", id, dep),
                });
            }
        }
    }
}

fn check_unique_names(graph: &ResourceGraph, errors: &mut Vec<ValidationError>) {
    let mut seen: HashMap<(ResourceKind, String), &str> = HashMap::new();
    for (id, node) in &graph.nodes {
        let Some(name) = node.descriptor.unique_name() else {
            continue;
        };
        let kind = node.descriptor.kind();
        if let Some(first) = seen.insert((kind, name.clone()), id) {
            errors.push(ValidationError {
                message: format!(
                    "{} name '{}' is used by both '{}' and '{}'",
                    kind, name, first, id
                ),
            });
        }
    }
}

fn check_rule_priorities(graph: &ResourceGraph, errors: &mut Vec<ValidationError>) {
    let mut seen: HashMap<(&str, u32), &str> = HashMap::new();
    for (id, node) in graph.of_kind(ResourceKind::RoutingRule) {
        if let Descriptor::RoutingRule(rule) = &node.descriptor {
            if let Some(first) = seen.insert((rule.listener.as_str(), rule.priority), id) {
                errors.push(ValidationError {
                    message: format!(
                        "rules '{}' and '{}' share priority {} on listener '{}'",
                        first, id, rule.priority, rule.listener
                    ),
                });
            }
        }
    }
}

fn check_containers(graph: &ResourceGraph, errors: &mut Vec<ValidationError>) {
    for (task_id, _) in graph.of_kind(ResourceKind::TaskDefinition) {
        let count = containers_of(graph, task_id).len();
        if count != 1 {
            errors.push(ValidationError {
                message: format!(
                    "task definition '{}' has {} containers, expected exactly 1",
                    task_id, count
                ),
            });
        }
    }
}

/// Every port mapping of a container in a targeted service's task must
/// use the target group's port.
fn check_ports(graph: &ResourceGraph, errors: &mut Vec<ValidationError>) {
    for (tg_id, node) in graph.of_kind(ResourceKind::TargetGroup) {
        let Descriptor::TargetGroup(tg) = &node.descriptor else {
            continue;
        };
        for target in &tg.targets {
            let Some(Descriptor::Service(service)) = graph.get(target) else {
                continue;
            };
            for container_id in containers_of(graph, &service.task_definition) {
                for port in ports_of(graph, container_id) {
                    if port != tg.port {
                        errors.push(ValidationError {
                            message: format!(
                                "container '{}' maps port {} but target group '{}' serves port {}",
                                container_id, port, tg_id, tg.port
                            ),
                        });
                    }
                }
            }
        }
    }
}

fn containers_of<'a>(graph: &'a ResourceGraph, task_id: &str) -> Vec<&'a str> {
    graph
        .of_kind(ResourceKind::Container)
        .filter_map(|(id, n)| match &n.descriptor {
            Descriptor::Container(c) if c.task_definition == task_id => Some(id.as_str()),
            _ => None,
        })
        .collect()
}

fn ports_of(graph: &ResourceGraph, container_id: &str) -> Vec<u16> {
    graph
        .of_kind(ResourceKind::PortMapping)
        .filter_map(|(_, n)| match &n.descriptor {
            Descriptor::PortMapping(p) if p.container == container_id => Some(p.container_port),
            _ => None,
        })
        .collect()
}

/// Build a topological order from resource references.
/// Uses Kahn's algorithm with alphabetical tie-breaking for determinism.
pub fn execution_order(graph: &ResourceGraph) -> Result<Vec<String>, String> {
    let resource_ids: Vec<String> = graph.nodes.keys().cloned().collect();
    let mut in_degree: HashMap<String, usize> = HashMap::new();
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for id in &resource_ids {
        in_degree.insert(id.clone(), 0);
        adjacency.insert(id.clone(), Vec::new());
    }

    for (id, node) in &graph.nodes {
        for dep in &node.depends_on {
            let Some(dependents) = adjacency.get_mut(dep) else {
                return Err(format!("resource '{}' refers to unknown '{}'", id, dep));
            };
            dependents.push(id.clone());
            if let Some(degree) = in_degree.get_mut(id) {
                *degree += 1;
            }
        }
    }

    let mut zero_degree: Vec<String> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(id, _)| id.clone())
        .collect();
    zero_degree.sort();
    let mut queue: VecDeque<String> = zero_degree.into();

    let mut order = Vec::new();
    while let Some(current) = queue.pop_front() {
        let mut next_ready: Vec<String> = Vec::new();
        if let Some(neighbors) = adjacency.get(&current) {
            for neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        next_ready.push(neighbor.clone());
                    }
                }
            }
        }
        order.push(current);
        next_ready.sort();
        queue.extend(next_ready);
    }

    if order.len() != resource_ids.len() {
        let ordered: HashSet<&String> = order.iter().collect();
        let mut cycle_members: Vec<&str> = resource_ids
            .iter()
            .filter(|id| !ordered.contains(id))
            .map(String::as_str)
            .collect();
        cycle_members.sort();
        return Err(format!(
            "dependency cycle detected involving: {}",
            cycle_members.join(", ")
        ));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::{self, *};
    use crate::core::lookup::parse_inventory;
    use crate::core::parser::parse_config;
    use crate::core::scaffold;

    fn reference_graph() -> ResourceGraph {
        let config = parse_config(scaffold::STACK_YAML).unwrap();
        let inv = parse_inventory(scaffold::INVENTORY_YAML).unwrap();
        builder::build_graph(&config.context, &config, &inv).unwrap()
    }

    fn sink(name: &str) -> Descriptor {
        Descriptor::LogSink(LogSink {
            name: name.to_string(),
            retention_days: None,
        })
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|x| x == id).unwrap()
    }

    #[test]
    fn test_reference_graph_clean() {
        let errors = check_graph(&reference_graph());
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_order_respects_references() {
        let graph = reference_graph();
        let order = execution_order(&graph).unwrap();
        assert_eq!(order.len(), graph.nodes.len());
        for (id, node) in &graph.nodes {
            for dep in &node.depends_on {
                assert!(position(&order, dep) < position(&order, id), "{} before {}", dep, id);
            }
        }
        assert!(position(&order, NETWORK_ID) < position(&order, CLUSTER_ID));
        assert!(position(&order, CLUSTER_ID) < position(&order, SERVICE_ID));
        assert!(position(&order, SERVICE_ID) < position(&order, TARGET_GROUP_ID));
        assert_eq!(order.last().map(String::as_str), Some(RULE_ID));
    }

    #[test]
    fn test_order_alphabetical_ties() {
        let graph = reference_graph();
        let order = execution_order(&graph).unwrap();
        // Roots, sorted
        assert_eq!(
            &order[..5],
            &[
                "compute/logs",
                "compute/task",
                "placement/network",
                "routing/listener",
                "site/source"
            ]
        );
    }

    #[test]
    fn test_order_deterministic() {
        let graph = reference_graph();
        assert_eq!(execution_order(&graph).unwrap(), execution_order(&graph).unwrap());
    }

    #[test]
    fn test_dangling_reference() {
        let mut graph = reference_graph();
        graph
            .insert(
                "extra/rule",
                Origin::Declared,
                Descriptor::RoutingRule(RoutingRule {
                    listener: "ghost".to_string(),
                    priority: 2,
                    host_headers: vec!["x.example.com".to_string()],
                    target_group: TARGET_GROUP_ID.to_string(),
                }),
            )
            .unwrap();
        let errors = check_graph(&graph);
        assert!(errors.iter().any(|e| e.message.contains("unknown resource 'ghost'")));
        assert!(execution_order(&graph).is_err());
    }

    #[test]
    fn test_duplicate_priority_on_listener() {
        let mut graph = reference_graph();
        graph
            .insert(
                "extra/rule",
                Origin::Declared,
                Descriptor::RoutingRule(RoutingRule {
                    listener: LISTENER_ID.to_string(),
                    priority: 1,
                    host_headers: vec!["other.example.com".to_string()],
                    target_group: TARGET_GROUP_ID.to_string(),
                }),
            )
            .unwrap();
        let errors = check_graph(&graph);
        assert!(errors.iter().any(|e| e.message.contains("share priority 1")));
    }

    #[test]
    fn test_duplicate_name_within_kind() {
        let mut graph = reference_graph();
        graph
            .insert("extra/logs", Origin::Declared, sink("thrustin-logs"))
            .unwrap();
        let errors = check_graph(&graph);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("log_sink name 'thrustin-logs'")));
    }

    #[test]
    fn test_same_name_different_kind_allowed() {
        let mut graph = reference_graph();
        // Log sink named like the task family: different scope.
        graph
            .insert("extra/logs", Origin::Declared, sink("thrustin-task"))
            .unwrap();
        assert!(check_graph(&graph).is_empty());
    }

    #[test]
    fn test_second_container_rejected() {
        let mut graph = reference_graph();
        graph
            .insert(
                "compute/sidecar",
                Origin::Declared,
                Descriptor::Container(Container {
                    task_definition: TASK_ID.to_string(),
                    name: "sidecar".to_string(),
                    image: "busybox".to_string(),
                    environment: Default::default(),
                    log_sink: LOG_SINK_ID.to_string(),
                }),
            )
            .unwrap();
        let errors = check_graph(&graph);
        assert!(errors.iter().any(|e| e.message.contains("has 2 containers")));
    }

    #[test]
    fn test_port_mismatch() {
        let mut graph = reference_graph();
        if let Some(node) = graph.nodes.get_mut(PORT_ID) {
            node.descriptor = Descriptor::PortMapping(PortMapping {
                container: CONTAINER_ID.to_string(),
                container_port: 8080,
                protocol: "tcp".to_string(),
            });
        }
        let errors = check_graph(&graph);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("maps port 8080 but target group")));
    }

    #[test]
    fn test_cycle() {
        let ctx = DeployContext {
            account: "1".to_string(),
            region: "r".to_string(),
        };
        let mut graph = ResourceGraph::new("cyclic", &ctx);
        graph
            .insert(
                "a",
                Origin::Declared,
                Descriptor::Branch(Branch {
                    app: "b".to_string(),
                    name: "main".to_string(),
                }),
            )
            .unwrap();
        graph
            .insert(
                "b",
                Origin::Declared,
                Descriptor::Branch(Branch {
                    app: "a".to_string(),
                    name: "main".to_string(),
                }),
            )
            .unwrap();
        let err = execution_order(&graph).unwrap_err();
        assert!(err.contains("cycle"));
        assert!(err.contains("a, b"));
    }

    #[test]
    fn test_self_reference() {
        let ctx = DeployContext {
            account: "1".to_string(),
            region: "r".to_string(),
        };
        let mut graph = ResourceGraph::new("selfish", &ctx);
        graph
            .insert(
                "a",
                Origin::Declared,
                Descriptor::Branch(Branch {
                    app: "a".to_string(),
                    name: "main".to_string(),
                }),
            )
            .unwrap();
        let errors = check_graph(&graph);
        assert!(errors.iter().any(|e| e.message.contains("refers to itself")));
    }
}
