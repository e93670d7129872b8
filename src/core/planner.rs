//! Plan generation — diff a freshly built graph against the synth lock.

use super::types::*;
use crate::tripwire::hasher;

/// Compare the graph to the last synthesized lock.
///
/// Looked-up resources are always `Read`; they are never created or
/// destroyed by this stack.
pub fn plan(
    graph: &ResourceGraph,
    execution_order: &[String],
    lock: Option<&SynthLock>,
) -> Result<SynthPlan, String> {
    let mut changes = Vec::new();
    let mut to_create = 0u32;
    let mut to_update = 0u32;
    let mut to_destroy = 0u32;
    let mut unchanged = 0u32;
    let mut to_read = 0u32;

    for resource_id in execution_order {
        let Some(node) = graph.nodes.get(resource_id) else {
            continue;
        };
        let action = determine_action(resource_id, node, lock)?;
        let description = describe_action(resource_id, &node.descriptor, &action);

        match action {
            PlanAction::Create => to_create += 1,
            PlanAction::Update => to_update += 1,
            PlanAction::Destroy => to_destroy += 1,
            PlanAction::NoOp => unchanged += 1,
            PlanAction::Read => to_read += 1,
        }

        changes.push(PlannedChange {
            resource_id: resource_id.clone(),
            kind: node.descriptor.kind(),
            action,
            description,
        });
    }

    // Declared in the last synth, gone now.
    if let Some(lock) = lock {
        for (id, rl) in &lock.resources {
            if graph.nodes.contains_key(id) || rl.origin == Origin::Lookup {
                continue;
            }
            to_destroy += 1;
            changes.push(PlannedChange {
                resource_id: id.clone(),
                kind: rl.kind,
                action: PlanAction::Destroy,
                description: format!("{}: destroy {}", id, rl.kind),
            });
        }
    }

    Ok(SynthPlan {
        name: graph.name.clone(),
        changes,
        execution_order: execution_order.to_vec(),
        to_create,
        to_update,
        to_destroy,
        unchanged,
        to_read,
    })
}

fn determine_action(
    resource_id: &str,
    node: &Node,
    lock: Option<&SynthLock>,
) -> Result<PlanAction, String> {
    if node.origin == Origin::Lookup {
        return Ok(PlanAction::Read);
    }
    let Some(rl) = lock.and_then(|l| l.resources.get(resource_id)) else {
        return Ok(PlanAction::Create);
    };
    if rl.hash == hasher::hash_node(node)? {
        Ok(PlanAction::NoOp)
    } else {
        Ok(PlanAction::Update)
    }
}

/// Generate a human-readable description of a planned action.
fn describe_action(resource_id: &str, descriptor: &Descriptor, action: &PlanAction) -> String {
    match action {
        PlanAction::Create => match descriptor {
            Descriptor::DomainMapping(d) => format!("{}: map {}", resource_id, d.fqdn()),
            Descriptor::Container(c) => format!("{}: run {} ({})", resource_id, c.name, c.image),
            Descriptor::PortMapping(p) => {
                format!("{}: expose {}/{}", resource_id, p.container_port, p.protocol)
            }
            Descriptor::Service(s) => {
                format!("{}: create {} x{}", resource_id, s.name, s.desired_count)
            }
            Descriptor::RoutingRule(r) => format!(
                "{}: route {} (priority {})",
                resource_id,
                r.host_headers.join(", "),
                r.priority
            ),
            other => match other.unique_name() {
                Some(name) => format!("{}: create {} {}", resource_id, other.kind(), name),
                None => format!("{}: create {}", resource_id, other.kind()),
            },
        },
        PlanAction::Update => format!("{}: update (descriptor changed)", resource_id),
        PlanAction::Destroy => format!("{}: destroy", resource_id),
        PlanAction::NoOp => format!("{}: no changes", resource_id),
        PlanAction::Read => match descriptor.handle() {
            Some(handle) => format!("{}: use existing {}", resource_id, handle),
            None => format!("{}: use existing", resource_id),
        },
    }
}
