//! Deployment topology builder.
//!
//! Turns stack parameters into a `ResourceGraph`. Construction runs leaves
//! first: static site, compute, placement, routing. Each later descriptor
//! refers to earlier ones by ID. The builder performs no I/O; existing
//! infrastructure is reached only through `ResourceLookup`.

use super::lookup::{LookupError, ResourceLookup};
use super::parser::{self, ValidationError};
use super::resolver;
use super::types::*;
use std::fmt;

pub const SOURCE_ID: &str = "site/source";
pub const APP_ID: &str = "site/app";
pub const BRANCH_ID: &str = "site/branch";
pub const DOMAIN_ID: &str = "site/domain";
pub const LOG_SINK_ID: &str = "compute/logs";
pub const TASK_ID: &str = "compute/task";
pub const CONTAINER_ID: &str = "compute/container";
pub const PORT_ID: &str = "compute/port";
pub const NETWORK_ID: &str = "placement/network";
pub const CLUSTER_ID: &str = "placement/cluster";
pub const SERVICE_ID: &str = "placement/service";
pub const TARGET_GROUP_ID: &str = "routing/target-group";
pub const LISTENER_ID: &str = "routing/listener";
pub const RULE_ID: &str = "routing/rule";

/// Why a graph could not be built.
#[derive(Debug, Clone)]
pub enum BuildError {
    Lookup(LookupError),
    Invalid(String),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lookup(e) => write!(f, "lookup failed: {}", e),
            Self::Invalid(msg) => write!(f, "invalid stack: {}", msg),
        }
    }
}

impl From<LookupError> for BuildError {
    fn from(e: LookupError) -> Self {
        Self::Lookup(e)
    }
}

impl From<String> for BuildError {
    fn from(msg: String) -> Self {
        Self::Invalid(msg)
    }
}

/// Build the full resource graph for a stack.
///
/// Parameters are validated before any lookup runs and the graph is checked
/// before it is returned; any failure aborts with no partial result.
pub fn build_graph(
    ctx: &DeployContext,
    config: &StackConfig,
    lookup: &dyn ResourceLookup,
) -> Result<ResourceGraph, BuildError> {
    let errors = parser::validate_config(config);
    if !errors.is_empty() {
        return Err(BuildError::Invalid(join_errors(&errors)));
    }

    let mut graph = ResourceGraph::new(&config.name, ctx);

    declare_static_site(&mut graph, &config.name, &config.site)?;
    declare_compute(&mut graph, &config.compute)?;
    declare_placement(&mut graph, &config.placement, lookup)?;
    declare_routing(&mut graph, &config.routing, config.compute.container.port, lookup)?;

    let errors = resolver::check_graph(&graph);
    if !errors.is_empty() {
        return Err(BuildError::Invalid(join_errors(&errors)));
    }

    Ok(graph)
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Source binding → app → branch → domain mapping.
pub fn declare_static_site(
    graph: &mut ResourceGraph,
    stack: &str,
    site: &SiteParams,
) -> Result<(), BuildError> {
    graph.insert(
        SOURCE_ID,
        Origin::Declared,
        Descriptor::SourceBinding(SourceBinding {
            owner: site.owner.clone(),
            repository: site.repository.clone(),
            token: SecretRef {
                parameter: site.token_parameter.clone(),
            },
        }),
    )?;
    graph.insert(
        APP_ID,
        Origin::Declared,
        Descriptor::StaticApp(StaticApp {
            name: format!("{}-site", stack),
            source: SOURCE_ID.to_string(),
            build: site.build.clone(),
        }),
    )?;
    graph.insert(
        BRANCH_ID,
        Origin::Declared,
        Descriptor::Branch(Branch {
            app: APP_ID.to_string(),
            name: site.branch.clone(),
        }),
    )?;
    graph.insert(
        DOMAIN_ID,
        Origin::Declared,
        Descriptor::DomainMapping(DomainMapping {
            app: APP_ID.to_string(),
            domain: site.domain.clone(),
            subdomain: site.subdomain.clone(),
            branch: BRANCH_ID.to_string(),
        }),
    )?;
    Ok(())
}

/// Log sink, task definition, its single container and port mapping.
pub fn declare_compute(graph: &mut ResourceGraph, compute: &ComputeParams) -> Result<(), BuildError> {
    graph.insert(
        LOG_SINK_ID,
        Origin::Declared,
        Descriptor::LogSink(LogSink {
            name: compute.logs.group.clone(),
            retention_days: compute.logs.retention_days,
        }),
    )?;
    graph.insert(
        TASK_ID,
        Origin::Declared,
        Descriptor::TaskDefinition(TaskDefinition {
            family: compute.family.clone(),
            cpu: compute.cpu,
            memory_mib: compute.memory_mib,
            compatibility: compute.compatibility,
        }),
    )?;
    let container = &compute.container;
    graph.insert(
        CONTAINER_ID,
        Origin::Declared,
        Descriptor::Container(Container {
            task_definition: TASK_ID.to_string(),
            name: container.name.clone(),
            image: container.image.clone(),
            environment: container.environment.clone(),
            log_sink: LOG_SINK_ID.to_string(),
        }),
    )?;
    graph.insert(
        PORT_ID,
        Origin::Declared,
        Descriptor::PortMapping(PortMapping {
            container: CONTAINER_ID.to_string(),
            container_port: container.port,
            protocol: "tcp".to_string(),
        }),
    )?;
    Ok(())
}

/// Bind to the existing network and cluster, then declare the service.
pub fn declare_placement(
    graph: &mut ResourceGraph,
    placement: &PlacementParams,
    lookup: &dyn ResourceLookup,
) -> Result<(), BuildError> {
    let network = lookup.network(&placement.network)?;
    let cluster = lookup.cluster(
        &placement.cluster,
        &network,
        &placement.cluster_security_groups,
    )?;

    graph.insert(
        NETWORK_ID,
        Origin::Lookup,
        Descriptor::Network(Network {
            name: placement.network.clone(),
            id: network.id,
        }),
    )?;
    graph.insert(
        CLUSTER_ID,
        Origin::Lookup,
        Descriptor::Cluster(Cluster {
            name: placement.cluster.clone(),
            arn: cluster.arn,
            network: NETWORK_ID.to_string(),
            security_groups: cluster.security_groups,
        }),
    )?;
    graph.insert(
        SERVICE_ID,
        Origin::Declared,
        Descriptor::Service(Service {
            name: placement.service.clone(),
            cluster: CLUSTER_ID.to_string(),
            task_definition: TASK_ID.to_string(),
            desired_count: placement.desired_count,
            assign_public_ip: placement.assign_public_ip,
        }),
    )?;
    Ok(())
}

/// Target group on the container port, existing listener, host-header rule.
pub fn declare_routing(
    graph: &mut ResourceGraph,
    routing: &RoutingParams,
    port: u16,
    lookup: &dyn ResourceLookup,
) -> Result<(), BuildError> {
    graph.insert(
        TARGET_GROUP_ID,
        Origin::Declared,
        Descriptor::TargetGroup(TargetGroup {
            name: routing.target_group.clone(),
            network: NETWORK_ID.to_string(),
            port,
            protocol: routing.protocol,
            health_check: routing.health_check.clone(),
            targets: vec![SERVICE_ID.to_string()],
        }),
    )?;

    let listener = lookup.listener(routing.listener.protocol, &routing.listener.tag)?;
    graph.insert(
        LISTENER_ID,
        Origin::Lookup,
        Descriptor::Listener(Listener {
            arn: listener.arn,
            protocol: routing.listener.protocol,
            tag: routing.listener.tag.clone(),
        }),
    )?;

    // Host header is matched verbatim.
    graph.insert(
        RULE_ID,
        Origin::Declared,
        Descriptor::RoutingRule(RoutingRule {
            listener: LISTENER_ID.to_string(),
            priority: routing.priority,
            host_headers: vec![routing.host_header.clone()],
            target_group: TARGET_GROUP_ID.to_string(),
        }),
    )?;
    Ok(())
}
