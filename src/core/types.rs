//! Stack parameters, resource descriptors, the resource graph, synth lock
//! and provenance event types.
//!
//! Parameter types derive Serialize/Deserialize for YAML roundtripping.
//! Descriptors are plain immutable records; they only refer to each other by
//! resource ID.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Top-level stack.yaml
// ============================================================================

/// Root configuration: the parameters of one deployment stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Stack name, used to namespace state and template output
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Target account and region
    pub context: DeployContext,

    /// Static site hosting
    pub site: SiteParams,

    /// Task definition and container
    pub compute: ComputeParams,

    /// Network, cluster and service
    pub placement: PlacementParams,

    /// Target group and listener rule
    pub routing: RoutingParams,
}

/// Ambient deployment context, provided once per build invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployContext {
    pub account: String,
    pub region: String,
}

// ============================================================================
// Static site
// ============================================================================

/// Source repository, build instructions and domain of the static site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteParams {
    /// Repository owner
    pub owner: String,

    /// Repository name
    pub repository: String,

    /// Parameter-store name holding the repository access token
    pub token_parameter: String,

    /// Branch to deploy
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Root domain (e.g., "example.com")
    pub domain: String,

    /// Subdomain label mapped to the branch
    pub subdomain: String,

    /// Build instructions
    pub build: BuildSpec,
}

fn default_branch() -> String {
    "master".to_string()
}

/// Build instructions for the static site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Subdirectory of the repository the build runs in
    #[serde(default)]
    pub app_root: Option<String>,

    /// Build commands, run in order
    pub commands: Vec<String>,

    /// Directory holding build output
    pub artifact_dir: String,

    /// Glob patterns of published files, relative to `artifact_dir`
    #[serde(default = "default_artifact_files")]
    pub artifact_files: Vec<String>,

    /// Glob patterns cached between builds
    #[serde(default)]
    pub cache_paths: Vec<String>,
}

fn default_artifact_files() -> Vec<String> {
    vec!["**/*".to_string()]
}

// ============================================================================
// Compute
// ============================================================================

/// Task definition shape and its single container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeParams {
    /// Task definition family
    pub family: String,

    /// CPU units (1024 = one vCPU)
    pub cpu: u32,

    /// Memory in MiB
    pub memory_mib: u32,

    /// Launch compatibility
    #[serde(default)]
    pub compatibility: Compatibility,

    /// The container
    pub container: ContainerParams,

    /// Container log sink
    pub logs: LogParams,
}

/// Task launch compatibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    #[default]
    Fargate,
    Ec2,
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fargate => write!(f, "fargate"),
            Self::Ec2 => write!(f, "ec2"),
        }
    }
}

/// Container definition parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerParams {
    /// Container name
    pub name: String,

    /// Registry image reference
    pub image: String,

    /// Port the container listens on
    pub port: u16,

    /// The container serves a protocol-upgrade (streaming socket) endpoint
    #[serde(default)]
    pub upgrade_endpoint: bool,

    /// Environment variables (order-preserving)
    #[serde(default)]
    pub environment: IndexMap<String, EnvValue>,
}

/// An environment variable value: literal, or a parameter-store reference
/// resolved when the container starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, try_from = "RawEnvValue")]
pub enum EnvValue {
    Value { value: String },
    Parameter { parameter: String },
}

/// Wire form of `EnvValue`. Exactly one key may be set.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvValue {
    value: Option<String>,
    parameter: Option<String>,
}

impl TryFrom<RawEnvValue> for EnvValue {
    type Error = String;

    fn try_from(raw: RawEnvValue) -> Result<Self, Self::Error> {
        match (raw.value, raw.parameter) {
            (Some(value), None) => Ok(Self::Value { value }),
            (None, Some(parameter)) => Ok(Self::Parameter { parameter }),
            (Some(_), Some(_)) => {
                Err("environment value sets both 'value' and 'parameter'".to_string())
            }
            (None, None) => Err("environment value needs 'value' or 'parameter'".to_string()),
        }
    }
}

/// Log sink parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogParams {
    /// Log group name
    pub group: String,

    /// Retention in days (None = never expire)
    #[serde(default)]
    pub retention_days: Option<u32>,
}

// ============================================================================
// Placement
// ============================================================================

/// Where the service runs. Network and cluster must already exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementParams {
    /// Existing network name
    pub network: String,

    /// Existing cluster name
    pub cluster: String,

    /// Service name
    pub service: String,

    /// Desired replica count
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,

    /// Assign a public address to each replica
    #[serde(default = "default_true")]
    pub assign_public_ip: bool,

    /// Security groups supplied when resolving the cluster reference.
    /// Empty by default; the engine rejects the lookup without the field.
    #[serde(default)]
    pub cluster_security_groups: Vec<String>,
}

fn default_desired_count() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Routing
// ============================================================================

/// Target group and listener rule parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingParams {
    /// Target group name
    pub target_group: String,

    /// Target group protocol
    #[serde(default)]
    pub protocol: Protocol,

    /// Health-check policy (no default: it is specific to the backend)
    pub health_check: HealthCheck,

    /// Selects the existing listener
    pub listener: ListenerSelector,

    /// Rule priority, unique per listener
    pub priority: u32,

    /// Exact hostname routed to the target group
    pub host_header: String,
}

/// Load balancer protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

/// Health-check policy of a target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Status codes counted as healthy
    pub healthy_codes: Vec<u16>,

    /// Probe interval in seconds
    pub interval_seconds: u32,
}

/// Filter identifying an existing listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSelector {
    pub protocol: Protocol,
    pub tag: Tag,
}

/// A key/value resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Resource kind, one per descriptor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    SourceBinding,
    StaticApp,
    Branch,
    DomainMapping,
    LogSink,
    TaskDefinition,
    Container,
    PortMapping,
    Network,
    Cluster,
    Service,
    TargetGroup,
    Listener,
    RoutingRule,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SourceBinding => "source_binding",
            Self::StaticApp => "static_app",
            Self::Branch => "branch",
            Self::DomainMapping => "domain_mapping",
            Self::LogSink => "log_sink",
            Self::TaskDefinition => "task_definition",
            Self::Container => "container",
            Self::PortMapping => "port_mapping",
            Self::Network => "network",
            Self::Cluster => "cluster",
            Self::Service => "service",
            Self::TargetGroup => "target_group",
            Self::Listener => "listener",
            Self::RoutingRule => "routing_rule",
        };
        write!(f, "{}", s)
    }
}

/// A reference to a parameter-store entry. Only the name is carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub parameter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBinding {
    pub owner: String,
    pub repository: String,
    pub token: SecretRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticApp {
    pub name: String,
    pub source: String,
    pub build: BuildSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub app: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMapping {
    pub app: String,
    pub domain: String,
    pub subdomain: String,
    pub branch: String,
}

impl DomainMapping {
    /// Fully qualified name served by this mapping.
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.subdomain, self.domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSink {
    pub name: String,
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub family: String,
    pub cpu: u32,
    pub memory_mib: u32,
    pub compatibility: Compatibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub task_definition: String,
    pub name: String,
    pub image: String,
    pub environment: IndexMap<String, EnvValue>,
    pub log_sink: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container: String,
    pub container_port: u16,
    pub protocol: String,
}

/// Existing network, resolved by lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub id: String,
}

/// Existing cluster, resolved by lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub arn: String,
    pub network: String,
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub cluster: String,
    pub task_definition: String,
    pub desired_count: u32,
    pub assign_public_ip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub name: String,
    pub network: String,
    pub port: u16,
    pub protocol: Protocol,
    pub health_check: HealthCheck,
    pub targets: Vec<String>,
}

/// Existing listener, resolved by lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub arn: String,
    pub protocol: Protocol,
    pub tag: Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub listener: String,
    pub priority: u32,
    pub host_headers: Vec<String>,
    pub target_group: String,
}

/// A resource descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    SourceBinding(SourceBinding),
    StaticApp(StaticApp),
    Branch(Branch),
    DomainMapping(DomainMapping),
    LogSink(LogSink),
    TaskDefinition(TaskDefinition),
    Container(Container),
    PortMapping(PortMapping),
    Network(Network),
    Cluster(Cluster),
    Service(Service),
    TargetGroup(TargetGroup),
    Listener(Listener),
    RoutingRule(RoutingRule),
}

impl Descriptor {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::SourceBinding(_) => ResourceKind::SourceBinding,
            Self::StaticApp(_) => ResourceKind::StaticApp,
            Self::Branch(_) => ResourceKind::Branch,
            Self::DomainMapping(_) => ResourceKind::DomainMapping,
            Self::LogSink(_) => ResourceKind::LogSink,
            Self::TaskDefinition(_) => ResourceKind::TaskDefinition,
            Self::Container(_) => ResourceKind::Container,
            Self::PortMapping(_) => ResourceKind::PortMapping,
            Self::Network(_) => ResourceKind::Network,
            Self::Cluster(_) => ResourceKind::Cluster,
            Self::Service(_) => ResourceKind::Service,
            Self::TargetGroup(_) => ResourceKind::TargetGroup,
            Self::Listener(_) => ResourceKind::Listener,
            Self::RoutingRule(_) => ResourceKind::RoutingRule,
        }
    }

    /// IDs of the resources this descriptor refers to.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Self::SourceBinding(_)
            | Self::LogSink(_)
            | Self::TaskDefinition(_)
            | Self::Network(_)
            | Self::Listener(_) => vec![],
            Self::StaticApp(a) => vec![a.source.as_str()],
            Self::Branch(b) => vec![b.app.as_str()],
            Self::DomainMapping(d) => vec![d.app.as_str(), d.branch.as_str()],
            Self::Container(c) => vec![c.task_definition.as_str(), c.log_sink.as_str()],
            Self::PortMapping(p) => vec![p.container.as_str()],
            Self::Cluster(c) => vec![c.network.as_str()],
            Self::Service(s) => vec![s.cluster.as_str(), s.task_definition.as_str()],
            Self::TargetGroup(t) => {
                let mut refs = vec![t.network.as_str()];
                refs.extend(t.targets.iter().map(String::as_str));
                refs
            }
            Self::RoutingRule(r) => vec![r.listener.as_str(), r.target_group.as_str()],
        }
    }

    /// Name that must be unique among resources of the same kind.
    /// Anonymous descriptors return None.
    pub fn unique_name(&self) -> Option<String> {
        match self {
            Self::StaticApp(a) => Some(a.name.clone()),
            Self::Branch(b) => Some(format!("{}/{}", b.app, b.name)),
            Self::DomainMapping(d) => Some(d.fqdn()),
            Self::LogSink(l) => Some(l.name.clone()),
            Self::TaskDefinition(t) => Some(t.family.clone()),
            Self::Container(c) => Some(format!("{}/{}", c.task_definition, c.name)),
            Self::Service(s) => Some(format!("{}/{}", s.cluster, s.name)),
            Self::TargetGroup(t) => Some(t.name.clone()),
            Self::Network(n) => Some(n.id.clone()),
            Self::Cluster(c) => Some(c.arn.clone()),
            Self::Listener(l) => Some(l.arn.clone()),
            Self::SourceBinding(_) | Self::PortMapping(_) | Self::RoutingRule(_) => None,
        }
    }

    /// External handle of a looked-up resource.
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::Network(n) => Some(&n.id),
            Self::Cluster(c) => Some(&c.arn),
            Self::Listener(l) => Some(&l.arn),
            _ => None,
        }
    }

    /// Serialize the descriptor's attributes. Keys come out sorted, so the
    /// result is canonical and suitable for hashing.
    pub fn properties(&self) -> Result<serde_json::Value, String> {
        let value = match self {
            Self::SourceBinding(d) => serde_json::to_value(d),
            Self::StaticApp(d) => serde_json::to_value(d),
            Self::Branch(d) => serde_json::to_value(d),
            Self::DomainMapping(d) => serde_json::to_value(d),
            Self::LogSink(d) => serde_json::to_value(d),
            Self::TaskDefinition(d) => serde_json::to_value(d),
            Self::Container(d) => serde_json::to_value(d),
            Self::PortMapping(d) => serde_json::to_value(d),
            Self::Network(d) => serde_json::to_value(d),
            Self::Cluster(d) => serde_json::to_value(d),
            Self::Service(d) => serde_json::to_value(d),
            Self::TargetGroup(d) => serde_json::to_value(d),
            Self::Listener(d) => serde_json::to_value(d),
            Self::RoutingRule(d) => serde_json::to_value(d),
        };
        value.map_err(|e| format!("cannot serialize {}: {}", self.kind(), e))
    }
}

// ============================================================================
// Resource graph
// ============================================================================

/// Whether a node is declared by this stack or resolved from existing
/// infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Declared,
    Lookup,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared => write!(f, "declared"),
            Self::Lookup => write!(f, "lookup"),
        }
    }
}

/// A graph node: descriptor plus its outgoing references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub origin: Origin,
    pub descriptor: Descriptor,
    pub depends_on: Vec<String>,
}

/// The declared resource graph of one stack (insertion-ordered).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGraph {
    pub name: String,
    pub context: DeployContext,
    pub nodes: IndexMap<String, Node>,
}

impl ResourceGraph {
    pub fn new(name: &str, context: &DeployContext) -> Self {
        Self {
            name: name.to_string(),
            context: context.clone(),
            nodes: IndexMap::new(),
        }
    }

    /// Add a node. Edges are taken from the descriptor's references.
    pub fn insert(&mut self, id: &str, origin: Origin, descriptor: Descriptor) -> Result<(), String> {
        if self.nodes.contains_key(id) {
            return Err(format!("duplicate resource id '{}'", id));
        }
        let depends_on = descriptor
            .references()
            .into_iter()
            .map(str::to_string)
            .collect();
        self.nodes.insert(
            id.to_string(),
            Node {
                origin,
                descriptor,
                depends_on,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Descriptor> {
        self.nodes.get(id).map(|n| &n.descriptor)
    }

    /// Nodes of one kind, in insertion order.
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes
            .iter()
            .filter(move |(_, n)| n.descriptor.kind() == kind)
    }

    pub fn count(&self, origin: Origin) -> u32 {
        let n = self.nodes.values().filter(|n| n.origin == origin).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }
}

// ============================================================================
// Synth lock
// ============================================================================

/// Per-stack record of the last synthesized graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthLock {
    /// Schema version
    pub schema: String,

    /// Stack name
    pub stack: String,

    /// When the lock was generated
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// BLAKE3 version
    pub blake3_version: String,

    /// Hash of the rendered template
    #[serde(default)]
    pub template_hash: Option<String>,

    /// Per-resource state
    pub resources: IndexMap<String, ResourceLock>,
}

/// Per-resource lock entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLock {
    #[serde(rename = "type")]
    pub kind: ResourceKind,

    pub origin: Origin,

    /// BLAKE3 hash of the descriptor
    pub hash: String,

    #[serde(default)]
    pub depends_on: Vec<String>,
}

// ============================================================================
// Plan
// ============================================================================

/// Action the provisioning engine would take on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Destroy,
    NoOp,
    Read,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Destroy => write!(f, "DESTROY"),
            Self::NoOp => write!(f, "NO-OP"),
            Self::Read => write!(f, "READ"),
        }
    }
}

/// A single planned change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub resource_id: String,
    pub kind: ResourceKind,
    pub action: PlanAction,
    pub description: String,
}

/// Diff of a fresh graph against the synth lock.
#[derive(Debug, Clone)]
pub struct SynthPlan {
    pub name: String,
    pub changes: Vec<PlannedChange>,
    pub execution_order: Vec<String>,
    pub to_create: u32,
    pub to_update: u32,
    pub to_destroy: u32,
    pub unchanged: u32,
    pub to_read: u32,
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    SynthStarted {
        stack: String,
        run_id: String,
        stackwright_version: String,
    },
    LookupResolved {
        stack: String,
        resource: String,
        handle: String,
    },
    LookupFailed {
        stack: String,
        error: String,
    },
    ResourceDeclared {
        stack: String,
        resource: String,
        hash: String,
    },
    SynthCompleted {
        stack: String,
        run_id: String,
        resources_declared: u32,
        resources_looked_up: u32,
        total_seconds: f64,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Tests
// ============================================================================
