//! stack.yaml parsing and validation.
//!
//! Parses the stack file and validates the constraints the provisioning
//! engine would otherwise reject at deploy time:
//! - Version must be "1.0"
//! - Names, domains and hostnames are well formed
//! - Task CPU/memory is a supported shape
//! - Health-check, priority and retention values are in range

use super::types::*;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid regex")
});

static RESOURCE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,254}$").expect("valid regex"));

static TARGET_GROUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,30}[A-Za-z0-9])?$").expect("valid regex")
});

static LOG_GROUP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_./#-]{1,512}$").expect("valid regex"));

static ENV_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Retention periods the log service accepts, in days.
const RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

const MAX_HEALTH_INTERVAL: u32 = 300;
const MIN_HEALTH_INTERVAL: u32 = 5;
const MAX_RULE_PRIORITY: u32 = 50_000;
const MAX_DESIRED_COUNT: u32 = 1_000;

/// Parse a stack.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<StackConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a stack.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<StackConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// True if `name` is a dotted DNS name with at least two labels.
/// Case is accepted as given.
pub fn is_dns_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| DNS_LABEL.is_match(l))
}

/// True if a Fargate task supports this CPU/memory combination.
pub fn fargate_shape_supported(cpu: u32, memory_mib: u32) -> bool {
    match cpu {
        256 => matches!(memory_mib, 512 | 1024 | 2048),
        512 => (1024..=4096).contains(&memory_mib) && memory_mib % 1024 == 0,
        1024 => (2048..=8192).contains(&memory_mib) && memory_mib % 1024 == 0,
        2048 => (4096..=16384).contains(&memory_mib) && memory_mib % 1024 == 0,
        4096 => (8192..=30720).contains(&memory_mib) && memory_mib % 1024 == 0,
        _ => false,
    }
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &StackConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        push(&mut errors, format!("version must be \"1.0\", got \"{}\"", config.version));
    }
    if !RESOURCE_NAME.is_match(&config.name) {
        push(&mut errors, format!("stack name '{}' is not a valid resource name", config.name));
    }
    if config.context.account.is_empty() || config.context.region.is_empty() {
        push(&mut errors, "context needs both account and region".to_string());
    }

    validate_site(&config.site, &mut errors);
    validate_compute(&config.compute, &mut errors);
    validate_placement(&config.placement, &mut errors);
    validate_routing(&config.routing, &config.compute.container, &mut errors);

    errors
}

fn push(errors: &mut Vec<ValidationError>, message: String) {
    errors.push(ValidationError { message });
}

fn require(errors: &mut Vec<ValidationError>, value: &str, field: &str) {
    if value.trim().is_empty() {
        push(errors, format!("{} must not be empty", field));
    }
}

fn validate_site(site: &SiteParams, errors: &mut Vec<ValidationError>) {
    require(errors, &site.owner, "site.owner");
    require(errors, &site.repository, "site.repository");
    require(errors, &site.token_parameter, "site.token_parameter");
    require(errors, &site.branch, "site.branch");

    if !is_dns_name(&site.domain) {
        push(errors, format!("site.domain '{}' is not a valid domain name", site.domain));
    }
    if !DNS_LABEL.is_match(&site.subdomain) {
        push(
            errors,
            format!("site.subdomain '{}' must be a single DNS label", site.subdomain),
        );
    }

    let build = &site.build;
    if build.commands.is_empty() {
        push(errors, "site.build has no commands".to_string());
    }
    if build.commands.iter().any(|c| c.trim().is_empty()) {
        push(errors, "site.build has an empty command".to_string());
    }
    require(errors, &build.artifact_dir, "site.build.artifact_dir");
    if build.artifact_files.is_empty() {
        push(errors, "site.build.artifact_files must not be empty".to_string());
    }
    for pattern in build.artifact_files.iter().chain(&build.cache_paths) {
        if let Err(e) = glob::Pattern::new(pattern) {
            push(errors, format!("site.build pattern '{}' is invalid: {}", pattern, e));
        }
    }
}

fn validate_compute(compute: &ComputeParams, errors: &mut Vec<ValidationError>) {
    if !RESOURCE_NAME.is_match(&compute.family) {
        push(errors, format!("compute.family '{}' is not a valid name", compute.family));
    }
    if compute.compatibility == Compatibility::Fargate
        && !fargate_shape_supported(compute.cpu, compute.memory_mib)
    {
        push(
            errors,
            format!(
                "compute: fargate does not support cpu {} with memory {} MiB",
                compute.cpu, compute.memory_mib
            ),
        );
    }
    if compute.cpu == 0 || compute.memory_mib == 0 {
        push(errors, "compute.cpu and compute.memory_mib must be positive".to_string());
    }

    let container = &compute.container;
    if !RESOURCE_NAME.is_match(&container.name) {
        push(
            errors,
            format!("compute.container.name '{}' is not a valid name", container.name),
        );
    }
    require(errors, &container.image, "compute.container.image");
    if container.port == 0 {
        push(errors, "compute.container.port must be 1-65535".to_string());
    }
    for (name, value) in &container.environment {
        if !ENV_NAME.is_match(name) {
            push(errors, format!("environment variable name '{}' is invalid", name));
        }
        if let EnvValue::Parameter { parameter } = value {
            if parameter.trim().is_empty() {
                push(errors, format!("environment variable '{}' has an empty parameter name", name));
            }
        }
    }

    if !LOG_GROUP_NAME.is_match(&compute.logs.group) {
        push(errors, format!("compute.logs.group '{}' is invalid", compute.logs.group));
    }
    if let Some(days) = compute.logs.retention_days {
        if !RETENTION_DAYS.contains(&days) {
            push(errors, format!("compute.logs.retention_days {} is not a supported period", days));
        }
    }
}

fn validate_placement(placement: &PlacementParams, errors: &mut Vec<ValidationError>) {
    require(errors, &placement.network, "placement.network");
    require(errors, &placement.cluster, "placement.cluster");
    if !RESOURCE_NAME.is_match(&placement.service) {
        push(errors, format!("placement.service '{}' is not a valid name", placement.service));
    }
    if placement.desired_count == 0 || placement.desired_count > MAX_DESIRED_COUNT {
        push(
            errors,
            format!(
                "placement.desired_count must be 1-{}, got {}",
                MAX_DESIRED_COUNT, placement.desired_count
            ),
        );
    }
    if placement.cluster_security_groups.iter().any(|g| g.trim().is_empty()) {
        push(errors, "placement.cluster_security_groups has an empty entry".to_string());
    }
}

fn validate_routing(
    routing: &RoutingParams,
    container: &ContainerParams,
    errors: &mut Vec<ValidationError>,
) {
    if !TARGET_GROUP_NAME.is_match(&routing.target_group) {
        push(
            errors,
            format!(
                "routing.target_group '{}' must be 1-32 alphanumerics or hyphens, not starting or ending with a hyphen",
                routing.target_group
            ),
        );
    }

    let hc = &routing.health_check;
    if hc.healthy_codes.is_empty() {
        push(errors, "routing.health_check.healthy_codes must not be empty".to_string());
    }
    for (i, code) in hc.healthy_codes.iter().enumerate() {
        if !(200..=499).contains(code) {
            push(errors, format!("health-check code {} is outside 200-499", code));
        }
        if hc.healthy_codes[..i].contains(code) {
            push(errors, format!("health-check code {} is listed twice", code));
        }
    }
    if !(MIN_HEALTH_INTERVAL..=MAX_HEALTH_INTERVAL).contains(&hc.interval_seconds) {
        push(
            errors,
            format!(
                "routing.health_check.interval_seconds must be {}-{}, got {}",
                MIN_HEALTH_INTERVAL, MAX_HEALTH_INTERVAL, hc.interval_seconds
            ),
        );
    }
    // Plain probes against an upgrade endpoint are answered with 400.
    if container.upgrade_endpoint && !hc.healthy_codes.contains(&400) {
        push(
            errors,
            format!(
                "container '{}' is a protocol-upgrade endpoint; its health check must accept 400",
                container.name
            ),
        );
    }

    require(errors, &routing.listener.tag.key, "routing.listener.tag.key");
    if routing.priority == 0 || routing.priority > MAX_RULE_PRIORITY {
        push(
            errors,
            format!(
                "routing.priority must be 1-{}, got {}",
                MAX_RULE_PRIORITY, routing.priority
            ),
        );
    }
    if !is_dns_name(&routing.host_header) {
        push(
            errors,
            format!("routing.host_header '{}' is not a valid hostname", routing.host_header),
        );
    }
}
