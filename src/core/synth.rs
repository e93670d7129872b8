//! Synth — orchestration loop from parameters to template.
//!
//! build graph (lookups) → check → order → render → stage template →
//! save lock → publish template → events

use super::builder::{self, BuildError};
use super::lookup::ResourceLookup;
use super::resolver;
use super::state;
use super::template;
use super::types::*;
use crate::tripwire::{eventlog, hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Configuration for a synth run.
pub struct SynthConfig<'a> {
    pub config: &'a StackConfig,
    pub lookup: &'a dyn ResourceLookup,
    pub out_dir: &'a Path,
    pub state_dir: &'a Path,
    /// Build and render only; write nothing
    pub dry_run: bool,
    /// Append provenance events to the stack's event log
    pub record_events: bool,
}

/// Result of a synth run.
#[derive(Debug, Clone)]
pub struct SynthResult {
    pub stack: String,
    pub template_path: Option<PathBuf>,
    pub template_hash: String,
    pub execution_order: Vec<String>,
    pub resources_declared: u32,
    pub resources_looked_up: u32,
    pub total_duration: Duration,
}

/// Run a full synth.
pub fn synth(cfg: &SynthConfig) -> Result<SynthResult, String> {
    let start = Instant::now();
    let stack = cfg.config.name.as_str();
    let run_id = eventlog::generate_run_id();
    let record = cfg.record_events && !cfg.dry_run;

    if record {
        let _ = eventlog::append_event(
            cfg.state_dir,
            stack,
            ProvenanceEvent::SynthStarted {
                stack: stack.to_string(),
                run_id: run_id.clone(),
                stackwright_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        );
    }

    let graph = match builder::build_graph(&cfg.config.context, cfg.config, cfg.lookup) {
        Ok(g) => g,
        Err(e) => {
            if let (true, BuildError::Lookup(le)) = (record, &e) {
                let _ = eventlog::append_event(
                    cfg.state_dir,
                    stack,
                    ProvenanceEvent::LookupFailed {
                        stack: stack.to_string(),
                        error: le.to_string(),
                    },
                );
            }
            return Err(e.to_string());
        }
    };

    let execution_order = resolver::execution_order(&graph)?;
    let json = template::render_json(&graph, &execution_order)?;
    let template_hash = hasher::hash_string(&json);

    let resources_declared = graph.count(Origin::Declared);
    let resources_looked_up = graph.count(Origin::Lookup);

    if cfg.dry_run {
        return Ok(SynthResult {
            stack: stack.to_string(),
            template_path: None,
            template_hash,
            execution_order,
            resources_declared,
            resources_looked_up,
            total_duration: start.elapsed(),
        });
    }

    let mut lock = state::lock_from_graph(&graph)?;
    lock.template_hash = Some(template_hash.clone());

    // The template only appears once the lock that describes it is saved.
    let staged = stage_template(cfg.out_dir, stack, &json)?;
    if let Err(e) = state::save_lock(cfg.state_dir, &lock) {
        let _ = std::fs::remove_file(&staged);
        return Err(e);
    }
    let path = publish_template(&staged, cfg.out_dir, stack)?;

    if record {
        record_resources(cfg.state_dir, &graph, &lock);
        let _ = eventlog::append_event(
            cfg.state_dir,
            stack,
            ProvenanceEvent::SynthCompleted {
                stack: stack.to_string(),
                run_id,
                resources_declared,
                resources_looked_up,
                total_seconds: start.elapsed().as_secs_f64(),
            },
        );
    }

    Ok(SynthResult {
        stack: stack.to_string(),
        template_path: Some(path),
        template_hash,
        execution_order,
        resources_declared,
        resources_looked_up,
        total_duration: start.elapsed(),
    })
}

/// Write the template beside its final path, creating the output directory
/// if needed.
fn stage_template(out_dir: &Path, stack: &str, json: &str) -> Result<PathBuf, String> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("cannot create {}: {}", out_dir.display(), e))?;
    let tmp_path = template::template_path(out_dir, stack).with_extension("json.tmp");
    std::fs::write(&tmp_path, json)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    Ok(tmp_path)
}

/// Move a staged template into place.
fn publish_template(staged: &Path, out_dir: &Path, stack: &str) -> Result<PathBuf, String> {
    let path = template::template_path(out_dir, stack);
    std::fs::rename(staged, &path).map_err(|e| {
        format!(
            "cannot rename {} -> {}: {}",
            staged.display(),
            path.display(),
            e
        )
    })?;
    Ok(path)
}

/// One event per node: resolved handle for lookups, hash for declarations.
fn record_resources(state_dir: &Path, graph: &ResourceGraph, lock: &SynthLock) {
    for (id, node) in &graph.nodes {
        let event = match (node.origin, node.descriptor.handle()) {
            (Origin::Lookup, Some(handle)) => ProvenanceEvent::LookupResolved {
                stack: graph.name.clone(),
                resource: id.clone(),
                handle: handle.to_string(),
            },
            _ => ProvenanceEvent::ResourceDeclared {
                stack: graph.name.clone(),
                resource: id.clone(),
                hash: lock
                    .resources
                    .get(id)
                    .map(|rl| rl.hash.clone())
                    .unwrap_or_default(),
            },
        };
        let _ = eventlog::append_event(state_dir, &graph.name, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lookup::{parse_inventory, Inventory};
    use crate::core::parser::parse_config;
    use crate::core::scaffold;

    fn fixtures() -> (StackConfig, Inventory) {
        (
            parse_config(scaffold::STACK_YAML).unwrap(),
            parse_inventory(scaffold::INVENTORY_YAML).unwrap(),
        )
    }

    #[test]
    fn test_synth_writes_template_lock_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let st = dir.path().join("state");
        let (config, inv) = fixtures();
        let cfg = SynthConfig {
            config: &config,
            lookup: &inv,
            out_dir: &out,
            state_dir: &st,
            dry_run: false,
            record_events: true,
        };
        let result = synth(&cfg).unwrap();
        assert_eq!(result.resources_declared, 11);
        assert_eq!(result.resources_looked_up, 3);

        let path = result.template_path.unwrap();
        assert_eq!(path, out.join("thrustin.template.json"));
        let json = std::fs::read_to_string(&path).unwrap();
        assert_eq!(hasher::hash_string(&json), result.template_hash);

        let lock = state::load_lock(&st, "thrustin").unwrap().unwrap();
        assert_eq!(lock.resources.len(), 14);
        assert_eq!(lock.template_hash, Some(result.template_hash));

        let events = eventlog::read_events(&st, "thrustin").unwrap();
        // started + 14 resources + completed
        assert_eq!(events.len(), 16);
        assert!(matches!(events[0].event, ProvenanceEvent::SynthStarted { .. }));
        assert!(matches!(
            events.last().unwrap().event,
            ProvenanceEvent::SynthCompleted { .. }
        ));
        let resolved = events
            .iter()
            .filter(|e| matches!(e.event, ProvenanceEvent::LookupResolved { .. }))
            .count();
        assert_eq!(resolved, 3);
    }

    #[test]
    fn test_synth_twice_identical_template() {
        let dir = tempfile::tempdir().unwrap();
        let (config, inv) = fixtures();
        let out = dir.path().join("out");
        let st = dir.path().join("state");
        let cfg = SynthConfig {
            config: &config,
            lookup: &inv,
            out_dir: &out,
            state_dir: &st,
            dry_run: false,
            record_events: false,
        };
        let first = synth(&cfg).unwrap();
        let second = synth(&cfg).unwrap();
        assert_eq!(first.template_hash, second.template_hash);
        assert_eq!(first.execution_order, second.execution_order);
        assert!(!eventlog::event_log_path(&st, "thrustin").exists());
    }

    #[test]
    fn test_synth_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (config, inv) = fixtures();
        let out = dir.path().join("out");
        let st = dir.path().join("state");
        let cfg = SynthConfig {
            config: &config,
            lookup: &inv,
            out_dir: &out,
            state_dir: &st,
            dry_run: true,
            record_events: true,
        };
        let result = synth(&cfg).unwrap();
        assert!(result.template_path.is_none());
        assert!(!out.exists());
        assert!(!st.exists());
    }

    #[test]
    fn test_synth_lock_failure_leaves_no_template() {
        let dir = tempfile::tempdir().unwrap();
        let (config, inv) = fixtures();
        let out = dir.path().join("out");
        // A plain file where the state directory should be
        let st = dir.path().join("state");
        std::fs::write(&st, "not a directory").unwrap();
        let cfg = SynthConfig {
            config: &config,
            lookup: &inv,
            out_dir: &out,
            state_dir: &st,
            dry_run: false,
            record_events: false,
        };
        assert!(synth(&cfg).is_err());
        let template = template::template_path(&out, "thrustin");
        assert!(!template.exists());
        assert!(!template.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_synth_rejects_invalid_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let (mut config, inv) = fixtures();
        config.routing.health_check.healthy_codes = vec![200];
        config.routing.priority = 0;
        let out = dir.path().join("out");
        let st = dir.path().join("state");
        let cfg = SynthConfig {
            config: &config,
            lookup: &inv,
            out_dir: &out,
            state_dir: &st,
            dry_run: false,
            record_events: false,
        };
        let err = synth(&cfg).unwrap_err();
        assert!(err.starts_with("invalid stack:"), "{}", err);
        assert!(!out.exists());
        assert!(!st.exists());
    }

    #[test]
    fn test_synth_lookup_failure_logged() {
        let dir = tempfile::tempdir().unwrap();
        let (mut config, inv) = fixtures();
        config.placement.cluster = "ghost-cluster".to_string();
        let out = dir.path().join("out");
        let st = dir.path().join("state");
        let cfg = SynthConfig {
            config: &config,
            lookup: &inv,
            out_dir: &out,
            state_dir: &st,
            dry_run: false,
            record_events: true,
        };
        let err = synth(&cfg).unwrap_err();
        assert!(err.contains("cluster 'ghost-cluster in vpc-0a1b2c3d' not found"), "{}", err);
        assert!(!out.exists());
        assert!(state::load_lock(&st, "thrustin").unwrap().is_none());

        let events = eventlog::read_events(&st, "thrustin").unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1].event, ProvenanceEvent::LookupFailed { .. }));
    }
}
