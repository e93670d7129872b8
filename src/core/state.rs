//! Synth lock management — load, save (atomic), path derivation.

use super::types::{ResourceGraph, ResourceLock, SynthLock};
use crate::tripwire::hasher;
use std::path::{Path, PathBuf};

/// Derive the lock file path for a stack within the state directory.
pub fn lock_file_path(state_dir: &Path, stack: &str) -> PathBuf {
    state_dir.join(stack).join("synth.lock.yaml")
}

/// Load the lock file for a stack. Returns None if the file doesn't exist.
pub fn load_lock(state_dir: &Path, stack: &str) -> Result<Option<SynthLock>, String> {
    let path = lock_file_path(state_dir, stack);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let lock: SynthLock = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("invalid lock file {}: {}", path.display(), e))?;
    Ok(Some(lock))
}

/// Save a lock file atomically (write to temp, then rename).
pub fn save_lock(state_dir: &Path, lock: &SynthLock) -> Result<(), String> {
    let path = lock_file_path(state_dir, &lock.stack);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
    }

    let yaml = serde_yaml_ng::to_string(lock).map_err(|e| format!("serialize error: {}", e))?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, &yaml)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        format!(
            "cannot rename {} -> {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;

    Ok(())
}

/// Create a new empty lock for a stack.
pub fn new_lock(stack: &str) -> SynthLock {
    use crate::tripwire::eventlog::now_iso8601;
    SynthLock {
        schema: "1.0".to_string(),
        stack: stack.to_string(),
        generated_at: now_iso8601(),
        generator: format!("stackwright {}", env!("CARGO_PKG_VERSION")),
        blake3_version: "1.8".to_string(),
        template_hash: None,
        resources: indexmap::IndexMap::new(),
    }
}

/// Record every node of a graph, in graph order.
pub fn lock_from_graph(graph: &ResourceGraph) -> Result<SynthLock, String> {
    let mut lock = new_lock(&graph.name);
    for (id, node) in &graph.nodes {
        lock.resources.insert(
            id.clone(),
            ResourceLock {
                kind: node.descriptor.kind(),
                origin: node.origin,
                hash: hasher::hash_node(node)?,
                depends_on: node.depends_on.clone(),
            },
        );
    }
    Ok(lock)
}
