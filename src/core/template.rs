//! Template rendering — the artifact handed to the provisioning engine.
//!
//! The JSON template carries the stack context, the topological order and
//! every resource with its kind, origin, references and properties. Map keys
//! inside properties are sorted, so equal graphs render to equal bytes.

use super::types::{DeployContext, Origin, ResourceGraph, ResourceKind};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};

pub const TEMPLATE_FORMAT: &str = "stackwright/1";

#[derive(Debug, Serialize)]
pub struct Template<'a> {
    pub format: &'static str,
    pub stack: &'a str,
    pub context: &'a DeployContext,
    pub order: &'a [String],
    pub resources: IndexMap<&'a str, TemplateResource<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TemplateResource<'a> {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub origin: Origin,
    pub depends_on: &'a [String],
    pub properties: serde_json::Value,
}

/// Assemble the template for a graph and its execution order.
pub fn build_template<'a>(
    graph: &'a ResourceGraph,
    order: &'a [String],
) -> Result<Template<'a>, String> {
    let mut resources = IndexMap::new();
    for (id, node) in &graph.nodes {
        resources.insert(
            id.as_str(),
            TemplateResource {
                kind: node.descriptor.kind(),
                origin: node.origin,
                depends_on: &node.depends_on,
                properties: node.descriptor.properties()?,
            },
        );
    }
    Ok(Template {
        format: TEMPLATE_FORMAT,
        stack: &graph.name,
        context: &graph.context,
        order,
        resources,
    })
}

/// Render the template as pretty JSON.
pub fn render_json(graph: &ResourceGraph, order: &[String]) -> Result<String, String> {
    let template = build_template(graph, order)?;
    serde_json::to_string_pretty(&template).map_err(|e| format!("JSON serialize error: {}", e))
}

/// Path of the template file for a stack.
pub fn template_path(out_dir: &Path, stack: &str) -> PathBuf {
    out_dir.join(format!("{}.template.json", stack))
}

/// Render the graph as Graphviz DOT. Edges point from a resource to what it
/// refers to; looked-up resources are dashed.
pub fn render_dot(graph: &ResourceGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", graph.name);
    let _ = writeln!(out, "  rankdir=LR;");
    for (id, node) in &graph.nodes {
        let style = match node.origin {
            Origin::Declared => "solid",
            Origin::Lookup => "dashed",
        };
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\\n{}\", style={}];",
            id,
            id,
            node.descriptor.kind(),
            style
        );
    }
    for (id, node) in &graph.nodes {
        for dep in &node.depends_on {
            let _ = writeln!(out, "  \"{}\" -> \"{}\";", id, dep);
        }
    }
    out.push_str("}\n");
    out
}
