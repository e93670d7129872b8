//! CLI subcommands — init, validate, synth, plan, graph, status.

use crate::core::{builder, lookup, parser, planner, resolver, scaffold, state, synth, template, types};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new stackwright project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate stack.yaml without resolving lookups
    Validate {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,
    },

    /// Build the resource graph and write the template
    Synth {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,

        /// Inventory of existing infrastructure
        #[arg(short, long, default_value = "inventory.yaml")]
        inventory: PathBuf,

        /// Template output directory
        #[arg(long, default_value = "stackwright.out")]
        out_dir: PathBuf,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Build and render without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Do not append to the provenance event log
        #[arg(long)]
        no_events: bool,
    },

    /// Show what changed since the last synth
    Plan {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,

        /// Inventory of existing infrastructure
        #[arg(short, long, default_value = "inventory.yaml")]
        inventory: PathBuf,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Print the dependency order and references
    Graph {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,

        /// Inventory of existing infrastructure
        #[arg(short, long, default_value = "inventory.yaml")]
        inventory: PathBuf,

        /// Emit Graphviz DOT instead of text
        #[arg(long)]
        dot: bool,
    },

    /// Show the last synth from lock files
    Status {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Target specific stack
        #[arg(short, long)]
        stack: Option<String>,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Synth {
            file,
            inventory,
            out_dir,
            state_dir,
            dry_run,
            no_events,
        } => cmd_synth(&file, &inventory, &out_dir, &state_dir, dry_run, !no_events),
        Commands::Plan {
            file,
            inventory,
            state_dir,
        } => cmd_plan(&file, &inventory, &state_dir),
        Commands::Graph {
            file,
            inventory,
            dot,
        } => cmd_graph(&file, &inventory, dot),
        Commands::Status { state_dir, stack } => cmd_status(&state_dir, stack.as_deref()),
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("stack.yaml");
    let inventory_path = path.join("inventory.yaml");
    for p in [&config_path, &inventory_path] {
        if p.exists() {
            return Err(format!("{} already exists", p.display()));
        }
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir).map_err(|e| format!("cannot create state dir: {}", e))?;

    std::fs::write(&config_path, scaffold::STACK_YAML)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;
    std::fs::write(&inventory_path, scaffold::INVENTORY_YAML)
        .map_err(|e| format!("cannot write {}: {}", inventory_path.display(), e))?;

    println!("Initialized stackwright project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}", inventory_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!(
            "OK: {} ({} -> {}.{}, {} on port {})",
            config.name,
            config.site.repository,
            config.site.subdomain,
            config.site.domain,
            config.compute.container.image,
            config.compute.container.port
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate a stack file, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<types::StackConfig, String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

/// Build and order the graph for a stack file against an inventory.
fn load_graph(file: &Path, inventory: &Path) -> Result<(types::ResourceGraph, Vec<String>), String> {
    let config = parse_and_validate(file)?;
    let inv = lookup::load_inventory(inventory)?;
    let graph = builder::build_graph(&config.context, &config, &inv).map_err(|e| e.to_string())?;
    let order = resolver::execution_order(&graph)?;
    Ok((graph, order))
}

fn cmd_synth(
    file: &Path,
    inventory: &Path,
    out_dir: &Path,
    state_dir: &Path,
    dry_run: bool,
    record_events: bool,
) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    let inv = lookup::load_inventory(inventory)?;

    let cfg = synth::SynthConfig {
        config: &config,
        lookup: &inv,
        out_dir,
        state_dir,
        dry_run,
        record_events,
    };
    let result = synth::synth(&cfg)?;

    println!(
        "{}: {} declared, {} looked up ({:.3}s)",
        result.stack,
        result.resources_declared,
        result.resources_looked_up,
        result.total_duration.as_secs_f64()
    );
    match result.template_path {
        Some(path) => println!("  Template: {} ({})", path.display(), result.template_hash),
        None => println!("Dry run: no template written."),
    }
    Ok(())
}

fn cmd_plan(file: &Path, inventory: &Path, state_dir: &Path) -> Result<(), String> {
    let (graph, order) = load_graph(file, inventory)?;
    let lock = state::load_lock(state_dir, &graph.name)?;
    let plan = planner::plan(&graph, &order, lock.as_ref())?;
    print_plan(&plan);
    Ok(())
}

/// Display a plan to stdout.
fn print_plan(plan: &types::SynthPlan) {
    println!("Planning: {} ({} resources)", plan.name, plan.changes.len());
    println!();

    for change in &plan.changes {
        let symbol = match change.action {
            types::PlanAction::Create => "+",
            types::PlanAction::Update => "~",
            types::PlanAction::Destroy => "-",
            types::PlanAction::NoOp => " ",
            types::PlanAction::Read => "=",
        };
        println!("  {} {}", symbol, change.description);
    }

    println!();
    println!(
        "Plan: {} to add, {} to change, {} to destroy, {} unchanged, {} existing.",
        plan.to_create, plan.to_update, plan.to_destroy, plan.unchanged, plan.to_read
    );
}

fn cmd_graph(file: &Path, inventory: &Path, dot: bool) -> Result<(), String> {
    let (graph, order) = load_graph(file, inventory)?;
    if dot {
        print!("{}", template::render_dot(&graph));
        return Ok(());
    }
    println!("{} ({} resources)", graph.name, graph.nodes.len());
    for (i, id) in order.iter().enumerate() {
        let Some(node) = graph.nodes.get(id) else {
            continue;
        };
        let deps = if node.depends_on.is_empty() {
            String::new()
        } else {
            format!(" <- {}", node.depends_on.join(", "))
        };
        println!(
            "  {:>2}. {} [{}, {}]{}",
            i + 1,
            id,
            node.descriptor.kind(),
            node.origin,
            deps
        );
    }
    Ok(())
}

fn cmd_status(state_dir: &Path, stack_filter: Option<&str>) -> Result<(), String> {
    let entries = std::fs::read_dir(state_dir)
        .map_err(|e| format!("cannot read state dir {}: {}", state_dir.display(), e))?;

    let mut found = false;

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(filter) = stack_filter {
            if name != filter {
                continue;
            }
        }

        if !entry.path().is_dir() {
            continue;
        }

        if let Some(lock) = state::load_lock(state_dir, &name)? {
            found = true;
            println!("Stack: {}", lock.stack);
            println!("  Generated: {}", lock.generated_at);
            println!("  Generator: {}", lock.generator);
            if let Some(ref h) = lock.template_hash {
                println!("  Template:  {}", h);
            }
            println!("  Resources: {}", lock.resources.len());

            for (id, rl) in &lock.resources {
                println!("    {}: {} [{}]", id, rl.kind, rl.origin);
            }
            println!();
        }
    }

    if !found {
        println!("No state found. Run `stackwright synth` first.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path()).unwrap();
        dir
    }

    #[test]
    fn test_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("test-project");
        std::fs::create_dir_all(&sub).unwrap();
        cmd_init(&sub).unwrap();
        assert!(sub.join("stack.yaml").exists());
        assert!(sub.join("inventory.yaml").exists());
        assert!(sub.join("state").is_dir());
    }

    #[test]
    fn test_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stack.yaml"), "exists").unwrap();
        assert!(cmd_init(dir.path()).is_err());
    }

    #[test]
    fn test_validate_valid() {
        let dir = project();
        cmd_validate(&dir.path().join("stack.yaml")).unwrap();
    }

    #[test]
    fn test_validate_invalid() {
        let dir = project();
        let path = dir.path().join("stack.yaml");
        let yaml = std::fs::read_to_string(&path)
            .unwrap()
            .replace("version: \"1.0\"", "version: \"2.0\"")
            .replace("priority: 1\n", "priority: 0\n");
        std::fs::write(&path, yaml).unwrap();
        let err = cmd_validate(&path).unwrap_err();
        assert_eq!(err, "2 validation error(s)");
    }

    #[test]
    fn test_synth_then_plan_then_status() {
        let dir = project();
        let root = dir.path();
        cmd_synth(
            &root.join("stack.yaml"),
            &root.join("inventory.yaml"),
            &root.join("out"),
            &root.join("state"),
            false,
            true,
        )
        .unwrap();
        assert!(root.join("out/thrustin.template.json").exists());
        assert!(root.join("state/thrustin/synth.lock.yaml").exists());
        assert!(root.join("state/thrustin/events.jsonl").exists());

        cmd_plan(
            &root.join("stack.yaml"),
            &root.join("inventory.yaml"),
            &root.join("state"),
        )
        .unwrap();
        cmd_status(&root.join("state"), None).unwrap();
        cmd_status(&root.join("state"), Some("thrustin")).unwrap();
    }

    #[test]
    fn test_synth_missing_inventory() {
        let dir = project();
        let root = dir.path();
        let err = cmd_synth(
            &root.join("stack.yaml"),
            &root.join("missing.yaml"),
            &root.join("out"),
            &root.join("state"),
            false,
            false,
        )
        .unwrap_err();
        assert!(err.contains("cannot read inventory"));
    }

    #[test]
    fn test_plan_lookup_failure() {
        let dir = project();
        let root = dir.path();
        std::fs::write(root.join("inventory.yaml"), "networks: []\n").unwrap();
        let err = cmd_plan(
            &root.join("stack.yaml"),
            &root.join("inventory.yaml"),
            &root.join("state"),
        )
        .unwrap_err();
        assert_eq!(err, "lookup failed: network 'maxrchung-vpc' not found");
    }

    #[test]
    fn test_plan_validation_error() {
        let dir = project();
        let root = dir.path();
        let path = root.join("stack.yaml");
        let yaml = std::fs::read_to_string(&path)
            .unwrap()
            .replace("healthy_codes: [200, 400]", "healthy_codes: [200]");
        std::fs::write(&path, yaml).unwrap();
        let err = cmd_plan(&path, &root.join("inventory.yaml"), &root.join("state")).unwrap_err();
        assert_eq!(err, "validation failed");
    }

    #[test]
    fn test_graph_text_and_dot() {
        let dir = project();
        let root = dir.path();
        cmd_graph(&root.join("stack.yaml"), &root.join("inventory.yaml"), false).unwrap();
        cmd_graph(&root.join("stack.yaml"), &root.join("inventory.yaml"), true).unwrap();
    }

    #[test]
    fn test_status_empty() {
        let dir = project();
        cmd_status(&dir.path().join("state"), None).unwrap();
    }

    #[test]
    fn test_status_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cmd_status(&dir.path().join("nope"), None).is_err());
    }

    #[test]
    fn test_dispatch_validate() {
        let dir = project();
        dispatch(Commands::Validate {
            file: dir.path().join("stack.yaml"),
        })
        .unwrap();
    }

    #[test]
    fn test_dispatch_synth_dry_run() {
        let dir = project();
        let root = dir.path();
        dispatch(Commands::Synth {
            file: root.join("stack.yaml"),
            inventory: root.join("inventory.yaml"),
            out_dir: root.join("out"),
            state_dir: root.join("state"),
            dry_run: true,
            no_events: false,
        })
        .unwrap();
        assert!(!root.join("out").exists());
    }
}
