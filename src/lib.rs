// src/lib.rs

pub mod action;
pub mod cli;
pub mod condition;
pub mod config;
pub mod dag;
pub mod errors;
pub mod export;
pub mod logging;
pub mod types;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::condition::ConditionEvaluator;
use crate::config::loader::load_from_path;
use crate::config::model::Definition;
use crate::dag::{GraphBuilder, RunReport, Scheduler};
use crate::types::ExportFormat;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - definition loading and validation
/// - graph construction with the default condition registry
/// - either an export of the graph structure or a scheduled run
pub fn run(args: CliArgs) -> Result<()> {
    let mut raw = load_from_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(policy) = args.unknown_references {
        raw.config.unknown_references = policy;
    }
    let definition = Definition::try_from(raw)?;

    if args.dry_run {
        print_dry_run(&definition);
        return Ok(());
    }

    let graph = GraphBuilder::new(&definition)
        .with_conditions(ConditionEvaluator::default())
        .build()?;

    if let Some(format) = args.export {
        let exported = export::export_all(&graph);
        match format {
            ExportFormat::Json => println!("{}", exported.to_json()?),
            ExportFormat::Dot => print!("{}", export::dot::to_dot(&exported)),
        }
        return Ok(());
    }

    let mut scheduler = Scheduler::new(graph);
    let report = scheduler.run()?;
    print_report(&report);

    info!(all_ok = report.all_ok(), "taskgraph finished");
    Ok(())
}

/// Simple dry-run output: print tasks, deps, conditions and fallbacks.
fn print_dry_run(def: &Definition) {
    println!("taskgraph dry-run");
    println!("  config.unknown_references = {}", def.config.unknown_references);
    println!();

    println!("tasks ({}):", def.dag.len());
    for (id, task) in def.dag.iter() {
        println!("  - {id} ({})", task.name);
        if let Some(ref cmd) = task.cmd {
            println!("      cmd: {cmd}");
        }
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(ref condition) = task.condition {
            println!("      condition: {condition}");
        }
        if let Some(ref fallback) = task.fallback {
            println!("      fallback: {fallback}");
        }
    }

    let fallbacks: Vec<&str> = def.fallback_targets().collect();
    if !fallbacks.is_empty() {
        println!();
        println!("fallback-only tasks: {fallbacks:?}");
    }

    debug!("dry-run complete (no execution)");
}

fn print_report(report: &RunReport) {
    for (i, wave) in report.waves.iter().enumerate() {
        println!("wave {}: {}", i + 1, wave.join(", "));
    }
    println!();
    for (name, outcome) in report.outcomes.iter() {
        println!("  {name}: {outcome}");
    }
}
