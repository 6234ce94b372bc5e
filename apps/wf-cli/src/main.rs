use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wf_network::{LinkAttribute, NodeAttribute};
use wf_project::{ProjectError, compile, load};
use wf_results::{JsonlStore, ResultsError, ResultsTable, RunSummary};
use wf_sim::{Scenario, SimError, run_ensemble};

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "wf-cli")]
#[command(about = "WaterFlow CLI - water distribution network simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a network file and compile its controls
    Validate {
        /// Path to the network YAML or JSON file
        project_path: PathBuf,
    },
    /// Run an extended-period simulation
    Run {
        /// Path to the network YAML or JSON file
        project_path: PathBuf,
        /// Stream step records to this JSON-lines file
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Override the simulated duration (s)
        #[arg(long)]
        duration: Option<f64>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run several network files in parallel
    Ensemble {
        /// Network files; each one is an independent scenario
        #[arg(required = true)]
        project_paths: Vec<PathBuf>,
    },
    /// Summarize a stored results file
    Summary {
        /// Path to a JSON-lines results file
        results_path: PathBuf,
    },
    /// Export one element attribute from a results file as CSV
    ExportSeries {
        /// Path to a JSON-lines results file
        results_path: PathBuf,
        /// Node or link name
        element: String,
        attribute: Attribute,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, ValueEnum)]
enum Attribute {
    Head,
    Pressure,
    Level,
    Demand,
    Flow,
    Velocity,
    Status,
    Setting,
}

impl Attribute {
    fn series(self, table: &ResultsTable, element: &str) -> Vec<(f64, f64)> {
        match self {
            Attribute::Head => table.node_series(element, NodeAttribute::Head),
            Attribute::Pressure => table.node_series(element, NodeAttribute::Pressure),
            Attribute::Level => table.node_series(element, NodeAttribute::Level),
            Attribute::Demand => table.node_series(element, NodeAttribute::Demand),
            Attribute::Flow => table.link_series(element, LinkAttribute::Flow),
            Attribute::Velocity => table.link_series(element, LinkAttribute::Velocity),
            Attribute::Status => table.link_series(element, LinkAttribute::Status),
            Attribute::Setting => table.link_series(element, LinkAttribute::Setting),
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Run {
            project_path,
            out,
            duration,
            json,
        } => cmd_run(&project_path, out.as_deref(), duration, json),
        Commands::Ensemble { project_paths } => cmd_ensemble(&project_paths),
        Commands::Summary { results_path } => cmd_summary(&results_path),
        Commands::ExportSeries {
            results_path,
            element,
            attribute,
            output,
        } => cmd_export_series(&results_path, &element, attribute, output.as_deref()),
    }
}

fn cmd_validate(project_path: &Path) -> CliResult<()> {
    println!("Validating network: {}", project_path.display());
    let project = load(project_path)?;
    let compiled = compile(&project)?;
    println!("✓ Network is valid");
    println!("  Nodes: {}", compiled.network.node_count());
    println!("  Links: {}", compiled.network.link_count());
    println!("  Controls and rules: {}", compiled.controls.len());
    Ok(())
}

fn cmd_run(
    project_path: &Path,
    out: Option<&Path>,
    duration: Option<f64>,
    json: bool,
) -> CliResult<()> {
    let mut project = load(project_path)?;
    if let Some(d) = duration {
        project.options.duration_s = d;
    }
    println!("Running: {} ({:.0} s)", project.name, project.options.duration_s);

    let started = Instant::now();
    let mut sim = compile(&project)?.into_simulator()?;
    let summary = match out {
        Some(path) => {
            let mut writer = JsonlStore::new(path).create()?;
            sim.run_with_sink(&mut writer)?;
            let written = writer.finish()?;
            println!("✓ Wrote {} records to {}", written, path.display());
            let records = JsonlStore::new(path).load()?;
            ResultsTable::from(records).summary()
        }
        None => sim.run()?.summary(),
    };
    info!(elapsed_s = started.elapsed().as_secs_f64(), "run complete");

    let Some(summary) = summary else {
        return Err(CliError::Usage("simulation produced no records".into()));
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
        println!("  Wall time: {:.3}s", started.elapsed().as_secs_f64());
    }
    Ok(())
}

fn cmd_ensemble(project_paths: &[PathBuf]) -> CliResult<()> {
    let mut scenarios = Vec::with_capacity(project_paths.len());
    for path in project_paths {
        let project = load(path)?;
        let compiled = compile(&project)?;
        scenarios.push(Scenario {
            name: path.display().to_string(),
            network: compiled.network,
            controls: compiled.controls,
            options: compiled.options,
        });
    }

    let mut failed = 0;
    for outcome in run_ensemble(scenarios) {
        match outcome.result {
            Ok(table) => {
                let steps = table.len();
                let iterations = table.summary().map(|s| s.total_iterations).unwrap_or(0);
                println!("✓ {}: {} steps, {} iterations", outcome.name, steps, iterations);
            }
            Err(e) => {
                failed += 1;
                println!("✗ {}: {}", outcome.name, e);
            }
        }
    }
    if failed > 0 {
        return Err(CliError::Usage(format!(
            "{failed} of {} scenarios failed",
            project_paths.len()
        )));
    }
    Ok(())
}

fn cmd_summary(results_path: &Path) -> CliResult<()> {
    let table = ResultsTable::from(JsonlStore::new(results_path).load()?);
    let Some(summary) = table.summary() else {
        println!("No records in {}", results_path.display());
        return Ok(());
    };
    print_summary(&summary);
    if let Some(last) = table.last() {
        println!("\nNodes: {}", last.nodes.len());
        println!("Links: {}", last.links.len());
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\nRun Summary:");
    println!("  Steps: {}", summary.steps);
    println!(
        "  Time range: {:.0} - {:.0} s",
        summary.start_s, summary.end_s
    );
    println!(
        "  Newton iterations: {} total, {} max per step",
        summary.total_iterations, summary.max_iterations
    );
    println!("  Max residual: {:.3e}", summary.max_residual_norm);
    println!("  Retried steps: {}", summary.retried_steps);
    println!("  Control conflicts: {}", summary.conflicts);
}

fn cmd_export_series(
    results_path: &Path,
    element: &str,
    attribute: Attribute,
    output: Option<&Path>,
) -> CliResult<()> {
    let table = ResultsTable::from(JsonlStore::new(results_path).load()?);
    let series = attribute.series(&table, element);
    if series.is_empty() {
        return Err(CliError::Usage(format!(
            "no values for '{element}' in {}",
            results_path.display()
        )));
    }

    let mut csv = String::from("time_s,value\n");
    for (t, val) in &series {
        csv.push_str(&format!("{},{}\n", t, val));
    }

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!(
            "✓ Exported {} data points to {}",
            series.len(),
            path.display()
        );
    } else {
        print!("{}", csv);
    }
    Ok(())
}
