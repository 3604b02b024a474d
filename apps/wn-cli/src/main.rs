use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use wn_app::{
    AppError, AppResult, RunHandle, RunOptions, RunProgressEvent, RunRef, RunRequest,
    link_values_at, network_service, node_values_at, run_service,
};
use wn_results::QualitySummary;

#[derive(Parser)]
#[command(name = "wn-cli")]
#[command(about = "waternet CLI - hydraulic and water quality network simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and compile a network file
    Validate {
        /// Path to the network YAML or JSON file
        network_path: PathBuf,
    },
    /// Run an extended period simulation
    Run {
        /// Path to the network YAML or JSON file
        network_path: PathBuf,
        /// Run store directory (default: .waternet/runs next to the network)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Skip the water quality pass
        #[arg(long)]
        no_quality: bool,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
    },
    /// List stored runs of a network
    Runs {
        /// Path to the network YAML or JSON file
        network_path: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show node or link values of a stored run
    Show {
        /// Run directory
        run_dir: PathBuf,
        /// Node or link id
        id: String,
        /// Simulated time in seconds
        #[arg(long)]
        time: i64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { network_path } => report(cmd_validate(&network_path)),
        Commands::Run {
            network_path,
            out,
            no_quality,
            no_cache,
        } => match cmd_run(&network_path, out.as_deref(), !no_quality, !no_cache) {
            Ok(()) => {
                println!("run OK");
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("run error");
                eprintln!("error {}: {}", e.code(), e);
                ExitCode::FAILURE
            }
        },
        Commands::Runs { network_path, out } => report(cmd_runs(&network_path, out.as_deref())),
        Commands::Show { run_dir, id, time } => report(cmd_show(&run_dir, &id, time)),
    }
}

fn report(result: AppResult<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error {}: {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_validate(network_path: &Path) -> AppResult<()> {
    println!("Validating network: {}", network_path.display());
    let def = network_service::load_network(network_path)?;
    network_service::compile_network(&def)?;
    let s = network_service::summarize(&def);
    println!("✓ Network '{}' is valid", s.name);
    println!(
        "  {} junctions, {} reservoirs, {} tanks",
        s.junctions, s.reservoirs, s.tanks
    );
    println!("  {} pipes, {} pumps, {} valves", s.pipes, s.pumps, s.valves);
    println!("  {} controls, {} rules", s.controls, s.rules);
    let quality = if s.has_quality { "yes" } else { "no" };
    println!("  duration {} s, quality: {}", s.duration, quality);
    Ok(())
}

fn cmd_run(
    network_path: &Path,
    out: Option<&Path>,
    with_quality: bool,
    use_cache: bool,
) -> AppResult<()> {
    let request = RunRequest {
        network_path,
        out_dir: out,
        options: RunOptions {
            use_cache,
            with_quality,
            ..RunOptions::default()
        },
    };

    let handle = RunHandle::new();
    let mut last_emit = Instant::now();
    let response = run_service::run_with_progress(
        &request,
        &handle,
        Some(&mut |event| {
            if last_emit.elapsed().as_millis() >= 100 || event.message.is_some() {
                render_cli_progress(&event);
                last_emit = Instant::now();
            }
        }),
    );
    clear_progress_line();
    let response = response?;

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Simulation completed: {}", response.run_id);
    }

    let t = &response.timing;
    println!("\nTiming summary:");
    println!("  Compile:    {:.3}s", t.compile_time_s);
    println!("  Hydraulics: {:.3}s", t.hydraulics_time_s);
    if t.quality_time_s > 0.0 {
        println!("  Quality:    {:.3}s", t.quality_time_s);
    }
    println!("  Save:       {:.3}s", t.save_time_s);
    println!("  Total:      {:.3}s", t.total_time_s);

    let m = &response.manifest;
    println!("  Hydraulic steps: {}", m.hydraulic_steps);
    if t.unbalanced_steps > 0 {
        println!("  Unbalanced steps: {}", t.unbalanced_steps);
    }
    match &m.quality {
        QualitySummary::None => {}
        QualitySummary::Chemical {
            periods,
            mass_balance_ratio,
        } => println!("  Quality periods: {periods}, mass balance {mass_balance_ratio:.4}"),
        QualitySummary::Age { periods } => println!("  Age periods: {periods}"),
        QualitySummary::Trace { node, periods } => {
            println!("  Trace from {node}: {periods} periods")
        }
    }
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(80));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    let spinner = ['|', '/', '-', '\\'];
    let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
    let mut line = format!(
        "\r{} {}  t={}s  elapsed={:.2}s",
        spinner[spin_idx],
        event.stage.label(),
        event.sim_time,
        event.elapsed_wall_s
    );
    if let Some(msg) = &event.message {
        line.push_str(&format!("  {}", msg));
    }
    print!("{}", line);
    let _ = io::stdout().flush();
}

fn cmd_runs(network_path: &Path, out: Option<&Path>) -> AppResult<()> {
    let runs = run_service::list_runs(network_path, out)?;
    if runs.is_empty() {
        println!("No stored runs for {}", network_path.display());
        return Ok(());
    }
    for m in runs {
        println!(
            "  {}  {}  steps={}  quality periods={}",
            m.run_id,
            m.timestamp,
            m.hydraulic_steps,
            m.quality.periods()
        );
    }
    Ok(())
}

fn cmd_show(run_dir: &Path, id: &str, time: i64) -> AppResult<()> {
    let run = RunRef::open_dir(run_dir)?;
    let quality = |q: Option<f64>| q.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));

    if run.manifest.node_index(id).is_some() {
        let v = node_values_at(&run, id, time)?;
        println!("Node {id} at t = {} s", v.time);
        println!("  head:    {:.4} ft", v.head);
        println!("  demand:  {:.6} cfs", v.demand);
        println!("  quality: {}", quality(v.quality));
    } else if run.manifest.link_index(id).is_some() {
        let v = link_values_at(&run, id, time)?;
        println!("Link {id} at t = {} s", v.time);
        println!("  flow:       {:.6} cfs", v.flow);
        println!("  head delta: {:.4} ft", v.head_delta);
        println!("  quality:    {}", quality(v.quality));
    } else {
        return Err(AppError::InvalidConfig(format!(
            "'{id}' is neither a node nor a link of run {}",
            run.run_id()
        )));
    }
    Ok(())
}
