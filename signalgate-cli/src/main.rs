//! Signalgate CLI: replay, parity, synthetic data and config commands.
//!
//! Commands:
//! - `replay`: run bars (and optional precomputed features) through both
//!   execution surfaces and save artifacts
//! - `parity`: replay twice, check surface parity and determinism
//! - `synth`: write deterministic synthetic bars to CSV
//! - `config`: print the default configuration or validate a file

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use signalgate_runner::{
    generate_synthetic_bars, load_inputs, replay, save_artifacts, verify_determinism,
    write_bars_csv, ReplayConfig, ReplayResult,
};

#[derive(Parser)]
#[command(
    name = "signalgate",
    about = "Signalgate CLI: bar-by-bar signal decision engine"
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct InputArgs {
    /// Bar CSV (index,timestamp,open,high,low,close,volume[,confirmed]).
    #[arg(long)]
    bars: Option<PathBuf>,

    /// Precomputed feature CSV. Without it the reference builder is used.
    #[arg(long)]
    features: Option<PathBuf>,

    /// Replay TOML config. Command-line inputs override its [replay] table.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Instrument name used in fingerprints and artifact names.
    #[arg(long)]
    instrument: Option<String>,

    /// Preview every bar unconfirmed before confirming it.
    #[arg(long, default_value_t = false)]
    preview: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay bars through the engine and save artifacts.
    Replay {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary only; write nothing.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Check surface parity and replay determinism. Exits non-zero on failure.
    Parity {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Write deterministic synthetic 5-minute bars to CSV.
    Synth {
        #[arg(long, default_value = "SYNTH")]
        symbol: String,

        /// Number of bars.
        #[arg(long, default_value_t = 5_000)]
        bars: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the default configuration or validate a config file.
    Config {
        /// Print the full default configuration as TOML.
        #[arg(long, default_value_t = false)]
        print_default: bool,

        /// Validate a config file and print its fingerprint.
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_log);

    match cli.command {
        Commands::Replay {
            input,
            output_dir,
            dry_run,
        } => run_replay(input, output_dir, dry_run),
        Commands::Parity { input } => run_parity(input),
        Commands::Synth {
            symbol,
            bars,
            seed,
            out,
        } => run_synth(&symbol, bars, seed, out),
        Commands::Config {
            print_default,
            check,
        } => run_config(print_default, check),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn resolve_config(input: InputArgs) -> Result<ReplayConfig> {
    let mut config = match &input.config {
        Some(path) => ReplayConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ReplayConfig::default(),
    };
    if let Some(bars) = input.bars {
        config.replay.bars_path = Some(bars);
    }
    if let Some(features) = input.features {
        config.replay.features_path = Some(features);
    }
    if let Some(instrument) = input.instrument {
        config.replay.instrument = instrument;
    }
    if input.preview {
        config.replay.preview = true;
    }
    if config.replay.bars_path.is_none() {
        bail!("no bars given: pass --bars or set replay.bars_path in the config");
    }
    config.validate()?;
    Ok(config)
}

fn run_replay(input: InputArgs, output_dir: PathBuf, dry_run: bool) -> Result<()> {
    let config = resolve_config(input)?;
    let (bars, features) = load_inputs(&config)?;
    let result = replay(&config, &bars, &features)?;

    print_summary(&result);
    if !result.parity.is_identical() {
        bail!("surface parity violated; artifacts not saved");
    }

    if !dry_run {
        let run_dir = save_artifacts(&result, &output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_parity(input: InputArgs) -> Result<()> {
    let config = resolve_config(input)?;
    let (bars, features) = load_inputs(&config)?;

    let result = match verify_determinism(&config, &bars, &features) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("FAIL: {err}");
            std::process::exit(1);
        }
    };

    let parity = &result.parity;
    println!();
    println!("=== Parity Report ===");
    println!("Instrument:     {}", result.instrument);
    println!("Bars:           {}", result.bar_count);
    println!("Indicator:      {} events", parity.left_count);
    println!("Strategy:       {} events", parity.right_count);
    println!("Event digest:   {}", result.fingerprint.event_digest);
    println!("Deterministic:  yes");

    match &parity.first_divergence {
        None => {
            println!("Parity:         identical");
            Ok(())
        }
        Some(d) => {
            println!("Parity:         DIVERGED at event {}", d.position);
            println!("  indicator:    {:?}", d.left);
            println!("  strategy:     {:?}", d.right);
            std::process::exit(1);
        }
    }
}

fn run_synth(symbol: &str, n: usize, seed: u64, out: PathBuf) -> Result<()> {
    if n == 0 {
        bail!("--bars must be at least 1");
    }
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let bars = generate_synthetic_bars(symbol, n, seed);
    write_bars_csv(&out, &bars)?;
    println!("Wrote {} bars for {} (seed {}) to {}", bars.len(), symbol, seed, out.display());
    Ok(())
}

fn run_config(print_default: bool, check: Option<PathBuf>) -> Result<()> {
    match (print_default, check) {
        (true, None) => {
            let text = toml::to_string_pretty(&ReplayConfig::default())
                .context("failed to serialize default config")?;
            print!("{text}");
            Ok(())
        }
        (false, Some(path)) => {
            let config = ReplayConfig::from_file(&path)
                .with_context(|| format!("invalid config {}", path.display()))?;
            println!("OK: {}", path.display());
            println!("Engine fingerprint: {}", config.engine.fingerprint());
            Ok(())
        }
        (true, Some(_)) => bail!("--print-default and --check are mutually exclusive"),
        (false, None) => bail!("one of --print-default or --check is required"),
    }
}

fn print_summary(result: &ReplayResult) {
    let s = &result.summary;
    println!();
    println!("=== Replay Result ===");
    println!("Instrument:     {}", result.instrument);
    println!(
        "Bars:           {} ({} skipped)",
        result.bar_count, result.skipped_bars
    );
    println!("Features:       {}", result.feature_source);
    println!("Events:         {}", result.events.len());
    for (kind, count) in &result.event_counts {
        println!("  {kind:<13} {count}");
    }
    println!();
    println!("--- Trades ---");
    println!("Trades:         {}", s.trades);
    println!("Win Rate:       {:.1}%", s.win_rate * 100.0);
    println!("Total P&L:      {:.2}", s.total_pnl);
    println!("Avg Bars Held:  {:.1}", s.avg_bars_held);
    if !result.gate_rejections.is_empty() {
        println!();
        println!("--- Gate Rejections ---");
        for (gate, count) in &result.gate_rejections {
            println!("  {gate:<18} {count}");
        }
    }
    println!();
    println!("Event digest:   {}", result.fingerprint.event_digest);
    if result.preview_events > 0 {
        println!("Preview events: {} (not committed)", result.preview_events);
    }
}
