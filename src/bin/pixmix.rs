use clap::{Parser, Subcommand};
use pixmix::{CompositeRegistry, HarnessConfig, HarnessReport, accelerated_sets, harness};

#[derive(Parser, Debug)]
#[command(name = "pixmix", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify every installed accelerated kernel against the generic
    /// reference over seeded random data.
    Regress(SweepArgs),
    /// Measure generic vs. accelerated throughput per combination.
    Bench(SweepArgs),
}

#[derive(Parser, Debug)]
struct SweepArgs {
    /// Pixels per generated buffer.
    #[arg(long, default_value_t = 1 << 16)]
    pixels: usize,

    /// Timing iterations per kernel.
    #[arg(long, default_value_t = 16)]
    iterations: u32,

    /// Base seed for the random pixel data.
    #[arg(long, default_value_t = 0x00C0_FFEE)]
    seed: u64,

    /// Maximum allowed per-channel difference.
    #[arg(long, default_value_t = 0)]
    tolerance: u8,

    /// Emit the full report as JSON instead of a text table.
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (args, bench_only) = match &cli.cmd {
        Command::Regress(args) => (args, false),
        Command::Bench(args) => (args, true),
    };

    let config = HarnessConfig {
        pixels: args.pixels,
        iterations: args.iterations,
        seed: args.seed,
        max_channel_delta: args.tolerance,
    };

    let accelerated = CompositeRegistry::with_best_available();
    let baseline = CompositeRegistry::generic();

    let installed: Vec<&str> = accelerated_sets()
        .iter()
        .filter(|set| (set.detect)())
        .map(|set| set.name)
        .collect();
    eprintln!(
        "accelerated sets available: {}",
        if installed.is_empty() {
            "none".to_string()
        } else {
            installed.join(", ")
        }
    );

    let report = harness::run(&accelerated, &baseline, &config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report, bench_only);
    }

    if !bench_only && !report.all_passed() {
        anyhow::bail!("{} combination(s) diverged from the reference", report.failures);
    }
    Ok(())
}

fn print_table(report: &HarnessReport, bench_only: bool) {
    if report.cases.is_empty() {
        println!("no accelerated kernels installed; nothing to compare");
        return;
    }
    for case in &report.cases {
        let formats = format!("{}x{}->{}", case.format_a, case.format_b, case.format_d);
        if bench_only {
            println!(
                "{:<14} {:<18} {:<5} generic {:>9.1} MP/s  accelerated {:>9.1} MP/s  x{:.2}",
                case.op.to_string(),
                formats,
                case.set,
                case.generic_mpps,
                case.accelerated_mpps,
                case.speedup,
            );
        } else {
            println!(
                "{:<14} {:<18} {:<5} {}  max-delta={}  x{:.2}",
                case.op.to_string(),
                formats,
                case.set,
                if case.passed() { "ok" } else { "FAIL" },
                case.max_delta,
                case.speedup,
            );
        }
    }
    if !bench_only {
        println!(
            "{} case(s), {} failure(s)",
            report.cases.len(),
            report.failures
        );
    }
}
