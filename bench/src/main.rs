use anyhow::Context as _;
use pixmix::{CompositeRegistry, HarnessConfig, accelerated_sets, harness};
use serde_json::json;

#[derive(Clone, Debug)]
struct BenchArgs {
    sizes: Vec<usize>,
    iterations: u32,
    warmup: u32,
    repeats: u32,
    seed: u64,
    json: bool,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = parse_args()?;

    if args.sizes.is_empty() {
        anyhow::bail!("--sizes must name at least one pixel count");
    }
    if args.iterations == 0 || args.repeats == 0 {
        anyhow::bail!("--iterations and --repeats must be > 0");
    }

    let accelerated = CompositeRegistry::with_best_available();
    let baseline = CompositeRegistry::generic();

    let installed: Vec<&str> = accelerated_sets()
        .iter()
        .filter(|set| (set.detect)())
        .map(|set| set.name)
        .collect();
    if installed.is_empty() {
        anyhow::bail!("no accelerated kernel set is available on this CPU; nothing to measure");
    }

    eprintln!(
        "bench: {repeats} run(s) ({profile} build), sets=[{sets}], sizes={sizes:?}, {iters} iteration(s)/kernel",
        repeats = args.repeats,
        profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
        sets = installed.join(", "),
        sizes = args.sizes,
        iters = args.iterations,
    );

    let mut sweeps = Vec::new();
    for &pixels in &args.sizes {
        let config = HarnessConfig {
            pixels,
            iterations: args.iterations,
            seed: args.seed,
            max_channel_delta: 0,
        };

        for _ in 0..args.warmup {
            harness::run(&accelerated, &baseline, &config)
                .with_context(|| format!("warmup sweep at {pixels} pixels"))?;
        }

        // One sample vector per recorded sweep, indexed per case.
        let mut runs: Vec<Vec<CaseSample>> = Vec::with_capacity(args.repeats as usize);
        for _ in 0..args.repeats {
            let report = harness::run(&accelerated, &baseline, &config)
                .with_context(|| format!("sweep at {pixels} pixels"))?;
            anyhow::ensure!(
                report.all_passed(),
                "{} kernel(s) diverged from the reference at {pixels} pixels",
                report.failures
            );
            runs.push(
                report
                    .cases
                    .iter()
                    .map(|c| CaseSample {
                        label: format!(
                            "{} {}x{}->{} [{}]",
                            c.op, c.format_a, c.format_b, c.format_d, c.set
                        ),
                        generic_mpps: c.generic_mpps,
                        accelerated_mpps: c.accelerated_mpps,
                    })
                    .collect(),
            );
        }

        sweeps.push(report_size(pixels, &runs, args.json));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&json!({ "sweeps": sweeps }))?);
    }
    Ok(())
}

#[derive(Clone, Debug)]
struct CaseSample {
    label: String,
    generic_mpps: f64,
    accelerated_mpps: f64,
}

/// Prints percentiles for one buffer size and returns the same numbers as a
/// JSON value for `--json` mode.
fn report_size(pixels: usize, runs: &[Vec<CaseSample>], quiet: bool) -> serde_json::Value {
    fn p(sorted: &[f64], q: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let n = sorted.len();
        let rank = (q * n as f64).ceil().clamp(1.0, n as f64) as usize;
        sorted[rank - 1]
    }

    let cases = runs.first().map_or(0, Vec::len);
    let mut out_cases = Vec::with_capacity(cases);
    if !quiet {
        eprintln!("\n{pixels} pixels (p50/p90/p99, MP/s):");
    }
    for i in 0..cases {
        let label = &runs[0][i].label;
        let mut generic: Vec<f64> = runs.iter().map(|r| r[i].generic_mpps).collect();
        let mut accel: Vec<f64> = runs.iter().map(|r| r[i].accelerated_mpps).collect();
        generic.sort_by(f64::total_cmp);
        accel.sort_by(f64::total_cmp);

        let g50 = p(&generic, 0.50);
        let a50 = p(&accel, 0.50);
        let speedup = if g50 > 0.0 { a50 / g50 } else { 0.0 };
        if !quiet {
            eprintln!(
                "  {label:<44} generic p50={g50:>9.1} p90={g90:>9.1} p99={g99:>9.1}  accel p50={a50:>9.1} p90={a90:>9.1} p99={a99:>9.1}  x{speedup:.2}",
                g90 = p(&generic, 0.90),
                g99 = p(&generic, 0.99),
                a90 = p(&accel, 0.90),
                a99 = p(&accel, 0.99),
            );
        }
        out_cases.push(json!({
            "case": label,
            "generic_mpps": { "p50": g50, "p90": p(&generic, 0.90), "p99": p(&generic, 0.99) },
            "accelerated_mpps": { "p50": a50, "p90": p(&accel, 0.90), "p99": p(&accel, 0.99) },
            "speedup_p50": speedup,
        }));
    }
    json!({ "pixels": pixels, "cases": out_cases })
}

fn parse_args() -> anyhow::Result<BenchArgs> {
    let mut args = std::env::args().skip(1);

    let mut out = BenchArgs {
        sizes: vec![1 << 12, 1 << 16, 1 << 20],
        iterations: 16,
        warmup: 1,
        repeats: 20,
        seed: 0x00C0_FFEE,
        json: false,
    };

    while let Some(a) = args.next() {
        match a.as_str() {
            "--sizes" => {
                let v = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --sizes (e.g. 4096,65536)"))?;
                out.sizes = v
                    .split(',')
                    .map(|s| {
                        s.trim()
                            .parse::<usize>()
                            .with_context(|| format!("parse --sizes element '{s}'"))
                    })
                    .collect::<anyhow::Result<_>>()?;
            }
            "--iterations" => out.iterations = parse_u32(args.next(), "--iterations")?,
            "--warmup" => out.warmup = parse_u32(args.next(), "--warmup")?,
            "--repeats" => out.repeats = parse_u32(args.next(), "--repeats")?,
            "--seed" => {
                let v = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --seed"))?;
                out.seed = v
                    .parse::<u64>()
                    .with_context(|| format!("parse --seed value '{v}'"))?;
            }
            "--json" => out.json = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => anyhow::bail!("unknown arg '{a}' (try --help)"),
        }
    }

    Ok(out)
}

fn print_help() {
    eprintln!(
        r#"pixmix-bench

Sweeps every installed accelerated kernel against the generic reference over
a range of buffer sizes and reports p50/p90/p99 throughput per combination.

Usage:
  cargo run -q --release
  cargo run -q --release -- --sizes 4096,1048576 --repeats 50
  cargo run -q --release -- --json

Args:
  --sizes A,B,...  pixel counts per buffer (default 4096,65536,1048576)
  --iterations N   timed kernel invocations per measurement (default 16)
  --warmup N       unrecorded sweeps before measuring (default 1)
  --repeats N      recorded sweeps per size (default 20)
  --seed N         base seed for the random pixel data (default 12648430)
  --json           emit the aggregated numbers as JSON on stdout
"#
    );
}

fn parse_u32(v: Option<String>, flag: &str) -> anyhow::Result<u32> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<u32>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}
