//! The regression / benchmark harness: the acceptance gate for accelerated
//! kernels. For every dispatch-table entry whose installed kernel is not
//! the generic one, it drives both kernels over identical seeded random
//! buffers, compares the outputs per channel (unmasked and masked), and
//! measures throughput of each side.

use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::context::CompositeContext;
use crate::error::PixmixResult;
use crate::format::PixelFormat;
use crate::op::CompositeOperation;
use crate::registry::CompositeRegistry;

#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Pixels per generated buffer.
    pub pixels: usize,
    /// Timing iterations per side.
    pub iterations: u32,
    /// Base seed; each case derives its own stream from it.
    pub seed: u64,
    /// Maximum allowed per-channel difference. The shipped kernel sets are
    /// bit-exact, so the default is 0; a set with documented rounding slack
    /// raises this.
    pub max_channel_delta: u8,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            pixels: 1 << 16,
            iterations: 16,
            seed: 0x00C0_FFEE,
            max_channel_delta: 0,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct CaseReport {
    pub op: CompositeOperation,
    pub format_a: PixelFormat,
    pub format_b: PixelFormat,
    pub format_d: PixelFormat,
    /// Name of the set that installed the kernel under test.
    pub set: String,
    pub pass: bool,
    pub masked_pass: bool,
    /// Largest per-channel difference observed in the unmasked comparison.
    pub max_delta: u8,
    /// Reference kernel throughput, megapixels per second.
    pub generic_mpps: f64,
    /// Accelerated kernel throughput, megapixels per second.
    pub accelerated_mpps: f64,
    pub speedup: f64,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.pass && self.masked_pass
    }
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct HarnessReport {
    pub cases: Vec<CaseReport>,
    pub failures: usize,
}

impl HarnessReport {
    pub fn all_passed(&self) -> bool {
        self.failures == 0
    }
}

/// Runs the regression/benchmark sweep: `accelerated` is the registry under
/// test, `baseline` a generic-only registry. Entries whose installed kernel
/// is the generic one are skipped — there is nothing to compare.
#[tracing::instrument(level = "debug", skip_all)]
pub fn run(
    accelerated: &CompositeRegistry,
    baseline: &CompositeRegistry,
    config: &HarnessConfig,
) -> PixmixResult<HarnessReport> {
    let mut report = HarnessReport::default();
    let mut case_index = 0u64;

    for op in CompositeOperation::ALL {
        for format_a in PixelFormat::ALL {
            for format_b in PixelFormat::ALL {
                for format_d in PixelFormat::ALL {
                    let Some(set) = accelerated.kernel_source(op, format_a, format_b, format_d)
                    else {
                        continue;
                    };
                    if set == "generic" {
                        continue;
                    }
                    case_index += 1;
                    let case = run_case(
                        accelerated,
                        baseline,
                        config,
                        Case {
                            op,
                            format_a,
                            format_b,
                            format_d,
                            set,
                            seed: config
                                .seed
                                .wrapping_add(case_index.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
                        },
                    )?;
                    if !case.passed() {
                        report.failures += 1;
                    }
                    report.cases.push(case);
                }
            }
        }
    }
    debug!(
        cases = report.cases.len(),
        failures = report.failures,
        "harness sweep complete"
    );
    Ok(report)
}

struct Case {
    op: CompositeOperation,
    format_a: PixelFormat,
    format_b: PixelFormat,
    format_d: PixelFormat,
    set: &'static str,
    seed: u64,
}

fn run_case(
    accelerated: &CompositeRegistry,
    baseline: &CompositeRegistry,
    config: &HarnessConfig,
    case: Case,
) -> PixmixResult<CaseReport> {
    let mut rng = SmallRng::seed_from_u64(case.seed);
    let pixels = config.pixels;

    let mut src_a = vec![0u8; pixels * case.format_a.bytes_per_pixel()];
    let mut src_b = vec![0u8; pixels * case.format_b.bytes_per_pixel()];
    let mut dst_init = vec![0u8; pixels * case.format_d.bytes_per_pixel()];
    let mut mask = vec![0u8; pixels];
    rng.fill(&mut src_a[..]);
    rng.fill(&mut src_b[..]);
    rng.fill(&mut dst_init[..]);
    rng.fill(&mut mask[..]);

    // Scale ignores B and consumes the factor instead; keep it off the
    // trivial endpoints.
    let scale = 0.5;

    let run_once = |registry: &CompositeRegistry,
                    dst: &mut [u8],
                    mask: Option<&[u8]>|
     -> PixmixResult<()> {
        let mut ctx = CompositeContext::contiguous(
            case.format_a,
            case.format_b,
            case.format_d,
            pixels,
            &src_a,
            &src_b,
            dst,
        )
        .with_scale(scale);
        if let Some(mask) = mask {
            ctx = ctx.with_mask(mask);
        }
        registry.composite(case.op, &mut ctx)
    };

    // Correctness, unmasked.
    let mut dst_generic = dst_init.clone();
    let mut dst_accel = dst_init.clone();
    run_once(baseline, &mut dst_generic, None)?;
    run_once(accelerated, &mut dst_accel, None)?;
    let max_delta = max_channel_delta(&dst_generic, &dst_accel);
    let pass = max_delta <= config.max_channel_delta;

    // Correctness under a mask (accelerated kernels may take a different
    // path here, typically the generic fallback).
    let mut dst_generic_masked = dst_init.clone();
    let mut dst_accel_masked = dst_init.clone();
    run_once(baseline, &mut dst_generic_masked, Some(&mask))?;
    run_once(accelerated, &mut dst_accel_masked, Some(&mask))?;
    let masked_pass =
        max_channel_delta(&dst_generic_masked, &dst_accel_masked) <= config.max_channel_delta;

    // Throughput, both sides over identical data.
    let generic_mpps = measure(config, pixels, || {
        run_once(baseline, &mut dst_generic, None)
    })?;
    let accelerated_mpps = measure(config, pixels, || {
        run_once(accelerated, &mut dst_accel, None)
    })?;

    Ok(CaseReport {
        op: case.op,
        format_a: case.format_a,
        format_b: case.format_b,
        format_d: case.format_d,
        set: case.set.to_string(),
        pass,
        masked_pass,
        max_delta,
        generic_mpps,
        accelerated_mpps,
        speedup: if generic_mpps > 0.0 {
            accelerated_mpps / generic_mpps
        } else {
            0.0
        },
    })
}

fn max_channel_delta(a: &[u8], b: &[u8]) -> u8 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.abs_diff(*y))
        .max()
        .unwrap_or(0)
}

fn measure(
    config: &HarnessConfig,
    pixels: usize,
    mut f: impl FnMut() -> PixmixResult<()>,
) -> PixmixResult<f64> {
    // One warmup pass keeps first-touch costs out of the measurement.
    f()?;
    let start = Instant::now();
    for _ in 0..config.iterations {
        f()?;
    }
    let secs = start.elapsed().as_secs_f64().max(1e-9);
    Ok(pixels as f64 * f64::from(config.iterations) / secs / 1e6)
}
