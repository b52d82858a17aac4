//! The dispatch table: a dense (operation, format A, format B, format D)
//! lookup resolving to the currently installed kernel, plus the kernel-set
//! installer that patches it.
//!
//! Lifecycle: build a registry, run the generic install, then the
//! accelerated installs in [`accelerated_sets`] order (most general first,
//! so last-writer-wins leaves the most capable kernel active), all on one
//! thread. After that the registry is read-only and safe to share across
//! worker threads; `composite` takes `&self` and the kernels hold no state.

use tracing::debug;

use crate::context::CompositeContext;
use crate::error::{PixmixError, PixmixResult};
use crate::format::PixelFormat;
use crate::generic;
use crate::op::CompositeOperation;

/// A compositing kernel: mutates the context's destination buffer in place.
/// Kernels are stateless and assume a validated context.
pub type Kernel = fn(&mut CompositeContext<'_>);

/// One dispatch-table row of an accelerated set.
pub struct KernelEntry {
    pub op: CompositeOperation,
    pub format_a: PixelFormat,
    pub format_b: PixelFormat,
    pub format_d: PixelFormat,
    pub kernel: Kernel,
}

/// A named group of kernels gated by a single capability predicate. The set
/// installs as a unit: either the probe passes and every entry is patched
/// in, or the table is left untouched.
pub struct KernelSet {
    pub name: &'static str,
    /// Pure, idempotent CPU capability probe.
    pub detect: fn() -> bool,
    pub entries: &'static [KernelEntry],
}

#[derive(Clone, Copy)]
struct Slot {
    kernel: Kernel,
    source: &'static str,
}

type FormatCube = [[[Option<Slot>; PixelFormat::COUNT]; PixelFormat::COUNT]; PixelFormat::COUNT];

pub struct CompositeRegistry {
    table: Box<[FormatCube; CompositeOperation::COUNT]>,
}

impl CompositeRegistry {
    /// An empty table: every lookup misses until an install runs.
    pub fn new() -> Self {
        Self {
            table: Box::new(
                [[[[None; PixelFormat::COUNT]; PixelFormat::COUNT]; PixelFormat::COUNT];
                    CompositeOperation::COUNT],
            ),
        }
    }

    /// A registry holding only the portable reference kernels.
    pub fn generic() -> Self {
        let mut registry = Self::new();
        registry.install_generic();
        registry
    }

    /// The intended startup path: generic install followed by every
    /// accelerated set whose capability probe passes, in order.
    pub fn with_best_available() -> Self {
        let mut registry = Self::generic();
        for set in accelerated_sets() {
            registry.install(set);
        }
        registry
    }

    /// Fills every (operation, format triple) slot with the reference
    /// kernel. After this, `resolve` never misses.
    pub fn install_generic(&mut self) {
        for op in CompositeOperation::ALL {
            let slot = Some(Slot {
                kernel: generic::kernel_for(op),
                source: "generic",
            });
            for a in PixelFormat::ALL {
                for b in PixelFormat::ALL {
                    for d in PixelFormat::ALL {
                        self.table[op as usize][a as usize][b as usize][d as usize] = slot;
                    }
                }
            }
        }
        debug!("installed generic kernel set");
    }

    /// Runs the set's capability probe; on success overwrites the listed
    /// entries and returns `true`. A failed probe leaves the table
    /// untouched and returns `false` — that is a normal negative result,
    /// not an error.
    pub fn install(&mut self, set: &KernelSet) -> bool {
        if !(set.detect)() {
            debug!(set = set.name, "capability not present, kernel set skipped");
            return false;
        }
        for entry in set.entries {
            self.table[entry.op as usize][entry.format_a as usize][entry.format_b as usize]
                [entry.format_d as usize] = Some(Slot {
                kernel: entry.kernel,
                source: set.name,
            });
        }
        debug!(
            set = set.name,
            entries = set.entries.len(),
            "installed kernel set"
        );
        true
    }

    /// O(1) lookup of the active kernel for a combination.
    pub fn resolve(
        &self,
        op: CompositeOperation,
        format_a: PixelFormat,
        format_b: PixelFormat,
        format_d: PixelFormat,
    ) -> Option<Kernel> {
        self.slot(op, format_a, format_b, format_d).map(|s| s.kernel)
    }

    /// Name of the set that installed the active kernel for a combination
    /// (`"generic"`, `"sse2"`, ...). Used by the regression harness to find
    /// the entries worth comparing.
    pub fn kernel_source(
        &self,
        op: CompositeOperation,
        format_a: PixelFormat,
        format_b: PixelFormat,
        format_d: PixelFormat,
    ) -> Option<&'static str> {
        self.slot(op, format_a, format_b, format_d).map(|s| s.source)
    }

    fn slot(
        &self,
        op: CompositeOperation,
        format_a: PixelFormat,
        format_b: PixelFormat,
        format_d: PixelFormat,
    ) -> Option<Slot> {
        self.table[op as usize][format_a as usize][format_b as usize][format_d as usize]
    }

    /// Resolves, validates, and runs one composite synchronously. Errors
    /// are detected here, once per call; kernels themselves have no error
    /// path (saturation defines the numeric edge cases away).
    pub fn composite(
        &self,
        op: CompositeOperation,
        ctx: &mut CompositeContext<'_>,
    ) -> PixmixResult<()> {
        let Some(kernel) = self.resolve(op, ctx.format_a, ctx.format_b, ctx.format_d) else {
            return Err(PixmixError::UnsupportedCombination {
                op,
                format_a: ctx.format_a,
                format_b: ctx.format_b,
                format_d: ctx.format_d,
            });
        };
        ctx.validate(op)?;
        if ctx.width == 0 || ctx.rows == 0 {
            return Ok(());
        }
        kernel(ctx);
        Ok(())
    }
}

impl Default for CompositeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The accelerated sets this build knows, in install order: most general
/// capability first, most specific last, so last-writer-wins favors the
/// best available acceleration.
pub fn accelerated_sets() -> &'static [&'static KernelSet] {
    #[cfg(target_arch = "x86_64")]
    static ACCELERATED: [&KernelSet; 2] = [&crate::simd_x86::SSE2, &crate::simd_x86::AVX2];
    #[cfg(not(target_arch = "x86_64"))]
    static ACCELERATED: [&KernelSet; 0] = [];

    &ACCELERATED
}
