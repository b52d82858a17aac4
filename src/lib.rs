//! pixmix is a CPU pixel compositing engine.
//!
//! Two source buffers, a destination buffer, and a blend mode go in; the
//! destination comes back mutated in place. A [`CompositeRegistry`] maps
//! every (operation, format triple) to the kernel currently installed for
//! it: the portable reference kernels fill the whole table, and runtime
//! CPU capability probes patch in SIMD kernels where the hardware allows.
//!
//! - Build a registry once at startup with
//!   [`CompositeRegistry::with_best_available`]
//! - Call [`CompositeRegistry::composite`] with a [`CompositeContext`]
//! - Validate new accelerated kernels with the [`harness`] module
#![deny(unsafe_op_in_unsafe_fn)]

pub mod context;
pub mod error;
pub mod format;
pub mod harness;
pub mod op;
pub mod registry;

mod generic;
#[cfg(target_arch = "x86_64")]
mod simd_x86;

pub use context::CompositeContext;
pub use error::{PixmixError, PixmixResult};
pub use format::PixelFormat;
pub use harness::{CaseReport, HarnessConfig, HarnessReport};
pub use op::CompositeOperation;
pub use registry::{CompositeRegistry, Kernel, KernelEntry, KernelSet, accelerated_sets};
