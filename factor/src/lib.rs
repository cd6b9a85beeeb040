//! Dense conditional probability tables ("factors") over small sets of
//! binary-valued arguments, and the three primitive operations used to
//! build and query a factorized joint distribution on top of them:
//! [`Factor::refine`], [`Factor::marginalize`] and [`Factor::combine`].
//!
//! A factor represents `P(conditioned | conditioning)` as a dense table
//! indexed by the binary encoding of a world: bit `k` of the index is the
//! truth value of the argument mapped to bit position `k`. All three
//! operations are expressed as a sweep over `0..2^size` and, above
//! [`PARALLEL_THRESHOLD`], run as a scoped `rayon` fan-out instead of a
//! single loop (see [`workforce`] and [`Factor::refine`] for the
//! partitioning scheme that keeps those sweeps race-free).

#![warn(
    unused_import_braces,
    trivial_casts,
    trivial_numeric_casts,
    unused_qualifications,
    variant_size_differences,
    missing_docs
)]
#![deny(unsafe_code)]

mod error;
mod factor;
pub mod workforce;

pub use crate::error::FactorError;
pub use crate::factor::{Arg, Factor, PARALLEL_THRESHOLD};
pub use crate::workforce::Workforce;

/// A result type specialized to [`FactorError`].
pub type Result<T> = core::result::Result<T, FactorError>;

/// The number of usable bits in the index type used to enumerate worlds.
///
/// Construction and combination fail with [`FactorError::CapacityExceeded`]
/// once a factor's `size` would exceed `INDEX_WIDTH - 2`, reserving two
/// bits of headroom the way the original design did for its own index
/// arithmetic.
pub const INDEX_WIDTH: u32 = usize::BITS;
