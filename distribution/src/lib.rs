//! A belief network: a set of [`factor::Factor`]s whose conditioned
//! arguments partition the full argument space, composed into a single
//! queryable joint distribution.
//!
//! [`Distribution`] owns the factors, answers `P(arg)` belief queries by
//! combining exactly the factors needed to resolve an argument's transitive
//! conditioning closure, and caches each answer until the owning factor (or
//! one of its conditioning ancestors) is refined again.

#![warn(
    unused_import_braces,
    trivial_casts,
    trivial_numeric_casts,
    unused_qualifications,
    variant_size_differences,
    missing_docs
)]
#![deny(unsafe_code)]

mod distribution;
mod error;

pub use crate::distribution::Distribution;
pub use crate::error::DistributionError;
pub use factor::{Arg, Factor, Workforce};

/// A result type specialized to [`DistributionError`].
pub type Result<T> = core::result::Result<T, DistributionError>;
