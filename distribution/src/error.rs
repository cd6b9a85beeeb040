use core::fmt;

use factor::FactorError;

/// An error that can occur while building or querying a [`crate::Distribution`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum DistributionError {
    /// An argument was queried or refined that no factor in the
    /// distribution conditions on, or a factor index was out of range.
    UnknownArgument,
    /// An argument was registered as conditioned by more than one factor.
    DuplicateConditioned,
    /// A query's conditioning closure could not be resolved because a
    /// referenced conditioning argument has no owning factor.
    UnresolvedConditioning,
    /// `fast_refine` was called for an argument whose belief cache is not
    /// currently valid.
    CacheInvalid,
    /// The underlying factor operation failed.
    Factor(FactorError),
}

impl fmt::Display for DistributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionError::UnknownArgument => write!(f, "argument is not owned by any factor in this distribution"),
            DistributionError::DuplicateConditioned => {
                write!(f, "argument is conditioned by more than one factor")
            }
            DistributionError::UnresolvedConditioning => {
                write!(f, "a conditioning argument has no owning factor")
            }
            DistributionError::CacheInvalid => {
                write!(f, "cannot fast-refine an argument whose belief cache is invalid")
            }
            DistributionError::Factor(inner) => write!(f, "factor operation failed: {inner}"),
        }
    }
}

impl From<FactorError> for DistributionError {
    fn from(inner: FactorError) -> Self {
        DistributionError::Factor(inner)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DistributionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DistributionError::Factor(inner) => Some(inner),
            _ => None,
        }
    }
}
