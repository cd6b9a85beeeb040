use core::fmt;

/// An error that can occur while constructing or operating on a [`crate::Factor`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum FactorError {
    /// A factor (initial, or the result of `combine`) would need more bits
    /// of index than are available.
    CapacityExceeded,
    /// `refine` targets an argument that is in the conditioning set, not
    /// the conditioned set.
    ArgumentNotConditioned,
    /// An operation referenced an argument absent from the factor's mapping.
    UnknownArgument,
    /// An argument identifier appeared more than once across a factor's
    /// conditioned/conditioning lists.
    DuplicateArgument,
    /// An explicit table's length did not equal `2^size`.
    ShapeMismatch,
}

impl fmt::Display for FactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorError::CapacityExceeded => write!(f, "factor would exceed the maximum index width"),
            FactorError::ArgumentNotConditioned => {
                write!(f, "only conditioned arguments can be refined")
            }
            FactorError::UnknownArgument => write!(f, "argument is not part of this factor"),
            FactorError::DuplicateArgument => {
                write!(f, "argument appears more than once in this factor")
            }
            FactorError::ShapeMismatch => {
                write!(f, "probability table length does not match the factor's size")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FactorError {}
