use thiserror::Error;

/// Errors raised for malformed input models or unimplemented cost-model
/// combinations. Solver non-convergence is reported through result flags
/// and diagnostics, never through this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("more than one slack/reference bus")]
    MultipleReferenceBuses,

    #[error("{kind} {index} references unknown bus {bus}")]
    BusNotFound {
        kind: &'static str,
        index: usize,
        bus: usize,
    },

    #[error("generators mix polynomial and piecewise linear cost models")]
    MixedCostModels,

    #[error("piecewise linear cost objective is not implemented")]
    PwlCostUnimplemented,

    #[error("case contains no buses")]
    NoBuses,
}
