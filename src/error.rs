use thiserror::Error;

/// Errors returned by the sorting pipeline and the manual override session.
#[derive(Debug, Error)]
pub enum Error {
    /// Input slice is empty.
    #[error("empty input")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Feature vectors in a dataset have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// A command referred to a cluster that is merged away, rejected, or out of range.
    #[error("stale reference: cluster {cluster} is not live")]
    StaleReference {
        /// The offending cluster id.
        cluster: usize,
    },

    /// A merge named the same cluster twice.
    #[error("cannot merge cluster {cluster} with itself")]
    SelfMerge {
        /// The cluster id given for both sides.
        cluster: usize,
    },

    /// Too few connection strengths to bootstrap a cutoff, and the fallback is `Fail`.
    #[error("bootstrap underdetermined: {pairs} cluster pairs, need at least {required}")]
    UnderdeterminedBootstrap {
        /// Live off-diagonal pairs available.
        pairs: usize,
        /// Minimum configured via `min_pairs`.
        required: usize,
    },

    /// Waveform count does not match the spike count of the session.
    #[error("waveform mismatch: {spikes} spikes but {waveforms} waveforms")]
    WaveformMismatch {
        /// Number of spikes in the assignment.
        spikes: usize,
        /// Number of waveforms supplied.
        waveforms: usize,
    },

    /// Numerical setup failure (e.g. constructing a distribution).
    #[error("numerical error: {0}")]
    Numerical(String),
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
