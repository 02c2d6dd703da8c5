//! Offline spike sorting by interface energy.
//!
//! `spikemerge` groups spike feature vectors from one electrode into putative
//! neurons. The primary public API is under [`sort`], which provides:
//! - an over-segmenting initial clusterer (recursive bisection)
//! - interface-energy and connection-strength matrices
//! - a BCa bootstrap merge cutoff
//! - an incremental greedy merge engine and a manual override session

#![forbid(unsafe_code)]

pub mod error;
pub mod sort;

pub use error::{Error, Result};
pub use sort::{
    sort_electrode, sort_electrodes, Bisect, Command, ConnectionStrength, CutoffEstimator, CutoffParams,
    ElectrodeData, ElectrodeSort, Finalized, InterfaceEnergy, MergeEngine, MergeState, ResetMode, Session,
    SortConfig,
};
