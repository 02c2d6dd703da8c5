//! Manual override protocol.
//!
//! A human (or any UI acting for one) drives the merge state through a small
//! set of synchronous commands. Each command is applied atomically: it either
//! succeeds and returns the updated state, or fails and leaves the state
//! untouched. Every command is expressed through [`MergeState::merge`] and
//! [`MergeState::reject`], so manual and automated histories have the same shape.

use super::merge::{MergeEngine, MergeRecord, MergeState};
use super::util;
use crate::error::{Error, Result};

/// Which state a reset returns to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResetMode {
    /// The result of the automatic merge.
    Automated,
    /// The pre-merge initial clusters.
    Initial,
}

/// A state-changing command.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Reinitialize the working state.
    Reset(ResetMode),
    /// Replay the merge from the initial clusters with a new cutoff.
    SetCutoff(f64),
    /// Merge two live clusters.
    Merge(usize, usize),
    /// Delete a live cluster.
    Reject(usize),
}

/// Frozen result of a session.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Finalized {
    /// Final unit per spike: `1..=units`, or 0 for rejected spikes.
    pub labels: Vec<usize>,
    /// Final unit per initial cluster id: survivors get their own unit,
    /// merged-away ids their survivor's, rejected ids 0.
    pub id_map: Vec<usize>,
    /// Number of final units.
    pub units: usize,
    /// Mean-waveform RMS per unit; `rms[u - 1]` belongs to unit `u`, ascending.
    pub rms: Vec<f64>,
    /// Merge history that produced the result.
    pub history: Vec<MergeRecord>,
}

/// Core side of the interactive merge boundary for one electrode.
#[derive(Clone, Debug)]
pub struct Session {
    initial: MergeState,
    automated: MergeState,
    current: MergeState,
    cutoff: f64,
    waveforms: Vec<Vec<f32>>,
}

impl Session {
    /// Start a session at the automated state.
    pub fn new(initial: MergeState, automated: MergeState, cutoff: f64, waveforms: Vec<Vec<f32>>) -> Result<Self> {
        let spikes = initial.assignment().len();
        if waveforms.len() != spikes || automated.assignment().len() != spikes {
            return Err(Error::WaveformMismatch {
                spikes,
                waveforms: waveforms.len(),
            });
        }
        util::check_dimensions(&waveforms)?;
        Ok(Self {
            current: automated.clone(),
            initial,
            automated,
            cutoff,
            waveforms,
        })
    }

    /// Current working state.
    pub fn state(&self) -> &MergeState {
        &self.current
    }

    /// Cutoff the current state was produced with.
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Apply one command.
    pub fn apply(&mut self, command: Command) -> Result<&MergeState> {
        tracing::debug!(?command, "session command");
        match command {
            Command::Reset(mode) => Ok(self.reset(mode)),
            Command::SetCutoff(value) => self.set_cutoff(value),
            Command::Merge(a, b) => self.merge(a, b),
            Command::Reject(cluster) => self.reject(cluster),
        }
    }

    /// Reinitialize from the automated or the initial state.
    ///
    /// A reset to the initial state leaves the recorded cutoff unchanged.
    pub fn reset(&mut self, mode: ResetMode) -> &MergeState {
        self.current = match mode {
            ResetMode::Automated => self.automated.clone(),
            ResetMode::Initial => self.initial.clone(),
        };
        &self.current
    }

    /// Replay the merge engine from the initial clusters up to `value`.
    ///
    /// The result depends only on the initial state and `value`.
    pub fn set_cutoff(&mut self, value: f64) -> Result<&MergeState> {
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidParameter {
                name: "cutoff",
                message: "must be in [0, 1]",
            });
        }
        let mut replay = self.initial.clone();
        MergeEngine::new(value).run(&mut replay)?;
        self.current = replay;
        self.cutoff = value;
        Ok(&self.current)
    }

    /// Merge two live clusters by hand.
    pub fn merge(&mut self, a: usize, b: usize) -> Result<&MergeState> {
        self.current.merge(a, b)?;
        Ok(&self.current)
    }

    /// Reject a live cluster.
    pub fn reject(&mut self, cluster: usize) -> Result<&MergeState> {
        self.current.reject(cluster)?;
        Ok(&self.current)
    }

    /// Freeze the current state and renumber survivors `1..=K` by ascending
    /// mean-waveform RMS (ties by id).
    pub fn finalize(&self) -> Result<Finalized> {
        let state = &self.current;
        let c = state.n_clusters();
        let samples = self.waveforms[0].len();

        let mut sums = vec![vec![0.0f64; samples]; c];
        let mut counts = vec![0usize; c];
        for (wave, &label) in self.waveforms.iter().zip(state.assignment()) {
            counts[label] += 1;
            for (acc, &x) in sums[label].iter_mut().zip(wave) {
                *acc += f64::from(x);
            }
        }

        let mut survivors: Vec<(usize, f64)> = state
            .live_clusters()
            .into_iter()
            .map(|cl| {
                let rms = if counts[cl] == 0 {
                    0.0
                } else {
                    let inv = 1.0 / counts[cl] as f64;
                    let sq: f64 = sums[cl].iter().map(|s| (s * inv) * (s * inv)).sum();
                    (sq / samples as f64).sqrt()
                };
                (cl, rms)
            })
            .collect();
        survivors.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let mut unit_of = vec![0usize; c];
        for (rank, &(cl, _)) in survivors.iter().enumerate() {
            unit_of[cl] = rank + 1;
        }

        let mut absorbed_into: Vec<Option<usize>> = vec![None; c];
        for rec in state.history() {
            absorbed_into[rec.absorbed] = Some(rec.survivor);
        }
        let id_map: Vec<usize> = (0..c)
            .map(|mut id| {
                while let Some(next) = absorbed_into[id] {
                    id = next;
                }
                unit_of[id]
            })
            .collect();

        let labels = state.assignment().iter().map(|&l| unit_of[l]).collect();

        tracing::info!(
            units = survivors.len(),
            merges = state.history().len(),
            "session finalized"
        );

        Ok(Finalized {
            labels,
            id_map,
            units: survivors.len(),
            rms: survivors.iter().map(|&(_, r)| r).collect(),
            history: state.history().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::triangular::TriMatrix;

    /// Three clusters of two spikes; 0 and 1 are strongly connected.
    fn session() -> Session {
        let e = TriMatrix::from_dense(&[
            vec![1.0, 3.6, 0.0],
            vec![3.6, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ]);
        let assignment = vec![0, 0, 1, 1, 2, 2];
        let initial = MergeState::new(e, vec![2, 2, 2], assignment).unwrap();
        let mut automated = initial.clone();
        MergeEngine::new(0.5).run(&mut automated).unwrap();
        let waveforms = vec![
            vec![3.0, 3.0],
            vec![3.0, 3.0],
            vec![3.0, 3.0],
            vec![3.0, 3.0],
            vec![1.0, -1.0],
            vec![1.0, -1.0],
        ];
        Session::new(initial, automated, 0.5, waveforms).unwrap()
    }

    #[test]
    fn starts_at_automated_state_and_resets() {
        let mut s = session();
        assert_eq!(s.state().live_count(), 2);
        assert_eq!(s.reset(ResetMode::Initial).live_count(), 3);
        assert!(s.state().history().is_empty());
        assert_eq!(s.apply(Command::Reset(ResetMode::Automated)).unwrap().live_count(), 2);
    }

    #[test]
    fn set_cutoff_replays_from_initial() {
        let mut s = session();
        s.reject(2).unwrap();
        let state = s.set_cutoff(0.95).unwrap();
        assert_eq!(state.live_count(), 3);
        assert!(!state.is_rejected(2));
        let state = s.set_cutoff(0.0).unwrap();
        assert_eq!(state.live_count(), 1);
        assert_eq!(s.cutoff(), 0.0);
        assert!(s.set_cutoff(1.5).is_err());
        assert_eq!(s.cutoff(), 0.0);
    }

    #[test]
    fn manual_commands_check_liveness() {
        let mut s = session();
        assert!(matches!(s.apply(Command::Merge(0, 1)), Err(Error::StaleReference { cluster: 1 })));
        assert!(matches!(s.apply(Command::Reject(1)), Err(Error::StaleReference { cluster: 1 })));
        let state = s.apply(Command::Merge(2, 0)).unwrap();
        assert_eq!(state.history().last(), Some(&MergeRecord { survivor: 0, absorbed: 2 }));
    }

    #[test]
    fn apply_set_cutoff_replays() {
        let mut s = session();
        assert_eq!(s.apply(Command::SetCutoff(0.0)).unwrap().live_count(), 1);
        assert_eq!(s.cutoff(), 0.0);
        assert_eq!(s.apply(Command::SetCutoff(0.95)).unwrap().live_count(), 3);
        assert!(matches!(
            s.apply(Command::SetCutoff(-0.5)),
            Err(Error::InvalidParameter { name: "cutoff", .. })
        ));
        assert_eq!(s.cutoff(), 0.95);
    }

    #[test]
    fn apply_reject_removes_live_cluster() {
        let mut s = session();
        let state = s.apply(Command::Reject(2)).unwrap();
        assert!(state.is_rejected(2));
        assert_eq!(state.live_clusters(), vec![0]);
        assert!(matches!(s.apply(Command::Reject(2)), Err(Error::StaleReference { cluster: 2 })));
        assert_eq!(s.finalize().unwrap().id_map, vec![1, 1, 0]);
    }

    #[test]
    fn finalize_orders_units_by_rms() {
        let s = session();
        let f = s.finalize().unwrap();
        assert_eq!(f.units, 2);
        // Cluster 2 has the smaller mean waveform (RMS 1) and becomes unit 1.
        assert_eq!(f.id_map, vec![2, 2, 1]);
        assert_eq!(f.labels, vec![2, 2, 2, 2, 1, 1]);
        assert!((f.rms[0] - 1.0).abs() < 1e-12);
        assert!((f.rms[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn finalize_maps_rejected_clusters_to_zero() {
        let mut s = session();
        s.reject(0).unwrap();
        let f = s.finalize().unwrap();
        assert_eq!(f.units, 1);
        assert_eq!(f.id_map, vec![0, 0, 1]);
        assert_eq!(f.labels, vec![0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn waveform_count_must_match() {
        let s = session();
        let err = Session::new(s.initial.clone(), s.automated.clone(), 0.5, vec![vec![0.0]]);
        assert!(matches!(err, Err(Error::WaveformMismatch { spikes: 6, waveforms: 1 })));
    }
}
