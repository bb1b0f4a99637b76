use crate::game::clock::ClockSample;
use crate::game::note::LANE_COUNT;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One press or release, stamped with the chart position it happened at.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputEdge {
    pub column: usize,
    pub pressed: bool,
    pub sec: f64,
    pub beat: f64,
}

pub type InputEdges = SmallVec<[InputEdge; LANE_COUNT]>;

/// Turns per-frame column snapshots into edges. Each physical transition
/// yields exactly one edge, no matter how many frames it stays down.
#[derive(Copy, Clone, Debug, Default)]
pub struct InputTracker {
    held: [bool; LANE_COUNT],
}

impl InputTracker {
    #[inline(always)]
    pub fn held(&self) -> [bool; LANE_COUNT] {
        self.held
    }

    pub fn diff(&mut self, snapshot: [bool; LANE_COUNT], at: ClockSample) -> InputEdges {
        let mut edges = InputEdges::new();
        for (column, (&now, was)) in snapshot.iter().zip(self.held.iter_mut()).enumerate() {
            if now != *was {
                *was = now;
                edges.push(InputEdge {
                    column,
                    pressed: now,
                    sec: at.sec,
                    beat: at.beat,
                });
            }
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::InputTracker;
    use crate::game::clock::ClockSample;

    const AT: ClockSample = ClockSample { sec: 1.0, beat: 2.0 };

    #[test]
    fn sustained_press_yields_one_edge() {
        let mut tracker = InputTracker::default();
        let edges = tracker.diff([true, false, false, false], AT);
        assert_eq!(edges.len(), 1);
        assert!(edges[0].pressed);
        assert_eq!(edges[0].beat, 2.0);
        assert!(tracker.diff([true, false, false, false], AT).is_empty());
    }

    #[test]
    fn release_and_press_in_one_frame() {
        let mut tracker = InputTracker::default();
        tracker.diff([true, false, false, false], AT);
        let edges = tracker.diff([false, false, true, true], AT);
        let summary: Vec<(usize, bool)> = edges.iter().map(|e| (e.column, e.pressed)).collect();
        assert_eq!(summary, vec![(0, false), (2, true), (3, true)]);
        assert_eq!(tracker.held(), [false, false, true, true]);
    }
}
