use crate::game::parsing::ChartError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// Beats per measure in 4/4 charts; every measure spans exactly this many beats.
pub const BEATS_PER_MEASURE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmChange {
    pub beat: f64,
    pub bpm: f64,
    /// Derived by `TimingData::new`, never authored.
    pub sec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub beat: f64,
    /// Length of the freeze in seconds.
    pub len: f64,
    /// Time at which the freeze begins. Derived like `BpmChange::sec`.
    pub sec: f64,
}

/// Beat <-> second mapping for one chart.
///
/// Stops make the mapping non-invertible: a single beat covers a whole
/// stretch of time, so `sec_to_beat` is flat over `[stop.sec, stop.sec + len]`
/// while `beat_to_sec` jumps by `len` right after the stop's beat. Round trips
/// are exact everywhere else. Gameplay relies on this asymmetry (a note on a
/// stop's beat is judged against the moment the freeze begins), so it stays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingData {
    bpms: Vec<BpmChange>,
    stops: Vec<Stop>,
}

#[inline(always)]
fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Less)
}

impl TimingData {
    /// Builds the mapping from raw `(beat, bpm)` and `(beat, seconds)` pairs.
    ///
    /// Both lists are stably sorted by beat, so entries sharing a beat keep
    /// document order and the later one wins lookups. `sec` fields are filled
    /// in a single forward pass.
    pub fn new(bpms: &[(f64, f64)], stops: &[(f64, f64)]) -> Result<Self, ChartError> {
        let mut bpms: Vec<BpmChange> = bpms
            .iter()
            .map(|&(beat, bpm)| BpmChange { beat, bpm, sec: 0.0 })
            .collect();
        bpms.sort_by(|a, b| cmp_f64(a.beat, b.beat));
        match bpms.first() {
            Some(first) if first.beat == 0.0 => {}
            _ => return Err(ChartError::NoInitialBpm),
        }

        let mut stops: Vec<Stop> = stops
            .iter()
            .map(|&(beat, len)| Stop { beat, len, sec: 0.0 })
            .collect();
        stops.sort_by(|a, b| cmp_f64(a.beat, b.beat));

        // Forward pass: each change starts where the previous segment ends,
        // plus any freezes that sit inside the previous segment.
        let mut stop_idx = 0usize;
        for i in 1..bpms.len() {
            let prev = bpms[i - 1];
            let mut sec = prev.sec + (bpms[i].beat - prev.beat) * 60.0 / prev.bpm;
            while stop_idx < stops.len() && stops[stop_idx].beat < bpms[i].beat {
                if stops[stop_idx].beat >= prev.beat {
                    sec += stops[stop_idx].len;
                }
                stop_idx += 1;
            }
            bpms[i].sec = sec;
        }

        let mut timing = Self { bpms, stops };
        for i in 0..timing.stops.len() {
            timing.stops[i].sec = timing.beat_to_sec(timing.stops[i].beat);
        }
        Ok(timing)
    }

    #[inline(always)]
    pub fn bpm_changes(&self) -> &[BpmChange] {
        &self.bpms
    }

    #[inline(always)]
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    // Last segment whose beat is <= target; ties resolve to the latest entry.
    #[inline(always)]
    fn segment_for_beat(&self, beat: f64) -> &BpmChange {
        let idx = self.bpms.partition_point(|p| p.beat <= beat);
        &self.bpms[idx.saturating_sub(1)]
    }

    #[inline(always)]
    fn segment_for_sec(&self, sec: f64) -> &BpmChange {
        let idx = self.bpms.partition_point(|p| p.sec <= sec);
        &self.bpms[idx.saturating_sub(1)]
    }

    pub fn beat_to_sec(&self, beat: f64) -> f64 {
        let seg = self.segment_for_beat(beat);
        let mut sec = seg.sec + (beat - seg.beat) * 60.0 / seg.bpm;
        let first = self.stops.partition_point(|s| s.beat < seg.beat);
        for stop in &self.stops[first..] {
            if stop.beat >= beat {
                break;
            }
            sec += stop.len;
        }
        sec
    }

    pub fn sec_to_beat(&self, sec: f64) -> f64 {
        let seg = self.segment_for_sec(sec);
        let mut adjusted = sec;
        let first = self.stops.partition_point(|s| s.beat < seg.beat);
        for stop in &self.stops[first..] {
            if stop.sec >= sec {
                break;
            }
            // A freeze still in progress only eats the part already elapsed.
            adjusted -= stop.len.min(sec - stop.sec);
        }
        seg.beat + (adjusted - seg.sec) * seg.bpm / 60.0
    }

    pub fn bpm_at_beat(&self, beat: f64) -> f64 {
        self.segment_for_beat(beat).bpm
    }

    /// True while playback sits inside a freeze at `sec`.
    pub fn is_in_stop(&self, sec: f64) -> bool {
        let idx = self.stops.partition_point(|s| s.sec <= sec);
        idx > 0 && {
            let stop = self.stops[idx - 1];
            sec < stop.sec + stop.len
        }
    }

    pub fn bpm_range(&self) -> (f64, f64) {
        self.bpms.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
            (lo.min(p.bpm), hi.max(p.bpm))
        })
    }
}
