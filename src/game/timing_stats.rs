use crate::game::judgment::Judgement;
use crate::game::note::{Note, NoteKind, NoteState};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub mean_abs_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub max_abs_ms: f64,
    pub count: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub time_sec: f64,
    pub offset_ms: Option<f64>, // None for Miss
}

// Signed offsets (ms) of every tap that was hit.
fn hit_offsets_ms<'a>(
    notes: &'a [Note],
    states: &'a [NoteState],
    offsets: &'a [Option<f64>],
) -> impl Iterator<Item = f64> + 'a {
    notes
        .iter()
        .zip(states)
        .zip(offsets)
        .filter_map(|((note, state), offset)| match (note.kind, state, offset) {
            (NoteKind::Tap, NoteState::Judged(j), Some(o)) if *j != Judgement::Miss => Some(o * 1000.0),
            _ => None,
        })
}

#[inline(always)]
pub fn compute_note_timing_stats(notes: &[Note], states: &[NoteState], offsets: &[Option<f64>]) -> TimingStats {
    // First pass: accumulate sums and maxima over non-miss judgments
    let mut sum_abs = 0.0_f64;
    let mut sum_signed = 0.0_f64;
    let mut max_abs = 0.0_f64;
    let mut count: usize = 0;

    for e in hit_offsets_ms(notes, states, offsets) {
        let a = e.abs();
        sum_abs += a;
        sum_signed += e;
        if a > max_abs {
            max_abs = a;
        }
        count += 1;
    }

    if count == 0 {
        return TimingStats::default();
    }

    let mean_ms = sum_signed / (count as f64);
    let mean_abs_ms = sum_abs / (count as f64);

    // Second pass: sample standard deviation of signed offsets
    let stddev_ms = if count > 1 {
        let sum_diff_sq: f64 = hit_offsets_ms(notes, states, offsets)
            .map(|e| (e - mean_ms) * (e - mean_ms))
            .sum();
        (sum_diff_sq / ((count as f64) - 1.0)).sqrt()
    } else {
        0.0
    };

    TimingStats {
        mean_abs_ms,
        mean_ms,
        stddev_ms,
        max_abs_ms: max_abs,
        count,
    }
}

/// One point per judged tap, in chart order. Unjudged notes are skipped.
pub fn build_scatter_points(notes: &[Note], states: &[NoteState], offsets: &[Option<f64>]) -> Vec<ScatterPoint> {
    let mut out = Vec::with_capacity(notes.len());
    for ((note, state), offset) in notes.iter().zip(states).zip(offsets) {
        if !matches!(note.kind, NoteKind::Tap) {
            continue;
        }
        let offset_ms = match state {
            NoteState::Judged(Judgement::Miss) => None,
            NoteState::Judged(_) => offset.map(|o| o * 1000.0),
            _ => continue,
        };
        out.push(ScatterPoint {
            time_sec: note.sec,
            offset_ms,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{build_scatter_points, compute_note_timing_stats};
    use crate::game::judgment::Judgement;
    use crate::game::note::{Note, NoteKind, NoteState};

    fn tap(sec: f64) -> Note {
        Note { kind: NoteKind::Tap, beat: sec * 2.0, sec, column: 0 }
    }

    #[test]
    fn stats_skip_misses_and_pending_notes() {
        let notes = [tap(0.0), tap(1.0), tap(2.0), tap(3.0), tap(4.0)];
        let states = [
            NoteState::Judged(Judgement::Marvelous),
            NoteState::Judged(Judgement::Great),
            NoteState::Judged(Judgement::Miss),
            NoteState::Pending,
            NoteState::Judged(Judgement::Perfect),
        ];
        let offsets = [Some(0.010), Some(-0.030), None, None, Some(0.020)];
        let stats = compute_note_timing_stats(&notes, &states, &offsets);
        assert_eq!(stats.count, 3);
        assert!(stats.mean_ms.abs() < 1e-9);
        assert!((stats.mean_abs_ms - 20.0).abs() < 1e-9);
        assert!((stats.max_abs_ms - 30.0).abs() < 1e-9);
        // Sample stddev of {10, -30, 20}: sqrt(1400 / 2).
        assert!((stats.stddev_ms - 700.0_f64.sqrt()).abs() < 1e-9);

        let points = build_scatter_points(&notes, &states, &offsets);
        assert_eq!(points.len(), 4);
        assert_eq!(points[2].offset_ms, None);
    }

    #[test]
    fn empty_input_gives_zeroes() {
        let stats = compute_note_timing_stats(&[], &[], &[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.stddev_ms, 0.0);
    }
}
