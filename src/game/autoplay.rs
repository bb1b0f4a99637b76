use crate::game::gameplay::JudgementEngine;
use crate::game::hold::HoldRules;
use crate::game::input::InputEdge;
use crate::game::note::{Note, NoteKind, SustainKind};
use crate::game::replay::EdgeSource;
use crate::game::timing::TimingData;
use log::info;

/// Input-synthesis policy that plays a chart perfectly.
///
/// It only produces edges; judging stays with the engine, so autoplay scores
/// go through exactly the same pipeline as a human's.
#[derive(Clone, Debug, Default)]
pub struct Autoplay {
    script: Vec<InputEdge>,
    cursor: usize,
}

#[inline(always)]
fn edge(column: u8, pressed: bool, sec: f64, beat: f64) -> InputEdge {
    InputEdge {
        column: column as usize,
        pressed,
        sec,
        beat,
    }
}

impl Autoplay {
    pub fn new(notes: &[Note], timing: &TimingData, rules: &HoldRules) -> Self {
        let mut script = Vec::with_capacity(notes.len() * 2);
        for note in notes {
            match &note.kind {
                NoteKind::Mine => {}
                NoteKind::Tap => {
                    script.push(edge(note.column, true, note.sec, note.beat));
                    script.push(edge(note.column, false, note.sec, note.beat));
                }
                NoteKind::Sustain(s) => {
                    script.push(edge(note.column, true, note.sec, note.beat));
                    if s.kind == SustainKind::Roll {
                        for (sec, beat) in roll_taps(note, timing, rules) {
                            script.push(edge(note.column, false, sec, beat));
                            script.push(edge(note.column, true, sec, beat));
                        }
                    }
                    script.push(edge(note.column, false, note.sec_end(), note.beat_end()));
                }
            }
        }
        script.sort_by(|a, b| a.sec.total_cmp(&b.sec));
        info!("Autoplay scripted {} input edges.", script.len());
        Self { script, cursor: 0 }
    }

    pub fn for_engine(engine: &JudgementEngine) -> Self {
        Self::new(
            engine.schedule().notes(),
            &engine.chart().timing,
            &engine.config().holds,
        )
    }

    #[inline(always)]
    pub fn script(&self) -> &[InputEdge] {
        &self.script
    }
}

/// Re-tap times inside a roll, excluding the opening press: one every
/// `1/roll_required_intervals` beats, plus fillers so no gap (tail
/// included) is longer than half the roll forgiveness.
fn roll_taps(note: &Note, timing: &TimingData, rules: &HoldRules) -> Vec<(f64, f64)> {
    let end_beat = note.beat_end();
    let end_sec = note.sec_end();

    let mut beats: Vec<f64> = Vec::new();
    let intervals = rules.roll_required_intervals;
    if intervals.is_finite() && intervals > 0.0 {
        let step = 1.0 / intervals;
        let mut k = 1.0;
        while note.beat + k * step < end_beat {
            beats.push(note.beat + k * step);
            k += 1.0;
        }
    }

    let max_gap = rules.roll_forgiveness / 2.0;
    let mut anchors: Vec<(f64, f64)> = Vec::with_capacity(beats.len() + 2);
    anchors.push((note.sec, note.beat));
    anchors.extend(beats.iter().map(|&b| (timing.beat_to_sec(b), b)));
    anchors.push((end_sec, end_beat));

    let mut taps = Vec::new();
    for pair in anchors.windows(2) {
        let (from, to) = (pair[0].0, pair[1].0);
        let gap = to - from;
        if max_gap > 0.0 && gap > max_gap {
            let pieces = (gap / max_gap).ceil() as usize;
            for i in 1..pieces {
                let sec = from + gap * i as f64 / pieces as f64;
                taps.push((sec, timing.sec_to_beat(sec)));
            }
        }
        // The tail anchor is a release, not a tap.
        if to < end_sec {
            taps.push(pair[1]);
        }
    }
    taps
}

impl EdgeSource for Autoplay {
    fn poll(&mut self, now: f64) -> &[InputEdge] {
        let start = self.cursor;
        while self.cursor < self.script.len() && self.script[self.cursor].sec <= now {
            self.cursor += 1;
        }
        &self.script[start..self.cursor]
    }

    fn is_exhausted(&self) -> bool {
        self.cursor >= self.script.len()
    }

    fn last_sec(&self) -> Option<f64> {
        self.script.last().map(|e| e.sec)
    }
}
