use crate::game::clock::ClockSample;
use crate::game::gameplay::{Counters, JudgementEngine};
use crate::game::input::InputEdge;
use crate::game::timing::TimingData;
use log::{debug, info};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FRAME_SECONDS: f64 = 1.0 / 60.0;
// How long `drive` keeps ticking past the last note/edge before giving up.
const DRIVE_TAIL_SECONDS: f64 = 60.0;

/// Anything that hands the engine time-stamped edges: a recorded trace,
/// autoplay, a live input adapter.
pub trait EdgeSource {
    /// Edges with `sec <= now` not handed out before, in time order.
    fn poll(&mut self, now: f64) -> &[InputEdge];
    fn is_exhausted(&self) -> bool;
    fn last_sec(&self) -> Option<f64>;
}

/// One recorded edge as stored on disk.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEdge {
    pub column: usize,
    pub pressed: bool,
    pub sec: f64,
}

/// A session's raw input, enough to reproduce its result exactly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTrace {
    pub edges: Vec<TraceEdge>,
}

impl InputTrace {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_edges(edges: &[InputEdge]) -> Self {
        Self {
            edges: edges
                .iter()
                .map(|e| TraceEdge {
                    column: e.column,
                    pressed: e.pressed,
                    sec: e.sec,
                })
                .collect(),
        }
    }
}

/// Plays an `InputTrace` back. Beats are recomputed from the chart's timing,
/// so the same trace on the same chart always judges the same way.
#[derive(Clone, Debug, Default)]
pub struct Replay {
    edges: Vec<InputEdge>,
    cursor: usize,
}

impl Replay {
    pub fn new(trace: &InputTrace, timing: &TimingData) -> Self {
        let mut edges: Vec<InputEdge> = trace
            .edges
            .iter()
            .filter(|e| e.sec.is_finite())
            .map(|e| InputEdge {
                column: e.column,
                pressed: e.pressed,
                sec: e.sec,
                beat: timing.sec_to_beat(e.sec),
            })
            .collect();
        edges.sort_by(|a, b| a.sec.total_cmp(&b.sec));
        Self { edges, cursor: 0 }
    }

    #[inline(always)]
    pub fn edges(&self) -> &[InputEdge] {
        &self.edges
    }
}

impl EdgeSource for Replay {
    fn poll(&mut self, now: f64) -> &[InputEdge] {
        let start = self.cursor;
        while self.cursor < self.edges.len() && self.edges[self.cursor].sec <= now {
            self.cursor += 1;
        }
        &self.edges[start..self.cursor]
    }

    fn is_exhausted(&self) -> bool {
        self.cursor >= self.edges.len()
    }

    fn last_sec(&self) -> Option<f64> {
        self.edges.last().map(|e| e.sec)
    }
}

/// Runs a whole session offline at a fixed frame length: each frame delivers
/// the due edges, then ticks. Frame times are computed from the frame index,
/// not accumulated, so results do not depend on float drift.
pub fn drive<S: EdgeSource + ?Sized>(engine: &mut JudgementEngine, source: &mut S, frame_seconds: f64) -> Counters {
    let frame = if frame_seconds.is_finite() && frame_seconds > 0.0 {
        frame_seconds
    } else {
        DEFAULT_FRAME_SECONDS
    };
    let timing = engine.chart().timing.clone();
    let notes = engine.schedule().notes();
    let first_note = notes.first().map_or(0.0, |n| n.sec);
    let last_note = notes.iter().map(|n| n.sec_end()).fold(0.0_f64, f64::max);
    let start = first_note.min(0.0) - 1.0;
    let limit = last_note.max(source.last_sec().unwrap_or(0.0)) + DRIVE_TAIL_SECONDS;

    let mut frames: u64 = 0;
    loop {
        let now = start + frames as f64 * frame;
        let due: Vec<InputEdge> = source.poll(now).to_vec();
        for edge in due {
            engine.on_input_edge(edge);
        }
        engine.tick_at(ClockSample::at(&timing, now));
        frames += 1;

        if engine.is_finished() && source.is_exhausted() {
            break;
        }
        if now > limit {
            debug!("drive stopped at the safety limit ({:.2}s)", now);
            break;
        }
    }

    let counters = engine.counters();
    info!(
        "Session over after {} frames: score={}, accuracy={:.2}%, max_combo={}",
        frames, counters.score, counters.accuracy, counters.max_combo
    );
    counters
}
