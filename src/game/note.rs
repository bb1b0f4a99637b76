use crate::game::judgment::Judgement;
use serde::{Deserialize, Serialize};

pub const LANE_COUNT: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SustainKind {
    Hold,
    Roll,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sustain {
    pub kind: SustainKind,
    pub beat_length: f64,
    pub sec_length: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NoteKind {
    Tap,
    Mine,
    Sustain(Sustain),
}

/// One parsed note. Immutable once the chart is built; runtime progress
/// lives in a parallel `NoteState` slice indexed the same way.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub kind: NoteKind,
    pub beat: f64,
    pub sec: f64,
    pub column: u8,
}

impl Note {
    #[inline(always)]
    pub fn sustain(&self) -> Option<&Sustain> {
        match &self.kind {
            NoteKind::Sustain(s) => Some(s),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn is_mine(&self) -> bool {
        matches!(self.kind, NoteKind::Mine)
    }

    /// Taps and sustains score; mines only penalise.
    #[inline(always)]
    pub fn is_scorable(&self) -> bool {
        !self.is_mine()
    }

    #[inline(always)]
    pub fn beat_end(&self) -> f64 {
        self.sustain().map_or(self.beat, |s| self.beat + s.beat_length)
    }

    #[inline(always)]
    pub fn sec_end(&self) -> f64 {
        self.sustain().map_or(self.sec, |s| self.sec + s.sec_length)
    }
}

/// Per-session progress of a single note.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteState {
    #[default]
    Pending,
    /// Head grabbed, the hold tracker owns it until it resolves.
    Sustaining,
    Judged(Judgement),
    MineHit,
    MineAvoided,
}

impl NoteState {
    #[inline(always)]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending | Self::Sustaining)
    }
}
