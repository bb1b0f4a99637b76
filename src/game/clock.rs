use crate::game::timing::TimingData;
use serde::{Deserialize, Serialize};

/// Current position in the chart, both ways.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClockSample {
    pub sec: f64,
    pub beat: f64,
}

impl ClockSample {
    #[inline(always)]
    pub fn at(timing: &TimingData, sec: f64) -> Self {
        Self {
            sec,
            beat: timing.sec_to_beat(sec),
        }
    }
}

/// Chart clock fed from an external position source (audio stream position
/// or wall time since start). Chart time is that position plus the chart's
/// `#OFFSET`, minus everything spent paused.
#[derive(Clone, Debug, Default)]
pub struct PlaybackClock {
    offset: f64,
    position: f64,
    paused_at: Option<f64>,
    paused_total: f64,
}

impl PlaybackClock {
    pub fn new(offset: f64) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// Feeds the latest raw position. Non-monotonic input is ignored.
    pub fn set_position(&mut self, position: f64) {
        if position.is_finite() && position >= self.position {
            self.position = position;
        }
    }

    #[inline(always)]
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(self.position);
        }
    }

    pub fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += self.position - at;
        }
    }

    #[inline(always)]
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Chart time in seconds. Frozen while paused.
    pub fn chart_time(&self) -> f64 {
        let position = self.paused_at.unwrap_or(self.position);
        position - self.paused_total + self.offset
    }

    /// `None` while paused: nothing is judged during a pause.
    pub fn sample(&self, timing: &TimingData) -> Option<ClockSample> {
        if self.is_paused() {
            return None;
        }
        Some(ClockSample::at(timing, self.chart_time()))
    }
}
