use crate::game::judgment::Judgement;
use crate::game::note::{LANE_COUNT, Note, SustainKind};
use log::debug;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub const HOLD_FORGIVENESS_S: f64 = 0.3;
pub const ROLL_FORGIVENESS_S: f64 = 0.3;
pub const ROLL_REQUIRED_INTERVALS: f64 = 1.0;
pub const ROLL_SHORT_THRESHOLD_BEATS: f64 = 0.5;
// Slack on forgiveness comparisons; a re-tap exactly at the limit is in time.
const FORGIVENESS_EPSILON_S: f64 = 1e-9;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoldRules {
    /// Seconds a released hold may stay released before it is lost.
    pub hold_forgiveness: f64,
    /// Longest allowed gap between roll taps, in seconds.
    pub roll_forgiveness: f64,
    /// Taps per beat a roll asks for.
    pub roll_required_intervals: f64,
    /// Rolls this short (in beats) only need the opening tap.
    pub roll_short_threshold_beats: f64,
}

impl Default for HoldRules {
    fn default() -> Self {
        Self {
            hold_forgiveness: HOLD_FORGIVENESS_S,
            roll_forgiveness: ROLL_FORGIVENESS_S,
            roll_required_intervals: ROLL_REQUIRED_INTERVALS,
            roll_short_threshold_beats: ROLL_SHORT_THRESHOLD_BEATS,
        }
    }
}

impl HoldRules {
    /// Taps (opening press included) a roll of `beat_length` beats needs.
    pub fn required_roll_taps(&self, beat_length: f64) -> u32 {
        if beat_length <= self.roll_short_threshold_beats {
            return 1;
        }
        ((beat_length * self.roll_required_intervals).ceil() as u32).max(1)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HoldPhase {
    Active,
    /// Released at `since`; still recoverable inside the forgiveness window.
    Inactive { since: f64 },
    /// Lost for good. Kept around until the note's length has played out.
    Missed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoldState {
    pub note_index: usize,
    pub kind: SustainKind,
    pub start_time: f64,
    pub sec_length: f64,
    pub required_taps: u32,
    pub progress: f64,
    pub tap_count: u32,
    pub press_count: u32,
    pub phase: HoldPhase,
    pub last_press: f64,
    pub last_release: Option<f64>,
    pub last_tap: f64,
}

impl HoldState {
    #[inline(always)]
    pub fn end_time(&self) -> f64 {
        self.start_time + self.sec_length
    }

    #[inline(always)]
    pub fn is_missed(&self) -> bool {
        matches!(self.phase, HoldPhase::Missed)
    }

    fn final_judgement(&self) -> Judgement {
        let taps_ok = match self.kind {
            SustainKind::Hold => true,
            SustainKind::Roll => self.tap_count >= self.required_taps,
        };
        if !self.is_missed() && taps_ok {
            Judgement::Marvelous
        } else {
            Judgement::Boo
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HoldEvent {
    /// Forgiveness ran out; the sustain will resolve as a Boo.
    LetGo { column: usize, note_index: usize },
    Resolved {
        column: usize,
        note_index: usize,
        judgement: Judgement,
    },
}

pub type HoldEvents = SmallVec<[HoldEvent; LANE_COUNT]>;

/// One optional sustain per column.
#[derive(Clone, Debug, Default)]
pub struct HoldTracker {
    rules: HoldRules,
    columns: [Option<HoldState>; LANE_COUNT],
}

impl HoldTracker {
    pub fn new(rules: HoldRules) -> Self {
        Self {
            rules,
            columns: Default::default(),
        }
    }

    #[inline(always)]
    pub fn rules(&self) -> &HoldRules {
        &self.rules
    }

    #[inline(always)]
    pub fn state(&self, column: usize) -> Option<&HoldState> {
        self.columns.get(column).and_then(Option::as_ref)
    }

    #[inline(always)]
    pub fn is_tracking(&self, column: usize) -> bool {
        self.state(column).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.columns.iter().flatten().count()
    }

    /// Starts tracking a grabbed sustain head. Returns false when the column
    /// is already busy or the note is not a sustain.
    pub fn open(&mut self, column: usize, note_index: usize, note: &Note, now: f64) -> bool {
        let Some(sustain) = note.sustain() else {
            return false;
        };
        let Some(slot) = self.columns.get_mut(column) else {
            return false;
        };
        if slot.is_some() {
            return false;
        }
        let required_taps = match sustain.kind {
            SustainKind::Hold => 0,
            SustainKind::Roll => self.rules.required_roll_taps(sustain.beat_length),
        };
        debug!(
            "HOLD OPEN: col={}, note={}, kind={:?}, start={:.3}s, len={:.3}s, taps_needed={}",
            column, note_index, sustain.kind, now, sustain.sec_length, required_taps
        );
        *slot = Some(HoldState {
            note_index,
            kind: sustain.kind,
            start_time: now,
            sec_length: sustain.sec_length,
            required_taps,
            progress: 0.0,
            tap_count: 1,
            press_count: 1,
            phase: HoldPhase::Active,
            last_press: now,
            last_release: None,
            last_tap: now,
        });
        true
    }

    /// Offers a press to the sustain in `column`. Returns true if it was
    /// consumed (a hold regrab or a roll tap).
    pub fn on_press(&mut self, column: usize, now: f64) -> bool {
        let forgiveness = self.rules.hold_forgiveness;
        let Some(state) = self.columns.get_mut(column).and_then(Option::as_mut) else {
            return false;
        };
        match (state.kind, state.phase) {
            (SustainKind::Hold, HoldPhase::Inactive { since }) if now - since <= forgiveness + FORGIVENESS_EPSILON_S => {
                state.phase = HoldPhase::Active;
                state.press_count = state.press_count.saturating_add(1);
                state.last_press = now;
                debug!("HOLD REGRAB: col={}, note={}, after={:.3}s", column, state.note_index, now - since);
                true
            }
            (SustainKind::Roll, HoldPhase::Active) => {
                state.tap_count = state.tap_count.saturating_add(1);
                state.press_count = state.press_count.saturating_add(1);
                state.last_press = now;
                state.last_tap = now;
                true
            }
            _ => false,
        }
    }

    /// Handles a release in `column`. Progress is brought up to date first so
    /// a release after the tail resolves instead of dropping the hold.
    pub fn on_release(&mut self, column: usize, now: f64) -> HoldEvents {
        let events = self.update_column(column, now);
        if let Some(state) = self.columns.get_mut(column).and_then(Option::as_mut) {
            state.last_release = Some(now);
            if state.kind == SustainKind::Hold && state.phase == HoldPhase::Active {
                state.phase = HoldPhase::Inactive { since: now };
                debug!("HOLD RELEASE: col={}, note={}, at={:.3}s", column, state.note_index, now);
            }
        }
        events
    }

    /// Advances every tracked sustain to `now`.
    pub fn update(&mut self, now: f64) -> HoldEvents {
        let mut events = HoldEvents::new();
        for column in 0..LANE_COUNT {
            events.extend(self.update_column(column, now));
        }
        events
    }

    fn update_column(&mut self, column: usize, now: f64) -> HoldEvents {
        let mut events = HoldEvents::new();
        let rules = self.rules;
        let Some(slot) = self.columns.get_mut(column) else {
            return events;
        };
        let Some(state) = slot.as_mut() else {
            return events;
        };

        state.progress = (now - state.start_time).max(0.0);
        // Lapses are judged no later than the tail, so a late frame cannot
        // fail a sustain that was fine when it ended.
        let check_time = now.min(state.end_time());
        let lapsed = match (state.kind, state.phase) {
            (SustainKind::Hold, HoldPhase::Inactive { since }) => check_time - since > rules.hold_forgiveness + FORGIVENESS_EPSILON_S,
            (SustainKind::Roll, HoldPhase::Active) => check_time - state.last_tap > rules.roll_forgiveness + FORGIVENESS_EPSILON_S,
            _ => false,
        };
        if lapsed {
            state.phase = HoldPhase::Missed;
            debug!("HOLD LET GO: col={}, note={}, at={:.3}s", column, state.note_index, now);
            events.push(HoldEvent::LetGo {
                column,
                note_index: state.note_index,
            });
        }

        if state.progress >= state.sec_length {
            let judgement = state.final_judgement();
            debug!(
                "HOLD RESOLVED: col={}, note={}, kind={:?}, taps={}/{}, presses={}, result={}",
                column,
                state.note_index,
                state.kind,
                state.tap_count,
                state.required_taps,
                state.press_count,
                judgement
            );
            events.push(HoldEvent::Resolved {
                column,
                note_index: state.note_index,
                judgement,
            });
            *slot = None;
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::{HoldEvent, HoldPhase, HoldRules, HoldTracker};
    use crate::game::judgment::Judgement;
    use crate::game::note::{Note, NoteKind, Sustain, SustainKind};

    fn sustain(kind: SustainKind, beat_length: f64, sec_length: f64) -> Note {
        Note {
            kind: NoteKind::Sustain(Sustain { kind, beat_length, sec_length }),
            beat: 0.0,
            sec: 0.0,
            column: 0,
        }
    }

    fn resolved(events: &[HoldEvent]) -> Option<Judgement> {
        events.iter().find_map(|e| match e {
            HoldEvent::Resolved { judgement, .. } => Some(*judgement),
            _ => None,
        })
    }

    #[test]
    fn held_through_is_marvelous() {
        let mut tracker = HoldTracker::new(HoldRules::default());
        assert!(tracker.open(0, 0, &sustain(SustainKind::Hold, 2.0, 1.0), 0.0));
        assert!(resolved(&tracker.update(0.5)).is_none());
        assert_eq!(tracker.state(0).map(|s| s.progress), Some(0.5));
        assert_eq!(resolved(&tracker.update(1.0)), Some(Judgement::Marvelous));
        assert!(!tracker.is_tracking(0));
    }

    #[test]
    fn quick_regrab_is_forgiven() {
        let mut tracker = HoldTracker::new(HoldRules::default());
        tracker.open(0, 0, &sustain(SustainKind::Hold, 4.0, 2.0), 0.0);
        tracker.on_release(0, 0.5);
        assert!(matches!(tracker.state(0).map(|s| s.phase), Some(HoldPhase::Inactive { .. })));
        assert!(tracker.on_press(0, 0.7));
        assert_eq!(tracker.state(0).map(|s| s.press_count), Some(2));
        assert_eq!(resolved(&tracker.update(2.0)), Some(Judgement::Marvelous));
    }

    #[test]
    fn late_regrab_is_not_forgiven() {
        let mut tracker = HoldTracker::new(HoldRules::default());
        tracker.open(0, 3, &sustain(SustainKind::Hold, 4.0, 2.0), 0.0);
        tracker.on_release(0, 0.5);
        let events = tracker.update(0.9);
        assert!(events.contains(&HoldEvent::LetGo { column: 0, note_index: 3 }));
        assert!(!tracker.on_press(0, 0.95), "missed holds cannot be regrabbed");
        assert!(tracker.is_tracking(0), "missed hold stays until its length plays out");
        assert_eq!(resolved(&tracker.update(2.0)), Some(Judgement::Boo));
    }

    #[test]
    fn release_after_tail_resolves_first() {
        let mut tracker = HoldTracker::new(HoldRules::default());
        tracker.open(0, 0, &sustain(SustainKind::Hold, 2.0, 1.0), 0.0);
        assert_eq!(resolved(&tracker.on_release(0, 1.2)), Some(Judgement::Marvelous));
    }

    #[test]
    fn roll_needs_taps_and_lapses_without_them() {
        let rules = HoldRules::default();
        let mut tracker = HoldTracker::new(rules);
        tracker.open(1, 0, &sustain(SustainKind::Roll, 4.0, 2.0), 0.0);
        assert_eq!(tracker.state(1).map(|s| s.required_taps), Some(4));
        for t in [0.25, 0.5, 0.75] {
            assert!(tracker.on_press(1, t));
            assert!(tracker.update(t).is_empty());
        }
        let events = tracker.update(1.2);
        assert!(events.contains(&HoldEvent::LetGo { column: 1, note_index: 0 }));
        assert_eq!(resolved(&tracker.update(2.0)), Some(Judgement::Boo));
    }

    #[test]
    fn roll_short_on_taps_is_boo_without_lapsing() {
        let rules = HoldRules {
            roll_forgiveness: 10.0,
            ..HoldRules::default()
        };
        let mut tracker = HoldTracker::new(rules);
        tracker.open(1, 5, &sustain(SustainKind::Roll, 4.0, 2.0), 0.0);
        assert_eq!(tracker.state(1).map(|s| s.required_taps), Some(4));
        assert!(tracker.on_press(1, 1.0));
        assert!(tracker.update(1.5).is_empty());
        let events = tracker.update(2.0);
        assert!(!events.iter().any(|e| matches!(e, HoldEvent::LetGo { .. })));
        assert_eq!(tracker.state(1), None);
        assert_eq!(resolved(&events), Some(Judgement::Boo), "2 of 4 taps");
    }

    #[test]
    fn retap_exactly_at_the_forgiveness_limit_is_in_time() {
        // 0.8 - 0.5 rounds just above 0.3.
        let mut tracker = HoldTracker::new(HoldRules::default());
        tracker.open(0, 0, &sustain(SustainKind::Roll, 2.0, 1.0), 0.0);
        for t in [0.25, 0.5, 0.8] {
            assert!(tracker.update(t).is_empty(), "no lapse at {t}");
            assert!(tracker.on_press(0, t));
        }
        assert_eq!(resolved(&tracker.update(1.0)), Some(Judgement::Marvelous));

        let mut tracker = HoldTracker::new(HoldRules::default());
        tracker.open(0, 0, &sustain(SustainKind::Hold, 2.0, 1.0), 0.0);
        tracker.on_release(0, 0.5);
        assert!(tracker.update(0.8).is_empty());
        assert!(tracker.on_press(0, 0.8));
        assert_eq!(resolved(&tracker.update(1.0)), Some(Judgement::Marvelous));
    }

    #[test]
    fn roll_with_enough_taps_is_marvelous() {
        let mut tracker = HoldTracker::new(HoldRules::default());
        tracker.open(2, 0, &sustain(SustainKind::Roll, 2.0, 1.0), 0.0);
        tracker.on_release(2, 0.05);
        assert_eq!(tracker.state(2).map(|s| s.phase), Some(HoldPhase::Active), "roll releases are free");
        for t in [0.25, 0.5, 0.75] {
            tracker.on_press(2, t);
            tracker.update(t);
        }
        assert_eq!(resolved(&tracker.update(1.0)), Some(Judgement::Marvelous));
    }

    #[test]
    fn short_rolls_only_need_the_opening_tap() {
        let rules = HoldRules::default();
        assert_eq!(rules.required_roll_taps(0.5), 1);
        assert_eq!(rules.required_roll_taps(0.75), 1);
        assert_eq!(rules.required_roll_taps(2.5), 3);
        let mut tracker = HoldTracker::new(rules);
        tracker.open(0, 0, &sustain(SustainKind::Roll, 0.5, 0.25), 0.0);
        assert_eq!(resolved(&tracker.update(0.25)), Some(Judgement::Marvelous));
    }

    #[test]
    fn late_frame_does_not_fail_a_finished_roll() {
        let mut tracker = HoldTracker::new(HoldRules::default());
        tracker.open(0, 0, &sustain(SustainKind::Roll, 0.5, 0.25), 0.0);
        assert_eq!(resolved(&tracker.update(0.9)), Some(Judgement::Marvelous));
    }

    #[test]
    fn busy_column_refuses_a_second_sustain() {
        let mut tracker = HoldTracker::new(HoldRules::default());
        let note = sustain(SustainKind::Hold, 1.0, 0.5);
        assert!(tracker.open(0, 0, &note, 0.0));
        assert!(!tracker.open(0, 1, &note, 0.1));
        assert!(!tracker.open(9, 1, &note, 0.1));
        assert_eq!(tracker.active_count(), 1);
    }
}
