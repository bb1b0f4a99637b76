use crate::game::chart::{ChartDocument, DifficultyKey, NoteCounts};
use crate::game::clock::{ClockSample, PlaybackClock};
use crate::game::hold::{HoldEvent, HoldEvents, HoldRules, HoldTracker};
use crate::game::input::InputEdge;
use crate::game::judgment::{Judgement, JudgementCounts, ScoreTable};
use crate::game::life::{LifeMeter, LifeRules};
use crate::game::note::{LANE_COUNT, NoteKind, NoteState};
use crate::game::schedule::NoteSchedule;
use crate::game::timing_windows::TimingProfile;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub profile: TimingProfile,
    pub holds: HoldRules,
    pub scoring: ScoreTable,
    pub life: LifeRules,
}

/// What the HUD hears about. Renderers look visuals up by `note_index`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    Judged {
        judgement: Judgement,
        column: usize,
        note_index: usize,
    },
    MineHit {
        column: usize,
        note_index: usize,
    },
    HoldLetGo {
        column: usize,
        note_index: usize,
    },
}

/// Live counters, rebuilt on every judgement.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Counters {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub health: f64,
    pub accuracy: f64,
    pub counts: JudgementCounts,
    pub mines_hit: u32,
    pub failed: bool,
}

/// Runtime judge for one difficulty of one chart.
///
/// The chart is shared and never touched; everything that changes during a
/// session lives here and is thrown away with the engine. A retry builds a
/// fresh engine from the same chart.
pub struct JudgementEngine {
    chart: Arc<ChartDocument>,
    key: DifficultyKey,
    config: EngineConfig,
    schedule: NoteSchedule,
    states: Vec<NoteState>,
    // Signed seconds between a note and the input that hit it.
    offsets: Vec<Option<f64>>,
    holds: HoldTracker,
    held: [bool; LANE_COUNT],
    counts: JudgementCounts,
    total_scorable: u32,
    score: u64,
    accuracy: f64,
    combo: u32,
    max_combo: u32,
    mines_hit: u32,
    life: LifeMeter,
    resolved: usize,
    next_miss_cursor: usize,
    events: Vec<EngineEvent>,
    last_sample: Option<ClockSample>,
    log_timer: f64,
}

impl JudgementEngine {
    /// `None` when the chart has no such difficulty.
    pub fn new(chart: Arc<ChartDocument>, key: &DifficultyKey, config: EngineConfig) -> Option<Self> {
        let notes = chart.notes_for(key)?.clone();
        let total_scorable = NoteCounts::of(&notes).scorable();
        let len = notes.len();
        info!(
            "Starting session for '{}' [{}]: {} notes, {} scorable.",
            chart.metadata.title, key, len, total_scorable
        );
        Some(Self {
            key: key.clone(),
            schedule: NoteSchedule::new(notes),
            states: vec![NoteState::Pending; len],
            offsets: vec![None; len],
            holds: HoldTracker::new(config.holds),
            held: [false; LANE_COUNT],
            counts: JudgementCounts::default(),
            total_scorable,
            score: 0,
            accuracy: 0.0,
            combo: 0,
            max_combo: 0,
            mines_hit: 0,
            life: LifeMeter::new(&config.life),
            resolved: 0,
            next_miss_cursor: 0,
            events: Vec::new(),
            last_sample: None,
            log_timer: 0.0,
            config,
            chart,
        })
    }

    /// A clean session over the same chart and difficulty.
    pub fn retry(&self) -> Self {
        let notes = self.schedule.notes();
        let len = notes.len();
        Self {
            chart: Arc::clone(&self.chart),
            key: self.key.clone(),
            config: self.config,
            schedule: self.schedule.clone(),
            states: vec![NoteState::Pending; len],
            offsets: vec![None; len],
            holds: HoldTracker::new(self.config.holds),
            held: [false; LANE_COUNT],
            counts: JudgementCounts::default(),
            total_scorable: self.total_scorable,
            score: 0,
            accuracy: 0.0,
            combo: 0,
            max_combo: 0,
            mines_hit: 0,
            life: LifeMeter::new(&self.config.life),
            resolved: 0,
            next_miss_cursor: 0,
            events: Vec::new(),
            last_sample: None,
            log_timer: 0.0,
        }
    }

    // ---- accessors ----

    #[inline(always)]
    pub fn chart(&self) -> &Arc<ChartDocument> {
        &self.chart
    }

    #[inline(always)]
    pub fn key(&self) -> &DifficultyKey {
        &self.key
    }

    #[inline(always)]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline(always)]
    pub fn schedule(&self) -> &NoteSchedule {
        &self.schedule
    }

    #[inline(always)]
    pub fn note_state(&self, index: usize) -> Option<NoteState> {
        self.states.get(index).copied()
    }

    #[inline(always)]
    pub fn note_states(&self) -> &[NoteState] {
        &self.states
    }

    #[inline(always)]
    pub fn offsets(&self) -> &[Option<f64>] {
        &self.offsets
    }

    #[inline(always)]
    pub fn holds(&self) -> &HoldTracker {
        &self.holds
    }

    #[inline(always)]
    pub fn last_sample(&self) -> Option<ClockSample> {
        self.last_sample
    }

    pub fn counters(&self) -> Counters {
        Counters {
            score: self.score,
            combo: self.combo,
            max_combo: self.max_combo,
            health: self.life.value,
            accuracy: self.accuracy,
            counts: self.counts,
            mines_hit: self.mines_hit,
            failed: self.life.failed,
        }
    }

    /// Every note has reached a terminal state.
    #[inline(always)]
    pub fn is_finished(&self) -> bool {
        self.resolved >= self.states.len()
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- input ----

    /// Feeds one press or release edge. Columns outside the field are ignored.
    pub fn on_input_edge(&mut self, edge: InputEdge) {
        let column = edge.column;
        if column >= LANE_COUNT {
            return;
        }
        self.held[column] = edge.pressed;
        // Bring sustains up to the edge time so a lapse or a finished tail is
        // settled before the edge is interpreted.
        let events = self.holds.update(edge.sec);
        self.process_hold_events(events);

        if edge.pressed {
            self.handle_press(column, edge.sec, edge.beat);
        } else {
            let events = self.holds.on_release(column, edge.sec);
            self.process_hold_events(events);
        }
    }

    /// Edge stamped with the clock's current position. Dropped while paused.
    pub fn on_input(&mut self, clock: &PlaybackClock, column: usize, pressed: bool) {
        let Some(sample) = clock.sample(&self.chart.timing) else {
            return;
        };
        self.on_input_edge(InputEdge {
            column,
            pressed,
            sec: sample.sec,
            beat: sample.beat,
        });
    }

    fn handle_press(&mut self, column: usize, sec: f64, beat: f64) {
        self.check_mines(column, sec, beat);

        // (a) regrab a released hold, or count a roll tap
        if self.holds.on_press(column, sec) {
            return;
        }

        let profile = self.config.profile;
        let widest = profile.widest();
        let mut best_tap: Option<(usize, f64)> = None;
        let mut best_sustain: Option<(usize, f64)> = None;
        for idx in self.schedule.candidates(&profile, column, beat, sec, widest) {
            if self.states[idx] != NoteState::Pending {
                continue;
            }
            let note = &self.schedule.notes()[idx];
            let delta = profile.delta(note.beat, note.sec, beat, sec);
            let slot = match note.kind {
                NoteKind::Tap => &mut best_tap,
                NoteKind::Sustain(_) => &mut best_sustain,
                NoteKind::Mine => continue,
            };
            if slot.is_none_or(|(_, best)| delta.abs() < best.abs()) {
                *slot = Some((idx, delta));
            }
        }

        // (b) nearest tap
        if let Some((idx, delta)) = best_tap {
            if let Some(judgement) = profile.classify_delta(delta) {
                let note = self.schedule.notes()[idx];
                self.offsets[idx] = Some(sec - note.sec);
                debug!(
                    "JUDGE TAP: note={}, col={}, beat={:.3}, input_beat={:.3}, delta={:+.4}, result={}",
                    idx, column, note.beat, beat, delta, judgement
                );
                self.apply_judgement(idx, column, judgement);
                return;
            }
        }

        // (c) grab a sustain head
        if let Some((idx, _)) = best_sustain {
            let note = self.schedule.notes()[idx];
            if self.holds.open(column, idx, &note, sec) {
                self.states[idx] = NoteState::Sustaining;
                self.offsets[idx] = Some(sec - note.sec);
            }
        }
    }

    fn check_mines(&mut self, column: usize, sec: f64, beat: f64) {
        let profile = self.config.profile;
        let window = profile.mine_window();
        let hits: Vec<usize> = self
            .schedule
            .candidates(&profile, column, beat, sec, window)
            .filter(|&idx| self.schedule.notes()[idx].is_mine() && self.states[idx] == NoteState::Pending)
            .collect();
        for idx in hits {
            let note = self.schedule.notes()[idx];
            self.states[idx] = NoteState::MineHit;
            self.resolved += 1;
            self.mines_hit = self.mines_hit.saturating_add(1);
            self.combo = 0;
            self.life.apply(self.config.life.mine_hit);
            debug!(
                "JUDGE MINE HIT: note={}, col={}, beat={:.3}, input_beat={:.3}, health={:.1}",
                idx, column, note.beat, beat, self.life.value
            );
            self.events.push(EngineEvent::MineHit { column, note_index: idx });
        }
    }

    // ---- per frame ----

    /// Advances to the clock's current position. Nothing happens while paused.
    pub fn tick(&mut self, clock: &PlaybackClock) {
        if let Some(sample) = clock.sample(&self.chart.timing) {
            self.tick_at(sample);
        }
    }

    pub fn tick_at(&mut self, now: ClockSample) {
        let elapsed = self.last_sample.map_or(0.0, |last| (now.sec - last.sec).max(0.0));
        self.last_sample = Some(now);

        for column in 0..LANE_COUNT {
            if self.held[column] {
                self.check_mines(column, now.sec, now.beat);
            }
        }

        let events = self.holds.update(now.sec);
        self.process_hold_events(events);
        self.apply_time_based_misses(now);

        self.log_timer += elapsed;
        if self.log_timer >= 1.0 {
            info!(
                "Beat: {:.2}, Time: {:.2}, Combo: {}, Health: {:.1}, Accuracy: {:.2}%",
                now.beat, now.sec, self.combo, self.life.value, self.accuracy
            );
            self.log_timer -= 1.0;
        }
    }

    /// Walks notes in chart order: taps and unopened sustains beyond the widest
    /// window are missed, untouched mines beyond their window expire.
    fn apply_time_based_misses(&mut self, now: ClockSample) {
        let profile = self.config.profile;
        let mut cursor = self.next_miss_cursor;
        while cursor < self.states.len() {
            if self.states[cursor] != NoteState::Pending {
                cursor += 1;
                continue;
            }
            let note = self.schedule.notes()[cursor];
            let late = profile.delta(note.beat, note.sec, now.beat, now.sec);
            if note.is_mine() {
                if late <= profile.mine_window() {
                    break;
                }
                self.states[cursor] = NoteState::MineAvoided;
                self.resolved += 1;
            } else {
                if late <= profile.widest() {
                    break;
                }
                debug!(
                    "MISSED (time-based): note={}, col={}, beat={:.3}, now_beat={:.3}",
                    cursor, note.column, note.beat, now.beat
                );
                self.apply_judgement(cursor, note.column as usize, Judgement::Miss);
            }
            cursor += 1;
        }
        self.next_miss_cursor = cursor;
    }

    fn process_hold_events(&mut self, events: HoldEvents) {
        for event in events {
            match event {
                HoldEvent::LetGo { column, note_index } => {
                    self.events.push(EngineEvent::HoldLetGo { column, note_index });
                }
                HoldEvent::Resolved {
                    column,
                    note_index,
                    judgement,
                } => self.apply_judgement(note_index, column, judgement),
            }
        }
    }

    /// The one place a scorable note gets its final judgement.
    fn apply_judgement(&mut self, note_index: usize, column: usize, judgement: Judgement) {
        self.states[note_index] = NoteState::Judged(judgement);
        self.resolved += 1;
        self.counts.add(judgement);
        if judgement.is_hit() {
            self.combo = self.combo.saturating_add(1);
            self.max_combo = self.max_combo.max(self.combo);
            self.life.apply(self.config.life.hit);
        } else {
            self.combo = 0;
            self.life.apply(self.config.life.miss);
        }
        self.score = self.config.scoring.score(&self.counts);
        self.accuracy = self.config.scoring.accuracy(&self.counts, self.total_scorable);
        self.events.push(EngineEvent::Judged {
            judgement,
            column,
            note_index,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::parsing::simfile;
    use crate::game::timing_windows::WindowUnit;

    const EPS: f64 = 1e-6;

    fn engine(notes: &str) -> JudgementEngine {
        let raw = format!("#TITLE:t;#BPMS:0=120;#NOTES:dance-single:x:Hard:5:r:{notes};");
        let chart = Arc::new(simfile::parse(&raw, "").unwrap());
        JudgementEngine::new(chart, &DifficultyKey::from("Hard5"), EngineConfig::default()).unwrap()
    }

    fn sample(engine: &JudgementEngine, sec: f64) -> ClockSample {
        ClockSample::at(&engine.chart().timing, sec)
    }

    fn edge(engine: &JudgementEngine, column: usize, pressed: bool, sec: f64) -> InputEdge {
        let at = sample(engine, sec);
        InputEdge { column, pressed, sec: at.sec, beat: at.beat }
    }

    #[test]
    fn exact_press_is_marvelous() {
        // Tap on beat 4 (2.0s at 120 BPM).
        let mut e = engine("0000,1000");
        e.on_input_edge(edge(&e, 0, true, 2.0));
        let c = e.counters();
        assert_eq!(c.counts.get(Judgement::Marvelous), 1);
        assert_eq!(c.combo, 1);
        assert_eq!(c.score, 1000);
        assert_eq!(c.health, 52.0);
        assert_eq!(c.accuracy, 100.0);
        assert_eq!(e.note_state(0), Some(NoteState::Judged(Judgement::Marvelous)));
        assert!(e.is_finished());
        assert_eq!(
            e.drain_events(),
            vec![EngineEvent::Judged { judgement: Judgement::Marvelous, column: 0, note_index: 0 }]
        );
    }

    #[test]
    fn off_beat_press_gets_a_wider_window() {
        let mut e = engine("0000,1000");
        // 0.15 beats late = 0.075s.
        e.on_input_edge(edge(&e, 0, true, 2.075));
        assert_eq!(e.note_state(0), Some(NoteState::Judged(Judgement::Great)));
        assert!((e.offsets()[0].unwrap() - 0.075).abs() < EPS);
    }

    #[test]
    fn press_outside_every_window_matches_nothing() {
        let mut e = engine("0000,1000");
        e.on_input_edge(edge(&e, 0, true, 1.0));
        assert_eq!(e.note_state(0), Some(NoteState::Pending));
        assert_eq!(e.counters().counts.total(), 0);
        assert!(e.drain_events().is_empty());
    }

    #[test]
    fn unpressed_tap_is_missed_after_the_widest_window() {
        let mut e = engine("1000,1000");
        e.on_input_edge(edge(&e, 0, true, 0.0));
        assert_eq!(e.counters().combo, 1);
        e.tick_at(sample(&e, 2.1));
        assert_eq!(e.note_state(1), Some(NoteState::Pending), "0.2 beats late is still hittable");
        e.tick_at(sample(&e, 2.25));
        assert_eq!(e.note_state(1), Some(NoteState::Judged(Judgement::Miss)));
        let c = e.counters();
        assert_eq!(c.combo, 0);
        assert_eq!(c.max_combo, 1);
        assert_eq!(c.health, 52.0 - 5.0);
        assert!((c.accuracy - 50.0).abs() < EPS);
    }

    #[test]
    fn nearest_tap_wins() {
        // Sixteenths: taps on beats 0.5 and 0.75 in the same column.
        let measure = format!("0000000010001000{}", "0000".repeat(12));
        let mut e = engine(&measure);
        e.on_input_edge(edge(&e, 0, true, 0.34));
        assert_eq!(e.note_state(1), Some(NoteState::Judged(Judgement::Perfect)));
        assert_eq!(e.note_state(0), Some(NoteState::Pending));
    }

    #[test]
    fn held_hold_resolves_marvelous() {
        // Hold from beat 0 to beat 2 (one second).
        let mut e = engine("20003000");
        e.on_input_edge(edge(&e, 0, true, 0.0));
        assert_eq!(e.note_state(0), Some(NoteState::Sustaining));
        e.tick_at(sample(&e, 0.5));
        e.tick_at(sample(&e, 1.0));
        assert_eq!(e.note_state(0), Some(NoteState::Judged(Judgement::Marvelous)));
        assert_eq!(e.counters().combo, 1);
    }

    #[test]
    fn dropped_hold_resolves_boo() {
        let mut e = engine("20003000");
        e.on_input_edge(edge(&e, 0, true, 0.0));
        e.on_input_edge(edge(&e, 0, false, 0.2));
        e.tick_at(sample(&e, 0.6));
        assert!(e.drain_events().contains(&EngineEvent::HoldLetGo { column: 0, note_index: 0 }));
        assert_eq!(e.note_state(0), Some(NoteState::Sustaining), "missed holds wait for their end");
        e.tick_at(sample(&e, 1.0));
        assert_eq!(e.note_state(0), Some(NoteState::Judged(Judgement::Boo)));
    }

    #[test]
    fn ungrabbed_hold_is_missed() {
        let mut e = engine("20003000");
        e.tick_at(sample(&e, 0.5));
        assert_eq!(e.note_state(0), Some(NoteState::Judged(Judgement::Miss)));
    }

    #[test]
    fn mine_hit_on_press_and_while_held() {
        // Mines on beats 0 (col 0) and 2 (col 1).
        let mut e = engine("M0000M00");
        e.on_input_edge(edge(&e, 0, true, 0.0));
        assert_eq!(e.note_state(0), Some(NoteState::MineHit));
        e.on_input_edge(edge(&e, 1, true, 0.5));
        e.tick_at(sample(&e, 1.0));
        assert_eq!(e.note_state(1), Some(NoteState::MineHit));
        let c = e.counters();
        assert_eq!(c.mines_hit, 2);
        assert_eq!(c.health, 30.0);
        assert_eq!(c.counts.total(), 0, "mines are not judged");
        assert!(e.is_finished());
    }

    #[test]
    fn untouched_mine_expires_quietly() {
        let mut e = engine("M000,0000");
        e.tick_at(sample(&e, 0.5));
        assert_eq!(e.note_state(0), Some(NoteState::MineAvoided));
        assert_eq!(e.counters().health, 50.0);
        assert!(e.drain_events().is_empty());
    }

    #[test]
    fn seconds_unit_judges_by_time() {
        let raw = "#BPMS:0=120;#NOTES:s:x:Hard:5:r:0000,1000;";
        let chart = Arc::new(simfile::parse(raw, "").unwrap());
        let config = EngineConfig {
            profile: TimingProfile::itg_seconds(),
            ..EngineConfig::default()
        };
        assert_eq!(config.profile.unit, WindowUnit::Seconds);
        let mut e = JudgementEngine::new(chart, &DifficultyKey::from("Hard5"), config).unwrap();
        e.on_input_edge(edge(&e, 0, true, 2.03));
        assert_eq!(e.note_state(0), Some(NoteState::Judged(Judgement::Perfect)));
    }

    #[test]
    fn out_of_range_columns_are_ignored() {
        let mut e = engine("1000");
        e.on_input_edge(InputEdge { column: 6, pressed: true, sec: 0.0, beat: 0.0 });
        assert_eq!(e.note_state(0), Some(NoteState::Pending));
    }

    #[test]
    fn paused_clock_judges_nothing() {
        let mut e = engine("1000,0000");
        let mut clock = PlaybackClock::new(0.0);
        clock.pause();
        clock.set_position(5.0);
        e.tick(&clock);
        e.on_input(&clock, 0, true);
        assert_eq!(e.note_state(0), Some(NoteState::Pending));
        assert!(e.last_sample().is_none());
    }

    #[test]
    fn retry_starts_clean_from_the_same_chart() {
        let mut e = engine("1000,1000");
        e.on_input_edge(edge(&e, 0, true, 0.0));
        let fresh = e.retry();
        assert_eq!(fresh.counters().combo, 0);
        assert_eq!(fresh.note_state(0), Some(NoteState::Pending));
        assert!(Arc::ptr_eq(fresh.chart(), e.chart()));
    }

    #[test]
    fn failing_sets_the_flag_but_play_continues() {
        let raw_notes = "1000,".repeat(11) + "1000";
        let mut e = engine(&raw_notes);
        e.tick_at(sample(&e, 30.0));
        let c = e.counters();
        assert_eq!(c.counts.get(Judgement::Miss), 12);
        assert!(c.failed);
        assert_eq!(c.health, 0.0);
        assert!(e.is_finished());
    }

    #[test]
    fn unknown_difficulty_is_none() {
        let chart = Arc::new(simfile::parse("#BPMS:0=120;", "").unwrap());
        assert!(JudgementEngine::new(chart, &DifficultyKey::from("Hard5"), EngineConfig::default()).is_none());
    }
}
