use crate::game::note::{Note, NoteKind, SustainKind};
use crate::game::timing::TimingData;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// `type + rating`, e.g. `Challenge12`. Identifies one note list in a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DifficultyKey(String);

impl DifficultyKey {
    pub fn new(kind: &str, rating: &str) -> Self {
        Self(format!("{kind}{rating}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DifficultyKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for DifficultyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Difficulty {
    pub style: String,
    pub author: String,
    pub kind: String,
    pub rating: String,
}

impl Difficulty {
    #[inline(always)]
    pub fn key(&self) -> DifficultyKey {
        DifficultyKey::new(&self.kind, &self.rating)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BgChange {
    pub beat: f64,
    pub file: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub title: String,
    pub subtitle: String,
    pub artist: String,
    pub title_translit: String,
    pub subtitle_translit: String,
    pub artist_translit: String,
    pub genre: String,
    pub credit: String,
    // Asset references, already joined onto the base path.
    pub banner: Option<String>,
    pub background: Option<String>,
    pub cdtitle: Option<String>,
    pub music: Option<String>,
    /// Seconds added to the audio position to get chart time.
    pub offset: f64,
    pub sample_start: Option<f64>,
    pub sample_length: Option<f64>,
    pub display_bpm: Option<String>,
    pub bg_changes: Vec<BgChange>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCounts {
    pub taps: u32,
    pub holds: u32,
    pub rolls: u32,
    pub mines: u32,
}

impl NoteCounts {
    pub fn of(notes: &[Note]) -> Self {
        let mut counts = Self::default();
        for note in notes {
            match &note.kind {
                NoteKind::Tap => counts.taps += 1,
                NoteKind::Mine => counts.mines += 1,
                NoteKind::Sustain(s) => match s.kind {
                    SustainKind::Hold => counts.holds += 1,
                    SustainKind::Roll => counts.rolls += 1,
                },
            }
        }
        counts
    }

    #[inline(always)]
    pub fn scorable(&self) -> u32 {
        self.taps + self.holds + self.rolls
    }
}

/// A fully parsed chart. Read-only after parsing; sessions share it via `Arc`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChartDocument {
    pub metadata: SongMetadata,
    pub timing: TimingData,
    pub difficulties: Vec<Difficulty>,
    pub notes: FxHashMap<DifficultyKey, Arc<[Note]>>,
}

impl ChartDocument {
    pub fn notes_for(&self, key: &DifficultyKey) -> Option<&Arc<[Note]>> {
        self.notes.get(key)
    }

    /// Keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = DifficultyKey> + '_ {
        self.difficulties.iter().map(Difficulty::key)
    }

    pub fn overview(&self) -> ChartOverview {
        let (bpm_min, bpm_max) = self.timing.bpm_range();
        let difficulties = self
            .difficulties
            .iter()
            .filter_map(|difficulty| {
                let notes = self.notes_for(&difficulty.key())?;
                Some(DifficultyOverview {
                    key: difficulty.key(),
                    kind: difficulty.kind.clone(),
                    rating: difficulty.rating.clone(),
                    author: difficulty.author.clone(),
                    notes: NoteCounts::of(notes),
                    last_sec: notes.iter().map(Note::sec_end).fold(0.0_f64, f64::max),
                })
            })
            .collect();
        ChartOverview {
            title: self.metadata.title.clone(),
            artist: self.metadata.artist.clone(),
            bpm_min,
            bpm_max,
            stops: self.timing.stops().len(),
            difficulties,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyOverview {
    pub key: DifficultyKey,
    pub kind: String,
    pub rating: String,
    pub author: String,
    pub notes: NoteCounts,
    /// Time the last note (or sustain tail) ends.
    pub last_sec: f64,
}

/// What a song select screen shows: tempo range and per-difficulty density.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartOverview {
    pub title: String,
    pub artist: String,
    pub bpm_min: f64,
    pub bpm_max: f64,
    pub stops: usize,
    pub difficulties: Vec<DifficultyOverview>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::note::Sustain;

    #[test]
    fn key_concatenates_type_and_rating() {
        let diff = Difficulty {
            style: "dance-single".into(),
            author: String::new(),
            kind: "Hard".into(),
            rating: "9".into(),
        };
        assert_eq!(diff.key().as_str(), "Hard9");
        assert_eq!(diff.key(), DifficultyKey::from("Hard9"));
    }

    #[test]
    fn note_counts_split_by_kind() {
        let hold = NoteKind::Sustain(Sustain {
            kind: SustainKind::Hold,
            beat_length: 1.0,
            sec_length: 0.5,
        });
        let notes = [
            Note { kind: NoteKind::Tap, beat: 0.0, sec: 0.0, column: 0 },
            Note { kind: hold, beat: 1.0, sec: 0.5, column: 1 },
            Note { kind: NoteKind::Mine, beat: 2.0, sec: 1.0, column: 2 },
        ];
        let counts = NoteCounts::of(&notes);
        assert_eq!(counts.taps, 1);
        assert_eq!(counts.holds, 1);
        assert_eq!(counts.mines, 1);
        assert_eq!(counts.scorable(), 2);
    }

    #[test]
    fn overview_reports_tempo_range_and_density() {
        let raw = "#TITLE:Range;#BPMS:0=150,4=90,8=200;#STOPS:2=0.5;\
                   #NOTES:dance-single:a:Easy:3:r:1000,0000,2000,3000;\
                   #NOTES:dance-single:b:Hard:8:r:1111,M000;";
        let doc = crate::game::parsing::simfile::parse(raw, "").unwrap();
        let overview = doc.overview();
        assert_eq!(overview.title, "Range");
        assert_eq!((overview.bpm_min, overview.bpm_max), (90.0, 200.0));
        assert_eq!(overview.stops, 1);
        assert_eq!(overview.difficulties.len(), 2);
        let easy = &overview.difficulties[0];
        assert_eq!(easy.key.as_str(), "Easy3");
        assert_eq!(easy.notes.holds, 1);
        assert_eq!(overview.difficulties[1].notes.taps, 4);
        assert_eq!(overview.difficulties[1].notes.mines, 1);
        assert!((easy.last_sec - doc.timing.beat_to_sec(12.0)).abs() < 1e-6);
    }
}
