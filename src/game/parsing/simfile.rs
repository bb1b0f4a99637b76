use crate::game::chart::{BgChange, ChartDocument, Difficulty, SongMetadata};
use crate::game::parsing::{ChartError, notes::parse_measures};
use crate::game::timing::TimingData;
use log::{info, warn};
use rustc_hash::FxHashMap;
use std::sync::Arc;

// --- STATEMENT SPLITTING ---

/// Drops `//` comments and line breaks, leaving one long run of statements.
fn strip_comments_and_newlines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for line in raw.lines() {
        let line = match line.find("//") {
            Some(pos) => &line[..pos],
            None => line,
        };
        out.push_str(line.trim_end_matches('\r'));
    }
    out
}

/// Yields `(KEY, value)` for every `#KEY:value;` statement. Keys are
/// uppercased; values keep their inner `:` separators.
fn statements(clean: &str) -> impl Iterator<Item = (String, &str)> {
    clean.split(';').filter_map(|stmt| {
        let start = stmt.find('#')?;
        let body = &stmt[start + 1..];
        let (key, value) = body.split_once(':').unwrap_or((body, ""));
        Some((key.trim().to_ascii_uppercase(), value.trim()))
    })
}

// --- TAG VALUES ---

fn parse_pairs(tag: &'static str, value: &str) -> Result<Vec<(f64, f64)>, ChartError> {
    let invalid = |entry: &str| ChartError::InvalidTimingValue {
        tag,
        entry: entry.to_string(),
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (beat, val) = entry.split_once('=').ok_or_else(|| invalid(entry))?;
            let beat = beat.trim().parse::<f64>().map_err(|_| invalid(entry))?;
            let val = val.trim().parse::<f64>().map_err(|_| invalid(entry))?;
            if !beat.is_finite() || !val.is_finite() {
                return Err(invalid(entry));
            }
            Ok((beat, val))
        })
        .collect()
}

fn parse_bpms(value: &str) -> Result<Vec<(f64, f64)>, ChartError> {
    let pairs = parse_pairs("BPMS", value)?;
    if let Some(&(beat, bpm)) = pairs.iter().find(|(_, bpm)| *bpm <= 0.0) {
        return Err(ChartError::InvalidTimingValue {
            tag: "BPMS",
            entry: format!("{beat}={bpm}"),
        });
    }
    Ok(pairs)
}

fn parse_stops(value: &str) -> Result<Vec<(f64, f64)>, ChartError> {
    let pairs = parse_pairs("STOPS", value)?;
    if let Some(&(beat, len)) = pairs.iter().find(|(_, len)| *len < 0.0) {
        return Err(ChartError::InvalidTimingValue {
            tag: "STOPS",
            entry: format!("{beat}={len}"),
        });
    }
    Ok(pairs)
}

/// `beat=file[=rate=...]` entries; trailing fields are ignored.
fn parse_bg_changes(value: &str) -> Vec<BgChange> {
    let mut out = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut fields = entry.split('=');
        let beat = fields.next().and_then(|b| b.trim().parse::<f64>().ok());
        let file = fields.next().map(str::trim).filter(|f| !f.is_empty());
        match (beat, file) {
            (Some(beat), Some(file)) => out.push(BgChange {
                beat,
                file: file.to_string(),
            }),
            _ => warn!("Ignoring malformed #BGCHANGES entry '{}'", entry),
        }
    }
    out
}

fn parse_optional_f64(tag: &str, value: &str) -> Option<f64> {
    if value.is_empty() {
        return None;
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            warn!("Ignoring malformed #{}:{}", tag, value);
            None
        }
    }
}

/// Joins an asset file name onto the chart's base path. String-only, the
/// file is never touched.
pub fn resolve_asset(base: &str, file: &str) -> Option<String> {
    let file = file.trim();
    if file.is_empty() {
        return None;
    }
    if base.is_empty() || base.ends_with('/') || base.ends_with('\\') {
        Some(format!("{base}{file}"))
    } else {
        Some(format!("{base}/{file}"))
    }
}

// --- DOCUMENT ---

struct RawNotes<'a> {
    difficulty: Difficulty,
    measures: &'a str,
}

fn split_notes(value: &str) -> Result<RawNotes<'_>, ChartError> {
    let fields: Vec<&str> = value.split(':').map(str::trim).collect();
    if fields.len() < 6 {
        return Err(ChartError::MalformedNotes {
            fields: fields.len(),
        });
    }
    Ok(RawNotes {
        difficulty: Difficulty {
            style: fields[0].to_string(),
            author: fields[1].to_string(),
            kind: fields[2].to_string(),
            rating: fields[3].to_string(),
        },
        // fields[4] is the groove radar, unused here.
        measures: fields[5],
    })
}

/// Parses a whole `.sm` document. Asset references are resolved against
/// `base_asset_path`; nothing is read from disk.
pub fn parse(raw: &str, base_asset_path: &str) -> Result<ChartDocument, ChartError> {
    let clean = strip_comments_and_newlines(raw);

    let mut metadata = SongMetadata::default();
    let mut bpms: Vec<(f64, f64)> = Vec::new();
    let mut stops: Vec<(f64, f64)> = Vec::new();
    let mut raw_notes: Vec<RawNotes<'_>> = Vec::new();

    for (key, value) in statements(&clean) {
        match key.as_str() {
            "TITLE" => metadata.title = value.to_string(),
            "SUBTITLE" => metadata.subtitle = value.to_string(),
            "ARTIST" => metadata.artist = value.to_string(),
            "TITLETRANSLIT" => metadata.title_translit = value.to_string(),
            "SUBTITLETRANSLIT" => metadata.subtitle_translit = value.to_string(),
            "ARTISTTRANSLIT" => metadata.artist_translit = value.to_string(),
            "GENRE" => metadata.genre = value.to_string(),
            "CREDIT" => metadata.credit = value.to_string(),
            "BANNER" => metadata.banner = resolve_asset(base_asset_path, value),
            "BACKGROUND" => metadata.background = resolve_asset(base_asset_path, value),
            "CDTITLE" => metadata.cdtitle = resolve_asset(base_asset_path, value),
            "MUSIC" => metadata.music = resolve_asset(base_asset_path, value),
            "OFFSET" => metadata.offset = parse_optional_f64("OFFSET", value).unwrap_or(0.0),
            "SAMPLESTART" => metadata.sample_start = parse_optional_f64("SAMPLESTART", value),
            "SAMPLELENGTH" => metadata.sample_length = parse_optional_f64("SAMPLELENGTH", value),
            "DISPLAYBPM" => {
                metadata.display_bpm = Some(value.to_string()).filter(|v| !v.is_empty())
            }
            "BGCHANGES" => metadata.bg_changes = parse_bg_changes(value),
            "BPMS" => bpms = parse_bpms(value)?,
            "STOPS" | "FREEZES" => stops = parse_stops(value)?,
            "NOTES" => raw_notes.push(split_notes(value)?),
            _ => {}
        }
    }

    // Tags may appear in any order, so notes are resolved once timing is complete.
    let timing = TimingData::new(&bpms, &stops)?;

    let mut difficulties: Vec<Difficulty> = Vec::with_capacity(raw_notes.len());
    let mut notes = FxHashMap::default();
    for block in raw_notes {
        let key = block.difficulty.key();
        if notes.contains_key(&key) {
            warn!("Duplicate #NOTES block for difficulty '{}'; keeping the first.", key);
            continue;
        }
        let parsed = parse_measures(block.measures, &timing)?;
        info!(
            "Parsed {} notes for difficulty '{}' ({}).",
            parsed.len(),
            key,
            block.difficulty.style
        );
        notes.insert(key, Arc::<[_]>::from(parsed));
        difficulties.push(block.difficulty);
    }

    info!(
        "Loaded chart '{}' with {} difficulties, {} BPM changes and {} stops.",
        metadata.title,
        difficulties.len(),
        timing.bpm_changes().len(),
        timing.stops().len()
    );

    Ok(ChartDocument {
        metadata,
        timing,
        difficulties,
        notes,
    })
}
