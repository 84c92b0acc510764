use crate::score::notation_parser::{parse_cell, parse_stroke};
use crate::score::song::{
    Chord, ChordSequence, ChordSubSection, Column, NoteColumn, NoteLength, PalmMute, Section,
    SectionProgression, Song, StringCell, Strum, StrummingPattern, SubSection, TabSubSection,
    Tuning, STRING_COUNT,
};

pub fn init_logger() {
    env_logger::builder()
        .is_test(true)
        .try_init()
        .unwrap_or_default();
}

pub fn cells(strings: [&str; STRING_COUNT]) -> [StringCell; STRING_COUNT] {
    strings.map(|s| parse_cell(s).unwrap())
}

pub fn note_column(strings: [&str; STRING_COUNT], stroke: &str, note_length: NoteLength) -> Column {
    Column::Note(NoteColumn {
        palm_mute: PalmMute::None,
        strings: cells(strings),
        stroke: parse_stroke(stroke).unwrap(),
        note_length,
        note_length_modified: false,
    })
}

/// Quarter note on the lowest string.
pub fn quarter(fret: &str) -> Column {
    note_column([fret, "", "", "", "", ""], "", NoteLength::Quarter)
}

pub const fn measure_line(bpm: Option<u32>) -> Column {
    Column::MeasureLine {
        bpm,
        palm_mute_active: false,
    }
}

pub fn tab_sub_section(
    columns: Vec<Column>,
    bpm: Option<u32>,
    repetitions: Option<u32>,
) -> SubSection {
    SubSection::Tab(TabSubSection {
        bpm,
        repetitions,
        columns,
    })
}

pub fn strumming_pattern(note_length: NoteLength, strokes: &[&str]) -> StrummingPattern {
    StrummingPattern {
        note_length,
        strums: strokes
            .iter()
            .map(|stroke| Strum {
                stroke: parse_stroke(stroke).unwrap(),
                palm_mute: PalmMute::None,
            })
            .collect(),
    }
}

pub fn chord_sequence(
    chords: &[&str],
    pattern: StrummingPattern,
    bpm: Option<u32>,
    repetitions: Option<u32>,
) -> ChordSequence {
    ChordSequence {
        chords: chords.iter().map(|c| (*c).to_string()).collect(),
        strumming_pattern: pattern,
        bpm,
        repetitions,
    }
}

pub fn chord_sub_section(
    sequences: Vec<ChordSequence>,
    bpm: Option<u32>,
    repetitions: Option<u32>,
) -> SubSection {
    SubSection::Chord(ChordSubSection {
        bpm,
        repetitions,
        sequences,
    })
}

pub fn section(id: &str, sub_sections: Vec<SubSection>) -> Section {
    Section {
        id: id.to_string(),
        title: id.to_uppercase(),
        sub_sections,
    }
}

pub fn progression(entries: &[(&str, Option<u32>)]) -> Vec<SectionProgression> {
    entries
        .iter()
        .map(|(id, repetitions)| SectionProgression {
            section_id: (*id).to_string(),
            repetitions: *repetitions,
        })
        .collect()
}

pub fn c_major() -> Chord {
    Chord {
        name: "C".to_string(),
        frets: cells(["", "3", "2", "0", "1", "0"]),
        color: "red".to_string(),
    }
}

pub fn g_major() -> Chord {
    Chord {
        name: "G".to_string(),
        frets: cells(["3", "2", "0", "0", "0", "3"]),
        color: "green".to_string(),
    }
}

pub fn song(bpm: u32, sections: Vec<Section>) -> Song {
    Song {
        title: "fixture".to_string(),
        artist: String::new(),
        bpm,
        tuning: Tuning::default(),
        capo: 0,
        sections,
        section_progression: vec![],
        chords: vec![c_major(), g_major()],
    }
}
