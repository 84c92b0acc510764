use crate::compiler::event::{Compilation, Location, Metadata, Notation, PlaybackEvent, PlaybackNote};
use crate::compiler::tempo::{event_seconds, resolve_bpm, resolve_repetitions};
use crate::score::song::{
    default_progression, find_chord, Chord, ChordSequence, ChordSubSection, Column, Section,
    SectionProgression, StringCell, SubSection, TabSubSection, DEFAULT_BPM, STRING_COUNT,
};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CompileSettings {
    pub baseline_bpm: u32,
    pub speed: f64,
}

impl CompileSettings {
    pub fn new(baseline_bpm: u32, speed: f64) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            log::warn!("invalid playback speed {speed}, using 1.0");
            1.0
        };
        let baseline_bpm = if baseline_bpm == 0 {
            log::warn!("baseline bpm of 0, using {DEFAULT_BPM}");
            DEFAULT_BPM
        } else {
            baseline_bpm
        };
        Self {
            baseline_bpm,
            speed,
        }
    }
}

/// Narrows a compilation to one section, one sub-section or one chord sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SubtreeSelector {
    pub section_index: usize,
    pub sub_section_index: Option<usize>,
    pub chord_sequence_index: Option<usize>,
}

impl SubtreeSelector {
    pub const fn section(section_index: usize) -> Self {
        Self {
            section_index,
            sub_section_index: None,
            chord_sequence_index: None,
        }
    }

    pub const fn sub_section(section_index: usize, sub_section_index: usize) -> Self {
        Self {
            section_index,
            sub_section_index: Some(sub_section_index),
            chord_sequence_index: None,
        }
    }

    pub const fn chord_sequence(
        section_index: usize,
        sub_section_index: usize,
        chord_sequence_index: usize,
    ) -> Self {
        Self {
            section_index,
            sub_section_index: Some(sub_section_index),
            chord_sequence_index: Some(chord_sequence_index),
        }
    }
}

/// Flattens the score tree into a linear, time-stamped event sequence.
pub struct TabCompiler<'a> {
    settings: CompileSettings,
    chords: &'a [Chord],
    events: Vec<PlaybackEvent>,  // events accumulated during compilation
    metadata: Vec<Metadata>,     // aligned with events
    elapsed_seconds: f64,        // start time of the next event
    malformed: bool,             // abort with an empty compilation
}

impl<'a> TabCompiler<'a> {
    pub const fn new(settings: CompileSettings, chords: &'a [Chord]) -> Self {
        Self {
            settings,
            chords,
            events: Vec::new(),
            metadata: Vec::new(),
            elapsed_seconds: 0.0,
            malformed: false,
        }
    }

    /// Compile the whole song following the section progression.
    pub fn compile_full(
        mut self,
        sections: &[Section],
        progression: &[SectionProgression],
    ) -> Compilation {
        if sections.is_empty() {
            log::debug!("no sections to compile");
            return Compilation::empty(self.settings.speed);
        }
        let document_order;
        let progression = if progression.is_empty() {
            document_order = default_progression(sections);
            &document_order
        } else {
            progression
        };
        for (progression_index, entry) in progression.iter().enumerate() {
            let Some(section_index) = sections.iter().position(|s| s.id == entry.section_id)
            else {
                log::warn!(
                    "section progression references unknown section {:?}",
                    entry.section_id
                );
                continue;
            };
            let section = &sections[section_index];
            for section_repeat_index in 0..resolve_repetitions(entry.repetitions) {
                let location = Location {
                    progression_index,
                    section_index,
                    section_repeat_index: section_repeat_index as usize,
                    ..Location::default()
                };
                self.add_section(section, location);
            }
        }
        self.finish(Location::default())
    }

    /// Compile a single section, sub-section or chord sequence.
    pub fn compile_subtree(
        mut self,
        sections: &[Section],
        selector: SubtreeSelector,
    ) -> Compilation {
        let Some(section) = sections.get(selector.section_index) else {
            log::warn!("no section at index {}", selector.section_index);
            return Compilation::empty(self.settings.speed);
        };
        let location = Location {
            section_index: selector.section_index,
            ..Location::default()
        };
        match selector.sub_section_index {
            None => self.add_section(section, location),
            Some(sub_section_index) => {
                let Some(sub_section) = section.sub_sections.get(sub_section_index) else {
                    log::warn!(
                        "no sub-section at index {sub_section_index} in section {:?}",
                        section.id
                    );
                    return Compilation::empty(self.settings.speed);
                };
                let location = Location {
                    sub_section_index,
                    ..location
                };
                match (sub_section, selector.chord_sequence_index) {
                    (SubSection::Chord(chord), Some(sequence_index)) => {
                        let Some(sequence) = chord.sequences.get(sequence_index) else {
                            log::warn!("no chord sequence at index {sequence_index}");
                            return Compilation::empty(self.settings.speed);
                        };
                        if sequence.strumming_pattern.strums.is_empty() {
                            log::warn!("chord sequence {sequence_index} has no strums");
                            return Compilation::empty(self.settings.speed);
                        }
                        self.add_chord_sequence_repeats(sequence, sequence_index, chord, location);
                    }
                    (SubSection::Tab(_), Some(_)) => {
                        log::warn!("chord sequence selector ignored for tab sub-section");
                        self.add_sub_section_repeats(sub_section, location);
                    }
                    (_, None) => self.add_sub_section_repeats(sub_section, location),
                }
            }
        }
        self.finish(location)
    }

    fn add_section(&mut self, section: &Section, location: Location) {
        log::debug!("compiling section {:?}", section.id);
        for (sub_section_index, sub_section) in section.sub_sections.iter().enumerate() {
            let location = Location {
                sub_section_index,
                ..location
            };
            self.add_sub_section_repeats(sub_section, location);
        }
    }

    fn add_sub_section_repeats(&mut self, sub_section: &SubSection, location: Location) {
        for sub_section_repeat_index in 0..resolve_repetitions(sub_section.repetitions()) {
            let location = Location {
                sub_section_repeat_index: sub_section_repeat_index as usize,
                ..location
            };
            match sub_section {
                SubSection::Tab(tab) => self.add_tab_sub_section(tab, location),
                SubSection::Chord(chord) => self.add_chord_sub_section(chord, location),
            }
        }
    }

    fn add_tab_sub_section(&mut self, tab: &TabSubSection, location: Location) {
        let baseline_bpm = self.settings.baseline_bpm;
        let mut active_bpm = resolve_bpm(None, baseline_bpm, tab.bpm);
        let mut previous_measure_line = false;
        for (column_index, column) in tab.columns.iter().enumerate() {
            let location = Location {
                column_index,
                ..location
            };
            match column {
                Column::MeasureLine {
                    bpm,
                    palm_mute_active,
                } => {
                    if previous_measure_line {
                        log::warn!("adjacent measure lines at {location:?}");
                    }
                    previous_measure_line = true;
                    active_bpm = resolve_bpm(*bpm, baseline_bpm, tab.bpm);
                    let event = PlaybackEvent::MeasureLine {
                        palm_mute_active: *palm_mute_active,
                    };
                    self.add_event(event, location, active_bpm, 1.0, 0.0);
                }
                Column::Note(note) => {
                    previous_measure_line = false;
                    let event = PlaybackNote {
                        notation: Notation::Tab,
                        strings: note.strings.clone(),
                        stroke: note.stroke,
                        palm_mute: note.palm_mute,
                        note_length: note.note_length,
                        bpm: active_bpm,
                        chord_name: None,
                    };
                    self.add_note(event, location);
                }
            }
        }
    }

    fn add_chord_sub_section(&mut self, chord: &ChordSubSection, location: Location) {
        let has_data = chord
            .sequences
            .first()
            .is_some_and(|s| !s.strumming_pattern.strums.is_empty());
        if !has_data {
            log::warn!("chord sub-section without strums at {location:?}");
            self.malformed = true;
            return;
        }
        for (sequence_index, sequence) in chord.sequences.iter().enumerate() {
            self.add_chord_sequence_repeats(sequence, sequence_index, chord, location);
        }
    }

    fn add_chord_sequence_repeats(
        &mut self,
        sequence: &ChordSequence,
        sequence_index: usize,
        chord: &ChordSubSection,
        location: Location,
    ) {
        for repeat_index in 0..resolve_repetitions(sequence.repetitions) {
            let location = Location {
                chord_sequence_index: Some(sequence_index),
                chord_sequence_repeat_index: Some(repeat_index as usize),
                ..location
            };
            self.add_chord_sequence(sequence, chord.bpm, location);
        }
    }

    fn add_chord_sequence(
        &mut self,
        sequence: &ChordSequence,
        sub_section_bpm: Option<u32>,
        location: Location,
    ) {
        let bpm = resolve_bpm(sequence.bpm, self.settings.baseline_bpm, sub_section_bpm);
        let pattern = &sequence.strumming_pattern;
        let mut last_chord: Option<&str> = None;
        for (column_index, strum) in pattern.strums.iter().enumerate() {
            let location = Location {
                column_index,
                ..location
            };
            // an empty cell inherits the previous chord unless the strum is a true rest
            let chord_name = match sequence.chord_at(column_index) {
                Some(name) => {
                    last_chord = Some(name);
                    Some(name)
                }
                None if !strum.stroke.is_empty() => last_chord,
                None => None,
            };
            let strings = match chord_name {
                Some(name) if !strum.stroke.is_empty() => self.chord_frets(name),
                _ => Default::default(),
            };
            let event = PlaybackNote {
                notation: Notation::Strum,
                strings,
                stroke: strum.stroke,
                palm_mute: strum.palm_mute,
                note_length: pattern.note_length,
                bpm,
                chord_name: chord_name.map(str::to_string),
            };
            self.add_note(event, location);
        }
    }

    fn chord_frets(&self, name: &str) -> [StringCell; STRING_COUNT] {
        if let Some(chord) = find_chord(self.chords, name) {
            chord.frets.clone()
        } else {
            log::warn!("chord {name:?} missing from glossary, compiling a silent column");
            Default::default()
        }
    }

    fn add_note(&mut self, note: PlaybackNote, location: Location) {
        let bpm = note.bpm;
        let beats = note.beats();
        let duration = event_seconds(bpm, beats, self.settings.speed);
        self.add_event(PlaybackEvent::Note(note), location, bpm, beats, duration);
    }

    fn add_event(
        &mut self,
        event: PlaybackEvent,
        location: Location,
        bpm: u32,
        note_length_multiplier: f64,
        duration: f64,
    ) {
        self.metadata.push(Metadata {
            location,
            bpm,
            note_length_multiplier,
            elapsed_seconds: self.elapsed_seconds,
        });
        self.events.push(event);
        self.elapsed_seconds += duration;
    }

    /// Append the terminal entry, or give up if a malformed sub-section was met.
    fn finish(mut self, scope: Location) -> Compilation {
        if self.malformed {
            return Compilation::empty(self.settings.speed);
        }
        let terminal = match self.metadata.last() {
            Some(last) => last.terminal(self.elapsed_seconds),
            None => Metadata {
                location: scope,
                bpm: self.settings.baseline_bpm,
                note_length_multiplier: 1.0,
                elapsed_seconds: 0.0,
            },
        };
        self.events.push(PlaybackEvent::Terminal);
        self.metadata.push(terminal);
        log::debug!(
            "compiled {} events over {:.3}s",
            self.events.len(),
            self.elapsed_seconds
        );
        Compilation {
            events: self.events,
            metadata: self.metadata,
            speed: self.settings.speed,
        }
    }
}
