//! Guitar articulations.
//!
//! Each playable column becomes a list of [`VoiceCommand`]s: which strings
//! stop, which voices start and how they are shaped. Look-around to the
//! neighbouring columns resolves ties and slides.

use crate::audio::backend::{AudioBackend, Filter, PitchRamp, Slap, Vibrato, Voice};
use crate::compiler::event::{Compilation, Notation, PlaybackEvent, PlaybackNote};
use crate::compiler::tempo::{effective_bpm, event_seconds};
use crate::score::song::{
    FrettedNote, SlideDirection, StringCell, Tie, Tuning, MAX_FRET, STRING_COUNT,
};
use std::ops::Range;

/// Frets covered by a slide into or out of a note.
pub const SLIDE_FRETS: u8 = 3;

const ACCENT_GAIN: f64 = 1.75;
const STACCATO_GAIN: f64 = 1.1;
const PALM_MUTE_GAIN: f64 = 0.45;
const PALM_MUTE_ACCENTED_GAIN: f64 = 0.55;
const DEAD_NOTE_GAIN: f64 = 0.2;
const DEAD_NOTE_SECONDS: f64 = 0.06;

const PULL_OFF_SAMPLE_START: f64 = 0.25;
const TETHER_SAMPLE_START: f64 = 0.85;

const DEFAULT_BEND_CENTS: f64 = 100.0;
const VIBRATO_DEPTH_CENTS: f64 = 25.0;
const VIBRATO_MIN_HZ: f64 = 3.0;
const VIBRATO_MAX_HZ: f64 = 5.0;

// seconds between two strings of a strum at 120 bpm
const STRUM_STAGGER_SECONDS: f64 = 0.012;
const MAX_STRUM_STAGGER_SECONDS: f64 = 0.03;

const PALM_MUTE_FILTERS: [Filter; 2] = [
    Filter::LowPass {
        frequency: 900.0,
        q: 1.0,
    },
    Filter::BassBoost {
        frequency: 150.0,
        gain_db: 6.0,
    },
];

const DEAD_NOTE_FILTERS: [Filter; 2] = [
    Filter::LowPass {
        frequency: 300.0,
        q: 2.0,
    },
    Filter::BassBoost {
        frequency: 100.0,
        gain_db: 10.0,
    },
];

/// A playable column and its closest playable neighbours.
///
/// Measure lines are skipped so ties carry across bar lines.
#[derive(Debug, Clone, Copy)]
pub struct NoteContext<'a> {
    pub note: &'a PlaybackNote,
    pub previous: Option<&'a PlaybackNote>,
    pub before_previous: Option<&'a PlaybackNote>,
    pub next: Option<&'a PlaybackNote>,
    pub speed: f64,
}

impl<'a> NoteContext<'a> {
    /// Context of the note at `index`, `None` if it is not a note.
    pub fn at(compilation: &'a Compilation, index: usize) -> Option<Self> {
        Self::within(compilation, index, 0..compilation.len())
    }

    /// Same as [`NoteContext::at`] with neighbours limited to `range`.
    pub fn within(
        compilation: &'a Compilation,
        index: usize,
        range: Range<usize>,
    ) -> Option<Self> {
        if !range.contains(&index) {
            return None;
        }
        let note = compilation.events.get(index)?.as_note()?;
        let end = range.end.min(compilation.len());
        let mut before = compilation.events[range.start..index]
            .iter()
            .rev()
            .filter_map(PlaybackEvent::as_note);
        let previous = before.next();
        let before_previous = before.next();
        let next = compilation.events[index + 1..end]
            .iter()
            .find_map(PlaybackEvent::as_note);
        Some(Self {
            note,
            previous,
            before_previous,
            next,
            speed: compilation.speed,
        })
    }

    /// Seconds of one quarter-note beat.
    fn beat_seconds(&self) -> f64 {
        event_seconds(self.note.bpm, 1.0, self.speed)
    }

    fn note_seconds(&self) -> f64 {
        event_seconds(self.note.bpm, self.note.beats(), self.speed)
    }

    fn previous_cell(&self, string_index: usize) -> Option<&'a StringCell> {
        self.previous.map(|n| &n.strings[string_index])
    }

    fn before_previous_cell(&self, string_index: usize) -> Option<&'a StringCell> {
        self.before_previous.map(|n| &n.strings[string_index])
    }

    fn next_cell(&self, string_index: usize) -> Option<&'a StringCell> {
        self.next.map(|n| &n.strings[string_index])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceCommand {
    StopAll,
    StopString {
        string_index: usize,
        delay_seconds: f64,
    },
    Start(Voice),
    Slap(Slap),
}

pub struct EffectsEngine {
    tuning: Tuning,
    capo: u8,
}

impl EffectsEngine {
    pub const fn new(tuning: Tuning, capo: u8) -> Self {
        Self { tuning, capo }
    }

    pub fn perform<B: AudioBackend + ?Sized>(&self, backend: &B, context: &NoteContext<'_>) {
        for command in self.plan(context) {
            match command {
                VoiceCommand::StopAll => backend.stop_all(),
                VoiceCommand::StopString {
                    string_index,
                    delay_seconds,
                } => backend.stop_string(string_index, delay_seconds),
                VoiceCommand::Start(voice) => backend.start_voice(&voice),
                VoiceCommand::Slap(slap) => backend.start_slap(&slap),
            }
        }
    }

    pub fn plan(&self, context: &NoteContext<'_>) -> Vec<VoiceCommand> {
        let note = context.note;
        if note.stroke.is_rest() {
            let gain = if note.stroke.accent { ACCENT_GAIN } else { 1.0 };
            log::debug!("slap with gain {gain}");
            return vec![VoiceCommand::StopAll, VoiceCommand::Slap(Slap::new(gain))];
        }
        let sounded = note.sounded_strings();
        if sounded == 0 {
            return Vec::new();
        }

        let order: Vec<usize> = if note.stroke.is_up() {
            (0..STRING_COUNT).rev().collect()
        } else {
            (0..STRING_COUNT).collect()
        };
        let stagger = if note.notation == Notation::Strum && sounded > 1 {
            let bpm = effective_bpm(note.bpm, note.beats(), context.speed);
            (STRUM_STAGGER_SECONDS * 120.0 / bpm).min(MAX_STRUM_STAGGER_SECONDS)
        } else {
            0.0
        };
        let first = order
            .iter()
            .copied()
            .find(|i| note.strings[*i].is_sounded())
            .unwrap_or_default();

        let mut commands = Vec::with_capacity(sounded * 2);
        for string_index in order {
            let voice = match &note.strings[string_index] {
                StringCell::Dead => self.dead_voice(string_index, context),
                StringCell::Fret(fretted) => self.fretted_voice(string_index, fretted, context),
                StringCell::Empty | StringCell::Tie(_) => continue,
            };
            let start_offset = stagger * first.abs_diff(string_index) as f64;
            commands.push(VoiceCommand::StopString {
                string_index,
                delay_seconds: start_offset,
            });
            commands.push(VoiceCommand::Start(Voice {
                start_offset,
                ..voice
            }));
        }
        commands
    }

    fn voice(&self, string_index: usize, fret: u8) -> Voice {
        let fret = fret.saturating_add(self.capo);
        let key = self.tuning.key(string_index).saturating_add(fret);
        Voice::new(string_index, fret, key)
    }

    fn dead_voice(&self, string_index: usize, context: &NoteContext<'_>) -> Voice {
        let mut voice = self.voice(string_index, 0);
        voice.duration = Some(DEAD_NOTE_SECONDS);
        voice.gain *= DEAD_NOTE_GAIN;
        voice.filters.extend(DEAD_NOTE_FILTERS);
        if context.note.palm_mute.is_active() {
            voice.filters.extend(PALM_MUTE_FILTERS);
        }
        voice
    }

    fn fretted_voice(
        &self,
        string_index: usize,
        fretted: &FrettedNote,
        context: &NoteContext<'_>,
    ) -> Voice {
        let note = context.note;
        let fret = fretted.fret;
        let beat = context.beat_seconds();
        let mut voice = self.voice(string_index, fret);

        if let Some((origin, tie)) = tether_origin(string_index, context) {
            voice.tether = Some(tie);
            voice.sample_start = if tie == Tie::PullOff {
                PULL_OFF_SAMPLE_START
            } else {
                TETHER_SAMPLE_START
            };
            voice.pitch_ramps.push(PitchRamp {
                from_cents: fret_cents(origin, fret),
                to_cents: 0.0,
                delay_seconds: 0.0,
                ramp_seconds: if tie.is_slide() { beat * 0.25 } else { 0.0 },
            });
        } else if let Some(direction) = fretted.slide_in {
            let origin = match direction {
                SlideDirection::Up => fret.saturating_sub(SLIDE_FRETS),
                SlideDirection::Down => fret.saturating_add(SLIDE_FRETS).min(MAX_FRET),
            };
            voice.pitch_ramps.push(PitchRamp {
                from_cents: fret_cents(origin, fret),
                to_cents: 0.0,
                delay_seconds: 0.0,
                ramp_seconds: beat * 0.25,
            });
        }

        // slide out of the note when nothing picks it up
        if let Some(Tie::Slide(direction)) = fretted.tie {
            if context.next_cell(string_index).map_or(true, StringCell::is_empty) {
                let target = match direction {
                    SlideDirection::Up => fret.saturating_add(SLIDE_FRETS).min(MAX_FRET),
                    SlideDirection::Down => fret.saturating_sub(SLIDE_FRETS),
                };
                let ramp_seconds = beat * 0.25;
                voice.pitch_ramps.push(PitchRamp {
                    from_cents: 0.0,
                    to_cents: fret_cents(target, fret),
                    delay_seconds: (context.note_seconds() - ramp_seconds).max(0.0),
                    ramp_seconds,
                });
            }
        }

        if let Some(bend) = fretted.bend {
            let cents = match bend.target_fret {
                Some(target) => fret_cents(target, fret),
                None if string_index >= 2 => DEFAULT_BEND_CENTS,
                None => -DEFAULT_BEND_CENTS,
            };
            voice.pitch_ramps.push(PitchRamp {
                from_cents: 0.0,
                to_cents: cents,
                delay_seconds: 0.0,
                ramp_seconds: beat * 0.5,
            });
        }

        if fretted.vibrato {
            let rate_hz = (400.0 / (f64::from(note.bpm) * context.speed))
                .clamp(VIBRATO_MIN_HZ, VIBRATO_MAX_HZ);
            voice.vibrato = Some(Vibrato {
                rate_hz,
                depth_cents: VIBRATO_DEPTH_CENTS,
            });
        }

        let accent = fretted.accent || note.stroke.accent;
        let staccato = fretted.staccato || note.stroke.staccato;
        if note.palm_mute.is_active() {
            voice.filters.extend(PALM_MUTE_FILTERS);
            voice.gain *= if accent || staccato {
                PALM_MUTE_ACCENTED_GAIN
            } else {
                PALM_MUTE_GAIN
            };
        }
        if accent {
            voice.gain *= ACCENT_GAIN;
        }
        if staccato {
            voice.duration = Some(beat * 0.5);
            voice.gain *= STACCATO_GAIN;
        }
        voice
    }
}

/// Fret and tie the voice on `string_index` continues from, if any.
fn tether_origin(string_index: usize, context: &NoteContext<'_>) -> Option<(u8, Tie)> {
    match context.previous_cell(string_index)? {
        StringCell::Fret(FrettedNote {
            fret,
            tie: Some(tie),
            ..
        }) => Some((*fret, *tie)),
        StringCell::Tie(tie) => match context.before_previous_cell(string_index)? {
            StringCell::Fret(origin) => Some((origin.fret, *tie)),
            _ => None,
        },
        _ => None,
    }
}

/// Interval from `to` up to `from`, in cents.
fn fret_cents(from: u8, to: u8) -> f64 {
    (f64::from(from) - f64::from(to)) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::recording::{BackendCall, RecordingBackend};
    use crate::compiler::tab_compiler::{CompileSettings, TabCompiler};
    use crate::score::song::{Column, NoteLength, PalmMute, Section};
    use crate::score::song_fixtures::{
        c_major, chord_sequence, chord_sub_section, g_major, measure_line, note_column, section,
        strumming_pattern, tab_sub_section,
    };

    fn compile(sections: &[Section], bpm: u32) -> Compilation {
        let chords = [c_major(), g_major()];
        TabCompiler::new(CompileSettings::new(bpm, 1.0), &chords).compile_full(sections, &[])
    }

    fn tab(columns: Vec<Column>) -> Compilation {
        compile(&[section("a", vec![tab_sub_section(columns, None, None)])], 120)
    }

    fn strums(strokes: &[&str], bpm: u32) -> Compilation {
        let pattern = strumming_pattern(NoteLength::Quarter, strokes);
        let sequence = chord_sequence(&["C"], pattern, None, None);
        compile(&[section("a", vec![chord_sub_section(vec![sequence], None, None)])], bpm)
    }

    fn column(strings: [&str; STRING_COUNT]) -> Column {
        note_column(strings, "", NoteLength::Quarter)
    }

    fn voices(engine: &EffectsEngine, compilation: &Compilation, index: usize) -> Vec<Voice> {
        let context = NoteContext::at(compilation, index).unwrap();
        engine
            .plan(&context)
            .into_iter()
            .filter_map(|command| match command {
                VoiceCommand::Start(voice) => Some(voice),
                _ => None,
            })
            .collect()
    }

    fn standard() -> EffectsEngine {
        EffectsEngine::new(Tuning::default(), 0)
    }

    #[test]
    fn test_context_skips_measure_lines() {
        let compilation = tab(vec![
            column(["1", "", "", "", "", ""]),
            column(["2", "", "", "", "", ""]),
            measure_line(None),
            column(["3", "", "", "", "", ""]),
            column(["4", "", "", "", "", ""]),
        ]);
        let context = NoteContext::at(&compilation, 3).unwrap();
        assert_eq!(context.previous.unwrap().strings[0], StringCell::fret(2));
        assert_eq!(context.before_previous.unwrap().strings[0], StringCell::fret(1));
        assert_eq!(context.next.unwrap().strings[0], StringCell::fret(4));
        assert!(NoteContext::at(&compilation, 2).is_none());
        let last = NoteContext::at(&compilation, 4).unwrap();
        assert!(last.next.is_none());
    }

    #[test]
    fn test_context_within_range() {
        let compilation = tab(vec![
            column(["1", "", "", "", "", ""]),
            column(["2", "", "", "", "", ""]),
            column(["3", "", "", "", "", ""]),
            column(["4", "", "", "", "", ""]),
        ]);
        let context = NoteContext::within(&compilation, 2, 1..3).unwrap();
        assert_eq!(context.previous.unwrap().strings[0], StringCell::fret(2));
        assert!(context.before_previous.is_none());
        assert!(context.next.is_none());
        assert!(NoteContext::within(&compilation, 3, 1..3).is_none());
    }

    #[test]
    fn test_rest_strum_slaps() {
        let compilation = strums(&["s", "s>"], 120);
        let engine = standard();
        let context = NoteContext::at(&compilation, 0).unwrap();
        assert_eq!(
            engine.plan(&context),
            vec![VoiceCommand::StopAll, VoiceCommand::Slap(Slap::new(1.0))]
        );
        let context = NoteContext::at(&compilation, 1).unwrap();
        let commands = engine.plan(&context);
        assert_eq!(commands[1], VoiceCommand::Slap(Slap::new(ACCENT_GAIN)));

        let backend = RecordingBackend::new(true);
        engine.perform(&backend, &context);
        assert_eq!(
            backend.calls(),
            vec![BackendCall::StopAll, BackendCall::Slap(Slap::new(1.75))]
        );
        assert_eq!(Slap::new(1.0).duration, 0.25);
    }

    #[test]
    fn test_silent_columns() {
        let compilation = tab(vec![column(["", "", "", "", "", ""]), column(["h", "", "", "", "", ""])]);
        let engine = standard();
        assert!(engine.plan(&NoteContext::at(&compilation, 0).unwrap()).is_empty());
        assert!(engine.plan(&NoteContext::at(&compilation, 1).unwrap()).is_empty());
    }

    #[test]
    fn test_down_strum_staggers_from_first_string() {
        let compilation = strums(&["v", "^"], 120);
        let engine = standard();
        let down = voices(&engine, &compilation, 0);
        let strings: Vec<_> = down.iter().map(|v| v.string_index).collect();
        assert_eq!(strings, vec![1, 2, 3, 4, 5]);
        let keys: Vec<_> = down.iter().map(|v| v.key).collect();
        assert_eq!(keys, vec![48, 52, 55, 60, 64]);
        for voice in &down {
            let expected = 0.012 * (voice.string_index - 1) as f64;
            assert!((voice.start_offset - expected).abs() < 1e-12);
        }

        let up = voices(&engine, &compilation, 1);
        let strings: Vec<_> = up.iter().map(|v| v.string_index).collect();
        assert_eq!(strings, vec![5, 4, 3, 2, 1]);
        assert_eq!(up[0].start_offset, 0.0);
        assert!((up[4].start_offset - 0.048).abs() < 1e-12);
    }

    #[test]
    fn test_stagger_tightens_with_tempo() {
        let engine = standard();
        let fast = voices(&engine, &strums(&["v"], 240), 0);
        assert!((fast[1].start_offset - 0.006).abs() < 1e-12);
        let slow = voices(&engine, &strums(&["v"], 30), 0);
        // capped
        assert!((slow[1].start_offset - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_tab_columns_are_not_staggered() {
        let compilation = tab(vec![column(["3", "", "", "", "", "5"])]);
        let voices = voices(&standard(), &compilation, 0);
        assert_eq!(voices.len(), 2);
        assert!(voices.iter().all(|v| v.start_offset == 0.0));
    }

    #[test]
    fn test_each_voice_stops_its_string_first() {
        let compilation = tab(vec![column(["3", "", "", "", "", "5"])]);
        let context = NoteContext::at(&compilation, 0).unwrap();
        let commands = standard().plan(&context);
        assert_eq!(commands.len(), 4);
        assert_eq!(
            commands[0],
            VoiceCommand::StopString {
                string_index: 0,
                delay_seconds: 0.0
            }
        );
        assert!(matches!(&commands[1], VoiceCommand::Start(v) if v.string_index == 0));
    }

    #[test]
    fn test_capo_shifts_every_fret() {
        let compilation = tab(vec![column(["3", "0", "", "", "", "x"])]);
        let voices = voices(&EffectsEngine::new(Tuning::default(), 2), &compilation, 0);
        assert_eq!(voices[0].fret, 5);
        assert_eq!(voices[0].key, 45);
        assert_eq!(voices[1].fret, 2);
        assert_eq!(voices[1].key, 47);
        assert_eq!(voices[2].key, 66);
    }

    #[test]
    fn test_hammer_on_from_previous_cell() {
        let compilation = tab(vec![column(["5h", "", "", "", "", ""]), column(["7", "", "", "", "", ""])]);
        let voice = &voices(&standard(), &compilation, 1)[0];
        assert_eq!(voice.tether, Some(Tie::HammerOn));
        assert_eq!(voice.sample_start, 0.85);
        assert_eq!(voice.key, 47);
        assert_eq!(
            voice.pitch_ramps,
            vec![PitchRamp {
                from_cents: -200.0,
                to_cents: 0.0,
                delay_seconds: 0.0,
                ramp_seconds: 0.0,
            }]
        );
    }

    #[test]
    fn test_pull_off_through_tie_cell() {
        let compilation = tab(vec![
            column(["", "7", "", "", "", ""]),
            column(["", "p", "", "", "", ""]),
            column(["", "5", "", "", "", ""]),
        ]);
        let voice = &voices(&standard(), &compilation, 2)[0];
        assert_eq!(voice.tether, Some(Tie::PullOff));
        assert_eq!(voice.sample_start, 0.25);
        assert_eq!(voice.pitch_ramps[0].from_cents, 200.0);
        assert_eq!(voice.pitch_ramps[0].ramp_seconds, 0.0);
    }

    #[test]
    fn test_slide_tie_ramps_over_quarter_beat() {
        let compilation = tab(vec![column(["", "", "5/", "", "", ""]), column(["", "", "9", "", "", ""])]);
        let engine = standard();
        let first = &voices(&engine, &compilation, 0)[0];
        // picked up by the next note, no slide out
        assert!(first.pitch_ramps.is_empty());
        let second = &voices(&engine, &compilation, 1)[0];
        assert_eq!(second.tether, Some(Tie::Slide(SlideDirection::Up)));
        assert_eq!(second.sample_start, 0.85);
        assert_eq!(second.pitch_ramps[0].from_cents, -400.0);
        assert_eq!(second.pitch_ramps[0].ramp_seconds, 0.125);
    }

    #[test]
    fn test_slide_in_and_out_clamp() {
        let compilation = tab(vec![
            column(["/1", "\\21", "", "", "", ""]),
            column(["2/", "", "", "", "", ""]),
            column(["", "", "", "", "", ""]),
        ]);
        let engine = standard();
        let slide_in = voices(&engine, &compilation, 0);
        assert_eq!(slide_in[0].pitch_ramps[0].from_cents, -100.0);
        assert_eq!(slide_in[1].pitch_ramps[0].from_cents, 100.0);
        assert_eq!(slide_in[1].tether, None);

        let slide_out = &voices(&engine, &compilation, 1)[0];
        assert_eq!(
            slide_out.pitch_ramps,
            vec![PitchRamp {
                from_cents: 0.0,
                to_cents: 300.0,
                delay_seconds: 0.375,
                ramp_seconds: 0.125,
            }]
        );
    }

    #[test]
    fn test_bend_direction_by_string() {
        let compilation = tab(vec![column(["5b", "5b", "5b", "", "7b9", ""])]);
        let voices = voices(&standard(), &compilation, 0);
        let bends: Vec<_> = voices.iter().map(|v| v.pitch_ramps[0].to_cents).collect();
        assert_eq!(bends, vec![-100.0, -100.0, 100.0, 200.0]);
        assert!(voices.iter().all(|v| v.pitch_ramps[0].ramp_seconds == 0.25));
    }

    #[test]
    fn test_vibrato_rate_band() {
        let engine = standard();
        let rate = |bpm: u32| {
            let columns = vec![column(["5~", "", "", "", "", ""])];
            let compilation = compile(&[section("a", vec![tab_sub_section(columns, Some(bpm), None)])], 100);
            voices(&engine, &compilation, 0)[0].vibrato.unwrap()
        };
        assert_eq!(rate(100).rate_hz, 4.0);
        assert_eq!(rate(100).depth_cents, 25.0);
        assert_eq!(rate(60).rate_hz, 5.0);
        assert_eq!(rate(200).rate_hz, 3.0);
    }

    #[test]
    fn test_accent_and_staccato() {
        let compilation = tab(vec![column(["5>", "5.", "", "", "", ""])]);
        let voices = voices(&standard(), &compilation, 0);
        assert_eq!(voices[0].gain, 1.75);
        assert_eq!(voices[0].duration, None);
        assert!((voices[1].gain - 1.1).abs() < 1e-12);
        assert_eq!(voices[1].duration, Some(0.25));
    }

    #[test]
    fn test_palm_mute_and_dead_notes() {
        let mut columns = vec![
            column(["5", "", "", "", "", ""]),
            note_column(["5", "", "", "", "", ""], "v>", NoteLength::Quarter),
            column(["x", "", "", "", "", ""]),
        ];
        for entry in &mut columns[..2] {
            if let Column::Note(note) = entry {
                note.palm_mute = PalmMute::Start;
            }
        }
        let compilation = tab(columns);
        let engine = standard();
        let muted = &voices(&engine, &compilation, 0)[0];
        assert_eq!(muted.gain, 0.45);
        assert_eq!(muted.filters, PALM_MUTE_FILTERS.to_vec());
        let accented = &voices(&engine, &compilation, 1)[0];
        assert!((accented.gain - 0.55 * 1.75).abs() < 1e-12);
        let dead = &voices(&engine, &compilation, 2)[0];
        assert_eq!(dead.duration, Some(0.06));
        assert_eq!(dead.gain, 0.2);
        assert_eq!(dead.key, 40);
        assert!(dead.is_filtered());
    }
}
