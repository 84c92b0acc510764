use crate::audio::backend::{AudioBackend, Slap, Voice};
use crate::audio::voice_timeline::{MidiMessage, VoiceTimeline};
use crate::score::song::STRING_COUNT;
use crate::TabError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::f64::consts::TAU;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const SAMPLE_RATE: u32 = 44100; // number of samples per second

const CLEAN_GUITAR_PROGRAM: i32 = 25;
const MUTED_GUITAR_PROGRAM: i32 = 28;
const PERCUSSION_CHANNEL: i32 = 9;
const SIDE_STICK_KEY: i32 = 37;
const BASS_DRUM_KEY: i32 = 35;

const BASE_VELOCITY: f64 = 96.0;
/// Tethered voices skip the attack, approximated by a softer velocity
const TETHER_VELOCITY: f64 = 0.6;
const PITCH_BEND_CENTER: f64 = 8192.0;
/// Pitch bend range set on every string channel, in semitones
const PITCH_BEND_RANGE: i32 = 12;

/// Pitch automation resolution
const AUTOMATION_STEP_SECONDS: f64 = 0.01;
/// Longest automation scheduled for a voice that rings until stopped
const MAX_AUTOMATION_SECONDS: f64 = 4.0;

/// Frames rendered between two timeline checks
const RENDER_CHUNK_FRAMES: usize = 64;

struct SynthState {
    synthesizer: Synthesizer,
    timeline: VoiceTimeline,
}

/// [`AudioBackend`] rendering voices through a SoundFont synthesizer.
///
/// Voices become timed MIDI messages, one channel per string. Nothing is
/// heard until an [`AudioOutput`] pulls frames through [`SynthBackend::render`].
pub struct SynthBackend {
    state: Mutex<SynthState>,
    running: AtomicBool, // render silence while suspended
    ready: AtomicBool,   // set once an output stream pulls frames
}

impl SynthBackend {
    pub fn new(sound_font_file: &Path) -> Result<Self, TabError> {
        let mut sf2 = File::open(sound_font_file).map_err(|err| {
            TabError::AudioError(format!("cannot open sound font {sound_font_file:?}: {err}"))
        })?;
        let sound_font = SoundFont::new(&mut sf2)
            .map_err(|err| TabError::AudioError(format!("invalid sound font: {err}")))?;
        let settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
        let mut synthesizer = Synthesizer::new(&Arc::new(sound_font), &settings)
            .map_err(|err| TabError::AudioError(format!("cannot create synthesizer: {err}")))?;

        for channel in 0..STRING_COUNT as i32 {
            for message in channel_setup(channel) {
                apply(&mut synthesizer, message);
            }
        }
        log::info!("synthesizer ready with {STRING_COUNT} string channels");
        Ok(Self {
            state: Mutex::new(SynthState {
                synthesizer,
                timeline: VoiceTimeline::new(),
            }),
            running: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SynthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Fill both channels, applying due messages every few frames.
    pub fn render(&self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        if !self.running.load(Ordering::SeqCst) {
            left[..frames].fill(0.0);
            right[..frames].fill(0.0);
            return;
        }
        let mut guard = self.lock();
        let SynthState {
            synthesizer,
            timeline,
        } = &mut *guard;
        let mut offset = 0;
        while offset < frames {
            let chunk = RENDER_CHUNK_FRAMES.min(frames - offset);
            timeline.for_each_due(chunk as u64, |message| apply(synthesizer, message));
            synthesizer.render(
                &mut left[offset..offset + chunk],
                &mut right[offset..offset + chunk],
            );
            timeline.advance(chunk as u64);
            offset += chunk;
        }
    }
}

impl AudioBackend for SynthBackend {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn resume(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    fn suspend(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn start_voice(&self, voice: &Voice) {
        let messages = voice_messages(voice);
        let mut state = self.lock();
        for (offset_seconds, message) in messages {
            state.timeline.push(to_frames(offset_seconds), message);
        }
    }

    fn start_slap(&self, slap: &Slap) {
        let start = to_frames(slap.start_offset);
        let end = to_frames(slap.start_offset + slap.duration);
        let velocity = velocity(slap.gain);
        let mut state = self.lock();
        for (key, velocity) in [(SIDE_STICK_KEY, velocity), (BASS_DRUM_KEY, velocity * 2 / 3)] {
            state.timeline.push(
                start,
                MidiMessage::NoteOn {
                    channel: PERCUSSION_CHANNEL,
                    key,
                    velocity,
                },
            );
            state.timeline.push(
                end,
                MidiMessage::NoteOff {
                    channel: PERCUSSION_CHANNEL,
                    key,
                },
            );
        }
    }

    fn stop_string(&self, string_index: usize, delay_seconds: f64) {
        let channel = string_index as i32;
        let at = to_frames(delay_seconds);
        let mut state = self.lock();
        state.timeline.cancel_channel_from(channel, at);
        state.timeline.push(at, MidiMessage::all_notes_off(channel));
    }

    fn stop_all(&self) {
        let mut state = self.lock();
        state.timeline.clear();
        state.synthesizer.note_off_all(false);
    }
}

fn apply(synthesizer: &mut Synthesizer, message: MidiMessage) {
    match message {
        MidiMessage::NoteOn {
            channel,
            key,
            velocity,
        } => synthesizer.note_on(channel, key, velocity),
        MidiMessage::NoteOff { channel, key } => synthesizer.note_off(channel, key),
        MidiMessage::Raw(channel, command, data1, data2) => {
            synthesizer.process_midi_message(channel, command, data1, data2);
        }
    }
}

/// Program and pitch bend range for a string channel.
fn channel_setup(channel: i32) -> [MidiMessage; 7] {
    [
        MidiMessage::program_change(channel, CLEAN_GUITAR_PROGRAM),
        // RPN 0 selects the pitch bend range
        MidiMessage::control_change(channel, 0x65, 0),
        MidiMessage::control_change(channel, 0x64, 0),
        MidiMessage::control_change(channel, 0x06, PITCH_BEND_RANGE),
        MidiMessage::control_change(channel, 0x26, 0),
        MidiMessage::control_change(channel, 0x65, 0x7F),
        MidiMessage::control_change(channel, 0x64, 0x7F),
    ]
}

fn to_frames(seconds: f64) -> u64 {
    (seconds.max(0.0) * f64::from(SAMPLE_RATE)).round() as u64
}

fn velocity(gain: f64) -> i32 {
    (BASE_VELOCITY * gain).round().clamp(1.0, 127.0) as i32
}

fn bend_value(cents: f64) -> i32 {
    let range_cents = f64::from(PITCH_BEND_RANGE) * 100.0;
    let value = PITCH_BEND_CENTER + cents / range_cents * PITCH_BEND_CENTER;
    value.round().clamp(0.0, 16383.0) as i32
}

/// Messages realizing a voice, with their offset from dispatch in seconds.
fn voice_messages(voice: &Voice) -> Vec<(f64, MidiMessage)> {
    let channel = voice.string_index as i32;
    let key = i32::from(voice.key);
    let start = voice.start_offset;
    let program = if voice.is_filtered() {
        MUTED_GUITAR_PROGRAM
    } else {
        CLEAN_GUITAR_PROGRAM
    };
    let gain = if voice.tether.is_some() {
        voice.gain * TETHER_VELOCITY
    } else {
        voice.gain
    };
    let cents_at = |seconds: f64| {
        let vibrato = voice.vibrato.map_or(0.0, |v| {
            v.depth_cents * (TAU * v.rate_hz * seconds).sin()
        });
        voice.cents_at(seconds) + vibrato
    };

    let mut messages = vec![
        (start, MidiMessage::program_change(channel, program)),
        (start, MidiMessage::pitch_bend(channel, bend_value(cents_at(0.0)))),
        (
            start,
            MidiMessage::NoteOn {
                channel,
                key,
                velocity: velocity(gain),
            },
        ),
    ];

    let ramps_end = voice
        .pitch_ramps
        .iter()
        .map(|ramp| ramp.end_seconds())
        .fold(0.0, f64::max);
    let automation_end = if voice.vibrato.is_some() {
        voice.duration.unwrap_or(MAX_AUTOMATION_SECONDS)
    } else {
        ramps_end.min(voice.duration.unwrap_or(f64::MAX))
    };
    let steps = (automation_end / AUTOMATION_STEP_SECONDS).ceil() as usize;
    for step in 1..=steps {
        let seconds = (step as f64 * AUTOMATION_STEP_SECONDS).min(automation_end);
        let bend = MidiMessage::pitch_bend(channel, bend_value(cents_at(seconds)));
        messages.push((start + seconds, bend));
    }

    if let Some(duration) = voice.duration {
        messages.push((start + duration, MidiMessage::NoteOff { channel, key }));
    }
    messages
}

/// Output stream pulling frames from a [`SynthBackend`].
///
/// The stream is not `Send`, keep this on the thread that created it.
pub struct AudioOutput {
    stream: cpal::Stream,
}

impl AudioOutput {
    pub fn start(backend: Arc<SynthBackend>) -> Result<Self, TabError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| TabError::AudioError("no audio output device".to_string()))?;
        let config = device
            .default_output_config()
            .map_err(|err| TabError::AudioError(format!("no output configuration: {err}")))?;
        if !config.sample_format().is_float() {
            return Err(TabError::AudioError(format!(
                "unsupported sample format {}",
                config.sample_format()
            )));
        }
        let stream_config: cpal::StreamConfig = config.into();
        if stream_config.channels != 2 || stream_config.sample_rate.0 != SAMPLE_RATE {
            return Err(TabError::AudioError(format!(
                "unsupported output {} channels at {} Hz",
                stream_config.channels, stream_config.sample_rate.0
            )));
        }

        // 4410 samples at 44100 Hz is 0.1 second
        let mono_sample_count = 4410;
        // reuse buffer for left and right channels across all calls
        let mut left: Vec<f32> = vec![0_f32; mono_sample_count];
        let mut right: Vec<f32> = vec![0_f32; mono_sample_count];

        let err_fn = |err| log::error!("an error occurred on stream: {err}");
        let stream_backend = backend.clone();
        let stream = device
            .build_output_stream(
                &stream_config,
                move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // render in pieces when the device asks for more than the buffers hold
                    for frames in output.chunks_mut(mono_sample_count * 2) {
                        let channel_len = frames.len() / 2;
                        stream_backend.render(&mut left[..channel_len], &mut right[..channel_len]);
                        for (i, (l, r)) in left.iter().zip(right.iter()).take(channel_len).enumerate() {
                            frames[i * 2] = *l;
                            frames[i * 2 + 1] = *r;
                        }
                    }
                },
                err_fn,
                None, // blocking stream
            )
            .map_err(|err| TabError::AudioError(format!("cannot build output stream: {err}")))?;
        stream
            .play()
            .map_err(|err| TabError::AudioError(format!("cannot start output stream: {err}")))?;
        backend.mark_ready();
        log::info!("audio output started at {SAMPLE_RATE} Hz");
        Ok(Self { stream })
    }

    pub fn pause(&self) -> Result<(), TabError> {
        self.stream
            .pause()
            .map_err(|err| TabError::AudioError(format!("cannot pause output stream: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::{PitchRamp, Vibrato};
    use crate::score::song::Tie;

    #[test]
    fn test_bend_value() {
        assert_eq!(bend_value(0.0), 8192);
        assert_eq!(bend_value(1200.0), 16383);
        assert_eq!(bend_value(-1200.0), 0);
        assert_eq!(bend_value(100.0), 8875);
        assert_eq!(bend_value(-200.0), 6827);
    }

    #[test]
    fn test_velocity_clamped() {
        assert_eq!(velocity(1.0), 96);
        assert_eq!(velocity(1.75), 127);
        assert_eq!(velocity(0.0), 1);
    }

    #[test]
    fn test_plain_voice_messages() {
        let voice = Voice::new(1, 3, 48);
        let messages = voice_messages(&voice);
        assert_eq!(
            messages,
            vec![
                (0.0, MidiMessage::program_change(1, CLEAN_GUITAR_PROGRAM)),
                (0.0, MidiMessage::pitch_bend(1, 8192)),
                (
                    0.0,
                    MidiMessage::NoteOn {
                        channel: 1,
                        key: 48,
                        velocity: 96
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_shaped_voice_messages() {
        let mut voice = Voice::new(0, 7, 47);
        voice.start_offset = 0.5;
        voice.duration = Some(0.06);
        voice.tether = Some(Tie::HammerOn);
        voice.filters.push(crate::audio::backend::Filter::LowPass {
            frequency: 300.0,
            q: 1.0,
        });
        voice.pitch_ramps.push(PitchRamp {
            from_cents: -200.0,
            to_cents: 0.0,
            delay_seconds: 0.0,
            ramp_seconds: 0.04,
        });
        let messages = voice_messages(&voice);
        assert_eq!(messages[0], (0.5, MidiMessage::program_change(0, MUTED_GUITAR_PROGRAM)));
        assert_eq!(messages[1].1, MidiMessage::pitch_bend(0, bend_value(-200.0)));
        assert!(matches!(messages[2].1, MidiMessage::NoteOn { velocity: 58, .. }));
        // four automation steps then the release
        assert_eq!(messages.len(), 3 + 4 + 1);
        assert_eq!(messages[6].1, MidiMessage::pitch_bend(0, 8192));
        let (at, release) = messages[7];
        assert!((at - 0.56).abs() < 1e-9);
        assert_eq!(release, MidiMessage::NoteOff { channel: 0, key: 47 });
    }

    #[test]
    fn test_vibrato_automation_runs_for_duration() {
        let mut voice = Voice::new(3, 5, 60);
        voice.duration = Some(0.2);
        voice.vibrato = Some(Vibrato {
            rate_hz: 5.0,
            depth_cents: 25.0,
        });
        let messages = voice_messages(&voice);
        let bends = messages
            .iter()
            .filter(|(_, m)| matches!(m, MidiMessage::Raw(_, 0xE0, _, _)))
            .count();
        assert_eq!(bends, 1 + 20);
    }

    #[test]
    fn test_channel_setup_selects_bend_range() {
        let setup = channel_setup(4);
        assert_eq!(setup[3], MidiMessage::Raw(4, 0xB0, 0x06, 12));
        assert!(setup.iter().all(|m| m.channel() == 4));
    }
}
