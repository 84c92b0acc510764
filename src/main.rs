use crate::AppError::ConfigError;
use clap::Parser;
use config::Config;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tabplay::{
    AudioOutput, CompileSettings, Compilation, ExpandedEvent, ExpanderSettings, LoopWindow,
    PlayRequest, PlaybackEvent, PlaybackExpander, Scheduler, Song, SubtreeSelector, SynthBackend,
    TabCompiler, TabError as LibTabError,
};

mod config;

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{err}");
            1
        }
    });
}

pub fn main_result() -> Result<(), AppError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("tabplay=info"))
        .init();

    // args
    let args = CliArgs::parse();
    let song_path = PathBuf::from(&args.song);
    if !song_path.exists() {
        let err = ConfigError(format!("Song file not found {song_path:?}"));
        return Err(err);
    }
    let selector = args.selector()?;

    // read local config
    let mut local_config = Config::read_config()?;
    let speed = args.speed.unwrap_or_else(|| local_config.get_speed());
    let loop_delay_seconds = args
        .loop_delay
        .unwrap_or_else(|| local_config.get_loop_delay_seconds());
    let loop_window = LoopWindow::new(args.loop_start, args.loop_end);

    let song = Song::from_file(&song_path)?;
    log::info!("Loaded {:?} by {:?}", song.title, song.artist);

    if args.timeline {
        let settings = ExpanderSettings {
            loop_window,
            editing_loop_range: false,
            loop_delay_seconds,
            visible_width: args.visible_width,
        };
        print_timeline(&song, selector, speed, settings);
        return Ok(());
    }

    // check if sound font file exists, remember it for the next runs
    let sound_font_file = match args.sound_font.map(PathBuf::from) {
        Some(sound_font_file) => {
            if !sound_font_file.exists() {
                let err = ConfigError(format!("Sound font file not found {sound_font_file:?}"));
                return Err(err);
            }
            local_config.set_sound_font_file(Some(sound_font_file.clone()))?;
            sound_font_file
        }
        None => local_config.get_sound_font_file().ok_or_else(|| {
            ConfigError("No sound font file configured, use --sound-font".to_string())
        })?,
    };
    log::info!("Starting with sound font file {sound_font_file:?}");

    let settings = PlaySettings {
        sound_font_file,
        selector,
        speed,
        looping: args.looping,
        loop_window,
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    // go!
    runtime.block_on(play(&song, settings))
}

struct PlaySettings {
    sound_font_file: PathBuf,
    selector: Option<SubtreeSelector>,
    speed: f64,
    looping: bool,
    loop_window: LoopWindow,
}

async fn play(song: &Song, settings: PlaySettings) -> Result<(), AppError> {
    let backend = Arc::new(SynthBackend::new(&settings.sound_font_file)?);
    let output = AudioOutput::start(backend.clone())?;

    let mut scheduler = Scheduler::new(backend);
    scheduler.set_speed(settings.speed);
    scheduler.set_looping(settings.looping);
    scheduler.set_loop_window(settings.loop_window);
    scheduler.set_selection(settings.selector);

    scheduler.play(PlayRequest::for_song(song)).await;
    if !scheduler.status().playing {
        log::warn!("Nothing to play");
    }
    scheduler.wait_until_stopped().await;
    output.pause()?;
    Ok(())
}

/// Print the compiled events and a summary of the rendered timeline.
fn print_timeline(
    song: &Song,
    selector: Option<SubtreeSelector>,
    speed: f64,
    expander_settings: ExpanderSettings,
) {
    let compile_settings = CompileSettings::new(song.baseline_bpm(), speed);
    let compiler = TabCompiler::new(compile_settings, &song.chords);
    let compilation = match selector {
        Some(selector) => compiler.compile_subtree(&song.sections, selector),
        None => compiler.compile_full(&song.sections, &song.section_progression),
    };
    print_compilation(&compilation);

    let expansion = PlaybackExpander::new(expander_settings).expand(&compilation);
    let spacers = expansion
        .events
        .iter()
        .filter(|e| matches!(e, ExpandedEvent::Spacer | ExpandedEvent::DelaySpacer))
        .count();
    println!(
        "expanded to {} events ({spacers} spacers), width {:.0}, {:.3}s",
        expansion.len(),
        expansion.total_width,
        expansion
            .metadata
            .last()
            .map_or(0.0, |m| m.metadata.elapsed_seconds)
    );
}

fn print_compilation(compilation: &Compilation) {
    for (index, (event, metadata)) in compilation
        .events
        .iter()
        .zip(&compilation.metadata)
        .enumerate()
    {
        let location = metadata.location;
        let description = match event {
            PlaybackEvent::Note(note) => {
                let strings: Vec<String> = note.strings.iter().map(ToString::to_string).collect();
                format!(
                    "{:?} [{}] {} {}",
                    note.notation,
                    strings.join("|"),
                    note.stroke,
                    note.chord_name.as_deref().unwrap_or_default()
                )
            }
            PlaybackEvent::MeasureLine { .. } => "measure line".to_string(),
            PlaybackEvent::Terminal => "end".to_string(),
        };
        println!(
            "{index:>4} {:>8.3}s {:>3} bpm  s{}.{} sub{}.{} col{}  {description}",
            metadata.elapsed_seconds,
            metadata.bpm,
            location.section_index,
            location.section_repeat_index,
            location.sub_section_index,
            location.sub_section_repeat_index,
            location.column_index,
        );
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the song JSON file.
    #[arg(long)]
    song: String,
    /// Optional path to a sound font file, remembered for the next runs.
    #[arg(long)]
    sound_font: Option<String>,
    /// Only play the section at this index.
    #[arg(long)]
    section: Option<usize>,
    /// Only play the sub-section at this index, requires --section.
    #[arg(long)]
    sub_section: Option<usize>,
    /// Only play the chord sequence at this index, requires --sub-section.
    #[arg(long)]
    chord_sequence: Option<usize>,
    /// Playback speed multiplier.
    #[arg(long)]
    speed: Option<f64>,
    /// Restart from the beginning at the end of the track.
    #[arg(long = "loop", default_value_t = false)]
    looping: bool,
    /// First event of the loop window.
    #[arg(long, default_value_t = 0)]
    loop_start: usize,
    /// Event after the last one of the loop window, to the end if absent.
    #[arg(long)]
    loop_end: Option<usize>,
    /// Silence before the loop restarts, in seconds.
    #[arg(long)]
    loop_delay: Option<f64>,
    /// Width of the rendering area used by --timeline.
    #[arg(long, default_value_t = 0.0)]
    visible_width: f64,
    /// Print the compiled timeline instead of playing.
    #[arg(long, default_value_t = false)]
    timeline: bool,
}

impl CliArgs {
    fn selector(&self) -> Result<Option<SubtreeSelector>, AppError> {
        match (self.section, self.sub_section, self.chord_sequence) {
            (None, None, None) => Ok(None),
            (Some(section), None, None) => Ok(Some(SubtreeSelector::section(section))),
            (Some(section), Some(sub_section), None) => {
                Ok(Some(SubtreeSelector::sub_section(section, sub_section)))
            }
            (Some(section), Some(sub_section), Some(sequence)) => Ok(Some(
                SubtreeSelector::chord_sequence(section, sub_section, sequence),
            )),
            _ => Err(ConfigError(
                "--sub-section requires --section and --chord-sequence requires --sub-section"
                    .to_string(),
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("parsing error: {0}")]
    ParsingError(String),
    #[error("audio error: {0}")]
    AudioError(String),
    #[error("other error: {0}")]
    OtherError(String),
}

impl From<LibTabError> for AppError {
    fn from(error: LibTabError) -> Self {
        match error {
            LibTabError::ParsingError(s) => Self::ParsingError(s),
            LibTabError::ConfigError(s) => Self::ConfigError(s),
            LibTabError::AudioError(s) => Self::AudioError(s),
            LibTabError::IoError(s) => Self::OtherError(s),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        Self::OtherError(error.to_string())
    }
}
