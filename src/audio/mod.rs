pub mod backend;
pub mod effects;
pub mod playback_state;
pub mod scheduler;
pub mod synth_backend;
pub mod voice_timeline;
