//! Tempo and repetition fallbacks shared by every compilation pass.

/// Picks the most specific tempo: chord sequence, then sub-section, then baseline.
/// Zero is treated as unset.
pub fn resolve_bpm(chord_bpm: Option<u32>, baseline_bpm: u32, sub_section_bpm: Option<u32>) -> u32 {
    chord_bpm
        .filter(|bpm| *bpm > 0)
        .or_else(|| sub_section_bpm.filter(|bpm| *bpm > 0))
        .unwrap_or(baseline_bpm)
}

pub fn resolve_repetitions(repetitions: Option<u32>) -> u32 {
    match repetitions {
        None | Some(0) => 1,
        Some(n) => n,
    }
}

/// Tempo at which one event of `beats` quarter notes elapses per minute.
pub fn effective_bpm(bpm: u32, beats: f64, speed: f64) -> f64 {
    f64::from(bpm) * (1.0 / beats) * speed
}

/// Seconds taken by an event of `beats` quarter notes.
pub fn event_seconds(bpm: u32, beats: f64, speed: f64) -> f64 {
    60.0 / effective_bpm(bpm, beats, speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bpm_cascade() {
        assert_eq!(resolve_bpm(None, 120, None), 120);
        assert_eq!(resolve_bpm(None, 120, Some(90)), 90);
        assert_eq!(resolve_bpm(Some(150), 120, Some(90)), 150);
        assert_eq!(resolve_bpm(Some(150), 120, None), 150);
        // zero never wins
        assert_eq!(resolve_bpm(Some(0), 120, Some(0)), 120);
        assert_eq!(resolve_bpm(Some(0), 120, Some(80)), 80);
    }

    #[test]
    fn test_resolve_repetitions() {
        assert_eq!(resolve_repetitions(None), 1);
        assert_eq!(resolve_repetitions(Some(0)), 1);
        assert_eq!(resolve_repetitions(Some(5)), 5);
    }

    #[test]
    fn test_event_seconds() {
        assert_eq!(event_seconds(120, 1.0, 1.0), 0.5);
        assert_eq!(event_seconds(160, 0.5, 1.0), 0.1875);
        assert_eq!(event_seconds(120, 1.0, 0.5), 1.0);
        assert_eq!(effective_bpm(100, 0.25, 1.0), 400.0);
    }
}
