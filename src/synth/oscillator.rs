//! Sine oscillator and pitch → frequency conversion.

use std::f64::consts::TAU;

/// Reference pitch (A4) in Hz.
pub const A4_FREQUENCY: f64 = 440.0;
/// MIDI note number of A4.
pub const A4_MIDI: u8 = 69;

/// Convert a MIDI note number to frequency in Hz (equal temperament, A4 = 440 Hz).
pub fn midi_to_freq(note: u8) -> f64 {
    A4_FREQUENCY * 2.0f64.powf((f64::from(note) - f64::from(A4_MIDI)) / 12.0)
}

/// Sine wave value of a `freq` Hz tone `t` seconds after it started.
///
/// Evaluated from absolute time rather than an accumulated phase so that two
/// renders of the same tone are bit-identical regardless of block size.
#[inline]
pub fn sine(freq: f64, t: f64) -> f64 {
    (TAU * freq * t).sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midi_69_is_440() {
        assert!((midi_to_freq(69) - 440.0).abs() < 1e-9);
    }

    #[test]
    fn midi_60_is_middle_c() {
        assert!((midi_to_freq(60) - 261.63).abs() < 0.01);
    }

    #[test]
    fn octave_doubles_frequency() {
        let ratio = midi_to_freq(72) / midi_to_freq(60);
        assert!((ratio - 2.0).abs() < 1e-10);
    }

    #[test]
    fn extremes_are_audible_range() {
        assert!(midi_to_freq(0) > 8.0 && midi_to_freq(0) < 9.0);
        assert!(midi_to_freq(127) > 12_000.0);
    }

    #[test]
    fn sine_starts_at_zero_and_peaks_at_quarter_period() {
        assert!(sine(1.0, 0.0).abs() < 1e-12);
        assert!((sine(1.0, 0.25) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sine_bounded() {
        for i in 0..2000 {
            let v = sine(440.0, i as f64 / 44100.0);
            assert!((-1.0..=1.0).contains(&v));
        }
    }
}
