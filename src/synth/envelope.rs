//! Attack / hold / release envelope for scheduled tones.

/// Level the release ramp lands on before the hard cut.
pub const RELEASE_FLOOR: f64 = 0.0001;

/// Linear attack to 1.0, hold, then linear release ending at the note's end.
///
/// Unlike a sustain-level ADSR the release happens *inside* the note's
/// duration: the tone is already near silent when its nominal end arrives,
/// and anything after the end is hard zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEnvelope {
    /// Seconds from 0 to peak.
    pub attack: f64,
    /// Seconds from peak down to [`RELEASE_FLOOR`].
    pub release: f64,
}

impl ToneEnvelope {
    pub const fn new(attack: f64, release: f64) -> Self {
        Self { attack, release }
    }

    /// When the release ramp begins for a note of `duration` seconds.
    ///
    /// Never before the attack has finished; short notes get a shortened
    /// release instead.
    pub fn release_start(&self, duration: f64) -> f64 {
        let attack_end = self.attack.min(duration);
        (duration - self.release).max(attack_end)
    }

    /// Normalized amplitude (0.0–1.0) `t` seconds into a note of `duration`.
    pub fn amplitude(&self, t: f64, duration: f64) -> f64 {
        if t < 0.0 || t >= duration {
            return 0.0;
        }

        if t < self.attack {
            return t / self.attack;
        }

        let release_start = self.release_start(duration);
        if t < release_start {
            return 1.0;
        }

        let release_len = duration - release_start;
        if release_len <= 0.0 {
            return 0.0;
        }
        let progress = (t - release_start) / release_len;
        1.0 - progress * (1.0 - RELEASE_FLOOR)
    }
}

impl Default for ToneEnvelope {
    /// 10 ms attack, 60 ms release.
    fn default() -> Self {
        Self::new(0.010, 0.060)
    }
}
