/// Volume used when nothing else is configured.
pub const DEFAULT_VOLUME: f64 = 70.0;

/// Playback volume in percent, always within `0.0..=100.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Volume(f64);

impl Volume {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 100.0;

    /// Clamp `percent` into range. NaN becomes 0.
    pub fn new(percent: f64) -> Self {
        if percent.is_nan() {
            return Self(Self::MIN);
        }
        Self(percent.clamp(Self::MIN, Self::MAX))
    }

    pub fn percent(self) -> f64 {
        self.0
    }

    /// Linear gain for the output sink.
    pub fn linear(self) -> f32 {
        (self.0 / Self::MAX) as f32
    }

    pub fn step(self, delta: f64) -> Self {
        Self::new(self.0 + delta)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(DEFAULT_VOLUME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_and_nan() {
        assert_eq!(Volume::new(150.0).percent(), 100.0);
        assert_eq!(Volume::new(-3.0).percent(), 0.0);
        assert_eq!(Volume::new(f64::NAN).percent(), 0.0);
        assert_eq!(Volume::new(95.0).step(10.0).percent(), 100.0);
    }

    #[test]
    fn linear_gain_tracks_percent() {
        assert_eq!(Volume::new(50.0).linear(), 0.5);
        assert_eq!(Volume::new(0.0).linear(), 0.0);
        assert_eq!(Volume::new(100.0).linear(), 1.0);
    }
}
