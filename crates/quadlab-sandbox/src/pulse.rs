/// Color channel value oscillating in `[0, 1]`.
///
/// Each step adds a fixed angle and takes `|sin(angle)|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    angle: f32,
    step: f32,
    value: f32,
}

impl Pulse {
    /// Value shown on the first frame, before any step.
    pub const INITIAL: f32 = 0.05;

    pub fn new(step: f32) -> Self {
        Self {
            angle: 0.0,
            step,
            value: Self::INITIAL,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Advances one step and returns the new value.
    pub fn advance(&mut self) -> f32 {
        self.angle += self.step;
        self.value = self.angle.sin().abs();
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn starts_at_initial_value() {
        let pulse = Pulse::new(0.01);
        assert_eq!(pulse.value(), Pulse::INITIAL);
        assert_eq!(pulse.angle(), 0.0);
    }

    #[test]
    fn stays_within_unit_range() {
        let mut pulse = Pulse::new(0.01);
        for _ in 0..10_000 {
            let v = pulse.advance();
            assert!((0.0..=1.0).contains(&v), "{v} at angle {}", pulse.angle());
        }
    }

    #[test]
    fn returns_to_zero_near_multiples_of_pi() {
        let mut pulse = Pulse::new(0.01);
        for k in 1..=3 {
            let target = k as f32 * PI;
            while pulse.angle() + 0.005 < target {
                pulse.advance();
            }
            assert!(pulse.value() < 0.01, "value {} near {k}π", pulse.value());
            pulse.advance();
        }
    }

    #[test]
    fn peaks_near_half_pi() {
        let mut pulse = Pulse::new(0.01);
        while pulse.angle() + 0.005 < PI / 2.0 {
            pulse.advance();
        }
        assert!(pulse.value() > 0.999);
    }
}
