//! Zoom and pan state for the page reader
//!
//! Zoom is a user factor applied on top of the fit-to-width scale. Pan is
//! the offset of the viewport inside a rendered page that exceeds it.

/// Zoom factor, always within `[MIN_FACTOR, MAX_FACTOR]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoom {
    factor: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl Zoom {
    pub const MIN_FACTOR: f32 = 0.5;
    pub const MAX_FACTOR: f32 = 3.0;
    /// Step for the zoom keys
    pub const BUTTON_STEP: f32 = 0.25;
    /// Step for one wheel notch
    pub const WHEEL_STEP: f32 = 0.1;

    pub fn new(factor: f32) -> Self {
        Self {
            factor: Self::clamp_factor(factor),
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn percent(&self) -> u32 {
        (self.factor * 100.0).round() as u32
    }

    /// Whether the page can be larger than the viewport, enabling drag-pan
    pub fn is_magnified(&self) -> bool {
        self.factor > 1.0
    }

    pub fn step_in(&self) -> Self {
        Self::new(self.factor + Self::BUTTON_STEP)
    }

    pub fn step_out(&self) -> Self {
        Self::new(self.factor - Self::BUTTON_STEP)
    }

    pub fn wheel(&self, up: bool) -> Self {
        if up {
            Self::new(self.factor + Self::WHEEL_STEP)
        } else {
            Self::new(self.factor - Self::WHEEL_STEP)
        }
    }

    /// Clamp factor to valid range, handling NaN/Inf. Rounded to hundredths
    /// so repeated wheel steps do not drift.
    pub fn clamp_factor(factor: f32) -> f32 {
        if !factor.is_finite() {
            return 1.0;
        }
        let rounded = (factor * 100.0).round() / 100.0;
        rounded.clamp(Self::MIN_FACTOR, Self::MAX_FACTOR)
    }
}

/// Viewport offset inside the rendered page, in surface pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pan {
    pub x: u32,
    pub y: u32,
}

impl Pan {
    /// Move by a signed delta, keeping the viewport inside the page
    pub fn shifted(self, dx: i32, dy: i32, limit: (u32, u32)) -> Self {
        Self {
            x: shift(self.x, dx, limit.0),
            y: shift(self.y, dy, limit.1),
        }
    }

    pub fn clamped(self, limit: (u32, u32)) -> Self {
        Self {
            x: self.x.min(limit.0),
            y: self.y.min(limit.1),
        }
    }
}

fn shift(value: u32, delta: i32, max: u32) -> u32 {
    let moved = if delta < 0 {
        value.saturating_sub(delta.unsigned_abs())
    } else {
        value.saturating_add(delta as u32)
    };
    moved.min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_bounds() {
        assert_eq!(Zoom::new(5.0).factor(), 3.0);
        assert_eq!(Zoom::new(0.1).factor(), 0.5);
        assert_eq!(Zoom::new(f32::NAN).factor(), 1.0);
    }

    #[test]
    fn button_steps_stop_at_limits() {
        let mut zoom = Zoom::default();
        for _ in 0..20 {
            zoom = zoom.step_in();
        }
        assert_eq!(zoom.factor(), Zoom::MAX_FACTOR);
        for _ in 0..20 {
            zoom = zoom.step_out();
        }
        assert_eq!(zoom.factor(), Zoom::MIN_FACTOR);
    }

    #[test]
    fn wheel_steps_do_not_drift() {
        let mut zoom = Zoom::default();
        for _ in 0..5 {
            zoom = zoom.wheel(true);
        }
        assert_eq!(zoom.percent(), 150);
        for _ in 0..5 {
            zoom = zoom.wheel(false);
        }
        assert_eq!(zoom.factor(), 1.0);
    }

    #[test]
    fn pan_stays_inside_limits() {
        let pan = Pan::default().shifted(-10, 30, (100, 20));
        assert_eq!(pan, Pan { x: 0, y: 20 });
        let pan = pan.shifted(150, -5, (100, 20));
        assert_eq!(pan, Pan { x: 100, y: 15 });
        assert_eq!(pan.clamped((40, 10)), Pan { x: 40, y: 10 });
    }
}
