use super::common::{Endpoint, Side};
use super::{InterpolationMode, Interpolator};

/// Step function: a synthesized point takes the value of the side it
/// belongs to.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroInterpolation;

impl Interpolator for ZeroInterpolation {
    fn mode(&self) -> InterpolationMode {
        InterpolationMode::Zero
    }

    fn interpolate(&self, last: &Endpoint, next: &Endpoint, _position: f64, side: Side) -> f64 {
        match side {
            Side::Last => last.value,
            Side::Next => next.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_flat() {
        let last = Endpoint { index: 0, position: 0.0, value: 10.0 };
        let next = Endpoint { index: 4, position: 4.0, value: 30.0 };
        assert_eq!(ZeroInterpolation.interpolate(&last, &next, 1.0, Side::Last), 10.0);
        assert_eq!(ZeroInterpolation.interpolate(&last, &next, 3.0, Side::Next), 30.0);
    }
}
