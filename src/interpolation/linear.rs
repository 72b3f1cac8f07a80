use super::common::{Endpoint, Side};
use super::{InterpolationMode, Interpolator};

/// Straight line between the two known cells. Discrete axes use category
/// indexes as positions, continuous axes the category values.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearInterpolation;

impl Interpolator for LinearInterpolation {
    fn mode(&self) -> InterpolationMode {
        InterpolationMode::Linear
    }

    fn interpolate(&self, last: &Endpoint, next: &Endpoint, position: f64, _side: Side) -> f64 {
        let span = next.position - last.position;
        if span == 0.0 {
            return last.value;
        }
        let slope = (next.value - last.value) / span;
        last.value + slope * (position - last.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_steps() {
        let last = Endpoint { index: 0, position: 0.0, value: 10.0 };
        let next = Endpoint { index: 4, position: 4.0, value: 30.0 };
        let values: Vec<f64> = (1..4)
            .map(|i| LinearInterpolation.interpolate(&last, &next, i as f64, Side::Last))
            .collect();
        assert_eq!(values, [15.0, 20.0, 25.0]);
    }

    #[test]
    fn test_linear_uses_category_values() {
        let last = Endpoint { index: 0, position: 100.0, value: 0.0 };
        let next = Endpoint { index: 2, position: 200.0, value: 10.0 };
        assert_eq!(LinearInterpolation.interpolate(&last, &next, 175.0, Side::Next), 7.5);
    }
}
