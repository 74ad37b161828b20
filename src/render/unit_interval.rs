use num_traits::{Num, NumCast, ToPrimitive};

/// A value squeezed into `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitInterval {
    value: f64,
}

impl UnitInterval {
    /// Position of `value` within `min..=max`, clamped to the ends.
    ///
    /// An empty or inverted range maps everything to zero.
    pub fn new_in_range<V, M>(value: V, min: M, max: M) -> Self
    where
        V: ToPrimitive,
        M: ToPrimitive,
    {
        let value = value.to_f64().unwrap_or(0.0);
        let min = min.to_f64().unwrap_or(0.0);
        let max = max.to_f64().unwrap_or(0.0);

        if !(max > min) || value.is_nan() {
            return UnitInterval { value: 0.0 };
        }

        let v = ((value - min) / (max - min)).clamp(0.0, 1.0);
        UnitInterval { value: v }
    }

    pub fn new_linear<V, M>(value: V, max_value: M) -> Self
    where
        V: ToPrimitive,
        M: ToPrimitive + Num,
    {
        UnitInterval::new_in_range(value, M::zero(), max_value)
    }

    pub fn get(&self) -> f64 {
        self.value
    }

    /// Scales `max_value` by this fraction, rounding down.
    pub fn scale<M, R>(&self, max_value: M) -> R
    where
        M: ToPrimitive,
        R: Num + NumCast,
    {
        let scaled = (self.value * max_value.to_f64().unwrap_or(0.0)).floor();
        R::from(scaled).unwrap_or_else(R::zero)
    }
}

pub trait NumUnitIntervalExt {
    fn to_unit<M>(&self, max_value: M) -> UnitInterval
    where
        M: ToPrimitive + Num;
    fn to_unit_in<M>(&self, min: M, max: M) -> UnitInterval
    where
        M: ToPrimitive;
}

impl<T> NumUnitIntervalExt for T
where
    T: ToPrimitive + Clone,
{
    fn to_unit<M>(&self, max_value: M) -> UnitInterval
    where
        M: ToPrimitive + Num,
    {
        UnitInterval::new_linear(self.clone(), max_value)
    }

    fn to_unit_in<M>(&self, min: M, max: M) -> UnitInterval
    where
        M: ToPrimitive,
    {
        UnitInterval::new_in_range(self.clone(), min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range() {
        assert_eq!(2.5f64.to_unit_in(0.0, 5.0).get(), 0.5);
        assert_eq!(7.0f64.to_unit_in(0.0, 5.0).get(), 1.0);
        assert_eq!((-1.0f64).to_unit_in(0.0, 5.0).get(), 0.0);
        assert_eq!(15u8.to_unit(100u8).get(), 0.15);
    }

    #[test]
    fn test_degenerate_range() {
        assert_eq!(3.0f64.to_unit_in(5.0, 5.0).get(), 0.0);
        assert_eq!(f64::NAN.to_unit_in(0.0, 1.0).get(), 0.0);
    }

    #[test]
    fn test_scale() {
        let half = 2.5f64.to_unit_in(0.0, 5.0);
        let width: u32 = half.scale(140u32);
        assert_eq!(width, 70);
        let level: u8 = 1.0f64.to_unit(1.0f64).scale(255u8);
        assert_eq!(level, 255);
    }
}
