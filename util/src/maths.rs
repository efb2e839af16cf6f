//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Linearly interpolate between two points `(x0, y0)` and `(x1, y1)` at `x`.
///
/// The points must not share an x coordinate.
pub fn lerp<T>(p0: (T, T), p1: (T, T), x: T) -> T
where
    T: Float,
{
    p0.1 + (p1.1 - p0.1) * (x - p0.0) / (p1.0 - p0.0)
}

/// Arithmetic mean of the values, or `None` if there are none.
pub fn mean<T, I>(values: I) -> Option<T>
where
    T: Float,
    I: IntoIterator<Item = T>,
{
    let mut sum = T::zero();
    let mut count = 0usize;

    for v in values {
        sum = sum + v;
        count += 1;
    }

    match count {
        0 => None,
        n => T::from(n).map(|n| sum / n),
    }
}
