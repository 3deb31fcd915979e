//! Uniform global 1-D coordinate axes (periodic longitude or clipped latitude).

use crate::error::Error;
use ndarray::Array1;

/// Describes a uniformly spaced global cell-center coordinate axis.
///
/// For longitude, `periodic` is `true` and the axis wraps every 360
/// degrees; for latitude, `periodic` is `false` and the axis spans 180
/// degrees. A `RegularCoord` may additionally describe a contiguous
/// subset of the global axis via `start`/`stop`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegularCoord {
    /// Total number of cells on the globe along this axis.
    n: usize,
    /// Coordinate of the left/lower edge of cell 0.
    origin: f64,
    /// `true` for longitude (wraps), `false` for latitude (clipped).
    periodic: bool,
    delta: f64,
    rdelta: f64,
    offset: i64,
    rem: f64,
    start: usize,
    stop: usize,
}

impl RegularCoord {
    /// Build a `RegularCoord` spanning the whole globe, with `delta`
    /// derived from `n` and `periodic` (360/n for longitude, 180/n for
    /// latitude).
    #[must_use]
    pub fn new(n: usize, origin: f64, periodic: bool) -> Self {
        let span = if periodic { 360.0 } else { 180.0 };
        Self::with_delta(n, origin, periodic, span / n as f64)
    }

    /// Build a `RegularCoord` with an explicit cell width, overriding the
    /// globally-derived default. Used internally by [`Self::subset`] to
    /// copy a coordinate's resolution onto a windowed instance.
    #[must_use]
    pub fn with_delta(n: usize, origin: f64, periodic: bool, delta: f64) -> Self {
        let rdelta = 1.0 / delta;
        let offset = (rdelta * origin).floor() as i64;
        let rem = (rdelta * origin).rem_euclid(1.0);
        RegularCoord {
            n,
            origin,
            periodic,
            delta,
            rdelta,
            offset,
            rem,
            start: 0,
            stop: n,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }
    pub fn origin(&self) -> f64 {
        self.origin
    }
    pub fn periodic(&self) -> bool {
        self.periodic
    }
    pub fn delta(&self) -> f64 {
        self.delta
    }
    pub fn start(&self) -> usize {
        self.start
    }
    pub fn stop(&self) -> usize {
        self.stop
    }

    /// Number of cells in the (possibly wrapped) subset `[start, stop)`.
    #[must_use]
    pub fn size(&self) -> usize {
        if self.start > self.stop {
            self.stop + self.n - self.start
        } else {
            self.stop - self.start
        }
    }

    /// Cell-center coordinates of the subset, length [`Self::size`].
    #[must_use]
    pub fn centers(&self) -> Array1<f64> {
        let size = self.size();
        Array1::from_shape_fn(size, |k| {
            let idx = if self.start > self.stop {
                (self.start + k) % self.n
            } else {
                self.start + k
            };
            self.origin + self.delta * idx as f64
        })
    }

    /// Cell-boundary coordinates of the subset, length [`Self::size`] + 1.
    #[must_use]
    pub fn bounds(&self) -> Array1<f64> {
        let size = self.size();
        Array1::from_shape_fn(size + 1, |k| {
            let idx = if self.start > self.stop {
                (self.start + k) % self.n
            } else {
                self.start + k
            };
            self.origin + self.delta * (idx as f64 - 0.5)
        })
    }

    /// Returns a new `RegularCoord` windowed to `[start, stop)` of the
    /// same global axis.
    #[must_use]
    pub fn subset(&self, start: usize, stop: usize) -> Self {
        let mut s = Self::with_delta(self.n, self.origin, self.periodic, self.delta);
        s.start = start;
        s.stop = stop;
        s
    }

    /// Maps coordinate values `x` to cell indices of this axis.
    ///
    /// Periodic axes wrap globally; non-periodic axes clip to `[0, n)`.
    /// When `bound_subset` is true the result is additionally clamped
    /// into the subset's own range rather than failing when out of
    /// range; otherwise an out-of-range index after subtracting `start`
    /// is reported as [`Error::OutOfRange`].
    pub fn indices(&self, x: &[f64], bound_subset: bool) -> Result<Vec<i64>, Error> {
        let mut out = Vec::with_capacity(x.len());
        for &v in x {
            let mut idx = (self.rdelta * v - self.rem).floor() as i64 - self.offset;
            if self.periodic {
                idx = idx.rem_euclid(self.n as i64);
            } else {
                idx = idx.clamp(0, self.n as i64 - 1);
            }
            let clamped = if bound_subset {
                idx.clamp(self.start as i64, self.stop as i64 - 1) - self.start as i64
            } else {
                idx - self.start as i64
            };
            if clamped < 0 || clamped >= (self.stop as i64 - self.start as i64) {
                return Err(Error::OutOfRange(format!(
                    "coordinate {v} maps to index {clamped}, outside subset [0, {})",
                    self.stop - self.start
                )));
            }
            out.push(clamped);
        }
        Ok(out)
    }
}

/// Returns `true` if the 1-D or 2-D node coordinate arrays describe a
/// uniform grid (constant spacing, within floating-point tolerance).
///
/// A convenience check for callers validating a source grid before
/// handing it to [`crate::mesh::Mesh`]; not required by any internal
/// control flow.
#[must_use]
pub fn is_uniform_1d(axis: &[f64]) -> bool {
    if axis.len() < 2 {
        return true;
    }
    let eps = f64::EPSILON;
    let first_delta = (axis[1] - axis[0]).abs();
    axis.windows(2).all(|w| {
        let delta = (w[1] - w[0]).abs();
        let error = w[0].abs().max(w[1].abs());
        (delta - first_delta).abs() < error + axis[0].abs() + eps
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn longitude_axis_basics() {
        let lon = RegularCoord::new(360, -180.0, true);
        assert_eq!(lon.size(), 360);
        assert_float_eq!(lon.delta(), 1.0, abs <= 1e-12);
        let centers = lon.centers();
        assert_float_eq!(centers[0], -180.0, abs <= 1e-9);
        assert_float_eq!(centers[359], 179.0, abs <= 1e-9);
    }

    #[test]
    fn latitude_axis_basics() {
        let lat = RegularCoord::new(180, -90.0, false);
        assert_eq!(lat.size(), 180);
        assert_float_eq!(lat.delta(), 1.0, abs <= 1e-12);
    }

    #[test]
    fn wrapped_subset_size() {
        let lon = RegularCoord::new(360, -180.0, true);
        let s = lon.subset(350, 10);
        assert_eq!(s.size(), 20);
        assert_eq!(s.centers().len(), 20);
    }

    #[test]
    fn indices_wrap_periodic() {
        let lon = RegularCoord::new(360, -180.0, true);
        let idx = lon.indices(&[-180.0, 0.0, 179.9, 540.0], false).unwrap();
        assert_eq!(idx, vec![0, 180, 359, 0]);
    }

    #[test]
    fn indices_clip_nonperiodic() {
        let lat = RegularCoord::new(180, -90.0, false);
        let idx = lat.indices(&[-200.0, 200.0], false).unwrap();
        assert_eq!(idx, vec![0, 179]);
    }
}
