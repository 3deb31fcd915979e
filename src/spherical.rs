//! Lon/lat <-> unit-sphere conversions, great-circle midpoints, and
//! longitude-periodic scalar means with pole-singularity overrides.

use ndarray::s;
use std::f64::consts::PI;

const DEG2RAD: f64 = PI / 180.0;
const RAD2DEG: f64 = 180.0 / PI;

/// A unit-sphere Cartesian coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Converts (lon, lat) in degrees to a point on the unit sphere.
///
/// `Z` points along the pole; `Y = 0` at `lon = 0, 180`; `X = 0` at
/// `lon = +-90`.
#[must_use]
pub fn lonlat_to_xyz(lon: f64, lat: f64) -> Xyz {
    let lonr = DEG2RAD * lon;
    let latr = DEG2RAD * lat;
    Xyz {
        x: latr.cos() * lonr.cos(),
        y: latr.cos() * lonr.sin(),
        z: latr.sin(),
    }
}

/// Converts a unit-sphere (or near-unit-sphere) point back to (lon, lat)
/// in degrees. Longitude is taken in `(-180, 180]`.
///
/// Uses a sub-roundoff offset in the normalizing radius to avoid
/// division by zero exactly at the poles, matching the reference
/// implementation's `2 / f64::MAX` epsilon.
#[must_use]
pub fn xyz_to_lonlat(p: Xyz) -> (f64, f64) {
    let lat = RAD2DEG * p.z.asin();
    let sub_roundoff = 2.0 / f64::MAX;
    let r = 1.0 / ((p.x * p.x + p.y * p.y).sqrt() + sub_roundoff);
    let mut lon = RAD2DEG * (r * p.x).acos();
    if p.y < 0.0 {
        lon = -lon;
    }
    (lon, lat)
}

/// Which neighbor pattern to average over when computing [`mean_from_xyz`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeanMode {
    /// 2-point mean of j-direction neighbors (a j-midpoint).
    J,
    /// 2-point mean of i-direction neighbors (an i-midpoint).
    I,
    /// 4-point mean of a corner block (a cell-center point).
    Four,
}

/// Averages unit-sphere points and renormalizes back onto the sphere,
/// then converts the result to (lon, lat).
#[must_use]
pub fn mean_from_xyz(points: &[Xyz]) -> (f64, f64) {
    let n = points.len() as f64;
    let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
    for p in points {
        x += p.x;
        y += p.y;
        z += p.z;
    }
    x /= n;
    y /= n;
    z /= n;
    let r = 1.0 / (x * x + y * y + z * z).sqrt();
    xyz_to_lonlat(Xyz {
        x: r * x,
        y: r * y,
        z: r * z,
    })
}

fn mean2j_plain(a: &ndarray::Array2<f64>) -> ndarray::Array2<f64> {
    let (nj, ni) = a.dim();
    let lo = a.slice(s![0..nj - 1, ..]);
    let hi = a.slice(s![1..nj, ..]);
    (&lo + &hi).mapv(|v| 0.5 * v)
}

fn mean2i_plain(a: &ndarray::Array2<f64>) -> ndarray::Array2<f64> {
    let (_, ni) = a.dim();
    let lo = a.slice(s![.., 0..ni - 1]);
    let hi = a.slice(s![.., 1..ni]);
    (&lo + &hi).mapv(|v| 0.5 * v)
}

fn mean4_plain(a: &ndarray::Array2<f64>) -> ndarray::Array2<f64> {
    let (nj, ni) = a.dim();
    let a00 = a.slice(s![0..nj - 1, 0..ni - 1]);
    let a11 = a.slice(s![1..nj, 1..ni]);
    let a10 = a.slice(s![1..nj, 0..ni - 1]);
    let a01 = a.slice(s![0..nj - 1, 1..ni]);
    (&a00 + &a11 + &a10 + &a01).mapv(|v| 0.25 * v)
}

/// Refines node (lon, lat) arrays in 3-D: converts every node to a
/// unit-sphere point, averages by the given [`MeanMode`] neighbor
/// pattern, renormalizes onto the sphere, and converts back. This is
/// the "work in 3d" path used when inserting new mesh nodes, avoiding
/// the longitude-wrap special casing the planar path needs.
#[must_use]
pub fn mean_3d(lon: &ndarray::Array2<f64>, lat: &ndarray::Array2<f64>, mode: MeanMode) -> (ndarray::Array2<f64>, ndarray::Array2<f64>) {
    let x = ndarray::Zip::from(lon).and(lat).map_collect(|&lo, &la| lonlat_to_xyz(lo, la).x);
    let y = ndarray::Zip::from(lon).and(lat).map_collect(|&lo, &la| lonlat_to_xyz(lo, la).y);
    let z = ndarray::Zip::from(lon).and(lat).map_collect(|&lo, &la| lonlat_to_xyz(lo, la).z);
    let (x, y, z) = match mode {
        MeanMode::J => (mean2j_plain(&x), mean2j_plain(&y), mean2j_plain(&z)),
        MeanMode::I => (mean2i_plain(&x), mean2i_plain(&y), mean2i_plain(&z)),
        MeanMode::Four => (mean4_plain(&x), mean4_plain(&y), mean4_plain(&z)),
    };
    let shape = x.dim();
    let mut out_lon = ndarray::Array2::zeros(shape);
    let mut out_lat = ndarray::Array2::zeros(shape);
    ndarray::Zip::from(&mut out_lon)
        .and(&mut out_lat)
        .and(&x)
        .and(&y)
        .and(&z)
        .for_each(|lo, la, &xv, &yv, &zv| {
            let r = 1.0 / (xv * xv + yv * yv + zv * zv).sqrt();
            let (plon, plat) = xyz_to_lonlat(Xyz {
                x: r * xv,
                y: r * yv,
                z: r * zv,
            });
            *lo = plon;
            *la = plat;
        });
    (out_lon, out_lat)
}

/// Periodic-aware 2-point mean of longitudes `a` and `b`, landing on the
/// shorter arc between them. Undefined (arbitrary branch) when
/// `|b - a| == period / 2` exactly; callers must avoid that configuration.
#[must_use]
pub fn lonmean2(a: f64, b: f64, period: f64) -> f64 {
    let d = (b - a).rem_euclid(period);
    let half = 0.5 * period;
    a + 0.5 * (d - if d > half { period } else { 0.0 })
}

#[must_use]
fn lonmean2_360(a: f64, b: f64) -> f64 {
    lonmean2(a, b, 360.0)
}

/// A node location (row, column) where longitude is singular (`lat = +-90`).
pub type PoleIndex = (usize, usize);

/// Planar (non-spherical) 2-point mean along the j-direction (rows),
/// longitude-aware with pole overrides.
///
/// `out[j, i]` is the mean of `lon[j, i]` and `lon[j+1, i]`, except where
/// `(j, i)` or `(j+1, i)` coincides with a singular pole node, in which
/// case the mean degenerates to the non-polar neighbor's longitude.
pub fn mean2j_lon(lon: &ndarray::Array2<f64>, singularities: &[PoleIndex]) -> ndarray::Array2<f64> {
    let (nj, ni) = lon.dim();
    let mut out = ndarray::Array2::zeros((nj - 1, ni));
    for j in 0..nj - 1 {
        for i in 0..ni {
            out[[j, i]] = lonmean2_360(lon[[j, i]], lon[[j + 1, i]]);
        }
    }
    for &(jj, ii) in singularities {
        if jj < nj - 1 {
            out[[jj, ii]] = lon[[jj + 1, ii]];
        }
        if jj >= 1 {
            out[[jj - 1, ii]] = lon[[jj - 1, ii]];
        }
    }
    out
}

/// Planar 2-point mean along the i-direction (columns), longitude-aware
/// with pole overrides. See [`mean2j_lon`].
pub fn mean2i_lon(lon: &ndarray::Array2<f64>, singularities: &[PoleIndex]) -> ndarray::Array2<f64> {
    let (nj, ni) = lon.dim();
    let mut out = ndarray::Array2::zeros((nj, ni - 1));
    for j in 0..nj {
        for i in 0..ni - 1 {
            out[[j, i]] = lonmean2_360(lon[[j, i]], lon[[j, i + 1]]);
        }
    }
    for &(jj, ii) in singularities {
        if ii < ni - 1 {
            out[[jj, ii]] = lon[[jj, ii + 1]];
        }
        if ii >= 1 {
            out[[jj, ii - 1]] = lon[[jj, ii - 1]];
        }
    }
    out
}

/// Planar 4-point mean (node corners to cell centers), longitude-aware
/// with pole overrides. See [`mean2j_lon`].
pub fn mean4_lon(lon: &ndarray::Array2<f64>, singularities: &[PoleIndex]) -> ndarray::Array2<f64> {
    let (nj, ni) = lon.dim();
    let mut out = ndarray::Array2::zeros((nj - 1, ni - 1));
    for j in 0..nj - 1 {
        for i in 0..ni - 1 {
            let a = lonmean2_360(lon[[j, i]], lon[[j + 1, i + 1]]);
            let b = lonmean2_360(lon[[j + 1, i]], lon[[j, i + 1]]);
            out[[j, i]] = lonmean2_360(a, b);
        }
    }
    for &(jj, ii) in singularities {
        if jj < nj - 1 && ii < ni - 1 {
            let inner = lonmean2_360(lon[[jj, ii + 1]], lon[[jj + 1, ii]]);
            out[[jj, ii]] = lonmean2_360(lon[[jj + 1, ii + 1]], inner);
        }
        if jj >= 1 && ii >= 1 {
            let inner = lonmean2_360(lon[[jj, ii - 1]], lon[[jj - 1, ii]]);
            out[[jj - 1, ii - 1]] = lonmean2_360(lon[[jj - 1, ii - 1]], inner);
        }
        if jj < nj - 1 && ii >= 1 {
            let inner = lonmean2_360(lon[[jj, ii - 1]], lon[[jj + 1, ii]]);
            out[[jj, ii - 1]] = lonmean2_360(lon[[jj + 1, ii - 1]], inner);
        }
        if jj >= 1 && ii < ni - 1 {
            let inner = lonmean2_360(lon[[jj, ii + 1]], lon[[jj - 1, ii]]);
            out[[jj - 1, ii]] = lonmean2_360(lon[[jj - 1, ii + 1]], inner);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn xyz_roundtrip() {
        for (lon, lat) in [(0.0, 0.0), (45.0, 30.0), (-120.0, -60.0), (179.0, 89.0)] {
            let p = lonlat_to_xyz(lon, lat);
            let (lon2, lat2) = xyz_to_lonlat(p);
            assert_float_eq!(lon, lon2, abs <= 1e-9);
            assert_float_eq!(lat, lat2, abs <= 1e-9);
        }
    }

    #[test]
    fn no_nan_at_pole() {
        let p = lonlat_to_xyz(30.0, 90.0);
        let (lon, lat) = xyz_to_lonlat(p);
        assert!(!lon.is_nan());
        assert!(!lat.is_nan());
        assert_float_eq!(lat, 90.0, abs <= 1e-6);
    }

    #[test]
    fn lonmean2_shorter_arc() {
        assert_float_eq!(lonmean2(10.0, 20.0, 360.0), 15.0, abs <= 1e-12);
        // Wrap-around: 350 and 10 are 20 degrees apart via the shorter arc through 0.
        let m = lonmean2(350.0, 10.0, 360.0);
        assert_float_eq!(m.rem_euclid(360.0), 0.0, abs <= 1e-9);
    }

    #[test]
    fn lonmean2_antisymmetric() {
        let (a, b) = (30.0, 200.0);
        let fwd = lonmean2(a, b, 360.0) - a;
        let rev = lonmean2(b, a, 360.0) - b;
        assert_float_eq!(fwd, -rev, abs <= 1e-9);
    }

    #[test]
    fn mean_from_xyz_normalizes() {
        let p1 = lonlat_to_xyz(0.0, 0.0);
        let p2 = lonlat_to_xyz(90.0, 0.0);
        let (lon, lat) = mean_from_xyz(&[p1, p2]);
        assert_float_eq!(lon, 45.0, abs <= 1e-6);
        assert_float_eq!(lat, 0.0, abs <= 1e-6);
    }
}
