//! Staggered spherical node mesh: construction, 2x refinement, rotation,
//! and nearest-neighbor projection against a uniform source grid.

use crate::coord::RegularCoord;
use crate::error::Error;
use crate::spherical::{lonlat_to_xyz, mean_3d, mean4_lon, mean2i_lon, mean2j_lon, xyz_to_lonlat, MeanMode, Xyz};
use ndarray::Array2;

/// A quadrilateral mesh of `(nj, ni)` cells described by `(nj+1, ni+1)`
/// node coordinates `lon`/`lat`. Cell areas are optional.
#[derive(Clone, Debug)]
pub struct Mesh {
    nj: usize,
    ni: usize,
    pub lon: Array2<f64>,
    pub lat: Array2<f64>,
    pub area: Option<Array2<f64>>,
    /// Node indices where `lat == 90`, where longitude is singular.
    pub np_index: Vec<(usize, usize)>,
    /// Refinement level of this mesh relative to its root.
    pub rfl: usize,
}

impl Mesh {
    /// Builds a mesh from explicit node coordinates. `lon` and `lat`
    /// must share shape `(nj+1, ni+1)`; `area`, if given, must have
    /// shape `(nj, ni)`.
    pub fn from_nodes(lon: Array2<f64>, lat: Array2<f64>, area: Option<Array2<f64>>, rfl: usize) -> Result<Self, Error> {
        if lon.dim() != lat.dim() {
            return Err(Error::ShapeMismatch {
                expected: lon.dim(),
                found: lat.dim(),
            });
        }
        let (njp1, nip1) = lon.dim();
        if njp1 < 2 || nip1 < 2 {
            return Err(Error::ConfigError("mesh must have at least one cell in each direction".into()));
        }
        let (nj, ni) = (njp1 - 1, nip1 - 1);
        if let Some(a) = &area {
            if a.dim() != (nj, ni) {
                return Err(Error::ShapeMismatch {
                    expected: (nj, ni),
                    found: a.dim(),
                });
            }
        }
        let np_index = find_pole_nodes(&lat);
        Ok(Mesh {
            nj,
            ni,
            lon,
            lat,
            area,
            np_index,
            rfl,
        })
    }

    /// Builds a mesh from 1-D cell-center coordinate arrays, extrapolating
    /// node (edge) coordinates by `1.5*x0 - 0.5*x1` at each end and
    /// averaging interior neighbors.
    pub fn from_cell_centers(lon_centers: &[f64], lat_centers: &[f64], rfl: usize) -> Result<Self, Error> {
        if lon_centers.len() < 1 || lat_centers.len() < 1 {
            return Err(Error::ConfigError("need at least one cell center in each direction".into()));
        }
        let lon_nodes = extrapolate_nodes(lon_centers);
        let lat_nodes = extrapolate_nodes(lat_centers);
        let (nip1, njp1) = (lon_nodes.len(), lat_nodes.len());
        let mut lon = Array2::zeros((njp1, nip1));
        let mut lat = Array2::zeros((njp1, nip1));
        for j in 0..njp1 {
            for i in 0..nip1 {
                lon[[j, i]] = lon_nodes[i];
                lat[[j, i]] = lat_nodes[j];
            }
        }
        Self::from_nodes(lon, lat, None, rfl)
    }

    /// Builds the default global mesh: `ni` cells spanning
    /// `[lon0, lon0 + 360)` in longitude, `nj` cells spanning `[-90, 90]`
    /// in latitude.
    pub fn global(nj: usize, ni: usize, lon0: f64) -> Result<Self, Error> {
        let lon1d: Vec<f64> = (0..=ni).map(|i| lon0 + 360.0 * i as f64 / ni as f64).collect();
        let lat1d: Vec<f64> = (0..=nj).map(|j| -90.0 + 180.0 * j as f64 / nj as f64).collect();
        let mut lon = Array2::zeros((nj + 1, ni + 1));
        let mut lat = Array2::zeros((nj + 1, ni + 1));
        for j in 0..=nj {
            for i in 0..=ni {
                lon[[j, i]] = lon1d[i];
                lat[[j, i]] = lat1d[j];
            }
        }
        Self::from_nodes(lon, lat, None, 0)
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.nj, self.ni)
    }
    #[must_use]
    pub fn nj(&self) -> usize {
        self.nj
    }
    #[must_use]
    pub fn ni(&self) -> usize {
        self.ni
    }

    /// Transposes node coordinates and area in place, swapping the roles
    /// of `i` and `j`.
    pub fn transpose(&mut self) {
        self.lon = self.lon.t().to_owned();
        self.lat = self.lat.t().to_owned();
        self.area = self.area.as_ref().map(|a| a.t().to_owned());
        std::mem::swap(&mut self.nj, &mut self.ni);
        self.np_index = find_pole_nodes(&self.lat);
    }

    /// Returns interpolated cell-center coordinates derived from the
    /// node corners, either by averaging on the unit sphere (`work_in_3d`)
    /// or with the longitude-periodic planar mean.
    #[must_use]
    pub fn interp_center_coords(&self, work_in_3d: bool) -> (Array2<f64>, Array2<f64>) {
        if work_in_3d {
            mean_3d(&self.lon, &self.lat, MeanMode::Four)
        } else {
            (mean4_lon(&self.lon, &self.np_index), mean4_plain(&self.lat))
        }
    }

    /// Returns a new mesh with twice the resolution in both directions,
    /// inserting j-midpoint, i-midpoint, and cell-center nodes between
    /// the existing ones.
    #[must_use]
    pub fn refine_by_2(&self, work_in_3d: bool) -> Self {
        let (njp1, nip1) = self.lon.dim();
        let new_shape = (2 * self.nj + 1, 2 * self.ni + 1);
        let mut lon = Array2::zeros(new_shape);
        let mut lat = Array2::zeros(new_shape);
        for j in 0..njp1 {
            for i in 0..nip1 {
                lon[[2 * j, 2 * i]] = self.lon[[j, i]];
                lat[[2 * j, 2 * i]] = self.lat[[j, i]];
            }
        }
        let (lon_j, lat_j);
        let (lon_i, lat_i);
        let (lon_c, lat_c);
        if work_in_3d {
            (lon_j, lat_j) = mean_3d(&self.lon, &self.lat, MeanMode::J);
            (lon_i, lat_i) = mean_3d(&self.lon, &self.lat, MeanMode::I);
            (lon_c, lat_c) = mean_3d(&self.lon, &self.lat, MeanMode::Four);
        } else {
            lon_j = mean2j_lon(&self.lon, &self.np_index);
            lat_j = mean2j_plain(&self.lat);
            lon_i = mean2i_lon(&self.lon, &self.np_index);
            lat_i = mean2i_plain(&self.lat);
            lon_c = mean4_lon(&self.lon, &self.np_index);
            lat_c = mean4_plain(&self.lat);
        }
        for j in 0..self.nj {
            for i in 0..nip1 {
                lon[[2 * j + 1, 2 * i]] = lon_j[[j, i]];
                lat[[2 * j + 1, 2 * i]] = lat_j[[j, i]];
            }
        }
        for j in 0..njp1 {
            for i in 0..self.ni {
                lon[[2 * j, 2 * i + 1]] = lon_i[[j, i]];
                lat[[2 * j, 2 * i + 1]] = lat_i[[j, i]];
            }
        }
        for j in 0..self.nj {
            for i in 0..self.ni {
                lon[[2 * j + 1, 2 * i + 1]] = lon_c[[j, i]];
                lat[[2 * j + 1, 2 * i + 1]] = lat_c[[j, i]];
            }
        }
        Mesh::from_nodes(lon, lat, None, self.rfl + 1).expect("refine_by_2 always produces matching shapes")
    }

    /// Coarsest resolution (max longitude, max latitude angular spacing
    /// between adjacent nodes) per cell, with optionally masked-out
    /// regions (given as cell index ranges in the unrefined base grid,
    /// scaled by `2^rfl`) forced to zero.
    #[must_use]
    pub fn coarsest_resolution(&self, mask_idx: &[(usize, usize, usize, usize)]) -> (Array2<f64>, Array2<f64>) {
        let l = &self.lon;
        let p = &self.lat;
        let (nj, ni) = (self.nj, self.ni);
        let mut del_lam = Array2::zeros((nj, ni));
        let mut del_phi = Array2::zeros((nj, ni));
        for j in 0..nj {
            for i in 0..ni {
                let l00 = l[[j, i]];
                let l01 = l[[j, i + 1]];
                let l10 = l[[j + 1, i]];
                let l11 = l[[j + 1, i + 1]];
                let lam = mdist(l00, l01)
                    .max(mdist(l10, l11))
                    .max(mdist(l00, l10))
                    .max(mdist(l11, l01))
                    .max(mdist(l00, l11))
                    .max(mdist(l10, l01));
                let p00 = p[[j, i]];
                let p01 = p[[j, i + 1]];
                let p10 = p[[j + 1, i]];
                let p11 = p[[j + 1, i + 1]];
                let phi = (p10 - p00)
                    .abs()
                    .max((p11 - p01).abs())
                    .max((p01 - p00).abs())
                    .max((p11 - p10).abs())
                    .max((p00 - p11).abs())
                    .max((p10 - p01).abs());
                del_lam[[j, i]] = lam;
                del_phi[[j, i]] = phi;
            }
        }
        let scale = 1usize << self.rfl;
        for &(js, je, is, ie) in mask_idx {
            for j in (js * scale).min(nj)..(je * scale).min(nj) {
                for i in (is * scale).min(ni)..(ie * scale).min(ni) {
                    del_lam[[j, i]] = 0.0;
                    del_phi[[j, i]] = 0.0;
                }
            }
        }
        (del_lam, del_phi)
    }

    /// Smallest integer refinement level (>= 0) at which this mesh's
    /// coarsest per-cell resolution is at or finer than the given source
    /// grid spacing in both directions.
    #[must_use]
    pub fn max_refine_level(&self, dlon_src: f64, dlat_src: f64) -> i64 {
        let (del_lam, del_phi) = self.coarsest_resolution(&[]);
        let dlat = del_phi.fold(f64::MIN, |a, &b| a.max(b));
        let dlon = del_lam.fold(f64::MIN, |a, &b| a.max(b));
        let a = (dlat / dlat_src).log2().ceil();
        let b = (dlon / dlon_src).log2().ceil();
        a.max(b) as i64
    }

    /// Applies a rotation about the Y axis, then the Z axis, to every
    /// node, in place.
    pub fn rotate(&mut self, y_rot_deg: f64, z_rot_deg: f64) {
        let deg2rad = std::f64::consts::PI / 180.0;
        let (cy, sy) = (f64::cos(deg2rad * y_rot_deg), f64::sin(deg2rad * y_rot_deg));
        let (cz, sz) = (f64::cos(deg2rad * z_rot_deg), f64::sin(deg2rad * z_rot_deg));
        ndarray::Zip::from(&mut self.lon).and(&mut self.lat).for_each(|lo, la| {
            let p = lonlat_to_xyz(*lo, *la);
            let (x1, z1) = (cy * p.x + sy * p.z, -sy * p.x + cy * p.z);
            let y1 = p.y;
            let (x2, y2) = (cz * x1 - sz * y1, sz * x1 + cz * y1);
            let (nlon, nlat) = xyz_to_lonlat(Xyz { x: x2, y: y2, z: z1 });
            *lo = nlon;
            *la = nlat;
        });
        self.np_index = find_pole_nodes(&self.lat);
    }

    /// Index, on the source axes, of the nearest-neighbor source cell
    /// for every mesh node (or cell center, if `use_center`).
    pub fn find_nn_uniform_source(&self, lon: &RegularCoord, lat: &RegularCoord, use_center: bool) -> (Array2<i64>, Array2<i64>) {
        let sni = lon.n() as i64;
        let snj = lat.n() as i64;
        let (dellon, dellat) = (lon.delta(), lat.delta());
        let (tgt_lon, tgt_lat) = if use_center {
            self.interp_center_coords(true)
        } else {
            (self.lon.clone(), self.lat.clone())
        };
        let shape = tgt_lon.dim();
        let mut nn_i = Array2::zeros(shape);
        let mut nn_j = Array2::zeros(shape);
        ndarray::Zip::from(&mut nn_i)
            .and(&mut nn_j)
            .and(&tgt_lon)
            .and(&tgt_lat)
            .for_each(|oi, oj, &lo, &la| {
                let i = ((lo - lon.origin() + 0.5 * dellon).rem_euclid(360.0) / dellon).floor() as i64;
                let j = ((0.5 + (la - lat.origin()) / dellat).floor() as i64).min(snj - 1).max(0);
                *oi = i.rem_euclid(sni);
                *oj = j;
            });
        (nn_i, nn_j)
    }

    /// A `(snj, sni)` mask of 1s wherever some mesh node (or cell center)
    /// is the nearest neighbor of that source cell, 0 elsewhere. Cells
    /// within `singularity_radius` degrees of the pole are always marked
    /// hit, since a uniform source grid's polar row is degenerate.
    pub fn source_hits(&self, xs: &RegularCoord, ys: &RegularCoord, use_center: bool, singularity_radius: f64) -> Array2<f64> {
        let (i, j) = self.find_nn_uniform_source(xs, ys, use_center);
        let (sni, snj) = (xs.n(), ys.n());
        let mut hits = Array2::zeros((snj, sni));
        if singularity_radius > 0.0 {
            let iy = (((90.0 - singularity_radius - ys.origin()) / ys.delta()).ceil() as i64 - ys.start() as i64).max(0) as usize;
            for row in hits.slice_mut(ndarray::s![iy.min(snj).., ..]).iter_mut() {
                *row = 1.0;
            }
        }
        ndarray::Zip::from(&i).and(&j).for_each(|&ii, &jj| {
            let row = (jj - ys.start() as i64) as usize;
            let col = (ii - xs.start() as i64).rem_euclid(xs.n() as i64) as usize;
            if row < snj && col < sni {
                hits[[row, col]] = 1.0;
            }
        });
        hits
    }

    /// Nearest-neighbor projection of source data `zs` (indexed by the
    /// `xs`/`ys` source axes) onto this mesh's nodes (or cell centers).
    pub fn project_source_data_onto_target_mesh(&self, xs: &RegularCoord, ys: &RegularCoord, zs: &Array2<f64>, use_center: bool) -> Array2<f64> {
        let (nn_i, nn_j) = self.find_nn_uniform_source(xs, ys, use_center);
        let shape = nn_i.dim();
        let mut out = Array2::zeros(shape);
        ndarray::Zip::from(&mut out).and(&nn_i).and(&nn_j).for_each(|o, &ii, &jj| {
            let row = (jj - ys.start() as i64) as usize;
            let col = (ii - xs.start() as i64).rem_euclid(xs.n() as i64) as usize;
            *o = zs[[row, col]];
        });
        out
    }
}

fn mdist(x1: f64, x2: f64) -> f64 {
    (x1 - x2).rem_euclid(360.0).min((x2 - x1).rem_euclid(360.0))
}

fn mean2j_plain(a: &Array2<f64>) -> Array2<f64> {
    let (nj, ni) = a.dim();
    let lo = a.slice(ndarray::s![0..nj - 1, ..]);
    let hi = a.slice(ndarray::s![1..nj, ..]);
    (&lo + &hi).mapv(|v| 0.5 * v)
}

fn mean2i_plain(a: &Array2<f64>) -> Array2<f64> {
    let (_, ni) = a.dim();
    let lo = a.slice(ndarray::s![.., 0..ni - 1]);
    let hi = a.slice(ndarray::s![.., 1..ni]);
    (&lo + &hi).mapv(|v| 0.5 * v)
}

fn mean4_plain(a: &Array2<f64>) -> Array2<f64> {
    let (nj, ni) = a.dim();
    let a00 = a.slice(ndarray::s![0..nj - 1, 0..ni - 1]);
    let a11 = a.slice(ndarray::s![1..nj, 1..ni]);
    let a10 = a.slice(ndarray::s![1..nj, 0..ni - 1]);
    let a01 = a.slice(ndarray::s![0..nj - 1, 1..ni]);
    (&a00 + &a11 + &a10 + &a01).mapv(|v| 0.25 * v)
}

fn extrapolate_nodes(centers: &[f64]) -> Vec<f64> {
    let n = centers.len();
    let mut nodes = vec![0.0; n + 1];
    for k in 1..n {
        nodes[k] = 0.5 * (centers[k - 1] + centers[k]);
    }
    let second = if n > 1 { centers[1] } else { centers[0] };
    let second_last = if n > 1 { centers[n - 2] } else { centers[0] };
    nodes[0] = 1.5 * centers[0] - 0.5 * second;
    nodes[n] = 1.5 * centers[n - 1] - 0.5 * second_last;
    nodes
}

fn find_pole_nodes(lat: &Array2<f64>) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for ((j, i), &v) in lat.indexed_iter() {
        if v == 90.0 {
            out.push((j, i));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_mesh_has_expected_shape_and_span() {
        let m = Mesh::global(4, 8, -180.0).unwrap();
        assert_eq!(m.shape(), (4, 8));
        assert_eq!(m.lat[[0, 0]], -90.0);
        assert_eq!(m.lat[[4, 0]], 90.0);
        assert_eq!(m.lon[[0, 0]], -180.0);
    }

    #[test]
    fn refine_by_2_preserves_original_nodes() {
        let m = Mesh::global(2, 4, -180.0).unwrap();
        let r = m.refine_by_2(true);
        assert_eq!(r.shape(), (4, 8));
        assert_eq!(r.rfl, 1);
        for j in 0..=m.nj() {
            for i in 0..=m.ni() {
                assert_eq!(r.lon[[2 * j, 2 * i]], m.lon[[j, i]]);
                assert_eq!(r.lat[[2 * j, 2 * i]], m.lat[[j, i]]);
            }
        }
    }

    #[test]
    fn transpose_swaps_dims() {
        let mut m = Mesh::global(2, 4, -180.0).unwrap();
        m.transpose();
        assert_eq!(m.shape(), (4, 2));
    }

    #[test]
    fn from_nodes_rejects_shape_mismatch() {
        let lon = Array2::zeros((3, 4));
        let lat = Array2::zeros((3, 5));
        assert!(Mesh::from_nodes(lon, lat, None, 0).is_err());
    }

    #[test]
    fn coarsest_resolution_is_uniform_on_regular_grid() {
        let m = Mesh::global(4, 8, -180.0).unwrap();
        let (del_lam, _del_phi) = m.coarsest_resolution(&[]);
        let first = del_lam[[0, 0]];
        assert!(del_lam.iter().all(|&v| (v - first).abs() < 1e-9));
    }
}
