//! Thin-wall topographic coarsening: a staggered mesh of cell-center and
//! edge elevation statistics, plus the deterministic rule pipeline that
//! folds fine-scale connectivity into a coarser representation.

pub mod bounds;
pub mod pathway;
pub mod rules;
pub mod sec;

use crate::error::Error;
use crate::mesh::Mesh;
use crate::stats::Stats;
use sec::{Direction, Field};

/// A mesh of `(nj, ni)` cells carrying both the original ("simple") and
/// coarsening-adjusted ("effective") elevation statistics at cell
/// centers and u/v edges.
pub struct ThinWalls {
    pub mesh: Mesh,
    pub c_simple: Stats,
    pub u_simple: Stats,
    pub v_simple: Stats,
    pub c_effective: Stats,
    pub u_effective: Stats,
    pub v_effective: Stats,
}

/// Options governing a single pass of the coarsening rule pipeline.
/// These expose behavior the reference pipeline leaves as silently
/// inconsistent branches; freezing them here as named flags lets a
/// caller opt into the legacy ("matlab") path deliberately rather than
/// by accident.
#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    /// Adjust cell-center statistics when folding corners/ridges, not
    /// just the edges that carry connectivity.
    pub adjust_centers: bool,
    /// Reproduce the legacy MATLAB port's branch for corner/ridge
    /// adjustments, which updates `ave`/`hgh` differently (and skips
    /// some interior updates) compared to the non-legacy path.
    pub matlab: bool,
    /// In `lower_buttress`, also raise the mean of the lowered edge to
    /// the mean of its replacement.
    pub adjust_mean: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            adjust_centers: false,
            matlab: false,
            adjust_mean: true,
        }
    }
}

impl ThinWalls {
    pub fn new(mesh: Mesh) -> Self {
        let (nj, ni) = mesh.shape();
        ThinWalls {
            c_simple: Stats::zeros((nj, ni)),
            u_simple: Stats::zeros((nj, ni + 1)),
            v_simple: Stats::zeros((nj + 1, ni)),
            c_effective: Stats::zeros((nj, ni)),
            u_effective: Stats::zeros((nj, ni + 1)),
            v_effective: Stats::zeros((nj + 1, ni)),
            mesh,
        }
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.mesh.shape()
    }

    pub fn transpose(&mut self) {
        self.mesh.transpose();
        self.c_simple = self.c_simple.transposed();
        self.c_effective = self.c_effective.transposed();
        let u = self.u_simple.transposed();
        let v = self.v_simple.transposed();
        self.u_simple = v;
        self.v_simple = u;
        let u = self.u_effective.transposed();
        let v = self.v_effective.transposed();
        self.u_effective = v;
        self.v_effective = u;
    }

    /// Returns a fresh ThinWalls at twice the node resolution, with zero
    /// elevation statistics; callers re-sample source data afterward.
    #[must_use]
    pub fn refine(&self, work_in_3d: bool) -> Self {
        ThinWalls::new(self.mesh.refine_by_2(work_in_3d))
    }

    pub fn set_cell_mean(&mut self, data: ndarray::Array2<f64>) -> Result<(), Error> {
        if data.dim() != self.c_simple.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.c_simple.shape(),
                found: data.dim(),
            });
        }
        self.c_simple = Stats::from_constant(data);
        Ok(())
    }

    pub fn set_edge_mean(&mut self, datau: ndarray::Array2<f64>, datav: ndarray::Array2<f64>) -> Result<(), Error> {
        if datau.dim() != self.u_simple.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.u_simple.shape(),
                found: datau.dim(),
            });
        }
        if datav.dim() != self.v_simple.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.v_simple.shape(),
                found: datav.dim(),
            });
        }
        self.u_simple = Stats::from_constant(datau);
        self.v_simple = Stats::from_constant(datav);
        Ok(())
    }

    pub fn init_effective_values(&mut self) {
        self.c_effective = self.c_simple.clone();
        self.u_effective = self.u_simple.clone();
        self.v_effective = self.v_simple.clone();
    }

    /// Sets edge means to step topography: the higher of the two
    /// neighboring cell means, falling back to the cell's own mean at
    /// the mesh boundary.
    pub fn set_edge_to_step(&mut self) {
        let (nj, ni) = self.c_simple.shape();
        let mut u = ndarray::Array2::zeros((nj, ni + 1));
        for j in 0..nj {
            u[[j, 0]] = self.c_simple.ave[[j, 0]];
            u[[j, ni]] = self.c_simple.ave[[j, ni - 1]];
            for i in 1..ni {
                u[[j, i]] = self.c_simple.ave[[j, i - 1]].max(self.c_simple.ave[[j, i]]);
            }
        }
        self.u_simple = Stats::from_constant(u);

        let mut v = ndarray::Array2::zeros((nj + 1, ni));
        for i in 0..ni {
            v[[0, i]] = self.c_simple.ave[[0, i]];
            v[[nj, i]] = self.c_simple.ave[[nj - 1, i]];
            for j in 1..nj {
                v[[j, i]] = self.c_simple.ave[[j - 1, i]].max(self.c_simple.ave[[j, i]]);
            }
        }
        self.v_simple = Stats::from_constant(v);
    }

    /// Number of coarse cells: `effective` Stats must have even shape.
    pub(crate) fn coarse_shape(&self) -> (usize, usize) {
        let (nj, ni) = self.c_effective.shape();
        (nj / 2, ni / 2)
    }

    /// Reads `(low, ave, hgh)` of the given direction at coarse cell
    /// `(cj, ci)`, from the effective Stats.
    #[must_use]
    pub(crate) fn get(&self, dir: Direction, cj: usize, ci: usize) -> (f64, f64, f64) {
        let (field, j, i) = sec::sec_index(dir, cj, ci);
        let s = match field {
            Field::C => &self.c_effective,
            Field::U => &self.u_effective,
            Field::V => &self.v_effective,
        };
        (s.low[[j, i]], s.ave[[j, i]], s.hgh[[j, i]])
    }

    pub(crate) fn get_low(&self, dir: Direction, cj: usize, ci: usize) -> f64 {
        self.get(dir, cj, ci).0
    }

    /// Public `get_low` for scenario/integration tests outside the crate.
    /// Internal stage code should use `get_low` directly.
    #[must_use]
    pub fn get_low_for_test(&self, dir: Direction, cj: usize, ci: usize) -> f64 {
        self.get_low(dir, cj, ci)
    }

    /// Writes `(low, ave, hgh)` of the given direction at coarse cell
    /// `(cj, ci)` into the effective Stats, unconditionally overwriting.
    pub(crate) fn set(&mut self, dir: Direction, cj: usize, ci: usize, low: f64, ave: f64, hgh: f64) {
        let (field, j, i) = sec::sec_index(dir, cj, ci);
        let s = match field {
            Field::C => &mut self.c_effective,
            Field::U => &mut self.u_effective,
            Field::V => &mut self.v_effective,
        };
        s.low[[j, i]] = low;
        s.ave[[j, i]] = ave;
        s.hgh[[j, i]] = hgh;
    }

    pub(crate) fn set_low(&mut self, dir: Direction, cj: usize, ci: usize, low: f64) {
        let (field, j, i) = sec::sec_index(dir, cj, ci);
        let s = match field {
            Field::C => &mut self.c_effective,
            Field::U => &mut self.u_effective,
            Field::V => &mut self.v_effective,
        };
        s.low[[j, i]] = low;
    }

    pub(crate) fn set_ave(&mut self, dir: Direction, cj: usize, ci: usize, ave: f64) {
        let (field, j, i) = sec::sec_index(dir, cj, ci);
        let s = match field {
            Field::C => &mut self.c_effective,
            Field::U => &mut self.u_effective,
            Field::V => &mut self.v_effective,
        };
        s.ave[[j, i]] = ave;
    }

    pub(crate) fn set_hgh(&mut self, dir: Direction, cj: usize, ci: usize, hgh: f64) {
        let (field, j, i) = sec::sec_index(dir, cj, ci);
        let s = match field {
            Field::C => &mut self.c_effective,
            Field::U => &mut self.u_effective,
            Field::V => &mut self.v_effective,
        };
        s.hgh[[j, i]] = hgh;
    }

    /// Raises `(low, ave, hgh)` at the given direction/cell to at least
    /// the given values (elementwise max), the pattern used whenever a
    /// rule stage folds a ridge or corner out onto an outer edge.
    pub(crate) fn raise(&mut self, dir: Direction, cj: usize, ci: usize, low: f64, ave: f64, hgh: f64) {
        let (l, a, h) = self.get(dir, cj, ci);
        self.set(dir, cj, ci, l.max(low), a.max(ave), h.max(hgh));
    }

    /// Reduces this ThinWalls to half resolution (stage 7 of the
    /// pipeline): each coarse cell's simple and effective Stats are the
    /// 4-point (center) or 2-point (edge) min/mean/max of its four fine
    /// children.
    #[must_use]
    pub fn coarsen(&self) -> Result<Self, Error> {
        if self.mesh.rfl == 0 {
            return Err(Error::DegenerateGeometry("coarsest grid, no finer level to coarsen from".into()));
        }
        let (nj, ni) = self.mesh.shape();
        let coarse_mesh = Mesh::from_nodes(
            strided_subset(&self.mesh.lon, 2),
            strided_subset(&self.mesh.lat, 2),
            None,
            self.mesh.rfl - 1,
        )?;
        debug_assert_eq!(coarse_mesh.shape(), (nj / 2, ni / 2));
        Ok(ThinWalls {
            c_simple: self.c_simple.coarsen_c(),
            u_simple: self.u_simple.coarsen_u(),
            v_simple: self.v_simple.coarsen_v(),
            c_effective: self.c_effective.coarsen_c(),
            u_effective: self.u_effective.coarsen_u(),
            v_effective: self.v_effective.coarsen_v(),
            mesh: coarse_mesh,
        })
    }
}

fn strided_subset(a: &ndarray::Array2<f64>, stride: usize) -> ndarray::Array2<f64> {
    let (nj, ni) = a.dim();
    a.slice(ndarray::s![0..nj;stride, 0..ni;stride]).to_owned()
}

/// One named stage of the coarsening pipeline, in the order the
/// reference pipeline runs them. Exposed as data rather than a fixed
/// function call chain so a caller can run a subset, e.g. to inspect
/// the effect of an individual stage or omit pathway-limiting entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageTag {
    PushCorners,
    LowerButtress,
    FoldRidges,
    InvertExteriorCorners,
    BoundHByUv,
    FillPotHoles,
    LimitNsEwConnections,
    LimitCornerConnections,
}

/// The full stage order the reference pipeline always runs before a
/// `coarsen()` call.
pub const DEFAULT_PIPELINE: [StageTag; 8] = [
    StageTag::PushCorners,
    StageTag::LowerButtress,
    StageTag::FoldRidges,
    StageTag::InvertExteriorCorners,
    StageTag::BoundHByUv,
    StageTag::FillPotHoles,
    StageTag::LimitNsEwConnections,
    StageTag::LimitCornerConnections,
];

impl ThinWalls {
    /// Runs the named stages, in order, against this ThinWalls' effective
    /// Stats. Does not coarsen; call [`Self::coarsen`] separately once the
    /// rule pipeline has settled.
    pub fn run_pipeline(&mut self, stages: &[StageTag], opts: &PipelineOptions) {
        for &stage in stages {
            match stage {
                StageTag::PushCorners => rules::push_corners(self, opts),
                StageTag::LowerButtress => rules::lower_buttress(self, opts),
                StageTag::FoldRidges => rules::fold_ridges(self, opts),
                StageTag::InvertExteriorCorners => rules::invert_exterior_corners(self, opts),
                StageTag::BoundHByUv => bounds::bound_h_by_uv(self),
                StageTag::FillPotHoles => bounds::fill_pot_holes(self),
                StageTag::LimitNsEwConnections => pathway::limit_ns_ew_connections(self),
                StageTag::LimitCornerConnections => pathway::limit_corner_connections(self),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    /// A (4,4)-cell mesh at `rfl = 1`, the way `tests/scenarios.rs` seeds
    /// its fixtures, so `coarsen()` (which requires a finer level to
    /// coarsen from) succeeds rather than hitting `DegenerateGeometry`.
    fn seed() -> ThinWalls {
        let mut lon = ndarray::Array2::zeros((5, 5));
        let mut lat = ndarray::Array2::zeros((5, 5));
        for j in 0..5 {
            for i in 0..5 {
                lon[[j, i]] = -180.0 + 360.0 * i as f64 / 4.0;
                lat[[j, i]] = -90.0 + 180.0 * j as f64 / 4.0;
            }
        }
        let mesh = Mesh::from_nodes(lon, lat, None, 1).unwrap();
        let mut tw = ThinWalls::new(mesh);
        tw.set_cell_mean(ndarray::Array2::zeros((4, 4))).unwrap();
        tw.set_edge_to_step();
        tw.init_effective_values();
        tw
    }

    #[test]
    fn init_effective_values_copies_simple() {
        let tw = seed();
        assert_eq!(tw.c_effective, tw.c_simple);
        assert_eq!(tw.u_effective, tw.u_simple);
    }

    #[test]
    fn coarsen_halves_shape() {
        let tw = seed();
        let coarse = tw.coarsen().unwrap();
        assert_eq!(coarse.shape(), (2, 2));
        assert_eq!(coarse.mesh.rfl, 0);
    }

    #[test]
    fn coarsen_on_coarsest_mesh_is_an_error() {
        let tw = seed();
        let coarse = tw.coarsen().unwrap();
        assert!(coarse.coarsen().is_err());
    }

    #[test]
    fn get_set_round_trip_on_n_direction() {
        let mut tw = seed();
        tw.set(Direction::N, 0, 0, 1.0, 2.0, 3.0);
        assert_eq!(tw.get(Direction::N, 0, 0), (1.0, 2.0, 3.0));
    }

    #[test]
    fn default_pipeline_preserves_ordering_invariant_on_flat_field() {
        let mut tw = seed();
        let opts = PipelineOptions::default();
        tw.run_pipeline(&DEFAULT_PIPELINE, &opts);
        for s in [&tw.c_effective, &tw.u_effective, &tw.v_effective] {
            for ((l, a), h) in s.low.iter().zip(s.ave.iter()).zip(s.hgh.iter()) {
                assert!(l <= a && a <= h);
            }
        }
    }

    #[test]
    fn default_pipeline_then_coarsen_is_unchanged_on_uniform_field() {
        let mut tw = seed();
        let opts = PipelineOptions::default();
        tw.run_pipeline(&DEFAULT_PIPELINE, &opts);
        let coarse = tw.coarsen().unwrap();
        for &v in coarse.c_effective.low.iter() {
            assert_eq!(v, 0.0);
        }
    }
}
