//! Iterative mesh refinement against a uniform source grid.

use crate::coord::RegularCoord;
use crate::mesh::Mesh;
use log::{info, warn};

/// Options controlling [`RefinementDriver::run`].
#[derive(Clone, Debug)]
pub struct RefinementOptions {
    /// Hard cap on the number of meshes produced (including the seed).
    pub max_stages: usize,
    /// Hard cap on the memory footprint of the finest mesh, in megabytes.
    pub max_mb: f64,
    /// When `>= 1`, refine exactly to this level and ignore all other
    /// convergence conditions.
    pub fixed_refine_level: i64,
    /// Refine node midpoints on the unit sphere rather than with the
    /// longitude-periodic planar mean.
    pub work_in_3d: bool,
    /// Evaluate hit-testing and resolution limits at cell centers rather
    /// than at nodes.
    pub use_center: bool,
    /// Stop refining once the mesh's coarsest per-cell resolution is at
    /// or finer than the source grid's resolution in both directions.
    pub resolution_limit: bool,
    /// Cell ranges (in the unrefined base grid) excluded from the
    /// resolution-limit check, as `(j_start, j_end, i_start, i_end)`.
    pub mask_res: Vec<(usize, usize, usize, usize)>,
    /// Degrees of latitude around each pole always considered hit, since
    /// a uniform source grid's polar row is geometrically degenerate.
    pub singularity_radius: f64,
}

impl Default for RefinementOptions {
    fn default() -> Self {
        RefinementOptions {
            max_stages: 32,
            max_mb: 2000.0,
            fixed_refine_level: -1,
            work_in_3d: true,
            use_center: false,
            resolution_limit: false,
            mask_res: Vec::new(),
            singularity_radius: 0.25,
        }
    }
}

/// The outcome of a refinement run: the sequence of meshes produced
/// (coarsest first) plus whether the loop stopped because it converged
/// or because a budget was exhausted.
#[derive(Clone, Debug)]
pub struct RefinementResult {
    pub meshes: Vec<Mesh>,
    /// `None` if the loop converged; `Some(reason)` if a stage, memory,
    /// or iteration budget was hit first. Not fatal: `meshes` is still a
    /// usable, valid sequence.
    pub convergence_warning: Option<String>,
}

/// Drives repeated 2x refinement of a seed mesh until it resolves every
/// cell of a uniform source grid, plateaus, or a resource budget runs
/// out.
pub struct RefinementDriver {
    options: RefinementOptions,
}

impl RefinementDriver {
    #[must_use]
    pub fn new(options: RefinementOptions) -> Self {
        RefinementDriver { options }
    }

    /// Runs the refinement loop starting from `seed`, against the
    /// uniform source axes `src_lon`/`src_lat`.
    pub fn run(&self, seed: Mesh, src_lon: &RegularCoord, src_lat: &RegularCoord) -> RefinementResult {
        let opts = &self.options;
        let mut meshes = vec![seed];
        let mut this = meshes.last().unwrap().clone();
        let mut converged = false;
        let mut nhits = 0i64;

        if opts.fixed_refine_level < 1 {
            let hits = this.source_hits(src_lon, src_lat, opts.use_center, opts.singularity_radius);
            nhits = hits.iter().filter(|&&v| v != 0.0).count() as i64;
            converged = converged || nhits as usize == hits.len();
        }
        let mut mb = mesh_megabytes(&this);
        let (dellon_s, dellat_s) = (src_lon.delta(), src_lat.delta());
        if opts.resolution_limit {
            let (del_lam, del_phi) = this.coarsest_resolution(&opts.mask_res);
            let dellon_t = del_lam.fold(f64::MIN, |a, &b| a.max(b));
            let dellat_t = del_phi.fold(f64::MIN, |a, &b| a.max(b));
            converged = converged || (dellon_t <= dellon_s && dellat_t <= dellat_s);
        }
        info!("refine_loop: seed rfl={} shape={:?} hits={} ({:.4} Mb)", this.rfl, this.shape(), nhits, mb);

        loop {
            let budget_allows = (!converged)
                && meshes.len() < opts.max_stages
                && 4.0 * mb < opts.max_mb
                && opts.fixed_refine_level < 1;
            let fixed_allows = (this.rfl as i64) < opts.fixed_refine_level;
            if !(budget_allows || fixed_allows) {
                break;
            }
            this = this.refine_by_2(opts.work_in_3d);
            if opts.fixed_refine_level < 1 {
                let hits = this.source_hits(src_lon, src_lat, opts.use_center, opts.singularity_radius);
                let new_hits = hits.iter().filter(|&&v| v != 0.0).count() as i64;
                converged = converged || new_hits as usize == hits.len() || new_hits == nhits;
                nhits = new_hits;
            }
            mb = mesh_megabytes(&this);
            if opts.resolution_limit {
                let (del_lam, del_phi) = this.coarsest_resolution(&opts.mask_res);
                let dellon_t = del_lam.fold(f64::MIN, |a, &b| a.max(b));
                let dellat_t = del_phi.fold(f64::MIN, |a, &b| a.max(b));
                converged = converged || (dellon_t <= dellon_s && dellat_t <= dellat_s);
            }
            info!("refine_loop: rfl={} shape={:?} hits={} ({:.4} Mb)", this.rfl, this.shape(), nhits, mb);
            meshes.push(this.clone());
        }

        let convergence_warning = if converged {
            None
        } else {
            let msg = "maximum number of allowed refinements reached without all source cells hit".to_string();
            warn!("{msg}");
            Some(msg)
        };

        RefinementResult {
            meshes,
            convergence_warning,
        }
    }
}

fn mesh_megabytes(mesh: &Mesh) -> f64 {
    let (nj, ni) = mesh.shape();
    2.0 * 8.0 * (nj as f64) * (ni as f64) / 1024.0 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_when_source_is_coarser_than_seed() {
        let seed = Mesh::global(4, 8, -180.0).unwrap();
        let src_lon = RegularCoord::new(8, -180.0, true);
        let src_lat = RegularCoord::new(4, -90.0, false);
        let driver = RefinementDriver::new(RefinementOptions::default());
        let result = driver.run(seed, &src_lon, &src_lat);
        assert!(result.convergence_warning.is_none());
        assert_eq!(result.meshes.len(), 1);
    }

    #[test]
    fn fixed_refine_level_ignores_hit_testing() {
        let seed = Mesh::global(2, 4, -180.0).unwrap();
        let src_lon = RegularCoord::new(512, -180.0, true);
        let src_lat = RegularCoord::new(256, -90.0, false);
        let opts = RefinementOptions {
            fixed_refine_level: 3,
            ..RefinementOptions::default()
        };
        let driver = RefinementDriver::new(opts);
        let result = driver.run(seed, &src_lon, &src_lat);
        assert_eq!(result.meshes.last().unwrap().rfl, 3);
    }

    #[test]
    fn stage_budget_produces_a_warning() {
        let seed = Mesh::global(2, 4, -180.0).unwrap();
        let src_lon = RegularCoord::new(100_000, -180.0, true);
        let src_lat = RegularCoord::new(50_000, -90.0, false);
        let opts = RefinementOptions {
            max_stages: 2,
            ..RefinementOptions::default()
        };
        let driver = RefinementDriver::new(opts);
        let result = driver.run(seed, &src_lon, &src_lat);
        assert!(result.convergence_warning.is_some());
        assert_eq!(result.meshes.len(), 2);
    }
}
