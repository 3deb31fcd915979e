//! Pathway connectivity diagnostics and stage 6 of the coarsening
//! pipeline: limiting how far a coarse cell's edges can be lifted
//! before it severs the deepest through-route the fine mesh actually
//! offered in that direction.
//!
//! Each coarse cell is built from a 2x2 block of fine cells, with eight
//! inner fine edges (N/S/E/W, each shared by two of the four fine
//! cells) and eight outer fine edges that continue past the coarse
//! cell's boundary (the `Nw*`/`Ne*`/`Sw*`/`Se*` directions). A pathway
//! diagnostic composes these into the deepest sill that must be crossed
//! to get from one side of the cell to another, threading through the
//! interior edges and/or around a corner, and folding in the outer
//! edges so the diagnostic reflects whether the route actually
//! continues into the neighboring coarse cells.
//!
//! Every diagnostic reduces to a *pathway* (four named routes, one per
//! pair of diagonal exits) and a single scalar -- the shallowest of
//! those four pairwise connections -- that stage 6 uses to keep a
//! coarse edge or corner from being lifted past the connectivity the
//! fine mesh as a whole still supports.

use super::sec::Direction::*;
use super::ThinWalls;
use ndarray::{Array2, Axis};

/// The four route depths threading a cell between its N/S/E/W exits:
/// southeast-to-northeast, southeast-to-northwest, southwest-to-northeast,
/// and southwest-to-northwest. Used for both the N-S diagnostic (as-is)
/// and the E-W diagnostic (computed on a transposed, u/v-swapped scratch
/// and transposed back).
#[derive(Clone, Debug, PartialEq)]
pub struct NsRoutes {
    pub se_to_ne: Array2<f64>,
    pub se_to_nw: Array2<f64>,
    pub sw_to_ne: Array2<f64>,
    pub sw_to_nw: Array2<f64>,
}

impl NsRoutes {
    fn transposed(&self) -> Self {
        NsRoutes {
            se_to_ne: self.se_to_ne.t().to_owned(),
            se_to_nw: self.se_to_nw.t().to_owned(),
            sw_to_ne: self.sw_to_ne.t().to_owned(),
            sw_to_nw: self.sw_to_nw.t().to_owned(),
        }
    }

    /// The overall deepest connection: the shallowest sill among all
    /// four corner-to-corner routes.
    #[must_use]
    pub fn deepest(&self) -> Array2<f64> {
        ndarray::Zip::from(&self.se_to_ne)
            .and(&self.se_to_nw)
            .and(&self.sw_to_ne)
            .and(&self.sw_to_nw)
            .map_collect(|&a, &b, &c, &d| a.min(b).min(c.min(d)))
    }
}

/// The four route depths cutting diagonally past a single corner:
/// south-to-south (the corner's own two exits), south-to-northwest,
/// southeast-to-south, and southeast-to-northwest. Computed directly
/// for SW; the SE/NW/NE diagnostics flip the mesh, reuse this, and flip
/// the results back.
#[derive(Clone, Debug, PartialEq)]
pub struct CornerRoutes {
    pub sw_to_sw: Array2<f64>,
    pub sw_to_nw: Array2<f64>,
    pub se_to_sw: Array2<f64>,
    pub se_to_nw: Array2<f64>,
}

impl CornerRoutes {
    fn flipped(&self, axes: &[usize]) -> Self {
        let mut out = self.clone();
        for &axis in axes {
            out.sw_to_sw.invert_axis(Axis(axis));
            out.sw_to_nw.invert_axis(Axis(axis));
            out.se_to_sw.invert_axis(Axis(axis));
            out.se_to_nw.invert_axis(Axis(axis));
        }
        out
    }

    #[must_use]
    pub fn deepest(&self) -> Array2<f64> {
        ndarray::Zip::from(&self.sw_to_sw)
            .and(&self.sw_to_nw)
            .and(&self.se_to_sw)
            .and(&self.se_to_nw)
            .map_collect(|&a, &b, &c, &d| a.min(b).min(c.min(d)))
    }
}

/// Diagnoses north-south through-connectivity of every coarse cell: the
/// deepest sill along each of the four corner-to-corner routes a
/// channel can take between the cell's S and N sides.
#[must_use]
pub fn diagnose_ns_pathways(tw: &ThinWalls) -> NsRoutes {
    let (cnj, cni) = tw.coarse_shape();
    let mut se_to_ne = Array2::zeros((cnj, cni));
    let mut se_to_nw = Array2::zeros((cnj, cni));
    let mut sw_to_ne = Array2::zeros((cnj, cni));
    let mut sw_to_nw = Array2::zeros((cnj, cni));
    for cj in 0..cnj {
        for ci in 0..cni {
            let n = tw.get_low(N, cj, ci);
            let s = tw.get_low(S, cj, ci);
            let e = tw.get_low(E, cj, ci);
            let w = tw.get_low(W, cj, ci);
            let ne_exit = tw.get_low(NeN, cj, ci);
            let nw_exit = tw.get_low(NwN, cj, ci);
            let se_exit = tw.get_low(SeS, cj, ci);
            let sw_exit = tw.get_low(SwS, cj, ci);

            // One-gate crossings through the cell's interior.
            let a = s.max(e);
            let b = w.max(n);
            let mut sw_ne = a.min(b);

            let a2 = s.max(w);
            let b2 = e.max(n);
            let mut se_nw = a2.min(b2);

            // Two-gate crossings that may detour via the other diagonal.
            let mut se_ne = e.min(se_nw.max(n));
            let mut sw_nw = w.min(sw_ne.max(n));

            // Fold in the far-side outer exits the route must still pass.
            se_ne = se_ne.max(ne_exit);
            se_nw = se_nw.max(nw_exit);
            sw_ne = sw_ne.max(ne_exit);
            sw_nw = sw_nw.max(nw_exit);

            // Fold in the near-side outer exits the route starts from.
            se_ne = se_exit.max(se_ne);
            se_nw = se_exit.max(se_nw);
            sw_ne = sw_exit.max(sw_ne);
            sw_nw = sw_exit.max(sw_nw);

            se_to_ne[[cj, ci]] = se_ne;
            se_to_nw[[cj, ci]] = se_nw;
            sw_to_ne[[cj, ci]] = sw_ne;
            sw_to_nw[[cj, ci]] = sw_nw;
        }
    }
    NsRoutes {
        se_to_ne,
        se_to_nw,
        sw_to_ne,
        sw_to_nw,
    }
}

/// The single deepest N-S connection at every coarse cell.
#[must_use]
pub fn diagnose_ns_pathway(tw: &ThinWalls) -> Array2<f64> {
    diagnose_ns_pathways(tw).deepest()
}

/// Diagnoses east-west through-connectivity, by transposing the mesh
/// (swapping the roles of u- and v-edges), reusing the N-S diagnostic,
/// and transposing the four resulting route grids back.
#[must_use]
pub fn diagnose_ew_pathways(tw: &ThinWalls) -> NsRoutes {
    let mut transposed = ThinWalls::new(tw.mesh.clone());
    transposed.c_effective = tw.c_effective.transposed();
    transposed.u_effective = tw.v_effective.transposed();
    transposed.v_effective = tw.u_effective.transposed();
    diagnose_ns_pathways(&transposed).transposed()
}

/// The single deepest E-W connection at every coarse cell.
#[must_use]
pub fn diagnose_ew_pathway(tw: &ThinWalls) -> Array2<f64> {
    diagnose_ew_pathways(tw).deepest()
}

/// Diagnoses the SW-corner cut-through connectivity of every coarse
/// cell: the deepest sill along each of the four routes a channel can
/// take past the SW corner, connecting its S and W exits.
#[must_use]
pub fn diagnose_sw_pathways(tw: &ThinWalls) -> CornerRoutes {
    let (cnj, cni) = tw.coarse_shape();
    let mut sw_to_sw = Array2::zeros((cnj, cni));
    let mut sw_to_nw = Array2::zeros((cnj, cni));
    let mut se_to_sw = Array2::zeros((cnj, cni));
    let mut se_to_nw = Array2::zeros((cnj, cni));
    for cj in 0..cnj {
        for ci in 0..cni {
            let n = tw.get_low(N, cj, ci);
            let s = tw.get_low(S, cj, ci);
            let e = tw.get_low(E, cj, ci);
            let w = tw.get_low(W, cj, ci);
            let w_n_exit = tw.get_low(NwW, cj, ci);
            let w_s_exit = tw.get_low(SwW, cj, ci);
            let s_e_exit = tw.get_low(SeS, cj, ci);
            let s_w_exit = tw.get_low(SwS, cj, ci);

            let se_to_nw_via_ne = e.max(n);
            let mut sw_nw = w.min(s.max(se_to_nw_via_ne));
            let se_to_nw_via_sw = s.max(w);
            let mut se_nw = se_to_nw_via_sw.min(se_to_nw_via_ne);
            let mut se_sw = s.min(se_to_nw_via_ne.max(w));

            let sw_sw = s_w_exit.max(w_s_exit);

            sw_nw = sw_nw.max(w_n_exit);
            sw_nw = sw_nw.max(s_w_exit);
            se_sw = se_sw.max(w_s_exit);
            se_sw = se_sw.max(s_e_exit);
            se_nw = se_nw.max(w_n_exit);
            se_nw = se_nw.max(s_e_exit);

            sw_to_sw[[cj, ci]] = sw_sw;
            sw_to_nw[[cj, ci]] = sw_nw;
            se_to_sw[[cj, ci]] = se_sw;
            se_to_nw[[cj, ci]] = se_nw;
        }
    }
    CornerRoutes {
        sw_to_sw,
        sw_to_nw,
        se_to_sw,
        se_to_nw,
    }
}

/// The single deepest SW-corner connection at every coarse cell.
#[must_use]
pub fn diagnose_sw_pathway(tw: &ThinWalls) -> Array2<f64> {
    diagnose_sw_pathways(tw).deepest()
}

/// Builds a scratch ThinWalls sharing `tw`'s mesh, with its effective
/// Stats flipped along the given axes (0 = j/rows, 1 = i/columns).
fn flipped_scratch(tw: &ThinWalls, axes: &[usize]) -> ThinWalls {
    let mut scratch = ThinWalls::new(tw.mesh.clone());
    scratch.c_effective = tw.c_effective.clone();
    scratch.u_effective = tw.u_effective.clone();
    scratch.v_effective = tw.v_effective.clone();
    for &axis in axes {
        scratch.c_effective.flip(axis);
        scratch.u_effective.flip(axis);
        scratch.v_effective.flip(axis);
    }
    scratch
}

/// Diagnoses the SE/NW/NE corner cut-throughs by flipping the mesh,
/// reusing the SW diagnostic, and flipping the resulting routes back to
/// the original orientation: `SE` is `SW` with `i` reversed, `NW` is
/// `SW` with `j` reversed, `NE` is both.
#[must_use]
pub fn diagnose_se_pathways(tw: &ThinWalls) -> CornerRoutes {
    diagnose_sw_pathways(&flipped_scratch(tw, &[1])).flipped(&[1])
}

#[must_use]
pub fn diagnose_se_pathway(tw: &ThinWalls) -> Array2<f64> {
    diagnose_se_pathways(tw).deepest()
}

#[must_use]
pub fn diagnose_nw_pathways(tw: &ThinWalls) -> CornerRoutes {
    diagnose_sw_pathways(&flipped_scratch(tw, &[0])).flipped(&[0])
}

#[must_use]
pub fn diagnose_nw_pathway(tw: &ThinWalls) -> Array2<f64> {
    diagnose_nw_pathways(tw).deepest()
}

#[must_use]
pub fn diagnose_ne_pathways(tw: &ThinWalls) -> CornerRoutes {
    diagnose_sw_pathways(&flipped_scratch(tw, &[0, 1])).flipped(&[0, 1])
}

#[must_use]
pub fn diagnose_ne_pathway(tw: &ThinWalls) -> Array2<f64> {
    diagnose_ne_pathways(tw).deepest()
}

/// Stage 6: limits how far the N/S and E/W edges of every coarse cell
/// can have been lifted by the earlier stages, raising back down --
/// only the shallower of each opposing pair, and only its `low` -- to
/// the N-S or E-W pathway connectivity the fine mesh must still carry.
/// Ties raise both sides of the pair.
pub fn limit_ns_ew_connections(tw: &mut ThinWalls) {
    let ns_deepest = diagnose_ns_pathway(tw);
    let ew_deepest = diagnose_ew_pathway(tw);
    let (cnj, cni) = tw.coarse_shape();
    for cj in 0..cnj {
        for ci in 0..cni {
            let n_exit = tw.get_low(NwN, cj, ci).min(tw.get_low(NeN, cj, ci));
            let s_exit = tw.get_low(SwS, cj, ci).min(tw.get_low(SeS, cj, ci));
            let e_exit = tw.get_low(NeE, cj, ci).min(tw.get_low(SeE, cj, ci));
            let w_exit = tw.get_low(NwW, cj, ci).min(tw.get_low(SwW, cj, ci));

            let target = ns_deepest[[cj, ci]];
            if target > n_exit.max(s_exit) {
                if s_exit >= n_exit {
                    raise_low(tw, SwS, cj, ci, target);
                    raise_low(tw, SeS, cj, ci, target);
                }
                if s_exit <= n_exit {
                    raise_low(tw, NwN, cj, ci, target);
                    raise_low(tw, NeN, cj, ci, target);
                }
            }

            let target = ew_deepest[[cj, ci]];
            if target > e_exit.max(w_exit) {
                if w_exit >= e_exit {
                    raise_low(tw, SwW, cj, ci, target);
                    raise_low(tw, NwW, cj, ci, target);
                }
                if w_exit <= e_exit {
                    raise_low(tw, SeE, cj, ci, target);
                    raise_low(tw, NeE, cj, ci, target);
                }
            }
        }
    }
}

/// Stage 6 (corner half): limits how far each diagonal corner
/// cut-through can have been severed, raising back down -- only the
/// shallower of its two flanking outer exits, and only their `low` --
/// to the diagonal connectivity the fine mesh must still carry.
pub fn limit_corner_connections(tw: &mut ThinWalls) {
    let sw_deepest = diagnose_sw_pathway(tw);
    let se_deepest = diagnose_se_pathway(tw);
    let ne_deepest = diagnose_ne_pathway(tw);
    let nw_deepest = diagnose_nw_pathway(tw);
    let (cnj, cni) = tw.coarse_shape();
    for cj in 0..cnj {
        for ci in 0..cni {
            let n_exit = tw.get_low(NwN, cj, ci).min(tw.get_low(NeN, cj, ci));
            let s_exit = tw.get_low(SwS, cj, ci).min(tw.get_low(SeS, cj, ci));
            let e_exit = tw.get_low(NeE, cj, ci).min(tw.get_low(SeE, cj, ci));
            let w_exit = tw.get_low(NwW, cj, ci).min(tw.get_low(SwW, cj, ci));

            let target = sw_deepest[[cj, ci]];
            if target > s_exit.max(w_exit) {
                if s_exit >= w_exit {
                    raise_low(tw, SwS, cj, ci, target);
                    raise_low(tw, SeS, cj, ci, target);
                }
                if s_exit <= w_exit {
                    raise_low(tw, SwW, cj, ci, target);
                    raise_low(tw, NwW, cj, ci, target);
                }
            }

            let target = se_deepest[[cj, ci]];
            if target > s_exit.max(e_exit) {
                if s_exit >= e_exit {
                    raise_low(tw, SwS, cj, ci, target);
                    raise_low(tw, SeS, cj, ci, target);
                }
                if s_exit <= e_exit {
                    raise_low(tw, SeE, cj, ci, target);
                    raise_low(tw, NeE, cj, ci, target);
                }
            }

            let target = ne_deepest[[cj, ci]];
            if target > n_exit.max(e_exit) {
                if n_exit >= e_exit {
                    raise_low(tw, NwN, cj, ci, target);
                    raise_low(tw, NeN, cj, ci, target);
                }
                if n_exit <= e_exit {
                    raise_low(tw, SeE, cj, ci, target);
                    raise_low(tw, NeE, cj, ci, target);
                }
            }

            let target = nw_deepest[[cj, ci]];
            if target > n_exit.max(w_exit) {
                if n_exit >= w_exit {
                    raise_low(tw, NwN, cj, ci, target);
                    raise_low(tw, NeN, cj, ci, target);
                }
                if n_exit <= w_exit {
                    raise_low(tw, SwW, cj, ci, target);
                    raise_low(tw, NwW, cj, ci, target);
                }
            }
        }
    }
}

fn raise_low(tw: &mut ThinWalls, dir: super::sec::Direction, cj: usize, ci: usize, floor: f64) {
    let cur = tw.get_low(dir, cj, ci);
    tw.set_low(dir, cj, ci, cur.max(floor));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    fn seed() -> ThinWalls {
        let mesh = Mesh::global(4, 4, -180.0).unwrap();
        let mut tw = ThinWalls::new(mesh);
        tw.set_cell_mean(ndarray::Array2::zeros((4, 4))).unwrap();
        tw.set_edge_to_step();
        tw.init_effective_values();
        tw
    }

    #[test]
    fn ns_pathway_connectivity_is_flat_on_flat_field() {
        let tw = seed();
        let deepest = diagnose_ns_pathway(&tw);
        for &v in deepest.iter() {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn ew_pathway_matches_ns_pathway_shape_on_square_field() {
        let tw = seed();
        let ns = diagnose_ns_pathway(&tw);
        let ew = diagnose_ew_pathway(&tw);
        assert_eq!(ns.dim(), ew.dim());
    }

    #[test]
    fn sw_pathway_connectivity_is_flat_on_flat_field() {
        let tw = seed();
        let deepest = diagnose_sw_pathway(&tw);
        for &v in deepest.iter() {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn limit_ns_ew_connections_never_lowers_edges() {
        let mut tw = seed();
        let before_u = tw.u_effective.low.clone();
        let before_v = tw.v_effective.low.clone();
        limit_ns_ew_connections(&mut tw);
        for (b, a) in before_u.iter().zip(tw.u_effective.low.iter()) {
            assert!(a >= b);
        }
        for (b, a) in before_v.iter().zip(tw.v_effective.low.iter()) {
            assert!(a >= b);
        }
    }

    #[test]
    fn limit_corner_connections_never_lowers_edges() {
        let mut tw = seed();
        let before_u = tw.u_effective.low.clone();
        let before_v = tw.v_effective.low.clone();
        limit_corner_connections(&mut tw);
        for (b, a) in before_u.iter().zip(tw.u_effective.low.iter()) {
            assert!(a >= b);
        }
        for (b, a) in before_v.iter().zip(tw.v_effective.low.iter()) {
            assert!(a >= b);
        }
    }

    #[test]
    fn limit_ns_ew_connections_is_idempotent_on_flat_field() {
        let mut tw = seed();
        limit_ns_ew_connections(&mut tw);
        let after_once_u = tw.u_effective.low.clone();
        let after_once_v = tw.v_effective.low.clone();
        limit_ns_ew_connections(&mut tw);
        assert_eq!(tw.u_effective.low, after_once_u);
        assert_eq!(tw.v_effective.low, after_once_v);
    }
}
