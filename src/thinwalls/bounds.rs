//! Stage 5 of the coarsening pipeline: bound cell-center statistics by
//! their surrounding edges so a coarse cell can never appear deeper (or
//! shallower) than the connectivity its edges actually carry.

use super::ThinWalls;

/// Bounds each cell's `low`/`ave` above by the lowest of its four
/// surrounding edges, and each edge's own `ave`/`hgh` below by its own
/// `low`/`ave`. Processes metrics in order low -> ave -> hgh, raising
/// each edge metric to its predecessor before using it to bound the
/// cell center, matching the reference pipeline's own sequencing.
/// Deliberately leaves `C.hgh` unbounded: the reference pipeline never
/// clips the cell-center maximum against its edges.
pub fn bound_h_by_uv(tw: &mut ThinWalls) {
    let (nj, ni) = tw.c_effective.shape();

    let mut c_low = tw.c_effective.low.clone();
    {
        let u = &tw.u_effective;
        let v = &tw.v_effective;
        for j in 0..nj {
            for i in 0..ni {
                let edge_low = u.low[[j, i]].min(u.low[[j, i + 1]]).min(v.low[[j, i]]).min(v.low[[j + 1, i]]);
                c_low[[j, i]] = c_low[[j, i]].min(edge_low);
            }
        }
    }
    tw.c_effective.low = c_low;

    raise_edge_metric(&mut tw.u_effective.ave, &tw.u_effective.low.clone());
    raise_edge_metric(&mut tw.v_effective.ave, &tw.v_effective.low.clone());

    let mut c_ave = tw.c_effective.ave.clone();
    {
        let u = &tw.u_effective;
        let v = &tw.v_effective;
        for j in 0..nj {
            for i in 0..ni {
                let edge_ave = u.ave[[j, i]].min(u.ave[[j, i + 1]]).min(v.ave[[j, i]]).min(v.ave[[j + 1, i]]);
                c_ave[[j, i]] = c_ave[[j, i]].min(edge_ave);
            }
        }
    }
    tw.c_effective.ave = c_ave;

    raise_edge_metric(&mut tw.u_effective.hgh, &tw.u_effective.ave.clone());
    raise_edge_metric(&mut tw.v_effective.hgh, &tw.v_effective.ave.clone());
}

/// Raises `dst` elementwise to at least `floor`.
fn raise_edge_metric(dst: &mut ndarray::Array2<f64>, floor: &ndarray::Array2<f64>) {
    dst.zip_mut_with(floor, |d, &f| *d = d.max(f));
}

/// Raises each cell's `low`/`ave` below by the highest of its four
/// surrounding edges, filling in potential holes left by coarsening
/// that would otherwise connect through a cell deeper than its edges.
pub fn fill_pot_holes(tw: &mut ThinWalls) {
    let (nj, ni) = tw.c_effective.shape();
    let u = &tw.u_effective;
    let v = &tw.v_effective;
    let mut c_low = tw.c_effective.low.clone();
    let mut c_ave = tw.c_effective.ave.clone();
    for j in 0..nj {
        for i in 0..ni {
            let edge_low = u.low[[j, i]].max(u.low[[j, i + 1]]).max(v.low[[j, i]]).max(v.low[[j + 1, i]]);
            let edge_ave = u.ave[[j, i]].max(u.ave[[j, i + 1]]).max(v.ave[[j, i]]).max(v.ave[[j + 1, i]]);
            c_low[[j, i]] = c_low[[j, i]].max(edge_low);
            c_ave[[j, i]] = c_ave[[j, i]].max(edge_ave);
        }
    }
    tw.c_effective.low = c_low;
    tw.c_effective.ave = c_ave;
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
    fn bound_h_by_uv_is_idempotent_on_flat_field() {
        let mut tw = seed();
        bound_h_by_uv(&mut tw);
        let after_once = tw.c_effective.clone();
        bound_h_by_uv(&mut tw);
        assert_eq!(tw.c_effective, after_once);
    }

    #[test]
    fn bound_h_by_uv_never_raises_cell_low() {
        let mut tw = seed();
        let before = tw.c_effective.low.clone();
        bound_h_by_uv(&mut tw);
        for (b, a) in before.iter().zip(tw.c_effective.low.iter()) {
            assert!(a <= b);
        }
    }

    #[test]
    fn fill_pot_holes_never_lowers_cell_low() {
        let mut tw = seed();
        let before = tw.c_effective.low.clone();
        fill_pot_holes(&mut tw);
        for (b, a) in before.iter().zip(tw.c_effective.low.iter()) {
            assert!(a >= b);
        }
    }

    #[test]
    fn fill_pot_holes_is_idempotent_on_flat_field() {
        let mut tw = seed();
        fill_pot_holes(&mut tw);
        let after_once = tw.c_effective.clone();
        fill_pot_holes(&mut tw);
        assert_eq!(tw.c_effective, after_once);
    }
}
