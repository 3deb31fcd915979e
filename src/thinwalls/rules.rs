//! Stages 1-4 of the coarsening pipeline: push out high corners, lower
//! the tallest interior buttress, fold out central ridges, and invert
//! the deepest exterior corner. Each stage iterates coarse cells,
//! computing a predicate and its replacement values from an immutable
//! read of the current effective Stats, then writing the results back —
//! never reading and writing the same location in one pass.

use super::sec::Direction::{self, *};
use super::{PipelineOptions, ThinWalls};

#[derive(Clone, Copy)]
struct CornerSpec {
    /// The cardinal edge on this corner's own j-side (N or S).
    r0: Direction,
    /// The cardinal edge on this corner's own i-side (E or W).
    r1: Direction,
    /// This corner's own cell center.
    c: Direction,
    /// The further-out edge continuing `r0`'s side past this corner.
    e0: Direction,
    /// The further-out edge continuing `r1`'s side past this corner.
    e1: Direction,
    /// The three other cell centers of the coarse cell, used to average
    /// an opposing mean when adjusting centers.
    other_centers: [Direction; 3],
}

const SW: CornerSpec = CornerSpec {
    r0: S,
    r1: W,
    c: SW_,
    e0: SwS,
    e1: SwW,
    other_centers: [NW_, SE_, NE_],
};
const SE: CornerSpec = CornerSpec {
    r0: S,
    r1: E,
    c: SE_,
    e0: SeS,
    e1: SeE,
    other_centers: [NW_, SW_, NE_],
};
const NW: CornerSpec = CornerSpec {
    r0: N,
    r1: W,
    c: NW_,
    e0: NwN,
    e1: NwW,
    other_centers: [SE_, SW_, NE_],
};
const NE: CornerSpec = CornerSpec {
    r0: N,
    r1: E,
    c: NE_,
    e0: NeN,
    e1: NeE,
    other_centers: [NW_, SW_, SE_],
};

/// The corner `CornerSpec` consts above reuse the names `SW`/`SE`/`NW`/`NE`,
/// shadowing the glob-imported `Direction` variants of the same name; these
/// aliases are how the rest of this module still reaches the variants.
use super::sec::Direction::{NE as NE_, NW as NW_, SE as SE_, SW as SW_};

/// Pushes out the highest corner of each coarse cell, in all four
/// corners, eliminating the minor cross-corner connection it would
/// otherwise preserve.
pub fn push_corners(tw: &mut ThinWalls, opts: &PipelineOptions) {
    for spec in [SW, SE, NW, NE] {
        push_corner(tw, spec, opts);
    }
}

fn push_corner(tw: &mut ThinWalls, spec: CornerSpec, opts: &PipelineOptions) {
    let (cnj, cni) = tw.coarse_shape();
    let b0 = spec.r0.opposite();
    let b1 = spec.r1.opposite();

    let mut hits = Vec::new();
    for cj in 0..cnj {
        for ci in 0..cni {
            let (r0l, r0a, r0h) = tw.get(spec.r0, cj, ci);
            let (r1l, r1a, r1h) = tw.get(spec.r1, cj, ci);
            let inner_low = r0l.min(r1l);
            let inner_ave = 0.5 * (r0a + r1a);
            let inner_hgh = r0h.max(r1h);
            let opp_ridge = tw.get_low(b0, cj, ci).max(tw.get_low(b1, cj, ci));
            if inner_low > opp_ridge {
                let opp_mean = (tw.get(spec.other_centers[0], cj, ci).1
                    + tw.get(spec.other_centers[1], cj, ci).1
                    + tw.get(spec.other_centers[2], cj, ci).1)
                    / 3.0;
                hits.push((cj, ci, opp_ridge, inner_low, inner_ave, inner_hgh, opp_mean));
            }
        }
    }

    for &(cj, ci, opp_ridge, inner_low, inner_ave, inner_hgh, opp_mean) in &hits {
        tw.set_low(spec.r0, cj, ci, opp_ridge);
        tw.set_low(spec.r1, cj, ci, opp_ridge);

        if opts.adjust_centers {
            tw.set_low(spec.c, cj, ci, opp_ridge);
            if opts.matlab {
                tw.set_ave(spec.c, cj, ci, opp_mean);
                tw.set_hgh(spec.c, cj, ci, opp_ridge);
            } else {
                let (_, cave, chgh) = tw.get(spec.c, cj, ci);
                tw.set_ave(spec.c, cj, ci, cave.max(opp_mean));
                tw.set_hgh(spec.c, cj, ci, chgh.max(opp_ridge));
            }
        }
        let update_interior_mean_max = !opts.matlab;
        if update_interior_mean_max {
            tw.set_ave(spec.r0, cj, ci, opp_ridge);
            tw.set_ave(spec.r1, cj, ci, opp_ridge);
            tw.set_hgh(spec.r0, cj, ci, opp_ridge);
            tw.set_hgh(spec.r1, cj, ci, opp_ridge);
        }

        // Fold the corner's own (pre-override) inner values out onto the
        // two edges one cell further out, so the connection the corner
        // used to carry is preserved on the cell's true boundary.
        tw.raise(spec.e0, cj, ci, inner_low, inner_ave, inner_hgh);
        tw.raise(spec.e1, cj, ci, inner_low, inner_ave, inner_hgh);
    }
}

/// Lowers the tallest interior edge of each coarse cell down to the
/// second-tallest of its three neighbors, in all four directions.
pub fn lower_buttress(tw: &mut ThinWalls, opts: &PipelineOptions) {
    for &dir in &[S, N, W, E] {
        lower_one(tw, dir, opts);
    }
}

fn lower_one(tw: &mut ThinWalls, dir: Direction, opts: &PipelineOptions) {
    let (others, opp): (_, Direction) = match dir {
        S | N => ([W, E], dir.opposite()),
        W | E => ([S, N], dir.opposite()),
        _ => unreachable!(),
    };
    let (cnj, cni) = tw.coarse_shape();
    let mut hits = Vec::new();
    for cj in 0..cnj {
        for ci in 0..cni {
            let r_low = tw.get_low(dir, cj, ci);
            let oppo3 = tw.get_low(others[0], cj, ci).max(tw.get_low(others[1], cj, ci)).max(tw.get_low(opp, cj, ci));
            if r_low > oppo3 {
                let ave = if opts.adjust_mean {
                    Some(
                        tw.get(others[0], cj, ci)
                            .1
                            .max(tw.get(others[1], cj, ci).1)
                            .max(tw.get(opp, cj, ci).1),
                    )
                } else {
                    None
                };
                hits.push((cj, ci, oppo3, ave));
            }
        }
    }
    for (cj, ci, oppo3, ave) in hits {
        tw.set_low(dir, cj, ci, oppo3);
        if let Some(a) = ave {
            tw.set_ave(dir, cj, ci, a);
        }
    }
}

struct RidgeSpec {
    /// The two inner edges parallel to, and defining, the ridge.
    r0: Direction,
    r1: Direction,
    /// The buttress on the target side and the opposing side.
    target: Direction,
    opposite: Direction,
    /// Cell centers on the target and opposing sides.
    ca0: Direction,
    ca1: Direction,
    cb0: Direction,
    cb1: Direction,
    /// Outer edges parallel to the ridge, on the target and opposing sides.
    ea0: Direction,
    ea1: Direction,
    eb0: Direction,
    eb1: Direction,
    /// The two further-out edges folded up to the ridge's height.
    fold: [Direction; 4],
}

fn ridge_spec(dir: Direction) -> RidgeSpec {
    match dir {
        S => RidgeSpec {
            r0: W,
            r1: E,
            target: S,
            opposite: N,
            ca0: SW_,
            ca1: SE_,
            cb0: NW_,
            cb1: NE_,
            ea0: SwW,
            ea1: SeE,
            eb0: NwW,
            eb1: NeE,
            fold: [SwW, SeE, SwS, SeS],
        },
        N => RidgeSpec {
            r0: W,
            r1: E,
            target: N,
            opposite: S,
            ca0: NW_,
            ca1: NE_,
            cb0: SW_,
            cb1: SE_,
            ea0: NwW,
            ea1: NeE,
            eb0: SwW,
            eb1: SeE,
            fold: [NwN, NeN, NwW, NeE],
        },
        W => RidgeSpec {
            r0: N,
            r1: S,
            target: W,
            opposite: E,
            ca0: NW_,
            ca1: SW_,
            cb0: NE_,
            cb1: SE_,
            ea0: NwN,
            ea1: SwS,
            eb0: NeN,
            eb1: SeS,
            fold: [NwN, SwS, NwW, SwW],
        },
        E => RidgeSpec {
            r0: N,
            r1: S,
            target: E,
            opposite: W,
            ca0: NE_,
            ca1: SE_,
            cb0: NW_,
            cb1: SW_,
            ea0: NeN,
            ea1: SeS,
            eb0: NwN,
            eb1: SwS,
            fold: [NeN, SeS, NeE, SeE],
        },
        _ => unreachable!("ridge_spec is only defined for N/S/E/W"),
    }
}

/// Folds out the tallest interior ridge of each coarse cell to its
/// boundary, in all four orientations, plus the tie-breaking "equal"
/// S/W variants that also raise the opposing buttress.
pub fn fold_ridges(tw: &mut ThinWalls, opts: &PipelineOptions) {
    for &dir in &[S, N, W, E] {
        fold_one(tw, dir, false, opts);
    }
    fold_one(tw, S, true, opts);
    fold_one(tw, W, true, opts);
}

fn fold_one(tw: &mut ThinWalls, dir: Direction, equal: bool, opts: &PipelineOptions) {
    let spec = ridge_spec(dir);
    let (cnj, cni) = tw.coarse_shape();
    let mut hits = Vec::new();
    for cj in 0..cnj {
        for ci in 0..cni {
            let (r0l, r0a, r0h) = tw.get(spec.r0, cj, ci);
            let (r1l, r1a, r1h) = tw.get(spec.r1, cj, ci);
            let central_low = r0l.min(r1l);
            let central_ave = 0.5 * (r0a + r1a);
            let central_hgh = r0h.max(r1h);
            let bal = tw.get_low(spec.target, cj, ci);
            let bbl = tw.get_low(spec.opposite, cj, ci);
            let low_min = bal.min(bbl);
            let low_max = bal.max(bbl);
            let is_ridge = central_low > low_min && central_low >= low_max;
            if !is_ridge {
                continue;
            }
            let predicate = if equal {
                let ca = tw.get_low(spec.ca0, cj, ci) + tw.get_low(spec.ca1, cj, ci);
                let cb = tw.get_low(spec.cb0, cj, ci) + tw.get_low(spec.cb1, cj, ci);
                let ea = tw.get_low(spec.ea0, cj, ci) + tw.get_low(spec.ea1, cj, ci);
                let eb = tw.get_low(spec.eb0, cj, ci) + tw.get_low(spec.eb1, cj, ci);
                bal == bbl && ca == cb && ea == eb
            } else {
                let high_buttress = bal > bbl;
                let ca = tw.get_low(spec.ca0, cj, ci) + tw.get_low(spec.ca1, cj, ci);
                let cb = tw.get_low(spec.cb0, cj, ci) + tw.get_low(spec.cb1, cj, ci);
                let high_cell = bal == bbl && ca > cb;
                let ea = tw.get_low(spec.ea0, cj, ci) + tw.get_low(spec.ea1, cj, ci);
                let eb = tw.get_low(spec.eb0, cj, ci) + tw.get_low(spec.eb1, cj, ci);
                let high_edge = bal == bbl && ca == cb && ea > eb;
                high_buttress || high_cell || high_edge
            };
            if predicate {
                hits.push((cj, ci, low_min, central_ave, central_hgh));
            }
        }
    }

    for &(cj, ci, low_min, central_ave, central_hgh) in &hits {
        tw.set_low(spec.r0, cj, ci, low_min);
        tw.set_low(spec.r1, cj, ci, low_min);
        tw.set_low(spec.target, cj, ci, low_min);
        if equal {
            tw.set_low(spec.opposite, cj, ci, low_min);
        }
        if opts.adjust_centers {
            let cb_ave = 0.5 * (tw.get(spec.cb0, cj, ci).1 + tw.get(spec.cb1, cj, ci).1);
            tw.set(spec.ca0, cj, ci, low_min, cb_ave, low_min);
            tw.set(spec.ca1, cj, ci, low_min, cb_ave, low_min);
            if equal {
                tw.set(spec.cb0, cj, ci, low_min, cb_ave, low_min);
                tw.set(spec.cb1, cj, ci, low_min, cb_ave, low_min);
            }
        }
        for &fold_dir in &spec.fold {
            tw.raise(fold_dir, cj, ci, low_min, central_ave, central_hgh);
        }
    }
}

/// The data needed to apply an exterior-corner inversion once a corner
/// has been found to be the deepest: the ridge values of the two corners
/// that share an edge with it, the two outer edges adjacent to each of
/// those, and the two outer edges adjacent to the diagonally opposite
/// corner (which get folded the minimum of the two adjacent ridges).
struct InvertSpec {
    r_a1: Direction,
    a1_outer: [Direction; 2],
    r_a2: Direction,
    a2_outer: [Direction; 2],
    opp_outer: [Direction; 2],
}

fn invert_spec(corner: Direction) -> InvertSpec {
    match corner {
        SW_ => InvertSpec {
            r_a1: SE_,
            a1_outer: [SeS, SeE],
            r_a2: NW_,
            a2_outer: [NwN, NwW],
            opp_outer: [NeE, NeN],
        },
        SE_ => InvertSpec {
            r_a1: SW_,
            a1_outer: [SwS, SwW],
            r_a2: NE_,
            a2_outer: [NeN, NeE],
            opp_outer: [NwW, NwN],
        },
        NW_ => InvertSpec {
            r_a1: NE_,
            a1_outer: [NeN, NeE],
            r_a2: SW_,
            a2_outer: [SwS, SwW],
            opp_outer: [SeE, SeS],
        },
        NE_ => InvertSpec {
            r_a1: NW_,
            a1_outer: [NwN, NwW],
            r_a2: SE_,
            a2_outer: [SeS, SeE],
            opp_outer: [SwW, SwS],
        },
        _ => unreachable!("invert_spec is only defined for SW/SE/NW/NE"),
    }
}

/// Stage 4: the deepest exterior corner of each coarse cell is expanded
/// to fill the cell, when it is strictly deeper than the three other
/// corners and than the cell's interior sill. "Deep" is judged by the
/// corner's two *outer* edges (the ones one cell further out); the
/// interior sill and the ridge folded onto the far side are judged by
/// the cell's two *inner* edges.
pub fn invert_exterior_corners(tw: &mut ThinWalls, opts: &PipelineOptions) {
    let (cnj, cni) = tw.coarse_shape();
    let mut hits: Vec<(Direction, usize, usize, f64)> = Vec::new();
    for cj in 0..cnj {
        for ci in 0..cni {
            let n = tw.get_low(N, cj, ci);
            let s = tw.get_low(S, cj, ci);
            let e = tw.get_low(E, cj, ci);
            let w = tw.get_low(W, cj, ci);

            let d_sw = tw.get_low(SwW, cj, ci).max(tw.get_low(SwS, cj, ci));
            let d_se = tw.get_low(SeE, cj, ci).max(tw.get_low(SeS, cj, ci));
            let d_nw = tw.get_low(NwW, cj, ci).max(tw.get_low(NwN, cj, ci));
            let d_ne = tw.get_low(NeE, cj, ci).max(tw.get_low(NeN, cj, ci));

            let s_sw = s.min(w);
            let s_se = s.min(e);
            let s_nw = n.min(w);
            let s_ne = n.min(e);

            if d_sw < d_ne.min(d_nw).min(d_se) && d_sw < s_sw {
                hits.push((SW_, cj, ci, d_sw));
            }
            if d_se < d_nw.min(d_ne).min(d_sw) && d_se < s_se {
                hits.push((SE_, cj, ci, d_se));
            }
            if d_ne < d_sw.min(d_se).min(d_nw) && d_ne < s_ne {
                hits.push((NE_, cj, ci, d_ne));
            }
            if d_nw < d_se.min(d_sw).min(d_ne) && d_nw < s_nw {
                hits.push((NW_, cj, ci, d_nw));
            }
        }
    }

    for (corner, cj, ci, depth) in hits {
        apply_invert(tw, corner, cj, ci, depth, opts);
    }
}

fn apply_invert(tw: &mut ThinWalls, corner: Direction, cj: usize, ci: usize, depth: f64, opts: &PipelineOptions) {
    // The ridge each flanking corner projects into the cell is read from
    // the inner N/S/E/W edges before the deepen step below can touch them.
    let n = tw.get_low(N, cj, ci);
    let s = tw.get_low(S, cj, ci);
    let e = tw.get_low(E, cj, ci);
    let w = tw.get_low(W, cj, ci);
    let ridge = |dir: Direction| -> f64 {
        match dir {
            SW_ => s.max(w),
            SE_ => s.max(e),
            NW_ => n.max(w),
            NE_ => n.max(e),
            _ => unreachable!("ridge is only defined for the four cell-center corners"),
        }
    };

    // The two inner edges and all four cell centers are deepened (legacy
    // "matlab" path sets them outright; the corrected path only deepens,
    // via a minimum, and also touches the cell centers the legacy path skips).
    for dir in [N, S, E, W] {
        if opts.matlab {
            tw.set_low(dir, cj, ci, depth);
        } else {
            let cur = tw.get_low(dir, cj, ci);
            tw.set_low(dir, cj, ci, cur.min(depth));
        }
    }
    if !opts.matlab {
        for c in [NW_, NE_, SW_, SE_] {
            let cur = tw.get_low(c, cj, ci);
            tw.set_low(c, cj, ci, cur.min(depth));
        }
    }

    let spec = invert_spec(corner);
    let r_a1 = ridge(spec.r_a1);
    let r_a2 = ridge(spec.r_a2);
    let new_ridge_low = r_a1.min(r_a2);

    if opts.matlab {
        let new_ridge_ave = 0.5 * (r_a1 + r_a2);
        let new_ridge_hgh = r_a1.max(r_a2);
        for dir in spec.a1_outer.into_iter().chain(spec.a2_outer).chain(spec.opp_outer) {
            tw.raise(dir, cj, ci, new_ridge_low, new_ridge_ave, new_ridge_hgh);
        }
    } else {
        for dir in spec.a1_outer {
            let cur = tw.get_low(dir, cj, ci);
            tw.set_low(dir, cj, ci, cur.max(r_a1));
        }
        for dir in spec.a2_outer {
            let cur = tw.get_low(dir, cj, ci);
            tw.set_low(dir, cj, ci, cur.max(r_a2));
        }
        for dir in spec.opp_outer {
            let cur = tw.get_low(dir, cj, ci);
            tw.set_low(dir, cj, ci, cur.max(new_ridge_low));
        }
    }
}
