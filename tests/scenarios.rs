//! Scenario tests: each corresponds to one of the concrete coarsening
//! scenarios the core must handle correctly.

use ndarray::Array2;
use topomesh::coord::RegularCoord;
use topomesh::mesh::Mesh;
use topomesh::refine::{RefinementDriver, RefinementOptions};
use topomesh::stats::Stats;
use topomesh::thinwalls::sec::Direction;
use topomesh::thinwalls::{rules, PipelineOptions, ThinWalls, DEFAULT_PIPELINE};

fn mesh_with_rfl(nj: usize, ni: usize, rfl: usize) -> Mesh {
    let lon1d: Vec<f64> = (0..=ni).map(|i| -180.0 + 360.0 * i as f64 / ni as f64).collect();
    let lat1d: Vec<f64> = (0..=nj).map(|j| -90.0 + 180.0 * j as f64 / nj as f64).collect();
    let mut lon = Array2::zeros((nj + 1, ni + 1));
    let mut lat = Array2::zeros((nj + 1, ni + 1));
    for j in 0..=nj {
        for i in 0..=ni {
            lon[[j, i]] = lon1d[i];
            lat[[j, i]] = lat1d[j];
        }
    }
    Mesh::from_nodes(lon, lat, None, rfl).unwrap()
}

/// Scenario 1: uniform flat bathymetry is a fixed point of the whole
/// pipeline, and survives a coarsen step unchanged.
#[test]
fn uniform_flat_bathymetry_is_unchanged_by_coarsening() -> anyhow::Result<()> {
    let mut tw = ThinWalls::new(mesh_with_rfl(2, 2, 1));
    tw.c_effective = Stats::from_constant(Array2::from_elem((2, 2), -100.0));
    tw.u_effective = Stats::from_constant(Array2::from_elem((2, 3), -50.0));
    tw.v_effective = Stats::from_constant(Array2::from_elem((3, 2), -50.0));
    tw.c_simple = tw.c_effective.clone();
    tw.u_simple = tw.u_effective.clone();
    tw.v_simple = tw.v_effective.clone();

    let before = (tw.c_effective.clone(), tw.u_effective.clone(), tw.v_effective.clone());
    tw.run_pipeline(&DEFAULT_PIPELINE, &PipelineOptions::default());
    assert_eq!(tw.c_effective, before.0);
    assert_eq!(tw.u_effective, before.1);
    assert_eq!(tw.v_effective, before.2);

    let coarse = tw.coarsen()?;
    assert!(coarse.c_effective.low.iter().all(|&v| v == -100.0));
    assert!(coarse.u_effective.low.iter().all(|&v| v == -50.0));
    assert!(coarse.v_effective.low.iter().all(|&v| v == -50.0));
    Ok(())
}

/// Scenario 2: an isolated tall SW corner is pushed out to the ridge
/// opposite it, and the outer edges beyond it absorb the connection.
#[test]
fn isolated_tall_corner_is_pushed_out() {
    let mut tw = ThinWalls::new(mesh_with_rfl(4, 4, 1));
    tw.c_effective = Stats::from_constant(Array2::from_elem((4, 4), -100.0));
    tw.u_effective = Stats::from_constant(Array2::from_elem((4, 5), -100.0));
    tw.v_effective = Stats::from_constant(Array2::from_elem((5, 4), -100.0));

    tw.c_effective.low[[0, 0]] = 10.0;
    tw.c_effective.ave[[0, 0]] = 10.0;
    tw.c_effective.hgh[[0, 0]] = 10.0;
    for &(j, i) in &[(0usize, 0usize), (0, 1)] {
        tw.u_effective.low[[j, i]] = 5.0;
        tw.u_effective.ave[[j, i]] = 5.0;
        tw.u_effective.hgh[[j, i]] = 5.0;
    }
    for &(j, i) in &[(0usize, 0usize), (1, 0)] {
        tw.v_effective.low[[j, i]] = 5.0;
        tw.v_effective.ave[[j, i]] = 5.0;
        tw.v_effective.hgh[[j, i]] = 5.0;
    }

    rules::push_corners(&mut tw, &PipelineOptions::default());

    // S inner edge (U[0,1]) and W inner edge (V[1,0]) are pushed down to
    // the opposite ridge, which is flat -100 elsewhere.
    assert_eq!(tw.u_effective.low[[0, 1]], -100.0);
    assert_eq!(tw.v_effective.low[[1, 0]], -100.0);
    // The outer SW edges (U[0,0], V[0,0]) retain the +5 connection.
    assert_eq!(tw.u_effective.low[[0, 0]], 5.0);
    assert_eq!(tw.v_effective.low[[0, 0]], 5.0);
}

/// Scenario 3: a pure central ridge folds out to both the north and
/// south outer edges, with the tie-break `equal` path engaging when the
/// N and S buttresses and flanking cells are symmetric.
#[test]
fn pure_central_ridge_folds_to_both_sides() {
    let mut tw = ThinWalls::new(mesh_with_rfl(2, 2, 1));
    tw.c_effective = Stats::from_constant(Array2::from_elem((2, 2), -10.0));
    tw.u_effective = Stats::from_constant(Array2::from_elem((2, 3), -10.0));
    tw.v_effective = Stats::from_constant(Array2::from_elem((3, 2), -10.0));
    // The interior ridge (W/E at coarse cell 0,0) is tall: +20.
    tw.v_effective.low[[1, 0]] = 20.0;
    tw.v_effective.ave[[1, 0]] = 20.0;
    tw.v_effective.hgh[[1, 0]] = 20.0;
    tw.v_effective.low[[1, 1]] = 20.0;
    tw.v_effective.ave[[1, 1]] = 20.0;
    tw.v_effective.hgh[[1, 1]] = 20.0;

    rules::fold_ridges(&mut tw, &PipelineOptions::default());

    assert_eq!(tw.get_low_for_test(Direction::NwN, 0, 0), 20.0);
    assert_eq!(tw.get_low_for_test(Direction::SwS, 0, 0), 20.0);
    assert_eq!(tw.get_low_for_test(Direction::W, 0, 0), -10.0);
}

/// Scenario 4: refining a coarse seed against a 1-degree global source
/// grid converges within a small number of stages.
#[test]
fn refinement_converges_against_one_degree_source() {
    let seed = Mesh::global(4, 4, -180.0).unwrap();
    let src_lon = RegularCoord::new(360, -180.0, true);
    let src_lat = RegularCoord::new(180, -90.0, false);
    let driver = RefinementDriver::new(RefinementOptions::default());
    let result = driver.run(seed, &src_lon, &src_lat);
    assert!(result.meshes.len() <= 8);
}

/// Scenario 5: a deep two-hop interior route (through the S and E
/// interior edges) is the only way across a coarse cell, while the
/// direct one-hop alternative tops out at -20; the recorded outer
/// exits start overly optimistic (-100, deeper than the interior
/// structure actually supports). `limit_ns_ew_connections` must clamp
/// those exits back up to the -50 the fine grid genuinely offers, and
/// that bound must survive a subsequent coarsen.
#[test]
fn pathway_lower_bound_survives_coarsening() {
    let mut tw = ThinWalls::new(mesh_with_rfl(4, 4, 1));
    tw.c_effective = Stats::from_constant(Array2::from_elem((4, 4), -10.0));
    tw.u_effective = Stats::from_constant(Array2::from_elem((4, 5), -10.0));
    tw.v_effective = Stats::from_constant(Array2::from_elem((5, 4), -10.0));

    // Interior edges of coarse cell (0,0): S and E form the deep branch,
    // W is the shallow (-20) alternative, N is blocked (+100).
    tw.u_effective.low[[0, 1]] = -50.0; // S
    tw.u_effective.low[[1, 1]] = 100.0; // N
    tw.v_effective.low[[1, 1]] = -50.0; // E
    tw.v_effective.low[[1, 0]] = -20.0; // W

    // Outer exits, recorded overly deep by an earlier stage.
    tw.v_effective.low[[0, 0]] = -100.0; // SwS
    tw.v_effective.low[[0, 1]] = -100.0; // SeS
    tw.v_effective.low[[2, 0]] = -100.0; // NwN
    tw.v_effective.low[[2, 1]] = -100.0; // NeN

    rules_pathway_limit(&mut tw);

    assert_eq!(tw.get_low_for_test(Direction::SwS, 0, 0), -50.0);
    assert_eq!(tw.get_low_for_test(Direction::SeS, 0, 0), -50.0);
    assert_eq!(tw.get_low_for_test(Direction::NwN, 0, 0), -50.0);
    assert_eq!(tw.get_low_for_test(Direction::NeN, 0, 0), -50.0);

    let coarse = tw.coarsen().unwrap();
    let v_s = coarse.v_effective.low[[0, 0]];
    let v_n = coarse.v_effective.low[[1, 0]];
    assert!(v_n.min(v_s) <= -50.0);
}

fn rules_pathway_limit(tw: &mut ThinWalls) {
    topomesh::thinwalls::pathway::limit_ns_ew_connections(tw);
}

/// Scenario 6: a mesh touching the pole produces no NaN when refined in
/// longitude-periodic planar mode.
#[test]
fn pole_touching_mesh_refines_without_nan() {
    let mesh = Mesh::global(2, 4, -180.0).unwrap();
    assert!(mesh.np_index.contains(&(2, 0)) || mesh.np_index.iter().any(|&(j, _)| mesh.lat[[j, 0]] == 90.0));
    let refined = mesh.refine_by_2(false);
    assert!(refined.lon.iter().all(|v| v.is_finite()));
    assert!(refined.lat.iter().all(|v| v.is_finite()));
}
