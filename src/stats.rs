//! Triplet (min, mean, max) tile storage with aligned 2x/4x coarsening
//! reductions, transposition, and flipping.

use crate::error::Error;
use ndarray::{s, Array2, Axis};

/// A dense (min, mean, max) statistics field over some `(NJ, NI)` tile
/// grid. The three arrays always share the same shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Stats {
    pub low: Array2<f64>,
    pub ave: Array2<f64>,
    pub hgh: Array2<f64>,
}

impl Stats {
    /// A zero-filled Stats of the given shape.
    #[must_use]
    pub fn zeros(shape: (usize, usize)) -> Self {
        Stats {
            low: Array2::zeros(shape),
            ave: Array2::zeros(shape),
            hgh: Array2::zeros(shape),
        }
    }

    /// A Stats with all three triplets set equal to `values`.
    pub fn from_constant(values: Array2<f64>) -> Self {
        Stats {
            low: values.clone(),
            ave: values.clone(),
            hgh: values,
        }
    }

    /// A Stats built from independently supplied min/mean/max fields.
    /// Fails if the three arrays do not share a shape.
    pub fn from_triplet(low: Array2<f64>, ave: Array2<f64>, hgh: Array2<f64>) -> Result<Self, Error> {
        if low.dim() != ave.dim() || low.dim() != hgh.dim() {
            return Err(Error::ShapeMismatch {
                expected: low.dim(),
                found: ave.dim(),
            });
        }
        Ok(Stats { low, ave, hgh })
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.low.dim()
    }

    /// Re-establishes `low <= ave <= hgh` pointwise by clamping outward:
    /// `ave` is raised to at least `low`, then `hgh` is raised to at
    /// least `ave`. Idempotent.
    pub fn normalize_ordering(&mut self) {
        azip_max_inplace(&mut self.ave, &self.low);
        azip_max_inplace(&mut self.hgh, &self.ave);
    }

    /// `true` if `low <= ave <= hgh` holds at every element.
    #[must_use]
    pub fn ordering_holds(&self) -> bool {
        ndarray::Zip::from(&self.low)
            .and(&self.ave)
            .and(&self.hgh)
            .fold(true, |acc, &l, &a, &h| acc && l <= a && a <= h)
    }

    // ----- 4-point reductions (2x coarsening of a cell-center field) ---

    #[must_use]
    pub fn mean4(&self) -> Array2<f64> {
        let (nj, ni) = self.shape();
        let a = self.ave.slice(s![0..nj;2, 0..ni;2]);
        let b = self.ave.slice(s![1..nj;2, 1..ni;2]);
        let c = self.ave.slice(s![0..nj;2, 1..ni;2]);
        let d = self.ave.slice(s![1..nj;2, 0..ni;2]);
        (&a + &b + &c + &d).mapv(|v| 0.25 * v)
    }

    #[must_use]
    pub fn min4(&self) -> Array2<f64> {
        let (nj, ni) = self.shape();
        let a = self.low.slice(s![0..nj;2, 0..ni;2]);
        let b = self.low.slice(s![1..nj;2, 1..ni;2]);
        let c = self.low.slice(s![0..nj;2, 1..ni;2]);
        let d = self.low.slice(s![1..nj;2, 0..ni;2]);
        elementwise4(&a, &b, &c, &d, f64::min)
    }

    #[must_use]
    pub fn max4(&self) -> Array2<f64> {
        let (nj, ni) = self.shape();
        let a = self.hgh.slice(s![0..nj;2, 0..ni;2]);
        let b = self.hgh.slice(s![1..nj;2, 1..ni;2]);
        let c = self.hgh.slice(s![0..nj;2, 1..ni;2]);
        let d = self.hgh.slice(s![1..nj;2, 0..ni;2]);
        elementwise4(&a, &b, &c, &d, f64::max)
    }

    // ----- 2-point reductions on u-edges (pairs in j) -------------------

    #[must_use]
    pub fn mean2u(&self) -> Array2<f64> {
        let (nj, ni) = self.shape();
        let a = self.ave.slice(s![0..nj;2, 0..ni;2]);
        let b = self.ave.slice(s![1..nj;2, 0..ni;2]);
        (&a + &b).mapv(|v| 0.5 * v)
    }
    #[must_use]
    pub fn min2u(&self) -> Array2<f64> {
        let (nj, ni) = self.shape();
        let a = self.low.slice(s![0..nj;2, 0..ni;2]);
        let b = self.low.slice(s![1..nj;2, 0..ni;2]);
        elementwise2(&a, &b, f64::min)
    }
    #[must_use]
    pub fn max2u(&self) -> Array2<f64> {
        let (nj, ni) = self.shape();
        let a = self.hgh.slice(s![0..nj;2, 0..ni;2]);
        let b = self.hgh.slice(s![1..nj;2, 0..ni;2]);
        elementwise2(&a, &b, f64::max)
    }

    // ----- 2-point reductions on v-edges (pairs in i) -------------------

    #[must_use]
    pub fn mean2v(&self) -> Array2<f64> {
        let (nj, ni) = self.shape();
        let a = self.ave.slice(s![0..nj;2, 0..ni;2]);
        let b = self.ave.slice(s![0..nj;2, 1..ni;2]);
        (&a + &b).mapv(|v| 0.5 * v)
    }
    #[must_use]
    pub fn min2v(&self) -> Array2<f64> {
        let (nj, ni) = self.shape();
        let a = self.low.slice(s![0..nj;2, 0..ni;2]);
        let b = self.low.slice(s![0..nj;2, 1..ni;2]);
        elementwise2(&a, &b, f64::min)
    }
    #[must_use]
    pub fn max2v(&self) -> Array2<f64> {
        let (nj, ni) = self.shape();
        let a = self.hgh.slice(s![0..nj;2, 0..ni;2]);
        let b = self.hgh.slice(s![0..nj;2, 1..ni;2]);
        elementwise2(&a, &b, f64::max)
    }

    /// Reduces a `(NJ, NI+1)` u-edge Stats into `(NJ/2, NI/2+1)`, pairing
    /// rows and picking every other column.
    #[must_use]
    pub fn coarsen_u(&self) -> Self {
        Stats {
            low: self.min2u(),
            ave: self.mean2u(),
            hgh: self.max2u(),
        }
    }

    /// Reduces a `(NJ+1, NI)` v-edge Stats into `(NJ/2+1, NI/2)`, pairing
    /// columns and picking every other row.
    #[must_use]
    pub fn coarsen_v(&self) -> Self {
        Stats {
            low: self.min2v(),
            ave: self.mean2v(),
            hgh: self.max2v(),
        }
    }

    /// Reduces this Stats into a new Stats over `(NJ/2, NI/2)` by the
    /// 4-point (cell-center) stride.
    #[must_use]
    pub fn coarsen_c(&self) -> Self {
        Stats {
            low: self.min4(),
            ave: self.mean4(),
            hgh: self.max4(),
        }
    }

    /// Flips all three arrays along `axis` (0 = j/rows, 1 = i/columns).
    pub fn flip(&mut self, axis: usize) {
        let ax = Axis(axis);
        self.low.invert_axis(ax);
        self.ave.invert_axis(ax);
        self.hgh.invert_axis(ax);
    }

    /// Transposes all three arrays, swapping the j/i roles.
    #[must_use]
    pub fn transposed(&self) -> Self {
        Stats {
            low: self.low.t().to_owned(),
            ave: self.ave.t().to_owned(),
            hgh: self.hgh.t().to_owned(),
        }
    }

    /// Elementwise max of two Stats (used by the rule stages to raise
    /// outer edges to a captured ridge/corner value).
    #[must_use]
    pub fn elementwise_max(a: &Stats, b: &Stats) -> Stats {
        Stats {
            low: ndarray::Zip::from(&a.low).and(&b.low).map_collect(|&x, &y| x.max(y)),
            ave: ndarray::Zip::from(&a.ave).and(&b.ave).map_collect(|&x, &y| x.max(y)),
            hgh: ndarray::Zip::from(&a.hgh).and(&b.hgh).map_collect(|&x, &y| x.max(y)),
        }
    }
}

fn azip_max_inplace(dst: &mut Array2<f64>, floor: &Array2<f64>) {
    ndarray::Zip::from(dst).and(floor).for_each(|d, &f| {
        if f > *d {
            *d = f;
        }
    });
}

fn elementwise2(
    a: &ndarray::ArrayView2<f64>,
    b: &ndarray::ArrayView2<f64>,
    op: fn(f64, f64) -> f64,
) -> Array2<f64> {
    ndarray::Zip::from(a).and(b).map_collect(|&x, &y| op(x, y))
}

fn elementwise4(
    a: &ndarray::ArrayView2<f64>,
    b: &ndarray::ArrayView2<f64>,
    c: &ndarray::ArrayView2<f64>,
    d: &ndarray::ArrayView2<f64>,
    op: fn(f64, f64) -> f64,
) -> Array2<f64> {
    ndarray::Zip::from(a)
        .and(b)
        .and(c)
        .and(d)
        .map_collect(|&x, &y, &z, &w| op(op(x, y), op(z, w)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn mean4_min4_max4_aligned() {
        let ave = array![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        let s = Stats::from_constant(ave);
        let m4 = s.mean4();
        // Block (0,0): values 1,2,5,6 -> mean 3.5
        assert_eq!(m4[[0, 0]], 3.5);
        // Block (0,1): values 3,4,7,8 -> mean 5.5
        assert_eq!(m4[[0, 1]], 5.5);
        assert_eq!(s.min4()[[0, 0]], 1.0);
        assert_eq!(s.max4()[[0, 0]], 6.0);
    }

    #[test]
    fn flip_then_flip_is_identity() {
        let low = array![[1.0, 2.0], [3.0, 4.0]];
        let mut s = Stats::from_constant(low);
        let orig = s.clone();
        s.flip(0);
        s.flip(0);
        assert_eq!(s, orig);
        s.flip(1);
        s.flip(1);
        assert_eq!(s, orig);
    }

    #[test]
    fn transpose_then_transpose_is_identity() {
        let low = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let s = Stats::from_constant(low);
        let tt = s.transposed().transposed();
        assert_eq!(tt, s);
    }

    #[test]
    fn normalize_ordering_is_idempotent() {
        let low = array![[5.0, 0.0], [1.0, 1.0]];
        let ave = array![[1.0, 1.0], [1.0, 1.0]];
        let hgh = array![[2.0, 2.0], [0.0, 1.0]];
        let mut s = Stats::from_triplet(low, ave, hgh).unwrap();
        s.normalize_ordering();
        assert!(s.ordering_holds());
        let once = s.clone();
        s.normalize_ordering();
        assert_eq!(s, once);
    }

    #[test]
    fn coarsen_u_and_v_produce_edge_shaped_output() {
        // A 4x4 cell grid has u-edges (4,5) and v-edges (5,4); coarsening
        // by 2 must land on (2,3) and (3,2), matching a coarse (2,2) cell
        // grid's own edge shapes, not a same-width reduction.
        let u = Stats::zeros((4, 5));
        let v = Stats::zeros((5, 4));
        assert_eq!(u.coarsen_u().shape(), (2, 3));
        assert_eq!(v.coarsen_v().shape(), (3, 2));
    }
}
