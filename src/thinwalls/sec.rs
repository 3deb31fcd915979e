//! The staggered-tile direction accessor.
//!
//! A coarse cell `(cj, ci)` (fine indices `J = 2*cj`, `I = 2*ci`) has
//! sixteen named locations in the fine Stats triplets around it:
//!
//! ```text
//!  ----NWN-----NEN----
//!  |        |        |
//! NWW  NW   N   NE  NEE
//!  |        |        |
//!  -----W-------E-----
//!  |        |        |
//! SWW  SW   S   SE  SEE
//!  |        |        |
//!  ----SWS-----SES----
//! ```
//!
//! `N`/`S` and `E`/`W` are u/v-edges; the four ordinal directions are
//! cell centers; the remaining eight are the edges one cell further out.
//! Each maps to a single `(Field, row, col)` triple in the fine grid, so
//! no aliased view is ever needed to read or write it.

/// Which of the three fine Stats triplets a direction resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    C,
    U,
    V,
}

/// One of the sixteen named locations around a coarse cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
    NwN,
    NeN,
    SwS,
    SeS,
    NeE,
    SeE,
    NwW,
    SwW,
}

impl Direction {
    /// The opposite direction, for the four edge/cardinal directions
    /// used by the rule stages (`od()` in the reference pipeline).
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Direction::N => Direction::S,
            Direction::S => Direction::N,
            Direction::E => Direction::W,
            Direction::W => Direction::E,
            _ => panic!("opposite() is only defined for N/S/E/W"),
        }
    }
}

/// Resolves a direction at coarse cell `(cj, ci)` to its fine-grid
/// `(Field, row, col)` location.
#[must_use]
pub fn sec_index(dir: Direction, cj: usize, ci: usize) -> (Field, usize, usize) {
    let (j, i) = (2 * cj, 2 * ci);
    match dir {
        Direction::N => (Field::U, j + 1, i + 1),
        Direction::S => (Field::U, j, i + 1),
        Direction::E => (Field::V, j + 1, i + 1),
        Direction::W => (Field::V, j + 1, i),
        Direction::NE => (Field::C, j + 1, i + 1),
        Direction::NW => (Field::C, j + 1, i),
        Direction::SE => (Field::C, j, i + 1),
        Direction::SW => (Field::C, j, i),
        Direction::NwN => (Field::V, j + 2, i),
        Direction::NeN => (Field::V, j + 2, i + 1),
        Direction::SwS => (Field::V, j, i),
        Direction::SeS => (Field::V, j, i + 1),
        Direction::NeE => (Field::U, j + 1, i + 2),
        Direction::SeE => (Field::U, j, i + 2),
        Direction::NwW => (Field::U, j + 1, i),
        Direction::SwW => (Field::U, j, i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_slice_keymap() {
        // N: U[1::2,1::2] at coarse (cj,ci) is fine (2cj+1, 2ci+1).
        assert_eq!(sec_index(Direction::N, 3, 5), (Field::U, 7, 11));
        // SWS: V[0:-1:2,0::2] at coarse (cj,ci) is fine (2cj, 2ci).
        assert_eq!(sec_index(Direction::SwS, 3, 5), (Field::V, 6, 10));
        // NEE: U[1::2,2::2] at coarse (cj,ci) is fine (2cj+1, 2ci+2).
        assert_eq!(sec_index(Direction::NeE, 3, 5), (Field::U, 7, 12));
    }

    #[test]
    fn opposite_is_involutive() {
        for d in [Direction::N, Direction::S, Direction::E, Direction::W] {
            assert_eq!(d.opposite().opposite(), d);
        }
    }
}
