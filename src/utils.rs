use crate::{
    interp::{find_t, interpolate_points},
    tables::{CORNER_CUT, EDGE_CORNERS, SADDLE_CASES, SEGMENT_TABLE},
    types::{Point, TieBreak, Value},
};

/// Computes the Marching Squares state bitmask for a cell.
///
/// Each of the 4 corners maps to one bit. A bit is set when the corner is on the **positive**
/// side of `level`, with exact hits decided by `tie_break`:
///
/// ```text
/// corner index:  3  2  1  0
/// state bits:   [_][_][_][_]
///                          ^-- corner 0 positive?
/// ```
#[inline]
pub fn get_state(corner_values: &[Value; 4], level: Value, tie_break: TieBreak) -> usize {
    let mut state: usize = 0;
    for (i, &v) in corner_values.iter().enumerate() {
        if tie_break.is_positive(v, level) {
            state |= 1 << i;
        }
    }
    state
}

/// Returns `true` for the two diagonal configurations that admit two contourings.
#[inline]
pub fn is_saddle(state: usize) -> bool {
    SADDLE_CASES.contains(&state)
}

/// Interpolates the crossing point along each edge of the cell flagged in `edges_mask`.
///
/// `edges_mask` is a 4-bit field from `EDGE_TABLE`; a set bit means that edge changes sign.
/// Edges whose endpoint values are equal are left as `None` rather than dividing by zero.
#[inline]
pub fn get_edge_crossings(
    edges_mask: u8,
    corner_positions: &[Point; 4],
    corner_values: &[Value; 4],
    level: Value,
) -> [Option<Point>; 4] {
    let mut crossings: [Option<Point>; 4] = [None; 4];

    for (i, &[a, b]) in EDGE_CORNERS.iter().enumerate() {
        if (edges_mask & (1 << i)) == 0 {
            continue;
        }

        let Some(t) = find_t(corner_values[a], corner_values[b], level) else {
            continue;
        };
        crossings[i] = Some(interpolate_points(corner_positions[a], corner_positions[b], t));
    }

    crossings
}

/// Edge pairs to connect for `state`.
///
/// Saddles need `center_positive`, the classification of the cell centre: the two emitted
/// segments cut off the corners whose class differs from the centre's. For any other state the
/// argument is ignored.
pub fn segment_edges_from_state(state: usize, center_positive: Option<bool>) -> Vec<[usize; 2]> {
    if is_saddle(state) {
        let Some(center_positive) = center_positive else {
            return Vec::new();
        };
        return (0..4)
            .filter(|&corner| (((state >> corner) & 1) == 1) != center_positive)
            .map(|corner| CORNER_CUT[corner])
            .collect();
    }

    SEGMENT_TABLE[state]
        .iter()
        .take_while(|&&e| e != -1)
        .map(|&e| e as usize)
        .collect::<Vec<_>>()
        .chunks_exact(2)
        .map(|pair| [pair[0], pair[1]])
        .collect()
}

/// Centre of the cell spanned by `corner_positions`.
#[inline]
pub fn cell_center(corner_positions: &[Point; 4]) -> Point {
    interpolate_points(corner_positions[0], corner_positions[2], 0.5)
}
