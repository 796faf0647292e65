//! Nearest-neighbour lookup over a small set of reference points.

use super::types::Coord;

/// Returns the index of the reference point nearest to `target`.
///
/// Ties resolve to the earliest index (first minimum wins), so results are
/// stable for a fixed input order. Returns `None` for an empty slice.
///
/// # Examples
///
/// ```
/// use gme_grid::grid::nearest::nearest_index;
/// use gme_grid::grid::types::Coord;
///
/// let refs = [Coord::new(45.0, 9.0), Coord::new(41.0, 14.0)];
/// assert_eq!(nearest_index(&refs, &Coord::new(44.0, 10.0)), Some(0));
/// ```
pub fn nearest_index(points: &[Coord], target: &Coord) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        let d = p.distance(target);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Like [`nearest_index`] but over labelled points, returning the label.
pub fn nearest_label<'a>(points: &'a [(String, Coord)], target: &Coord) -> Option<&'a str> {
    let mut best: Option<(&'a str, f64)> = None;
    for (label, p) in points {
        let d = p.distance(target);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((label.as_str(), d)),
        }
    }
    best.map(|(label, _)| label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reference_set_has_no_nearest() {
        assert_eq!(nearest_index(&[], &Coord::new(0.0, 0.0)), None);
    }

    #[test]
    fn ties_resolve_to_first_point() {
        let refs = [Coord::new(1.0, 0.0), Coord::new(-1.0, 0.0)];
        assert_eq!(nearest_index(&refs, &Coord::new(0.0, 0.0)), Some(0));
    }

    #[test]
    fn nearest_label_picks_closest() {
        let refs = vec![
            ("Sicilia".to_string(), Coord::new(37.5, 14.0)),
            ("Lombardia".to_string(), Coord::new(45.5, 9.5)),
        ];
        assert_eq!(
            nearest_label(&refs, &Coord::new(45.4, 9.2)),
            Some("Lombardia")
        );
    }
}
