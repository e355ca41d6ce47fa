//! Duplicate candidate removal.
//!
//! Noisy thresholding can outline the same tile twice (for example an
//! outer and a slightly inset border). Candidates are grouped by centroid
//! proximity and only the best of each group survives.
//!
//! Grouping is single-link to a pivot: the first unassigned candidate
//! claims every unassigned candidate within `distance` of *its own*
//! centroid. Chains of near neighbours are therefore not merged
//! transitively.

use crate::detect::Candidate;

/// Remove near-duplicate candidates.
///
/// From each cluster the candidate with the largest area wins; ties go to
/// the one with fewer vertices, then to the earlier one. Survivors keep
/// their relative input order.
#[must_use = "returns the deduplicated candidates"]
pub fn resolve_duplicates(candidates: &[Candidate], distance: f64) -> Vec<Candidate> {
    let mut assigned = vec![false; candidates.len()];
    let mut winners = Vec::new();

    for pivot in 0..candidates.len() {
        if assigned[pivot] {
            continue;
        }
        let origin = candidates[pivot].centroid;

        let mut best = pivot;
        for i in pivot..candidates.len() {
            if assigned[i] || candidates[i].centroid.distance(origin) > distance {
                continue;
            }
            assigned[i] = true;
            if beats(&candidates[i], &candidates[best]) {
                best = i;
            }
        }
        winners.push(best);
    }

    winners.sort_unstable();
    log::debug!(
        "duplicate resolution kept {} of {} candidates",
        winners.len(),
        candidates.len()
    );
    winners.into_iter().map(|i| candidates[i].clone()).collect()
}

/// Whether `challenger` should replace the current cluster winner.
/// Later candidates only win strictly, so equal candidates keep the
/// earliest.
fn beats(challenger: &Candidate, current: &Candidate) -> bool {
    if challenger.area > current.area {
        return true;
    }
    #[allow(clippy::float_cmp)]
    let same_area = challenger.area == current.area;
    same_area && challenger.polygon.vertex_count() < current.polygon.vertex_count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};

    /// A pentagon-shaped candidate occupying `w` x `h` at `(x, y)`, with
    /// `extra` collinear vertices inserted along the bottom edge.
    fn candidate(x: i32, y: i32, w: i32, h: i32, extra: usize) -> Candidate {
        let mut pts = vec![
            Point::new(x + 5, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
        ];
        for k in 0..extra {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let step = (k as i32 + 1) * w / (extra as i32 + 1);
            pts.push(Point::new(x + w - step, y + h));
        }
        pts.push(Point::new(x, y + h));
        pts.push(Point::new(x, y + 5));
        let polygon = Polygon::new(pts);
        Candidate {
            contour_area: polygon.area(),
            area: polygon.area(),
            centroid: polygon.centroid().unwrap(),
            bbox: polygon.bounding_box().unwrap(),
            polygon,
        }
    }

    #[test]
    fn empty_input() {
        assert!(resolve_duplicates(&[], 30.0).is_empty());
    }

    #[test]
    fn distant_candidates_all_survive_in_order() {
        let input = vec![
            candidate(300, 0, 40, 50, 0),
            candidate(0, 0, 40, 50, 0),
            candidate(150, 200, 40, 50, 0),
        ];
        assert_eq!(resolve_duplicates(&input, 30.0), input);
    }

    #[test]
    fn largest_of_a_cluster_wins() {
        let small = candidate(102, 102, 36, 46, 0);
        let large = candidate(100, 100, 40, 50, 0);
        let far = candidate(400, 100, 40, 50, 0);
        let out = resolve_duplicates(&[small, far.clone(), large.clone()], 30.0);
        assert_eq!(out, vec![far, large]);
    }

    #[test]
    fn equal_area_prefers_fewer_vertices() {
        let busy = candidate(0, 0, 40, 50, 2);
        let clean = candidate(0, 0, 40, 50, 0);
        assert!((busy.area - clean.area).abs() < 1e-9);
        let out = resolve_duplicates(&[busy, clean.clone()], 30.0);
        assert_eq!(out, vec![clean]);
    }

    #[test]
    fn exact_duplicates_keep_the_first() {
        let a = candidate(0, 0, 40, 50, 0);
        let out = resolve_duplicates(&[a.clone(), a.clone(), a.clone()], 30.0);
        assert_eq!(out, vec![a]);
    }

    #[test]
    fn grouping_is_not_transitive() {
        // b is within reach of a, c is within reach of b but not of a.
        let a = candidate(0, 0, 40, 50, 0);
        let b = candidate(25, 0, 40, 50, 0);
        let c = candidate(50, 0, 40, 50, 0);
        let out = resolve_duplicates(&[a.clone(), b, c.clone()], 30.0);
        assert_eq!(out, vec![a, c]);
    }

    #[test]
    fn resolving_twice_changes_nothing() {
        let input = vec![
            candidate(100, 100, 40, 50, 0),
            candidate(104, 98, 38, 52, 1),
            candidate(300, 100, 40, 50, 0),
            candidate(302, 103, 40, 50, 2),
            candidate(600, 400, 44, 55, 0),
        ];
        let once = resolve_duplicates(&input, 30.0);
        let twice = resolve_duplicates(&once, 30.0);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }
}
