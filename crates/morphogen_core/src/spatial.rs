use morphogen_data::{Sphere, Vec3};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

type CellKey = (i32, i32, i32);

/// Widest run of cells, per axis, a body may cover before it is kept in the
/// overflow set instead of the grid.
pub const MAX_CELL_SPAN: i64 = 4;

#[derive(Clone, Debug)]
/// Uniform 3D grid over organism bounding spheres.
///
/// Each organism is registered in every grid cell its bounding sphere's
/// axis-aligned box touches, so two organisms can only overlap if they
/// share at least one cell. The grid is unbounded: cells are hashed, not
/// allocated. Bodies wider than [`MAX_CELL_SPAN`] cells on any axis skip the
/// grid and are tested against everything directly.
///
/// # Examples
/// ```
/// use morphogen_core::spatial::SpatialIndex;
/// use morphogen_data::{Sphere, Vec3};
/// use uuid::Uuid;
///
/// let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
/// let mut index = SpatialIndex::new(4.0);
/// index.rebuild([
///     (a, Sphere::new(Vec3::ZERO, 1.0)),
///     (b, Sphere::new(Vec3::new(1.5, 0.0, 0.0), 1.0)),
/// ]);
/// assert_eq!(index.candidate_pairs().len(), 1);
/// ```
pub struct SpatialIndex {
    pub cell_size: f32,
    cells: HashMap<CellKey, Vec<Uuid>>,
    oversized: BTreeSet<Uuid>,
    bounds: HashMap<Uuid, Sphere>,
}

impl SpatialIndex {
    /// Creates an empty index. `cell_size` must be positive.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            oversized: BTreeSet::new(),
            bounds: HashMap::new(),
        }
    }

    #[inline]
    fn cell_of(&self, p: Vec3) -> CellKey {
        let q = (p / self.cell_size).floor();
        (q.x as i32, q.y as i32, q.z as i32)
    }

    /// Cells covered by `sphere`'s box, or `None` when it is too wide for
    /// the grid.
    fn cells_touching(&self, sphere: &Sphere) -> Option<Vec<CellKey>> {
        let r = Vec3::splat(sphere.radius.max(0.0));
        let lo = self.cell_of(sphere.center - r);
        let hi = self.cell_of(sphere.center + r);
        let span = |a: i32, b: i32| i64::from(b) - i64::from(a) + 1;
        if span(lo.0, hi.0).max(span(lo.1, hi.1)).max(span(lo.2, hi.2)) > MAX_CELL_SPAN {
            return None;
        }
        let keys = (lo.0..=hi.0)
            .flat_map(|x| (lo.1..=hi.1).flat_map(move |y| (lo.2..=hi.2).map(move |z| (x, y, z))))
            .collect();
        Some(keys)
    }

    fn overlaps(&self, a: &Uuid, b: &Uuid) -> bool {
        match (self.bounds.get(a), self.bounds.get(b)) {
            (Some(sa), Some(sb)) => sa.penetration(sb) > 0.0,
            _ => false,
        }
    }

    /// Replaces the index contents. Entries with non-finite bounds are skipped.
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (Uuid, Sphere)>,
    {
        self.cells.clear();
        self.oversized.clear();
        self.bounds.clear();
        for (id, sphere) in entries {
            self.insert(id, sphere);
        }
    }

    pub fn insert(&mut self, id: Uuid, sphere: Sphere) {
        if !sphere.center.is_finite() || !sphere.radius.is_finite() {
            tracing::warn!(organism = %id, "Skipping non-finite bounds in spatial index");
            return;
        }
        self.remove(id);
        match self.cells_touching(&sphere) {
            Some(keys) => {
                for key in keys {
                    self.cells.entry(key).or_default().push(id);
                }
            }
            None => {
                self.oversized.insert(id);
            }
        }
        self.bounds.insert(id, sphere);
    }

    /// Drops `id` from the index. Returns whether it was present.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let Some(sphere) = self.bounds.remove(&id) else {
            return false;
        };
        if self.oversized.remove(&id) {
            return true;
        }
        for key in self.cells_touching(&sphere).unwrap_or_default() {
            if let Some(ids) = self.cells.get_mut(&key) {
                ids.retain(|&other| other != id);
                if ids.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
        true
    }

    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.bounds.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Organisms whose bounds overlap `sphere`.
    #[must_use]
    pub fn query(&self, sphere: &Sphere) -> Vec<Uuid> {
        let hits = |id: &&Uuid| {
            self.bounds
                .get(*id)
                .is_some_and(|b| b.penetration(sphere) > 0.0)
        };
        let found: BTreeSet<Uuid> = match self.cells_touching(sphere) {
            Some(keys) => keys
                .iter()
                .filter_map(|key| self.cells.get(key))
                .flatten()
                .chain(&self.oversized)
                .filter(hits)
                .copied()
                .collect(),
            None => self.bounds.keys().filter(hits).copied().collect(),
        };
        found.into_iter().collect()
    }

    /// Unordered pairs of organisms whose bounds overlap, each reported once
    /// in a stable order.
    #[must_use]
    pub fn candidate_pairs(&self) -> Vec<(Uuid, Uuid)> {
        let mut pairs = BTreeSet::new();
        for ids in self.cells.values() {
            for (i, a) in ids.iter().enumerate() {
                for b in &ids[i + 1..] {
                    let pair = if a < b { (*a, *b) } else { (*b, *a) };
                    if pairs.contains(&pair) {
                        continue;
                    }
                    if self.overlaps(a, b) {
                        pairs.insert(pair);
                    }
                }
            }
        }
        for a in &self.oversized {
            for b in self.bounds.keys().filter(|b| *b != a) {
                let pair = if a < b { (*a, *b) } else { (*b, *a) };
                if !pairs.contains(&pair) && self.overlaps(a, b) {
                    pairs.insert(pair);
                }
            }
        }
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_far_apart_not_paired() {
        let mut index = SpatialIndex::new(2.0);
        index.rebuild([
            (Uuid::new_v4(), Sphere::new(Vec3::ZERO, 1.0)),
            (Uuid::new_v4(), Sphere::new(Vec3::new(10.0, 0.0, 0.0), 1.0)),
        ]);
        assert!(index.candidate_pairs().is_empty());
    }

    #[test]
    fn test_pair_reported_once_across_cells() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut index = SpatialIndex::new(1.0);
        index.rebuild([
            (a, Sphere::new(Vec3::ZERO, 2.0)),
            (b, Sphere::new(Vec3::new(1.0, 1.0, 0.0), 2.0)),
        ]);
        let pairs = index.candidate_pairs();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0] == (a, b) || pairs[0] == (b, a));
    }

    #[test]
    fn test_query_and_remove() {
        let id = Uuid::new_v4();
        let mut index = SpatialIndex::new(4.0);
        index.insert(id, Sphere::new(Vec3::new(-3.0, 2.0, 7.0), 0.5));
        assert_eq!(index.query(&Sphere::new(Vec3::new(-3.0, 2.0, 7.5), 0.5)), vec![id]);
        assert!(index.remove(id));
        assert!(!index.remove(id));
        assert!(index.is_empty());
        assert!(index.query(&Sphere::new(Vec3::new(-3.0, 2.0, 7.0), 1.0)).is_empty());
    }

    #[test]
    fn test_huge_body_skips_the_grid() {
        let (whale, minnow, far) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut index = SpatialIndex::new(1.0);
        index.rebuild([
            (whale, Sphere::new(Vec3::ZERO, 1000.0)),
            (minnow, Sphere::new(Vec3::new(5.0, 0.0, 0.0), 0.4)),
            (far, Sphere::new(Vec3::new(5000.0, 0.0, 0.0), 0.4)),
        ]);
        assert!(index.cells.values().all(|ids| !ids.contains(&whale)));
        assert_eq!(index.oversized.len(), 1);

        let pairs = index.candidate_pairs();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0] == (whale, minnow) || pairs[0] == (minnow, whale));

        let mut hits = index.query(&Sphere::new(Vec3::new(5.0, 0.0, 0.0), 0.5));
        hits.sort();
        let mut expected = vec![whale, minnow];
        expected.sort();
        assert_eq!(hits, expected);
        // an oversized query scans every body
        assert_eq!(index.query(&Sphere::new(Vec3::new(5000.0, 0.0, 0.0), 600.0)), vec![far]);

        assert!(index.remove(whale));
        assert!(index.oversized.is_empty());
        assert!(index.candidate_pairs().is_empty());
    }

    #[test]
    fn test_non_finite_skipped() {
        let mut index = SpatialIndex::new(4.0);
        index.insert(Uuid::new_v4(), Sphere::new(Vec3::splat(f32::NAN), 1.0));
        assert!(index.is_empty());
    }
}
