use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use ndarray::{Array2, ArrayView2};

use crate::error::{GcfdError, Result};

/// Largest accepted outermost ring. A ring this far out already lies beyond
/// any spectrum a descriptor is computed on.
pub const MAX_RING_RADIUS: usize = 1 << 16;

/// Mask sets kept by [`RingMaskCache::default`].
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Concentric discrete rings over a grid, used to collapse a centered 2D
/// magnitude into a 1D profile.
///
/// Rings are centered on `(rows / 2, cols / 2)`. Ring `r < max_r` holds the
/// pixels at distance `d` with `r <= d < r + 1`; the outermost ring `max_r`
/// also takes every pixel with `d >= max_r`, so each pixel belongs to exactly
/// one ring. Distances are compared on exact integer squares.
///
/// A set is immutable once built and may be shared between any number of
/// grids of the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RingMaskSet {
    /// The number of rows of the grids this set applies to.
    rows: usize,
    /// The number of columns of the grids this set applies to.
    cols: usize,
    /// Index of the outermost ring.
    max_r: usize,
    /// Ring index of every pixel.
    labels: Array2<usize>,
    /// Pixel count of every ring.
    ring_sizes: Vec<usize>,
}

impl RingMaskSet {
    /// Rings on a square of side `2 * max_r + 1`, centered on its middle pixel.
    ///
    /// # Errors
    /// `InvalidInput` if `max_r` exceeds [`MAX_RING_RADIUS`].
    pub fn new(max_r: usize) -> Result<RingMaskSet> {
        check_radius(max_r)?;
        let side = max_r
            .checked_mul(2)
            .and_then(|d| d.checked_add(1))
            .ok_or_else(|| GcfdError::invalid_input(format!("ring radius {max_r} overflows")))?;
        Self::for_shape(side, side, max_r)
    }

    /// Rings on a `rows x cols` grid, e.g. a cropped and shifted spectrum.
    ///
    /// # Errors
    /// `InvalidInput` for an empty or oversized grid, or if `max_r` exceeds
    /// [`MAX_RING_RADIUS`].
    pub fn for_shape(rows: usize, cols: usize, max_r: usize) -> Result<RingMaskSet> {
        if rows == 0 || cols == 0 {
            return Err(GcfdError::invalid_input(format!(
                "ring masks need a non-empty grid, got {rows}x{cols}"
            )));
        }
        check_radius(max_r)?;
        let fits = rows
            .checked_mul(cols)
            .is_some_and(|n| n <= isize::MAX as usize);
        if !fits {
            return Err(GcfdError::invalid_input(format!(
                "a {rows}x{cols} ring mask grid is too large"
            )));
        }
        Ok(Self::build(rows, cols, max_r))
    }

    fn build(rows: usize, cols: usize, max_r: usize) -> RingMaskSet {
        let (center_row, center_col) = (rows / 2, cols / 2);
        let mut ring_sizes = vec![0usize; max_r + 1];

        let labels = Array2::from_shape_fn((rows, cols), |(r, c)| {
            let dr = r.abs_diff(center_row);
            let dc = c.abs_diff(center_col);
            let ring = integer_sqrt(dr * dr + dc * dc).min(max_r);
            ring_sizes[ring] += 1;
            ring
        });

        tracing::debug!(rows, cols, max_r, "built ring masks");

        RingMaskSet {
            rows,
            cols,
            max_r,
            labels,
            ring_sizes,
        }
    }

    /// Number of rings, always `max_r + 1`.
    pub fn len(&self) -> usize {
        self.max_r + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn max_r(&self) -> usize {
        self.max_r
    }

    /// Shape of the grids this set can integrate.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn center(&self) -> (usize, usize) {
        (self.rows / 2, self.cols / 2)
    }

    pub fn ring_sizes(&self) -> &[usize] {
        &self.ring_sizes
    }

    /// Ring index of pixel `(row, col)`.
    pub fn ring_of(&self, row: usize, col: usize) -> Option<usize> {
        self.labels.get([row, col]).copied()
    }

    /// Boolean mask of ring `ring`.
    pub fn mask(&self, ring: usize) -> Option<Array2<bool>> {
        (ring <= self.max_r).then(|| self.labels.mapv(|label| label == ring))
    }

    /// Sums `grid` over every ring, innermost first.
    ///
    /// # Errors
    /// `DimensionMismatch` if `grid` does not have the shape the set was built for.
    pub fn integrate(&self, grid: ArrayView2<f64>) -> Result<Vec<f64>> {
        if grid.dim() != self.shape() {
            return Err(GcfdError::dimension_mismatch(self.shape(), grid.dim()));
        }
        let mut sums = vec![0.0; self.len()];
        for (label, value) in self.labels.iter().zip(grid.iter()) {
            sums[*label] += *value;
        }
        Ok(sums)
    }
}

/// Rings on a `(2 * max_r + 1)` square.
pub fn build_ring_masks(max_r: usize) -> Result<RingMaskSet> {
    RingMaskSet::new(max_r)
}

/// Sums `grid` over each ring of `masks`; the output has `masks.len()` entries.
pub fn integrate(grid: ArrayView2<f64>, masks: &RingMaskSet) -> Result<Vec<f64>> {
    masks.integrate(grid)
}

fn check_radius(max_r: usize) -> Result<()> {
    if max_r > MAX_RING_RADIUS {
        return Err(GcfdError::invalid_input(format!(
            "ring radius {max_r} exceeds {MAX_RING_RADIUS}"
        )));
    }
    Ok(())
}

/// Largest `r` with `r * r <= n`.
fn integer_sqrt(n: usize) -> usize {
    let mut r = (n as f64).sqrt() as usize;
    while r * r > n {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= n {
        r += 1;
    }
    r
}

/// Exact geometry a mask set was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RingKey {
    /// Grid rows.
    rows: usize,
    /// Grid columns.
    cols: usize,
    /// Outermost ring.
    max_r: usize,
}

/// LRU cache of ring mask sets keyed by `(rows, cols, max_r)`.
///
/// Lookups never hand out a set built for a different shape; a new key always
/// builds a new set. Once `capacity` sets are held, the least recently used
/// one is dropped.
#[derive(Debug)]
pub struct RingMaskCache {
    entries: LruCache<RingKey, Arc<RingMaskSet>>,
    hits: u64,
    misses: u64,
}

impl Default for RingMaskCache {
    fn default() -> Self {
        Self::with_capacity(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

impl RingMaskCache {
    /// Cache holding up to [`DEFAULT_CACHE_CAPACITY`] sets.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        RingMaskCache {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Returns the cached set for this shape and radius, building it on a miss.
    pub fn get_or_build(&mut self, rows: usize, cols: usize, max_r: usize) -> Result<Arc<RingMaskSet>> {
        let key = RingKey { rows, cols, max_r };
        if let Some(masks) = self.entries.get(&key) {
            self.hits += 1;
            tracing::trace!(rows, cols, max_r, "ring mask cache hit");
            return Ok(Arc::clone(masks));
        }
        self.misses += 1;
        let masks = Arc::new(RingMaskSet::for_shape(rows, cols, max_r)?);
        if let Some((evicted, _)) = self.entries.push(key, Arc::clone(&masks)) {
            if evicted != key {
                tracing::trace!(
                    rows = evicted.rows,
                    cols = evicted.cols,
                    max_r = evicted.max_r,
                    "ring mask cache eviction"
                );
            }
        }
        Ok(masks)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation or the last [`clear`](Self::clear).
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rings_partition_the_grid() {
        for (rows, cols, max_r) in [(9, 9, 4), (8, 12, 4), (16, 16, 3), (5, 5, 10)] {
            let masks = RingMaskSet::for_shape(rows, cols, max_r).unwrap();
            assert_eq!(masks.len(), max_r + 1);
            let mut cover = Array2::<u32>::zeros((rows, cols));
            for ring in 0..masks.len() {
                let mask = masks.mask(ring).unwrap();
                cover.zip_mut_with(&mask, |count, inside| *count += u32::from(*inside));
            }
            assert!(cover.iter().all(|count| *count == 1));
            assert_eq!(masks.ring_sizes().iter().sum::<usize>(), rows * cols);
        }
    }

    #[test]
    fn ring_boundaries_are_half_open() {
        let masks = build_ring_masks(3).unwrap();
        assert_eq!(masks.shape(), (7, 7));
        assert_eq!(masks.center(), (3, 3));
        assert_eq!(masks.ring_of(3, 3), Some(0));
        assert_eq!(masks.ring_of(3, 4), Some(1));
        assert_eq!(masks.ring_of(4, 4), Some(1));
        // d == 2 exactly opens ring 2.
        assert_eq!(masks.ring_of(3, 5), Some(2));
        // d = sqrt(8) < 3
        assert_eq!(masks.ring_of(5, 5), Some(2));
        // Corners (d = sqrt(18)) fold into the outermost ring.
        assert_eq!(masks.ring_of(0, 0), Some(3));
        assert_eq!(masks.ring_sizes(), &[1, 8, 16, 24]);
        assert_eq!(masks.ring_of(7, 0), None);
        assert!(masks.mask(4).is_none());
    }

    #[test]
    fn zero_radius_has_a_single_ring() {
        let masks = build_ring_masks(0).unwrap();
        assert_eq!(masks.len(), 1);
        assert_eq!(masks.shape(), (1, 1));
        let sums = integrate(Array2::from_elem((1, 1), 4.5).view(), &masks).unwrap();
        assert_eq!(sums, vec![4.5]);

        let wide = RingMaskSet::for_shape(4, 4, 0).unwrap();
        let sums = wide.integrate(Array2::ones((4, 4)).view()).unwrap();
        assert_eq!(sums, vec![16.0]);
    }

    #[test]
    fn integrate_sums_each_ring() {
        let masks = build_ring_masks(1).unwrap();
        let grid = Array2::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f64);
        let sums = masks.integrate(grid.view()).unwrap();
        assert_abs_diff_eq!(sums[0], 4.0);
        assert_abs_diff_eq!(sums[1], 36.0 - 4.0);
    }

    #[test]
    fn integrate_rejects_other_shapes() {
        let masks = build_ring_masks(2).unwrap();
        let err = masks.integrate(Array2::zeros((6, 5)).view()).unwrap_err();
        assert_eq!(err, GcfdError::dimension_mismatch((5, 5), (6, 5)));
    }

    #[test]
    fn integer_sqrt_is_exact() {
        for n in 0..2000usize {
            let r = integer_sqrt(n);
            assert!(r * r <= n && (r + 1) * (r + 1) > n);
        }
    }

    #[test]
    fn cache_reuses_sets_per_shape() {
        let mut cache = RingMaskCache::new();
        let a = cache.get_or_build(8, 8, 4).unwrap();
        let b = cache.get_or_build(8, 8, 4).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = cache.get_or_build(8, 10, 4).unwrap();
        assert_eq!(c.shape(), (8, 10));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats(), (1, 2));

        assert!(cache.get_or_build(0, 8, 4).is_err());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), (0, 0));
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let mut cache = RingMaskCache::with_capacity(NonZeroUsize::new(2).unwrap());
        assert_eq!(cache.capacity(), 2);
        let first = cache.get_or_build(4, 4, 2).unwrap();
        cache.get_or_build(6, 6, 3).unwrap();
        // Touch the first set so the second becomes the oldest.
        cache.get_or_build(4, 4, 2).unwrap();
        cache.get_or_build(8, 8, 4).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats(), (1, 3));

        let again = cache.get_or_build(4, 4, 2).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        cache.get_or_build(6, 6, 3).unwrap();
        assert_eq!(cache.stats(), (2, 4));

        for n in 2..200 {
            cache.get_or_build(n, n, n / 2).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(RingMaskCache::new().capacity(), DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn oversized_radius_is_rejected() {
        for max_r in [usize::MAX, usize::MAX / 2 + 1, MAX_RING_RADIUS + 1] {
            assert!(matches!(RingMaskSet::new(max_r), Err(GcfdError::InvalidInput(_))));
            assert!(matches!(
                RingMaskSet::for_shape(8, 8, max_r),
                Err(GcfdError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            RingMaskSet::for_shape(usize::MAX, 2, 1),
            Err(GcfdError::InvalidInput(_))
        ));
        let edge = RingMaskSet::for_shape(4, 4, MAX_RING_RADIUS).unwrap();
        assert_eq!(edge.len(), MAX_RING_RADIUS + 1);
    }
}
