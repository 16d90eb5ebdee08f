//! # Weighted Selector
//!
//! **Draws with replacement, probability proportional to weight**
//!
//! The cumulative table is built once per request. Entry `i` owns the
//! half-open interval `[cumulative[i-1], cumulative[i])`, so a uniform sample
//! in `[0, total)` lands in exactly one interval. Zero-weight entries own an
//! empty interval and can never be hit.
//!
//! Lookups are a binary search over the table: `O(log n)` per draw, no
//! allocation.

use rand::Rng;

use crate::catalog::CatalogEntry;
use crate::error::SelectError;

/// Cumulative-weight table over a catalog.
#[derive(Clone, Debug)]
pub struct WeightedSelector<'a> {
    entries: &'a [CatalogEntry],
    /// Running sums, `cumulative[i]` = sum of weights `0..=i`.
    cumulative: Vec<u64>,
    total: u64,
}

impl<'a> WeightedSelector<'a> {
    /// Builds the cumulative table.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::EmptyCatalog`] if `entries` is empty or every
    /// weight is zero.
    pub fn new(entries: &'a [CatalogEntry]) -> Result<Self, SelectError> {
        let mut cumulative = Vec::with_capacity(entries.len());
        let mut total = 0u64;
        for entry in entries {
            total += u64::from(entry.weight);
            cumulative.push(total);
        }

        if total == 0 {
            return Err(SelectError::EmptyCatalog);
        }

        Ok(Self {
            entries,
            cumulative,
            total,
        })
    }

    /// Sum of all weights.
    #[inline]
    #[must_use]
    pub const fn total_weight(&self) -> u64 {
        self.total
    }

    /// Catalog this table was built over.
    #[inline]
    #[must_use]
    pub const fn entries(&self) -> &'a [CatalogEntry] {
        self.entries
    }

    /// Draws one catalog index.
    #[inline]
    pub fn draw_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let sample = rng.gen_range(0..self.total);
        // First slot whose running sum exceeds the sample.
        self.cumulative.partition_point(|&c| c <= sample)
    }

    /// Draws one entry.
    #[inline]
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> &'a CatalogEntry {
        &self.entries[self.draw_index(rng)]
    }

    /// Draws `times` independent entries, in draw order.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R, times: usize) -> Vec<&'a CatalogEntry> {
        (0..times).map(|_| self.draw(rng)).collect()
    }

    /// Counts hits per catalog index over `iterations` draws.
    ///
    /// Used to verify the distribution.
    pub fn histogram<R: Rng + ?Sized>(&self, rng: &mut R, iterations: u64) -> Vec<u64> {
        let mut counts = vec![0u64; self.entries.len()];
        for _ in 0..iterations {
            counts[self.draw_index(rng)] += 1;
        }
        counts
    }
}

/// Draws `times` entry ids from `entries`.
///
/// Convenience over [`WeightedSelector`] for callers that only need ids.
///
/// # Errors
///
/// Returns [`SelectError::EmptyCatalog`] if the catalog cannot be drawn from.
pub fn select<R: Rng + ?Sized>(
    entries: &[CatalogEntry],
    times: usize,
    rng: &mut R,
) -> Result<Vec<String>, SelectError> {
    let selector = WeightedSelector::new(entries)?;
    Ok(selector
        .select(rng, times)
        .into_iter()
        .map(|e| e.entry_id.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(0x5EED)
    }

    fn entries(weights: &[u32]) -> Vec<CatalogEntry> {
        weights
            .iter()
            .enumerate()
            .map(|(i, &w)| CatalogEntry::new(format!("e{i}"), format!("Entry {i}"), w))
            .collect()
    }

    #[test]
    fn test_select_returns_exact_count_from_catalog() {
        let catalog = entries(&[5, 1, 9]);
        let selector = WeightedSelector::new(&catalog).unwrap();
        let mut rng = rng();

        for times in [1usize, 2, 17, 1000] {
            let drawn = selector.select(&mut rng, times);
            assert_eq!(drawn.len(), times);
            assert!(drawn.iter().all(|e| catalog.contains(e)));
        }
    }

    #[test]
    fn test_one_to_three_converges_to_75_percent() {
        let catalog = entries(&[1, 3]);
        let selector = WeightedSelector::new(&catalog).unwrap();

        let counts = selector.histogram(&mut rng(), 100_000);
        let share = counts[1] as f64 / 100_000.0;

        assert!(
            (share - 0.75).abs() < 0.01,
            "second entry drawn {:.2}% of the time",
            share * 100.0
        );
    }

    #[test]
    fn test_zero_weight_never_selected() {
        let catalog = entries(&[0, 4, 0, 1, 0]);
        let selector = WeightedSelector::new(&catalog).unwrap();

        let counts = selector.histogram(&mut rng(), 50_000);
        assert_eq!(counts[0], 0);
        assert_eq!(counts[2], 0);
        assert_eq!(counts[4], 0);
        assert_eq!(counts[1] + counts[3], 50_000);
    }

    #[test]
    fn test_empty_and_all_zero_catalogs_fail() {
        assert_eq!(
            WeightedSelector::new(&[]).unwrap_err(),
            SelectError::EmptyCatalog
        );
        assert_eq!(
            select(&entries(&[0, 0]), 3, &mut rng()).unwrap_err(),
            SelectError::EmptyCatalog
        );
    }

    #[test]
    fn test_interval_boundaries() {
        // Weights 2, 3 give intervals [0, 2) and [2, 5).
        let catalog = entries(&[2, 3]);
        let selector = WeightedSelector::new(&catalog).unwrap();
        assert_eq!(selector.total_weight(), 5);

        let locate = |sample: u64| selector.cumulative.partition_point(|&c| c <= sample);
        assert_eq!(locate(0), 0);
        assert_eq!(locate(1), 0);
        assert_eq!(locate(2), 1);
        assert_eq!(locate(4), 1);
    }

    #[test]
    fn test_same_seed_same_draws() {
        let catalog = entries(&[1, 1, 2]);
        let a = select(&catalog, 64, &mut rng()).unwrap();
        let b = select(&catalog, 64, &mut rng()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_large_weights_do_not_overflow() {
        let catalog = entries(&[u32::MAX, u32::MAX, 1]);
        let selector = WeightedSelector::new(&catalog).unwrap();
        assert_eq!(selector.total_weight(), 2 * u64::from(u32::MAX) + 1);
        let _ = selector.select(&mut rng(), 100);
    }
}
