use std::cell::Cell;

/// Lookup and insertion counters for one identity map.
///
/// An identity map never leaves the thread that owns it, so the counters are
/// plain [`Cell`]s rather than atomics.
///
/// # Examples
///
/// ```
/// use entiscope_core::MapStats;
///
/// let stats = MapStats::new();
///
/// stats.record_hit();
/// stats.record_hit();
/// stats.record_miss();
///
/// assert_eq!(stats.hits(), 2);
/// assert_eq!(stats.misses(), 1);
/// assert_eq!(stats.total_lookups(), 3);
/// assert!((stats.hit_rate() - 0.6666).abs() < 0.001);
/// ```
#[derive(Debug, Default)]
pub struct MapStats {
    hits: Cell<u64>,
    misses: Cell<u64>,
    inserts: Cell<u64>,
    conflicts: Cell<u64>,
}

impl MapStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a lookup that found a resident instance.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.set(self.hits.get() + 1);
    }

    /// Records a lookup that found nothing.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.set(self.misses.get() + 1);
    }

    #[inline]
    pub fn record_insert(&self) {
        self.inserts.set(self.inserts.get() + 1);
    }

    /// Records an insert that met a different instance under the same key.
    #[inline]
    pub fn record_conflict(&self) {
        self.conflicts.set(self.conflicts.get() + 1);
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.get()
    }

    #[inline]
    pub fn inserts(&self) -> u64 {
        self.inserts.get()
    }

    #[inline]
    pub fn conflicts(&self) -> u64 {
        self.conflicts.get()
    }

    #[inline]
    pub fn total_lookups(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Fraction of lookups that were hits, `0.0` when nothing was looked up.
    ///
    /// # Examples
    ///
    /// ```
    /// use entiscope_core::MapStats;
    ///
    /// let stats = MapStats::new();
    /// assert_eq!(stats.hit_rate(), 0.0);
    ///
    /// stats.record_hit();
    /// stats.record_miss();
    /// assert_eq!(stats.hit_rate(), 0.5);
    /// ```
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    #[inline]
    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }

    pub fn reset(&self) {
        self.hits.set(0);
        self.misses.set(0);
        self.inserts.set(0);
        self.conflicts.set(0);
    }
}

impl Clone for MapStats {
    fn clone(&self) -> Self {
        Self {
            hits: Cell::new(self.hits()),
            misses: Cell::new(self.misses()),
            inserts: Cell::new(self.inserts()),
            conflicts: Cell::new(self.conflicts()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats() {
        let stats = MapStats::new();
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
        assert_eq!(stats.inserts(), 0);
        assert_eq!(stats.conflicts(), 0);
    }

    #[test]
    fn test_rates() {
        let stats = MapStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();
        assert!((stats.miss_rate() - 0.6666).abs() < 0.001);
        assert!((stats.hit_rate() - 0.3333).abs() < 0.001);
    }

    #[test]
    fn test_hit_rate_no_lookups() {
        let stats = MapStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 1.0);
    }

    #[test]
    fn test_reset() {
        let stats = MapStats::new();
        stats.record_hit();
        stats.record_insert();
        stats.record_conflict();

        stats.reset();
        assert_eq!(stats.total_lookups(), 0);
        assert_eq!(stats.inserts(), 0);
        assert_eq!(stats.conflicts(), 0);
    }

    #[test]
    fn test_clone() {
        let stats = MapStats::new();
        stats.record_hit();
        stats.record_insert();

        let cloned = stats.clone();
        assert_eq!(cloned.hits(), 1);
        assert_eq!(cloned.inserts(), 1);

        // Ensure they're independent
        stats.record_hit();
        assert_eq!(stats.hits(), 2);
        assert_eq!(cloned.hits(), 1);
    }
}
