//! Index of created tenant ids by nesting level and kind.

use crate::bucket::BucketMap;
use crate::kind::TenantKind;
use rand::Rng;

/// Concurrent `level -> kind -> ids` index used to pick parents for new tenants.
#[derive(Default)]
pub struct LevelKindIndex {
    ids: BucketMap<u32, TenantKind, i64>,
}

impl LevelKindIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, level: u32, kind: TenantKind, id: i64) {
        self.ids.push(level, kind, id);
    }

    /// Pick a random id that may parent a `kind` tenant placed at `level`.
    ///
    /// Candidates are all ids at `level - 1` whose kind is an allowed parent
    /// kind; each candidate is equally likely.
    pub fn sample_eligible_parent<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        level: u32,
        kind: TenantKind,
    ) -> Option<i64> {
        let parent_level = level.checked_sub(1)?;
        let buckets = self.ids.buckets(parent_level, kind.parent_kinds())?;

        // Buckets only grow, so a position below a length read here stays valid.
        let lengths: Vec<usize> = buckets.iter().map(|b| b.lock().len()).collect();
        let total: usize = lengths.iter().sum();
        if total == 0 {
            return None;
        }

        let mut pick = rng.gen_range(0..total);
        for (bucket, len) in buckets.iter().zip(lengths) {
            if pick < len {
                return Some(bucket.lock()[pick]);
            }
            pick -= len;
        }
        None
    }

    pub fn count(&self, level: u32, kind: TenantKind) -> usize {
        self.ids.len_of(level, kind)
    }

    pub fn len(&self) -> usize {
        self.ids.total_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
