//! Weighted sampling of `(kind, level)` slots from the structure table.

use crate::kind::TenantKind;
use crate::structure::StructureTable;
use rand::Rng;

/// A structural position a new tenant may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructureSlot {
    pub kind: TenantKind,
    pub level: u32,
}

/// Draws slots proportionally to their weight, restricted to a level ceiling.
///
/// Slots are kept ordered by level, so the slots at or above any ceiling form a
/// prefix of `weight_sums` and `level_totals[ceiling]` is the sum of that prefix.
#[derive(Debug, Clone)]
pub struct WeightedStructureSampler {
    slots: Vec<StructureSlot>,
    /// Strictly increasing prefix sums of slot weights.
    weight_sums: Vec<u64>,
    /// Cumulative weight of all slots at or above each level.
    level_totals: Vec<u64>,
}

impl WeightedStructureSampler {
    pub fn new(table: &StructureTable) -> Self {
        let mut entries = table.entries().to_vec();
        entries.sort_by_key(|e| e.level);

        let max_level = table.max_level() as usize;
        let mut slots = Vec::with_capacity(entries.len());
        let mut weight_sums = Vec::with_capacity(entries.len());
        let mut level_totals = vec![0u64; max_level + 1];

        let mut running = 0u64;
        for entry in &entries {
            running += entry.weight;
            slots.push(StructureSlot {
                kind: entry.kind,
                level: entry.level,
            });
            weight_sums.push(running);
            level_totals[entry.level as usize] = running;
        }

        // Levels without entries carry the total of the level above them.
        for level in 1..level_totals.len() {
            level_totals[level] = level_totals[level].max(level_totals[level - 1]);
        }

        Self {
            slots,
            weight_sums,
            level_totals,
        }
    }

    /// Deepest level present in the table.
    pub fn max_level(&self) -> u32 {
        (self.level_totals.len() - 1) as u32
    }

    /// Total weight available under the given ceiling.
    pub fn total_weight(&self, max_level: u32) -> u64 {
        self.level_totals[max_level.min(self.max_level()) as usize]
    }

    /// Draw a slot whose level is at most `max_level`.
    ///
    /// Ceilings beyond the table are clamped to its deepest level. Returns
    /// `None` when no weight lies under the ceiling.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, max_level: u32) -> Option<StructureSlot> {
        let total = self.total_weight(max_level);
        if total == 0 {
            return None;
        }

        let draw = rng.gen_range(0..total);
        let idx = self.weight_sums.partition_point(|&sum| sum <= draw);
        self.slots.get(idx).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scenario_table() -> StructureTable {
        StructureTable::from_yaml(
            r#"
- { kind: customer, level: 2, weight: 90 }
- { kind: root, level: 0, weight: 1 }
- { kind: partner, level: 1, weight: 10 }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_level_totals() {
        let sampler = WeightedStructureSampler::new(&scenario_table());
        assert_eq!(sampler.max_level(), 2);
        assert_eq!(sampler.total_weight(0), 1);
        assert_eq!(sampler.total_weight(1), 11);
        assert_eq!(sampler.total_weight(2), 101);
        assert_eq!(sampler.total_weight(42), 101);
    }

    #[test]
    fn test_missing_level_inherits_total() {
        let table = StructureTable::from_yaml(
            r#"
- { kind: root, level: 0, weight: 2 }
- { kind: unit, level: 3, weight: 5 }
"#,
        )
        .unwrap();
        let sampler = WeightedStructureSampler::new(&table);
        assert_eq!(sampler.total_weight(1), 2);
        assert_eq!(sampler.total_weight(2), 2);
        assert_eq!(sampler.total_weight(3), 7);
    }

    #[test]
    fn test_sample_respects_ceiling() {
        let sampler = WeightedStructureSampler::new(&scenario_table());
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let slot = sampler.sample(&mut rng, 1).unwrap();
            assert!(slot.level <= 1);
        }
        for _ in 0..100 {
            assert_eq!(
                sampler.sample(&mut rng, 0).unwrap(),
                StructureSlot {
                    kind: TenantKind::Root,
                    level: 0
                }
            );
        }
    }

    #[test]
    fn test_sample_frequencies_follow_weights() {
        let sampler = WeightedStructureSampler::new(&scenario_table());
        let mut rng = StdRng::seed_from_u64(42);

        let draws = 100_000;
        let customers = (0..draws)
            .filter(|_| sampler.sample(&mut rng, 2).unwrap().kind == TenantKind::Customer)
            .count();

        let ratio = customers as f64 / draws as f64;
        assert!((ratio - 90.0 / 101.0).abs() < 0.01, "ratio was {ratio}");
    }
}
