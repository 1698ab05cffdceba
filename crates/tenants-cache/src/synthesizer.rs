//! Synthesis of new tenants that fit the observed structure distribution.

use crate::error::{Result, TenantsCacheError};
use crate::index::LevelKindIndex;
use crate::kind::TenantKind;
use crate::model::{default_name, TenantNode};
use crate::random::uuid_v4;
use crate::sampler::{StructureSlot, WeightedStructureSampler};
use crate::structure::StructureTable;
use rand::Rng;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use tracing::debug;

/// Sampling attempts per level ceiling before the ceiling is lowered.
pub const PARENT_SEARCH_ATTEMPTS: usize = 10;

/// Picks a structural slot and an existing parent for every new tenant.
///
/// The level ceiling is shared by all callers. A search that starves at the
/// current ceiling lowers it for everyone; registering a tenant raises it again
/// to one level below that tenant, bounded by the structure table.
pub struct TenantSynthesizer {
    sampler: WeightedStructureSampler,
    index: LevelKindIndex,
    current_id: AtomicI64,
    current_max_level: AtomicU32,
}

impl TenantSynthesizer {
    /// Create a synthesizer with an empty index. Nothing can be synthesized
    /// until [`seed`](Self::seed) or [`register`](Self::register) is called.
    pub fn new(structure: &StructureTable) -> Self {
        Self {
            sampler: WeightedStructureSampler::new(structure),
            index: LevelKindIndex::new(),
            current_id: AtomicI64::new(0),
            current_max_level: AtomicU32::new(0),
        }
    }

    /// Align the id counter and level ceiling with a bootstrapped hierarchy.
    pub fn seed(&self, max_id: i64, deepest_level: u32) {
        self.current_id.fetch_max(max_id, Ordering::AcqRel);
        let ceiling = deepest_level.saturating_add(1).min(self.sampler.max_level());
        self.current_max_level.store(ceiling, Ordering::Release);
    }

    /// Make a committed tenant available as a parent.
    pub fn register(&self, node: &TenantNode) {
        self.index.store(node.nesting_level, node.kind, node.id);
        let ceiling = node
            .nesting_level
            .saturating_add(1)
            .min(self.sampler.max_level());
        self.current_max_level.fetch_max(ceiling, Ordering::AcqRel);
    }

    /// Produce a new tenant attached to an existing, registered parent.
    ///
    /// The returned node is not registered; callers register it once it is
    /// durably stored.
    pub fn synthesize<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TenantNode> {
        let start = self.current_max_level.load(Ordering::Acquire);
        let mut ceiling = start;
        let mut last_attempt = None;

        while ceiling >= 1 {
            for _ in 0..PARENT_SEARCH_ATTEMPTS {
                let Some(slot) = self.sampler.sample(rng, ceiling) else {
                    break;
                };
                last_attempt = Some(slot);
                if let Some(parent_id) =
                    self.index
                        .sample_eligible_parent(rng, slot.level, slot.kind)
                {
                    return Ok(self.build(rng, slot, parent_id));
                }
            }

            ceiling -= 1;
            self.current_max_level.fetch_min(ceiling, Ordering::AcqRel);
            debug!("No parent found below level {}; lowering ceiling", ceiling + 1);
        }

        let slot = last_attempt
            .or_else(|| self.sampler.sample(rng, 0))
            .unwrap_or(StructureSlot {
                kind: TenantKind::Root,
                level: 0,
            });
        Err(TenantsCacheError::NoEligibleParent {
            kind: slot.kind,
            level: slot.level,
            ceiling: start,
        })
    }

    fn build<R: Rng + ?Sized>(&self, rng: &mut R, slot: StructureSlot, parent_id: i64) -> TenantNode {
        let id = self.current_id.fetch_add(1, Ordering::AcqRel) + 1;
        TenantNode {
            id,
            uuid: uuid_v4(rng).to_string(),
            name: default_name(slot.kind, id),
            kind: slot.kind,
            parent_id,
            nesting_level: slot.level,
            is_deleted: false,
            parent_has_access: true,
        }
    }

    pub fn current_id(&self) -> i64 {
        self.current_id.load(Ordering::Acquire)
    }

    pub fn current_max_level(&self) -> u32 {
        self.current_max_level.load(Ordering::Acquire)
    }

    pub fn index(&self) -> &LevelKindIndex {
        &self.index
    }

    pub fn sampler(&self) -> &WeightedStructureSampler {
        &self.sampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::thread;

    fn scenario_table() -> StructureTable {
        StructureTable::from_yaml(
            r#"
- { kind: root, level: 0, weight: 1 }
- { kind: partner, level: 1, weight: 10 }
- { kind: customer, level: 2, weight: 90 }
"#,
        )
        .unwrap()
    }

    fn with_root(table: &StructureTable) -> TenantSynthesizer {
        let synthesizer = TenantSynthesizer::new(table);
        let root = TenantNode::root("root".to_string());
        synthesizer.register(&root);
        synthesizer.seed(root.id, 0);
        synthesizer
    }

    #[test]
    fn test_partner_first_then_customer() {
        let synthesizer = with_root(&scenario_table());
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(synthesizer.current_max_level(), 1);

        let partner = synthesizer.synthesize(&mut rng).unwrap();
        assert_eq!(partner.kind, TenantKind::Partner);
        assert_eq!(partner.nesting_level, 1);
        assert_eq!(partner.parent_id, 1);
        assert_eq!(partner.id, 2);
        synthesizer.register(&partner);
        assert_eq!(synthesizer.current_max_level(), 2);

        let customer = (0..20)
            .map(|_| synthesizer.synthesize(&mut rng).unwrap())
            .find(|node| node.kind == TenantKind::Customer)
            .expect("a customer within 20 draws");
        assert_eq!(customer.nesting_level, 2);
        assert_eq!(customer.parent_id, partner.id);
    }

    #[test]
    fn test_fails_without_any_parent() {
        let synthesizer = TenantSynthesizer::new(&scenario_table());
        let mut rng = StdRng::seed_from_u64(1);

        let err = synthesizer.synthesize(&mut rng).unwrap_err();
        assert!(matches!(
            err,
            TenantsCacheError::NoEligibleParent { ceiling: 0, .. }
        ));
    }

    #[test]
    fn test_ceiling_backs_off_but_stays_in_range() {
        let synthesizer = TenantSynthesizer::new(&scenario_table());
        // Claims a level-1 hierarchy exists but nothing is registered.
        synthesizer.seed(5, 1);
        assert_eq!(synthesizer.current_max_level(), 2);

        let mut rng = StdRng::seed_from_u64(1);
        let err = synthesizer.synthesize(&mut rng).unwrap_err();
        assert!(matches!(
            err,
            TenantsCacheError::NoEligibleParent { ceiling: 2, .. }
        ));
        assert_eq!(synthesizer.current_max_level(), 0);
        // Failed searches never consume ids.
        assert_eq!(synthesizer.current_id(), 5);
    }

    #[test]
    fn test_generated_hierarchy_respects_parent_rules() {
        let table = StructureTable::embedded().unwrap();
        let synthesizer = with_root(&table);
        let mut rng = StdRng::seed_from_u64(11);

        let mut nodes: HashMap<i64, TenantNode> = HashMap::new();
        let root = TenantNode::root("root".to_string());
        nodes.insert(root.id, root);

        for _ in 0..2_000 {
            let node = synthesizer.synthesize(&mut rng).unwrap();
            synthesizer.register(&node);
            nodes.insert(node.id, node);
        }

        for node in nodes.values().filter(|n| !n.is_root()) {
            let parent = &nodes[&node.parent_id];
            assert_eq!(node.nesting_level, parent.nesting_level + 1);
            assert!(
                node.kind.accepts_parent(parent.kind),
                "{} under {}",
                node.kind,
                parent.kind
            );
        }
        assert!(nodes.values().any(|n| n.nesting_level >= 3));
    }

    #[test]
    fn test_concurrent_ids_are_unique_and_dense() {
        let table = StructureTable::embedded().unwrap();
        let synthesizer = Arc::new(with_root(&table));
        let threads = 8u64;
        let per_thread = 500;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let synthesizer = Arc::clone(&synthesizer);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(t);
                    (0..per_thread)
                        .map(|_| {
                            let node = synthesizer.synthesize(&mut rng).unwrap();
                            synthesizer.register(&node);
                            node.id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let unique: HashSet<i64> = ids.iter().copied().collect();

        let expected = threads as usize * per_thread;
        assert_eq!(unique.len(), expected);
        assert_eq!(*unique.iter().min().unwrap(), 2);
        assert_eq!(*unique.iter().max().unwrap(), expected as i64 + 1);
    }
}
