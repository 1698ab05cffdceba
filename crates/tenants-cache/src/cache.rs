//! The tenants cache façade shared by all benchmark workers.

use crate::cti::random_cti_entity;
use crate::error::{Result, TenantsCacheError};
use crate::kind::TenantKind;
use crate::model::{Lineage, TenantNode};
use crate::random::{bound_id, exp_index, uuid_v4, MAX_BOUND_CARDINALITY};
use crate::schema::{self, Migration, SelectQuery};
use crate::store::BackingStore;
use crate::structure::StructureTable;
use crate::synthesizer::TenantSynthesizer;
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which tenant uuid list a lookup samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantFilter {
    #[default]
    All,
    Customers,
    Partners,
}

impl FromStr for TenantFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(TenantFilter::All),
            "customer" => Ok(TenantFilter::Customers),
            "partner" => Ok(TenantFilter::Partners),
            other => Err(format!(
                "Unknown tenant filter '{other}' (expected 'customer', 'partner' or empty)"
            )),
        }
    }
}

/// Append-only list of uuids, oldest first.
#[derive(Default)]
pub(crate) struct UuidList {
    entries: RwLock<Vec<String>>,
}

impl UuidList {
    pub(crate) fn push(&self, uuid: String) {
        self.entries.write().push(uuid);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn get(&self, idx: usize) -> Option<String> {
        self.entries.read().get(idx).cloned()
    }
}

/// Number of entries a lookup draws from.
///
/// A zero `requested` means "use the working set"; a zero `limit` means no
/// working set is configured, in which case the whole list is used.
fn working_set_cardinality(requested: usize, limit: usize, available: usize) -> usize {
    let limit = (limit > 0).then_some(limit);
    let cardinality = match (requested, limit) {
        (0, Some(limit)) => limit,
        (0, None) => available,
        (requested, Some(limit)) => requested.min(limit),
        (requested, None) => requested,
    };
    cardinality.max(1)
}

/// Tenant counts per kind and level, as held by the parent index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub tenants: usize,
    pub customers: usize,
    pub partners: usize,
    pub ctis: usize,
    pub current_id: i64,
    pub level_ceiling: u32,
    /// `(level, kind, count)` for every non-empty index bucket.
    pub buckets: Vec<(u32, TenantKind, usize)>,
}

/// In-memory view of the tenant hierarchy and CTI catalog.
///
/// Construct once with [`TenantsCache::init`] and share it behind an `Arc`.
pub struct TenantsCache {
    pub(crate) store: Arc<dyn BackingStore>,
    pub(crate) synthesizer: TenantSynthesizer,
    pub(crate) lineages: DashMap<i64, Arc<Lineage>>,
    pub(crate) ids_by_uuid: DashMap<String, i64>,
    pub(crate) all: UuidList,
    pub(crate) customers: UuidList,
    pub(crate) partners: UuidList,
    pub(crate) ctis: UuidList,
    tenants_working_set: AtomicUsize,
    ctis_working_set: AtomicUsize,
}

impl TenantsCache {
    /// Create an empty cache over `store` without touching it.
    pub fn new(store: Arc<dyn BackingStore>, structure: &StructureTable) -> Self {
        Self {
            store,
            synthesizer: TenantSynthesizer::new(structure),
            lineages: DashMap::new(),
            ids_by_uuid: DashMap::new(),
            all: UuidList::default(),
            customers: UuidList::default(),
            partners: UuidList::default(),
            ctis: UuidList::default(),
            tenants_working_set: AtomicUsize::new(0),
            ctis_working_set: AtomicUsize::new(0),
        }
    }

    /// Validate the dialect, create missing tables and bootstrap from stored rows.
    ///
    /// A failed bootstrap is logged and leaves the cache partially populated;
    /// lookups then report an insufficient population.
    pub async fn init(store: Arc<dyn BackingStore>, structure: &StructureTable) -> Result<Self> {
        let dialect = store.dialect();
        let migrations =
            schema::migrations(dialect).ok_or(TenantsCacheError::UnsupportedDialect(dialect))?;

        let cache = Self::new(store, structure);
        cache.migrate(&migrations).await?;

        match cache.populate().await {
            Ok(summary) => info!(
                "Tenants cache populated: {} tenants, {} CTI entities, max id {}, level ceiling {}",
                summary.tenants, summary.ctis, summary.max_id, summary.level_ceiling
            ),
            Err(e) => warn!("Tenants cache population aborted: {}", e),
        }
        Ok(cache)
    }

    async fn migrate(&self, migrations: &[Migration]) -> Result<()> {
        for migration in migrations {
            if self.store.table_exists(migration.table).await? {
                debug!("Table '{}' already exists", migration.table);
                continue;
            }
            info!("Creating table: {}", migration.table);
            for statement in &migration.statements {
                debug!("DDL: {}", statement);
            }
            self.store.apply_migration(migration).await?;
        }

        // A previous seed may have failed after the tables were created.
        if !self.has_root().await? {
            self.seed_root().await?;
        }
        Ok(())
    }

    async fn has_root(&self) -> Result<bool> {
        let roots = self.store.query(SelectQuery::RootTenant).await?;
        Ok(!roots.is_empty())
    }

    async fn seed_root(&self) -> Result<()> {
        let root = TenantNode::root(uuid_v4(&mut rand::thread_rng()).to_string());
        let edges = Lineage::of_root(&root).closure_edges();
        self.store
            .run_in_transaction(&[
                schema::tenant_batch(std::slice::from_ref(&root)),
                schema::closure_batch(&edges),
            ])
            .await?;
        info!("Seeded root tenant {}", root.uuid);
        Ok(())
    }

    /// Synthesize, persist and cache a new tenant. Returns its uuid.
    pub async fn create_tenant(&self) -> Result<String> {
        let node = {
            let mut rng = rand::thread_rng();
            self.synthesizer.synthesize(&mut rng)?
        };
        let parent = self
            .lineages
            .get(&node.parent_id)
            .map(|lineage| Arc::clone(lineage.value()))
            .ok_or(TenantsCacheError::UnknownParent(node.parent_id))?;
        let lineage = Lineage::child_of(&parent, &node);

        self.store
            .run_in_transaction(&[
                schema::tenant_batch(std::slice::from_ref(&node)),
                schema::closure_batch(&lineage.closure_edges()),
            ])
            .await?;

        self.register_tenant(&node, Arc::new(lineage));
        Ok(node.uuid)
    }

    /// Cache a committed tenant and make it available as a parent.
    pub(crate) fn register_tenant(&self, node: &TenantNode, lineage: Arc<Lineage>) {
        self.lineages.insert(node.id, lineage);
        self.ids_by_uuid.insert(node.uuid.clone(), node.id);
        self.all.push(node.uuid.clone());
        match node.kind {
            TenantKind::Customer => self.customers.push(node.uuid.clone()),
            TenantKind::Partner => self.partners.push(node.uuid.clone()),
            _ => {}
        }
        self.synthesizer.register(node);
    }

    /// Persist and cache a random CTI entity. Returns its uuid.
    pub async fn create_cti_entity(&self) -> Result<String> {
        let entity = {
            let mut rng = rand::thread_rng();
            random_cti_entity(&mut rng)
        };
        self.store
            .run_in_transaction(&[schema::cti_batch(std::slice::from_ref(&entity))])
            .await?;
        self.ctis.push(entity.uuid.clone());
        Ok(entity.uuid)
    }

    /// Random tenant uuid from the working set, biased toward the oldest entries.
    pub fn get_random_tenant_uuid(&self, requested: usize, filter: TenantFilter) -> Result<String> {
        let (list, entity) = match filter {
            TenantFilter::All => (&self.all, "tenants"),
            TenantFilter::Customers => (&self.customers, "customers"),
            TenantFilter::Partners => (&self.partners, "partners"),
        };
        let limit = self.tenants_working_set.load(Ordering::Acquire);
        sample_list(list, entity, "create-tenants", requested, limit)
    }

    /// Random CTI entity uuid from the working set, biased toward the oldest entries.
    pub fn get_random_cti_uuid(&self, requested: usize) -> Result<String> {
        let limit = self.ctis_working_set.load(Ordering::Acquire);
        sample_list(&self.ctis, "CTI entities", "create-ctis", requested, limit)
    }

    /// Derive a sub-resource id bound to `tenant_uuid`, one of `cardinality` per tenant.
    ///
    /// `cardinality` is clamped to `1..=MAX_BOUND_CARDINALITY`.
    pub fn get_tenant_uuid_bound_id(&self, tenant_uuid: &str, cardinality: u64) -> String {
        let cardinality = cardinality.clamp(1, MAX_BOUND_CARDINALITY);
        let draw = rand::thread_rng().gen_range(0..cardinality);
        bound_id(tenant_uuid, draw)
    }

    pub fn set_tenants_working_set(&self, limit: usize) {
        self.tenants_working_set.store(limit, Ordering::Release);
    }

    pub fn set_ctis_working_set(&self, limit: usize) {
        self.ctis_working_set.store(limit, Ordering::Release);
    }

    /// Ancestor uuids of a cached tenant, nearest first.
    pub fn parent_chain(&self, tenant_uuid: &str) -> Option<Vec<String>> {
        self.lineage(tenant_uuid).map(|l| l.ancestor_uuids())
    }

    pub fn lineage(&self, tenant_uuid: &str) -> Option<Arc<Lineage>> {
        let id = *self.ids_by_uuid.get(tenant_uuid)?;
        self.lineages.get(&id).map(|l| Arc::clone(l.value()))
    }

    pub fn tenant_count(&self) -> usize {
        self.all.len()
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    pub fn partner_count(&self) -> usize {
        self.partners.len()
    }

    pub fn cti_count(&self) -> usize {
        self.ctis.len()
    }

    pub fn current_max_level(&self) -> u32 {
        self.synthesizer.current_max_level()
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.synthesizer.index();
        let buckets = (0..=self.synthesizer.sampler().max_level())
            .flat_map(|level| TenantKind::ALL.into_iter().map(move |kind| (level, kind)))
            .map(|(level, kind)| (level, kind, index.count(level, kind)))
            .filter(|(_, _, count)| *count > 0)
            .collect();

        CacheStats {
            tenants: self.tenant_count(),
            customers: self.customer_count(),
            partners: self.partner_count(),
            ctis: self.cti_count(),
            current_id: self.synthesizer.current_id(),
            level_ceiling: self.current_max_level(),
            buckets,
        }
    }
}

fn sample_list(
    list: &UuidList,
    entity: &'static str,
    workload: &'static str,
    requested: usize,
    limit: usize,
) -> Result<String> {
    let available = list.len();
    if available == 0 {
        return Err(TenantsCacheError::EmptyPopulation { entity, workload });
    }
    // An explicit request is checked against the population before the
    // working set narrows it.
    if requested > available {
        return Err(TenantsCacheError::WorkingSetTooLarge {
            entity,
            available,
            required: requested,
        });
    }

    let cardinality = working_set_cardinality(requested, limit, available);
    if available < cardinality {
        return Err(TenantsCacheError::WorkingSetTooLarge {
            entity,
            available,
            required: cardinality,
        });
    }

    let idx = exp_index(&mut rand::thread_rng(), cardinality);
    list.get(idx)
        .ok_or(TenantsCacheError::EmptyPopulation { entity, workload })
}
