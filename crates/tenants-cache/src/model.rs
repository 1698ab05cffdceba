//! Row types persisted to the backing store and the in-memory lineage kept per tenant.

use crate::kind::TenantKind;

/// Id of the root tenant seeded on first schema creation.
pub const ROOT_TENANT_ID: i64 = 1;

/// A node of the tenant hierarchy, one row of the `tenants` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantNode {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub kind: TenantKind,
    /// Structural parent. The root is its own parent.
    pub parent_id: i64,
    pub nesting_level: u32,
    pub is_deleted: bool,
    pub parent_has_access: bool,
}

impl TenantNode {
    /// The root node: level 0, parented to itself.
    pub fn root(uuid: String) -> Self {
        Self {
            id: ROOT_TENANT_ID,
            uuid,
            name: default_name(TenantKind::Root, ROOT_TENANT_ID),
            kind: TenantKind::Root,
            parent_id: ROOT_TENANT_ID,
            nesting_level: 0,
            is_deleted: false,
            parent_has_access: true,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == self.parent_id
    }

    /// Barrier of the edge between this node and its direct parent.
    pub fn own_barrier(&self) -> i32 {
        if self.parent_has_access {
            0
        } else {
            1
        }
    }
}

pub(crate) fn default_name(kind: TenantKind, id: i64) -> String {
    format!("{kind}-{id}")
}

/// One row of the `tenant_closure` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureEdge {
    pub ancestor_id: i64,
    pub descendant_id: i64,
    pub ancestor_kind: TenantKind,
    pub barrier: i32,
}

/// One row of the `cti_entities` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtiEntity {
    pub uuid: String,
    pub cti: String,
    pub is_final: bool,
}

/// An ancestor as seen from a descendant, with the barrier of the closure edge between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    pub id: i64,
    pub uuid: String,
    pub kind: TenantKind,
    pub barrier: i32,
}

/// Cached position of a tenant in the hierarchy.
///
/// `ancestors` is ordered nearest-first and excludes the tenant itself, so its
/// length always equals `nesting_level`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
    pub id: i64,
    pub uuid: String,
    pub kind: TenantKind,
    pub nesting_level: u32,
    pub ancestors: Vec<Ancestor>,
}

impl Lineage {
    pub fn of_root(node: &TenantNode) -> Self {
        Self {
            id: node.id,
            uuid: node.uuid.clone(),
            kind: node.kind,
            nesting_level: node.nesting_level,
            ancestors: Vec::new(),
        }
    }

    /// Lineage of `child`, inheriting every ancestor of `parent`.
    pub fn child_of(parent: &Lineage, child: &TenantNode) -> Self {
        let own = child.own_barrier();
        let mut ancestors = Vec::with_capacity(parent.ancestors.len() + 1);
        ancestors.push(Ancestor {
            id: parent.id,
            uuid: parent.uuid.clone(),
            kind: parent.kind,
            barrier: own,
        });
        ancestors.extend(parent.ancestors.iter().map(|a| Ancestor {
            barrier: a.barrier.max(own),
            ..a.clone()
        }));

        Self {
            id: child.id,
            uuid: child.uuid.clone(),
            kind: child.kind,
            nesting_level: child.nesting_level,
            ancestors,
        }
    }

    /// Self edge followed by one edge per ancestor.
    pub fn closure_edges(&self) -> Vec<ClosureEdge> {
        std::iter::once(ClosureEdge {
            ancestor_id: self.id,
            descendant_id: self.id,
            ancestor_kind: self.kind,
            barrier: 0,
        })
        .chain(self.ancestors.iter().map(|a| ClosureEdge {
            ancestor_id: a.id,
            descendant_id: self.id,
            ancestor_kind: a.kind,
            barrier: a.barrier,
        }))
        .collect()
    }

    pub fn ancestor_uuids(&self) -> Vec<String> {
        self.ancestors.iter().map(|a| a.uuid.clone()).collect()
    }
}
