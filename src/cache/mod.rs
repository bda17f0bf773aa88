// SPDX-License-Identifier: MIT OR Apache-2.0

//! The synchronized cache handle.
//!
//! [`FrontList`] owns the content store handle and the views behind one
//! read-write lock. Readers share the lock; every incremental operation runs
//! inside a single write-lock scope, so a reader never observes a mutation
//! with its ancestor propagation half applied.
//!
//! The initial build is guarded to run at most once per process: the first
//! caller of [`warm`](FrontList::warm) builds while concurrent callers block
//! on the lock and then find the built flag set. Only an explicit
//! [`invalidate`](FrontList::invalidate) re-arms the build.

mod builder;
mod maintainer;
#[cfg(test)]
mod tests;
mod views;

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::classifier::Scope;
use crate::node::{CollectionId, CollectionRef, CommunityId, CommunityRef, GroupId, NodeId, PrincipalId};
use crate::traits::ContentStore;

use views::{Views, push_unique};

/// A parent→children slice of the tree as served to one principal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrontListView {
    pub collections: HashMap<CommunityId, Vec<CollectionId>>,
    pub communities: HashMap<CommunityId, Vec<CommunityId>>,
}

#[derive(Debug, Default)]
struct CacheState {
    built: bool,
    views: Views,
}

/// The visibility cache over a community/collection tree.
///
/// Constructed once at warm-up and injected into both the web tier (reads)
/// and the collaborators producing change events (writes).
#[derive(Debug)]
pub struct FrontList<S> {
    store: S,
    state: RwLock<CacheState>,
}

impl<S: ContentStore> FrontList<S> {
    /// Create an unbuilt cache around a content store handle.
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: RwLock::new(CacheState::default()),
        }
    }

    // Poisoned locks are recovered: a panicked writer leaves at worst a
    // stale view, which the eventual-consistency window already permits.
    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the views if they have not been built yet. Returns true if
    /// this call performed the build.
    pub fn warm(&self) -> bool {
        if self.read().built {
            return false;
        }

        let mut state = self.write();
        if state.built {
            return false;
        }
        builder::build(&self.store, &mut state.views);
        state.built = true;
        state.views.debug_check_invariants();
        true
    }

    /// Discard the views; the next [`warm`](Self::warm) rebuilds.
    pub fn invalidate(&self) {
        let mut state = self.write();
        state.built = false;
        state.views = Views::default();
    }

    /// True once a build has completed and not been invalidated.
    pub fn is_built(&self) -> bool {
        self.read().built
    }

    fn with_views(&self, op: impl FnOnce(&mut Views, &S)) {
        let mut state = self.write();
        if !state.built {
            debug!("change event before first build ignored, the build will capture it");
            return;
        }
        op(&mut state.views, &self.store);
        state.views.debug_check_invariants();
    }

    /// A collection was created or newly attached to its parents.
    pub fn on_collection_added(&self, collection: &CollectionRef) {
        self.with_views(|views, store| views.collection_added(store, collection));
    }

    /// A collection was deleted.
    pub fn on_collection_removed(&self, collection: CollectionId) {
        self.with_views(|views, store| views.collection_removed(store, collection));
    }

    /// A collection's visibility-relevant attributes changed: item count,
    /// public flag, scope tag, privacy flag, or its permission groups.
    pub fn on_collection_changed(&self, collection: &CollectionRef) {
        self.with_views(|views, store| views.collection_changed(store, collection));
    }

    /// A community was created; any children the store already reports
    /// under it are indexed along with it.
    pub fn on_community_added(&self, community: &CommunityRef) {
        self.with_views(|views, store| views.community_added(store, community));
    }

    /// A community was deleted together with its whole subtree.
    pub fn on_community_removed(&self, community: CommunityId) {
        self.with_views(|views, store| views.community_removed(store, community));
    }

    /// A principal was added to or removed from a group.
    pub fn on_membership_changed(&self, group: GroupId, principal: PrincipalId, added: bool) {
        self.with_views(|views, store| views.membership_changed(store, group, principal, added));
    }

    /// The tree as one principal sees it.
    ///
    /// Site administrators get the complete administrative view. Anonymous
    /// visitors get the anonymous view. An authenticated principal gets the
    /// anonymous view plus every hidden node they are authorized for,
    /// placed under its administrative parents with hidden ancestor
    /// communities bridged in so each merged node is reachable from a root.
    pub fn visible_tree(&self, principal: Option<PrincipalId>, site_admin: bool) -> FrontListView {
        let state = self.read();
        let views = &state.views;

        if site_admin {
            return FrontListView {
                collections: views.col_admin.clone(),
                communities: views.comm_admin.clone(),
            };
        }

        let mut view = FrontListView {
            collections: views.col_anon.clone(),
            communities: views.comm_anon.clone(),
        };

        let Some(principal) = principal else {
            return view;
        };
        let Some(nodes) = views.authorized.get(&principal) else {
            return view;
        };

        let mut nodes: Vec<NodeId> = nodes.iter().copied().collect();
        nodes.sort();
        for node in nodes {
            match node {
                NodeId::Collection(collection) => {
                    let parents = views
                        .col_parents
                        .get(&collection)
                        .cloned()
                        .unwrap_or_default();
                    for parent in parents {
                        push_unique(view.collections.entry(parent).or_default(), collection);
                        bridge_to_root(views, &mut view, parent);
                    }
                }
                NodeId::Community(community) => {
                    bridge_to_root(views, &mut view, community);
                }
            }
        }

        view
    }

    /// True if the principal may see the given hidden node.
    pub fn is_authorized_for_hidden_node(&self, principal: PrincipalId, node: NodeId) -> bool {
        self.read()
            .views
            .authorized
            .get(&principal)
            .is_some_and(|nodes| nodes.contains(&node))
    }

    /// Every hidden node the principal may see.
    pub fn hidden_nodes_for(&self, principal: PrincipalId) -> HashSet<NodeId> {
        self.read()
            .views
            .authorized
            .get(&principal)
            .cloned()
            .unwrap_or_default()
    }

    /// Collections currently holding no items.
    pub fn empty_collections(&self) -> HashSet<CollectionId> {
        self.read().views.empty.clone()
    }

    /// Collections currently flagged private.
    pub fn private_collections(&self) -> HashSet<CollectionId> {
        self.read().views.private.clone()
    }

    /// Collections currently carrying the given scope tag.
    pub fn scoped_collections(&self, scope: Scope) -> HashSet<CollectionId> {
        self.read()
            .views
            .scoped
            .get(&scope)
            .cloned()
            .unwrap_or_default()
    }

    /// All child collections of a community, visibility ignored.
    pub fn admin_collections(&self, community: CommunityId) -> Vec<CollectionId> {
        self.read()
            .views
            .col_admin
            .get(&community)
            .cloned()
            .unwrap_or_default()
    }

    /// All child sub-communities of a community, visibility ignored.
    pub fn admin_communities(&self, community: CommunityId) -> Vec<CommunityId> {
        self.read()
            .views
            .comm_admin
            .get(&community)
            .cloned()
            .unwrap_or_default()
    }

    /// Anonymously visible child collections of a community.
    pub fn anon_collections(&self, community: CommunityId) -> Vec<CollectionId> {
        self.read()
            .views
            .col_anon
            .get(&community)
            .cloned()
            .unwrap_or_default()
    }

    /// Anonymously visible child sub-communities of a community.
    pub fn anon_communities(&self, community: CommunityId) -> Vec<CommunityId> {
        self.read()
            .views
            .comm_anon
            .get(&community)
            .cloned()
            .unwrap_or_default()
    }
}

/// Make a community reachable in the merged view by inserting it (and every
/// ancestor) into its parent's child list, stopping at the first ancestor
/// that is already present.
fn bridge_to_root(views: &Views, view: &mut FrontListView, start: CommunityId) {
    let mut community = start;
    let mut seen = HashSet::new();

    while seen.insert(community) {
        let Some(parent) = views.comm_parent.get(&community).copied().flatten() else {
            break;
        };
        if !push_unique(view.communities.entry(parent).or_default(), community) {
            break;
        }
        community = parent;
    }
}
