// SPDX-License-Identifier: MIT OR Apache-2.0

//! The owned index structures behind the cache and their mutation helpers.
//!
//! `Views` holds everything the cache knows: the complete and the filtered
//! parent→children maps, the derived collection sets, the per-principal
//! authorization index with its reverse group index, and the containment
//! links retained so removals never have to consult the store for nodes
//! which may already be gone from it.
//!
//! All helpers here mutate a single `Views` value and are called with the
//! cache's write lock held; none of them synchronize on their own. Upward
//! walks over parent links are explicit worklists with a visited set, so a
//! misconfigured parent loop degrades into a logged warning instead of a
//! hang.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::classifier::{Classification, Scope};
use crate::node::{CollectionId, CommunityId, CommunityRef, GroupId, NodeId, PrincipalId};
use crate::traits::ContentStore;

/// Append an item unless it is already present. Returns true on insertion.
pub(crate) fn push_unique<T: PartialEq>(vec: &mut Vec<T>, item: T) -> bool {
    if vec.contains(&item) {
        false
    } else {
        vec.push(item);
        true
    }
}

/// Remove the first occurrence of an item, preserving order. Returns true if
/// something was removed.
pub(crate) fn remove_item<T: PartialEq>(vec: &mut Vec<T>, item: &T) -> bool {
    match vec.iter().position(|existing| existing == item) {
        Some(index) => {
            vec.remove(index);
            true
        }
        None => false,
    }
}

#[derive(Debug, Default)]
pub(crate) struct Views {
    /// Every child collection under every community, visibility ignored.
    /// A key exists for every known community, even a childless one.
    pub(crate) col_admin: HashMap<CommunityId, Vec<CollectionId>>,

    /// Every child sub-community under every community.
    pub(crate) comm_admin: HashMap<CommunityId, Vec<CommunityId>>,

    /// Anonymously visible child collections. Keys exist only while they
    /// have at least one visible child.
    pub(crate) col_anon: HashMap<CommunityId, Vec<CollectionId>>,

    /// Anonymously visible child sub-communities, same key policy.
    pub(crate) comm_anon: HashMap<CommunityId, Vec<CommunityId>>,

    /// Collections with no items.
    pub(crate) empty: HashSet<CollectionId>,

    /// Collections flagged private.
    pub(crate) private: HashSet<CollectionId>,

    /// Collections carrying a recognized non-public scope tag.
    pub(crate) scoped: HashMap<Scope, HashSet<CollectionId>>,

    /// Hidden nodes each principal may see regardless.
    pub(crate) authorized: HashMap<PrincipalId, HashSet<NodeId>>,

    /// For every group that turned up while resolving a hidden node's
    /// principals (administrator, submitter, ancestor administrator, or any
    /// group nested inside one of those), the hidden nodes depending on it.
    pub(crate) authorizing_groups: HashMap<GroupId, HashSet<NodeId>>,

    /// Parent link of every known community. `None` for top-level
    /// communities and for communities only known through an implicit
    /// insert.
    pub(crate) comm_parent: HashMap<CommunityId, Option<CommunityId>>,

    /// Containing communities of every known collection.
    pub(crate) col_parents: HashMap<CollectionId, Vec<CommunityId>>,
}

impl Views {
    pub(crate) fn known_community(&self, community: CommunityId) -> bool {
        self.comm_parent.contains_key(&community)
    }

    /// A community is anonymously visible exactly while it has an entry in
    /// either anonymous map.
    pub(crate) fn community_visible(&self, community: CommunityId) -> bool {
        self.col_anon.contains_key(&community) || self.comm_anon.contains_key(&community)
    }

    /// A collection is anonymously visible while any parent lists it.
    pub(crate) fn collection_visible(&self, collection: CollectionId) -> bool {
        self.col_anon
            .values()
            .any(|children| children.contains(&collection))
    }

    /// Record a community and its containment: parent link, admin map
    /// entries for the community itself, membership in the parent's admin
    /// child list. Idempotent; an unknown parent is registered implicitly
    /// with no parent link of its own.
    pub(crate) fn register_community(&mut self, community: &CommunityRef) {
        self.comm_parent.insert(community.id, community.parent);
        self.col_admin.entry(community.id).or_default();
        self.comm_admin.entry(community.id).or_default();

        if let Some(parent) = community.parent {
            if !self.known_community(parent) {
                debug!(
                    "community {} added under unknown parent {}, registering parent implicitly",
                    community.id, parent
                );
                self.comm_parent.insert(parent, None);
                self.col_admin.entry(parent).or_default();
            }
            push_unique(self.comm_admin.entry(parent).or_default(), community.id);
        }
    }

    /// Keep the derived sets in line with a fresh classification.
    pub(crate) fn apply_derived_sets(
        &mut self,
        collection: CollectionId,
        classification: Classification,
    ) {
        if classification.empty {
            self.empty.insert(collection);
        } else {
            self.empty.remove(&collection);
        }

        if classification.private {
            self.private.insert(collection);
        } else {
            self.private.remove(&collection);
        }

        for scope in Scope::ALL {
            let set = self.scoped.entry(scope).or_default();
            if classification.scope == Some(scope) {
                set.insert(collection);
            } else {
                set.remove(&collection);
            }
        }
    }

    /// Walk the parent chain from a visible community, attaching it (and any
    /// ancestor that thereby becomes visible) to the anonymous view. Stops
    /// at the first ancestor that was already attached.
    pub(crate) fn attach_visible_upward(&mut self, start: CommunityId) {
        let mut community = start;
        let mut seen = HashSet::new();

        loop {
            if !seen.insert(community) {
                warn!("parent loop detected above {}", start);
                break;
            }
            let Some(parent) = self.comm_parent.get(&community).copied().flatten() else {
                break;
            };
            let parent_was_visible = self.community_visible(parent);
            if !push_unique(self.comm_anon.entry(parent).or_default(), community) {
                break;
            }
            if !parent_was_visible {
                // The parent just became visible, so it no longer belongs in
                // the authorization index.
                self.revoke_node(NodeId::Community(parent));
            }
            community = parent;
        }
    }

    /// Walk the parent chain from a community that may just have lost its
    /// last visible child. Every ancestor that thereby becomes invisible is
    /// detached from the anonymous view and granted authorization entries,
    /// since its administrators must still reach it.
    pub(crate) fn maybe_hide_community<S: ContentStore>(&mut self, store: &S, start: CommunityId) {
        let mut community = start;
        let mut seen = HashSet::new();

        loop {
            if !seen.insert(community) {
                warn!("parent loop detected above {}", start);
                break;
            }
            if self.community_visible(community) {
                break;
            }
            if self.known_community(community) {
                self.grant_community(store, community);
            }

            let Some(parent) = self.comm_parent.get(&community).copied().flatten() else {
                break;
            };
            let mut detached = false;
            if let Some(children) = self.comm_anon.get_mut(&parent) {
                detached = remove_item(children, &community);
                if children.is_empty() {
                    self.comm_anon.remove(&parent);
                }
            }
            if !detached {
                break;
            }
            community = parent;
        }
    }

    /// Resolve every principal allowed to see a hidden collection:
    /// administrator group members, submitter group members, and
    /// administrators of every containing community, each expanded through
    /// nested groups.
    pub(crate) fn resolve_collection_authorizers<S: ContentStore>(
        &mut self,
        store: &S,
        collection: CollectionId,
        register: bool,
    ) -> HashSet<PrincipalId> {
        let mut groups = Vec::new();

        match store.collection_administrators(collection) {
            Ok(group) => groups.extend(group),
            Err(err) => warn!("administrators of {} unavailable: {err}", collection),
        }
        match store.collection_submitters(collection) {
            Ok(group) => groups.extend(group),
            Err(err) => warn!("submitters of {} unavailable: {err}", collection),
        }

        // Administering a community grants visibility into every hidden
        // descendant, so the chain runs from each containing community all
        // the way to its root.
        let parents = self.col_parents.get(&collection).cloned().unwrap_or_default();
        for parent in parents {
            self.community_admin_chain(store, parent, &mut groups);
        }

        self.expand_groups(store, groups, NodeId::Collection(collection), register)
    }

    /// Collect the administrator groups of a community and of every
    /// ancestor above it, loop-safe.
    fn community_admin_chain<S: ContentStore>(
        &self,
        store: &S,
        start: CommunityId,
        groups: &mut Vec<GroupId>,
    ) {
        let mut current = start;
        let mut seen = HashSet::from([start]);

        loop {
            match store.community_administrators(current) {
                Ok(group) => groups.extend(group),
                Err(err) => warn!("administrators of {} unavailable: {err}", current),
            }
            let Some(parent) = self.comm_parent.get(&current).copied().flatten() else {
                break;
            };
            if !seen.insert(parent) {
                warn!("parent loop detected above {}", start);
                break;
            }
            current = parent;
        }
    }

    /// Resolve every principal allowed to see a hidden community: its own
    /// administrator group plus the administrator groups of every strict
    /// ancestor, each expanded through nested groups.
    pub(crate) fn resolve_community_authorizers<S: ContentStore>(
        &mut self,
        store: &S,
        community: CommunityId,
        register: bool,
    ) -> HashSet<PrincipalId> {
        let mut groups = Vec::new();
        self.community_admin_chain(store, community, &mut groups);

        self.expand_groups(store, groups, NodeId::Community(community), register)
    }

    /// Expand a set of groups into principals, following nested member
    /// groups. A group already expanded in this resolution contributes
    /// nothing further, which terminates cyclic membership. With `register`
    /// set, every group reached is recorded in the reverse index against
    /// `node`.
    fn expand_groups<S: ContentStore>(
        &mut self,
        store: &S,
        roots: Vec<GroupId>,
        node: NodeId,
        register: bool,
    ) -> HashSet<PrincipalId> {
        let mut principals = HashSet::new();
        let mut visited: HashSet<GroupId> = HashSet::new();
        let mut worklist = roots;

        while let Some(group) = worklist.pop() {
            if !visited.insert(group) {
                debug!("group {} reached twice while resolving {}", group, node);
                continue;
            }
            if register {
                self.authorizing_groups.entry(group).or_default().insert(node);
            }
            match store.group_members(group) {
                Ok(members) => {
                    principals.extend(members.principals);
                    worklist.extend(members.groups);
                }
                Err(err) => warn!("membership of {} unavailable: {err}", group),
            }
        }

        principals
    }

    /// Insert authorization entries for a hidden collection.
    pub(crate) fn grant_collection<S: ContentStore>(&mut self, store: &S, collection: CollectionId) {
        let principals = self.resolve_collection_authorizers(store, collection, true);
        for principal in principals {
            self.authorized
                .entry(principal)
                .or_default()
                .insert(NodeId::Collection(collection));
        }
    }

    /// Insert authorization entries for a hidden community.
    pub(crate) fn grant_community<S: ContentStore>(&mut self, store: &S, community: CommunityId) {
        let principals = self.resolve_community_authorizers(store, community, true);
        for principal in principals {
            self.authorized
                .entry(principal)
                .or_default()
                .insert(NodeId::Community(community));
        }
    }

    /// Drop every authorization trace of a node: from each principal's set
    /// (dropping principals left with nothing) and from the reverse group
    /// index (dropping groups that authorize nothing anymore).
    pub(crate) fn revoke_node(&mut self, node: NodeId) {
        self.authorized.retain(|_, nodes| {
            nodes.remove(&node);
            !nodes.is_empty()
        });
        self.authorizing_groups.retain(|_, nodes| {
            nodes.remove(&node);
            !nodes.is_empty()
        });
    }

    /// Assert the structural invariants. Compiled to nothing in release
    /// builds; fatal under test, matching the propagation policy.
    pub(crate) fn debug_check_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            for (parent, children) in &self.col_anon {
                debug_assert!(
                    !children.is_empty(),
                    "anon collection entry for {} is empty",
                    parent
                );
                let admin = self.col_admin.get(parent);
                for collection in children {
                    debug_assert!(
                        admin.is_some_and(|all| all.contains(collection)),
                        "{} visible under {} but missing from the admin view",
                        collection,
                        parent
                    );
                }
            }

            for (parent, children) in &self.comm_anon {
                debug_assert!(
                    !children.is_empty(),
                    "anon community entry for {} is empty",
                    parent
                );
                let admin = self.comm_admin.get(parent);
                for community in children {
                    debug_assert!(
                        admin.is_some_and(|all| all.contains(community)),
                        "{} visible under {} but missing from the admin view",
                        community,
                        parent
                    );
                }
            }

            for (principal, nodes) in &self.authorized {
                debug_assert!(!nodes.is_empty(), "empty authorization set for {}", principal);
                for node in nodes {
                    let hidden = match node {
                        NodeId::Collection(collection) => !self.collection_visible(*collection),
                        NodeId::Community(community) => !self.community_visible(*community),
                    };
                    debug_assert!(
                        hidden,
                        "{} is anonymously visible but authorized for {}",
                        node, principal
                    );
                }
            }
        }
    }
}
