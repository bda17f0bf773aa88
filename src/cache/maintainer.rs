// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental updates applied when content or permissions change.
//!
//! Each operation localizes its work to the touched node plus the parent
//! chain above it; none of them rebuilds the views. Unknown node references
//! are tolerated: removals become no-ops, additions register the missing
//! structure implicitly and then apply.

use std::collections::HashSet;

use tracing::debug;

use crate::classifier::classify;
use crate::node::{CollectionId, CollectionRef, CommunityId, CommunityRef, GroupId, NodeId, PrincipalId};
use crate::traits::ContentStore;

use super::builder;
use super::views::{Views, push_unique, remove_item};

impl Views {
    /// A collection appeared (or re-appeared) under its parent communities.
    pub(crate) fn collection_added<S: ContentStore>(&mut self, store: &S, collection: &CollectionRef) {
        for &parent in &collection.parents {
            if !self.known_community(parent) {
                debug!(
                    "collection {} added under unknown {}, registering parent implicitly",
                    collection.id, parent
                );
                self.register_community(&CommunityRef {
                    id: parent,
                    parent: None,
                });
            }
            push_unique(self.col_admin.entry(parent).or_default(), collection.id);
        }
        self.col_parents
            .insert(collection.id, collection.parents.clone());

        let classification = classify(collection);
        self.apply_derived_sets(collection.id, classification);

        if classification.visible {
            self.revoke_node(NodeId::Collection(collection.id));
            for &parent in &collection.parents {
                let parent_was_visible = self.community_visible(parent);
                push_unique(self.col_anon.entry(parent).or_default(), collection.id);
                if !parent_was_visible {
                    self.revoke_node(NodeId::Community(parent));
                }
                self.attach_visible_upward(parent);
            }
        } else {
            self.grant_collection(store, collection.id);
        }
    }

    /// A collection disappeared. Works entirely from retained containment
    /// links, so it also applies when the store has already forgotten the
    /// collection.
    pub(crate) fn collection_removed<S: ContentStore>(&mut self, store: &S, collection: CollectionId) {
        let Some(parents) = self.col_parents.remove(&collection) else {
            debug!("removal of unknown {} ignored", collection);
            return;
        };

        for parent in parents {
            if let Some(children) = self.col_admin.get_mut(&parent) {
                // Admin entries stay even when they become empty; only an
                // explicit community removal deletes them.
                remove_item(children, &collection);
            }

            let mut was_visible_here = false;
            if let Some(children) = self.col_anon.get_mut(&parent) {
                was_visible_here = remove_item(children, &collection);
                if children.is_empty() {
                    self.col_anon.remove(&parent);
                }
            }
            if was_visible_here {
                self.maybe_hide_community(store, parent);
            }
        }

        self.empty.remove(&collection);
        self.private.remove(&collection);
        for set in self.scoped.values_mut() {
            set.remove(&collection);
        }
        self.revoke_node(NodeId::Collection(collection));
    }

    /// A collection's attributes changed: item count, public flag, scope
    /// tag or privacy flag. Reclassifies and flips anonymous visibility,
    /// propagating through ancestors in both directions, and recomputes the
    /// collection's authorization entries.
    pub(crate) fn collection_changed<S: ContentStore>(&mut self, store: &S, collection: &CollectionRef) {
        if !self.col_parents.contains_key(&collection.id) {
            debug!("change for unknown {} treated as add", collection.id);
            self.collection_added(store, collection);
            return;
        }

        let classification = classify(collection);
        self.apply_derived_sets(collection.id, classification);

        let parents = self
            .col_parents
            .get(&collection.id)
            .cloned()
            .unwrap_or_default();
        let was_visible = self.collection_visible(collection.id);

        if classification.visible {
            self.revoke_node(NodeId::Collection(collection.id));
            if !was_visible {
                for &parent in &parents {
                    let parent_was_visible = self.community_visible(parent);
                    push_unique(self.col_anon.entry(parent).or_default(), collection.id);
                    if !parent_was_visible {
                        self.revoke_node(NodeId::Community(parent));
                    }
                    self.attach_visible_upward(parent);
                }
            }
        } else {
            if was_visible {
                for &parent in &parents {
                    let mut was_visible_here = false;
                    if let Some(children) = self.col_anon.get_mut(&parent) {
                        was_visible_here = remove_item(children, &collection.id);
                        if children.is_empty() {
                            self.col_anon.remove(&parent);
                        }
                    }
                    if was_visible_here {
                        self.maybe_hide_community(store, parent);
                    }
                }
            }
            // Hidden either way: recompute the entries from current groups.
            self.revoke_node(NodeId::Collection(collection.id));
            self.grant_collection(store, collection.id);
        }
    }

    /// A community appeared. The store may already report children under
    /// it, so the whole subtree is indexed, then attached upward if
    /// anything in it is visible.
    pub(crate) fn community_added<S: ContentStore>(&mut self, store: &S, community: &CommunityRef) {
        builder::index_subtree(store, self, community);
        if self.community_visible(community.id) {
            self.attach_visible_upward(community.id);
        }
    }

    /// A community disappeared, taking its entire subtree with it. Every
    /// descendant community vanishes from all structures; a descendant
    /// collection vanishes entirely unless it also sits under a community
    /// outside the removed subtree, in which case it merely loses the
    /// removed parents.
    pub(crate) fn community_removed<S: ContentStore>(&mut self, store: &S, community: CommunityId) {
        if !self.known_community(community) {
            debug!("removal of unknown {} ignored", community);
            return;
        }

        // Collect the subtree from the admin map, loop-safe.
        let mut subtree: Vec<CommunityId> = Vec::new();
        let mut seen: HashSet<CommunityId> = HashSet::new();
        let mut queue = vec![community];
        while let Some(current) = queue.pop() {
            if !seen.insert(current) {
                continue;
            }
            subtree.push(current);
            queue.extend(self.comm_admin.get(&current).cloned().unwrap_or_default());
        }

        // Settle the fate of every collection under the subtree.
        let mut collections: HashSet<CollectionId> = HashSet::new();
        for comm in &subtree {
            collections.extend(self.col_admin.get(comm).cloned().unwrap_or_default());
        }
        for collection in collections {
            let parents = self.col_parents.get(&collection).cloned().unwrap_or_default();
            let surviving: Vec<CommunityId> = parents
                .into_iter()
                .filter(|parent| !seen.contains(parent))
                .collect();
            if surviving.is_empty() {
                self.empty.remove(&collection);
                self.private.remove(&collection);
                for set in self.scoped.values_mut() {
                    set.remove(&collection);
                }
                self.col_parents.remove(&collection);
                self.revoke_node(NodeId::Collection(collection));
            } else {
                self.col_parents.insert(collection, surviving);
                if !self.collection_visible(collection) {
                    // Administrators of the removed parents no longer count.
                    self.revoke_node(NodeId::Collection(collection));
                    self.grant_collection(store, collection);
                }
            }
        }

        let parent = self.comm_parent.get(&community).copied().flatten();

        for comm in &subtree {
            self.col_admin.remove(comm);
            self.comm_admin.remove(comm);
            self.col_anon.remove(comm);
            self.comm_anon.remove(comm);
            self.comm_parent.remove(comm);
            self.revoke_node(NodeId::Community(*comm));
        }

        if let Some(parent) = parent {
            if let Some(children) = self.comm_admin.get_mut(&parent) {
                remove_item(children, &community);
            }
            let mut was_visible_here = false;
            if let Some(children) = self.comm_anon.get_mut(&parent) {
                was_visible_here = remove_item(children, &community);
                if children.is_empty() {
                    self.comm_anon.remove(&parent);
                }
            }
            if was_visible_here {
                self.maybe_hide_community(store, parent);
            }
        }
    }

    /// A principal entered or left a group. Only the hidden nodes recorded
    /// against that group in the reverse index are touched: an addition
    /// grants the principal each of them; a removal drops a pair only after
    /// re-resolving the node confirms no other path still authorizes the
    /// principal.
    pub(crate) fn membership_changed<S: ContentStore>(
        &mut self,
        store: &S,
        group: GroupId,
        principal: PrincipalId,
        added: bool,
    ) {
        let Some(nodes) = self.authorizing_groups.get(&group).cloned() else {
            debug!("{} authorizes no hidden nodes, membership change ignored", group);
            return;
        };

        if added {
            self.authorized.entry(principal).or_default().extend(&nodes);
            return;
        }

        for node in nodes {
            let still_authorized = match node {
                NodeId::Collection(collection) => self
                    .resolve_collection_authorizers(store, collection, false)
                    .contains(&principal),
                NodeId::Community(community) => self
                    .resolve_community_authorizers(store, community, false)
                    .contains(&principal),
            };
            if still_authorized {
                continue;
            }
            if let Some(set) = self.authorized.get_mut(&principal) {
                set.remove(&node);
                if set.is_empty() {
                    self.authorized.remove(&principal);
                }
            }
        }
    }
}
