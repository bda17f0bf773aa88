// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full build of the views from the content store.
//!
//! One walk over the tree populates the administrative maps, the anonymous
//! maps, the derived sets and the containment links; a second pass over the
//! nodes that ended hidden populates the authorization index. The same
//! subtree walk also backs [`community_added`](super::FrontList::on_community_added),
//! which is why it takes an arbitrary root rather than only top-level
//! communities.
//!
//! A store failure never aborts a build: the affected subtree is skipped
//! with a warning and the cache self-heals when later change events touch
//! it.

use std::collections::{HashSet, VecDeque};

use tracing::warn;

use crate::classifier::classify;
use crate::node::{CollectionId, CommunityId, CommunityRef, NodeId};
use crate::traits::ContentStore;

use super::views::{Views, push_unique};

/// Build the complete views from scratch.
pub(crate) fn build<S: ContentStore>(store: &S, views: &mut Views) {
    let tops = match store.top_level_communities() {
        Ok(tops) => tops,
        Err(err) => {
            warn!("top-level communities unavailable, starting with empty views: {err}");
            return;
        }
    };

    for top in tops {
        index_subtree(store, views, &top);
    }
}

/// Index one community and everything below it: containment, admin and anon
/// maps, derived sets, and authorization entries for every node of the
/// subtree that ends up hidden.
///
/// Visibility of sub-communities resolves bottom-up: a community enters its
/// parent's anonymous child list only once the walk has decided that it has
/// a visible descendant of its own. Attachment of the subtree root to
/// communities *above* it is left to the caller, which knows whether the
/// surrounding tree existed before.
pub(crate) fn index_subtree<S: ContentStore>(store: &S, views: &mut Views, root: &CommunityRef) {
    // Discovery: breadth-first over the containment links, parents before
    // children. The visited set turns a containment loop into a warning.
    let mut order: Vec<CommunityId> = Vec::new();
    let mut seen: HashSet<CommunityId> = HashSet::new();
    let mut queue: VecDeque<CommunityRef> = VecDeque::from([root.clone()]);
    let mut hidden_collections: HashSet<CollectionId> = HashSet::new();

    while let Some(community) = queue.pop_front() {
        if !seen.insert(community.id) {
            warn!("containment loop at {}, skipping repeat visit", community.id);
            continue;
        }
        views.register_community(&community);
        order.push(community.id);

        match store.child_collections(community.id) {
            Ok(collections) => {
                for collection in collections {
                    push_unique(
                        views.col_admin.entry(community.id).or_default(),
                        collection.id,
                    );
                    let parents = views
                        .col_parents
                        .entry(collection.id)
                        .or_insert_with(|| collection.parents.clone());
                    push_unique(parents, community.id);

                    let classification = classify(&collection);
                    views.apply_derived_sets(collection.id, classification);
                    if classification.visible {
                        push_unique(
                            views.col_anon.entry(community.id).or_default(),
                            collection.id,
                        );
                        // Stale entries can exist when a known subtree is
                        // re-indexed after its data changed underneath.
                        views.revoke_node(NodeId::Collection(collection.id));
                        hidden_collections.remove(&collection.id);
                    } else {
                        hidden_collections.insert(collection.id);
                    }
                }
            }
            Err(err) => {
                warn!("collections of {} unavailable, skipping: {err}", community.id);
            }
        }

        match store.child_communities(community.id) {
            Ok(children) => queue.extend(children),
            Err(err) => {
                warn!(
                    "sub-communities of {} unavailable, skipping subtree: {err}",
                    community.id
                );
            }
        }
    }

    // Bottom-up visibility: children were discovered after their parents,
    // so the reverse discovery order sees every community only after all of
    // its descendants are settled.
    for &community in order.iter().rev() {
        if community == root.id {
            continue;
        }
        if views.community_visible(community) {
            if let Some(parent) = views.comm_parent.get(&community).copied().flatten() {
                push_unique(views.comm_anon.entry(parent).or_default(), community);
            }
        }
    }

    // Authorization entries for everything that ended hidden.
    for collection in hidden_collections {
        views.grant_collection(store, collection);
    }
    for &community in &order {
        if !views.community_visible(community) {
            views.grant_community(store, community);
        }
    }
}
