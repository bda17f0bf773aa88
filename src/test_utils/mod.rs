// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory content store for tests and examples.
//!
//! `MemoryContentStore` is a shared handle: clones see the same data, so a
//! fixture can keep one handle for mutating the "persistent" state while
//! the cache under test holds another. Mutation helpers return the refs the
//! cache's event entry points expect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::classifier::Scope;
use crate::node::{CollectionId, CollectionRef, CommunityId, CommunityRef, GroupId, PrincipalId};
use crate::traits::{ContentStore, GroupMembers, StoreError};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

#[derive(Debug, Default)]
struct Inner {
    communities: HashMap<CommunityId, CommunityRef>,
    collections: HashMap<CollectionId, CollectionRef>,
    community_admins: HashMap<CommunityId, GroupId>,
    collection_admins: HashMap<CollectionId, GroupId>,
    collection_submitters: HashMap<CollectionId, GroupId>,
    groups: HashMap<GroupId, GroupMembers>,
    build_calls: usize,
}

/// Shared-handle in-memory store implementing [`ContentStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryContentStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of times `top_level_communities` was called; proxies "how
    /// often did a full build run".
    pub fn build_calls(&self) -> usize {
        self.lock().build_calls
    }

    pub fn add_community(&self, id: u32, parent: Option<u32>) -> CommunityRef {
        let community = CommunityRef {
            id: CommunityId(id),
            parent: parent.map(CommunityId),
        };
        self.lock().communities.insert(community.id, community.clone());
        community
    }

    pub fn add_collection(&self, collection: CollectionRef) -> CollectionRef {
        self.lock()
            .collections
            .insert(collection.id, collection.clone());
        collection
    }

    /// Replace a collection's attributes, keeping its identity.
    pub fn update_collection(&self, collection: CollectionRef) -> CollectionRef {
        self.add_collection(collection)
    }

    pub fn remove_collection(&self, id: u32) {
        let id = CollectionId(id);
        let mut inner = self.lock();
        inner.collections.remove(&id);
        inner.collection_admins.remove(&id);
        inner.collection_submitters.remove(&id);
    }

    /// Remove a community and everything beneath it.
    pub fn remove_community(&self, id: u32) {
        let root = CommunityId(id);
        let mut inner = self.lock();

        let mut queue = vec![root];
        let mut removed = Vec::new();
        while let Some(current) = queue.pop() {
            removed.push(current);
            queue.extend(
                inner
                    .communities
                    .values()
                    .filter(|community| community.parent == Some(current))
                    .map(|community| community.id),
            );
        }

        for community in &removed {
            inner.communities.remove(community);
            inner.community_admins.remove(community);
        }
        inner.collections.retain(|_, collection| {
            collection
                .parents
                .retain(|parent| !removed.contains(parent));
            !collection.parents.is_empty()
        });
    }

    pub fn set_community_admins(&self, community: u32, group: u32) {
        self.lock()
            .community_admins
            .insert(CommunityId(community), GroupId(group));
    }

    pub fn set_collection_admins(&self, collection: u32, group: u32) {
        self.lock()
            .collection_admins
            .insert(CollectionId(collection), GroupId(group));
    }

    pub fn set_collection_submitters(&self, collection: u32, group: u32) {
        self.lock()
            .collection_submitters
            .insert(CollectionId(collection), GroupId(group));
    }

    pub fn add_group(&self, id: u32, principals: &[u32], nested: &[u32]) {
        let members = GroupMembers {
            principals: principals.iter().map(|p| PrincipalId(*p)).collect(),
            groups: nested.iter().map(|g| GroupId(*g)).collect(),
        };
        self.lock().groups.insert(GroupId(id), members);
    }

    pub fn add_group_member(&self, group: u32, principal: u32) {
        self.lock()
            .groups
            .entry(GroupId(group))
            .or_default()
            .principals
            .insert(PrincipalId(principal));
    }

    pub fn remove_group_member(&self, group: u32, principal: u32) {
        if let Some(members) = self.lock().groups.get_mut(&GroupId(group)) {
            members.principals.remove(&PrincipalId(principal));
        }
    }
}

impl ContentStore for MemoryContentStore {
    fn top_level_communities(&self) -> Result<Vec<CommunityRef>, StoreError> {
        let mut inner = self.lock();
        inner.build_calls += 1;
        let mut tops: Vec<CommunityRef> = inner
            .communities
            .values()
            .filter(|community| community.parent.is_none())
            .cloned()
            .collect();
        tops.sort_by_key(|community| community.id);
        Ok(tops)
    }

    fn child_collections(&self, community: CommunityId) -> Result<Vec<CollectionRef>, StoreError> {
        let inner = self.lock();
        let mut children: Vec<CollectionRef> = inner
            .collections
            .values()
            .filter(|collection| collection.parents.contains(&community))
            .cloned()
            .collect();
        children.sort_by_key(|collection| collection.id);
        Ok(children)
    }

    fn child_communities(&self, community: CommunityId) -> Result<Vec<CommunityRef>, StoreError> {
        let inner = self.lock();
        let mut children: Vec<CommunityRef> = inner
            .communities
            .values()
            .filter(|child| child.parent == Some(community))
            .cloned()
            .collect();
        children.sort_by_key(|child| child.id);
        Ok(children)
    }

    fn community_administrators(
        &self,
        community: CommunityId,
    ) -> Result<Option<GroupId>, StoreError> {
        Ok(self.lock().community_admins.get(&community).copied())
    }

    fn collection_administrators(
        &self,
        collection: CollectionId,
    ) -> Result<Option<GroupId>, StoreError> {
        Ok(self.lock().collection_admins.get(&collection).copied())
    }

    fn collection_submitters(
        &self,
        collection: CollectionId,
    ) -> Result<Option<GroupId>, StoreError> {
        Ok(self.lock().collection_submitters.get(&collection).copied())
    }

    fn group_members(&self, group: GroupId) -> Result<GroupMembers, StoreError> {
        self.lock()
            .groups
            .get(&group)
            .cloned()
            .ok_or(StoreError::GroupNotFound(group))
    }
}

/// A public collection with the given item count.
pub fn public_collection(id: u32, parents: &[u32], item_count: u32) -> CollectionRef {
    CollectionRef {
        id: CollectionId(id),
        item_count,
        is_public: true,
        scope: None,
        is_private: false,
        parents: parents.iter().map(|p| CommunityId(*p)).collect(),
    }
}

/// A private collection, neither public nor scoped.
pub fn private_collection(id: u32, parents: &[u32], item_count: u32) -> CollectionRef {
    CollectionRef {
        id: CollectionId(id),
        item_count,
        is_public: false,
        scope: None,
        is_private: true,
        parents: parents.iter().map(|p| CommunityId(*p)).collect(),
    }
}

/// A collection listed under a non-public scope.
pub fn scoped_collection(id: u32, parents: &[u32], item_count: u32, scope: Scope) -> CollectionRef {
    CollectionRef {
        id: CollectionId(id),
        item_count,
        is_public: false,
        scope: Some(scope),
        is_private: false,
        parents: parents.iter().map(|p| CommunityId(*p)).collect(),
    }
}
