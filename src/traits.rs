// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces onto the external content and identity store.
//!
//! The cache never owns content or group data; it reads both through
//! [`ContentStore`] during the initial build and while applying incremental
//! updates. The store is assumed synchronous. A failed fetch makes the cache
//! skip the affected subtree, it never aborts an operation.

use std::collections::HashSet;

use thiserror::Error;

use crate::node::{CollectionId, CollectionRef, CommunityId, CommunityRef, GroupId, PrincipalId};

/// Error returned by [`ContentStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("community not found: {0}")]
    CommunityNotFound(CommunityId),

    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionId),

    #[error("group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Direct membership of a group: individual principals plus nested member
/// groups. Nested groups are expanded by the cache itself, with cyclic
/// membership treated as already-expanded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupMembers {
    pub principals: HashSet<PrincipalId>,
    pub groups: HashSet<GroupId>,
}

/// Read-only view onto the persistent content and identity store.
pub trait ContentStore {
    /// All communities without a parent.
    fn top_level_communities(&self) -> Result<Vec<CommunityRef>, StoreError>;

    /// Direct child collections of a community.
    fn child_collections(&self, community: CommunityId) -> Result<Vec<CollectionRef>, StoreError>;

    /// Direct child sub-communities of a community.
    fn child_communities(&self, community: CommunityId) -> Result<Vec<CommunityRef>, StoreError>;

    /// The administrator group of a community, if one is configured.
    fn community_administrators(
        &self,
        community: CommunityId,
    ) -> Result<Option<GroupId>, StoreError>;

    /// The administrator group of a collection, if one is configured.
    fn collection_administrators(
        &self,
        collection: CollectionId,
    ) -> Result<Option<GroupId>, StoreError>;

    /// The submitter group of a collection, if one is configured.
    fn collection_submitters(
        &self,
        collection: CollectionId,
    ) -> Result<Option<GroupId>, StoreError>;

    /// Direct members of a group.
    fn group_members(&self, group: GroupId) -> Result<GroupMembers, StoreError>;
}
