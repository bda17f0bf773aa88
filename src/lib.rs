// SPDX-License-Identifier: MIT OR Apache-2.0

//! Precomputed visibility views over a community and collection tree.
//!
//! Repositories arrange content in communities which contain sub-communities
//! and collections. Which containers a visitor may see in navigation depends
//! on who they are: anonymous visitors see public (or institution-scoped)
//! collections holding at least one item, while administrators and submitters
//! may additionally see private or empty containers they are responsible for.
//! Evaluating those rules against the full tree on every page request is too
//! expensive, so this crate maintains the answer as a cache: a complete
//! "administrative" parent→children index, a filtered "anonymous" index, and
//! a per-principal index of hidden nodes a user may see anyway.
//!
//! The cache is built once from a [`ContentStore`] at process warm-up and
//! afterwards kept correct by incremental operations applied when content or
//! permissions change. It never rebuilds from scratch on its own. Reads and
//! writes are synchronized so that concurrent readers always observe a fully
//! propagated view.

pub mod cache;
pub mod classifier;
pub mod node;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;

pub use cache::{FrontList, FrontListView};
pub use classifier::{Classification, Scope, classify};
pub use node::{
    CollectionId, CollectionRef, CommunityId, CommunityRef, GroupId, NodeId, PrincipalId,
};
pub use traits::{ContentStore, GroupMembers, StoreError};
