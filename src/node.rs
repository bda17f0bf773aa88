// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers and node references for the community/collection tree.

use std::fmt::{Display, Formatter};

/// Identifier of a community.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommunityId(pub u32);

impl Display for CommunityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "community:{}", self.0)
    }
}

/// Identifier of a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectionId(pub u32);

impl Display for CollectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "collection:{}", self.0)
    }
}

/// Identifier of a group of principals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupId(pub u32);

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "group:{}", self.0)
    }
}

/// Identifier of a single user evaluated for authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrincipalId(pub u32);

impl Display for PrincipalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "principal:{}", self.0)
    }
}

/// A node of the content tree, either a community or a collection.
///
/// The two identifier spaces are independent; a `NodeId` carries the kind
/// alongside the numeric id so both can live in one authorization set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeId {
    Community(CommunityId),
    Collection(CollectionId),
}

impl NodeId {
    /// Return true if this node is a community.
    pub fn is_community(&self) -> bool {
        matches!(self, NodeId::Community(_))
    }

    /// Return true if this node is a collection.
    pub fn is_collection(&self) -> bool {
        !self.is_community()
    }
}

impl From<CommunityId> for NodeId {
    fn from(id: CommunityId) -> Self {
        NodeId::Community(id)
    }
}

impl From<CollectionId> for NodeId {
    fn from(id: CollectionId) -> Self {
        NodeId::Collection(id)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeId::Community(id) => write!(f, "{}", id),
            NodeId::Collection(id) => write!(f, "{}", id),
        }
    }
}

/// A collection as reported by the content store.
///
/// A collection may sit under several communities at once; `parents` lists
/// every containing community.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectionRef {
    pub id: CollectionId,
    pub item_count: u32,
    pub is_public: bool,
    pub scope: Option<crate::classifier::Scope>,
    pub is_private: bool,
    pub parents: Vec<CommunityId>,
}

/// A community as reported by the content store.
///
/// Communities form a forest: top-level communities have no parent.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommunityRef {
    pub id: CommunityId,
    pub parent: Option<CommunityId>,
}
