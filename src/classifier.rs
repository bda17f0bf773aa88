// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of collections into visibility classes and derived sets.

use std::fmt::{Display, Formatter};

use tracing::warn;

use crate::node::CollectionRef;

/// Recognized non-public scopes under which a collection is still listed for
/// anonymous visitors.
///
/// Scopes are mutually exclusive with each other and with the public flag. A
/// scoped collection follows the same emptiness rule as a public one and is
/// additionally recorded in the scope's derived set whether or not it is
/// visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scope {
    /// Listed for visitors of the owning institution.
    Institution,

    /// Listed for members of a single school within the institution.
    School,
}

impl Scope {
    /// Every recognized scope tag.
    pub const ALL: [Scope; 2] = [Scope::Institution, Scope::School];
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Scope::Institution => "institution",
            Scope::School => "school",
        };

        write!(f, "{}", s)
    }
}

/// The outcome of classifying a single collection.
///
/// `visible` decides membership in the anonymous view. `empty`, `private`
/// and `scope` decide membership in the derived sets and are independent of
/// each other: a collection can be private and empty at the same time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub visible: bool,
    pub empty: bool,
    pub private: bool,
    pub scope: Option<Scope>,
}

impl Classification {
    /// A hidden collection needs authorization entries so that its
    /// administrators and submitters still find it in navigation.
    pub fn hidden(&self) -> bool {
        !self.visible
    }
}

/// Categorize a collection by its declared attributes.
///
/// The public flag wins over scope tags. A collection flagged both public
/// and private is inconsistent source data; it classifies as not visible and
/// the conflict is logged, never raised.
pub fn classify(collection: &CollectionRef) -> Classification {
    let empty = collection.item_count == 0;

    let listed = if collection.is_public {
        if collection.is_private {
            warn!(
                "collection {} is flagged both public and private, treating as hidden",
                collection.id
            );
            false
        } else {
            true
        }
    } else {
        collection.scope.is_some()
    };

    Classification {
        visible: listed && !empty,
        empty,
        private: collection.is_private,
        scope: if collection.is_public {
            None
        } else {
            collection.scope
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::node::{CollectionId, CollectionRef};

    use super::{Scope, classify};

    fn collection(item_count: u32, is_public: bool, scope: Option<Scope>) -> CollectionRef {
        CollectionRef {
            id: CollectionId(1),
            item_count,
            is_public,
            scope,
            is_private: false,
            parents: vec![],
        }
    }

    #[test]
    fn public_collection_with_items_is_visible() {
        let classification = classify(&collection(5, true, None));
        assert!(classification.visible);
        assert!(!classification.empty);
        assert_eq!(classification.scope, None);
    }

    #[test]
    fn public_collection_without_items_is_empty_and_hidden() {
        let classification = classify(&collection(0, true, None));
        assert!(!classification.visible);
        assert!(classification.empty);
    }

    #[test]
    fn scoped_collection_follows_emptiness_rule() {
        let visible = classify(&collection(3, false, Some(Scope::Institution)));
        assert!(visible.visible);
        assert_eq!(visible.scope, Some(Scope::Institution));

        let empty = classify(&collection(0, false, Some(Scope::School)));
        assert!(!empty.visible);
        assert!(empty.empty);
        // Still recorded under its scope.
        assert_eq!(empty.scope, Some(Scope::School));
    }

    #[test]
    fn unflagged_collection_is_never_visible() {
        let classification = classify(&collection(10, false, None));
        assert!(!classification.visible);
        assert!(!classification.empty);
    }

    #[test]
    fn private_flag_is_independent() {
        let mut col = collection(4, false, Some(Scope::Institution));
        col.is_private = true;
        let classification = classify(&col);
        assert!(classification.private);
        assert!(classification.visible);
    }

    #[test]
    fn conflicting_public_and_private_is_hidden() {
        let mut col = collection(4, true, None);
        col.is_private = true;
        let classification = classify(&col);
        assert!(!classification.visible);
        assert!(classification.private);
    }

    #[test]
    fn public_flag_wins_over_scope_tag() {
        let col = collection(2, true, Some(Scope::School));
        let classification = classify(&col);
        assert!(classification.visible);
        assert_eq!(classification.scope, None);
    }
}
