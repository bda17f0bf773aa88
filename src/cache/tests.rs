// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use crate::cache::FrontList;
use crate::classifier::Scope;
use crate::node::{CollectionId, CommunityId, GroupId, NodeId, PrincipalId};
use crate::test_utils::{
    MemoryContentStore, private_collection, public_collection, scoped_collection, setup_logging,
};

fn cache_over(store: &MemoryContentStore) -> FrontList<MemoryContentStore> {
    setup_logging();
    let cache = FrontList::new(store.clone());
    cache.warm();
    cache
}

#[test]
fn scenario_a_public_collection_is_listed() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(public_collection(10, &[1], 5));

    let cache = cache_over(&store);

    assert_eq!(cache.anon_collections(CommunityId(1)), vec![CollectionId(10)]);
    assert_eq!(cache.admin_collections(CommunityId(1)), vec![CollectionId(10)]);
}

#[test]
fn scenario_b_empty_public_collection_is_hidden() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(public_collection(10, &[1], 0));

    let cache = cache_over(&store);

    assert!(cache.empty_collections().contains(&CollectionId(10)));
    assert!(cache.anon_collections(CommunityId(1)).is_empty());
    assert_eq!(cache.admin_collections(CommunityId(1)), vec![CollectionId(10)]);
    // No visible child, so the community is absent from the anonymous view.
    let view = cache.visible_tree(None, false);
    assert!(!view.collections.contains_key(&CommunityId(1)));
}

#[test]
fn scenario_c_private_collection_visible_to_its_admin() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(private_collection(10, &[1], 5));
    store.set_collection_admins(10, 20);
    store.add_group(20, &[100], &[]);

    let cache = cache_over(&store);

    assert!(
        cache.hidden_nodes_for(PrincipalId(100)).contains(&NodeId::Collection(CollectionId(10)))
    );

    let admin_view = cache.visible_tree(Some(PrincipalId(100)), false);
    assert_eq!(
        admin_view.collections.get(&CommunityId(1)),
        Some(&vec![CollectionId(10)])
    );

    let anon_view = cache.visible_tree(None, false);
    assert!(!anon_view.collections.contains_key(&CommunityId(1)));
}

#[test]
fn scenario_d_removing_the_only_visible_collection() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(public_collection(10, &[1], 5));

    let cache = cache_over(&store);
    store.remove_collection(10);
    cache.on_collection_removed(CollectionId(10));

    let view = cache.visible_tree(None, false);
    assert!(!view.collections.contains_key(&CommunityId(1)));
    // The admin entry survives as an empty list.
    assert_eq!(cache.admin_collections(CommunityId(1)), Vec::new());
}

#[test]
fn scenario_e_membership_change_grants_and_revokes() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(private_collection(10, &[1], 5));
    store.set_collection_admins(10, 20);
    store.add_group(20, &[100], &[]);

    let cache = cache_over(&store);

    store.add_group_member(20, 200);
    cache.on_membership_changed(GroupId(20), PrincipalId(200), true);
    assert!(
        cache.is_authorized_for_hidden_node(
            PrincipalId(200),
            NodeId::Collection(CollectionId(10))
        )
    );

    store.remove_group_member(20, 200);
    cache.on_membership_changed(GroupId(20), PrincipalId(200), false);
    assert!(cache.hidden_nodes_for(PrincipalId(200)).is_empty());
    // The original member is untouched.
    assert!(
        cache.is_authorized_for_hidden_node(
            PrincipalId(100),
            NodeId::Collection(CollectionId(10))
        )
    );
}

#[test]
fn visible_collection_appears_under_every_parent() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_community(2, None);
    store.add_collection(public_collection(10, &[1, 2], 3));

    let cache = cache_over(&store);

    assert_eq!(cache.anon_collections(CommunityId(1)), vec![CollectionId(10)]);
    assert_eq!(cache.anon_collections(CommunityId(2)), vec![CollectionId(10)]);
}

#[test]
fn ancestor_community_admin_sees_hidden_collection() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_community(2, Some(1));
    store.add_collection(private_collection(10, &[2], 5));
    store.set_community_admins(1, 20);
    store.add_group(20, &[100], &[]);

    let cache = cache_over(&store);

    assert!(
        cache.hidden_nodes_for(PrincipalId(100)).contains(&NodeId::Collection(CollectionId(10)))
    );
}

#[test]
fn upward_propagation_cascades_to_every_ancestor() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_community(2, Some(1));
    store.add_community(3, Some(2));
    store.add_collection(public_collection(10, &[3], 5));

    let cache = cache_over(&store);
    assert_eq!(cache.anon_communities(CommunityId(1)), vec![CommunityId(2)]);
    assert_eq!(cache.anon_communities(CommunityId(2)), vec![CommunityId(3)]);

    store.remove_collection(10);
    cache.on_collection_removed(CollectionId(10));

    let view = cache.visible_tree(None, false);
    assert!(view.collections.is_empty());
    assert!(view.communities.is_empty());
}

#[test]
fn adding_a_collection_twice_is_idempotent() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_community(2, Some(1));
    store.add_collection(public_collection(10, &[2], 5));

    let cache = cache_over(&store);
    let added = store.add_collection(public_collection(11, &[2], 2));

    cache.on_collection_added(&added);
    let anon_once = cache.visible_tree(None, false);
    let admin_once = cache.visible_tree(None, true);

    cache.on_collection_added(&added);
    assert_eq!(cache.visible_tree(None, false), anon_once);
    assert_eq!(cache.visible_tree(None, true), admin_once);
}

#[test]
fn community_removal_leaves_no_dangling_references() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_community(2, Some(1));
    store.add_community(3, Some(2));
    store.add_community(4, None);
    store.add_collection(public_collection(10, &[2], 5));
    store.add_collection(private_collection(11, &[3], 5));
    store.set_collection_admins(11, 20);
    store.add_group(20, &[100], &[]);
    // Shared between the removed subtree and a surviving top community.
    store.add_collection(public_collection(12, &[2, 4], 7));

    let cache = cache_over(&store);
    store.remove_community(2);
    cache.on_community_removed(CommunityId(2));

    let admin = cache.visible_tree(None, true);
    assert!(!admin.collections.contains_key(&CommunityId(2)));
    assert!(!admin.collections.contains_key(&CommunityId(3)));
    assert!(!admin.communities.contains_key(&CommunityId(2)));
    assert_eq!(cache.admin_communities(CommunityId(1)), Vec::new());

    // The private collection died with the subtree.
    assert!(cache.hidden_nodes_for(PrincipalId(100)).is_empty());
    assert!(!cache.private_collections().contains(&CollectionId(11)));

    // The shared collection survives under its other parent.
    assert_eq!(cache.anon_collections(CommunityId(4)), vec![CollectionId(12)]);

    // Nothing visible is left under the root.
    let anon = cache.visible_tree(None, false);
    assert!(!anon.communities.contains_key(&CommunityId(1)));
    assert!(!anon.collections.contains_key(&CommunityId(1)));
}

#[test]
fn community_losing_its_last_visible_child_grants_its_admins() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_community(2, Some(1));
    store.add_collection(public_collection(10, &[2], 5));
    store.set_community_admins(2, 20);
    store.add_group(20, &[100], &[]);

    let cache = cache_over(&store);
    assert!(cache.hidden_nodes_for(PrincipalId(100)).is_empty());

    store.remove_collection(10);
    cache.on_collection_removed(CollectionId(10));

    assert!(
        cache.hidden_nodes_for(PrincipalId(100)).contains(&NodeId::Community(CommunityId(2)))
    );
}

#[test]
fn submitters_see_the_empty_collection_they_feed() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(public_collection(10, &[1], 0));
    store.set_collection_submitters(10, 20);
    store.add_group(20, &[100], &[]);

    let cache = cache_over(&store);

    assert!(
        cache.hidden_nodes_for(PrincipalId(100)).contains(&NodeId::Collection(CollectionId(10)))
    );
}

#[test]
fn cyclic_nested_groups_terminate_and_authorize_all_members() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(private_collection(10, &[1], 5));
    store.set_collection_admins(10, 20);
    store.add_group(20, &[100], &[21]);
    store.add_group(21, &[101], &[20]);

    let cache = cache_over(&store);

    let node = NodeId::Collection(CollectionId(10));
    assert!(cache.is_authorized_for_hidden_node(PrincipalId(100), node));
    assert!(cache.is_authorized_for_hidden_node(PrincipalId(101), node));
}

#[test]
fn membership_removal_respects_other_authorization_paths() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(private_collection(10, &[1], 5));
    store.set_collection_admins(10, 20);
    store.set_collection_submitters(10, 21);
    store.add_group(20, &[100], &[]);
    store.add_group(21, &[100], &[]);

    let cache = cache_over(&store);
    let node = NodeId::Collection(CollectionId(10));

    store.remove_group_member(20, 100);
    cache.on_membership_changed(GroupId(20), PrincipalId(100), false);
    // Still a submitter.
    assert!(cache.is_authorized_for_hidden_node(PrincipalId(100), node));

    store.remove_group_member(21, 100);
    cache.on_membership_changed(GroupId(21), PrincipalId(100), false);
    assert!(cache.hidden_nodes_for(PrincipalId(100)).is_empty());
}

#[test]
fn scope_change_moves_the_collection_between_scope_sets() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(scoped_collection(10, &[1], 3, Scope::Institution));

    let cache = cache_over(&store);
    assert!(cache.scoped_collections(Scope::Institution).contains(&CollectionId(10)));
    assert_eq!(cache.anon_collections(CommunityId(1)), vec![CollectionId(10)]);

    let changed = store.update_collection(scoped_collection(10, &[1], 3, Scope::School));
    cache.on_collection_changed(&changed);

    assert!(!cache.scoped_collections(Scope::Institution).contains(&CollectionId(10)));
    assert!(cache.scoped_collections(Scope::School).contains(&CollectionId(10)));
    assert_eq!(cache.anon_collections(CommunityId(1)), vec![CollectionId(10)]);
}

#[test]
fn emptied_collection_disappears_and_refilling_brings_it_back() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_community(2, Some(1));
    store.add_collection(public_collection(10, &[2], 5));

    let cache = cache_over(&store);

    let emptied = store.update_collection(public_collection(10, &[2], 0));
    cache.on_collection_changed(&emptied);
    assert!(cache.empty_collections().contains(&CollectionId(10)));
    let view = cache.visible_tree(None, false);
    assert!(view.collections.is_empty());
    assert!(view.communities.is_empty());

    let refilled = store.update_collection(public_collection(10, &[2], 2));
    cache.on_collection_changed(&refilled);
    assert!(!cache.empty_collections().contains(&CollectionId(10)));
    assert_eq!(cache.anon_collections(CommunityId(2)), vec![CollectionId(10)]);
    assert_eq!(cache.anon_communities(CommunityId(1)), vec![CommunityId(2)]);
}

#[test]
fn collection_turning_visible_leaves_the_authorization_index() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(private_collection(10, &[1], 5));
    store.set_collection_admins(10, 20);
    store.add_group(20, &[100], &[]);

    let cache = cache_over(&store);
    assert!(!cache.hidden_nodes_for(PrincipalId(100)).is_empty());

    let published = store.update_collection(public_collection(10, &[1], 5));
    cache.on_collection_changed(&published);

    assert!(cache.hidden_nodes_for(PrincipalId(100)).is_empty());
    assert_eq!(cache.anon_collections(CommunityId(1)), vec![CollectionId(10)]);
}

#[test]
fn added_community_brings_its_children_along() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(public_collection(10, &[1], 1));

    let cache = cache_over(&store);

    let community = store.add_community(5, Some(1));
    store.add_collection(public_collection(11, &[5], 2));
    cache.on_community_added(&community);

    assert_eq!(cache.anon_collections(CommunityId(5)), vec![CollectionId(11)]);
    assert!(cache.anon_communities(CommunityId(1)).contains(&CommunityId(5)));
    assert!(cache.admin_communities(CommunityId(1)).contains(&CommunityId(5)));
}

#[test]
fn hidden_ancestors_are_bridged_into_the_principal_view() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_community(2, Some(1));
    store.add_community(3, Some(2));
    store.add_collection(private_collection(10, &[3], 5));
    store.set_collection_admins(10, 20);
    store.add_group(20, &[100], &[]);

    let cache = cache_over(&store);

    // Nothing is anonymously visible anywhere.
    let anon = cache.visible_tree(None, false);
    assert!(anon.collections.is_empty());
    assert!(anon.communities.is_empty());

    let view = cache.visible_tree(Some(PrincipalId(100)), false);
    assert_eq!(view.collections.get(&CommunityId(3)), Some(&vec![CollectionId(10)]));
    assert_eq!(view.communities.get(&CommunityId(2)), Some(&vec![CommunityId(3)]));
    assert_eq!(view.communities.get(&CommunityId(1)), Some(&vec![CommunityId(2)]));
}

#[test]
fn site_admins_get_the_complete_view() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(private_collection(10, &[1], 0));

    let cache = cache_over(&store);

    let view = cache.visible_tree(None, true);
    assert_eq!(view.collections.get(&CommunityId(1)), Some(&vec![CollectionId(10)]));
}

#[test]
fn unknown_references_are_ignored() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(public_collection(10, &[1], 5));

    let cache = cache_over(&store);
    let before = cache.visible_tree(None, true);

    cache.on_collection_removed(CollectionId(999));
    cache.on_community_removed(CommunityId(999));
    cache.on_membership_changed(GroupId(999), PrincipalId(1), false);

    assert_eq!(cache.visible_tree(None, true), before);
}

#[test]
fn events_before_the_first_build_are_ignored() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    let cache = FrontList::new(store.clone());

    let collection = store.add_collection(public_collection(10, &[1], 5));
    cache.on_collection_added(&collection);
    assert!(!cache.is_built());

    // The build picks the collection up from the store instead.
    cache.warm();
    assert_eq!(cache.anon_collections(CommunityId(1)), vec![CollectionId(10)]);
}

#[test]
fn warm_builds_at_most_once_across_threads() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(public_collection(10, &[1], 5));

    let cache = Arc::new(FrontList::new(store.clone()));
    let built: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                scope.spawn(move || usize::from(cache.warm()))
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).sum()
    });

    assert_eq!(built, 1);
    assert_eq!(store.build_calls(), 1);
}

#[test]
fn invalidate_rearms_the_build() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);

    let cache = cache_over(&store);
    assert!(!cache.warm());

    cache.invalidate();
    assert!(!cache.is_built());
    assert!(cache.warm());
    assert_eq!(store.build_calls(), 2);
}

#[test]
fn readers_never_observe_half_propagated_views() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_community(2, Some(1));
    store.add_collection(public_collection(10, &[2], 5));

    let cache = Arc::new(cache_over(&store));

    thread::scope(|scope| {
        let writer_cache = Arc::clone(&cache);
        let writer_store = store.clone();
        scope.spawn(move || {
            for round in 0..200 {
                let item_count = if round % 2 == 0 { 0 } else { 5 };
                let changed =
                    writer_store.update_collection(public_collection(10, &[2], item_count));
                writer_cache.on_collection_changed(&changed);
            }
        });

        for _ in 0..2 {
            let reader_cache = Arc::clone(&cache);
            scope.spawn(move || {
                for _ in 0..400 {
                    let view = reader_cache.visible_tree(None, false);
                    match view.collections.get(&CommunityId(2)) {
                        Some(children) => {
                            // Visible child implies fully attached ancestors.
                            assert_eq!(children, &vec![CollectionId(10)]);
                            assert_eq!(
                                view.communities.get(&CommunityId(1)),
                                Some(&vec![CommunityId(2)])
                            );
                        }
                        None => {
                            assert!(!view.communities.contains_key(&CommunityId(1)));
                        }
                    }
                }
            });
        }
    });
}

#[test]
fn hidden_set_queries_match_the_authorization_index() {
    let store = MemoryContentStore::new();
    store.add_community(1, None);
    store.add_collection(private_collection(10, &[1], 5));
    store.add_collection(public_collection(11, &[1], 0));
    store.set_collection_admins(10, 20);
    store.set_collection_submitters(11, 20);
    store.add_group(20, &[100], &[]);

    let cache = cache_over(&store);

    let expected: HashSet<NodeId> = [
        NodeId::Collection(CollectionId(10)),
        NodeId::Collection(CollectionId(11)),
    ]
    .into_iter()
    .collect();
    assert_eq!(cache.hidden_nodes_for(PrincipalId(100)), expected);
    assert!(!cache.is_authorized_for_hidden_node(PrincipalId(999), NodeId::Collection(CollectionId(10))));
}
