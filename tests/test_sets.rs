/*
 * Copyright (C) 2020 Oakes, Gregory <gregoryoakes@fastmail.com>
 * Author: Oakes, Gregory <gregory.oakes@fastmail.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use studysprout::{models::*, Store};

#[macro_use]
mod common;

async fn private_sets_are_hidden<S: Store>(store: &S) {
    let owner = common::user(store, "owner").await;
    let stranger = common::user(store, "stranger").await;
    let set = common::set(store, &owner, "Private", false).await;

    let seen = store.get_set(set.id, Some(owner.id)).await.unwrap();
    assert_eq!(seen.id, set.id);
    assert!(store
        .get_set(set.id, Some(stranger.id))
        .await
        .unwrap_err()
        .is_not_found());
    assert!(store.get_set(set.id, None).await.unwrap_err().is_not_found());
    assert!(store.get_set(-1, Some(owner.id)).await.unwrap_err().is_not_found());
}

async fn public_sets_are_visible<S: Store>(store: &S) {
    let owner = common::user(store, "owner").await;
    let stranger = common::user(store, "stranger").await;
    let set = common::set(store, &owner, "Public", true).await;

    for requester in &[None, Some(owner.id), Some(stranger.id)] {
        let seen = store.get_set(set.id, *requester).await.unwrap();
        assert_eq!(seen.title, "Public");
    }
}

async fn only_the_owner_writes<S: Store>(store: &S) {
    let owner = common::user(store, "owner").await;
    let stranger = common::user(store, "stranger").await;
    let set = common::set(store, &owner, "Shared", true).await;

    let patch = SetPatch {
        title: Some("Hijacked".to_string()),
        ..Default::default()
    };
    assert!(store
        .update_set(set.id, stranger.id, patch)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(!store.delete_set(set.id, stranger.id).await.unwrap());

    let unchanged = store.get_set(set.id, None).await.unwrap();
    assert_eq!(unchanged.title, "Shared");
}

async fn partial_update<S: Store>(store: &S) {
    let owner = common::user(store, "owner").await;
    let set = store
        .create_set(
            NewSet {
                title: "Verbs".to_string(),
                description: Some("irregular".to_string()),
                is_public: false,
            },
            owner.id,
        )
        .await
        .unwrap();

    let updated = store
        .update_set(
            set.id,
            owner.id,
            SetPatch {
                is_public: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.is_public);
    assert_eq!(updated.title, "Verbs");
    assert_eq!(updated.description.as_deref(), Some("irregular"));
    assert!(updated.updated_at > set.updated_at);

    let cleared = store
        .update_set(
            set.id,
            owner.id,
            SetPatch {
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.description, None);
    assert!(cleared.is_public);

    let untouched = store
        .update_set(set.id, owner.id, SetPatch::default())
        .await
        .unwrap();
    assert_eq!(untouched.updated_at, cleared.updated_at);

    assert!(store
        .update_set(-1, owner.id, SetPatch::default())
        .await
        .unwrap_err()
        .is_not_found());
}

async fn delete_set_cascades<S: Store>(store: &S) {
    let owner = common::user(store, "owner").await;
    let learner = common::user(store, "learner").await;
    let set = common::set(store, &owner, "Doomed", true).await;
    let card = common::card(store, &owner, &set, "adios").await;
    store
        .upsert_progress(learner.id, card.id, MasteryLevel::Known)
        .await
        .unwrap();

    assert!(store.delete_set(set.id, owner.id).await.unwrap());
    assert!(!store.delete_set(set.id, owner.id).await.unwrap());

    assert!(store.get_set(set.id, Some(owner.id)).await.unwrap_err().is_not_found());
    assert!(store
        .get_card(card.id, set.id, Some(owner.id))
        .await
        .unwrap_err()
        .is_not_found());
    assert!(store
        .list_progress_for_user(learner.id)
        .await
        .unwrap()
        .is_empty());
}

async fn owner_listing_counts_cards<S: Store>(store: &S) {
    let owner = common::user(store, "owner").await;
    let first = common::set(store, &owner, "First", false).await;
    let second = common::set(store, &owner, "Second", true).await;
    let third = common::set(store, &owner, "Third", false).await;
    common::card(store, &owner, &first, "a").await;
    common::card(store, &owner, &first, "b").await;
    let c = common::card(store, &owner, &second, "c").await;

    let listed = store.list_sets_by_owner(owner.id, 0, 100).await.unwrap();
    let counts: Vec<(SetId, i64)> = listed.iter().map(|s| (s.id, s.card_count)).collect();
    assert_eq!(counts, vec![(first.id, 2), (second.id, 1), (third.id, 0)]);

    assert!(store.delete_card(c.id, second.id, owner.id).await.unwrap());
    let listed = store.list_sets_by_owner(owner.id, 1, 1).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!((listed[0].id, listed[0].card_count), (second.id, 0));

    let past_end = store.list_sets_by_owner(owner.id, 3, 10).await.unwrap();
    assert!(past_end.is_empty());
}

async fn search_matches_title_or_description<S: Store>(store: &S) {
    let owner = common::user(store, "owner").await;
    let token = common::unique("kanji");
    let by_title = common::set(store, &owner, format!("{} N5", token).as_str(), true).await;
    let by_description = store
        .create_set(
            NewSet {
                title: "Japanese".to_string(),
                description: Some(format!("Common {} readings", token.to_uppercase())),
                is_public: true,
            },
            owner.id,
        )
        .await
        .unwrap();
    common::set(store, &owner, format!("{} private", token).as_str(), false).await;
    common::card(store, &owner, &by_title, "水").await;

    let found = store
        .search_public_sets(token.to_uppercase().as_str(), 0, 20)
        .await
        .unwrap();
    let ids: Vec<SetId> = found.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![by_title.id, by_description.id]);
    assert_eq!(found[0].card_count, 1);
    assert_eq!(found[1].card_count, 0);

    let paged = store
        .search_public_sets(token.as_str(), 1, 20)
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].id, by_description.id);

    let none = store
        .search_public_sets(common::unique("xyz").as_str(), 0, 20)
        .await
        .unwrap();
    assert!(none.is_empty());
}

async fn search_is_literal<S: Store>(store: &S) {
    let owner = common::user(store, "owner").await;
    let token = common::unique("pct");
    let set = common::set(store, &owner, format!("{} 100% done", token).as_str(), true).await;
    common::set(store, &owner, format!("{} 1000 done", token).as_str(), true).await;

    let found = store
        .search_public_sets(format!("{} 100%", token).as_str(), 0, 20)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, set.id);

    let underscore = store
        .search_public_sets(format!("{} 1_0", token).as_str(), 0, 20)
        .await
        .unwrap();
    assert!(underscore.is_empty());
}

async fn set_with_cards<S: Store>(store: &S) {
    let owner = common::user(store, "owner").await;
    let set = common::set(store, &owner, "Detail", false).await;
    let a = common::card(store, &owner, &set, "a").await;
    let b = common::card(store, &owner, &set, "b").await;

    let detail = store.get_set_with_cards(set.id, Some(owner.id)).await.unwrap();
    assert_eq!(detail.set.card_count, 2);
    assert_eq!(detail.cards, vec![a, b]);

    assert!(store
        .get_set_with_cards(set.id, None)
        .await
        .unwrap_err()
        .is_not_found());
}

async fn create_set_for_missing_owner<S: Store>(store: &S) {
    let err = store
        .create_set(
            NewSet {
                title: "Orphan".to_string(),
                ..Default::default()
            },
            -1,
        )
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation(), "got {:?}", err);
}

store_tests!(
    private_sets_are_hidden,
    public_sets_are_visible,
    only_the_owner_writes,
    partial_update,
    delete_set_cascades,
    owner_listing_counts_cards,
    search_matches_title_or_description,
    search_is_literal,
    set_with_cards,
    create_set_for_missing_owner,
);
