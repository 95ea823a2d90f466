//! Behaviour every [`Store`] backend must share.
//!
//! Each backend's integration test invokes `store_conformance!` with a
//! fixture constructor; the macro expands to one `#[tokio::test]` per check.

#![allow(dead_code)]

use snip_core::{ShortCode, StorageError, Store, UserId};

pub fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

pub fn user(value: &str) -> UserId {
    UserId::from(value)
}

pub async fn concrete_scenario<S: Store>(store: &S) {
    let saved = store
        .save(&code("ab12345"), "http://example.com", &user("user1"))
        .await
        .unwrap();
    assert_eq!(saved, code("ab12345"));

    let duplicate = store
        .save(&code("zz99999"), "http://example.com", &user("user2"))
        .await
        .unwrap();
    assert_eq!(duplicate, code("ab12345"));

    assert_eq!(
        store.get(&code("ab12345")).await.unwrap(),
        "http://example.com"
    );

    store
        .batch_delete(&user("user1"), &[code("ab12345")])
        .await
        .unwrap();
    assert!(matches!(
        store.get(&code("ab12345")).await,
        Err(StorageError::Gone(_))
    ));
}

pub async fn dedup_returns_first_code<S: Store>(store: &S) {
    let first = store
        .save(&code("first01"), "https://dedup.example", &user("owner1"))
        .await
        .unwrap();
    let second = store
        .save(&code("second1"), "https://dedup.example", &user("owner2"))
        .await
        .unwrap();

    assert_eq!(first, code("first01"));
    assert_eq!(second, code("first01"));
    assert!(matches!(
        store.get(&code("second1")).await,
        Err(StorageError::NotFound(_))
    ));
    assert_eq!(
        store
            .get_by_original_url("https://dedup.example")
            .await
            .unwrap(),
        code("first01")
    );
}

pub async fn unknown_code_is_not_found<S: Store>(store: &S) {
    assert!(matches!(
        store.get(&code("missing")).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        store.get_by_original_url("https://nowhere.example").await,
        Err(StorageError::NotFound(_))
    ));
}

pub async fn tombstone_is_invisible<S: Store>(store: &S) {
    let owner = user("owner1");
    store
        .save(&code("keep001"), "https://keep.example", &owner)
        .await
        .unwrap();
    store
        .save(&code("drop001"), "https://drop.example", &owner)
        .await
        .unwrap();

    let deleted = store
        .batch_delete(&owner, &[code("drop001")])
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    assert!(matches!(
        store.get(&code("drop001")).await,
        Err(StorageError::Gone(_))
    ));
    assert!(matches!(
        store.get_by_original_url("https://drop.example").await,
        Err(StorageError::NotFound(_))
    ));

    let listed = store.get_all_by_user(&owner).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_code, code("keep001"));
    assert_eq!(listed[0].original_url, "https://keep.example");
}

pub async fn repeated_delete_is_idempotent<S: Store>(store: &S) {
    let owner = user("owner1");
    store
        .save(&code("twice01"), "https://twice.example", &owner)
        .await
        .unwrap();

    assert_eq!(
        store.batch_delete(&owner, &[code("twice01")]).await.unwrap(),
        1
    );
    assert_eq!(
        store.batch_delete(&owner, &[code("twice01")]).await.unwrap(),
        0
    );
    assert!(matches!(
        store.get(&code("twice01")).await,
        Err(StorageError::Gone(_))
    ));
}

pub async fn foreign_delete_is_ignored<S: Store>(store: &S) {
    store
        .save(&code("owned01"), "https://owned.example", &user("owner_a"))
        .await
        .unwrap();

    let deleted = store
        .batch_delete(&user("owner_b"), &[code("owned01"), code("missing")])
        .await
        .unwrap();

    assert_eq!(deleted, 0);
    assert_eq!(
        store.get(&code("owned01")).await.unwrap(),
        "https://owned.example"
    );
    assert_eq!(store.get_all_by_user(&user("owner_a")).await.unwrap().len(), 1);
}

pub async fn tombstoned_url_can_be_shortened_again<S: Store>(store: &S) {
    let owner = user("owner1");
    store
        .save(&code("old0001"), "https://again.example", &owner)
        .await
        .unwrap();
    store
        .batch_delete(&owner, &[code("old0001")])
        .await
        .unwrap();

    let fresh = store
        .save(&code("new0001"), "https://again.example", &owner)
        .await
        .unwrap();

    assert_eq!(fresh, code("new0001"));
    assert_eq!(
        store
            .get_by_original_url("https://again.example")
            .await
            .unwrap(),
        code("new0001")
    );
    assert!(matches!(
        store.get(&code("old0001")).await,
        Err(StorageError::Gone(_))
    ));
}

pub async fn taken_code_is_rejected<S: Store>(store: &S) {
    let owner = user("owner1");
    store
        .save(&code("taken01"), "https://one.example", &owner)
        .await
        .unwrap();

    let err = store
        .save(&code("taken01"), "https://two.example", &owner)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::CodeTaken(_)));

    store
        .batch_delete(&owner, &[code("taken01")])
        .await
        .unwrap();
    let err = store
        .save(&code("taken01"), "https://three.example", &owner)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::CodeTaken(_)));
}

pub async fn listing_is_per_owner<S: Store>(store: &S) {
    assert!(store
        .get_all_by_user(&user("nobody"))
        .await
        .unwrap()
        .is_empty());

    store
        .save(&code("list001"), "https://a.example", &user("owner1"))
        .await
        .unwrap();
    store
        .save(&code("list002"), "https://b.example", &user("owner1"))
        .await
        .unwrap();
    store
        .save(&code("list003"), "https://c.example", &user("owner2"))
        .await
        .unwrap();

    let mut codes: Vec<_> = store
        .get_all_by_user(&user("owner1"))
        .await
        .unwrap()
        .into_iter()
        .map(|url| url.short_code)
        .collect();
    codes.sort();
    assert_eq!(codes, vec![code("list001"), code("list002")]);
}

pub async fn bulk_delete_handles_hundreds_of_codes<S: Store>(store: &S) {
    let owner = user("bulk");
    let codes: Vec<ShortCode> = (0..150).map(|i| code(&format!("bulk{i:03}"))).collect();
    for (i, c) in codes.iter().enumerate() {
        store
            .save(c, &format!("https://bulk.example/{i}"), &owner)
            .await
            .unwrap();
    }

    let deleted = store.batch_delete(&owner, &codes).await.unwrap();

    assert_eq!(deleted, 150);
    assert!(store.get_all_by_user(&owner).await.unwrap().is_empty());
}

pub async fn ping_succeeds<S: Store>(store: &S) {
    store.ping().await.unwrap();
}

macro_rules! store_conformance {
    ($fixture:path) => {
        store_conformance!(@tests $fixture;
            concrete_scenario,
            dedup_returns_first_code,
            unknown_code_is_not_found,
            tombstone_is_invisible,
            repeated_delete_is_idempotent,
            foreign_delete_is_ignored,
            tombstoned_url_can_be_shortened_again,
            taken_code_is_rejected,
            listing_is_per_owner,
            bulk_delete_handles_hundreds_of_codes,
            ping_succeeds,
        );
    };
    (@tests $fixture:path; $($name:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $name() {
                let fixture = $fixture().await;
                common::$name(fixture.store()).await;
            }
        )*
    };
}
