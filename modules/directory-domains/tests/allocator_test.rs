//! Identity allocation against a real Postgres.
//! Requires DATABASE_TEST_URL or Docker; otherwise these tests are skipped.

mod common;

use std::collections::HashSet;

use common::tag;
use directory_core::DirectoryError;
use directory_domains::locations::base_slug;
use directory_domains::testutil::test_pool;
use directory_domains::{IdentityAllocator, Location, LocationAttributes};

fn allocator(pool: &sqlx::PgPool) -> IdentityAllocator {
    IdentityAllocator::new(pool.clone(), 50)
}

#[tokio::test]
async fn reingestion_updates_attributes_but_keeps_identity() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let allocator = allocator(&pool);
    let key = format!("ext-{}", tag());
    let city = format!("Denver {}", tag());

    let first = allocator
        .allocate(&key, "Leaf House", &city, &LocationAttributes::builder().build())
        .await
        .unwrap();

    let attrs = LocationAttributes::builder()
        .phone("303-555-0100")
        .rating(4.5)
        .review_count(12)
        .build();
    let second = allocator
        .allocate(&key, "Leaf House Uptown", "Boulder", &attrs)
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.slug, first.slug);
    assert_eq!(second.name, "Leaf House Uptown");
    assert_eq!(second.city, "Boulder");
    assert_eq!(second.phone.as_deref(), Some("303-555-0100"));
    assert_eq!(second.rating, Some(4.5));
    assert_eq!(second.review_count, 12);
}

#[tokio::test]
async fn reingestion_reports_existing_row() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let allocator = allocator(&pool);
    let key = format!("ext-{}", tag());
    let city = format!("Aurora {}", tag());
    let attrs = LocationAttributes::builder().build();

    let created = allocator
        .allocate_detailed(&key, "Mile High Greens", &city, &attrs)
        .await
        .unwrap();
    let again = allocator
        .allocate_detailed(&key, "Mile High Greens", &city, &attrs)
        .await
        .unwrap();

    assert!(created.created);
    assert!(!again.created);
    assert_eq!(again.location.id, created.location.id);
}

#[tokio::test]
async fn concurrent_same_key_converges_then_second_key_gets_suffix() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let allocator = allocator(&pool);
    let city = format!("Denver {}", tag());
    let x1 = format!("X1-{}", tag());
    let x2 = format!("X2-{}", tag());
    let attrs = LocationAttributes::builder().build();

    let (a, b) = tokio::join!(
        allocator.allocate(&x1, "Leaf House", &city, &attrs),
        allocator.allocate(&x1, "Leaf House", &city, &attrs),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id, b.id);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE external_key = $1")
        .bind(&x1)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let base = base_slug("Leaf House", &city);
    let stored = Location::find_by_external_key(&x1, &pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.slug, base);

    let second = allocator
        .allocate(&x2, "Leaf House", &city, &attrs)
        .await
        .unwrap();
    assert_ne!(second.id, stored.id);
    assert_eq!(second.slug, format!("{base}-2"));
}

#[tokio::test]
async fn concurrent_same_base_slug_yields_distinct_slugs() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let allocator = allocator(&pool);
    let city = format!("Pueblo {}", tag());
    let attrs = LocationAttributes::builder().build();
    let keys: Vec<String> = (0..6).map(|i| format!("race-{i}-{}", tag())).collect();

    let results = futures::future::join_all(
        keys.iter()
            .map(|key| allocator.allocate(key, "Green Door", &city, &attrs)),
    )
    .await;

    let locations: Vec<Location> = results.into_iter().map(|r| r.unwrap()).collect();
    let ids: HashSet<_> = locations.iter().map(|l| l.id).collect();
    let slugs: HashSet<_> = locations.iter().map(|l| l.slug.clone()).collect();
    assert_eq!(ids.len(), keys.len());
    assert_eq!(slugs.len(), keys.len());

    let base = base_slug("Green Door", &city);
    assert!(slugs.contains(&base));
    assert!(slugs.iter().all(|s| s.starts_with(&base)));
}

#[tokio::test]
async fn probe_ceiling_falls_back_to_disambiguated_slug() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let allocator = IdentityAllocator::new(pool.clone(), 1);
    let city = format!("Golden {}", tag());
    let attrs = LocationAttributes::builder().build();
    let base = base_slug("Canopy", &city);

    let mut slugs = Vec::new();
    for i in 0..3 {
        let key = format!("ceiling-{i}-{}", tag());
        let location = allocator.allocate(&key, "Canopy", &city, &attrs).await.unwrap();
        slugs.push(location.slug);
    }

    assert_eq!(slugs[0], base);
    assert_eq!(slugs[1], format!("{base}-2"));
    assert_ne!(slugs[2], slugs[0]);
    assert_ne!(slugs[2], slugs[1]);
    assert!(slugs[2].starts_with(&format!("{base}-")));
}

#[tokio::test]
async fn invalid_input_is_rejected_before_storage() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let allocator = allocator(&pool);

    let err = allocator
        .allocate("", "Leaf House", "Denver", &LocationAttributes::builder().build())
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::InvalidInput(_)));

    let half_located = LocationAttributes::builder().latitude(39.7).build();
    let err = allocator
        .allocate(&format!("ext-{}", tag()), "Leaf House", "Denver", &half_located)
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::InvalidInput(_)));
}

#[tokio::test]
async fn lookups_by_slug_skip_inactive_locations() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let allocator = allocator(&pool);
    let key = format!("ext-{}", tag());
    let city = format!("Lakewood {}", tag());

    let location = allocator
        .allocate(&key, "Rocky Road", &city, &LocationAttributes::builder().build())
        .await
        .unwrap();

    let by_slug = Location::find_by_slug(&location.slug, &pool).await.unwrap();
    assert_eq!(by_slug.map(|l| l.id), Some(location.id));

    Location::set_active(location.id, false, &pool).await.unwrap();

    assert!(Location::find_by_slug(&location.slug, &pool)
        .await
        .unwrap()
        .is_none());
    let by_id = Location::find_by_id(location.id, &pool).await.unwrap().unwrap();
    assert!(!by_id.is_active);
}

#[tokio::test]
async fn accented_names_are_transliterated_into_the_slug() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let allocator = allocator(&pool);
    let tag = tag();

    let location = allocator
        .allocate(
            &format!("ext-{tag}"),
            "Café Verde",
            &format!("Española {tag}"),
            &LocationAttributes::builder().build(),
        )
        .await
        .unwrap();

    assert_eq!(location.slug, format!("cafe-verde-espanola-{tag}"));
    assert_eq!(location.name, "Café Verde");
}
