//! Proximity queries against a real Postgres.
//! Requires DATABASE_TEST_URL or Docker; otherwise these tests are skipped.

mod common;

use common::{directory, tag};
use directory_core::file_config::ProximityConfig;
use directory_core::{Coordinates, DirectoryError};
use directory_domains::testutil::test_pool;
use directory_domains::{distance_miles, Location, LocationAttributes, ProximityIndex};
use sqlx::PgPool;
use uuid::Uuid;

/// A query point unlikely to be near anything another test created.
fn random_center() -> Coordinates {
    let bits = Uuid::new_v4().as_u128();
    let lat = (bits % 10_000) as f64 / 100.0 - 50.0;
    let lng = ((bits >> 32) % 30_000) as f64 / 100.0 - 150.0;
    Coordinates::new(lat, lng).unwrap()
}

async fn place(pool: &PgPool, name: &str, lat: f64, lng: f64) -> Location {
    let attrs = LocationAttributes::builder()
        .latitude(lat)
        .longitude(lng)
        .build();
    directory(pool)
        .allocate(&format!("geo-{}", tag()), name, &format!("Geo {}", tag()), &attrs)
        .await
        .unwrap()
}

#[tokio::test]
async fn returns_only_locations_inside_the_radius_nearest_first() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let center = random_center();
    let (lat, lng) = (center.latitude, center.longitude);

    // 0.1 degrees of latitude is about 6.9 miles.
    let near = place(&pool, "Near", lat + 0.1, lng).await;
    let mid = place(&pool, "Mid", lat - 0.3, lng).await;
    let far = place(&pool, "Far", lat + 1.0, lng).await;

    let index = ProximityIndex::new(pool.clone(), ProximityConfig::default());
    let results = index.find_nearby(lat, lng, 25.0, 50).await.unwrap();

    let ids: Vec<Uuid> = results.iter().map(|r| r.location.id).collect();
    let near_at = ids.iter().position(|id| *id == near.id).unwrap();
    let mid_at = ids.iter().position(|id| *id == mid.id).unwrap();
    assert!(near_at < mid_at);
    assert!(!ids.contains(&far.id));

    for result in &results {
        assert!(result.distance_miles < 25.0);
        let point = result.location.coordinates().unwrap();
        assert!((distance_miles(center, point) - result.distance_miles).abs() < 1e-6);
    }
    assert!(results
        .windows(2)
        .all(|w| w[0].distance_miles <= w[1].distance_miles));
}

#[tokio::test]
async fn skips_inactive_and_unlocated_locations() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let dir = directory(&pool);
    let center = random_center();
    let (lat, lng) = (center.latitude, center.longitude);

    let open = place(&pool, "Open", lat, lng + 0.05).await;
    let closed = place(&pool, "Closed", lat, lng - 0.05).await;
    dir.deactivate_location(closed.id).await.unwrap();

    let unlocated = dir
        .allocate(
            &format!("geo-{}", tag()),
            "Nowhere",
            &format!("Geo {}", tag()),
            &LocationAttributes::builder().build(),
        )
        .await
        .unwrap();

    let results = dir.find_nearby(lat, lng, 10.0, 50).await.unwrap();
    let ids: Vec<Uuid> = results.iter().map(|r| r.location.id).collect();
    assert!(ids.contains(&open.id));
    assert!(!ids.contains(&closed.id));
    assert!(!ids.contains(&unlocated.id));
}

#[tokio::test]
async fn limit_truncates_after_ordering() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let center = random_center();
    let (lat, lng) = (center.latitude, center.longitude);

    let closest = place(&pool, "Closest", lat + 0.01, lng).await;
    place(&pool, "Second", lat + 0.05, lng).await;
    place(&pool, "Third", lat + 0.09, lng).await;

    let index = ProximityIndex::new(pool.clone(), ProximityConfig::default());
    let results = index.find_nearby(lat, lng, 25.0, 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].location.id, closest.id);
}

#[tokio::test]
async fn rejects_malformed_queries() {
    let Some((_pg, pool)) = test_pool().await else {
        return;
    };
    let index = ProximityIndex::new(pool.clone(), ProximityConfig::default());

    for (lat, lng, radius, limit) in [
        (91.0, 0.0, 10.0, 10),
        (0.0, -181.0, 10.0, 10),
        (f64::NAN, 0.0, 10.0, 10),
        (0.0, 0.0, 0.0, 10),
        (0.0, 0.0, -5.0, 10),
        (0.0, 0.0, 10.0, 0),
    ] {
        let err = index.find_nearby(lat, lng, radius, limit).await.unwrap_err();
        assert!(
            matches!(err, DirectoryError::InvalidInput(_)),
            "expected InvalidInput for ({lat}, {lng}, {radius}, {limit})"
        );
    }
}
