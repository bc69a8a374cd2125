//! Pricing engine tests

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use pretty_assertions::assert_eq;
use roadside_common::ServiceError;
use rstest::*;
use std::sync::Arc;

use roadside_gateway::{
    pricing::{PricingEngine, PricingError},
    store::{InMemoryStore, ServiceRepository, TimeBlockRepository},
};

use crate::common::{seeded_store, time_block};

fn engine_with(store: Arc<InMemoryStore>, offset_hours: i32) -> PricingEngine {
    PricingEngine::new(
        Arc::clone(&store) as Arc<dyn ServiceRepository>,
        store as Arc<dyn TimeBlockRepository>,
        FixedOffset::east_opt(offset_hours * 3600).expect("valid offset"),
    )
}

fn at_hour(hour: u32) -> Option<DateTime<Utc>> {
    Some(Utc.with_ymd_and_hms(2026, 1, 15, hour, 30, 0).unwrap())
}

#[fixture]
fn engine() -> PricingEngine {
    engine_with(seeded_store(), 0)
}

#[rstest]
#[tokio::test]
async fn test_overnight_multiplier_rounds_half_up(engine: PricingEngine) {
    let quote = engine.quote_price("svc-jump", at_hour(23)).await.unwrap();

    assert_eq!(quote.base_price, 3333);
    assert_eq!(quote.multiplier, 15_000);
    assert_eq!(quote.block_name, "Overnight");
    assert_eq!(quote.final_price, 5000);
}

#[rstest]
#[case(22, "Overnight")]
#[case(2, "Overnight")]
#[case(5, "Overnight")]
#[case(6, "Standard")]
#[case(12, "Standard")]
#[case(16, "Evening Rush")]
#[case(18, "Evening Rush")]
#[case(19, "Standard")]
#[tokio::test]
async fn test_block_selection_by_hour(
    engine: PricingEngine,
    #[case] hour: u32,
    #[case] expected_block: &str,
) {
    let quote = engine.quote_price("svc-tow", at_hour(hour)).await.unwrap();
    assert_eq!(quote.block_name, expected_block);
}

#[rstest]
#[tokio::test]
async fn test_no_matching_block_is_neutral(engine: PricingEngine) {
    let quote = engine.quote_price("svc-tow", at_hour(11)).await.unwrap();

    assert_eq!(quote.multiplier, 10_000);
    assert_eq!(quote.final_price, 15_000);
}

#[tokio::test]
async fn test_higher_priority_overrides_overlap() {
    let store = seeded_store();
    store.upsert_time_block(time_block("Late Surge", 17, 23, 20_000, 20));
    let engine = engine_with(store, 0);

    let quote = engine.quote_price("svc-tow", at_hour(22)).await.unwrap();
    assert_eq!(quote.block_name, "Late Surge");
    assert_eq!(quote.final_price, 30_000);

    // Rush is lower priority than the surge inside 17..19
    let quote = engine.quote_price("svc-tow", at_hour(17)).await.unwrap();
    assert_eq!(quote.block_name, "Late Surge");
}

#[tokio::test]
async fn test_equal_priority_is_stable() {
    let store = seeded_store();
    store.upsert_time_block(time_block("Lunch A", 11, 14, 11_000, 7));
    store.upsert_time_block(time_block("Lunch B", 12, 13, 13_000, 7));
    let engine = engine_with(store, 0);

    for _ in 0..5 {
        let quote = engine.quote_price("svc-tow", at_hour(12)).await.unwrap();
        assert_eq!(quote.block_name, "Lunch A");
    }
}

#[tokio::test]
async fn test_inactive_block_is_ignored() {
    let store = seeded_store();
    let mut disabled = time_block("Overnight", 22, 6, 15_000, 10);
    disabled.is_active = false;
    store.upsert_time_block(disabled);
    let engine = engine_with(store, 0);

    let quote = engine.quote_price("svc-tow", at_hour(23)).await.unwrap();
    assert_eq!(quote.block_name, "Standard");
}

#[tokio::test]
async fn test_local_offset_shifts_hour() {
    // 03:30 UTC is 22:30 at UTC-5
    let engine = engine_with(seeded_store(), -5);
    let quote = engine.quote_price("svc-jump", at_hour(3)).await.unwrap();
    assert_eq!(quote.block_name, "Overnight");

    // 12:30 UTC is 07:30 at UTC-5
    let quote = engine.quote_price("svc-jump", at_hour(12)).await.unwrap();
    assert_eq!(quote.block_name, "Standard");
}

#[rstest]
#[tokio::test]
async fn test_unknown_service_is_server_fault(engine: PricingEngine) {
    let err = engine
        .quote_price("svc-missing", at_hour(12))
        .await
        .unwrap_err();

    assert!(matches!(err, PricingError::ServiceNotFound(ref id) if id == "svc-missing"));
    let service_error: ServiceError = err.into();
    assert!(service_error.is_server_fault());
}

#[rstest]
#[tokio::test]
async fn test_storm_mode_outranks_blocks(engine: PricingEngine) {
    let storm = engine
        .activate_storm_mode("Ice Storm", 20_000, "admin-1")
        .unwrap();
    assert_eq!(storm.activated_by, "admin-1");

    for hour in [3, 12, 17, 23] {
        let quote = engine.quote_price("svc-tow", at_hour(hour)).await.unwrap();
        assert_eq!(quote.block_name, "Ice Storm");
        assert_eq!(quote.final_price, 30_000);
    }

    let previous = engine.deactivate_storm_mode("admin-2").unwrap();
    assert_eq!(previous.template_name, "Ice Storm");
    assert!(engine.storm_mode().is_none());

    let quote = engine.quote_price("svc-tow", at_hour(23)).await.unwrap();
    assert_eq!(quote.block_name, "Overnight");
}

#[rstest]
#[case(0)]
#[case(-5000)]
fn test_storm_mode_rejects_non_positive_multiplier(engine: PricingEngine, #[case] multiplier: i64) {
    let err = engine
        .activate_storm_mode("Bad", multiplier, "admin-1")
        .unwrap_err();
    assert!(matches!(err, PricingError::InvalidMultiplier(m) if m == multiplier));
    assert!(engine.storm_mode().is_none());
}

#[rstest]
fn test_deactivate_without_storm_is_noop(engine: PricingEngine) {
    assert!(engine.deactivate_storm_mode("admin-1").is_none());
}
