//! HTTP surface tests against the fully layered router

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use pretty_assertions::assert_eq;
use roadside_common::{BYPASS_ATTEMPT_ACTION, Role};
use rstest::*;
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tower::ServiceExt;

use roadside_gateway::{
    ApiGatewayServer,
    registry::{ConnectionHandle, Outbound},
    store::InMemoryStore,
};

use crate::common::{
    RESTRICTED_CUSTOMER, TRUSTED_CUSTOMER, bearer, build_server, create_test_config, init_test_env,
    seeded_store,
};

struct TestGateway {
    server: ApiGatewayServer,
    router: Router,
    store: Arc<InMemoryStore>,
}

impl TestGateway {
    async fn call(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    fn attach(&self, user_id: &str, role: Role) -> mpsc::Receiver<Outbound> {
        let registry = &self.server.components().registry;
        let (tx, rx) = mpsc::channel(64);
        registry.add(
            user_id,
            ConnectionHandle::new(registry.next_connection_id(), role, tx),
        );
        rx
    }
}

#[fixture]
fn gateway() -> TestGateway {
    init_test_env();
    let store = seeded_store();
    let server = build_server(create_test_config(), Arc::clone(&store));
    let router = server.router();
    TestGateway {
        server,
        router,
        store,
    }
}

fn get(uri: &str, user: Option<(&str, Role)>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some((user_id, role)) = user {
        builder = builder.header(header::AUTHORIZATION, bearer(user_id, role));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: Method, uri: &str, user: (&str, Role), body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(user.0, user.1))
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "roadside-web/1.0")
        .header("x-forwarded-for", "192.0.2.44")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn frames(inbox: &mut mpsc::Receiver<Outbound>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(Outbound::Text(text)) = inbox.try_recv() {
        out.push(serde_json::from_str(&text).unwrap());
    }
    out
}

#[rstest]
#[tokio::test]
async fn test_health_is_public(gateway: TestGateway) {
    let _admin = gateway.attach("admin-1", Role::Admin);

    let response = gateway.call(get("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["connections"], 1);
    assert_eq!(body["data"]["stormModeActive"], false);
}

#[rstest]
#[tokio::test]
async fn test_quote_requires_token(gateway: TestGateway) {
    let response = gateway
        .call(get("/api/v1/pricing/quote?serviceId=svc-jump", None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[tokio::test]
async fn test_quote_at_scheduled_time(gateway: TestGateway) {
    let response = gateway
        .call(get(
            "/api/v1/pricing/quote?serviceId=svc-jump&scheduledAt=2026-01-15T23:30:00Z",
            Some(("cust-1", Role::Customer)),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["data"],
        json!({
            "basePrice": 3333,
            "multiplier": 15000,
            "blockName": "Overnight",
            "finalPrice": 5000
        })
    );
}

#[rstest]
#[tokio::test]
async fn test_quote_unknown_service_is_server_error(gateway: TestGateway) {
    let response = gateway
        .call(get(
            "/api/v1/pricing/quote?serviceId=svc-nope",
            Some(("cust-1", Role::Customer)),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["error"], "precondition_failed");
}

#[rstest]
#[tokio::test]
async fn test_storm_mode_lifecycle(gateway: TestGateway) {
    let mut admin_inbox = gateway.attach("admin-1", Role::Admin);
    let storm = json!({"templateName": "Hurricane", "multiplier": 25000});

    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/admin/storm-mode",
            ("cust-1", Role::Customer),
            &storm,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/admin/storm-mode",
            ("admin-1", Role::Admin),
            &storm,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        frames(&mut admin_inbox),
        vec![json!({
            "type": "storm_mode:activated",
            "data": {"templateName": "Hurricane", "multiplier": 25000, "activatedBy": "admin-1"}
        })]
    );

    let response = gateway
        .call(get(
            "/api/v1/pricing/quote?serviceId=svc-tow&scheduledAt=2026-01-15T12:00:00Z",
            Some(("cust-1", Role::Customer)),
        ))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["blockName"], "Hurricane");
    assert_eq!(body["data"]["finalPrice"], 37_500);

    let response = gateway
        .call(send_json(
            Method::DELETE,
            "/api/v1/admin/storm-mode",
            ("admin-1", Role::Admin),
            &json!({}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let deactivated = frames(&mut admin_inbox);
    assert_eq!(deactivated[0]["type"], "storm_mode:deactivated");
    assert_eq!(deactivated[0]["data"]["deactivatedBy"], "admin-1");
}

#[rstest]
#[tokio::test]
async fn test_storm_mode_rejects_zero_multiplier(gateway: TestGateway) {
    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/admin/storm-mode",
            ("admin-1", Role::Admin),
            &json!({"templateName": "Oops", "multiplier": 0}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn test_card_payment_allowed_for_full_tier(gateway: TestGateway) {
    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/payments/card/confirm",
            (TRUSTED_CUSTOMER, Role::Customer),
            &json!({"bookingId": "bk-10", "amount": 8500}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["authorized"], true);
    assert_eq!(body["data"]["bookingId"], "bk-10");
}

#[rstest]
#[tokio::test]
async fn test_card_payment_blocked_for_restricted_tier(gateway: TestGateway) {
    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/payments/card/confirm",
            (RESTRICTED_CUSTOMER, Role::Customer),
            &json!({"bookingId": "bk-11", "amount": 8500}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Trust Tier 1 users cannot use card payments"})
    );

    let mut log = gateway.store.audit_log();
    for _ in 0..50 {
        if !log.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        log = gateway.store.audit_log();
    }
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, BYPASS_ATTEMPT_ACTION);
    assert_eq!(log[0].ip_address, "192.0.2.44");
    assert_eq!(log[0].user_agent, "roadside-web/1.0");
}

#[rstest]
#[tokio::test]
async fn test_card_payment_unknown_user_is_unauthorized(gateway: TestGateway) {
    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/payments/card/confirm",
            ("deleted-user", Role::Customer),
            &json!({"bookingId": "bk-12", "amount": 100}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({"error": "Unauthorized"}));
}

#[rstest]
#[tokio::test]
async fn test_trust_tier_status(gateway: TestGateway) {
    let response = gateway
        .call(get("/api/v1/trust-tier", Some((RESTRICTED_CUSTOMER, Role::Customer))))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["trustTier"], 1);
    assert_eq!(body["data"]["transactionsUntilPromotion"], 3);
    assert_eq!(
        body["data"]["allowedPaymentMethods"],
        json!(["cash", "cashapp", "zelle"])
    );
}

#[rstest]
#[tokio::test]
async fn test_internal_event_dispatch(gateway: TestGateway) {
    let mut tab = gateway.attach("cust-5", Role::Customer);
    let request = json!({
        "audience": {"kind": "user", "id": "cust-5"},
        "event": {
            "type": "payment:refunded",
            "data": {
                "paymentId": "pay-1",
                "bookingId": "bk-5",
                "refundType": "full",
                "refundAmount": 8500
            }
        }
    });

    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/internal/events",
            ("cust-5", Role::Customer),
            &request,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/internal/events",
            ("svc-bookings", Role::Admin),
            &request,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["reached"], 1);

    let received = frames(&mut tab);
    assert_eq!(received, vec![request["event"].clone()]);
}

#[rstest]
#[tokio::test]
async fn test_provider_location_relay(gateway: TestGateway) {
    let mut admin = gateway.attach("admin-1", Role::Admin);
    let mut customer = gateway.attach("cust-8", Role::Customer);

    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/internal/provider-location",
            ("prov-2", Role::Provider),
            &json!({
                "providerId": "prov-2",
                "lat": 33.7490,
                "lng": -84.3880,
                "destination": {"lat": 33.7756, "lng": -84.3963},
                "customerId": "cust-8"
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["reached"], 2);
    let eta = body["data"]["etaMinutes"].as_u64().unwrap();
    assert!((1..=5).contains(&eta));
    let meters = body["data"]["distanceMeters"].as_i64().unwrap();
    assert!((2_500..=3_500).contains(&meters));

    let admin_frames = frames(&mut admin);
    assert_eq!(admin_frames.len(), 1);
    assert_eq!(admin_frames[0]["type"], "provider:location_updated");
    assert_eq!(admin_frames[0]["data"]["etaMinutes"], eta);
    assert_eq!(frames(&mut customer), admin_frames);
}

#[rstest]
#[tokio::test]
async fn test_provider_cannot_report_for_another_provider(gateway: TestGateway) {
    let mut admin = gateway.attach("admin-1", Role::Admin);
    let mut customer = gateway.attach("cust-8", Role::Customer);

    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/internal/provider-location",
            ("prov-2", Role::Provider),
            &json!({
                "providerId": "prov-9",
                "lat": 1.0,
                "lng": 2.0,
                "customerId": "cust-8"
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["error"], "forbidden");
    assert!(frames(&mut admin).is_empty());
    assert!(frames(&mut customer).is_empty());
}

#[rstest]
#[tokio::test]
async fn test_admin_may_report_any_provider_location(gateway: TestGateway) {
    let mut admin = gateway.attach("admin-1", Role::Admin);

    let response = gateway
        .call(send_json(
            Method::POST,
            "/api/v1/internal/provider-location",
            ("admin-2", Role::Admin),
            &json!({"providerId": "prov-9", "lat": 1.0, "lng": 2.0}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let admin_frames = frames(&mut admin);
    assert_eq!(admin_frames.len(), 1);
    assert_eq!(admin_frames[0]["data"]["providerId"], "prov-9");
    assert!(admin_frames[0]["data"].get("etaMinutes").is_none());
}
