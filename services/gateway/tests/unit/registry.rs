//! Connection registry and event dispatch tests

use pretty_assertions::assert_eq;
use roadside_common::{Role, WsEvent};
use rstest::*;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;

use roadside_gateway::{
    dispatcher::{Audience, EventDispatcher},
    registry::{ConnectionHandle, ConnectionRegistry, Outbound},
};

type Inbox = mpsc::Receiver<Outbound>;

fn connect(registry: &ConnectionRegistry, user_id: &str, role: Role) -> (ConnectionHandle, Inbox) {
    let (tx, rx) = mpsc::channel(64);
    let handle = ConnectionHandle::new(registry.next_connection_id(), role, tx);
    registry.add(user_id, handle.clone());
    (handle, rx)
}

fn received(inbox: &mut Inbox) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = inbox.try_recv() {
        if let Outbound::Text(text) = frame {
            frames.push(serde_json::from_str(&text).expect("frames are JSON"));
        }
    }
    frames
}

fn status_changed(booking_id: &str) -> WsEvent {
    WsEvent::BookingStatusChanged {
        booking_id: booking_id.to_string(),
        status: "dispatched".to_string(),
    }
}

#[fixture]
fn registry() -> Arc<ConnectionRegistry> {
    Arc::new(ConnectionRegistry::new())
}

#[rstest]
fn test_user_broadcast_reaches_every_tab(registry: Arc<ConnectionRegistry>) {
    let (_a, mut tab_a) = connect(&registry, "cust-1", Role::Customer);
    let (_b, mut tab_b) = connect(&registry, "cust-1", Role::Customer);
    let (_c, mut other) = connect(&registry, "cust-2", Role::Customer);

    let reached = registry.broadcast_to_user("cust-1", &status_changed("bk-1"));

    assert_eq!(reached, 2);
    let expected = json!({
        "type": "booking:status_changed",
        "data": {"bookingId": "bk-1", "status": "dispatched"}
    });
    assert_eq!(received(&mut tab_a), vec![expected.clone()]);
    assert_eq!(received(&mut tab_b), vec![expected]);
    assert!(received(&mut other).is_empty());
}

#[rstest]
fn test_admin_broadcast_filters_by_role(registry: Arc<ConnectionRegistry>) {
    let (_a1, mut admin_1) = connect(&registry, "admin-1", Role::Admin);
    let (_a2, mut admin_2) = connect(&registry, "admin-2", Role::Admin);
    let (_p, mut provider) = connect(&registry, "prov-1", Role::Provider);
    let (_c, mut customer) = connect(&registry, "cust-1", Role::Customer);

    let event = WsEvent::StormModeDeactivated {
        deactivated_by: "admin-1".to_string(),
    };
    assert_eq!(registry.broadcast_to_admins(&event), 2);

    assert_eq!(received(&mut admin_1).len(), 1);
    assert_eq!(received(&mut admin_2).len(), 1);
    assert!(received(&mut provider).is_empty());
    assert!(received(&mut customer).is_empty());
}

#[rstest]
fn test_offline_user_is_noop(registry: Arc<ConnectionRegistry>) {
    assert_eq!(registry.broadcast_to_user("nobody", &status_changed("bk-2")), 0);
    assert_eq!(registry.broadcast_to_admins(&status_changed("bk-2")), 0);
}

#[rstest]
fn test_closed_socket_is_skipped(registry: Arc<ConnectionRegistry>) {
    let (_open, mut open_inbox) = connect(&registry, "cust-1", Role::Customer);
    let (_closed, closed_inbox) = connect(&registry, "cust-1", Role::Customer);
    drop(closed_inbox);

    let reached = registry.broadcast_to_user("cust-1", &status_changed("bk-3"));

    assert_eq!(reached, 1);
    assert_eq!(received(&mut open_inbox).len(), 1);
}

#[rstest]
fn test_remove_one_tab_keeps_the_other(registry: Arc<ConnectionRegistry>) {
    let (first, _rx1) = connect(&registry, "cust-1", Role::Customer);
    let (_second, _rx2) = connect(&registry, "cust-1", Role::Customer);

    assert!(registry.remove("cust-1", first.id()));
    assert!(registry.contains_user("cust-1"));
    assert_eq!(registry.user_connection_count("cust-1"), 1);

    assert!(!registry.remove("cust-1", first.id()));
}

#[rstest]
fn test_last_remove_drops_user_entry(registry: Arc<ConnectionRegistry>) {
    let (only, _rx) = connect(&registry, "prov-1", Role::Provider);

    assert!(registry.remove("prov-1", only.id()));
    assert!(!registry.contains_user("prov-1"));
    assert_eq!(registry.connection_count(), 0);
}

#[rstest]
fn test_dispatcher_routes_audiences(registry: Arc<ConnectionRegistry>) {
    let dispatcher = EventDispatcher::new(Arc::clone(&registry));
    let (_p, mut provider) = connect(&registry, "prov-7", Role::Provider);
    let (_a, mut admin) = connect(&registry, "admin-1", Role::Admin);
    let (_c, mut customer) = connect(&registry, "cust-9", Role::Customer);

    let event = WsEvent::ProviderJobAssigned {
        booking_id: "bk-4".to_string(),
        provider_id: "prov-7".to_string(),
        contact_name: "Dana".to_string(),
        address: "12 Peachtree St".to_string(),
        service_name: Some("Tow".to_string()),
        estimated_price: Some(15_000),
        estimated_payout: None,
    };
    assert_eq!(dispatcher.dispatch(&Audience::Provider("prov-7".to_string()), &event), 1);

    let reached = dispatcher.dispatch_all(
        &[Audience::Admins, Audience::User("cust-9".to_string())],
        &status_changed("bk-4"),
    );
    assert_eq!(reached, 2);

    let provider_frames = received(&mut provider);
    assert_eq!(provider_frames.len(), 1);
    assert_eq!(provider_frames[0]["type"], "provider:job_assigned");
    assert_eq!(provider_frames[0]["data"]["estimatedPrice"], 15_000);
    assert!(provider_frames[0]["data"].get("estimatedPayout").is_none());
    assert_eq!(received(&mut admin).len(), 1);
    assert_eq!(received(&mut customer).len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_and_remove(registry: Arc<ConnectionRegistry>) {
    let mut tasks = Vec::new();
    for worker in 0..8 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let mut inboxes = Vec::new();
            for i in 0..25 {
                let user_id = format!("user-{}", i % 5);
                let (handle, rx) = connect(&registry, &user_id, Role::Customer);
                if (worker + i) % 2 == 0 {
                    registry.remove(&user_id, handle.id());
                } else {
                    inboxes.push(rx);
                }
            }
            inboxes.len()
        }));
    }

    let mut kept = 0;
    for task in tasks {
        kept += task.await.unwrap();
    }

    assert_eq!(registry.connection_count(), kept);
}
