use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Local, NaiveDate};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use ulid::Ulid;

use campsite::calendar::Calendar;
use campsite::engine::{DayUniverse, Engine};
use campsite::policy::ReservationPolicy;
use campsite::protocol;
use campsite::store::WalStore;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server(policy: Option<ReservationPolicy>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("campsite_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Arc::new(WalStore::open(dir.join("bookings.wal")).unwrap());
    let (first, last) = Calendar::seed_range(today(), 1);
    store.seed_calendar_if_empty(first, last).await.unwrap();
    let calendar = Arc::new(Calendar::materialize(first, last));
    let engine = Arc::new(Engine::with_universe(store, DayUniverse::Materialized(calendar)));

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let engine = engine.clone();
            tokio::spawn(async move {
                let _ = protocol::process_connection(socket, engine, policy).await;
            });
        }
    });

    addr
}

type Client = Framed<TcpStream, LinesCodec>;

async fn connect(addr: SocketAddr) -> Client {
    let socket = TcpStream::connect(addr).await.unwrap();
    Framed::new(socket, LinesCodec::new())
}

async fn call(client: &mut Client, request: Value) -> Value {
    client.send(request.to_string()).await.unwrap();
    let line = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("response timed out")
        .expect("connection closed")
        .unwrap();
    serde_json::from_str(&line).unwrap()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn day(offset: u64) -> String {
    (today() + Days::new(offset)).to_string()
}

fn create(arrival: &str, departure: &str) -> Value {
    json!({
        "op": "create",
        "guest_email": "ana@example.com",
        "guest_name": "Ana",
        "arrival": arrival,
        "departure": departure,
    })
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn booking_lifecycle_over_tcp() {
    let addr = start_test_server(Some(ReservationPolicy::default())).await;
    let mut client = connect(addr).await;

    let resp = call(&mut client, create(&day(5), &day(8))).await;
    assert_eq!(resp["result"], "booking");
    let id = resp["booking"]["id"].as_str().unwrap().to_string();
    assert_eq!(resp["booking"]["status"], "ACTIVE");
    assert_eq!(resp["booking"]["stay"]["arrival"], day(5));

    let resp = call(&mut client, json!({"op": "get", "id": id})).await;
    assert_eq!(resp["booking"]["guest_name"], "Ana");

    let resp = call(
        &mut client,
        json!({"op": "update", "id": id, "guest_email": "ana@new.example.com"}),
    )
    .await;
    assert_eq!(resp["booking"]["guest_email"], "ana@new.example.com");
    assert_eq!(resp["booking"]["stay"]["departure"], day(8));

    let resp = call(
        &mut client,
        json!({"op": "list", "guest_email": "ana@new.example.com"}),
    )
    .await;
    assert_eq!(resp["bookings"].as_array().unwrap().len(), 1);

    let resp = call(&mut client, json!({"op": "cancel", "id": id})).await;
    assert_eq!(resp["booking"]["status"], "CANCELLED");
    let again = call(&mut client, json!({"op": "cancel", "id": id})).await;
    assert_eq!(again, resp);

    let resp = call(&mut client, json!({"op": "update", "id": id, "guest_name": "Bo"})).await;
    assert_eq!(resp["result"], "error");
    assert_eq!(resp["kind"], "not_modifiable");
    assert_eq!(resp["code"], 405);
}

#[tokio::test]
async fn conflicts_and_availability() {
    let addr = start_test_server(Some(ReservationPolicy::default())).await;
    let mut client = connect(addr).await;

    let resp = call(&mut client, create(&day(10), &day(13))).await;
    assert_eq!(resp["result"], "booking");

    let resp = call(&mut client, create(&day(11), &day(12))).await;
    assert_eq!(resp["kind"], "unavailable_dates");
    assert_eq!(resp["code"], 409);

    // Checkout day is free for the next guest.
    let resp = call(&mut client, create(&day(13), &day(14))).await;
    assert_eq!(resp["result"], "booking");

    let resp = call(
        &mut client,
        json!({"op": "availability", "from": day(8), "to": day(14)}),
    )
    .await;
    assert_eq!(resp["result"], "availability");
    assert_eq!(resp["available_days"], json!([day(8), day(9), day(14)]));

    let resp = call(&mut client, json!({"op": "availability"})).await;
    assert_eq!(resp["from"], day(1));
    let free = resp["available_days"].as_array().unwrap();
    assert!(!free.contains(&json!(day(10))));
    assert!(free.contains(&json!(day(9))));

    let resp = call(
        &mut client,
        json!({"op": "availability", "from": day(9), "to": day(8)}),
    )
    .await;
    assert_eq!(resp["kind"], "bad_range");
}

#[tokio::test]
async fn rejects_bad_input_and_keeps_serving() {
    let addr = start_test_server(Some(ReservationPolicy::default())).await;
    let mut client = connect(addr).await;

    let resp = call(&mut client, json!({"op": "teleport"})).await;
    assert_eq!(resp["kind"], "invalid_request");

    let resp = call(&mut client, create(&day(2), &day(7))).await;
    assert_eq!(resp["kind"], "policy_violation");

    let resp = call(&mut client, create(&day(0), &day(1))).await;
    assert_eq!(resp["kind"], "policy_violation");

    let resp = call(&mut client, json!({"op": "get", "id": Ulid::new().to_string()})).await;
    assert_eq!(resp["kind"], "not_found");
    assert_eq!(resp["code"], 404);

    let resp = call(&mut client, create(&day(3), &day(4))).await;
    assert_eq!(resp["result"], "booking");
}

#[tokio::test]
async fn policy_applies_to_date_changes() {
    let addr = start_test_server(Some(ReservationPolicy::default())).await;
    let mut client = connect(addr).await;

    let resp = call(&mut client, create(&day(5), &day(7))).await;
    let id = resp["booking"]["id"].as_str().unwrap().to_string();

    let resp = call(
        &mut client,
        json!({"op": "update", "id": id, "arrival": day(6), "departure": day(12)}),
    )
    .await;
    assert_eq!(resp["kind"], "policy_violation");

    let resp = call(&mut client, json!({"op": "update", "id": id, "departure": day(90)})).await;
    assert_eq!(resp["kind"], "policy_violation");

    let resp = call(&mut client, json!({"op": "update", "id": id, "arrival": day(0)})).await;
    assert_eq!(resp["kind"], "policy_violation");

    let resp = call(&mut client, json!({"op": "update", "id": id, "departure": day(8)})).await;
    assert_eq!(resp["result"], "booking");
    assert_eq!(resp["booking"]["stay"]["departure"], day(8));

    let yesterday = (today() - Days::new(1)).to_string();
    let resp = call(
        &mut client,
        json!({"op": "availability", "from": yesterday, "to": day(3)}),
    )
    .await;
    assert_eq!(resp["kind"], "policy_violation");
}

#[tokio::test]
async fn oversized_line_closes_only_that_connection() {
    let addr = start_test_server(None).await;
    let mut client = connect(addr).await;

    client.send("x".repeat(32 * 1024)).await.unwrap();
    // The server answers and hangs up; unread bytes may turn the close into a reset.
    if let Ok(Some(Ok(line))) = tokio::time::timeout(Duration::from_secs(5), client.next()).await {
        let resp: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(resp["kind"], "invalid_request");
    }

    let mut client = connect(addr).await;
    let resp = call(&mut client, create(&day(3), &day(4))).await;
    assert_eq!(resp["result"], "booking");
}

#[tokio::test]
async fn policy_can_be_disabled() {
    let addr = start_test_server(None).await;
    let mut client = connect(addr).await;
    let resp = call(&mut client, create(&day(2), &day(40))).await;
    assert_eq!(resp["result"], "booking");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_one_winner() {
    let addr = start_test_server(Some(ReservationPolicy::default())).await;
    let mut handles = Vec::new();
    for _ in 0..16 {
        handles.push(tokio::spawn(async move {
            let mut client = connect(addr).await;
            call(&mut client, create(&day(20), &day(22))).await
        }));
    }
    let mut wins = 0;
    for h in handles {
        let resp = h.await.unwrap();
        match resp["result"].as_str() {
            Some("booking") => wins += 1,
            _ => assert_eq!(resp["kind"], "unavailable_dates"),
        }
    }
    assert_eq!(wins, 1);
}
