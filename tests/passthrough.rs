//! Liveness, pass-through relays and server plumbing.

use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use platform_relay::upstream::types::{MASS_SEND_ALL, TAGS_GET};
use serde_json::{json, Value};

mod common;

use common::Recorder;

const TAGS_BODY: &str = r#"{"tags":[{"id":2,"name":"星标组","count":0},{"id":127,"name":"广东","count":5}]}"#;
const MASS_REPLY: &str = r#"{"errcode":0,"errmsg":"send job submission success","msg_id":34182,"msg_data_id":206227730}"#;

fn platform(recorder: Recorder) -> Router {
    Router::new()
        .route(TAGS_GET, get(|| async { TAGS_BODY }))
        .route(
            MASS_SEND_ALL,
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    recorder.record(body);
                    MASS_REPLY
                }
            }),
        )
}

#[tokio::test]
async fn test_liveness() {
    let relay = common::start_relay(common::relay_config(common::closed_addr().await)).await;
    let client = common::client();

    let res = client.get(relay.url("/api/hello")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({"code": 0, "data": "helloworld"}));

    let res = client.post(relay.url("/api/hello")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({"code": -1, "errorMsg": "request method not supported", "data": null})
    );

    let res = client.head(relay.url("/api/hello")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_tags_relayed_verbatim() {
    let upstream = common::start_mock_upstream(platform(Recorder::default())).await;
    let relay = common::start_relay(common::relay_config(upstream)).await;

    let res = common::client().get(relay.url("/api/tags")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(res.text().await.unwrap(), TAGS_BODY);
}

#[tokio::test]
async fn test_tags_error_status_still_relayed() {
    let router = Router::new().route(
        TAGS_GET,
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, r#"{"errcode":-1,"errmsg":"system error"}"#) }),
    );
    let upstream = common::start_mock_upstream(router).await;
    let relay = common::start_relay(common::relay_config(upstream)).await;

    let res = common::client().get(relay.url("/api/tags")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), r#"{"errcode":-1,"errmsg":"system error"}"#);
}

#[tokio::test]
async fn test_tags_transport_error() {
    let relay = common::start_relay(common::relay_config(common::closed_addr().await)).await;

    let res = common::client().get(relay.url("/api/tags")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.text().await.unwrap().starts_with("upstream call failed"));
}

#[tokio::test]
async fn test_mass_send_reencodes_and_relays() {
    let recorder = Recorder::default();
    let upstream = common::start_mock_upstream(platform(recorder.clone())).await;
    let relay = common::start_relay(common::relay_config(upstream)).await;

    let request = json!({
        "filter": {"is_to_all": false, "tag_id": 2},
        "mpnews": {"media_id": "123dsdajkasd231jhksad"},
        "msgtype": "mpnews",
        "send_ignore_reprint": 0
    });
    let res = common::client()
        .post(relay.url("/api/mass/send"))
        .json(&request)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::CONTENT_TYPE],
        "application/json;charset=utf-8"
    );
    assert_eq!(res.text().await.unwrap(), MASS_REPLY);
    // Only the known fields survive decoding.
    assert_eq!(
        recorder.calls(),
        vec![json!({
            "filter": {"is_to_all": false, "tag_id": 2},
            "mpnews": {"media_id": "123dsdajkasd231jhksad"},
            "msgtype": "mpnews"
        })]
    );
}

#[tokio::test]
async fn test_mass_send_malformed_request() {
    let recorder = Recorder::default();
    let upstream = common::start_mock_upstream(platform(recorder.clone())).await;
    let relay = common::start_relay(common::relay_config(upstream)).await;

    let res = common::client()
        .post(relay.url("/api/mass/send"))
        .body(r#"{"filter": {"is_to_all": "nope"}}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(recorder.count(), 0);
}

#[tokio::test]
async fn test_mass_send_transport_error() {
    let relay = common::start_relay(common::relay_config(common::closed_addr().await)).await;

    let res = common::client()
        .post(relay.url("/api/mass/send"))
        .json(&json!({
            "filter": {"is_to_all": true, "tag_id": 0},
            "mpnews": {"media_id": "m"},
            "msgtype": "mpnews"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_request_id_assigned_and_propagated() {
    let relay = common::start_relay(common::relay_config(common::closed_addr().await)).await;
    let client = common::client();

    let res = client.get(relay.url("/api/hello")).send().await.unwrap();
    let generated = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(generated.len(), 36);

    let res = client
        .get(relay.url("/api/hello"))
        .header("x-request-id", "frontend-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "frontend-42");
}

#[tokio::test]
async fn test_config_reload_switches_upstream() {
    let relay = common::start_relay(common::relay_config(common::closed_addr().await)).await;
    let client = common::client();

    let res = client.get(relay.url("/api/tags")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let upstream = common::start_mock_upstream(platform(Recorder::default())).await;
    relay
        .config_updates
        .send(common::relay_config(upstream))
        .unwrap();

    let mut body = String::new();
    for _ in 0..50 {
        let res = client.get(relay.url("/api/tags")).send().await.unwrap();
        if res.status() == StatusCode::OK {
            body = res.text().await.unwrap();
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(body, TAGS_BODY);
}
