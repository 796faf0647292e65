//! Integration tests for the REST API feature.

#![cfg(feature = "api")]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use gme_grid::api::{AppState, router};
use gme_grid::market::client::{ClientError, Credentials, HttpRequest, HttpResponse, Transport};
use gme_grid::market::decode::encode_content;

/// Answers `/Auth` and `/RequestData` like the remote service.
struct FakeGme {
    accept_login: bool,
    content: Option<String>,
    requests: Mutex<usize>,
}

impl FakeGme {
    fn new(accept_login: bool, doc: Option<Value>) -> Arc<Self> {
        let content = doc.map(|d| {
            encode_content("ME_ZonalPrices.json", d.to_string().as_bytes()).expect("encode")
        });
        Arc::new(Self {
            accept_login,
            content,
            requests: Mutex::new(0),
        })
    }

    fn data_requests(&self) -> usize {
        self.requests.lock().map(|n| *n).unwrap_or(0)
    }
}

impl Transport for FakeGme {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        let body = if request.url.ends_with("/Auth") {
            if self.accept_login {
                json!({"Success": true, "token": "test-token"})
            } else {
                json!({"Success": false, "Reason": "invalid credentials"})
            }
        } else if request.url.ends_with("/RequestData") {
            if let Ok(mut n) = self.requests.lock() {
                *n += 1;
            }
            match &self.content {
                Some(c) => json!({"ContentResponse": c}),
                None => json!({"ResultRequest": "no data"}),
            }
        } else {
            return Ok(HttpResponse {
                status: 404,
                body: String::new(),
            });
        };
        Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        })
    }
}

fn state(transport: Arc<FakeGme>) -> Arc<AppState> {
    Arc::new(AppState {
        credentials: Some(Credentials {
            username: "user".into(),
            password: "secret".into(),
        }),
        base_url: "http://gme.test".into(),
        transport,
    })
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn price_request(start: &str, end: &str) -> Value {
    json!({"type": "electricity", "market": "MGP", "start_date": start, "end_date": end})
}

#[tokio::test]
async fn price_data_fetches_each_day_and_fills_dates() {
    let doc = json!({"Prices": [
        {"Hour": 1, "Zone": "NORD", "Price": 101.5},
        {"Hour": 2, "Zone": "SUD", "Price": 95.0},
    ]});
    let fake = FakeGme::new(true, Some(doc));
    let app = router(state(Arc::clone(&fake)));

    let resp = app
        .oneshot(post("/api/price-data", &price_request("2025-12-29", "2025-12-30")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(fake.data_requests(), 2);

    let json = json_body(resp).await;
    assert_eq!(json["count"], 4);
    assert_eq!(json["data"][0]["date"], "2025-12-29");
    assert_eq!(json["data"][0]["zone"], "NORD");
    assert_eq!(json["data"][0]["interval"], 1);
    assert_eq!(json["data"][3]["date"], "2025-12-30");
}

#[tokio::test]
async fn rejected_login_returns_401() {
    let app = router(state(FakeGme::new(false, None)));
    let resp = app
        .oneshot(post("/api/price-data", &price_request("2025-12-30", "2025-12-30")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(resp).await;
    assert!(json["error"].as_str().unwrap().contains("authentication failed"));
}

#[tokio::test]
async fn empty_range_returns_404() {
    let app = router(state(FakeGme::new(true, None)));
    let resp = app
        .oneshot(post("/api/price-data", &price_request("2025-12-30", "2025-12-30")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_requests_return_400() {
    let bad = [
        json!({"type": "electricity", "market": "XYZ", "start_date": "2025-12-30", "end_date": "2025-12-30"}),
        json!({"type": "water", "market": "MGP", "start_date": "2025-12-30", "end_date": "2025-12-30"}),
        json!({"type": "electricity", "market": "MGP", "start_date": "30/12/2025", "end_date": "2025-12-30"}),
        price_request("2025-12-31", "2025-12-30"),
    ];
    for body in bad {
        let fake = FakeGme::new(true, None);
        let app = router(state(Arc::clone(&fake)));
        let resp = app.oneshot(post("/api/price-data", &body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(fake.data_requests(), 0);
    }
}

fn month_of_history() -> Vec<Value> {
    let mut history = Vec::new();
    for day in 1..=31 {
        for interval in 1..=24 {
            let price = 100.0 + f64::from(interval) + f64::from(day % 7);
            history.push(json!({
                "date": format!("2025-01-{day:02}"),
                "interval": interval,
                "price": price,
            }));
        }
    }
    history
}

#[tokio::test]
async fn forecast_returns_two_days_by_default() {
    let app = router(state(FakeGme::new(true, None)));
    let resp = app
        .oneshot(post("/api/forecast", &json!({"history": month_of_history()})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = json_body(resp).await;
    assert_eq!(json["count"], 48);
    assert_eq!(json["forecast"][0]["date"], "2025-02-01");
    assert_eq!(json["forecast"][0]["type"], "forecast");
    assert_eq!(json["forecast"][47]["interval"], 24);
}

#[tokio::test]
async fn forecast_rejects_out_of_range_days() {
    for days in [0_u64, 32, 1_000_000_000_000_000] {
        let app = router(state(FakeGme::new(true, None)));
        let body = json!({"history": month_of_history(), "days": days});
        let resp = app.oneshot(post("/api/forecast", &body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "days {days}");
        let json = json_body(resp).await;
        assert!(json["error"].as_str().unwrap().contains("days"));
    }
}

#[tokio::test]
async fn export_returns_csv_attachment() {
    let body = json!({
        "rows": [
            {"date": "2025-12-30", "zone": "NORD", "price": 101.5},
            {"date": "2025-12-30", "zone": "SUD", "price": 95},
        ],
        "filename": "mgp_prices.xlsx",
    });
    let app = router(state(FakeGme::new(true, None)));
    let resp = app.oneshot(post("/api/export", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(disposition.contains("mgp_prices.csv"));

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("date,zone,price"));
    assert_eq!(lines.next(), Some("2025-12-30,NORD,101.5"));
}

#[tokio::test]
async fn export_without_rows_returns_400() {
    let app = router(state(FakeGme::new(true, None)));
    let resp = app
        .oneshot(post("/api/export", &json!({"rows": []})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["error"], "No data to export");
}
