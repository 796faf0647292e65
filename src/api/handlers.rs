//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{Days, NaiveDate};

use super::AppState;
use super::types::{
    ErrorResponse, ExportRequest, ForecastRequest, ForecastResponse, PriceDataRequest,
    PriceDataResponse,
};
use crate::forecast::{DEFAULT_DAYS, Forecaster, MAX_FORECAST_DAYS, RidgeForecaster};
use crate::market::catalog::{MarketCatalog, MarketType};
use crate::market::client::{ClientError, DataRequest, GmeClient};
use crate::market::normalize::{PricePoint, normalize};
use crate::market::table::write_records_csv;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Returns the static market catalog.
///
/// `GET /api/markets` → 200 + `MarketCatalog` JSON
pub async fn get_markets() -> Json<MarketCatalog> {
    Json(MarketCatalog::new())
}

/// Validated form of a [`PriceDataRequest`].
struct PriceQuery {
    market_type: MarketType,
    market: String,
    start: NaiveDate,
    end: NaiveDate,
}

fn validate(req: PriceDataRequest) -> Result<PriceQuery, ApiError> {
    let (Some(kind), Some(market), Some(start), Some(end)) =
        (req.kind, req.market, req.start_date, req.end_date)
    else {
        return Err(error(StatusCode::BAD_REQUEST, "Missing parameters"));
    };
    if [&kind, &market, &start, &end].iter().any(|s| s.trim().is_empty()) {
        return Err(error(StatusCode::BAD_REQUEST, "Missing parameters"));
    }
    let market_type: MarketType = kind
        .parse()
        .map_err(|e: String| error(StatusCode::BAD_REQUEST, e))?;
    let market = market.trim().to_string();
    if !market_type.is_known_market(&market) {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!("unknown {market_type} market \"{market}\""),
        ));
    }
    let parse = |s: &str| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            error(
                StatusCode::BAD_REQUEST,
                format!("invalid date \"{s}\", expected YYYY-MM-DD"),
            )
        })
    };
    let (start, end) = (parse(&start)?, parse(&end)?);
    if start > end {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "start_date must not be after end_date",
        ));
    }
    Ok(PriceQuery {
        market_type,
        market,
        start,
        end,
    })
}

/// Fetches and normalizes one market over a date range, one day at a time.
///
/// Days that fail are logged and skipped.
///
/// # Errors
///
/// Returns [`ClientError::Auth`] if the initial login fails.
fn fetch_range(client: &mut GmeClient, query: &PriceQuery) -> Result<Vec<PricePoint>, ClientError> {
    client.login()?;
    let mut all = Vec::new();
    let mut day = query.start;
    while day <= query.end {
        let request = DataRequest::new(query.market_type.data_name(), &query.market, day, day);
        match client.fetch_json(&request) {
            Ok(Some(doc)) => {
                let mut points = normalize(&doc, query.market_type);
                let label = day.format("%Y-%m-%d").to_string();
                for p in points.iter_mut().filter(|p| p.date.is_empty()) {
                    p.date.clone_from(&label);
                }
                tracing::info!(date = %day, items = points.len(), "parsed market data");
                all.extend(points);
            }
            Ok(None) => tracing::info!(date = %day, "no data"),
            Err(e) => tracing::warn!(date = %day, error = %e, "fetch failed"),
        }
        let Some(next) = day.checked_add_days(Days::new(1)) else {
            break;
        };
        day = next;
    }
    Ok(all)
}

/// Fetches normalized prices for a market and date range.
///
/// `POST /api/price-data` → 200 + `PriceDataResponse` JSON
/// Missing or invalid parameters → 400; credentials unset → 500;
/// login rejected → 401; nothing found → 404.
pub async fn post_price_data(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PriceDataRequest>,
) -> Result<Json<PriceDataResponse>, ApiError> {
    let query = validate(req)?;
    tracing::info!(
        market_type = %query.market_type,
        market = %query.market,
        start = %query.start,
        end = %query.end,
        "price data requested"
    );
    let Some(credentials) = state.credentials.clone() else {
        return Err(error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "GME credentials not set",
        ));
    };

    let mut client =
        GmeClient::with_transport(credentials, &state.base_url, Arc::clone(&state.transport));
    let fetched = tokio::task::spawn_blocking(move || fetch_range(&mut client, &query))
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let data = match fetched {
        Ok(data) => data,
        Err(ClientError::Auth(reason)) => {
            tracing::error!(%reason, "GME API login failed");
            return Err(error(
                StatusCode::UNAUTHORIZED,
                "GME API authentication failed. Please check credentials.",
            ));
        }
        Err(e) => return Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    if data.is_empty() {
        return Err(error(
            StatusCode::NOT_FOUND,
            "No data found for the specified date range. Try a different date or market.",
        ));
    }
    Ok(Json(PriceDataResponse {
        count: data.len(),
        data,
    }))
}

/// Forecasts prices from posted history.
///
/// `POST /api/forecast` → 200 + `ForecastResponse` JSON
/// Empty history or `days` outside `1..=MAX_FORECAST_DAYS` → 400.
pub async fn post_forecast(
    Json(req): Json<ForecastRequest>,
) -> Result<Json<ForecastResponse>, ApiError> {
    if req.history.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "No historical data provided"));
    }
    let days = req.days.unwrap_or(DEFAULT_DAYS);
    if !(1..=MAX_FORECAST_DAYS).contains(&days) {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!("days must be between 1 and {MAX_FORECAST_DAYS}"),
        ));
    }
    let history = req.history;
    let forecast =
        tokio::task::spawn_blocking(move || RidgeForecaster::default().forecast(&history, days))
            .await
            .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(ForecastResponse {
        count: forecast.len(),
        forecast,
    }))
}

/// Returns posted rows as a CSV attachment.
///
/// `POST /api/export` → 200 + `text/csv`
/// Empty rows → 400.
pub async fn post_export(Json(req): Json<ExportRequest>) -> Result<Response, ApiError> {
    if req.rows.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "No data to export"));
    }
    let mut body = Vec::new();
    write_records_csv(&req.rows, &mut body)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let filename = export_filename(req.filename.as_deref());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Safe download name ending in `.csv`.
fn export_filename(requested: Option<&str>) -> String {
    let cleaned: String = requested
        .unwrap_or("gme_data")
        .chars()
        .filter(|c| !matches!(c, '"' | '/' | '\\' | '\r' | '\n'))
        .collect();
    let stem = cleaned
        .strip_suffix(".xlsx")
        .or_else(|| cleaned.strip_suffix(".xls"))
        .or_else(|| cleaned.strip_suffix(".csv"))
        .unwrap_or(&cleaned)
        .trim();
    if stem.is_empty() {
        "gme_data.csv".to_string()
    } else {
        format!("{stem}.csv")
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::market::client::{HttpRequest, HttpResponse, Transport};

    struct Offline;

    impl Transport for Offline {
        fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, ClientError> {
            Err(ClientError::Transport("offline".into()))
        }
    }

    fn make_test_state() -> Arc<AppState> {
        Arc::new(AppState {
            credentials: None,
            base_url: "http://localhost".into(),
            transport: Arc::new(Offline),
        })
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn markets_returns_catalog() {
        let app = router(make_test_state());
        let req = Request::builder()
            .uri("/api/markets")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["electricity"].as_array().map(Vec::len), Some(10));
        assert_eq!(json["gas"][0]["id"], "MGP-GAS");
    }

    #[tokio::test]
    async fn price_data_missing_params_returns_400() {
        let app = router(make_test_state());
        let resp = app
            .oneshot(post_json("/api/price-data", r#"{"type": "electricity"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn price_data_without_credentials_returns_500() {
        let app = router(make_test_state());
        let body = r#"{"type": "electricity", "market": "MGP",
                       "start_date": "2025-12-30", "end_date": "2025-12-30"}"#;
        let resp = app.oneshot(post_json("/api/price-data", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn forecast_without_history_returns_400() {
        let app = router(make_test_state());
        let resp = app
            .oneshot(post_json("/api/forecast", r#"{"history": []}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "No historical data provided");
    }

    #[test]
    fn export_filename_is_sanitized() {
        assert_eq!(export_filename(None), "gme_data.csv");
        assert_eq!(export_filename(Some("prices.xlsx")), "prices.csv");
        assert_eq!(export_filename(Some("../\"x\".csv")), "..x.csv");
        assert_eq!(export_filename(Some(".xlsx")), "gme_data.csv");
    }

    #[test]
    fn invalid_dates_are_rejected() {
        let req = PriceDataRequest {
            kind: Some("electricity".into()),
            market: Some("MGP".into()),
            start_date: Some("2025-12-31".into()),
            end_date: Some("2025-12-30".into()),
        };
        assert!(validate(req).is_err());
    }
}
