use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use enforcement_ai::{AiConfig, AiEnrichmentClient, Enrichment};
use enforcement_api::{
    local_today, ApiError, EnforcementApi, RecommendRequest, SearchRequest, SearchResult,
    SummaryOutcome, WeeklyReportRequest, API_CONTRACT_VERSION,
};
use enforcement_core::{
    Attribution, BulkOutcome, Confirmation, DashboardStats, EnforcementRecord, RecordDraft,
    RecordError, RecordId,
};
use enforcement_reports::ReportError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const ACTOR_HEADER: &str = "x-actor";
const DEFAULT_ACTOR: &str = "Current Officer";

#[derive(Debug, Clone)]
struct ServiceState {
    api: EnforcementApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    error: String,
    #[serde(skip)]
    status: StatusCode,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct BulkCloseRequest {
    ids: Vec<RecordId>,
    confirmed: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct BulkAssignRequest {
    ids: Vec<RecordId>,
    #[serde(default)]
    officer: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = "enforcement-service")]
#[command(about = "Local HTTP service for enforcement records")]
struct Args {
    #[arg(long, default_value = "./enforcement_records.sqlite3")]
    db: PathBuf,
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
}

impl ServiceError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { service_contract_version: SERVICE_CONTRACT_VERSION, error: message.into(), status }
    }

    fn from_anyhow(err: &anyhow::Error) -> Self {
        let status = status_for(err);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %format!("{err:#}"), "request failed");
        }
        Self::new(status, format!("{err:#}"))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

fn status_for(err: &anyhow::Error) -> StatusCode {
    if let Some(err) = err.downcast_ref::<RecordError>() {
        return match err {
            RecordError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
    }
    if let Some(err) = err.downcast_ref::<ReportError>() {
        return match err {
            ReportError::NothingToExport => StatusCode::NOT_FOUND,
            ReportError::InvalidRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ReportError::Pdf(_) | ReportError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
    }
    if let Some(err) = err.downcast_ref::<ApiError>() {
        return match err {
            ApiError::EnrichmentInFlight(_) => StatusCode::CONFLICT,
            ApiError::MissingIssue => StatusCode::UNPROCESSABLE_ENTITY,
        };
    }
    StatusCode::INTERNAL_SERVER_ERROR
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

fn attribution(headers: &HeaderMap) -> Attribution {
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ACTOR);
    Attribution::now(actor)
}

/// Store and provider calls block; keep them off the async workers.
async fn blocking<T, F>(task: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result.map_err(|err| ServiceError::from_anyhow(&err)),
        Err(err) => Err(ServiceError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("blocking task failed: {err}"),
        )),
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/directory", get(directory))
        .route("/v1/stats", get(stats))
        .route("/v1/records", get(records_search).post(records_create))
        .route("/v1/records/bulk/close", post(records_bulk_close))
        .route("/v1/records/bulk/assign", post(records_bulk_assign))
        .route("/v1/records/:id", get(records_show).put(records_update))
        .route("/v1/records/:id/summary", post(records_summary))
        .route("/v1/ai/recommendations", post(ai_recommendations))
        .route("/v1/exports/csv", get(exports_csv))
        .route("/v1/reports/weekly", post(reports_weekly))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();
    let ai = AiEnrichmentClient::from_config(&AiConfig::from_env());
    let state = ServiceState { api: EnforcementApi::new(args.db, ai) };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(bind = %args.bind, "enforcement service listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn directory(State(state): State<ServiceState>) -> Json<ServiceEnvelope<serde_json::Value>> {
    let directory = state.api.directory();
    Json(envelope(serde_json::json!({
        "units": directory.units(),
        "sub_counties": directory.sorted_sub_county_names()
    })))
}

async fn stats(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<DashboardStats>>, ServiceError> {
    let stats = blocking(move || state.api.stats()).await?;
    Ok(Json(envelope(stats)))
}

async fn records_search(
    State(state): State<ServiceState>,
    Query(request): Query<SearchRequest>,
) -> Result<Json<ServiceEnvelope<SearchResult>>, ServiceError> {
    let result = blocking(move || state.api.search(&request)).await?;
    Ok(Json(envelope(result)))
}

async fn records_create(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(draft): Json<RecordDraft>,
) -> Result<(StatusCode, Json<ServiceEnvelope<EnforcementRecord>>), ServiceError> {
    let attribution = attribution(&headers);
    let record = blocking(move || state.api.create_record(draft, &attribution)).await?;
    Ok((StatusCode::CREATED, Json(envelope(record))))
}

async fn records_show(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceEnvelope<EnforcementRecord>>, ServiceError> {
    let record = blocking(move || state.api.show_record(&RecordId::parse(&id)?)).await?;
    Ok(Json(envelope(record)))
}

async fn records_update(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(draft): Json<RecordDraft>,
) -> Result<Json<ServiceEnvelope<EnforcementRecord>>, ServiceError> {
    let attribution = attribution(&headers);
    let record = blocking(move || {
        state.api.update_record(&RecordId::parse(&id)?, draft, &attribution)
    })
    .await?;
    Ok(Json(envelope(record)))
}

async fn records_bulk_close(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<BulkCloseRequest>,
) -> Result<Json<ServiceEnvelope<BulkOutcome>>, ServiceError> {
    let attribution = attribution(&headers);
    let confirmation =
        if request.confirmed { Confirmation::Affirmed } else { Confirmation::Declined };
    let outcome =
        blocking(move || state.api.bulk_close(request.ids, confirmation, &attribution)).await?;
    Ok(Json(envelope(outcome)))
}

async fn records_bulk_assign(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<BulkAssignRequest>,
) -> Result<Json<ServiceEnvelope<BulkOutcome>>, ServiceError> {
    let attribution = attribution(&headers);
    let outcome = blocking(move || {
        state.api.bulk_assign(request.ids, request.officer.as_deref(), &attribution)
    })
    .await?;
    Ok(Json(envelope(outcome)))
}

async fn records_summary(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ServiceEnvelope<SummaryOutcome>>, ServiceError> {
    let attribution = attribution(&headers);
    let outcome =
        blocking(move || state.api.summarize_record(&RecordId::parse(&id)?, &attribution)).await?;
    Ok(Json(envelope(outcome)))
}

async fn ai_recommendations(
    State(state): State<ServiceState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<ServiceEnvelope<Enrichment>>, ServiceError> {
    let enrichment = blocking(move || state.api.recommend(&request)).await?;
    Ok(Json(envelope(enrichment)))
}

async fn exports_csv(
    State(state): State<ServiceState>,
    Query(request): Query<SearchRequest>,
) -> Result<Response, ServiceError> {
    let export = blocking(move || state.api.export_csv(&request, local_today())).await?;
    let disposition = format!("attachment; filename=\"{}\"", export.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.content,
    )
        .into_response())
}

async fn reports_weekly(
    State(state): State<ServiceState>,
    Json(request): Json<WeeklyReportRequest>,
) -> Result<Response, ServiceError> {
    let report = blocking(move || state.api.weekly_report(&request, local_today())).await?;
    let disposition = format!("attachment; filename=\"{}\"", report.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.pdf,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use http::Request;
    use tower::ServiceExt;

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("enforcement-service-{}.sqlite3", ulid::Ulid::new()))
    }

    fn router(db_path: PathBuf) -> Router {
        let ai = AiEnrichmentClient::from_config(&AiConfig::default());
        app(ServiceState { api: EnforcementApi::new(db_path, ai) })
    }

    fn cleanup(db_path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", db_path.display()));
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> Response {
        match router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        }
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .unwrap_or_else(|err| panic!("failed to build request: {err}"))
    }

    fn json_request(method: &str, uri: &str, payload: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method(method)
            .header("content-type", "application/json")
            .header(ACTOR_HEADER, "Grace Njeri")
            .body(Body::from(payload.to_string()))
            .unwrap_or_else(|err| panic!("failed to build request: {err}"))
    }

    async fn response_bytes(response: Response) -> Vec<u8> {
        match to_bytes(response.into_body(), 4 * 1024 * 1024).await {
            Ok(bytes) => bytes.to_vec(),
            Err(err) => panic!("failed to read response body: {err}"),
        }
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = response_bytes(response).await;
        let body = match String::from_utf8(bytes) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        };
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}; body={body}"),
        }
    }

    fn draft_payload(plot: &str) -> serde_json::Value {
        serde_json::json!({
            "plot_number": plot,
            "location": "Lenana Road",
            "sub_county": "Dagoretti North",
            "ward": "Kilimani",
            "date_issued": local_today().to_string(),
            "issue_of_concern": "Construction without approved plans.",
            "process_taken": "notice_issued",
            "recommendations": "Halt works and regularize approvals.",
            "status": "open"
        })
    }

    async fn create(router: &Router, plot: &str) -> serde_json::Value {
        let response =
            send(router, json_request("POST", "/v1/records", &draft_payload(plot))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response_json(response).await["data"].clone()
    }

    fn id_of(record: &serde_json::Value) -> String {
        record
            .get("id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_else(|| panic!("missing id in record: {record}"))
            .to_string()
    }

    // Test IDs: TSVC-001
    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let db_path = unique_temp_db_path();
        let router = router(db_path.clone());

        let response = send(&router, get_request("/v1/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(
            value.get("service_contract_version").and_then(serde_json::Value::as_str),
            Some(SERVICE_CONTRACT_VERSION)
        );
        cleanup(&db_path);
    }

    // Test IDs: TSVC-002
    #[tokio::test]
    async fn record_create_show_search_and_update_round_trip() {
        let db_path = unique_temp_db_path();
        let router = router(db_path.clone());

        let record = create(&router, "DN/77").await;
        assert_eq!(record["officer_in_charge"], "Waweru Kindiga");
        assert_eq!(record["audit_log"][0]["user"], "Grace Njeri");
        let id = id_of(&record);

        let shown = send(&router, get_request(&format!("/v1/records/{id}"))).await;
        assert_eq!(shown.status(), StatusCode::OK);

        let mut edit = draft_payload("DN/77");
        edit["status"] = serde_json::json!("pending_review");
        let updated =
            send(&router, json_request("PUT", &format!("/v1/records/{id}"), &edit)).await;
        assert_eq!(updated.status(), StatusCode::OK);
        let updated = response_json(updated).await;
        assert_eq!(updated["data"]["status"], "pending_review");
        assert_eq!(updated["data"]["notice_number"], record["notice_number"]);

        let found =
            send(&router, get_request("/v1/records?query=dn%2F7&status=pending_review")).await;
        assert_eq!(found.status(), StatusCode::OK);
        let found = response_json(found).await;
        assert_eq!(found["data"]["page"]["total_items"], 1);

        let missing = send(&router, get_request("/v1/records/REC-missing")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        cleanup(&db_path);
    }

    #[tokio::test]
    async fn invalid_record_is_unprocessable() {
        let db_path = unique_temp_db_path();
        let router = router(db_path.clone());

        let mut payload = draft_payload("DN/1");
        payload["ward"] = serde_json::json!("Karen");
        let response = send(&router, json_request("POST", "/v1/records", &payload)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let value = response_json(response).await;
        let message = value["error"].as_str().unwrap_or_default();
        assert!(message.contains("does not belong to sub-county"), "error: {message}");

        cleanup(&db_path);
    }

    #[tokio::test]
    async fn bulk_endpoints_apply_and_skip() {
        let db_path = unique_temp_db_path();
        let router = router(db_path.clone());
        let first = id_of(&create(&router, "DN/1").await);
        let second = id_of(&create(&router, "DN/2").await);

        let declined = send(
            &router,
            json_request(
                "POST",
                "/v1/records/bulk/close",
                &serde_json::json!({ "ids": [first, second], "confirmed": false }),
            ),
        )
        .await;
        let declined = response_json(declined).await;
        assert_eq!(declined["data"]["outcome"], "skipped");
        assert_eq!(declined["data"]["reason"], "declined");

        let closed = send(
            &router,
            json_request(
                "POST",
                "/v1/records/bulk/close",
                &serde_json::json!({ "ids": [first, second], "confirmed": true }),
            ),
        )
        .await;
        assert_eq!(response_json(closed).await["data"]["updated"], 2);

        let assigned = send(
            &router,
            json_request(
                "POST",
                "/v1/records/bulk/assign",
                &serde_json::json!({ "ids": [first], "officer": "Otieno Ouma" }),
            ),
        )
        .await;
        assert_eq!(response_json(assigned).await["data"]["updated"], 1);

        let stats = response_json(send(&router, get_request("/v1/stats")).await).await;
        assert_eq!(stats["data"]["closed"], 2);

        cleanup(&db_path);
    }

    #[tokio::test]
    async fn ai_endpoints_return_placeholders_without_credentials() {
        let db_path = unique_temp_db_path();
        let router = router(db_path.clone());
        let id = id_of(&create(&router, "DN/5").await);

        let recommended = send(
            &router,
            json_request(
                "POST",
                "/v1/ai/recommendations",
                &serde_json::json!({
                    "issue_of_concern": "Kiosk on road reserve",
                    "sub_county": "Dagoretti North",
                    "plot_number": "DN/5"
                }),
            ),
        )
        .await;
        assert_eq!(recommended.status(), StatusCode::OK);
        let recommended = response_json(recommended).await;
        assert_eq!(recommended["data"]["kind"], "unavailable");
        assert_eq!(recommended["data"]["reason"], "missing_credentials");

        let summary = send(
            &router,
            json_request("POST", &format!("/v1/records/{id}/summary"), &serde_json::json!({})),
        )
        .await;
        let summary = response_json(summary).await;
        assert_eq!(summary["data"]["stored"], false);
        assert!(summary["data"]["record"].get("ai_summary").is_none());

        cleanup(&db_path);
    }

    #[tokio::test]
    async fn exports_return_files_or_not_found() {
        let db_path = unique_temp_db_path();
        let router = router(db_path.clone());

        let empty = send(&router, get_request("/v1/exports/csv")).await;
        assert_eq!(empty.status(), StatusCode::NOT_FOUND);

        create(&router, "DN/9").await;
        let csv = send(&router, get_request("/v1/exports/csv?status=open")).await;
        assert_eq!(csv.status(), StatusCode::OK);
        assert_eq!(
            csv.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()),
            Some("text/csv; charset=utf-8")
        );
        let body = String::from_utf8(response_bytes(csv).await)
            .unwrap_or_else(|err| panic!("csv body is not UTF-8: {err}"));
        assert_eq!(body.lines().count(), 2);

        let report = send(
            &router,
            json_request(
                "POST",
                "/v1/reports/weekly",
                &serde_json::json!({
                    "sub_county": "Dagoretti North",
                    "preparers": ["Waweru Kindiga"]
                }),
            ),
        )
        .await;
        assert_eq!(report.status(), StatusCode::OK);
        let disposition = report
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(disposition.contains("Dagoretti_North_Weekly_Report_"));
        assert!(response_bytes(report).await.starts_with(b"%PDF"));

        let inverted = send(
            &router,
            json_request(
                "POST",
                "/v1/reports/weekly",
                &serde_json::json!({ "start": "2025-05-12", "end": "2025-05-01" }),
            ),
        )
        .await;
        assert_eq!(inverted.status(), StatusCode::UNPROCESSABLE_ENTITY);

        cleanup(&db_path);
    }

    #[tokio::test]
    async fn directory_lists_every_sub_county() {
        let db_path = unique_temp_db_path();
        let router = router(db_path.clone());
        let value = response_json(send(&router, get_request("/v1/directory")).await).await;
        assert_eq!(value["data"]["sub_counties"].as_array().map(Vec::len), Some(11));
        cleanup(&db_path);
    }
}
