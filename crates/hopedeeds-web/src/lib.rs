//! Axum JSON API + Askama admin page for HopeDeeds.

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use hopedeeds_core::{
    Opportunity, OpportunityDraft, OpportunityFilter, Organization, OrganizationRegistration,
    RecurrenceRuleInput, Volunteer, VolunteerRegistration,
};
use hopedeeds_shifts::{ServiceConfig, ShiftError, ShiftService};
use hopedeeds_storage::{Database, MemoryStore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "hopedeeds-web";

#[derive(Clone)]
pub struct AppState {
    pub service: ShiftService,
}

impl AppState {
    pub fn new(service: ShiftService) -> Self {
        Self { service }
    }

    /// State over the shared Postgres pool.
    pub fn with_database(database: Database, config: &ServiceConfig) -> Self {
        let database = Arc::new(database);
        Self::new(ShiftService::new(
            database.clone(),
            database.clone(),
            database,
            config.settings(),
        ))
    }

    /// State over a fresh in-memory store.
    pub fn in_memory(config: &ServiceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(ShiftService::new(
            store.clone(),
            store.clone(),
            store,
            config.settings(),
        ))
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Shift(#[from] ShiftError),
    #[error("rendering page: {0}")]
    Render(#[from] askama::Error),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error(transparent)]
    Form(#[from] FormRejection),
    #[error(transparent)]
    Query(#[from] QueryRejection),
    #[error(transparent)]
    Path(#[from] PathRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Shift(ShiftError::InvalidInput { missing }) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": self.to_string(), "missing": missing }),
            ),
            ApiError::Shift(ShiftError::RecurrenceTooLong { .. }) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": self.to_string() }),
            ),
            ApiError::Shift(ShiftError::NotFound { .. }) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": self.to_string() }),
            ),
            ApiError::Shift(ShiftError::Conflict(message)) => (
                StatusCode::CONFLICT,
                serde_json::json!({ "error": message }),
            ),
            ApiError::Shift(ShiftError::Store(err)) => {
                error!(error = %err, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "storage failure" }),
                )
            }
            ApiError::Render(err) => {
                error!(error = %err, "template failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "page rendering failed" }),
                )
            }
            ApiError::Json(rejection) => (rejection.status(), rejection_body(rejection.body_text())),
            ApiError::Form(rejection) => (rejection.status(), rejection_body(rejection.body_text())),
            ApiError::Query(rejection) => (rejection.status(), rejection_body(rejection.body_text())),
            ApiError::Path(rejection) => (rejection.status(), rejection_body(rejection.body_text())),
        };
        (status, Json(body)).into_response()
    }
}

fn rejection_body(text: String) -> serde_json::Value {
    serde_json::json!({ "error": text })
}

#[derive(Debug, Deserialize)]
struct CreateOpportunityBody {
    #[serde(flatten)]
    draft: OpportunityDraft,
    /// Kept raw so a rule that is not even an object degrades to no recurrence.
    #[serde(default, alias = "recurrence_rule")]
    recurrence: Option<serde_json::Value>,
}

impl CreateOpportunityBody {
    fn recurrence_input(&mut self) -> Option<RecurrenceRuleInput> {
        let raw = self.recurrence.take().filter(|value| !value.is_null())?;
        match serde_json::from_value(raw) {
            Ok(input) => Some(input),
            Err(err) => {
                warn!(error = %err, "unreadable recurrence rule; creating a one-off opportunity");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct OpportunitiesQuery {
    date: Option<NaiveDate>,
    organization: Option<i64>,
    area: Option<String>,
    frequency_type: Option<String>,
}

impl OpportunitiesQuery {
    fn into_filter(self) -> OpportunityFilter {
        OpportunityFilter {
            date: self.date,
            organization_id: self.organization,
            area: self.area.filter(|a| !a.trim().is_empty()),
            frequency: self.frequency_type.filter(|f| !f.trim().is_empty()),
        }
    }
}

/// Volunteer as shown to the dashboard: internal id and creation time stay server-side.
#[derive(Debug, Serialize)]
struct VolunteerView {
    full_name: String,
    email: String,
    phone: String,
    birthdate: String,
    zipcode: Option<String>,
    emergency_contact: Option<String>,
    waiver_agreed: bool,
    waiver_agreed_at: String,
}

impl From<Volunteer> for VolunteerView {
    fn from(v: Volunteer) -> Self {
        Self {
            full_name: v.full_name,
            email: v.email,
            phone: v.phone,
            birthdate: v.birthdate,
            zipcode: v.zipcode,
            emergency_contact: v.emergency_contact,
            waiver_agreed: v.waiver_agreed,
            waiver_agreed_at: v.waiver_agreed_at.to_rfc3339(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminTemplate {
    volunteers: Vec<VolunteerRow>,
    shifts: Vec<ShiftRow>,
}

struct VolunteerRow {
    full_name: String,
    email: String,
    phone: String,
    zipcode: String,
    waiver_agreed: bool,
    registered: String,
}

struct ShiftRow {
    start_date: String,
    time: String,
    title: String,
    area: String,
    duration: String,
    max_capacity: i32,
    repeats: String,
}

impl From<&Opportunity> for ShiftRow {
    fn from(o: &Opportunity) -> Self {
        let repeats = match (&o.recurrence_rule, o.parent_id) {
            (Some(rule), _) => rule.rule.kind().to_string(),
            (None, Some(_)) => "instance".to_string(),
            (None, None) => "one-time".to_string(),
        };
        Self {
            start_date: o.start_date.format("%Y-%m-%d").to_string(),
            time: match &o.end_time {
                Some(end) => format!("{} - {}", o.time, end),
                None => o.time.clone(),
            },
            title: o.title.clone(),
            area: o.area.clone().unwrap_or_else(|| "General".to_string()),
            duration: o
                .duration
                .as_ref()
                .map(|d| match d.hours() {
                    Some(h) => format!("{h} hrs"),
                    None => d.to_text(),
                })
                .unwrap_or_else(|| "N/A".to_string()),
            max_capacity: o.max_capacity,
            repeats,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route(
            "/api/opportunities",
            get(list_opportunities_handler).post(create_opportunity_handler),
        )
        .route(
            "/api/org/{org_id}/opportunities",
            post(create_org_opportunity_handler),
        )
        .route(
            "/api/opportunities/{id}",
            get(opportunity_detail_handler).delete(retire_opportunity_handler),
        )
        .route("/register", post(register_handler))
        .route("/api/volunteer/{email}", get(volunteer_handler))
        .route("/api/organizations", post(register_organization_handler))
        .route("/api/organization/{email}", get(organization_handler))
        .route("/admin", get(admin_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Loads config, connects the pool, serves until ctrl-c/SIGTERM, then closes the pool.
pub async fn serve_from_env() -> anyhow::Result<()> {
    let config = ServiceConfig::load().await?;
    let database = Database::connect(&config.database).await?;
    let state = AppState::with_database(database.clone(), &config);
    let result = serve(config.port, state).await;
    database.close().await;
    result
}

pub async fn serve(port: u16, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "hopedeeds web listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("hopedeeds web stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn list_opportunities_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<OpportunitiesQuery>, QueryRejection>,
) -> Result<Json<Vec<Opportunity>>, ApiError> {
    let Query(query) = query?;
    let rows = state.service.list(&query.into_filter()).await?;
    Ok(Json(rows))
}

async fn create_opportunity_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateOpportunityBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    create_opportunity(&state, body).await
}

async fn create_org_opportunity_handler(
    State(state): State<Arc<AppState>>,
    org_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<CreateOpportunityBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(org_id) = org_id?;
    let Json(mut body) = body?;
    body.draft.organization_id = Some(org_id);
    create_opportunity(&state, body).await
}

async fn create_opportunity(state: &AppState, mut body: CreateOpportunityBody) -> Result<Response, ApiError> {
    let rule = body.recurrence_input();
    let created = state
        .service
        .create_opportunity_with_recurrence(body.draft, rule)
        .await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

async fn opportunity_detail_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let detail = state.service.get(id).await?;
    Ok(Json(detail).into_response())
}

async fn retire_opportunity_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.service.retire(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    registration: Result<Form<VolunteerRegistration>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let Form(registration) = registration?;
    let volunteer = state.service.register_volunteer(registration).await?;
    Ok(Redirect::to(&format!(
        "/dashboard.html?email={}",
        urlencoding::encode(&volunteer.email)
    )))
}

async fn volunteer_handler(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<VolunteerView>, ApiError> {
    let volunteer = state.service.volunteer_by_email(&email).await?;
    Ok(Json(volunteer.into()))
}

async fn register_organization_handler(
    State(state): State<Arc<AppState>>,
    registration: Result<Json<OrganizationRegistration>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(registration) = registration?;
    let organization = state.service.register_organization(registration).await?;
    Ok((StatusCode::CREATED, Json(organization)).into_response())
}

async fn organization_handler(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<Organization>, ApiError> {
    let organization = state.service.organization_by_email(&email).await?;
    Ok(Json(organization))
}

async fn admin_handler(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let overview = state.service.admin_overview().await?;
    let page = AdminTemplate {
        volunteers: overview
            .volunteers
            .into_iter()
            .map(|v| VolunteerRow {
                registered: v.created_at.format("%Y-%m-%d").to_string(),
                zipcode: v.zipcode.unwrap_or_default(),
                full_name: v.full_name,
                email: v.email,
                phone: v.phone,
                waiver_agreed: v.waiver_agreed,
            })
            .collect(),
        shifts: overview.opportunities.iter().map(ShiftRow::from).collect(),
    };
    Ok(Html(page.render()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        app(AppState::in_memory(&ServiceConfig::default()))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const REGISTRATION: &str = "full_name=Ada+Lovelace&email=ada%40example.org&phone=555-0100&birthdate=1990-01-01&waiver_agreed=true";

    #[tokio::test]
    async fn create_weekly_shift_returns_parent_and_instances() {
        let app = test_app();
        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/org/12/opportunities",
                serde_json::json!({
                    "title": "Pantry shift",
                    "description": "Stock shelves",
                    "start_date": "2026-03-02",
                    "time": "09:00",
                    "duration": 2,
                    "recurrence": {"type": "weekly", "days": ["mon"], "count": 8}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        assert_eq!(body["parent"]["organization_id"], 12);
        assert_eq!(body["parent"]["recurrence_rule"]["type"], "weekly");
        let instances = body["instances"].as_array().unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0]["start_date"], "2026-03-09");
        assert_eq!(instances[0]["parent_id"], body["parent"]["id"]);
        assert!(body["failed"].as_array().unwrap().is_empty());

        let list = app
            .oneshot(
                Request::builder()
                    .uri("/api/opportunities?organization=12")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(list.status(), StatusCode::OK);
        let listed = body_json(list).await;
        let dates: Vec<_> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["start_date"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(dates, vec!["2026-03-02", "2026-03-09"]);
    }

    #[tokio::test]
    async fn create_without_required_fields_is_bad_request() {
        let resp = test_app()
            .oneshot(json_request(
                "POST",
                "/api/opportunities",
                serde_json::json!({"description": "no title"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["missing"], serde_json::json!(["title", "start_date", "time"]));
    }

    #[tokio::test]
    async fn retire_then_detail_and_listing() {
        let app = test_app();
        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/opportunities",
                serde_json::json!({
                    "title": "Cleanup",
                    "start_date": "2026-04-01",
                    "start_time": "08:00",
                    "duration": "1h"
                }),
            ))
            .await
            .unwrap();
        let id = body_json(created).await["parent"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let detail = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/opportunities/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(detail.status(), StatusCode::OK);
        assert_eq!(body_json(detail).await["duration"], "1h");

        let delete = |uri: String| {
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap()
        };
        let resp = app
            .clone()
            .oneshot(delete(format!("/api/opportunities/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app
            .clone()
            .oneshot(delete(format!("/api/opportunities/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let list = app
            .oneshot(
                Request::builder()
                    .uri("/api/opportunities")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(body_json(list).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn registration_redirects_and_hides_internal_fields() {
        let app = test_app();
        let resp = app
            .clone()
            .oneshot(form_request("/register", REGISTRATION))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            resp.headers()[header::LOCATION].to_str().unwrap(),
            "/dashboard.html?email=ada%40example.org"
        );

        let resp = app
            .clone()
            .oneshot(form_request("/register", REGISTRATION))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/volunteer/ada@example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["full_name"], "Ada Lovelace");
        assert!(body.get("id").is_none());
        assert!(body.get("created_at").is_none());
    }

    #[tokio::test]
    async fn registration_lists_missing_fields() {
        let resp = test_app()
            .oneshot(form_request("/register", "full_name=Ada&email=ada%40example.org"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(
            body["missing"],
            serde_json::json!(["phone", "birthdate", "waiver_agreed"])
        );
    }

    #[tokio::test]
    async fn unknown_volunteer_is_not_found() {
        let resp = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/volunteer/nobody@example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_page_lists_volunteers_and_shifts() {
        let app = test_app();
        app.clone()
            .oneshot(form_request("/register", REGISTRATION))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/opportunities",
                serde_json::json!({
                    "title": "Tutoring",
                    "start_date": "2026-05-04",
                    "time": "15:00",
                    "area": "Library",
                    "recurrence": {"type": "daily", "count": 2}
                }),
            ))
            .await
            .unwrap();

        let resp = app
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("HopeDeeds Admin"));
        assert!(text.contains("Ada Lovelace"));
        assert!(text.contains("1 volunteers, 2 active shifts"));
        assert!(text.contains("Library"));
    }

    async fn create_with_rule(rule: serde_json::Value) -> (StatusCode, serde_json::Value) {
        create_on("2026-03-02", rule).await
    }

    async fn create_on(start_date: &str, rule: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let resp = test_app()
            .oneshot(json_request(
                "POST",
                "/api/opportunities",
                serde_json::json!({
                    "title": "Pantry shift",
                    "start_date": start_date,
                    "time": "09:00",
                    "recurrence": rule
                }),
            ))
            .await
            .unwrap();
        let status = resp.status();
        (status, body_json(resp).await)
    }

    #[tokio::test]
    async fn malformed_rules_store_a_one_off() {
        for rule in [
            serde_json::json!({"count": 3}),
            serde_json::json!({"type": 7, "count": 3}),
            serde_json::json!({"type": "daily", "count": -2}),
            serde_json::json!("weekly"),
        ] {
            let (status, body) = create_with_rule(rule.clone()).await;
            assert_eq!(status, StatusCode::CREATED, "rule {rule}");
            assert_eq!(body["parent"]["title"], "Pantry shift", "rule {rule}");
            assert!(body["instances"].as_array().unwrap().is_empty(), "rule {rule}");
        }
    }

    #[tokio::test]
    async fn day_list_sent_as_a_string_is_split() {
        let (status, body) =
            create_with_rule(serde_json::json!({"type": "weekly", "days": "mon", "count": 8})).await;
        assert_eq!(status, StatusCode::CREATED);
        let instances = body["instances"].as_array().unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0]["start_date"], "2026-03-09");
    }

    #[tokio::test]
    async fn horizon_keys_accept_both_spellings() {
        for rule in [
            serde_json::json!({"type": "weekly", "days": ["mon"], "boundBy": "horizon", "horizonMonths": 1}),
            serde_json::json!({"type": "weekly", "days": ["mon"], "bound_by": "horizon", "horizon_months": 1}),
        ] {
            let today = chrono::Local::now().date_naive().to_string();
            let (status, body) = create_on(&today, rule.clone()).await;
            assert_eq!(status, StatusCode::CREATED, "rule {rule}");
            assert!(!body["instances"].as_array().unwrap().is_empty(), "rule {rule}");
            assert_eq!(body["parent"]["recurrence_rule"]["bound_by"], "horizon", "rule {rule}");
            assert_eq!(body["parent"]["recurrence_rule"]["horizon_months"], 1, "rule {rule}");
        }
    }

    #[tokio::test]
    async fn blank_start_date_is_reported_missing() {
        let resp = test_app()
            .oneshot(json_request(
                "POST",
                "/api/opportunities",
                serde_json::json!({"title": "t", "start_date": "", "time": "09:00"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["missing"], serde_json::json!(["start_date"]));
    }

    #[tokio::test]
    async fn extractor_failures_have_json_bodies() {
        let app = test_app();
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/opportunities")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"title\": "))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
        assert!(body_json(resp).await["error"].is_string());

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/opportunities",
                serde_json::json!({"title": "t", "start_date": "2026-02-31", "time": "09:00"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_json(resp).await["error"].is_string());

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/opportunities/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn organization_profile_is_served_by_email() {
        let app = test_app();
        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/organizations",
                serde_json::json!({
                    "org_name": "Harbor Pantry",
                    "email": "pantry@example.org",
                    "phone": "555-0199",
                    "address": "12 Dock St"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/organization/pantry%40example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body, created);
        assert_eq!(body["org_name"], "Harbor Pantry");
        assert_eq!(body["address"], "12 Dock St");
        assert!(body["id"].is_i64());

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/organization/nobody@example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_check() {
        let resp = test_app()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
