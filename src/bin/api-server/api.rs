use std::fmt;

use actix_web::{
    delete, get,
    http::StatusCode,
    post, put, web, HttpRequest, HttpResponse, ResponseError,
};
use campus_eats::{
    data::RestaurantPayload,
    db::{ConnectionState, RestaurantStore, SubmissionStore},
    seed::SeedFixture,
    service::{RestaurantService, SubmissionService, DEFAULT_POPULAR_LIMIT},
    Error,
};
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;

pub(super) struct ApiState {
    restaurants: RestaurantService,
    submissions: SubmissionService,
    db_pool: SqlitePool,
}

impl ApiState {
    pub(super) fn new(db_pool: SqlitePool, fixture: SeedFixture) -> Self {
        Self {
            restaurants: RestaurantService::new(RestaurantStore::new(db_pool.clone()), fixture),
            submissions: SubmissionService::new(SubmissionStore::new(db_pool.clone())),
            db_pool,
        }
    }

    pub(super) fn restaurants(&self) -> &RestaurantService {
        &self.restaurants
    }
}

#[derive(serde::Serialize)]
struct ErrJsonResp {
    error: ErrBody,
}

#[derive(serde::Serialize)]
struct ErrBody {
    message: String,
}

impl ErrJsonResp {
    fn new(message: impl Into<String>) -> Self {
        Self {
            error: ErrBody {
                message: message.into(),
            },
        }
    }
}

#[derive(serde::Serialize)]
struct DataResp<T> {
    data: T,
}

/// Maps service failures onto status codes by variant.
#[derive(Debug)]
pub(super) struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Storage(_) | Error::Document(_) | Error::Fixture { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        }
        HttpResponse::build(status).json(ErrJsonResp::new(self.to_string()))
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

fn ok<T: serde::Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(DataResp { data })
}

/// Body parse failures answer with the same error envelope as everything else.
pub(super) fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let resp = HttpResponse::BadRequest().json(ErrJsonResp::new(err.to_string()));
        actix_web::error::InternalError::from_response(err, resp).into()
    })
}

/// The whole route table. Fixed paths go before `{id}` so they are not taken as ids.
pub(super) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(health)
        .service(popular_restaurants)
        .service(sync_demo)
        .service(restaurants)
        .service(restaurant)
        .service(create_restaurant)
        .service(update_restaurant)
        .service(delete_restaurant)
        .service(submissions)
        .service(submission)
        .service(create_submission)
        .service(update_submission)
        .service(delete_submission);
}

pub(super) async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(ErrJsonResp::new(format!("Not found - {}", req.path())))
}

#[get("/health")]
pub(super) async fn health(data: web::Data<ApiState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "db": ConnectionState::of(&data.db_pool).code(),
    }))
}

#[get("/api/restaurants")]
pub(super) async fn restaurants(data: web::Data<ApiState>) -> ApiResult {
    Ok(ok(data.restaurants.list().await?))
}

#[derive(serde::Deserialize)]
pub(super) struct PopularQuery {
    limit: Option<String>,
}

impl PopularQuery {
    /// Unparsable or zero falls back to the default, the sign is ignored.
    fn limit(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n != 0)
            .map(|n| u32::try_from(n.unsigned_abs()).unwrap_or(u32::MAX))
            .unwrap_or(DEFAULT_POPULAR_LIMIT)
    }
}

#[get("/api/restaurants/popular")]
pub(super) async fn popular_restaurants(
    data: web::Data<ApiState>,
    query: web::Query<PopularQuery>,
) -> ApiResult {
    Ok(ok(data.restaurants.popular(query.limit()).await?))
}

#[get("/api/restaurants/sync-demo")]
pub(super) async fn sync_demo(data: web::Data<ApiState>) -> ApiResult {
    let docs = data.restaurants.sync_demo()?;
    Ok(HttpResponse::Ok().json(json!({
        "data": docs,
        "meta": { "execution": "synchronous" },
    })))
}

#[get("/api/restaurants/{id}")]
pub(super) async fn restaurant(data: web::Data<ApiState>, path: web::Path<String>) -> ApiResult {
    Ok(ok(data.restaurants.get(&path).await?))
}

#[post("/api/restaurants")]
pub(super) async fn create_restaurant(
    data: web::Data<ApiState>,
    payload: web::Json<RestaurantPayload>,
) -> ApiResult {
    let created = data.restaurants.create(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(DataResp { data: created }))
}

#[put("/api/restaurants/{id}")]
pub(super) async fn update_restaurant(
    data: web::Data<ApiState>,
    path: web::Path<String>,
    payload: web::Json<RestaurantPayload>,
) -> ApiResult {
    Ok(ok(data.restaurants.update(&path, payload.into_inner()).await?))
}

#[delete("/api/restaurants/{id}")]
pub(super) async fn delete_restaurant(
    data: web::Data<ApiState>,
    path: web::Path<String>,
) -> ApiResult {
    data.restaurants.remove(&path).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/api/submissions")]
pub(super) async fn submissions(data: web::Data<ApiState>) -> ApiResult {
    Ok(ok(data.submissions.list().await?))
}

#[get("/api/submissions/{id}")]
pub(super) async fn submission(data: web::Data<ApiState>, path: web::Path<String>) -> ApiResult {
    Ok(ok(data.submissions.get(&path).await?))
}

#[post("/api/submissions")]
pub(super) async fn create_submission(
    data: web::Data<ApiState>,
    body: web::Json<Map<String, Value>>,
) -> ApiResult {
    let created = data.submissions.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(DataResp { data: created }))
}

#[put("/api/submissions/{id}")]
pub(super) async fn update_submission(
    data: web::Data<ApiState>,
    path: web::Path<String>,
    body: web::Json<Map<String, Value>>,
) -> ApiResult {
    Ok(ok(data.submissions.update(&path, body.into_inner()).await?))
}

#[delete("/api/submissions/{id}")]
pub(super) async fn delete_submission(
    data: web::Data<ApiState>,
    path: web::Path<String>,
) -> ApiResult {
    data.submissions.remove(&path).await?;
    Ok(HttpResponse::NoContent().finish())
}
