// src/api.rs
//! Read API over stored vacancies: list with filters/pagination/sort, and
//! single-record lookup. Thin by design: all query semantics live in the
//! store seam.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::models::StoredVacancy;
use crate::storage::{SortField, SortOrder, StoreError, VacancyQuery, VacancyStore};

#[derive(Clone)]
pub struct AppState {
    pub vacancies: Arc<dyn VacancyStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/vacancies", get(list_vacancies))
        .route("/api/v1/vacancies/{id}", get(get_vacancy))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    skip: u64,
    #[serde(default = "default_limit")]
    limit: i64,
    company: Option<String>,
    specialization: Option<String>,
    salary_min: Option<i64>,
    salary_max: Option<i64>,
    #[serde(default = "default_sort_by")]
    sort_by: String,
    #[serde(default = "default_sort_order")]
    sort_order: i32,
}

fn default_limit() -> i64 {
    10
}

fn default_sort_by() -> String {
    "published_date".to_string()
}

fn default_sort_order() -> i32 {
    -1
}

#[derive(Debug, Serialize)]
struct VacancyList {
    vacancies: Vec<StoredVacancy>,
    total: u64,
}

enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            Self::NotFound(d) => (StatusCode::NOT_FOUND, d),
            Self::Internal(d) => {
                tracing::error!(detail = d.as_str(), "read API store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, d)
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidId(_) => Self::BadRequest("Invalid vacancy ID format".into()),
            StoreError::Backend(d) => Self::Internal(d),
        }
    }
}

async fn list_vacancies(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<VacancyList>, ApiError> {
    let sort_by = SortField::parse(&params.sort_by).ok_or_else(|| {
        ApiError::BadRequest("sort_by must be `published_date` or `title`".into())
    })?;
    let sort_order = SortOrder::from_i32(params.sort_order)
        .ok_or_else(|| ApiError::BadRequest("sort_order must be -1 or 1".into()))?;

    let query = VacancyQuery {
        company: params.company,
        specialization: params.specialization,
        salary_min: params.salary_min,
        salary_max: params.salary_max,
        skip: params.skip,
        limit: params.limit.clamp(1, 100),
        sort_by,
        sort_order,
    };

    let page = state.vacancies.list(&query).await?;
    Ok(Json(VacancyList {
        vacancies: page.vacancies,
        total: page.total,
    }))
}

async fn get_vacancy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredVacancy>, ApiError> {
    match state.vacancies.get(&id).await? {
        Some(vacancy) => Ok(Json(vacancy)),
        None => Err(ApiError::NotFound("Vacancy not found".into())),
    }
}
