// tests/api_http.rs
//
// HTTP-level tests for the read API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/v1/vacancies (filters, pagination, sorting, validation)
// - GET /api/v1/vacancies/{id}

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use vacancy_harvester::api::{self, AppState};
use vacancy_harvester::extract::mock::MockExtractor;
use vacancy_harvester::models::{CandidateVacancy, WorkFormat};
use vacancy_harvester::storage::memory::MemoryVacancyStore;
use vacancy_harvester::storage::VacancyStore;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn candidate(title: &str, company: &str, days_ago: i64) -> CandidateVacancy {
    let mut c = MockExtractor::candidate_from_text(
        title,
        Utc::now() - Duration::days(days_ago),
        WorkFormat::Remote,
    );
    c.title = title.to_string();
    c.company = company.to_string();
    c
}

async fn seeded_router() -> (Router, Arc<MemoryVacancyStore>) {
    let store = Arc::new(MemoryVacancyStore::new());
    store
        .save_if_new(&candidate("Senior Rust Developer", "Acme", 1), 1, "a")
        .await
        .unwrap();
    store
        .save_if_new(&candidate("Python Engineer", "Globex", 2), 2, "a")
        .await
        .unwrap();
    store
        .save_if_new(&candidate("Rust Team Lead", "Initech", 3), 3, "b")
        .await
        .unwrap();
    let router = api::router(AppState {
        vacancies: store.clone(),
    });
    (router, store)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let (app, _) = seeded_router().await;
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn list_defaults_to_newest_first() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/api/v1/vacancies").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total"], 3);
    let titles: Vec<&str> = v["vacancies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|x| x["title"].as_str().unwrap())
        .collect();
    assert_eq!(
        titles,
        vec!["Senior Rust Developer", "Python Engineer", "Rust Team Lead"]
    );
}

#[tokio::test]
async fn list_filters_by_company_case_insensitively() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/api/v1/vacancies?company=acme").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total"], 1);
    assert_eq!(v["vacancies"][0]["company"], "Acme");
}

#[tokio::test]
async fn list_filters_by_specialization_over_title_and_description() {
    let (app, _) = seeded_router().await;
    let (_, v) = get_json(app, "/api/v1/vacancies?specialization=rust").await;
    assert_eq!(v["total"], 2);
}

#[tokio::test]
async fn list_paginates_and_sorts_by_title() {
    let (app, _) = seeded_router().await;
    let (_, v) = get_json(
        app,
        "/api/v1/vacancies?sort_by=title&sort_order=1&skip=1&limit=1",
    )
    .await;
    assert_eq!(v["total"], 3);
    let items = v["vacancies"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Rust Team Lead");
}

#[tokio::test]
async fn list_clamps_out_of_range_limits() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/api/v1/vacancies?limit=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["vacancies"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_rejects_unknown_sort_field() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/api/v1/vacancies?sort_by=salary").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["detail"].as_str().unwrap().contains("sort_by"));
}

#[tokio::test]
async fn get_by_id_returns_the_flat_record() {
    let (app, store) = seeded_router().await;
    let id = store.all()[0].id.clone();
    let (status, v) = get_json(app, &format!("/api/v1/vacancies/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["id"], Json::String(id));
    assert_eq!(v["title"], "Senior Rust Developer");
    assert_eq!(v["work_format"], "remote");
    assert!(v.get("telegram_message_id").is_some());
    assert!(v.get("parsed_at").is_some());
}

#[tokio::test]
async fn get_unknown_id_is_404() {
    let (app, _) = seeded_router().await;
    let (status, v) = get_json(app, "/api/v1/vacancies/ffffffffffffffffffffffff").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["detail"], "Vacancy not found");
}
