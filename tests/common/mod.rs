#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use trainsync::AppContext;
use trainsync::api::HttpGateway;
use trainsync::config::Config;
use trainsync::db::{MemoryStore, Persister};
use trainsync::service::{MemoryTransport, TokenStore};
use url::Url;

pub const CREATED_AT: &str = "2024-01-01T00:00:00.000Z";
pub const PAGE_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// New access credential plus a rotated refresh credential.
    Rotate,
    /// New access credential only.
    AccessOnly,
    /// 401 from the refresh endpoint.
    Reject,
    /// 2xx without `access_token`.
    MissingToken,
}

/// In-process stand-in for the REST backend.
pub struct MockApi {
    pub valid_access: Mutex<String>,
    pub refresh_mode: Mutex<RefreshMode>,
    pub refresh_calls: AtomicUsize,
    pub refresh_bodies: Mutex<Vec<Value>>,
    /// Every protected route answers 401, whatever the credential.
    pub reject_all: AtomicBool,
    /// (path, Authorization header) for every request received.
    pub seen: Mutex<Vec<(String, Option<String>)>>,
    pub schedules: Mutex<Vec<Value>>,
    pub favorites: Mutex<Vec<i64>>,
    pub places: Mutex<Vec<Value>>,
    next_id: AtomicI64,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid_access: Mutex::new("a-1".to_string()),
            refresh_mode: Mutex::new(RefreshMode::Rotate),
            refresh_calls: AtomicUsize::new(0),
            refresh_bodies: Mutex::new(Vec::new()),
            reject_all: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
            schedules: Mutex::new(Vec::new()),
            favorites: Mutex::new(Vec::new()),
            places: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
        })
    }

    pub fn set_valid_access(&self, token: &str) {
        *self.valid_access.lock().unwrap() = token.to_string();
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn seed_schedules(&self, count: i64) {
        let mut schedules = self.schedules.lock().unwrap();
        for id in 1..=count {
            schedules.push(schedule_json(
                id,
                "REGIONAL",
                &[(1, "2024-05-01T08:00:00.000Z"), (2, "2024-05-01T09:30:00.000Z")],
            ));
        }
    }

    pub fn seed_places(&self, count: i64) {
        let mut places = self.places.lock().unwrap();
        places.extend((1..=count).map(place_json));
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Authorization headers seen on `path`, in arrival order.
    pub fn auth_headers(&self, path: &str) -> Vec<Option<String>> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, h)| h.clone())
            .collect()
    }

    fn record(&self, path: &str, headers: &HeaderMap) -> Option<String> {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen
            .lock()
            .unwrap()
            .push((path.to_string(), auth.clone()));
        auth
    }

    fn authorize(&self, path: &str, headers: &HeaderMap) -> Result<(), Response> {
        let auth = self.record(path, headers);
        let expected = format!("Bearer {}", self.valid_access.lock().unwrap());
        if self.reject_all.load(Ordering::SeqCst) || auth.as_deref() != Some(expected.as_str()) {
            return Err(error(StatusCode::UNAUTHORIZED, "Unauthorized", path));
        }
        Ok(())
    }

    fn with_flag(&self, schedule: &Value) -> Value {
        let mut schedule = schedule.clone();
        let id = schedule["id"].as_i64().unwrap_or_default();
        schedule["isFavorite"] = json!(self.favorites.lock().unwrap().contains(&id));
        schedule
    }
}

pub fn error(status: StatusCode, message: &str, path: &str) -> Response {
    (
        status,
        Json(json!({"message": message, "path": path, "statusCode": status.as_u16()})),
    )
        .into_response()
}

pub fn place_json(id: i64) -> Value {
    json!({"id": id, "name": format!("Station {id}"), "createdAt": CREATED_AT})
}

pub fn schedule_json(id: i64, train_type: &str, points: &[(i64, &str)]) -> Value {
    let points: Vec<Value> = points
        .iter()
        .enumerate()
        .map(|(i, (place_id, time))| {
            json!({
                "id": id * 100 + i as i64,
                "placeId": place_id,
                "place": place_json(*place_id),
                "timeToArrive": time,
                "createdAt": CREATED_AT,
            })
        })
        .collect();
    json!({"id": id, "type": train_type, "points": points, "createdAt": CREATED_AT})
}

fn user_json() -> Value {
    json!({"id": 1, "name": "Ada", "role": "USER", "login": "ada", "createdAt": CREATED_AT})
}

type Api = State<Arc<MockApi>>;

async fn login() -> Response {
    Json(json!({"access_token": "a-1", "refresh_token": "r-1"})).into_response()
}

async fn login_state(State(api): Api, headers: HeaderMap) -> Response {
    api.record("/auth/login", &headers);
    api.set_valid_access("a-1");
    login().await
}

async fn refresh(State(api): Api, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    api.record("/auth/refresh", &headers);
    let n = api.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    api.refresh_bodies.lock().unwrap().push(body);
    let mode = *api.refresh_mode.lock().unwrap();
    let access = format!("a-refreshed-{n}");
    match mode {
        RefreshMode::Rotate => {
            api.set_valid_access(&access);
            Json(json!({"access_token": access, "refresh_token": format!("r-rotated-{n}")}))
                .into_response()
        }
        RefreshMode::AccessOnly => {
            api.set_valid_access(&access);
            Json(json!({"access_token": access})).into_response()
        }
        RefreshMode::Reject => error(StatusCode::UNAUTHORIZED, "Invalid refresh token", "/auth/refresh"),
        RefreshMode::MissingToken => (StatusCode::CREATED, Json(json!({}))).into_response(),
    }
}

async fn logout(State(api): Api, headers: HeaderMap) -> Response {
    if let Err(resp) = api.authorize("/auth/logout", &headers) {
        return resp;
    }
    StatusCode::CREATED.into_response()
}

async fn me(State(api): Api, headers: HeaderMap) -> Response {
    if let Err(resp) = api.authorize("/users/me", &headers) {
        return resp;
    }
    Json(user_json()).into_response()
}

async fn update_me(State(api): Api, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(resp) = api.authorize("/users/me", &headers) {
        return resp;
    }
    let mut user = user_json();
    for field in ["name", "login"] {
        if let Some(value) = body.get(field) {
            user[field] = value.clone();
        }
    }
    Json(user).into_response()
}

fn points_from(body: &Value) -> Vec<(i64, String)> {
    body["points"]
        .as_array()
        .map(|points| {
            points
                .iter()
                .map(|p| {
                    (
                        p["placeId"].as_i64().unwrap_or_default(),
                        p["timeToArrive"].as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

async fn list_schedules(
    State(api): Api,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = api.authorize("/schedules", &headers) {
        return resp;
    }
    let page: usize = query
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1)
        .max(1);
    let schedules = api.schedules.lock().unwrap().clone();
    let total = schedules.len();
    let data: Vec<Value> = schedules
        .iter()
        .skip((page - 1) * PAGE_LIMIT)
        .take(PAGE_LIMIT)
        .map(|s| api.with_flag(s))
        .collect();
    Json(json!({"data": data, "meta": {"total": total, "page": page, "limit": PAGE_LIMIT}}))
        .into_response()
}

async fn get_schedule(State(api): Api, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let path = format!("/schedules/{id}");
    if let Err(resp) = api.authorize(&path, &headers) {
        return resp;
    }
    let found = api
        .schedules
        .lock()
        .unwrap()
        .iter()
        .find(|s| s["id"] == json!(id))
        .cloned();
    match found {
        Some(s) => Json(api.with_flag(&s)).into_response(),
        None => error(StatusCode::NOT_FOUND, "Schedule not found", &path),
    }
}

/// Stores the points in reverse order, the way an unordered join would.
async fn create_schedule(State(api): Api, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(resp) = api.authorize("/schedules", &headers) {
        return resp;
    }
    let id = api.next_id.fetch_add(1, Ordering::SeqCst);
    let mut points = points_from(&body);
    points.reverse();
    let refs: Vec<(i64, &str)> = points.iter().map(|(p, t)| (*p, t.as_str())).collect();
    let schedule = schedule_json(id, body["type"].as_str().unwrap_or("REGIONAL"), &refs);
    api.schedules.lock().unwrap().push(schedule.clone());
    (StatusCode::CREATED, Json(api.with_flag(&schedule))).into_response()
}

async fn update_schedule(
    State(api): Api,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let path = format!("/schedules/{id}");
    if let Err(resp) = api.authorize(&path, &headers) {
        return resp;
    }
    let mut schedules = api.schedules.lock().unwrap();
    let Some(schedule) = schedules.iter_mut().find(|s| s["id"] == json!(id)) else {
        return error(StatusCode::NOT_FOUND, "Schedule not found", &path);
    };
    if let Some(train_type) = body.get("type") {
        schedule["type"] = train_type.clone();
    }
    if body.get("points").is_some() {
        let points = points_from(&body);
        let refs: Vec<(i64, &str)> = points.iter().map(|(p, t)| (*p, t.as_str())).collect();
        let train_type = schedule["type"].as_str().unwrap_or("REGIONAL").to_string();
        *schedule = schedule_json(id, &train_type, &refs);
    }
    let updated = schedule.clone();
    drop(schedules);
    Json(api.with_flag(&updated)).into_response()
}

async fn delete_schedule(State(api): Api, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let path = format!("/schedules/{id}");
    if let Err(resp) = api.authorize(&path, &headers) {
        return resp;
    }
    let mut schedules = api.schedules.lock().unwrap();
    let before = schedules.len();
    schedules.retain(|s| s["id"] != json!(id));
    if schedules.len() == before {
        return error(StatusCode::NOT_FOUND, "Schedule not found", &path);
    }
    StatusCode::OK.into_response()
}

async fn list_favorites(
    State(api): Api,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = api.authorize("/favorites", &headers) {
        return resp;
    }
    let page: usize = query
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1)
        .max(1);
    let favorites = api.favorites.lock().unwrap().clone();
    let schedules = api.schedules.lock().unwrap().clone();
    let total = favorites.len();
    let data: Vec<Value> = favorites
        .iter()
        .skip((page - 1) * PAGE_LIMIT)
        .take(PAGE_LIMIT)
        .map(|schedule_id| {
            json!({
                "id": schedule_id + 5000,
                "userId": 1,
                "scheduleId": schedule_id,
                "schedule": schedules.iter().find(|s| s["id"] == json!(schedule_id)),
                "createdAt": CREATED_AT,
            })
        })
        .collect();
    Json(json!({"data": data, "meta": {"total": total, "page": page, "limit": PAGE_LIMIT}}))
        .into_response()
}

async fn add_favorite(State(api): Api, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(resp) = api.authorize("/favorites", &headers) {
        return resp;
    }
    let schedule_id = body["scheduleId"].as_i64().unwrap_or_default();
    api.favorites.lock().unwrap().push(schedule_id);
    (
        StatusCode::CREATED,
        Json(json!({
            "id": schedule_id + 5000,
            "userId": 1,
            "scheduleId": schedule_id,
            "createdAt": CREATED_AT,
        })),
    )
        .into_response()
}

async fn remove_favorite(
    State(api): Api,
    headers: HeaderMap,
    Path(schedule_id): Path<i64>,
) -> Response {
    let path = format!("/favorites/{schedule_id}");
    if let Err(resp) = api.authorize(&path, &headers) {
        return resp;
    }
    api.favorites.lock().unwrap().retain(|id| *id != schedule_id);
    StatusCode::OK.into_response()
}

/// Answers with a bare array, no pagination envelope.
async fn list_places(
    State(api): Api,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = api.authorize("/places", &headers) {
        return resp;
    }
    let search = query.get("search").map(|s| s.to_lowercase());
    let places: Vec<Value> = api
        .places
        .lock()
        .unwrap()
        .iter()
        .filter(|p| match &search {
            Some(needle) => p["name"]
                .as_str()
                .is_some_and(|name| name.to_lowercase().contains(needle.as_str())),
            None => true,
        })
        .cloned()
        .collect();
    Json(places).into_response()
}

async fn create_place(State(api): Api, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(resp) = api.authorize("/places", &headers) {
        return resp;
    }
    let id = api.next_id.fetch_add(1, Ordering::SeqCst);
    let place = json!({"id": id, "name": body["name"], "createdAt": CREATED_AT});
    api.places.lock().unwrap().push(place.clone());
    (StatusCode::CREATED, Json(place)).into_response()
}

async fn update_place(
    State(api): Api,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let path = format!("/places/{id}");
    if let Err(resp) = api.authorize(&path, &headers) {
        return resp;
    }
    let mut places = api.places.lock().unwrap();
    let Some(place) = places.iter_mut().find(|p| p["id"] == json!(id)) else {
        return error(StatusCode::NOT_FOUND, "Place not found", &path);
    };
    if let Some(name) = body.get("name") {
        place["name"] = name.clone();
    }
    Json(place.clone()).into_response()
}

async fn delete_place(State(api): Api, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let path = format!("/places/{id}");
    if let Err(resp) = api.authorize(&path, &headers) {
        return resp;
    }
    let mut places = api.places.lock().unwrap();
    let before = places.len();
    places.retain(|p| p["id"] != json!(id));
    if places.len() == before {
        return error(StatusCode::NOT_FOUND, "Place not found", &path);
    }
    StatusCode::OK.into_response()
}

/// Serve `api` on an ephemeral port and return its base URL.
pub async fn serve(api: Arc<MockApi>) -> Url {
    let app = Router::new()
        .route("/auth/login", post(login_state))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/users/me", get(me).patch(update_me))
        .route("/schedules", get(list_schedules).post(create_schedule))
        .route(
            "/schedules/{id}",
            get(get_schedule)
                .patch(update_schedule)
                .delete(delete_schedule),
        )
        .route("/favorites", get(list_favorites).post(add_favorite))
        .route("/favorites/{schedule_id}", delete(remove_favorite))
        .route("/places", get(list_places).post(create_place))
        .route("/places/{id}", patch(update_place).delete(delete_place))
        .with_state(api);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

pub fn test_config(base: Url) -> Config {
    let mut cfg = Config::default().with_api_url(base);
    cfg.request_timeout_secs = 5;
    cfg.realtime_retry_delay_ms = 10;
    cfg
}

/// Gateway over a fresh in-memory token store.
pub async fn gateway(base: Url) -> (HttpGateway, TokenStore) {
    let persister = Persister::spawn(Arc::new(MemoryStore::default()));
    let tokens = TokenStore::hydrate(persister).await.unwrap();
    let gateway = HttpGateway::new(&test_config(base), tokens.clone()).unwrap();
    (gateway, tokens)
}

pub struct TestApp {
    pub ctx: AppContext,
    pub transport: Arc<MemoryTransport>,
    pub store: Arc<MemoryStore>,
}

pub async fn app(base: Url) -> TestApp {
    app_with_store(base, Arc::new(MemoryStore::default())).await
}

pub async fn app_with_store(base: Url, store: Arc<MemoryStore>) -> TestApp {
    let transport = Arc::new(MemoryTransport::new());
    let ctx = AppContext::with_parts(test_config(base), store.clone(), transport.clone())
        .await
        .unwrap();
    TestApp {
        ctx,
        transport,
        store,
    }
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
