//! Shared fixtures and an in-process fake of the hosted record API.
//!
//! The fake understands just enough of the API for the adapter tests: list with
//! `page`/`perPage`/`filter`/`sort`, create, patch, health. Filters are
//! `field op literal` conditions joined by ` && `; dates are stored in the
//! `YYYY-MM-DD HH:MM:SS.sssZ` layout so they compare correctly as text.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use quote_kit::clock::{Clock, SystemClock};
use quote_kit::model::{CustomerInfo, NewQuote, Product, QuoteItem, QuoteStatus};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

const HOSTED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";
const DATE_FIELDS: [&str; 3] = ["created", "updated", "valid_until"];
const OPTIONAL_TEXT_FIELDS: [&str; 2] = ["valid_until", "description"];
const STATUSES: [&str; 5] = ["DRAFT", "SENT", "ACCEPTED", "REJECTED", "EXPIRED"];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn at(text: &str) -> DateTime<Utc> {
    text.parse().expect("timestamp")
}

pub fn customer(name: &str) -> CustomerInfo {
    let mut info = CustomerInfo::new();
    info.insert("name".to_string(), json!(name));
    info.insert("email".to_string(), json!("someone@example.com"));
    info
}

/// Quote with the given lines; `subtotal` is the sum of lines and `total = subtotal + tax`.
pub fn new_quote(name: &str, status: QuoteStatus, lines: &[(&str, u32, f64)], total_tax: f64) -> NewQuote {
    let items: Vec<QuoteItem> = lines
        .iter()
        .map(|(title, quantity, price)| QuoteItem::new(*title, *quantity, *price).expect("item"))
        .collect();
    let subtotal: f64 = items.iter().map(QuoteItem::subtotal).sum();
    NewQuote {
        customer_info: customer(name),
        status,
        items,
        subtotal,
        total_tax,
        total: subtotal + total_tax,
        valid_until: None,
        description: None,
    }
}

pub fn product(id: &str, title: &str, price: f64) -> Product {
    let now = at("2024-11-01T08:00:00Z");
    Product {
        id: id.to_string(),
        created: now,
        updated: now,
        title: title.to_string(),
        description: None,
        price,
        in_stock: Some(true),
        attributes: None,
    }
}

/// One request the fake received.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub collection: String,
    pub params: HashMap<String, String>,
}

struct StoreState {
    collections: HashMap<String, Vec<Map<String, Value>>>,
    next_id: u64,
    requests: Vec<RecordedRequest>,
    failure: Option<(StatusCode, String)>,
}

/// Shared state of the fake server.
#[derive(Clone)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
    clock: Arc<dyn Clock>,
}

impl FakeStore {
    fn new(clock: Arc<dyn Clock>) -> Self {
        let collections = ["products", "quotes"]
            .into_iter()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        FakeStore {
            state: Arc::new(Mutex::new(StoreState {
                collections,
                next_id: 0,
                requests: Vec::new(),
                failure: None,
            })),
            clock,
        }
    }

    /// `created`/`updated` stamp for a write, in the API's layout.
    fn now(&self) -> String {
        self.clock.now().format(HOSTED_DATETIME_FORMAT).to_string()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_products(&self, products: &[Product]) {
        let mut state = self.lock();
        for product in products {
            let mut record = match serde_json::to_value(product).expect("product json") {
                Value::Object(map) => map,
                other => panic!("product is not an object: {}", other),
            };
            normalize(&mut record);
            state
                .collections
                .entry("products".to_string())
                .or_default()
                .push(record);
        }
    }

    pub fn records(&self, collection: &str) -> Vec<Map<String, Value>> {
        self.lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Answer the next request with `status` instead of handling it.
    pub fn fail_next(&self, status: StatusCode, message: &str) {
        self.lock().failure = Some((status, message.to_string()));
    }
}

/// Fake record API listening on an ephemeral local port.
pub struct FakeServer {
    pub base_url: String,
    pub store: FakeStore,
    handle: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start() -> Self {
        Self::start_with_clock(Arc::new(SystemClock)).await
    }

    /// Start a server that stamps writes with `clock`.
    pub async fn start_with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = FakeStore::new(clock);
        let app = Router::new()
            .route(
                "/api/health",
                get(|| async { Json(json!({"code": 200, "message": "API is healthy."})) }),
            )
            .route(
                "/api/collections/{collection}/records",
                get(list_records).post(create_record),
            )
            .route(
                "/api/collections/{collection}/records/{id}",
                patch(update_record),
            )
            .with_state(store.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        FakeServer {
            base_url: format!("http://{}", addr),
            store,
            handle,
        }
    }

    #[cfg(feature = "hosted")]
    pub fn backend(&self) -> quote_kit::backend::HostedBackend {
        self.backend_with(quote_kit::backend::HostedConfig::with_base_url(self.base_url.clone()))
    }

    #[cfg(feature = "hosted")]
    pub fn backend_with(&self, config: quote_kit::backend::HostedConfig) -> quote_kit::backend::HostedBackend {
        quote_kit::backend::HostedBackend::new(config).expect("hosted backend")
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn error_response(status: StatusCode, message: &str, data: Value) -> Response {
    (
        status,
        Json(json!({"code": status.as_u16(), "message": message, "data": data})),
    )
        .into_response()
}

fn not_found() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "The requested resource wasn't found.",
        json!({}),
    )
}

fn record_request(
    state: &mut StoreState,
    method: &'static str,
    collection: &str,
    params: HashMap<String, String>,
) -> Option<Response> {
    state.requests.push(RecordedRequest {
        method,
        collection: collection.to_string(),
        params,
    });
    state
        .failure
        .take()
        .map(|(status, message)| error_response(status, &message, json!({})))
}

async fn list_records(
    State(store): State<FakeStore>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = store.lock();
    if let Some(failure) = record_request(&mut state, "GET", &collection, params.clone()) {
        return failure;
    }
    let Some(records) = state.collections.get(&collection) else {
        return not_found();
    };

    let page = params
        .get("page")
        .and_then(|p| p.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let per_page = params
        .get("perPage")
        .and_then(|p| p.parse::<usize>().ok())
        .unwrap_or(30)
        .clamp(1, 500);

    let conditions = match params.get("filter").filter(|f| !f.is_empty()) {
        Some(filter) => match parse_filter(filter) {
            Ok(conditions) => conditions,
            Err(message) => {
                return error_response(StatusCode::BAD_REQUEST, &message, json!({}));
            }
        },
        None => Vec::new(),
    };

    let mut matching: Vec<Map<String, Value>> = records
        .iter()
        .filter(|record| conditions.iter().all(|c| c.matches(record)))
        .cloned()
        .collect();
    if let Some(sort) = params.get("sort").filter(|s| !s.is_empty()) {
        sort_records(&mut matching, sort);
    }

    let total_items = matching.len();
    // Reports one page even when nothing matched.
    let total_pages = total_items.div_ceil(per_page).max(1);
    let items: Vec<Value> = matching
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(Value::Object)
        .collect();

    Json(json!({
        "page": page,
        "perPage": per_page,
        "totalItems": total_items,
        "totalPages": total_pages,
        "items": items,
    }))
    .into_response()
}

async fn create_record(
    State(store): State<FakeStore>,
    Path(collection): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Response {
    let mut state = store.lock();
    if let Some(failure) = record_request(&mut state, "POST", &collection, HashMap::new()) {
        return failure;
    }
    if !state.collections.contains_key(&collection) {
        return not_found();
    }
    if collection == "quotes" {
        if let Err(data) = validate_quote(&body) {
            return error_response(StatusCode::BAD_REQUEST, "Failed to create record.", data);
        }
    }

    state.next_id += 1;
    let now = store.now();
    let mut record = body;
    record.insert("id".to_string(), json!(format!("{:0>15}", state.next_id)));
    record.insert("collectionName".to_string(), json!(collection));
    record.insert("created".to_string(), json!(now));
    record.insert("updated".to_string(), json!(now));
    normalize(&mut record);

    if let Some(records) = state.collections.get_mut(&collection) {
        records.push(record.clone());
    }
    Json(Value::Object(record)).into_response()
}

async fn update_record(
    State(store): State<FakeStore>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Map<String, Value>>,
) -> Response {
    let mut state = store.lock();
    if let Some(failure) = record_request(&mut state, "PATCH", &collection, HashMap::new()) {
        return failure;
    }
    let Some(record) = state
        .collections
        .get_mut(&collection)
        .and_then(|records| records.iter_mut().find(|r| r.get("id") == Some(&json!(id))))
    else {
        return not_found();
    };

    for (key, value) in body {
        if !matches!(key.as_str(), "id" | "created" | "updated") {
            record.insert(key, value);
        }
    }
    let now = store.now();
    record.insert("updated".to_string(), json!(now));
    normalize(record);

    Json(Value::Object(record.clone())).into_response()
}

fn validate_quote(body: &Map<String, Value>) -> Result<(), Value> {
    let mut errors = Map::new();
    let required = json!({"code": "validation_required", "message": "Missing required value."});

    let has_customer = body
        .get("customer_info")
        .and_then(Value::as_object)
        .is_some_and(|info| !info.is_empty());
    if !has_customer {
        errors.insert("customer_info".to_string(), required.clone());
    }
    let has_items = body
        .get("items")
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty());
    if !has_items {
        errors.insert("items".to_string(), required);
    }
    let status_ok = body
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|status| STATUSES.contains(&status));
    if !status_ok {
        errors.insert(
            "status".to_string(),
            json!({"code": "validation_invalid_value", "message": "Invalid value."}),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Value::Object(errors))
    }
}

/// Store dates in the hosted layout and unset optional text as `""`.
fn normalize(record: &mut Map<String, Value>) {
    for field in DATE_FIELDS {
        if let Some(Value::String(text)) = record.get(field) {
            if let Ok(parsed) = text.parse::<DateTime<Utc>>() {
                let formatted = parsed.format(HOSTED_DATETIME_FORMAT).to_string();
                record.insert(field.to_string(), json!(formatted));
            }
        }
    }
    if record.get("collectionName") == Some(&json!("quotes")) {
        for field in OPTIONAL_TEXT_FIELDS {
            if record.get(field).map_or(true, Value::is_null) {
                record.insert(field.to_string(), json!(""));
            }
        }
    }
}

enum Literal {
    Text(String),
    Number(f64),
}

struct Condition {
    field: String,
    operator: String,
    literal: Literal,
}

impl Condition {
    fn matches(&self, record: &Map<String, Value>) -> bool {
        let Some(ordering) = record.get(&self.field).and_then(|v| compare(v, &self.literal)) else {
            return false;
        };
        match self.operator.as_str() {
            "=" => ordering == Ordering::Equal,
            ">=" => ordering != Ordering::Less,
            "<=" => ordering != Ordering::Greater,
            _ => false,
        }
    }
}

fn parse_filter(filter: &str) -> Result<Vec<Condition>, String> {
    filter.split(" && ").map(parse_condition).collect()
}

fn parse_condition(text: &str) -> Result<Condition, String> {
    let mut parts = text.splitn(3, ' ');
    let (Some(field), Some(operator), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("Invalid filter condition: {}", text));
    };
    if !["=", ">=", "<="].contains(&operator) {
        return Err(format!("Unsupported operator: {}", operator));
    }
    let literal = match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(inner) => Literal::Text(unescape(inner)),
        None => Literal::Number(
            raw.parse()
                .map_err(|_| format!("Invalid literal: {}", raw))?,
        ),
    };
    Ok(Condition {
        field: field.to_string(),
        operator: operator.to_string(),
        literal,
    })
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn compare(value: &Value, literal: &Literal) -> Option<Ordering> {
    match (value, literal) {
        (Value::String(text), _) if text.is_empty() => None,
        (Value::String(text), Literal::Text(expected)) => Some(text.as_str().cmp(expected.as_str())),
        (Value::Number(n), Literal::Number(expected)) => n.as_f64()?.partial_cmp(expected),
        _ => None,
    }
}

fn sort_records(records: &mut [Map<String, Value>], sort: &str) {
    let keys: Vec<(bool, String)> = sort
        .split(',')
        .filter(|key| !key.is_empty())
        .map(|key| match key.strip_prefix('-') {
            Some(field) => (true, field.to_string()),
            None => (false, key.trim_start_matches('+').to_string()),
        })
        .collect();

    records.sort_by(|a, b| {
        for (descending, field) in &keys {
            let ordering = compare_for_sort(a.get(field), b.get(field));
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
