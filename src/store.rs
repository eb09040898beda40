//! Remote store client — table-scoped reads and writes against the
//! hosted datastore's REST surface.
//!
//! Callers never see SQL: queries are a table name, equality/membership
//! filters, optional ordering and limit. Rows travel as `serde_json::Value`
//! and each domain module parses its own types out of them.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Row filter for a table-scoped query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Column equals value.
    Eq(&'static str, String),
    /// Column is one of the values. Used for batched lookups.
    In(&'static str, Vec<String>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl ToString) -> Self {
        Filter::Eq(column, value.to_string())
    }

    pub fn is_in<V: ToString>(column: &'static str, values: &[V]) -> Self {
        Filter::In(column, values.iter().map(|v| v.to_string()).collect())
    }

    /// Encode as a `column=op.value` query pair.
    fn to_query(&self) -> String {
        match self {
            Filter::Eq(column, value) => format!("{column}=eq.{value}"),
            Filter::In(column, values) => format!("{column}=in.({})", values.join(",")),
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Filter::Eq(column, _) => column,
            Filter::In(column, _) => column,
        }
    }

    /// Whether a row satisfies this filter.
    fn matches(&self, row: &Value) -> bool {
        let cell = row.get(self.column());
        match self {
            Filter::Eq(_, value) => cell_equals(cell, value),
            Filter::In(_, values) => values.iter().any(|v| cell_equals(cell, v)),
        }
    }
}

fn cell_equals(cell: Option<&Value>, expected: &str) -> bool {
    match cell {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == expected,
        Some(Value::Bool(b)) => b.to_string() == expected,
        _ => false,
    }
}

/// Ordering by a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

impl Order {
    /// Most-recent-first for temporal columns.
    pub fn desc(column: &'static str) -> Self {
        Self { column, descending: true }
    }

    pub fn asc(column: &'static str) -> Self {
        Self { column, descending: false }
    }

    fn to_query(&self) -> String {
        let direction = if self.descending { "desc" } else { "asc" };
        format!("order={}.{direction}", self.column)
    }
}

/// Build the query string for a select.
fn select_query(filters: &[Filter], order: Option<Order>, limit: Option<u32>) -> String {
    let mut parts = vec!["select=*".to_string()];
    parts.extend(filters.iter().map(Filter::to_query));
    if let Some(order) = order {
        parts.push(order.to_query());
    }
    if let Some(limit) = limit {
        parts.push(format!("limit={limit}"));
    }
    parts.join("&")
}

/// Decode raw rows into a domain type.
pub fn rows_into<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| StoreError::ResponseParsing(e.to_string()))
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Cannot reach the datastore at {0}")]
    Connection(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("Datastore returned {status}: {body}")]
    Query { status: u16, body: String },
    #[error("Failed to parse datastore response: {0}")]
    ResponseParsing(String),
    #[error("Internal lock poisoned")]
    LockPoisoned,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Table-scoped query operations against the hosted datastore.
///
/// Every call carries the caller's access token; row-level security on
/// the service side scopes results to that user.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
        limit: Option<u32>,
        token: &str,
    ) -> Result<Vec<Value>, StoreError>;

    /// Insert rows; returns the inserted representation.
    async fn insert(&self, table: &str, rows: Vec<Value>, token: &str)
        -> Result<Vec<Value>, StoreError>;

    /// Patch all rows matching the filters; returns the updated representation.
    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
        token: &str,
    ) -> Result<Vec<Value>, StoreError>;
}

// ---------------------------------------------------------------------------
// Hosted implementation
// ---------------------------------------------------------------------------

/// REST client for the hosted datastore.
pub struct PostgrestStore {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
}

impl PostgrestStore {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &crate::config::RemoteConfig) -> Self {
        Self::new(&config.base_url, &config.anon_key)
    }

    fn table_url(&self, table: &str, query: &str) -> String {
        format!("{}/rest/v1/{table}?{query}", self.base_url)
    }

    fn send_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_connect() {
            StoreError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            StoreError::HttpClient("Request timed out".to_string())
        } else {
            StoreError::HttpClient(e.to_string())
        }
    }

    async fn parse_rows(response: reqwest::Response) -> Result<Vec<Value>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Query {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| StoreError::ResponseParsing(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for PostgrestStore {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
        limit: Option<u32>,
        token: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let url = self.table_url(table, &select_query(filters, order, limit));

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        Self::parse_rows(response).await
    }

    async fn insert(
        &self,
        table: &str,
        rows: Vec<Value>,
        token: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let url = format!("{}/rest/v1/{table}", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(token)
            .json(&rows)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        Self::parse_rows(response).await
    }

    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
        token: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let query: Vec<String> = filters.iter().map(Filter::to_query).collect();
        let url = self.table_url(table, &query.join("&"));

        let response = self
            .client
            .patch(&url)
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(token)
            .json(&patch)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        Self::parse_rows(response).await
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// One recorded mock operation, for asserting call shapes in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub operation: &'static str,
    pub table: String,
    pub filters: Vec<Filter>,
}

/// In-memory store for testing — seeded rows per table, recorded calls,
/// and injectable failures.
pub struct MockStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<Vec<StoreCall>>,
    fail_select: bool,
    fail_insert: bool,
    fail_update: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_select: false,
            fail_insert: false,
            fail_update: false,
        }
    }

    pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        self.tables.lock().unwrap().insert(table.to_string(), rows);
        self
    }

    pub fn failing_select(mut self) -> Self {
        self.fail_select = true;
        self
    }

    pub fn failing_insert(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    pub fn failing_update(mut self) -> Self {
        self.fail_update = true;
        self
    }

    /// All operations recorded so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of selects issued against one table.
    pub fn select_count(&self, table: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.operation == "select" && c.table == table)
            .count()
    }

    /// Current rows of a table, for post-mutation assertions.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, operation: &'static str, table: &str, filters: &[Filter]) {
        self.calls.lock().unwrap().push(StoreCall {
            operation,
            table: table.to_string(),
            filters: filters.to_vec(),
        });
    }

    fn failure() -> StoreError {
        StoreError::Query {
            status: 500,
            body: "mock failure".to_string(),
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
        limit: Option<u32>,
        _token: &str,
    ) -> Result<Vec<Value>, StoreError> {
        self.record("select", table, filters);
        if self.fail_select {
            return Err(Self::failure());
        }

        let tables = self.tables.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let left = a.get(order.column).and_then(Value::as_str).unwrap_or("");
                let right = b.get(order.column).and_then(Value::as_str).unwrap_or("");
                if order.descending {
                    right.cmp(left)
                } else {
                    left.cmp(right)
                }
            });
        }

        if let Some(limit) = limit {
            rows.truncate(limit as usize);
        }

        Ok(rows)
    }

    async fn insert(
        &self,
        table: &str,
        rows: Vec<Value>,
        _token: &str,
    ) -> Result<Vec<Value>, StoreError> {
        self.record("insert", table, &[]);
        if self.fail_insert {
            return Err(Self::failure());
        }

        let mut tables = self.tables.lock().map_err(|_| StoreError::LockPoisoned)?;
        tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.clone());
        Ok(rows)
    }

    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
        _token: &str,
    ) -> Result<Vec<Value>, StoreError> {
        self.record("update", table, filters);
        if self.fail_update {
            return Err(Self::failure());
        }

        let mut tables = self.tables.lock().map_err(|_| StoreError::LockPoisoned)?;
        let rows = tables.entry(table.to_string()).or_default();

        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if filters.iter().all(|f| f.matches(row)) {
                if let (Some(row_map), Some(patch_map)) = (row.as_object_mut(), patch.as_object()) {
                    for (key, value) in patch_map {
                        row_map.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }
}
