//! # REST API HTTP Server
//!
//! Axum router mapping HTTP routes onto engine operations. Engine calls
//! run on the blocking pool.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::Engine;
use crate::errors::EngineResult;
use crate::server::shutdown_signal;

use super::errors::{RestError, RestResult};

/// REST façade over a shared engine
pub struct RestServer {
    engine: Arc<Engine>,
    addr: String,
}

#[derive(Debug, Default, Deserialize)]
struct FilterParams {
    filter: Option<String>,
}

impl FilterParams {
    fn query(&self) -> RestResult<Option<Value>> {
        self.filter
            .as_deref()
            .map(|f| serde_json::from_str(f).map_err(|e| RestError::InvalidFilter(e.to_string())))
            .transpose()
    }
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    query: Value,
    update: Value,
}

#[derive(Debug, Deserialize)]
struct DeleteBody {
    query: Value,
}

#[derive(Debug, Deserialize)]
struct IndexBody {
    field: String,
}

type Shared = Arc<Engine>;

impl RestServer {
    pub fn new(engine: Arc<Engine>, addr: impl Into<String>) -> Self {
        Self {
            engine,
            addr: addr.into(),
        }
    }

    pub fn socket_addr(&self) -> &str {
        &self.addr
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        router(self.engine.clone())
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> std::io::Result<()> {
        let addr: SocketAddr = self.addr.parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid REST address {}: {}", self.addr, e),
            )
        })?;
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "digitooldb REST API listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("digitooldb REST API shutting down");
        Ok(())
    }
}

/// Build the router over `engine`
pub fn router(engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/", get(list_databases_handler))
        .route(
            "/:db",
            get(list_collections_handler)
                .post(create_database_handler)
                .delete(drop_database_handler),
        )
        .route(
            "/:db/:coll",
            get(find_handler)
                .post(insert_handler)
                .put(update_handler)
                .delete(delete_handler),
        )
        .route("/:db/:coll/_collection", delete(drop_collection_handler))
        .route(
            "/:db/:coll/_indices",
            get(list_indices_handler).post(create_index_handler),
        )
        .route("/:db/:coll/_indices/:field", delete(drop_index_handler))
        .route("/:db/:coll/_verify", post(verify_indices_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(engine)
}

/// Run an engine call on the blocking pool
async fn blocking<T, F>(engine: &Shared, f: F) -> RestResult<T>
where
    F: FnOnce(&Engine) -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = engine.clone();
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| RestError::Internal(e.to_string()))?
        .map_err(RestError::from)
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> RestResult<T> {
    serde_json::from_slice(body).map_err(|e| RestError::InvalidBody(e.to_string()))
}

fn is_blank(body: &Bytes) -> bool {
    body.iter().all(|b| b.is_ascii_whitespace())
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_databases_handler(State(engine): State<Shared>) -> RestResult<Json<Vec<String>>> {
    Ok(Json(blocking(&engine, |e| e.list_databases()).await?))
}

async fn create_database_handler(
    State(engine): State<Shared>,
    Path(db): Path<String>,
) -> RestResult<(StatusCode, Json<Value>)> {
    let name = db.clone();
    blocking(&engine, move |e| e.create_database(&name)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "created": db }))))
}

async fn drop_database_handler(
    State(engine): State<Shared>,
    Path(db): Path<String>,
) -> RestResult<Json<Value>> {
    let name = db.clone();
    blocking(&engine, move |e| e.drop_database(&name)).await?;
    Ok(Json(json!({ "dropped": db })))
}

async fn list_collections_handler(
    State(engine): State<Shared>,
    Path(db): Path<String>,
) -> RestResult<Json<Vec<String>>> {
    Ok(Json(blocking(&engine, move |e| e.list_collections(&db)).await?))
}

/// Empty body or `{}` creates the collection; a document inserts it; an
/// array inserts the batch.
async fn insert_handler(
    State(engine): State<Shared>,
    Path((db, coll)): Path<(String, String)>,
    body: Bytes,
) -> RestResult<(StatusCode, Json<Value>)> {
    let document: Value = if is_blank(&body) {
        json!({})
    } else {
        parse_body(&body)?
    };

    let data = match document {
        Value::Object(ref map) if map.is_empty() => {
            let name = coll.clone();
            blocking(&engine, move |e| e.create_collection(&db, &name)).await?;
            json!({ "created": coll })
        }
        Value::Array(documents) => {
            let ids = blocking(&engine, move |e| e.insert_many(&db, &coll, documents)).await?;
            json!({ "_ids": ids })
        }
        document => {
            let id = blocking(&engine, move |e| e.insert(&db, &coll, document)).await?;
            json!({ "_id": id })
        }
    };
    Ok((StatusCode::CREATED, Json(data)))
}

async fn find_handler(
    State(engine): State<Shared>,
    Path((db, coll)): Path<(String, String)>,
    Query(params): Query<FilterParams>,
) -> RestResult<Json<Vec<Value>>> {
    let query = params.query()?;
    let docs = blocking(&engine, move |e| e.find(&db, &coll, query.as_ref())).await?;
    Ok(Json(docs))
}

async fn update_handler(
    State(engine): State<Shared>,
    Path((db, coll)): Path<(String, String)>,
    body: Bytes,
) -> RestResult<Json<Value>> {
    let body: UpdateBody = parse_body(&body)?;
    let summary = blocking(&engine, move |e| e.update(&db, &coll, &body.query, &body.update)).await?;
    Ok(Json(json!(summary)))
}

async fn delete_handler(
    State(engine): State<Shared>,
    Path((db, coll)): Path<(String, String)>,
    Query(params): Query<FilterParams>,
    body: Bytes,
) -> RestResult<Json<Value>> {
    let query = if is_blank(&body) {
        params.query()?.ok_or_else(|| {
            RestError::InvalidBody("delete requires a {\"query\"} body or a filter parameter".to_string())
        })?
    } else {
        parse_body::<DeleteBody>(&body)?.query
    };
    let deleted = blocking(&engine, move |e| e.delete(&db, &coll, &query)).await?;
    Ok(Json(json!({ "deleted_count": deleted })))
}

async fn drop_collection_handler(
    State(engine): State<Shared>,
    Path((db, coll)): Path<(String, String)>,
) -> RestResult<Json<Value>> {
    let name = coll.clone();
    blocking(&engine, move |e| e.drop_collection(&db, &name)).await?;
    Ok(Json(json!({ "dropped": coll })))
}

async fn list_indices_handler(
    State(engine): State<Shared>,
    Path((db, coll)): Path<(String, String)>,
) -> RestResult<Json<Vec<String>>> {
    Ok(Json(blocking(&engine, move |e| e.list_indices(&db, &coll)).await?))
}

async fn create_index_handler(
    State(engine): State<Shared>,
    Path((db, coll)): Path<(String, String)>,
    body: Bytes,
) -> RestResult<(StatusCode, Json<Value>)> {
    let body: IndexBody = parse_body(&body)?;
    let field = body.field.clone();
    blocking(&engine, move |e| e.create_index(&db, &coll, &field)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "indexed": body.field }))))
}

async fn drop_index_handler(
    State(engine): State<Shared>,
    Path((db, coll, field)): Path<(String, String, String)>,
) -> RestResult<Json<Value>> {
    let name = field.clone();
    blocking(&engine, move |e| e.drop_index(&db, &coll, &name)).await?;
    Ok(Json(json!({ "dropped": field })))
}

async fn verify_indices_handler(
    State(engine): State<Shared>,
    Path((db, coll)): Path<(String, String)>,
) -> RestResult<Json<Value>> {
    let reports = blocking(&engine, move |e| e.verify_indices(&db, &coll)).await?;
    Ok(Json(json!(reports)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(Arc::new(Engine::in_memory()));
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let app = router(Arc::new(Engine::in_memory()));
        let (status, _) = call(&app, "POST", "/shop", None).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&app, "POST", "/shop", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_bad_filter_is_bad_request() {
        let app = router(Arc::new(Engine::in_memory()));
        call(&app, "POST", "/shop", None).await;
        call(&app, "POST", "/shop/items", None).await;

        let (status, body) = call(&app, "GET", "/shop/items?filter=%7Bnope", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_delete_without_query_is_rejected() {
        let app = router(Arc::new(Engine::in_memory()));
        call(&app, "POST", "/shop", None).await;
        call(&app, "POST", "/shop/items", None).await;

        let (status, _) = call(&app, "DELETE", "/shop/items", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
