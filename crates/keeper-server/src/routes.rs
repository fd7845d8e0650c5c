//! HTTP routes
//!
//! Everything except registration requires Basic authentication, and every
//! record handler acts only on the authenticated user's records.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::middleware;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;

use keeper_core::{IdResponse, NewUser, PasswordChange, Record, RecordType, Records, StatusResponse};
use record_store::{password_hash, RecordStore};

use crate::auth::{require_user, AuthUser};
use crate::error::ApiError;

type Store = State<Arc<RecordStore>>;
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the service around a canonical store
pub fn router(store: Arc<RecordStore>) -> Router {
    // one name for the first segment under /records, whatever it holds
    let protected = Router::new()
        .route("/ping", get(ping))
        .route("/password", put(change_password))
        .route("/records", post(store_record).get(list_records))
        .route("/records/by_type/:record_type", get(list_by_type))
        .route(
            "/records/:record",
            get(get_by_id).put(update_by_id).delete(delete_by_id),
        )
        .route(
            "/records/:record/:record_name",
            get(get_id)
                .put(update_by_type_name)
                .delete(delete_by_type_name),
        )
        .route_layer(middleware::from_fn_with_state(store.clone(), require_user));

    Router::new()
        .route("/users", post(register))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Run a store call on the blocking pool
pub(crate) async fn with_store<T, F>(store: &Arc<RecordStore>, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&RecordStore) -> record_store::Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || call(&store))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "store task failed");
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("record id {}", raw)))
}

fn parse_type(raw: &str) -> Result<RecordType, ApiError> {
    raw.parse()
        .map_err(|e: keeper_core::RecordTypeError| ApiError::BadRequest(e.to_string()))
}

async fn register(State(store): Store, body: Bytes) -> ApiResult<IdResponse> {
    let user: NewUser = parse_body(&body)?;
    if user.password.is_empty() {
        return Err(ApiError::BadRequest("empty password".to_string()));
    }

    let name = user.name.clone();
    let id = with_store(&store, move |store| {
        store.create_user(&user.name, &user.full_name, &password_hash(&user.password))
    })
    .await?;
    tracing::info!(user = %name, id, "user registered");
    Ok(Json(IdResponse::ok(name, id)))
}

async fn ping(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<StatusResponse> {
    Json(StatusResponse::new(format!("OK. User {}", user)))
}

async fn change_password(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<StatusResponse> {
    let change: PasswordChange = parse_body(&body)?;
    if change.password.is_empty() {
        return Err(ApiError::BadRequest("empty password".to_string()));
    }

    let owner = user.clone();
    with_store(&store, move |store| {
        store.change_password(&owner, &password_hash(&change.password))
    })
    .await?;
    tracing::info!(%user, "password changed");
    Ok(Json(StatusResponse::ok()))
}

async fn store_record(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<IdResponse> {
    let record: Record = parse_body(&body)?;
    let (name, record_type) = (record.name.clone(), record.record_type);

    let owner = user.clone();
    let id = with_store(&store, move |store| store.store_record(&owner, &record)).await?;
    tracing::debug!(%user, id, %record_type, "record stored");
    Ok(Json(IdResponse::ok(name, id)))
}

async fn list_records(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Records> {
    let records = with_store(&store, move |store| store.list_records(&user)).await?;
    Ok(Json(records))
}

async fn list_by_type(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(record_type): Path<String>,
) -> ApiResult<Records> {
    let record_type = parse_type(&record_type)?;
    let records =
        with_store(&store, move |store| store.list_records_by_type(&user, record_type)).await?;
    Ok(Json(records))
}

async fn get_by_id(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Record> {
    let id = parse_id(&id)?;
    let record = with_store(&store, move |store| store.get_record_by_id(&user, id)).await?;
    Ok(Json(record))
}

async fn update_by_id(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<IdResponse> {
    let id = parse_id(&id)?;
    let record: Record = parse_body(&body)?;
    let name = record.name.clone();

    let owner = user.clone();
    with_store(&store, move |store| store.update_record_by_id(&owner, id, &record)).await?;
    tracing::debug!(%user, id, "record updated");
    Ok(Json(IdResponse::ok(name, id)))
}

async fn delete_by_id(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusResponse> {
    let id = parse_id(&id)?;

    let owner = user.clone();
    with_store(&store, move |store| store.delete_record_by_id(&owner, id)).await?;
    tracing::debug!(%user, id, "record deleted");
    Ok(Json(StatusResponse::ok()))
}

async fn get_id(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((record_type, name)): Path<(String, String)>,
) -> ApiResult<IdResponse> {
    let record_type = parse_type(&record_type)?;

    let lookup = name.clone();
    let id = with_store(&store, move |store| {
        store.get_record_id(&user, record_type, &lookup)
    })
    .await?;
    Ok(Json(IdResponse::ok(name, id)))
}

async fn update_by_type_name(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((record_type, name)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<IdResponse> {
    let record_type = parse_type(&record_type)?;
    let record: Record = parse_body(&body)?;
    let new_name = record.name.clone();

    let owner = user.clone();
    let id = with_store(&store, move |store| {
        store.update_record_by_type_name(&owner, record_type, &name, &record)?;
        store.get_record_id(&owner, record.record_type, &record.name)
    })
    .await?;
    tracing::debug!(%user, id, "record updated");
    Ok(Json(IdResponse::ok(new_name, id)))
}

async fn delete_by_type_name(
    State(store): Store,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((record_type, name)): Path<(String, String)>,
) -> ApiResult<StatusResponse> {
    let record_type = parse_type(&record_type)?;

    let owner = user.clone();
    with_store(&store, move |store| {
        store.delete_record_by_type_name(&owner, record_type, &name)
    })
    .await?;
    tracing::debug!(%user, %record_type, "record deleted");
    Ok(Json(StatusResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use record_store::StoreMode;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ALICE: Option<(&str, &str)> = Some(("alice", "s3cr3t!"));

    fn app() -> Router {
        let store = RecordStore::open_in_memory(StoreMode::Canonical).unwrap();
        router(Arc::new(store))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        auth: Option<(&str, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user, password)) = auth {
            let token = STANDARD.encode(format!("{}:{}", user, password));
            builder = builder.header(header::AUTHORIZATION, format!("Basic {}", token));
        }
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn with_alice() -> Router {
        let app = app();
        let (status, _) = call(
            &app,
            Method::POST,
            "/users",
            None,
            Some(json!({"name": "alice", "full_name": "Alice", "password": "s3cr3t!"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        app
    }

    fn email() -> Value {
        json!({"name": "email", "record_type": "acc", "opaque": "c1", "meta": "m1"})
    }

    #[tokio::test]
    async fn test_register_without_auth() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/users",
            None,
            Some(json!({"name": "alice", "password": "s3cr3t!"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "alice");
        assert_eq!(body["status"], "OK");
        assert!(body["id"].as_i64().unwrap() > 0);

        let (status, _) = call(
            &app,
            Method::POST,
            "/users",
            None,
            Some(json!({"name": "alice", "password": "other"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let app = app();
        let (status, _) = call(
            &app,
            Method::POST,
            "/users",
            None,
            Some(json!({"name": "al", "password": "s3cr3t!"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::POST, "/users", None, Some(json!("junk"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["status"].as_str().unwrap().starts_with("Bad request"));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let app = with_alice().await;

        let request = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            r#"Basic realm="keeper""#
        );
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user() {
        let app = with_alice().await;

        let (status, _) = call(&app, Method::GET, "/ping", Some(("alice", "nope")), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::GET, "/ping", Some(("bob", "nope")), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&app, Method::GET, "/ping", ALICE, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK. User alice");
    }

    #[tokio::test]
    async fn test_record_lifecycle() {
        let app = with_alice().await;

        let (status, body) = call(&app, Method::POST, "/records", ALICE, Some(email())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "email");
        let id = body["id"].as_i64().unwrap();

        let (status, _) = call(&app, Method::POST, "/records", ALICE, Some(email())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(&app, Method::GET, &format!("/records/{}", id), ALICE, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, email());

        let (status, body) = call(&app, Method::GET, "/records/acc/email", ALICE, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"].as_i64(), Some(id));

        let renamed = json!({"name": "mail", "record_type": "acc", "opaque": "c2"});
        let (status, body) =
            call(&app, Method::PUT, &format!("/records/{}", id), ALICE, Some(renamed)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "mail");

        let (status, _) = call(&app, Method::GET, "/records/acc/email", ALICE, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let again = json!({"name": "email", "record_type": "acc", "opaque": "c3"});
        let (status, body) =
            call(&app, Method::PUT, "/records/acc/mail", ALICE, Some(again)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"].as_i64(), Some(id));

        let (status, _) = call(&app, Method::DELETE, "/records/acc/email", ALICE, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            call(&app, Method::DELETE, &format!("/records/{}", id), ALICE, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["status"].as_str().unwrap().starts_with("Not found"));
    }

    #[tokio::test]
    async fn test_listings() {
        let app = with_alice().await;
        call(&app, Method::POST, "/records", ALICE, Some(email())).await;
        call(
            &app,
            Method::POST,
            "/records",
            ALICE,
            Some(json!({"name": "todo", "record_type": "note", "opaque": "c"})),
        )
        .await;

        let (status, body) = call(&app, Method::GET, "/records", ALICE, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_object().unwrap().len(), 2);

        let (status, body) = call(&app, Method::GET, "/records/by_type/acc", ALICE, None).await;
        assert_eq!(status, StatusCode::OK);
        let listed = body.as_object().unwrap();
        assert_eq!(listed.len(), 1);
        let entry = listed.values().next().unwrap();
        assert_eq!(entry, &json!({"name": "email", "record_type": "acc"}));

        let (status, _) = call(&app, Method::GET, "/records/by_type/pin", ALICE, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_records_are_private() {
        let app = with_alice().await;
        call(
            &app,
            Method::POST,
            "/users",
            None,
            Some(json!({"name": "bob", "password": "hunter22"})),
        )
        .await;
        let bob = Some(("bob", "hunter22"));

        let (_, body) = call(&app, Method::POST, "/records", ALICE, Some(email())).await;
        let id = body["id"].as_i64().unwrap();

        let (status, _) = call(&app, Method::GET, &format!("/records/{}", id), bob, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::POST, "/records", bob, Some(email())).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, Method::GET, "/records", bob, None).await;
        assert_eq!(body.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_change_password() {
        let app = with_alice().await;

        let (status, _) = call(
            &app,
            Method::PUT,
            "/password",
            ALICE,
            Some(json!({"password": "n3w-pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, Method::GET, "/ping", ALICE, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            call(&app, Method::GET, "/ping", Some(("alice", "n3w-pass")), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_record_id() {
        let app = with_alice().await;
        let (status, _) = call(&app, Method::GET, "/records/abc", ALICE, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_requests() {
        let app = with_alice().await;

        let mut tasks = Vec::new();
        for n in 0..8 {
            let app = app.clone();
            tasks.push(tokio::spawn(async move {
                let record = json!({"name": format!("site{}", n), "record_type": "acc", "opaque": "c"});
                call(&app, Method::POST, "/records", ALICE, Some(record)).await.0
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::OK);
        }

        let (_, body) = call(&app, Method::GET, "/records/by_type/acc", ALICE, None).await;
        assert_eq!(body.as_object().unwrap().len(), 8);
    }
}
