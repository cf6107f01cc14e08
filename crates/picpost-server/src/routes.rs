use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use picpost_core::{
    records::{Post, User},
    store::RecordStore,
};
use picpost_service::{RecordService, ServiceError, WriteRequest};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, warn};

/// Failure body for every route: `{"message": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Success body of the create routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedBody {
    pub id: String,
}

/// A service failure rendered as an HTTP response.
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Decode { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Validation(_)
            | ServiceError::Cipher(_)
            | ServiceError::StoreWrite(_)
            | ServiceError::StoreRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.0 {
            ServiceError::Cipher(_) | ServiceError::StoreWrite(_) => {
                error!(error = %self.0, "request failed")
            }
            _ => warn!(error = %self.0, %status, "request rejected"),
        }
        let body = ErrorBody {
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router for the five public routes.
///
/// `/users` and `/posts` accept any method so the validator can answer a GET.
/// The id is the whole remainder of the path, slashes included; a bare
/// trailing slash looks up the empty id.
pub fn build_router<S: RecordStore + 'static>(service: Arc<RecordService<S>>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/users", any(create_user::<S>))
        .route("/users/", get(fetch_user_without_id::<S>))
        .route("/users/{*id}", get(fetch_user::<S>))
        .route("/posts", any(create_post::<S>))
        .route("/posts/", get(fetch_post_without_id::<S>))
        .route("/posts/{*id}", get(fetch_post::<S>))
        .with_state(service)
}

async fn home() -> &'static str {
    "Hello World!"
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// POST /users
#[instrument(skip_all, fields(route = "create_user"))]
async fn create_user<S: RecordStore>(
    State(service): State<Arc<RecordService<S>>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreatedBody>, ApiError> {
    let request = WriteRequest {
        method: method.as_str(),
        content_type: content_type(&headers),
        body: &body,
    };
    let id = service.create_user(request).await?;
    Ok(Json(CreatedBody { id }))
}

/// GET /users/{id}
#[instrument(skip_all, fields(route = "fetch_user", %id))]
async fn fetch_user<S: RecordStore>(
    State(service): State<Arc<RecordService<S>>>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(service.fetch_user(&id).await?))
}

/// GET /users/
async fn fetch_user_without_id<S: RecordStore>(
    State(service): State<Arc<RecordService<S>>>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(service.fetch_user("").await?))
}

/// POST /posts
#[instrument(skip_all, fields(route = "create_post"))]
async fn create_post<S: RecordStore>(
    State(service): State<Arc<RecordService<S>>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreatedBody>, ApiError> {
    let request = WriteRequest {
        method: method.as_str(),
        content_type: content_type(&headers),
        body: &body,
    };
    let post = service.create_post(request).await?;
    Ok(Json(CreatedBody { id: post.id }))
}

/// GET /posts/{id}
#[instrument(skip_all, fields(route = "fetch_post", %id))]
async fn fetch_post<S: RecordStore>(
    State(service): State<Arc<RecordService<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(service.fetch_post(&id).await?))
}

/// GET /posts/
async fn fetch_post_without_id<S: RecordStore>(
    State(service): State<Arc<RecordService<S>>>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(service.fetch_post("").await?))
}

#[cfg(test)]
mod tests {
    use picpost_core::{
        store::{Collection, StoreError},
        validation::ValidationError,
    };

    use super::*;

    #[test]
    fn decode_failures_are_client_errors() {
        let err = ApiError::from(ServiceError::Decode {
            collection: Collection::Users,
            reason: "EOF".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn contract_failures_are_server_errors() {
        for err in [
            ServiceError::Validation(ValidationError::UnsupportedContentType),
            ServiceError::StoreRead(StoreError::NotFound {
                collection: Collection::Posts,
                id: "x".into(),
            }),
            ServiceError::StoreWrite(StoreError::Unavailable {
                reason: "down".into(),
            }),
        ] {
            assert_eq!(ApiError::from(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
