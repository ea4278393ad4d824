//! HTTP surface served next to the controller: health checks plus a small
//! JSON API to list, create and delete chains.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use kube::{
    Api, Client,
    api::{DeleteParams, ListParams, ObjectMeta, PostParams},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{MadaraChain, MadaraChainSpec};

#[derive(Clone)]
pub struct ApiState {
    pub client: Client,
    pub namespace: String,
}

impl ApiState {
    fn chains(&self) -> Api<MadaraChain> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Kube(e) => {
                warn!(error = %e, "Kubernetes API request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Body of `POST /api/madarachains`.
#[derive(Debug, Deserialize)]
pub struct NewChain {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "chainID")]
    pub chain_id: String,
    pub replicas: Option<i32>,
}

impl NewChain {
    /// Builds the chain to create; unset fields take the CRD defaults.
    pub fn into_chain(self, namespace: &str) -> Result<MadaraChain, ApiError> {
        if self.name.is_empty() || self.chain_id.is_empty() {
            return Err(ApiError::BadRequest("Name and ChainID are required"));
        }

        let defaults = MadaraChainSpec::default();
        Ok(MadaraChain {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: MadaraChainSpec {
                chain_id: self.chain_id,
                replicas: self.replicas.unwrap_or(defaults.replicas),
                ..defaults
            },
            status: None,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub name: Option<String>,
}

async fn health() -> Json<&'static str> {
    Json("healthy")
}

/// GET /api/madarachains
async fn list_chains(State(state): State<ApiState>) -> Result<Json<Vec<MadaraChain>>, ApiError> {
    let chains = state.chains().list(&ListParams::default()).await?;
    Ok(Json(chains.items))
}

/// POST /api/madarachains
async fn create_chain(
    State(state): State<ApiState>,
    Json(body): Json<NewChain>,
) -> Result<Json<MadaraChain>, ApiError> {
    let chain = body.into_chain(&state.namespace)?;
    let created = state.chains().create(&PostParams::default(), &chain).await?;
    info!(chain = ?created.metadata.name, "Created MadaraChain through the API");
    Ok(Json(created))
}

/// DELETE /api/madarachains?name=
async fn delete_chain(
    State(state): State<ApiState>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    let name = query
        .name
        .filter(|n| !n.is_empty())
        .ok_or(ApiError::BadRequest("Name is required"))?;

    state.chains().delete(&name, &DeleteParams::default()).await?;
    info!(chain = %name, "Deleted MadaraChain through the API");
    Ok(StatusCode::OK)
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/madarachains",
            get(list_chains).post(create_chain).delete(delete_chain),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn new_chain(value: serde_json::Value) -> NewChain {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn new_chain_defaults_to_one_replica() {
        let chain = new_chain(json!({ "name": "l3", "chainID": "my-l3" }))
            .into_chain("default")
            .unwrap();

        assert_eq!(chain.metadata.name.as_deref(), Some("l3"));
        assert_eq!(chain.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(chain.spec.chain_id, "my-l3");
        assert_eq!(chain.spec.replicas, 1);
        assert_eq!(chain.spec.port, 9944);
    }

    #[test]
    fn new_chain_keeps_requested_replicas() {
        let chain = new_chain(json!({ "name": "l3", "chainID": "my-l3", "replicas": 3 }))
            .into_chain("chains")
            .unwrap();

        assert_eq!(chain.spec.replicas, 3);
        assert_eq!(chain.metadata.namespace.as_deref(), Some("chains"));
    }

    #[test]
    fn name_and_chain_id_are_required() {
        for body in [json!({ "name": "l3" }), json!({ "chainID": "x" }), json!({})] {
            let err = new_chain(body).into_chain("default").unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)));
        }
    }

    #[test]
    fn bad_requests_map_to_400() {
        let response = ApiError::BadRequest("Name is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
