//! Read-only profile endpoint used by the mini-application.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::Database;
use crate::profile::ProfileView;

#[derive(Debug, Deserialize)]
pub struct GetUserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl ProfileResponse {
    fn failure(error: &'static str) -> Self {
        Self {
            ok: false,
            profile: None,
            error: Some(error),
        }
    }
}

/// `GET /get_user?user_id=<int>`
pub fn create_router(db: Database) -> Router {
    // The mini-app is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/get_user", get(get_user))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(db)
}

async fn get_user(
    State(db): State<Database>,
    Query(query): Query<GetUserQuery>,
) -> (StatusCode, Json<ProfileResponse>) {
    let Some(user_id) = query
        .user_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ProfileResponse::failure("bad user_id")),
        );
    };

    match db.get_user_info(user_id).await {
        Ok(user) => (
            StatusCode::OK,
            Json(ProfileResponse {
                ok: true,
                profile: Some(ProfileView::from_user(user.as_ref())),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Profile lookup for {} failed: {}", user_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProfileResponse::failure("internal error")),
            )
        }
    }
}

pub async fn serve(db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Profile endpoint listening on http://{}/get_user", addr);
    axum::serve(listener, create_router(db)).await?;
    Ok(())
}
