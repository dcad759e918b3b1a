use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::dto::{ProfileCheckQuery, ProfileSummary};
use crate::{
    auth::{
        extractors::{CurrentSession, MaybeSession},
        guard::authorize,
        repo_types::{SafeUser, UserType},
    },
    error::ApiError,
    state::AppState,
};

const PROFILE_CACHE_TTL_SECS: u64 = 60;

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/api/profile/check", get(check_profile))
        .route("/api/profile/me", get(my_profile))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/api/admin/users/:id", get(admin_get_user))
}

fn parse_user_id(raw: Option<&str>) -> Result<Uuid, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing id"))?;
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid id"))
}

fn cache_key(id: Uuid) -> String {
    format!("profile:{id}")
}

async fn cached_summary(state: &AppState, id: Uuid) -> Option<ProfileSummary> {
    let cache = state.cache.as_ref()?;
    match cache.get(&cache_key(id)).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, %id, "discarding unreadable cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, %id, "cache read failed");
            None
        }
    }
}

async fn store_summary(state: &AppState, id: Uuid, summary: &ProfileSummary) {
    let Some(cache) = state.cache.as_ref() else {
        return;
    };
    let raw = match serde_json::to_string(summary) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "serialize profile summary");
            return;
        }
    };
    if let Err(e) = cache.set(&cache_key(id), &raw, PROFILE_CACHE_TTL_SECS).await {
        warn!(error = %e, %id, "cache write failed");
    }
}

/// GET /api/profile/check?id=<uuid>
#[instrument(skip(state, q))]
pub async fn check_profile(
    State(state): State<AppState>,
    WithRejection(Query(q), _): WithRejection<Query<ProfileCheckQuery>, ApiError>,
) -> Result<Json<ProfileSummary>, ApiError> {
    let id = parse_user_id(q.id.as_deref())?;

    if let Some(summary) = cached_summary(&state, id).await {
        debug!(%id, "profile served from cache");
        return Ok(Json(summary));
    }

    let user = state
        .users
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let summary = ProfileSummary::from(user);
    store_summary(&state, id, &summary).await;
    Ok(Json(summary))
}

/// GET /api/profile/me
pub async fn my_profile(CurrentSession(session): CurrentSession) -> Json<SafeUser> {
    Json(session.user)
}

/// GET /api/admin/users/:id
#[instrument(skip(state, auth))]
pub async fn admin_get_user(
    State(state): State<AppState>,
    MaybeSession(auth): MaybeSession,
    Path(id): Path<String>,
) -> Result<Json<SafeUser>, ApiError> {
    let session = authorize(&auth, Some(UserType::Admin))
        .into_result()
        .inspect_err(|e| warn!(reason = e.code(), "admin route refused"))?;

    let id = parse_user_id(Some(&id))?;
    let user = state
        .users
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    debug!(admin_id = %session.user.id, user_id = %id, "admin looked up user");
    Ok(Json(SafeUser::from(user)))
}
