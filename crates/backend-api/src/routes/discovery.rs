use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use circleup_groups::services::discovery;
use circleup_groups::services::discovery::{GroupSummary, SearchPage, UserSummary};
use circleup_groups::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::util::require_bearer;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Radius in meters, default 10 km. Only meaningful with lat/lng.
    #[serde(default)]
    pub radius: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GroupRecommendationsResponse {
    pub groups: Vec<GroupSummary>,
}

#[derive(Debug, Serialize)]
pub struct UserRecommendationsResponse {
    pub users: Vec<UserSummary>,
}

#[utoipa::path(
    get,
    path = "/api/v1/recommendations/groups",
    tag = "Discovery",
    security(("bearerAuth" = [])),
    params(
        ("lat" = Option<f64>, Query, description = "Latitude for the optional geo filter"),
        ("lng" = Option<f64>, Query, description = "Longitude for the optional geo filter"),
        ("radius" = Option<f64>, Query, description = "Radius in meters, default 10000")
    ),
    responses((status = 200, description = "Public groups matching the caller's interests"))
)]
pub async fn recommend_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<GroupRecommendationsResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let near = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => Some((
            GeoPoint { lat, lng },
            query.radius.unwrap_or(discovery::DEFAULT_RADIUS_METERS),
        )),
        _ => None,
    };

    let groups = discovery::recommend_groups(state.db_pool(), user.id, near).await?;

    Ok(Json(GroupRecommendationsResponse { groups }))
}

#[utoipa::path(
    get,
    path = "/api/v1/recommendations/users",
    tag = "Discovery",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Users in the caller's city sharing an interest"))
)]
pub async fn recommend_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserRecommendationsResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let users = discovery::recommend_users(state.db_pool(), user.id).await?;

    Ok(Json(UserRecommendationsResponse { users }))
}

#[utoipa::path(
    get,
    path = "/api/v1/search/groups",
    tag = "Discovery",
    security(("bearerAuth" = [])),
    params(
        ("q" = Option<String>, Query, description = "Free-text query over name, description and tags"),
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("limit" = Option<i64>, Query, description = "Page size, default 20")
    ),
    responses((status = 200, description = "Matching groups with page metadata; secret groups never surface"))
)]
pub async fn search_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchPage>, ApiError> {
    let token = require_bearer(&headers)?;
    state.authenticate(&token).await?;

    let page = discovery::search_groups(
        state.db_pool(),
        query.q.as_deref(),
        query.page,
        query.limit,
    )
    .await?;

    Ok(Json(page))
}
