//! Read-only discovery queries: recommendations and search.
//!
//! Geo and text matching live behind `find_nearby` / `search_text` so a
//! storage engine with real geo or full-text indexes can replace the
//! SQLite-side implementations without touching callers.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::entities::{GeoPoint, GroupPrivacy};
use crate::types::{GroupError, GroupResult};

const RECOMMENDATION_LIMIT: usize = 20;
const DEFAULT_SEARCH_LIMIT: i64 = 20;
pub const DEFAULT_RADIUS_METERS: f64 = 10_000.0;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Trimmed group view for listings; join requests, invite codes and the
/// audit log never leave the group document itself.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub dp: Option<String>,
    pub privacy: GroupPrivacy,
    pub tags: Vec<String>,
    pub location: Option<GeoPoint>,
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub display_name: Option<String>,
    pub city: Option<String>,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub data: Vec<GroupSummary>,
    pub meta: SearchMeta,
}

/// Great-circle distance between two points.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Public groups located within `radius_meters` of `center`. Groups without
/// a location never match a geo query.
pub async fn find_nearby(
    pool: &SqlitePool,
    center: GeoPoint,
    radius_meters: f64,
) -> GroupResult<Vec<GroupSummary>> {
    let groups = fetch_public_groups(pool).await?;

    Ok(groups
        .into_iter()
        .filter(|group| match group.location {
            Some(point) => haversine_meters(center, point) <= radius_meters,
            None => false,
        })
        .collect())
}

/// Groups matching interests the user holds, excluding groups the user is
/// already in. Only public groups are recommended. An optional geo filter
/// narrows to groups within the radius.
pub async fn recommend_groups(
    pool: &SqlitePool,
    user_id: i64,
    near: Option<(GeoPoint, f64)>,
) -> GroupResult<Vec<GroupSummary>> {
    let interests = user_interests(pool, user_id).await?;

    let joined: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT g.public_id FROM groups g
        JOIN group_members gm ON gm.group_id = g.id
        WHERE gm.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    let joined: HashSet<String> = joined.into_iter().collect();

    let candidates = match near {
        Some((center, radius)) => find_nearby(pool, center, radius).await?,
        None => fetch_public_groups(pool).await?,
    };

    Ok(candidates
        .into_iter()
        .filter(|group| !joined.contains(&group.id))
        .filter(|group| group.tags.iter().any(|tag| interests.contains(tag)))
        .take(RECOMMENDATION_LIMIT)
        .collect())
}

/// Users in the same city sharing at least one interest.
pub async fn recommend_users(pool: &SqlitePool, user_id: i64) -> GroupResult<Vec<UserSummary>> {
    let row = sqlx::query("SELECT city, interests FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Err(GroupError::UserNotFound);
    };

    let city: Option<String> = row.try_get("city")?;
    let interests_json: String = row.try_get("interests")?;
    let interests: Vec<String> = serde_json::from_str(&interests_json).unwrap_or_default();

    let Some(city) = city else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        "SELECT public_id, display_name, city, interests FROM users WHERE city = ? AND id != ?",
    )
    .bind(&city)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut results = Vec::new();
    for row in &rows {
        let candidate_interests: Vec<String> =
            serde_json::from_str(&row.try_get::<String, _>("interests")?).unwrap_or_default();

        if !candidate_interests
            .iter()
            .any(|interest| interests.contains(interest))
        {
            continue;
        }

        results.push(UserSummary {
            id: row.try_get("public_id")?,
            display_name: row.try_get("display_name")?,
            city: row.try_get("city")?,
            interests: candidate_interests,
        });
        if results.len() == RECOMMENDATION_LIMIT {
            break;
        }
    }

    Ok(results)
}

/// Text search over name, description and tags with page metadata. Secret
/// groups never surface. Without a query, returns newest groups first.
pub async fn search_groups(
    pool: &SqlitePool,
    query: Option<&str>,
    page: Option<i64>,
    limit: Option<i64>,
) -> GroupResult<SearchPage> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1);
    let offset = (page - 1) * limit;

    let (total, data) = search_text(pool, query, limit, offset).await?;

    Ok(SearchPage {
        data,
        meta: SearchMeta {
            total,
            page,
            limit,
            pages: (total + limit - 1) / limit,
        },
    })
}

/// Substring matching over the searchable group fields.
async fn search_text(
    pool: &SqlitePool,
    query: Option<&str>,
    limit: i64,
    offset: i64,
) -> GroupResult<(i64, Vec<GroupSummary>)> {
    let pattern = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));

    let (total, rows) = match &pattern {
        Some(pattern) => {
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM groups WHERE privacy != 'secret' AND (name LIKE ? OR description LIKE ? OR tags LIKE ?)",
            )
            .bind(pattern)
            .bind(pattern)
            .bind(pattern)
            .fetch_one(pool)
            .await?;

            let rows = sqlx::query(
                r#"
                SELECT public_id, name, description, dp, privacy, tags, lat, lng, capacity
                FROM groups
                WHERE privacy != 'secret' AND (name LIKE ? OR description LIKE ? OR tags LIKE ?)
                ORDER BY created_at DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(pattern)
            .bind(pattern)
            .bind(pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

            (total, rows)
        }
        None => {
            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM groups WHERE privacy != 'secret'")
                    .fetch_one(pool)
                    .await?;

            let rows = sqlx::query(
                r#"
                SELECT public_id, name, description, dp, privacy, tags, lat, lng, capacity
                FROM groups
                WHERE privacy != 'secret'
                ORDER BY created_at DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

            (total, rows)
        }
    };

    let data = rows
        .iter()
        .map(summary_from_row)
        .collect::<GroupResult<Vec<_>>>()?;

    Ok((total, data))
}

async fn fetch_public_groups(pool: &SqlitePool) -> GroupResult<Vec<GroupSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT public_id, name, description, dp, privacy, tags, lat, lng, capacity
        FROM groups
        WHERE privacy = 'public'
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

async fn user_interests(pool: &SqlitePool, user_id: i64) -> GroupResult<Vec<String>> {
    let interests_json: Option<String> =
        sqlx::query_scalar("SELECT interests FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    let Some(interests_json) = interests_json else {
        return Err(GroupError::UserNotFound);
    };

    Ok(serde_json::from_str(&interests_json).unwrap_or_default())
}

fn summary_from_row(row: &sqlx::sqlite::SqliteRow) -> GroupResult<GroupSummary> {
    let privacy_str: String = row.try_get("privacy")?;
    let tags_json: String = row.try_get("tags")?;
    let lat: Option<f64> = row.try_get("lat")?;
    let lng: Option<f64> = row.try_get("lng")?;

    Ok(GroupSummary {
        id: row.try_get("public_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        dp: row.try_get("dp")?,
        privacy: GroupPrivacy::parse(&privacy_str).unwrap_or(GroupPrivacy::Public),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        location: match (lat, lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        },
        capacity: row.try_get("capacity")?,
    })
}
