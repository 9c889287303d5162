use salvo::http::StatusCode;
use salvo::http::header::REFERER;
use salvo::prelude::*;

use crate::db::DatabaseError;
use crate::db::{ContactStore, ContaminantStore, DocumentStore, QualificationStore, SiteStore};
use crate::db::models::{ContactStats, SummaryStats};
use crate::filter::{Medium, SiteFilter, Tri};
use crate::web::{render, web_state};

pub mod assets;
pub mod auth;
pub mod contacts;
pub mod contaminants;
pub mod customers;
pub mod dashboard;
pub mod dictionary;
pub mod documents;
pub mod explorer;
pub mod feedback;
pub mod filtered_out;
pub mod health;
pub mod narratives;
pub mod process;
pub mod qualifications;
pub mod search;
pub mod sites;

/// Flatten the (possibly repeated) query pairs and parse the site filter.
pub(crate) fn site_filter_from_request(req: &mut Request) -> SiteFilter {
    let queries = req.queries();
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    for (key, values) in queries.iter_all() {
        for value in values {
            pairs.push((key.as_str(), value.as_str()));
        }
    }
    SiteFilter::from_pairs(pairs)
}

pub(crate) fn query_string(req: &mut Request, key: &str) -> Option<String> {
    req.query::<String>(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn query_values(req: &mut Request, key: &str) -> Vec<String> {
    req.queries()
        .get_vec(key)
        .map(|values| {
            values
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn query_i64(req: &mut Request, key: &str) -> Option<i64> {
    query_string(req, key).and_then(|v| v.parse().ok())
}

pub(crate) fn query_f64(req: &mut Request, key: &str) -> Option<f64> {
    query_string(req, key).and_then(|v| v.parse().ok())
}

pub(crate) fn query_tri(req: &mut Request, key: &str) -> Tri {
    Tri::parse(query_string(req, key).as_deref())
}

pub(crate) fn tri_select(name: &str, value: Tri) -> String {
    render::select(
        name,
        &[("any", "Any"), ("yes", "Yes"), ("no", "No")],
        value.query_value().unwrap_or("any"),
    )
}

pub(crate) fn page_param(req: &mut Request) -> i64 {
    query_i64(req, "page").unwrap_or(1).max(1)
}

pub(crate) fn total_pages(total_count: i64, page_size: i64) -> i64 {
    ((total_count + page_size - 1) / page_size).max(1)
}

pub(crate) fn render_db_error(res: &mut Response, err: &DatabaseError) {
    tracing::error!("database query failed: {err}");
    let state = web_state();
    res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
    let body = render::error_box("The database query failed. See the server logs for details.");
    res.render(Text::Html(render::page(
        &state.config,
        "Error",
        "",
        None,
        &body,
    )));
}

pub(crate) fn render_not_found(res: &mut Response, message: &str) {
    let state = web_state();
    res.status_code(StatusCode::NOT_FOUND);
    let body = render::error_box(message);
    res.render(Text::Html(render::page(
        &state.config,
        "Not Found",
        "",
        None,
        &body,
    )));
}

pub(crate) fn render_page(
    res: &mut Response,
    title: &str,
    active: &str,
    flash: Option<&str>,
    body: &str,
) {
    let state = web_state();
    res.render(Text::Html(render::page(
        &state.config,
        title,
        active,
        flash,
        body,
    )));
}

// Cached option/stat accessors. Keys are internal; values expire per the
// configured TTLs and are recomputed on demand.

pub(crate) async fn cached_summary_stats() -> Result<SummaryStats, DatabaseError> {
    let state = web_state();
    if let Some(stats) = state.caches.stats.get("summary") {
        return Ok(stats);
    }
    let stats = state.db.site_store().summary_stats().await?;
    state.caches.stats.put("summary", stats);
    Ok(stats)
}

pub(crate) async fn cached_contact_stats() -> Result<ContactStats, DatabaseError> {
    let state = web_state();
    if let Some(stats) = state.caches.contact_stats.get("contacts") {
        return Ok(stats);
    }
    let stats = state.db.contact_store().stats().await?;
    state.caches.contact_stats.put("contacts", stats);
    Ok(stats)
}

pub(crate) async fn cached_tiers() -> Result<Vec<String>, DatabaseError> {
    let state = web_state();
    if let Some(tiers) = state.caches.options.get("tiers") {
        return Ok(tiers);
    }
    let tiers = state.db.qualification_store().tiers().await?;
    state.caches.options.put("tiers", tiers.clone());
    Ok(tiers)
}

pub(crate) async fn cached_historical_use() -> Result<Vec<String>, DatabaseError> {
    let state = web_state();
    if let Some(categories) = state.caches.options.get("historical_use") {
        return Ok(categories);
    }
    let categories = state.db.site_store().historical_use_categories().await?;
    state.caches.options.put("historical_use", categories.clone());
    Ok(categories)
}

pub(crate) async fn cached_medium_statuses(media: &[Medium]) -> Result<Vec<String>, DatabaseError> {
    let state = web_state();
    let mut key = String::from("medium_statuses");
    for medium in media {
        key.push(':');
        key.push_str(medium.slug());
    }
    if let Some(statuses) = state.caches.options.get(&key) {
        return Ok(statuses);
    }
    let statuses = state.db.contaminant_store().medium_statuses(media).await?;
    state.caches.options.put(key, statuses.clone());
    Ok(statuses)
}

pub(crate) async fn cached_document_categories() -> Result<Vec<String>, DatabaseError> {
    let state = web_state();
    if let Some(categories) = state.caches.options.get("document_categories") {
        return Ok(categories);
    }
    let categories = state.db.document_store().categories().await?;
    state
        .caches
        .options
        .put("document_categories", categories.clone());
    Ok(categories)
}

pub(crate) async fn cached_download_statuses() -> Result<Vec<String>, DatabaseError> {
    let state = web_state();
    if let Some(statuses) = state.caches.options.get("download_statuses") {
        return Ok(statuses);
    }
    let statuses = state.db.document_store().download_statuses().await?;
    state
        .caches
        .options
        .put("download_statuses", statuses.clone());
    Ok(statuses)
}

pub(crate) async fn cached_contact_roles() -> Result<Vec<String>, DatabaseError> {
    let state = web_state();
    if let Some(roles) = state.caches.options.get("contact_roles") {
        return Ok(roles);
    }
    let roles = state.db.contact_store().roles().await?;
    state.caches.options.put("contact_roles", roles.clone());
    Ok(roles)
}

pub(crate) async fn cached_contact_types() -> Result<Vec<String>, DatabaseError> {
    let state = web_state();
    if let Some(types) = state.caches.options.get("contact_types") {
        return Ok(types);
    }
    let types = state.db.contact_store().contact_types().await?;
    state.caches.options.put("contact_types", types.clone());
    Ok(types)
}

pub(crate) async fn cached_batches() -> Result<Vec<crate::db::models::BatchRun>, DatabaseError> {
    let state = web_state();
    if let Some(batches) = state.caches.batches.get("batches") {
        return Ok(batches);
    }
    let batches = state.db.site_store().batch_runs().await?;
    state.caches.batches.put("batches", batches.clone());
    Ok(batches)
}

/// Drop every cached option list so the next page load re-queries.
#[handler]
pub async fn refresh_caches(req: &mut Request, res: &mut Response) {
    let state = web_state();
    state.caches.clear_all();
    let back = req
        .headers()
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| render::href(&state.config, "/"));
    res.render(Redirect::other(back));
}

#[cfg(test)]
mod tests {
    use super::total_pages;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(total_pages(0, 500), 1);
        assert_eq!(total_pages(1, 500), 1);
        assert_eq!(total_pages(500, 500), 1);
        assert_eq!(total_pages(501, 500), 2);
        assert_eq!(total_pages(1700, 500), 4);
    }
}
