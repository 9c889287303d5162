use std::collections::HashMap;
use std::time::Instant;

use salvo::prelude::*;

use super::{
    cached_batches, cached_historical_use, cached_medium_statuses, cached_summary_stats,
    cached_tiers, page_param, query_string, render_db_error, render_page,
    site_filter_from_request, total_pages, tri_select,
};
use crate::db::DatabaseError;
use crate::db::{FeedbackStore, QualificationStore, SiteStore};
use crate::db::models::{SiteScore, SummaryStats};
use crate::filter::{Medium, SiteFilter};
use crate::web::render::{self, Cell};
use crate::web::{csv, web_state};

#[handler]
pub async fn search_page(req: &mut Request, res: &mut Response) {
    let mut filter = site_filter_from_request(req);
    let page = page_param(req);
    let notice = query_string(req, "notice");
    match build(&mut filter, page).await {
        Ok(body) => render_page(res, "Site Search", "search", notice.as_deref(), &body),
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn search_export(req: &mut Request, res: &mut Response) {
    let mut filter = site_filter_from_request(req);
    match export(&mut filter).await {
        Ok(data) => csv::send(res, "sites_overview.csv", data),
        Err(err) => render_db_error(res, &err),
    }
}

/// Drop range selections that do not actually narrow the data, so they
/// neither filter nor appear in pagination links.
fn normalize_ranges(filter: &mut SiteFilter, stats: &SummaryStats) {
    if let Some(range) = filter.narrative_range {
        if !range.narrows(stats.narrative_min, stats.narrative_max) {
            filter.narrative_range = None;
        }
    }
    if let Some(range) = filter.document_range {
        if !range.narrows(stats.documents_min, stats.documents_max) {
            filter.document_range = None;
        }
    }
    if let Some(range) = filter.span_range {
        if !range.narrows(stats.span_min, stats.span_max) {
            filter.span_range = None;
        }
    }
    if let Some(range) = filter.score_range {
        if !range.narrows(0, 100) {
            filter.score_range = None;
        }
    }
}

async fn export(filter: &mut SiteFilter) -> Result<String, DatabaseError> {
    let state = web_state();
    let stats = cached_summary_stats().await?;
    normalize_ranges(filter, &stats);
    let rows = state
        .db
        .site_store()
        .overview_page(filter, state.config.limits.export_limit, 0)
        .await?;
    let csv_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                row.site_id.clone(),
                csv::opt(row.site_name.as_deref()),
                csv::opt(row.site_address.as_deref()),
                row.total_documents.to_string(),
                row.total_contaminants.to_string(),
                csv::flag(row.has_documents),
                csv::flag(row.has_contaminants),
                csv::opt(row.scrape_status.as_deref()),
                csv::opt(row.status_icon.as_deref()),
            ]
        })
        .collect();
    Ok(csv::to_csv(
        &[
            "site_id",
            "site_name",
            "site_address",
            "total_documents",
            "total_contaminants",
            "has_documents",
            "has_contaminants",
            "scrape_status",
            "status_icon",
        ],
        &csv_rows,
    ))
}

async fn build(filter: &mut SiteFilter, requested_page: i64) -> Result<String, DatabaseError> {
    let state = web_state();
    let stats = cached_summary_stats().await?;
    normalize_ranges(filter, &stats);

    let tiers = cached_tiers().await?;
    let medium_statuses = cached_medium_statuses(&filter.media).await?;
    let historical = cached_historical_use().await?;
    let batches = cached_batches().await?;

    let site_store = state.db.site_store();
    let metrics = site_store.overview_metrics(filter).await?;
    let docs = site_store.document_metrics(filter).await?;

    let page_size = state.config.limits.page_size;
    let total = site_store.count_overview(filter).await?;
    let pages = total_pages(total, page_size);
    let page = requested_page.min(pages);
    let rows = site_store
        .overview_page(filter, page_size, (page - 1) * page_size)
        .await?;

    let ids: Vec<String> = rows.iter().map(|row| row.site_id.clone()).collect();
    let scores: HashMap<String, SiteScore> = state
        .db
        .qualification_store()
        .score_map(&ids)
        .await?
        .into_iter()
        .map(|score| (score.site_id.clone(), score))
        .collect();
    let feedback: HashMap<String, i64> = state
        .db
        .feedback_store()
        .counts_for(&ids)
        .await?
        .into_iter()
        .collect();
    let historical_map: HashMap<String, Option<String>> =
        site_store.historical_use_map(&ids).await?.into_iter().collect();
    let age_map: HashMap<String, Option<i64>> =
        site_store.age_score_map(&ids).await?.into_iter().collect();

    let mut body = String::from("<h2>Site Search</h2>");
    body.push_str(&filter_form(
        &state.config,
        filter,
        &stats,
        &tiers,
        &medium_statuses,
        &historical,
        &batches,
    ));

    body.push_str(&render::metrics_row(&[
        ("Sites", render::group_count(metrics.total_sites)),
        ("w/ Narratives", render::group_count(metrics.sites_with_narratives)),
        ("w/ Documents", render::group_count(metrics.sites_with_documents)),
        ("Documents", render::group_count(docs.documents)),
        ("Downloaded", render::group_count(docs.downloaded)),
        ("Flagged for analysis", render::group_count(docs.flagged)),
    ]));

    let pairs = filter.to_query_pairs();
    let export_href = render::href_with_query(&state.config, "/search/export.csv", &pairs);
    body.push_str(&format!(
        "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{export}\">Download CSV</a>\
         <form method=\"post\" action=\"{refresh}\">\
         <button class=\"button secondary\" type=\"submit\">Refresh Data</button></form></div>",
        export = render::html_escape(&export_href),
        refresh = render::html_escape(&render::href(&state.config, "/refresh")),
    ));

    if rows.is_empty() {
        body.push_str(&render::info_box("No site overview data found."));
        return Ok(body);
    }

    let qualifier = state.config.qualifier.as_ref();
    let cooldown_remaining: Option<u64> = {
        let guard = state.process_cooldown.lock();
        (*guard).and_then(|until| {
            let now = Instant::now();
            (until > now).then(|| (until - now).as_secs())
        })
    };

    let mut headers = vec![
        "Site Detail",
        "Site ID",
        "Name",
        "Historical Use",
        "Last Processed",
        "Final Score",
        "Age Check Score",
        "Address",
        "Docs",
        "Contaminants",
        "Scrape Status",
        "Feedback",
    ];
    if qualifier.is_some() {
        headers.push("Report");
        headers.push("Process");
    }

    let mut table_rows: Vec<Vec<Cell>> = Vec::with_capacity(rows.len());
    for row in &rows {
        let score = scores.get(&row.site_id);
        let mut cells = vec![
            Cell::link(
                &render::href(&state.config, &format!("/sites/{}", row.site_id)),
                "Open",
            ),
            Cell::text(&row.site_id),
            Cell::opt(row.site_name.as_deref()),
            Cell::opt(
                historical_map
                    .get(&row.site_id)
                    .and_then(|v| v.as_deref()),
            ),
            Cell::opt(score.and_then(|s| s.last_processed.as_deref())),
            Cell::opt_num(score.and_then(|s| s.score)),
            Cell::opt_num(age_map.get(&row.site_id).copied().flatten()),
            Cell::opt(row.site_address.as_deref()),
            Cell::num(row.total_documents),
            Cell::num(row.total_contaminants),
            Cell::opt(row.scrape_status.as_deref()),
            match feedback.get(&row.site_id) {
                Some(count) if *count > 0 => Cell::link(
                    &render::href_with_query(
                        &state.config,
                        "/feedback",
                        &[("site_id", row.site_id.clone())],
                    ),
                    &format!("View ({count})"),
                ),
                _ => Cell::text(""),
            },
        ];
        if let Some(qualifier) = qualifier {
            let processed = score.map(|s| s.score.is_some()).unwrap_or(false);
            cells.push(if processed {
                Cell::external_link(&qualifier.report_url(&row.site_id), "Report")
            } else {
                Cell::text("")
            });
            cells.push(if processed {
                Cell::text("")
            } else if let Some(remaining) = cooldown_remaining {
                Cell::text(format!("Wait {}m {}s", remaining / 60, remaining % 60))
            } else {
                Cell::Html(format!(
                    "<form method=\"post\" action=\"{action}\">\
                     <button type=\"submit\">Process</button></form>",
                    action = render::html_escape(&render::href(
                        &state.config,
                        &format!("/sites/{}/process", row.site_id)
                    )),
                ))
            });
        }
        table_rows.push(cells);
    }

    body.push_str(&render::table(&headers, &table_rows));
    body.push_str(&render::pagination(
        &state.config,
        "/search",
        &pairs,
        page,
        pages,
        total,
    ));

    Ok(body)
}

fn filter_form(
    config: &crate::config::Config,
    filter: &SiteFilter,
    stats: &SummaryStats,
    tiers: &[String],
    medium_statuses: &[String],
    historical: &[String],
    batches: &[crate::db::models::BatchRun],
) -> String {
    let mut tier_options: Vec<(&str, &str)> = vec![("any", "Any")];
    for tier in tiers {
        tier_options.push((tier.as_str(), tier.as_str()));
    }
    let selected_tier = filter.tier.as_deref().unwrap_or("any");

    let mut medium_options = String::new();
    for medium in Medium::ALL {
        let marker = if filter.media.contains(&medium) {
            " selected"
        } else {
            ""
        };
        medium_options.push_str(&format!(
            "<option value=\"{}\"{marker}>{}</option>",
            medium.slug(),
            medium.label()
        ));
    }
    let medium_select =
        format!("<select name=\"medium\" multiple size=\"5\">{medium_options}</select>");

    let batch_names: Vec<String> = batches.iter().map(|b| b.batch_name.clone()).collect();

    let age_selected = match filter.age_check_score {
        Some(0) => "0",
        Some(50) => "50",
        _ => "any",
    };

    format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         {q}{doc_q}{has_docs}{has_narr}{processed}{tier}{age}\
         {medium}{medium_status}{historical}{batch}\
         {narr_min}{narr_max}{docs_min}{docs_max}{span_min}{span_max}{score_min}{score_max}\
         <button class=\"button\" type=\"submit\">Apply Filters</button>\
         <a class=\"button secondary\" href=\"{action}\">Reset</a>\
         </form>",
        action = render::html_escape(&render::href(config, "/search")),
        q = render::field(
            "Search (name, address, site_id)",
            &render::text_input("q", filter.search.as_deref(), "e.g. Harbor Mill"),
        ),
        doc_q = render::field(
            "Search by document name",
            &render::text_input("doc_q", filter.document_search.as_deref(), "e.g. Phase I"),
        ),
        has_docs = render::field("Has documents", &tri_select("has_docs", filter.has_documents)),
        has_narr = render::field("Has narrative", &tri_select("has_narr", filter.has_narrative)),
        processed = render::field(
            "Processed for qualification",
            &tri_select("processed", filter.processed),
        ),
        tier = render::field(
            "Qualification tier",
            &render::select("tier", &tier_options, selected_tier),
        ),
        age = render::field(
            "Age check score",
            &render::select(
                "age_check",
                &[("any", "All"), ("0", "0"), ("50", "50")],
                age_selected,
            ),
        ),
        medium = render::field("Contamination medium", &medium_select),
        medium_status = render::field(
            "Medium status",
            &render::multi_select("medium_status", medium_statuses, &filter.medium_statuses),
        ),
        historical = render::field(
            "Historical use category",
            &render::multi_select("historical_use", historical, &filter.historical_use),
        ),
        batch = render::field(
            "Batch name",
            &render::multi_select("batch", &batch_names, &filter.batches),
        ),
        narr_min = render::field(
            "Narratives ≥",
            &render::number_input(
                "narr_min",
                filter.narrative_range.map(|r| r.lo),
                stats.narrative_min,
            ),
        ),
        narr_max = render::field(
            "Narratives ≤",
            &render::number_input(
                "narr_max",
                filter.narrative_range.map(|r| r.hi),
                stats.narrative_max,
            ),
        ),
        docs_min = render::field(
            "Documents ≥",
            &render::number_input(
                "docs_min",
                filter.document_range.map(|r| r.lo),
                stats.documents_min,
            ),
        ),
        docs_max = render::field(
            "Documents ≤",
            &render::number_input(
                "docs_max",
                filter.document_range.map(|r| r.hi),
                stats.documents_max,
            ),
        ),
        span_min = render::field(
            "Year span ≥",
            &render::number_input("span_min", filter.span_range.map(|r| r.lo), stats.span_min),
        ),
        span_max = render::field(
            "Year span ≤",
            &render::number_input("span_max", filter.span_range.map(|r| r.hi), stats.span_max),
        ),
        score_min = render::field(
            "Score ≥",
            &render::number_input("score_min", filter.score_range.map(|r| r.lo), 0),
        ),
        score_max = render::field(
            "Score ≤",
            &render::number_input("score_max", filter.score_range.map(|r| r.hi), 100),
        ),
    )
}
