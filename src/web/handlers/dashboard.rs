use salvo::prelude::*;

use super::{page_param, render_db_error, render_page, total_pages};
use crate::db::DatabaseError;
use crate::db::{ContaminantStore, QualificationStore, SiteStore};
use crate::filter::SiteFilter;
use crate::web::render::{self, Cell};
use crate::web::web_state;

#[handler]
pub async fn dashboard(req: &mut Request, res: &mut Response) {
    let page = page_param(req);
    match build(page).await {
        Ok(body) => render_page(res, "Overview", "dashboard", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

async fn build(requested_page: i64) -> Result<String, DatabaseError> {
    let state = web_state();
    let filter = SiteFilter::default();
    let site_store = state.db.site_store();

    let metrics = site_store.overview_metrics(&filter).await?;
    let docs = site_store.document_metrics(&filter).await?;
    let tiers = state.db.qualification_store().tier_breakdown(&filter).await?;
    let top = state
        .db
        .contaminant_store()
        .top_contaminants(&filter, 20)
        .await?;

    let page_size = state.config.limits.page_size;
    let total = site_store.count_overview(&filter).await?;
    let pages = total_pages(total, page_size);
    let page = requested_page.min(pages);
    let rows = site_store
        .overview_page(&filter, page_size, (page - 1) * page_size)
        .await?;

    let mut body = String::from("<h2>Overview</h2>");
    body.push_str(&render::metrics_row(&[
        ("Total Sites", render::group_count(metrics.total_sites)),
        (
            "Sites w/ Narratives",
            render::group_count(metrics.sites_with_narratives),
        ),
        (
            "Sites w/ Documents",
            render::group_count(metrics.sites_with_documents),
        ),
        ("Qualified Sites", render::group_count(metrics.qualified_sites)),
    ]));

    let tier_rows: Vec<(String, i64)> =
        tiers.into_iter().map(|t| (t.tier, t.count)).collect();
    if tier_rows.is_empty() {
        body.push_str(&render::info_box("No qualification results found."));
    } else {
        body.push_str(&render::bar_chart("Qualification Tiers", &tier_rows));
    }

    let top_rows: Vec<(String, i64)> = top
        .into_iter()
        .map(|c| (c.contaminant_type, c.count))
        .collect();
    if top_rows.is_empty() {
        body.push_str(&render::info_box("No contaminants found."));
    } else {
        body.push_str(&render::bar_chart("Top 20 Contaminant Types", &top_rows));
    }

    body.push_str("<h3>Documents Summary</h3>");
    body.push_str(&render::metrics_row(&[
        ("Documents", render::group_count(docs.documents)),
        ("Downloaded", render::group_count(docs.downloaded)),
        ("Flagged", render::group_count(docs.flagged)),
    ]));

    body.push_str("<h3>Recent Site Overview</h3>");
    if rows.is_empty() {
        body.push_str(&render::info_box("No site overview data found."));
    } else {
        let table_rows: Vec<Vec<Cell>> = rows
            .iter()
            .map(|row| {
                vec![
                    Cell::link(
                        &render::href(&state.config, &format!("/sites/{}", row.site_id)),
                        "Open",
                    ),
                    Cell::text(&row.site_id),
                    Cell::opt(row.site_name.as_deref()),
                    Cell::opt(row.site_address.as_deref()),
                    Cell::num(row.total_documents),
                    Cell::num(row.total_contaminants),
                    Cell::opt(row.scrape_status.as_deref()),
                    Cell::opt(row.status_icon.as_deref()),
                ]
            })
            .collect();
        body.push_str(&render::table(
            &[
                "Site Detail",
                "Site ID",
                "Name",
                "Address",
                "Documents",
                "Contaminants",
                "Scrape Status",
                "Status",
            ],
            &table_rows,
        ));
        body.push_str(&render::pagination(
            &state.config,
            "/",
            &[],
            page,
            pages,
            total,
        ));
    }

    Ok(body)
}
