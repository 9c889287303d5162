use salvo::prelude::*;

use super::{render_db_error, render_page, site_filter_from_request, tri_select};
use crate::db::DatabaseError;
use crate::db::SiteStore;
use crate::filter::SiteFilter;
use crate::web::render::{self, Cell};
use crate::web::{csv, web_state};

const EXPLORER_LIMIT: i64 = 3000;
const SCRAPE_STATUSES: &[(&str, &str)] = &[
    ("any", "Any"),
    ("success", "success"),
    ("failed", "failed"),
    ("pending", "pending"),
];

#[handler]
pub async fn explorer_page(req: &mut Request, res: &mut Response) {
    let filter = site_filter_from_request(req);
    match build(&filter).await {
        Ok(body) => render_page(res, "Sites Explorer", "explorer", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn explorer_export(req: &mut Request, res: &mut Response) {
    let filter = site_filter_from_request(req);
    let state = web_state();
    match state
        .db
        .site_store()
        .overview_page(&filter, state.config.limits.export_limit, 0)
        .await
    {
        Ok(rows) => {
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
            let data = csv::to_csv(
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
            );
            csv::send(res, "sites_export.csv", data);
        }
        Err(err) => render_db_error(res, &err),
    }
}

async fn build(filter: &SiteFilter) -> Result<String, DatabaseError> {
    let state = web_state();
    let rows = state
        .db
        .site_store()
        .overview_page(filter, EXPLORER_LIMIT, 0)
        .await?;

    let mut body = String::from("<h2>Sites Explorer</h2>");
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         {q}{doc_q}{has_docs}{has_cont}{status}\
         <button class=\"button\" type=\"submit\">Apply</button>\
         <a class=\"button secondary\" href=\"{action}\">Reset</a>\
         </form>",
        action = render::html_escape(&render::href(&state.config, "/explorer")),
        q = render::field(
            "Search (name, address, site_id)",
            &render::text_input("q", filter.search.as_deref(), ""),
        ),
        doc_q = render::field(
            "Search by document name",
            &render::text_input("doc_q", filter.document_search.as_deref(), ""),
        ),
        has_docs = render::field("Has documents", &tri_select("has_docs", filter.has_documents)),
        has_cont = render::field(
            "Has contaminants",
            &tri_select("has_cont", filter.has_contaminants),
        ),
        status = render::field(
            "Scrape status",
            &render::select(
                "scrape_status",
                SCRAPE_STATUSES,
                filter.scrape_status.as_deref().unwrap_or("any"),
            ),
        ),
    ));

    body.push_str(&format!("<p>Results: {}</p>", render::group_count(rows.len() as i64)));

    if rows.is_empty() {
        body.push_str(&render::info_box("No sites match the current filters."));
        return Ok(body);
    }

    let pairs = filter.to_query_pairs();
    let export = render::href_with_query(&state.config, "/explorer/export.csv", &pairs);
    body.push_str(&format!(
        "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{}\">Download CSV</a></div>",
        render::html_escape(&export)
    ));

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
                Cell::flag(row.has_documents),
                Cell::flag(row.has_contaminants),
                Cell::opt(row.scrape_status.as_deref()),
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
            "Has Docs",
            "Has Contaminants",
            "Scrape Status",
        ],
        &table_rows,
    ));

    Ok(body)
}
