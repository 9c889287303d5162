use salvo::prelude::*;

use super::{
    cached_document_categories, cached_download_statuses, query_string, query_values,
    render_db_error, render_page,
};
use crate::db::DatabaseError;
use crate::db::DocumentStore;
use crate::filter::DocumentFilter;
use crate::web::render::{self, Cell};
use crate::web::{csv, web_state};

fn filter_from_request(req: &mut Request) -> DocumentFilter {
    DocumentFilter {
        categories: query_values(req, "category"),
        statuses: query_values(req, "status"),
        year: query_string(req, "year"),
    }
}

fn filter_pairs(filter: &DocumentFilter) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    for category in &filter.categories {
        pairs.push(("category", category.clone()));
    }
    for status in &filter.statuses {
        pairs.push(("status", status.clone()));
    }
    if let Some(year) = &filter.year {
        pairs.push(("year", year.clone()));
    }
    pairs
}

#[handler]
pub async fn documents_page(req: &mut Request, res: &mut Response) {
    let filter = filter_from_request(req);
    match build(&filter).await {
        Ok(body) => render_page(res, "Documents", "documents", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn documents_export(req: &mut Request, res: &mut Response) {
    let filter = filter_from_request(req);
    let state = web_state();
    match state
        .db
        .document_store()
        .documents(&filter, state.config.limits.export_limit)
        .await
    {
        Ok(rows) => {
            let csv_rows: Vec<Vec<String>> = rows
                .iter()
                .map(|doc| {
                    vec![
                        doc.id.to_string(),
                        csv::opt(doc.site_id.as_deref()),
                        csv::opt(doc.document_category.as_deref()),
                        csv::opt(doc.document_title.as_deref()),
                        csv::opt(doc.document_date.as_deref()),
                        csv::opt(doc.document_type.as_deref()),
                        csv::opt(doc.document_url.as_deref()),
                        csv::opt(doc.download_status.as_deref()),
                        csv::flag(doc.flagged_for_analysis),
                        csv::opt(doc.file_extension.as_deref()),
                        csv::opt_num(doc.file_size_bytes),
                    ]
                })
                .collect();
            let data = csv::to_csv(
                &[
                    "id",
                    "site_id",
                    "document_category",
                    "document_title",
                    "document_date",
                    "document_type",
                    "document_url",
                    "download_status",
                    "flagged_for_analysis",
                    "file_extension",
                    "file_size_bytes",
                ],
                &csv_rows,
            );
            csv::send(res, "documents_export.csv", data);
        }
        Err(err) => render_db_error(res, &err),
    }
}

async fn build(filter: &DocumentFilter) -> Result<String, DatabaseError> {
    let state = web_state();
    let categories = cached_document_categories().await?;
    let statuses = cached_download_statuses().await?;
    let rows = state
        .db
        .document_store()
        .documents(filter, state.config.limits.options_limit)
        .await?;

    let mut body = String::from(
        "<h2>Documents</h2><p>Explore documents by category, date, and status.</p>",
    );
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         {category}{status}{year}\
         <button class=\"button\" type=\"submit\">Apply</button>\
         <a class=\"button secondary\" href=\"{action}\">Reset</a>\
         </form>",
        action = render::html_escape(&render::href(&state.config, "/documents")),
        category = render::field(
            "Category",
            &render::multi_select("category", &categories, &filter.categories),
        ),
        status = render::field(
            "Download status",
            &render::multi_select("status", &statuses, &filter.statuses),
        ),
        year = render::field(
            "Year contains (e.g. 2018)",
            &render::text_input("year", filter.year.as_deref(), ""),
        ),
    ));

    body.push_str(&format!("<p>Results: {}</p>", render::group_count(rows.len() as i64)));
    if rows.is_empty() {
        body.push_str(&render::info_box("No documents match the current filters."));
        return Ok(body);
    }

    let export = render::href_with_query(
        &state.config,
        "/documents/export.csv",
        &filter_pairs(filter),
    );
    body.push_str(&format!(
        "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{}\">Download CSV</a></div>",
        render::html_escape(&export)
    ));

    let table_rows: Vec<Vec<Cell>> = rows
        .iter()
        .map(|doc| {
            let title = doc.document_title.as_deref().unwrap_or("");
            let title_cell = match doc.document_url.as_deref().filter(|u| !u.trim().is_empty()) {
                Some(url) => Cell::external_link(url, title),
                None => Cell::text(title),
            };
            let site_cell = match doc.site_id.as_deref() {
                Some(site_id) => Cell::link(
                    &render::href(&state.config, &format!("/sites/{site_id}")),
                    site_id,
                ),
                None => Cell::text(""),
            };
            vec![
                Cell::num(doc.id),
                site_cell,
                Cell::opt(doc.document_category.as_deref()),
                title_cell,
                Cell::opt(doc.document_date.as_deref()),
                Cell::opt(doc.document_type.as_deref()),
                Cell::opt(doc.download_status.as_deref()),
                Cell::flag(doc.flagged_for_analysis),
                Cell::opt(doc.file_extension.as_deref()),
                Cell::opt_num(doc.file_size_bytes),
            ]
        })
        .collect();
    body.push_str(&render::table(
        &[
            "ID",
            "Site",
            "Category",
            "Document Title",
            "Date",
            "Type",
            "Download Status",
            "Flagged",
            "Ext",
            "Size (bytes)",
        ],
        &table_rows,
    ));

    Ok(body)
}
