use salvo::prelude::*;

use super::{query_string, render_db_error, render_page};
use crate::db::DatabaseError;
use crate::db::SiteStore;
use crate::db::models::ExcludedSiteRow;
use crate::web::render::{self, Cell};
use crate::web::{csv, web_state};

/// Case-insensitive contains over id, name, address, and matched org.
fn matches_search(row: &ExcludedSiteRow, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    let hit = |value: Option<&str>| {
        value
            .map(|v| v.to_lowercase().contains(&needle))
            .unwrap_or(false)
    };
    row.site_id.to_lowercase().contains(&needle)
        || hit(row.site_name.as_deref())
        || hit(row.site_address.as_deref())
        || hit(row.matched_org.as_deref())
}

fn apply_search(rows: Vec<ExcludedSiteRow>, search: Option<&str>) -> Vec<ExcludedSiteRow> {
    match search {
        Some(needle) if !needle.is_empty() => rows
            .into_iter()
            .filter(|row| matches_search(row, needle))
            .collect(),
        _ => rows,
    }
}

fn excluded_csv(rows: &[ExcludedSiteRow], with_org: bool) -> String {
    let csv_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let mut fields = vec![
                row.site_id.clone(),
                csv::opt(row.site_name.as_deref()),
                csv::opt(row.site_address.as_deref()),
            ];
            if with_org {
                fields.push(csv::opt(row.matched_org.as_deref()));
            }
            fields
        })
        .collect();
    let headers: &[&str] = if with_org {
        &["site_id", "site_name", "site_address", "matched_org"]
    } else {
        &["site_id", "site_name", "site_address"]
    };
    csv::to_csv(headers, &csv_rows)
}

#[handler]
pub async fn filtered_out_page(req: &mut Request, res: &mut Response) {
    let search = query_string(req, "q");
    match build(search.as_deref()).await {
        Ok(body) => render_page(res, "Filtered-Out Sites", "filtered-out", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn tribal_export(req: &mut Request, res: &mut Response) {
    let search = query_string(req, "q");
    let state = web_state();
    match state
        .db
        .site_store()
        .tribal_sites(state.config.limits.export_limit)
        .await
    {
        Ok(rows) => {
            let rows = apply_search(rows, search.as_deref());
            csv::send(res, "filtered_tribal.csv", excluded_csv(&rows, false));
        }
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn dnc_export(req: &mut Request, res: &mut Response) {
    let search = query_string(req, "q");
    let state = web_state();
    match state
        .db
        .site_store()
        .dnc_sites(state.config.limits.export_limit)
        .await
    {
        Ok(rows) => {
            let rows = apply_search(rows, search.as_deref());
            csv::send(res, "filtered_dnc.csv", excluded_csv(&rows, true));
        }
        Err(err) => render_db_error(res, &err),
    }
}

fn excluded_table(config: &crate::config::Config, rows: &[ExcludedSiteRow], with_org: bool) -> String {
    if rows.is_empty() {
        return render::info_box("No sites in this list.");
    }
    let table_rows: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                Cell::link(
                    &render::href(config, &format!("/sites/{}", row.site_id)),
                    &row.site_id,
                ),
                Cell::opt(row.site_name.as_deref()),
                Cell::opt(row.site_address.as_deref()),
            ];
            if with_org {
                cells.push(Cell::opt(row.matched_org.as_deref()));
            }
            cells
        })
        .collect();
    let headers: &[&str] = if with_org {
        &["Site", "Name", "Address", "Matched Org"]
    } else {
        &["Site", "Name", "Address"]
    };
    render::table(headers, &table_rows)
}

async fn build(search: Option<&str>) -> Result<String, DatabaseError> {
    let state = web_state();
    let limit = state.config.limits.options_limit;
    let tribal = apply_search(state.db.site_store().tribal_sites(limit).await?, search);
    let dnc = apply_search(state.db.site_store().dnc_sites(limit).await?, search);

    let mut body = String::from(
        "<h2>Filtered-Out Sites</h2>\
         <p>Sites excluded from prospecting due to tribal relation or Do-Not-Contact policy.</p>",
    );
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         {q}<button class=\"button\" type=\"submit\">Search</button></form>",
        action = render::html_escape(&render::href(&state.config, "/filtered-out")),
        q = render::field(
            "Search (site id, name, address)",
            &render::text_input("q", search, ""),
        ),
    ));

    let mut pairs: Vec<(&str, String)> = Vec::new();
    if let Some(q) = search {
        pairs.push(("q", q.to_string()));
    }

    body.push_str(&format!(
        "<h3>Tribal-Related ({})</h3>",
        render::group_count(tribal.len() as i64)
    ));
    body.push_str(&excluded_table(&state.config, &tribal, false));
    if !tribal.is_empty() {
        body.push_str(&format!(
            "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{}\">Download CSV (Tribal)</a></div>",
            render::html_escape(&render::href_with_query(
                &state.config,
                "/filtered-out/tribal.csv",
                &pairs
            ))
        ));
    }

    body.push_str(&format!(
        "<h3>Do Not Contact ({})</h3>",
        render::group_count(dnc.len() as i64)
    ));
    body.push_str(&excluded_table(&state.config, &dnc, true));
    if !dnc.is_empty() {
        body.push_str(&format!(
            "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{}\">Download CSV (DNC)</a></div>",
            render::html_escape(&render::href_with_query(
                &state.config,
                "/filtered-out/dnc.csv",
                &pairs
            ))
        ));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(site_id: &str, name: Option<&str>, org: Option<&str>) -> ExcludedSiteRow {
        ExcludedSiteRow {
            site_id: site_id.to_string(),
            site_name: name.map(|s| s.to_string()),
            site_address: None,
            matched_org: org.map(|s| s.to_string()),
        }
    }

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let rows = vec![
            row("101", Some("Harbor Mill"), None),
            row("202", Some("Green Field"), Some("ACME Corp")),
        ];
        let hits = apply_search(rows.clone(), Some("harbor"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].site_id, "101");

        let hits = apply_search(rows.clone(), Some("acme"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].site_id, "202");

        let hits = apply_search(rows, None);
        assert_eq!(hits.len(), 2);
    }
}
