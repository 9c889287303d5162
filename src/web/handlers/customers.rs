use std::collections::HashMap;

use salvo::prelude::*;

use super::{
    cached_historical_use, page_param, query_i64, query_values, render_db_error, render_page,
    total_pages,
};
use crate::db::DatabaseError;
use crate::db::{CustomerStore, QualificationStore, SiteStore};
use crate::db::models::SiteScore;
use crate::filter::{CustomerFilter, IntRange};
use crate::web::render::{self, Cell};
use crate::web::{csv, web_state};

async fn filter_from_request(
    req: &mut Request,
) -> Result<(CustomerFilter, IntRange), DatabaseError> {
    let state = web_state();
    let (min, max) = state.db.customer_store().site_count_bounds().await?;
    let bounds = IntRange::new(min, max);
    let lo = query_i64(req, "sites_min").unwrap_or(bounds.lo);
    let hi = query_i64(req, "sites_max").unwrap_or(bounds.hi);
    let filter = CustomerFilter {
        sites_per_customer: IntRange::new(lo, hi),
        customers: query_values(req, "customer"),
        historical_use: query_values(req, "historical_use"),
    };
    Ok((filter, bounds))
}

fn filter_pairs(filter: &CustomerFilter, bounds: IntRange) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if filter.sites_per_customer.narrows(bounds.lo, bounds.hi) {
        pairs.push(("sites_min", filter.sites_per_customer.lo.to_string()));
        pairs.push(("sites_max", filter.sites_per_customer.hi.to_string()));
    }
    for customer in &filter.customers {
        pairs.push(("customer", customer.clone()));
    }
    for category in &filter.historical_use {
        pairs.push(("historical_use", category.clone()));
    }
    pairs
}

/// Stage indicator used on the opportunity column.
fn opportunity_label(name: Option<&str>, stage: Option<&str>) -> String {
    let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
        return String::new();
    };
    let marker = match stage {
        Some("Closed Lost") => "🔴 ",
        Some("Opportunity Won/Signed") => "🟢 ",
        _ => "🟡 ",
    };
    format!("{marker}{name}")
}

#[handler]
pub async fn customers_page(req: &mut Request, res: &mut Response) {
    let page = page_param(req);
    match filter_from_request(req).await {
        Ok((filter, bounds)) => match build(&filter, bounds, page).await {
            Ok(body) => render_page(res, "Customer Sites", "customers", None, &body),
            Err(err) => render_db_error(res, &err),
        },
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn customers_export(req: &mut Request, res: &mut Response) {
    let state = web_state();
    let result = match filter_from_request(req).await {
        Ok((filter, _)) => {
            state
                .db
                .customer_store()
                .page(&filter, state.config.limits.export_limit, 0)
                .await
        }
        Err(err) => Err(err),
    };
    match result {
        Ok(rows) => {
            let csv_rows: Vec<Vec<String>> = rows
                .iter()
                .map(|row| {
                    vec![
                        row.site_id.clone(),
                        csv::opt(row.county.as_deref()),
                        csv::opt(row.site_name.as_deref()),
                        csv::opt(row.site_address.as_deref()),
                        csv::opt(row.sfdc_lead_url.as_deref()),
                        csv::opt(row.site_status.as_deref()),
                        csv::opt(row.sfdc_opportunity_name.as_deref()),
                        csv::opt(row.box_case_name.as_deref()),
                        csv::opt(row.matched_via_contact.as_deref()),
                        csv::opt(row.matched_via_org.as_deref()),
                    ]
                })
                .collect();
            let data = csv::to_csv(
                &[
                    "site_id",
                    "county",
                    "site_name",
                    "site_address",
                    "sfdc_lead_url",
                    "site_status",
                    "sfdc_opportunity_name",
                    "box_case_name",
                    "matched_via_contact",
                    "matched_via_org",
                ],
                &csv_rows,
            );
            csv::send(res, "customer_sites.csv", data);
        }
        Err(err) => render_db_error(res, &err),
    }
}

async fn build(
    filter: &CustomerFilter,
    bounds: IntRange,
    requested_page: i64,
) -> Result<String, DatabaseError> {
    let state = web_state();
    let store = state.db.customer_store();

    let customers = store
        .customers(filter.sites_per_customer.lo, filter.sites_per_customer.hi)
        .await?;
    let historical = cached_historical_use().await?;

    let total = store.count(filter).await?;
    let page_size = state.config.limits.page_size;
    let pages = total_pages(total, page_size);
    let page = requested_page.min(pages);
    let rows = store
        .page(filter, page_size, (page - 1) * page_size)
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
    let age_checks: HashMap<String, (Option<i64>, Option<i64>)> = state
        .db
        .qualification_store()
        .age_check_map(&ids)
        .await?
        .into_iter()
        .map(|(site_id, score, confidence)| (site_id, (score, confidence)))
        .collect();
    let historical_map: HashMap<String, Option<String>> = state
        .db
        .site_store()
        .historical_use_map(&ids)
        .await?
        .into_iter()
        .collect();

    let mut body = String::from(
        "<h2>Customer Sites</h2>\
         <p>Filter sites by customer name and historical use category.</p>",
    );

    let customer_names: Vec<String> = customers
        .iter()
        .map(|c| c.box_case_name.clone())
        .collect();
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         {sites_min}{sites_max}{customer}{historical}\
         <button class=\"button\" type=\"submit\">Apply</button>\
         <a class=\"button secondary\" href=\"{action}\">Reset</a>\
         </form>",
        action = render::html_escape(&render::href(&state.config, "/customers")),
        sites_min = render::field(
            "Sites per customer ≥",
            &render::number_input("sites_min", Some(filter.sites_per_customer.lo), bounds.lo),
        ),
        sites_max = render::field(
            "Sites per customer ≤",
            &render::number_input("sites_max", Some(filter.sites_per_customer.hi), bounds.hi),
        ),
        customer = render::field(
            &format!("Customer name ({} customers)", customer_names.len()),
            &render::multi_select("customer", &customer_names, &filter.customers),
        ),
        historical = render::field(
            "Historical use category",
            &render::multi_select("historical_use", &historical, &filter.historical_use),
        ),
    ));

    body.push_str(&render::metrics_row(&[(
        "Total Sites",
        render::group_count(total),
    )]));

    if rows.is_empty() {
        body.push_str(&render::info_box("No sites found matching the filters."));
        return Ok(body);
    }

    let pairs = filter_pairs(filter, bounds);
    let export = render::href_with_query(&state.config, "/customers/export.csv", &pairs);
    body.push_str(&format!(
        "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{}\">Download CSV</a></div>",
        render::html_escape(&export)
    ));

    let qualifier = state.config.qualifier.as_ref();
    let mut headers = vec![
        "Site ID",
        "Site Detail",
        "County",
        "Site Status",
        "Box Customer",
        "SFDC Lead",
        "SFDC Opportunity",
        "Matched Via Contact",
        "Matched Via Org",
        "Name",
        "Address",
        "Historical Use",
        "Last Processed",
        "Final Score",
        "Age Check",
        "Age Confidence",
    ];
    if qualifier.is_some() {
        headers.insert(2, "Report");
    }

    let table_rows: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            let score = scores.get(&row.site_id);
            let (age_score, age_confidence) = age_checks
                .get(&row.site_id)
                .copied()
                .unwrap_or((None, None));
            let lead_cell = match row.sfdc_lead_url.as_deref().map(str::trim) {
                Some(url) if url.eq_ignore_ascii_case("IGNORE") => Cell::text("IGNORE"),
                Some(url) if !url.is_empty() => Cell::external_link(url, "Lead"),
                _ => Cell::text(""),
            };
            let mut cells = vec![
                Cell::text(&row.site_id),
                Cell::link(
                    &render::href(&state.config, &format!("/sites/{}", row.site_id)),
                    "Open",
                ),
                Cell::opt(row.county.as_deref()),
                Cell::opt(row.site_status.as_deref()),
                Cell::opt(row.box_case_name.as_deref()),
                lead_cell,
                Cell::text(opportunity_label(
                    row.sfdc_opportunity_name.as_deref(),
                    row.sfdc_opportunity_stage.as_deref(),
                )),
                Cell::opt(row.matched_via_contact.as_deref()),
                Cell::opt(row.matched_via_org.as_deref()),
                Cell::opt(row.site_name.as_deref()),
                Cell::opt(row.site_address.as_deref()),
                Cell::opt(
                    historical_map
                        .get(&row.site_id)
                        .and_then(|v| v.as_deref()),
                ),
                Cell::opt(score.and_then(|s| s.last_processed.as_deref())),
                Cell::opt_num(score.and_then(|s| s.score)),
                Cell::text(match age_score {
                    Some(50) => "Passed".to_string(),
                    Some(_) => "Failed".to_string(),
                    None => String::new(),
                }),
                Cell::text(
                    age_confidence
                        .filter(|v| *v > 0)
                        .map(|v| format!("{v}%"))
                        .unwrap_or_default(),
                ),
            ];
            if let Some(qualifier) = qualifier {
                let processed = score.map(|s| s.score.is_some()).unwrap_or(false);
                cells.insert(
                    2,
                    if processed {
                        Cell::external_link(&qualifier.report_url(&row.site_id), "Report")
                    } else {
                        Cell::text("")
                    },
                );
            }
            cells
        })
        .collect();
    body.push_str(&render::table(&headers, &table_rows));
    body.push_str(&render::pagination(
        &state.config,
        "/customers",
        &pairs,
        page,
        pages,
        total,
    ));

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::opportunity_label;

    #[test]
    fn opportunity_markers_follow_stage() {
        assert_eq!(
            opportunity_label(Some("Opp-1"), Some("Closed Lost")),
            "🔴 Opp-1"
        );
        assert_eq!(
            opportunity_label(Some("Opp-2"), Some("Opportunity Won/Signed")),
            "🟢 Opp-2"
        );
        assert_eq!(opportunity_label(Some("Opp-3"), Some("Negotiating")), "🟡 Opp-3");
        assert_eq!(opportunity_label(Some("Opp-4"), None), "🟡 Opp-4");
        assert_eq!(opportunity_label(None, Some("Closed Lost")), "");
        assert_eq!(opportunity_label(Some("  "), None), "");
    }
}
