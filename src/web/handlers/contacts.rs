use std::collections::{HashMap, HashSet};

use salvo::prelude::*;

use super::{
    cached_contact_roles, cached_contact_stats, cached_contact_types, query_f64, query_i64,
    query_string, query_tri, query_values, render_db_error, render_page, tri_select,
};
use crate::db::DatabaseError;
use crate::db::{ContactStore, QualificationStore};
use crate::db::models::ContactStats;
use crate::filter::{ContactFilter, IntRange};
use crate::web::render::{self, Cell};
use crate::web::{csv, web_state};

async fn filter_from_request(req: &mut Request) -> Result<ContactFilter, DatabaseError> {
    let stats = cached_contact_stats().await?;
    let mut filter = ContactFilter {
        search: query_string(req, "q"),
        site_ids: query_values(req, "site"),
        roles: query_values(req, "role"),
        types: query_values(req, "type"),
        primary_prospect: query_tri(req, "primary"),
        qualified: query_tri(req, "qualified"),
        confidence_range: None,
        priority_range: None,
    };

    if let (Some(lo), Some(hi)) = (query_f64(req, "conf_min"), query_f64(req, "conf_max")) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        if lo > stats.confidence_min || hi < stats.confidence_max {
            filter.confidence_range = Some((lo, hi));
        }
    }
    if let (Some(lo), Some(hi)) = (query_i64(req, "prio_min"), query_i64(req, "prio_max")) {
        let range = IntRange::new(lo, hi);
        if range.narrows(stats.priority_min, stats.priority_max) {
            filter.priority_range = Some(range);
        }
    }

    Ok(filter)
}

fn filter_pairs(filter: &ContactFilter) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(q) = &filter.search {
        pairs.push(("q", q.clone()));
    }
    for site in &filter.site_ids {
        pairs.push(("site", site.clone()));
    }
    for role in &filter.roles {
        pairs.push(("role", role.clone()));
    }
    for kind in &filter.types {
        pairs.push(("type", kind.clone()));
    }
    if let Some(value) = filter.primary_prospect.query_value() {
        pairs.push(("primary", value.to_string()));
    }
    if let Some(value) = filter.qualified.query_value() {
        pairs.push(("qualified", value.to_string()));
    }
    if let Some((lo, hi)) = filter.confidence_range {
        pairs.push(("conf_min", lo.to_string()));
        pairs.push(("conf_max", hi.to_string()));
    }
    if let Some(range) = filter.priority_range {
        pairs.push(("prio_min", range.lo.to_string()));
        pairs.push(("prio_max", range.hi.to_string()));
    }
    pairs
}

#[handler]
pub async fn contacts_page(req: &mut Request, res: &mut Response) {
    match filter_from_request(req).await {
        Ok(filter) => match build(&filter).await {
            Ok(body) => render_page(res, "Contacts", "contacts", None, &body),
            Err(err) => render_db_error(res, &err),
        },
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn contacts_export(req: &mut Request, res: &mut Response) {
    let state = web_state();
    let result = match filter_from_request(req).await {
        Ok(filter) => {
            state
                .db
                .contact_store()
                .rows(&filter, state.config.limits.export_limit)
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
                        csv::opt(row.site_name.as_deref()),
                        csv::opt(row.contact_name.as_deref()),
                        csv::opt(row.organization_name.as_deref()),
                        csv::opt(row.contact_address.as_deref()),
                        csv::opt(row.phone.as_deref()),
                        csv::opt(row.email.as_deref()),
                        csv::opt(row.contact_type.as_deref()),
                        csv::opt(row.contact_role.as_deref()),
                        csv::flag(row.is_primary_prospect),
                        csv::opt_num(row.prospect_priority),
                        row.confidence_score
                            .map(|v| v.to_string())
                            .unwrap_or_default(),
                        csv::opt(row.site_url.as_deref()),
                    ]
                })
                .collect();
            let data = csv::to_csv(
                &[
                    "site_id",
                    "site_name",
                    "contact_name",
                    "organization_name",
                    "contact_address",
                    "phone",
                    "email",
                    "contact_type",
                    "contact_role",
                    "is_primary_prospect",
                    "prospect_priority",
                    "confidence_score",
                    "site_url",
                ],
                &csv_rows,
            );
            csv::send(res, "contacts_export.csv", data);
        }
        Err(err) => render_db_error(res, &err),
    }
}

async fn build(filter: &ContactFilter) -> Result<String, DatabaseError> {
    let state = web_state();
    let stats: ContactStats = cached_contact_stats().await?;
    let roles = cached_contact_roles().await?;
    let types = cached_contact_types().await?;
    let site_options = state.db.contact_store().site_options().await?;
    let rows = state
        .db
        .contact_store()
        .rows(filter, state.config.limits.options_limit)
        .await?;

    let qualifier = state.config.qualifier.as_ref();
    let mut scores: HashMap<String, Option<i64>> = HashMap::new();
    if qualifier.is_some() && !rows.is_empty() {
        let unique_ids: Vec<String> = rows
            .iter()
            .map(|row| row.site_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        scores = state
            .db
            .qualification_store()
            .score_map(&unique_ids)
            .await?
            .into_iter()
            .map(|s| (s.site_id, s.score))
            .collect();
    }

    let mut body = String::from(
        "<h2>Contacts</h2>\
         <p>Summarized contacts detected during qualification, prioritized by confidence.</p>",
    );

    let site_values: Vec<String> = site_options.iter().map(|o| o.site_id.clone()).collect();
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         {q}{site}{role}{kind}{primary}{qualified}\
         {conf_min}{conf_max}{prio_min}{prio_max}\
         <button class=\"button\" type=\"submit\">Apply</button>\
         <a class=\"button secondary\" href=\"{action}\">Reset</a>\
         </form>",
        action = render::html_escape(&render::href(&state.config, "/contacts")),
        q = render::field(
            "Search (site, contact, org, email, phone)",
            &render::text_input("q", filter.search.as_deref(), ""),
        ),
        site = render::field(
            "Sites",
            &render::multi_select("site", &site_values, &filter.site_ids),
        ),
        role = render::field(
            "Contact role",
            &render::multi_select("role", &roles, &filter.roles),
        ),
        kind = render::field(
            "Contact type",
            &render::multi_select("type", &types, &filter.types),
        ),
        primary = render::field(
            "Primary prospect",
            &tri_select("primary", filter.primary_prospect),
        ),
        qualified = render::field("Qualified", &tri_select("qualified", filter.qualified)),
        conf_min = render::field(
            &format!("Confidence ≥ (min {:.2})", stats.confidence_min),
            &render::text_input(
                "conf_min",
                filter
                    .confidence_range
                    .map(|(lo, _)| lo.to_string())
                    .as_deref(),
                "",
            ),
        ),
        conf_max = render::field(
            &format!("Confidence ≤ (max {:.2})", stats.confidence_max),
            &render::text_input(
                "conf_max",
                filter
                    .confidence_range
                    .map(|(_, hi)| hi.to_string())
                    .as_deref(),
                "",
            ),
        ),
        prio_min = render::field(
            "Priority ≥",
            &render::number_input(
                "prio_min",
                filter.priority_range.map(|r| r.lo),
                stats.priority_min,
            ),
        ),
        prio_max = render::field(
            "Priority ≤",
            &render::number_input(
                "prio_max",
                filter.priority_range.map(|r| r.hi),
                stats.priority_max,
            ),
        ),
    ));

    body.push_str(&format!("<p>Results: {}</p>", render::group_count(rows.len() as i64)));
    if rows.is_empty() {
        body.push_str(&render::info_box("No contacts match the current filters."));
        return Ok(body);
    }

    let export = render::href_with_query(
        &state.config,
        "/contacts/export.csv",
        &filter_pairs(filter),
    );
    body.push_str(&format!(
        "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{}\">Download CSV</a></div>",
        render::html_escape(&export)
    ));

    let mut headers = vec![
        "Site",
        "Site Detail",
        "Site Name",
        "Contact",
        "Organization",
        "Address",
        "Phone",
        "Email",
        "Type",
        "Role",
        "Primary",
        "Priority",
        "Confidence",
    ];
    if qualifier.is_some() {
        headers.insert(2, "Report");
    }

    let table_rows: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                Cell::text(&row.site_id),
                Cell::link(
                    &render::href(&state.config, &format!("/sites/{}", row.site_id)),
                    "Open",
                ),
                Cell::opt(row.site_name.as_deref()),
                Cell::opt(row.contact_name.as_deref()),
                Cell::opt(row.organization_name.as_deref()),
                Cell::opt(row.contact_address.as_deref()),
                Cell::opt(row.phone.as_deref()),
                Cell::opt(row.email.as_deref()),
                Cell::opt(row.contact_type.as_deref()),
                Cell::opt(row.contact_role.as_deref()),
                Cell::flag(row.is_primary_prospect),
                Cell::opt_num(row.prospect_priority),
                Cell::text(
                    row.confidence_score
                        .map(|v| format!("{v:.2}"))
                        .unwrap_or_default(),
                ),
            ];
            if let Some(qualifier) = qualifier {
                let processed = scores
                    .get(&row.site_id)
                    .map(|s| s.is_some())
                    .unwrap_or(false);
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

    Ok(body)
}
