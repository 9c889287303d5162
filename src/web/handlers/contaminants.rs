use salvo::prelude::*;

use super::{query_string, render_db_error, render_page};
use crate::db::DatabaseError;
use crate::db::ContaminantStore;
use crate::filter::SiteFilter;
use crate::web::render::{self, Cell};
use crate::web::{csv, web_state};

#[handler]
pub async fn contaminants_page(req: &mut Request, res: &mut Response) {
    let site_id = query_string(req, "site_id");
    match build(site_id.as_deref()).await {
        Ok(body) => render_page(res, "Contaminants", "contaminants", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn contaminants_export(req: &mut Request, res: &mut Response) {
    let site_id = query_string(req, "site_id");
    let state = web_state();
    match state
        .db
        .contaminant_store()
        .rows(site_id.as_deref(), state.config.limits.export_limit)
        .await
    {
        Ok(rows) => {
            let csv_rows: Vec<Vec<String>> = rows
                .iter()
                .map(|row| {
                    vec![
                        csv::opt(row.site_id.as_deref()),
                        csv::opt(row.contaminant_type.as_deref()),
                        csv::opt(row.soil_status.as_deref()),
                        csv::opt(row.groundwater_status.as_deref()),
                        csv::opt(row.surface_water_status.as_deref()),
                        csv::opt(row.air_status.as_deref()),
                        csv::opt(row.sediment_status.as_deref()),
                        csv::opt(row.bedrock_status.as_deref()),
                    ]
                })
                .collect();
            let data = csv::to_csv(
                &[
                    "site_id",
                    "contaminant_type",
                    "soil_status",
                    "groundwater_status",
                    "surface_water_status",
                    "air_status",
                    "sediment_status",
                    "bedrock_status",
                ],
                &csv_rows,
            );
            csv::send(res, "contaminants_export.csv", data);
        }
        Err(err) => render_db_error(res, &err),
    }
}

async fn build(site_id: Option<&str>) -> Result<String, DatabaseError> {
    let state = web_state();
    let top = state
        .db
        .contaminant_store()
        .top_contaminants(&SiteFilter::default(), 30)
        .await?;
    let rows = state
        .db
        .contaminant_store()
        .rows(site_id, state.config.limits.options_limit)
        .await?;

    let mut body = String::from(
        "<h2>Contaminants</h2><p>Top contaminant types and per-site details.</p>",
    );

    let top_rows: Vec<(String, i64)> = top
        .into_iter()
        .map(|c| (c.contaminant_type, c.count))
        .collect();
    if top_rows.is_empty() {
        body.push_str(&render::info_box("No contaminants found."));
    } else {
        body.push_str(&render::bar_chart("Top Contaminant Types", &top_rows));
    }

    body.push_str("<h3>Per-site contaminants</h3>");
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         {site}<button class=\"button\" type=\"submit\">Apply</button>\
         <a class=\"button secondary\" href=\"{action}\">Reset</a></form>",
        action = render::html_escape(&render::href(&state.config, "/contaminants")),
        site = render::field(
            "Filter by site id (optional)",
            &render::text_input("site_id", site_id, ""),
        ),
    ));

    if rows.is_empty() {
        body.push_str(&render::info_box("No contaminant rows match."));
        return Ok(body);
    }

    let mut pairs: Vec<(&str, String)> = Vec::new();
    if let Some(site_id) = site_id {
        pairs.push(("site_id", site_id.to_string()));
    }
    let export = render::href_with_query(&state.config, "/contaminants/export.csv", &pairs);
    body.push_str(&format!(
        "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{}\">Download CSV</a></div>",
        render::html_escape(&export)
    ));

    let table_rows: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            let site_cell = match row.site_id.as_deref() {
                Some(id) => Cell::link(
                    &render::href(&state.config, &format!("/sites/{id}")),
                    id,
                ),
                None => Cell::text(""),
            };
            vec![
                site_cell,
                Cell::opt(row.contaminant_type.as_deref()),
                Cell::opt(row.soil_status.as_deref()),
                Cell::opt(row.groundwater_status.as_deref()),
                Cell::opt(row.surface_water_status.as_deref()),
                Cell::opt(row.air_status.as_deref()),
                Cell::opt(row.sediment_status.as_deref()),
                Cell::opt(row.bedrock_status.as_deref()),
            ]
        })
        .collect();
    body.push_str(&render::table(
        &[
            "Site",
            "Contaminant",
            "Soil",
            "Groundwater",
            "Surface Water",
            "Air",
            "Sediment",
            "Bedrock",
        ],
        &table_rows,
    ));

    Ok(body)
}
