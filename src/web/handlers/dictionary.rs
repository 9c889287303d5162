use salvo::prelude::*;

use super::{query_string, render_db_error, render_page};
use crate::db::DatabaseError;
use crate::db::SchemaStore;
use crate::web::render::{self, Cell};
use crate::web::web_state;

const SAMPLE_ROWS: i64 = 100;

#[handler]
pub async fn dictionary_page(req: &mut Request, res: &mut Response) {
    let table = query_string(req, "table");
    match build(table.as_deref()).await {
        Ok(body) => render_page(res, "Data Dictionary", "dictionary", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

async fn build(requested: Option<&str>) -> Result<String, DatabaseError> {
    let state = web_state();
    let catalog = state.db.schema_store().catalog().await?;

    let mut body = String::from(
        "<h2>Data Dictionary</h2>\
         <p>Inspect tables and views, columns, and sample rows.</p>",
    );

    if catalog.is_empty() {
        body.push_str(&render::info_box("The database contains no tables."));
        return Ok(body);
    }

    // Only catalog names may be queried; anything else is ignored.
    let selected = requested
        .and_then(|name| catalog.iter().find(|entry| entry.name == name))
        .unwrap_or(&catalog[0]);

    let options: Vec<(&str, String)> = catalog
        .iter()
        .map(|entry| (entry.name.as_str(), format!("{} ({})", entry.name, entry.kind)))
        .collect();
    let mut rendered_options = String::new();
    for (value, label) in &options {
        let marker = if *value == selected.name { " selected" } else { "" };
        rendered_options.push_str(&format!(
            "<option value=\"{}\"{marker}>{}</option>",
            render::html_escape(value),
            render::html_escape(label)
        ));
    }
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         <label class=\"field\"><span>Select a table or view</span>\
         <select name=\"table\">{rendered_options}</select></label>\
         <button class=\"button\" type=\"submit\">Inspect</button></form>",
        action = render::html_escape(&render::href(&state.config, "/dictionary")),
    ));

    let columns = state.db.schema_store().columns(&selected.name).await?;
    body.push_str("<h3>Columns</h3>");
    let column_rows: Vec<Vec<Cell>> = columns
        .iter()
        .map(|col| {
            vec![
                Cell::num(col.cid),
                Cell::text(&col.name),
                Cell::text(&col.col_type),
                Cell::flag(col.notnull),
                Cell::opt(col.default_value.as_deref()),
                Cell::flag(col.pk),
            ]
        })
        .collect();
    body.push_str(&render::table(
        &["#", "Name", "Type", "Not Null", "Default", "PK"],
        &column_rows,
    ));

    let sample = state
        .db
        .schema_store()
        .sample(&selected.name, SAMPLE_ROWS)
        .await?;
    body.push_str(&format!(
        "<h3>Sample Rows ({})</h3>",
        render::group_count(sample.rows.len() as i64)
    ));
    if sample.rows.is_empty() {
        body.push_str(&render::info_box("The table is empty."));
    } else {
        let headers: Vec<&str> = sample.columns.iter().map(|c| c.as_str()).collect();
        let rows: Vec<Vec<Cell>> = sample
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| Cell::text(cell)).collect())
            .collect();
        body.push_str(&render::table(&headers, &rows));
    }

    Ok(body)
}
