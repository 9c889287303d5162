use salvo::prelude::*;

use super::{query_string, render_db_error, render_page};
use crate::db::DatabaseError;
use crate::db::NarrativeStore;
use crate::web::render;
use crate::web::web_state;

#[handler]
pub async fn narratives_page(req: &mut Request, res: &mut Response) {
    let selected = query_string(req, "site_id");
    match build(selected.as_deref()).await {
        Ok(body) => render_page(res, "Narratives", "narratives", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

async fn build(selected: Option<&str>) -> Result<String, DatabaseError> {
    let state = web_state();
    let site_ids = state
        .db
        .narrative_store()
        .narrative_site_ids(state.config.limits.options_limit)
        .await?;

    let mut body = String::from(
        "<h2>Narratives</h2><p>Browse site narratives by site and section.</p>",
    );

    if site_ids.is_empty() {
        body.push_str(&render::info_box("No narratives in the database."));
        return Ok(body);
    }

    let selected = selected.unwrap_or(site_ids[0].as_str());
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         {select}<button class=\"button\" type=\"submit\">View</button></form>",
        action = render::html_escape(&render::href(&state.config, "/narratives")),
        select = render::field(
            "Select site",
            &render::select(
                "site_id",
                &site_ids
                    .iter()
                    .map(|id| (id.as_str(), id.as_str()))
                    .collect::<Vec<_>>(),
                selected,
            ),
        ),
    ));

    let sections = state.db.narrative_store().sections(selected).await?;
    if sections.is_empty() {
        body.push_str(&render::info_box("No narrative sections for this site."));
        return Ok(body);
    }

    for section in &sections {
        body.push_str(&format!(
            "<details open><summary>{} — {}</summary><p>{}</p></details>",
            section.section_order,
            render::html_escape(section.section_title.as_deref().unwrap_or("Untitled")),
            render::html_escape(section.section_content.as_deref().unwrap_or("")),
        ));
    }

    Ok(body)
}
