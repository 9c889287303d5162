use std::collections::HashMap;

use salvo::prelude::*;

use super::{query_string, render_db_error, render_not_found, render_page};
use crate::db::DatabaseError;
use crate::db::{ContactStore, ContaminantStore, DocumentStore, NarrativeStore, QualificationStore, SiteStore};
use crate::db::models::{ContaminantRow, OwnershipRecord, SiteProfile};
use crate::qualification::{self, EvidenceItem};
use crate::web::render::{self, Cell};
use crate::web::web_state;

/// Site picker: choose a site to deep-dive into, or jump straight to it
/// when a `site_id` query parameter is present.
#[handler]
pub async fn site_picker(req: &mut Request, res: &mut Response) {
    let state = web_state();
    if let Some(site_id) = query_string(req, "site_id") {
        res.render(Redirect::other(render::href(
            &state.config,
            &format!("/sites/{site_id}"),
        )));
        return;
    }
    match build_picker().await {
        Ok(body) => render_page(res, "Site Detail", "search", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

async fn build_picker() -> Result<String, DatabaseError> {
    let state = web_state();
    let options = state
        .db
        .site_store()
        .site_options(state.config.limits.options_limit)
        .await?;

    let mut body = String::from(
        "<h2>Site Detail</h2>\
         <p>A single-page deep-dive into a site: overview, narratives, documents, \
         qualifications, contaminants, and contacts.</p>",
    );
    if options.is_empty() {
        body.push_str(&render::info_box("No sites found."));
        return Ok(body);
    }

    let mut rendered = String::new();
    for option in &options {
        let label = match option.site_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("{} — {}", option.site_id, name),
            None => option.site_id.clone(),
        };
        rendered.push_str(&format!(
            "<option value=\"{}\">{}</option>",
            render::html_escape(&option.site_id),
            render::html_escape(&label)
        ));
    }
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         <label class=\"field\"><span>Select site</span>\
         <select name=\"site_id\">{rendered}</select></label>\
         <button class=\"button\" type=\"submit\">Open</button></form>",
        action = render::html_escape(&render::href(&state.config, "/sites")),
    ));

    Ok(body)
}

#[handler]
pub async fn site_detail(req: &mut Request, res: &mut Response) {
    let Some(site_id) = req.param::<String>("id") else {
        render_not_found(res, "Missing site id.");
        return;
    };
    let notice = query_string(req, "notice");
    match build(&site_id).await {
        Ok(Some(body)) => render_page(
            res,
            &format!("Site {site_id}"),
            "search",
            notice.as_deref(),
            &body,
        ),
        Ok(None) => render_not_found(res, "No overview record for this site."),
        Err(err) => render_db_error(res, &err),
    }
}

fn check(value: bool) -> &'static str {
    if value { "✅" } else { "❌" }
}

async fn build(site_id: &str) -> Result<Option<String>, DatabaseError> {
    let state = web_state();
    let Some(profile) = state.db.site_store().site_profile(site_id).await? else {
        return Ok(None);
    };

    let detail_limit = state.config.limits.detail_limit;
    let score = state
        .db
        .qualification_store()
        .score_map(&[site_id.to_string()])
        .await?
        .into_iter()
        .next();
    let sections = state.db.narrative_store().sections(site_id).await?;
    let documents = state
        .db
        .document_store()
        .site_documents(site_id, detail_limit)
        .await?;
    let document_refs = state.db.document_store().document_refs(site_id).await?;
    let contaminants = state
        .db
        .contaminant_store()
        .rows(Some(site_id), detail_limit)
        .await?;
    let contacts = state
        .db
        .contact_store()
        .site_rows(site_id, detail_limit)
        .await?;
    let ownership = state.db.site_store().ownership_history(site_id).await?;

    // Last write wins for duplicate titles, matching how evidence rows
    // reference documents by their most recent scrape.
    let mut title_to_url: HashMap<String, String> = HashMap::new();
    for doc in document_refs.iter().rev() {
        if let (Some(title), Some(url)) = (doc.document_title.as_deref(), doc.document_url.as_deref())
        {
            let title = title.trim().to_string();
            if !title.is_empty() {
                title_to_url.entry(title).or_insert_with(|| url.to_string());
            }
        }
    }

    let mut body = format!(
        "<h2>Site {} — {}</h2>",
        render::html_escape(&profile.site_id),
        render::html_escape(profile.site_name.as_deref().unwrap_or("(unnamed)")),
    );

    body.push_str(&overview_section(&state.config, &profile, score.as_ref().and_then(|s| s.score)));
    body.push_str(&narratives_section(&sections));
    body.push_str(&documents_section(&documents));
    body.push_str(&qualifications_section(site_id, &title_to_url).await?);
    body.push_str(&contaminants_section(&contaminants));
    body.push_str(&contacts_section(&contacts));
    body.push_str(&ownership_section(&ownership));

    Ok(Some(body))
}

fn overview_section(
    config: &crate::config::Config,
    profile: &SiteProfile,
    score: Option<i64>,
) -> String {
    let mut out = String::from("<section id=\"overview\"><h3>Overview</h3>");

    let site_url = profile
        .url
        .as_deref()
        .or(profile.site_report_url.as_deref())
        .or(profile.neighborhood_map_url.as_deref());
    if let Some(url) = site_url {
        out.push_str(&format!(
            "<p><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">Open on the state ecology site ↗</a></p>",
            render::html_escape(url)
        ));
    }

    out.push_str(&render::metrics_row(&[
        (
            "Score",
            score.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string()),
        ),
        ("Documents", profile.total_documents.to_string()),
        ("Contaminants", profile.total_contaminants.to_string()),
        ("Has Docs", check(profile.has_documents).to_string()),
        ("Has Narratives", check(profile.found_documents).to_string()),
        (
            "Scrape Status",
            profile.scrape_status.clone().unwrap_or_else(|| "–".to_string()),
        ),
    ]));

    out.push_str("<div class=\"quick-links\">");
    for (label, anchor) in [
        ("Narratives", "#narratives"),
        ("Documents", "#documents"),
        ("Qualifications", "#qualifications"),
        ("Contaminants", "#contaminants"),
        ("Contacts", "#contacts"),
        ("Ownership History", "#ownership"),
    ] {
        out.push_str(&format!(
            "<a class=\"button secondary\" href=\"{anchor}\">{label}</a>"
        ));
    }
    out.push_str(&format!(
        "<a class=\"button secondary\" href=\"{}\">Back to Site Search</a>",
        render::html_escape(&render::href(config, "/search"))
    ));
    out.push_str("</div>");

    let meta = [
        ("Address", profile.site_address.as_deref()),
        ("Regional office", profile.regional_office.as_deref()),
        ("Office phone", profile.office_phone.as_deref()),
        ("Cleanup program", profile.cleanup_program_type.as_deref()),
        ("Site report", profile.site_report_url.as_deref()),
        ("Neighborhood map", profile.neighborhood_map_url.as_deref()),
    ];
    let rows: Vec<Vec<Cell>> = meta
        .iter()
        .filter(|(_, value)| value.is_some())
        .map(|(label, value)| vec![Cell::text(*label), Cell::opt(*value)])
        .collect();
    if !rows.is_empty() {
        out.push_str(&render::table(&["Field", "Value"], &rows));
    }
    out.push_str("</section>");
    out
}

fn narratives_section(sections: &[crate::db::models::NarrativeSection]) -> String {
    let mut out = String::from("<section id=\"narratives\"><h3>Narratives</h3>");
    if sections.is_empty() {
        out.push_str(&render::info_box("No narratives available for this site."));
    } else {
        for section in sections {
            out.push_str(&format!(
                "<details><summary>{} — {}</summary><p>{}</p></details>",
                section.section_order,
                render::html_escape(section.section_title.as_deref().unwrap_or("Untitled")),
                render::html_escape(section.section_content.as_deref().unwrap_or("")),
            ));
        }
    }
    out.push_str("</section>");
    out
}

fn documents_section(documents: &[crate::db::models::DocumentRow]) -> String {
    let mut out = format!(
        "<section id=\"documents\"><h3>Documents ({})</h3>",
        documents.len()
    );
    if documents.is_empty() {
        out.push_str(&render::info_box("No documents found for this site."));
        out.push_str("</section>");
        return out;
    }
    let rows: Vec<Vec<Cell>> = documents
        .iter()
        .map(|doc| {
            let title = doc.document_title.as_deref().unwrap_or("");
            let title_cell = match doc.document_url.as_deref().filter(|u| !u.trim().is_empty()) {
                Some(url) => Cell::external_link(url, title),
                None => Cell::text(title),
            };
            vec![
                Cell::num(doc.id),
                Cell::opt(doc.document_category.as_deref()),
                title_cell,
                Cell::flag(doc.flagged_for_analysis),
                Cell::opt(doc.download_status.as_deref()),
                Cell::opt(doc.document_date.as_deref()),
                Cell::opt(doc.document_type.as_deref()),
                Cell::opt(doc.file_extension.as_deref()),
                Cell::opt_num(doc.file_size_bytes),
            ]
        })
        .collect();
    out.push_str(&render::table(
        &[
            "ID",
            "Category",
            "Document Title",
            "Flagged",
            "Download Status",
            "Date",
            "Type",
            "Ext",
            "Size (bytes)",
        ],
        &rows,
    ));
    out.push_str("</section>");
    out
}

async fn qualifications_section(
    site_id: &str,
    title_to_url: &HashMap<String, String>,
) -> Result<String, DatabaseError> {
    let state = web_state();
    let store = state.db.qualification_store();

    let run = store.latest_run(site_id).await?;
    let mut overall_score: i64 = 0;
    let mut age_points: Option<i64> = None;
    let mut third_party_points: Option<i64> = None;
    let tier = qualification::tier_from_status(
        run.as_ref().and_then(|r| r.final_status.as_deref()),
    );
    if let Some(run) = &run {
        if let Some(raw) = store.module_json(&run.run_id, "Score Calculation").await? {
            overall_score = qualification::score_from_module_json(&raw)
                .or(run.final_score)
                .unwrap_or(0);
            age_points = qualification::component_score(&raw, "age_score");
            third_party_points = qualification::component_score(&raw, "third_party_score");
        } else {
            overall_score = run.final_score.unwrap_or(0);
        }
    }

    let evidence = store.latest_evidence(site_id).await?;

    let mut out = String::from("<section id=\"qualifications\"><h3>Qualifications</h3>");
    out.push_str(&render::metrics_row(&[
        ("Overall Score", overall_score.to_string()),
        ("Tier", tier),
    ]));

    let Some(record) = evidence else {
        out.push_str(&render::info_box(
            "No qualification analysis recorded for this site.",
        ));
        out.push_str("</section>");
        return Ok(out);
    };

    if let (Some(age_ok), Some(tp_ok)) = (record.age_qualified, record.third_party_qualified) {
        out.push_str(&format!(
            "<div class=\"metrics\">\
             <div class=\"metric\"><span class=\"metric-value\">{} {}</span>\
             <span class=\"metric-label\">Age Qualification</span></div>\
             <div class=\"metric\"><span class=\"metric-value\">{} {}</span>\
             <span class=\"metric-label\">Third-Party</span></div>\
             <div class=\"metric\"><span class=\"metric-value\">{} {}</span>\
             <span class=\"metric-label\">Overall</span></div></div>",
            check(age_ok),
            if age_ok { "PASSED" } else { "FAILED" },
            check(tp_ok),
            if tp_ok { "PASSED" } else { "FAILED" },
            check(record.qualified),
            if record.qualified { "QUALIFIED" } else { "NOT QUALIFIED" },
        ));
    }

    let factors = qualification::parse_disqualifying_factors(record.disqualifying_factors.as_deref());
    let legacy_minimal_cleanup =
        record.final_recommendation.as_deref() == Some("DISQUALIFIED_MINIMAL_CLEANUP");
    if !factors.is_empty() {
        for factor in &factors {
            out.push_str(&render::error_box(factor.headline()));
            let mut detail = String::new();
            if let Some(category) = &factor.category {
                detail.push_str(&format!(
                    "<p><strong>Category:</strong> {}</p>",
                    render::html_escape(category)
                ));
            }
            if let Some(description) = factor.description.as_deref().or(factor.reason.as_deref()) {
                detail.push_str(&format!(
                    "<p><strong>Reason:</strong> {}</p>",
                    render::html_escape(description)
                ));
            }
            if let Some(evidence) = &factor.evidence {
                detail.push_str(&format!(
                    "<details><summary>View supporting evidence</summary><p>{}</p></details>",
                    render::html_escape(evidence)
                ));
            }
            out.push_str(&detail);
        }
    } else if legacy_minimal_cleanup {
        out.push_str(&render::error_box(
            "Site Disqualified: Minimal Cleanup/Recovery. The evidence indicates minimal \
             contamination or cleanup work; there may be insufficient damages to pursue.",
        ));
    }

    let age_items = qualification::parse_evidence(record.age_evidence.as_deref());
    let source_label = if record.age_evidence_source.as_deref() == Some("narrative_analysis") {
        "Narrative"
    } else {
        "Document"
    };
    if !age_items.is_empty() {
        out.push_str(&evidence_block(
            "Age Evidence",
            age_points,
            record.age_evidence_confidence_score,
            source_label,
            &age_items,
            title_to_url,
        ));
    }

    let tp_items = qualification::parse_evidence(record.third_party_evidence.as_deref());
    if !tp_items.is_empty() {
        out.push_str(&evidence_block(
            "3rd Party Evidence",
            third_party_points,
            record.third_party_confidence_score,
            "Document",
            &tp_items,
            title_to_url,
        ));

        let status = state
            .db
            .contaminant_store()
            .status_summary(site_id, 10)
            .await?;
        if !status.is_empty() {
            out.push_str(
                "<p>Contamination Status (C=Confirmed, S=Suspected, B=Below Levels)</p>",
            );
            let rows: Vec<Vec<Cell>> = status
                .iter()
                .map(|row| {
                    vec![
                        Cell::opt(row.contaminant_type.as_deref()),
                        Cell::opt(row.soil_status.as_deref()),
                        Cell::opt(row.groundwater_status.as_deref()),
                        Cell::opt(row.surface_water_status.as_deref()),
                        Cell::opt(row.sediment_status.as_deref()),
                    ]
                })
                .collect();
            out.push_str(&render::table(
                &["Contaminant", "Soil", "Groundwater", "Surface Water", "Sediment"],
                &rows,
            ));
        }
    }

    out.push_str("</section>");
    Ok(out)
}

fn evidence_block(
    title: &str,
    points: Option<i64>,
    confidence: i64,
    source_label: &str,
    items: &[EvidenceItem],
    title_to_url: &HashMap<String, String>,
) -> String {
    let points_str = points.map(|p| format!(" ({p} points)")).unwrap_or_default();
    let confidence_str = if confidence > 0 {
        format!(" (Confidence: {confidence}%)")
    } else {
        String::new()
    };
    let mut out = format!(
        "<h3>{}{points_str}{confidence_str}</h3><p>Evidence Source: {}</p>",
        render::html_escape(title),
        render::html_escape(source_label),
    );
    for item in items {
        let header = match item.source_document.as_deref().map(str::trim) {
            Some(doc_title) if !doc_title.is_empty() && source_label != "Narrative" => {
                match title_to_url.get(doc_title) {
                    Some(url) => format!(
                        "Source: Document — <a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
                        render::html_escape(url),
                        render::html_escape(doc_title)
                    ),
                    None => format!("Source: Document — {}", render::html_escape(doc_title)),
                }
            }
            _ => "Source: Narrative".to_string(),
        };
        let marker = if item.disqualified {
            " ❌ [disqualified: minimal cleanup]"
        } else {
            ""
        };
        let open = if item.disqualified { "" } else { " open" };
        let mut meta = Vec::new();
        if let Some(date) = &item.document_date {
            meta.push(date.clone());
        }
        if let Some(kind) = &item.document_type {
            meta.push(kind.clone());
        }
        let meta_html = if meta.is_empty() {
            String::new()
        } else {
            format!("<p class=\"info\">{}</p>", render::html_escape(&meta.join(" | ")))
        };
        let warning = if item.disqualified {
            render::error_box("This evidence was disqualified due to minimal cleanup/contamination")
        } else {
            String::new()
        };
        out.push_str(&format!(
            "<details{open}><summary>{header}{marker}</summary>{warning}<p>{}</p>{meta_html}</details>",
            render::html_escape(&item.text),
        ));
    }
    out
}

fn contaminants_section(rows: &[ContaminantRow]) -> String {
    let mut out = format!(
        "<section id=\"contaminants\"><h3>Contaminants ({})</h3>",
        rows.len()
    );
    if rows.is_empty() {
        out.push_str(&render::info_box("No contaminants recorded for this site."));
        out.push_str("</section>");
        return out;
    }
    let table_rows: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            vec![
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
    out.push_str(&render::table(
        &[
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
    out.push_str("</section>");
    out
}

fn contacts_section(rows: &[crate::db::models::ContactRow]) -> String {
    let mut out = format!(
        "<section id=\"contacts\"><h3>Contacts ({})</h3>",
        rows.len()
    );
    if rows.is_empty() {
        out.push_str(&render::info_box("No contacts recorded for this site."));
        out.push_str("</section>");
        return out;
    }
    let table_rows: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            vec![
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
            ]
        })
        .collect();
    out.push_str(&render::table(
        &[
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
        ],
        &table_rows,
    ));
    out.push_str("</section>");
    out
}

fn ownership_section(records: &[OwnershipRecord]) -> String {
    let mut out = format!(
        "<section id=\"ownership\"><h3>Ownership History ({})</h3>",
        records.len()
    );
    if records.is_empty() {
        out.push_str(&render::info_box(
            "No ownership history available for this site.",
        ));
        out.push_str("</section>");
        return out;
    }

    out.push_str("<div class=\"cards\">");
    for record in records {
        let start = record
            .ownership_start_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let end = record
            .ownership_end_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| {
                if record.is_current {
                    "Present".to_string()
                } else {
                    "Unknown".to_string()
                }
            });
        let owner = record.owner_name.as_deref().unwrap_or("Unknown Owner");
        let current = if record.is_current { " (Current)" } else { "" };

        let mut lines = Vec::new();
        if let Some(org) = &record.organization_name {
            lines.push(format!("Organization: {org}"));
        }
        if let Some(parent) = &record.parent_company {
            lines.push(format!("Parent company: {parent}"));
        }
        if let Some(duration) = record.ownership_duration_years {
            lines.push(format!("Duration: {duration} years"));
        }
        if let Some(from) = &record.acquired_from {
            lines.push(format!("Acquired from: {from}"));
        }
        if let Some(kind) = &record.acquisition_type {
            lines.push(format!("Acquisition type: {kind}"));
        }
        if let Some(to) = &record.sold_to {
            lines.push(format!("Sold to: {to}"));
        }
        if let Some(successor) = &record.successor_company {
            lines.push(format!("Successor company: {successor}"));
        }
        if record.operated_business {
            let name = record.business_name.as_deref().unwrap_or("unnamed business");
            lines.push(format!("Operated business: {name}"));
            if let Some(kind) = &record.business_type {
                lines.push(format!("Business type: {kind}"));
            }
            if record.operation_start_year.is_some() || record.operation_end_year.is_some() {
                lines.push(format!(
                    "Operation period: {} – {}",
                    record
                        .operation_start_year
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    record
                        .operation_end_year
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "Unknown".to_string()),
                ));
            }
        } else {
            lines.push("Operated business: No".to_string());
        }
        if let Some(assumes) = record.assumes_prior_liabilities {
            lines.push(format!(
                "Assumes prior liabilities: {}",
                if assumes { "Yes" } else { "No" }
            ));
        }

        let items: String = lines
            .iter()
            .map(|line| format!("<li>{}</li>", render::html_escape(line)))
            .collect();
        out.push_str(&format!(
            "<details><summary>{start} – {end}: {}{current}</summary><ul>{items}</ul></details>",
            render::html_escape(owner),
        ));
    }
    out.push_str("</div></section>");
    out
}
