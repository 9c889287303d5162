use salvo::prelude::*;

use super::{query_string, render_db_error, render_page};
use crate::db::DatabaseError;
use crate::db::{DocumentStore, FeedbackStore};
use crate::db::models::FeedbackEntry;
use crate::web::render::{self, Cell};
use crate::web::{csv, web_state};

#[handler]
pub async fn feedback_page(req: &mut Request, res: &mut Response) {
    let site_id = query_string(req, "site_id");
    match build(site_id.as_deref()).await {
        Ok(body) => render_page(res, "Feedback", "feedback", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn feedback_export(_req: &mut Request, res: &mut Response) {
    let state = web_state();
    match state
        .db
        .feedback_store()
        .all_entries(state.config.limits.export_limit)
        .await
    {
        Ok(entries) => {
            let csv_rows: Vec<Vec<String>> = entries
                .iter()
                .map(|entry| {
                    vec![
                        entry.run_id.clone(),
                        entry.site_id.clone(),
                        csv::opt(entry.site_name.as_deref()),
                        csv::opt(entry.site_address.as_deref()),
                        entry
                            .age_correct
                            .map(|v| csv::flag(v))
                            .unwrap_or_default(),
                        csv::opt(entry.age_feedback.as_deref()),
                        entry
                            .third_party_correct
                            .map(|v| csv::flag(v))
                            .unwrap_or_default(),
                        csv::opt(entry.third_party_feedback.as_deref()),
                        entry
                            .document_selection_correct
                            .map(|v| csv::flag(v))
                            .unwrap_or_default(),
                        csv::opt(entry.document_selection_feedback.as_deref()),
                        csv::opt(entry.selected_documents_shown.as_deref()),
                        csv::opt(entry.overall_notes.as_deref()),
                        csv::opt(entry.submitted_at.as_deref()),
                    ]
                })
                .collect();
            let data = csv::to_csv(
                &[
                    "run_id",
                    "site_id",
                    "site_name",
                    "site_address",
                    "age_correct",
                    "age_feedback",
                    "third_party_correct",
                    "third_party_feedback",
                    "document_selection_correct",
                    "document_selection_feedback",
                    "selected_documents_shown",
                    "overall_notes",
                    "submitted_at",
                ],
                &csv_rows,
            );
            csv::send(res, "ai_feedback_export.csv", data);
        }
        Err(err) => render_db_error(res, &err),
    }
}

fn verdict(value: Option<bool>, yes: &str, no: &str, missing: &str) -> String {
    match value {
        Some(true) => format!("✅ {yes}"),
        Some(false) => format!("❌ {no}"),
        None => missing.to_string(),
    }
}

async fn build(site_id: Option<&str>) -> Result<String, DatabaseError> {
    let state = web_state();
    let summary = state.db.feedback_store().summary().await?;

    let mut body = String::from(
        "<h2>User Feedback</h2>\
         <p>Review feedback provided on qualification analyses.</p>",
    );

    if summary.is_empty() {
        body.push_str(&render::info_box("No feedback has been submitted yet."));
        return Ok(body);
    }

    let total_entries: i64 = summary.iter().map(|row| row.feedback_count).sum();
    let age_correct: i64 = summary.iter().map(|row| row.age_correct_count).sum();
    let tp_correct: i64 = summary.iter().map(|row| row.third_party_correct_count).sum();
    let percent = |part: i64| {
        if total_entries > 0 {
            format!("{:.1}%", part as f64 / total_entries as f64 * 100.0)
        } else {
            "0.0%".to_string()
        }
    };
    body.push_str(&render::metrics_row(&[
        ("Sites with Feedback", render::group_count(summary.len() as i64)),
        ("Total Feedback Entries", render::group_count(total_entries)),
        ("Age Score Accuracy", percent(age_correct)),
        ("Third-Party Accuracy", percent(tp_correct)),
    ]));

    body.push_str(&format!(
        "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{}\">Export All Feedback (CSV)</a></div>",
        render::html_escape(&render::href(&state.config, "/feedback/export.csv"))
    ));

    match site_id {
        None => {
            let rows: Vec<Vec<Cell>> = summary
                .iter()
                .map(|row| {
                    vec![
                        Cell::link(
                            &render::href_with_query(
                                &state.config,
                                "/feedback",
                                &[("site_id", row.site_id.clone())],
                            ),
                            &row.site_id,
                        ),
                        Cell::opt(row.site_name.as_deref()),
                        Cell::opt(row.site_address.as_deref()),
                        Cell::num(row.feedback_count),
                        Cell::opt(row.latest_feedback.as_deref()),
                    ]
                })
                .collect();
            body.push_str("<h3>Sites with Feedback</h3>");
            body.push_str(&render::table(
                &["Site", "Name", "Address", "Entries", "Latest Feedback"],
                &rows,
            ));
        }
        Some(site_id) => {
            let entries = state.db.feedback_store().site_entries(site_id).await?;
            body.push_str(&format!(
                "<h3>Feedback for Site {}</h3>",
                render::html_escape(site_id)
            ));
            if entries.is_empty() {
                body.push_str(&render::info_box("No feedback entries for this site."));
                return Ok(body);
            }
            if let Some(first) = entries.first() {
                body.push_str(&format!(
                    "<p><strong>Site Name:</strong> {} — <strong>Address:</strong> {} — \
                     <strong>Entries:</strong> {}</p>",
                    render::html_escape(first.site_name.as_deref().unwrap_or("Not Available")),
                    render::html_escape(first.site_address.as_deref().unwrap_or("Not Available")),
                    entries.len(),
                ));
            }
            for (index, entry) in entries.iter().enumerate() {
                body.push_str(&entry_block(index, entry).await?);
            }
        }
    }

    Ok(body)
}

async fn entry_block(index: usize, entry: &FeedbackEntry) -> Result<String, DatabaseError> {
    let state = web_state();
    let run_short: String = entry.run_id.chars().take(8).collect();
    let open = if index == 0 { " open" } else { "" };

    let mut inner = String::new();
    inner.push_str(&format!(
        "<h4>Age Score</h4><p>{}</p>",
        render::html_escape(&verdict(
            entry.age_correct,
            "marked as CORRECT",
            "marked as INCORRECT",
            "No age score correctness feedback provided",
        )),
    ));
    if let Some(text) = entry.age_feedback.as_deref().filter(|t| !t.is_empty()) {
        inner.push_str(&format!("<blockquote>{}</blockquote>", render::html_escape(text)));
    }

    inner.push_str(&format!(
        "<h4>Third-Party Impact</h4><p>{}</p>",
        render::html_escape(&verdict(
            entry.third_party_correct,
            "marked as CORRECT",
            "marked as INCORRECT",
            "No third-party score correctness feedback provided",
        )),
    ));
    if let Some(text) = entry
        .third_party_feedback
        .as_deref()
        .filter(|t| !t.is_empty())
    {
        inner.push_str(&format!("<blockquote>{}</blockquote>", render::html_escape(text)));
    }

    inner.push_str(&format!(
        "<h4>Document Selection &amp; Priority</h4><p>{}</p>",
        render::html_escape(&verdict(
            entry.document_selection_correct,
            "marked as APPROPRIATE",
            "marked as NEEDS IMPROVEMENT",
            "No document selection correctness feedback provided",
        )),
    ));
    if let Some(text) = entry
        .document_selection_feedback
        .as_deref()
        .filter(|t| !t.is_empty())
    {
        inner.push_str(&format!("<blockquote>{}</blockquote>", render::html_escape(text)));
    }

    // Documents shown to the reviewer, in priority order.
    if let Some(raw) = entry
        .selected_documents_shown
        .as_deref()
        .filter(|t| !t.is_empty())
    {
        match serde_json::from_str::<Vec<i64>>(raw) {
            Ok(ids) if !ids.is_empty() => {
                let refs = state.db.document_store().documents_by_ids(&ids).await?;
                let by_id: std::collections::HashMap<i64, &crate::db::models::DocumentRef> =
                    refs.iter().map(|r| (r.id, r)).collect();
                inner.push_str(&format!(
                    "<h4>Documents Shown ({} in priority order)</h4><ol>",
                    ids.len()
                ));
                for id in &ids {
                    match by_id.get(id) {
                        Some(doc) => {
                            let mut label =
                                doc.document_title.clone().unwrap_or_else(|| format!("Document {id}"));
                            if let Some(kind) = &doc.document_type {
                                label.push_str(&format!(" ({kind})"));
                            }
                            if let Some(date) = &doc.document_date {
                                label.push_str(&format!(" - {date}"));
                            }
                            match doc.document_url.as_deref() {
                                Some(url) => inner.push_str(&format!(
                                    "<li><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></li>",
                                    render::html_escape(url),
                                    render::html_escape(&label)
                                )),
                                None => inner.push_str(&format!(
                                    "<li>{} (no link available)</li>",
                                    render::html_escape(&label)
                                )),
                            }
                        }
                        None => inner.push_str(&format!(
                            "<li>Document ID: {id} (details not found)</li>"
                        )),
                    }
                }
                inner.push_str("</ol>");
            }
            _ => inner.push_str("<h4>Documents Shown</h4><p>No document list available.</p>"),
        }
    }

    if let Some(notes) = entry.overall_notes.as_deref().filter(|t| !t.is_empty()) {
        inner.push_str(&format!(
            "<h4>Overall Notes</h4><blockquote>{}</blockquote>",
            render::html_escape(notes)
        ));
    }

    Ok(format!(
        "<details{open}><summary>Feedback #{number} — Run {run}… ({at})</summary>{inner}</details>",
        number = index + 1,
        run = render::html_escape(&run_short),
        at = render::html_escape(entry.submitted_at.as_deref().unwrap_or("unknown time")),
    ))
}

#[cfg(test)]
mod tests {
    use super::verdict;

    #[test]
    fn verdict_covers_all_states() {
        assert_eq!(verdict(Some(true), "ok", "bad", "none"), "✅ ok");
        assert_eq!(verdict(Some(false), "ok", "bad", "none"), "❌ bad");
        assert_eq!(verdict(None, "ok", "bad", "none"), "none");
    }
}
