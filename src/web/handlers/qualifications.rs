use salvo::prelude::*;

use super::{cached_tiers, query_tri, query_values, render_db_error, render_page, tri_select};
use crate::db::DatabaseError;
use crate::db::QualificationStore;
use crate::db::models::HistogramBucket;
use crate::filter::QualificationFilter;
use crate::web::render::{self, Cell};
use crate::web::{csv, web_state};

fn filter_from_request(req: &mut Request) -> QualificationFilter {
    QualificationFilter {
        tiers: query_values(req, "tier"),
        qualified: query_tri(req, "qualified"),
    }
}

fn filter_pairs(filter: &QualificationFilter) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    for tier in &filter.tiers {
        pairs.push(("tier", tier.clone()));
    }
    if let Some(value) = filter.qualified.query_value() {
        pairs.push(("qualified", value.to_string()));
    }
    pairs
}

/// Fixed-width buckets over the observed confidence range.
fn confidence_histogram(scores: &[f64], bucket_count: usize) -> Vec<HistogramBucket> {
    if scores.is_empty() || bucket_count == 0 {
        return Vec::new();
    }
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }
    let width = ((max - min) / bucket_count as f64).max(f64::EPSILON);
    let mut counts = vec![0i64; bucket_count];
    for score in scores {
        let mut index = ((score - min) / width) as usize;
        if index >= bucket_count {
            index = bucket_count - 1;
        }
        counts[index] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBucket {
            label: format!(
                "{:.2}–{:.2}",
                min + width * i as f64,
                min + width * (i + 1) as f64
            ),
            count,
        })
        .collect()
}

#[handler]
pub async fn qualifications_page(req: &mut Request, res: &mut Response) {
    let filter = filter_from_request(req);
    match build(&filter).await {
        Ok(body) => render_page(res, "Qualifications", "qualifications", None, &body),
        Err(err) => render_db_error(res, &err),
    }
}

#[handler]
pub async fn qualifications_export(req: &mut Request, res: &mut Response) {
    let filter = filter_from_request(req);
    let state = web_state();
    match state
        .db
        .qualification_store()
        .rows(&filter, state.config.limits.export_limit)
        .await
    {
        Ok(rows) => {
            let csv_rows: Vec<Vec<String>> = rows
                .iter()
                .map(|row| {
                    vec![
                        row.id.to_string(),
                        row.site_id.clone(),
                        csv::flag(row.qualified),
                        csv::opt(row.qualification_tier.as_deref()),
                        row.confidence_score
                            .map(|v| v.to_string())
                            .unwrap_or_default(),
                        csv::opt(row.document_type_analyzed.as_deref()),
                        row.document_quality_score
                            .map(|v| v.to_string())
                            .unwrap_or_default(),
                        csv::opt(row.analyzed_at.as_deref()),
                    ]
                })
                .collect();
            let data = csv::to_csv(
                &[
                    "id",
                    "site_id",
                    "qualified",
                    "qualification_tier",
                    "confidence_score",
                    "document_type_analyzed",
                    "document_quality_score",
                    "analyzed_at",
                ],
                &csv_rows,
            );
            csv::send(res, "qualifications_export.csv", data);
        }
        Err(err) => render_db_error(res, &err),
    }
}

async fn build(filter: &QualificationFilter) -> Result<String, DatabaseError> {
    let state = web_state();
    let store = state.db.qualification_store();
    let tiers = cached_tiers().await?;
    let counts = store.tier_counts(filter).await?;
    let rows = store.rows(filter, state.config.limits.options_limit).await?;

    let mut body = String::from(
        "<h2>Qualifications</h2>\
         <p>Analyze qualification outcomes, tiers, and confidence scores.</p>",
    );
    body.push_str(&format!(
        "<form class=\"filters\" method=\"get\" action=\"{action}\">\
         {tier}{qualified}\
         <button class=\"button\" type=\"submit\">Apply</button>\
         <a class=\"button secondary\" href=\"{action}\">Reset</a>\
         </form>",
        action = render::html_escape(&render::href(&state.config, "/qualifications")),
        tier = render::field("Tier", &render::multi_select("tier", &tiers, &filter.tiers)),
        qualified = render::field("Qualified?", &tri_select("qualified", filter.qualified)),
    ));

    let count_rows: Vec<(String, i64)> =
        counts.into_iter().map(|c| (c.tier, c.count)).collect();
    if !count_rows.is_empty() {
        body.push_str(&render::bar_chart("Count by Tier", &count_rows));
    }

    let scores: Vec<f64> = rows.iter().filter_map(|r| r.confidence_score).collect();
    let histogram = confidence_histogram(&scores, 15);
    if !histogram.is_empty() {
        let chart_rows: Vec<(String, i64)> = histogram
            .into_iter()
            .map(|bucket| (bucket.label, bucket.count))
            .collect();
        body.push_str(&render::bar_chart(
            "Confidence Score Distribution",
            &chart_rows,
        ));
    }

    body.push_str(&format!("<p>Results: {}</p>", render::group_count(rows.len() as i64)));
    if rows.is_empty() {
        body.push_str(&render::info_box("No qualification results found."));
        return Ok(body);
    }

    let export = render::href_with_query(
        &state.config,
        "/qualifications/export.csv",
        &filter_pairs(filter),
    );
    body.push_str(&format!(
        "<div class=\"toolbar\"><a class=\"button secondary\" href=\"{}\">Download CSV</a></div>",
        render::html_escape(&export)
    ));

    let table_rows: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            vec![
                Cell::num(row.id),
                Cell::link(
                    &render::href(&state.config, &format!("/sites/{}", row.site_id)),
                    &row.site_id,
                ),
                Cell::flag(row.qualified),
                Cell::opt(row.qualification_tier.as_deref()),
                Cell::text(
                    row.confidence_score
                        .map(|v| format!("{v:.2}"))
                        .unwrap_or_default(),
                ),
                Cell::opt(row.document_type_analyzed.as_deref()),
                Cell::text(
                    row.document_quality_score
                        .map(|v| format!("{v:.2}"))
                        .unwrap_or_default(),
                ),
                Cell::opt(row.analyzed_at.as_deref()),
            ]
        })
        .collect();
    body.push_str(&render::table(
        &[
            "ID",
            "Site",
            "Qualified",
            "Tier",
            "Confidence",
            "Document Type",
            "Document Quality",
            "Analyzed At",
        ],
        &table_rows,
    ));

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::confidence_histogram;

    #[test]
    fn histogram_counts_all_scores() {
        let scores = [0.1, 0.2, 0.5, 0.9, 0.95];
        let buckets = confidence_histogram(&scores, 3);
        assert_eq!(buckets.len(), 3);
        let total: i64 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, scores.len() as i64);
    }

    #[test]
    fn maximum_lands_in_last_bucket() {
        let buckets = confidence_histogram(&[0.0, 1.0], 4);
        assert_eq!(buckets[3].count, 1);
        assert_eq!(buckets[0].count, 1);
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        assert!(confidence_histogram(&[], 10).is_empty());
        assert!(confidence_histogram(&[0.5], 0).is_empty());
    }

    #[test]
    fn identical_scores_collapse_into_one_bucket() {
        let buckets = confidence_histogram(&[0.7, 0.7, 0.7], 5);
        let total: i64 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, 3);
    }
}
