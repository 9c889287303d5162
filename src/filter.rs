//! Filter selections compiled to parameterized SQL.
//!
//! Every page-level filter becomes a `WHERE` clause fragment plus bind
//! values. User input is always bound, never spliced into the SQL text;
//! the only strings interpolated are column names owned by this module.

use rusqlite::types::Value;

/// Tri-state filter control: unset, require true, require false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tri {
    #[default]
    Any,
    Yes,
    No,
}

impl Tri {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("yes") => Tri::Yes,
            Some(v) if v.eq_ignore_ascii_case("no") => Tri::No,
            _ => Tri::Any,
        }
    }

    pub fn as_flag(self) -> Option<i64> {
        match self {
            Tri::Any => None,
            Tri::Yes => Some(1),
            Tri::No => Some(0),
        }
    }

    pub fn query_value(self) -> Option<&'static str> {
        match self {
            Tri::Any => None,
            Tri::Yes => Some("yes"),
            Tri::No => Some("no"),
        }
    }
}

/// Contamination medium tracked per contaminant row. Soil is intentionally
/// absent from the filterable set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    Groundwater,
    SurfaceWater,
    Air,
    Sediment,
    Bedrock,
}

impl Medium {
    pub const ALL: [Medium; 5] = [
        Medium::Groundwater,
        Medium::SurfaceWater,
        Medium::Air,
        Medium::Sediment,
        Medium::Bedrock,
    ];

    pub fn status_column(self) -> &'static str {
        match self {
            Medium::Groundwater => "groundwater_status",
            Medium::SurfaceWater => "surface_water_status",
            Medium::Air => "air_status",
            Medium::Sediment => "sediment_status",
            Medium::Bedrock => "bedrock_status",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Medium::Groundwater => "Groundwater",
            Medium::SurfaceWater => "Surface Water",
            Medium::Air => "Air",
            Medium::Sediment => "Sediment",
            Medium::Bedrock => "Bedrock",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Medium::Groundwater => "groundwater",
            Medium::SurfaceWater => "surface-water",
            Medium::Air => "air",
            Medium::Sediment => "sediment",
            Medium::Bedrock => "bedrock",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Medium::ALL
            .into_iter()
            .find(|m| m.slug().eq_ignore_ascii_case(raw.trim()))
    }
}

/// Inclusive integer range, e.g. a slider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub lo: i64,
    pub hi: i64,
}

impl IntRange {
    pub fn new(lo: i64, hi: i64) -> Self {
        Self { lo: lo.min(hi), hi: lo.max(hi) }
    }

    /// Whether this selection actually narrows the given bounds.
    pub fn narrows(&self, bound_lo: i64, bound_hi: i64) -> bool {
        self.lo > bound_lo || self.hi < bound_hi
    }
}

/// A compiled WHERE clause: fragment list plus bind values in order.
#[derive(Debug, Default)]
pub struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl SqlFilter {
    pub fn push<I>(&mut self, clause: impl Into<String>, binds: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.clauses.push(clause.into());
        self.params.extend(binds);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `""` when no filter is active, otherwise `"WHERE a AND b"`.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn clone_params(&self) -> Vec<Value> {
        self.params.clone()
    }
}

pub fn placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count * 2);
    for i in 0..count {
        if i > 0 {
            out.push(',');
        }
        out.push('?');
    }
    out
}

fn like_pattern(needle: &str) -> Value {
    Value::Text(format!("%{needle}%"))
}

const PROCESSED_SUBQUERY: &str = "SELECT DISTINCT site_id \
     FROM orchestration_runs \
     WHERE completed_at IS NOT NULL \
       AND (final_score IS NOT NULL OR EXISTS ( \
            SELECT 1 FROM orchestration_module_results \
            WHERE run_id = orchestration_runs.run_id \
              AND module_name LIKE '%Score Calculation%'))";

/// Site-level filter panel. Compiles against `site_overview`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteFilter {
    pub search: Option<String>,
    pub document_search: Option<String>,
    pub has_documents: Tri,
    pub has_narrative: Tri,
    pub has_contaminants: Tri,
    pub scrape_status: Option<String>,
    pub tier: Option<String>,
    pub processed: Tri,
    pub media: Vec<Medium>,
    pub medium_statuses: Vec<String>,
    pub narrative_range: Option<IntRange>,
    pub document_range: Option<IntRange>,
    pub span_range: Option<IntRange>,
    pub score_range: Option<IntRange>,
    pub age_check_score: Option<i64>,
    pub historical_use: Vec<String>,
    pub batches: Vec<String>,
}

impl SiteFilter {
    pub fn compile(&self) -> SqlFilter {
        let mut out = SqlFilter::default();

        if let Some(q) = non_empty(&self.search) {
            out.push(
                "(COALESCE(site_name,'') LIKE ? OR COALESCE(site_address,'') LIKE ? OR site_id LIKE ?)",
                vec![like_pattern(q), like_pattern(q), like_pattern(q)],
            );
        }

        if let Some(q) = non_empty(&self.document_search) {
            out.push(
                "EXISTS (SELECT 1 FROM site_documents sd \
                 WHERE sd.site_id = site_overview.site_id \
                   AND LOWER(sd.document_title) LIKE LOWER(?))",
                vec![like_pattern(q)],
            );
        }

        if let Some(flag) = self.has_documents.as_flag() {
            out.push("has_documents = ?", vec![Value::Integer(flag)]);
        }

        if let Some(flag) = self.has_contaminants.as_flag() {
            out.push("has_contaminants = ?", vec![Value::Integer(flag)]);
        }

        if let Some(status) = non_empty(&self.scrape_status) {
            out.push("scrape_status = ?", vec![Value::Text(status.to_string())]);
        }

        if let Some(flag) = self.has_narrative.as_flag() {
            out.push(
                "site_id IN (SELECT site_id FROM site_summary \
                 WHERE COALESCE(has_narrative_content,0) = ?)",
                vec![Value::Integer(flag)],
            );
        }

        if let Some(tier) = non_empty(&self.tier) {
            out.push(
                "site_id IN (SELECT site_id FROM site_qualification_results \
                 WHERE COALESCE(qualification_tier,'UNSPECIFIED') = ?)",
                vec![Value::Text(tier.to_string())],
            );
        }

        match self.processed {
            Tri::Any => {}
            Tri::Yes => out.push(format!("site_id IN ({PROCESSED_SUBQUERY})"), vec![]),
            Tri::No => out.push(format!("site_id NOT IN ({PROCESSED_SUBQUERY})"), vec![]),
        }

        self.push_media_clause(&mut out);

        if let Some(range) = self.narrative_range {
            out.push(
                "site_id IN (SELECT site_id FROM site_summary \
                 WHERE COALESCE(total_narrative_sections,0) BETWEEN ? AND ?)",
                vec![Value::Integer(range.lo), Value::Integer(range.hi)],
            );
        }

        if let Some(range) = self.document_range {
            out.push(
                "site_id IN (SELECT site_id FROM site_summary \
                 WHERE COALESCE(total_documents,0) BETWEEN ? AND ?)",
                vec![Value::Integer(range.lo), Value::Integer(range.hi)],
            );
        }

        if let Some(range) = self.span_range {
            out.push(
                "site_id IN (SELECT site_id FROM site_summary \
                 WHERE COALESCE(document_date_range_years,0) BETWEEN ? AND ?)",
                vec![Value::Integer(range.lo), Value::Integer(range.hi)],
            );
        }

        if let Some(range) = self.score_range {
            self.push_score_clause(&mut out, range);
        }

        if let Some(score) = self.age_check_score {
            out.push(
                "site_id IN (SELECT site_id FROM site_summary \
                 WHERE age_evidence_confidence_score = ?)",
                vec![Value::Integer(score)],
            );
        }

        if !self.historical_use.is_empty() {
            out.push(
                format!(
                    "site_id IN (SELECT site_id FROM sites \
                     WHERE historical_use_category IN ({}))",
                    placeholders(self.historical_use.len())
                ),
                self.historical_use
                    .iter()
                    .map(|v| Value::Text(v.clone()))
                    .collect::<Vec<_>>(),
            );
        }

        if !self.batches.is_empty() {
            out.push(
                format!(
                    "site_id IN (SELECT DISTINCT json_each.value \
                     FROM batch_runs, json_each(site_ids) \
                     WHERE batch_name IN ({}))",
                    placeholders(self.batches.len())
                ),
                self.batches
                    .iter()
                    .map(|v| Value::Text(v.clone()))
                    .collect::<Vec<_>>(),
            );
        }

        out
    }

    /// Medium and medium-status selections combine into a single
    /// `site_contaminants` subquery: an OR over the chosen status columns.
    fn push_media_clause(&self, out: &mut SqlFilter) {
        if self.media.is_empty() && self.medium_statuses.is_empty() {
            return;
        }

        let columns: Vec<&'static str> = if self.media.is_empty() {
            Medium::ALL.iter().map(|m| m.status_column()).collect()
        } else {
            self.media.iter().map(|m| m.status_column()).collect()
        };

        let (inner, params) = if self.medium_statuses.is_empty() {
            let ors: Vec<String> = columns
                .iter()
                .map(|col| format!("TRIM(COALESCE({col},'')) <> ''"))
                .collect();
            (format!("({})", ors.join(" OR ")), Vec::new())
        } else {
            let ph = placeholders(self.medium_statuses.len());
            let ors: Vec<String> = columns
                .iter()
                .map(|col| format!("COALESCE({col},'') IN ({ph})"))
                .collect();
            let mut params = Vec::with_capacity(columns.len() * self.medium_statuses.len());
            for _ in &columns {
                params.extend(self.medium_statuses.iter().map(|s| Value::Text(s.clone())));
            }
            (format!("({})", ors.join(" OR ")), params)
        };

        out.push(
            format!("site_id IN (SELECT site_id FROM site_contaminants WHERE {inner})"),
            params,
        );
    }

    /// Final-score range over both scoring generations: the latest
    /// `site_qualification_results` row, unioned with the latest completed
    /// orchestration run for sites the newer pipeline has not touched.
    fn push_score_clause(&self, out: &mut SqlFilter, range: IntRange) {
        let clause = "site_id IN ( \
             SELECT sqr.site_id \
             FROM site_qualification_results sqr \
             WHERE sqr.analyzed_at = ( \
                 SELECT MAX(analyzed_at) FROM site_qualification_results \
                 WHERE site_id = sqr.site_id) \
               AND CAST(sqr.final_calculated_score AS INTEGER) BETWEEN ? AND ? \
             UNION \
             SELECT s.site_id FROM ( \
                 WITH lr AS ( \
                     SELECT or1.site_id, or1.run_id, or1.final_score AS run_final_score, or1.completed_at \
                     FROM orchestration_runs or1 \
                     WHERE or1.completed_at IS NOT NULL \
                       AND or1.site_id NOT IN (SELECT DISTINCT site_id FROM site_qualification_results) \
                 ), picked AS ( \
                     SELECT l1.site_id, l1.run_id, l1.run_final_score \
                     FROM lr l1 \
                     JOIN (SELECT site_id, MAX(completed_at) AS mc FROM lr GROUP BY site_id) m \
                       ON m.site_id = l1.site_id AND m.mc = l1.completed_at \
                 ) \
                 SELECT p.site_id, \
                        COALESCE( \
                            CAST(json_extract(omr.module_result_json, '$.data.final_score') AS INTEGER), \
                            CAST(p.run_final_score AS INTEGER), \
                            0) AS final_score \
                 FROM picked p \
                 LEFT JOIN orchestration_module_results omr \
                   ON omr.run_id = p.run_id \
                  AND omr.module_name LIKE '%Score Calculation%' \
             ) s \
             WHERE s.final_score BETWEEN ? AND ?)";
        out.push(
            clause,
            vec![
                Value::Integer(range.lo),
                Value::Integer(range.hi),
                Value::Integer(range.lo),
                Value::Integer(range.hi),
            ],
        );
    }

    /// Rebuild the query-string pairs for this filter, so pagination and
    /// CSV links carry the active selection.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = non_empty(&self.search) {
            pairs.push(("q", q.to_string()));
        }
        if let Some(q) = non_empty(&self.document_search) {
            pairs.push(("doc_q", q.to_string()));
        }
        if let Some(v) = self.has_documents.query_value() {
            pairs.push(("has_docs", v.to_string()));
        }
        if let Some(v) = self.has_narrative.query_value() {
            pairs.push(("has_narr", v.to_string()));
        }
        if let Some(v) = self.has_contaminants.query_value() {
            pairs.push(("has_cont", v.to_string()));
        }
        if let Some(v) = non_empty(&self.scrape_status) {
            pairs.push(("scrape_status", v.to_string()));
        }
        if let Some(v) = non_empty(&self.tier) {
            pairs.push(("tier", v.to_string()));
        }
        if let Some(v) = self.processed.query_value() {
            pairs.push(("processed", v.to_string()));
        }
        for medium in &self.media {
            pairs.push(("medium", medium.slug().to_string()));
        }
        for status in &self.medium_statuses {
            pairs.push(("medium_status", status.clone()));
        }
        if let Some(range) = self.narrative_range {
            pairs.push(("narr_min", range.lo.to_string()));
            pairs.push(("narr_max", range.hi.to_string()));
        }
        if let Some(range) = self.document_range {
            pairs.push(("docs_min", range.lo.to_string()));
            pairs.push(("docs_max", range.hi.to_string()));
        }
        if let Some(range) = self.span_range {
            pairs.push(("span_min", range.lo.to_string()));
            pairs.push(("span_max", range.hi.to_string()));
        }
        if let Some(range) = self.score_range {
            pairs.push(("score_min", range.lo.to_string()));
            pairs.push(("score_max", range.hi.to_string()));
        }
        if let Some(score) = self.age_check_score {
            pairs.push(("age_check", score.to_string()));
        }
        for category in &self.historical_use {
            pairs.push(("historical_use", category.clone()));
        }
        for batch in &self.batches {
            pairs.push(("batch", batch.clone()));
        }
        pairs
    }

    /// Parse from decoded query pairs (repeated keys allowed).
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = SiteFilter::default();
        let mut ranges: std::collections::HashMap<&str, i64> = std::collections::HashMap::new();

        for (key, value) in pairs {
            let value = value.trim();
            match key {
                "q" if !value.is_empty() => filter.search = Some(value.to_string()),
                "doc_q" if !value.is_empty() => filter.document_search = Some(value.to_string()),
                "has_docs" => filter.has_documents = Tri::parse(Some(value)),
                "has_narr" => filter.has_narrative = Tri::parse(Some(value)),
                "has_cont" => filter.has_contaminants = Tri::parse(Some(value)),
                "scrape_status" if !value.is_empty() && value != "any" => {
                    filter.scrape_status = Some(value.to_string());
                }
                "tier" if !value.is_empty() && value != "any" => {
                    filter.tier = Some(value.to_string());
                }
                "processed" => filter.processed = Tri::parse(Some(value)),
                "medium" => {
                    if let Some(medium) = Medium::parse(value) {
                        if !filter.media.contains(&medium) {
                            filter.media.push(medium);
                        }
                    }
                }
                "medium_status" if !value.is_empty() => {
                    filter.medium_statuses.push(value.to_string());
                }
                "narr_min" | "narr_max" | "docs_min" | "docs_max" | "span_min" | "span_max"
                | "score_min" | "score_max" => {
                    if let Ok(n) = value.parse::<i64>() {
                        ranges.insert(key, n);
                    }
                }
                "age_check" => {
                    if let Ok(n) = value.parse::<i64>() {
                        filter.age_check_score = Some(n);
                    }
                }
                "historical_use" if !value.is_empty() => {
                    filter.historical_use.push(value.to_string());
                }
                "batch" if !value.is_empty() => filter.batches.push(value.to_string()),
                _ => {}
            }
        }

        let range_of = |lo_key: &str, hi_key: &str| -> Option<IntRange> {
            match (ranges.get(lo_key), ranges.get(hi_key)) {
                (Some(&lo), Some(&hi)) => Some(IntRange::new(lo, hi)),
                _ => None,
            }
        };
        filter.narrative_range = range_of("narr_min", "narr_max");
        filter.document_range = range_of("docs_min", "docs_max");
        filter.span_range = range_of("span_min", "span_max");
        filter.score_range = range_of("score_min", "score_max");

        filter
    }
}

/// Documents page filter (`site_documents`).
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub categories: Vec<String>,
    pub statuses: Vec<String>,
    pub year: Option<String>,
}

impl DocumentFilter {
    pub fn compile(&self) -> SqlFilter {
        let mut out = SqlFilter::default();
        if !self.categories.is_empty() {
            out.push(
                format!(
                    "COALESCE(document_category,'Uncategorized') IN ({})",
                    placeholders(self.categories.len())
                ),
                self.categories.iter().map(|v| Value::Text(v.clone())).collect::<Vec<_>>(),
            );
        }
        if !self.statuses.is_empty() {
            out.push(
                format!(
                    "COALESCE(download_status,'unknown') IN ({})",
                    placeholders(self.statuses.len())
                ),
                self.statuses.iter().map(|v| Value::Text(v.clone())).collect::<Vec<_>>(),
            );
        }
        if let Some(year) = non_empty(&self.year) {
            out.push("COALESCE(document_date,'') LIKE ?", vec![like_pattern(year)]);
        }
        out
    }
}

/// Qualifications page filter (`site_qualification_results`).
#[derive(Debug, Clone, Default)]
pub struct QualificationFilter {
    pub tiers: Vec<String>,
    pub qualified: Tri,
}

impl QualificationFilter {
    pub fn compile(&self) -> SqlFilter {
        let mut out = SqlFilter::default();
        if !self.tiers.is_empty() {
            out.push(
                format!(
                    "COALESCE(qualification_tier,'UNSPECIFIED') IN ({})",
                    placeholders(self.tiers.len())
                ),
                self.tiers.iter().map(|v| Value::Text(v.clone())).collect::<Vec<_>>(),
            );
        }
        if let Some(flag) = self.qualified.as_flag() {
            out.push("qualified = ?", vec![Value::Integer(flag)]);
        }
        out
    }
}

/// Contacts page filter (`site_contacts_summary`).
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub search: Option<String>,
    pub site_ids: Vec<String>,
    pub roles: Vec<String>,
    pub types: Vec<String>,
    pub primary_prospect: Tri,
    pub qualified: Tri,
    pub confidence_range: Option<(f64, f64)>,
    pub priority_range: Option<IntRange>,
}

impl ContactFilter {
    pub fn compile(&self) -> SqlFilter {
        let mut out = SqlFilter::default();

        if let Some(q) = non_empty(&self.search) {
            out.push(
                "(COALESCE(site_name,'') LIKE ? OR COALESCE(site_id,'') LIKE ? OR \
                 COALESCE(contact_name,'') LIKE ? OR COALESCE(organization_name,'') LIKE ? OR \
                 COALESCE(contact_address,'') LIKE ? OR COALESCE(email,'') LIKE ? OR \
                 COALESCE(phone,'') LIKE ?)",
                std::iter::repeat_with(|| like_pattern(q)).take(7).collect::<Vec<_>>(),
            );
        }

        if !self.site_ids.is_empty() {
            out.push(
                format!("site_id IN ({})", placeholders(self.site_ids.len())),
                self.site_ids.iter().map(|v| Value::Text(v.clone())).collect::<Vec<_>>(),
            );
        }

        if !self.roles.is_empty() {
            out.push(
                format!("contact_role IN ({})", placeholders(self.roles.len())),
                self.roles.iter().map(|v| Value::Text(v.clone())).collect::<Vec<_>>(),
            );
        }

        if !self.types.is_empty() {
            out.push(
                format!("contact_type IN ({})", placeholders(self.types.len())),
                self.types.iter().map(|v| Value::Text(v.clone())).collect::<Vec<_>>(),
            );
        }

        if let Some(flag) = self.primary_prospect.as_flag() {
            out.push("COALESCE(is_primary_prospect,0) = ?", vec![Value::Integer(flag)]);
        }

        if let Some(flag) = self.qualified.as_flag() {
            out.push("COALESCE(qualified,0) = ?", vec![Value::Integer(flag)]);
        }

        if let Some((lo, hi)) = self.confidence_range {
            out.push(
                "COALESCE(confidence_score,0.0) BETWEEN ? AND ?",
                vec![Value::Real(lo), Value::Real(hi)],
            );
        }

        if let Some(range) = self.priority_range {
            out.push(
                "COALESCE(prospect_priority,0) BETWEEN ? AND ?",
                vec![Value::Integer(range.lo), Value::Integer(range.hi)],
            );
        }

        out
    }
}

/// Customer sites page filter. Clauses are qualified with the join aliases
/// used by the customer overview query (`so` = site_overview,
/// `bcm` = box_case_matches).
#[derive(Debug, Clone)]
pub struct CustomerFilter {
    pub sites_per_customer: IntRange,
    pub customers: Vec<String>,
    pub historical_use: Vec<String>,
}

impl CustomerFilter {
    pub fn compile(&self) -> SqlFilter {
        let mut out = SqlFilter::default();

        out.push(
            "bcm.box_case_name IN ( \
             SELECT box_case_name FROM box_case_matches \
             WHERE box_case_name IS NOT NULL AND TRIM(box_case_name) != '' \
             GROUP BY box_case_name \
             HAVING COUNT(*) BETWEEN ? AND ?)",
            vec![
                Value::Integer(self.sites_per_customer.lo),
                Value::Integer(self.sites_per_customer.hi),
            ],
        );

        if !self.customers.is_empty() {
            out.push(
                format!("bcm.box_case_name IN ({})", placeholders(self.customers.len())),
                self.customers.iter().map(|v| Value::Text(v.clone())).collect::<Vec<_>>(),
            );
        }

        if !self.historical_use.is_empty() {
            out.push(
                format!(
                    "so.site_id IN (SELECT site_id FROM sites \
                     WHERE historical_use_category IN ({}))",
                    placeholders(self.historical_use.len())
                ),
                self.historical_use.iter().map(|v| Value::Text(v.clone())).collect::<Vec<_>>(),
            );
        }

        out
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn empty_filter_compiles_to_nothing() {
        let compiled = SiteFilter::default().compile();
        assert_eq!(compiled.where_sql(), "");
        assert!(compiled.params().is_empty());
    }

    #[test]
    fn search_binds_three_patterns() {
        let filter = SiteFilter {
            search: Some("tacoma".to_string()),
            ..SiteFilter::default()
        };
        let compiled = filter.compile();
        assert!(compiled.where_sql().starts_with("WHERE (COALESCE(site_name,'')"));
        assert_eq!(
            compiled.params(),
            &[
                Value::Text("%tacoma%".to_string()),
                Value::Text("%tacoma%".to_string()),
                Value::Text("%tacoma%".to_string()),
            ]
        );
    }

    #[test]
    fn blank_search_is_inactive() {
        let filter = SiteFilter {
            search: Some("   ".to_string()),
            ..SiteFilter::default()
        };
        assert!(filter.compile().is_empty());
    }

    #[test_case(Tri::Any, 0 ; "any emits nothing")]
    #[test_case(Tri::Yes, 1 ; "yes binds one flag")]
    #[test_case(Tri::No, 1 ; "no binds one flag")]
    fn has_documents_tri_state(tri: Tri, expected_binds: usize) {
        let filter = SiteFilter {
            has_documents: tri,
            ..SiteFilter::default()
        };
        let compiled = filter.compile();
        assert_eq!(compiled.params().len(), expected_binds);
        if tri == Tri::Any {
            assert!(compiled.is_empty());
        } else {
            assert_eq!(compiled.where_sql(), "WHERE has_documents = ?");
        }
    }

    #[test]
    fn processed_filter_has_no_binds() {
        let filter = SiteFilter {
            processed: Tri::No,
            ..SiteFilter::default()
        };
        let compiled = filter.compile();
        assert!(compiled.where_sql().contains("site_id NOT IN"));
        assert!(compiled.where_sql().contains("Score Calculation"));
        assert!(compiled.params().is_empty());
    }

    #[test]
    fn media_without_statuses_requires_non_empty_columns() {
        let filter = SiteFilter {
            media: vec![Medium::Groundwater, Medium::Air],
            ..SiteFilter::default()
        };
        let compiled = filter.compile();
        let sql = compiled.where_sql();
        assert!(sql.contains("TRIM(COALESCE(groundwater_status,'')) <> ''"));
        assert!(sql.contains("TRIM(COALESCE(air_status,'')) <> ''"));
        assert!(!sql.contains("sediment_status"));
        assert!(compiled.params().is_empty());
    }

    #[test]
    fn statuses_replicate_across_selected_columns() {
        let filter = SiteFilter {
            media: vec![Medium::Groundwater, Medium::Sediment],
            medium_statuses: vec!["C".to_string(), "S".to_string()],
            ..SiteFilter::default()
        };
        let compiled = filter.compile();
        // two statuses bound once per selected column
        assert_eq!(compiled.params().len(), 4);
        assert!(compiled.where_sql().contains("COALESCE(groundwater_status,'') IN (?,?)"));
        assert!(compiled.where_sql().contains("COALESCE(sediment_status,'') IN (?,?)"));
    }

    #[test]
    fn statuses_without_media_cover_all_columns() {
        let filter = SiteFilter {
            medium_statuses: vec!["C".to_string()],
            ..SiteFilter::default()
        };
        let compiled = filter.compile();
        assert_eq!(compiled.params().len(), Medium::ALL.len());
    }

    #[test]
    fn score_range_binds_both_generations() {
        let filter = SiteFilter {
            score_range: Some(IntRange::new(40, 90)),
            ..SiteFilter::default()
        };
        let compiled = filter.compile();
        assert_eq!(
            compiled.params(),
            &[
                Value::Integer(40),
                Value::Integer(90),
                Value::Integer(40),
                Value::Integer(90),
            ]
        );
        assert!(compiled.where_sql().contains("json_extract"));
    }

    #[test]
    fn combined_filters_join_with_and() {
        let filter = SiteFilter {
            search: Some("mill".to_string()),
            has_documents: Tri::Yes,
            tier: Some("A".to_string()),
            batches: vec!["batch-7".to_string()],
            ..SiteFilter::default()
        };
        let compiled = filter.compile();
        let sql = compiled.where_sql();
        assert!(sql.matches(" AND ").count() >= 3);
        assert_eq!(compiled.params().len(), 3 + 1 + 1 + 1);
        assert!(sql.contains("json_each"));
    }

    #[test]
    fn query_pairs_round_trip() {
        let filter = SiteFilter {
            search: Some("port".to_string()),
            document_search: Some("phase ii".to_string()),
            has_documents: Tri::Yes,
            has_narrative: Tri::No,
            tier: Some("B".to_string()),
            processed: Tri::Yes,
            media: vec![Medium::SurfaceWater],
            medium_statuses: vec!["C".to_string()],
            narrative_range: Some(IntRange::new(1, 12)),
            score_range: Some(IntRange::new(10, 80)),
            age_check_score: Some(50),
            historical_use: vec!["Dry Cleaner".to_string()],
            batches: vec!["batch-1".to_string(), "batch-2".to_string()],
            ..SiteFilter::default()
        };
        let pairs = filter.to_query_pairs();
        let borrowed: Vec<(&str, &str)> =
            pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let parsed = SiteFilter::from_pairs(borrowed);
        assert_eq!(parsed, filter);
    }

    #[test]
    fn from_pairs_ignores_partial_ranges() {
        let parsed = SiteFilter::from_pairs(vec![("narr_min", "3"), ("docs_max", "9")]);
        assert!(parsed.narrative_range.is_none());
        assert!(parsed.document_range.is_none());
    }

    #[test]
    fn from_pairs_ignores_unknown_medium() {
        let parsed = SiteFilter::from_pairs(vec![("medium", "lava"), ("medium", "air")]);
        assert_eq!(parsed.media, vec![Medium::Air]);
    }

    #[test]
    fn int_range_narrowing() {
        assert!(IntRange::new(1, 10).narrows(0, 10));
        assert!(IntRange::new(0, 9).narrows(0, 10));
        assert!(!IntRange::new(0, 10).narrows(0, 10));
    }

    #[test]
    fn contact_filter_search_binds_seven() {
        let filter = ContactFilter {
            search: Some("smith".to_string()),
            ..ContactFilter::default()
        };
        assert_eq!(filter.compile().params().len(), 7);
    }

    #[test]
    fn contact_filter_ranges() {
        let filter = ContactFilter {
            confidence_range: Some((0.25, 0.9)),
            priority_range: Some(IntRange::new(1, 3)),
            ..ContactFilter::default()
        };
        let compiled = filter.compile();
        assert_eq!(
            compiled.params(),
            &[
                Value::Real(0.25),
                Value::Real(0.9),
                Value::Integer(1),
                Value::Integer(3),
            ]
        );
    }

    #[test]
    fn document_filter_clauses() {
        let filter = DocumentFilter {
            categories: vec!["Reports".to_string(), "Permits".to_string()],
            statuses: vec!["success".to_string()],
            year: Some("2018".to_string()),
        };
        let compiled = filter.compile();
        assert!(compiled.where_sql().contains("document_category"));
        assert!(compiled.where_sql().contains("download_status"));
        assert_eq!(compiled.params().len(), 4);
        assert_eq!(compiled.params()[3], Value::Text("%2018%".to_string()));
    }

    #[test]
    fn customer_filter_always_bounds_site_count() {
        let filter = CustomerFilter {
            sites_per_customer: IntRange::new(1, 40),
            customers: vec![],
            historical_use: vec![],
        };
        let compiled = filter.compile();
        assert_eq!(compiled.params().len(), 2);
        assert!(compiled.where_sql().contains("HAVING COUNT(*) BETWEEN ? AND ?"));
    }

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?,?,?");
    }
}
