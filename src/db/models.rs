//! Row types read from the ecology database.
//!
//! The schema is externally owned: dates arrive as free-form TEXT, booleans
//! as 0/1 integers, and site ids as TEXT. Fields stay close to the storage
//! shape and are normalized at render time.

use serde::Serialize;

/// One row of the `site_overview` listing.
#[derive(Debug, Clone, Serialize)]
pub struct SiteOverviewRow {
    pub site_id: String,
    pub site_name: Option<String>,
    pub site_address: Option<String>,
    pub total_documents: i64,
    pub total_contaminants: i64,
    pub has_documents: bool,
    pub has_contaminants: bool,
    pub scrape_status: Option<String>,
    pub status_icon: Option<String>,
}

/// Headline counters for a filtered site set.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SiteMetrics {
    pub total_sites: i64,
    pub sites_with_narratives: i64,
    pub sites_with_documents: i64,
    pub qualified_sites: i64,
}

/// Document counters for a filtered site set.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DocumentMetrics {
    pub documents: i64,
    pub downloaded: i64,
    pub flagged: i64,
}

/// Global bounds for the numeric slider filters, from `site_summary`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SummaryStats {
    pub narrative_min: i64,
    pub narrative_max: i64,
    pub documents_min: i64,
    pub documents_max: i64,
    pub span_min: i64,
    pub span_max: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierCount {
    pub tier: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContaminantCount {
    pub contaminant_type: String,
    pub count: i64,
}

/// Site picker entry.
#[derive(Debug, Clone, Serialize)]
pub struct SiteOption {
    pub site_id: String,
    pub site_name: Option<String>,
    pub site_address: Option<String>,
}

/// Full header record for the site detail page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteProfile {
    pub site_id: String,
    pub site_name: Option<String>,
    pub site_address: Option<String>,
    pub regional_office: Option<String>,
    pub office_phone: Option<String>,
    pub cleanup_program_type: Option<String>,
    pub site_report_url: Option<String>,
    pub neighborhood_map_url: Option<String>,
    pub url: Option<String>,
    pub total_documents: i64,
    pub total_contaminants: i64,
    pub has_documents: bool,
    pub found_documents: bool,
    pub has_contaminants: bool,
    pub scrape_status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NarrativeSection {
    pub section_order: i64,
    pub section_title: Option<String>,
    pub section_content: Option<String>,
    pub scraped_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRow {
    pub id: i64,
    pub site_id: Option<String>,
    pub document_category: Option<String>,
    pub document_title: Option<String>,
    pub document_date: Option<String>,
    pub document_type: Option<String>,
    pub document_url: Option<String>,
    pub download_status: Option<String>,
    pub flagged_for_analysis: bool,
    pub file_extension: Option<String>,
    pub file_size_bytes: Option<i64>,
}

/// Minimal document reference for linking evidence to source documents.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRef {
    pub id: i64,
    pub document_title: Option<String>,
    pub document_date: Option<String>,
    pub document_type: Option<String>,
    pub document_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualificationRow {
    pub id: i64,
    pub site_id: String,
    pub qualified: bool,
    pub qualification_tier: Option<String>,
    pub confidence_score: Option<f64>,
    pub document_type_analyzed: Option<String>,
    pub document_quality_score: Option<f64>,
    pub analyzed_at: Option<String>,
}

/// Latest qualification evidence for one site, joined with the summary
/// confidence columns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceRecord {
    pub age_evidence: Option<String>,
    pub third_party_evidence: Option<String>,
    pub qualified: bool,
    pub disqualifying_factors: Option<String>,
    pub age_qualified: Option<bool>,
    pub third_party_qualified: Option<bool>,
    pub age_evidence_confidence_score: i64,
    pub third_party_confidence_score: i64,
    pub age_evidence_source: Option<String>,
    pub final_recommendation: Option<String>,
}

/// Latest completed orchestration run for a site.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub final_status: Option<String>,
    pub final_score: Option<i64>,
    pub total_processing_time_seconds: Option<f64>,
}

/// Resolved final score for one site (see `QualificationStore::score_map`).
#[derive(Debug, Clone, Serialize)]
pub struct SiteScore {
    pub site_id: String,
    pub score: Option<i64>,
    pub last_processed: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContaminantRow {
    pub site_id: Option<String>,
    pub contaminant_type: Option<String>,
    pub soil_status: Option<String>,
    pub groundwater_status: Option<String>,
    pub surface_water_status: Option<String>,
    pub air_status: Option<String>,
    pub sediment_status: Option<String>,
    pub bedrock_status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactRow {
    pub site_id: String,
    pub site_name: Option<String>,
    pub contact_name: Option<String>,
    pub organization_name: Option<String>,
    pub contact_address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub contact_type: Option<String>,
    pub contact_role: Option<String>,
    pub is_primary_prospect: bool,
    pub prospect_priority: Option<i64>,
    pub confidence_score: Option<f64>,
    pub site_url: Option<String>,
}

/// Bounds for the contact confidence/priority sliders.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ContactStats {
    pub confidence_min: f64,
    pub confidence_max: f64,
    pub priority_min: i64,
    pub priority_max: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnershipRecord {
    pub ownership_start_year: Option<i64>,
    pub ownership_end_year: Option<i64>,
    pub ownership_duration_years: Option<i64>,
    pub owner_name: Option<String>,
    pub organization_name: Option<String>,
    pub is_current: bool,
    pub acquired_from: Option<String>,
    pub sold_to: Option<String>,
    pub acquisition_type: Option<String>,
    pub business_name: Option<String>,
    pub business_type: Option<String>,
    pub operated_business: bool,
    pub operation_start_year: Option<i64>,
    pub operation_end_year: Option<i64>,
    pub parent_company: Option<String>,
    pub successor_company: Option<String>,
    pub assumes_prior_liabilities: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackSummaryRow {
    pub site_id: String,
    pub site_name: Option<String>,
    pub site_address: Option<String>,
    pub feedback_count: i64,
    pub latest_feedback: Option<String>,
    pub age_correct_count: i64,
    pub third_party_correct_count: i64,
    pub document_correct_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackEntry {
    pub run_id: String,
    pub site_id: String,
    pub site_name: Option<String>,
    pub site_address: Option<String>,
    pub age_correct: Option<bool>,
    pub age_feedback: Option<String>,
    pub third_party_correct: Option<bool>,
    pub third_party_feedback: Option<String>,
    pub document_selection_correct: Option<bool>,
    pub document_selection_feedback: Option<String>,
    pub selected_documents_shown: Option<String>,
    pub overall_notes: Option<String>,
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerSiteRow {
    pub site_id: String,
    pub county: Option<String>,
    pub site_name: Option<String>,
    pub site_address: Option<String>,
    pub sfdc_lead_url: Option<String>,
    pub site_status: Option<String>,
    pub sfdc_opportunity_name: Option<String>,
    pub sfdc_opportunity_stage: Option<String>,
    pub box_case_name: Option<String>,
    pub matched_via_contact: Option<String>,
    pub matched_via_org: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerOption {
    pub box_case_name: String,
    pub site_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRun {
    pub batch_name: String,
    pub batch_description: Option<String>,
    pub run_date: Option<String>,
    pub total_sites: Option<i64>,
    pub successful_sites: Option<i64>,
}

/// Row on the filtered-out page (tribal or Do-Not-Contact tabs).
#[derive(Debug, Clone, Serialize)]
pub struct ExcludedSiteRow {
    pub site_id: String,
    pub site_name: Option<String>,
    pub site_address: Option<String>,
    pub matched_org: Option<String>,
}

/// Catalog entry from `sqlite_master`.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub kind: String,
}

/// One column from `PRAGMA table_info`.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    pub col_type: String,
    pub notnull: bool,
    pub default_value: Option<String>,
    pub pk: bool,
}

/// Untyped sample of a table, for the data dictionary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SampleTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Row counts for the status endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DatasetCounts {
    pub sites: i64,
    pub documents: i64,
    pub narratives: i64,
    pub contacts: i64,
}

/// Confidence histogram bucket for the qualifications page.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramBucket {
    pub label: String,
    pub count: i64,
}
