use async_trait::async_trait;

use super::DatabaseError;
use super::models::{
    BatchRun, CatalogEntry, ColumnInfo, ContactRow, ContactStats, ContaminantCount,
    ContaminantRow, CustomerOption, CustomerSiteRow, DatasetCounts, DocumentMetrics, DocumentRef,
    DocumentRow, EvidenceRecord, ExcludedSiteRow, FeedbackEntry, FeedbackSummaryRow,
    NarrativeSection, OwnershipRecord, QualificationRow, RunSummary, SampleTable, SiteMetrics,
    SiteOption, SiteOverviewRow, SiteProfile, SiteScore, SummaryStats, TierCount,
};
use crate::filter::{
    ContactFilter, CustomerFilter, DocumentFilter, Medium, QualificationFilter, SiteFilter,
};

#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn overview_metrics(&self, filter: &SiteFilter) -> Result<SiteMetrics, DatabaseError>;
    async fn document_metrics(&self, filter: &SiteFilter)
    -> Result<DocumentMetrics, DatabaseError>;
    async fn count_overview(&self, filter: &SiteFilter) -> Result<i64, DatabaseError>;
    async fn overview_page(
        &self,
        filter: &SiteFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SiteOverviewRow>, DatabaseError>;
    async fn site_options(&self, limit: i64) -> Result<Vec<SiteOption>, DatabaseError>;
    async fn site_profile(&self, site_id: &str) -> Result<Option<SiteProfile>, DatabaseError>;
    async fn summary_stats(&self) -> Result<SummaryStats, DatabaseError>;
    async fn historical_use_categories(&self) -> Result<Vec<String>, DatabaseError>;
    async fn historical_use_map(
        &self,
        site_ids: &[String],
    ) -> Result<Vec<(String, Option<String>)>, DatabaseError>;
    async fn age_score_map(
        &self,
        site_ids: &[String],
    ) -> Result<Vec<(String, Option<i64>)>, DatabaseError>;
    async fn ownership_history(
        &self,
        site_id: &str,
    ) -> Result<Vec<OwnershipRecord>, DatabaseError>;
    async fn batch_runs(&self) -> Result<Vec<BatchRun>, DatabaseError>;
    async fn tribal_sites(&self, limit: i64) -> Result<Vec<ExcludedSiteRow>, DatabaseError>;
    async fn dnc_sites(&self, limit: i64) -> Result<Vec<ExcludedSiteRow>, DatabaseError>;
}

#[async_trait]
pub trait NarrativeStore: Send + Sync {
    async fn narrative_site_ids(&self, limit: i64) -> Result<Vec<String>, DatabaseError>;
    async fn sections(&self, site_id: &str) -> Result<Vec<NarrativeSection>, DatabaseError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn categories(&self) -> Result<Vec<String>, DatabaseError>;
    async fn download_statuses(&self) -> Result<Vec<String>, DatabaseError>;
    async fn documents(
        &self,
        filter: &DocumentFilter,
        limit: i64,
    ) -> Result<Vec<DocumentRow>, DatabaseError>;
    async fn site_documents(
        &self,
        site_id: &str,
        limit: i64,
    ) -> Result<Vec<DocumentRow>, DatabaseError>;
    async fn document_refs(&self, site_id: &str) -> Result<Vec<DocumentRef>, DatabaseError>;
    async fn documents_by_ids(&self, ids: &[i64]) -> Result<Vec<DocumentRef>, DatabaseError>;
}

#[async_trait]
pub trait QualificationStore: Send + Sync {
    async fn tiers(&self) -> Result<Vec<String>, DatabaseError>;
    async fn tier_breakdown(&self, filter: &SiteFilter) -> Result<Vec<TierCount>, DatabaseError>;
    async fn rows(
        &self,
        filter: &QualificationFilter,
        limit: i64,
    ) -> Result<Vec<QualificationRow>, DatabaseError>;
    async fn tier_counts(
        &self,
        filter: &QualificationFilter,
    ) -> Result<Vec<TierCount>, DatabaseError>;
    async fn latest_evidence(
        &self,
        site_id: &str,
    ) -> Result<Option<EvidenceRecord>, DatabaseError>;
    async fn latest_run(&self, site_id: &str) -> Result<Option<RunSummary>, DatabaseError>;
    async fn module_json(
        &self,
        run_id: &str,
        module_like: &str,
    ) -> Result<Option<String>, DatabaseError>;
    /// Resolved final scores for a batch of sites: the latest
    /// `site_qualification_results` row wins, sites absent there fall back
    /// to the latest completed orchestration run.
    async fn score_map(&self, site_ids: &[String]) -> Result<Vec<SiteScore>, DatabaseError>;
    /// Age Qualification module score and confidence per site, from the
    /// latest completed run.
    async fn age_check_map(
        &self,
        site_ids: &[String],
    ) -> Result<Vec<(String, Option<i64>, Option<i64>)>, DatabaseError>;
}

#[async_trait]
pub trait ContaminantStore: Send + Sync {
    async fn top_contaminants(
        &self,
        filter: &SiteFilter,
        limit: i64,
    ) -> Result<Vec<ContaminantCount>, DatabaseError>;
    async fn rows(
        &self,
        site_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ContaminantRow>, DatabaseError>;
    async fn medium_statuses(&self, media: &[Medium]) -> Result<Vec<String>, DatabaseError>;
    /// Contaminants with a confirmed/suspected/below-levels status, ordered
    /// by medium significance, for the third-party evidence section.
    async fn status_summary(
        &self,
        site_id: &str,
        limit: i64,
    ) -> Result<Vec<ContaminantRow>, DatabaseError>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn roles(&self) -> Result<Vec<String>, DatabaseError>;
    async fn contact_types(&self) -> Result<Vec<String>, DatabaseError>;
    async fn stats(&self) -> Result<ContactStats, DatabaseError>;
    async fn site_options(&self) -> Result<Vec<SiteOption>, DatabaseError>;
    async fn rows(
        &self,
        filter: &ContactFilter,
        limit: i64,
    ) -> Result<Vec<ContactRow>, DatabaseError>;
    async fn site_rows(
        &self,
        site_id: &str,
        limit: i64,
    ) -> Result<Vec<ContactRow>, DatabaseError>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn site_count_bounds(&self) -> Result<(i64, i64), DatabaseError>;
    async fn customers(&self, min: i64, max: i64) -> Result<Vec<CustomerOption>, DatabaseError>;
    async fn count(&self, filter: &CustomerFilter) -> Result<i64, DatabaseError>;
    async fn page(
        &self,
        filter: &CustomerFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CustomerSiteRow>, DatabaseError>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn summary(&self) -> Result<Vec<FeedbackSummaryRow>, DatabaseError>;
    async fn site_entries(&self, site_id: &str) -> Result<Vec<FeedbackEntry>, DatabaseError>;
    async fn all_entries(&self, limit: i64) -> Result<Vec<FeedbackEntry>, DatabaseError>;
    async fn counts_for(
        &self,
        site_ids: &[String],
    ) -> Result<Vec<(String, i64)>, DatabaseError>;
}

#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn catalog(&self) -> Result<Vec<CatalogEntry>, DatabaseError>;
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError>;
    async fn sample(&self, table: &str, limit: i64) -> Result<SampleTable, DatabaseError>;
    async fn dataset_counts(&self) -> Result<DatasetCounts, DatabaseError>;
    async fn ping(&self) -> Result<(), DatabaseError>;
}
