use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use super::DatabaseError;
use super::sqlite::{
    SharedConnection, SqliteContactStore, SqliteContaminantStore, SqliteCustomerStore,
    SqliteDocumentStore, SqliteFeedbackStore, SqliteNarrativeStore, SqliteQualificationStore,
    SqliteSchemaStore, SqliteSiteStore,
};
use super::stores::{
    ContactStore, ContaminantStore, CustomerStore, DocumentStore, FeedbackStore, NarrativeStore,
    QualificationStore, SchemaStore, SiteStore,
};
use crate::config::DatabaseConfig;

/// Owns the cached read-only connection and hands out store handles.
pub struct DatabaseManager {
    path: PathBuf,
    has_final_recommendation: Arc<AtomicBool>,
    site_store: Arc<dyn SiteStore>,
    narrative_store: Arc<dyn NarrativeStore>,
    document_store: Arc<dyn DocumentStore>,
    qualification_store: Arc<dyn QualificationStore>,
    contaminant_store: Arc<dyn ContaminantStore>,
    contact_store: Arc<dyn ContactStore>,
    customer_store: Arc<dyn CustomerStore>,
    feedback_store: Arc<dyn FeedbackStore>,
    schema_store: Arc<dyn SchemaStore>,
}

impl std::fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("path", &self.path)
            .field(
                "has_final_recommendation",
                &self.has_final_recommendation.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let path = config.path.clone();
        if !path.is_file() {
            return Err(DatabaseError::NotFound(path.display().to_string()));
        }

        let open_path = path.clone();
        let (conn, has_final_recommendation) = tokio::task::spawn_blocking(move || {
            let conn = Connection::open_with_flags(
                &open_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            conn.busy_timeout(Duration::from_secs(5))
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            let has_column = column_exists(&conn, "site_summary", "final_recommendation")
                .unwrap_or(false);
            Ok::<_, DatabaseError>((conn, has_column))
        })
        .await
        .map_err(|e| DatabaseError::Connection(format!("database task failed: {e}")))??;

        info!(path = %path.display(), "opened ecology database read-only");

        let conn: SharedConnection = Arc::new(Mutex::new(conn));
        let has_final_recommendation = Arc::new(AtomicBool::new(has_final_recommendation));

        Ok(Self {
            path,
            site_store: Arc::new(SqliteSiteStore::new(conn.clone())),
            narrative_store: Arc::new(SqliteNarrativeStore::new(conn.clone())),
            document_store: Arc::new(SqliteDocumentStore::new(conn.clone())),
            qualification_store: Arc::new(SqliteQualificationStore::new(
                conn.clone(),
                has_final_recommendation.clone(),
            )),
            contaminant_store: Arc::new(SqliteContaminantStore::new(conn.clone())),
            contact_store: Arc::new(SqliteContactStore::new(conn.clone())),
            customer_store: Arc::new(SqliteCustomerStore::new(conn.clone())),
            feedback_store: Arc::new(SqliteFeedbackStore::new(conn.clone())),
            schema_store: Arc::new(SqliteSchemaStore::new(conn)),
            has_final_recommendation,
        })
    }

    /// Apply the single additive migration this repository owns: make sure
    /// `site_summary.final_recommendation` exists. Runs on a short-lived
    /// read-write connection; on read-only media the dashboard degrades to
    /// the pre-migration column set with a warning.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        if self.has_final_recommendation.load(Ordering::Relaxed) {
            return Ok(());
        }

        let path = self.path.clone();
        let flag = self.has_final_recommendation.clone();
        tokio::task::spawn_blocking(move || {
            let conn = match Connection::open(&path) {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("skipping additive migration, cannot open read-write: {e}");
                    return;
                }
            };
            match column_exists(&conn, "site_summary", "final_recommendation") {
                Ok(true) => flag.store(true, Ordering::Relaxed),
                Ok(false) => {
                    match conn.execute(
                        "ALTER TABLE site_summary ADD COLUMN final_recommendation TEXT",
                        [],
                    ) {
                        Ok(_) => {
                            info!("added site_summary.final_recommendation");
                            flag.store(true, Ordering::Relaxed);
                        }
                        Err(e) => warn!("skipping additive migration: {e}"),
                    }
                }
                Err(e) => warn!("skipping additive migration, column check failed: {e}"),
            }
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?;

        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn site_store(&self) -> Arc<dyn SiteStore> {
        self.site_store.clone()
    }

    pub fn narrative_store(&self) -> Arc<dyn NarrativeStore> {
        self.narrative_store.clone()
    }

    pub fn document_store(&self) -> Arc<dyn DocumentStore> {
        self.document_store.clone()
    }

    pub fn qualification_store(&self) -> Arc<dyn QualificationStore> {
        self.qualification_store.clone()
    }

    pub fn contaminant_store(&self) -> Arc<dyn ContaminantStore> {
        self.contaminant_store.clone()
    }

    pub fn contact_store(&self) -> Arc<dyn ContactStore> {
        self.contact_store.clone()
    }

    pub fn customer_store(&self) -> Arc<dyn CustomerStore> {
        self.customer_store.clone()
    }

    pub fn feedback_store(&self) -> Arc<dyn FeedbackStore> {
        self.feedback_store.clone()
    }

    pub fn schema_store(&self) -> Arc<dyn SchemaStore> {
        self.schema_store.clone()
    }
}

fn column_exists(
    conn: &Connection,
    table: &str,
    column: &str,
) -> Result<bool, rusqlite::Error> {
    let sql = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
    let mut stmt = conn.prepare(&sql)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil;
    use crate::filter::{IntRange, Medium, SiteFilter, Tri};

    async fn open_manager() -> (tempfile::NamedTempFile, DatabaseManager) {
        let file = testutil::fixture_database();
        let config = DatabaseConfig {
            path: file.path().to_path_buf(),
        };
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        (file, manager)
    }

    #[tokio::test]
    async fn missing_file_is_a_startup_error() {
        let config = DatabaseConfig {
            path: PathBuf::from("/nonexistent/ecology_sites.db"),
        };
        let err = DatabaseManager::new(&config).await.expect_err("must fail");
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn migration_adds_final_recommendation() {
        let (file, manager) = open_manager().await;
        // fixture omits the column; migrate() must have added it
        let conn = Connection::open(file.path()).expect("reopen");
        assert!(column_exists(&conn, "site_summary", "final_recommendation").unwrap());
        // and the evidence query can now select it
        let evidence = manager
            .qualification_store()
            .latest_evidence("101")
            .await
            .expect("evidence query")
            .expect("row for site 101");
        assert_eq!(evidence.age_evidence_confidence_score, 50);
        assert!(evidence.final_recommendation.is_none());
    }

    #[tokio::test]
    async fn unfiltered_metrics_count_everything() {
        let (_file, manager) = open_manager().await;
        let metrics = manager
            .site_store()
            .overview_metrics(&SiteFilter::default())
            .await
            .expect("metrics");
        assert_eq!(metrics.total_sites, 4);
        assert_eq!(metrics.sites_with_narratives, 1);
        assert_eq!(metrics.sites_with_documents, 1);
        assert_eq!(metrics.qualified_sites, 1);

        let docs = manager
            .site_store()
            .document_metrics(&SiteFilter::default())
            .await
            .expect("doc metrics");
        assert_eq!(docs.documents, 2);
        assert_eq!(docs.downloaded, 1);
        assert_eq!(docs.flagged, 1);
    }

    #[tokio::test]
    async fn search_filter_narrows_overview() {
        let (_file, manager) = open_manager().await;
        let filter = SiteFilter {
            search: Some("Harbor".to_string()),
            ..SiteFilter::default()
        };
        let count = manager
            .site_store()
            .count_overview(&filter)
            .await
            .expect("count");
        assert_eq!(count, 1);
        let rows = manager
            .site_store()
            .overview_page(&filter, 10, 0)
            .await
            .expect("page");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].site_id, "101");
        assert!(rows[0].has_documents);
    }

    #[tokio::test]
    async fn pagination_is_stable_by_numeric_site_id() {
        let (_file, manager) = open_manager().await;
        let store = manager.site_store();
        let first = store
            .overview_page(&SiteFilter::default(), 2, 0)
            .await
            .expect("page 1");
        let second = store
            .overview_page(&SiteFilter::default(), 2, 2)
            .await
            .expect("page 2");
        assert_eq!(
            first.iter().map(|r| r.site_id.as_str()).collect::<Vec<_>>(),
            vec!["101", "102"]
        );
        assert_eq!(
            second.iter().map(|r| r.site_id.as_str()).collect::<Vec<_>>(),
            vec!["103", "104"]
        );
    }

    #[tokio::test]
    async fn processed_filter_matches_completed_runs() {
        let (_file, manager) = open_manager().await;
        let processed = SiteFilter {
            processed: Tri::Yes,
            ..SiteFilter::default()
        };
        let rows = manager
            .site_store()
            .overview_page(&processed, 10, 0)
            .await
            .expect("processed sites");
        let ids: Vec<&str> = rows.iter().map(|r| r.site_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102", "103"]);

        let unprocessed = SiteFilter {
            processed: Tri::No,
            ..SiteFilter::default()
        };
        let rows = manager
            .site_store()
            .overview_page(&unprocessed, 10, 0)
            .await
            .expect("unprocessed sites");
        let ids: Vec<&str> = rows.iter().map(|r| r.site_id.as_str()).collect();
        assert_eq!(ids, vec!["104"]);
    }

    #[tokio::test]
    async fn medium_filter_uses_contaminant_statuses() {
        let (_file, manager) = open_manager().await;
        let filter = SiteFilter {
            media: vec![Medium::Groundwater],
            medium_statuses: vec!["C".to_string()],
            ..SiteFilter::default()
        };
        let rows = manager
            .site_store()
            .overview_page(&filter, 10, 0)
            .await
            .expect("medium filter");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].site_id, "101");

        let statuses = manager
            .contaminant_store()
            .medium_statuses(&[Medium::Groundwater])
            .await
            .expect("statuses");
        assert_eq!(statuses, vec!["C".to_string()]);
    }

    #[tokio::test]
    async fn score_map_prefers_latest_qualification_result() {
        let (_file, manager) = open_manager().await;
        let ids: Vec<String> = ["101", "102", "103", "104"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let scores = manager
            .qualification_store()
            .score_map(&ids)
            .await
            .expect("score map");
        let by_id: std::collections::HashMap<&str, &crate::db::models::SiteScore> =
            scores.iter().map(|s| (s.site_id.as_str(), s)).collect();

        // 101 has both generations; the qualification-results score wins
        assert_eq!(by_id["101"].score, Some(88));
        // 102 only has a run whose module JSON carries the score
        assert_eq!(by_id["102"].score, Some(61));
        // 103's run has neither module score nor run score; resolves to 0
        assert_eq!(by_id["103"].score, Some(0));
        // 104 was never processed
        assert!(!by_id.contains_key("104"));

        assert_eq!(by_id["101"].last_processed.as_deref(), Some("2024-05-01 10:00"));
    }

    #[tokio::test]
    async fn score_range_filter_spans_both_generations() {
        let (_file, manager) = open_manager().await;
        let filter = SiteFilter {
            score_range: Some(IntRange::new(60, 100)),
            ..SiteFilter::default()
        };
        let rows = manager
            .site_store()
            .overview_page(&filter, 10, 0)
            .await
            .expect("score filter");
        let ids: Vec<&str> = rows.iter().map(|r| r.site_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102"]);
    }

    #[tokio::test]
    async fn tier_breakdown_counts_rows() {
        let (_file, manager) = open_manager().await;
        let tiers = manager
            .qualification_store()
            .tier_breakdown(&SiteFilter::default())
            .await
            .expect("tiers");
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers[0].tier, "A");
        assert_eq!(tiers[0].count, 1);
    }

    #[tokio::test]
    async fn document_filter_by_category_and_status() {
        let (_file, manager) = open_manager().await;
        let filter = crate::filter::DocumentFilter {
            categories: vec!["Reports".to_string()],
            statuses: vec!["success".to_string()],
            year: Some("1998".to_string()),
        };
        let rows = manager
            .document_store()
            .documents(&filter, 100)
            .await
            .expect("documents");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].document_title.as_deref(), Some("Phase I Assessment"));
        assert!(rows[0].flagged_for_analysis);
    }

    #[tokio::test]
    async fn site_documents_order_successful_downloads_first() {
        let (_file, manager) = open_manager().await;
        let rows = manager
            .document_store()
            .site_documents("101", 10)
            .await
            .expect("site documents");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].download_status.as_deref(), Some("success"));
        assert_eq!(rows[1].download_status.as_deref(), Some("failed"));
    }

    #[tokio::test]
    async fn narrative_sections_come_back_ordered() {
        let (_file, manager) = open_manager().await;
        let sections = manager
            .narrative_store()
            .sections("101")
            .await
            .expect("sections");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].section_order, 1);
        assert_eq!(sections[0].section_title.as_deref(), Some("Site History"));
        assert_eq!(sections[1].section_order, 2);
    }

    #[tokio::test]
    async fn contact_search_matches_organization() {
        let (_file, manager) = open_manager().await;
        let filter = crate::filter::ContactFilter {
            search: Some("Puget".to_string()),
            ..crate::filter::ContactFilter::default()
        };
        let rows = manager
            .contact_store()
            .rows(&filter, 100)
            .await
            .expect("contacts");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contact_name.as_deref(), Some("Dana Smith"));
        assert!(rows[0].is_primary_prospect);
    }

    #[tokio::test]
    async fn exclusion_lists_match_expected_sites() {
        let (_file, manager) = open_manager().await;
        let tribal = manager.site_store().tribal_sites(100).await.expect("tribal");
        assert_eq!(tribal.len(), 1);
        assert_eq!(tribal[0].site_id, "101");

        let dnc = manager.site_store().dnc_sites(100).await.expect("dnc");
        assert_eq!(dnc.len(), 1);
        assert_eq!(dnc[0].site_id, "102");
        assert_eq!(dnc[0].matched_org.as_deref(), Some("GREEN FIELD"));
    }

    #[tokio::test]
    async fn feedback_summary_aggregates_counts() {
        let (_file, manager) = open_manager().await;
        let summary = manager.feedback_store().summary().await.expect("summary");
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].site_id, "101");
        assert_eq!(summary[0].feedback_count, 2);
        assert_eq!(summary[0].age_correct_count, 1);

        let counts = manager
            .feedback_store()
            .counts_for(&["101".to_string(), "102".to_string()])
            .await
            .expect("counts");
        assert_eq!(counts, vec![("101".to_string(), 2)]);
    }

    #[tokio::test]
    async fn batch_filter_matches_sites_in_json_array() {
        let (_file, manager) = open_manager().await;
        let filter = SiteFilter {
            batches: vec!["batch-1".to_string()],
            ..SiteFilter::default()
        };
        let rows = manager
            .site_store()
            .overview_page(&filter, 10, 0)
            .await
            .expect("batch filter");
        let ids: Vec<&str> = rows.iter().map(|r| r.site_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102"]);
    }

    #[tokio::test]
    async fn customer_page_joins_latest_opportunity() {
        let (_file, manager) = open_manager().await;
        let bounds = manager
            .customer_store()
            .site_count_bounds()
            .await
            .expect("bounds");
        let filter = crate::filter::CustomerFilter {
            sites_per_customer: IntRange::new(bounds.0, bounds.1),
            customers: vec![],
            historical_use: vec![],
        };
        let rows = manager
            .customer_store()
            .page(&filter, 10, 0)
            .await
            .expect("customer page");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].site_id, "101");
        assert_eq!(rows[0].box_case_name.as_deref(), Some("Acme Holdings"));
        // two opportunities seeded; the later created_date wins
        assert_eq!(rows[0].sfdc_opportunity_name.as_deref(), Some("Opp-2"));
        assert_eq!(rows[0].sfdc_opportunity_stage.as_deref(), Some("Opportunity Won/Signed"));
    }

    #[tokio::test]
    async fn schema_store_serves_the_data_dictionary() {
        let (_file, manager) = open_manager().await;
        let catalog = manager.schema_store().catalog().await.expect("catalog");
        assert!(catalog.iter().any(|t| t.name == "site_overview"));

        let columns = manager
            .schema_store()
            .columns("site_documents")
            .await
            .expect("columns");
        assert!(columns.iter().any(|c| c.name == "document_title"));

        let sample = manager
            .schema_store()
            .sample("site_overview", 2)
            .await
            .expect("sample");
        assert_eq!(sample.rows.len(), 2);
        assert_eq!(sample.columns[0], "site_id");

        manager.schema_store().ping().await.expect("ping");
    }
}
