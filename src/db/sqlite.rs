//! SQLite implementations of the domain stores.
//!
//! All queries run against one cached read-only connection, serialized
//! behind a lock and executed on the blocking thread pool. Dynamic WHERE
//! clauses come pre-compiled from the filter module; everything user-typed
//! is bound, never spliced.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, params_from_iter};

use super::DatabaseError;
use super::models::{
    BatchRun, CatalogEntry, ColumnInfo, ContactRow, ContactStats, ContaminantCount,
    ContaminantRow, CustomerOption, CustomerSiteRow, DatasetCounts, DocumentMetrics, DocumentRef,
    DocumentRow, EvidenceRecord, ExcludedSiteRow, FeedbackEntry, FeedbackSummaryRow,
    NarrativeSection, OwnershipRecord, QualificationRow, RunSummary, SampleTable, SiteMetrics,
    SiteOption, SiteOverviewRow, SiteProfile, SiteScore, SummaryStats, TierCount,
};
use super::stores::{
    ContactStore, ContaminantStore, CustomerStore, DocumentStore, FeedbackStore, NarrativeStore,
    QualificationStore, SchemaStore, SiteStore,
};
use crate::filter::{
    ContactFilter, CustomerFilter, DocumentFilter, Medium, QualificationFilter, SiteFilter,
    placeholders,
};
use crate::qualification;

pub type SharedConnection = Arc<Mutex<Connection>>;

/// Run a closure against the cached connection on the blocking pool.
async fn with_conn<T, F>(conn: &SharedConnection, f: F) -> Result<T, DatabaseError>
where
    F: FnOnce(&Connection) -> Result<T, DatabaseError> + Send + 'static,
    T: Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let guard = conn.lock();
        f(&guard)
    })
    .await
    .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
}

fn text_values(items: &[String]) -> Vec<Value> {
    items.iter().map(|v| Value::Text(v.clone())).collect()
}

fn opt_flag(value: Option<i64>) -> Option<bool> {
    value.map(|v| v != 0)
}

/// Normalize a stored timestamp to `YYYY-MM-DD HH:MM` for display.
fn short_timestamp(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, fmt) {
            return dt.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    trimmed.to_string()
}

/// Quote an identifier for interpolation into PRAGMA/SELECT statements.
/// Only catalog-validated names reach this point.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct SqliteSiteStore {
    conn: SharedConnection,
}

impl SqliteSiteStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SiteStore for SqliteSiteStore {
    async fn overview_metrics(&self, filter: &SiteFilter) -> Result<SiteMetrics, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "WITH filtered_sites AS (SELECT site_id FROM site_overview {where_sql}) \
             SELECT \
               (SELECT COUNT(*) FROM filtered_sites) AS total_sites, \
               (SELECT COUNT(*) FROM filtered_sites fs JOIN site_summary ss USING(site_id) \
                WHERE COALESCE(ss.has_narrative_content,0)=1) AS sites_with_narratives, \
               (SELECT COUNT(*) FROM filtered_sites fs JOIN site_summary ss USING(site_id) \
                WHERE COALESCE(ss.has_documents,0)=1) AS sites_with_documents, \
               (SELECT COUNT(DISTINCT sqr.site_id) FROM site_qualification_results sqr \
                JOIN filtered_sites fs ON fs.site_id = sqr.site_id \
                WHERE COALESCE(sqr.qualified,0)=1) AS qualified_sites",
            where_sql = compiled.where_sql()
        );
        let params = compiled.clone_params();
        with_conn(&self.conn, move |conn| {
            let metrics = conn.query_row(&sql, params_from_iter(params), |row| {
                Ok(SiteMetrics {
                    total_sites: row.get(0)?,
                    sites_with_narratives: row.get(1)?,
                    sites_with_documents: row.get(2)?,
                    qualified_sites: row.get(3)?,
                })
            })?;
            Ok(metrics)
        })
        .await
    }

    async fn document_metrics(
        &self,
        filter: &SiteFilter,
    ) -> Result<DocumentMetrics, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "WITH filtered_sites AS (SELECT site_id FROM site_overview {where_sql}) \
             SELECT COUNT(*) AS documents, \
                    COALESCE(SUM(CASE WHEN download_status='success' THEN 1 ELSE 0 END),0) AS downloaded, \
                    COALESCE(SUM(CASE WHEN flagged_for_analysis THEN 1 ELSE 0 END),0) AS flagged \
             FROM site_documents \
             WHERE site_id IN (SELECT site_id FROM filtered_sites)",
            where_sql = compiled.where_sql()
        );
        let params = compiled.clone_params();
        with_conn(&self.conn, move |conn| {
            let metrics = conn.query_row(&sql, params_from_iter(params), |row| {
                Ok(DocumentMetrics {
                    documents: row.get(0)?,
                    downloaded: row.get(1)?,
                    flagged: row.get(2)?,
                })
            })?;
            Ok(metrics)
        })
        .await
    }

    async fn count_overview(&self, filter: &SiteFilter) -> Result<i64, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "SELECT COUNT(*) FROM site_overview {where_sql}",
            where_sql = compiled.where_sql()
        );
        let params = compiled.clone_params();
        with_conn(&self.conn, move |conn| {
            let count = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
            Ok(count)
        })
        .await
    }

    async fn overview_page(
        &self,
        filter: &SiteFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SiteOverviewRow>, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "SELECT site_id, site_name, site_address, total_documents, total_contaminants, \
                    has_documents, has_contaminants, scrape_status, status_icon \
             FROM site_overview {where_sql} \
             ORDER BY CAST(site_id AS INTEGER) \
             LIMIT ? OFFSET ?",
            where_sql = compiled.where_sql()
        );
        let mut params = compiled.clone_params();
        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok(SiteOverviewRow {
                        site_id: row.get(0)?,
                        site_name: row.get(1)?,
                        site_address: row.get(2)?,
                        total_documents: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                        total_contaminants: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                        has_documents: opt_flag(row.get(5)?).unwrap_or(false),
                        has_contaminants: opt_flag(row.get(6)?).unwrap_or(false),
                        scrape_status: row.get(7)?,
                        status_icon: row.get(8)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn site_options(&self, limit: i64) -> Result<Vec<SiteOption>, DatabaseError> {
        let sql = "SELECT s.site_id, \
                          COALESCE(ss.site_name,'') AS site_name, \
                          COALESCE(ss.site_address,'') AS site_address \
                   FROM sites s \
                   LEFT JOIN site_summary ss ON s.site_id = ss.site_id \
                   ORDER BY CAST(s.site_id AS INTEGER) \
                   LIMIT ?"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(SiteOption {
                        site_id: row.get(0)?,
                        site_name: row.get(1)?,
                        site_address: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn site_profile(&self, site_id: &str) -> Result<Option<SiteProfile>, DatabaseError> {
        let site_id = site_id.to_string();
        let sql = "SELECT site_id, site_name, site_address, regional_office, office_phone, \
                          cleanup_program_type, site_report_url, neighborhood_map_url, url, \
                          total_documents, total_contaminants, has_documents, found_documents, \
                          has_contaminants, scrape_status \
                   FROM site_overview WHERE site_id = ?"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let profile = conn
                .query_row(&sql, [&site_id], |row| {
                    Ok(SiteProfile {
                        site_id: row.get(0)?,
                        site_name: row.get(1)?,
                        site_address: row.get(2)?,
                        regional_office: row.get(3)?,
                        office_phone: row.get(4)?,
                        cleanup_program_type: row.get(5)?,
                        site_report_url: row.get(6)?,
                        neighborhood_map_url: row.get(7)?,
                        url: row.get(8)?,
                        total_documents: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
                        total_contaminants: row.get::<_, Option<i64>>(10)?.unwrap_or(0),
                        has_documents: opt_flag(row.get(11)?).unwrap_or(false),
                        found_documents: opt_flag(row.get(12)?).unwrap_or(false),
                        has_contaminants: opt_flag(row.get(13)?).unwrap_or(false),
                        scrape_status: row.get(14)?,
                    })
                })
                .optional()?;
            Ok(profile)
        })
        .await
    }

    async fn summary_stats(&self) -> Result<SummaryStats, DatabaseError> {
        let sql = "SELECT \
                     MIN(COALESCE(total_narrative_sections,0)), MAX(COALESCE(total_narrative_sections,0)), \
                     MIN(COALESCE(total_documents,0)), MAX(COALESCE(total_documents,0)), \
                     MIN(COALESCE(document_date_range_years,0)), MAX(COALESCE(document_date_range_years,0)) \
                   FROM site_summary"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let stats = conn.query_row(&sql, [], |row| {
                Ok(SummaryStats {
                    narrative_min: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                    narrative_max: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    documents_min: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    documents_max: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                    span_min: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                    span_max: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                })
            })?;
            Ok(stats)
        })
        .await
    }

    async fn historical_use_categories(&self) -> Result<Vec<String>, DatabaseError> {
        let sql = "SELECT DISTINCT historical_use_category FROM sites \
                   WHERE historical_use_category IS NOT NULL \
                     AND TRIM(historical_use_category) != '' \
                   ORDER BY historical_use_category"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn historical_use_map(
        &self,
        site_ids: &[String],
    ) -> Result<Vec<(String, Option<String>)>, DatabaseError> {
        if site_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT site_id, historical_use_category FROM sites WHERE site_id IN ({})",
            placeholders(site_ids.len())
        );
        let params = text_values(site_ids);
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn age_score_map(
        &self,
        site_ids: &[String],
    ) -> Result<Vec<(String, Option<i64>)>, DatabaseError> {
        if site_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT site_id, age_evidence_confidence_score FROM site_summary \
             WHERE site_id IN ({})",
            placeholders(site_ids.len())
        );
        let params = text_values(site_ids);
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn ownership_history(
        &self,
        site_id: &str,
    ) -> Result<Vec<OwnershipRecord>, DatabaseError> {
        let site_id = site_id.to_string();
        let sql = "SELECT ownership_start_year, ownership_end_year, ownership_duration_years, \
                          owner_name, organization_name, is_current, acquired_from, sold_to, \
                          acquisition_type, business_name, business_type, operated_business, \
                          operation_start_year, operation_end_year, parent_company, \
                          successor_company, assumes_prior_liabilities \
                   FROM site_ownership_history \
                   WHERE site_id = ? \
                   ORDER BY COALESCE(ownership_start_year, 9999), ownership_start_date"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([&site_id], |row| {
                    Ok(OwnershipRecord {
                        ownership_start_year: row.get(0)?,
                        ownership_end_year: row.get(1)?,
                        ownership_duration_years: row.get(2)?,
                        owner_name: row.get(3)?,
                        organization_name: row.get(4)?,
                        is_current: opt_flag(row.get(5)?).unwrap_or(false),
                        acquired_from: row.get(6)?,
                        sold_to: row.get(7)?,
                        acquisition_type: row.get(8)?,
                        business_name: row.get(9)?,
                        business_type: row.get(10)?,
                        operated_business: opt_flag(row.get(11)?).unwrap_or(false),
                        operation_start_year: row.get(12)?,
                        operation_end_year: row.get(13)?,
                        parent_company: row.get(14)?,
                        successor_company: row.get(15)?,
                        assumes_prior_liabilities: opt_flag(row.get(16)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn batch_runs(&self) -> Result<Vec<BatchRun>, DatabaseError> {
        let sql = "SELECT DISTINCT batch_name, batch_description, \
                          datetime(started_at, 'localtime') AS run_date, \
                          total_sites, successful_sites \
                   FROM batch_runs ORDER BY batch_name"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(BatchRun {
                        batch_name: row.get(0)?,
                        batch_description: row.get(1)?,
                        run_date: row.get(2)?,
                        total_sites: row.get(3)?,
                        successful_sites: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn tribal_sites(&self, limit: i64) -> Result<Vec<ExcludedSiteRow>, DatabaseError> {
        let sql = "SELECT DISTINCT s.site_id, s.site_name, s.site_address \
                   FROM site_overview s \
                   WHERE s.site_id IN ( \
                       SELECT site_id FROM site_qualification_results \
                       WHERE COALESCE(tribal_site,0)=1) \
                   ORDER BY CAST(s.site_id AS INTEGER) LIMIT ?"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(ExcludedSiteRow {
                        site_id: row.get(0)?,
                        site_name: row.get(1)?,
                        site_address: row.get(2)?,
                        matched_org: None,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn dnc_sites(&self, limit: i64) -> Result<Vec<ExcludedSiteRow>, DatabaseError> {
        let sql = "SELECT DISTINCT s.site_id, s.site_name, s.site_address, \
                          d.organization_name AS matched_org \
                   FROM site_overview s \
                   JOIN \"Do_Not_Contact_Sites\" d \
                     ON UPPER(TRIM(COALESCE(s.site_name,''))) = UPPER(TRIM(COALESCE(d.organization_name,''))) \
                     OR UPPER(TRIM(COALESCE(s.site_address,''))) = UPPER(TRIM(COALESCE(d.site_address,''))) \
                   WHERE COALESCE(d.active,1)=1 \
                   ORDER BY CAST(s.site_id AS INTEGER) LIMIT ?"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(ExcludedSiteRow {
                        site_id: row.get(0)?,
                        site_name: row.get(1)?,
                        site_address: row.get(2)?,
                        matched_org: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

pub struct SqliteNarrativeStore {
    conn: SharedConnection,
}

impl SqliteNarrativeStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl NarrativeStore for SqliteNarrativeStore {
    async fn narrative_site_ids(&self, limit: i64) -> Result<Vec<String>, DatabaseError> {
        let sql = "SELECT DISTINCT site_id FROM site_narratives \
                   ORDER BY CAST(site_id AS INTEGER) LIMIT ?"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn sections(&self, site_id: &str) -> Result<Vec<NarrativeSection>, DatabaseError> {
        let site_id = site_id.to_string();
        let sql = "SELECT section_order, section_title, section_content, scraped_at \
                   FROM site_narratives WHERE site_id = ? \
                   ORDER BY section_order, scraped_at"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([&site_id], |row| {
                    Ok(NarrativeSection {
                        section_order: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                        section_title: row.get(1)?,
                        section_content: row.get(2)?,
                        scraped_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

pub struct SqliteDocumentStore {
    conn: SharedConnection,
}

impl SqliteDocumentStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn map_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
        Ok(DocumentRow {
            id: row.get(0)?,
            site_id: row.get(1)?,
            document_category: row.get(2)?,
            document_title: row.get(3)?,
            document_date: row.get(4)?,
            document_type: row.get(5)?,
            document_url: row.get(6)?,
            download_status: row.get(7)?,
            flagged_for_analysis: opt_flag(row.get(8)?).unwrap_or(false),
            file_extension: row.get(9)?,
            file_size_bytes: row.get(10)?,
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn categories(&self) -> Result<Vec<String>, DatabaseError> {
        let sql = "SELECT DISTINCT COALESCE(document_category,'Uncategorized') AS c \
                   FROM site_documents ORDER BY c"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn download_statuses(&self) -> Result<Vec<String>, DatabaseError> {
        let sql = "SELECT DISTINCT COALESCE(download_status,'unknown') AS s \
                   FROM site_documents ORDER BY s"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn documents(
        &self,
        filter: &DocumentFilter,
        limit: i64,
    ) -> Result<Vec<DocumentRow>, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "SELECT id, site_id, document_category, document_title, document_date, \
                    document_type, document_url, download_status, flagged_for_analysis, \
                    file_extension, file_size_bytes \
             FROM site_documents {where_sql} \
             ORDER BY id DESC LIMIT ?",
            where_sql = compiled.where_sql()
        );
        let mut params = compiled.clone_params();
        params.push(Value::Integer(limit));
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), Self::map_document)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn site_documents(
        &self,
        site_id: &str,
        limit: i64,
    ) -> Result<Vec<DocumentRow>, DatabaseError> {
        let params = vec![Value::Text(site_id.to_string()), Value::Integer(limit)];
        let sql = "SELECT id, site_id, document_category, document_title, document_date, \
                          document_type, document_url, download_status, flagged_for_analysis, \
                          file_extension, file_size_bytes \
                   FROM site_documents WHERE site_id = ? \
                   ORDER BY CASE WHEN download_status = 'success' THEN 0 ELSE 1 END ASC, id DESC \
                   LIMIT ?"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), Self::map_document)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn document_refs(&self, site_id: &str) -> Result<Vec<DocumentRef>, DatabaseError> {
        let site_id = site_id.to_string();
        let sql = "SELECT id, document_title, document_date, document_type, document_url \
                   FROM site_documents WHERE site_id = ?"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([&site_id], |row| {
                    Ok(DocumentRef {
                        id: row.get(0)?,
                        document_title: row.get(1)?,
                        document_date: row.get(2)?,
                        document_type: row.get(3)?,
                        document_url: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn documents_by_ids(&self, ids: &[i64]) -> Result<Vec<DocumentRef>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, document_title, document_date, document_type, document_url \
             FROM site_documents WHERE id IN ({})",
            placeholders(ids.len())
        );
        let params: Vec<Value> = ids.iter().map(|id| Value::Integer(*id)).collect();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok(DocumentRef {
                        id: row.get(0)?,
                        document_title: row.get(1)?,
                        document_date: row.get(2)?,
                        document_type: row.get(3)?,
                        document_url: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

pub struct SqliteQualificationStore {
    conn: SharedConnection,
    has_final_recommendation: Arc<AtomicBool>,
}

impl SqliteQualificationStore {
    pub fn new(conn: SharedConnection, has_final_recommendation: Arc<AtomicBool>) -> Self {
        Self {
            conn,
            has_final_recommendation,
        }
    }
}

#[async_trait]
impl QualificationStore for SqliteQualificationStore {
    async fn tiers(&self) -> Result<Vec<String>, DatabaseError> {
        let sql = "SELECT DISTINCT COALESCE(qualification_tier,'UNSPECIFIED') AS t \
                   FROM site_qualification_results ORDER BY t"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn tier_breakdown(&self, filter: &SiteFilter) -> Result<Vec<TierCount>, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "WITH filtered_sites AS (SELECT site_id FROM site_overview {where_sql}) \
             SELECT COALESCE(qualification_tier,'UNSPECIFIED') AS tier, COUNT(*) AS count \
             FROM site_qualification_results \
             WHERE site_id IN (SELECT site_id FROM filtered_sites) \
             GROUP BY COALESCE(qualification_tier,'UNSPECIFIED') \
             ORDER BY count DESC",
            where_sql = compiled.where_sql()
        );
        let params = compiled.clone_params();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok(TierCount {
                        tier: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn rows(
        &self,
        filter: &QualificationFilter,
        limit: i64,
    ) -> Result<Vec<QualificationRow>, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "SELECT id, site_id, qualified, qualification_tier, confidence_score, \
                    document_type_analyzed, document_quality_score, analyzed_at \
             FROM site_qualification_results {where_sql} \
             ORDER BY analyzed_at DESC LIMIT ?",
            where_sql = compiled.where_sql()
        );
        let mut params = compiled.clone_params();
        params.push(Value::Integer(limit));
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok(QualificationRow {
                        id: row.get(0)?,
                        site_id: row.get(1)?,
                        qualified: opt_flag(row.get(2)?).unwrap_or(false),
                        qualification_tier: row.get(3)?,
                        confidence_score: row.get(4)?,
                        document_type_analyzed: row.get(5)?,
                        document_quality_score: row.get(6)?,
                        analyzed_at: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn tier_counts(
        &self,
        filter: &QualificationFilter,
    ) -> Result<Vec<TierCount>, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "SELECT COALESCE(qualification_tier,'UNSPECIFIED') AS tier, COUNT(*) AS n \
             FROM site_qualification_results {where_sql} \
             GROUP BY COALESCE(qualification_tier,'UNSPECIFIED') \
             ORDER BY n DESC",
            where_sql = compiled.where_sql()
        );
        let params = compiled.clone_params();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok(TierCount {
                        tier: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn latest_evidence(
        &self,
        site_id: &str,
    ) -> Result<Option<EvidenceRecord>, DatabaseError> {
        let site_id = site_id.to_string();
        let recommendation_column = if self.has_final_recommendation.load(Ordering::Relaxed) {
            "ss.final_recommendation"
        } else {
            "NULL"
        };
        let sql = format!(
            "SELECT sqr.age_evidence, sqr.third_party_evidence, sqr.qualified, \
                    sqr.disqualifying_factors, sqr.age_qualified, sqr.third_party_qualified, \
                    ss.age_evidence_confidence_score, ss.third_party_confidence_score, \
                    ss.age_evidence_source, {recommendation_column} AS final_recommendation \
             FROM site_qualification_results sqr \
             LEFT JOIN site_summary ss ON ss.site_id = sqr.site_id \
             WHERE sqr.site_id = ? \
             ORDER BY sqr.analyzed_at DESC LIMIT 1"
        );
        with_conn(&self.conn, move |conn| {
            let record = conn
                .query_row(&sql, [&site_id], |row| {
                    Ok(EvidenceRecord {
                        age_evidence: row.get(0)?,
                        third_party_evidence: row.get(1)?,
                        qualified: opt_flag(row.get(2)?).unwrap_or(false),
                        disqualifying_factors: row.get(3)?,
                        age_qualified: opt_flag(row.get(4)?),
                        third_party_qualified: opt_flag(row.get(5)?),
                        age_evidence_confidence_score: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
                        third_party_confidence_score: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
                        age_evidence_source: row.get(8)?,
                        final_recommendation: row.get(9)?,
                    })
                })
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn latest_run(&self, site_id: &str) -> Result<Option<RunSummary>, DatabaseError> {
        let site_id = site_id.to_string();
        let sql = "SELECT run_id, started_at, completed_at, final_status, final_score, \
                          total_processing_time_seconds \
                   FROM orchestration_runs \
                   WHERE site_id = ? AND completed_at IS NOT NULL \
                   ORDER BY completed_at DESC LIMIT 1"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let run = conn
                .query_row(&sql, [&site_id], |row| {
                    Ok(RunSummary {
                        run_id: row.get(0)?,
                        started_at: row.get(1)?,
                        completed_at: row.get(2)?,
                        final_status: row.get(3)?,
                        final_score: row.get(4)?,
                        total_processing_time_seconds: row.get(5)?,
                    })
                })
                .optional()?;
            Ok(run)
        })
        .await
    }

    async fn module_json(
        &self,
        run_id: &str,
        module_like: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let params = vec![
            Value::Text(run_id.to_string()),
            Value::Text(format!("%{module_like}%")),
        ];
        let sql = "SELECT module_result_json FROM orchestration_module_results \
                   WHERE run_id = ? AND module_name LIKE ? LIMIT 1"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let json = conn
                .query_row(&sql, params_from_iter(params), |row| {
                    row.get::<_, Option<String>>(0)
                })
                .optional()?;
            Ok(json.flatten())
        })
        .await
    }

    async fn score_map(&self, site_ids: &[String]) -> Result<Vec<SiteScore>, DatabaseError> {
        if site_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ph = placeholders(site_ids.len());
        let module9_sql = format!(
            "SELECT sqr.site_id, sqr.final_calculated_score, sqr.analyzed_at \
             FROM site_qualification_results sqr \
             WHERE sqr.site_id IN ({ph}) \
               AND sqr.analyzed_at = ( \
                   SELECT MAX(analyzed_at) FROM site_qualification_results \
                   WHERE site_id = sqr.site_id)"
        );
        let fallback_sql = format!(
            "WITH lr AS ( \
                 SELECT or1.site_id, or1.run_id, or1.final_score AS run_final_score, or1.completed_at \
                 FROM orchestration_runs or1 \
                 WHERE or1.site_id IN ({ph}) AND or1.completed_at IS NOT NULL \
             ), picked AS ( \
                 SELECT l1.site_id, l1.run_id, l1.run_final_score, l1.completed_at \
                 FROM lr l1 \
                 JOIN (SELECT site_id, MAX(completed_at) AS mc FROM lr GROUP BY site_id) m \
                   ON m.site_id = l1.site_id AND m.mc = l1.completed_at \
             ) \
             SELECT p.site_id, p.run_final_score, p.completed_at, omr.module_result_json \
             FROM picked p \
             LEFT JOIN orchestration_module_results omr \
               ON omr.run_id = p.run_id AND omr.module_name LIKE '%Score Calculation%'"
        );
        let module9_params = text_values(site_ids);
        let fallback_params = text_values(site_ids);

        with_conn(&self.conn, move |conn| {
            let mut scores: Vec<SiteScore> = Vec::new();
            let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

            let mut stmt = conn.prepare(&module9_sql)?;
            let module9_rows = stmt
                .query_map(params_from_iter(module9_params), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            for (site_id, score, analyzed_at) in module9_rows {
                if seen.insert(site_id.clone()) {
                    scores.push(SiteScore {
                        site_id,
                        score,
                        last_processed: analyzed_at.as_deref().map(short_timestamp),
                    });
                }
            }

            let mut stmt = conn.prepare(&fallback_sql)?;
            let fallback_rows = stmt
                .query_map(params_from_iter(fallback_params), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            for (site_id, run_score, completed_at, module_json) in fallback_rows {
                if seen.contains(&site_id) {
                    continue;
                }
                seen.insert(site_id.clone());
                let score = module_json
                    .as_deref()
                    .and_then(qualification::score_from_module_json)
                    .or(run_score)
                    .or(Some(0));
                scores.push(SiteScore {
                    site_id,
                    score,
                    last_processed: completed_at.as_deref().map(short_timestamp),
                });
            }

            Ok(scores)
        })
        .await
    }

    async fn age_check_map(
        &self,
        site_ids: &[String],
    ) -> Result<Vec<(String, Option<i64>, Option<i64>)>, DatabaseError> {
        if site_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "WITH latest_runs AS ( \
                 SELECT site_id, run_id, \
                        ROW_NUMBER() OVER (PARTITION BY site_id ORDER BY completed_at DESC) AS rn \
                 FROM orchestration_runs \
                 WHERE completed_at IS NOT NULL AND site_id IN ({ph}) \
             ) \
             SELECT lr.site_id, \
                    CAST(json_extract(omr.module_result_json, '$.data.score') AS INTEGER), \
                    CAST(json_extract(omr.module_result_json, '$.data.age_confidence') AS INTEGER) \
             FROM latest_runs lr \
             LEFT JOIN orchestration_module_results omr \
               ON lr.run_id = omr.run_id AND omr.module_name LIKE '%Age Qualification%' \
             WHERE lr.rn = 1",
            ph = placeholders(site_ids.len())
        );
        let params = text_values(site_ids);
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

pub struct SqliteContaminantStore {
    conn: SharedConnection,
}

impl SqliteContaminantStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContaminantRow> {
        Ok(ContaminantRow {
            site_id: row.get(0)?,
            contaminant_type: row.get(1)?,
            soil_status: row.get(2)?,
            groundwater_status: row.get(3)?,
            surface_water_status: row.get(4)?,
            air_status: row.get(5)?,
            sediment_status: row.get(6)?,
            bedrock_status: row.get(7)?,
        })
    }
}

#[async_trait]
impl ContaminantStore for SqliteContaminantStore {
    async fn top_contaminants(
        &self,
        filter: &SiteFilter,
        limit: i64,
    ) -> Result<Vec<ContaminantCount>, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "WITH filtered_sites AS (SELECT site_id FROM site_overview {where_sql}) \
             SELECT contaminant_type, COUNT(*) AS n \
             FROM site_contaminants \
             WHERE site_id IN (SELECT site_id FROM filtered_sites) \
               AND contaminant_type IS NOT NULL \
             GROUP BY contaminant_type \
             ORDER BY n DESC LIMIT ?",
            where_sql = compiled.where_sql()
        );
        let mut params = compiled.clone_params();
        params.push(Value::Integer(limit));
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok(ContaminantCount {
                        contaminant_type: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn rows(
        &self,
        site_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ContaminantRow>, DatabaseError> {
        let mut params: Vec<Value> = Vec::new();
        let where_sql = match site_id {
            Some(id) => {
                params.push(Value::Text(id.to_string()));
                "WHERE site_id = ?"
            }
            None => "",
        };
        params.push(Value::Integer(limit));
        let sql = format!(
            "SELECT site_id, contaminant_type, soil_status, groundwater_status, \
                    surface_water_status, air_status, sediment_status, bedrock_status \
             FROM site_contaminants {where_sql} \
             ORDER BY site_id, contaminant_type LIMIT ?"
        );
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), Self::map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn medium_statuses(&self, media: &[Medium]) -> Result<Vec<String>, DatabaseError> {
        let columns: Vec<&'static str> = if media.is_empty() {
            Medium::ALL.iter().map(|m| m.status_column()).collect()
        } else {
            media.iter().map(|m| m.status_column()).collect()
        };
        let union_sql = columns
            .iter()
            .map(|col| format!("SELECT {col} AS s FROM site_contaminants"))
            .collect::<Vec<_>>()
            .join(" UNION ");
        let sql = format!(
            "SELECT DISTINCT s AS status FROM ({union_sql}) t \
             WHERE s IS NOT NULL AND TRIM(s) <> '' ORDER BY status"
        );
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn status_summary(
        &self,
        site_id: &str,
        limit: i64,
    ) -> Result<Vec<ContaminantRow>, DatabaseError> {
        let params = vec![Value::Text(site_id.to_string()), Value::Integer(limit)];
        let sql = "SELECT site_id, contaminant_type, soil_status, groundwater_status, \
                          surface_water_status, NULL, sediment_status, NULL \
                   FROM site_contaminants \
                   WHERE site_id = ? \
                     AND (soil_status IN ('S','C','B') OR \
                          groundwater_status IN ('S','C','B') OR \
                          surface_water_status IN ('S','C','B') OR \
                          sediment_status IN ('S','C','B')) \
                   ORDER BY CASE \
                     WHEN groundwater_status IN ('C','S') THEN 1 \
                     WHEN soil_status IN ('C','S') THEN 2 \
                     WHEN surface_water_status IN ('C','S') THEN 3 \
                     ELSE 4 END \
                   LIMIT ?"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), Self::map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

pub struct SqliteContactStore {
    conn: SharedConnection,
}

impl SqliteContactStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactRow> {
        Ok(ContactRow {
            site_id: row.get(0)?,
            site_name: row.get(1)?,
            contact_name: row.get(2)?,
            organization_name: row.get(3)?,
            contact_address: row.get(4)?,
            phone: row.get(5)?,
            email: row.get(6)?,
            contact_type: row.get(7)?,
            contact_role: row.get(8)?,
            is_primary_prospect: opt_flag(row.get(9)?).unwrap_or(false),
            prospect_priority: row.get(10)?,
            confidence_score: row.get(11)?,
            site_url: row.get(12)?,
        })
    }
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    async fn roles(&self) -> Result<Vec<String>, DatabaseError> {
        let sql = "SELECT DISTINCT contact_role AS v FROM site_contacts_summary \
                   WHERE TRIM(COALESCE(contact_role,'')) <> '' ORDER BY v"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn contact_types(&self) -> Result<Vec<String>, DatabaseError> {
        let sql = "SELECT DISTINCT contact_type AS v FROM site_contacts_summary \
                   WHERE TRIM(COALESCE(contact_type,'')) <> '' ORDER BY v"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn stats(&self) -> Result<ContactStats, DatabaseError> {
        let sql = "SELECT MIN(COALESCE(confidence_score,0.0)), MAX(COALESCE(confidence_score,0.0)), \
                          MIN(COALESCE(prospect_priority,0)), MAX(COALESCE(prospect_priority,0)) \
                   FROM site_contacts_summary"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let stats = conn.query_row(&sql, [], |row| {
                Ok(ContactStats {
                    confidence_min: row.get::<_, Option<f64>>(0)?.unwrap_or(0.0),
                    confidence_max: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                    priority_min: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    priority_max: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                })
            })?;
            Ok(stats)
        })
        .await
    }

    async fn site_options(&self) -> Result<Vec<SiteOption>, DatabaseError> {
        let sql = "SELECT DISTINCT site_id, site_name FROM site_contacts_summary \
                   ORDER BY CAST(site_id AS INTEGER)"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(SiteOption {
                        site_id: row.get(0)?,
                        site_name: row.get(1)?,
                        site_address: None,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn rows(
        &self,
        filter: &ContactFilter,
        limit: i64,
    ) -> Result<Vec<ContactRow>, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "SELECT site_id, site_name, contact_name, organization_name, contact_address, \
                    phone, email, contact_type, contact_role, is_primary_prospect, \
                    prospect_priority, confidence_score, site_url \
             FROM site_contacts_summary {where_sql} \
             ORDER BY CAST(site_id AS INTEGER), prospect_priority ASC, confidence_score DESC \
             LIMIT ?",
            where_sql = compiled.where_sql()
        );
        let mut params = compiled.clone_params();
        params.push(Value::Integer(limit));
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), Self::map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn site_rows(
        &self,
        site_id: &str,
        limit: i64,
    ) -> Result<Vec<ContactRow>, DatabaseError> {
        let params = vec![Value::Text(site_id.to_string()), Value::Integer(limit)];
        let sql = "SELECT site_id, site_name, contact_name, organization_name, contact_address, \
                          phone, email, contact_type, contact_role, is_primary_prospect, \
                          prospect_priority, confidence_score, site_url \
                   FROM site_contacts_summary WHERE site_id = ? \
                   ORDER BY prospect_priority ASC, confidence_score DESC LIMIT ?"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), Self::map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

pub struct SqliteCustomerStore {
    conn: SharedConnection,
}

impl SqliteCustomerStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Shared FROM/JOIN block for the customer overview, including the
    /// latest-opportunity-per-site subquery.
    const FROM_BLOCK: &'static str = "FROM site_overview so \
         LEFT JOIN sites s ON so.site_id = s.site_id \
         LEFT JOIN site_summary ss ON so.site_id = ss.site_id \
         LEFT JOIN box_case_matches bcm ON so.site_id = bcm.site_id \
         LEFT JOIN ( \
             SELECT site_id, sfdc_opportunity_name, stage, created_date, close_date \
             FROM site_opportunities \
             WHERE (site_id, created_date) IN ( \
                 SELECT site_id, MAX(created_date) FROM site_opportunities GROUP BY site_id) \
         ) sfo ON so.site_id = sfo.site_id";
}

#[async_trait]
impl CustomerStore for SqliteCustomerStore {
    async fn site_count_bounds(&self) -> Result<(i64, i64), DatabaseError> {
        let sql = "SELECT MIN(site_count), MAX(site_count) FROM ( \
                     SELECT box_case_name, COUNT(*) AS site_count \
                     FROM box_case_matches \
                     WHERE box_case_name IS NOT NULL AND TRIM(box_case_name) != '' \
                     GROUP BY box_case_name)"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let bounds = conn.query_row(&sql, [], |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?.unwrap_or(1),
                    row.get::<_, Option<i64>>(1)?.unwrap_or(1),
                ))
            })?;
            Ok(bounds)
        })
        .await
    }

    async fn customers(&self, min: i64, max: i64) -> Result<Vec<CustomerOption>, DatabaseError> {
        let sql = "SELECT box_case_name, COUNT(*) AS site_count \
                   FROM box_case_matches \
                   WHERE box_case_name IS NOT NULL AND TRIM(box_case_name) != '' \
                   GROUP BY box_case_name \
                   HAVING COUNT(*) BETWEEN ? AND ? \
                   ORDER BY box_case_name"
            .to_string();
        let params = vec![Value::Integer(min), Value::Integer(max)];
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok(CustomerOption {
                        box_case_name: row.get(0)?,
                        site_count: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn count(&self, filter: &CustomerFilter) -> Result<i64, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "SELECT COUNT(*) {from_block} {where_sql}",
            from_block = Self::FROM_BLOCK,
            where_sql = compiled.where_sql()
        );
        let params = compiled.clone_params();
        with_conn(&self.conn, move |conn| {
            let count = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
            Ok(count)
        })
        .await
    }

    async fn page(
        &self,
        filter: &CustomerFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CustomerSiteRow>, DatabaseError> {
        let compiled = filter.compile();
        let sql = format!(
            "SELECT so.site_id, s.county, so.site_name, so.site_address, s.sfdc_lead_url, \
                    ss.site_status, sfo.sfdc_opportunity_name, sfo.stage, \
                    bcm.box_case_name, bcm.matched_via_contact, bcm.matched_via_org \
             {from_block} {where_sql} \
             ORDER BY CAST(so.site_id AS INTEGER) DESC \
             LIMIT ? OFFSET ?",
            from_block = Self::FROM_BLOCK,
            where_sql = compiled.where_sql()
        );
        let mut params = compiled.clone_params();
        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok(CustomerSiteRow {
                        site_id: row.get(0)?,
                        county: row.get(1)?,
                        site_name: row.get(2)?,
                        site_address: row.get(3)?,
                        sfdc_lead_url: row.get(4)?,
                        site_status: row.get(5)?,
                        sfdc_opportunity_name: row.get(6)?,
                        sfdc_opportunity_stage: row.get(7)?,
                        box_case_name: row.get(8)?,
                        matched_via_contact: row.get(9)?,
                        matched_via_org: row.get(10)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

pub struct SqliteFeedbackStore {
    conn: SharedConnection,
}

impl SqliteFeedbackStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn map_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeedbackEntry> {
        Ok(FeedbackEntry {
            run_id: row.get(0)?,
            site_id: row.get(1)?,
            site_name: row.get(2)?,
            site_address: row.get(3)?,
            age_correct: opt_flag(row.get(4)?),
            age_feedback: row.get(5)?,
            third_party_correct: opt_flag(row.get(6)?),
            third_party_feedback: row.get(7)?,
            document_selection_correct: opt_flag(row.get(8)?),
            document_selection_feedback: row.get(9)?,
            selected_documents_shown: row.get(10)?,
            overall_notes: row.get(11)?,
            submitted_at: row.get(12)?,
        })
    }

    const ENTRY_COLUMNS: &'static str = "af.run_id, af.site_id, so.site_name, so.site_address, \
         af.age_correct, af.age_feedback, af.third_party_correct, af.third_party_feedback, \
         af.document_selection_correct, af.document_selection_feedback, \
         af.selected_documents_shown, af.overall_notes, af.submitted_at";
}

#[async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn summary(&self) -> Result<Vec<FeedbackSummaryRow>, DatabaseError> {
        let sql = "SELECT af.site_id, so.site_name, so.site_address, COUNT(*) AS feedback_count, \
                          MAX(af.submitted_at) AS latest_feedback, \
                          SUM(CASE WHEN af.age_correct = 1 THEN 1 ELSE 0 END), \
                          SUM(CASE WHEN af.third_party_correct = 1 THEN 1 ELSE 0 END), \
                          SUM(CASE WHEN af.document_selection_correct = 1 THEN 1 ELSE 0 END) \
                   FROM ai_feedback af \
                   LEFT JOIN site_overview so ON af.site_id = so.site_id \
                   GROUP BY af.site_id, so.site_name, so.site_address \
                   ORDER BY latest_feedback DESC"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(FeedbackSummaryRow {
                        site_id: row.get(0)?,
                        site_name: row.get(1)?,
                        site_address: row.get(2)?,
                        feedback_count: row.get(3)?,
                        latest_feedback: row.get(4)?,
                        age_correct_count: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                        third_party_correct_count: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
                        document_correct_count: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn site_entries(&self, site_id: &str) -> Result<Vec<FeedbackEntry>, DatabaseError> {
        let site_id = site_id.to_string();
        let sql = format!(
            "SELECT {columns} FROM ai_feedback af \
             LEFT JOIN site_overview so ON af.site_id = so.site_id \
             WHERE af.site_id = ? \
             ORDER BY af.submitted_at DESC",
            columns = Self::ENTRY_COLUMNS
        );
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([&site_id], Self::map_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn all_entries(&self, limit: i64) -> Result<Vec<FeedbackEntry>, DatabaseError> {
        let sql = format!(
            "SELECT {columns} FROM ai_feedback af \
             LEFT JOIN site_overview so ON af.site_id = so.site_id \
             ORDER BY af.site_id, af.submitted_at DESC LIMIT ?",
            columns = Self::ENTRY_COLUMNS
        );
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], Self::map_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn counts_for(
        &self,
        site_ids: &[String],
    ) -> Result<Vec<(String, i64)>, DatabaseError> {
        if site_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT site_id, COUNT(*) FROM ai_feedback \
             WHERE site_id IN ({}) GROUP BY site_id",
            placeholders(site_ids.len())
        );
        let params = text_values(site_ids);
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

pub struct SqliteSchemaStore {
    conn: SharedConnection,
}

impl SqliteSchemaStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SchemaStore for SqliteSchemaStore {
    async fn catalog(&self) -> Result<Vec<CatalogEntry>, DatabaseError> {
        let sql = "SELECT name, type FROM sqlite_master \
                   WHERE type IN ('table','view') AND name NOT LIKE 'sqlite_%' \
                   ORDER BY type DESC, name ASC"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CatalogEntry {
                        name: row.get(0)?,
                        kind: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ColumnInfo {
                        cid: row.get(0)?,
                        name: row.get(1)?,
                        col_type: row.get(2)?,
                        notnull: opt_flag(row.get(3)?).unwrap_or(false),
                        default_value: row.get::<_, Option<String>>(4).unwrap_or(None),
                        pk: opt_flag(row.get(5)?).unwrap_or(false),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn sample(&self, table: &str, limit: i64) -> Result<SampleTable, DatabaseError> {
        let sql = format!("SELECT * FROM {} LIMIT ?", quote_ident(table));
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> =
                stmt.column_names().iter().map(|c| c.to_string()).collect();
            let column_count = columns.len();
            let mut rows = stmt.query([limit])?;
            let mut out = SampleTable {
                columns,
                rows: Vec::new(),
            };
            while let Some(row) = rows.next()? {
                let mut rendered = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let cell = match row.get_ref(i)? {
                        ValueRef::Null => String::new(),
                        ValueRef::Integer(v) => v.to_string(),
                        ValueRef::Real(v) => v.to_string(),
                        ValueRef::Text(v) => String::from_utf8_lossy(v).into_owned(),
                        ValueRef::Blob(v) => format!("<{} bytes>", v.len()),
                    };
                    rendered.push(cell);
                }
                out.rows.push(rendered);
            }
            Ok(out)
        })
        .await
    }

    async fn dataset_counts(&self) -> Result<DatasetCounts, DatabaseError> {
        let sql = "SELECT \
                     (SELECT COUNT(*) FROM sites), \
                     (SELECT COUNT(*) FROM site_documents), \
                     (SELECT COUNT(*) FROM site_narratives), \
                     (SELECT COUNT(*) FROM site_contacts_summary)"
            .to_string();
        with_conn(&self.conn, move |conn| {
            let counts = conn.query_row(&sql, [], |row| {
                Ok(DatasetCounts {
                    sites: row.get(0)?,
                    documents: row.get(1)?,
                    narratives: row.get(2)?,
                    contacts: row.get(3)?,
                })
            })?;
            Ok(counts)
        })
        .await
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        with_conn(&self.conn, move |conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}
