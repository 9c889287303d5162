//! Fixture database for store tests: the subset of the production schema
//! the dashboard queries, plus a small seeded site population.

use rusqlite::Connection;
use tempfile::NamedTempFile;

pub(crate) fn fixture_database() -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp sqlite file");
    let conn = Connection::open(file.path()).expect("open fixture");
    create_schema(&conn);
    seed(&conn);
    file
}

fn create_schema(conn: &Connection) {
    conn.execute_batch(
        r#"
        CREATE TABLE sites (
            site_id TEXT PRIMARY KEY,
            county TEXT,
            historical_use_category TEXT,
            sfdc_lead_url TEXT
        );
        CREATE TABLE site_summary (
            site_id TEXT PRIMARY KEY,
            site_name TEXT,
            site_address TEXT,
            has_narrative_content INTEGER,
            has_documents INTEGER,
            total_narrative_sections INTEGER,
            total_documents INTEGER,
            document_date_range_years INTEGER,
            age_evidence_confidence_score INTEGER,
            third_party_confidence_score INTEGER,
            age_evidence_source TEXT,
            site_status TEXT
        );
        CREATE TABLE site_overview (
            site_id TEXT PRIMARY KEY,
            site_name TEXT,
            site_address TEXT,
            regional_office TEXT,
            office_phone TEXT,
            cleanup_program_type TEXT,
            site_report_url TEXT,
            neighborhood_map_url TEXT,
            url TEXT,
            total_documents INTEGER,
            total_contaminants INTEGER,
            has_documents INTEGER,
            found_documents INTEGER,
            has_contaminants INTEGER,
            scrape_status TEXT,
            status_icon TEXT
        );
        CREATE TABLE site_narratives (
            site_id TEXT,
            section_order INTEGER,
            section_title TEXT,
            section_content TEXT,
            scraped_at TEXT
        );
        CREATE TABLE site_documents (
            id INTEGER PRIMARY KEY,
            site_id TEXT,
            document_category TEXT,
            document_title TEXT,
            document_date TEXT,
            document_type TEXT,
            document_url TEXT,
            download_status TEXT,
            flagged_for_analysis INTEGER,
            file_extension TEXT,
            file_size_bytes INTEGER
        );
        CREATE TABLE site_qualification_results (
            id INTEGER PRIMARY KEY,
            site_id TEXT,
            qualified INTEGER,
            qualification_tier TEXT,
            confidence_score REAL,
            document_type_analyzed TEXT,
            document_quality_score REAL,
            analyzed_at TEXT,
            final_calculated_score INTEGER,
            age_evidence TEXT,
            third_party_evidence TEXT,
            disqualifying_factors TEXT,
            age_qualified INTEGER,
            third_party_qualified INTEGER,
            tribal_site INTEGER
        );
        CREATE TABLE site_contaminants (
            site_id TEXT,
            contaminant_type TEXT,
            soil_status TEXT,
            groundwater_status TEXT,
            surface_water_status TEXT,
            air_status TEXT,
            sediment_status TEXT,
            bedrock_status TEXT
        );
        CREATE TABLE site_contacts_summary (
            site_id TEXT,
            site_name TEXT,
            contact_name TEXT,
            organization_name TEXT,
            contact_address TEXT,
            phone TEXT,
            email TEXT,
            contact_type TEXT,
            contact_role TEXT,
            is_primary_prospect INTEGER,
            prospect_priority INTEGER,
            confidence_score REAL,
            qualified INTEGER,
            site_url TEXT
        );
        CREATE TABLE site_ownership_history (
            site_id TEXT,
            ownership_start_year INTEGER,
            ownership_end_year INTEGER,
            ownership_duration_years INTEGER,
            owner_name TEXT,
            organization_name TEXT,
            is_current INTEGER,
            acquired_from TEXT,
            sold_to TEXT,
            acquisition_type TEXT,
            business_name TEXT,
            business_type TEXT,
            operated_business INTEGER,
            operation_start_year INTEGER,
            operation_end_year INTEGER,
            parent_company TEXT,
            successor_company TEXT,
            assumes_prior_liabilities INTEGER,
            ownership_start_date TEXT
        );
        CREATE TABLE orchestration_runs (
            run_id TEXT PRIMARY KEY,
            site_id TEXT,
            started_at TEXT,
            completed_at TEXT,
            final_status TEXT,
            final_score INTEGER,
            total_processing_time_seconds REAL
        );
        CREATE TABLE orchestration_module_results (
            run_id TEXT,
            module_name TEXT,
            module_result_json TEXT
        );
        CREATE TABLE ai_feedback (
            run_id TEXT,
            site_id TEXT,
            age_correct INTEGER,
            age_feedback TEXT,
            third_party_correct INTEGER,
            third_party_feedback TEXT,
            document_selection_correct INTEGER,
            document_selection_feedback TEXT,
            selected_documents_shown TEXT,
            overall_notes TEXT,
            submitted_at TEXT
        );
        CREATE TABLE batch_runs (
            batch_name TEXT,
            batch_description TEXT,
            started_at TEXT,
            total_sites INTEGER,
            successful_sites INTEGER,
            site_ids TEXT
        );
        CREATE TABLE box_case_matches (
            site_id TEXT,
            box_case_name TEXT,
            matched_via_contact TEXT,
            matched_via_org TEXT
        );
        CREATE TABLE site_opportunities (
            site_id TEXT,
            sfdc_opportunity_name TEXT,
            stage TEXT,
            created_date TEXT,
            close_date TEXT
        );
        CREATE TABLE "Do_Not_Contact_Sites" (
            organization_name TEXT,
            site_address TEXT,
            active INTEGER
        );
        "#,
    )
    .expect("create fixture schema");
}

fn seed(conn: &Connection) {
    conn.execute_batch(
        r#"
        INSERT INTO sites VALUES
            ('101', 'Pierce', 'Lumber Mill', 'https://sfdc.example/lead/101'),
            ('102', 'King', 'Agriculture', NULL),
            ('103', 'Kitsap', NULL, NULL),
            ('104', 'Clark', NULL, NULL);

        INSERT INTO site_summary
            (site_id, site_name, site_address, has_narrative_content, has_documents,
             total_narrative_sections, total_documents, document_date_range_years,
             age_evidence_confidence_score, third_party_confidence_score,
             age_evidence_source, site_status)
        VALUES
            ('101', 'Harbor Mill', '1 Dock St, Tacoma', 1, 1, 2, 2, 12, 50, 80,
             'narrative_analysis', 'Cleanup Started'),
            ('102', 'Green Field', '2 Farm Rd, Kent', 0, 0, 0, 0, 0, 0, 0, NULL, NULL),
            ('103', 'Old Depot', '3 Rail Ave, Bremerton', 0, 0, 0, 0, 0, 0, 0, NULL, NULL),
            ('104', 'Quiet Meadow', '4 Hill Ln, Vancouver', 0, 0, 0, 0, 0, 0, 0, NULL, NULL);

        INSERT INTO site_overview
            (site_id, site_name, site_address, regional_office, office_phone,
             cleanup_program_type, site_report_url, neighborhood_map_url, url,
             total_documents, total_contaminants, has_documents, found_documents,
             has_contaminants, scrape_status, status_icon)
        VALUES
            ('101', 'Harbor Mill', '1 Dock St, Tacoma', 'Southwest', '360-555-0100',
             'VCP', 'https://ecology.example/report/101', NULL,
             'https://ecology.example/site/101', 2, 1, 1, 1, 1, 'success', '✅'),
            ('102', 'Green Field', '2 Farm Rd, Kent', NULL, NULL, NULL, NULL, NULL, NULL,
             0, 1, 0, 0, 1, 'success', '✅'),
            ('103', 'Old Depot', '3 Rail Ave, Bremerton', NULL, NULL, NULL, NULL, NULL, NULL,
             0, 0, 0, 0, 0, 'failed', '❌'),
            ('104', 'Quiet Meadow', '4 Hill Ln, Vancouver', NULL, NULL, NULL, NULL, NULL, NULL,
             0, 0, 0, 0, 0, 'pending', '⏳');

        INSERT INTO site_narratives VALUES
            ('101', 2, 'Remediation Progress', 'Soil excavation completed in 2001.',
             '2024-01-01 08:00:00'),
            ('101', 1, 'Site History', 'Operated as a sawmill from 1923 to 1978.',
             '2024-01-01 08:00:00');

        INSERT INTO site_documents
            (id, site_id, document_category, document_title, document_date, document_type,
             document_url, download_status, flagged_for_analysis, file_extension,
             file_size_bytes)
        VALUES
            (1, '101', 'Reports', 'Phase I Assessment', '1998-06-01', 'assessment',
             'https://ecology.example/doc/1', 'success', 1, 'pdf', 102400),
            (2, '101', 'Permits', 'Discharge Permit', '2003-02-15', 'permit',
             NULL, 'failed', 0, 'pdf', NULL);

        INSERT INTO site_qualification_results
            (id, site_id, qualified, qualification_tier, confidence_score,
             document_type_analyzed, document_quality_score, analyzed_at,
             final_calculated_score, age_evidence, third_party_evidence,
             disqualifying_factors, age_qualified, third_party_qualified, tribal_site)
        VALUES
            (1, '101', 1, 'A', 0.92, 'assessment', 0.8, '2024-05-01 10:00:00', 88,
             '[{"evidence_text": "sawmill operations since 1923",
                "source_document": "Phase I Assessment",
                "document_date": "1998-06-01", "document_type": "assessment",
                "confidence_level": "high"}]',
             '[{"evidence_text": "groundwater plume extends off-site",
                "source_document": "Phase I Assessment",
                "confidence_level": "high"}]',
             NULL, 1, 1, 1);

        INSERT INTO site_contaminants VALUES
            ('101', 'Lead', 'C', 'C', NULL, NULL, NULL, NULL),
            ('102', 'Arsenic', NULL, NULL, NULL, NULL, 'S', NULL);

        INSERT INTO site_contacts_summary VALUES
            ('101', 'Harbor Mill', 'Dana Smith', 'Puget Holdings LLC', '1 Dock St, Tacoma',
             '253-555-0101', 'dana@puget.example', 'owner', 'current_owner', 1, 1, 0.95, 1,
             'https://ecology.example/site/101');

        INSERT INTO site_ownership_history
            (site_id, ownership_start_year, ownership_end_year, ownership_duration_years,
             owner_name, organization_name, is_current, acquired_from, sold_to,
             acquisition_type, business_name, business_type, operated_business,
             operation_start_year, operation_end_year, parent_company, successor_company,
             assumes_prior_liabilities, ownership_start_date)
        VALUES
            ('101', 1923, 1978, 55, 'Harbor Mill Co.', 'Harbor Mill Co.', 0, NULL,
             'Puget Holdings LLC', 'sale', 'Harbor Mill', 'sawmill', 1, 1923, 1978,
             NULL, 'Puget Holdings LLC', 1, '1923-01-01');

        INSERT INTO orchestration_runs VALUES
            ('run-101', '101', '2024-01-01 00:00:00', '2024-01-01 01:00:00',
             'QUALIFIED_TIER_A', 70, 1200.0),
            ('run-102', '102', '2024-01-02 00:00:00', '2024-01-02 01:00:00',
             'NOT_QUALIFIED', 55, 900.0),
            ('run-103', '103', '2024-01-03 00:00:00', '2024-01-03 01:00:00',
             'NOT_QUALIFIED', NULL, 600.0);

        INSERT INTO orchestration_module_results VALUES
            ('run-101', 'Module 10: Score Calculation',
             '{"data": {"final_score": 70, "age_score": 50, "third_party_score": 20}}'),
            ('run-102', 'Module 10: Score Calculation',
             '{"data": {"final_score": 61}}'),
            ('run-102', 'Module 2: Age Qualification',
             '{"data": {"score": 50, "age_confidence": 85}}'),
            ('run-103', 'Module 10: Score Calculation', '{"data": {}}');

        INSERT INTO ai_feedback VALUES
            ('run-101', '101', 1, 'age call looks right', 0, 'missed neighboring parcel',
             1, NULL, '[1, 2]', 'solid overall', '2024-06-01 12:00:00'),
            ('run-101', '101', NULL, NULL, 1, NULL, NULL, NULL, NULL, NULL,
             '2024-06-02 09:00:00');

        INSERT INTO batch_runs VALUES
            ('batch-1', 'Initial Tacoma sweep', '2024-01-01 00:00:00', 2, 2,
             '["101", "102"]');

        INSERT INTO box_case_matches VALUES
            ('101', 'Acme Holdings', 'Dana Smith', 'Puget Holdings LLC');

        INSERT INTO site_opportunities VALUES
            ('101', 'Opp-1', 'Closed Lost', '2023-01-01', '2023-06-01'),
            ('101', 'Opp-2', 'Opportunity Won/Signed', '2024-01-01', NULL);

        INSERT INTO "Do_Not_Contact_Sites" VALUES
            ('green field', NULL, 1),
            ('Ignored Org', NULL, 0);
        "#,
    )
    .expect("seed fixture data");
}
