//! Qualification domain logic: tier derivation, score extraction from the
//! orchestration module payloads, and evidence JSON parsing.
//!
//! The source database stores evidence as JSON arrays written by several
//! generations of the qualification pipeline; older rows hold plain text or
//! partially serialized fragments, so parsing here is deliberately lenient.

use serde::Deserialize;

pub const DISQUALIFIED_MARKER: &str = "[DISQUALIFIED - MINIMAL CLEANUP]";

/// A single piece of qualification evidence, normalized for display.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceItem {
    pub text: String,
    pub source_document: Option<String>,
    pub document_date: Option<String>,
    pub document_type: Option<String>,
    pub disqualified: bool,
}

#[derive(Debug, Deserialize)]
struct RawEvidence {
    #[serde(default)]
    evidence_text: Option<String>,
    #[serde(default)]
    confidence_level: Option<String>,
    #[serde(default)]
    source_document: Option<String>,
    #[serde(default)]
    document_date: Option<String>,
    #[serde(default)]
    document_type: Option<String>,
}

/// A structured disqualification reason attached to a qualification row.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DisqualifyingFactor {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
}

impl DisqualifyingFactor {
    pub fn is_minimal_cleanup(&self) -> bool {
        self.reason.as_deref() == Some("MINIMAL_CLEANUP")
    }

    pub fn headline(&self) -> &'static str {
        match self.reason.as_deref() {
            Some("MINIMAL_CLEANUP") => "Site Disqualified: Minimal Cleanup/Recovery",
            Some("RECENT_CONTAMINATION") => "Site Disqualified: Recent Contamination",
            Some("NO_THIRD_PARTY_IMPACT") => "Site Disqualified: No Third Party Impact",
            _ => "Site Disqualified",
        }
    }
}

/// Strip serialization debris from evidence fragments. Some rows carry
/// wrappers like `[{"evidence_text": "...` or trailing `]}` from truncated
/// JSON; keep the payload between the first `:` and the first closing
/// bracket, then trim quotes.
pub fn clean_fragment(raw: &str) -> String {
    let mut s = raw;
    if let Some(idx) = s.find(':') {
        s = &s[idx + 1..];
    }
    let cut = [s.find(']'), s.find('}')]
        .into_iter()
        .flatten()
        .min();
    if let Some(cut) = cut {
        s = &s[..cut];
    }
    s.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
}

/// Parse an evidence column into display items.
///
/// Accepts a JSON array of objects, a JSON array of strings, or (for the
/// oldest rows) a bare text blob. Items whose cleaned text is empty are
/// dropped.
pub fn parse_evidence(raw: Option<&str>) -> Vec<EvidenceItem> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        let mut items = Vec::with_capacity(values.len());
        for value in values {
            match value {
                serde_json::Value::String(text) => {
                    let cleaned = clean_fragment(&text);
                    if !cleaned.is_empty() {
                        items.push(EvidenceItem {
                            text: cleaned,
                            source_document: None,
                            document_date: None,
                            document_type: None,
                            disqualified: false,
                        });
                    }
                }
                other => {
                    if let Ok(raw_item) = serde_json::from_value::<RawEvidence>(other) {
                        let evidence_text = raw_item.evidence_text.unwrap_or_default();
                        let disqualified = evidence_text.contains(DISQUALIFIED_MARKER)
                            || raw_item.confidence_level.as_deref() == Some("disqualified");
                        let cleaned = clean_fragment(&evidence_text);
                        if !cleaned.is_empty() {
                            items.push(EvidenceItem {
                                text: cleaned,
                                source_document: raw_item.source_document,
                                document_date: raw_item.document_date,
                                document_type: raw_item.document_type,
                                disqualified,
                            });
                        }
                    }
                }
            }
        }
        return items;
    }

    // Plain-text fallback for rows that predate JSON evidence.
    let cleaned = clean_fragment(raw);
    if cleaned.is_empty() {
        Vec::new()
    } else {
        vec![EvidenceItem {
            text: cleaned,
            source_document: None,
            document_date: None,
            document_type: None,
            disqualified: raw.contains(DISQUALIFIED_MARKER),
        }]
    }
}

pub fn parse_disqualifying_factors(raw: Option<&str>) -> Vec<DisqualifyingFactor> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Derive a display tier from an orchestration run's `final_status`.
pub fn tier_from_status(final_status: Option<&str>) -> String {
    let status = final_status.unwrap_or_default();
    if let Some(idx) = status.find("QUALIFIED_TIER_") {
        return status[idx + "QUALIFIED_TIER_".len()..].to_string();
    }
    if status.contains("NOT_QUALIFIED") {
        return "NOT_QUALIFIED".to_string();
    }
    "UNSPECIFIED".to_string()
}

/// Pull `$.data.final_score` from a Score Calculation module payload.
pub fn score_from_module_json(raw: &str) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("data")?.get("final_score")?.as_i64()
}

/// Pull a named score field (`age_score`, `third_party_score`, ...) from a
/// Score Calculation module payload.
pub fn component_score(raw: &str, field: &str) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("data")?.get(field)?.as_i64()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn parses_structured_evidence() {
        let raw = r#"[
            {"evidence_text": "Leaking USTs removed in 1987",
             "source_document": "Site Assessment",
             "document_date": "1987-04-01",
             "document_type": "report",
             "confidence_level": "high"},
            {"evidence_text": "", "confidence_level": "low"}
        ]"#;
        let items = parse_evidence(Some(raw));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Leaking USTs removed in 1987");
        assert_eq!(items[0].source_document.as_deref(), Some("Site Assessment"));
        assert!(!items[0].disqualified);
    }

    #[test]
    fn detects_disqualified_evidence() {
        let raw = format!(
            r#"[{{"evidence_text": "{DISQUALIFIED_MARKER} minor surface staining only",
                 "confidence_level": "disqualified"}}]"#
        );
        let items = parse_evidence(Some(&raw));
        assert_eq!(items.len(), 1);
        assert!(items[0].disqualified);
    }

    #[test]
    fn string_array_evidence() {
        let items = parse_evidence(Some(r#"["operated as a smelter since 1921"]"#));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "operated as a smelter since 1921");
    }

    #[test]
    fn plain_text_fallback() {
        let items = parse_evidence(Some("groundwater plume documented downgradient"));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "groundwater plume documented downgradient");
    }

    #[test]
    fn empty_and_missing_evidence() {
        assert!(parse_evidence(None).is_empty());
        assert!(parse_evidence(Some("  ")).is_empty());
        assert!(parse_evidence(Some("[]")).is_empty());
    }

    #[test_case("note: spill in 1975] trailing", "spill in 1975" ; "strips wrapper and bracket")]
    #[test_case("\"quoted text\"", "quoted text" ; "strips quotes")]
    #[test_case("clean already", "clean already" ; "leaves clean text")]
    fn fragment_cleaning(input: &str, expected: &str) {
        assert_eq!(clean_fragment(input), expected);
    }

    #[test]
    fn disqualifying_factor_parsing() {
        let raw = r#"[{"category": "age", "reason": "MINIMAL_CLEANUP",
                       "description": "only surface soil removed",
                       "evidence": "closure letter"}]"#;
        let factors = parse_disqualifying_factors(Some(raw));
        assert_eq!(factors.len(), 1);
        assert!(factors[0].is_minimal_cleanup());
        assert_eq!(factors[0].headline(), "Site Disqualified: Minimal Cleanup/Recovery");
    }

    #[test]
    fn malformed_factors_are_empty() {
        assert!(parse_disqualifying_factors(Some("not json")).is_empty());
        assert!(parse_disqualifying_factors(None).is_empty());
    }

    #[test_case(Some("QUALIFIED_TIER_A"), "A")]
    #[test_case(Some("FINAL_QUALIFIED_TIER_2"), "2")]
    #[test_case(Some("NOT_QUALIFIED"), "NOT_QUALIFIED")]
    #[test_case(Some("RUNNING"), "UNSPECIFIED")]
    #[test_case(None, "UNSPECIFIED")]
    fn tier_derivation(status: Option<&str>, expected: &str) {
        assert_eq!(tier_from_status(status), expected);
    }

    #[test]
    fn module_score_extraction() {
        let raw = r#"{"data": {"final_score": 72, "age_score": 50}}"#;
        assert_eq!(score_from_module_json(raw), Some(72));
        assert_eq!(component_score(raw, "age_score"), Some(50));
        assert_eq!(component_score(raw, "third_party_score"), None);
        assert_eq!(score_from_module_json("{}"), None);
        assert_eq!(score_from_module_json("garbage"), None);
    }
}
