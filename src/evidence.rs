//! Evidence normalization: raw artifacts → canonical `Evidence` records.
//!
//! `normalize` never fails. Malformed input yields fewer extracted fields,
//! not an error — a resolver working from partial signals is the normal
//! case, not an exceptional one. Persistence is the caller's job via
//! `AuditDb::insert_evidence`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::helpers::name_tokens;
use crate::model::SourceType;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Structured fields handed over by the importer alongside the raw text.
/// These are authoritative: a structured code/client/amount is merged ahead
/// of anything extracted from the text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredFields {
    pub project_code: Option<String>,
    pub client: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<String>,
}

/// A monetary amount with its currency marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    pub value: f64,
    pub currency: String,
}

/// Canonical, immutable snapshot of one source artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub source_type: SourceType,
    pub source_id: String,
    /// Canonicalized project code candidates ("23 BK-050").
    pub code_candidates: Vec<String>,
    /// Normalized client + salient text tokens.
    pub name_tokens: Vec<String>,
    /// Discipline keywords from the fixed vocabulary.
    pub keywords: Vec<String>,
    pub amounts: Vec<Amount>,
    /// ISO dates (YYYY-MM-DD).
    pub dates: Vec<String>,
}

// ---------------------------------------------------------------------------
// Extraction patterns
// ---------------------------------------------------------------------------

/// Firm project codes are `YY AA-NNN`. Writers are sloppy about separators:
/// "23BK050", "23 BK-050", "23-bk-050" all mean the same project.
fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{2})\s*[-_./]?\s*([a-z]{2})\s*[-_./]?\s*(\d{3})\b")
            .expect("code regex")
    })
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\$|usd)\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*([km])?\b")
            .expect("amount regex")
    })
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("iso date regex"))
}

fn us_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("us date regex"))
}

/// Discipline vocabulary with common inflections, mapped to the canonical
/// discipline name.
const DISCIPLINES: &[(&str, &str)] = &[
    ("landscape", "landscape"),
    ("landscaping", "landscape"),
    ("landscapes", "landscape"),
    ("interior", "interior"),
    ("interiors", "interior"),
    ("architecture", "architecture"),
    ("architectural", "architecture"),
    ("architect", "architecture"),
    ("branding", "branding"),
    ("brand", "branding"),
];

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Canonicalize a raw project-code fragment to `YY AA-NNN`, or None if it
/// doesn't fit the format.
pub fn canonical_code(raw: &str) -> Option<String> {
    let caps = code_re().captures(raw)?;
    Some(format!(
        "{} {}-{}",
        &caps[1],
        caps[2].to_uppercase(),
        &caps[3]
    ))
}

/// Map normalized tokens onto the canonical discipline vocabulary.
pub fn discipline_keywords(tokens: &[String]) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in tokens {
        if let Some((_, canonical)) = DISCIPLINES.iter().find(|(word, _)| word == token) {
            if !keywords.contains(&canonical.to_string()) {
                keywords.push(canonical.to_string());
            }
        }
    }
    keywords
}

/// Turn one raw artifact into a canonical `Evidence` record.
pub fn normalize(
    source_type: SourceType,
    raw_text: &str,
    structured: &StructuredFields,
    source_id: &str,
) -> Evidence {
    let mut codes: Vec<String> = Vec::new();
    if let Some(code) = structured.project_code.as_deref().and_then(canonical_code) {
        codes.push(code);
    }
    for caps in code_re().captures_iter(raw_text) {
        let code = format!("{} {}-{}", &caps[1], caps[2].to_uppercase(), &caps[3]);
        if !codes.contains(&code) {
            codes.push(code);
        }
    }

    // Client field tokens lead; salient text tokens follow.
    let mut tokens: Vec<String> = Vec::new();
    if let Some(client) = structured.client.as_deref() {
        tokens.extend(name_tokens(client));
    }
    for token in name_tokens(raw_text) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }

    let keywords = discipline_keywords(&tokens);

    let mut amounts: Vec<Amount> = Vec::new();
    if let Some(value) = structured.amount {
        if value.is_finite() && value > 0.0 {
            amounts.push(Amount {
                value,
                currency: "USD".to_string(),
            });
        }
    }
    for caps in amount_re().captures_iter(raw_text) {
        let digits = caps[2].replace(',', "");
        let Ok(mut value) = digits.parse::<f64>() else {
            continue;
        };
        match caps.get(3).map(|m| m.as_str().to_lowercase()) {
            Some(s) if s == "k" => value *= 1_000.0,
            Some(s) if s == "m" => value *= 1_000_000.0,
            _ => {}
        }
        if value <= 0.0 || !value.is_finite() {
            continue;
        }
        let amount = Amount {
            value,
            currency: "USD".to_string(),
        };
        if !amounts.contains(&amount) {
            amounts.push(amount);
        }
    }

    let mut dates: Vec<String> = Vec::new();
    if let Some(date) = structured.date.as_deref() {
        if let Some(iso) = parse_date(date) {
            dates.push(iso);
        }
    }
    for caps in iso_date_re().captures_iter(raw_text) {
        push_date(&mut dates, &caps[1], &caps[2], &caps[3]);
    }
    for caps in us_date_re().captures_iter(raw_text) {
        push_date(&mut dates, &caps[3], &caps[1], &caps[2]);
    }

    Evidence {
        source_type,
        source_id: source_id.to_string(),
        code_candidates: codes,
        name_tokens: tokens,
        keywords,
        amounts,
        dates,
    }
}

/// Parse either ISO or US date notation to ISO, validating via chrono.
fn parse_date(raw: &str) -> Option<String> {
    if let Some(caps) = iso_date_re().captures(raw) {
        return valid_iso(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = us_date_re().captures(raw) {
        return valid_iso(&caps[3], &caps[1], &caps[2]);
    }
    None
}

fn valid_iso(year: &str, month: &str, day: &str) -> Option<String> {
    let y: i32 = year.parse().ok()?;
    let m: u32 = month.parse().ok()?;
    let d: u32 = day.parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(y, m, d)?;
    Some(format!("{:04}-{:02}-{:02}", y, m, d))
}

fn push_date(dates: &mut Vec<String>, year: &str, month: &str, day: &str) {
    if let Some(iso) = valid_iso(year, month, day) {
        if !dates.contains(&iso) {
            dates.push(iso);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bare() -> StructuredFields {
        StructuredFields::default()
    }

    #[test]
    fn test_code_spacing_variants_canonicalize() {
        for raw in ["23BK050", "23 BK-050", "23-bk-050", "23.bk.050", "23_BK_050"] {
            let ev = normalize(SourceType::Email, raw, &bare(), "src-1");
            assert_eq!(ev.code_candidates, vec!["23 BK-050"], "variant {raw}");
        }
    }

    #[test]
    fn test_structured_code_leads() {
        let structured = StructuredFields {
            project_code: Some("25bk030".to_string()),
            ..Default::default()
        };
        let ev = normalize(SourceType::Document, "see also 23 BK-029", &structured, "src-2");
        assert_eq!(ev.code_candidates, vec!["25 BK-030", "23 BK-029"]);
    }

    #[test]
    fn test_amount_extraction_suffixes_and_commas() {
        let ev = normalize(
            SourceType::Email,
            "Phase 1 fee is $550,000.00, retainer USD 25k, contingency $1.2m.",
            &bare(),
            "src-3",
        );
        let values: Vec<f64> = ev.amounts.iter().map(|a| a.value).collect();
        assert!(values.contains(&550_000.0), "{values:?}");
        assert!(values.contains(&25_000.0), "{values:?}");
        assert!(values.contains(&1_200_000.0), "{values:?}");
    }

    #[test]
    fn test_bare_numbers_are_not_amounts() {
        let ev = normalize(SourceType::Email, "room 550000 on level 12", &bare(), "src-4");
        assert!(ev.amounts.is_empty());
    }

    #[test]
    fn test_discipline_keywords_with_inflections() {
        let ev = normalize(
            SourceType::Email,
            "Landscaping scope plus interiors and architectural services",
            &bare(),
            "src-5",
        );
        assert_eq!(ev.keywords, vec!["landscape", "interior", "architecture"]);
    }

    #[test]
    fn test_dates_iso_and_us() {
        let ev = normalize(
            SourceType::Document,
            "Kickoff 2026-03-01, completion 9/15/2026.",
            &bare(),
            "src-6",
        );
        assert_eq!(ev.dates, vec!["2026-03-01", "2026-09-15"]);
    }

    #[test]
    fn test_invalid_dates_omitted() {
        let ev = normalize(SourceType::Document, "due 2026-13-40 or 14/45/2026", &bare(), "src-7");
        assert!(ev.dates.is_empty());
    }

    #[test]
    fn test_client_tokens_lead_text_tokens() {
        let structured = StructuredFields {
            client: Some("Mandarin Oriental".to_string()),
            ..Default::default()
        };
        let ev = normalize(
            SourceType::Email,
            "Beach Club at Mandarin Oriental Bali",
            &structured,
            "src-8",
        );
        assert_eq!(
            ev.name_tokens,
            vec!["mandarin", "oriental", "beach", "club", "bali"]
        );
    }

    #[test]
    fn test_malformed_input_never_fails() {
        let ev = normalize(SourceType::Email, "", &bare(), "src-9");
        assert!(ev.code_candidates.is_empty());
        assert!(ev.name_tokens.is_empty());
        assert!(ev.amounts.is_empty());

        let garbage = "\u{0000}\u{FFFD} ����  $  , 99/99/9999";
        let ev = normalize(SourceType::InvoiceLine, garbage, &bare(), "src-10");
        assert!(ev.dates.is_empty());
    }
}
