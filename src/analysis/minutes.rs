use crate::models::minutes::{CheckMode, MinutesReport, SectionResult, SectionStatus};
use regex::{Regex, RegexBuilder};

/// (section, keyword alternation, explanation shown when missing)
const REQUIRED_SECTIONS: [(&str, &str, &str); 8] = [
    ("Datum och plats", "datum|plats|tid", "När och var mötet ägde rum."),
    ("Mötesdeltagare", "närvarande|deltagare|närvarolista", "Lista över deltagare."),
    ("Dagordning", "dagordning|agenda", "Dagordningen för mötet."),
    ("Verksamhetsberättelse", "verksamhetsberättelse|årsberättelse", "Redogörelse för verksamhetsåret."),
    ("Ekonomisk rapport", "ekonomi|budget|ekonomisk rapport", "Ekonomisk rapportering."),
    ("Ansvarsfrihet", "ansvarsfrihet|ansvarsbefrielse", "Ansvarsfrihet för styrelsen."),
    ("Val av styrelse", "val av styrelse|ny styrelse", "Val av ny styrelse."),
    ("Övriga frågor", "övriga frågor|övrigt", "Övriga frågor som diskuterades."),
];

const PROBLEMATIC_PHRASES: [&str; 4] = [
    "misskötsel",
    "ansvarig för allt dåligt",
    "spendera alla pengar",
    "olämpligt beteende",
];

/// Check meeting minutes for the eight sections a formal annual meeting
/// protocol is expected to contain.
pub fn check_minutes(text: &str, mode: CheckMode) -> MinutesReport {
    let sections: Vec<SectionResult> = REQUIRED_SECTIONS
        .iter()
        .map(|&(section, keywords, explanation)| match mode {
            CheckMode::Keyword => check_keywords(text, section, keywords, explanation),
            CheckMode::Structural => check_heading(text, section, explanation),
        })
        .collect();

    let complete = sections.iter().all(|s| s.found);
    if !complete {
        let missing = sections.iter().filter(|s| !s.found).count();
        log::debug!("Minutes check ({mode:?}): {missing} sections missing");
    }

    MinutesReport {
        mode,
        sections,
        complete,
    }
}

fn check_keywords(text: &str, section: &str, keywords: &str, explanation: &str) -> SectionResult {
    let found = compile(keywords, true).is_some_and(|re| re.is_match(text));
    result(section, found, explanation, None, Vec::new())
}

/// Looks for a `"<Section>:"` heading and captures its body up to the next
/// line that starts with an ASCII letter of either case. Lines opening with
/// `Å`, `Ä` or `Ö` continue the current body.
fn check_heading(text: &str, section: &str, explanation: &str) -> SectionResult {
    let pattern = format!(r"(?s)((?i:{}):.*?)(?:\n[A-Za-z]|$)", regex::escape(section));
    let content = compile(&pattern, false)
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string());

    match content {
        Some(body) => {
            let lowered = body.to_lowercase();
            let issues: Vec<String> = PROBLEMATIC_PHRASES
                .iter()
                .filter(|phrase| lowered.contains(*phrase))
                .map(|phrase| phrase.to_string())
                .collect();
            result(section, true, explanation, Some(body), issues)
        }
        None => result(section, false, explanation, None, Vec::new()),
    }
}

fn result(
    section: &str,
    found: bool,
    explanation: &str,
    content: Option<String>,
    issues: Vec<String>,
) -> SectionResult {
    let status = match (found, issues.is_empty()) {
        (false, _) => SectionStatus::Missing,
        (true, true) => SectionStatus::Found,
        (true, false) => SectionStatus::Problematic,
    };
    SectionResult {
        section: section.to_string(),
        status,
        found,
        explanation: (!found).then(|| explanation.to_string()),
        content,
        issues,
    }
}

fn compile(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(case_insensitive).build() {
        Ok(re) => Some(re),
        Err(e) => {
            log::warn!("Invalid section pattern `{pattern}`: {e}");
            None
        }
    }
}
