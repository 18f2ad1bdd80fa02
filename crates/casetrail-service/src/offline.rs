//! Keyword-based `TextGenerator` that runs without network access.
//!
//! Used by the CLI and tests in place of a hosted language model. Its
//! output has the same shape a model's would, so it flows through the same
//! triage validation.

use serde_json::{json, Value};
use tracing::debug;

use casetrail_contracts::{
    error::{CaseError, CaseResult},
    report::{Category, Priority},
};
use casetrail_core::traits::TextGenerator;

/// Keyword lists per category, checked in order. First hit wins.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::SexualHarassment, &["touch", "sexual", "kiss", "body", "dating"]),
    (Category::Retaliation, &["retaliat", "punish", "after i reported", "demoted"]),
    (Category::PowerAbuse, &["manager", "supervisor", "boss", "overtime", "threatened my job"]),
    (Category::VerbalAbuse, &["shout", "yell", "insult", "swear", "humiliat"]),
];

const CRITICAL_KEYWORDS: &[&str] = &["assault", "weapon", "suicide", "violence", "police"];
const HIGH_KEYWORDS: &[&str] = &["threat", "touch", "every day", "repeated", "retaliat"];

#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordTextGenerator;

impl KeywordTextGenerator {
    pub fn new() -> Self {
        Self
    }

    fn categorize(text: &str) -> (Category, Option<&'static str>) {
        for (category, keywords) in CATEGORY_KEYWORDS {
            if let Some(hit) = keywords.iter().copied().find(|k| text.contains(k)) {
                return (*category, Some(hit));
            }
        }
        (Category::GeneralComplaint, None)
    }

    fn prioritize(text: &str) -> (Priority, Option<&'static str>) {
        if let Some(hit) = CRITICAL_KEYWORDS.iter().copied().find(|k| text.contains(k)) {
            return (Priority::Critical, Some(hit));
        }
        if let Some(hit) = HIGH_KEYWORDS.iter().copied().find(|k| text.contains(k)) {
            return (Priority::High, Some(hit));
        }
        if text.split_whitespace().count() < 8 {
            return (Priority::Low, None);
        }
        (Priority::Medium, None)
    }
}

impl TextGenerator for KeywordTextGenerator {
    fn employment_rule(&self, company_name: &str) -> CaseResult<String> {
        let company = company_name.trim();
        if company.is_empty() {
            return Err(CaseError::Generation {
                reason: "no company name to draft rules for".to_string(),
            });
        }
        debug!(company = %company, "offline employment rule");

        let conduct: Vec<String> = CATEGORY_KEYWORDS
            .iter()
            .map(|(category, _)| format!("- {}", category))
            .collect();

        Ok(format!(
            "# Workplace Harassment Prevention Rules: {company}\n\
             \n\
             ## Article 1 (Definition)\n\
             Workplace harassment is any act by which an employee of {company} uses a \
             superior position or relationship to inflict physical or mental suffering on \
             another employee, or to worsen their working environment, beyond the \
             appropriate scope of work.\n\
             \n\
             ## Article 2 (Prohibited conduct)\n\
             The following are prohibited, without limitation:\n\
             {conduct}\n\
             - Exclusion from work, isolation, or assignment of meaningless tasks\n\
             \n\
             ## Article 3 (Reporting and investigation)\n\
             1. Anyone may report harassment, including anonymously through the reporting portal.\n\
             2. The company starts an objective investigation without delay once a report is received.\n\
             3. During the investigation the company protects the reporter, including changes of \
             workplace or paid leave at their request.\n\
             4. No reporter or witness may suffer any disadvantage for reporting.\n\
             \n\
             ## Article 4 (Discipline and prevention of recurrence)\n\
             1. Where harassment is confirmed, the company takes disciplinary action against the \
             offender proportionate to the severity of the conduct.\n\
             2. The company reviews the case and takes measures to prevent recurrence.\n\
             \n\
             ## Article 5 (Management duty)\n\
             The representative of {company} supervises compliance with these rules, provides \
             annual prevention training, and keeps a tamper-evident record of every report \
             and its handling.\n",
            company = company,
            conduct = conduct.join("\n"),
        ))
    }

    fn risk_assessment(&self, content: &str) -> CaseResult<String> {
        if content.trim().is_empty() {
            return Err(CaseError::Generation {
                reason: "no report content to assess".to_string(),
            });
        }
        let text = content.to_lowercase();
        let (category, category_hit) = Self::categorize(&text);
        let (priority, priority_hit) = Self::prioritize(&text);

        let mut lines = vec![
            "RISK ASSESSMENT (offline keyword analysis)".to_string(),
            format!("Indicated category: {}", category),
            format!("Indicated priority: {}", priority),
        ];
        match (category_hit, priority_hit) {
            (None, None) => lines.push("No escalation keywords were found.".to_string()),
            _ => {
                let hits: Vec<&str> = [category_hit, priority_hit].into_iter().flatten().collect();
                lines.push(format!("Matched indicators: {}", hits.join(", ")));
            }
        }
        if priority >= Priority::High {
            lines.push("Recommended: begin the investigation promptly and separate the parties.".to_string());
        } else {
            lines.push("Recommended: acknowledge the report and schedule an intake interview.".to_string());
        }
        Ok(lines.join("\n"))
    }

    fn classify(&self, content: &str) -> CaseResult<Value> {
        let text = content.to_lowercase();
        let (category, category_hit) = Self::categorize(&text);
        let (priority, priority_hit) = Self::prioritize(&text);

        let reason = match (category_hit, priority_hit) {
            (None, None) => "no escalation keywords found".to_string(),
            (Some(c), None) => format!("content mentions '{}'", c),
            (None, Some(p)) => format!("content mentions '{}'", p),
            (Some(c), Some(p)) if c == p => format!("content mentions '{}'", c),
            (Some(c), Some(p)) => format!("content mentions '{}' and '{}'", c, p),
        };
        debug!(%priority, %category, "offline classification");

        Ok(json!({
            "priority": priority,
            "reason": reason,
            "category": category,
        }))
    }
}
