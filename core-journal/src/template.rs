//! # Journal Template
//!
//! New journals are copies of a template document. The template contains
//! placeholder words which are replaced, match-case, in both the copy's
//! name and its body.

use bridge_traits::storage::TextReplacement;
use chrono::{DateTime, Datelike, Utc};
use std::fmt;

use crate::error::{JournalError, Result};

/// Placeholder recognised in journal templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateVar {
    Yyyy,
    Mm,
    Dd,
    Name,
    Species,
    BinoUrl,
}

impl TemplateVar {
    /// All placeholders, in replacement order
    pub const ALL: [TemplateVar; 6] = [
        TemplateVar::Yyyy,
        TemplateVar::Mm,
        TemplateVar::Dd,
        TemplateVar::Name,
        TemplateVar::Species,
        TemplateVar::BinoUrl,
    ];

    /// Literal text of the placeholder in the template
    pub fn placeholder(self) -> &'static str {
        match self {
            TemplateVar::Yyyy => "YYYY",
            TemplateVar::Mm => "MM",
            TemplateVar::Dd => "DD",
            TemplateVar::Name => "Name",
            TemplateVar::Species => "Species",
            TemplateVar::BinoUrl => "BinoURL",
        }
    }
}

impl fmt::Display for TemplateVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.placeholder())
    }
}

/// Values substituted into a new journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    /// Admission time; supplies `YYYY`, `MM` and `DD`
    pub time: DateTime<Utc>,
    pub name: String,
    pub species: String,
    /// Link back to the patient page
    pub bino_url: String,
}

impl TemplateVars {
    pub fn replacement(&self, var: TemplateVar) -> String {
        match var {
            TemplateVar::Yyyy => self.time.year().to_string(),
            TemplateVar::Mm => format!("{:02}", self.time.month()),
            TemplateVar::Dd => format!("{:02}", self.time.day()),
            TemplateVar::Name => self.name.clone(),
            TemplateVar::Species => self.species.clone(),
            TemplateVar::BinoUrl => self.bino_url.clone(),
        }
    }

    /// Replace every placeholder in `s`, one placeholder at a time
    pub fn apply_to_string(&self, s: &str) -> String {
        TemplateVar::ALL
            .iter()
            .fold(s.to_string(), |acc, var| {
                acc.replace(var.placeholder(), &self.replacement(*var))
            })
    }

    /// Replace-all requests for the document body
    pub fn replacements(&self) -> Vec<TextReplacement> {
        TemplateVar::ALL
            .iter()
            .map(|var| TextReplacement {
                placeholder: var.placeholder().to_string(),
                replacement: self.replacement(*var),
            })
            .collect()
    }
}

/// Check that a template body contains every placeholder.
pub fn validate_template(content: &str) -> Result<()> {
    let missing: Vec<String> = TemplateVar::ALL
        .iter()
        .filter(|var| !content.contains(var.placeholder()))
        .map(|var| var.placeholder().to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(JournalError::InvalidTemplate { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vars() -> TemplateVars {
        TemplateVars {
            time: Utc.with_ymd_and_hms(2024, 3, 7, 14, 0, 0).unwrap(),
            name: "Pigg".to_string(),
            species: "Hedgehog".to_string(),
            bino_url: "https://bino.example/patient/42".to_string(),
        }
    }

    #[test]
    fn test_replacements_are_zero_padded() {
        let vars = vars();
        assert_eq!(vars.replacement(TemplateVar::Yyyy), "2024");
        assert_eq!(vars.replacement(TemplateVar::Mm), "03");
        assert_eq!(vars.replacement(TemplateVar::Dd), "07");
    }

    #[test]
    fn test_apply_to_name() {
        assert_eq!(
            vars().apply_to_string("YYYY-MM-DD Species (Name)"),
            "2024-03-07 Hedgehog (Pigg)"
        );
    }

    #[test]
    fn test_replacements_cover_all_vars() {
        let replacements = vars().replacements();
        assert_eq!(replacements.len(), TemplateVar::ALL.len());
        assert_eq!(replacements[5].placeholder, "BinoURL");
        assert_eq!(replacements[5].replacement, "https://bino.example/patient/42");
    }

    #[test]
    fn test_validate_complete_template() {
        assert!(validate_template("YYYY MM DD Name Species BinoURL").is_ok());
    }

    #[test]
    fn test_validate_lists_every_missing_var() {
        let err = validate_template("YYYY-MM-DD Name").unwrap_err();
        match err {
            JournalError::InvalidTemplate { missing } => {
                assert_eq!(missing, vec!["Species".to_string(), "BinoURL".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
