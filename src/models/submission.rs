use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{MarkerColor, MarkerId};
use crate::error::ExperimentError;

/// Free-text crack locations are split into this many fixed columns.
pub const MAX_LOCATION_PARTS: usize = 8;

const UNSPECIFIED_ID: &str = "N/A";

/// Form state as the operator fills it in. Flags stay `None` until chosen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDraft {
    pub participant_id: String,
    pub trial_id: String,
    pub leak_present: Option<bool>,
    pub crack_present: Option<bool>,
    pub marker_colors: BTreeMap<MarkerId, MarkerColor>,
    pub crack_location: String,
}

/// A fully populated operator report, ready to be scored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub participant_id: String,
    pub trial_id: String,
    pub leak_present: bool,
    pub crack_present: bool,
    pub marker_colors: BTreeMap<MarkerId, MarkerColor>,
    pub crack_location: Option<String>,
}

impl SubmissionDraft {
    /// Checks the draft against the session's marker universe.
    ///
    /// Every unselected flag and undeclared marker is collected so the caller
    /// can re-prompt once with the full list. Declarations for ids outside the
    /// universe pass through untouched; the scoring engine treats them as a
    /// data-integrity failure.
    pub fn validate<I>(self, universe: I) -> Result<Submission, ExperimentError>
    where
        I: IntoIterator<Item = MarkerId>,
    {
        let mut missing = Vec::new();
        if self.leak_present.is_none() {
            missing.push("leak_present".to_string());
        }
        if self.crack_present.is_none() {
            missing.push("crack_present".to_string());
        }
        for marker_id in universe {
            if !self.marker_colors.contains_key(&marker_id) {
                missing.push(format!("marker {marker_id}"));
            }
        }

        let (Some(leak_present), Some(crack_present)) = (self.leak_present, self.crack_present)
        else {
            return Err(ExperimentError::IncompleteSubmission { missing });
        };
        if !missing.is_empty() {
            return Err(ExperimentError::IncompleteSubmission { missing });
        }

        let location = self.crack_location.trim();
        Ok(Submission {
            participant_id: normalize_id(&self.participant_id),
            trial_id: normalize_id(&self.trial_id),
            leak_present,
            crack_present,
            marker_colors: self.marker_colors,
            crack_location: (!location.is_empty()).then(|| location.to_string()),
        })
    }
}

impl Submission {
    /// Crack location tokens padded or truncated to `MAX_LOCATION_PARTS`.
    pub fn location_parts(&self) -> Vec<String> {
        let mut parts: Vec<String> = self
            .crack_location
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .take(MAX_LOCATION_PARTS)
            .map(str::to_string)
            .collect();
        parts.resize(MAX_LOCATION_PARTS, String::new());
        parts
    }

    /// Crack flagged without a location; the form asks for confirmation.
    pub fn crack_without_location(&self) -> bool {
        self.crack_present && self.crack_location.is_none()
    }
}

fn normalize_id(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNSPECIFIED_ID.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parses the `0`/`1` flags used by the report form and the leak reference.
pub fn parse_flag(value: &str) -> Result<bool, ExperimentError> {
    match value.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ExperimentError::Parse(format!(
            "expected 0 or 1, found '{other}'"
        ))),
    }
}

pub fn flag_str(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_draft() -> SubmissionDraft {
        SubmissionDraft {
            participant_id: " P07 ".into(),
            trial_id: "".into(),
            leak_present: Some(true),
            crack_present: Some(false),
            marker_colors: (0..3).map(|id| (id, MarkerColor::Nominal)).collect(),
            crack_location: "  ".into(),
        }
    }

    #[test]
    fn complete_draft_validates() {
        let submission = complete_draft().validate(0..3).unwrap();
        assert_eq!(submission.participant_id, "P07");
        assert_eq!(submission.trial_id, "N/A");
        assert!(submission.leak_present);
        assert_eq!(submission.crack_location, None);
    }

    #[test]
    fn every_gap_is_reported() {
        let mut draft = complete_draft();
        draft.crack_present = None;
        draft.marker_colors.remove(&1);

        match draft.validate(0..3) {
            Err(ExperimentError::IncompleteSubmission { missing }) => {
                assert_eq!(missing, vec!["crack_present", "marker 1"]);
            }
            other => panic!("expected incomplete submission, got {other:?}"),
        }
    }

    #[test]
    fn location_is_split_into_fixed_columns() {
        let mut draft = complete_draft();
        draft.crack_present = Some(true);
        draft.crack_location = "a b c d e f g h i j".into();
        let submission = draft.validate(0..3).unwrap();

        let parts = submission.location_parts();
        assert_eq!(parts.len(), MAX_LOCATION_PARTS);
        assert_eq!(parts[0], "a");
        assert_eq!(parts[7], "h");
        assert!(!submission.crack_without_location());

        let mut short = submission.clone();
        short.crack_location = Some("pipe-3".into());
        assert_eq!(short.location_parts()[1], "");
    }

    #[test]
    fn flags_are_strict() {
        assert!(parse_flag("1").unwrap());
        assert!(!parse_flag(" 0 ").unwrap());
        assert!(parse_flag("yes").is_err());
        assert_eq!(flag_str(true), "1");
    }
}
