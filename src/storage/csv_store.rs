use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::info;
use serde::{Deserialize, Serialize};

use super::{LoggedSubmission, ReferenceStore, SubmissionLog};
use crate::error::ExperimentError;
use crate::models::{
    flag_str, parse_flag, ColorAssignment, LeakGroundTruth, MarkerRecord, TrialKey,
    MAX_LOCATION_PARTS,
};

#[derive(Debug, Serialize, Deserialize)]
struct LeakRecord {
    leak_present: String,
}

/// Flat directory of CSV files, one set per trial plus one log per session.
#[derive(Debug, Clone)]
pub struct CsvStore {
    data_dir: PathBuf,
}

impl CsvStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn assignment_path(&self, key: &TrialKey) -> PathBuf {
        self.data_dir.join(format!(
            "marker_color_assignments_{}_{}.csv",
            file_token(&key.session_id),
            file_token(&key.trial_id)
        ))
    }

    pub fn leak_path(&self, key: &TrialKey) -> PathBuf {
        self.data_dir.join(format!(
            "leak_ground_truth_{}_{}.csv",
            file_token(&key.session_id),
            file_token(&key.trial_id)
        ))
    }

    pub fn responses_path(&self, session_id: &str) -> PathBuf {
        self.data_dir
            .join(format!("experiment_responses_{}.csv", file_token(session_id)))
    }
}

/// Percent-encodes an id for use in a file name. Only ASCII alphanumerics
/// and `-` pass through; `_` separates the name parts and is encoded too, so
/// distinct ids never share a file.
fn file_token(value: &str) -> String {
    let mut token = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            token.push(char::from(byte));
        } else {
            token.push_str(&format!("%{byte:02X}"));
        }
    }
    token
}

fn require_reference(path: &Path, kind: &'static str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ExperimentError::MissingReference {
            kind,
            path: path.to_path_buf(),
        }
        .into())
    }
}

impl ReferenceStore for CsvStore {
    fn save_assignment(&self, key: &TrialKey, assignment: &ColorAssignment) -> Result<PathBuf> {
        let path = self.assignment_path(key);
        let mut writer = WriterBuilder::new()
            .from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        for record in assignment.records() {
            writer.serialize(record)?;
        }
        writer.flush()?;

        info!(
            "wrote {} marker assignments ({} red) to {}",
            assignment.len(),
            assignment.alarm_count(),
            path.display()
        );
        Ok(path)
    }

    fn load_assignment(&self, key: &TrialKey) -> Result<ColorAssignment> {
        let path = self.assignment_path(key);
        require_reference(&path, "ground-truth")?;

        // Older capture files declare `b,g,r` columns but leave them empty.
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let mut records = Vec::new();
        for (index, row) in reader.deserialize::<MarkerRecord>().enumerate() {
            let record = row.map_err(|err| {
                ExperimentError::Parse(format!(
                    "{} row {}: {err}",
                    path.display(),
                    index + 1
                ))
            })?;
            records.push(record);
        }

        Ok(ColorAssignment::from_records(records)?)
    }

    fn save_leak(&self, key: &TrialKey, leak: LeakGroundTruth) -> Result<PathBuf> {
        let path = self.leak_path(key);
        let mut writer = WriterBuilder::new()
            .from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        writer.serialize(LeakRecord {
            leak_present: flag_str(leak.leak_present).to_string(),
        })?;
        writer.flush()?;
        Ok(path)
    }

    /// Reads the single `leak_present` field. Any other shape is rejected
    /// rather than guessed at.
    fn load_leak(&self, key: &TrialKey) -> Result<LeakGroundTruth> {
        let path = self.leak_path(key);
        require_reference(&path, "leak")?;

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let rows = reader
            .deserialize::<LeakRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| ExperimentError::Parse(format!("{}: {err}", path.display())))?;

        match rows.as_slice() {
            [row] => Ok(LeakGroundTruth {
                leak_present: parse_flag(&row.leak_present)?,
            }),
            other => Err(ExperimentError::Parse(format!(
                "{}: expected exactly one leak row, found {}",
                path.display(),
                other.len()
            ))
            .into()),
        }
    }
}

impl SubmissionLog for CsvStore {
    fn append(&self, session_id: &str, entry: &LoggedSubmission) -> Result<PathBuf> {
        let path = self.responses_path(session_id);
        let header = response_header(entry);

        let is_new = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if !is_new {
            check_existing_header(&path, &header)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(&header)?;
        }
        writer.write_record(response_row(entry))?;
        writer.flush()?;

        Ok(path)
    }
}

fn response_header(entry: &LoggedSubmission) -> Vec<String> {
    let mut header: Vec<String> = [
        "timestamp",
        "participant_id",
        "trial_id",
        "leak_present",
        "crack_present",
        "score",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(
        entry
            .submission
            .marker_colors
            .keys()
            .map(|id| format!("marker_{id}_color")),
    );
    header.push("crack_location_raw".into());
    header.extend((1..=MAX_LOCATION_PARTS).map(|i| format!("crack_location_part_{i}")));
    header
}

fn response_row(entry: &LoggedSubmission) -> Vec<String> {
    let submission = &entry.submission;
    let mut row = vec![
        entry
            .recorded_at
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        submission.participant_id.clone(),
        submission.trial_id.clone(),
        flag_str(submission.leak_present).to_string(),
        flag_str(submission.crack_present).to_string(),
        format!("{:.1}", entry.score.rounded()),
    ];
    row.extend(
        submission
            .marker_colors
            .values()
            .map(|color| color.as_str().to_string()),
    );
    row.push(submission.crack_location.clone().unwrap_or_default());
    row.extend(submission.location_parts());
    row
}

/// A session log has one column layout; appending a row with a different
/// marker universe would corrupt it.
fn check_existing_header(path: &Path, expected: &[String]) -> Result<()> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut first_line = String::new();
    BufReader::new(file).read_line(&mut first_line)?;

    let existing: Vec<&str> = first_line.trim_end().split(',').collect();
    if existing != expected {
        bail!(
            "{} was started with a different column layout; refusing to append",
            path.display()
        );
    }
    Ok(())
}
