use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;

pub type MarkerId = u32;

/// BGR triple, the order the overlay renderer expects.
pub type Bgr = (u8, u8, u8);

const OUT_OF_UNIVERSE_BGR: Bgr = (255, 255, 255);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MarkerColor {
    #[serde(rename = "red")]
    Alarm,
    #[serde(rename = "green")]
    Nominal,
}

impl MarkerColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerColor::Alarm => "red",
            MarkerColor::Nominal => "green",
        }
    }

    pub fn bgr(&self) -> Bgr {
        match self {
            MarkerColor::Alarm => (0, 0, 255),
            MarkerColor::Nominal => (0, 255, 0),
        }
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarkerColor {
    type Err = ExperimentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "red" | "alarm" => Ok(MarkerColor::Alarm),
            "green" | "nominal" => Ok(MarkerColor::Nominal),
            other => Err(ExperimentError::Parse(format!("unknown marker color '{other}'"))),
        }
    }
}

/// One persisted ground-truth row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkerRecord {
    pub marker_id: MarkerId,
    pub color_name: MarkerColor,
}

/// Color of every marker in a session's universe, keyed by id.
///
/// Built once by the generator (or re-loaded from the reference store) and
/// read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColorAssignment {
    colors: BTreeMap<MarkerId, MarkerColor>,
}

impl ColorAssignment {
    pub fn from_records<I>(records: I) -> Result<Self, ExperimentError>
    where
        I: IntoIterator<Item = MarkerRecord>,
    {
        let mut colors = BTreeMap::new();
        for record in records {
            if colors.insert(record.marker_id, record.color_name).is_some() {
                return Err(ExperimentError::Parse(format!(
                    "duplicate ground-truth row for marker {}",
                    record.marker_id
                )));
            }
        }
        Ok(Self { colors })
    }

    pub(crate) fn from_map(colors: BTreeMap<MarkerId, MarkerColor>) -> Self {
        Self { colors }
    }

    pub fn records(&self) -> impl Iterator<Item = MarkerRecord> + '_ {
        self.colors.iter().map(|(&marker_id, &color_name)| MarkerRecord {
            marker_id,
            color_name,
        })
    }

    pub fn color_of(&self, marker_id: MarkerId) -> Option<MarkerColor> {
        self.colors.get(&marker_id).copied()
    }

    /// Overlay color for a detected marker; ids outside the universe draw white.
    pub fn overlay_bgr(&self, marker_id: MarkerId) -> Bgr {
        self.color_of(marker_id)
            .map(|color| color.bgr())
            .unwrap_or(OUT_OF_UNIVERSE_BGR)
    }

    pub fn universe(&self) -> impl Iterator<Item = MarkerId> + '_ {
        self.colors.keys().copied()
    }

    pub fn alarm_markers(&self) -> Vec<MarkerId> {
        self.colors
            .iter()
            .filter(|(_, color)| **color == MarkerColor::Alarm)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn alarm_count(&self) -> usize {
        self.colors
            .values()
            .filter(|color| **color == MarkerColor::Alarm)
            .count()
    }

    pub fn has_alarm(&self) -> bool {
        self.colors.values().any(|color| *color == MarkerColor::Alarm)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub(crate) fn as_map(&self) -> &BTreeMap<MarkerId, MarkerColor> {
        &self.colors
    }
}

/// Leak presence for one trial, recorded outside the generator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeakGroundTruth {
    pub leak_present: bool,
}

/// Everything a submission is scored against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruth {
    pub colors: ColorAssignment,
    pub leak: LeakGroundTruth,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(marker_id: MarkerId, color_name: MarkerColor) -> MarkerRecord {
        MarkerRecord {
            marker_id,
            color_name,
        }
    }

    #[test]
    fn duplicate_rows_are_rejected() {
        let result = ColorAssignment::from_records([
            record(0, MarkerColor::Nominal),
            record(0, MarkerColor::Alarm),
        ]);
        assert!(matches!(result, Err(ExperimentError::Parse(_))));
    }

    #[test]
    fn alarm_helpers_agree() {
        let assignment = ColorAssignment::from_records([
            record(2, MarkerColor::Alarm),
            record(0, MarkerColor::Nominal),
            record(1, MarkerColor::Alarm),
        ])
        .unwrap();

        assert_eq!(assignment.alarm_count(), 2);
        assert!(assignment.has_alarm());
        assert_eq!(assignment.alarm_markers(), vec![1, 2]);
        assert_eq!(assignment.universe().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn overlay_falls_back_to_white() {
        let assignment = ColorAssignment::from_records([record(3, MarkerColor::Alarm)]).unwrap();
        assert_eq!(assignment.overlay_bgr(3), (0, 0, 255));
        assert_eq!(assignment.overlay_bgr(99), (255, 255, 255));
    }

    #[test]
    fn color_names_parse_leniently() {
        assert_eq!(" Red ".parse::<MarkerColor>().unwrap(), MarkerColor::Alarm);
        assert_eq!("green".parse::<MarkerColor>().unwrap(), MarkerColor::Nominal);
        assert!("blue".parse::<MarkerColor>().is_err());
    }
}
