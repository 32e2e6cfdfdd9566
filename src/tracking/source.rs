use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::models::Frame;

/// The external marker detector, seen from the tracking loop.
pub trait DetectionSource: Send {
    /// Blocks until the next frame is available. `Ok(None)` ends the feed.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Clock used to stamp the end-of-session flush.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Replays a recorded feed, one JSON-encoded [`Frame`] per line.
///
/// A recording has no live clock, so teardown is stamped with the last
/// frame's timestamp.
pub struct JsonLinesSource<R> {
    reader: R,
    line_no: usize,
    last_timestamp: Option<DateTime<Utc>>,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open detection feed {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            last_timestamp: None,
        }
    }
}

impl<R: BufRead + Send> DetectionSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut line = String::new();
        loop {
            line.clear();
            self.line_no += 1;
            if self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("failed to read detection feed line {}", self.line_no))?
                == 0
            {
                return Ok(None);
            }
            if line.trim().is_empty() {
                continue;
            }

            let frame: Frame = serde_json::from_str(line.trim())
                .with_context(|| format!("invalid frame on line {}", self.line_no))?;
            self.last_timestamp = Some(frame.timestamp);
            return Ok(Some(frame));
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.last_timestamp.unwrap_or_else(Utc::now)
    }
}

/// In-memory feed with an optional fixed teardown clock.
#[derive(Debug, Default)]
pub struct ReplaySource {
    frames: VecDeque<Frame>,
    clock: Option<DateTime<Utc>>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            clock: None,
        }
    }

    pub fn with_clock(mut self, clock: DateTime<Utc>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl DetectionSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }
}
