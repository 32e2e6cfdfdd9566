use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::{
    helpers::{parse_datetime, to_marker_id},
    Database,
};
use crate::models::VisibilityInterval;

impl Database {
    /// Appends closed intervals after any already stored for the session,
    /// keeping their order.
    pub async fn insert_visibility_intervals(
        &self,
        session_id: &str,
        intervals: &[VisibilityInterval],
    ) -> Result<()> {
        if intervals.is_empty() {
            return Ok(());
        }

        let session_id = session_id.to_string();
        let records = intervals.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let next_sequence: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sequence) + 1, 0) FROM visibility_intervals WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO visibility_intervals (session_id, sequence, marker_id, started_at, ended_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (offset, interval) in records.iter().enumerate() {
                    stmt.execute(params![
                        session_id,
                        next_sequence + offset as i64,
                        interval.marker_id,
                        interval.started_at.to_rfc3339(),
                        interval.ended_at.to_rfc3339(),
                    ])
                    .with_context(|| "failed to insert visibility interval")?;
                }
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_intervals_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<VisibilityInterval>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT marker_id, started_at, ended_at
                 FROM visibility_intervals
                 WHERE session_id = ?1
                 ORDER BY sequence ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut intervals = Vec::new();
            while let Some(row) = rows.next()? {
                intervals.push(VisibilityInterval {
                    marker_id: to_marker_id(row.get(0)?)?,
                    started_at: parse_datetime(&row.get::<_, String>(1)?, "started_at")?,
                    ended_at: parse_datetime(&row.get::<_, String>(2)?, "ended_at")?,
                });
            }
            Ok(intervals)
        })
        .await
    }
}
