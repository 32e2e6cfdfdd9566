mod intervals;
mod sessions;

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::db::Database;
    use crate::models::{SessionRecord, SessionStatus, VisibilityInterval};

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("telemetry.sqlite3")).unwrap();
        (dir, db)
    }

    fn session(id: &str) -> SessionRecord {
        let started_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        SessionRecord {
            id: id.into(),
            trial_id: "T1".into(),
            universe_size: 15,
            started_at,
            stopped_at: None,
            status: SessionStatus::Running,
            created_at: started_at,
            updated_at: started_at,
        }
    }

    #[tokio::test]
    async fn session_status_lifecycle() {
        let (_dir, db) = open();
        db.insert_session(&session("a")).await.unwrap();
        db.insert_session(&session("b")).await.unwrap();

        let stopped = Utc.with_ymd_and_hms(2024, 5, 1, 9, 10, 0).unwrap();
        db.mark_session_status("a", SessionStatus::Completed, Some(stopped), stopped)
            .await
            .unwrap();

        let incomplete = db.get_incomplete_sessions().await.unwrap();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].id, "b");

        db.mark_session_interrupted("b", stopped).await.unwrap();
        assert!(db.get_incomplete_sessions().await.unwrap().is_empty());

        let a = db.get_session("a").await.unwrap().unwrap();
        assert_eq!(a.status, SessionStatus::Completed);
        assert_eq!(a.stopped_at, Some(stopped));
        assert!(db.get_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn intervals_append_in_order() {
        let (_dir, db) = open();
        db.insert_session(&session("s")).await.unwrap();

        let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let interval = |marker_id, start: i64, end: i64| VisibilityInterval {
            marker_id,
            started_at: base + Duration::seconds(start),
            ended_at: base + Duration::seconds(end),
        };

        db.insert_visibility_intervals("s", &[interval(1, 0, 2), interval(2, 3, 4)])
            .await
            .unwrap();
        db.insert_visibility_intervals("s", &[interval(1, 6, 9)])
            .await
            .unwrap();
        db.insert_visibility_intervals("s", &[]).await.unwrap();

        let stored = db.get_intervals_for_session("s").await.unwrap();
        assert_eq!(
            stored,
            vec![interval(1, 0, 2), interval(2, 3, 4), interval(1, 6, 9)]
        );
    }

    #[tokio::test]
    async fn intervals_require_a_known_session() {
        let (_dir, db) = open();
        let now = Utc::now();
        let result = db
            .insert_visibility_intervals(
                "ghost",
                &[VisibilityInterval {
                    marker_id: 0,
                    started_at: now,
                    ended_at: now,
                }],
            )
            .await;
        assert!(result.is_err());
    }
}
