use anyhow::{Context, Result};
use chrono::DateTime;
use rusqlite::{params, Connection};

use crate::merge::{EntityId, Instant, MalformedRecord, RaterId, RatingRecord, RatingValue, Stream, Supplied};

struct HistoryRow {
    user_id: rusqlite::Result<Option<RaterId>>,
    rating: rusqlite::Result<Option<RatingValue>>,
    user_tstamp: rusqlite::Result<Option<i64>>,
}

impl HistoryRow {
    fn into_record(self, index: usize) -> Supplied<RatingRecord> {
        let malformed = |reason: String| MalformedRecord::new(Stream::History, index, reason);

        let rater_id = self
            .user_id
            .map_err(|e| malformed(format!("unreadable user_id: {e}")))?
            .ok_or_else(|| malformed("missing user_id".to_string()))?;
        let rating = self
            .rating
            .map_err(|e| malformed(format!("unreadable rating for user {rater_id}: {e}")))?;
        let seconds = self
            .user_tstamp
            .map_err(|e| malformed(format!("unreadable user_tstamp for user {rater_id}: {e}")))?
            .ok_or_else(|| malformed(format!("missing user_tstamp for user {rater_id}")))?;
        let effective_time = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| malformed(format!("user_tstamp {seconds} out of range")))?;

        Ok(RatingRecord::new(rater_id, rating, effective_time))
    }
}

/// All historical ratings of one movie, oldest first.
///
/// Rows that cannot be read become `Err` entries in place, so the merge can
/// apply its malformed-record policy with the row's position intact.
pub fn list_for_entity(
    conn: &Connection,
    entity_id: EntityId,
) -> Result<Vec<Supplied<RatingRecord>>> {
    let sql = "SELECT user_id, rating, user_tstamp FROM user_rating_pairs_history WHERE movie_id = ?1 ORDER BY user_tstamp ASC, id ASC";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![entity_id], |row| {
            Ok(HistoryRow {
                user_id: row.get(0),
                rating: row.get(1),
                user_tstamp: row.get(2),
            })
        })?
        .enumerate()
        .map(|(index, row)| row.map(|r| r.into_record(index)))
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to load rating history for movie {}", entity_id))?;

    Ok(rows)
}

pub fn insert_rating(
    conn: &Connection,
    entity_id: EntityId,
    rater_id: RaterId,
    rating: Option<RatingValue>,
    effective_time: Instant,
) -> Result<()> {
    let sql = "INSERT INTO user_rating_pairs_history (movie_id, user_id, rating, user_tstamp) VALUES (?1, ?2, ?3, ?4)";

    conn.execute(
        sql,
        params![entity_id, rater_id, rating, effective_time.timestamp()],
    )
    .context("Failed to insert historical rating")
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_pool, get_connection, setup::ensure_schema};

    fn ts(secs: i64) -> Instant {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_history_is_returned_oldest_first_per_movie() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let mut conn = get_connection(&pool).unwrap();
        ensure_schema(&mut conn).unwrap();

        insert_rating(&conn, 7, 2, Some(2.0), ts(10)).unwrap();
        insert_rating(&conn, 7, 1, Some(4.0), ts(0)).unwrap();
        insert_rating(&conn, 8, 3, Some(5.0), ts(5)).unwrap();
        insert_rating(&conn, 7, 1, None, ts(20)).unwrap();

        let history = list_for_entity(&conn, 7).unwrap();

        let records: Vec<RatingRecord> = history.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            records,
            vec![
                RatingRecord::new(1, Some(4.0), ts(0)),
                RatingRecord::new(2, Some(2.0), ts(10)),
                RatingRecord::new(1, None, ts(20)),
            ]
        );
    }

    #[test]
    fn test_rows_without_user_become_malformed_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let mut conn = get_connection(&pool).unwrap();
        ensure_schema(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO user_rating_pairs_history (movie_id, user_id, rating, user_tstamp) VALUES (1, NULL, 3.0, 1)",
            [],
        )
        .unwrap();
        insert_rating(&conn, 1, 4, Some(4.0), ts(2)).unwrap();

        let history = list_for_entity(&conn, 1).unwrap();

        assert_eq!(history.len(), 2);
        let err = history[0].clone().unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.stream, Stream::History);
        assert_eq!(history[1], Ok(RatingRecord::new(4, Some(4.0), ts(2))));
    }
}
