use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    pair_key, BehaviorReview, CardAction, CardInteraction, ChatRoom, Match, MatchNotification, MatchParticipant,
    MatchResult, MatchStatus, MatchType, MutualMatch, ParticipantStatus, ReputationScore, SkillAccuracyRecord,
    SkillLevelRecord, SkillLevelState, UserPrivacySettings,
};
use crate::services::store::{
    ReputationMutation, SkillLevelAdjustment, Store, StoreError, StoreResult,
};

const INTERACTION_COLUMNS: &str = "id, actor_id, target_id, action, is_match, match_id, created_at, updated_at";

const MATCH_SELECT: &str = "\
    SELECT m.id, m.match_type, m.status, m.organizer_id, m.court_id, m.scheduled_at, \
           c.id AS chat_room_id, m.created_at, m.updated_at \
    FROM matches m LEFT JOIN chat_rooms c ON c.match_id = m.id";

const RESULT_COLUMNS: &str = "\
    match_id, winner_id, loser_id, score, recorded_by, is_confirmed, confirmed_by, created_at, confirmed_at";

const REPUTATION_COLUMNS: &str = "\
    user_id, attendance_rate, punctuality_score, skill_accuracy, behavior_rating, \
    total_matches, completed_matches, cancelled_matches, overall_score, updated_at";

const NOTIFICATION_COLUMNS: &str = "\
    id, user_id, notification_type, title, message, payload, is_read, read_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    id: Uuid,
    match_type: MatchType,
    status: MatchStatus,
    organizer_id: Option<String>,
    court_id: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
    chat_room_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ParticipantRow {
    match_id: Uuid,
    user_id: String,
    status: ParticipantStatus,
}

fn unique_violation(err: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    let is_unique = err
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);
    if is_unique {
        StoreError::Conflict(message())
    } else {
        StoreError::SqlxError(err)
    }
}

/// PostgreSQL-backed `Store`
///
/// Multi-row operations run in one transaction. Rows that are read and then
/// written are taken with `SELECT ... FOR UPDATE`; the mutual-match path locks
/// both interaction rows in pair-key order and the `matches.pair_key` unique
/// index guarantees a single match per pair.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32, min_connections: u32) -> StoreResult<Self> {
        Self::connect(database_url, max_connections, min_connections, 5, 600).await
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout_secs: u64,
        idle_timeout_secs: u64,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(idle_timeout_secs))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    async fn attach_participants(conn: &mut PgConnection, rows: Vec<MatchRow>) -> StoreResult<Vec<Match>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let participants = sqlx::query_as::<_, ParticipantRow>(
            "SELECT match_id, user_id, status FROM match_participants \
             WHERE match_id = ANY($1) ORDER BY match_id, position",
        )
        .bind(ids.as_slice())
        .fetch_all(&mut *conn)
        .await?;

        let mut by_match: HashMap<Uuid, Vec<MatchParticipant>> = HashMap::new();
        for p in participants {
            by_match.entry(p.match_id).or_default().push(MatchParticipant {
                user_id: p.user_id,
                status: p.status,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Match {
                participants: by_match.remove(&row.id).unwrap_or_default(),
                id: row.id,
                match_type: row.match_type,
                status: row.status,
                organizer_id: row.organizer_id,
                court_id: row.court_id,
                scheduled_at: row.scheduled_at,
                chat_room_id: row.chat_room_id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
            .collect())
    }

    async fn load_match(conn: &mut PgConnection, match_id: Uuid) -> StoreResult<Option<Match>> {
        let query = format!("{} WHERE m.id = $1", MATCH_SELECT);
        let row = sqlx::query_as::<_, MatchRow>(&query)
            .bind(match_id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Self::attach_participants(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Insert the match, its participants and its chat room. Returns `false`
    /// without writing anything if `pair` is already taken.
    async fn write_match(conn: &mut PgConnection, game: &Match, pair: Option<&str>) -> StoreResult<bool> {
        let inserted = sqlx::query(
            "INSERT INTO matches (id, match_type, status, organizer_id, court_id, scheduled_at, pair_key, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (pair_key) DO NOTHING",
        )
        .bind(game.id)
        .bind(game.match_type)
        .bind(game.status)
        .bind(&game.organizer_id)
        .bind(&game.court_id)
        .bind(game.scheduled_at)
        .bind(pair)
        .bind(game.created_at)
        .bind(game.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| unique_violation(e, || format!("match {} already exists", game.id)))?;

        if inserted.rows_affected() == 0 {
            return Ok(false);
        }

        for (position, participant) in game.participants.iter().enumerate() {
            sqlx::query(
                "INSERT INTO match_participants (match_id, user_id, status, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(game.id)
            .bind(&participant.user_id)
            .bind(participant.status)
            .bind(position as i32)
            .execute(&mut *conn)
            .await?;
        }

        if let Some(room_id) = game.chat_room_id {
            sqlx::query("INSERT INTO chat_rooms (id, match_id, created_at) VALUES ($1, $2, $3)")
                .bind(room_id)
                .bind(game.id)
                .bind(game.created_at)
                .execute(&mut *conn)
                .await?;
        }

        Ok(true)
    }

    async fn write_notifications(conn: &mut PgConnection, notifications: &[MatchNotification]) -> StoreResult<()> {
        for n in notifications {
            sqlx::query(&format!(
                "INSERT INTO match_notifications ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                NOTIFICATION_COLUMNS
            ))
            .bind(n.id)
            .bind(&n.user_id)
            .bind(n.notification_type)
            .bind(&n.title)
            .bind(&n.message)
            .bind(&n.payload)
            .bind(n.is_read)
            .bind(n.read_at)
            .bind(n.created_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn existing_mutual(conn: &mut PgConnection, match_id: Uuid) -> StoreResult<Option<MutualMatch>> {
        let Some(game) = Self::load_match(conn, match_id).await? else {
            return Ok(None);
        };
        let chat_room = sqlx::query_as::<_, ChatRoom>("SELECT id, match_id, created_at FROM chat_rooms WHERE match_id = $1")
            .bind(match_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(chat_room.map(|chat_room| MutualMatch {
            game,
            chat_room,
            notifications: Vec::new(),
            created: false,
        }))
    }

    async fn last_auto_adjusted_at(conn: &mut PgConnection, user_id: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let last: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MAX(created_at) FROM skill_level_records \
             WHERE user_id = $1 AND reason IN ('auto_adjustment', 'match_result')",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(last)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_card_interaction(&self, interaction: CardInteraction) -> StoreResult<CardInteraction> {
        let query = format!(
            "INSERT INTO card_interactions ({cols}) VALUES ($1, $2, $3, $4, FALSE, NULL, $5, $5) \
             ON CONFLICT (actor_id, target_id) DO UPDATE SET \
                 action = CASE WHEN card_interactions.is_match THEN card_interactions.action ELSE EXCLUDED.action END, \
                 updated_at = CASE WHEN card_interactions.is_match THEN card_interactions.updated_at ELSE EXCLUDED.updated_at END \
             RETURNING {cols}",
            cols = INTERACTION_COLUMNS
        );

        let row = sqlx::query_as::<_, CardInteraction>(&query)
            .bind(interaction.id)
            .bind(&interaction.actor_id)
            .bind(&interaction.target_id)
            .bind(interaction.action)
            .bind(interaction.created_at)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(
            "Recorded card action: {} -> {} ({})",
            row.actor_id,
            row.target_id,
            row.action.as_str()
        );

        Ok(row)
    }

    async fn find_card_interaction(&self, actor_id: &str, target_id: &str) -> StoreResult<Option<CardInteraction>> {
        let query = format!(
            "SELECT {} FROM card_interactions WHERE actor_id = $1 AND target_id = $2",
            INTERACTION_COLUMNS
        );
        Ok(sqlx::query_as::<_, CardInteraction>(&query)
            .bind(actor_id)
            .bind(target_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_mutual_match(&self, actor_id: &str, target_id: &str) -> StoreResult<Option<MutualMatch>> {
        let key = pair_key(actor_id, target_id);
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "SELECT {} FROM card_interactions \
             WHERE (actor_id = $1 AND target_id = $2) OR (actor_id = $2 AND target_id = $1) \
             ORDER BY actor_id, target_id \
             FOR UPDATE",
            INTERACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, CardInteraction>(&query)
            .bind(actor_id)
            .bind(target_id)
            .fetch_all(&mut *tx)
            .await?;

        if let Some(match_id) = rows.iter().find_map(|r| r.match_id) {
            let existing = Self::existing_mutual(&mut *tx, match_id).await?;
            tx.commit().await?;
            return Ok(existing);
        }

        let both_like = rows.len() == 2 && rows.iter().all(|r| r.action == CardAction::Like);
        if !both_like {
            tx.commit().await?;
            return Ok(None);
        }

        let mut game = Match::mutual(actor_id, target_id);
        let chat_room = ChatRoom::for_match(game.id);
        game.chat_room_id = Some(chat_room.id);

        if !Self::write_match(&mut *tx, &game, Some(&key)).await? {
            let match_id: Uuid = sqlx::query_scalar("SELECT id FROM matches WHERE pair_key = $1")
                .bind(&key)
                .fetch_one(&mut *tx)
                .await?;
            let existing = Self::existing_mutual(&mut *tx, match_id).await?;
            tx.commit().await?;
            return Ok(existing);
        }

        sqlx::query(
            "UPDATE card_interactions SET is_match = TRUE, match_id = $3, updated_at = NOW() \
             WHERE (actor_id = $1 AND target_id = $2) OR (actor_id = $2 AND target_id = $1)",
        )
        .bind(actor_id)
        .bind(target_id)
        .bind(game.id)
        .execute(&mut *tx)
        .await?;

        let notifications = vec![
            MatchNotification::mutual_match(actor_id, target_id, &game, &chat_room),
            MatchNotification::mutual_match(target_id, actor_id, &game, &chat_room),
        ];
        Self::write_notifications(&mut *tx, &notifications).await?;

        tx.commit().await?;
        tracing::info!("Created mutual match {} for {}", game.id, key);

        Ok(Some(MutualMatch {
            game,
            chat_room,
            notifications,
            created: true,
        }))
    }

    async fn insert_match(&self, game: &Match) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_match(&mut *tx, game, None).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_match(&mut *conn, match_id).await
    }

    async fn update_match_status(&self, match_id: Uuid, status: MatchStatus) -> StoreResult<Match> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE matches SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(match_id)
            .bind(status)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("match {}", match_id)));
        }

        let game = Self::load_match(&mut *tx, match_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))?;
        tx.commit().await?;
        Ok(game)
    }

    async fn set_participant_status(
        &self,
        match_id: Uuid,
        user_id: &str,
        status: ParticipantStatus,
    ) -> StoreResult<Match> {
        let mut tx = self.pool.begin().await?;
        let current: Option<ParticipantStatus> = sqlx::query_scalar(
            "SELECT status FROM match_participants WHERE match_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(match_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        match current {
            None => return Err(StoreError::NotFound(format!("{} on match {}", user_id, match_id))),
            Some(current) if current == status => {}
            Some(ParticipantStatus::Invited) => {
                sqlx::query("UPDATE match_participants SET status = $3 WHERE match_id = $1 AND user_id = $2")
                    .bind(match_id)
                    .bind(user_id)
                    .bind(status)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("UPDATE matches SET updated_at = NOW() WHERE id = $1")
                    .bind(match_id)
                    .execute(&mut *tx)
                    .await?;
            }
            Some(_) => {
                return Err(StoreError::Conflict(format!(
                    "{} already answered the invite to match {}",
                    user_id, match_id
                )))
            }
        }

        let game = Self::load_match(&mut *tx, match_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))?;
        tx.commit().await?;
        Ok(game)
    }

    async fn matches_for_user(&self, user_id: &str) -> StoreResult<Vec<Match>> {
        let mut conn = self.pool.acquire().await?;
        let query = format!(
            "{} WHERE m.id IN (SELECT match_id FROM match_participants WHERE user_id = $1 AND status <> 'declined') \
             ORDER BY m.created_at DESC",
            MATCH_SELECT
        );
        let rows = sqlx::query_as::<_, MatchRow>(&query)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        Self::attach_participants(&mut *conn, rows).await
    }

    async fn insert_match_result(&self, result: &MatchResult) -> StoreResult<()> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO match_results ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (match_id) DO NOTHING",
            RESULT_COLUMNS
        ))
        .bind(result.match_id)
        .bind(&result.winner_id)
        .bind(&result.loser_id)
        .bind(&result.score)
        .bind(&result.recorded_by)
        .bind(result.is_confirmed)
        .bind(result.confirmed_by.as_slice())
        .bind(result.created_at)
        .bind(result.confirmed_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "match {} already has a result",
                result.match_id
            )));
        }
        Ok(())
    }

    async fn get_match_result(&self, match_id: Uuid) -> StoreResult<Option<MatchResult>> {
        let query = format!("SELECT {} FROM match_results WHERE match_id = $1", RESULT_COLUMNS);
        Ok(sqlx::query_as::<_, MatchResult>(&query)
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn confirm_match_result(
        &self,
        match_id: Uuid,
        user_id: &str,
        required: usize,
    ) -> StoreResult<(MatchResult, bool)> {
        let mut tx = self.pool.begin().await?;
        let query = format!(
            "SELECT {} FROM match_results WHERE match_id = $1 FOR UPDATE",
            RESULT_COLUMNS
        );
        let mut result = sqlx::query_as::<_, MatchResult>(&query)
            .bind(match_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("result for match {}", match_id)))?;

        if !result.confirmed_by.iter().any(|u| u == user_id) {
            result.confirmed_by.push(user_id.to_string());
        }

        let mut newly_confirmed = false;
        if !result.is_confirmed && result.confirmed_by.len() >= required {
            result.is_confirmed = true;
            result.confirmed_at = Some(Utc::now());
            newly_confirmed = true;
        }

        sqlx::query(
            "UPDATE match_results SET confirmed_by = $2, is_confirmed = $3, confirmed_at = $4 WHERE match_id = $1",
        )
        .bind(match_id)
        .bind(result.confirmed_by.as_slice())
        .bind(result.is_confirmed)
        .bind(result.confirmed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((result, newly_confirmed))
    }

    async fn results_for_user(&self, user_id: &str) -> StoreResult<Vec<MatchResult>> {
        let query = format!(
            "SELECT {} FROM match_results WHERE winner_id = $1 OR loser_id = $1 ORDER BY created_at DESC",
            RESULT_COLUMNS
        );
        Ok(sqlx::query_as::<_, MatchResult>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_or_create_reputation(&self, user_id: &str) -> StoreResult<ReputationScore> {
        sqlx::query("INSERT INTO reputation_scores (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let query = format!("SELECT {} FROM reputation_scores WHERE user_id = $1", REPUTATION_COLUMNS);
        Ok(sqlx::query_as::<_, ReputationScore>(&query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn reputation_scores(&self, user_ids: &[String]) -> StoreResult<HashMap<String, ReputationScore>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = format!(
            "SELECT {} FROM reputation_scores WHERE user_id = ANY($1)",
            REPUTATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, ReputationScore>(&query)
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| (r.user_id.clone(), r)).collect())
    }

    async fn modify_reputation(&self, user_id: &str, mutation: ReputationMutation) -> StoreResult<ReputationScore> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO reputation_scores (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "SELECT {} FROM reputation_scores WHERE user_id = $1 FOR UPDATE",
            REPUTATION_COLUMNS
        );
        let mut score = sqlx::query_as::<_, ReputationScore>(&query)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        mutation(&mut score);
        score.updated_at = Utc::now();

        sqlx::query(
            "UPDATE reputation_scores SET \
                 attendance_rate = $2, punctuality_score = $3, skill_accuracy = $4, behavior_rating = $5, \
                 total_matches = $6, completed_matches = $7, cancelled_matches = $8, \
                 overall_score = $9, updated_at = $10 \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(score.attendance_rate)
        .bind(score.punctuality_score)
        .bind(score.skill_accuracy)
        .bind(score.behavior_rating)
        .bind(score.total_matches)
        .bind(score.completed_matches)
        .bind(score.cancelled_matches)
        .bind(score.overall_score)
        .bind(score.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(score)
    }

    async fn insert_behavior_review(&self, review: &BehaviorReview) -> StoreResult<()> {
        let inserted = sqlx::query(
            "INSERT INTO behavior_reviews (id, match_id, reviewer_id, reviewee_id, rating, comment, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (match_id, reviewer_id, reviewee_id) DO NOTHING",
        )
        .bind(review.id)
        .bind(review.match_id)
        .bind(&review.reviewer_id)
        .bind(&review.reviewee_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "{} already reviewed {} for match {}",
                review.reviewer_id, review.reviewee_id, review.match_id
            )));
        }
        Ok(())
    }

    async fn behavior_reviews_for(&self, reviewee_id: &str) -> StoreResult<Vec<BehaviorReview>> {
        Ok(sqlx::query_as::<_, BehaviorReview>(
            "SELECT id, match_id, reviewer_id, reviewee_id, rating, comment, created_at \
             FROM behavior_reviews WHERE reviewee_id = $1 ORDER BY created_at DESC",
        )
        .bind(reviewee_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_skill_accuracy_record(&self, record: &SkillAccuracyRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO skill_accuracy_records (id, user_id, reported_level, observed_level, match_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(record.reported_level)
        .bind(record.observed_level)
        .bind(record.match_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_skill_accuracy_records(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<SkillAccuracyRecord>> {
        Ok(sqlx::query_as::<_, SkillAccuracyRecord>(
            "SELECT id, user_id, reported_level, observed_level, match_id, created_at \
             FROM skill_accuracy_records \
             WHERE user_id = $1 AND ($2::timestamptz IS NULL OR created_at > $2) \
             ORDER BY created_at DESC \
             LIMIT $3",
        )
        .bind(user_id)
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn users_with_skill_accuracy_records(&self) -> StoreResult<Vec<String>> {
        Ok(
            sqlx::query_scalar("SELECT DISTINCT user_id FROM skill_accuracy_records ORDER BY user_id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn skill_levels(&self, user_ids: &[String]) -> StoreResult<HashMap<String, f64>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(String, f64)> =
            sqlx::query_as("SELECT user_id, level FROM user_skill_levels WHERE user_id = ANY($1)")
                .bind(user_ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn skill_level_state(&self, user_id: &str) -> StoreResult<Option<SkillLevelState>> {
        let mut conn = self.pool.acquire().await?;
        let level: Option<f64> = sqlx::query_scalar("SELECT level FROM user_skill_levels WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

        match level {
            Some(level) => Ok(Some(SkillLevelState {
                level,
                last_auto_adjusted_at: Self::last_auto_adjusted_at(&mut *conn, user_id).await?,
            })),
            None => Ok(None),
        }
    }

    async fn adjust_skill_level(
        &self,
        user_id: &str,
        fallback_level: f64,
        adjust: SkillLevelAdjustment,
    ) -> StoreResult<Option<SkillLevelRecord>> {
        let mut tx = self.pool.begin().await?;

        // Users without a level row have nothing to lock yet
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let level: Option<f64> =
            sqlx::query_scalar("SELECT level FROM user_skill_levels WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let state = SkillLevelState {
            level: level.unwrap_or(fallback_level),
            last_auto_adjusted_at: Self::last_auto_adjusted_at(&mut *tx, user_id).await?,
        };

        let Some(change) = adjust(state) else {
            tx.commit().await?;
            return Ok(None);
        };

        let record = SkillLevelRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            old_level: state.level,
            new_level: change.new_level,
            reason: change.reason,
            note: change.note,
            match_id: change.match_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO user_skill_levels (user_id, level, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET level = EXCLUDED.level, updated_at = EXCLUDED.updated_at",
        )
        .bind(user_id)
        .bind(record.new_level)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO skill_level_records (id, user_id, old_level, new_level, reason, note, match_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(record.old_level)
        .bind(record.new_level)
        .bind(record.reason)
        .bind(&record.note)
        .bind(record.match_id)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    async fn skill_level_history(&self, user_id: &str) -> StoreResult<Vec<SkillLevelRecord>> {
        Ok(sqlx::query_as::<_, SkillLevelRecord>(
            "SELECT id, user_id, old_level, new_level, reason, note, match_id, created_at \
             FROM skill_level_records WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_privacy_settings(&self, user_id: &str) -> StoreResult<UserPrivacySettings> {
        let settings = sqlx::query_as::<_, UserPrivacySettings>(
            "SELECT user_id, show_reputation_score, show_match_history, show_win_loss_record, \
                    show_skill_progression, show_behavior_reviews, show_detailed_stats, allow_stats_sharing \
             FROM user_privacy_settings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings.unwrap_or_else(|| UserPrivacySettings::defaults_for(user_id)))
    }

    async fn save_privacy_settings(&self, settings: &UserPrivacySettings) -> StoreResult<UserPrivacySettings> {
        sqlx::query(
            "INSERT INTO user_privacy_settings (user_id, show_reputation_score, show_match_history, \
                 show_win_loss_record, show_skill_progression, show_behavior_reviews, show_detailed_stats, \
                 allow_stats_sharing) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 show_reputation_score = EXCLUDED.show_reputation_score, \
                 show_match_history = EXCLUDED.show_match_history, \
                 show_win_loss_record = EXCLUDED.show_win_loss_record, \
                 show_skill_progression = EXCLUDED.show_skill_progression, \
                 show_behavior_reviews = EXCLUDED.show_behavior_reviews, \
                 show_detailed_stats = EXCLUDED.show_detailed_stats, \
                 allow_stats_sharing = EXCLUDED.allow_stats_sharing",
        )
        .bind(&settings.user_id)
        .bind(settings.show_reputation_score)
        .bind(settings.show_match_history)
        .bind(settings.show_win_loss_record)
        .bind(settings.show_skill_progression)
        .bind(settings.show_behavior_reviews)
        .bind(settings.show_detailed_stats)
        .bind(settings.allow_stats_sharing)
        .execute(&self.pool)
        .await?;

        Ok(settings.clone())
    }

    async fn insert_notifications(&self, notifications: &[MatchNotification]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_notifications(&mut *tx, notifications).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn notifications_for(&self, user_id: &str, unread_only: bool) -> StoreResult<Vec<MatchNotification>> {
        let query = format!(
            "SELECT {} FROM match_notifications \
             WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE) \
             ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, MatchNotification>(&query)
            .bind(user_id)
            .bind(unread_only)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn mark_notification_read(&self, notification_id: Uuid, user_id: &str) -> StoreResult<MatchNotification> {
        let query = format!(
            "UPDATE match_notifications \
             SET is_read = TRUE, read_at = COALESCE(read_at, NOW()) \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        sqlx::query_as::<_, MatchNotification>(&query)
            .bind(notification_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("notification {}", notification_id)))
    }

    async fn health_check(&self) -> StoreResult<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_mutual_match_is_created_once() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PostgresStore::new(&url, 5, 1).await.expect("Failed to connect");

        let a = format!("pg-a-{}", Uuid::new_v4());
        let b = format!("pg-b-{}", Uuid::new_v4());
        store
            .upsert_card_interaction(CardInteraction::new(&a, &b, CardAction::Like))
            .await
            .unwrap();
        store
            .upsert_card_interaction(CardInteraction::new(&b, &a, CardAction::Like))
            .await
            .unwrap();

        let first = store.create_mutual_match(&a, &b).await.unwrap().unwrap();
        let second = store.create_mutual_match(&b, &a).await.unwrap().unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.game.id, second.game.id);
        assert_eq!(second.game.participants.len(), 2);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_health_check() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PostgresStore::new(&url, 2, 1).await.expect("Failed to connect");
        assert!(store.health_check().await.unwrap());
    }

    #[test]
    fn test_unique_violation_passthrough() {
        let err = unique_violation(sqlx::Error::RowNotFound, || "dup".to_string());
        assert!(matches!(err, StoreError::SqlxError(sqlx::Error::RowNotFound)));
    }
}
