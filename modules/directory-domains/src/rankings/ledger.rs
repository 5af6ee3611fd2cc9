//! Ranking ledger: score submission and bulk rank recomputation per scope.
//!
//! Submitting a score never moves ranks. Ranks are a scope-wide property
//! rebuilt by [`RankingLedger::recompute_ranks`], which numbers the active
//! members `1..=N` by score descending, ties broken by location id.
//! Recomputations of the same scope are serialized with a transaction-scoped
//! advisory lock; different scopes never wait on each other.

use std::collections::BTreeSet;

use directory_core::{require_finite_score, require_positive_limit, Result, Scope, ScopeType};
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{RankedLocation, Ranking, ScopeRecompute, ScopeStats, ScoreSubmission};

#[derive(Clone)]
pub struct RankingLedger {
    pool: PgPool,
}

impl RankingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert the score for `(location, scope)`. An existing row's current
    /// rank is carried into `previous_rank`; the rank itself is untouched.
    pub async fn submit_score(
        &self,
        location_id: Uuid,
        scope: Scope,
        composite_score: f64,
    ) -> Result<Ranking> {
        require_finite_score(composite_score)?;
        upsert_score(location_id, scope, composite_score, &self.pool).await
    }

    /// Apply a batch of scores and renumber every scope it touched, all in
    /// one transaction.
    pub async fn submit_scores(&self, batch: &[ScoreSubmission]) -> Result<Vec<Ranking>> {
        for submission in batch {
            require_finite_score(submission.composite_score)?;
        }

        let scopes: BTreeSet<Scope> = batch.iter().map(|s| s.scope).collect();

        let mut tx = self.pool.begin().await?;

        // Scope locks come before any row lock, in BTreeSet order, so a batch
        // never deadlocks against a concurrent recomputation.
        for scope in &scopes {
            lock_scope(*scope, &mut tx).await?;
        }

        for submission in batch {
            upsert_score(
                submission.location_id,
                submission.scope,
                submission.composite_score,
                &mut *tx,
            )
            .await?;
        }

        for scope in &scopes {
            recompute_in(*scope, &mut tx).await?;
        }

        let mut rankings = Vec::with_capacity(batch.len());
        for submission in batch {
            let ranking = sqlx::query_as::<_, Ranking>(
                "SELECT * FROM rankings WHERE location_id = $1 AND scope_type = $2 AND scope_id = $3",
            )
            .bind(submission.location_id)
            .bind(submission.scope.scope_type.as_str())
            .bind(submission.scope.scope_id)
            .fetch_one(&mut *tx)
            .await?;
            rankings.push(ranking);
        }

        tx.commit().await?;

        info!(
            submissions = batch.len(),
            scopes = scopes.len(),
            "Score batch applied"
        );
        Ok(rankings)
    }

    /// Reassign `1..=N` across the scope's active members.
    pub async fn recompute_ranks(&self, scope: Scope) -> Result<ScopeRecompute> {
        let mut tx = self.pool.begin().await?;
        let summary = recompute_in(scope, &mut tx).await?;
        tx.commit().await?;

        info!(
            scope = %scope,
            ranked = summary.ranked,
            cleared = summary.cleared,
            "Recomputed ranks"
        );
        Ok(summary)
    }

    /// Recompute every scope holding at least one ranking, each in its own
    /// transaction.
    pub async fn recompute_all_scopes(&self) -> Result<Vec<ScopeRecompute>> {
        let scopes = sqlx::query_as::<_, (String, i64)>(
            "SELECT DISTINCT scope_type, scope_id FROM rankings ORDER BY scope_type, scope_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(scopes.len());
        for (scope_type, scope_id) in scopes {
            let scope = Scope::new(scope_type.parse::<ScopeType>()?, scope_id);
            summaries.push(self.recompute_ranks(scope).await?);
        }
        Ok(summaries)
    }

    /// Leaderboard for a scope: ranked members first by rank, then scored but
    /// not-yet-numbered members. Inactive locations are never listed.
    pub async fn get_by_scope(&self, scope: Scope, limit: i64) -> Result<Vec<RankedLocation>> {
        let limit = require_positive_limit(limit)?;

        sqlx::query_as::<_, RankedLocation>(
            r#"
            SELECT r.*, l.name, l.slug, l.city, l.address_street, l.phone, l.website,
                   l.rating, l.review_count
            FROM rankings r
            JOIN locations l ON l.id = r.location_id
            WHERE r.scope_type = $1 AND r.scope_id = $2
              AND l.is_active = TRUE
            ORDER BY r.rank ASC NULLS LAST, r.composite_score DESC, r.location_id ASC
            LIMIT $3
            "#,
        )
        .bind(scope.scope_type.as_str())
        .bind(scope.scope_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Every ranking held by one location.
    pub async fn rankings_for_location(&self, location_id: Uuid) -> Result<Vec<Ranking>> {
        sqlx::query_as::<_, Ranking>(
            r#"
            SELECT * FROM rankings
            WHERE location_id = $1
            ORDER BY scope_type, rank ASC NULLS LAST, scope_id
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn scope_stats(&self, scope: Scope) -> Result<ScopeStats> {
        sqlx::query_as::<_, ScopeStats>(
            r#"
            SELECT COUNT(r.rank) AS total_ranked,
                   AVG(r.composite_score) AS avg_score,
                   MAX(r.composite_score) AS max_score,
                   MIN(r.composite_score) AS min_score
            FROM rankings r
            JOIN locations l ON l.id = r.location_id
            WHERE r.scope_type = $1 AND r.scope_id = $2 AND l.is_active = TRUE
            "#,
        )
        .bind(scope.scope_type.as_str())
        .bind(scope.scope_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Deregister one location from one scope and close the gap it leaves.
    /// Returns whether a ranking existed.
    pub async fn remove_from_scope(&self, location_id: Uuid, scope: Scope) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        lock_scope(scope, &mut tx).await?;
        let removed = sqlx::query(
            "DELETE FROM rankings WHERE location_id = $1 AND scope_type = $2 AND scope_id = $3",
        )
        .bind(location_id)
        .bind(scope.scope_type.as_str())
        .bind(scope.scope_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if removed {
            recompute_in(scope, &mut tx).await?;
        }
        tx.commit().await?;

        debug!(%location_id, scope = %scope, removed, "Removed location from scope");
        Ok(removed)
    }
}

async fn upsert_score(
    location_id: Uuid,
    scope: Scope,
    composite_score: f64,
    executor: impl PgExecutor<'_>,
) -> Result<Ranking> {
    sqlx::query_as::<_, Ranking>(
        r#"
        INSERT INTO rankings (location_id, scope_type, scope_id, composite_score)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (location_id, scope_type, scope_id) DO UPDATE SET
            previous_rank = rankings.rank,
            composite_score = EXCLUDED.composite_score,
            calculated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(location_id)
    .bind(scope.scope_type.as_str())
    .bind(scope.scope_id)
    .bind(composite_score)
    .fetch_one(executor)
    .await
    .map_err(Into::into)
}

/// Block until no other transaction is renumbering `scope`. Released at
/// commit or rollback.
pub(crate) async fn lock_scope(scope: Scope, conn: &mut PgConnection) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(scope.lock_key())
        .execute(conn)
        .await?;
    Ok(())
}

/// Renumber one scope inside the caller's transaction.
///
/// Every renumbered row moves its old rank into `previous_rank`, whether or
/// not the rank changes. With no submissions in between, a second run
/// reassigns the same ranks.
pub(crate) async fn recompute_in(scope: Scope, conn: &mut PgConnection) -> Result<ScopeRecompute> {
    lock_scope(scope, conn).await?;

    let cleared = sqlx::query(
        r#"
        UPDATE rankings r SET
            previous_rank = r.rank,
            rank = NULL,
            calculated_at = NOW()
        FROM locations l
        WHERE l.id = r.location_id
          AND r.scope_type = $1 AND r.scope_id = $2
          AND l.is_active = FALSE
          AND r.rank IS NOT NULL
        "#,
    )
    .bind(scope.scope_type.as_str())
    .bind(scope.scope_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let ranked = sqlx::query(
        r#"
        WITH ranked AS (
            SELECT r.id,
                   (ROW_NUMBER() OVER (
                       ORDER BY r.composite_score DESC, r.location_id ASC
                   ))::INTEGER AS new_rank
            FROM rankings r
            JOIN locations l ON l.id = r.location_id
            WHERE r.scope_type = $1 AND r.scope_id = $2
              AND l.is_active = TRUE
        )
        UPDATE rankings r SET
            previous_rank = r.rank,
            rank = ranked.new_rank,
            calculated_at = NOW()
        FROM ranked
        WHERE r.id = ranked.id
        "#,
    )
    .bind(scope.scope_type.as_str())
    .bind(scope.scope_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(ScopeRecompute {
        scope,
        ranked,
        cleared,
    })
}

/// Delete every ranking of `location_id`, returning the scopes it left.
pub(crate) async fn delete_for_location(
    location_id: Uuid,
    conn: &mut PgConnection,
) -> Result<BTreeSet<Scope>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "DELETE FROM rankings WHERE location_id = $1 RETURNING scope_type, scope_id",
    )
    .bind(location_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|(scope_type, scope_id)| Ok(Scope::new(scope_type.parse()?, scope_id)))
        .collect()
}
