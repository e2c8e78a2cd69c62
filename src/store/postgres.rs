use async_trait::async_trait;
use lazy_static::lazy_static;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::{Decimal, Json},
    PgPool, Postgres, QueryBuilder, Row,
};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{numeric, CommitOutcome, Store};
use crate::food_logs::FoodLog;
use crate::nutrition::{Nutrient, NutritionPayload};
use crate::profiles::UserProfile;
use crate::sessions::{ParsingSession, SessionStatus};

lazy_static! {
    static ref FOOD_LOG_COLUMNS: String = {
        let mut cols = vec![
            "id",
            "owner",
            "description",
            "serving_size",
            "meal_type",
            "confidence_score",
            "source",
            "session_id",
            "logged_at",
            "created_at",
        ];
        cols.extend(Nutrient::ALL.iter().map(|n| n.key()));
        cols.join(", ")
    };
}

const SESSION_COLUMNS: &str = "id, owner, raw_input, sanitized_input, status, dishes, \
     parsed_dishes, extracted_datetime, meal_type, confidence_score, meal_analysis, error, \
     created_at, updated_at, completed_at, materialized_at";

const PROFILE_COLUMNS: &str = "owner, gender, height_cm, weight_kg, age, activity_level, goal, \
     utc_offset_minutes, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(db))
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

fn session_from_row(row: &PgRow) -> anyhow::Result<ParsingSession> {
    let status: String = row.try_get("status")?;
    let meal_type: Option<String> = row.try_get("meal_type")?;
    Ok(ParsingSession {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        raw_input: row.try_get("raw_input")?,
        sanitized_input: row.try_get("sanitized_input")?,
        status: status.parse()?,
        dishes: row.try_get::<Json<_>, _>("dishes")?.0,
        parsed_dishes: row.try_get::<Json<_>, _>("parsed_dishes")?.0,
        extracted_datetime: row.try_get("extracted_datetime")?,
        meal_type: meal_type.map(|m| m.parse()).transpose()?,
        confidence_score: row.try_get("confidence_score")?,
        meal_analysis: row
            .try_get::<Option<Json<_>>, _>("meal_analysis")?
            .map(|j| j.0),
        error: row.try_get::<Option<Json<_>>, _>("error")?.map(|j| j.0),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
        materialized_at: row.try_get("materialized_at")?,
    })
}

fn food_log_from_row(row: &PgRow) -> anyhow::Result<FoodLog> {
    let mut nutrition = NutritionPayload::new();
    for &n in Nutrient::ALL {
        if let Some(d) = row.try_get::<Option<Decimal>, _>(n.key())? {
            nutrition.set(n, numeric::to_f64(d));
        }
    }
    let meal_type: Option<String> = row.try_get("meal_type")?;
    let source: String = row.try_get("source")?;
    Ok(FoodLog {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        description: row.try_get("description")?,
        nutrition,
        serving_size: row.try_get("serving_size")?,
        meal_type: meal_type.map(|m| m.parse()).transpose()?,
        confidence_score: row.try_get("confidence_score")?,
        source: source.parse()?,
        session_id: row.try_get("session_id")?,
        logged_at: row.try_get("logged_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn profile_from_row(row: &PgRow) -> anyhow::Result<UserProfile> {
    let gender: String = row.try_get("gender")?;
    let activity_level: String = row.try_get("activity_level")?;
    let goal: String = row.try_get("goal")?;
    let age: i32 = row.try_get("age")?;
    Ok(UserProfile {
        owner: row.try_get("owner")?,
        gender: gender.parse()?,
        height_cm: row.try_get("height_cm")?,
        weight_kg: row.try_get("weight_kg")?,
        age: u32::try_from(age)?,
        activity_level: activity_level.parse()?,
        goal: goal.parse()?,
        utc_offset_minutes: row.try_get("utc_offset_minutes")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Nutrient amounts in `Nutrient::ALL` order, converted for NUMERIC columns.
fn nutrient_decimals(payload: &NutritionPayload) -> anyhow::Result<Vec<Option<Decimal>>> {
    Nutrient::ALL
        .iter()
        .map(|n| payload.get(*n).map(numeric::to_decimal).transpose())
        .collect()
}

fn insert_logs_query<'a>(
    logs: &'a [FoodLog],
    amounts: &'a [Vec<Option<Decimal>>],
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO food_logs ({}) ", *FOOD_LOG_COLUMNS));
    qb.push_values(logs.iter().zip(amounts), |mut b, (log, values)| {
        b.push_bind(log.id)
            .push_bind(log.owner)
            .push_bind(log.description.as_str())
            .push_bind(log.serving_size.as_deref())
            .push_bind(log.meal_type.map(|m| m.as_str()))
            .push_bind(log.confidence_score)
            .push_bind(log.source.as_str())
            .push_bind(log.session_id)
            .push_bind(log.logged_at)
            .push_bind(log.created_at);
        for v in values {
            b.push_bind(*v);
        }
    });
    qb.push(format!(" RETURNING {}", *FOOD_LOG_COLUMNS));
    qb
}

#[async_trait]
impl Store for PgStore {
    async fn insert_session(&self, s: &ParsingSession) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO parsing_sessions ({SESSION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        ))
        .bind(s.id)
        .bind(s.owner)
        .bind(&s.raw_input)
        .bind(&s.sanitized_input)
        .bind(s.status.as_str())
        .bind(Json(&s.dishes))
        .bind(Json(&s.parsed_dishes))
        .bind(s.extracted_datetime)
        .bind(s.meal_type.map(|m| m.as_str()))
        .bind(s.confidence_score)
        .bind(s.meal_analysis.as_ref().map(Json))
        .bind(s.error.as_ref().map(Json))
        .bind(s.created_at)
        .bind(s.updated_at)
        .bind(s.completed_at)
        .bind(s.materialized_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn save_session(&self, s: &ParsingSession) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE parsing_sessions
            SET status = $2, dishes = $3, parsed_dishes = $4, extracted_datetime = $5,
                meal_type = $6, confidence_score = $7, meal_analysis = $8, error = $9,
                updated_at = $10, completed_at = $11
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(s.id)
        .bind(s.status.as_str())
        .bind(Json(&s.dishes))
        .bind(Json(&s.parsed_dishes))
        .bind(s.extracted_datetime)
        .bind(s.meal_type.map(|m| m.as_str()))
        .bind(s.confidence_score)
        .bind(s.meal_analysis.as_ref().map(Json))
        .bind(s.error.as_ref().map(Json))
        .bind(s.updated_at)
        .bind(s.completed_at)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            anyhow::bail!("session {} does not exist or has already finished", s.id);
        }
        Ok(())
    }

    async fn get_session(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<ParsingSession>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM parsing_sessions WHERE id = $1 AND owner = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn commit_session_logs(
        &self,
        owner: Uuid,
        session_id: Uuid,
        logs: &[FoodLog],
        at: OffsetDateTime,
    ) -> anyhow::Result<CommitOutcome> {
        let amounts = logs
            .iter()
            .map(|l| nutrient_decimals(&l.nutrition))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut tx = self.db.begin().await?;

        // row lock serializes concurrent commits of the same session
        let row = sqlx::query(
            r#"
            SELECT status, materialized_at
            FROM parsing_sessions
            WHERE id = $1 AND owner = $2
            FOR UPDATE
            "#,
        )
        .bind(session_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(CommitOutcome::SessionNotFound);
        };
        let status: SessionStatus = row.try_get::<String, _>("status")?.parse()?;
        let materialized_at: Option<OffsetDateTime> = row.try_get("materialized_at")?;
        if status != SessionStatus::Completed {
            return Ok(CommitOutcome::NotCompleted(status));
        }
        if materialized_at.is_some() {
            return Ok(CommitOutcome::AlreadyMaterialized);
        }

        let mut rows = Vec::with_capacity(logs.len());
        if !logs.is_empty() {
            for row in insert_logs_query(logs, &amounts)
                .build()
                .fetch_all(&mut *tx)
                .await?
            {
                rows.push(food_log_from_row(&row)?);
            }
        }

        sqlx::query(
            "UPDATE parsing_sessions SET materialized_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(session_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CommitOutcome::Committed(rows))
    }

    async fn insert_food_log(&self, log: &FoodLog) -> anyhow::Result<FoodLog> {
        let logs = std::slice::from_ref(log);
        let amounts = vec![nutrient_decimals(&log.nutrition)?];
        let row = insert_logs_query(logs, &amounts)
            .build()
            .fetch_one(&self.db)
            .await?;
        food_log_from_row(&row)
    }

    async fn list_food_logs(
        &self,
        owner: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> anyhow::Result<Vec<FoodLog>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM food_logs \
             WHERE owner = $1 AND logged_at >= $2 AND logged_at < $3 \
             ORDER BY logged_at, created_at",
            *FOOD_LOG_COLUMNS
        ))
        .bind(owner)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;
        rows.iter().map(food_log_from_row).collect()
    }

    async fn delete_food_log(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM food_logs WHERE id = $1 AND owner = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn upsert_profile(&self, p: &UserProfile) -> anyhow::Result<UserProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO user_profiles ({PROFILE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (owner) DO UPDATE
            SET gender = EXCLUDED.gender,
                height_cm = EXCLUDED.height_cm,
                weight_kg = EXCLUDED.weight_kg,
                age = EXCLUDED.age,
                activity_level = EXCLUDED.activity_level,
                goal = EXCLUDED.goal,
                utc_offset_minutes = EXCLUDED.utc_offset_minutes,
                updated_at = EXCLUDED.updated_at
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(p.owner)
        .bind(p.gender.as_str())
        .bind(p.height_cm)
        .bind(p.weight_kg)
        .bind(i32::try_from(p.age)?)
        .bind(p.activity_level.as_str())
        .bind(p.goal.as_str())
        .bind(p.utc_offset_minutes)
        .bind(p.updated_at)
        .fetch_one(&self.db)
        .await?;
        profile_from_row(&row)
    }

    async fn get_profile(&self, owner: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE owner = $1"
        ))
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        row.as_ref().map(profile_from_row).transpose()
    }
}
