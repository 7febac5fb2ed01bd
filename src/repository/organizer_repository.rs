use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Lead, LeadStatus, NewOrganizer, Organizer, OrganizerTier, SubscriptionEntry,
        SubscriptionPlan,
    },
    error::{AppError, Result},
    repository::{parse_money, parse_uuid, OrganizerRepository},
};

#[derive(FromRow)]
struct OrganizerRow {
    id: String,
    name: String,
    email: String,
    commission_rate: Option<String>,
    tier: String,
    lead_credit_balance: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct SubscriptionRow {
    id: String,
    organizer_id: String,
    plan: String,
    started_at: NaiveDateTime,
    ends_at: NaiveDateTime,
}

#[derive(FromRow)]
struct LeadRow {
    id: String,
    organizer_id: String,
    name: String,
    email: String,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteOrganizerRepository {
    pool: SqlitePool,
}

impl SqliteOrganizerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_organizer(row: OrganizerRow) -> Result<Organizer> {
        Ok(Organizer {
            id: parse_uuid(&row.id)?,
            name: row.name,
            email: row.email,
            commission_rate: row.commission_rate.as_deref().map(parse_money).transpose()?,
            tier: parse_tier(&row.tier)?,
            lead_credit_balance: row.lead_credit_balance,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_subscription(row: SubscriptionRow) -> Result<SubscriptionEntry> {
        Ok(SubscriptionEntry {
            id: parse_uuid(&row.id)?,
            organizer_id: parse_uuid(&row.organizer_id)?,
            plan: parse_plan(&row.plan)?,
            started_at: DateTime::from_naive_utc_and_offset(row.started_at, Utc),
            ends_at: DateTime::from_naive_utc_and_offset(row.ends_at, Utc),
        })
    }

    fn row_to_lead(row: LeadRow) -> Result<Lead> {
        Ok(Lead {
            id: parse_uuid(&row.id)?,
            organizer_id: parse_uuid(&row.organizer_id)?,
            name: row.name,
            email: row.email,
            status: parse_lead_status(&row.status)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

fn parse_tier(s: &str) -> Result<OrganizerTier> {
    match s {
        "free" => Ok(OrganizerTier::Free),
        "pro" => Ok(OrganizerTier::Pro),
        _ => Err(AppError::Database(format!("Invalid organizer tier: {}", s))),
    }
}

fn parse_plan(s: &str) -> Result<SubscriptionPlan> {
    match s {
        "monthly" => Ok(SubscriptionPlan::Monthly),
        "annual" => Ok(SubscriptionPlan::Annual),
        _ => Err(AppError::Database(format!("Invalid subscription plan: {}", s))),
    }
}

fn parse_lead_status(s: &str) -> Result<LeadStatus> {
    match s {
        "New" => Ok(LeadStatus::New),
        "Contacted" => Ok(LeadStatus::Contacted),
        "Converted" => Ok(LeadStatus::Converted),
        _ => Err(AppError::Database(format!("Invalid lead status: {}", s))),
    }
}

#[async_trait]
impl OrganizerRepository for SqliteOrganizerRepository {
    async fn create(&self, organizer: NewOrganizer) -> Result<Organizer> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO organizers (
                id, name, email, commission_rate, tier,
                lead_credit_balance, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 'free', 0, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&organizer.name)
        .bind(&organizer.email)
        .bind(organizer.commission_rate.map(|d| d.to_string()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created organizer".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Organizer>> {
        let row = sqlx::query_as::<_, OrganizerRow>(
            r#"
            SELECT id, name, email, commission_rate, tier,
                   lead_credit_balance, created_at, updated_at
            FROM organizers
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_organizer(r)?)),
            None => Ok(None),
        }
    }

    async fn subscription_history(&self, organizer_id: Uuid) -> Result<Vec<SubscriptionEntry>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, organizer_id, plan, started_at, ends_at
            FROM subscription_history
            WHERE organizer_id = ?
            ORDER BY started_at DESC
            "#,
        )
        .bind(organizer_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_subscription).collect()
    }

    async fn create_lead(&self, organizer_id: Uuid, name: &str, email: &str) -> Result<Lead> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO leads (id, organizer_id, name, email, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'New', ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(organizer_id.to_string())
        .bind(name)
        .bind(email)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_lead(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created lead".to_string()))
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>(
            r#"
            SELECT id, organizer_id, name, email, status, created_at, updated_at
            FROM leads
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_lead(r)?)),
            None => Ok(None),
        }
    }
}
