//! Postgres Stores
//!
//! Database-backed implementations of [`ProcessStore`] and [`MessageStore`]
//! with the same contract as the in-memory defaults. All queries use
//! runtime-checked `sqlx::query()` instead of compile-time macros because the
//! tables are created by migrations that may not exist at compile time.
//!
//! The full entity is persisted as a JSONB document; the columns duplicated
//! out of it exist for filtering and the version CAS only.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use vetting_types::{SystemMessage, UserMessage, VerificationProcess};

use crate::comms::MessageStore;
use crate::query::{Page, PageRequest, ProcessFilter};
use crate::store::{ProcessStore, StoreError};

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(row: &PgRow) -> Result<T, StoreError> {
    let doc: serde_json::Value = row.try_get("doc").map_err(backend)?;
    serde_json::from_value(doc).map_err(|e| StoreError::Backend(e.to_string()))
}

/// Postgres-backed process store.
#[derive(Clone)]
pub struct PgProcessStore {
    pool: PgPool,
}

impl PgProcessStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(qb: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &ProcessFilter) {
        if !filter.statuses.is_empty() {
            let statuses: Vec<String> =
                filter.statuses.iter().map(|s| s.as_str().to_string()).collect();
            qb.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if !filter.priorities.is_empty() {
            let priorities: Vec<String> = filter
                .priorities
                .iter()
                .map(|p| p.as_str().to_string())
                .collect();
            qb.push(" AND priority = ANY(").push_bind(priorities).push(")");
        }
        if !filter.risk_levels.is_empty() {
            let levels: Vec<String> = filter
                .risk_levels
                .iter()
                .map(|l| l.as_str().to_string())
                .collect();
            qb.push(" AND risk_level = ANY(").push_bind(levels).push(")");
        }
        if let Some(reviewer) = &filter.assigned_reviewer {
            qb.push(" AND assigned_reviewer = ").push_bind(reviewer.clone());
        }
        if let Some(after) = filter.created_after {
            qb.push(" AND created_at >= ").push_bind(after);
        }
        if let Some(before) = filter.created_before {
            qb.push(" AND created_at <= ").push_bind(before);
        }
        if let Some(needle) = &filter.search {
            let pattern = format!("%{needle}%");
            qb.push(" AND (full_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if filter.overdue_only {
            qb.push(" AND status = 'more_info_requested' AND more_info_deadline < NOW()");
        }
    }
}

#[async_trait]
impl ProcessStore for PgProcessStore {
    async fn insert(&self, process: &VerificationProcess) -> Result<(), StoreError> {
        let doc = encode(process)?;
        let result = sqlx::query(
            r#"
            INSERT INTO verification_processes
                (process_id, user_id, user_type, status, priority, risk_level,
                 assigned_reviewer, full_name, email, more_info_deadline,
                 created_at, updated_at, version, doc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(process.id)
        .bind(process.user_id)
        .bind(process.user_type.as_str())
        .bind(process.status.as_str())
        .bind(process.priority.as_str())
        .bind(process.risk_assessment.map(|r| r.level.as_str()))
        .bind(process.assigned_reviewer.as_deref())
        .bind(process.request.full_name.as_str())
        .bind(process.request.email.as_str())
        .bind(process.more_info_deadline())
        .bind(process.created_at)
        .bind(process.updated_at)
        .bind(process.version as i64)
        .bind(doc)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false) =>
            {
                Err(StoreError::DuplicateProcess(process.id))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn load(&self, id: Uuid) -> Result<VerificationProcess, StoreError> {
        let row = sqlx::query("SELECT doc FROM verification_processes WHERE process_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => decode(&row),
            None => Err(StoreError::ProcessNotFound(id)),
        }
    }

    async fn update(
        &self,
        process: &VerificationProcess,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let doc = encode(process)?;
        let rows = sqlx::query(
            r#"
            UPDATE verification_processes
            SET status = $2,
                priority = $3,
                risk_level = $4,
                assigned_reviewer = $5,
                more_info_deadline = $6,
                updated_at = $7,
                version = $8,
                doc = $9
            WHERE process_id = $1 AND version = $10
            "#,
        )
        .bind(process.id)
        .bind(process.status.as_str())
        .bind(process.priority.as_str())
        .bind(process.risk_assessment.map(|r| r.level.as_str()))
        .bind(process.assigned_reviewer.as_deref())
        .bind(process.more_info_deadline())
        .bind(process.updated_at)
        .bind(process.version as i64)
        .bind(doc)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?
        .rows_affected();

        if rows == 0 {
            // Distinguish a missing row from a lost race.
            let row = sqlx::query("SELECT version FROM verification_processes WHERE process_id = $1")
                .bind(process.id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
            return match row {
                Some(row) => {
                    let actual: i64 = row.try_get("version").map_err(backend)?;
                    Err(StoreError::VersionConflict {
                        process_id: process.id,
                        expected: expected_version,
                        actual: actual as u64,
                    })
                }
                None => Err(StoreError::ProcessNotFound(process.id)),
            };
        }
        Ok(())
    }

    async fn query(
        &self,
        filter: &ProcessFilter,
        page: &PageRequest,
    ) -> Result<Page<VerificationProcess>, StoreError> {
        let mut count_qb: QueryBuilder<'_, sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) AS total FROM verification_processes WHERE TRUE");
        Self::push_filters(&mut count_qb, filter);
        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?
            .try_get("total")
            .map_err(backend)?;

        let mut qb: QueryBuilder<'_, sqlx::Postgres> =
            QueryBuilder::new("SELECT doc FROM verification_processes WHERE TRUE");
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC OFFSET ")
            .push_bind(page.offset as i64)
            .push(" LIMIT ")
            .push_bind(page.limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await.map_err(backend)?;
        let items = rows
            .iter()
            .map(decode::<VerificationProcess>)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total as usize,
            offset: page.offset,
            limit: page.limit,
        })
    }
}

/// Postgres-backed message store.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append_system(&self, message: &SystemMessage) -> Result<(), StoreError> {
        let doc = encode(message)?;
        sqlx::query(
            r#"
            INSERT INTO system_messages (message_id, process_id, delivery, queued_at, doc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.id)
        .bind(message.process_id)
        .bind(message.delivery.as_str())
        .bind(message.queued_at)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn load_system(&self, id: Uuid) -> Result<SystemMessage, StoreError> {
        let row = sqlx::query("SELECT doc FROM system_messages WHERE message_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            Some(row) => decode(&row),
            None => Err(StoreError::MessageNotFound(id)),
        }
    }

    async fn update_system(&self, message: &SystemMessage) -> Result<(), StoreError> {
        let doc = encode(message)?;
        let rows = sqlx::query(
            "UPDATE system_messages SET delivery = $2, doc = $3 WHERE message_id = $1",
        )
        .bind(message.id)
        .bind(message.delivery.as_str())
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(backend)?
        .rows_affected();

        if rows == 0 {
            return Err(StoreError::MessageNotFound(message.id));
        }
        Ok(())
    }

    async fn list_system(&self, process_id: Uuid) -> Result<Vec<SystemMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM system_messages WHERE process_id = $1 ORDER BY queued_at ASC",
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(decode::<SystemMessage>).collect()
    }

    async fn append_user(&self, message: &UserMessage) -> Result<(), StoreError> {
        let doc = encode(message)?;
        sqlx::query(
            r#"
            INSERT INTO user_messages (message_id, process_id, created_at, doc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(message.id)
        .bind(message.process_id)
        .bind(message.created_at)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn list_user(&self, process_id: Uuid) -> Result<Vec<UserMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM user_messages WHERE process_id = $1 ORDER BY created_at ASC",
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(decode::<UserMessage>).collect()
    }
}
