use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Datastore, EffectOutcome, SideEffect, StoreError, Transition};
use crate::models::approval::{ApprovalRequest, RequestStatus};
use crate::models::chemical::{Chemical, StockDeduction, UsageRecord};
use crate::models::user::{ActorTier, Role, UserAccount, UserStatus};

const REQUEST_COLUMNS: &str = "id, kind, subject_ref, submitter_id, submitter_name, status, details, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, role, salutation, designation, department, contact_number, joining_date, status, created_at";
const USAGE_COLUMNS: &str = "id, user_id, user_name, chemical_id, chemical_name, quantity_used, unit, used_at";
const CHEMICAL_COLUMNS: &str = "chemical_id, chemical_name, chemical_type, grade, phase, quantity_available, unit, make, date_of_mfg, date_of_exp, rack, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn write_request(
        tx: &mut Transaction<'_, Postgres>,
        request: &ApprovalRequest,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO approval_requests (id, kind, subject_ref, submitter_id, submitter_name, status, details, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(request.id)
        .bind(request.kind)
        .bind(&request.subject_ref)
        .bind(request.submitter_id)
        .bind(&request.submitter_name)
        .bind(request.status)
        .bind(&request.details)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| unique_violation(e, format!("request {}", request.id)))?;
        Ok(())
    }

    async fn write_user(
        tx: &mut Transaction<'_, Postgres>,
        user: &UserAccount,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO users (id, name, email, password_hash, role, salutation, designation, department, contact_number, joining_date, status, created_at)
               VALUES ($1, $2, LOWER($3), $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(&user.salutation)
        .bind(&user.designation)
        .bind(&user.department)
        .bind(&user.contact_number)
        .bind(user.joining_date)
        .bind(user.status)
        .bind(user.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| unique_violation(e, format!("user {}", user.email)))?;
        Ok(())
    }

    async fn apply_effect(
        tx: &mut Transaction<'_, Postgres>,
        effect: &SideEffect,
    ) -> Result<EffectOutcome, StoreError> {
        let affected = match effect {
            SideEffect::None => return Ok(EffectOutcome::Nothing),
            SideEffect::SetUserStatus { user_id, status } => {
                sqlx::query("UPDATE users SET status = $1 WHERE id = $2")
                    .bind(*status)
                    .bind(*user_id)
                    .execute(&mut **tx)
                    .await?
                    .rows_affected()
            }
            SideEffect::DeleteUser { user_id } => {
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(*user_id)
                    .execute(&mut **tx)
                    .await?
                    .rows_affected()
            }
            SideEffect::DeleteChemical { chemical_id } => {
                sqlx::query("DELETE FROM chemicals WHERE chemical_id = $1")
                    .bind(chemical_id)
                    .execute(&mut **tx)
                    .await?
                    .rows_affected()
            }
        };
        Ok(if affected > 0 {
            EffectOutcome::Applied
        } else {
            EffectOutcome::SubjectMissing
        })
    }
}

fn unique_violation(err: sqlx::Error, what: String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(what),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Datastore for PgStore {
    async fn insert_request(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::write_request(&mut tx, request).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_registration(
        &self,
        user: &UserAccount,
        request: &ApprovalRequest,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::write_user(&mut tx, user).await?;
        Self::write_request(&mut tx, request).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<ApprovalRequest>, StoreError> {
        let row = sqlx::query_as::<_, ApprovalRequest>(&format!(
            "SELECT {} FROM approval_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        let rows = sqlx::query_as::<_, ApprovalRequest>(&format!(
            "SELECT {} FROM approval_requests WHERE ($1::varchar IS NULL OR status = $1) ORDER BY created_at ASC",
            REQUEST_COLUMNS
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn apply_transition(
        &self,
        transition: &Transition,
    ) -> Result<Option<EffectOutcome>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE approval_requests SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(transition.to)
        .bind(transition.request_id)
        .bind(transition.from)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let outcome = Self::apply_effect(&mut tx, &transition.effect).await?;
        tx.commit().await?;
        Ok(Some(outcome))
    }

    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::write_user(&mut tx, user).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {} FROM users WHERE email = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_actor_emails(&self, tier: ActorTier) -> Result<Vec<String>, StoreError> {
        let emails = sqlx::query_scalar::<_, String>(
            "SELECT email FROM users WHERE role = $1 AND status = $2 ORDER BY email ASC",
        )
        .bind(Role::from(tier))
        .bind(UserStatus::Approved)
        .fetch_all(&self.pool)
        .await?;
        Ok(emails)
    }

    async fn insert_chemical(&self, chemical: &Chemical) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO chemicals (chemical_id, chemical_name, chemical_type, grade, phase, quantity_available, unit, make, date_of_mfg, date_of_exp, rack, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(&chemical.chemical_id)
        .bind(&chemical.chemical_name)
        .bind(&chemical.chemical_type)
        .bind(&chemical.grade)
        .bind(&chemical.phase)
        .bind(chemical.quantity_available)
        .bind(&chemical.unit)
        .bind(&chemical.make)
        .bind(chemical.date_of_mfg)
        .bind(chemical.date_of_exp)
        .bind(&chemical.rack)
        .bind(chemical.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, format!("chemical {}", chemical.chemical_id)))?;
        Ok(())
    }

    async fn get_chemical(&self, chemical_id: &str) -> Result<Option<Chemical>, StoreError> {
        let row = sqlx::query_as::<_, Chemical>(&format!(
            "SELECT {} FROM chemicals WHERE chemical_id = $1",
            CHEMICAL_COLUMNS
        ))
        .bind(chemical_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_chemicals(&self) -> Result<Vec<Chemical>, StoreError> {
        let rows = sqlx::query_as::<_, Chemical>(&format!(
            "SELECT {} FROM chemicals ORDER BY chemical_id ASC",
            CHEMICAL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn deduct_stock(
        &self,
        chemical_id: &str,
        quantity: f64,
        usage: &UsageRecord,
    ) -> Result<StockDeduction, StoreError> {
        let mut tx = self.pool.begin().await?;

        let remaining = sqlx::query_scalar::<_, f64>(
            r#"UPDATE chemicals SET quantity_available = quantity_available - $1
               WHERE chemical_id = $2 AND quantity_available >= $1
               RETURNING quantity_available"#,
        )
        .bind(quantity)
        .bind(chemical_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(remaining) = remaining else {
            tx.rollback().await?;
            let available = sqlx::query_scalar::<_, f64>(
                "SELECT quantity_available FROM chemicals WHERE chemical_id = $1",
            )
            .bind(chemical_id)
            .fetch_optional(&self.pool)
            .await?;
            return Ok(match available {
                Some(available) => StockDeduction::Insufficient { available },
                None => StockDeduction::NotFound,
            });
        };

        sqlx::query(
            r#"INSERT INTO usage_records (id, user_id, user_name, chemical_id, chemical_name, quantity_used, unit, used_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(usage.id)
        .bind(usage.user_id)
        .bind(&usage.user_name)
        .bind(&usage.chemical_id)
        .bind(&usage.chemical_name)
        .bind(usage.quantity_used)
        .bind(&usage.unit)
        .bind(usage.used_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(StockDeduction::Issued { remaining })
    }

    async fn list_usage(&self, user_id: Option<Uuid>) -> Result<Vec<UsageRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UsageRecord>(&format!(
            "SELECT {} FROM usage_records WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY used_at DESC",
            USAGE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn next_sequence(&self, name: &str) -> Result<i64, StoreError> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO counters (name, value) VALUES ($1, 1)
               ON CONFLICT (name) DO UPDATE SET value = counters.value + 1
               RETURNING value"#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }
}
