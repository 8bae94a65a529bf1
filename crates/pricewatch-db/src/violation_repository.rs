use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use pricewatch_core::classify::{
    NewCheckReport, NewViolation, Violation, ViolationCheckReport, ViolationStats, ViolationStatus,
};
use pricewatch_core::error::AppError;

/// Repository for check reports and violations.
///
/// Reports are upserts keyed on the (regulated, scraped) pair via partial
/// unique indexes; no-match reports are keyed on the scraped listing
/// alone. The pending-violation uniqueness lives in the database too, so
/// concurrent checkers cannot double-file a violation.
#[derive(Clone)]
pub struct ViolationRepository {
    pool: Pool<Postgres>,
}

impl ViolationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_report(&self, report: &NewCheckReport) -> Result<Uuid, AppError> {
        // The conflict target must match the partial unique index, which
        // differs between matched and no-match reports.
        let query = if report.regulated_product_id.is_some() {
            r#"
            INSERT INTO violation_check_reports (
                regulated_product_id, scraped_product_id, has_violation,
                compliance_status, price_difference, percentage_difference,
                violation_severity, proposed_penalty, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (regulated_product_id, scraped_product_id)
                WHERE regulated_product_id IS NOT NULL
            DO UPDATE SET
                has_violation = EXCLUDED.has_violation,
                compliance_status = EXCLUDED.compliance_status,
                price_difference = EXCLUDED.price_difference,
                percentage_difference = EXCLUDED.percentage_difference,
                violation_severity = EXCLUDED.violation_severity,
                proposed_penalty = EXCLUDED.proposed_penalty,
                notes = EXCLUDED.notes,
                checked_at = NOW()
            RETURNING id
            "#
        } else {
            r#"
            INSERT INTO violation_check_reports (
                regulated_product_id, scraped_product_id, has_violation,
                compliance_status, price_difference, percentage_difference,
                violation_severity, proposed_penalty, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (scraped_product_id)
                WHERE regulated_product_id IS NULL
            DO UPDATE SET
                has_violation = EXCLUDED.has_violation,
                compliance_status = EXCLUDED.compliance_status,
                notes = EXCLUDED.notes,
                checked_at = NOW()
            RETURNING id
            "#
        };

        let row: (Uuid,) = sqlx::query_as(query)
            .bind(report.regulated_product_id)
            .bind(report.scraped_product_id)
            .bind(report.has_violation)
            .bind(report.compliance_status.as_str())
            .bind(report.price_difference)
            .bind(report.percentage_difference)
            .bind(report.violation_severity.map(|s| s.as_str()))
            .bind(report.proposed_penalty)
            .bind(&report.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.0)
    }

    pub async fn link_report(&self, report_id: Uuid, violation_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE violation_check_reports SET violation_id = $2 WHERE id = $1")
            .bind(report_id)
            .bind(violation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn find_pending_violation(
        &self,
        regulated_product_id: Uuid,
        scraped_product_id: Uuid,
    ) -> Result<Option<Violation>, AppError> {
        let row = sqlx::query_as::<_, ViolationRow>(
            r#"
            SELECT * FROM violations
            WHERE regulated_product_id = $1
              AND scraped_product_id = $2
              AND status = 'pending'
            "#,
        )
        .bind(regulated_product_id)
        .bind(scraped_product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    pub async fn create_violation(&self, violation: &NewViolation) -> Result<Violation, AppError> {
        let row = sqlx::query_as::<_, ViolationRow>(
            r#"
            INSERT INTO violations (
                regulated_product_id, scraped_product_id, violation_type,
                severity, proposed_penalty, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(violation.regulated_product_id)
        .bind(violation.scraped_product_id)
        .bind(&violation.violation_type)
        .bind(violation.severity.as_str())
        .bind(violation.proposed_penalty)
        .bind(&violation.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.into())
    }

    pub async fn get_violation(&self, id: Uuid) -> Result<Option<Violation>, AppError> {
        let row = sqlx::query_as::<_, ViolationRow>("SELECT * FROM violations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Confirm a pending violation and stamp `confirmed_at`. Fails for
    /// violations that are not pending.
    pub async fn confirm(&self, id: Uuid) -> Result<Violation, AppError> {
        self.transition(id, ViolationStatus::Confirmed).await
    }

    /// Dismiss a pending violation. Fails for violations that are not
    /// pending.
    pub async fn dismiss(&self, id: Uuid) -> Result<Violation, AppError> {
        self.transition(id, ViolationStatus::Dismissed).await
    }

    async fn transition(&self, id: Uuid, to: ViolationStatus) -> Result<Violation, AppError> {
        let confirmed_at = match to {
            ViolationStatus::Confirmed => Some(Utc::now()),
            _ => None,
        };
        let row = sqlx::query_as::<_, ViolationRow>(
            r#"
            UPDATE violations
            SET status = $2, confirmed_at = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(confirmed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(Into::into).ok_or_else(|| {
            AppError::Generic(format!("Violation {id} not found or not pending"))
        })
    }

    pub async fn list_violations(
        &self,
        status: Option<ViolationStatus>,
        limit: i64,
    ) -> Result<Vec<Violation>, AppError> {
        let rows = sqlx::query_as::<_, ViolationRow>(
            r#"
            SELECT * FROM violations
            WHERE $1::VARCHAR IS NULL OR status = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn list_reports(&self, limit: i64) -> Result<Vec<ViolationCheckReport>, AppError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT * FROM violation_check_reports
            ORDER BY checked_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Rollup of violation counts and pending penalties.
    pub async fn stats(&self) -> Result<ViolationStats, AppError> {
        let row: (i64, i64, i64, i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'pending'),
                COUNT(*) FILTER (WHERE status = 'confirmed'),
                COUNT(*) FILTER (WHERE status = 'dismissed'),
                SUM(proposed_penalty) FILTER (WHERE status <> 'dismissed')
            FROM violations
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(ViolationStats {
            total: row.0,
            pending: row.1,
            confirmed: row.2,
            dismissed: row.3,
            total_proposed_penalty: row.4.unwrap_or(0.0),
        })
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ViolationRow {
    id: Uuid,
    regulated_product_id: Uuid,
    scraped_product_id: Uuid,
    violation_type: String,
    severity: String,
    proposed_penalty: f64,
    status: String,
    notes: String,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl From<ViolationRow> for Violation {
    fn from(row: ViolationRow) -> Self {
        Violation {
            id: row.id,
            regulated_product_id: row.regulated_product_id,
            scraped_product_id: row.scraped_product_id,
            violation_type: row.violation_type,
            severity: row.severity.parse().unwrap_or(
                pricewatch_core::classify::Severity::Low,
            ),
            proposed_penalty: row.proposed_penalty,
            status: row.status.parse().unwrap_or(ViolationStatus::Pending),
            notes: row.notes,
            created_at: row.created_at,
            confirmed_at: row.confirmed_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    regulated_product_id: Option<Uuid>,
    scraped_product_id: Uuid,
    has_violation: bool,
    compliance_status: String,
    price_difference: Option<f64>,
    percentage_difference: Option<f64>,
    violation_severity: Option<String>,
    proposed_penalty: Option<f64>,
    notes: String,
    violation_id: Option<Uuid>,
    checked_at: DateTime<Utc>,
}

impl From<ReportRow> for ViolationCheckReport {
    fn from(row: ReportRow) -> Self {
        ViolationCheckReport {
            id: row.id,
            regulated_product_id: row.regulated_product_id,
            scraped_product_id: row.scraped_product_id,
            has_violation: row.has_violation,
            compliance_status: row
                .compliance_status
                .parse()
                .unwrap_or(pricewatch_core::classify::ComplianceStatus::Ok),
            price_difference: row.price_difference,
            percentage_difference: row.percentage_difference,
            violation_severity: row.violation_severity.and_then(|s| s.parse().ok()),
            proposed_penalty: row.proposed_penalty,
            notes: row.notes,
            violation_id: row.violation_id,
            checked_at: row.checked_at,
        }
    }
}

// -- Trait implementation --

impl pricewatch_core::traits::ViolationStore for ViolationRepository {
    async fn upsert_report(&self, report: &NewCheckReport) -> Result<Uuid, AppError> {
        ViolationRepository::upsert_report(self, report).await
    }

    async fn link_report(&self, report_id: Uuid, violation_id: Uuid) -> Result<(), AppError> {
        ViolationRepository::link_report(self, report_id, violation_id).await
    }

    async fn find_pending_violation(
        &self,
        regulated_product_id: Uuid,
        scraped_product_id: Uuid,
    ) -> Result<Option<Violation>, AppError> {
        ViolationRepository::find_pending_violation(self, regulated_product_id, scraped_product_id)
            .await
    }

    async fn create_violation(&self, violation: &NewViolation) -> Result<Violation, AppError> {
        ViolationRepository::create_violation(self, violation).await
    }
}
