//! Price-deviation classification and idempotent compliance recording.
//!
//! A listing violates when its price exceeds 110% of the regulated price.
//! Severity and penalty are deterministic functions of the percentage over
//! the regulated price. Recording is an upsert per
//! (regulated product, scraped product) pair: re-checking updates the
//! existing report and never duplicates a pending violation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::AggregateCache;
use crate::error::AppError;
use crate::models::{RegulatedProduct, ScrapedProduct};
use crate::traits::ViolationStore;

/// Severity tier of a price violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Bucket a percentage-over-regulated-price into a tier.
    pub fn from_percentage(percentage_over: f64) -> Self {
        if percentage_over <= 20.0 {
            Severity::Low
        } else if percentage_over <= 50.0 {
            Severity::Medium
        } else if percentage_over <= 100.0 {
            Severity::High
        } else {
            Severity::Critical
        }
    }

    /// Proposed penalty for this tier.
    pub fn penalty(&self) -> f64 {
        match self {
            Severity::Low => 100.0,
            Severity::Medium => 500.0,
            Severity::High => 1000.0,
            Severity::Critical => 2000.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Outcome of comparing one scraped listing against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Ok,
    Violation,
    NoMatch,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Ok => "ok",
            ComplianceStatus::Violation => "violation",
            ComplianceStatus::NoMatch => "no_match",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ComplianceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ok" => Ok(ComplianceStatus::Ok),
            "violation" => Ok(ComplianceStatus::Violation),
            "no_match" => Ok(ComplianceStatus::NoMatch),
            _ => Err(format!("Unknown compliance status: {}", s)),
        }
    }
}

/// Review status of a violation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationStatus {
    Pending,
    Confirmed,
    Dismissed,
}

impl ViolationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationStatus::Pending => "pending",
            ViolationStatus::Confirmed => "confirmed",
            ViolationStatus::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for ViolationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ViolationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ViolationStatus::Pending),
            "confirmed" => Ok(ViolationStatus::Confirmed),
            "dismissed" => Ok(ViolationStatus::Dismissed),
            _ => Err(format!("Unknown violation status: {}", s)),
        }
    }
}

/// A confirmable/dismissible finding derived from a check report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: Uuid,
    pub regulated_product_id: Uuid,
    pub scraped_product_id: Uuid,
    pub violation_type: String,
    pub severity: Severity,
    pub proposed_penalty: f64,
    pub status: ViolationStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// DTO for inserting a new violation.
#[derive(Debug, Clone, Serialize)]
pub struct NewViolation {
    pub regulated_product_id: Uuid,
    pub scraped_product_id: Uuid,
    pub violation_type: String,
    pub severity: Severity,
    pub proposed_penalty: f64,
    pub notes: String,
}

pub const VIOLATION_TYPE_PRICE_EXCEEDED: &str = "price_exceeded";

/// The persisted outcome of one (regulated, scraped) comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationCheckReport {
    pub id: Uuid,
    pub regulated_product_id: Option<Uuid>,
    pub scraped_product_id: Uuid,
    pub has_violation: bool,
    pub compliance_status: ComplianceStatus,
    pub price_difference: Option<f64>,
    pub percentage_difference: Option<f64>,
    pub violation_severity: Option<Severity>,
    pub proposed_penalty: Option<f64>,
    pub notes: String,
    pub violation_id: Option<Uuid>,
    pub checked_at: DateTime<Utc>,
}

/// DTO for upserting a check report.
#[derive(Debug, Clone, Serialize)]
pub struct NewCheckReport {
    pub regulated_product_id: Option<Uuid>,
    pub scraped_product_id: Uuid,
    pub has_violation: bool,
    pub compliance_status: ComplianceStatus,
    pub price_difference: Option<f64>,
    pub percentage_difference: Option<f64>,
    pub violation_severity: Option<Severity>,
    pub proposed_penalty: Option<f64>,
    pub notes: String,
}

impl NewCheckReport {
    /// Report for a listing with no matching catalog entry.
    pub fn no_match(scraped: &ScrapedProduct) -> Self {
        Self {
            regulated_product_id: None,
            scraped_product_id: scraped.id,
            has_violation: false,
            compliance_status: ComplianceStatus::NoMatch,
            price_difference: None,
            percentage_difference: None,
            violation_severity: None,
            proposed_penalty: None,
            notes: format!(
                "No matching regulated product found for '{}'",
                scraped.product_name
            ),
        }
    }
}

/// Rollup of violation counts by review status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationStats {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub dismissed: i64,
    pub total_proposed_penalty: f64,
}

/// Pure classification of one price pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub has_violation: bool,
    pub price_difference: f64,
    pub percentage_difference: f64,
    pub severity: Option<Severity>,
    pub proposed_penalty: Option<f64>,
}

/// Classify a listed price against a regulated product.
///
/// A violation requires the listed price to exceed the 110% threshold;
/// within the tolerance band the pair is compliant regardless of the
/// (possibly positive) difference.
pub fn classify(regulated: &RegulatedProduct, listed_price: f64) -> Assessment {
    let price_difference = listed_price - regulated.gov_price;
    let percentage_difference = if regulated.gov_price > 0.0 {
        price_difference / regulated.gov_price * 100.0
    } else {
        0.0
    };

    if listed_price > regulated.violation_threshold() {
        let severity = Severity::from_percentage(percentage_difference);
        Assessment {
            has_violation: true,
            price_difference,
            percentage_difference,
            severity: Some(severity),
            proposed_penalty: Some(severity.penalty()),
        }
    } else {
        Assessment {
            has_violation: false,
            price_difference,
            percentage_difference,
            severity: None,
            proposed_penalty: None,
        }
    }
}

/// Build the check-report DTO for a matched pair.
pub fn build_report(
    regulated: &RegulatedProduct,
    scraped: &ScrapedProduct,
    assessment: &Assessment,
) -> NewCheckReport {
    let mut notes = format!(
        "Scraped: Rs.{:.2} | Regulated: Rs.{:.2} | Difference: Rs.{:.2} ({:.1}%)",
        scraped.listed_price,
        regulated.gov_price,
        assessment.price_difference,
        assessment.percentage_difference,
    );
    if let (Some(severity), Some(penalty)) = (assessment.severity, assessment.proposed_penalty) {
        notes.push_str(&format!(" | Severity: {severity} | Penalty: Rs.{penalty:.0}"));
    }

    NewCheckReport {
        regulated_product_id: Some(regulated.id),
        scraped_product_id: scraped.id,
        has_violation: assessment.has_violation,
        compliance_status: if assessment.has_violation {
            ComplianceStatus::Violation
        } else {
            ComplianceStatus::Ok
        },
        price_difference: Some(assessment.price_difference),
        percentage_difference: Some(assessment.percentage_difference),
        violation_severity: assessment.severity,
        proposed_penalty: assessment.proposed_penalty,
        notes,
    }
}

/// Result of recording one comparison.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub report_id: Uuid,
    pub compliance_status: ComplianceStatus,
    pub violation_id: Option<Uuid>,
    pub violation_created: bool,
    pub severity: Option<Severity>,
}

/// Records comparison outcomes with upsert semantics.
///
/// Generic over the store so the orchestrator and the check-all sweep can
/// run against mocks in tests.
#[derive(Clone)]
pub struct ComplianceChecker<V: ViolationStore> {
    store: V,
    cache: AggregateCache,
}

impl<V: ViolationStore> ComplianceChecker<V> {
    pub fn new(store: V, cache: AggregateCache) -> Self {
        Self { store, cache }
    }

    /// Classify and persist the outcome for one matched pair.
    ///
    /// The report write is an upsert keyed on the pair. A violation is
    /// created only the first time the pair violates while no pending
    /// violation exists; later re-checks link to the existing one.
    pub async fn check_pair(
        &self,
        regulated: &RegulatedProduct,
        scraped: &ScrapedProduct,
    ) -> Result<CheckOutcome, AppError> {
        let assessment = classify(regulated, scraped.listed_price);
        let report = build_report(regulated, scraped, &assessment);
        let report_id = self.store.upsert_report(&report).await?;

        if !assessment.has_violation {
            return Ok(CheckOutcome {
                report_id,
                compliance_status: ComplianceStatus::Ok,
                violation_id: None,
                violation_created: false,
                severity: None,
            });
        }

        let (violation_id, created) = match self
            .store
            .find_pending_violation(regulated.id, scraped.id)
            .await?
        {
            Some(existing) => (existing.id, false),
            None => {
                let severity = assessment.severity.unwrap_or(Severity::Low);
                let violation = self
                    .store
                    .create_violation(&NewViolation {
                        regulated_product_id: regulated.id,
                        scraped_product_id: scraped.id,
                        violation_type: VIOLATION_TYPE_PRICE_EXCEEDED.to_string(),
                        severity,
                        proposed_penalty: severity.penalty(),
                        notes: report.notes.clone(),
                    })
                    .await?;
                tracing::info!(
                    product = %regulated.name,
                    severity = %severity,
                    "Created violation"
                );
                self.cache.invalidate().await;
                (violation.id, true)
            }
        };

        self.store.link_report(report_id, violation_id).await?;

        Ok(CheckOutcome {
            report_id,
            compliance_status: ComplianceStatus::Violation,
            violation_id: Some(violation_id),
            violation_created: created,
            severity: assessment.severity,
        })
    }

    /// Record that no catalog entry matched this listing.
    pub async fn record_no_match(&self, scraped: &ScrapedProduct) -> Result<Uuid, AppError> {
        self.store.upsert_report(&NewCheckReport::no_match(scraped)).await
    }
}
