use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{PgPool, Row};
use std::sync::Mutex;
use thiserror::Error;

pub const CHECK_ORDERS_MISSING: &str = "orders_missing";
pub const CHECK_LOW_INVENTORY: &str = "low_inventory";

const DEFAULT_ORDERS_WINDOW_DAYS: i64 = 30;
const DEFAULT_INVENTORY_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionOutcome {
    pub condition_met: bool,
    pub details: Value,
}

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("unknown condition check `{0}`")]
    UnknownCheck(String),
    #[error("condition query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Evaluates a named domain check against catering state. Checks are
/// advisory: the engine records the outcome and moves on either way.
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        check: &str,
        params: &Value,
    ) -> Result<ConditionOutcome, ConditionError>;
}

pub struct PostgresConditionEvaluator {
    pub pool: PgPool,
}

impl PostgresConditionEvaluator {
    async fn orders_missing(&self, params: &Value) -> Result<ConditionOutcome, ConditionError> {
        let window_days = params
            .get("days")
            .and_then(|v| v.as_i64())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_ORDERS_WINDOW_DAYS);

        let count: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM customers c
            WHERE c.is_active = TRUE
              AND NOT EXISTS (
                  SELECT 1 FROM orders o
                  WHERE o.customer_id = c.id
                    AND o.ordered_at >= now() - make_interval(days => $1::int)
              )
            "#,
        )
        .bind(window_days as i32)
        .fetch_one(&self.pool)
        .await?
        .try_get("total")?;

        Ok(ConditionOutcome {
            condition_met: count > 0,
            details: json!({
                "customers_without_orders": count,
                "window_days": window_days,
            }),
        })
    }

    async fn low_inventory(&self, params: &Value) -> Result<ConditionOutcome, ConditionError> {
        let threshold = params
            .get("threshold")
            .and_then(|v| v.as_f64())
            .unwrap_or(DEFAULT_INVENTORY_THRESHOLD);

        let count: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM inventory_items
            WHERE quantity_on_hand < $1
            "#,
        )
        .bind(threshold)
        .fetch_one(&self.pool)
        .await?
        .try_get("total")?;

        Ok(ConditionOutcome {
            condition_met: count > 0,
            details: json!({
                "low_items": count,
                "threshold": threshold,
            }),
        })
    }
}

#[async_trait]
impl ConditionEvaluator for PostgresConditionEvaluator {
    async fn evaluate(
        &self,
        check: &str,
        params: &Value,
    ) -> Result<ConditionOutcome, ConditionError> {
        match check {
            CHECK_ORDERS_MISSING => self.orders_missing(params).await,
            CHECK_LOW_INVENTORY => self.low_inventory(params).await,
            other => Err(ConditionError::UnknownCheck(other.to_string())),
        }
    }
}

/// Scripted evaluator for tests.
#[derive(Default)]
pub struct MockConditionEvaluator {
    pub outcome: Mutex<Option<ConditionOutcome>>,
    pub fail_evaluate: bool,
}

impl MockConditionEvaluator {
    pub fn returning(condition_met: bool, details: Value) -> Self {
        Self {
            outcome: Mutex::new(Some(ConditionOutcome {
                condition_met,
                details,
            })),
            fail_evaluate: false,
        }
    }
}

#[async_trait]
impl ConditionEvaluator for MockConditionEvaluator {
    async fn evaluate(
        &self,
        check: &str,
        _params: &Value,
    ) -> Result<ConditionOutcome, ConditionError> {
        if self.fail_evaluate {
            return Err(ConditionError::UnknownCheck(check.to_string()));
        }
        Ok(self
            .outcome
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(ConditionOutcome {
                condition_met: false,
                details: json!({}),
            }))
    }
}
