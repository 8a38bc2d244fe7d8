use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

pub const RECIPIENT_SPEC_ALL_ACTIVE: &str = "all_active_customers";
pub const RECIPIENT_SPEC_GROUP_PREFIX: &str = "customer_group:";
pub const RECIPIENT_SPEC_TEST: &str = "test";

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: String,
    pub identifier: Option<Uuid>,
}

#[derive(Debug, Error)]
pub enum RecipientError {
    #[error("unsupported recipient spec `{0}`")]
    UnsupportedSpec(String),
    #[error("invalid customer group id `{0}`")]
    InvalidGroupId(String),
    #[error("recipient lookup failed: {0}")]
    Lookup(#[from] sqlx::Error),
}

/// Turns a declarative recipient spec from a step's action config into
/// concrete addresses.
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    async fn resolve(&self, spec: &str) -> Result<Vec<Recipient>, RecipientError>;
}

pub struct PostgresRecipientResolver {
    pub pool: PgPool,
}

#[async_trait]
impl RecipientResolver for PostgresRecipientResolver {
    async fn resolve(&self, spec: &str) -> Result<Vec<Recipient>, RecipientError> {
        let spec = spec.trim();
        if spec == RECIPIENT_SPEC_ALL_ACTIVE {
            let recipients = sqlx::query_as::<_, Recipient>(
                r#"
                SELECT email, name, id AS identifier
                FROM customers
                WHERE is_active = TRUE AND email <> ''
                ORDER BY name ASC
                "#,
            )
            .fetch_all(&self.pool)
            .await?;
            return Ok(recipients);
        }

        if let Some(raw_id) = spec.strip_prefix(RECIPIENT_SPEC_GROUP_PREFIX) {
            let group_id = Uuid::parse_str(raw_id.trim())
                .map_err(|_| RecipientError::InvalidGroupId(raw_id.trim().to_string()))?;
            let recipients = sqlx::query_as::<_, Recipient>(
                r#"
                SELECT c.email, c.name, c.id AS identifier
                FROM customers c
                JOIN customer_group_members m ON m.customer_id = c.id
                WHERE m.group_id = $1 AND c.is_active = TRUE AND c.email <> ''
                ORDER BY c.name ASC
                "#,
            )
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;
            return Ok(recipients);
        }

        if spec == RECIPIENT_SPEC_TEST {
            let email = std::env::var("TEST_RECIPIENT_EMAIL")
                .unwrap_or_else(|_| "test@example.com".to_string());
            return Ok(vec![Recipient {
                email,
                name: "Test recipient".to_string(),
                identifier: None,
            }]);
        }

        Err(RecipientError::UnsupportedSpec(spec.to_string()))
    }
}

/// Scripted resolver for tests.
#[derive(Default)]
pub struct MockRecipientResolver {
    pub recipients: Mutex<Vec<Recipient>>,
    pub fail_resolve: bool,
}

impl MockRecipientResolver {
    pub fn with_recipients(recipients: Vec<Recipient>) -> Self {
        Self {
            recipients: Mutex::new(recipients),
            fail_resolve: false,
        }
    }
}

#[async_trait]
impl RecipientResolver for MockRecipientResolver {
    async fn resolve(&self, spec: &str) -> Result<Vec<Recipient>, RecipientError> {
        if self.fail_resolve {
            return Err(RecipientError::UnsupportedSpec(spec.to_string()));
        }
        Ok(self.recipients.lock().unwrap().clone())
    }
}
