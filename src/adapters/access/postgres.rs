//! PostgreSQL credential gate.
//!
//! Reads the `google_credentials` row written by the consent flow. Token
//! refresh happens outside this service; the gate only classifies what it
//! finds.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::Secret;
use sqlx::{PgPool, Row};

use crate::domain::foundation::Identity;
use crate::ports::{AccessDecision, AccessError, AccessGate, AccessTokenSource, ConsentReason};

/// An access token is treated as expired this long before it actually is.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// The credential columns the gate looks at.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub access_token: Secret<String>,
    pub has_refresh_token: bool,
    pub expires_at: DateTime<Utc>,
}

impl StoredCredential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// Classifies a stored credential.
pub fn decide(credential: Option<&StoredCredential>, now: DateTime<Utc>) -> AccessDecision {
    match credential {
        None => AccessDecision::SendConsentLink {
            reason: ConsentReason::NoCredentials,
        },
        Some(c) if c.is_valid_at(now) => AccessDecision::Granted,
        Some(c) if !c.has_refresh_token => AccessDecision::SendConsentLink {
            reason: ConsentReason::ReconsentRequired,
        },
        Some(_) => AccessDecision::RetryLater,
    }
}

/// Credential gate and token source over PostgreSQL.
#[derive(Clone)]
pub struct PostgresCredentialGate {
    pool: PgPool,
}

impl PostgresCredentialGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find(&self, identity: &Identity) -> Result<Option<StoredCredential>, AccessError> {
        let row = sqlx::query(
            r#"
            SELECT access_token, refresh_token, expires_at
            FROM google_credentials
            WHERE whatsapp_phone = $1
            "#,
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccessError::Database(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let access_token: String = row
            .try_get("access_token")
            .map_err(|e| AccessError::Database(e.to_string()))?;
        let refresh_token: Option<String> = row
            .try_get("refresh_token")
            .map_err(|e| AccessError::Database(e.to_string()))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| AccessError::Database(e.to_string()))?;

        Ok(Some(StoredCredential {
            access_token: Secret::new(access_token),
            has_refresh_token: refresh_token.is_some_and(|t| !t.is_empty()),
            expires_at,
        }))
    }
}

#[async_trait]
impl AccessGate for PostgresCredentialGate {
    async fn check(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<AccessDecision, AccessError> {
        let credential = self.find(identity).await?;
        let decision = decide(credential.as_ref(), now);
        tracing::debug!(identity = %identity, decision = ?decision, "Calendar access checked");
        Ok(decision)
    }
}

#[async_trait]
impl AccessTokenSource for PostgresCredentialGate {
    async fn access_token(&self, identity: &Identity) -> Result<Secret<String>, AccessError> {
        let credential = self
            .find(identity)
            .await?
            .ok_or_else(|| AccessError::NoCredentials(identity.clone()))?;
        if !credential.is_valid_at(Utc::now()) {
            return Err(AccessError::Expired(identity.clone()));
        }
        Ok(credential.access_token)
    }
}
