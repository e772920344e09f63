//! Azure Authentication
//!
//! Handles authentication with a pre-issued bearer token, a service
//! principal secret, or the Azure CLI login, and discovery of the default
//! subscription from the environment or the Azure CLI profile.

use super::error::ApiError;
use azure_core::credentials::{Secret, TokenCredential};
use azure_identity::{AzureCliCredential, ClientSecretCredential};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Environment variable holding a pre-issued ARM bearer token
pub const ACCESS_TOKEN_ENV: &str = "ARM_ACCESS_TOKEN";

/// Environment variable holding the service principal secret
pub const CLIENT_SECRET_ENV: &str = "ARM_CLIENT_SECRET";

/// Azure credentials holder with token caching
#[derive(Clone)]
pub struct AzureCredentials {
    source: Arc<TokenSource>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

enum TokenSource {
    Static(String),
    /// Tried in order; the first credential that yields a token wins
    Chain {
        credentials: Vec<(&'static str, Arc<dyn TokenCredential>)>,
        scope: String,
    },
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Time left before `expires_on`, both in Unix seconds
fn token_ttl(expires_on: i64, now: i64) -> Duration {
    let remaining = u64::try_from(expires_on.saturating_sub(now)).unwrap_or(0);
    Duration::from_secs(remaining).saturating_sub(TOKEN_EXPIRY_BUFFER)
}

/// OAuth2 scope covering every ARM API on `resource`
fn scope_for(resource: &str) -> String {
    format!("{}/.default", resource.trim_end_matches('/'))
}

fn auth_error(err: azure_core::Error) -> ApiError {
    ApiError::Auth(err.to_string())
}

impl AzureCredentials {
    /// Use a fixed bearer token (no refresh)
    pub fn static_token(token: impl Into<String>) -> Self {
        Self::from_source(TokenSource::Static(token.into()))
    }

    /// Build credentials from the environment
    ///
    /// `ARM_ACCESS_TOKEN` wins. Otherwise a service principal is tried
    /// first when `ARM_CLIENT_SECRET` is set along with a tenant and client
    /// id, then the Azure CLI login (`az login`).
    pub fn from_environment(
        tenant_id: Option<&str>,
        client_id: Option<&str>,
        resource: &str,
    ) -> Result<Self, ApiError> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                tracing::debug!("Using bearer token from {}", ACCESS_TOKEN_ENV);
                return Ok(Self::static_token(token.trim()));
            }
        }

        let secret = std::env::var(CLIENT_SECRET_ENV)
            .ok()
            .filter(|secret| !secret.is_empty());
        Self::chain(tenant_id, client_id, secret, resource)
    }

    fn chain(
        tenant_id: Option<&str>,
        client_id: Option<&str>,
        client_secret: Option<String>,
        resource: &str,
    ) -> Result<Self, ApiError> {
        let mut credentials: Vec<(&'static str, Arc<dyn TokenCredential>)> = Vec::new();

        match (tenant_id, client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(secret)) => {
                let credential: Arc<dyn TokenCredential> = ClientSecretCredential::new(
                    tenant_id,
                    client_id.to_string(),
                    Secret::new(secret),
                    None,
                )
                .map_err(auth_error)?;
                credentials.push(("client secret", credential));
            },
            (_, _, Some(_)) => {
                tracing::warn!(
                    "{} is set but tenant_id and client_id are not configured, ignoring it",
                    CLIENT_SECRET_ENV
                );
            },
            _ => {},
        }

        let cli: Arc<dyn TokenCredential> = AzureCliCredential::new(None).map_err(auth_error)?;
        credentials.push(("Azure CLI", cli));

        let chain = Self::from_source(TokenSource::Chain {
            credentials,
            scope: scope_for(resource),
        });
        tracing::debug!("Credential chain: {}", chain.source_names().join(" -> "));
        Ok(chain)
    }

    fn from_source(source: TokenSource) -> Self {
        Self {
            source: Arc::new(source),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String, ApiError> {
        let (credentials, scope) = match self.source.as_ref() {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Chain { credentials, scope } => (credentials, scope),
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let mut failures = Vec::new();
        for (name, credential) in credentials {
            let access = match credential.get_token(&[scope.as_str()]).await {
                Ok(access) => access,
                Err(err) => {
                    tracing::debug!("{} credential failed: {}", name, err);
                    failures.push(format!("{}: {}", name, err));
                    continue;
                },
            };

            let token = access.token.secret().to_string();
            let ttl = token_ttl(
                access.expires_on.unix_timestamp(),
                chrono::Utc::now().timestamp(),
            );

            {
                let mut cache = self.token_cache.write().await;
                *cache = Some(CachedToken {
                    token: token.clone(),
                    expires_at: Instant::now() + ttl,
                });
            }

            tracing::debug!(
                "New token from {} cached, expires in ~{} minutes",
                name,
                ttl.as_secs() / 60
            );
            return Ok(token);
        }

        Err(ApiError::Auth(format!(
            "no credential produced a token ({}). Run 'az login' or set {}",
            failures.join("; "),
            ACCESS_TOKEN_ENV
        )))
    }

    /// Force refresh the token
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.get_token().await
    }

    /// Names of the credentials tried, in order
    fn source_names(&self) -> Vec<&'static str> {
        match self.source.as_ref() {
            TokenSource::Static(_) => vec!["static"],
            TokenSource::Chain { credentials, .. } => {
                credentials.iter().map(|(name, _)| *name).collect()
            },
        }
    }
}

/// Get the Azure CLI configuration directory
pub fn get_azure_config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("AZURE_CONFIG_DIR") {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|p| p.join(".azure"))
}

/// Validate an Azure subscription id (a GUID)
pub fn validate_subscription_id(subscription: &str) -> bool {
    uuid::Uuid::parse_str(subscription).is_ok()
}

#[derive(Deserialize)]
struct AzureProfile {
    #[serde(default)]
    subscriptions: Vec<ProfileSubscription>,
}

#[derive(Deserialize)]
struct ProfileSubscription {
    id: String,
    #[serde(rename = "isDefault", default)]
    is_default: bool,
}

/// Read the default subscription from the environment or the Azure CLI profile
/// Security: Validates subscription id format before returning
pub fn get_default_subscription() -> Option<String> {
    for var in ["ARM_SUBSCRIPTION_ID", "AZURE_SUBSCRIPTION_ID"] {
        if let Ok(subscription) = std::env::var(var) {
            if validate_subscription_id(&subscription) {
                return Some(subscription);
            }
            tracing::warn!("Invalid subscription id format in {}", var);
        }
    }

    let profile_path = get_azure_config_dir()?.join("azureProfile.json");
    let content = std::fs::read_to_string(&profile_path).ok()?;
    default_subscription_from_profile(&content)
}

/// The Azure CLI writes azureProfile.json with a UTF-8 BOM
fn default_subscription_from_profile(content: &str) -> Option<String> {
    let profile: AzureProfile = serde_json::from_str(content.trim_start_matches('\u{feff}')).ok()?;

    profile
        .subscriptions
        .into_iter()
        .find(|s| s.is_default)
        .map(|s| s.id)
        .filter(|id| validate_subscription_id(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: &str = "33333333-3333-3333-3333-333333333333";
    const CLIENT: &str = "44444444-4444-4444-4444-444444444444";
    const RESOURCE: &str = "https://management.azure.com/";

    #[test]
    fn test_validate_subscription_id() {
        assert!(validate_subscription_id("00000000-0000-0000-0000-000000000000"));
        assert!(!validate_subscription_id("my-subscription"));
        assert!(!validate_subscription_id(""));
    }

    #[test]
    fn test_default_subscription_from_profile_with_bom() {
        let content = "\u{feff}{\"subscriptions\":[\
            {\"id\":\"11111111-1111-1111-1111-111111111111\",\"isDefault\":false},\
            {\"id\":\"22222222-2222-2222-2222-222222222222\",\"isDefault\":true}]}";
        assert_eq!(
            default_subscription_from_profile(content).as_deref(),
            Some("22222222-2222-2222-2222-222222222222")
        );
    }

    #[test]
    fn test_default_subscription_ignores_invalid_ids() {
        let content = r#"{"subscriptions":[{"id":"nope","isDefault":true}]}"#;
        assert_eq!(default_subscription_from_profile(content), None);
    }

    #[test]
    fn test_token_ttl_applies_buffer() {
        assert_eq!(token_ttl(1_000 + 3_600, 1_000), Duration::from_secs(3_540));
        assert_eq!(token_ttl(1_030, 1_000), Duration::ZERO);
        assert_eq!(token_ttl(900, 1_000), Duration::ZERO);
    }

    #[test]
    fn test_scope_for_resource() {
        assert_eq!(scope_for(RESOURCE), "https://management.azure.com/.default");
        assert_eq!(scope_for("http://localhost:8080"), "http://localhost:8080/.default");
    }

    #[test]
    fn test_cli_login_alone_is_enough() {
        let credentials = AzureCredentials::chain(None, None, None, RESOURCE).unwrap();
        assert_eq!(credentials.source_names(), vec!["Azure CLI"]);
    }

    #[test]
    fn test_service_principal_is_tried_before_cli() {
        let credentials = AzureCredentials::chain(
            Some(TENANT),
            Some(CLIENT),
            Some("s3cret".to_string()),
            RESOURCE,
        )
        .unwrap();
        assert_eq!(credentials.source_names(), vec!["client secret", "Azure CLI"]);
    }

    #[test]
    fn test_secret_without_ids_falls_back_to_cli() {
        let credentials =
            AzureCredentials::chain(None, Some(CLIENT), Some("s3cret".to_string()), RESOURCE)
                .unwrap();
        assert_eq!(credentials.source_names(), vec!["Azure CLI"]);
    }

    #[tokio::test]
    async fn test_static_token_is_returned_verbatim() {
        let credentials = AzureCredentials::static_token("abc");
        assert_eq!(credentials.get_token().await.unwrap(), "abc");
        assert_eq!(credentials.refresh_token().await.unwrap(), "abc");
        assert_eq!(credentials.source_names(), vec!["static"]);
    }
}
