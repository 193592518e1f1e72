//! GCP Authentication
//!
//! Resolves a credential [`Selection`] into a token source:
//!
//! - `default` - Application Default Credentials (env var, gcloud, metadata)
//! - `env` - only the key file named by `GOOGLE_APPLICATION_CREDENTIALS`
//! - any other name - the service account key configured for that identity
//!
//! Token sources are built once per selection and shared by every fetch task.

use crate::config::IdentityConfig;
use crate::context::Selection;
use crate::error::{ResourceError, ResourceResult};
use crate::resource::AccountResolver;
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell, RwLock};

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Something that can authorize API calls for one identity
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> ResourceResult<String>;

    /// Drop any cached token and fetch a new one
    async fn refresh(&self) -> ResourceResult<String> {
        self.access_token().await
    }

    /// Project the identity belongs to
    async fn project_id(&self) -> ResourceResult<String>;
}

/// Hands out token sources per selection
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(&self, selection: &Selection) -> ResourceResult<Arc<dyn AccessTokenSource>>;
}

#[async_trait]
impl<T: CredentialSource + ?Sized> AccountResolver for T {
    async fn resolve_account(&self, selection: &Selection) -> ResourceResult<String> {
        self.credentials(selection).await?.project_id().await
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// GCP credentials holder with token caching
pub struct GcpCredentials {
    provider: Arc<dyn TokenProvider>,
    project_override: Option<String>,
    token_cache: RwLock<Option<CachedToken>>,
}

impl GcpCredentials {
    pub fn new(provider: Arc<dyn TokenProvider>, project_override: Option<String>) -> Self {
        Self {
            provider,
            project_override,
            token_cache: RwLock::new(None),
        }
    }
}

#[async_trait]
impl AccessTokenSource for GcpCredentials {
    /// Security: Checks token expiry before returning cached token
    async fn access_token(&self) -> ResourceResult<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = self
            .provider
            .token(DEFAULT_SCOPES)
            .await
            .map_err(|e| ResourceError::Credential(format!("Failed to get access token: {}", e)))?;

        let token_str = token.as_str().to_string();
        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;

        *self.token_cache.write().await = Some(CachedToken {
            token: token_str.clone(),
            expires_at,
        });

        Ok(token_str)
    }

    async fn refresh(&self) -> ResourceResult<String> {
        *self.token_cache.write().await = None;
        self.access_token().await
    }

    async fn project_id(&self) -> ResourceResult<String> {
        if let Some(project) = &self.project_override {
            return Ok(project.clone());
        }
        self.provider
            .project_id()
            .await
            .map(|p| p.to_string())
            .map_err(|e| ResourceError::Credential(format!("Failed to determine project: {}", e)))
    }
}

type SourceCell = Arc<OnceCell<ResourceResult<Arc<dyn AccessTokenSource>>>>;

/// Credential sources for every selection, built lazily
///
/// Each selection is built at most once, outcome included, and only callers
/// of that selection wait on the build.
pub struct CredentialStore {
    identities: BTreeMap<String, IdentityConfig>,
    sources: Mutex<HashMap<Selection, SourceCell>>,
}

impl CredentialStore {
    pub fn new(identities: BTreeMap<String, IdentityConfig>) -> Self {
        Self {
            identities,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Names of the configured identities
    pub fn identity_names(&self) -> Vec<&str> {
        self.identities.keys().map(String::as_str).collect()
    }

    async fn build(&self, selection: &Selection) -> ResourceResult<Arc<dyn AccessTokenSource>> {
        let (provider, project): (Arc<dyn TokenProvider>, Option<String>) = match selection {
            Selection::DefaultChain => {
                let provider = gcp_auth::provider().await.map_err(|e| {
                    ResourceError::Credential(format!(
                        "{}. Run 'gcloud auth application-default login'",
                        e
                    ))
                })?;
                (provider, crate::gcp::default_project())
            }
            Selection::Environment => {
                let account = CustomServiceAccount::from_env()
                    .map_err(|e| ResourceError::Credential(e.to_string()))?
                    .ok_or_else(|| {
                        ResourceError::Credential("GOOGLE_APPLICATION_CREDENTIALS is not set".to_string())
                    })?;
                (Arc::new(account), None)
            }
            Selection::Named(name) => {
                let identity = self.identities.get(name).ok_or_else(|| {
                    ResourceError::Credential(format!("Unknown identity '{}'", name))
                })?;
                let account = CustomServiceAccount::from_file(&identity.key_file).map_err(|e| {
                    ResourceError::Credential(format!("{:?}: {}", identity.key_file, e))
                })?;
                (Arc::new(account), identity.project_id.clone())
            }
        };

        tracing::info!("Initialized credentials for {}", selection);
        Ok(Arc::new(GcpCredentials::new(provider, project)))
    }

    /// Cached outcome for `selection`, running `build` on first use
    async fn cached<F>(&self, selection: &Selection, build: F) -> ResourceResult<Arc<dyn AccessTokenSource>>
    where
        F: Future<Output = ResourceResult<Arc<dyn AccessTokenSource>>>,
    {
        let cell = {
            let mut sources = self.sources.lock().await;
            sources.entry(selection.clone()).or_default().clone()
        };

        cell.get_or_init(|| async {
            let outcome = build.await;
            if let Err(e) = &outcome {
                tracing::warn!("Credentials for {} unavailable: {}", selection, e);
            }
            outcome
        })
        .await
        .clone()
    }
}

#[async_trait]
impl CredentialSource for CredentialStore {
    async fn credentials(&self, selection: &Selection) -> ResourceResult<Arc<dyn AccessTokenSource>> {
        self.cached(selection, self.build(selection)).await
    }
}

/// Fixed token and project, for tests and local emulators
pub struct StaticToken {
    pub token: String,
    pub project_id: String,
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> ResourceResult<String> {
        Ok(self.token.clone())
    }

    async fn project_id(&self) -> ResourceResult<String> {
        Ok(self.project_id.clone())
    }
}

/// Maps every selection to a fixed project and token
pub struct StaticCredentials {
    projects: BTreeMap<Selection, String>,
}

impl StaticCredentials {
    pub fn new(projects: impl IntoIterator<Item = (Selection, String)>) -> Self {
        Self {
            projects: projects.into_iter().collect(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn credentials(&self, selection: &Selection) -> ResourceResult<Arc<dyn AccessTokenSource>> {
        let project_id = self
            .projects
            .get(selection)
            .ok_or_else(|| ResourceError::Credential(format!("No credentials for {}", selection)))?;
        Ok(Arc::new(StaticToken {
            token: format!("token-{}", selection.id()),
            project_id: project_id.clone(),
        }))
    }
}
