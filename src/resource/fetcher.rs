//! Resource Fetcher
//!
//! Fetches one resource kind across every (credential selection, region)
//! pair of an [`OperationContext`].
//!
//! - One selection and one region: the DAO is called directly and its
//!   resources come back plain.
//! - Otherwise: one task per pair, all sharing a deadline and a cancellation
//!   token that also fires if the fetch itself is dropped. Each task wraps its
//!   resources with the pair's scope. Results are assembled in cross-product
//!   order, never completion order.
//! - A pair that fails is reported in `partial_errors`; only when nothing
//!   succeeded does the whole fetch fail.
//! - Each pair paginates on its own cursor. Pairs that run out of pages are
//!   remembered and skipped by later "next page" rounds.

use super::dao::{Dao, Operation};
use super::model::ResourceKind;
use super::pagination::{Page, PageKey, PageToken, PageTokenMap};
use super::registry::{CapabilityRegistry, KindScope};
use super::scoped::{ResourceItem, ResourceScope, ScopedResource};
use crate::context::{ExecContext, OperationContext, Region, Selection};
use crate::error::{ResourceError, ResourceResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Default bound for one fetch batch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page size for paginated kinds
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Tunables for the orchestrator
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Deadline shared by every task of one batch
    pub timeout: Duration,
    pub page_size: usize,
    /// Maximum tasks allowed to call out at once; 0 means unbounded
    pub max_concurrent: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrent: 0,
        }
    }
}

/// Resolves the account identity (project id) behind a selection
#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn resolve_account(&self, selection: &Selection) -> ResourceResult<String>;
}

/// Aggregated result of one fetch round
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub resources: Vec<ResourceItem>,
    /// One labeled message per failed pair
    pub partial_errors: Vec<String>,
    /// Cursors of pairs that still have pages
    pub page_tokens: PageTokenMap,
    pub fetched_at: DateTime<Utc>,
}

impl FetchResult {
    pub fn empty() -> Self {
        Self {
            resources: Vec::new(),
            partial_errors: Vec::new(),
            page_tokens: PageTokenMap::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn has_more(&self) -> bool {
        !self.page_tokens.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.partial_errors.is_empty()
    }

    /// Accumulate a "next page" round: resources are appended, the cursor map
    /// is replaced by the newer one.
    pub fn append(&mut self, next: FetchResult) {
        self.resources.extend(next.resources);
        self.partial_errors.extend(next.partial_errors);
        self.page_tokens = next.page_tokens;
        self.fetched_at = next.fetched_at;
    }
}

/// One fan-out pair scheduled in a round
struct PairJob {
    selection: Selection,
    region: Region,
    key: PageKey,
    label: String,
    token: Option<PageToken>,
}

/// Resources of one pair, already wrapped
struct PairOutput {
    items: Vec<ResourceItem>,
    next_token: Option<PageToken>,
}

/// Fan-out fetcher over credential selections × regions
#[derive(Clone)]
pub struct FetchOrchestrator {
    registry: Arc<CapabilityRegistry>,
    accounts: Arc<dyn AccountResolver>,
    /// Account id per selection id, resolved at most once
    account_cache: Arc<Mutex<HashMap<String, Arc<OnceCell<String>>>>>,
    /// Pairs whose pages ran out, per kind; cleared by `load_resources`
    exhausted: Arc<StdMutex<HashMap<ResourceKind, HashSet<PageKey>>>>,
    admission: Option<Arc<Semaphore>>,
    settings: FetchSettings,
}

impl FetchOrchestrator {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        accounts: Arc<dyn AccountResolver>,
        settings: FetchSettings,
    ) -> Self {
        let admission = (settings.max_concurrent > 0)
            .then(|| Arc::new(Semaphore::new(settings.max_concurrent)));

        Self {
            registry,
            accounts,
            account_cache: Arc::new(Mutex::new(HashMap::new())),
            exhausted: Arc::new(StdMutex::new(HashMap::new())),
            admission,
            settings,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// First page of `kind` across the whole operation context
    pub async fn load_resources(
        &self,
        base: &ExecContext,
        kind: &ResourceKind,
        op: &OperationContext,
    ) -> ResourceResult<FetchResult> {
        self.forget_exhausted(kind);
        self.fetch(base, kind, op, None).await
    }

    /// Next page for every pair that still has a cursor in `tokens`
    pub async fn load_next_page(
        &self,
        base: &ExecContext,
        kind: &ResourceKind,
        op: &OperationContext,
        tokens: &PageTokenMap,
    ) -> ResourceResult<FetchResult> {
        self.fetch(base, kind, op, Some(tokens)).await
    }

    async fn fetch(
        &self,
        base: &ExecContext,
        kind: &ResourceKind,
        op: &OperationContext,
        inbound: Option<&PageTokenMap>,
    ) -> ResourceResult<FetchResult> {
        let entry = self.registry.entry(kind)?;

        if let Some(field) = entry.missing_filter(base) {
            return Err(ResourceError::FilterRequired {
                kind: kind.to_string(),
                field: field.to_string(),
            });
        }

        if entry.scope == KindScope::Local {
            return self.fetch_direct(base.clone(), kind, inbound).await;
        }

        let selections = op.selections();
        let global = [Region::global()];
        let regions = match entry.scope {
            KindScope::Global => &global[..],
            _ => op.regions(),
        };

        if selections.len() == 1 && regions.len() == 1 {
            let ctx = base
                .clone()
                .with_selection(selections[0].clone())
                .with_region(regions[0].clone());
            return self.fetch_direct(ctx, kind, inbound).await;
        }

        self.fan_out(base, kind, op, regions, inbound).await
    }

    /// Single pair: no tasks, no wrapping
    async fn fetch_direct(
        &self,
        ctx: ExecContext,
        kind: &ResourceKind,
        inbound: Option<&PageTokenMap>,
    ) -> ResourceResult<FetchResult> {
        let token = match inbound {
            None => None,
            Some(tokens) => match tokens.get(&PageKey::Single) {
                Some(token) if !self.is_exhausted(kind, &PageKey::Single) => Some(token.clone()),
                _ => return Ok(FetchResult::empty()),
            },
        };

        tracing::debug!("Direct fetch of {}", kind);

        let deadline = Instant::now() + self.settings.timeout;
        let page_size = self.settings.page_size;
        let registry = &self.registry;
        let page = bounded(&ctx.cancel, deadline, self.settings.timeout, async {
            let dao = registry.get_dao(&ctx, kind).await?;
            fetch_page(dao.as_ref(), &ctx, page_size, token).await
        })
        .await?;

        if page.next_token.is_none() {
            self.mark_exhausted(kind, PageKey::Single);
        }

        let mut result = FetchResult::empty();
        result.page_tokens.update(PageKey::Single, page.next_token);
        result.resources = page.resources.into_iter().map(ResourceItem::Plain).collect();
        Ok(result)
    }

    async fn fan_out(
        &self,
        base: &ExecContext,
        kind: &ResourceKind,
        op: &OperationContext,
        regions: &[Region],
        inbound: Option<&PageTokenMap>,
    ) -> ResourceResult<FetchResult> {
        let multi_identity = op.is_multi_identity();
        let jobs = self.plan(kind, op, regions, inbound);

        if jobs.is_empty() {
            tracing::debug!("No pairs left to page for {}", kind);
            return Ok(FetchResult::empty());
        }

        let batch = Uuid::new_v4();
        let span = tracing::info_span!("fetch", %batch, %kind);
        tracing::info!(parent: &span, "Fetching {} across {} pairs", kind, jobs.len());

        let cancel = base.cancel.child_token();
        // dropping this fetch cancels every pair still running
        let _guard = cancel.clone().drop_guard();
        let deadline = Instant::now() + self.settings.timeout;

        let handles: Vec<_> = jobs
            .iter()
            .map(|job| {
                let this = self.clone();
                let ctx = base.scoped(&job.selection, &job.region, cancel.clone());
                let kind = kind.clone();
                let selection = job.selection.clone();
                let region = job.region.clone();
                let token = job.token.clone();
                tokio::spawn(
                    async move {
                        this.run_pair(ctx, kind, selection, region, token, multi_identity, deadline)
                            .await
                    }
                    .instrument(span.clone()),
                )
            })
            .collect();

        let outcomes = join_all(handles).await;

        let mut result = FetchResult::empty();
        for (job, outcome) in jobs.into_iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|e| {
                Err(ResourceError::transient(format!("fetch task failed: {}", e)))
            });

            match outcome {
                Ok(output) => {
                    if output.next_token.is_none() {
                        self.mark_exhausted(kind, job.key.clone());
                    }
                    result.resources.extend(output.items);
                    result.page_tokens.update(job.key, output.next_token);
                }
                Err(e) if e.is_escalating() => return Err(e),
                Err(e) => {
                    tracing::warn!(parent: &span, "{}: {}", job.label, e);
                    result.partial_errors.push(format!("{}: {}", job.label, e));
                    // keep the cursor so the pair is retried next round
                    if let Some(token) = job.token {
                        result.page_tokens.update(job.key, Some(token));
                    }
                }
            }
        }

        if result.resources.is_empty() && !result.partial_errors.is_empty() {
            return Err(ResourceError::AggregateFetch {
                errors: result.partial_errors,
            });
        }

        tracing::info!(
            parent: &span,
            "Fetched {} {} ({} failed pairs, {} with more pages)",
            result.resources.len(),
            kind,
            result.partial_errors.len(),
            result.page_tokens.len()
        );

        Ok(result)
    }

    /// Pairs to query this round, in cross-product order
    fn plan(
        &self,
        kind: &ResourceKind,
        op: &OperationContext,
        regions: &[Region],
        inbound: Option<&PageTokenMap>,
    ) -> Vec<PairJob> {
        let multi_identity = op.is_multi_identity();
        let mut jobs = Vec::new();

        for selection in op.selections() {
            for region in regions {
                let key = PageKey::for_pair(op, selection, region);
                let token = match inbound {
                    None => None,
                    Some(tokens) => match tokens.get(&key) {
                        Some(token) if !self.is_exhausted(kind, &key) => Some(token.clone()),
                        _ => continue,
                    },
                };
                let label = if multi_identity {
                    format!("{}/{}", selection, region)
                } else {
                    region.to_string()
                };
                jobs.push(PairJob {
                    selection: selection.clone(),
                    region: region.clone(),
                    key,
                    label,
                    token,
                });
            }
        }

        jobs
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_pair(
        &self,
        ctx: ExecContext,
        kind: ResourceKind,
        selection: Selection,
        region: Region,
        token: Option<PageToken>,
        multi_identity: bool,
        deadline: Instant,
    ) -> ResourceResult<PairOutput> {
        let cancel = ctx.cancel.clone();
        bounded(&cancel, deadline, self.settings.timeout, async {
            let _permit = match &self.admission {
                Some(semaphore) => Some(
                    semaphore
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|_| ResourceError::Cancelled)?,
                ),
                None => None,
            };

            let account_id = if multi_identity {
                self.account_id(&selection).await
            } else {
                None
            };

            let dao = self.registry.get_dao(&ctx, &kind).await?;
            let page = fetch_page(dao.as_ref(), &ctx, self.settings.page_size, token).await?;

            tracing::debug!(
                "{}/{}: {} {}",
                selection,
                region,
                page.resources.len(),
                kind
            );

            let items = page
                .resources
                .into_iter()
                .map(|resource| {
                    let scope = if multi_identity {
                        ResourceScope::identity(region.clone(), selection.clone(), account_id.clone())
                    } else {
                        ResourceScope::region(region.clone())
                    };
                    ResourceItem::Scoped(ScopedResource::new(resource, scope))
                })
                .collect();

            Ok(PairOutput {
                items,
                next_token: page.next_token,
            })
        })
        .await
    }

    /// Account id for a selection, resolved once and shared by all tasks
    async fn account_id(&self, selection: &Selection) -> Option<String> {
        let cell = {
            let mut cache = self.account_cache.lock().await;
            cache.entry(selection.id().to_string()).or_default().clone()
        };

        match cell
            .get_or_try_init(|| self.accounts.resolve_account(selection))
            .await
        {
            Ok(account) => Some(account.clone()),
            Err(e) => {
                tracing::warn!("Could not resolve account for {}: {}", selection, e);
                None
            }
        }
    }

    // =========================================================================
    // Actions on fetched items
    // =========================================================================

    /// Execution context for acting on `item`: its own scope when it has one,
    /// otherwise the first selection and region of `op`.
    pub fn context_for_item(
        &self,
        base: &ExecContext,
        op: &OperationContext,
        item: &ResourceItem,
    ) -> ExecContext {
        let mut ctx = base
            .clone()
            .with_selection(op.selections()[0].clone())
            .with_region(op.regions()[0].clone());

        if let Some(scope) = item.scope() {
            ctx.region = Some(scope.region.clone());
            if let Some(selection) = &scope.selection {
                ctx.selection = Some(selection.clone());
            }
        }

        ctx
    }

    /// Re-fetch one item with `get`, keeping its scope
    pub async fn describe(
        &self,
        base: &ExecContext,
        kind: &ResourceKind,
        op: &OperationContext,
        item: &ResourceItem,
    ) -> ResourceResult<ResourceItem> {
        let ctx = self.context_for_item(base, op, item);
        let dao = self.registry.get_dao(&ctx, kind).await?;
        let fresh = dao.get(&ctx, &item.resource().id).await?;

        Ok(match item {
            ResourceItem::Plain(_) => ResourceItem::Plain(fresh),
            ResourceItem::Scoped(scoped) => {
                ResourceItem::Scoped(ScopedResource::new(fresh, scoped.scope().clone()))
            }
        })
    }

    /// Describe-after-list: items that vanished since listing are skipped,
    /// other failures are reported per item.
    pub async fn describe_all(
        &self,
        base: &ExecContext,
        kind: &ResourceKind,
        op: &OperationContext,
        items: &[ResourceItem],
    ) -> ResourceResult<FetchResult> {
        let outcomes = join_all(items.iter().map(|item| self.describe(base, kind, op, item))).await;

        let mut result = FetchResult::empty();
        for (item, outcome) in items.iter().zip(outcomes) {
            match outcome {
                Ok(fresh) => result.resources.push(fresh),
                Err(e) if e.is_not_found() => {
                    tracing::debug!("{} disappeared before describe, skipping", item.id());
                }
                Err(e) => result.partial_errors.push(format!("{}: {}", item.id(), e)),
            }
        }

        if result.resources.is_empty() && !result.partial_errors.is_empty() {
            return Err(ResourceError::AggregateFetch {
                errors: result.partial_errors,
            });
        }

        Ok(result)
    }

    /// Delete the resource behind `item`
    pub async fn delete(
        &self,
        base: &ExecContext,
        kind: &ResourceKind,
        op: &OperationContext,
        item: &ResourceItem,
    ) -> ResourceResult<()> {
        let ctx = self.context_for_item(base, op, item);
        let dao = self.registry.get_dao(&ctx, kind).await?;

        if !dao.supports(Operation::Delete) {
            return Err(ResourceError::ReadOnly(kind.to_string()));
        }

        tracing::info!("Deleting {} {}", kind, item.id());
        dao.delete(&ctx, &item.resource().id).await
    }

    // =========================================================================
    // Bookkeeping
    // =========================================================================

    fn exhausted_pairs(&self) -> std::sync::MutexGuard<'_, HashMap<ResourceKind, HashSet<PageKey>>> {
        // a poisoned map only holds skip hints; keep using it
        self.exhausted.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mark_exhausted(&self, kind: &ResourceKind, key: PageKey) {
        self.exhausted_pairs().entry(kind.clone()).or_default().insert(key);
    }

    fn is_exhausted(&self, kind: &ResourceKind, key: &PageKey) -> bool {
        self.exhausted_pairs()
            .get(kind)
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }

    fn forget_exhausted(&self, kind: &ResourceKind) {
        self.exhausted_pairs().remove(kind);
    }
}

/// First page, or the page after `token`
async fn fetch_page(
    dao: &dyn Dao,
    ctx: &ExecContext,
    page_size: usize,
    token: Option<PageToken>,
) -> ResourceResult<Page> {
    if dao.supports(Operation::ListPage) {
        return dao.list_page(ctx, page_size, token.as_ref()).await;
    }
    if token.is_some() {
        // non-paginating DAOs never hand out cursors
        return Ok(Page::default());
    }
    Ok(Page::last(dao.list(ctx).await?))
}

/// Run `fut` until it finishes, `deadline` passes or `cancel` fires
async fn bounded<T>(
    cancel: &CancellationToken,
    deadline: Instant,
    timeout: Duration,
    fut: impl Future<Output = ResourceResult<T>>,
) -> ResourceResult<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ResourceError::Cancelled),
        outcome = tokio::time::timeout_at(deadline, fut) => {
            outcome.unwrap_or_else(|_| Err(ResourceError::Timeout(timeout)))
        }
    }
}
