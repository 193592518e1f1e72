//! Data-access contract implemented by every resource kind

use super::model::Resource;
use super::pagination::{Page, PageToken};
use crate::context::ExecContext;
use crate::error::{ResourceError, ResourceResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Operations a DAO may support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Delete,
    ListPage,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Delete => "delete",
            Self::ListPage => "list_page",
        }
    }
}

/// Per-kind data access object
#[async_trait]
pub trait Dao: Send + Sync {
    async fn list(&self, ctx: &ExecContext) -> ResourceResult<Vec<Resource>>;

    async fn get(&self, ctx: &ExecContext, id: &str) -> ResourceResult<Resource>;

    async fn delete(&self, ctx: &ExecContext, id: &str) -> ResourceResult<()>;

    /// One page of a cursor-paginated listing. Only called when
    /// `supports(Operation::ListPage)` is true.
    async fn list_page(
        &self,
        _ctx: &ExecContext,
        _page_size: usize,
        _token: Option<&PageToken>,
    ) -> ResourceResult<Page> {
        Err(ResourceError::Unsupported {
            kind: "this resource".to_string(),
            operation: Operation::ListPage.as_str().to_string(),
        })
    }

    fn supports(&self, operation: Operation) -> bool {
        !matches!(operation, Operation::ListPage)
    }
}

/// Builds a DAO for an execution context (credential resolution happens here)
#[async_trait]
pub trait DaoFactory: Send + Sync {
    async fn create(&self, ctx: &ExecContext) -> ResourceResult<Arc<dyn Dao>>;
}

#[async_trait]
impl<F, Fut> DaoFactory for F
where
    F: Fn(ExecContext) -> Fut + Send + Sync,
    Fut: Future<Output = ResourceResult<Arc<dyn Dao>>> + Send + 'static,
{
    async fn create(&self, ctx: &ExecContext) -> ResourceResult<Arc<dyn Dao>> {
        (self)(ctx.clone()).await
    }
}
