//! Resource factories invoked on an idle miss

use crate::context::AcquireContext;

use async_trait::async_trait;
use std::future::Future;

/// Creates new resources for a [`Pool`](crate::Pool)
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use idle_pool::{AcquireContext, ResourceFactory};
///
/// struct Buffers;
///
/// #[async_trait]
/// impl ResourceFactory for Buffers {
///     type Resource = Vec<u8>;
///     type Error = std::io::Error;
///
///     async fn create(&self, _ctx: &AcquireContext) -> Result<Vec<u8>, std::io::Error> {
///         Ok(Vec::with_capacity(4096))
///     }
/// }
/// ```
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    type Resource: Send + 'static;
    type Error: Send + 'static;

    /// Build a fresh resource. Errors are returned to the caller unchanged.
    async fn create(&self, ctx: &AcquireContext) -> Result<Self::Resource, Self::Error>;
}

/// Adapts an async closure into a [`ResourceFactory`]
pub struct FnFactory<F> {
    create: F,
}

impl<F> FnFactory<F> {
    pub fn new<Fut>(create: F) -> Self
    where
        F: Fn(AcquireContext) -> Fut,
    {
        Self { create }
    }
}

#[async_trait]
impl<F, Fut, R, E> ResourceFactory for FnFactory<F>
where
    F: Fn(AcquireContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send,
    R: Send + 'static,
    E: Send + 'static,
{
    type Resource = R;
    type Error = E;

    async fn create(&self, ctx: &AcquireContext) -> Result<R, E> {
        (self.create)(ctx.clone()).await
    }
}
