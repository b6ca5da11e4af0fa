//! Tower middleware that gates requests through the quota service.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower_layer::Layer;
use tower_service::Service;

use crate::error::QuotaError;
use crate::service::QuotaService;

/// The quota identity and cost a request resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaKey {
    pub namespace: String,
    pub name: String,
    pub tokens: i64,
}

/// Maps requests onto quota identities. Closures qualify.
pub trait KeyExtractor<Req>: Send + Sync {
    fn key(&self, req: &Req) -> QuotaKey;
}

impl<Req, F> KeyExtractor<Req> for F
where
    F: Fn(&Req) -> QuotaKey + Send + Sync,
{
    fn key(&self, req: &Req) -> QuotaKey {
        self(req)
    }
}

/// Error surfaced by [`QuotaMiddleware`].
#[derive(Debug)]
pub enum GateError<E> {
    /// The quota service refused the request.
    Quota(QuotaError),
    /// The wrapped service failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for GateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quota(e) => write!(f, "{}", e),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GateError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Quota(e) => Some(e),
            Self::Inner(e) => Some(e),
        }
    }
}

/// A layer that arbitrates each request against a [`QuotaService`].
pub struct QuotaLayer<X> {
    service: Arc<QuotaService>,
    extractor: Arc<X>,
}

impl<X> QuotaLayer<X> {
    pub fn new(service: Arc<QuotaService>, extractor: X) -> Self {
        Self { service, extractor: Arc::new(extractor) }
    }
}

impl<X> Clone for QuotaLayer<X> {
    fn clone(&self) -> Self {
        Self { service: Arc::clone(&self.service), extractor: Arc::clone(&self.extractor) }
    }
}

impl<S, X> Layer<S> for QuotaLayer<X> {
    type Service = QuotaMiddleware<S, X>;

    fn layer(&self, inner: S) -> Self::Service {
        QuotaMiddleware {
            inner,
            service: Arc::clone(&self.service),
            extractor: Arc::clone(&self.extractor),
        }
    }
}

/// Middleware service that enforces quotas.
pub struct QuotaMiddleware<S, X> {
    inner: S,
    service: Arc<QuotaService>,
    extractor: Arc<X>,
}

impl<S: Clone, X> Clone for QuotaMiddleware<S, X> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            service: Arc::clone(&self.service),
            extractor: Arc::clone(&self.extractor),
        }
    }
}

impl<S, X, Req> Service<Req> for QuotaMiddleware<S, X>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    X: KeyExtractor<Req> + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = GateError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GateError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let service = Arc::clone(&self.service);
        let extractor = Arc::clone(&self.extractor);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let key = extractor.key(&req);
            match service.allow(&key.namespace, &key.name, key.tokens, None).await {
                Ok(grant) => {
                    // Smooth the grant server-side instead of surfacing the
                    // wait hint to the wrapped service.
                    if !grant.wait.is_zero() {
                        tokio::time::sleep(grant.wait).await;
                    }
                    inner.call(req).await.map_err(GateError::Inner)
                }
                Err(e) => Err(GateError::Quota(e)),
            }
        })
    }
}
