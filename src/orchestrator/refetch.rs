//! The orchestrator handle.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::loader::ConfigError;
use crate::config::schema::RefetchConfig;
use crate::config::validation::validate_config;
use crate::error::FetchResult;
use crate::http::request::RequestInit;
use crate::http::transport::Transport;
use crate::lifecycle::{AbortHandle, ScopeCell};
use crate::orchestrator::context::ConfigContext;
use crate::orchestrator::scheduler::{InFlight, LogicalCall};

/// A configured, cancellable request orchestrator.
///
/// Cloning yields the same instance: clones share the configuration and
/// the instance scope. Builder methods (see `builder.rs`) return new
/// instances with their own scope.
pub struct Refetch<T: Transport> {
    pub(crate) transport: Arc<T>,
    pub(crate) context: Arc<ConfigContext<T::Response>>,
    scope: Arc<ScopeCell>,
    in_flight: Arc<InFlight>,
}

impl<T: Transport> Clone for Refetch<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            context: self.context.clone(),
            scope: self.scope.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for Refetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refetch")
            .field("context", &self.context)
            .field("in_flight", &self.in_flight.count())
            .finish()
    }
}

impl<T: Transport> Refetch<T> {
    /// An orchestrator with the factory defaults: one attempt, no timeout.
    pub fn new(transport: T) -> Self {
        Self::with_context(Arc::new(transport), ConfigContext::default())
    }

    pub(crate) fn with_context(transport: Arc<T>, context: ConfigContext<T::Response>) -> Self {
        Self {
            transport,
            context: Arc::new(context),
            scope: Arc::new(ScopeCell::new()),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Build an orchestrator from a validated config file.
    pub fn from_config(transport: T, config: &RefetchConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let patch = config
            .to_patch()
            .map_err(|e| ConfigError::Validation(vec![e]))?;

        Ok(Self::with_context(
            Arc::new(transport),
            ConfigContext::default().patched(patch),
        ))
    }

    pub fn context(&self) -> &ConfigContext<T::Response> {
        &self.context
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start a logical call.
    ///
    /// Dispatch happens before this returns: in single mode the previous
    /// call is already cancelled, and the call is bound to the instance
    /// scope that is live now. The returned future drives the attempts.
    pub fn call(
        &self,
        resource: impl Into<String>,
        init: RequestInit,
    ) -> impl Future<Output = FetchResult<T::Response>> + Send + 'static {
        let call = LogicalCall::dispatch(
            self.transport.clone(),
            self.context.clone(),
            &self.scope,
            &self.in_flight,
            resource.into(),
            init,
        );
        call.run()
    }

    /// [`call`](Self::call) with default options.
    pub fn fetch(
        &self,
        resource: impl Into<String>,
    ) -> impl Future<Output = FetchResult<T::Response>> + Send + 'static {
        self.call(resource, RequestInit::default())
    }

    /// Abort every call in flight on this instance.
    ///
    /// The instance stays usable; calls started afterwards run under a
    /// fresh scope.
    pub fn abort(&self) {
        self.scope.abort();
    }

    /// A detached handle that aborts whatever is live on this instance when
    /// it is used.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle::new(&self.scope)
    }

    /// Logical calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    /// True when both handles are the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.scope, &other.scope)
    }
}
