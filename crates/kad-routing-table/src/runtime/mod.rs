//! # Routing Runtime
//!
//! Single-owner tokio actor around [`RoutingService`].
//!
//! The actor is the only task touching the routing table. Callers talk to
//! it through a cloneable [`RoutingTableHandle`]; pings and lookups requested
//! by the service run as tasks on the actor's `JoinSet` and their results
//! are fed back into the service when they complete. Maintenance timers are
//! driven by sleeping until the next callout deadline.
//!
//! ```rust,ignore
//! let service = RoutingService::new(local_id, config, Box::new(SystemTimeSource::new()))?;
//! let (handle, task) = runtime::spawn(service, rpc, lookups, Arc::new(NoopObserver));
//! handle.seed(seed_addresses).await;
//! // ...
//! let records = handle.shutdown().await;
//! ```
//!
//! [`RoutingService`]: crate::service::RoutingService

mod actor;
mod handle;

pub use handle::{spawn, RoutingTableHandle};
