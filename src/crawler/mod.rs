//! Crawler module: the traversal engine and its plumbing
//!
//! This module contains the core crawling logic, including:
//! - The per-entity protocol (classify, materialize, discover, recurse)
//! - Bounded hand-off from blocking enumeration to the async engine
//! - Cooperative cancellation
//! - Per-entity fault isolation
//! - Running every configured source from a `Config`

mod cancel;
mod channel;
mod context;
mod engine;
mod fault;
mod runner;

pub use cancel::CancellationToken;
pub use channel::{ChildStream, DiscoveryChannel, DiscoverySender};
pub use context::{log_skip, ContentHandlerFactory, CrawlContext, FilterFn};
pub use engine::{CrawlEngine, CrawlReport, ErrorSummary};
pub use fault::{format_stacktrace, FaultIsolator};
pub use runner::{build_registry, root_entity, run_crawl, RunOptions};
