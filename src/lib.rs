#![deny(missing_docs)]

//! A dynamically sized, back-pressured worker pool.
//!
//! [`Pool`] runs fire-and-forget [`Job`]s on a bounded set of worker
//! threads fed from a bounded queue. Permanent workers are started up
//! front and extra ones are added under load and retired when idle.
//! A small TCP front end ([`JobServer`], [`JobClient`]) routes published
//! messages to topic handlers through a [`Router`].

mod client;
mod common;
mod error;
mod router;
mod server;
/// Worker pool implementation.
pub mod thread_pool;

pub use client::JobClient;
pub use common::{PoolStats, Request, Response};
pub use error::{PoolError, Result};
pub use router::{Handler, Message, Router};
pub use server::JobServer;
pub use thread_pool::{Job, Param, Params, Pool, PoolConfig, ThreadPool};
