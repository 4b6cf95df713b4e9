//! Supervised background tasks.
//!
//! A panicking task is logged and ends; the process keeps running.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::task::JoinHandle;

use crate::security::reaper::panic_message;

/// Spawn `task`, catching and logging any panic it raises.
pub fn spawn_supervised<F>(name: &'static str, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
            tracing::error!(
                task = name,
                panic = %panic_message(panic.as_ref()),
                "Background task panicked"
            );
        }
    })
}
