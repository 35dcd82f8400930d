//! Where per-partition computation runs.
//!
//! Local sketch computation is CPU (and sometimes IO) heavy, so it never runs on the async
//! threads that drive result combination.

use crate::error::{Result, SketchError};
use crate::stream::CancellationToken;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

#[cfg(feature = "parallel")]
use rayon::ThreadPool;
#[cfg(feature = "parallel")]
use std::sync::OnceLock;

/// Best-effort crate-local Rayon pool for partition work.
///
/// Global pool initialization can fail under resource pressure and Rayon panics on first use
/// when it does. A local pool lets us fall back to tokio's blocking pool instead.
#[cfg(feature = "parallel")]
static RAYON_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

#[cfg(feature = "parallel")]
fn desired_rayon_threads() -> usize {
    let from_env = std::env::var("RAYON_NUM_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0);
    from_env.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

#[cfg(feature = "parallel")]
fn build_rayon_pool() -> Option<ThreadPool> {
    let requested = desired_rayon_threads().max(1);
    let try_build = |n| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("prism-partition-{i}"))
            .build()
    };

    match try_build(requested) {
        Ok(pool) => Some(pool),
        Err(_) if requested > 1 => try_build(1).ok(),
        Err(err) => {
            log::warn!("partition thread pool unavailable, using blocking tasks: {err}");
            None
        }
    }
}

/// Returns the crate-local Rayon thread pool, if one could be created.
#[cfg(feature = "parallel")]
pub(crate) fn rayon_pool() -> Option<&'static ThreadPool> {
    RAYON_POOL.get_or_init(build_rayon_pool).as_ref()
}

/// Run `job` off the async threads and wait for its outcome.
///
/// The job is skipped if `cancel` fires before it starts. A panic inside the job becomes
/// [`SketchError::Local`] instead of tearing down the worker.
pub(crate) async fn run_local<R, F>(cancel: &CancellationToken, job: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(SketchError::Cancelled);
    }
    let cancel = cancel.clone();
    let guarded = move || -> Result<R> {
        if cancel.is_cancelled() {
            return Err(SketchError::Cancelled);
        }
        catch_unwind(AssertUnwindSafe(job))
            .unwrap_or_else(|panic| Err(SketchError::Local(panic_message(panic.as_ref()))))
    };

    #[cfg(feature = "parallel")]
    {
        if let Some(pool) = rayon_pool() {
            let (tx, rx) = tokio::sync::oneshot::channel();
            pool.spawn(move || {
                let _ = tx.send(guarded());
            });
            return rx.await.unwrap_or(Err(SketchError::Cancelled));
        }
    }

    tokio::task::spawn_blocking(guarded)
        .await
        .unwrap_or_else(|err| Err(SketchError::Local(err.to_string())))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = panic.downcast_ref::<String>() {
        return msg.clone();
    }
    "panic in partition computation".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panics_become_local_errors() {
        let cancel = CancellationToken::new();
        let outcome: Result<()> = run_local(&cancel, || panic!("boom")).await;
        match outcome {
            Err(SketchError::Local(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_jobs_do_not_run() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = run_local(&cancel, || Ok(1)).await;
        assert!(matches!(outcome, Err(SketchError::Cancelled)));
    }
}
