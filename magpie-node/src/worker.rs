//! # Worker - Local Evolution, Global Synchronization
//!
//! One thread per core, each owning its own evolution instance with its
//! own RNG and population; nothing evolutionary is shared between
//! threads. Before every epoch batch a thread compares its best fitness
//! with the master's and either pulls the master's genome into its
//! population, pushes its own up, or does neither. Shutdown is
//! cooperative: SIGINT sets a flag that is polled between batches, so
//! in-flight RPCs finish naturally.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::info;

use magpie_core::{fitness_cmp, Client, MagpieError, MagpieResult};

/// What a worker does with the master before its next epoch batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    /// Master is fitter (or we have nothing): seed from its genome
    Pull,
    /// We are fitter (or master has nothing): upload ours
    Push,
    /// Equal, including both-NaN: nothing to exchange
    Idle,
}

/// Decide pull/push/idle under the NaN-below-everything total order.
pub fn sync_action(master: f32, local: f32) -> SyncAction {
    match fitness_cmp(master, local) {
        Ordering::Greater => SyncAction::Pull,
        Ordering::Less => SyncAction::Push,
        Ordering::Equal => SyncAction::Idle,
    }
}

/// Run the worker role until SIGINT or the objective is reached.
pub async fn run(host: String, port: u16, impl_name: String) -> MagpieResult<()> {
    // catch a bad implementation name before spawning anything
    if magpie_tasks::create(&impl_name).is_none() {
        return Err(MagpieError::task(format!(
            "unknown implementation '{impl_name}' (available: {})",
            magpie_tasks::available().join(", ")
        )));
    }

    let threads = thread_count();
    info!(threads, implementation = %impl_name, "starting worker threads");

    let done = Arc::new(AtomicBool::new(false));
    let mut pool = Vec::with_capacity(threads);
    for id in 0..threads {
        let host = host.clone();
        let name = impl_name.clone();
        let done = done.clone();
        pool.push(std::thread::spawn(move || {
            let result = thread_run(id, &host, port, &name, &done);
            if result.is_err() {
                // wind the other threads down instead of evolving headless
                done.store(true, AtomicOrdering::SeqCst);
            }
            result
        }));
    }

    let mut joiner = tokio::task::spawn_blocking(move || {
        pool.into_iter()
            .map(|handle| handle.join())
            .collect::<Vec<_>>()
    });

    let results = tokio::select! {
        results = &mut joiner => results,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested, waiting for worker threads");
            done.store(true, AtomicOrdering::SeqCst);
            (&mut joiner).await
        }
    };

    let results =
        results.map_err(|e| MagpieError::task(format!("worker pool join failed: {e}")))?;
    for result in results {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(MagpieError::task("worker thread panicked")),
        }
    }
    Ok(())
}

fn thread_run(id: usize, host: &str, port: u16, name: &str, done: &AtomicBool) -> MagpieResult<()> {
    let mut evo = magpie_tasks::create(name)
        .ok_or_else(|| MagpieError::task(format!("unknown implementation '{name}'")))?;
    let client = Client::new(host, port);

    while !done.load(AtomicOrdering::SeqCst) {
        let local = evo.fitness();
        let master = client.get_fitness()?;

        // stop once the master holds the desired accuracy
        if fitness_cmp(master, evo.objective()) != Ordering::Less {
            info!(thread = id, master, "objective reached");
            break;
        }

        match sync_action(master, local) {
            SyncAction::Pull => {
                let (master_fitness, dna) = client.get_graph()?;
                info!(thread = id, size = dna.len(), master = master_fitness, local, "pull");
                evo.seed(&dna);
            }
            SyncAction::Push => {
                let dna = evo.best();
                info!(thread = id, size = dna.len(), master, local, "push");
                client.set_graph(local, &dna)?;
            }
            SyncAction::Idle => {}
        }

        evo.run();
    }

    Ok(())
}

/// Worker pool size: `MAGPIE_THREADS` override, hardware concurrency
/// otherwise.
fn thread_count() -> usize {
    std::env::var("MAGPIE_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_action_with_real_values() {
        assert_eq!(sync_action(0.4, 0.5), SyncAction::Push);
        assert_eq!(sync_action(0.5, 0.4), SyncAction::Pull);
        assert_eq!(sync_action(0.5, 0.5), SyncAction::Idle);
    }

    #[test]
    fn test_sync_action_with_nan() {
        // fresh worker sees a master with data: pull
        assert_eq!(sync_action(0.4, f32::NAN), SyncAction::Pull);
        // evaluated worker sees an empty master: push
        assert_eq!(sync_action(f32::NAN, 0.5), SyncAction::Push);
        // nobody has data yet
        assert_eq!(sync_action(f32::NAN, f32::NAN), SyncAction::Idle);
    }
}
