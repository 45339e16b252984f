use std::{
    hash::{BuildHasher, Hash},
    sync::Arc,
    thread::{self, JoinHandle},
};

use super::base_map::{BaseMap, ReaperState};

/// Spawns the reaper thread of a map. The thread exits when the map is shut
/// down.
pub(crate) fn spawn<K, V, S>(
    map: Arc<BaseMap<K, V, S>>,
    thread_name: String,
    _log_prefix: String,
) -> std::io::Result<JoinHandle<()>>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    thread::Builder::new().name(thread_name).spawn(move || {
        #[cfg(feature = "logging")]
        log::debug!("{_log_prefix}Reaper started");

        run(&map);

        #[cfg(feature = "logging")]
        log::debug!("{_log_prefix}Reaper stopped");
    })
}

/// Fires due entries, then sleeps until the next deadline or until woken up by a
/// `put` scheduling an earlier deadline, or by the shutdown.
fn run<K, V, S>(map: &BaseMap<K, V, S>)
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    let mut state = map.state.lock();

    while !state.is_shut_down {
        let now = state.clock.now();
        let _fired = map.reap(&mut state, now);

        #[cfg(feature = "logging")]
        if _fired > 0 {
            log::trace!("Reaper fired {_fired} timed out entries");
        }

        let wake_at = map.next_deadline(&mut state);
        state.reaper = ReaperState {
            is_parked: true,
            wake_at,
        };

        // Spurious and early wake-ups are fine: the loop re-reads the clock and
        // the scheduler every time.
        match wake_at {
            None => map.reaper_cond.wait(&mut state),
            Some(deadline) => {
                map.reaper_cond
                    .wait_for(&mut state, deadline.saturating_duration_since(now));
            }
        }

        state.reaper.is_parked = false;
    }
}
