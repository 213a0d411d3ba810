//! RT-safe reclamation of retired region snapshots
//!
//! Regions publish their read-relevant state as immutable snapshots behind
//! `basedrop::Shared` pointers. When playback drops the last reference to a
//! superseded snapshot on the audio thread, the memory must not be freed
//! there; freeing takes unbounded time and would risk dropouts. `basedrop`
//! instead enqueues the pointer, and the collector thread owned by this
//! module frees it later.
//!
//! Dropping a `Shared` on the audio thread costs a queue push; the actual
//! deallocation happens here, where latency is irrelevant.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Global handle for creating `Shared<T>` allocations.
///
/// Initialized once; clones are cheap. The collector itself lives on the
/// reclamation thread.
static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Interval between collection sweeps. Snapshots are small, so reclamation
/// latency only bounds memory growth under rapid republish, not audio
/// behavior.
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("snapshot-gc".to_string())
        .spawn(move || {
            // The Collector is !Sync, so it is created and driven here
            let mut collector = Collector::new();
            tx.send(collector.handle())
                .expect("failed to hand back gc handle");

            log::info!("snapshot gc thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("failed to spawn snapshot gc thread");

    rx.recv().expect("failed to receive gc handle")
}

/// Get a handle for allocating `Shared<T>` values.
///
/// The first call spawns the collector thread; later calls clone the cached
/// handle.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_allocation_and_drop() {
        let value = Shared::new(&gc_handle(), vec![1u64, 2, 3]);
        let clone = Shared::clone(&value);
        assert_eq!(*clone, vec![1, 2, 3]);
        drop(value);
        // Last reference: enqueued for the collector, not freed inline
        drop(clone);
    }
}
