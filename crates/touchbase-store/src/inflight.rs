//! Per-key in-flight locks for coalescing identical remote fetches.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
pub(crate) struct InFlight {
  locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held for the duration of one fetch. Releasing the last guard for a key
/// forgets the key.
pub(crate) struct InFlightGuard<'a> {
  owner:  &'a InFlight,
  key:    String,
  _guard: OwnedMutexGuard<()>,
}

impl InFlight {
  /// Wait until no other caller holds `key`, then hold it.
  pub(crate) async fn acquire(&self, key: String) -> InFlightGuard<'_> {
    let lock = Arc::clone(
      self
        .locks()
        .entry(key.clone())
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
    );
    let guard = lock.lock_owned().await;
    InFlightGuard { owner: self, key, _guard: guard }
  }

  /// Number of keys currently held or awaited.
  pub(crate) fn len(&self) -> usize { self.locks().len() }

  fn locks(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
    self.locks.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Drop for InFlightGuard<'_> {
  fn drop(&mut self) {
    let mut locks = self.owner.locks();
    // One reference in the map, one in our own guard: nobody else waits.
    if locks.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 2) {
      locks.remove(&self.key);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[tokio::test]
  async fn released_keys_are_forgotten() {
    let inflight = InFlight::default();
    {
      let _a = inflight.acquire("1".into()).await;
      assert_eq!(inflight.len(), 1);
    }
    assert_eq!(inflight.len(), 0);
  }

  #[tokio::test]
  async fn second_caller_waits_for_first() {
    let inflight = Arc::new(InFlight::default());
    let first = inflight.acquire("7".into()).await;

    let waiter = {
      let inflight = inflight.clone();
      tokio::spawn(async move {
        let _g = inflight.acquire("7".into()).await;
      })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(first);
    waiter.await.unwrap();
    assert_eq!(inflight.len(), 0);
  }
}
