//! [`Store`]: the generic cache engine behind every entity store.
//!
//! A store keeps its whole state in memory behind a `RwLock` and mirrors it to
//! one named blob through a [`WriteQueue`]. The in-memory state is always
//! authoritative; persistence failures are logged and reported through
//! [`WriteTicket`]s, never rolled back.

use std::{
  collections::{BTreeMap, btree_map::Entry},
  future::Future,
  sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::{Serialize, de::DeserializeOwned};
use touchbase_core::{entity::Entity, remote::ApiError, storage::Storage};

use crate::{
  Error, Result,
  inflight::InFlight,
  writer::{WriteQueue, WriteTicket},
};

fn backend<E: std::error::Error + Send + Sync + 'static>(error: E) -> Error {
  Error::Backend(Box::new(error))
}

/// A keyed collection of records. Every key equals its record's id.
pub type Collection<E> = BTreeMap<<E as Entity>::Id, E>;

// ─── State traits ────────────────────────────────────────────────────────────

/// The persisted shape of one store.
pub trait StoreState:
  Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
  /// Name of the blob this state is persisted to.
  const FILE_NAME: &'static str;

  /// Restore invariants after a wholesale load. Returns the number of repairs.
  fn normalize(&mut self) -> usize { 0 }
}

/// A state whose main content is a keyed collection of one entity kind.
pub trait EntityState: StoreState {
  type Entity: Entity;

  fn entities(&self) -> &Collection<Self::Entity>;

  fn entities_mut(&mut self) -> &mut Collection<Self::Entity>;
}

/// Move every record whose key differs from its own id to the right key.
///
/// A record already stored under its own id wins; a stray that would replace
/// it is dropped. Returns the number of records moved or dropped.
pub fn rekey<E: Entity>(collection: &mut Collection<E>) -> usize {
  let stray_keys: Vec<E::Id> = collection
    .iter()
    .filter(|(key, record)| **key != record.id())
    .map(|(key, _)| *key)
    .collect();
  let strays: Vec<(E::Id, E)> = stray_keys
    .into_iter()
    .filter_map(|key| collection.remove(&key).map(|record| (key, record)))
    .collect();
  let repairs = strays.len();

  for (key, record) in strays {
    let id = record.id();
    match collection.entry(id) {
      Entry::Vacant(slot) => {
        tracing::warn!(kind = %E::KIND, %key, %id, "re-keyed record under its own id");
        slot.insert(record);
      }
      Entry::Occupied(_) => {
        tracing::warn!(kind = %E::KIND, %key, %id, "dropped mis-keyed duplicate of a stored record");
      }
    }
  }
  repairs
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// How [`Store::initialize`] obtained its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
  /// Nothing was persisted; a fresh default state was written.
  Created,
  /// The persisted state was read and parsed.
  Loaded,
  /// Storage could not be read or written; the state is the default.
  Recovered,
}

/// A write-through cache of one [`StoreState`] over a [`Storage`] backend.
///
/// Must be constructed inside a tokio runtime.
pub struct Store<St, S> {
  state:    RwLock<St>,
  storage:  Arc<S>,
  writer:   WriteQueue,
  inflight: InFlight,
}

impl<St: StoreState, S: Storage> Store<St, S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      state: RwLock::new(St::default()),
      writer: WriteQueue::spawn(storage.clone(), St::FILE_NAME),
      storage,
      inflight: InFlight::default(),
    }
  }

  pub fn file_name(&self) -> &'static str { St::FILE_NAME }

  /// Load the persisted state, or persist a fresh default if there is none.
  ///
  /// Errors are logged and swallowed; the store then starts from its default
  /// state.
  pub async fn initialize(&self) -> InitOutcome {
    let file = St::FILE_NAME;

    match self.storage.exists(file).await {
      Ok(false) => {
        let fresh = St::default();
        let outcome = match self.write_now(&fresh).await {
          Ok(()) => InitOutcome::Created,
          Err(error) => {
            tracing::warn!(file, error = %error, "failed to write initial store state");
            InitOutcome::Recovered
          }
        };
        *self.write_state() = fresh;
        outcome
      }
      Ok(true) => match self.load().await {
        Ok(state) => {
          *self.write_state() = state;
          tracing::debug!(file, "store loaded");
          InitOutcome::Loaded
        }
        Err(error) => {
          tracing::warn!(file, error = %error, "failed to load store; using default state");
          *self.write_state() = St::default();
          InitOutcome::Recovered
        }
      },
      Err(error) => {
        tracing::warn!(file, error = %error, "failed to probe store; using default state");
        *self.write_state() = St::default();
        InitOutcome::Recovered
      }
    }
  }

  async fn load(&self) -> Result<St> {
    let text = self.storage.read_text(St::FILE_NAME).await.map_err(backend)?;
    let mut state: St = serde_json::from_str(&text)?;
    let repairs = state.normalize();
    if repairs > 0 {
      tracing::warn!(file = St::FILE_NAME, repairs, "repaired persisted store state");
    }
    Ok(state)
  }

  async fn write_now(&self, state: &St) -> Result<()> {
    let text = serde_json::to_string(state)?;
    self.storage.write_text(St::FILE_NAME, &text).await.map_err(backend)?;
    Ok(())
  }

  /// Restore the default state and persist it.
  pub fn reset(&self) -> WriteTicket { self.update(|state| *state = St::default()).1 }

  /// Queue a write of the current state. Awaiting the ticket waits for every
  /// write queued before it.
  pub fn flush(&self) -> WriteTicket { self.update(|_| ()).1 }

  /// A clone of the whole state.
  pub fn snapshot(&self) -> St { self.read_state().clone() }

  /// Run `f` against the current state.
  pub fn read<R>(&self, f: impl FnOnce(&St) -> R) -> R { f(&*self.read_state()) }

  /// Mutate the state with `f` and queue a write of the result.
  pub fn update<R>(&self, f: impl FnOnce(&mut St) -> R) -> (R, WriteTicket) {
    let mut state = self.write_state();
    let out = f(&mut *state);
    // Enqueued under the lock so snapshots reach the queue in mutation order.
    let ticket = match serde_json::to_string(&*state) {
      Ok(text) => self.writer.enqueue(text),
      Err(error) => {
        tracing::warn!(file = St::FILE_NAME, error = %error, "failed to serialize store");
        WriteTicket::failed(St::FILE_NAME, error.to_string())
      }
    };
    (out, ticket)
  }

  /// Number of fetches currently in flight or queued behind one.
  pub fn fetches_in_flight(&self) -> usize { self.inflight.len() }

  fn read_state(&self) -> RwLockReadGuard<'_, St> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write_state(&self) -> RwLockWriteGuard<'_, St> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }
}

// ─── Keyed operations ────────────────────────────────────────────────────────

type EntityOf<St> = <St as EntityState>::Entity;
type IdOf<St> = <<St as EntityState>::Entity as Entity>::Id;

impl<St: EntityState, S: Storage> Store<St, S> {
  /// The cached record for `id`. Never touches the network.
  pub fn get(&self, id: IdOf<St>) -> Option<EntityOf<St>> {
    self.read(|state| state.entities().get(&id).cloned())
  }

  pub fn contains(&self, id: IdOf<St>) -> bool {
    self.read(|state| state.entities().contains_key(&id))
  }

  /// Every cached record, in id order.
  pub fn all(&self) -> Vec<EntityOf<St>> {
    self.read(|state| state.entities().values().cloned().collect())
  }

  /// Records for `ids`, in the order given, skipping ids not cached. An empty
  /// slice returns every record.
  pub fn by_ids(&self, ids: &[IdOf<St>]) -> Vec<EntityOf<St>> {
    if ids.is_empty() {
      return self.all();
    }
    self.read(|state| {
      ids
        .iter()
        .filter_map(|id| state.entities().get(id).cloned())
        .collect()
    })
  }

  pub fn len(&self) -> usize { self.read(|state| state.entities().len()) }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Insert `record`, or overwrite the existing record with the same id.
  pub fn upsert(&self, record: EntityOf<St>) -> WriteTicket {
    self
      .update(|state| {
        state.entities_mut().insert(record.id(), record);
      })
      .1
  }

  /// Replace the whole collection with `records`.
  pub fn replace_all(&self, records: impl IntoIterator<Item = EntityOf<St>>) -> WriteTicket {
    let collection: Collection<EntityOf<St>> =
      records.into_iter().map(|record| (record.id(), record)).collect();
    self.update(|state| *state.entities_mut() = collection).1
  }

  /// The cached record for `id`, or the result of `fetch(id)`.
  ///
  /// A fetched record is upserted before it is returned. Concurrent calls for
  /// the same id share one fetch: later callers wait for the first and then
  /// find the record in cache. A failed fetch is returned unchanged and the
  /// next waiter tries again.
  pub async fn get_or_fetch<F, Fut>(&self, id: IdOf<St>, fetch: F) -> Result<EntityOf<St>, ApiError>
  where
    F: FnOnce(IdOf<St>) -> Fut,
    Fut: Future<Output = Result<EntityOf<St>, ApiError>>,
  {
    if let Some(hit) = self.get(id) {
      return Ok(hit);
    }

    let _guard = self.inflight.acquire(id.to_string()).await;
    if let Some(hit) = self.get(id) {
      let kind = <EntityOf<St> as Entity>::KIND;
      tracing::trace!(%kind, %id, "served by an earlier fetch");
      return Ok(hit);
    }

    let record = fetch(id).await?;
    let _ = self.upsert(record.clone());
    Ok(record)
  }
}

#[cfg(test)]
mod tests {
  use serde::Deserialize;
  use touchbase_core::{id::PersonId, record::Person};

  use super::*;
  use crate::backend::MemoryStorage;

  #[derive(Debug, Clone, Default, Serialize, Deserialize)]
  struct People {
    #[serde(default)]
    people: Collection<Person>,
  }

  impl StoreState for People {
    const FILE_NAME: &'static str = "people.db";

    fn normalize(&mut self) -> usize { rekey(&mut self.people) }
  }

  impl EntityState for People {
    type Entity = Person;

    fn entities(&self) -> &Collection<Person> { &self.people }

    fn entities_mut(&mut self) -> &mut Collection<Person> { &mut self.people }
  }

  fn store(storage: &MemoryStorage) -> Store<People, MemoryStorage> {
    Store::new(Arc::new(storage.clone()))
  }

  #[tokio::test]
  async fn initialize_creates_default_blob() {
    let storage = MemoryStorage::new();
    let s = store(&storage);
    assert_eq!(s.initialize().await, InitOutcome::Created);
    assert_eq!(storage.peek("people.db").as_deref(), Some("{\"people\":{}}"));
  }

  #[tokio::test]
  async fn initialize_recovers_from_garbage() {
    let storage = MemoryStorage::new();
    storage.insert("people.db", "not json");
    let s = store(&storage);
    assert_eq!(s.initialize().await, InitOutcome::Recovered);
    assert!(s.is_empty());
  }

  #[tokio::test]
  async fn initialize_rekeys_mismatched_entries() {
    let storage = MemoryStorage::new();
    storage.insert(
      "people.db",
      r#"{"people":{"1":{"personId":2,"name":"Two"},"3":{"personId":3,"name":"Three"}}}"#,
    );
    let s = store(&storage);
    assert_eq!(s.initialize().await, InitOutcome::Loaded);
    assert!(s.get(PersonId(1)).is_none());
    assert_eq!(s.get(PersonId(2)).unwrap().name, "Two");
    assert_eq!(s.get(PersonId(3)).unwrap().name, "Three");
  }

  #[tokio::test]
  async fn load_errors_name_their_cause() {
    let storage = MemoryStorage::new();
    let s = store(&storage);
    assert!(matches!(s.load().await, Err(Error::Backend(_))));

    storage.insert("people.db", "{");
    assert!(matches!(s.load().await, Err(Error::Json(_))));
  }

  #[tokio::test]
  async fn rekey_keeps_correctly_keyed_record() {
    let storage = MemoryStorage::new();
    storage.insert(
      "people.db",
      r#"{"people":{"1":{"personId":2,"name":"Stray"},"2":{"personId":2,"name":"Right"}}}"#,
    );
    let s = store(&storage);
    assert_eq!(s.initialize().await, InitOutcome::Loaded);
    assert_eq!(s.len(), 1);
    assert!(s.get(PersonId(1)).is_none());
    assert_eq!(s.get(PersonId(2)).unwrap().name, "Right");
  }

  #[test]
  fn rekey_settles_strays_by_key_order() {
    let mut people: Collection<Person> = BTreeMap::new();
    people.insert(PersonId(1), Person::new(PersonId(5), "first"));
    people.insert(PersonId(3), Person::new(PersonId(5), "second"));
    people.insert(PersonId(5), Person::new(PersonId(7), "moved"));

    assert_eq!(rekey(&mut people), 3);
    assert_eq!(people.len(), 2);
    assert_eq!(people[&PersonId(5)].name, "first");
    assert_eq!(people[&PersonId(7)].name, "moved");
  }

  #[tokio::test]
  async fn by_ids_keeps_requested_order() {
    let storage = MemoryStorage::new();
    let s = store(&storage);
    s.replace_all([Person::new(PersonId(1), "a"), Person::new(PersonId(2), "b")])
      .await
      .unwrap();

    let names: Vec<_> = s
      .by_ids(&[PersonId(2), PersonId(9), PersonId(1)])
      .into_iter()
      .map(|p| p.name)
      .collect();
    assert_eq!(names, ["b", "a"]);
    assert_eq!(s.by_ids(&[]).len(), 2);
  }

  #[tokio::test]
  async fn reset_restores_default() {
    let storage = MemoryStorage::new();
    let s = store(&storage);
    s.upsert(Person::new(PersonId(1), "a")).await.unwrap();
    s.reset().await.unwrap();
    assert!(s.is_empty());
    assert_eq!(storage.peek("people.db").as_deref(), Some("{\"people\":{}}"));
  }
}
