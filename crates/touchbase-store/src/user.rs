//! The User store: the signed-in user's identity.

use serde::{Deserialize, Serialize};
use touchbase_core::{
  id::UserId,
  record::{Extra, User},
  storage::Storage,
};

use crate::{
  engine::{Store, StoreState},
  writer::WriteTicket,
};

/// Signed-out until `user_id` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
  #[serde(default)]
  pub user_id: Option<UserId>,
  #[serde(default)]
  pub name:    String,
  #[serde(flatten)]
  pub extra:   Extra,
}

impl StoreState for UserState {
  const FILE_NAME: &'static str = "localstorage_user.db";
}

pub type UserStore<S> = Store<UserState, S>;

impl<S: Storage> Store<UserState, S> {
  /// The signed-in user, if any.
  pub fn user(&self) -> Option<User> {
    self.read(|state| {
      state.user_id.map(|user_id| User {
        user_id,
        name: state.name.clone(),
        extra: state.extra.clone(),
      })
    })
  }

  pub fn user_id(&self) -> Option<UserId> { self.read(|state| state.user_id) }

  pub fn name(&self) -> String { self.read(|state| state.name.clone()) }

  /// Replace the whole user record.
  pub fn set_user(&self, user: User) -> WriteTicket {
    self
      .update(|state| {
        *state = UserState { user_id: Some(user.user_id), name: user.name, extra: user.extra };
      })
      .1
  }

  pub fn set_user_id(&self, user_id: UserId) -> WriteTicket {
    self.update(|state| state.user_id = Some(user_id)).1
  }

  pub fn set_name(&self, name: impl Into<String>) -> WriteTicket {
    let name = name.into();
    self.update(|state| state.name = name).1
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::backend::MemoryStorage;

  #[tokio::test]
  async fn signed_out_by_default() {
    let storage = Arc::new(MemoryStorage::new());
    let store = UserStore::new(storage.clone());
    store.initialize().await;
    assert_eq!(store.user(), None);
    assert_eq!(
      storage.peek("localstorage_user.db").as_deref(),
      Some("{\"userId\":null,\"name\":\"\"}")
    );
  }

  #[tokio::test]
  async fn setters_compose() {
    let store = UserStore::new(Arc::new(MemoryStorage::new()));
    store.set_user_id(UserId(9)).await.unwrap();
    store.set_name("Dan").await.unwrap();

    let user = store.user().unwrap();
    assert_eq!(user.user_id, UserId(9));
    assert_eq!(user.name, "Dan");

    store.reset().await.unwrap();
    assert_eq!(store.user_id(), None);
    assert_eq!(store.name(), "");
  }
}
