//! The remote fetch contract and its closed set of error kinds.
//!
//! The cache consumes these traits; the HTTP client in `touchbase-cli`
//! implements them. The cache never interprets an [`ApiError`]; it hands it
//! back to the caller untouched.

use std::future::Future;

use thiserror::Error;

use crate::{
  id::{CheckInId, GroupId, PersonId, UserId},
  record::{CheckIn, Group, GroupCheckInReceipt, Person, PersonCheckInReceipt},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// The category of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ApiErrorKind {
  BadRequest,
  Authentication,
  InternalServer,
  UnsupportedMedia,
  BadMethod,
  NoResponse,
}

impl ApiErrorKind {
  /// Default `reason` code when the response body supplies none.
  pub fn default_reason(self) -> &'static str {
    match self {
      Self::BadRequest => "BAD_REQUEST",
      Self::Authentication => "AUTHENTICATION",
      Self::InternalServer => "INTERNAL_SERVER",
      Self::UnsupportedMedia => "UNSUPPORTED_MEDIA",
      Self::BadMethod => "BAD_METHOD",
      Self::NoResponse => "NO_RESPONSE",
    }
  }
}

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({reason}): {message}")]
pub struct ApiError {
  pub kind:    ApiErrorKind,
  /// Message from the response body, or from the transport failure.
  pub message: String,
  /// Machine-readable reason code.
  pub reason:  String,
}

impl ApiError {
  pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      reason: kind.default_reason().to_owned(),
    }
  }

  pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
    self.reason = reason.into();
    self
  }

  pub fn no_response(message: impl Into<String>) -> Self {
    Self::new(ApiErrorKind::NoResponse, message)
  }

  /// Text suitable for showing to the user, selected by kind.
  pub fn user_message(&self) -> &'static str {
    match self.kind {
      ApiErrorKind::BadRequest => "The request could not be completed. Please check your details and try again.",
      ApiErrorKind::Authentication => "Your session is no longer valid. Please sign in again.",
      ApiErrorKind::InternalServer => "Something went wrong on our side. Please try again later.",
      ApiErrorKind::UnsupportedMedia => "The app sent data the server could not understand. Please update the app.",
      ApiErrorKind::BadMethod => "The app made a request the server does not support. Please update the app.",
      ApiErrorKind::NoResponse => "Could not reach the server. Please check your connection.",
    }
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Remote lookups for contacts. `user` is the auth context of the caller.
pub trait PersonApi: Send + Sync {
  fn get_person(
    &self,
    user: UserId,
    person: PersonId,
  ) -> impl Future<Output = Result<Person, ApiError>> + Send + '_;
}

/// Remote lookups for groups.
pub trait GroupApi: Send + Sync {
  fn get_group(
    &self,
    user: UserId,
    group: GroupId,
  ) -> impl Future<Output = Result<Group, ApiError>> + Send + '_;
}

/// Remote check-in operations.
pub trait CheckInApi: Send + Sync {
  /// Every check-in visible to `user`.
  fn list_check_ins(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Vec<CheckIn>, ApiError>> + Send + '_;

  /// Send a check-in to one contact.
  fn check_in_with_person(
    &self,
    user: UserId,
    person: PersonId,
    text: String,
  ) -> impl Future<Output = Result<PersonCheckInReceipt, ApiError>> + Send + '_;

  /// Send a check-in to every member of a group.
  fn check_in_with_group(
    &self,
    user: UserId,
    group: GroupId,
    text: String,
  ) -> impl Future<Output = Result<GroupCheckInReceipt, ApiError>> + Send + '_;

  /// Reply to a check-in; returns the updated original check-in.
  fn reply(
    &self,
    user: UserId,
    check_in: CheckInId,
    text: String,
  ) -> impl Future<Output = Result<CheckIn, ApiError>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_includes_kind_and_reason() {
    let e = ApiError::new(ApiErrorKind::BadRequest, "missing personId");
    assert_eq!(e.to_string(), "bad-request (BAD_REQUEST): missing personId");

    let e = e.with_reason("INVALID_PERSON");
    assert_eq!(e.reason, "INVALID_PERSON");
  }

  #[test]
  fn user_message_depends_only_on_kind() {
    let a = ApiError::no_response("timeout");
    let b = ApiError::no_response("connection refused");
    assert_eq!(a.user_message(), b.user_message());
    assert_ne!(
      a.user_message(),
      ApiError::new(ApiErrorKind::Authentication, "").user_message()
    );
  }
}
