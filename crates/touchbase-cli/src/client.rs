//! Async HTTP client for the touchbase JSON API.
//!
//! Every endpoint is a `POST {base}/{endpoint}` with a JSON body carrying the
//! caller's `userId`. Failures are mapped onto [`ApiError`] kinds by status
//! code; a request that never got a response is [`ApiErrorKind::NoResponse`].

use std::{collections::BTreeMap, time::Duration};

use anyhow::Context as _;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use touchbase_core::{
  id::{CheckInId, GroupId, PersonId, UserId},
  record::{CheckIn, Group, GroupCheckInReceipt, Person, PersonCheckInReceipt},
  remote::{ApiError, ApiErrorKind, CheckInApi, GroupApi, PersonApi},
};

/// Connection settings for the API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url:     String,
  pub access_token: Option<String>,
  pub timeout:      Duration,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

/// Error body shape: `{ "error" | "message": .., "reason": .. }`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
  error:   Option<String>,
  message: Option<String>,
  reason:  Option<String>,
}

/// Map an unsuccessful status code to its error kind.
pub fn kind_for_status(status: StatusCode) -> ApiErrorKind {
  match status.as_u16() {
    400 | 404 | 409 => ApiErrorKind::BadRequest,
    401 | 403 => ApiErrorKind::Authentication,
    405 => ApiErrorKind::BadMethod,
    415 => ApiErrorKind::UnsupportedMedia,
    _ => ApiErrorKind::InternalServer,
  }
}

/// Build the error for a failed response from its status and raw body.
pub fn error_from_response(status: StatusCode, body: &str) -> ApiError {
  let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
  let message = parsed
    .error
    .or(parsed.message)
    .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());

  let error = ApiError::new(kind_for_status(status), message);
  match parsed.reason {
    Some(reason) => error.with_reason(reason),
    None => error,
  }
}

// ── Response envelopes ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PersonEnvelope {
  person: Person,
}

#[derive(Deserialize)]
struct GroupEnvelope {
  group: Group,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckInEnvelope {
  check_in: CheckIn,
}

/// `checkIns` arrives either as a list or as an object keyed by id.
#[derive(Deserialize)]
#[serde(untagged)]
enum CheckInList {
  List(Vec<CheckIn>),
  Keyed(BTreeMap<String, CheckIn>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckInListEnvelope {
  #[serde(default)]
  check_ins: Option<CheckInList>,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, endpoint: &str) -> String {
    format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
  }

  async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let mut req = self.client.post(self.url(endpoint)).json(body);
    if let Some(token) = &self.config.access_token {
      req = req.bearer_auth(token);
    }

    let resp = req
      .send()
      .await
      .map_err(|e| ApiError::no_response(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      let error = error_from_response(status, &body);
      tracing::debug!(endpoint, %status, error = %error, "request failed");
      return Err(error);
    }

    resp.json().await.map_err(|e| {
      ApiError::new(ApiErrorKind::InternalServer, format!("malformed response from {endpoint}: {e}"))
    })
  }
}

impl PersonApi for ApiClient {
  async fn get_person(&self, user: UserId, person: PersonId) -> Result<Person, ApiError> {
    let env: PersonEnvelope = self
      .post("person/get", &json!({ "userId": user, "personId": person }))
      .await?;
    Ok(env.person)
  }
}

impl GroupApi for ApiClient {
  async fn get_group(&self, user: UserId, group: GroupId) -> Result<Group, ApiError> {
    let env: GroupEnvelope = self
      .post("group/get", &json!({ "userId": user, "groupId": group }))
      .await?;
    Ok(env.group)
  }
}

impl CheckInApi for ApiClient {
  async fn list_check_ins(&self, user: UserId) -> Result<Vec<CheckIn>, ApiError> {
    let env: CheckInListEnvelope = self.post("checkin/list", &json!({ "userId": user })).await?;
    Ok(match env.check_ins {
      Some(CheckInList::List(list)) => list,
      Some(CheckInList::Keyed(map)) => map.into_values().collect(),
      None => Vec::new(),
    })
  }

  async fn check_in_with_person(
    &self,
    user: UserId,
    person: PersonId,
    text: String,
  ) -> Result<PersonCheckInReceipt, ApiError> {
    self
      .post("checkin/person", &json!({ "userId": user, "personId": person, "text": text }))
      .await
  }

  async fn check_in_with_group(
    &self,
    user: UserId,
    group: GroupId,
    text: String,
  ) -> Result<GroupCheckInReceipt, ApiError> {
    self
      .post("checkin/group", &json!({ "userId": user, "groupId": group, "text": text }))
      .await
  }

  async fn reply(&self, user: UserId, check_in: CheckInId, text: String) -> Result<CheckIn, ApiError> {
    let env: CheckInEnvelope = self
      .post("checkin/reply", &json!({ "userId": user, "checkInId": check_in, "reply": text }))
      .await?;
    Ok(env.check_in)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_codes_map_to_kinds() {
    let cases = [
      (400, ApiErrorKind::BadRequest),
      (404, ApiErrorKind::BadRequest),
      (409, ApiErrorKind::BadRequest),
      (401, ApiErrorKind::Authentication),
      (403, ApiErrorKind::Authentication),
      (405, ApiErrorKind::BadMethod),
      (415, ApiErrorKind::UnsupportedMedia),
      (500, ApiErrorKind::InternalServer),
      (503, ApiErrorKind::InternalServer),
      (418, ApiErrorKind::InternalServer),
    ];
    for (code, kind) in cases {
      assert_eq!(kind_for_status(StatusCode::from_u16(code).unwrap()), kind, "{code}");
    }
  }

  #[test]
  fn error_body_supplies_message_and_reason() {
    let e = error_from_response(
      StatusCode::BAD_REQUEST,
      r#"{"error":"Person already exists","reason":"EXISTS"}"#,
    );
    assert_eq!(e.kind, ApiErrorKind::BadRequest);
    assert_eq!(e.message, "Person already exists");
    assert_eq!(e.reason, "EXISTS");

    let e = error_from_response(StatusCode::UNAUTHORIZED, r#"{"message":"token expired"}"#);
    assert_eq!(e.message, "token expired");
    assert_eq!(e.reason, "AUTHENTICATION");
  }

  #[test]
  fn unparseable_body_falls_back_to_status_text() {
    let e = error_from_response(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
    assert_eq!(e.message, "Internal Server Error");
    assert_eq!(e.reason, "INTERNAL_SERVER");
  }

  #[test]
  fn check_in_list_accepts_both_shapes() {
    let list: CheckInListEnvelope =
      serde_json::from_str(r#"{"checkIns":[{"checkInId":1,"text":"a","time":1}]}"#).unwrap();
    assert!(matches!(list.check_ins, Some(CheckInList::List(ref v)) if v.len() == 1));

    let keyed: CheckInListEnvelope =
      serde_json::from_str(r#"{"checkIns":{"1":{"checkInId":"1","text":"a","time":1}}}"#).unwrap();
    assert!(matches!(keyed.check_ins, Some(CheckInList::Keyed(ref m)) if m.len() == 1));
  }

  #[tokio::test]
  async fn unreachable_server_is_no_response() {
    let client = ApiClient::new(ApiConfig {
      base_url:     "http://127.0.0.1:9".into(),
      access_token: None,
      timeout:      Duration::from_secs(2),
    })
    .unwrap();
    let err = client.get_person(UserId(1), PersonId(1)).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::NoResponse);
  }
}
