//! Subcommand handlers. Each one works against the local cache and only
//! reaches the API for what the cache cannot answer.

use anyhow::{Context as _, anyhow};
use chrono::{DateTime, Utc};
use touchbase_core::{
  due::{DueClass, DueSpan},
  id::{CheckInId, GroupId, PersonId, UserId},
  remote::ApiError,
  storage::Storage,
};
use touchbase_store::{CacheContext, PendingReorder};

use crate::{Command, client::ApiClient, config::Settings};

/// Attach the user-facing text for a failed API call.
fn remote(error: ApiError) -> anyhow::Error {
  let message = error.user_message();
  anyhow::Error::new(error).context(message)
}

fn due_label(ts: Option<i64>, now: DateTime<Utc>) -> (String, DueClass) {
  match ts {
    Some(ts) => {
      let span = DueSpan::between(ts, now, false);
      (span.to_string(), span.class())
    }
    None => ("-".to_owned(), DueClass::NotDue),
  }
}

pub async fn run<S: Storage>(
  ctx: &CacheContext<S>,
  api: &ApiClient,
  settings: &Settings,
  command: Command,
) -> anyhow::Result<()> {
  let report = ctx.initialize().await;
  tracing::debug!(?report, "cache ready");

  if let Some(id) = settings.user_id
    && ctx.user().user_id() != Some(id)
  {
    let _ = ctx.user().set_user_id(id);
  }
  let now = Utc::now();

  match command {
    Command::Sync => {
      let user = signed_in(ctx)?;
      let count = ctx.sync_check_ins(api, user).await.map_err(remote)?;
      println!("{count} check-ins, {} unread", ctx.check_ins().unread_count_for(user, now));
    }

    Command::Contacts => {
      for (person, class) in ctx.contacts().due_list(now) {
        let (label, _) = due_label(person.due_at(), now);
        println!("{:>6}  {:<28} {:<16} {class}", person.person_id.get(), person.name, label);
      }
    }

    Command::Groups => {
      for (group, class) in ctx.groups().due_list(now) {
        let (label, _) = due_label(group.due_at(), now);
        println!("{:>6}  {:<28} {:<16} {class}", group.group_id.get(), group.group_name, label);
      }
    }

    Command::Contact { id } => {
      let user = signed_in(ctx)?;
      let person = ctx.get_contact(api, user, PersonId(id)).await.map_err(remote)?;
      let (due, class) = due_label(person.due_at(), now);
      let (last, _) = due_label(person.last_check_in_at(), now);

      println!("{}", person.name);
      if let Some(email) = &person.email {
        println!("  email      {email}");
      }
      if let (Some(dial), Some(phone)) = (&person.dial_code, &person.phone) {
        println!("  phone      {dial} {phone}");
      }
      if let Some(frequency) = person.frequency {
        println!("  frequency  {frequency}");
      }
      println!("  due        {due} ({class})");
      println!("  last       {last}");
      let groups = ctx.groups().resolve_person_groups(person.person_id);
      if !groups.is_empty() {
        let names: Vec<_> = groups.iter().map(|g| g.group_name.as_str()).collect();
        println!("  groups     {}", names.join(", "));
      }
    }

    Command::Group { id } => {
      let user = signed_in(ctx)?;
      let group = ctx.get_group(api, user, GroupId(id)).await.map_err(remote)?;
      let (due, class) = due_label(group.due_at(), now);

      println!("{}", group.group_name);
      println!("  due        {due} ({class})");
      for person in ctx.groups().resolve_group_persons(group.group_id, ctx.contacts()) {
        println!("  - {:<28} {}", person.name, person.person_id);
      }
    }

    Command::Unread => {
      let user = signed_in(ctx)?;
      let lines = unread_lines(ctx, user, now);
      for line in &lines {
        println!("{line}");
      }
      println!("{} unread", lines.len());
    }

    Command::CheckIn { person, text } => {
      let user = signed_in(ctx)?;
      let pending = ctx
        .check_in_with_person(api, user, PersonId(person), text)
        .await
        .map_err(remote)?;
      finish(pending).await?;
    }

    Command::CheckInGroup { group, text } => {
      let user = signed_in(ctx)?;
      let pending = ctx
        .check_in_with_group(api, user, GroupId(group), text)
        .await
        .map_err(remote)?;
      finish(pending).await?;
    }

    Command::Reply { check_in, text } => {
      let user = signed_in(ctx)?;
      let updated = ctx.reply(api, user, CheckInId(check_in), text).await.map_err(remote)?;
      println!("replied to {}", updated.check_in_id);
    }

    Command::Reset => {
      ctx.reset().await.context("failed to clear the cache")?;
      println!("cache cleared");
      return Ok(());
    }
  }

  ctx.flush().await.context("failed to save the cache")?;
  Ok(())
}

fn signed_in<S: Storage>(ctx: &CacheContext<S>) -> anyhow::Result<UserId> {
  ctx
    .user()
    .user_id()
    .ok_or_else(|| anyhow!("no user id; pass --user-id or set TOUCHBASE_USER_ID"))
}

/// One line per unread message in the user's incoming threads, replies
/// included.
fn unread_lines<S: Storage>(ctx: &CacheContext<S>, user: UserId, now: DateTime<Utc>) -> Vec<String> {
  ctx
    .check_ins()
    .unread_for(user, now)
    .iter()
    .map(|check_in| {
      let from = check_in
        .from
        .and_then(|p| p.person_id())
        .and_then(|p| ctx.contacts().person_name(p))
        .unwrap_or_else(|| "someone".to_owned());
      let (when, _) = due_label(Some(check_in.time), now);
      format!("{:>6}  {from:<20} {when:<14} {}", check_in.check_in_id.get(), check_in.text)
    })
    .collect()
}

/// Report the sent check-ins, then apply the schedule changes.
async fn finish<S: Storage>(pending: PendingReorder<'_, S>) -> anyhow::Result<()> {
  for check_in in pending.check_ins() {
    let to = check_in.to.and_then(|p| p.person_id());
    match to {
      Some(person) => println!("sent {} to {person}", check_in.check_in_id),
      None => println!("sent {}", check_in.check_in_id),
    }
  }
  for ticket in pending.commit() {
    ticket.await.context("failed to save the new schedule")?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::TimeZone;
  use touchbase_core::record::{CheckIn, Party, Person};
  use touchbase_store::backend::MemoryStorage;

  use super::*;

  #[tokio::test]
  async fn unread_listing_matches_unread_count() {
    let ctx = CacheContext::new(Arc::new(MemoryStorage::new()));
    ctx.initialize().await;
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let user = UserId(9);

    ctx.contacts().upsert(Person::new(PersonId(4), "Ada")).await.unwrap();
    let mut root = CheckIn::new(CheckInId(1), "hello", now.timestamp());
    root.to = Some(Party::User { user_id: user });
    root.read = Some(now.timestamp());
    root.reply1 = Some(CheckInId(2));
    let mut reply = CheckIn::new(CheckInId(2), "still there?", now.timestamp());
    reply.from = Some(Party::Person { person_id: PersonId(4) });
    ctx.check_ins().replace_all([root, reply]).await.unwrap();

    let lines = unread_lines(&ctx, user, now);
    assert_eq!(lines.len(), ctx.check_ins().unread_count_for(user, now));
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Ada"));
    assert!(lines[0].contains("still there?"));
  }
}
