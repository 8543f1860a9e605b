use std::{panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::{
  dlq::{DeadLetter, DeadLetterQueue, is_power_of_ten},
  next_delivery,
};
use crate::{
  bus::Subscription,
  capability::NotificationTemplate,
  config::NotificationsConfig,
  domain::TaskEvent,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
  #[error("Delivery failed: {0}")]
  Delivery(String),
}

/// Template sent to admins when dead letters pile up.
pub const DEAD_LETTER_ALERT_TEMPLATE: &str = "adminNotificationDeadLetters";

/// Who a notice is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
  Admin { email: String },
  /// Everyone whose subscription matches one of the patterns, except the
  /// acting user
  Subscribers { patterns: Vec<String> },
  User { user_id: i32 },
  /// The user who performed the action
  Actor { user_id: i32 },
}

/// A rendered-later message about one event for one audience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
  pub audience: Audience,
  pub template: NotificationTemplate,
  pub task: String,
  pub event_id: Uuid,
  pub path: String,
  /// Acting user, 0 when anonymous
  #[serde(default)]
  pub actor_id: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub actor: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub link_url: Option<String>,
}

impl Notice {
  fn for_event(event: &TaskEvent, audience: Audience, template: NotificationTemplate) -> Self {
    Self {
      audience,
      template,
      task: event.task_name().to_string(),
      event_id: event.id,
      path: event.path.clone(),
      actor_id: event.user_id,
      actor: event.data.actor.clone(),
      link_url: event.data.link_url.clone(),
    }
  }

  /// Whether the delivery layer should leave `user_id` out when it expands
  /// this notice's audience. Subscribers never hear about their own actions.
  pub fn excludes(&self, user_id: i32) -> bool {
    matches!(self.audience, Audience::Subscribers { .. }) && self.actor_id != 0 && self.actor_id == user_id
  }
}

/// Hands a notice to whatever actually sends it (mail queue, inbox, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn deliver(&self, notice: Notice) -> Result<(), NotifyError>;
}

/// Notifier that only logs. Used when no transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
  async fn deliver(&self, notice: Notice) -> Result<(), NotifyError> {
    info!(
      task = %notice.task,
      event_id = %notice.event_id,
      template = %notice.template.email,
      audience = ?notice.audience,
      "Notice"
    );
    Ok(())
  }
}

/// Subscription patterns matching a task at `path`, most specific first.
///
/// `reply` at `/blog/a/b` gives `reply:/blog/a/b`, `reply:/blog/a/*`,
/// `reply:/blog/*` and `reply:/*`.
pub fn subscription_patterns(task_name: &str, path: &str) -> Vec<String> {
  let name = task_name.to_lowercase();
  let path = path.trim_matches('/');
  if path.is_empty() {
    return vec![format!("{name}:/*")];
  }

  let parts: Vec<&str> = path.split('/').collect();
  let mut patterns = vec![format!("{name}:/{path}")];
  for i in (1..parts.len()).rev() {
    patterns.push(format!("{name}:/{}/*", parts[..i].join("/")));
  }
  patterns.push(format!("{name}:/*"));
  patterns
}

/// Every notice one event produces under `config`.
pub fn build_notices(event: &TaskEvent, config: &NotificationsConfig) -> Vec<Notice> {
  let mut notices = Vec::new();
  if !event.outcome.is_success() {
    return notices;
  }

  if config.admin_enabled
    && let Some(capability) = event.task.admin_notifications()
    && let Some(template) = capability.admin_template(event)
  {
    for email in &config.admin_emails {
      notices.push(Notice::for_event(
        event,
        Audience::Admin { email: email.clone() },
        template.clone(),
      ));
    }
  }

  if event.user_id != 0
    && let Some(capability) = event.task.self_notifications()
    && let Some(template) = capability.self_template(event)
  {
    notices.push(Notice::for_event(
      event,
      Audience::Actor { user_id: event.user_id },
      template,
    ));
  }

  if let Some(capability) = event.task.subscriber_notifications()
    && let Some(template) = capability.subscriber_template(event)
  {
    let patterns = subscription_patterns(event.task_name(), &event.path);
    notices.push(Notice::for_event(event, Audience::Subscribers { patterns }, template));
  }

  if let Some(capability) = event.task.targeted_notifications()
    && let Some(template) = capability.target_template(event)
  {
    for user_id in capability.target_user_ids(event) {
      notices.push(Notice::for_event(event, Audience::User { user_id }, template.clone()));
    }
  }

  notices
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifyStats {
  pub events: u64,
  pub delivered: u64,
  pub failed: u64,
  pub panics: u64,
}

/// Turns task events into notices for every notification capability the
/// task exposes. Notices that fail go to the dead-letter queue when one is
/// attached.
pub struct NotificationWorker {
  notifier: Arc<dyn Notifier>,
  config: NotificationsConfig,
  dead_letters: Option<Arc<dyn DeadLetterQueue>>,
}

impl NotificationWorker {
  pub fn new(notifier: Arc<dyn Notifier>, config: NotificationsConfig) -> Self {
    Self {
      notifier,
      config,
      dead_letters: None,
    }
  }

  pub fn with_dead_letters(mut self, queue: Arc<dyn DeadLetterQueue>) -> Self {
    self.dead_letters = Some(queue);
    self
  }

  pub async fn run(self, mut subscription: Subscription, cancel: CancellationToken) -> NotifyStats {
    info!(subscriber = subscription.id(), "Notification worker started");
    let mut stats = NotifyStats::default();

    while let Some(delivery) = next_delivery("notify", &mut subscription, &cancel).await {
      let Some(event) = delivery.as_task() else {
        continue;
      };
      stats.events += 1;

      match AssertUnwindSafe(self.handle_event(event)).catch_unwind().await {
        Ok((delivered, failed)) => {
          stats.delivered += delivered;
          stats.failed += failed;
        }
        Err(_) => {
          stats.panics += 1;
          error!(event_id = %event.id, task = %event.task_name(), "Notification handling panicked, skipping event");
        }
      }
    }

    info!(
      events = stats.events,
      delivered = stats.delivered,
      failed = stats.failed,
      "Notification worker stopped"
    );
    stats
  }

  /// Deliver every notice for `event`. Returns (delivered, failed).
  pub async fn handle_event(&self, event: &TaskEvent) -> (u64, u64) {
    let notices = build_notices(event, &self.config);
    if notices.is_empty() {
      trace!(event_id = %event.id, task = %event.task_name(), "No notices for event");
      return (0, 0);
    }

    let (mut delivered, mut failed) = (0, 0);
    for notice in notices {
      match self.notifier.deliver(notice.clone()).await {
        Ok(()) => delivered += 1,
        Err(e) => {
          failed += 1;
          error!(event_id = %event.id, task = %event.task_name(), error = %e, "Failed to deliver notice");
          self.dead_letter(notice, &e).await;
        }
      }
    }
    debug!(event_id = %event.id, delivered, failed, "Notices sent");
    (delivered, failed)
  }

  /// Record a failed notice and alert admins at 1, 10, 100, ... letters.
  /// Alert failures are only logged.
  async fn dead_letter(&self, notice: Notice, error: &NotifyError) {
    let Some(queue) = &self.dead_letters else {
      return;
    };

    let letter = DeadLetter::new(notice, error);
    let total = match queue.record(&letter).await {
      Ok(total) => total,
      Err(e) => {
        error!(event_id = %letter.notice.event_id, error = %e, "Failed to record dead letter");
        return;
      }
    };

    if !self.config.admin_enabled || !is_power_of_ten(total) {
      return;
    }
    warn!(total, "Dead letters accumulating, alerting admins");
    for email in &self.config.admin_emails {
      let alert = Notice {
        audience: Audience::Admin { email: email.clone() },
        template: NotificationTemplate::email(DEAD_LETTER_ALERT_TEMPLATE),
        link_url: None,
        ..letter.notice.clone()
      };
      if let Err(e) = self.notifier.deliver(alert).await {
        error!(email = %email, error = %e, "Failed to alert admin about dead letters");
      }
    }
  }
}
