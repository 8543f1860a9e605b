//! Task kinds shipped with the pipeline.
//!
//! Each type declares its capabilities by overriding the matching accessors
//! on [`Task`]; everything it does not override stays absent.

use std::sync::Arc;

use super::{
  AdminNotifications, IndexedTask, NotificationTemplate, SelfNotifications, SubscriberNotifications,
  TargetedNotifications, Task,
};
use crate::domain::{EntityType, TaskEvent};

pub const LINKER_APPROVE: &str = "linker.approve";
pub const LINKER_BULK_APPROVE: &str = "linker.bulk-approve";
pub const LINKER_REPLY: &str = "linker.reply";
pub const LINKER_DELETE: &str = "linker.delete";
pub const FORUM_REPLY: &str = "forum.reply";
pub const FORUM_CREATE_THREAD: &str = "forum.create-thread";
pub const WRITING_SUBMIT: &str = "writing.submit";
pub const WRITING_UPDATE: &str = "writing.update";
pub const IMAGEBBS_POST: &str = "imagebbs.post";
pub const ADMIN_ROLE_GRANT: &str = "admin.role-grant";
pub const FAQ_ANSWER: &str = "faq.answer";
pub const USER_TEST_MAIL: &str = "user.test-mail";

/// One instance of every catalog task.
pub fn all() -> Vec<Arc<dyn Task>> {
  vec![
    Arc::new(LinkerApproveTask),
    Arc::new(LinkerBulkApproveTask),
    Arc::new(LinkerReplyTask),
    Arc::new(LinkerDeleteTask),
    Arc::new(ForumReplyTask),
    Arc::new(ForumCreateThreadTask),
    Arc::new(WritingSubmitTask),
    Arc::new(WritingUpdateTask),
    Arc::new(ImageBbsPostTask),
    Arc::new(RoleGrantTask),
    Arc::new(FaqAnswerTask),
    Arc::new(UserTestMailTask),
  ]
}

// ============================================================================
// Linker
// ============================================================================

/// A moderator approved one queued link.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkerApproveTask;

impl Task for LinkerApproveTask {
  fn name(&self) -> &str {
    LINKER_APPROVE
  }

  fn indexing(&self) -> Option<&dyn IndexedTask> {
    Some(self)
  }

  fn subscriber_notifications(&self) -> Option<&dyn SubscriberNotifications> {
    Some(self)
  }

  fn admin_notifications(&self) -> Option<&dyn AdminNotifications> {
    Some(self)
  }
}

impl IndexedTask for LinkerApproveTask {
  fn index_type(&self) -> EntityType {
    EntityType::LinkerItem
  }
}

impl SubscriberNotifications for LinkerApproveTask {
  fn subscriber_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("linkerApproved").with_internal("linkerApproved"))
  }
}

impl AdminNotifications for LinkerApproveTask {
  fn admin_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("adminNotificationLinkerApproved"))
  }
}

/// A moderator approved several queued links in one request. The event
/// carries a bulk index payload, one instruction per link.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkerBulkApproveTask;

impl Task for LinkerBulkApproveTask {
  fn name(&self) -> &str {
    LINKER_BULK_APPROVE
  }

  fn indexing(&self) -> Option<&dyn IndexedTask> {
    Some(self)
  }

  fn subscriber_notifications(&self) -> Option<&dyn SubscriberNotifications> {
    Some(self)
  }

  fn admin_notifications(&self) -> Option<&dyn AdminNotifications> {
    Some(self)
  }
}

impl IndexedTask for LinkerBulkApproveTask {
  fn index_type(&self) -> EntityType {
    EntityType::LinkerItem
  }
}

impl SubscriberNotifications for LinkerBulkApproveTask {
  fn subscriber_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("linkerApproved").with_internal("linkerApproved"))
  }
}

impl AdminNotifications for LinkerBulkApproveTask {
  fn admin_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("adminNotificationLinkerApproved"))
  }
}

/// A comment on a link.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkerReplyTask;

impl Task for LinkerReplyTask {
  fn name(&self) -> &str {
    LINKER_REPLY
  }

  fn indexing(&self) -> Option<&dyn IndexedTask> {
    Some(self)
  }

  fn subscriber_notifications(&self) -> Option<&dyn SubscriberNotifications> {
    Some(self)
  }
}

impl IndexedTask for LinkerReplyTask {
  fn index_type(&self) -> EntityType {
    EntityType::Comment
  }
}

impl SubscriberNotifications for LinkerReplyTask {
  fn subscriber_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("replyEmail").with_internal("reply"))
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LinkerDeleteTask;

impl Task for LinkerDeleteTask {
  fn name(&self) -> &str {
    LINKER_DELETE
  }
}

// ============================================================================
// Forum
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct ForumReplyTask;

impl Task for ForumReplyTask {
  fn name(&self) -> &str {
    FORUM_REPLY
  }

  fn indexing(&self) -> Option<&dyn IndexedTask> {
    Some(self)
  }

  fn subscriber_notifications(&self) -> Option<&dyn SubscriberNotifications> {
    Some(self)
  }
}

impl IndexedTask for ForumReplyTask {
  fn index_type(&self) -> EntityType {
    EntityType::Comment
  }
}

impl SubscriberNotifications for ForumReplyTask {
  fn subscriber_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("replyEmail").with_internal("reply"))
  }
}

/// Opening a thread also posts its first comment, which is what gets indexed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForumCreateThreadTask;

impl Task for ForumCreateThreadTask {
  fn name(&self) -> &str {
    FORUM_CREATE_THREAD
  }

  fn indexing(&self) -> Option<&dyn IndexedTask> {
    Some(self)
  }

  fn subscriber_notifications(&self) -> Option<&dyn SubscriberNotifications> {
    Some(self)
  }

  fn admin_notifications(&self) -> Option<&dyn AdminNotifications> {
    Some(self)
  }
}

impl IndexedTask for ForumCreateThreadTask {
  fn index_type(&self) -> EntityType {
    EntityType::Comment
  }
}

impl SubscriberNotifications for ForumCreateThreadTask {
  fn subscriber_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("threadEmail").with_internal("thread"))
  }
}

impl AdminNotifications for ForumCreateThreadTask {
  fn admin_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("adminNotificationForumThreadCreate"))
  }
}

// ============================================================================
// Writings
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct WritingSubmitTask;

impl Task for WritingSubmitTask {
  fn name(&self) -> &str {
    WRITING_SUBMIT
  }

  fn indexing(&self) -> Option<&dyn IndexedTask> {
    Some(self)
  }

  fn subscriber_notifications(&self) -> Option<&dyn SubscriberNotifications> {
    Some(self)
  }
}

impl IndexedTask for WritingSubmitTask {
  fn index_type(&self) -> EntityType {
    EntityType::Writing
  }
}

impl SubscriberNotifications for WritingSubmitTask {
  fn subscriber_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("writingEmail").with_internal("writing"))
  }
}

/// Edits re-index the writing. Subscribers only hear about edits that
/// changed the published text, flagged by the handler in `extra`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WritingUpdateTask;

impl Task for WritingUpdateTask {
  fn name(&self) -> &str {
    WRITING_UPDATE
  }

  fn indexing(&self) -> Option<&dyn IndexedTask> {
    Some(self)
  }

  fn subscriber_notifications(&self) -> Option<&dyn SubscriberNotifications> {
    Some(self)
  }
}

impl IndexedTask for WritingUpdateTask {
  fn index_type(&self) -> EntityType {
    EntityType::Writing
  }
}

impl SubscriberNotifications for WritingUpdateTask {
  fn subscriber_template(&self, event: &TaskEvent) -> Option<NotificationTemplate> {
    let published = event
      .data
      .extra
      .get("published")
      .and_then(|v| v.as_bool())
      .unwrap_or(true);
    published.then(|| NotificationTemplate::email("writingUpdateEmail").with_internal("writingUpdate"))
  }
}

// ============================================================================
// Image board
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageBbsPostTask;

impl Task for ImageBbsPostTask {
  fn name(&self) -> &str {
    IMAGEBBS_POST
  }

  fn indexing(&self) -> Option<&dyn IndexedTask> {
    Some(self)
  }
}

impl IndexedTask for ImageBbsPostTask {
  fn index_type(&self) -> EntityType {
    EntityType::ImagePost
  }
}

// ============================================================================
// Admin
// ============================================================================

/// A role was granted to one or more users; each of them is told directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleGrantTask;

impl Task for RoleGrantTask {
  fn name(&self) -> &str {
    ADMIN_ROLE_GRANT
  }

  fn targeted_notifications(&self) -> Option<&dyn TargetedNotifications> {
    Some(self)
  }
}

impl TargetedNotifications for RoleGrantTask {
  fn target_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("roleGrantedEmail").with_internal("roleGranted"))
  }
}

// ============================================================================
// FAQ and account
// ============================================================================

/// An administrator answered a question. The answering admin gets a copy
/// and the other admins are told.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaqAnswerTask;

impl Task for FaqAnswerTask {
  fn name(&self) -> &str {
    FAQ_ANSWER
  }

  fn admin_notifications(&self) -> Option<&dyn AdminNotifications> {
    Some(self)
  }

  fn self_notifications(&self) -> Option<&dyn SelfNotifications> {
    Some(self)
  }
}

impl AdminNotifications for FaqAnswerTask {
  fn admin_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("faqAnsweredEmail").with_internal("faqAnswered"))
  }
}

impl SelfNotifications for FaqAnswerTask {
  fn self_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("faqAnsweredEmail").with_internal("faqAnswered"))
  }
}

/// A user asked for a test message to check their mail settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserTestMailTask;

impl Task for UserTestMailTask {
  fn name(&self) -> &str {
    USER_TEST_MAIL
  }

  fn self_notifications(&self) -> Option<&dyn SelfNotifications> {
    Some(self)
  }
}

impl SelfNotifications for UserTestMailTask {
  fn self_template(&self, _event: &TaskEvent) -> Option<NotificationTemplate> {
    Some(NotificationTemplate::email("testEmail").with_internal("testEmail"))
  }
}
