//! Automatic replies to incoming mail, throttled per sender and per message.

pub mod category;
pub mod state;
pub mod template;
pub mod throttle;

pub use category::{map_to_category, Category};
pub use state::{AutoReplyRecord, AutomationState, MailReply, ReplyClassification, SenderReply};
pub use template::{render, TemplateContext};
pub use throttle::{AutoReplyOutcome, AutoReplyThrottle, SkipReason};
