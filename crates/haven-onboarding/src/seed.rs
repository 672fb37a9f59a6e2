//! The channel messages a new realm starts with.
//!
//! Every channel created with a realm gets at least one message here, so no
//! default channel starts out empty.

use std::collections::HashSet;

use anyhow::{Result, anyhow};
use rusqlite::Transaction;
use tracing::{debug, info};
use uuid::Uuid;

use haven_db::Database;
use haven_db::emoji::get_emoji_data;
use haven_db::queries;
use haven_types::models::{MessageFlags, OnboardingUserMessage, Realm};

use crate::Onboarding;
use crate::l10n::{Localizer, fill};
use crate::send::{do_send_messages, internal_prep_channel_message_by_name};
use crate::text::remove_single_newlines;

pub const DEFAULT_NOTIFICATION_CHANNEL_NAME: &str = "general";
pub const DISCUSSION_CHANNEL_NAME: &str = "haven";
pub const SANDBOX_CHANNEL_NAME: &str = "sandbox";

pub const MOVING_MESSAGES_TOPIC: &str = "moving messages";
pub const EXPERIMENTS_TOPIC: &str = "experiments";
pub const START_CONVERSATION_TOPIC: &str = "start a conversation";
pub const GREETINGS_TOPIC: &str = "greetings";
pub const WELCOME_TOPIC: &str = "welcome to Haven!";

const GREETINGS_REACTION: &str = "wave";

const MOVING_MESSAGES_1: &str = r#"
If anything is out of place, it’s easy to [move messages]({move_content_another_topic_help_url}),
[rename]({rename_topic_help_url}) and [split]({move_content_another_topic_help_url}) topics,
or even move a topic [to a different channel]({move_content_another_channel_help_url}).
"#;

const MOVING_MESSAGES_2: &str = r#"
:point_right: Try moving this message to another topic and back.
"#;

const WELCOME_1: &str = r#"
Haven is organized to help you communicate more efficiently. Conversations are
labeled with topics, which summarize what the conversation is about.

For example, this message is in the “{topic_name}” topic in the
#**{discussion_channel_name}** channel, as you can see in the left sidebar
and above.
"#;

const WELCOME_2: &str = r#"
You can read Haven one conversation at a time, seeing each message in context,
no matter how many other conversations are going on.
"#;

const WELCOME_3: &str = r#"
:point_right: When you're ready, check out your [Inbox](/#inbox) for other
conversations with unread messages.
"#;

const START_CONVERSATION_1: &str = r#"
To kick off a new conversation, click **Start new conversation** below.
The new conversation thread will be labeled with its own topic.
"#;

const START_CONVERSATION_2: &str = r#"
For a good topic name, think about finishing the sentence: “Hey, can we chat about…?”
"#;

const START_CONVERSATION_3: &str = r#"
:point_right: Try starting a new conversation in this channel.
"#;

const EXPERIMENTS_1: &str = r#"
:point_right:  Use this topic to try out [Haven's messaging features]({format_message_help_url}).
"#;

const EXPERIMENTS_2: &str = r#"
```spoiler Want to see some examples?

````python
print("code blocks")
````

- bulleted
- lists

Link to a conversation: #**{discussion_channel_name}>{topic_name}**
```
"#;

const GREETINGS_1: &str = r#"
This **greetings** topic is a great place to say “hi” :wave: to your teammates.
"#;

const GREETINGS_2: &str = r#"
:point_right: Click on this message to start a new message in the same conversation.
"#;

/// One declared onboarding message, already translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeMessage {
    pub channel_name: String,
    pub topic_name: String,
    pub content: String,
}

/// The declared batch plus the position of the message Welcome Bot reacts
/// to.
#[derive(Debug, Clone)]
pub struct WelcomeMessages {
    pub messages: Vec<WelcomeMessage>,
    pub greetings_index: usize,
}

/// Names of the channels every realm is created with, translated.
pub fn default_channel_names(l10n: &Localizer<'_>) -> [String; 3] {
    [
        l10n.gettext(DEFAULT_NOTIFICATION_CHANNEL_NAME),
        l10n.gettext(DISCUSSION_CHANNEL_NAME),
        l10n.gettext(SANDBOX_CHANNEL_NAME),
    ]
}

/// Declare the realm's initial messages in send order.
///
/// Messages declared last are the most visible: the sidebar and recent
/// conversations sort newest first. The main welcome topic goes last.
pub fn welcome_messages(l10n: &Localizer<'_>) -> WelcomeMessages {
    let [notification_channel, discussion_channel, sandbox_channel] = default_channel_names(l10n);
    let welcome_topic = l10n.gettext(WELCOME_TOPIC);

    let mut messages = Vec::new();

    // Advertising moving messages.
    add(
        &mut messages,
        &discussion_channel,
        &l10n.gettext(MOVING_MESSAGES_TOPIC),
        vec![
            fill(
                &l10n.gettext(MOVING_MESSAGES_1),
                &[
                    ("move_content_another_topic_help_url", "/help/move-content-to-another-topic"),
                    ("rename_topic_help_url", "/help/rename-a-topic"),
                    ("move_content_another_channel_help_url", "/help/move-content-to-another-channel"),
                ],
            ),
            l10n.gettext(MOVING_MESSAGES_2),
        ],
    );

    // Trying out messaging features needs knowing how to send messages.
    add(
        &mut messages,
        &sandbox_channel,
        &l10n.gettext(EXPERIMENTS_TOPIC),
        vec![
            fill(
                &l10n.gettext(EXPERIMENTS_1),
                &[("format_message_help_url", "/help/format-your-message-using-markdown")],
            ),
            fill(
                &l10n.gettext(EXPERIMENTS_2),
                &[
                    ("discussion_channel_name", discussion_channel.as_str()),
                    ("topic_name", welcome_topic.as_str()),
                ],
            ),
        ],
    );

    add(
        &mut messages,
        &sandbox_channel,
        &l10n.gettext(START_CONVERSATION_TOPIC),
        vec![
            l10n.gettext(START_CONVERSATION_1),
            l10n.gettext(START_CONVERSATION_2),
            l10n.gettext(START_CONVERSATION_3),
        ],
    );

    // A first message to the team.
    let greetings_index = messages.len();
    add(
        &mut messages,
        &notification_channel,
        &l10n.gettext(GREETINGS_TOPIC),
        vec![l10n.gettext(GREETINGS_1), l10n.gettext(GREETINGS_2)],
    );

    // Main welcome message, this should be last.
    add(
        &mut messages,
        &discussion_channel,
        &welcome_topic,
        vec![
            fill(
                &l10n.gettext(WELCOME_1),
                &[
                    ("discussion_channel_name", discussion_channel.as_str()),
                    ("topic_name", welcome_topic.as_str()),
                ],
            ),
            l10n.gettext(WELCOME_2),
            l10n.gettext(WELCOME_3),
        ],
    );

    WelcomeMessages {
        messages,
        greetings_index,
    }
}

fn add(messages: &mut Vec<WelcomeMessage>, channel_name: &str, topic_name: &str, contents: Vec<String>) {
    messages.extend(contents.into_iter().map(|content| WelcomeMessage {
        channel_name: channel_name.to_string(),
        topic_name: topic_name.to_string(),
        content,
    }));
}

/// Onboarding marker flags for a sent batch: every message is historical,
/// and the first message of each topic is also starred.
pub fn onboarding_flags(messages: &[WelcomeMessage]) -> Vec<MessageFlags> {
    let mut seen_topics = HashSet::new();
    messages
        .iter()
        .map(|message| {
            let mut flags = MessageFlags::HISTORICAL;
            if seen_topics.insert(message.topic_name.as_str()) {
                flags |= MessageFlags::STARRED;
            }
            flags
        })
        .collect()
}

impl Onboarding {
    /// Send the initial channel messages of a new realm, all or nothing.
    pub fn send_initial_realm_messages(&self, db: &Database, realm_id: Uuid) -> Result<()> {
        db.transaction(|tx| {
            let realm = queries::get_realm(tx, realm_id)?
                .ok_or_else(|| anyhow!("Realm {} not found", realm_id))?;
            self.seed_realm_messages(tx, &realm)
        })
    }

    /// Body of [`Self::send_initial_realm_messages`], for callers that
    /// already hold a transaction.
    pub(crate) fn seed_realm_messages(&self, conn: &Transaction<'_>, realm: &Realm) -> Result<()> {
        let welcome_bot = self.get_system_bot(conn, &self.settings.welcome_bot_email(), realm.id)?;

        let l10n = self.catalog.override_language(&realm.default_language);
        let WelcomeMessages {
            messages,
            greetings_index,
        } = welcome_messages(&l10n);

        let prepared = messages
            .iter()
            .map(|m| {
                internal_prep_channel_message_by_name(
                    conn,
                    &welcome_bot,
                    &m.channel_name,
                    &m.topic_name,
                    &remove_single_newlines(&m.content),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let message_ids = do_send_messages(conn, &prepared)?;

        let markers: Vec<OnboardingUserMessage> = message_ids
            .iter()
            .zip(onboarding_flags(&messages))
            .map(|(&message_id, flags)| OnboardingUserMessage {
                realm_id: realm.id,
                message_id,
                flags,
            })
            .collect();
        queries::bulk_insert_onboarding_user_messages(conn, &markers)?;

        // React to the greetings message, found by the id it was sent with.
        let greetings_id = message_ids
            .get(greetings_index)
            .copied()
            .ok_or_else(|| anyhow!("Greetings message was not sent"))?;
        let greetings = queries::get_message_for_update(conn, greetings_id)?
            .ok_or_else(|| anyhow!("Greetings message {} vanished before reacting", greetings_id))?;

        let emoji = get_emoji_data(conn, realm.id, GREETINGS_REACTION)?;
        queries::add_reaction(conn, greetings.id, welcome_bot.id, GREETINGS_REACTION, &emoji)?;
        debug!("Welcome Bot reacted :{}: to message {}", GREETINGS_REACTION, greetings.id);

        info!("Realm {}: sent {} initial messages", realm.id, message_ids.len());
        Ok(())
    }
}
