//! Welcome Bot's side of a direct-message conversation.

use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

use haven_types::models::User;

use crate::Onboarding;
use crate::l10n::{Localizer, fill};
use crate::send::internal_send_private_message;
use crate::text::remove_single_newlines;

const COMMANDS: &[&str] = &[
    "apps",
    "profile",
    "theme",
    "channels",
    "topics",
    "message formatting",
    "keyboard shortcuts",
];

pub const APPS_REPLY: &str = r#"
You can [download](/apps/) the [mobile and desktop apps](/apps/).
Haven also works great in a browser.
"#;

pub const PROFILE_REPLY: &str = r#"
Go to [Profile settings](#settings/profile) to add a [profile picture](/help/change-your-profile-picture)
and edit your [profile information](/help/edit-your-profile).
"#;

pub const THEME_REPLY: &str = r#"
Go to [Preferences](#settings/preferences) to [switch between the light and dark themes](/help/dark-theme),
[pick your favorite emoji theme](/help/emoji-and-emoticons#change-your-emoji-set),
[change your language](/help/change-your-language), and make other tweaks
to your Haven experience.
"#;

pub const CHANNELS_REPLY: &str = r#"
In Haven, channels [determine who gets a message]({help_link}).

[Browse and subscribe to channels]({settings_link}).
"#;

pub const TOPICS_REPLY: &str = r#"
In Haven, topics [tell you what a message is about](/help/introduction-to-topics).
They are light-weight subjects, very similar to the subject line of an email.

Check out [Recent conversations](#recent) to see what's happening!
You can return to this conversation by clicking "Direct messages" in the upper left.
"#;

pub const SHORTCUTS_REPLY: &str = r#"
Haven's [keyboard shortcuts](#keyboard-shortcuts) let you navigate the app
quickly and efficiently.

Press `?` any time to see a [cheat sheet](#keyboard-shortcuts).
"#;

pub const FORMATTING_REPLY: &str = r#"
Haven uses [Markdown](/help/format-your-message-using-markdown),
an intuitive format for **bold**, *italics*, bulleted lists, and more.
Click [here](#message-formatting) for a cheat sheet.

Check out our [messaging tips](/help/messaging-tips) to learn
about emoji reactions, code blocks and much more!
"#;

pub const HELP_REPLY: &str = r#"
Here are a few messages I understand: {bot_commands}

Check out our [Getting started guide](/help/getting-started-with-haven),
or browse the [Help center](/help/) to learn more!
"#;

pub const FALLBACK_REPLY: &str = r#"
I’m sorry, I did not understand your message. Please try
one of the following commands: {bot_commands}
"#;

/// The commands Welcome Bot understands, as inline code, comma separated.
pub fn bot_commands(no_help_command: bool) -> String {
    let mut commands: Vec<&str> = COMMANDS.to_vec();
    if !no_help_command {
        commands.push("help");
    }

    let quoted: Vec<String> = commands.iter().map(|c| format!("`{}`", c)).collect();
    format!("{}.", quoted.join(", "))
}

/// Pick the reply to a direct message, given its raw content lower-cased.
/// Every input gets a reply; unknown text gets the command list.
pub fn select_welcome_bot_response(l10n: &Localizer<'_>, human_response_lower: &str) -> String {
    match human_response_lower {
        "app" | "apps" => l10n.gettext(APPS_REPLY),
        "profile" => l10n.gettext(PROFILE_REPLY),
        "theme" => l10n.gettext(THEME_REPLY),
        "stream" | "streams" | "channel" | "channels" => fill(
            &l10n.gettext(CHANNELS_REPLY),
            &[
                ("help_link", "/help/introduction-to-channels"),
                ("settings_link", "#channels/all"),
            ],
        ),
        "topic" | "topics" => l10n.gettext(TOPICS_REPLY),
        "keyboard" | "shortcuts" | "keyboard shortcuts" => l10n.gettext(SHORTCUTS_REPLY),
        "formatting" | "message formatting" => l10n.gettext(FORMATTING_REPLY),
        "help" | "?" => fill(
            &l10n.gettext(HELP_REPLY),
            &[("bot_commands", bot_commands(true).as_str())],
        ),
        _ => fill(
            &l10n.gettext(FALLBACK_REPLY),
            &[("bot_commands", bot_commands(false).as_str())],
        ),
    }
}

/// A direct message as the send path sees it, before any bot reacts.
#[derive(Debug, Clone)]
pub struct InboundDirectMessage {
    pub sender: User,
    pub recipient: User,
    pub content: String,
}

impl Onboarding {
    /// Welcome Bot answers humans who write to it directly.
    pub fn is_welcome_bot_conversation(&self, message: &InboundDirectMessage) -> bool {
        message.recipient.is_bot
            && !message.sender.is_bot
            && message.recipient.realm_id == message.sender.realm_id
            && message.recipient.email == self.settings.welcome_bot_email()
    }

    /// Reply to `message` as Welcome Bot. Returns the reply's message id.
    pub fn send_welcome_bot_response(
        &self,
        conn: &Connection,
        message: &InboundDirectMessage,
    ) -> Result<i64> {
        let welcome_bot = self.get_system_bot(conn, &self.settings.welcome_bot_email(), message.sender.realm_id)?;

        let l10n = self.catalog.override_language(&message.sender.default_language);
        let human_response_lower = message.content.to_lowercase();
        let content = select_welcome_bot_response(&l10n, &human_response_lower);

        debug!(
            "Welcome Bot replying to {} ({:?})",
            message.sender.email, human_response_lower
        );

        // In-app only: this reply is meant to be read in context.
        internal_send_private_message(
            conn,
            &welcome_bot,
            &message.sender,
            &remove_single_newlines(&content),
            true,
        )
    }

    /// Runs the Welcome Bot trigger if `message` is addressed to it.
    pub fn maybe_send_welcome_bot_response(
        &self,
        conn: &Connection,
        message: &InboundDirectMessage,
    ) -> Result<Option<i64>> {
        if !self.is_welcome_bot_conversation(message) {
            return Ok(None);
        }
        self.send_welcome_bot_response(conn, message).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l10n::Catalog;
    use std::collections::HashMap;

    fn reply(text: &str) -> String {
        let catalog = Catalog::empty();
        select_welcome_bot_response(&catalog.override_language("en"), text)
    }

    #[test]
    fn command_list_formatting() {
        assert_eq!(
            bot_commands(false),
            "`apps`, `profile`, `theme`, `channels`, `topics`, `message formatting`, `keyboard shortcuts`, `help`."
        );
        assert!(bot_commands(true).ends_with("`keyboard shortcuts`."));
        assert!(!bot_commands(true).contains("`help`"));
    }

    #[test]
    fn keyword_groups_select_their_reply() {
        for text in ["app", "apps"] {
            assert_eq!(reply(text), APPS_REPLY);
        }
        assert_eq!(reply("profile"), PROFILE_REPLY);
        assert_eq!(reply("theme"), THEME_REPLY);
        for text in ["topic", "topics"] {
            assert_eq!(reply(text), TOPICS_REPLY);
        }
        for text in ["keyboard", "shortcuts", "keyboard shortcuts"] {
            assert_eq!(reply(text), SHORTCUTS_REPLY);
        }
        for text in ["formatting", "message formatting"] {
            assert_eq!(reply(text), FORMATTING_REPLY);
        }
    }

    #[test]
    fn channel_keywords_fill_links() {
        let expected = "
In Haven, channels [determine who gets a message](/help/introduction-to-channels).

[Browse and subscribe to channels](#channels/all).
";
        for text in ["stream", "streams", "channel", "channels"] {
            assert_eq!(reply(text), expected);
        }
    }

    #[test]
    fn help_lists_commands_without_help() {
        for text in ["help", "?"] {
            let out = reply(text);
            assert!(out.contains(&bot_commands(true)));
            assert!(!out.contains("`help`"));
            assert!(out.contains("/help/getting-started-with-haven"));
        }
    }

    #[test]
    fn anything_else_gets_fallback() {
        let fallback = fill(FALLBACK_REPLY, &[("bot_commands", bot_commands(false).as_str())]);
        for text in ["", "hello", "apps please", "Apps", " help", "themes", "🦀"] {
            assert_eq!(reply(text), fallback, "input {:?}", text);
        }
    }

    #[test]
    fn replies_are_translated() {
        let mut catalog = Catalog::empty();
        catalog.insert(
            "de",
            HashMap::from([(PROFILE_REPLY.to_string(), "Gehe zu den Profileinstellungen.".to_string())]),
        );
        let out = select_welcome_bot_response(&catalog.override_language("de"), "profile");
        assert_eq!(out, "Gehe zu den Profileinstellungen.");
    }
}
