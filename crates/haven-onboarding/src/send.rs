//! Internal send path: messages authored by the server on behalf of a bot.

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use haven_db::queries;
use haven_types::models::{Recipient, User};

/// A channel message resolved to its channel, ready for [`do_send_messages`].
#[derive(Debug, Clone)]
pub struct PreparedMessage {
    pub realm_id: Uuid,
    pub sender_id: Uuid,
    pub recipient: Recipient,
    pub content: String,
    pub disable_external_notifications: bool,
}

/// Send a direct message from `sender` to `recipient`. With
/// `disable_external_notifications` the message is visible in the app but
/// queues no push or e-mail notification.
pub fn internal_send_private_message(
    conn: &Connection,
    sender: &User,
    recipient: &User,
    content: &str,
    disable_external_notifications: bool,
) -> Result<i64> {
    let message_id = queries::insert_message(
        conn,
        sender.realm_id,
        sender.id,
        &Recipient::Direct { user_id: recipient.id },
        content,
        disable_external_notifications,
    )?;

    debug!(
        "Direct message {} sent {} -> {} (external notifications {})",
        message_id,
        sender.email,
        recipient.email,
        if disable_external_notifications { "off" } else { "on" }
    );
    Ok(message_id)
}

/// Resolve `channel_name` in the sender's realm and prepare a message to
/// `topic` there.
pub fn internal_prep_channel_message_by_name(
    conn: &Connection,
    sender: &User,
    channel_name: &str,
    topic: &str,
    content: &str,
) -> Result<PreparedMessage> {
    let channel = queries::get_channel_by_name(conn, sender.realm_id, channel_name)?
        .with_context(|| format!("Channel '{}' does not exist in realm {}", channel_name, sender.realm_id))?;

    Ok(PreparedMessage {
        realm_id: sender.realm_id,
        sender_id: sender.id,
        recipient: Recipient::Channel {
            channel_id: channel.id,
            topic: topic.to_string(),
        },
        content: content.to_string(),
        disable_external_notifications: false,
    })
}

/// Send prepared messages in order. Returned ids line up with `messages`.
pub fn do_send_messages(conn: &Connection, messages: &[PreparedMessage]) -> Result<Vec<i64>> {
    messages
        .iter()
        .map(|m| {
            queries::insert_message(
                conn,
                m.realm_id,
                m.sender_id,
                &m.recipient,
                &m.content,
                m.disable_external_notifications,
            )
        })
        .collect()
}
