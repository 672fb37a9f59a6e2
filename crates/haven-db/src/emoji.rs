use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};
use uuid::Uuid;

use haven_types::models::{EmojiData, ReactionType};

use crate::queries::OptionalExt;

/// Built-in unicode emoji, name -> codepoint. Only the names the server
/// itself reacts with or suggests; clients carry the full set.
const UNICODE_EMOJI: &[(&str, &str)] = &[
    ("+1", "1f44d"),
    ("-1", "1f44e"),
    ("check", "2705"),
    ("eyes", "1f440"),
    ("heart", "2764"),
    ("point_right", "1f449"),
    ("rocket", "1f680"),
    ("smile", "1f604"),
    ("tada", "1f389"),
    ("thumbs_up", "1f44d"),
    ("wave", "1f44b"),
];

pub fn unicode_codepoint(name: &str) -> Option<&'static str> {
    UNICODE_EMOJI
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
}

/// Resolve an emoji name for a realm: active custom emoji shadow the
/// built-in unicode set.
pub fn get_emoji_data(conn: &Connection, realm_id: Uuid, name: &str) -> Result<EmojiData> {
    let custom: Option<i64> = conn
        .query_row(
            "SELECT id FROM realm_emoji WHERE realm_id = ?1 AND name = ?2 AND deactivated = 0",
            params![realm_id.to_string(), name],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = custom {
        return Ok(EmojiData {
            emoji_code: id.to_string(),
            reaction_type: ReactionType::RealmEmoji,
        });
    }

    unicode_codepoint(name)
        .map(|code| EmojiData {
            emoji_code: code.to_string(),
            reaction_type: ReactionType::UnicodeEmoji,
        })
        .ok_or_else(|| anyhow!("Emoji '{}' does not exist", name))
}

pub fn insert_realm_emoji(conn: &Connection, realm_id: Uuid, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO realm_emoji (realm_id, name) VALUES (?1, ?2)",
        params![realm_id.to_string(), name],
    )?;
    Ok(conn.last_insert_rowid())
}
