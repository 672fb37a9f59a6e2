//! Queries take a plain `&Connection` so they compose inside
//! [`Database::transaction`]; the `Database` methods below are one-shot
//! wrappers for callers that don't need a transaction.

use crate::Database;
use crate::models::{ChannelRow, MessageRow, OnboardingRow, ReactionRow, RealmRow, UserRow};
use anyhow::{Result, anyhow};
use haven_types::models::{
    Channel, EmojiData, MessageFlags, OnboardingUserMessage, Realm, Recipient, User,
};
use rusqlite::{Connection, ToSql, params};
use uuid::Uuid;

/// Fields needed to create a user; ids and timestamps are assigned here.
pub struct NewUser<'a> {
    pub realm_id: Uuid,
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: Option<&'a str>,
    pub role: i64,
    pub is_bot: bool,
    pub default_language: &'a str,
}

impl Database {
    pub fn get_realm(&self, id: Uuid) -> Result<Option<Realm>> {
        self.with_conn(|conn| get_realm(conn, id))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_by_id(conn, id))
    }

    /// Returns the user together with the stored password hash, if any.
    pub fn get_login(&self, realm_id: Uuid, email: &str) -> Result<Option<(User, Option<String>)>> {
        self.with_conn(|conn| {
            let Some(row) = query_user_row(conn, "realm_id = ?1 AND email = ?2", params![realm_id.to_string(), email])? else {
                return Ok(None);
            };
            let password = row.password.clone();
            Ok(Some((row.try_into()?, password)))
        })
    }

    pub fn get_channel_messages(&self, channel_id: Uuid, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| list_channel_messages(conn, channel_id, limit))
    }

    pub fn get_direct_messages(&self, a: Uuid, b: Uuid, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| list_direct_messages(conn, a, b, limit))
    }

    pub fn get_reactions_for_messages(&self, message_ids: &[i64]) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| get_reactions_for_messages(conn, message_ids))
    }
}

// -- Realms --

pub fn insert_realm(conn: &Connection, realm: &Realm) -> Result<()> {
    conn.execute(
        "INSERT INTO realms (id, name, org_type, default_language, demo_organization_scheduled_deletion_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            realm.id.to_string(),
            realm.name,
            realm.org_type.id(),
            realm.default_language,
            realm.demo_organization_scheduled_deletion_date.map(|d| d.to_rfc3339()),
            realm.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_realm(conn: &Connection, id: Uuid) -> Result<Option<Realm>> {
    let row = conn
        .query_row(
            "SELECT id, name, org_type, default_language, demo_organization_scheduled_deletion_date, created_at
             FROM realms WHERE id = ?1",
            [id.to_string()],
            |row| {
                Ok(RealmRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    org_type: row.get(2)?,
                    default_language: row.get(3)?,
                    demo_organization_scheduled_deletion_date: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    row.map(Realm::try_from).transpose()
}

pub fn list_realm_ids(conn: &Connection) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare("SELECT id FROM realms ORDER BY created_at, id")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    ids.iter()
        .map(|id| id.parse().map_err(|e| anyhow!("Corrupt realm id '{}': {}", id, e)))
        .collect()
}

pub fn count_realms(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM realms", [], |row| row.get(0))?)
}

// -- Channels --

pub fn insert_channel(conn: &Connection, realm_id: Uuid, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO channels (id, realm_id, name) VALUES (?1, ?2, ?3)",
        params![id.to_string(), realm_id.to_string(), name],
    )?;
    Ok(id)
}

pub fn get_channel_by_name(conn: &Connection, realm_id: Uuid, name: &str) -> Result<Option<Channel>> {
    let row = conn
        .query_row(
            "SELECT id, realm_id, name, created_at FROM channels WHERE realm_id = ?1 AND name = ?2",
            params![realm_id.to_string(), name],
            |row| {
                Ok(ChannelRow {
                    id: row.get(0)?,
                    realm_id: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;

    row.map(Channel::try_from).transpose()
}

pub fn list_channels(conn: &Connection, realm_id: Uuid) -> Result<Vec<Channel>> {
    let mut stmt = conn.prepare(
        "SELECT id, realm_id, name, created_at FROM channels WHERE realm_id = ?1 ORDER BY name",
    )?;
    let rows = stmt
        .query_map([realm_id.to_string()], |row| {
            Ok(ChannelRow {
                id: row.get(0)?,
                realm_id: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(Channel::try_from).collect()
}

// -- Users --

pub fn insert_user(conn: &Connection, user: &NewUser<'_>) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO users (id, realm_id, email, full_name, password, role, is_bot, default_language)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.to_string(),
            user.realm_id.to_string(),
            user.email,
            user.full_name,
            user.password_hash,
            user.role,
            user.is_bot,
            user.default_language,
        ],
    )?;
    Ok(id)
}

pub fn get_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    query_user_row(conn, "id = ?1", params![id.to_string()])?
        .map(User::try_from)
        .transpose()
}

pub fn get_user_by_email(conn: &Connection, realm_id: Uuid, email: &str) -> Result<Option<User>> {
    query_user_row(conn, "realm_id = ?1 AND email = ?2", params![realm_id.to_string(), email])?
        .map(User::try_from)
        .transpose()
}

/// For each of `emails`, how many bot users (across all realms) carry it.
/// Humans are not counted. E-mails with no bots at all are absent from the
/// result.
pub fn count_bots_by_email(conn: &Connection, emails: &[String]) -> Result<Vec<(String, i64)>> {
    if emails.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=emails.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT email, COUNT(id) FROM users WHERE is_bot = 1 AND email IN ({}) GROUP BY email",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = emails.iter().map(|e| e as &dyn ToSql).collect();
    let counts = stmt
        .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(counts)
}

fn query_user_row(conn: &Connection, filter: &str, params: &[&dyn ToSql]) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, realm_id, email, full_name, password, role, is_bot, default_language, created_at
         FROM users WHERE {}",
        filter
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row(params, |row| {
            Ok(UserRow {
                id: row.get(0)?,
                realm_id: row.get(1)?,
                email: row.get(2)?,
                full_name: row.get(3)?,
                password: row.get(4)?,
                role: row.get(5)?,
                is_bot: row.get(6)?,
                default_language: row.get(7)?,
                created_at: row.get(8)?,
            })
        })
        .optional()?;

    Ok(row)
}

// -- Messages --

/// Inserts one message and returns its id. Ids increase with every call.
pub fn insert_message(
    conn: &Connection,
    realm_id: Uuid,
    sender_id: Uuid,
    recipient: &Recipient,
    content: &str,
    disable_external_notifications: bool,
) -> Result<i64> {
    let (channel_id, topic, recipient_user_id) = match recipient {
        Recipient::Channel { channel_id, topic } => (Some(channel_id.to_string()), Some(topic.as_str()), None),
        Recipient::Direct { user_id } => (None, None, Some(user_id.to_string())),
    };

    conn.execute(
        "INSERT INTO messages (realm_id, sender_id, channel_id, topic, recipient_user_id, content, disable_external_notifications)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            realm_id.to_string(),
            sender_id.to_string(),
            channel_id,
            topic,
            recipient_user_id,
            content,
            disable_external_notifications,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

const MESSAGE_COLUMNS: &str = "m.id, m.realm_id, m.sender_id, u.full_name, m.channel_id, m.topic,
     m.recipient_user_id, m.content, m.disable_external_notifications, m.created_at";

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        realm_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_full_name: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
        channel_id: row.get(4)?,
        topic: row.get(5)?,
        recipient_user_id: row.get(6)?,
        content: row.get(7)?,
        disable_external_notifications: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Re-read a message inside a write transaction. The transaction already
/// holds the database write lock, so the row is stable until commit.
pub fn get_message_for_update(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!(
        "SELECT {} FROM messages m LEFT JOIN users u ON m.sender_id = u.id WHERE m.id = ?1",
        MESSAGE_COLUMNS
    );
    Ok(conn.query_row(&sql, [id], map_message_row).optional()?)
}

/// Newest first, like the channel view.
pub fn list_channel_messages(conn: &Connection, channel_id: Uuid, limit: u32) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {} FROM messages m
         LEFT JOIN users u ON m.sender_id = u.id
         WHERE m.channel_id = ?1
         ORDER BY m.id DESC
         LIMIT ?2",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![channel_id.to_string(), limit], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Both directions of a direct conversation, newest first.
pub fn list_direct_messages(conn: &Connection, a: Uuid, b: Uuid, limit: u32) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {} FROM messages m
         LEFT JOIN users u ON m.sender_id = u.id
         WHERE (m.sender_id = ?1 AND m.recipient_user_id = ?2)
            OR (m.sender_id = ?2 AND m.recipient_user_id = ?1)
         ORDER BY m.id DESC
         LIMIT ?3",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![a.to_string(), b.to_string(), limit], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// All messages of a realm in storage order.
pub fn list_realm_messages(conn: &Connection, realm_id: Uuid) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {} FROM messages m
         LEFT JOIN users u ON m.sender_id = u.id
         WHERE m.realm_id = ?1
         ORDER BY m.id",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([realm_id.to_string()], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Onboarding markers and user messages --

pub fn bulk_insert_onboarding_user_messages(conn: &Connection, rows: &[OnboardingUserMessage]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO onboarding_user_messages (realm_id, message_id, flags) VALUES (?1, ?2, ?3)",
    )?;
    for row in rows {
        stmt.execute(params![row.realm_id.to_string(), row.message_id, row.flags.bits()])?;
    }
    Ok(())
}

pub fn list_onboarding_user_messages(conn: &Connection, realm_id: Uuid) -> Result<Vec<OnboardingUserMessage>> {
    let mut stmt = conn.prepare(
        "SELECT realm_id, message_id, flags FROM onboarding_user_messages
         WHERE realm_id = ?1 ORDER BY message_id",
    )?;
    let rows = stmt
        .query_map([realm_id.to_string()], |row| {
            Ok(OnboardingRow {
                realm_id: row.get(0)?,
                message_id: row.get(1)?,
                flags: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(OnboardingUserMessage::try_from).collect()
}

pub fn bulk_insert_user_messages(conn: &Connection, user_id: Uuid, rows: &[(i64, MessageFlags)]) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT INTO user_messages (user_id, message_id, flags) VALUES (?1, ?2, ?3)")?;
    let uid = user_id.to_string();
    for (message_id, flags) in rows {
        stmt.execute(params![uid, message_id, flags.bits()])?;
    }
    Ok(())
}

pub fn list_user_message_flags(conn: &Connection, user_id: Uuid) -> Result<Vec<(i64, MessageFlags)>> {
    let mut stmt = conn.prepare(
        "SELECT message_id, flags FROM user_messages WHERE user_id = ?1 ORDER BY message_id",
    )?;
    let rows = stmt
        .query_map([user_id.to_string()], |row| Ok((row.get(0)?, MessageFlags(row.get(1)?))))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// -- Reactions --

/// Adds a reaction. Returns false if this user already reacted with the
/// same emoji.
pub fn add_reaction(
    conn: &Connection,
    message_id: i64,
    user_id: Uuid,
    emoji_name: &str,
    emoji: &EmojiData,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO reactions (message_id, user_id, emoji_name, emoji_code, reaction_type)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            message_id,
            user_id.to_string(),
            emoji_name,
            emoji.emoji_code,
            emoji.reaction_type.as_str(),
        ],
    )?;
    Ok(inserted == 1)
}

/// Batch-fetch reactions for a set of message IDs.
pub fn get_reactions_for_messages(conn: &Connection, message_ids: &[i64]) -> Result<Vec<ReactionRow>> {
    if message_ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT message_id, user_id, emoji_name, emoji_code, reaction_type, created_at
         FROM reactions WHERE message_id IN ({}) ORDER BY id",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = message_ids.iter().map(|id| id as &dyn ToSql).collect();

    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(ReactionRow {
                message_id: row.get(0)?,
                user_id: row.get(1)?,
                emoji_name: row.get(2)?,
                emoji_code: row.get(3)?,
                reaction_type: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
