//! Database row types — these map directly to SQLite rows.
//! Conversion into haven-types models happens at the edge, so a corrupt
//! column surfaces as an error instead of a panic.
use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use haven_types::models::{
    Channel, Message, MessageFlags, OnboardingUserMessage, OrgType, Realm, Recipient, User,
    UserRole,
};

pub struct RealmRow {
    pub id: String,
    pub name: String,
    pub org_type: i64,
    pub default_language: String,
    pub demo_organization_scheduled_deletion_date: Option<String>,
    pub created_at: String,
}

pub struct UserRow {
    pub id: String,
    pub realm_id: String,
    pub email: String,
    pub full_name: String,
    pub password: Option<String>,
    pub role: i64,
    pub is_bot: bool,
    pub default_language: String,
    pub created_at: String,
}

pub struct ChannelRow {
    pub id: String,
    pub realm_id: String,
    pub name: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub realm_id: String,
    pub sender_id: String,
    pub sender_full_name: String,
    pub channel_id: Option<String>,
    pub topic: Option<String>,
    pub recipient_user_id: Option<String>,
    pub content: String,
    pub disable_external_notifications: bool,
    pub created_at: String,
}

pub struct ReactionRow {
    pub message_id: i64,
    pub user_id: String,
    pub emoji_name: String,
    pub emoji_code: String,
    pub reaction_type: String,
    pub created_at: String,
}

pub struct OnboardingRow {
    pub realm_id: String,
    pub message_id: i64,
    pub flags: i64,
}

/// SQLite stores `datetime('now')` as "YYYY-MM-DD HH:MM:SS" without a
/// timezone; values written from Rust are RFC 3339.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}

fn parse_uuid(raw: &str, column: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| anyhow!("Corrupt {} '{}': {}", column, raw, e))
}

impl TryFrom<RealmRow> for Realm {
    type Error = anyhow::Error;

    fn try_from(row: RealmRow) -> Result<Self> {
        Ok(Realm {
            id: parse_uuid(&row.id, "realm id")?,
            name: row.name,
            org_type: OrgType::from_id(row.org_type)
                .ok_or_else(|| anyhow!("Unknown org_type {} on realm {}", row.org_type, row.id))?,
            default_language: row.default_language,
            demo_organization_scheduled_deletion_date: row
                .demo_organization_scheduled_deletion_date
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id, "user id")?,
            realm_id: parse_uuid(&row.realm_id, "realm_id")?,
            email: row.email,
            full_name: row.full_name,
            role: UserRole::from_id(row.role)
                .ok_or_else(|| anyhow!("Unknown role {} on user {}", row.role, row.id))?,
            is_bot: row.is_bot,
            default_language: row.default_language,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<ChannelRow> for Channel {
    type Error = anyhow::Error;

    fn try_from(row: ChannelRow) -> Result<Self> {
        Ok(Channel {
            id: parse_uuid(&row.id, "channel id")?,
            realm_id: parse_uuid(&row.realm_id, "realm_id")?,
            name: row.name,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl MessageRow {
    pub fn recipient(&self) -> Result<Recipient> {
        match (&self.channel_id, &self.topic, &self.recipient_user_id) {
            (Some(channel_id), Some(topic), None) => Ok(Recipient::Channel {
                channel_id: parse_uuid(channel_id, "channel_id")?,
                topic: topic.clone(),
            }),
            (None, None, Some(user_id)) => Ok(Recipient::Direct {
                user_id: parse_uuid(user_id, "recipient_user_id")?,
            }),
            _ => Err(anyhow!("Message {} has inconsistent addressing", self.id)),
        }
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            id: row.id,
            realm_id: parse_uuid(&row.realm_id, "realm_id")?,
            sender_id: parse_uuid(&row.sender_id, "sender_id")?,
            recipient: row.recipient()?,
            created_at: parse_timestamp(&row.created_at)?,
            content: row.content,
            disable_external_notifications: row.disable_external_notifications,
        })
    }
}

impl TryFrom<OnboardingRow> for OnboardingUserMessage {
    type Error = anyhow::Error;

    fn try_from(row: OnboardingRow) -> Result<Self> {
        Ok(OnboardingUserMessage {
            realm_id: parse_uuid(&row.realm_id, "realm_id")?,
            message_id: row.message_id,
            flags: MessageFlags(row.flags),
        })
    }
}
