use std::ops::{BitOr, BitOrAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Realms --

/// Organization type, stored as the numeric id used by the realm settings UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgType {
    Unspecified,
    Business,
    Opensource,
    EducationNonprofit,
    Education,
    Research,
    Event,
    Nonprofit,
    Government,
    PoliticalGroup,
    Community,
    Personal,
    Other,
}

impl OrgType {
    pub fn id(self) -> i64 {
        match self {
            Self::Unspecified => 0,
            Self::Business => 10,
            Self::Opensource => 20,
            Self::EducationNonprofit => 30,
            Self::Education => 35,
            Self::Research => 40,
            Self::Event => 50,
            Self::Nonprofit => 60,
            Self::Government => 70,
            Self::PoliticalGroup => 80,
            Self::Community => 90,
            Self::Personal => 100,
            Self::Other => 1000,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        let org_type = match id {
            0 => Self::Unspecified,
            10 => Self::Business,
            20 => Self::Opensource,
            30 => Self::EducationNonprofit,
            35 => Self::Education,
            40 => Self::Research,
            50 => Self::Event,
            60 => Self::Nonprofit,
            70 => Self::Government,
            80 => Self::PoliticalGroup,
            90 => Self::Community,
            100 => Self::Personal,
            1000 => Self::Other,
            _ => return None,
        };
        Some(org_type)
    }

    /// Education organizations get class-oriented help guides.
    pub fn is_education(self) -> bool {
        matches!(self, Self::EducationNonprofit | Self::Education)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Realm {
    pub id: Uuid,
    pub name: String,
    pub org_type: OrgType,
    pub default_language: String,
    /// Set only for demo organizations, which are deleted automatically.
    pub demo_organization_scheduled_deletion_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// -- Users --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Admin,
    Member,
}

impl UserRole {
    pub fn id(self) -> i64 {
        match self {
            Self::Owner => 100,
            Self::Admin => 200,
            Self::Member => 400,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            100 => Some(Self::Owner),
            200 => Some(Self::Admin),
            400 => Some(Self::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub realm_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_bot: bool,
    pub default_language: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Owners are administrators too.
    pub fn is_realm_admin(&self) -> bool {
        matches!(self.role, UserRole::Owner | UserRole::Admin)
    }

    pub fn is_realm_owner(&self) -> bool {
        self.role == UserRole::Owner
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub realm_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// -- Messages --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipient {
    Channel { channel_id: Uuid, topic: String },
    Direct { user_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub realm_id: Uuid,
    pub sender_id: Uuid,
    pub recipient: Recipient,
    pub content: String,
    /// In-app only: no push or e-mail notification was queued.
    pub disable_external_notifications: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-user message flags. Bit positions match the user message flag layout,
/// so onboarding marker flags can be copied straight into user rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageFlags(pub i64);

impl MessageFlags {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(1);
    pub const STARRED: Self = Self(1 << 1);
    pub const HISTORICAL: Self = Self(1 << 10);

    pub fn bits(self) -> i64 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MessageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Marker row: a message sent while setting up a realm, with the flags a
/// new member's copy of it should start with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingUserMessage {
    pub realm_id: Uuid,
    pub message_id: i64,
    pub flags: MessageFlags,
}

// -- Reactions --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionType {
    UnicodeEmoji,
    RealmEmoji,
}

impl ReactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnicodeEmoji => "unicode_emoji",
            Self::RealmEmoji => "realm_emoji",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unicode_emoji" => Some(Self::UnicodeEmoji),
            "realm_emoji" => Some(Self::RealmEmoji),
            _ => None,
        }
    }
}

/// Resolved emoji metadata needed to store a reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiData {
    pub emoji_code: String,
    pub reaction_type: ReactionType,
}
