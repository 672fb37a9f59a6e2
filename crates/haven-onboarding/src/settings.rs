use std::path::PathBuf;

use thiserror::Error;

pub const NOTIFICATION_BOT: &str = "notification-bot";
pub const EMAIL_GATEWAY_BOT: &str = "emailgateway";
pub const WELCOME_BOT: &str = "welcome-bot";

const DEFAULT_INTERNAL_BOT_DOMAIN: &str = "haven.internal";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("failed to read translation catalog {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse translation catalog {path}: {source}")]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A bot account every realm must have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalBot {
    pub local_part: String,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct OnboardingSettings {
    pub internal_bot_domain: String,
    pub internal_bots: Vec<InternalBot>,
    /// Directory of `<lang>.json` translation catalogs.
    pub locale_dir: Option<PathBuf>,
}

impl Default for OnboardingSettings {
    fn default() -> Self {
        Self {
            internal_bot_domain: DEFAULT_INTERNAL_BOT_DOMAIN.to_string(),
            internal_bots: vec![
                InternalBot {
                    local_part: NOTIFICATION_BOT.to_string(),
                    full_name: "Notification Bot".to_string(),
                },
                InternalBot {
                    local_part: EMAIL_GATEWAY_BOT.to_string(),
                    full_name: "Email Gateway".to_string(),
                },
                InternalBot {
                    local_part: WELCOME_BOT.to_string(),
                    full_name: "Welcome Bot".to_string(),
                },
            ],
            locale_dir: None,
        }
    }
}

impl OnboardingSettings {
    /// Reads `HAVEN_INTERNAL_BOT_DOMAIN` and `HAVEN_LOCALE_DIR`; everything
    /// else keeps its default.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(domain) = lookup("HAVEN_INTERNAL_BOT_DOMAIN") {
            let domain = domain.trim().to_string();
            if domain.is_empty() || domain.contains('@') || domain.contains(char::is_whitespace) {
                return Err(SettingsError::Invalid {
                    var: "HAVEN_INTERNAL_BOT_DOMAIN",
                    value: domain,
                    reason: "expected a bare domain name",
                });
            }
            settings.internal_bot_domain = domain;
        }

        if let Some(dir) = lookup("HAVEN_LOCALE_DIR").filter(|d| !d.trim().is_empty()) {
            settings.locale_dir = Some(PathBuf::from(dir));
        }

        Ok(settings)
    }

    pub fn bot_email(&self, local_part: &str) -> String {
        format!("{}@{}", local_part, self.internal_bot_domain)
    }

    pub fn internal_bot_emails(&self) -> Vec<String> {
        self.internal_bots
            .iter()
            .map(|bot| self.bot_email(&bot.local_part))
            .collect()
    }

    pub fn welcome_bot_email(&self) -> String {
        self.bot_email(WELCOME_BOT)
    }
}
