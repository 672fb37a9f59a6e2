//! Haven onboarding: the content a new organization and its members see
//! first.
//!
//! - Welcome Bot's first direct message to every new member
//! - Welcome Bot's replies to members who write back
//! - The seeded channel messages of a new realm, with the starred/unread
//!   state new members inherit from them
//! - Provisioning of the internal bots every realm needs

pub mod bots;
pub mod direct;
pub mod l10n;
pub mod realm;
pub mod responder;
pub mod seed;
pub mod send;
pub mod settings;
pub mod text;

pub use l10n::{Catalog, Localizer};
pub use realm::{AlreadyMember, NewMember, NewRealm, RealmNotFound};
pub use responder::{InboundDirectMessage, bot_commands, select_welcome_bot_response};
pub use settings::{OnboardingSettings, SettingsError};
pub use text::remove_single_newlines;

/// Shared onboarding context: which bots exist and how to translate.
#[derive(Debug, Clone)]
pub struct Onboarding {
    pub settings: OnboardingSettings,
    pub catalog: Catalog,
}

impl Onboarding {
    pub fn new(settings: OnboardingSettings, catalog: Catalog) -> Self {
        Self { settings, catalog }
    }

    /// Settings from the environment, with catalogs loaded from
    /// `HAVEN_LOCALE_DIR` when set.
    pub fn from_env() -> Result<Self, SettingsError> {
        let settings = OnboardingSettings::from_env()?;
        let catalog = match &settings.locale_dir {
            Some(dir) => Catalog::load_dir(dir)?,
            None => Catalog::empty(),
        };
        Ok(Self::new(settings, catalog))
    }
}
