use anyhow::{Result, anyhow};
use rusqlite::Connection;
use tracing::info;

use haven_db::queries;
use haven_types::models::{Realm, User};

use crate::Onboarding;
use crate::l10n::{Localizer, fill};
use crate::responder::bot_commands;
use crate::send::internal_send_private_message;
use crate::text::remove_single_newlines;

const GETTING_STARTED: &str = r#"
If you are new to Haven, check out our [Getting started guide]({getting_started_url})!
"#;

const GETTING_STARTED_EDUCATION: &str = r#"
If you are new to Haven, check out our [Using Haven for a class guide]({getting_started_url})!
"#;

const ORGANIZATION_SETUP: &str = r#"
We also have a guide for [Setting up your organization]({organization_setup_url}).
"#;

const ORGANIZATION_SETUP_EDUCATION: &str = r#"
We also have a guide for [Setting up Haven for a class]({organization_setup_url}).
"#;

const DEMO_ORGANIZATION_WARNING: &str = r#"
Note that this is a [demo organization]({demo_organization_help_url}) and
will be **automatically deleted** in 30 days.
"#;

const WELCOME: &str = r#"
Hello, and welcome to Haven!👋 This is a direct message from me, Welcome Bot.

{getting_started_text} {organization_setup_text}

{demo_organization_text}

I can also help you get set up! Just click anywhere on this message or press `r` to reply.

Here are a few messages I understand: {bot_commands}
"#;

/// Welcome Bot's first message to `user`, before whitespace normalization.
pub fn initial_direct_message_content(l10n: &Localizer<'_>, user: &User, realm: &Realm) -> String {
    let education_organization = realm.org_type.is_education();

    let getting_started_text = if education_organization {
        fill(
            &l10n.gettext(GETTING_STARTED_EDUCATION),
            &[("getting_started_url", "/help/using-haven-for-a-class")],
        )
    } else {
        fill(
            &l10n.gettext(GETTING_STARTED),
            &[("getting_started_url", "/help/getting-started-with-haven")],
        )
    };

    let organization_setup_text = match (user.is_realm_admin(), education_organization) {
        (false, _) => String::new(),
        (true, true) => fill(
            &l10n.gettext(ORGANIZATION_SETUP_EDUCATION),
            &[("organization_setup_url", "/help/setting-up-haven-for-a-class")],
        ),
        (true, false) => fill(
            &l10n.gettext(ORGANIZATION_SETUP),
            &[("organization_setup_url", "/help/getting-your-organization-started-with-haven")],
        ),
    };

    let demo_organization_text =
        if user.is_realm_owner() && realm.demo_organization_scheduled_deletion_date.is_some() {
            fill(
                &l10n.gettext(DEMO_ORGANIZATION_WARNING),
                &[("demo_organization_help_url", "/help/demo-organizations")],
            )
        } else {
            String::new()
        };

    fill(
        &l10n.gettext(WELCOME),
        &[
            ("getting_started_text", getting_started_text.as_str()),
            ("organization_setup_text", organization_setup_text.as_str()),
            ("demo_organization_text", demo_organization_text.as_str()),
            ("bot_commands", bot_commands(false).as_str()),
        ],
    )
}

impl Onboarding {
    /// Send Welcome Bot's first direct message to a new member and return
    /// its id. In-app only: no push or e-mail notification.
    pub fn send_initial_direct_message(&self, conn: &Connection, user: &User) -> Result<i64> {
        let realm = queries::get_realm(conn, user.realm_id)?
            .ok_or_else(|| anyhow!("Realm {} not found", user.realm_id))?;

        // Registration runs before the user has a request language, so
        // use the one they chose.
        let content = {
            let l10n = self.catalog.override_language(&user.default_language);
            initial_direct_message_content(&l10n, user, &realm)
        };

        let welcome_bot = self.get_system_bot(conn, &self.settings.welcome_bot_email(), user.realm_id)?;
        let message_id =
            internal_send_private_message(conn, &welcome_bot, user, &remove_single_newlines(&content), true)?;

        info!("Sent initial direct message {} to {}", message_id, user.email);
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l10n::Catalog;
    use chrono::{Duration, Utc};
    use haven_types::models::{OrgType, UserRole};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn realm(org_type: OrgType, demo: bool) -> Realm {
        Realm {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            org_type,
            default_language: "en".into(),
            demo_organization_scheduled_deletion_date: demo.then(|| Utc::now() + Duration::days(30)),
            created_at: Utc::now(),
        }
    }

    fn user(realm: &Realm, role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            realm_id: realm.id,
            email: "iago@example.com".into(),
            full_name: "Iago".into(),
            role,
            is_bot: false,
            default_language: "en".into(),
            created_at: Utc::now(),
        }
    }

    fn content(org_type: OrgType, demo: bool, role: UserRole) -> String {
        let catalog = Catalog::empty();
        let realm = realm(org_type, demo);
        let user = user(&realm, role);
        remove_single_newlines(&initial_direct_message_content(
            &catalog.override_language("en"),
            &user,
            &realm,
        ))
    }

    #[test]
    fn education_realms_get_class_guides() {
        let out = content(OrgType::Education, false, UserRole::Admin);
        assert!(out.contains("/help/using-haven-for-a-class"));
        assert!(out.contains("/help/setting-up-haven-for-a-class"));
        assert!(!out.contains("/help/getting-started-with-haven"));
        assert!(!out.contains("/help/getting-your-organization-started-with-haven"));

        let out = content(OrgType::EducationNonprofit, false, UserRole::Member);
        assert!(out.contains("/help/using-haven-for-a-class"));
    }

    #[test]
    fn other_realms_get_general_guides() {
        for org_type in [OrgType::Business, OrgType::Research, OrgType::Unspecified] {
            let out = content(org_type, false, UserRole::Owner);
            assert!(out.contains("/help/getting-started-with-haven"));
            assert!(out.contains("/help/getting-your-organization-started-with-haven"));
            assert!(!out.contains("for-a-class"));
        }
    }

    #[test]
    fn members_get_no_setup_paragraph() {
        let out = content(OrgType::Business, false, UserRole::Member);
        assert!(!out.contains("We also have a guide"));
    }

    #[test]
    fn demo_warning_only_for_demo_owner() {
        assert!(content(OrgType::Business, true, UserRole::Owner).contains("**automatically deleted**"));
        assert!(!content(OrgType::Business, true, UserRole::Admin).contains("automatically deleted"));
        assert!(!content(OrgType::Business, false, UserRole::Owner).contains("automatically deleted"));
    }

    #[test]
    fn normalized_message_layout() {
        let out = content(OrgType::Business, false, UserRole::Member);
        assert!(out.starts_with("Hello, and welcome to Haven!👋 This is a direct message from me, Welcome Bot.\n\n"));
        assert!(out.ends_with(&format!("Here are a few messages I understand: {}", bot_commands(false))));
    }

    #[test]
    fn uses_recipient_language() {
        let mut catalog = Catalog::empty();
        catalog.insert(
            "fr",
            HashMap::from([(
                GETTING_STARTED.to_string(),
                "\nNouveau sur Haven ? Lisez le [guide]({getting_started_url}) !\n".to_string(),
            )]),
        );
        let realm = realm(OrgType::Business, false);
        let mut user = user(&realm, UserRole::Member);
        user.default_language = "fr".into();

        let out = initial_direct_message_content(&catalog.override_language(&user.default_language), &user, &realm);
        assert!(out.contains("Lisez le [guide](/help/getting-started-with-haven)"));
    }
}
