use anyhow::{Result, anyhow, bail};
use chrono::{Duration, Utc};
use rusqlite::Connection;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use haven_db::Database;
use haven_db::queries::{self, NewUser};
use haven_types::models::{MessageFlags, OrgType, Realm, User, UserRole};

use crate::Onboarding;
use crate::seed::default_channel_names;

/// Demo organizations are deleted automatically after this long.
const DEMO_ORGANIZATION_LIFETIME_DAYS: i64 = 30;

/// Registration refused because the e-mail is taken in the realm.
#[derive(Debug, Error)]
#[error("{email} is already a member of realm {realm_id}")]
pub struct AlreadyMember {
    pub email: String,
    pub realm_id: Uuid,
}

#[derive(Debug, Error)]
#[error("Realm {0} not found")]
pub struct RealmNotFound(pub Uuid);

#[derive(Debug, Clone)]
pub struct NewRealm {
    pub name: String,
    pub org_type: OrgType,
    pub default_language: String,
    pub is_demo_organization: bool,
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: UserRole,
    /// Falls back to the realm's language.
    pub default_language: Option<String>,
}

impl Onboarding {
    /// Create a realm with its default channels, internal bots and initial
    /// messages, then register `owner` as its first member. One
    /// transaction: a failure anywhere leaves no trace.
    pub fn create_realm(&self, db: &Database, new_realm: &NewRealm, owner: &NewMember) -> Result<(Realm, User)> {
        if owner.role != UserRole::Owner {
            bail!("The first member of a realm must be its owner");
        }

        db.transaction(|tx| {
            let now = Utc::now();
            let realm = Realm {
                id: Uuid::new_v4(),
                name: new_realm.name.clone(),
                org_type: new_realm.org_type,
                default_language: new_realm.default_language.clone(),
                demo_organization_scheduled_deletion_date: new_realm
                    .is_demo_organization
                    .then(|| now + Duration::days(DEMO_ORGANIZATION_LIFETIME_DAYS)),
                created_at: now,
            };
            queries::insert_realm(tx, &realm)?;

            let l10n = self.catalog.override_language(&realm.default_language);
            for name in default_channel_names(&l10n) {
                queries::insert_channel(tx, realm.id, &name)?;
            }

            self.setup_realm_internal_bots(tx, realm.id)?;
            self.seed_realm_messages(tx, &realm)?;

            let user = self.do_create_user(tx, &realm, owner)?;

            info!("Created realm '{}' ({}) owned by {}", realm.name, realm.id, user.email);
            Ok((realm, user))
        })
    }

    /// Register a new member of an existing realm. Fails with
    /// [`RealmNotFound`] or [`AlreadyMember`] for the caller to tell apart.
    pub fn register_user(&self, db: &Database, realm_id: Uuid, member: &NewMember) -> Result<User> {
        db.transaction(|tx| {
            let realm = queries::get_realm(tx, realm_id)?.ok_or(RealmNotFound(realm_id))?;
            self.do_create_user(tx, &realm, member)
        })
    }

    fn do_create_user(&self, conn: &Connection, realm: &Realm, member: &NewMember) -> Result<User> {
        if queries::get_user_by_email(conn, realm.id, &member.email)?.is_some() {
            return Err(AlreadyMember {
                email: member.email.clone(),
                realm_id: realm.id,
            }
            .into());
        }

        let user_id = queries::insert_user(
            conn,
            &NewUser {
                realm_id: realm.id,
                email: &member.email,
                full_name: &member.full_name,
                password_hash: Some(&member.password_hash),
                role: member.role.id(),
                is_bot: false,
                default_language: member.default_language.as_deref().unwrap_or(&realm.default_language),
            },
        )?;
        let user = queries::get_user_by_id(conn, user_id)?
            .ok_or_else(|| anyhow!("User {} not found after insert", user_id))?;

        self.add_new_user_history(conn, &user)?;
        self.send_initial_direct_message(conn, &user)?;

        info!("Registered {} in realm {}", user.email, realm.id);
        Ok(user)
    }

    /// Give a new member their copy of the realm's onboarding messages.
    /// Only the first message of each onboarding topic starts unread.
    pub fn add_new_user_history(&self, conn: &Connection, user: &User) -> Result<usize> {
        if user.is_bot {
            return Ok(0);
        }

        let rows: Vec<(i64, MessageFlags)> = queries::list_onboarding_user_messages(conn, user.realm_id)?
            .into_iter()
            .map(|marker| {
                let mut flags = marker.flags;
                if !flags.contains(MessageFlags::STARRED) {
                    flags |= MessageFlags::READ;
                }
                (marker.message_id, flags)
            })
            .collect();

        queries::bulk_insert_user_messages(conn, user.id, &rows)?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l10n::Catalog;
    use crate::settings::OnboardingSettings;

    fn onboarding() -> Onboarding {
        Onboarding::new(OnboardingSettings::default(), Catalog::empty())
    }

    fn new_realm(org_type: OrgType, demo: bool) -> NewRealm {
        NewRealm {
            name: "Acme".into(),
            org_type,
            default_language: "en".into(),
            is_demo_organization: demo,
        }
    }

    fn member(email: &str, role: UserRole) -> NewMember {
        NewMember {
            email: email.into(),
            full_name: "Iago".into(),
            password_hash: "hash".into(),
            role,
            default_language: None,
        }
    }

    #[test]
    fn creates_realm_with_channels_bots_and_owner() {
        let db = Database::open_in_memory().unwrap();
        let onboarding = onboarding();
        let (realm, owner) = onboarding
            .create_realm(&db, &new_realm(OrgType::Business, false), &member("owner@acme.test", UserRole::Owner))
            .unwrap();

        assert!(owner.is_realm_owner());
        assert!(realm.demo_organization_scheduled_deletion_date.is_none());

        let channels: Vec<String> = db
            .with_conn(|conn| queries::list_channels(conn, realm.id))
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(channels, ["general", "haven", "sandbox"]);

        assert!(!db.with_conn(|conn| onboarding.missing_any_realm_internal_bots(conn)).unwrap());
    }

    #[test]
    fn demo_realm_gets_deletion_date() {
        let db = Database::open_in_memory().unwrap();
        let (realm, _) = onboarding()
            .create_realm(&db, &new_realm(OrgType::Business, true), &member("owner@acme.test", UserRole::Owner))
            .unwrap();

        let deletion = realm.demo_organization_scheduled_deletion_date.unwrap();
        let days = (deletion - realm.created_at).num_days();
        assert_eq!(days, DEMO_ORGANIZATION_LIFETIME_DAYS);
    }

    #[test]
    fn first_member_must_be_owner() {
        let db = Database::open_in_memory().unwrap();
        let result = onboarding().create_realm(
            &db,
            &new_realm(OrgType::Business, false),
            &member("admin@acme.test", UserRole::Admin),
        );
        assert!(result.is_err());
    }

    #[test]
    fn new_member_history_marks_only_starred_unread() {
        let db = Database::open_in_memory().unwrap();
        let onboarding = onboarding();
        let (realm, _) = onboarding
            .create_realm(&db, &new_realm(OrgType::Business, false), &member("owner@acme.test", UserRole::Owner))
            .unwrap();
        let user = onboarding
            .register_user(&db, realm.id, &member("new@acme.test", UserRole::Member))
            .unwrap();

        let (markers, history) = db
            .with_conn(|conn| {
                Ok((
                    queries::list_onboarding_user_messages(conn, realm.id)?,
                    queries::list_user_message_flags(conn, user.id)?,
                ))
            })
            .unwrap();

        assert_eq!(markers.len(), history.len());
        for (marker, (message_id, flags)) in markers.iter().zip(&history) {
            assert_eq!(marker.message_id, *message_id);
            assert!(flags.contains(MessageFlags::HISTORICAL));
            let starred = marker.flags.contains(MessageFlags::STARRED);
            assert_eq!(flags.contains(MessageFlags::STARRED), starred);
            assert_eq!(flags.contains(MessageFlags::READ), !starred);
        }
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let onboarding = onboarding();
        let (realm, _) = onboarding
            .create_realm(&db, &new_realm(OrgType::Business, false), &member("owner@acme.test", UserRole::Owner))
            .unwrap();
        let err = onboarding
            .register_user(&db, realm.id, &member("owner@acme.test", UserRole::Member))
            .unwrap_err();
        let conflict = err.downcast_ref::<AlreadyMember>().unwrap();
        assert_eq!(conflict.email, "owner@acme.test");
        assert_eq!(conflict.realm_id, realm.id);
    }

    #[test]
    fn unknown_realm_is_typed() {
        let db = Database::open_in_memory().unwrap();
        let realm_id = Uuid::new_v4();
        let err = onboarding()
            .register_user(&db, realm_id, &member("new@acme.test", UserRole::Member))
            .unwrap_err();
        assert_eq!(err.downcast_ref::<RealmNotFound>().map(|e| e.0), Some(realm_id));
    }
}
