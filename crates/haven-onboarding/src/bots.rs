use anyhow::{Result, anyhow, bail};
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use haven_db::Database;
use haven_db::queries::{self, NewUser};
use haven_types::models::{User, UserRole};

use crate::Onboarding;

impl Onboarding {
    /// True if some realm lacks one of the configured internal bots.
    ///
    /// Every realm has its own copy of each bot, so an internal bot e-mail
    /// is complete when a bot carries it once per realm. Humans holding a
    /// bot address don't count.
    pub fn missing_any_realm_internal_bots(&self, conn: &Connection) -> Result<bool> {
        let bot_emails = self.settings.internal_bot_emails();
        let realm_count = queries::count_realms(conn)?;
        if realm_count == 0 {
            return Ok(false);
        }

        let complete = queries::count_bots_by_email(conn, &bot_emails)?
            .into_iter()
            .filter(|(_, count)| *count == realm_count)
            .count();

        Ok(complete != bot_emails.len())
    }

    /// Create missing internal bots in every realm. Safe to run repeatedly;
    /// does nothing when all bots exist.
    pub fn create_if_missing_realm_internal_bots(&self, db: &Database) -> Result<()> {
        db.transaction(|tx| {
            if !self.missing_any_realm_internal_bots(tx)? {
                return Ok(());
            }

            let mut created = 0;
            for realm_id in queries::list_realm_ids(tx)? {
                created += self.setup_realm_internal_bots(tx, realm_id)?;
            }
            info!("Created {} missing internal bots", created);
            Ok(())
        })
    }

    /// Create the internal bots `realm_id` doesn't have yet. Returns how
    /// many were created. A human account on a bot address is an error.
    pub fn setup_realm_internal_bots(&self, conn: &Connection, realm_id: Uuid) -> Result<usize> {
        let realm = queries::get_realm(conn, realm_id)?
            .ok_or_else(|| anyhow!("Realm {} not found", realm_id))?;

        let mut created = 0;
        for bot in &self.settings.internal_bots {
            let email = self.settings.bot_email(&bot.local_part);
            match queries::get_user_by_email(conn, realm_id, &email)? {
                Some(user) if user.is_bot => continue,
                Some(_) => bail!("{} is held by a human user in realm {}", email, realm_id),
                None => {}
            }

            queries::insert_user(
                conn,
                &NewUser {
                    realm_id,
                    email: &email,
                    full_name: &bot.full_name,
                    password_hash: None,
                    role: UserRole::Member.id(),
                    is_bot: true,
                    default_language: &realm.default_language,
                },
            )?;
            created += 1;
        }

        if created > 0 {
            info!("Realm {}: created {} internal bots", realm_id, created);
        }
        Ok(created)
    }

    /// The realm's copy of an internal bot. A missing bot means setup was
    /// skipped, which is an error rather than something to paper over.
    pub fn get_system_bot(&self, conn: &Connection, email: &str, realm_id: Uuid) -> Result<User> {
        queries::get_user_by_email(conn, realm_id, email)?
            .filter(|user| user.is_bot)
            .ok_or_else(|| anyhow!("System bot {} missing in realm {}", email, realm_id))
    }
}
