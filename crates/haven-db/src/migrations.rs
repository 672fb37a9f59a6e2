use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE realms (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                org_type        INTEGER NOT NULL DEFAULT 0,
                default_language TEXT NOT NULL DEFAULT 'en',
                demo_organization_scheduled_deletion_date TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                realm_id        TEXT NOT NULL REFERENCES realms(id),
                email           TEXT NOT NULL,
                full_name       TEXT NOT NULL,
                password        TEXT,
                role            INTEGER NOT NULL DEFAULT 400,
                is_bot          INTEGER NOT NULL DEFAULT 0,
                default_language TEXT NOT NULL DEFAULT 'en',
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(realm_id, email)
            );

            CREATE INDEX idx_users_email ON users(email);

            CREATE TABLE channels (
                id          TEXT PRIMARY KEY,
                realm_id    TEXT NOT NULL REFERENCES realms(id),
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(realm_id, name)
            );

            -- Integer ids: storage order is send order.
            CREATE TABLE messages (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                realm_id            TEXT NOT NULL REFERENCES realms(id),
                sender_id           TEXT NOT NULL REFERENCES users(id),
                channel_id          TEXT REFERENCES channels(id),
                topic               TEXT,
                recipient_user_id   TEXT REFERENCES users(id),
                content             TEXT NOT NULL,
                disable_external_notifications INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK ((channel_id IS NULL) = (topic IS NULL)),
                CHECK ((channel_id IS NULL) <> (recipient_user_id IS NULL))
            );

            CREATE INDEX idx_messages_channel ON messages(channel_id, topic, id);
            CREATE INDEX idx_messages_direct ON messages(sender_id, recipient_user_id, id);

            CREATE TABLE user_messages (
                user_id     TEXT NOT NULL REFERENCES users(id),
                message_id  INTEGER NOT NULL REFERENCES messages(id),
                flags       INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, message_id)
            );

            CREATE TABLE onboarding_user_messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                realm_id    TEXT NOT NULL REFERENCES realms(id),
                message_id  INTEGER NOT NULL UNIQUE REFERENCES messages(id),
                flags       INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_onboarding_realm ON onboarding_user_messages(realm_id);

            CREATE TABLE reactions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id      INTEGER NOT NULL REFERENCES messages(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                emoji_name      TEXT NOT NULL,
                emoji_code      TEXT NOT NULL,
                reaction_type   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(message_id, user_id, emoji_code, reaction_type)
            );

            CREATE INDEX idx_reactions_message ON reactions(message_id);

            CREATE TABLE realm_emoji (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                realm_id    TEXT NOT NULL REFERENCES realms(id),
                name        TEXT NOT NULL,
                deactivated INTEGER NOT NULL DEFAULT 0,
                UNIQUE(realm_id, name)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
