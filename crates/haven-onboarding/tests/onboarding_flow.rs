use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use haven_db::Database;
use haven_db::queries;
use haven_onboarding::seed::{self, GREETINGS_TOPIC};
use haven_onboarding::{
    Catalog, InboundDirectMessage, NewMember, NewRealm, Onboarding, OnboardingSettings,
    bot_commands,
};
use haven_types::models::{MessageFlags, OrgType, Realm, Recipient, User, UserRole};

fn onboarding() -> Onboarding {
    Onboarding::new(OnboardingSettings::default(), Catalog::empty())
}

fn member(email: &str, role: UserRole) -> NewMember {
    NewMember {
        email: email.into(),
        full_name: "Test User".into(),
        password_hash: "not-a-real-hash".into(),
        role,
        default_language: None,
    }
}

fn create_realm(db: &Database, onboarding: &Onboarding, org_type: OrgType, demo: bool) -> (Realm, User) {
    onboarding
        .create_realm(
            db,
            &NewRealm {
                name: "Acme".into(),
                org_type,
                default_language: "en".into(),
                is_demo_organization: demo,
            },
            &member("owner@acme.test", UserRole::Owner),
        )
        .unwrap()
}

fn welcome_bot(db: &Database, onboarding: &Onboarding, realm_id: Uuid) -> User {
    db.with_conn(|conn| onboarding.get_system_bot(conn, "welcome-bot@haven.internal", realm_id))
        .unwrap()
}

#[test]
fn seeded_channel_messages_match_declaration() {
    let db = Database::open_in_memory().unwrap();
    let onboarding = onboarding();
    let (realm, _) = create_realm(&db, &onboarding, OrgType::Business, false);

    let declared = seed::welcome_messages(&onboarding.catalog.override_language("en"));
    let channels: HashMap<Uuid, String> = db
        .with_conn(|conn| queries::list_channels(conn, realm.id))
        .unwrap()
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let sent: Vec<_> = db
        .with_conn(|conn| queries::list_realm_messages(conn, realm.id))
        .unwrap()
        .into_iter()
        .filter(|m| m.channel_id.is_some())
        .collect();

    // One message per declared triple, in declared order.
    assert_eq!(sent.len(), declared.messages.len());
    for (row, expected) in sent.iter().zip(&declared.messages) {
        let Recipient::Channel { channel_id, topic } = row.recipient().unwrap() else {
            panic!("message {} is not a channel message", row.id);
        };
        assert_eq!(channels[&channel_id], expected.channel_name);
        assert_eq!(topic, expected.topic_name);
        assert_eq!(row.content, haven_onboarding::remove_single_newlines(&expected.content));
        assert!(!row.disable_external_notifications);
    }

    // Every default channel got at least one message.
    for name in channels.values() {
        assert!(declared.messages.iter().any(|m| &m.channel_name == name), "{} is empty", name);
    }
}

#[test]
fn exactly_one_starred_marker_per_topic() {
    let db = Database::open_in_memory().unwrap();
    let onboarding = onboarding();
    let (realm, _) = create_realm(&db, &onboarding, OrgType::Business, false);

    let (markers, messages) = db
        .with_conn(|conn| {
            Ok((
                queries::list_onboarding_user_messages(conn, realm.id)?,
                queries::list_realm_messages(conn, realm.id)?,
            ))
        })
        .unwrap();

    let topic_of: HashMap<i64, String> = messages
        .into_iter()
        .filter_map(|m| m.topic.clone().map(|t| (m.id, t)))
        .collect();

    assert_eq!(markers.len(), topic_of.len());
    assert!(markers.iter().all(|m| m.flags.contains(MessageFlags::HISTORICAL)));

    let mut starred_per_topic: HashMap<&str, Vec<i64>> = HashMap::new();
    for marker in markers.iter().filter(|m| m.flags.contains(MessageFlags::STARRED)) {
        starred_per_topic
            .entry(topic_of[&marker.message_id].as_str())
            .or_default()
            .push(marker.message_id);
    }
    assert_eq!(starred_per_topic.len(), 5);

    for (topic, starred) in starred_per_topic {
        assert_eq!(starred.len(), 1, "topic {}", topic);
        let first_in_topic = topic_of
            .iter()
            .filter(|(_, t)| t.as_str() == topic)
            .map(|(id, _)| *id)
            .min()
            .unwrap();
        assert_eq!(starred[0], first_in_topic);
    }
}

#[test]
fn welcome_bot_waves_at_greetings() {
    let db = Database::open_in_memory().unwrap();
    let onboarding = onboarding();
    let (realm, _) = create_realm(&db, &onboarding, OrgType::Business, false);
    let bot = welcome_bot(&db, &onboarding, realm.id);

    let messages = db.with_conn(|conn| queries::list_realm_messages(conn, realm.id)).unwrap();
    let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
    let reactions = db.get_reactions_for_messages(&ids).unwrap();

    assert_eq!(reactions.len(), 1);
    let reaction = &reactions[0];
    assert_eq!(reaction.emoji_name, "wave");
    assert_eq!(reaction.emoji_code, "1f44b");
    assert_eq!(reaction.reaction_type, "unicode_emoji");
    assert_eq!(reaction.user_id, bot.id.to_string());

    let target = messages.iter().find(|m| m.id == reaction.message_id).unwrap();
    assert_eq!(target.topic.as_deref(), Some(GREETINGS_TOPIC));
    assert!(target.content.starts_with("This **greetings** topic"));
}

fn bare_realm(db: &Database, onboarding: &Onboarding, channels: &[&str]) -> Realm {
    let realm = Realm {
        id: Uuid::new_v4(),
        name: "Broken".into(),
        org_type: OrgType::Business,
        default_language: "en".into(),
        demo_organization_scheduled_deletion_date: None,
        created_at: Utc::now(),
    };
    db.with_conn(|conn| {
        queries::insert_realm(conn, &realm)?;
        for name in channels {
            queries::insert_channel(conn, realm.id, name)?;
        }
        onboarding.setup_realm_internal_bots(conn, realm.id)?;
        Ok(())
    })
    .unwrap();
    realm
}

fn seeded_rows(db: &Database, realm_id: Uuid) -> (usize, usize, usize) {
    db.with_conn(|conn| {
        let messages = queries::list_realm_messages(conn, realm_id)?;
        let markers = queries::list_onboarding_user_messages(conn, realm_id)?;
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        let reactions = queries::get_reactions_for_messages(conn, &ids)?;
        let total_reactions: i64 = conn.query_row("SELECT COUNT(*) FROM reactions", [], |r| r.get(0))?;
        assert_eq!(reactions.len() as i64, total_reactions);
        Ok((messages.len(), markers.len(), reactions.len()))
    })
    .unwrap()
}

#[test]
fn failed_reaction_rolls_back_sent_messages_and_markers() {
    let db = Database::open_in_memory().unwrap();
    let onboarding = onboarding();
    let realm = bare_realm(&db, &onboarding, &["general", "haven", "sandbox"]);

    // The reaction is the last write of seeding: messages and markers are
    // already in when it fails.
    db.with_conn(|conn| {
        conn.execute_batch(
            "CREATE TRIGGER reject_reactions BEFORE INSERT ON reactions
             BEGIN SELECT RAISE(ABORT, 'reactions are read-only'); END;",
        )?;
        Ok(())
    })
    .unwrap();

    let err = onboarding.send_initial_realm_messages(&db, realm.id).unwrap_err();
    assert!(format!("{:#}", err).contains("reactions are read-only"));
    assert_eq!(seeded_rows(&db, realm.id), (0, 0, 0));

    // Nothing half-written blocks a retry.
    db.with_conn(|conn| {
        conn.execute_batch("DROP TRIGGER reject_reactions;")?;
        Ok(())
    })
    .unwrap();
    onboarding.send_initial_realm_messages(&db, realm.id).unwrap();
    assert_eq!(seeded_rows(&db, realm.id), (12, 12, 1));
}

#[test]
fn missing_channel_fails_seeding() {
    let db = Database::open_in_memory().unwrap();
    let onboarding = onboarding();
    let realm = bare_realm(&db, &onboarding, &["general", "haven"]);

    let err = onboarding.send_initial_realm_messages(&db, realm.id).unwrap_err();
    assert!(err.to_string().contains("sandbox"));
    assert_eq!(seeded_rows(&db, realm.id), (0, 0, 0));
}

#[test]
fn owner_receives_initial_direct_message() {
    let db = Database::open_in_memory().unwrap();
    let onboarding = onboarding();
    let (realm, owner) = create_realm(&db, &onboarding, OrgType::Education, true);
    let bot = welcome_bot(&db, &onboarding, realm.id);

    let conversation = db.get_direct_messages(bot.id, owner.id, 10).unwrap();
    assert_eq!(conversation.len(), 1);

    let dm = &conversation[0];
    assert_eq!(dm.sender_id, bot.id.to_string());
    assert_eq!(dm.recipient_user_id.as_deref(), Some(owner.id.to_string().as_str()));
    assert!(dm.disable_external_notifications);
    assert!(dm.content.contains("/help/using-haven-for-a-class"));
    assert!(dm.content.contains("/help/setting-up-haven-for-a-class"));
    assert!(dm.content.contains("**automatically deleted**"));
}

#[test]
fn member_of_demo_realm_gets_no_deletion_warning() {
    let db = Database::open_in_memory().unwrap();
    let onboarding = onboarding();
    let (realm, _) = create_realm(&db, &onboarding, OrgType::Business, true);
    let user = onboarding
        .register_user(&db, realm.id, &member("member@acme.test", UserRole::Member))
        .unwrap();
    let bot = welcome_bot(&db, &onboarding, realm.id);

    let conversation = db.get_direct_messages(bot.id, user.id, 10).unwrap();
    assert_eq!(conversation.len(), 1);
    assert!(!conversation[0].content.contains("automatically deleted"));
    assert!(!conversation[0].content.contains("We also have a guide"));
    assert!(conversation[0].content.contains("/help/getting-started-with-haven"));
}

#[test]
fn welcome_bot_answers_direct_messages() {
    let db = Database::open_in_memory().unwrap();
    let onboarding = onboarding();
    let (realm, owner) = create_realm(&db, &onboarding, OrgType::Business, false);
    let bot = welcome_bot(&db, &onboarding, realm.id);

    let inbound = InboundDirectMessage {
        sender: owner.clone(),
        recipient: bot.clone(),
        content: "HELP".into(),
    };
    let reply_id = db
        .transaction(|tx| onboarding.maybe_send_welcome_bot_response(tx, &inbound))
        .unwrap()
        .expect("welcome bot should reply");

    let reply = db
        .with_conn(|conn| queries::get_message_for_update(conn, reply_id))
        .unwrap()
        .unwrap();
    assert_eq!(reply.sender_id, bot.id.to_string());
    assert!(reply.disable_external_notifications);
    assert!(reply.content.starts_with(&format!(
        "Here are a few messages I understand: {}",
        bot_commands(true)
    )));

    // Bots writing to Welcome Bot get no answer, nor do humans writing to
    // other humans.
    let from_bot = InboundDirectMessage {
        sender: bot.clone(),
        recipient: bot.clone(),
        content: "help".into(),
    };
    let to_human = InboundDirectMessage {
        sender: owner.clone(),
        recipient: owner,
        content: "help".into(),
    };
    for message in [from_bot, to_human] {
        let reply = db
            .transaction(|tx| onboarding.maybe_send_welcome_bot_response(tx, &message))
            .unwrap();
        assert!(reply.is_none());
    }
}

#[test]
fn repair_after_startup_reports_nothing_missing() {
    let db = Database::open_in_memory().unwrap();
    let onboarding = onboarding();
    create_realm(&db, &onboarding, OrgType::Business, false);

    // A realm inserted behind onboarding's back has no bots.
    let bare = Realm {
        id: Uuid::new_v4(),
        name: "Imported".into(),
        org_type: OrgType::Community,
        default_language: "en".into(),
        demo_organization_scheduled_deletion_date: None,
        created_at: Utc::now(),
    };
    db.with_conn(|conn| queries::insert_realm(conn, &bare)).unwrap();

    assert!(db.with_conn(|conn| onboarding.missing_any_realm_internal_bots(conn)).unwrap());
    onboarding.create_if_missing_realm_internal_bots(&db).unwrap();
    assert!(!db.with_conn(|conn| onboarding.missing_any_realm_internal_bots(conn)).unwrap());
    onboarding.create_if_missing_realm_internal_bots(&db).unwrap();
    assert!(!db.with_conn(|conn| onboarding.missing_any_realm_internal_bots(conn)).unwrap());
}
