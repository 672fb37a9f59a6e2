use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use haven_db::models::{MessageRow, ReactionRow};
use haven_db::queries;
use haven_onboarding::InboundDirectMessage;
use haven_onboarding::send::internal_send_private_message;
use haven_types::api::{Claims, MessageResponse, ReactionGroup, SendDirectMessageRequest};
use haven_types::models::Message;

use crate::auth::{AppState, internal_error, run_blocking};

const MAX_CONTENT_LEN: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// Send a direct message. When the recipient is Welcome Bot, its reply is
/// written in the same transaction.
pub async fn send_direct_message(
    State(state): State<AppState>,
    Path(recipient_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendDirectMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let content = req.content.trim().to_string();
    if content.is_empty() || content.len() > MAX_CONTENT_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let db = state.clone();
    let row = run_blocking(move || {
        let sender = db
            .db
            .get_user_by_id(claims.sub)
            .map_err(internal_error("Sender lookup failed"))?
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let recipient = db
            .db
            .get_user_by_id(recipient_id)
            .map_err(internal_error("Recipient lookup failed"))?
            .filter(|user| user.realm_id == sender.realm_id)
            .ok_or(StatusCode::NOT_FOUND)?;

        db.db
            .transaction(|tx| {
                let message_id = internal_send_private_message(tx, &sender, &recipient, &content, false)?;

                let inbound = InboundDirectMessage {
                    sender: sender.clone(),
                    recipient: recipient.clone(),
                    content: content.clone(),
                };
                if let Some(reply_id) = db.onboarding.maybe_send_welcome_bot_response(tx, &inbound)? {
                    debug!("Welcome Bot replied with message {}", reply_id);
                }

                queries::get_message_for_update(tx, message_id)?
                    .ok_or_else(|| anyhow::anyhow!("Message {} missing after insert", message_id))
            })
            .map_err(internal_error("Sending direct message failed"))
    })
    .await?;

    let response = message_response(row, Vec::new()).ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// The caller's direct conversation with `peer_id`, newest first.
pub async fn get_direct_messages(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let limit = query.limit.min(200);

    let (rows, reaction_rows) = run_blocking(move || {
        let rows = db
            .db
            .get_direct_messages(claims.sub, peer_id, limit)
            .map_err(internal_error("Loading direct messages failed"))?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let reaction_rows = db
            .db
            .get_reactions_for_messages(&ids)
            .map_err(internal_error("Loading reactions failed"))?;
        Ok((rows, reaction_rows))
    })
    .await?;

    Ok(Json(build_responses(rows, &reaction_rows)))
}

/// Channel history with grouped reactions, newest first. Channels of other
/// realms read as empty.
pub async fn get_channel_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let limit = query.limit.min(200);
    let realm_id = claims.realm_id.to_string();

    let (rows, reaction_rows) = run_blocking(move || {
        let mut rows = db
            .db
            .get_channel_messages(channel_id, limit)
            .map_err(internal_error("Loading channel messages failed"))?;
        rows.retain(|r| r.realm_id == realm_id);

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let reaction_rows = db
            .db
            .get_reactions_for_messages(&ids)
            .map_err(internal_error("Loading reactions failed"))?;
        Ok((rows, reaction_rows))
    })
    .await?;

    Ok(Json(build_responses(rows, &reaction_rows)))
}

fn build_responses(rows: Vec<MessageRow>, reaction_rows: &[ReactionRow]) -> Vec<MessageResponse> {
    let mut reactions = group_reactions(reaction_rows);
    rows.into_iter()
        .filter_map(|row| {
            let groups = reactions.remove(&row.id).unwrap_or_default();
            message_response(row, groups)
        })
        .collect()
}

/// Group reactions by message, then by emoji, in first-reacted order.
fn group_reactions(rows: &[ReactionRow]) -> HashMap<i64, Vec<ReactionGroup>> {
    let mut grouped: HashMap<i64, Vec<ReactionGroup>> = HashMap::new();
    for r in rows {
        let Ok(user_id) = r.user_id.parse::<Uuid>() else {
            warn!("Corrupt user_id '{}' on reaction to message {}", r.user_id, r.message_id);
            continue;
        };

        let groups = grouped.entry(r.message_id).or_default();
        match groups
            .iter_mut()
            .find(|g| g.emoji_name == r.emoji_name && g.emoji_code == r.emoji_code)
        {
            Some(group) => {
                group.count += 1;
                group.user_ids.push(user_id);
            }
            None => groups.push(ReactionGroup {
                emoji_name: r.emoji_name.clone(),
                emoji_code: r.emoji_code.clone(),
                count: 1,
                user_ids: vec![user_id],
            }),
        }
    }
    grouped
}

fn message_response(row: MessageRow, reactions: Vec<ReactionGroup>) -> Option<MessageResponse> {
    let id = row.id;
    let sender_full_name = row.sender_full_name.clone();
    let message = match Message::try_from(row) {
        Ok(message) => message,
        Err(e) => {
            warn!("Skipping corrupt message {}: {:#}", id, e);
            return None;
        }
    };

    Some(MessageResponse {
        id: message.id,
        sender_id: message.sender_id,
        sender_full_name,
        recipient: message.recipient,
        content: message.content,
        created_at: message.created_at,
        reactions,
    })
}
