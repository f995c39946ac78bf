use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use log::{error, info, warn};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::config::AttachmentConfig;
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::{Attachment, TicketMessage};
use crate::core::shared::schema::{attachments, ticket_messages};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{normalize_optional, sanitize_file_name, with_conn, DbConn};
use crate::security::auth_api::AuthenticatedUser;
use crate::tickets::access::{ensure_can_post_message, ensure_can_view, message_visible};
use crate::tickets::handlers::load_ticket;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: Option<String>,
    pub message_id: Option<Uuid>,
}

/// Content type from the request header, falling back to the file extension.
pub fn resolve_content_type(headers: &HeaderMap, file_name: &str) -> String {
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_lowercase())
        .filter(|v| !v.is_empty() && v != OCTET_STREAM);

    declared.unwrap_or_else(|| {
        mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    })
}

pub fn validate_upload(
    config: &AttachmentConfig,
    file_name: Option<String>,
    headers: &HeaderMap,
    size: usize,
) -> DeskResult<(String, String)> {
    let raw_name = normalize_optional(file_name)
        .ok_or_else(|| DeskError::validation("file_name query parameter is required"))?;
    if size == 0 {
        return Err(DeskError::validation("Attachment is empty"));
    }
    if size as u64 > config.max_size_bytes {
        return Err(DeskError::validation(format!(
            "Attachment exceeds the {} byte limit",
            config.max_size_bytes
        )));
    }

    let content_type = resolve_content_type(headers, &raw_name);
    if !config.is_allowed(&content_type) {
        return Err(DeskError::validation(format!(
            "Content type {} is not allowed",
            content_type
        )));
    }

    Ok((sanitize_file_name(&raw_name), content_type))
}

pub fn storage_path(config: &AttachmentConfig, ticket_id: Uuid, id: Uuid, file_name: &str) -> PathBuf {
    PathBuf::from(&config.storage_dir)
        .join(ticket_id.to_string())
        .join(format!("{}-{}", id, file_name))
}

fn internal_message_ids(conn: &mut DbConn, ticket_id: Uuid) -> DeskResult<Vec<Uuid>> {
    Ok(ticket_messages::table
        .filter(ticket_messages::ticket_id.eq(ticket_id))
        .filter(ticket_messages::is_internal.eq(true))
        .select(ticket_messages::id)
        .load(conn)?)
}

/// Attachments of a ticket, without those hanging off notes the user cannot read.
pub fn load_visible_attachments(
    conn: &mut DbConn,
    user: &AuthenticatedUser,
    ticket_id: Uuid,
) -> DeskResult<Vec<Attachment>> {
    let rows: Vec<Attachment> = attachments::table
        .filter(attachments::ticket_id.eq(ticket_id))
        .order(attachments::created_at.asc())
        .load(conn)?;

    if user.is_handler() {
        return Ok(rows);
    }
    let hidden = internal_message_ids(conn, ticket_id)?;
    Ok(rows
        .into_iter()
        .filter(|a| a.message_id.map_or(true, |m| !hidden.contains(&m)))
        .collect())
}

pub async fn handle_upload_attachment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Attachment>), DeskError> {
    let (file_name, content_type) =
        validate_upload(&state.config.attachments, query.file_name, &headers, body.len())?;
    let message_id = query.message_id;

    let check_user = user.clone();
    with_conn(&state.conn, move |conn| {
        let ticket = load_ticket(conn, ticket_id)?;
        let is_internal = match message_id {
            Some(mid) => {
                let message: TicketMessage = ticket_messages::table
                    .find(mid)
                    .filter(ticket_messages::ticket_id.eq(ticket.id))
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| DeskError::validation("Message does not belong to this ticket"))?;
                message.is_internal
            }
            None => false,
        };
        ensure_can_post_message(&check_user, &ticket, is_internal)
    })
    .await?;

    let id = Uuid::new_v4();
    let path = storage_path(&state.config.attachments, ticket_id, id, &file_name);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&path, &body).await?;

    let attachment = Attachment {
        id,
        ticket_id,
        message_id,
        uploader_id: user.user_id,
        file_name,
        content_type,
        size_bytes: body.len() as i64,
        storage_path: path.to_string_lossy().into_owned(),
        created_at: Utc::now(),
    };

    let row = attachment.clone();
    let inserted = with_conn(&state.conn, move |conn| {
        diesel::insert_into(attachments::table)
            .values(&row)
            .execute(conn)?;
        Ok(())
    })
    .await;

    if let Err(e) = inserted {
        if let Err(rm) = tokio::fs::remove_file(&path).await {
            warn!("Could not remove orphaned upload {}: {}", path.display(), rm);
        }
        return Err(e);
    }

    info!(
        "Attachment {} ({} bytes) added to ticket {} by {}",
        attachment.id, attachment.size_bytes, ticket_id, user.user_id
    );
    Ok((StatusCode::CREATED, Json(attachment)))
}

pub async fn handle_list_attachments(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<Attachment>>, DeskError> {
    let rows = with_conn(&state.conn, move |conn| {
        let ticket = load_ticket(conn, ticket_id)?;
        ensure_can_view(&user, &ticket)?;
        load_visible_attachments(conn, &user, ticket.id)
    })
    .await?;

    Ok(Json(rows))
}

pub async fn handle_download_attachment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, DeskError> {
    let attachment = with_conn(&state.conn, move |conn| {
        let attachment: Attachment = attachments::table
            .find(id)
            .first(conn)
            .optional()?
            .ok_or_else(|| DeskError::not_found("Attachment"))?;
        let ticket = load_ticket(conn, attachment.ticket_id)?;
        ensure_can_view(&user, &ticket)?;

        if let Some(mid) = attachment.message_id {
            let is_internal: bool = ticket_messages::table
                .find(mid)
                .select(ticket_messages::is_internal)
                .first(conn)
                .optional()?
                .unwrap_or(false);
            if !message_visible(&user, is_internal) {
                return Err(DeskError::not_found("Attachment"));
            }
        }
        Ok(attachment)
    })
    .await?;

    let bytes = tokio::fs::read(&attachment.storage_path).await.map_err(|e| {
        error!(
            "Attachment {} missing on disk at {}: {}",
            attachment.id, attachment.storage_path, e
        );
        DeskError::not_found("Attachment file")
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, attachment.content_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", attachment.file_name),
        )
        .body(Body::from(bytes))
        .map_err(|e| DeskError::Internal(e.to_string()))
}
