use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use agentim_domain::error::{Error, Result};
use agentim_domain::room::{Member, Room, MAX_SYSTEM_PROMPT_CHARS};

use super::error::{ok_json, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub broadcast_mode: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn validate_system_prompt(system_prompt: &Option<String>) -> Result<()> {
    if let Some(p) = system_prompt {
        if p.chars().count() > MAX_SYSTEM_PROMPT_CHARS {
            return Err(Error::Validation(format!(
                "system_prompt exceeds {MAX_SYSTEM_PROMPT_CHARS} characters"
            )));
        }
    }
    Ok(())
}

/// POST /v1/rooms
pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> impl IntoResponse {
    match create_room_inner(&state, req).await {
        Ok(room) => ok_json(room),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn create_room_inner(state: &AppState, req: CreateRoomRequest) -> Result<Room> {
    validate_system_prompt(&req.system_prompt)?;
    let room = Room {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        broadcast_mode: req.broadcast_mode,
        system_prompt: req.system_prompt,
        members: Vec::new(),
    };
    state.rooms.save(room.clone()).await?;
    Ok(room)
}

/// GET /v1/rooms/:id
pub async fn get_room(State(state): State<AppState>, Path(room_id): Path<String>) -> impl IntoResponse {
    match state.rooms.get(&room_id).await {
        Ok(room) => ok_json(room),
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoomRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub broadcast_mode: Option<bool>,
    #[serde(default)]
    pub system_prompt: Option<Option<String>>,
}

/// PUT /v1/rooms/:id
pub async fn update_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<UpdateRoomRequest>,
) -> impl IntoResponse {
    match update_room_inner(&state, &room_id, req).await {
        Ok(room) => ok_json(room),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn update_room_inner(state: &AppState, room_id: &str, req: UpdateRoomRequest) -> Result<Room> {
    let mut room = state.rooms.get(room_id).await?;
    if let Some(name) = req.name {
        room.name = name;
    }
    if let Some(broadcast_mode) = req.broadcast_mode {
        room.broadcast_mode = broadcast_mode;
    }
    if let Some(system_prompt) = req.system_prompt {
        validate_system_prompt(&system_prompt)?;
        room.system_prompt = system_prompt;
    }
    state.rooms.save(room.clone()).await?;
    Ok(room)
}

/// POST /v1/rooms/:id/members
pub async fn add_member(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(member): Json<Member>,
) -> impl IntoResponse {
    match add_member_inner(&state, &room_id, member).await {
        Ok(room) => ok_json(room),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn add_member_inner(state: &AppState, room_id: &str, member: Member) -> Result<Room> {
    let mut room = state.rooms.get(room_id).await?;
    if room.is_member(&member.id) {
        return Err(Error::Validation(format!("member {} already in room", member.id)));
    }
    room.members.push(member);
    state.rooms.save(room.clone()).await?;
    Ok(room)
}

/// DELETE /v1/rooms/:id/members/:member_id
pub async fn remove_member(
    State(state): State<AppState>,
    Path((room_id, member_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match remove_member_inner(&state, &room_id, &member_id).await {
        Ok(room) => ok_json(room),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn remove_member_inner(state: &AppState, room_id: &str, member_id: &str) -> Result<Room> {
    let mut room = state.rooms.get(room_id).await?;
    let before = room.members.len();
    room.members.retain(|m| m.id != member_id);
    if room.members.len() == before {
        return Err(Error::Validation(format!("member {member_id} not in room")));
    }
    state.rooms.save(room.clone()).await?;
    Ok(room)
}
