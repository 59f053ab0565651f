//! HTTP endpoint handlers and wire types.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Path, Query, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use quill_core::{NewUser, NoteInput, NoteQuery, UserProfile};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::AppState;

/// `axum::Json` with the rejection remapped into the API error shape, so
/// malformed bodies come back as `ValidationError` like everything else.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(quill_core::Error::validation(
                rejection.body_text(),
                None,
            ))),
        }
    }
}

/// Catch-all for unmatched routes, keeping the error shape stable.
pub async fn fallback() -> ApiError {
    ApiError(quill_core::Error::NotFound("resource"))
}

// --- identity ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .service
        .register(NewUser {
            username: body.username,
            password: body.password,
            full_name: body.full_name,
        })
        .await?;
    let location = format!("/users/{}", profile.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(profile),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub auth_token: String,
    pub user: UserProfile,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .service
        .authenticate(&body.username, &body.password)
        .await?;
    let session = state.service.issue_token(&user).await?;
    Ok(Json(LoginResponse {
        auth_token: session.token,
        user: user.profile(),
    }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.service.profile(&owner).await?))
}

// --- folders ---

#[derive(Deserialize)]
pub struct NameRequest {
    pub name: Option<String>,
}

pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.list_folders(&owner).await?))
}

pub async fn get_folder(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.get_folder(&owner, &id).await?))
}

pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    JsonBody(body): JsonBody<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let folder = state
        .service
        .create_folder(&owner, body.name.as_deref().unwrap_or_default())
        .await?;
    let location = format!("/folders/{}", folder.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(folder),
    ))
}

pub async fn rename_folder(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let folder = state
        .service
        .rename_folder(&owner, &id, body.name.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(folder))
}

pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_folder(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- tags ---

pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.list_tags(&owner).await?))
}

pub async fn get_tag(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.get_tag(&owner, &id).await?))
}

pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    JsonBody(body): JsonBody<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state
        .service
        .create_tag(&owner, body.name.as_deref().unwrap_or_default())
        .await?;
    let location = format!("/tags/{}", tag.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(tag),
    ))
}

pub async fn rename_tag(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state
        .service
        .rename_tag(&owner, &id, body.name.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(tag))
}

pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_tag(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- notes ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub folder_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<NoteRequest> for NoteInput {
    fn from(body: NoteRequest) -> Self {
        NoteInput {
            title: body.title,
            content: body.content,
            folder_id: body.folder_id,
            tags: body.tags,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteListParams {
    pub search_term: Option<String>,
    pub folder_id: Option<String>,
}

pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Query(params): Query<NoteListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let notes = state
        .service
        .list_notes(
            &owner,
            NoteQuery {
                search_term: params.search_term,
                folder_id: params.folder_id,
            },
        )
        .await?;
    Ok(Json(notes))
}

pub async fn get_note(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.get_note(&owner, &id).await?))
}

pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    JsonBody(body): JsonBody<NoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.service.create_note(&owner, body.into()).await?;
    let location = format!("/notes/{}", note.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(note),
    ))
}

pub async fn update_note(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<NoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.service.update_note(&owner, &id, body.into()).await?;
    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_note(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
