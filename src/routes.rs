use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::Auth;
use crate::error::ForumError;
use crate::forum::Forum;
use crate::models::*;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/threads").route(web::post().to(create_thread)))
            .service(web::resource("/threads/{tid}").route(web::get().to(get_thread)))
            .service(web::resource("/threads/{tid}/jump").route(web::get().to(jump)))
            .service(web::resource("/posts/{pid}/replies").route(web::post().to(create_reply)))
            .service(
                web::resource("/posts/{pid}")
                    .route(web::patch().to(edit_post))
                    .route(web::delete().to(delete_post)),
            )
            .service(web::resource("/messages").route(web::get().to(list_messages)))
            .service(web::resource("/messages/clear").route(web::post().to(clear_messages)))
            .service(web::resource("/messages/{pid}/read").route(web::post().to(read_message)))
            .service(web::resource("/me").route(web::patch().to(update_me)))
            // moderation
            .service(web::resource("/admin/users/{uid}/ban").route(web::post().to(ban_user)))
            .service(web::resource("/admin/users/{uid}/mute").route(web::post().to(mute_user))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub forum: Forum,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContentBody {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Created {
    pub pid: Pid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileBody {
    pub mail: String,
    pub name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JumpQuery {
    pub time: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JumpResponse {
    pub page: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MessagesQuery {
    pub before: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GradeResponse {
    pub uid: Uid,
    pub grade: Grade,
}

fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

async fn caller(data: &AppState, auth: &Auth) -> Result<Identity, ForumError> {
    data.forum.identify(auth.0).await
}

#[utoipa::path(
    post,
    path = "/api/v1/threads",
    request_body = ContentBody,
    responses(
        (status = 201, description = "Thread created", body = Created),
        (status = 401, description = "Unauthenticated"),
        (status = 403, description = "too_fast or muted"),
        (status = 422, description = "content_short")
    )
)]
pub async fn create_thread(auth: Auth, data: web::Data<AppState>, payload: web::Json<ContentBody>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    let pid = data.forum.create_thread(&who, &payload.content, now()).await?;
    Ok(HttpResponse::Created().json(Created { pid }))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{pid}/replies",
    params(("pid" = i64, Path, description = "Post being quoted")),
    request_body = ContentBody,
    responses(
        (status = 201, description = "Reply created", body = Created),
        (status = 403, description = "not_found, too_fast or muted"),
        (status = 429, description = "too_old: thread locked")
    )
)]
pub async fn create_reply(auth: Auth, data: web::Data<AppState>, path: web::Path<Pid>, payload: web::Json<ContentBody>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    let pid = data.forum.create_reply(&who, path.into_inner(), &payload.content, now()).await?;
    Ok(HttpResponse::Created().json(Created { pid }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/posts/{pid}",
    params(("pid" = i64, Path, description = "Post id")),
    request_body = ContentBody,
    responses(
        (status = 200, description = "Post edited"),
        (status = 403, description = "denied")
    )
)]
pub async fn edit_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Pid>, payload: web::Json<ContentBody>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    let post = data.forum.edit(&who, path.into_inner(), &payload.content, now()).await?;
    Ok(HttpResponse::Ok().json(post))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{pid}",
    params(("pid" = i64, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 410, description = "Gone")
    )
)]
pub async fn delete_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Pid>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    data.forum.soft_delete(&who, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/v1/threads/{tid}",
    params(("tid" = i64, Path, description = "Thread id"), PageQuery),
    responses(
        (status = 200, description = "Thread page"),
        (status = 410, description = "Gone")
    )
)]
pub async fn get_thread(data: web::Data<AppState>, path: web::Path<Pid>, query: web::Query<PageQuery>) -> Result<HttpResponse, ForumError> {
    let page = data.forum.thread_page(path.into_inner(), query.page.unwrap_or(1), now()).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/threads/{tid}/jump",
    params(("tid" = i64, Path, description = "Thread id"), JumpQuery),
    responses((status = 200, description = "Page holding the reply", body = JumpResponse))
)]
pub async fn jump(data: web::Data<AppState>, path: web::Path<Pid>, query: web::Query<JumpQuery>) -> Result<HttpResponse, ForumError> {
    let page = data.forum.jump_page(path.into_inner(), query.time).await?;
    Ok(HttpResponse::Ok().json(JumpResponse { page }))
}

#[utoipa::path(
    get,
    path = "/api/v1/messages",
    params(MessagesQuery),
    responses((status = 200, description = "Reply notifications", body = [Notification]))
)]
pub async fn list_messages(auth: Auth, data: web::Data<AppState>, query: web::Query<MessagesQuery>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    let list = data.forum.messages(&who, query.before).await?;
    Ok(HttpResponse::Ok().json(list))
}

#[utoipa::path(
    post,
    path = "/api/v1/messages/clear",
    responses((status = 204, description = "All notifications acknowledged"))
)]
pub async fn clear_messages(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    data.forum.mark_all_read(&who, now()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/messages/{pid}/read",
    params(("pid" = i64, Path, description = "Reply that triggered the notification")),
    responses(
        (status = 204, description = "Marked read"),
        (status = 410, description = "No unread notification for that reply")
    )
)]
pub async fn read_message(auth: Auth, data: web::Data<AppState>, path: web::Path<Pid>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    data.forum.mark_read(&who, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    patch,
    path = "/api/v1/me",
    request_body = ProfileBody,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 409, description = "Mail or name taken"),
        (status = 422, description = "Invalid mail or name")
    )
)]
pub async fn update_me(auth: Auth, data: web::Data<AppState>, payload: web::Json<ProfileBody>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    let user = data.forum.update_profile(&who, &payload.mail, &payload.name).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{uid}/ban",
    params(("uid" = i64, Path, description = "User to ban")),
    responses(
        (status = 200, description = "User banned", body = GradeResponse),
        (status = 403, description = "denied"),
        (status = 410, description = "Missing or privileged user")
    )
)]
pub async fn ban_user(auth: Auth, data: web::Data<AppState>, path: web::Path<Uid>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    let uid = path.into_inner();
    data.forum.ban(&who, uid).await?;
    Ok(HttpResponse::Ok().json(GradeResponse { uid, grade: Grade::BANNED }))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{uid}/mute",
    params(("uid" = i64, Path, description = "User to mute or unmute")),
    responses(
        (status = 200, description = "New grade", body = GradeResponse),
        (status = 403, description = "denied"),
        (status = 410, description = "Missing or privileged user")
    )
)]
pub async fn mute_user(auth: Auth, data: web::Data<AppState>, path: web::Path<Uid>) -> Result<HttpResponse, ForumError> {
    let who = caller(&data, &auth).await?;
    let uid = path.into_inner();
    let grade = data.forum.toggle_mute(&who, uid).await?;
    Ok(HttpResponse::Ok().json(GradeResponse { uid, grade }))
}
