use crate::models::{Grade, MessageState, Notification, PostState, User};
use crate::routes::{ContentBody, Created, GradeResponse, JumpResponse, ProfileBody};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::create_thread,
        crate::routes::create_reply,
        crate::routes::edit_post,
        crate::routes::delete_post,
        crate::routes::get_thread,
        crate::routes::jump,
        crate::routes::list_messages,
        crate::routes::clear_messages,
        crate::routes::read_message,
        crate::routes::update_me,
        crate::routes::ban_user,
        crate::routes::mute_user,
    ),
    components(schemas(
        ContentBody, Created, ProfileBody, JumpResponse, GradeResponse,
        Notification, MessageState, PostState, Grade, User
    )),
    tags(
        (name = "posts", description = "Threads and replies"),
        (name = "messages", description = "Reply notifications"),
        (name = "moderation", description = "Ban and mute"),
    )
)]
pub struct ApiDoc;
