mod auth;
mod health_check;
mod posts;
mod users;

pub use auth::{
    change_password, get_current_user, login, logout, refresh, register, AuthResponse,
    ChangePasswordRequest, LoginRequest, MessageResponse, RefreshRequest, RefreshResponse,
};
pub use health_check::{health_check, liveness, readiness, system_info, ServerInfo};
pub use posts::{
    create_post, delete_post, get_post, get_post_by_slug, list_posts, my_posts, search_posts,
    update_post,
};
pub use users::{
    delete_user, get_user, list_users, update_user, update_user_role, update_user_status,
};
