/// User management routes
///
/// Everything here sits behind the required guard; delete, status and role
/// changes are additionally gated on the admin role.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::middleware::Authenticated;
use crate::models::{Page, PageMeta, PageRequest, ProfileUpdate, Role, UserResponse, UserStatus};
use crate::store::{StoreError, UserStore};
use crate::validators::{validate_avatar, validate_bio, validate_name, validate_phone_number};

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StatusChange {
    pub status: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RoleChange {
    pub role: String,
}

fn user_not_found(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AppError::NotFound("user"),
        other => AppError::Store(other),
    }
}

/// GET /api/v1/users
pub async fn list_users(
    _caller: Authenticated,
    query: web::Query<ListUsersQuery>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = PageRequest {
        page: query.page,
        page_size: query.page_size,
    };
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (found, total) = users.list(search, &page).await?;
    Ok(HttpResponse::Ok().json(Page {
        data: found.iter().map(UserResponse::from).collect(),
        meta: PageMeta::new(&page, total),
    }))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    _caller: Authenticated,
    path: web::Path<Uuid>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let user = users
        .find_by_id(path.into_inner())
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// PUT /api/v1/users/{id}
///
/// Callers may edit their own profile; admins may edit anyone's.
pub async fn update_user(
    caller: Authenticated,
    path: web::Path<Uuid>,
    form: web::Json<ProfileUpdate>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if !caller.can_manage(id) {
        return Err(AppError::forbidden("You can only update your own profile"));
    }

    let form = form.into_inner();
    let update = ProfileUpdate {
        first_name: form.first_name.map(|v| validate_name("first_name", &v)).transpose()?,
        last_name: form.last_name.map(|v| validate_name("last_name", &v)).transpose()?,
        bio: form.bio.map(|v| validate_bio(&v)).transpose()?,
        avatar: form.avatar.map(|v| validate_avatar(&v)).transpose()?,
        phone_number: form.phone_number.map(|v| validate_phone_number(&v)).transpose()?,
    };

    let user = users.update_profile(id, &update).await.map_err(user_not_found)?;
    tracing::info!(user_id = %id, updated_by = %caller.user_id(), "Profile updated");
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// DELETE /api/v1/users/{id} (admin)
pub async fn delete_user(
    caller: Authenticated,
    path: web::Path<Uuid>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if id == caller.user_id() {
        return Err(ValidationError::rule("id", "You cannot delete your own account").into());
    }

    users.delete(id).await.map_err(user_not_found)?;
    tracing::info!(user_id = %id, deleted_by = %caller.user_id(), "User deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// PATCH /api/v1/users/{id}/status (admin)
pub async fn update_user_status(
    caller: Authenticated,
    path: web::Path<Uuid>,
    form: web::Json<StatusChange>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let status: UserStatus = form.status.parse()?;

    users.update_status(id, status).await.map_err(user_not_found)?;
    let user = users.find_by_id(id).await?.ok_or(AppError::NotFound("user"))?;

    tracing::info!(user_id = %id, status = %status, changed_by = %caller.user_id(), "User status changed");
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// PATCH /api/v1/users/{id}/role (admin)
///
/// Admins cannot change their own role, so the last admin cannot demote
/// themselves by accident.
pub async fn update_user_role(
    caller: Authenticated,
    path: web::Path<Uuid>,
    form: web::Json<RoleChange>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let role: Role = form.role.parse()?;
    if id == caller.user_id() {
        return Err(AppError::forbidden("You cannot change your own role"));
    }

    users.update_role(id, role).await.map_err(user_not_found)?;
    let user = users.find_by_id(id).await?.ok_or(AppError::NotFound("user"))?;

    tracing::info!(user_id = %id, role = %role, changed_by = %caller.user_id(), "User role changed");
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}
