/// Blog post routes
///
/// Published posts are public. Drafts and archived posts are visible only to
/// their author and to admins; to everyone else they do not exist.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::middleware::{AuthContext, Authenticated, MaybeAuthenticated};
use crate::models::{Page, PageMeta, PageRequest, Post, PostStatus};
use crate::store::{PostStore, StoreError};
use crate::validators::{validate_excerpt, validate_post_content, validate_post_title};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchPostsQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<String>,
}

fn post_not_found(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AppError::NotFound("post"),
        other => AppError::Store(other),
    }
}

fn parse_status(status: Option<&str>) -> Result<Option<PostStatus>, AppError> {
    Ok(status.map(str::parse::<PostStatus>).transpose()?)
}

/// Load a post the caller is allowed to manage
async fn load_managed(posts: &dyn PostStore, id: Uuid, caller: &Authenticated) -> Result<Post, AppError> {
    let post = posts.find_by_id(id).await?.ok_or(AppError::NotFound("post"))?;
    if !caller.can_manage(post.author_id) {
        return Err(AppError::forbidden("You can only modify your own posts"));
    }
    Ok(post)
}

/// Drafts and archived posts exist only for their author and admins
fn visible_to(post: &Post, caller: Option<&AuthContext>) -> bool {
    post.is_published() || caller.map_or(false, |ctx| ctx.can_manage(post.author_id))
}

/// Count a read of a published post; a failed increment never fails the read
async fn record_view(posts: &dyn PostStore, post: &mut Post) {
    if !post.is_published() {
        return;
    }
    match posts.increment_views(post.id).await {
        Ok(()) => post.view_count += 1,
        Err(e) => tracing::warn!(post_id = %post.id, error = %e, "Failed to record post view"),
    }
}

/// GET /api/v1/posts
///
/// Admins see every post; everyone else sees published posts only.
pub async fn list_posts(
    caller: MaybeAuthenticated,
    query: web::Query<PageRequest>,
    posts: web::Data<dyn PostStore>,
) -> Result<HttpResponse, AppError> {
    let page = query.into_inner();
    let is_admin = caller.0.as_ref().map_or(false, AuthContext::is_admin);
    let (data, total) = if is_admin {
        posts.list_all(&page).await?
    } else {
        posts.list_published(&page).await?
    };
    Ok(HttpResponse::Ok().json(Page {
        data,
        meta: PageMeta::new(&page, total),
    }))
}

/// GET /api/v1/posts/search?q=
pub async fn search_posts(
    query: web::Query<SearchPostsQuery>,
    posts: web::Data<dyn PostStore>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ValidationError::EmptyField("q".to_string()))?;
    if needle.chars().count() > 100 {
        return Err(ValidationError::TooLong("q".to_string(), 100).into());
    }

    let page = PageRequest {
        page: query.page,
        page_size: query.page_size,
    };
    let (data, total) = posts.search(needle, &page).await?;
    Ok(HttpResponse::Ok().json(Page {
        data,
        meta: PageMeta::new(&page, total),
    }))
}

/// GET /api/v1/posts/{id}
pub async fn get_post(
    caller: MaybeAuthenticated,
    path: web::Path<Uuid>,
    posts: web::Data<dyn PostStore>,
) -> Result<HttpResponse, AppError> {
    let mut post = posts
        .find_by_id(path.into_inner())
        .await?
        .filter(|p| visible_to(p, caller.0.as_ref()))
        .ok_or(AppError::NotFound("post"))?;

    record_view(posts.get_ref(), &mut post).await;
    Ok(HttpResponse::Ok().json(post))
}

/// GET /api/v1/posts/slug/{slug}
pub async fn get_post_by_slug(
    caller: MaybeAuthenticated,
    path: web::Path<String>,
    posts: web::Data<dyn PostStore>,
) -> Result<HttpResponse, AppError> {
    let mut post = posts
        .find_by_slug(&path.into_inner())
        .await?
        .filter(|p| visible_to(p, caller.0.as_ref()))
        .ok_or(AppError::NotFound("post"))?;

    record_view(posts.get_ref(), &mut post).await;
    Ok(HttpResponse::Ok().json(post))
}

/// POST /api/v1/posts
pub async fn create_post(
    caller: Authenticated,
    form: web::Json<CreatePostRequest>,
    posts: web::Data<dyn PostStore>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let title = validate_post_title(&form.title)?;
    let content = validate_post_content(&form.content)?;
    let excerpt = validate_excerpt(form.excerpt.as_deref().unwrap_or_default())?;
    let status = parse_status(form.status.as_deref())?.unwrap_or(PostStatus::Draft);

    let post = Post::new(caller.user_id(), title, content, excerpt, status);
    posts.create(&post).await?;

    tracing::info!(post_id = %post.id, author_id = %post.author_id, status = %post.status, "Post created");
    Ok(HttpResponse::Created().json(post))
}

/// GET /api/v1/posts/my
///
/// The caller's own posts, drafts included.
pub async fn my_posts(
    caller: Authenticated,
    query: web::Query<PageRequest>,
    posts: web::Data<dyn PostStore>,
) -> Result<HttpResponse, AppError> {
    let page = query.into_inner();
    let (data, total) = posts.list_by_author(caller.user_id(), &page).await?;
    Ok(HttpResponse::Ok().json(Page {
        data,
        meta: PageMeta::new(&page, total),
    }))
}

/// PUT /api/v1/posts/{id} (author or admin)
pub async fn update_post(
    caller: Authenticated,
    path: web::Path<Uuid>,
    form: web::Json<UpdatePostRequest>,
    posts: web::Data<dyn PostStore>,
) -> Result<HttpResponse, AppError> {
    let mut post = load_managed(posts.get_ref(), path.into_inner(), &caller).await?;
    let form = form.into_inner();

    if let Some(title) = form.title {
        post.title = validate_post_title(&title)?;
    }
    if let Some(content) = form.content {
        post.content = validate_post_content(&content)?;
    }
    if let Some(excerpt) = form.excerpt {
        post.excerpt = validate_excerpt(&excerpt)?;
    }
    if let Some(status) = parse_status(form.status.as_deref())? {
        post.status = status;
    }

    posts.update(&post).await.map_err(post_not_found)?;
    tracing::info!(post_id = %post.id, updated_by = %caller.user_id(), "Post updated");
    Ok(HttpResponse::Ok().json(post))
}

/// DELETE /api/v1/posts/{id} (author or admin)
pub async fn delete_post(
    caller: Authenticated,
    path: web::Path<Uuid>,
    posts: web::Data<dyn PostStore>,
) -> Result<HttpResponse, AppError> {
    let post = load_managed(posts.get_ref(), path.into_inner(), &caller).await?;

    posts.delete(post.id).await.map_err(post_not_found)?;
    tracing::info!(post_id = %post.id, deleted_by = %caller.user_id(), "Post deleted");
    Ok(HttpResponse::NoContent().finish())
}
