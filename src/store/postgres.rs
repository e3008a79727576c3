/// PostgreSQL-backed stores
///
/// Queries are plain runtime-checked `sqlx::query*` calls against the schema
/// in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{PostStore, StoreError, StoreResult, UserStore};
use crate::models::{PageRequest, Post, ProfileUpdate, Role, User, UserStatus};

const USER_COLUMNS: &str = "id, email, first_name, last_name, password_hash, role, status, \
    refresh_token_hash, bio, avatar, phone_number, last_login_at, created_at, updated_at";

const POST_COLUMNS: &str =
    "id, author_id, title, slug, content, excerpt, status, view_count, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role: String,
    status: String,
    refresh_token_hash: Option<String>,
    bio: Option<String>,
    avatar: Option<String>,
    phone_number: Option<String>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| StoreError::Corrupt(format!("user {} has role '{}'", row.id, row.role)))?;
        let status = row
            .status
            .parse::<UserStatus>()
            .map_err(|_| StoreError::Corrupt(format!("user {} has status '{}'", row.id, row.status)))?;

        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            role,
            status,
            refresh_token_hash: row.refresh_token_hash,
            bio: row.bio,
            avatar: row.avatar,
            phone_number: row.phone_number,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    slug: String,
    content: String,
    excerpt: String,
    status: String,
    view_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("post {} has status '{}'", row.id, row.status)))?;

        Ok(Post {
            id: row.id,
            author_id: row.author_id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            excerpt: row.excerpt,
            status,
            view_count: row.view_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escape LIKE metacharacters and wrap for a substring match
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn expect_one(rows_affected: u64) -> StoreResult<()> {
    if rows_affected == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND deleted_at IS NULL)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, password_hash, role, status,
                               refresh_token_hash, bio, avatar, phone_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(&user.refresh_token_hash)
        .bind(&user.bio)
        .bind(&user.avatar)
        .bind(&user.phone_number)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                bio = COALESCE($4, bio),
                avatar = COALESCE($5, avatar),
                phone_number = COALESCE($6, phone_number),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(&update.bio)
            .bind(&update.avatar)
            .bind(&update.phone_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
            .and_then(User::try_from)
    }

    async fn update_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> StoreResult<bool> {
        // Single conditional write: the row lock taken by UPDATE serialises
        // concurrent rotations, and only the first sees `expected`.
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3, updated_at = NOW() \
             WHERE id = $1 AND refresh_token_hash = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(expected)
        .bind(replacement)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_status(&self, id: Uuid, status: UserStatus) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected())
    }

    async fn replace_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, refresh_token_hash = NULL, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected())
    }

    async fn touch_last_login(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET last_login_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected())
    }

    async fn list(&self, search: Option<&str>, page: &PageRequest) -> StoreResult<(Vec<User>, i64)> {
        let pattern = search.map(like_pattern);
        let filter = "deleted_at IS NULL AND ($1::TEXT IS NULL \
            OR email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1)";

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let users = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&pattern)
            .bind(page.page_size())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok((users, total))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), refresh_token_hash = NULL \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One page of posts matching `filter`
    ///
    /// `filter` may narrow further with `$1` (author id) and `$2` (ILIKE
    /// pattern over title and content); either is ignored when `None`.
    async fn page_where(
        &self,
        filter: &str,
        author_id: Option<Uuid>,
        pattern: Option<String>,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Post>, i64)> {
        let filter = format!(
            "{filter} AND ($1::UUID IS NULL OR author_id = $1) \
             AND ($2::TEXT IS NULL OR title ILIKE $2 OR content ILIKE $2)"
        );

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM posts WHERE {filter}"))
            .bind(author_id)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE {filter} \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        );
        let posts = sqlx::query_as::<_, PostRow>(&sql)
            .bind(author_id)
            .bind(&pattern)
            .bind(page.page_size())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Post::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok((posts, total))
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create(&self, post: &Post) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, title, slug, content, excerpt, status, view_count,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.status.as_str())
        .bind(post.view_count)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = $1");
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn list_all(&self, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)> {
        self.page_where("TRUE", None, None, page).await
    }

    async fn list_published(&self, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)> {
        self.page_where("status = 'published'", None, None, page).await
    }

    async fn list_by_author(&self, author_id: Uuid, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)> {
        self.page_where("TRUE", Some(author_id), None, page).await
    }

    async fn search(&self, query: &str, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)> {
        self.page_where("status = 'published'", None, Some(like_pattern(query)), page)
            .await
    }

    async fn update(&self, post: &Post) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = $2, content = $3, excerpt = $4, status = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.status.as_str())
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected())
    }

    async fn increment_views(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected())
    }
}
