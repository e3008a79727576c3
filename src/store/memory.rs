use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{PostStore, StoreError, StoreResult, UserStore};
use crate::models::{PageRequest, Post, ProfileUpdate, Role, User, UserStatus};

/// Process-local user store
///
/// Logical deletion is modelled by moving the record out of the live map.
/// Every compare-and-swap runs under the write lock.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, User>> {
        self.users.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, User>> {
        self.users.write().unwrap_or_else(|e| e.into_inner())
    }

    fn modify<F>(&self, id: Uuid, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.write();
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        f(user);
        Ok(())
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: &PageRequest) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let data = items
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(page.page_size() as usize)
        .collect();
    (data, total)
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.read().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.read().values().find(|u| u.email == email).cloned())
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        Ok(self.read().values().any(|u| u.email == email))
    }

    async fn create(&self, user: &User) -> StoreResult<()> {
        let mut users = self.write();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("id {}", user.id)));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<User> {
        let mut users = self.write();
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        update.apply(user);
        Ok(user.clone())
    }

    async fn update_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> StoreResult<()> {
        self.modify(id, |user| {
            user.refresh_token_hash = token_hash.map(str::to_owned);
            user.updated_at = Utc::now();
        })
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> StoreResult<bool> {
        let mut users = self.write();
        let user = match users.get_mut(&id) {
            Some(user) => user,
            None => return Ok(false),
        };
        if user.refresh_token_hash.as_deref() != Some(expected) {
            return Ok(false);
        }
        user.refresh_token_hash = Some(replacement.to_owned());
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_status(&self, id: Uuid, status: UserStatus) -> StoreResult<()> {
        self.modify(id, |user| {
            user.status = status;
            user.updated_at = Utc::now();
        })
    }

    async fn update_role(&self, id: Uuid, role: Role) -> StoreResult<()> {
        self.modify(id, |user| {
            user.role = role;
            user.updated_at = Utc::now();
        })
    }

    async fn replace_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        self.modify(id, |user| {
            user.password_hash = password_hash.to_owned();
            user.refresh_token_hash = None;
            user.updated_at = Utc::now();
        })
    }

    async fn touch_last_login(&self, id: Uuid) -> StoreResult<()> {
        self.modify(id, |user| user.last_login_at = Some(Utc::now()))
    }

    async fn list(&self, search: Option<&str>, page: &PageRequest) -> StoreResult<(Vec<User>, i64)> {
        let needle = search.map(str::to_lowercase);
        let mut matches: Vec<User> = self
            .read()
            .values()
            .filter(|u| match &needle {
                Some(n) => {
                    u.email.to_lowercase().contains(n)
                        || u.first_name.to_lowercase().contains(n)
                        || u.last_name.to_lowercase().contains(n)
                }
                None => true,
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matches, page))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.write().remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPostStore {
    posts: RwLock<HashMap<Uuid, Post>>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Post>> {
        self.posts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Post>> {
        self.posts.write().unwrap_or_else(|e| e.into_inner())
    }

    fn newest_first<P>(&self, predicate: P) -> Vec<Post>
    where
        P: Fn(&Post) -> bool,
    {
        let mut posts: Vec<Post> = self.read().values().filter(|p| predicate(p)).cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn create(&self, post: &Post) -> StoreResult<()> {
        let mut posts = self.write();
        if posts.contains_key(&post.id) {
            return Err(StoreError::Duplicate(format!("post {}", post.id)));
        }
        posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.read().get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Post>> {
        Ok(self.read().values().find(|p| p.slug == slug).cloned())
    }

    async fn list_all(&self, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)> {
        Ok(paginate(self.newest_first(|_| true), page))
    }

    async fn list_published(&self, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)> {
        Ok(paginate(self.newest_first(Post::is_published), page))
    }

    async fn list_by_author(&self, author_id: Uuid, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)> {
        Ok(paginate(self.newest_first(|p| p.author_id == author_id), page))
    }

    async fn search(&self, query: &str, page: &PageRequest) -> StoreResult<(Vec<Post>, i64)> {
        let needle = query.to_lowercase();
        let hits = self.newest_first(|p| {
            p.is_published()
                && (p.title.to_lowercase().contains(&needle) || p.content.to_lowercase().contains(&needle))
        });
        Ok(paginate(hits, page))
    }

    async fn update(&self, post: &Post) -> StoreResult<()> {
        let mut posts = self.write();
        let stored = posts.get_mut(&post.id).ok_or(StoreError::NotFound)?;
        *stored = Post {
            updated_at: Utc::now(),
            ..post.clone()
        };
        Ok(())
    }

    async fn increment_views(&self, id: Uuid) -> StoreResult<()> {
        let mut posts = self.write();
        let post = posts.get_mut(&id).ok_or(StoreError::NotFound)?;
        post.view_count += 1;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.write().remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}
