//! In-memory user directory.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, ServerError};
use crate::id::ObjectId;
use crate::user::{ProfileUpdate, User, UserDirectory};

#[derive(Clone, Copy)]
enum Counter {
    Followers,
    Following,
}

/// [`UserDirectory`] kept in process memory.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<ObjectId, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user. Follow edges pointing to it are left untouched.
    pub async fn remove(&self, id: &ObjectId) -> Option<User> {
        self.users.write().await.remove(id)
    }

    async fn add(&self, id: &ObjectId, counter: Counter, delta: i64) -> bool {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(id) else {
            return false;
        };

        let value = match counter {
            Counter::Followers => &mut user.followers_count,
            Counter::Following => &mut user.following_count,
        };

        if *value + delta < 0 {
            return false;
        }
        *value += delta;
        true
    }
}

fn username_taken(users: &HashMap<ObjectId, User>, username: &str, except: &ObjectId) -> bool {
    users
        .values()
        .any(|u| u.id != *except && u.username.as_deref() == Some(username))
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn get_by_external_identity(&self, firebase_uid: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.firebase_uid == firebase_uid)
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.id) || users.values().any(|u| u.firebase_uid == user.firebase_uid) {
            return Err(ServerError::Conflict("user already registered"));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(ServerError::Conflict("email already registered"));
        }
        if let Some(username) = &user.username {
            if username_taken(&users, username, &user.id) {
                return Err(ServerError::Conflict("username already taken"));
            }
        }

        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_profile(&self, id: &ObjectId, update: &ProfileUpdate) -> Result<Option<User>> {
        let mut users = self.users.write().await;

        if let Some(username) = &update.username {
            if username_taken(&users, username, id) {
                return Err(ServerError::Conflict("username already taken"));
            }
        }

        Ok(users.get_mut(id).map(|user| {
            user.apply(update);
            user.clone()
        }))
    }

    async fn increment_followers(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.add(id, Counter::Followers, 1).await)
    }

    async fn decrement_followers(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.add(id, Counter::Followers, -1).await)
    }

    async fn increment_following(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.add(id, Counter::Following, 1).await)
    }

    async fn decrement_following(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.add(id, Counter::Following, -1).await)
    }

    async fn exists_email(&self, email: &str) -> Result<bool> {
        let email = email.to_lowercase();
        Ok(self.users.read().await.values().any(|u| u.email == email))
    }

    async fn exists_username(&self, username: &str) -> Result<bool> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .any(|u| u.username.as_deref() == Some(username)))
    }

    async fn search(&self, query: &str, skip: u64, limit: u64) -> Result<(Vec<User>, u64)> {
        let query = query.to_lowercase();
        let matches = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|value| value.to_lowercase().contains(&query))
        };

        let users = self.users.read().await;
        let mut found: Vec<&User> = users
            .values()
            .filter(|u| {
                query.is_empty() || matches(&u.username) || matches(&u.first_name) || matches(&u.last_name)
            })
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username).then(a.id.cmp(&b.id)));

        let total = found.len() as u64;
        let page = found
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn ids(&self, skip: u64, limit: u64) -> Result<Vec<ObjectId>> {
        let users = self.users.read().await;
        let mut ids: Vec<ObjectId> = users.keys().copied().collect();
        ids.sort();

        Ok(ids.into_iter().skip(skip as usize).take(limit as usize).collect())
    }

    async fn set_counters(&self, id: &ObjectId, followers: i64, following: i64) -> Result<()> {
        if let Some(user) = self.users.write().await.get_mut(id) {
            user.followers_count = followers;
            user.following_count = following;
        }
        Ok(())
    }
}
