//! In-memory store adapters for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use photopoet_core::creation::{Creation, DetailsUpdate, ImageRef, NewCreation};
use photopoet_core::error::CoreError;
use photopoet_core::history::sort_newest_first;
use photopoet_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::password_reset::{CreatePasswordReset, PasswordResetToken};
use crate::models::session::{CreateSession, UserSession};
use crate::models::user::User;
use crate::store::{CreationStore, IdentityStore};

#[derive(Default)]
struct Tables {
    next_id: DbId,
    last_tick: Option<Timestamp>,
    creations: HashMap<DbId, Creation>,
    users: HashMap<DbId, User>,
    sessions: HashMap<DbId, UserSession>,
    reset_tokens: HashMap<DbId, PasswordResetToken>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    /// Wall clock, nudged forward so successive writes never share a timestamp.
    fn tick(&mut self) -> Timestamp {
        let mut now = Utc::now();
        if let Some(last) = self.last_tick {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_tick = Some(now);
        now
    }
}

/// Both store traits over process memory. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreationStore for MemoryStore {
    async fn create(&self, input: NewCreation) -> Result<Creation, CoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let now = tables.tick();
        let creation = Creation {
            id,
            owner_id: input.owner_id,
            image: input.image,
            photo_file_name: input.photo_file_name,
            style: input.style,
            poem: input.poem,
            title: None,
            note: None,
            share_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.creations.insert(id, creation.clone());
        Ok(creation)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Creation>, CoreError> {
        Ok(self.tables.read().await.creations.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: DbId) -> Result<Vec<Creation>, CoreError> {
        let tables = self.tables.read().await;
        let mut items: Vec<Creation> = tables
            .creations
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        sort_newest_first(&mut items);
        Ok(items)
    }

    async fn update_details(
        &self,
        id: DbId,
        update: &DetailsUpdate,
    ) -> Result<Option<Creation>, CoreError> {
        update.validate()?;
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        let Some(creation) = tables.creations.get_mut(&id) else {
            return Ok(None);
        };
        let (title, note) = update.resolve(creation.title.take(), creation.note.take());
        creation.title = title;
        creation.note = note;
        creation.updated_at = now;
        Ok(Some(creation.clone()))
    }

    async fn delete(&self, id: DbId) -> Result<Option<Creation>, CoreError> {
        Ok(self.tables.write().await.creations.remove(&id))
    }

    async fn assign_share_id(&self, id: DbId) -> Result<Option<Creation>, CoreError> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        let Some(creation) = tables.creations.get_mut(&id) else {
            return Ok(None);
        };
        if creation.share_id.is_none() {
            creation.share_id = Some(Uuid::new_v4());
            creation.updated_at = now;
        }
        Ok(Some(creation.clone()))
    }

    async fn find_by_share_id(&self, share_id: Uuid) -> Result<Option<Creation>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .creations
            .values()
            .find(|c| c.share_id == Some(share_id))
            .cloned())
    }

    async fn replace_image(
        &self,
        id: DbId,
        image: ImageRef,
    ) -> Result<Option<Creation>, CoreError> {
        if !matches!(image, ImageRef::Blob { .. }) {
            return Err(CoreError::Validation(
                "Replacement image must be a blob reference".into(),
            ));
        }
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        let Some(creation) = tables.creations.get_mut(&id) else {
            return Ok(None);
        };
        if !matches!(creation.image, ImageRef::Inline { .. }) {
            return Ok(None);
        }
        creation.image = image;
        creation.updated_at = now;
        Ok(Some(creation.clone()))
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn create_anonymous(&self) -> Result<User, CoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let now = tables.tick();
        let user = User {
            id,
            email: None,
            password_hash: None,
            is_anonymous: true,
            failed_login_count: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn create_registered(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<User, CoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email.as_deref() == Some(email))
        {
            return Err(CoreError::Conflict(
                "An account with this email already exists".into(),
            ));
        }
        let id = tables.next_id();
        let now = tables.tick();
        let user = User {
            id,
            email: Some(email.to_string()),
            password_hash: Some(password_hash.to_string()),
            is_anonymous: false,
            failed_login_count: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: DbId) -> Result<Option<User>, CoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn record_failed_login(
        &self,
        id: DbId,
        lock_until: Option<Timestamp>,
    ) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        if let Some(user) = tables.users.get_mut(&id) {
            user.failed_login_count += 1;
            if lock_until.is_some() {
                user.locked_until = lock_until;
            }
            user.updated_at = now;
        }
        Ok(())
    }

    async fn record_successful_login(&self, id: DbId) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        if let Some(user) = tables.users.get_mut(&id) {
            user.failed_login_count = 0;
            user.locked_until = None;
            user.last_login_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, CoreError> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        match tables.users.get_mut(&id) {
            Some(user) if !user.is_anonymous => {
                user.password_hash = Some(password_hash.to_string());
                user.failed_login_count = 0;
                user.locked_until = None;
                user.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_session(&self, input: CreateSession) -> Result<UserSession, CoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .sessions
            .values()
            .any(|s| s.refresh_token_hash == input.refresh_token_hash)
        {
            return Err(CoreError::Conflict(
                "Duplicate value violates unique constraint: uq_user_sessions_refresh_token_hash"
                    .into(),
            ));
        }
        let id = tables.next_id();
        let now = tables.tick();
        let session = UserSession {
            id,
            user_id: input.user_id,
            refresh_token_hash: input.refresh_token_hash,
            expires_at: input.expires_at,
            is_revoked: false,
            created_at: now,
            updated_at: now,
        };
        tables.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn find_active_session(
        &self,
        refresh_token_hash: &str,
    ) -> Result<Option<UserSession>, CoreError> {
        let now = Utc::now();
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .find(|s| {
                s.refresh_token_hash == refresh_token_hash && !s.is_revoked && s.expires_at > now
            })
            .cloned())
    }

    async fn revoke_session(&self, id: DbId) -> Result<bool, CoreError> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        match tables.sessions.get_mut(&id) {
            Some(session) if !session.is_revoked => {
                session.is_revoked = true;
                session.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_sessions(&self, user_id: DbId) -> Result<u64, CoreError> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        let mut revoked = 0;
        for session in tables.sessions.values_mut() {
            if session.user_id == user_id && !session.is_revoked {
                session.is_revoked = true;
                session.updated_at = now;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn create_reset_token(&self, input: CreatePasswordReset) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let now = tables.tick();
        tables.reset_tokens.insert(
            id,
            PasswordResetToken {
                id,
                user_id: input.user_id,
                token_hash: input.token_hash,
                expires_at: input.expires_at,
                used_at: None,
                created_at: now,
            },
        );
        Ok(())
    }

    async fn consume_reset_token(&self, token_hash: &str) -> Result<Option<DbId>, CoreError> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();
        let token = tables.reset_tokens.values_mut().find(|t| {
            t.token_hash == token_hash && t.used_at.is_none() && t.expires_at > now
        });
        Ok(token.map(|t| {
            t.used_at = Some(now);
            t.user_id
        }))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use photopoet_core::style::PoemStyle;

    use super::*;

    fn new_creation(owner_id: DbId, poem: &str) -> NewCreation {
        NewCreation {
            owner_id,
            image: ImageRef::Blob {
                path: format!("creations/{owner_id}/x.png"),
                url: format!("http://blobs/creations/{owner_id}/x.png"),
            },
            photo_file_name: "x.png".into(),
            style: PoemStyle::Haiku,
            poem: poem.into(),
        }
    }

    #[tokio::test]
    async fn list_is_scoped_and_newest_first() {
        let store = MemoryStore::new();
        let first = store.create(new_creation(1, "a")).await.unwrap();
        let second = store.create(new_creation(1, "b")).await.unwrap();
        store.create(new_creation(2, "other")).await.unwrap();

        let items = store.list_by_owner(1).await.unwrap();
        assert_eq!(
            items.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert!(second.created_at > first.created_at);
    }

    #[tokio::test]
    async fn update_details_bumps_updated_at() {
        let store = MemoryStore::new();
        let created = store.create(new_creation(1, "a")).await.unwrap();
        let update = DetailsUpdate {
            title: Some("Dawn".into()),
            note: None,
        };
        let updated = store.update_details(created.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.title.as_deref(), Some("Dawn"));
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn overlong_note_is_rejected() {
        let store = MemoryStore::new();
        let created = store.create(new_creation(1, "a")).await.unwrap();
        let update = DetailsUpdate {
            title: None,
            note: Some("n".repeat(2001)),
        };
        assert_matches!(
            store.update_details(created.id, &update).await,
            Err(CoreError::Validation(_))
        );
    }

    #[tokio::test]
    async fn share_id_is_stable() {
        let store = MemoryStore::new();
        let created = store.create(new_creation(1, "a")).await.unwrap();
        let first = store.assign_share_id(created.id).await.unwrap().unwrap();
        let again = store.assign_share_id(created.id).await.unwrap().unwrap();
        assert_eq!(first.share_id, again.share_id);
        let share_id = first.share_id.unwrap();
        let found = store.find_by_share_id(share_id).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn replace_image_only_touches_inline_records() {
        let store = MemoryStore::new();
        let mut input = new_creation(1, "a");
        input.image = ImageRef::Inline {
            data_uri: "data:image/png;base64,AA".into(),
        };
        let legacy = store.create(input).await.unwrap();
        let blob = ImageRef::Blob {
            path: "creations/1/y.png".into(),
            url: "http://blobs/creations/1/y.png".into(),
        };
        let migrated = store
            .replace_image(legacy.id, blob.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(migrated.image, blob);
        assert_eq!(store.replace_image(legacy.id, blob).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.create_registered("a@b.c", "hash").await.unwrap();
        assert_matches!(
            store.create_registered("a@b.c", "hash").await,
            Err(CoreError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let store = MemoryStore::new();
        let user = store.create_registered("a@b.c", "hash").await.unwrap();
        store
            .create_reset_token(CreatePasswordReset {
                user_id: user.id,
                token_hash: "t".into(),
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();
        assert_eq!(store.consume_reset_token("t").await.unwrap(), Some(user.id));
        assert_eq!(store.consume_reset_token("t").await.unwrap(), None);
    }

    #[tokio::test]
    async fn revoked_sessions_are_not_active() {
        let store = MemoryStore::new();
        let user = store.create_anonymous().await.unwrap();
        let session = store
            .create_session(CreateSession {
                user_id: user.id,
                refresh_token_hash: "h".into(),
                expires_at: Utc::now() + Duration::days(1),
            })
            .await
            .unwrap();
        assert!(store.find_active_session("h").await.unwrap().is_some());
        assert!(store.revoke_session(session.id).await.unwrap());
        assert!(store.find_active_session("h").await.unwrap().is_none());
    }
}
