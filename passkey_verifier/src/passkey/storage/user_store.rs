use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{User, UserId};
use crate::utils::gen_random_string;

/// Length in bytes of generated user identifiers
const USER_ID_LENGTH: usize = 32;

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, PasskeyError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, PasskeyError>;

    /// Returns the user with this name, creating it atomically if absent.
    async fn get_or_create(&self, name: &str) -> Result<User, PasskeyError>;
}

#[derive(Default)]
struct UserIndex {
    by_id: HashMap<UserId, User>,
    id_by_name: HashMap<String, UserId>,
}

pub struct InMemoryUserStore {
    index: RwLock<UserIndex>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory user store");
        Self {
            index: RwLock::new(UserIndex::default()),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, PasskeyError> {
        Ok(self.index.read().await.by_id.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, PasskeyError> {
        let index = self.index.read().await;
        Ok(index
            .id_by_name
            .get(name)
            .and_then(|id| index.by_id.get(id))
            .cloned())
    }

    async fn get_or_create(&self, name: &str) -> Result<User, PasskeyError> {
        let mut index = self.index.write().await;
        if let Some(user) = index.id_by_name.get(name).and_then(|id| index.by_id.get(id)) {
            return Ok(user.clone());
        }

        let mut id = UserId::new(gen_random_string(USER_ID_LENGTH)?);
        while index.by_id.contains_key(&id) {
            id = UserId::new(gen_random_string(USER_ID_LENGTH)?);
        }

        let user = User::new(id.clone(), name.to_string());
        tracing::debug!("Created user {} with id {}", name, id);
        index.id_by_name.insert(name.to_string(), id.clone());
        index.by_id.insert(id, user.clone());
        Ok(user)
    }
}
