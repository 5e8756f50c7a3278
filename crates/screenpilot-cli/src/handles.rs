//! Registry of open pointer handles.
//!
//! A handle is a [`GestureSession`] the daemon keeps between requests so a
//! drag can be started by one command and dropped by another.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use screenpilot_core::error::ApiError;
use screenpilot_core::gesture::GestureSession;
use screenpilot_core::point::ScreenPoint;
use screenpilot_core::protocol::HandleInfo;
use tracing::{debug, info};

/// Maximum number of open handles.
pub const MAX_HANDLES: usize = 64;

/// Unique identifier for a handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandleId(pub String);

impl HandleId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HandleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An open pointer handle.
#[derive(Debug)]
pub struct Handle {
    pub id: HandleId,
    /// Optional human-readable name.
    pub name: Option<String>,
    pub session: GestureSession,
    pub created_at: DateTime<Utc>,
}

impl Handle {
    pub fn info(&self) -> HandleInfo {
        HandleInfo {
            id: self.id.0.clone(),
            name: self.name.clone(),
            point: self.session.point().clone(),
            state: self.session.state(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: HashMap<HandleId, Handle>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a handle at `point`. Names must be unique.
    pub fn open(&mut self, point: ScreenPoint, name: Option<String>) -> Result<HandleId, ApiError> {
        if self.handles.len() >= MAX_HANDLES {
            return Err(ApiError::handle_limit_reached(MAX_HANDLES));
        }
        if let Some(ref n) = name {
            if self.find_by_name(n).is_some() {
                return Err(ApiError::duplicate_handle_name(n));
            }
        }

        let id = HandleId::new();
        info!("Opened handle {} at {}", id, point);
        self.handles.insert(
            id.clone(),
            Handle {
                id: id.clone(),
                name,
                session: GestureSession::new(point),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    pub fn remove(&mut self, id: &HandleId) -> Result<Handle, ApiError> {
        let handle = self
            .handles
            .remove(id)
            .ok_or_else(|| ApiError::handle_not_found(&id.0))?;
        debug!("Removed handle {}", id);
        Ok(handle)
    }

    pub fn get(&self, id: &HandleId) -> Result<&Handle, ApiError> {
        self.handles
            .get(id)
            .ok_or_else(|| ApiError::handle_not_found(&id.0))
    }

    pub fn get_mut(&mut self, id: &HandleId) -> Result<&mut Handle, ApiError> {
        self.handles
            .get_mut(id)
            .ok_or_else(|| ApiError::handle_not_found(&id.0))
    }

    /// Open handles, oldest first.
    pub fn list(&self) -> Vec<HandleInfo> {
        let mut handles: Vec<&Handle> = self.handles.values().collect();
        handles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        handles.into_iter().map(Handle::info).collect()
    }

    pub fn ids(&self) -> Vec<HandleId> {
        self.handles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn find_by_name(&self, name: &str) -> Option<HandleId> {
        self.handles
            .values()
            .find(|h| h.name.as_deref() == Some(name))
            .map(|h| h.id.clone())
    }

    /// Resolve a handle by ID or name.
    ///
    /// Without an identifier the only open handle is used; zero or several
    /// open handles is an error.
    pub fn resolve(&self, identifier: Option<&str>) -> Result<HandleId, ApiError> {
        match identifier {
            None => {
                let mut ids = self.handles.keys();
                match (ids.next(), ids.next()) {
                    (Some(id), None) => Ok(id.clone()),
                    (None, _) => Err(ApiError::no_handles()),
                    (Some(_), Some(_)) => Err(ApiError::ambiguous_handle(self.handles.len())),
                }
            }
            Some(id_or_name) => {
                let id = HandleId::from(id_or_name);
                if self.handles.contains_key(&id) {
                    return Ok(id);
                }
                self.find_by_name(id_or_name)
                    .ok_or_else(|| ApiError::handle_not_found(id_or_name))
            }
        }
    }
}
