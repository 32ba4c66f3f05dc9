//! Durable device identity
//!
//! The host keys reconnection on the device id, so it survives restarts in a
//! small TOML file next to the cached team name. The player id is fresh per
//! launch.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::types::SessionIdentity;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to read identity file: {0}")]
    Read(#[source] io::Error),
    #[error("Failed to write identity file: {0}")]
    Write(#[source] io::Error),
    #[error("Failed to encode identity: {0}")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    team_name: Option<String>,
}

pub struct IdentityStore {
    path: PathBuf,
    identity: SessionIdentity,
}

impl IdentityStore {
    /// Load the stored identity, or mint and persist a new device id.
    /// An unreadable or corrupt file is replaced.
    pub fn load_or_create(path: impl Into<PathBuf>) -> Result<Self, IdentityError> {
        let path = path.into();
        let stored = match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<StoredIdentity>(&contents) {
                Ok(stored) if !stored.device_id.trim().is_empty() => Some(stored),
                Ok(_) => {
                    warn!(path = %path.display(), "[IDENTITY] Empty device id, regenerating");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "[IDENTITY] Corrupt identity file, regenerating");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(IdentityError::Read(e)),
        };

        let store = match stored {
            Some(stored) => {
                debug!(device_id = %stored.device_id, "[IDENTITY] Loaded");
                Self {
                    path,
                    identity: SessionIdentity {
                        player_id: new_id(),
                        device_id: stored.device_id,
                        team_name: stored.team_name.filter(|t| !t.trim().is_empty()),
                    },
                }
            }
            None => {
                let store = Self {
                    path,
                    identity: SessionIdentity {
                        player_id: new_id(),
                        device_id: new_id(),
                        team_name: None,
                    },
                };
                store.save()?;
                info!(device_id = %store.identity.device_id, "[IDENTITY] Created new device id");
                store
            }
        };
        Ok(store)
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn team_name(&self) -> Option<&str> {
        self.identity.team_name.as_deref()
    }

    /// Cache the team name for auto-rejoin
    pub fn remember_team(&mut self, team_name: &str) -> Result<(), IdentityError> {
        let team_name = team_name.trim();
        if self.identity.team_name.as_deref() == Some(team_name) {
            return Ok(());
        }
        self.identity.team_name = Some(team_name.to_string());
        self.save()
    }

    /// Drop the cached team name (host declined it)
    pub fn forget_team(&mut self) -> Result<(), IdentityError> {
        if self.identity.team_name.take().is_none() {
            return Ok(());
        }
        info!("[IDENTITY] Cached team name cleared");
        self.save()
    }

    fn save(&self) -> Result<(), IdentityError> {
        let stored = StoredIdentity {
            device_id: self.identity.device_id.clone(),
            team_name: self.identity.team_name.clone(),
        };
        let contents = toml::to_string(&stored)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(IdentityError::Write)?;
        }
        fs::write(&self.path, contents).map_err(IdentityError::Write)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
