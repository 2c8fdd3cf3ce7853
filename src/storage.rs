use crate::models::Profile;
use anyhow::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed name of the single slot the profile lives in.
pub const PROFILE_KEY: &str = "profile.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not encode profile: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("could not decode profile at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Whole-profile load/save. The engine only talks to storage through this.
pub trait ProfileStore {
    fn load(&self) -> Result<Profile, StorageError>;
    fn save(&self, profile: &Profile) -> Result<(), StorageError>;
}

#[derive(Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn get_base_dir() -> Result<PathBuf> {
        let mut path =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        path.push(".fogo");
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(path)
    }

    pub fn new() -> Result<Self> {
        let path = Self::get_base_dir()?;
        Ok(Self::from_path(path.join(PROFILE_KEY)))
    }

    pub fn from_path(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                let _ = fs::create_dir_all(parent);
            }
        }
        Self { path }
    }

    fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    /// Like `load`, but a record that fails to decode is an error.
    pub fn load_strict(&self) -> Result<Profile, StorageError> {
        if !self.path.exists() {
            return Ok(Profile::default());
        }
        let data = fs::read(&self.path).map_err(|e| StorageError::io(&self.path, e))?;
        serde_json::from_slice(&data).map_err(|source| StorageError::Decode {
            path: self.path.clone(),
            source,
        })
    }
}

impl ProfileStore for Storage {
    /// A missing record yields a fresh profile. So does a corrupt one: its bytes
    /// are moved to `profile.json.corrupt` and the loss is logged.
    fn load(&self) -> Result<Profile, StorageError> {
        match self.load_strict() {
            Err(StorageError::Decode { path, source }) => {
                let aside = self.corrupt_path();
                log::warn!(
                    "profile at {} is unreadable ({}); starting from an empty profile",
                    path.display(),
                    source
                );
                match fs::rename(&path, &aside) {
                    Ok(()) => log::warn!("corrupt profile kept at {}", aside.display()),
                    Err(e) => log::error!("could not move corrupt profile aside: {}", e),
                }
                Ok(Profile::default())
            }
            other => other,
        }
    }

    fn save(&self, profile: &Profile) -> Result<(), StorageError> {
        let data = serde_json::to_string_pretty(profile).map_err(StorageError::Encode)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &data).map_err(|e| StorageError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| StorageError::io(&self.path, e))?;
        Ok(())
    }
}
