//! Session token holder.
//!
//! The login flow writes the bearer token into a `TokenStore`; the engine
//! reads it through a `Session` and clears it on logout. Passing the session
//! explicitly keeps the engine testable with an in-memory store.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Where the bearer token lives between runs.
pub trait TokenStore: fmt::Debug + Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Process-local token slot.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            slot: Mutex::new(token),
        }
    }

    fn with_slot<R>(&self, f: impl FnOnce(&mut Option<String>) -> R) -> io::Result<R> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| io::Error::other("token slot poisoned"))?;
        Ok(f(&mut slot))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        self.with_slot(|slot| slot.clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        self.with_slot(|slot| *slot = Some(token.to_string()))
    }

    fn clear(&self) -> io::Result<()> {
        self.with_slot(|slot| *slot = None)
    }
}

/// Token persisted in a single file, so it survives restarts.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// The authenticated identity used for every outbound call.
#[derive(Debug, Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    token: Option<String>,
}

impl Session {
    /// Reads the current token out of `store`.
    pub fn open(store: Arc<dyn TokenStore>) -> io::Result<Self> {
        let token = store.load()?.filter(|t| !t.is_empty());
        Ok(Self { store, token })
    }

    /// In-memory session already holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            store: Arc::new(MemoryTokenStore::new(Some(token.clone()))),
            token: Some(token).filter(|t| !t.is_empty()),
        }
    }

    /// The bearer token, if the session is authenticated.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Stores a token issued by the login flow.
    pub fn login(&mut self, token: &str) -> io::Result<()> {
        self.store.save(token)?;
        self.token = Some(token.to_string()).filter(|t| !t.is_empty());
        Ok(())
    }

    /// Clears the token locally and in the backing store.
    ///
    /// The in-memory copy is only dropped once the store has been cleared, so
    /// a failed logout leaves the session usable.
    pub fn logout(&mut self) -> io::Result<()> {
        self.store.clear()?;
        self.token = None;
        Ok(())
    }
}
