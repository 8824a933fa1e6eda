use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;

/// Persists the latest deep-link fragment.
pub trait LocationStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, fragment: &str) -> Result<()>;
}

pub struct FileLocationStore {
    path: PathBuf,
}

impl FileLocationStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory at {:?}", root))?;
        Ok(Self {
            path: root.join("location"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl LocationStore for FileLocationStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.path)
            .with_context(|| format!("failed to open location file {:?}", self.path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let fragment = buf.trim();
        Ok((!fragment.is_empty()).then(|| fragment.to_string()))
    }

    fn save(&self, fragment: &str) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp location file {:?}", tmp))?;
        file.write_all(fragment.as_bytes())?;
        file.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLocationStore {
    inner: Mutex<Option<String>>,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationStore for MemoryLocationStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, fragment: &str) -> Result<()> {
        *self.inner.lock() = Some(fragment.to_string());
        Ok(())
    }
}
