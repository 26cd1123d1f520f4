use crate::{
    error::{PaintError, Result},
    models::GeneratedImage,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct GenerationRecord {
    pub prompt: String,
    pub image: Arc<GeneratedImage>,
}

impl GenerationRecord {
    pub fn new(prompt: impl Into<String>, image: Arc<GeneratedImage>) -> Self {
        Self {
            prompt: prompt.into(),
            image,
        }
    }

    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.image.b64_json.as_bytes())
            .map_err(|e| PaintError::Serialization(format!("Invalid base64 image: {}", e)))
    }

    /// Writes the image as `NeuroPaint-<epoch millis>.png` into `dir`.
    pub fn save_png(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let bytes = self.png_bytes()?;
        let path = dir
            .as_ref()
            .join(format!("NeuroPaint-{}.png", Utc::now().timestamp_millis()));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub struct History {
    records: VecDeque<GenerationRecord>,
    active: Option<usize>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            active: None,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &GenerationRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&GenerationRecord> {
        self.records.get(index)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&GenerationRecord> {
        self.active.and_then(|i| self.records.get(i))
    }

    /// Records a result unless it is already the newest entry, evicting the
    /// oldest past capacity, and selects it. Returns the selected index.
    pub fn adopt(&mut self, prompt: &str, image: Arc<GeneratedImage>) -> usize {
        let already_newest = self
            .records
            .back()
            .map_or(false, |last| Arc::ptr_eq(&last.image, &image));

        if !already_newest {
            self.records.push_back(GenerationRecord::new(prompt, image));
            if self.records.len() > self.capacity {
                self.records.pop_front();
            }
        }

        let index = self.records.len() - 1;
        self.active = Some(index);
        index
    }

    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.records.len() {
            return Err(PaintError::Selection {
                index,
                len: self.records.len(),
            });
        }
        self.active = Some(index);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.active = None;
    }
}
