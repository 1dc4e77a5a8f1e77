use include_dir::{include_dir, Dir};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::StoreError;
use crate::session::TextType;

static CORPUS_DIR: Dir = include_dir!("src/corpus");
const EMBEDDED_FILE: &str = "passages.json";

/// Practice passages grouped by text type.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Corpus {
    #[serde(default)]
    pub short: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub long: Vec<String>,
}

impl Corpus {
    /// The passages shipped with the binary.
    pub fn embedded() -> Self {
        let file = CORPUS_DIR
            .get_file(EMBEDDED_FILE)
            .expect("Embedded corpus not found");

        let text = file
            .contents_utf8()
            .expect("Unable to interpret corpus as a string");

        serde_json::from_str(text).expect("Unable to deserialize embedded corpus")
    }

    /// Read a user corpus. Pools it leaves empty are filled from the embedded corpus.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let bytes = fs::read(path.as_ref())?;
        let corpus: Corpus = serde_json::from_slice(&bytes)?;
        Ok(corpus.or_embedded())
    }

    /// Same passage for every text type.
    pub fn single(passage: impl Into<String>) -> Self {
        let passage = passage.into();
        Self {
            short: vec![passage.clone()],
            medium: vec![passage.clone()],
            long: vec![passage],
        }
    }

    pub fn pool(&self, text_type: TextType) -> &[String] {
        match text_type {
            TextType::Short => &self.short,
            TextType::Medium => &self.medium,
            TextType::Long => &self.long,
        }
    }

    fn or_embedded(mut self) -> Self {
        let embedded = Self::embedded();
        for (pool, fallback, name) in [
            (&mut self.short, embedded.short, TextType::Short),
            (&mut self.medium, embedded.medium, TextType::Medium),
            (&mut self.long, embedded.long, TextType::Long),
        ] {
            pool.retain(|p| !p.trim().is_empty());
            if pool.is_empty() {
                warn!("corpus has no {name} passages, using built-in ones");
                *pool = fallback;
            }
        }
        self
    }
}

impl Default for Corpus {
    fn default() -> Self {
        Self::embedded()
    }
}
