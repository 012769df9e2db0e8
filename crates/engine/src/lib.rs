//! Book loading and terminal rendering for EPUB and plain-text books.

pub mod epub;
mod rendition;
pub mod text;

use anyhow::Context as _;
use libris_core::{BookFormat, BookLoader, BookRecord, LoadedBook, Presenter, Rendition};

pub use rendition::{DocumentRendition, wrap_text};

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Self
    }
}

impl BookLoader for Engine {
    fn load(&self, name: &str, format: BookFormat, bytes: Vec<u8>) -> anyhow::Result<LoadedBook> {
        match format {
            BookFormat::Text => Ok(LoadedBook {
                content: text::decode(&bytes).into_bytes(),
                metadata: None,
                cover: None,
            }),
            BookFormat::Epub => {
                let package =
                    epub::read_package(&bytes, false).with_context(|| format!("read epub {name}"))?;
                Ok(LoadedBook {
                    content: bytes,
                    metadata: Some(package.metadata),
                    cover: package.cover,
                })
            }
        }
    }
}

impl Presenter for Engine {
    fn render(&self, record: &BookRecord) -> anyhow::Result<Box<dyn Rendition>> {
        let rendition = match record.format {
            BookFormat::Text => {
                let text = String::from_utf8_lossy(&record.content);
                DocumentRendition::new(vec![text::chapter(&text)], Vec::new(), false)
            }
            BookFormat::Epub => {
                let package = epub::read_package(&record.content, true)
                    .with_context(|| format!("read epub {}", record.id))?;
                if package.chapters.iter().all(|c| c.paragraphs.is_empty()) {
                    anyhow::bail!("{} has no readable text", record.title);
                }
                DocumentRendition::new(package.chapters, package.toc, true)
            }
        };
        Ok(Box::new(rendition))
    }
}
