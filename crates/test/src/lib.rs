//! Test helpers and fixtures.

use std::collections::BTreeMap;
use std::io::{Cursor, Write as _};
use std::rc::Rc;

use libris_application::{AppContext, FileSource, Library, SettingsManager};
use libris_core::{ReadingPosition, Rendition, StyleRules, TocItem};
use libris_engine::Engine;
use libris_storage::{PreferenceFile, Storage};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// PNG signature followed by filler; enough for format sniffing.
pub const TINY_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// An importable file held in memory.
#[derive(Debug, Clone)]
pub struct MemFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MemFile {
    pub fn new(name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            bytes: bytes.into(),
        }
    }
}

impl FileSource for MemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Stores shared by everything a test builds on top of them.
pub struct Stores {
    pub books: Rc<Storage>,
    pub prefs: Rc<PreferenceFile>,
}

impl Stores {
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self {
            books: Rc::new(Storage::open_in_memory()?),
            prefs: Rc::new(PreferenceFile::in_memory()),
        })
    }

    pub fn library(&self) -> Library {
        Library::new(self.books.clone(), self.prefs.clone())
    }

    pub fn settings(&self) -> SettingsManager {
        SettingsManager::load(self.prefs.clone())
    }

    /// A full application context over these stores and the real engine.
    pub fn context(&self) -> AppContext {
        let engine = Rc::new(Engine::new());
        AppContext::new(self.library(), self.settings(), engine.clone(), engine)
    }
}

#[derive(Debug, Clone)]
pub struct ChapterFixture {
    pub title: String,
    pub paragraphs: Vec<String>,
}

/// Builds a small EPUB 2 book with an NCX, or an EPUB 3 nav document when
/// `nav_document` is set.
#[derive(Debug, Clone)]
pub struct EpubFixture {
    pub title: String,
    pub creator: Option<String>,
    pub language: String,
    pub chapters: Vec<ChapterFixture>,
    pub cover: Option<Vec<u8>>,
    pub nav_document: bool,
}

impl EpubFixture {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            creator: None,
            language: "en".to_string(),
            chapters: Vec::new(),
            cover: None,
            nav_document: false,
        }
    }

    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = Some(creator.to_string());
        self
    }

    pub fn chapter(mut self, title: &str, paragraphs: &[&str]) -> Self {
        self.chapters.push(ChapterFixture {
            title: title.to_string(),
            paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    pub fn cover(mut self, data: &[u8]) -> Self {
        self.cover = Some(data.to_vec());
        self
    }

    pub fn with_nav_document(mut self) -> Self {
        self.nav_document = true;
        self
    }

    pub fn chapter_href(index: usize) -> String {
        format!("text/ch{}.xhtml", index + 1)
    }

    pub fn build(&self) -> anyhow::Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER_XML.as_bytes())?;

        zip.start_file("OEBPS/content.opf", deflated)?;
        zip.write_all(self.opf().as_bytes())?;

        if self.nav_document {
            zip.start_file("OEBPS/nav.xhtml", deflated)?;
            zip.write_all(self.nav().as_bytes())?;
        } else {
            zip.start_file("OEBPS/toc.ncx", deflated)?;
            zip.write_all(self.ncx().as_bytes())?;
        }

        for (idx, chapter) in self.chapters.iter().enumerate() {
            zip.start_file(format!("OEBPS/{}", Self::chapter_href(idx)), deflated)?;
            zip.write_all(chapter_xhtml(chapter).as_bytes())?;
        }

        if let Some(cover) = &self.cover {
            zip.start_file("OEBPS/images/cover.png", stored)?;
            zip.write_all(cover)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    fn opf(&self) -> String {
        let mut manifest = String::new();
        let mut spine = String::new();
        for idx in 0..self.chapters.len() {
            manifest.push_str(&format!(
                r#"<item id="ch{n}" href="{href}" media-type="application/xhtml+xml"/>"#,
                n = idx + 1,
                href = Self::chapter_href(idx),
            ));
            spine.push_str(&format!(r#"<itemref idref="ch{}"/>"#, idx + 1));
        }
        if self.nav_document {
            manifest.push_str(
                r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
            );
        } else {
            manifest.push_str(
                r#"<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
            );
        }
        let mut cover_meta = String::new();
        if self.cover.is_some() {
            manifest.push_str(r#"<item id="cover" href="images/cover.png" media-type="image/png"/>"#);
            cover_meta.push_str(r#"<meta name="cover" content="cover"/>"#);
        }
        let creator = self
            .creator
            .as_deref()
            .map(|c| format!("<dc:creator>{}</dc:creator>", escape(c)))
            .unwrap_or_default();
        let toc_attr = if self.nav_document { "" } else { r#" toc="ncx""# };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:test:{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    {creator}
    <dc:language>{language}</dc:language>
    {cover_meta}
  </metadata>
  <manifest>{manifest}</manifest>
  <spine{toc_attr}>{spine}</spine>
</package>"#,
            id = escape(&self.title),
            title = escape(&self.title),
            language = self.language,
        )
    }

    fn ncx(&self) -> String {
        let mut points = String::new();
        for (idx, chapter) in self.chapters.iter().enumerate() {
            points.push_str(&format!(
                r#"<navPoint id="np{n}" playOrder="{n}"><navLabel><text>{label}</text></navLabel><content src="{href}"/></navPoint>"#,
                n = idx + 1,
                label = escape(&chapter.title),
                href = Self::chapter_href(idx),
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <docTitle><text>{title}</text></docTitle>
  <navMap>{points}</navMap>
</ncx>"#,
            title = escape(&self.title),
        )
    }

    fn nav(&self) -> String {
        let mut items = String::new();
        for (idx, chapter) in self.chapters.iter().enumerate() {
            items.push_str(&format!(
                r#"<li><a href="{href}">{label}</a></li>"#,
                href = Self::chapter_href(idx),
                label = escape(&chapter.title),
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body><nav epub:type="toc"><ol>{items}</ol></nav></body>
</html>"#
        )
    }
}

fn chapter_xhtml(chapter: &ChapterFixture) -> String {
    let body: String = chapter
        .paragraphs
        .iter()
        .map(|p| format!("<p>{}</p>", escape(p)))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{title}</title><style>p {{ margin: 0 }}</style></head>
<body><h1>{title}</h1>{body}</body>
</html>"#,
        title = escape(&chapter.title),
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Three short chapters with a cover; the default book for integration tests.
pub fn sample_epub() -> anyhow::Result<Vec<u8>> {
    EpubFixture::new("The Sample Book")
        .creator("Ada Writer")
        .chapter("Opening", &["It was a quiet morning.", "Nothing moved."])
        .chapter("Middle", &["Then the bell rang."])
        .chapter("Closing", &["And that was all."])
        .cover(TINY_PNG)
        .build()
}

/// Rendition that only remembers what was asked of it.
#[derive(Debug, Default)]
pub struct RecordingRendition {
    pub calls: Vec<String>,
    pub styles: BTreeMap<String, StyleRules>,
    pub selected: Option<String>,
    position: Option<ReadingPosition>,
}

impl RecordingRendition {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Rendition for RecordingRendition {
    fn display(&mut self, target: Option<&str>) -> anyhow::Result<()> {
        self.calls.push(format!("display {}", target.unwrap_or("-")));
        self.position = Some(ReadingPosition(target.unwrap_or("0:0").to_string()));
        Ok(())
    }

    fn next(&mut self) {
        self.calls.push("next".to_string());
    }

    fn prev(&mut self) {
        self.calls.push("prev".to_string());
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.calls.push(format!("resize {width}x{height}"));
    }

    fn location(&self) -> Option<ReadingPosition> {
        self.position.clone()
    }

    fn take_relocated(&mut self) -> Option<ReadingPosition> {
        None
    }

    fn navigation(&self) -> &[TocItem] {
        &[]
    }

    fn chapter_label(&self) -> Option<String> {
        None
    }

    fn progress_percent(&self) -> f32 {
        0.0
    }

    fn register_style(&mut self, name: &str, rules: StyleRules) {
        self.calls.push(format!("register {name}"));
        self.styles.insert(name.to_string(), rules);
    }

    fn select_style(&mut self, name: &str) {
        self.calls.push(format!("select {name}"));
        self.selected = Some(name.to_string());
    }

    fn active_style(&self) -> Option<&StyleRules> {
        self.selected.as_ref().and_then(|name| self.styles.get(name))
    }

    fn visible_lines(&self) -> Vec<String> {
        Vec::new()
    }

    fn destroy(&mut self) {
        self.calls.push("destroy".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_readable_archive() -> anyhow::Result<()> {
        let bytes = sample_epub()?;
        let archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"mimetype"));
        assert!(names.contains(&"OEBPS/text/ch3.xhtml"));
        Ok(())
    }

    #[test]
    fn escapes_markup_in_titles() {
        assert_eq!(escape("Tom & \"Jerry\""), "Tom &amp; &quot;Jerry&quot;");
    }
}
