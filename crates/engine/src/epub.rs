//! EPUB container parsing: container.xml → OPF → metadata, spine, cover, TOC.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use anyhow::Context as _;
use libris_core::{BookMetadata, CoverImage, TocItem};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

#[derive(Debug, Clone, Default)]
pub struct EpubPackage {
    pub metadata: BookMetadata,
    pub cover: Option<CoverImage>,
    pub toc: Vec<TocItem>,
    pub chapters: Vec<Chapter>,
}

/// One spine document reduced to plain-text paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chapter {
    /// Archive path, used to match navigation hrefs.
    pub href: String,
    pub paragraphs: Vec<String>,
}

struct ManifestItem {
    href: String,
    media_type: String,
    properties: Option<String>,
}

#[derive(Default)]
struct Opf {
    metadata: BookMetadata,
    manifest: HashMap<String, ManifestItem>,
    spine: Vec<String>,
    ncx_id: Option<String>,
    cover_id: Option<String>,
}

/// Parses an EPUB held in memory. Spine documents are only read when
/// `with_content` is set.
pub fn read_package(bytes: &[u8], with_content: bool) -> anyhow::Result<EpubPackage> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("open epub archive")?;

    let container = read_text(&mut archive, "META-INF/container.xml")?;
    let opf_path = find_opf_path(&container)?;
    let opf_dir = parent_dir(&opf_path);
    let opf = parse_opf(&read_text(&mut archive, &opf_path)?)
        .with_context(|| format!("parse {opf_path}"))?;

    let cover = find_cover(&opf).and_then(|item| {
        let path = resolve_path(&opf_dir, &item.href);
        match read_bytes(&mut archive, &path) {
            Ok(data) => cover_image(&item.media_type, data),
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "cover listed in manifest but unreadable");
                None
            }
        }
    });

    let toc = read_toc(&mut archive, &opf, &opf_dir);

    let mut chapters = Vec::new();
    if with_content {
        for idref in &opf.spine {
            let Some(item) = opf.manifest.get(idref) else {
                continue;
            };
            let path = resolve_path(&opf_dir, &item.href);
            match read_text(&mut archive, &path) {
                Ok(xhtml) => chapters.push(Chapter {
                    paragraphs: extract_paragraphs(&xhtml),
                    href: path,
                }),
                Err(err) => tracing::warn!(path = %path, error = %err, "skipping unreadable spine item"),
            }
        }
    }

    Ok(EpubPackage {
        metadata: opf.metadata,
        cover,
        toc,
        chapters,
    })
}

fn find_opf_path(container: &str) -> anyhow::Result<String> {
    let mut reader = Reader::from_str(container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event().context("parse container.xml")? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attr(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    anyhow::bail!("no rootfile in container.xml")
}

fn parse_opf(content: &str) -> anyhow::Result<Opf> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut opf = Opf::default();
    let mut in_metadata = false;
    let mut field: Option<&'static str> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = true,
                    b"spine" => opf.ncx_id = attr(&e, b"toc"),
                    b"item" => push_manifest_item(&mut opf, &e),
                    local if in_metadata => {
                        field = metadata_field(local);
                        text.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => push_manifest_item(&mut opf, &e),
                    b"itemref" => {
                        if let Some(idref) = attr(&e, b"idref") {
                            opf.spine.push(idref);
                        }
                    }
                    b"meta" if attr(&e, b"name").as_deref() == Some("cover") => {
                        opf.cover_id = attr(&e, b"content");
                    }
                    _ => {}
                }
            }
            Event::Text(e) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::CData(e) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::GeneralRef(e) if field.is_some() => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                    text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"metadata" {
                    in_metadata = false;
                }
                if let Some(name) = field.take() {
                    store_metadata(&mut opf.metadata, name, text.trim());
                    text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(opf)
}

fn metadata_field(local: &[u8]) -> Option<&'static str> {
    match local {
        b"title" => Some("title"),
        b"creator" => Some("creator"),
        b"publisher" => Some("publisher"),
        b"date" => Some("date"),
        b"description" => Some("description"),
        b"language" => Some("language"),
        _ => None,
    }
}

fn store_metadata(metadata: &mut BookMetadata, field: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let slot = match field {
        "title" => &mut metadata.title,
        "creator" => {
            // Multiple creators are joined in document order.
            match metadata.creator.as_mut() {
                Some(existing) => {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
                None => metadata.creator = Some(value.to_string()),
            }
            return;
        }
        "publisher" => &mut metadata.publisher,
        "date" => &mut metadata.pubdate,
        "description" => &mut metadata.description,
        "language" => &mut metadata.language,
        _ => return,
    };
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

fn push_manifest_item(opf: &mut Opf, e: &BytesStart<'_>) {
    let Some(id) = attr(e, b"id") else {
        return;
    };
    opf.manifest.insert(
        id,
        ManifestItem {
            href: attr(e, b"href").unwrap_or_default(),
            media_type: attr(e, b"media-type").unwrap_or_default(),
            properties: attr(e, b"properties"),
        },
    );
}

fn has_property(item: &ManifestItem, property: &str) -> bool {
    item.properties
        .as_deref()
        .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == property))
}

fn find_cover(opf: &Opf) -> Option<&ManifestItem> {
    opf.manifest
        .values()
        .find(|item| has_property(item, "cover-image"))
        .or_else(|| opf.cover_id.as_ref().and_then(|id| opf.manifest.get(id)))
}

/// Builds a cover, trusting the bytes over the declared media type.
fn cover_image(declared: &str, data: Vec<u8>) -> Option<CoverImage> {
    let media_type = match image::guess_format(&data) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) if declared.starts_with("image/") => declared.to_string(),
        Err(_) => {
            tracing::warn!(declared = %declared, "cover is not a recognisable image");
            return None;
        }
    };
    Some(CoverImage { media_type, data })
}

fn read_toc<R: Read + Seek>(archive: &mut ZipArchive<R>, opf: &Opf, opf_dir: &str) -> Vec<TocItem> {
    let ncx = opf
        .ncx_id
        .as_ref()
        .and_then(|id| opf.manifest.get(id))
        .or_else(|| {
            opf.manifest
                .values()
                .find(|item| item.media_type == "application/x-dtbncx+xml")
        });
    if let Some(item) = ncx {
        let path = resolve_path(opf_dir, &item.href);
        match read_text(archive, &path).and_then(|xml| parse_ncx(&xml, &parent_dir(&path))) {
            Ok(toc) if !toc.is_empty() => return toc,
            Ok(_) => {}
            Err(err) => tracing::warn!(path = %path, error = %err, "ignoring unreadable ncx"),
        }
    }

    if let Some(item) = opf.manifest.values().find(|item| has_property(item, "nav")) {
        let path = resolve_path(opf_dir, &item.href);
        match read_text(archive, &path).and_then(|xml| parse_nav(&xml, &parent_dir(&path))) {
            Ok(toc) => return toc,
            Err(err) => tracing::warn!(path = %path, error = %err, "ignoring unreadable nav document"),
        }
    }

    Vec::new()
}

struct PendingEntry {
    label: String,
    href: Option<String>,
    children: Vec<TocItem>,
}

impl PendingEntry {
    fn new() -> Self {
        Self {
            label: String::new(),
            href: None,
            children: Vec::new(),
        }
    }

    fn finish(self, base: &str) -> Option<TocItem> {
        let label = collapse_whitespace(&self.label);
        let href = self.href?;
        if label.is_empty() {
            return None;
        }
        Some(TocItem {
            label,
            href: resolve_path(base, &href),
            children: self.children,
        })
    }
}

fn close_entry(stack: &mut Vec<PendingEntry>, roots: &mut Vec<TocItem>, base: &str) {
    let Some(entry) = stack.pop() else {
        return;
    };
    let children_if_unlabelled = if entry.href.is_none() {
        Some(entry.children.clone())
    } else {
        None
    };
    let target = match stack.last_mut() {
        Some(parent) => &mut parent.children,
        None => roots,
    };
    match entry.finish(base) {
        Some(item) => target.push(item),
        // Headings without a link still carry their children.
        None => target.extend(children_if_unlabelled.unwrap_or_default()),
    }
}

fn parse_ncx(content: &str, base: &str) -> anyhow::Result<Vec<TocItem>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut roots = Vec::new();
    let mut stack: Vec<PendingEntry> = Vec::new();
    let mut in_label = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => stack.push(PendingEntry::new()),
                b"text" => in_label = !stack.is_empty(),
                b"content" => set_href(&mut stack, attr(&e, b"src")),
                _ => {}
            },
            Event::Empty(e) if local_name(e.name().as_ref()) == b"content" => {
                set_href(&mut stack, attr(&e, b"src"));
            }
            Event::Text(e) if in_label => push_label(&mut stack, &String::from_utf8_lossy(e.as_ref())),
            Event::GeneralRef(e) if in_label => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                    push_label(&mut stack, &resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" => in_label = false,
                b"navPoint" => close_entry(&mut stack, &mut roots, base),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(roots)
}

fn parse_nav(content: &str, base: &str) -> anyhow::Result<Vec<TocItem>> {
    let mut reader = Reader::from_str(content);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;

    let mut roots = Vec::new();
    let mut stack: Vec<PendingEntry> = Vec::new();
    let mut nav_depth = 0usize;
    let mut in_toc = false;
    let mut in_label = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"nav" => {
                    nav_depth += 1;
                    let kind = attr(&e, b"epub:type").or_else(|| attr(&e, b"type"));
                    if kind.is_some_and(|k| k.split_ascii_whitespace().any(|t| t == "toc")) {
                        in_toc = true;
                    }
                }
                b"li" if in_toc => stack.push(PendingEntry::new()),
                b"a" | b"span" if in_toc && !stack.is_empty() => {
                    in_label = true;
                    if let Some(href) = attr(&e, b"href") {
                        set_href(&mut stack, Some(href));
                    }
                }
                _ => {}
            },
            Event::Text(e) if in_label => push_label(&mut stack, &String::from_utf8_lossy(e.as_ref())),
            Event::GeneralRef(e) if in_label => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                    push_label(&mut stack, &resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"a" | b"span" => in_label = false,
                b"li" if in_toc => close_entry(&mut stack, &mut roots, base),
                b"nav" => {
                    nav_depth = nav_depth.saturating_sub(1);
                    if in_toc {
                        // Only the first toc nav is used.
                        break;
                    }
                    if nav_depth == 0 {
                        in_toc = false;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(roots)
}

fn set_href(stack: &mut [PendingEntry], href: Option<String>) {
    if let (Some(entry), Some(href)) = (stack.last_mut(), href)
        && entry.href.is_none()
    {
        entry.href = Some(href);
    }
}

fn push_label(stack: &mut [PendingEntry], text: &str) {
    if let Some(entry) = stack.last_mut() {
        entry.label.push_str(text);
    }
}

const BLOCK_TAGS: &[&[u8]] = &[
    b"p", b"div", b"h1", b"h2", b"h3", b"h4", b"h5", b"h6", b"li", b"blockquote", b"pre", b"tr",
    b"section", b"article", b"dt", b"dd", b"figcaption", b"br", b"hr", b"table", b"ul", b"ol",
];
const SKIPPED_TAGS: &[&[u8]] = &[b"head", b"script", b"style"];

/// Plain-text paragraphs of an XHTML document. Malformed markup ends the
/// extraction early but keeps what was read so far.
pub fn extract_paragraphs(xhtml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xhtml);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut skip_depth = 0usize;

    let flush = |current: &mut String, paragraphs: &mut Vec<String>| {
        let text = collapse_whitespace(current);
        if !text.is_empty() {
            paragraphs.push(text);
        }
        current.clear();
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if SKIPPED_TAGS.contains(&local) {
                    skip_depth += 1;
                } else if skip_depth == 0 && BLOCK_TAGS.contains(&local) {
                    flush(&mut current, &mut paragraphs);
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if skip_depth == 0 && BLOCK_TAGS.contains(&local_name(name.as_ref())) {
                    flush(&mut current, &mut paragraphs);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if SKIPPED_TAGS.contains(&local) {
                    skip_depth = skip_depth.saturating_sub(1);
                } else if skip_depth == 0 && BLOCK_TAGS.contains(&local) {
                    flush(&mut current, &mut paragraphs);
                }
            }
            Ok(Event::Text(e)) if skip_depth == 0 => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::CData(e)) if skip_depth == 0 => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::GeneralRef(e)) if skip_depth == 0 => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                    current.push_str(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                tracing::warn!(error = %err, "stopping at malformed markup");
                break;
            }
            _ => {}
        }
    }
    flush(&mut current, &mut paragraphs);
    paragraphs
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn read_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> anyhow::Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .with_context(|| format!("missing {path} in archive"))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .with_context(|| format!("read {path}"))?;
    Ok(data)
}

fn read_text<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> anyhow::Result<String> {
    let data = read_bytes(archive, path)?;
    let (text, _, _) = encoding_rs::UTF_8.decode(&data);
    Ok(text.into_owned())
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(a.value.as_ref()).into_owned())
}

/// `dc:title` → `title`.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

fn resolve_entity(entity: &str) -> Option<String> {
    let named = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        _ => "",
    };
    if !named.is_empty() {
        return Some(named.to_string());
    }

    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse().ok()?
    };
    char::from_u32(code).map(String::from)
}

fn parent_dir(path: &str) -> String {
    path.rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default()
}

/// Joins `href` onto `base`, folding `.` and `..` segments. Fragments are
/// kept.
pub(crate) fn resolve_path(base: &str, href: &str) -> String {
    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };

    let mut parts: Vec<&str> = if path.starts_with('/') || base.is_empty() {
        Vec::new()
    } else {
        base.split('/').filter(|p| !p.is_empty()).collect()
    };
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let mut resolved = parts.join("/");
    if let Some(fragment) = fragment {
        resolved.push('#');
        resolved.push_str(fragment);
    }
    resolved
}
