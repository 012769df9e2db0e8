//! Paginated, width-aware view over a chapter list.

use std::collections::BTreeMap;

use libris_core::{ReadingPosition, Rendition, StyleRules, TocItem, flatten_toc};
use unicode_width::UnicodeWidthStr;

use crate::epub::Chapter;

const DEFAULT_WIDTH: u16 = 80;
const DEFAULT_HEIGHT: u16 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Anchor {
    chapter: usize,
    paragraph: usize,
}

impl Anchor {
    fn token(&self) -> ReadingPosition {
        ReadingPosition(format!("{}:{}", self.chapter, self.paragraph))
    }

    fn parse(token: &str) -> Option<Self> {
        let (chapter, paragraph) = token.split_once(':')?;
        Some(Self {
            chapter: chapter.trim().parse().ok()?,
            paragraph: paragraph.trim().parse().ok()?,
        })
    }
}

#[derive(Debug, Clone)]
struct WrappedLine {
    text: String,
    anchor: Anchor,
}

#[derive(Debug, Default)]
pub struct DocumentRendition {
    chapters: Vec<Chapter>,
    toc: Vec<TocItem>,
    paragraph_gap: bool,
    width: u16,
    height: u16,
    lines: Vec<WrappedLine>,
    top: usize,
    styles: BTreeMap<String, StyleRules>,
    selected_style: Option<String>,
    relocated: Option<ReadingPosition>,
}

impl DocumentRendition {
    /// `paragraph_gap` inserts a blank line between paragraphs; text books
    /// keep their own line layout.
    pub fn new(chapters: Vec<Chapter>, toc: Vec<TocItem>, paragraph_gap: bool) -> Self {
        let mut rendition = Self {
            chapters,
            toc,
            paragraph_gap,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            ..Self::default()
        };
        rendition.reflow();
        rendition
    }

    fn reflow(&mut self) {
        let width = usize::from(self.width.max(1));
        self.lines.clear();
        for (chapter_idx, chapter) in self.chapters.iter().enumerate() {
            if chapter_idx > 0 && !self.lines.is_empty() {
                self.lines.push(WrappedLine {
                    text: String::new(),
                    anchor: Anchor {
                        chapter: chapter_idx,
                        paragraph: 0,
                    },
                });
            }
            for (paragraph_idx, paragraph) in chapter.paragraphs.iter().enumerate() {
                let anchor = Anchor {
                    chapter: chapter_idx,
                    paragraph: paragraph_idx,
                };
                for text in wrap_text(paragraph, width) {
                    self.lines.push(WrappedLine { text, anchor });
                }
                if self.paragraph_gap {
                    self.lines.push(WrappedLine {
                        text: String::new(),
                        anchor,
                    });
                }
            }
        }
    }

    fn page_height(&self) -> usize {
        usize::from(self.height.max(1))
    }

    fn anchor(&self) -> Option<Anchor> {
        self.lines.get(self.top).map(|line| line.anchor)
    }

    fn seek(&mut self, anchor: Anchor) {
        self.top = self
            .lines
            .iter()
            .position(|line| line.anchor >= anchor)
            .unwrap_or_else(|| self.lines.len().saturating_sub(1));
    }

    /// Paragraph 0 always exists, even in a chapter with no text.
    fn contains(&self, anchor: Anchor) -> bool {
        self.chapters.get(anchor.chapter).is_some_and(|chapter| {
            anchor.paragraph == 0 || anchor.paragraph < chapter.paragraphs.len()
        })
    }

    fn move_to(&mut self, top: usize) {
        if top != self.top {
            self.top = top;
            self.relocated = self.location();
        }
    }

    fn chapter_for_href(&self, href: &str) -> Option<usize> {
        let path = href.split('#').next().unwrap_or(href);
        if path.is_empty() {
            return None;
        }
        self.chapters
            .iter()
            .position(|c| c.href == path)
            .or_else(|| self.chapters.iter().position(|c| c.href.ends_with(path)))
    }
}

impl Rendition for DocumentRendition {
    fn display(&mut self, target: Option<&str>) -> anyhow::Result<()> {
        let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) else {
            self.top = 0;
            self.relocated = self.location();
            return Ok(());
        };

        let anchor = match Anchor::parse(target) {
            Some(anchor) if self.contains(anchor) => anchor,
            Some(_) => anyhow::bail!("position {target} is outside this book"),
            None => {
                let chapter = self
                    .chapter_for_href(target)
                    .ok_or_else(|| anyhow::anyhow!("no chapter matches {target}"))?;
                Anchor {
                    chapter,
                    paragraph: 0,
                }
            }
        };
        self.seek(anchor);
        self.relocated = self.location();
        Ok(())
    }

    fn next(&mut self) {
        let next = self.top + self.page_height();
        if next < self.lines.len() {
            self.move_to(next);
        }
    }

    fn prev(&mut self) {
        self.move_to(self.top.saturating_sub(self.page_height()));
    }

    fn resize(&mut self, width: u16, height: u16) {
        if width == self.width && height == self.height {
            return;
        }
        let anchor = self.anchor();
        self.width = width;
        self.height = height;
        self.reflow();
        match anchor {
            Some(anchor) => self.seek(anchor),
            None => self.top = 0,
        }
    }

    fn location(&self) -> Option<ReadingPosition> {
        self.anchor().map(|anchor| anchor.token())
    }

    fn take_relocated(&mut self) -> Option<ReadingPosition> {
        self.relocated.take()
    }

    fn navigation(&self) -> &[TocItem] {
        &self.toc
    }

    fn chapter_label(&self) -> Option<String> {
        let chapter = self.chapters.get(self.anchor()?.chapter)?;
        let entries = flatten_toc(&self.toc);
        let index = entries.iter().position(|(_, item)| {
            item.href.split('#').next().unwrap_or_default() == chapter.href
        })?;
        Some(format!(
            "{}/{} - {}",
            index + 1,
            entries.len(),
            entries[index].1.label.trim()
        ))
    }

    fn progress_percent(&self) -> f32 {
        let last = self.lines.len().saturating_sub(1);
        if last == 0 {
            0.0
        } else {
            (self.top.min(last) as f32 / last as f32) * 100.0
        }
    }

    fn register_style(&mut self, name: &str, rules: StyleRules) {
        self.styles.insert(name.to_string(), rules);
    }

    fn select_style(&mut self, name: &str) {
        if !self.styles.contains_key(name) {
            tracing::warn!(style = name, "selecting unregistered style");
        }
        self.selected_style = Some(name.to_string());
    }

    fn active_style(&self) -> Option<&StyleRules> {
        self.selected_style
            .as_ref()
            .and_then(|name| self.styles.get(name))
    }

    fn visible_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .skip(self.top)
            .take(self.page_height())
            .map(|line| line.text.clone())
            .collect()
    }

    fn destroy(&mut self) {
        self.chapters.clear();
        self.toc.clear();
        self.lines.clear();
        self.styles.clear();
        self.selected_style = None;
        self.relocated = None;
        self.top = 0;
    }
}

/// Greedy word wrap by display width. Words wider than the line are split
/// by character. An empty paragraph yields one empty line.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for word in text.split_whitespace() {
        let word_width = UnicodeWidthStr::width(word);
        let sep_width = usize::from(!current.is_empty());

        if current_width + sep_width + word_width <= max_width {
            if !current.is_empty() {
                current.push(' ');
                current_width += 1;
            }
            current.push_str(word);
            current_width += word_width;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }

        if word_width <= max_width {
            current.push_str(word);
            current_width = word_width;
            continue;
        }

        for ch in word.chars() {
            let mut buf = [0u8; 4];
            let w = UnicodeWidthStr::width(&*ch.encode_utf8(&mut buf));
            if current_width + w > max_width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push(ch);
            current_width += w;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        vec![String::new()]
    } else {
        lines
    }
}
