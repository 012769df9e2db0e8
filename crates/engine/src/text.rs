//! Plain-text books.

use crate::epub::Chapter;

/// Decodes imported text as UTF-8. A byte-order mark is honoured and
/// stripped; malformed sequences become U+FFFD.
pub fn decode(bytes: &[u8]) -> String {
    let (text, encoding, had_errors) = encoding_rs::UTF_8.decode(bytes);
    if had_errors {
        tracing::warn!(encoding = encoding.name(), "replaced malformed sequences while decoding text");
    }
    text.into_owned()
}

/// A text book as a single chapter, one paragraph per source line.
pub fn chapter(text: &str) -> Chapter {
    Chapter {
        href: String::new(),
        paragraphs: text
            .lines()
            .map(|line| line.trim_end().replace('\t', "    "))
            .collect(),
    }
}
