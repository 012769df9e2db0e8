use libris_application::{FileSource, NoticeKind, import_files};
use libris_core::{BookFormat, BookId, BookStore as _};
use libris_engine::Engine;
use libris_test::{EpubFixture, MemFile, Stores, sample_epub};

#[test]
fn batch_counts_imported_failed_and_skipped() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();

    let good = MemFile::new("notes.txt", "first line\nsecond line\n");
    let broken = MemFile::new("broken.epub", "this is not a zip archive");
    let unsupported = MemFile::new("scan.pdf", "%PDF-1.7");
    let files: Vec<&dyn FileSource> = vec![&good, &broken, &unsupported];

    let report = ctx.import_files(&files).expect("non-empty batch");
    assert_eq!(report.imported, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("broken.epub"));

    let notice = ctx.notice().expect("import leaves a notice");
    assert_eq!(notice.kind, NoticeKind::Error);
    assert!(notice.message.starts_with("Imported 1 book(s), 1 failed, 1 skipped"));

    assert_eq!(ctx.books.len(), 1);
    assert_eq!(ctx.books[0].title, "notes.txt");
    assert_eq!(ctx.books[0].format, BookFormat::Text);
    Ok(())
}

#[test]
fn empty_selection_changes_nothing() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    assert!(ctx.import_files(&[]).is_none());
    assert!(ctx.notice().is_none());
    assert!(ctx.books.is_empty());
    Ok(())
}

#[test]
fn epub_import_keeps_metadata_and_cover() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let library = stores.library();
    let bytes = sample_epub()?;
    let file = MemFile::new("sample.epub", bytes.clone());

    let report = import_files(&library, &Engine::new(), &[&file]);
    assert_eq!(report.imported, 1);

    let id = BookId::from_file("sample.epub", bytes.len() as u64);
    let record = library.get(&id)?.expect("stored");
    assert_eq!(record.title, "The Sample Book");
    assert_eq!(record.format, BookFormat::Epub);
    assert_eq!(record.content, bytes);
    let metadata = record.metadata.expect("epub metadata");
    assert_eq!(metadata.creator.as_deref(), Some("Ada Writer"));
    assert_eq!(metadata.language.as_deref(), Some("en"));
    let cover = record.cover_image.expect("cover");
    assert!(cover.starts_with("data:image/png;base64,"));
    Ok(())
}

#[test]
fn epub_without_title_falls_back_to_file_name() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let library = stores.library();
    let bytes = EpubFixture::new("  ")
        .chapter("Only", &["Some text."])
        .build()?;
    let file = MemFile::new("untitled.epub", bytes);

    let report = import_files(&library, &Engine::new(), &[&file]);
    assert_eq!(report.imported, 1);
    let records = library.list()?;
    assert_eq!(records[0].title, "untitled.epub");
    assert!(records[0].cover_image.is_none());
    Ok(())
}

#[test]
fn reimporting_the_same_file_overwrites() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let file = MemFile::new("notes.txt", "same bytes");

    ctx.import_files(&[&file]);
    let first = ctx.books[0].last_opened_at;
    ctx.import_files(&[&file]);

    assert_eq!(stores.books.list()?.len(), 1);
    assert!(ctx.books[0].last_opened_at >= first);
    Ok(())
}

#[test]
fn same_name_different_size_is_a_different_book() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let short = MemFile::new("notes.txt", "short");
    let long = MemFile::new("notes.txt", "a little longer");

    ctx.import_files(&[&short, &long]);
    assert_eq!(ctx.books.len(), 2);
    Ok(())
}
