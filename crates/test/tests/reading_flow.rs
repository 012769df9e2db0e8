use std::rc::Rc;

use libris_application::{AppContext, Library, SettingsManager, position_key};
use libris_core::{BookId, PreferenceStore as _, ReadingPosition};
use libris_engine::Engine;
use libris_storage::{PreferenceFile, Storage};
use libris_test::{EpubFixture, MemFile, Stores, sample_epub};

fn import_sample(ctx: &mut AppContext) -> anyhow::Result<BookId> {
    let bytes = sample_epub()?;
    let id = BookId::from_file("sample.epub", bytes.len() as u64);
    let file = MemFile::new("sample.epub", bytes);
    ctx.import_files(&[&file]);
    Ok(id)
}

#[test]
fn never_opened_book_starts_at_the_beginning() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let id = import_sample(&mut ctx)?;

    assert!(ctx.open_book(&id));
    let rendition = ctx.session.rendition().expect("open");
    assert_eq!(
        rendition.location(),
        Some(ReadingPosition("0:0".to_string()))
    );
    assert_eq!(rendition.progress_percent(), 0.0);
    assert_eq!(stores.library().last_opened()?, Some(id));
    Ok(())
}

#[test]
fn navigation_lists_chapters_and_jumps() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let id = import_sample(&mut ctx)?;
    ctx.open_book(&id);

    let labels: Vec<&str> = ctx.session.toc().iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, ["Opening", "Middle", "Closing"]);

    let matches = ctx.session.filtered_toc("mid");
    assert_eq!(matches.len(), 1);
    let href = matches[0].1.href.clone();

    ctx.go_to(&href);
    let rendition = ctx.session.rendition().expect("open");
    assert_eq!(rendition.location(), Some(ReadingPosition("1:0".to_string())));
    assert_eq!(rendition.chapter_label().as_deref(), Some("2/3 - Middle"));
    assert_eq!(
        stores.library().position(&id)?,
        Some(ReadingPosition("1:0".to_string()))
    );
    Ok(())
}

#[test]
fn paging_saves_the_position() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let id = import_sample(&mut ctx)?;
    ctx.open_book(&id);
    ctx.session.resize(40, 2);

    ctx.next_page();
    let saved = stores.library().position(&id)?.expect("saved after paging");
    assert_ne!(saved.as_str(), "0:0");

    ctx.prev_page();
    assert_eq!(stores.library().position(&id)?.as_ref().map(|p| p.as_str()), Some("0:0"));
    Ok(())
}

#[test]
fn position_is_restored_on_reopen() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let id = import_sample(&mut ctx)?;
    ctx.open_book(&id);
    let href = ctx.session.toc()[2].href.clone();
    ctx.go_to(&href);
    ctx.close_book();

    let mut ctx = stores.context();
    assert!(ctx.resume_last_book());
    assert_eq!(ctx.session.current_id(), Some(&id));
    let rendition = ctx.session.rendition().expect("open");
    assert_eq!(rendition.location(), Some(ReadingPosition("2:0".to_string())));
    Ok(())
}

#[test]
fn stale_position_falls_back_to_the_start() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let id = import_sample(&mut ctx)?;
    for stale in ["42:0", "0:99", "2:99"] {
        stores.prefs.set_item(&position_key(&id), stale)?;

        assert!(ctx.open_book(&id));
        let rendition = ctx.session.rendition().expect("open");
        assert_eq!(
            rendition.location(),
            Some(ReadingPosition("0:0".to_string())),
            "saved position {stale}"
        );
        ctx.close_book();
    }
    Ok(())
}

#[test]
fn deleting_a_book_removes_it_and_its_position() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let id = import_sample(&mut ctx)?;
    ctx.open_book(&id);
    let href = ctx.session.toc()[1].href.clone();
    ctx.go_to(&href);

    ctx.delete_book(&id);
    assert!(!ctx.session.is_open());
    assert!(ctx.books.is_empty());
    assert!(stores.library().get(&id)?.is_none());
    assert!(stores.prefs.get_item(&position_key(&id))?.is_none());
    assert!(stores.library().last_opened()?.is_none());
    Ok(())
}

#[test]
fn opening_a_missing_book_reports_and_refreshes() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    assert!(!ctx.open_book(&BookId("gone.txt-3".to_string())));
    let notice = ctx.take_notice().expect("notice");
    assert!(notice.message.contains("gone.txt-3"));
    Ok(())
}

#[test]
fn book_with_no_text_fails_to_render() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let bytes = EpubFixture::new("Blank").chapter("", &[]).build()?;
    let id = BookId::from_file("blank.epub", bytes.len() as u64);
    let file = MemFile::new("blank.epub", bytes);
    ctx.import_files(&[&file]);
    ctx.take_notice();

    assert!(!ctx.open_book(&id));
    assert!(!ctx.session.is_open());
    assert!(ctx.take_notice().is_some());
    Ok(())
}

#[test]
fn text_books_read_line_by_line() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let file = MemFile::new("poem.txt", "roses are red\nviolets are blue\n");
    ctx.import_files(&[&file]);
    let id = ctx.books[0].id.clone();

    ctx.open_book(&id);
    let lines = ctx.session.rendition().expect("open").visible_lines();
    assert_eq!(lines[0], "roses are red");
    assert_eq!(lines[1], "violets are blue");
    assert!(ctx.session.toc().is_empty());
    Ok(())
}

#[test]
fn positions_survive_a_restart_on_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("library.db");
    let prefs_path = dir.path().join("preferences.json");

    let open_context = || -> anyhow::Result<AppContext> {
        let prefs = Rc::new(PreferenceFile::open(&prefs_path)?);
        let library = Library::new(Rc::new(Storage::open(&db)?), prefs.clone());
        let engine = Rc::new(Engine::new());
        Ok(AppContext::new(
            library,
            SettingsManager::load(prefs),
            engine.clone(),
            engine,
        ))
    };

    let id = {
        let mut ctx = open_context()?;
        let id = import_sample(&mut ctx)?;
        ctx.open_book(&id);
        let href = ctx.session.toc()[1].href.clone();
        ctx.go_to(&href);
        ctx.close_book();
        id
    };

    let mut ctx = open_context()?;
    assert_eq!(ctx.books.len(), 1);
    assert!(ctx.resume_last_book());
    assert_eq!(ctx.session.current_id(), Some(&id));
    let rendition = ctx.session.rendition().expect("open");
    assert_eq!(rendition.location(), Some(ReadingPosition("1:0".to_string())));
    Ok(())
}
