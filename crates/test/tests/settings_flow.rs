use std::rc::Rc;

use libris_application::{
    BASE_LAYOUT_STYLE, CUSTOM_STYLE, LAST_OPENED_KEY, PREFERENCES_KEY, SettingsManager,
    derive_theme,
};
use libris_core::{
    BookId, CUSTOM_THEME_NAME, DEFAULT_THEME_NAME, FONT_SIZE_MAX, LibraryError, PreferenceStore as _,
    Rgb, SortOrder,
};
use libris_storage::PreferenceFile;
use libris_test::{MemFile, RecordingRendition, Stores, sample_epub};

fn rgb(value: &str) -> anyhow::Result<Rgb> {
    Ok(value.parse()?)
}

#[test]
fn partial_blob_keeps_stored_fields_and_defaults_the_rest() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    stores
        .prefs
        .set_item(PREFERENCES_KEY, r#"{"fontSize":20,"activeThemeName":"Paper"}"#)?;

    let settings = stores.settings();
    let prefs = settings.preferences();
    assert_eq!(prefs.font_size, 20);
    assert_eq!(prefs.active_theme_name, "Paper");
    assert_eq!(prefs.sort_order, SortOrder::LastOpened);
    assert_eq!(prefs.themes.len(), 5);
    assert!(!prefs.keep_original_format);
    Ok(())
}

#[test]
fn unreadable_blob_falls_back_to_defaults() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    stores.prefs.set_item(PREFERENCES_KEY, "{not json")?;
    let settings = stores.settings();
    assert_eq!(settings.preferences().active_theme_name, DEFAULT_THEME_NAME);
    assert_eq!(settings.preferences().font_size, 32);
    Ok(())
}

#[test]
fn one_unreadable_field_keeps_the_other_preferences() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    {
        let mut settings = stores.settings();
        settings.set_font_family("Georgia")?;
        settings.add_custom_theme("Night", rgb("#101010")?, rgb("#eeeeee")?)?;
    }
    let stored = stores.prefs.get_item(PREFERENCES_KEY)?.expect("saved");
    let mut blob: serde_json::Value = serde_json::from_str(&stored)?;
    blob["sortOrder"] = serde_json::Value::from("author-asc");
    stores.prefs.set_item(PREFERENCES_KEY, &blob.to_string())?;

    let settings = stores.settings();
    assert_eq!(settings.preferences().font_family, "Georgia");
    assert!(settings.preferences().theme("Night").is_some());
    assert_eq!(settings.preferences().sort_order, SortOrder::LastOpened);

    settings.save()?;
    assert!(stores.settings().preferences().theme("Night").is_some());
    Ok(())
}

#[test]
fn out_of_range_font_size_is_clamped_on_load() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    stores.prefs.set_item(PREFERENCES_KEY, r#"{"fontSize":400}"#)?;
    assert_eq!(stores.settings().preferences().font_size, FONT_SIZE_MAX);
    Ok(())
}

#[test]
fn custom_theme_lifecycle_is_persisted() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();

    ctx.add_custom_theme("Night", "#101010", "#eeeeee");
    ctx.select_theme("Night");
    assert_eq!(stores.settings().preferences().active_theme_name, "Night");
    let stored = stores.settings();
    let night = stored.preferences().theme("Night").expect("persisted");
    assert!(night.is_custom);
    assert_eq!(night.surface.to_string(), "#121212");

    ctx.add_custom_theme(" night ", "#000000", "#ffffff");
    let notice = ctx.take_notice().expect("duplicate reported");
    assert!(notice.message.contains("already exists"));

    ctx.delete_theme("Night");
    let reloaded = stores.settings();
    assert_eq!(reloaded.preferences().active_theme_name, DEFAULT_THEME_NAME);
    assert!(reloaded.preferences().theme("Night").is_none());
    Ok(())
}

#[test]
fn built_in_themes_cannot_be_deleted() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut settings = stores.settings();
    let err = settings.delete_theme("Paper").expect_err("built-in");
    assert!(matches!(err, LibraryError::BuiltinTheme(_)));
    assert!(!settings.delete_theme("Nope")?);
    Ok(())
}

#[test]
fn empty_theme_name_is_rejected() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut settings = stores.settings();
    let err = settings
        .add_custom_theme("   ", rgb("#000")?, rgb("#fff")?)
        .expect_err("empty name");
    assert!(matches!(err, LibraryError::EmptyName));
    Ok(())
}

#[test]
fn derived_colours_follow_background_brightness() -> anyhow::Result<()> {
    let dark = derive_theme("Dark bg", rgb("#202020")?, rgb("#ffffff")?);
    assert_eq!(dark.surface.to_string(), "#252525");
    assert_eq!(dark.border.to_string(), "#2a2a2a");

    let light = derive_theme("Light bg", rgb("#f0f0f0")?, rgb("#000000")?);
    assert_eq!(light.surface.to_string(), "#d8d8d8");
    assert_eq!(light.border.to_string(), "#c0c0c0");
    Ok(())
}

#[test]
fn live_font_edits_reach_the_open_book_before_commit() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let bytes = sample_epub()?;
    let id = BookId::from_file("sample.epub", bytes.len() as u64);
    ctx.import_files(&[&MemFile::new("sample.epub", bytes)]);
    ctx.open_book(&id);

    ctx.set_font_size(40);
    let size = ctx
        .session
        .rendition()
        .and_then(|r| r.active_style())
        .and_then(|s| s.get("p", "font-size"))
        .map(str::to_string);
    assert_eq!(size.as_deref(), Some("40px"));
    assert_eq!(stores.settings().preferences().font_size, 32);

    ctx.commit_settings();
    assert_eq!(stores.settings().preferences().font_size, 40);
    Ok(())
}

#[test]
fn keep_original_format_switches_style_and_locks_theme() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let file = MemFile::new("notes.txt", "hello");
    ctx.import_files(&[&file]);
    let id = ctx.books[0].id.clone();
    ctx.open_book(&id);

    ctx.toggle_keep_original_format();
    let style = ctx.session.rendition().and_then(|r| r.active_style());
    assert!(style.is_some_and(|s| s.get("body", "background").is_none()));

    ctx.select_theme("Paper");
    assert_eq!(ctx.settings.preferences().active_theme_name, DEFAULT_THEME_NAME);

    ctx.toggle_keep_original_format();
    let background = ctx
        .session
        .rendition()
        .and_then(|r| r.active_style())
        .and_then(|s| s.get("body", "background"))
        .map(str::to_string);
    assert_eq!(background.as_deref(), Some("#232627"));
    Ok(())
}

#[test]
fn custom_colours_activate_the_custom_palette() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    ctx.set_custom_colors("#000000", "#00ff00");

    let stored = stores.settings();
    assert_eq!(stored.preferences().active_theme_name, CUSTOM_THEME_NAME);
    assert_eq!(stored.preferences().reading_colors().text, rgb("#00ff00")?);

    ctx.set_custom_colors("green", "#00ff00");
    assert!(ctx.take_notice().is_some_and(|n| n.message.contains("green")));
    Ok(())
}

#[test]
fn sort_order_reorders_the_list() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let b = MemFile::new("b.txt", "b");
    let a = MemFile::new("A.txt", "a");
    ctx.import_files(&[&b, &a]);

    ctx.set_sort_order(SortOrder::TitleAsc);
    let titles: Vec<&str> = ctx.books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, ["A.txt", "b.txt"]);

    ctx.cycle_sort_order();
    assert_eq!(ctx.settings.preferences().sort_order, SortOrder::TitleDesc);
    assert_eq!(ctx.books[0].title, "b.txt");
    Ok(())
}

#[test]
fn reset_wipes_books_positions_and_preferences() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    let bytes = sample_epub()?;
    let id = BookId::from_file("sample.epub", bytes.len() as u64);
    ctx.import_files(&[&MemFile::new("sample.epub", bytes)]);
    ctx.open_book(&id);
    ctx.add_custom_theme("Night", "#101010", "#eeeeee");

    ctx.reset_all();
    assert!(!ctx.session.is_open());
    assert!(ctx.books.is_empty());
    assert!(stores.prefs.get_item(LAST_OPENED_KEY)?.is_none());
    assert!(stores.prefs.get_item(PREFERENCES_KEY)?.is_none());
    assert!(ctx.settings.preferences().theme("Night").is_none());
    Ok(())
}

#[test]
fn typed_font_family_reaches_the_open_book() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    ctx.import_files(&[&MemFile::new("notes.txt", "hello")]);
    let id = ctx.books[0].id.clone();
    ctx.open_book(&id);

    ctx.set_font_family("Noto Serif");
    let family = ctx
        .session
        .rendition()
        .and_then(|r| r.active_style())
        .and_then(|s| s.get("p", "font-family"))
        .map(str::to_string);
    assert_eq!(family.as_deref(), Some("Noto Serif"));
    assert_eq!(stores.settings().preferences().font_family, "Noto Serif");
    Ok(())
}

#[test]
fn preferences_survive_a_restart_on_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("preferences.json");
    {
        let mut settings = SettingsManager::load(Rc::new(PreferenceFile::open(&path)?));
        settings.set_font_family("Georgia")?;
        settings.add_custom_theme("Sepia", rgb("#704214")?, rgb("#fdf5e6")?)?;
    }

    let settings = SettingsManager::load(Rc::new(PreferenceFile::open(&path)?));
    assert_eq!(settings.preferences().font_family, "Georgia");
    assert!(settings.preferences().theme("Sepia").is_some());
    Ok(())
}

#[test]
fn applied_styles_are_both_registered() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut ctx = stores.context();
    ctx.import_files(&[&MemFile::new("notes.txt", "hello")]);
    let id = ctx.books[0].id.clone();
    ctx.open_book(&id);

    let rendition = ctx.session.rendition_mut().expect("open");
    rendition.select_style(BASE_LAYOUT_STYLE);
    assert!(rendition.active_style().is_some());
    rendition.select_style(CUSTOM_STYLE);
    assert_eq!(
        rendition.active_style().and_then(|s| s.get("p", "font-family")),
        Some("Arial")
    );
    Ok(())
}

#[test]
fn apply_registers_both_style_sets_then_selects_one() -> anyhow::Result<()> {
    let stores = Stores::in_memory()?;
    let mut settings = stores.settings();
    let mut rendition = RecordingRendition::new();

    settings.apply_to_rendering(&mut rendition);
    assert_eq!(
        rendition.calls,
        [
            format!("register {BASE_LAYOUT_STYLE}"),
            format!("register {CUSTOM_STYLE}"),
            format!("select {CUSTOM_STYLE}"),
        ]
    );

    settings.set_keep_original_format(true)?;
    settings.apply_to_rendering(&mut rendition);
    assert_eq!(rendition.selected.as_deref(), Some(BASE_LAYOUT_STYLE));
    Ok(())
}
