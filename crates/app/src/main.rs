mod config;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Mutex;

use anyhow::Context as _;
use clap::Parser;
use libris_application::{AppContext, DiskFile, FileSource, Library, NoticeKind, SettingsManager};
use libris_engine::Engine;
use libris_storage::{PreferenceFile, Storage};
use libris_ui::Ui;
use tracing_subscriber::EnvFilter;

use config::{Cli, Command, LOG_FILTER_ENV, Paths};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = Paths::resolve(cli.data_dir)?;
    init_logging(&paths)?;
    tracing::info!(dir = %paths.dir().display(), "libris starting");

    let prefs = Rc::new(PreferenceFile::open(paths.preferences())?);
    let library = match Storage::open(paths.database()) {
        Ok(storage) => Library::new(Rc::new(storage), prefs.clone()),
        Err(err) => {
            let reason = format!("{err:#}");
            tracing::error!(error = %reason, "could not open library database");
            Library::unavailable(reason, prefs.clone())
        }
    };
    let settings = SettingsManager::load(prefs);
    let engine = Rc::new(Engine::new());
    let mut ctx = AppContext::new(library, settings, engine.clone(), engine);

    match cli.command {
        Some(Command::Import { files }) => import(&mut ctx, &files),
        Some(Command::Reset) => {
            ctx.reset_all();
            print_notice(&mut ctx);
            Ok(())
        }
        None => {
            ctx.resume_last_book();
            let mut ui = Ui::new(ctx);
            ui.run()
        }
    }
}

fn import(ctx: &mut AppContext, paths: &[PathBuf]) -> anyhow::Result<()> {
    // A notice from startup (unavailable storage) is replaced by the import
    // report, which repeats the failure per file.
    ctx.take_notice();

    let mut files = Vec::new();
    for path in paths {
        match DiskFile::open(path) {
            Ok(file) => files.push(file),
            Err(err) => eprintln!("{err:#}"),
        }
    }
    let sources: Vec<&dyn FileSource> = files.iter().map(|f| f as &dyn FileSource).collect();
    let report = ctx.import_files(&sources);
    print_notice(ctx);

    match report {
        Some(report) if report.failed > 0 => {
            anyhow::bail!("{} of {} file(s) failed to import", report.failed, paths.len())
        }
        _ => Ok(()),
    }
}

fn print_notice(ctx: &mut AppContext) {
    if let Some(notice) = ctx.take_notice() {
        match notice.kind {
            NoticeKind::Info => println!("{}", notice.message),
            NoticeKind::Error => eprintln!("{}", notice.message),
        }
    }
}

/// The terminal belongs to the UI, so logs go to a file in the data dir.
fn init_logging(paths: &Paths) -> anyhow::Result<()> {
    let log_path = paths.log_file();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("install log subscriber: {err}"))
}
