use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;

pub const DATA_DIR_ENV: &str = "LIBRIS_DATA_DIR";
pub const LOG_FILTER_ENV: &str = "LIBRIS_LOG";

#[derive(Parser, Debug)]
#[command(name = "libris")]
#[command(version, about = "Terminal library and reader for EPUB and text books", long_about = None)]
pub struct Cli {
    /// Directory holding the library database, preferences and log
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import .txt and .epub files into the library
    Import {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete every book, reading position and preference
    Reset,
}

/// Files under the data directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
}

impl Paths {
    pub fn resolve(flag: Option<PathBuf>) -> anyhow::Result<Self> {
        let from_env = std::env::var_os(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let data_dir = match flag.or(from_env) {
            Some(dir) => dir,
            None => ProjectDirs::from("dev", "libris", "libris")
                .context("resolve project dirs")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("create data dir {}", data_dir.display()))?;
        Ok(Self { data_dir })
    }

    pub fn database(&self) -> PathBuf {
        self.data_dir.join("library.db")
    }

    pub fn preferences(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("libris.log")
    }

    pub fn dir(&self) -> &Path {
        &self.data_dir
    }
}
