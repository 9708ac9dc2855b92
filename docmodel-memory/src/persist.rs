//! File persistence for the in-memory store.
//!
//! Each collection lives in `<dir>/<collection>.db`, one JSON-encoded record per line.
//! Files are rewritten whole after every write, through a temporary file and a rename, so
//! a crash never leaves a half-written collection behind.

use bson::Document;
use std::{
    collections::HashMap,
    fs,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

use docmodel_core::error::DocumentStoreError;

const EXTENSION: &str = "db";

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}, line {line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

impl From<PersistError> for DocumentStoreError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Io { .. } => DocumentStoreError::Backend(err.to_string()),
            PersistError::Corrupt { .. } | PersistError::Encode(_) => {
                DocumentStoreError::Serialization(err.to_string())
            }
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError + '_ {
    move |source| PersistError::Io { path: path.to_path_buf(), source }
}

fn collection_file(dir: &Path, collection: &str) -> PathBuf {
    dir.join(format!("{collection}.{EXTENSION}"))
}

/// Reads every collection file in `dir`, creating the directory if it does not exist.
pub(crate) fn load_dir(dir: &Path) -> Result<HashMap<String, Vec<Document>>, PersistError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let mut collections = HashMap::new();

    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };

        let file = fs::File::open(&path).map_err(io_error(&path))?;
        let mut records = Vec::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(io_error(&path))?;
            if line.trim().is_empty() {
                continue;
            }

            let record = serde_json::from_str::<Document>(&line).map_err(|source| {
                PersistError::Corrupt { path: path.clone(), line: index + 1, source }
            })?;
            records.push(record);
        }

        debug!(collection = %name, records = records.len(), "loaded collection file");
        collections.insert(name, records);
    }

    Ok(collections)
}

/// Replaces the file of `collection` with `records`.
pub(crate) fn write_collection(
    dir: &Path,
    collection: &str,
    records: &[Document],
) -> Result<(), PersistError> {
    let path = collection_file(dir, collection);
    let tmp = path.with_extension(format!("{EXTENSION}~"));

    let mut contents = Vec::new();
    for record in records {
        serde_json::to_writer(&mut contents, record)?;
        contents.push(b'\n');
    }

    let mut file = fs::File::create(&tmp).map_err(io_error(&tmp))?;
    file.write_all(&contents).map_err(io_error(&tmp))?;
    file.sync_all().map_err(io_error(&tmp))?;
    fs::rename(&tmp, &path).map_err(io_error(&path))?;

    Ok(())
}

/// Removes every collection file in `dir`.
pub(crate) fn remove_all(dir: &Path) -> Result<(), PersistError> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
            fs::remove_file(&path).map_err(io_error(&path))?;
        }
    }

    Ok(())
}
