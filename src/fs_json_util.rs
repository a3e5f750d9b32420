use std::{
    io::{self, BufReader, BufWriter, Write},
    path::Path,
};

use fs_err::File;
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ReadJsonError {
    #[error("The file was not found.")]
    NotFound,
    #[error("An I/O error occurred while reading the file: {0}")]
    IOError(io::Error),
    #[error("The json file is corrupted and could not be loaded: {0}")]
    JsonError(#[from] serde_json::Error),
}
impl From<io::Error> for ReadJsonError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::IOError(e),
        }
    }
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ReadJsonError> {
    let file = File::open(path.as_ref())?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Like [`read_json`], but a missing file yields `T::default()`.
pub fn read_json_or_default<T: DeserializeOwned + Default>(
    path: impl AsRef<Path>,
) -> Result<T, ReadJsonError> {
    match read_json(path) {
        Err(ReadJsonError::NotFound) => Ok(T::default()),
        res => res,
    }
}

/// Writes `value` next to `path` first and renames it into place,
/// so readers never observe a half-written file.
pub fn write_json_atomically<T: Serialize>(path: impl AsRef<Path>, value: &T) -> io::Result<()> {
    let path = path.as_ref();
    let tmp_path = path.with_extension("json.tmp");
    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    fs_err::rename(&tmp_path, path)
}
