use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::pipeline::Document;

pub const DEFAULT_ARCHIVE_NAME: &str = "subtitles.zip";

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("nothing to package")]
    Empty,
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What gets handed to the user: one `.srt` file, or a zip of them.
#[derive(Debug)]
pub enum Package {
    Single { file_name: String, content: String },
    Archive { file_name: String, bytes: Vec<u8> },
}

impl Package {
    /// A single document is kept as-is; several are zipped as
    /// `<video-id>.srt` entries in the given order.
    pub fn from_documents(docs: &[Document], archive_name: &str) -> Result<Self, PackageError> {
        match docs {
            [] => Err(PackageError::Empty),
            [doc] => Ok(Package::Single {
                file_name: doc.file_name(),
                content: doc.content.clone(),
            }),
            _ => Ok(Package::Archive {
                file_name: archive_name.to_string(),
                bytes: zip_documents(docs)?,
            }),
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            Package::Single { file_name, .. } | Package::Archive { file_name, .. } => file_name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Package::Single { content, .. } => content.as_bytes(),
            Package::Archive { bytes, .. } => bytes,
        }
    }

    /// Write the package into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, PackageError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        fs::write(&path, self.bytes())?;
        debug!(path = %path.display(), bytes = self.bytes().len(), "package written");
        Ok(path)
    }
}

fn zip_documents(docs: &[Document]) -> Result<Vec<u8>, PackageError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for doc in docs {
        zip.start_file(doc.file_name(), options)?;
        zip.write_all(doc.content.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}
