//! Archive extraction.
//!
//! The pipeline only needs "unpack this archive into that directory", so the
//! extractor sits behind the [`Archiver`] trait:
//! - [`ZipArchiver`] unpacks `.zip` files in-process
//! - [`SevenZip`] shells out to a `7z` executable for every other format
//! - [`DefaultArchiver`] picks between the two by extension

use crate::error::ArchiveError;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Unpacks one archive into a destination directory.
pub trait Archiver: Send + Sync {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ArchiveError>;
}

/// In-process ZIP extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ArchiveError> {
        let file = fs::File::open(archive).map_err(|e| ArchiveError::Io {
            path: archive.to_path_buf(),
            source: e,
        })?;
        let mut zip = zip::ZipArchive::new(file)?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let Some(entry_path) = entry.enclosed_name() else {
                warn!(entry = entry.name(), archive = %archive.display(), "Skipping entry outside the destination");
                continue;
            };
            let output_path = destination.join(entry_path);

            if entry.is_dir() {
                create_dir(&output_path)?;
                continue;
            }
            if let Some(parent) = output_path.parent() {
                create_dir(parent)?;
            }
            let mut outfile = fs::File::create(&output_path).map_err(|e| ArchiveError::Io {
                path: output_path.clone(),
                source: e,
            })?;
            io::copy(&mut entry, &mut outfile).map_err(|e| ArchiveError::Io {
                path: output_path.clone(),
                source: e,
            })?;
        }

        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), ArchiveError> {
    fs::create_dir_all(path).map_err(|e| ArchiveError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// External `7z` process.
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: PathBuf,
}

impl SevenZip {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uses `7z` from `bin_dir` when present there, otherwise from `PATH`.
    pub fn locate(bin_dir: Option<&Path>) -> Self {
        let name = if cfg!(windows) { "7z.exe" } else { "7z" };
        match bin_dir.map(|dir| dir.join(name)) {
            Some(candidate) if candidate.is_file() => Self::new(candidate),
            _ => Self::new(name),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Archiver for SevenZip {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ArchiveError> {
        let output = Command::new(&self.program)
            .arg("x")
            .arg(archive)
            .arg(format!("-o{}", destination.display()))
            .arg("-y")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ArchiveError::ProgramNotFound {
                    program: self.program.clone(),
                },
                _ => ArchiveError::Io {
                    path: self.program.clone(),
                    source: e,
                },
            })?;

        if !output.status.success() {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr),
                "7z reported a failure"
            );
            return Err(ArchiveError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
            });
        }
        Ok(())
    }
}

/// Routes `.zip` files to [`ZipArchiver`] and everything else to [`SevenZip`].
#[derive(Debug, Clone)]
pub struct DefaultArchiver {
    zip: ZipArchiver,
    seven_zip: SevenZip,
}

impl DefaultArchiver {
    pub fn new(seven_zip: SevenZip) -> Self {
        Self {
            zip: ZipArchiver,
            seven_zip,
        }
    }
}

impl Archiver for DefaultArchiver {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ArchiveError> {
        let is_zip = archive
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_zip {
            self.zip.extract(archive, destination)
        } else {
            self.seven_zip.extract(archive, destination)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).expect("Failed to create zip");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            zip.start_file(*name, options).expect("Failed to start entry");
            zip.write_all(content.as_bytes()).expect("Failed to write entry");
        }
        zip.finish().expect("Failed to finish zip");
    }

    #[test]
    fn test_zip_extracts_nested_entries() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let archive = temp.path().join("pkg.zip");
        write_zip(&archive, &[("main.xml", "<mod/>"), ("units/a.unit", "unit")]);
        let dest = temp.path().join("extract/pkg");

        ZipArchiver.extract(&archive, &dest).expect("extract succeeds");

        assert_eq!(fs::read_to_string(dest.join("main.xml")).expect("read"), "<mod/>");
        assert!(dest.join("units/a.unit").exists());
    }

    #[test]
    fn test_zip_rejects_corrupt_archive() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, b"not a zip").expect("write");

        let err = ZipArchiver
            .extract(&archive, &temp.path().join("out"))
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Zip(_)));
    }

    #[test]
    fn test_missing_seven_zip_binary() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let archive = temp.path().join("pkg.7z");
        fs::write(&archive, b"x").expect("write");
        let archiver = SevenZip::new(temp.path().join("no-such-7z"));

        let err = archiver.extract(&archive, temp.path()).unwrap_err();

        assert!(matches!(err, ArchiveError::ProgramNotFound { .. }));
    }

    #[test]
    fn test_locate_prefers_bin_dir() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let name = if cfg!(windows) { "7z.exe" } else { "7z" };
        fs::write(temp.path().join(name), b"").expect("write");

        let located = SevenZip::locate(Some(temp.path()));

        assert_eq!(located.program(), temp.path().join(name));
        assert_eq!(SevenZip::locate(None).program(), Path::new(name));
    }
}
