//! NAR archive creation and extraction.
//!
//! Archivers are looked up by format identifier. The only built-in format,
//! `nar`, is a gzip-compressed tarball.
//!
//! Creating an archive always replaces an existing file of the same name.
//! Extracting never overwrites: an entry whose destination already exists is
//! skipped, so two builds unpacking the same dependency into a shared
//! directory cannot clobber each other.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;

/// Format identifier of NAR archives.
pub const NAR_FORMAT: &str = "nar";

/// Counts reported by an extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub extracted: usize,
    pub skipped: usize,
}

/// Packs and unpacks directory trees.
pub trait Archiver: Send + Sync {
    /// Format identifier this archiver handles.
    fn format(&self) -> &'static str;

    /// Archive everything below `root/content`, with entry names relative to
    /// `root`. Returns the number of files stored.
    fn create(&self, root: &Path, content: &Path, dest: &Path) -> Result<usize>;

    /// Extract `archive` into `dest` without overwriting existing files.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<ExtractSummary>;
}

/// Find the archiver for a format identifier.
pub fn archiver_for(format: &str) -> Result<Box<dyn Archiver>> {
    match format {
        NAR_FORMAT => Ok(Box::new(TarGzArchiver)),
        other => bail!("no archiver for format `{}`", other),
    }
}

/// gzip-compressed tar archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzArchiver;

impl Archiver for TarGzArchiver {
    fn format(&self) -> &'static str {
        NAR_FORMAT
    }

    fn create(&self, root: &Path, content: &Path, dest: &Path) -> Result<usize> {
        let start = root.join(content);
        if !start.is_dir() {
            bail!("cannot archive missing directory: {}", start.display());
        }
        if dest.exists() {
            std::fs::remove_file(dest)
                .with_context(|| format!("failed to replace archive: {}", dest.display()))?;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let file = File::create(dest)
            .with_context(|| format!("failed to create archive: {}", dest.display()))?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let mut files = 0usize;
        for entry in WalkDir::new(&start).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", start.display()))?;
            let path = entry.path();
            let name = match path.strip_prefix(root) {
                Ok(name) if !name.as_os_str().is_empty() => name,
                _ => continue,
            };
            if entry.file_type().is_dir() {
                builder
                    .append_dir(name, path)
                    .with_context(|| format!("failed to add {} to archive", path.display()))?;
            } else {
                builder
                    .append_path_with_name(path, name)
                    .with_context(|| format!("failed to add {} to archive", path.display()))?;
                files += 1;
            }
        }

        let encoder = builder
            .into_inner()
            .with_context(|| format!("failed to finish archive: {}", dest.display()))?;
        encoder
            .finish()
            .with_context(|| format!("failed to finish archive: {}", dest.display()))?;

        tracing::debug!("archived {} files into {}", files, dest.display());
        Ok(files)
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<ExtractSummary> {
        let file = File::open(archive)
            .with_context(|| format!("failed to open archive: {}", archive.display()))?;
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        tar.set_overwrite(false);

        std::fs::create_dir_all(dest)
            .with_context(|| format!("failed to create destination directory: {}", dest.display()))?;

        let mut summary = ExtractSummary::default();
        for entry in tar
            .entries()
            .with_context(|| format!("failed to read entries of {}", archive.display()))?
        {
            let mut entry =
                entry.with_context(|| format!("failed to read entry of {}", archive.display()))?;
            let entry_path = entry.path().context("failed to get entry path")?.into_owned();
            let output_path = safe_join(dest, &entry_path)?;

            let entry_type = entry.header().entry_type();
            if entry_type.is_dir() {
                std::fs::create_dir_all(&output_path).with_context(|| {
                    format!("failed to create directory: {}", output_path.display())
                })?;
                continue;
            }

            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory: {}", parent.display()))?;
            }

            match entry_type {
                tar::EntryType::Regular
                | tar::EntryType::Continuous
                | tar::EntryType::Symlink
                | tar::EntryType::Link => {
                    // Files are created exclusively, so one written by a
                    // concurrent unpack since the entry was read is kept.
                    match entry.unpack(&output_path) {
                        Ok(_) => summary.extracted += 1,
                        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                            tracing::debug!("keeping existing {}", output_path.display());
                            summary.skipped += 1;
                        }
                        Err(e) => {
                            return Err(e).with_context(|| {
                                format!("failed to extract file: {}", output_path.display())
                            });
                        }
                    }
                }
                other => {
                    tracing::debug!(
                        "skipping unsupported entry type {:?}: {}",
                        other,
                        entry_path.display()
                    );
                }
            }
        }

        tracing::debug!(
            "extracted {} files from {} ({} already present)",
            summary.extracted,
            archive.display(),
            summary.skipped
        );
        Ok(summary)
    }
}

/// Join an archive entry name onto `dest`, rejecting names that would
/// escape it.
fn safe_join(dest: &Path, name: &Path) -> Result<PathBuf> {
    let mut out = dest.to_path_buf();
    for component in name.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => bail!("archive entry escapes destination directory: {}", name.display()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("lib/x86_64-Linux-gcc/shared")).unwrap();
        fs::write(root.join("lib/x86_64-Linux-gcc/shared/libfoo.so"), "elf").unwrap();
        fs::create_dir_all(root.join("include")).unwrap();
        fs::write(root.join("include/foo.h"), "#pragma once\n").unwrap();
    }

    #[test]
    fn test_lookup_by_format() {
        assert_eq!(archiver_for("nar").unwrap().format(), NAR_FORMAT);
        assert!(archiver_for("zip").is_err());
    }

    #[test]
    fn test_create_and_extract() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        populate(&src);
        let nar = tmp.path().join("foo-1.0-x86_64-Linux-gcc-shared.nar");

        let stored = TarGzArchiver.create(&src, Path::new(""), &nar).unwrap();
        assert_eq!(stored, 2);

        let out = tmp.path().join("out");
        let summary = TarGzArchiver.extract(&nar, &out).unwrap();
        assert_eq!(summary, ExtractSummary { extracted: 2, skipped: 0 });
        assert_eq!(
            fs::read_to_string(out.join("lib/x86_64-Linux-gcc/shared/libfoo.so")).unwrap(),
            "elf"
        );
    }

    #[test]
    fn test_create_subtree_keeps_relative_names() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        populate(&src);
        let nar = tmp.path().join("noarch.nar");

        let stored = TarGzArchiver.create(&src, Path::new("include"), &nar).unwrap();
        assert_eq!(stored, 1);

        let out = tmp.path().join("out");
        TarGzArchiver.extract(&nar, &out).unwrap();
        assert!(out.join("include/foo.h").is_file());
        assert!(!out.join("lib").exists());
    }

    #[test]
    fn test_create_replaces_existing_archive() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        populate(&src);
        let nar = tmp.path().join("a.nar");
        fs::write(&nar, "stale").unwrap();

        TarGzArchiver.create(&src, Path::new(""), &nar).unwrap();
        let out = tmp.path().join("out");
        assert_eq!(TarGzArchiver.extract(&nar, &out).unwrap().extracted, 2);
    }

    #[test]
    fn test_extract_twice_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        populate(&src);
        let nar = tmp.path().join("a.nar");
        TarGzArchiver.create(&src, Path::new(""), &nar).unwrap();

        let out = tmp.path().join("out");
        TarGzArchiver.extract(&nar, &out).unwrap();
        let header = out.join("include/foo.h");
        fs::write(&header, "locally modified").unwrap();

        let summary = TarGzArchiver.extract(&nar, &out).unwrap();
        assert_eq!(summary, ExtractSummary { extracted: 0, skipped: 2 });
        assert_eq!(fs::read_to_string(&header).unwrap(), "locally modified");
    }

    #[test]
    fn test_extract_keeps_file_created_before_unpack() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        populate(&src);
        let nar = tmp.path().join("a.nar");
        TarGzArchiver.create(&src, Path::new(""), &nar).unwrap();

        let out = tmp.path().join("out");
        let library = out.join("lib/x86_64-Linux-gcc/shared/libfoo.so");
        fs::create_dir_all(library.parent().unwrap()).unwrap();
        fs::write(&library, "written by another build").unwrap();

        let summary = TarGzArchiver.extract(&nar, &out).unwrap();
        assert_eq!(summary, ExtractSummary { extracted: 1, skipped: 1 });
        assert_eq!(fs::read_to_string(&library).unwrap(), "written by another build");
        assert_eq!(
            fs::read_to_string(out.join("include/foo.h")).unwrap(),
            "#pragma once\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_keeps_existing_symlink() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("lib")).unwrap();
        fs::write(src.join("lib/libfoo.so.1"), "elf").unwrap();
        std::os::unix::fs::symlink("libfoo.so.1", src.join("lib/libfoo.so")).unwrap();
        let nar = tmp.path().join("a.nar");
        TarGzArchiver.create(&src, Path::new(""), &nar).unwrap();

        let out = tmp.path().join("out");
        fs::create_dir_all(out.join("lib")).unwrap();
        std::os::unix::fs::symlink("elsewhere", out.join("lib/libfoo.so")).unwrap();

        let summary = TarGzArchiver.extract(&nar, &out).unwrap();
        assert_eq!(summary, ExtractSummary { extracted: 1, skipped: 1 });
        assert_eq!(fs::read_link(out.join("lib/libfoo.so")).unwrap(), PathBuf::from("elsewhere"));
    }

    #[test]
    fn test_create_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let err = TarGzArchiver
            .create(tmp.path(), Path::new("nope"), &tmp.path().join("x.nar"))
            .unwrap_err();
        assert!(err.to_string().contains("missing directory"));
    }

    #[test]
    fn test_safe_join() {
        let dest = Path::new("/out");
        assert_eq!(
            safe_join(dest, Path::new("./lib/a.so")).unwrap(),
            PathBuf::from("/out/lib/a.so")
        );
        assert!(safe_join(dest, Path::new("../escape")).is_err());
        assert!(safe_join(dest, Path::new("/etc/passwd")).is_err());
    }
}
