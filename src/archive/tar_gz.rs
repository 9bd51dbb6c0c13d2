use crate::runtime::Runtime;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::Path;
use tar::{Archive, EntryType};

use super::{ArchiveExtractor, contained_path};

/// Extractor for .tar.gz / .tgz archives
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        debug!("Extracting tar.gz archive to {:?}...", extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let mut archive = Archive::new(GzDecoder::new(file));

        let mut extracted = 0usize;
        for entry in archive
            .entries()
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?
        {
            let mut entry = entry.context("Failed to read tar entry")?;
            let entry_path = entry.path().context("Invalid path in tar entry")?.into_owned();

            let Some(full_path) = contained_path(extract_to, &entry_path) else {
                debug!("Skipping entry with unsafe path {:?}", entry_path);
                continue;
            };

            let entry_type = entry.header().entry_type();
            match entry_type {
                EntryType::Directory => runtime.create_dir_all(&full_path)?,
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest_file = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest_file)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest_file);

                    #[cfg(unix)]
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                    extracted += 1;
                }
                other => debug!("Skipping {:?} entry {:?}", other, entry_path),
            }
        }

        if extracted == 0 {
            anyhow::bail!("Archive {:?} contains no files", archive_path);
        }

        info!("Extraction complete.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::io::Write;
    use tar::Builder;
    use tempfile::tempdir;

    fn tar_gz_bytes(files: &[(&str, &str, u32)]) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());
        for (name, content, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append(&header, content.as_bytes()).unwrap();
        }
        let tar = builder.into_inner().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_can_handle_tar_gz() {
        let extractor = TarGzExtractor;
        assert!(extractor.can_handle(Path::new("file.tar.gz")));
        assert!(extractor.can_handle(Path::new("FILE.TGZ")));
        assert!(!extractor.can_handle(Path::new("file.zip")));
    }

    #[test]
    fn test_extract_keeps_nested_layout() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("a.tar.gz");
        fs::write(
            &archive_path,
            tar_gz_bytes(&[
                ("dbfsharp-linux-x64/dbfsharp", "bin", 0o755),
                ("dbfsharp-linux-x64/README.md", "docs", 0o644),
            ]),
        )?;
        let out = dir.path().join("out");
        fs::create_dir(&out)?;

        TarGzExtractor.extract(&RealRuntime, &archive_path, &out)?;

        assert_eq!(
            fs::read_to_string(out.join("dbfsharp-linux-x64/dbfsharp"))?,
            "bin"
        );
        assert!(out.join("dbfsharp-linux-x64/README.md").exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_preserves_executable_mode() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir()?;
        let archive_path = dir.path().join("a.tar.gz");
        fs::write(&archive_path, tar_gz_bytes(&[("dbfsharp", "bin", 0o755)]))?;
        let out = dir.path().join("out");
        fs::create_dir(&out)?;

        TarGzExtractor.extract(&RealRuntime, &archive_path, &out)?;

        let mode = fs::metadata(out.join("dbfsharp"))?.permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        Ok(())
    }

    #[test]
    fn test_extract_corrupt_archive_fails() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("a.tar.gz");
        fs::write(&archive_path, b"definitely not gzip")?;
        let out = dir.path().join("out");
        fs::create_dir(&out)?;

        assert!(TarGzExtractor.extract(&RealRuntime, &archive_path, &out).is_err());
        Ok(())
    }

    #[test]
    fn test_extract_empty_archive_fails() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("a.tar.gz");
        fs::write(&archive_path, tar_gz_bytes(&[]))?;
        let out = dir.path().join("out");
        fs::create_dir(&out)?;

        let err = TarGzExtractor
            .extract(&RealRuntime, &archive_path, &out)
            .unwrap_err();
        assert!(err.to_string().contains("contains no files"));
        Ok(())
    }
}
