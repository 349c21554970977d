// ABOUTME: Image archive helpers: OCI to Docker v1 layout migration and tarball sanity checks.
// ABOUTME: Migration shells out to skopeo and tar; readability checks use tar and flate2.

use super::process::{CommandLine, CommandRunner, run_checked};
use super::tools::ToolPaths;
use super::traits::AdapterError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tar::Archive;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Archive path skopeo writes for `image_id` inside `dir`.
///
/// The digest algorithm prefix is dropped since skopeo reads a colon in a
/// `docker-archive:` path as the start of an image reference.
pub fn docker_archive_path(dir: &Path, image_id: &str) -> PathBuf {
    let id = image_id.trim();
    let id = id.split_once(':').map(|(_, hex)| hex).unwrap_or(id);
    dir.join(format!("{}.tar", id))
}

/// Convert an extracted OCI layout in `dir` into Docker v1 layers, in place.
///
/// skopeo packs the layout as a docker-archive, which is untarred back into `dir`
/// and then deleted.
pub async fn migrate_oci_to_docker_v1(
    runner: &dyn CommandRunner,
    tools: &ToolPaths,
    dir: &Path,
    image_id: &str,
) -> Result<(), AdapterError> {
    let archive = docker_archive_path(dir, image_id);

    skopeo_copy(runner, tools, dir, &archive).await?;
    untar(runner, tools, &archive, dir).await?;
    tokio::fs::remove_file(&archive).await?;
    Ok(())
}

/// Repack an OCI image archive `dir/tar_name` as a Docker v1 archive of the same name.
///
/// The archive is unpacked into `dir` and removed before skopeo writes the
/// converted archive back to the original path.
pub async fn migrate_oci_tar_to_docker_v1(
    runner: &dyn CommandRunner,
    tools: &ToolPaths,
    dir: &Path,
    tar_name: &str,
) -> Result<(), AdapterError> {
    tracing::info!("migrating image {} to docker v1 layout", tar_name);
    let archive = dir.join(tar_name);

    untar(runner, tools, &archive, dir).await?;
    tokio::fs::remove_file(&archive).await?;
    skopeo_copy(runner, tools, dir, &archive).await
}

async fn skopeo_copy(
    runner: &dyn CommandRunner,
    tools: &ToolPaths,
    layout: &Path,
    archive: &Path,
) -> Result<(), AdapterError> {
    let cmd = CommandLine::new(&tools.skopeo)
        .arg("copy")
        .arg(format!("oci://{}", layout.display()))
        .arg(format!("docker-archive:{}", archive.display()));
    run_checked(runner, "skopeo copy", &cmd).await?;
    Ok(())
}

async fn untar(
    runner: &dyn CommandRunner,
    tools: &ToolPaths,
    archive: &Path,
    dir: &Path,
) -> Result<(), AdapterError> {
    let cmd = CommandLine::new(&tools.tar)
        .arg("xf")
        .arg(archive)
        .arg("--warning=none")
        .arg(format!("-C{}", dir.display()));
    run_checked(runner, "tar extract", &cmd).await?;
    Ok(())
}

/// Whether `path` is a tar archive, plain or gzip-compressed, holding at least one
/// readable entry.
pub fn tarball_is_readable(path: &Path) -> bool {
    match first_entry_readable(path) {
        Ok(readable) => readable,
        Err(e) => {
            tracing::debug!("{} is not a readable tarball: {}", path.display(), e);
            false
        }
    }
}

fn first_entry_readable(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let compressed = file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;
    file.seek(SeekFrom::Start(0))?;

    let first = if compressed {
        Archive::new(GzDecoder::new(file)).entries()?.next().map(|e| e.map(drop))
    } else {
        Archive::new(file).entries()?.next().map(|e| e.map(drop))
    };

    match first {
        Some(entry) => entry.map(|()| true),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn write_tar<W: std::io::Write>(out: W) -> W {
        let mut builder = tar::Builder::new(out);
        let content = b"hello";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "etc/hello", &content[..]).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn plain_tar_is_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fs.tar");
        write_tar(File::create(&path).unwrap());
        assert!(tarball_is_readable(&path));
    }

    #[test]
    fn gzip_tar_is_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fs.tar.gz");
        let encoder = write_tar(GzEncoder::new(
            File::create(&path).unwrap(),
            Compression::default(),
        ));
        encoder.finish().unwrap();
        assert!(tarball_is_readable(&path));
    }

    #[test]
    fn empty_or_missing_file_is_not_readable() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.tar");
        File::create(&empty).unwrap();
        assert!(!tarball_is_readable(&empty));
        assert!(!tarball_is_readable(&dir.path().join("missing.tar")));
    }

    #[test]
    fn archive_path_drops_digest_prefix() {
        let path = docker_archive_path(Path::new("/tmp/img"), "sha256:abc123\n");
        assert_eq!(path, PathBuf::from("/tmp/img/abc123.tar"));
    }
}
