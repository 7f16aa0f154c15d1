//! Writing and unpacking downloaded result archives.
//!
//! A finished job is delivered as one zip file holding per-layer rasters,
//! CSV/JSON tables, previews and an `output.info` metadata document. The
//! archive is written next to a like-named directory it is extracted into.

use std::path::{Path, PathBuf};

use pairs_query_models::output_info::OUTPUT_INFO_FILE_NAME;
use pairs_query_models::{QueryOutputInfoFile, TransferObject as _};

use crate::QueryError;

/// Resolves the folder downloads are written to.
///
/// An existing absolute path is used as is; otherwise a folder of that name
/// under the current directory is used if it exists, and created if it does
/// not.
///
/// # Errors
///
/// Returns [`QueryError::Io`] if the current directory cannot be read or
/// the folder cannot be created.
pub async fn resolve_output_folder(folder: &Path) -> Result<PathBuf, QueryError> {
    if folder.is_absolute() && is_dir(folder).await {
        return Ok(folder.to_path_buf());
    }

    let cwd = std::env::current_dir().map_err(|e| QueryError::Io {
        path: ".".to_string(),
        source: e,
    })?;
    let relative = cwd.join(folder);
    if is_dir(&relative).await {
        return Ok(relative);
    }

    log::info!("Creating download folder {}", relative.display());
    tokio::fs::create_dir_all(&relative)
        .await
        .map_err(|e| QueryError::Io {
            path: relative.display().to_string(),
            source: e,
        })?;
    Ok(relative)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_dir())
}

/// Writes downloaded bytes to `path`.
///
/// # Errors
///
/// Returns [`QueryError::Io`] if the file cannot be written.
pub async fn write_archive(bytes: &[u8], path: &Path) -> Result<(), QueryError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| QueryError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

    #[allow(clippy::cast_precision_loss)]
    let mb = bytes.len() as f64 / 1_048_576.0;
    log::info!("  wrote {} ({mb:.1} MB)", path.display());
    Ok(())
}

/// Extracts a zip archive into `dest_dir` on the blocking thread pool.
///
/// # Errors
///
/// Returns the errors of [`extract_zip_sync`], or [`QueryError::Join`] if
/// the blocking task fails.
pub async fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize, QueryError> {
    let archive_path = archive_path.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_zip_sync(&archive_path, &dest_dir)).await?
}

/// Extracts a zip archive into `dest_dir`, creating it if needed.
///
/// Entries whose paths would escape `dest_dir` are rejected by the zip
/// reader.
///
/// # Errors
///
/// Returns [`QueryError::Io`] if the archive cannot be opened, or
/// [`QueryError::Archive`] if it is not a valid zip.
pub fn extract_zip_sync(archive_path: &Path, dest_dir: &Path) -> Result<usize, QueryError> {
    log::info!(
        "Unpacking {} -> {}",
        archive_path.display(),
        dest_dir.display()
    );

    let file = std::fs::File::open(archive_path).map_err(|e| QueryError::Io {
        path: archive_path.display().to_string(),
        source: e,
    })?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| QueryError::Archive {
        path: archive_path.display().to_string(),
        message: e.to_string(),
    })?;

    std::fs::create_dir_all(dest_dir).map_err(|e| QueryError::Io {
        path: dest_dir.display().to_string(),
        source: e,
    })?;

    archive.extract(dest_dir).map_err(|e| QueryError::Archive {
        path: archive_path.display().to_string(),
        message: e.to_string(),
    })?;

    let count = archive.len();
    log::info!("  extracted {count} entries");
    Ok(count)
}

/// Reads the `output.info` document on the blocking thread pool.
///
/// # Errors
///
/// Returns the errors of [`read_output_info_sync`], or [`QueryError::Join`]
/// if the blocking task fails.
pub async fn read_output_info(dir: &Path) -> Result<Option<QueryOutputInfoFile>, QueryError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || read_output_info_sync(&dir)).await?
}

/// Reads the `output.info` document from an extracted archive.
///
/// Looks in `dir` first, then one level down (some archives nest their
/// files under a folder named after the job). Returns `Ok(None)` if there
/// is no such file.
///
/// # Errors
///
/// Returns [`QueryError::Io`] if the file exists but cannot be read, or
/// [`QueryError::Model`] if it is not valid JSON.
pub fn read_output_info_sync(dir: &Path) -> Result<Option<QueryOutputInfoFile>, QueryError> {
    let Some(path) = find_output_info(dir) else {
        return Ok(None);
    };

    let text = std::fs::read_to_string(&path).map_err(|e| QueryError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(QueryOutputInfoFile::from_json(&text)?))
}

fn find_output_info(dir: &Path) -> Option<PathBuf> {
    let direct = dir.join(OUTPUT_INFO_FILE_NAME);
    if direct.is_file() {
        return Some(direct);
    }

    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path().join(OUTPUT_INFO_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_zip, scratch_dir};
    use std::fs;

    #[tokio::test]
    async fn extracts_archive_and_reads_output_info() {
        let tmp = scratch_dir("archive_extract");
        let archive = tmp.join("job.zip");
        fs::write(
            &archive,
            build_zip(&[
                ("output.info", r#"{"summary": "one layer", "files": [{"name": "a.tiff"}]}"#),
                ("a.tiff", "not really a tiff"),
            ]),
        )
        .unwrap();

        let dest = tmp.join("job");
        assert_eq!(extract_zip(&archive, &dest).await.unwrap(), 2);
        assert_eq!(
            fs::read_to_string(dest.join("a.tiff")).unwrap(),
            "not really a tiff"
        );

        let info = read_output_info(&dest).await.unwrap().unwrap();
        assert_eq!(info.summary.as_deref(), Some("one layer"));
        assert_eq!(info.files.len(), 1);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn finds_nested_output_info() {
        let tmp = scratch_dir("archive_nested_info");
        fs::create_dir_all(tmp.join("inner")).unwrap();
        fs::write(tmp.join("inner").join("output.info"), r#"{"name": "n"}"#).unwrap();

        let info = read_output_info_sync(&tmp).unwrap().unwrap();
        assert_eq!(info.name.as_deref(), Some("n"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_output_info_is_none() {
        let tmp = scratch_dir("archive_no_info");
        assert!(read_output_info_sync(&tmp).unwrap().is_none());
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_zip_file() {
        let tmp = scratch_dir("archive_not_zip");
        let archive = tmp.join("broken.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract_zip_sync(&archive, &tmp.join("broken")).unwrap_err();
        assert!(matches!(err, QueryError::Archive { .. }), "{err}");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn resolves_existing_absolute_folder() {
        let tmp = scratch_dir("archive_resolve");
        assert_eq!(resolve_output_folder(&tmp).await.unwrap(), tmp);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn creates_missing_absolute_folder() {
        let tmp = scratch_dir("archive_create");
        let target = tmp.join("nested").join("downloads");
        let resolved = resolve_output_folder(&target).await.unwrap();
        assert!(resolved.is_dir());
        assert_eq!(resolved, target);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn resolves_relative_folder_under_current_dir() {
        let name = format!("pairs_query_relative_{}", std::process::id());
        let expected = std::env::current_dir().unwrap().join(&name);
        let _ = fs::remove_dir_all(&expected);

        let resolved = resolve_output_folder(Path::new(&name)).await.unwrap();
        assert_eq!(resolved, expected);
        assert!(resolved.is_dir());

        assert_eq!(resolve_output_folder(Path::new(&name)).await.unwrap(), expected);

        let _ = fs::remove_dir_all(&expected);
    }

    #[tokio::test]
    async fn folder_under_a_regular_file_is_an_io_error() {
        let tmp = scratch_dir("archive_under_file");
        let file = tmp.join("plain.txt");
        fs::write(&file, "not a folder").unwrap();

        let err = resolve_output_folder(&file.join("downloads"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Io { .. }), "{err}");

        let _ = fs::remove_dir_all(&tmp);
    }
}
