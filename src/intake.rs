//! Local file intake: picked files and folders in, track descriptors out.
//!
//! Folders are walked recursively; only audio files are kept. The resulting
//! tracks carry a [`MediaReference::LocalBlob`] and are valid for this
//! session only.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::model::{MediaReference, Track, placeholder_artwork};

/// Extensions the audio engine can decode (case-insensitive).
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "wav", "m4a", "aac"];

/// Artist shown for picked files; their tags are never read.
pub const LOCAL_ARTIST: &str = "Local file";

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("No such file or folder: {0}")]
    NotFound(PathBuf),

    #[error("Intake task failed: {0}")]
    TaskJoin(String),
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Expand `paths` into audio files, in the order given. Folder contents
/// are sorted by file name.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, IntakeError> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(IntakeError::NotFound(path.clone()));
        }
        if path.is_file() {
            if is_audio(path) {
                files.push(path.clone());
            } else {
                tracing::debug!("Skipping non-audio file {}", path.display());
            }
            continue;
        }

        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && is_audio(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

/// Describe one file as a track. `index` keeps ids unique when two
/// folders hold files with the same name.
pub fn track_for_file(index: usize, path: &Path) -> Track {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let display_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.clone());

    Track {
        id: format!("local-{}-{}", index, file_name),
        display_name,
        display_artist: LOCAL_ARTIST.to_string(),
        artwork_url: placeholder_artwork(&file_name),
        media_reference: Some(MediaReference::LocalBlob(path.to_path_buf())),
        remote_uri: None,
    }
}

/// Turn picked paths into tracks.
pub fn intake(paths: &[PathBuf]) -> Result<Vec<Track>, IntakeError> {
    let tracks: Vec<Track> = collect_files(paths)?
        .iter()
        .enumerate()
        .map(|(i, path)| track_for_file(i, path))
        .collect();
    tracing::info!("Picked {} local tracks", tracks.len());
    Ok(tracks)
}

/// [`intake`] on a blocking task.
pub async fn intake_async(paths: Vec<PathBuf>) -> Result<Vec<Track>, IntakeError> {
    tokio::task::spawn_blocking(move || intake(&paths))
        .await
        .map_err(|e| IntakeError::TaskJoin(e.to_string()))?
}
