use std::{
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};

/// File extensions, lowercase, that are assumed to be videos
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "webm", "mov"];

/// Checks the extension only, not the contents
pub fn is_video_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Files are passed through as is. Directories are replaced by the video files directly
/// inside of them, not recursively, sorted by path.
pub fn collect_videos<R>(paths: impl IntoIterator<Item = impl AsRef<Path>>) -> io::Result<R>
where
    R: FromIterator<PathBuf>,
{
    let mut videos = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if !path.is_dir() {
            videos.push(path.to_path_buf());
            continue;
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?.path();
            if entry.is_file() && is_video_file(&entry) {
                found.push(entry);
            }
        }
        found.sort();
        videos.extend(found);
    }
    Ok(videos.into_iter().collect())
}

/// Try to read the file, return None if it doesn't exist
pub fn read_optional_file(path: impl AsRef<Path>) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
        Ok(s) => Ok(Some(s)),
    }
}

/// Writes `contents` to a sibling with the extension ".partial" and then renames it over
/// `path`, so readers never see a half-written file. The path must refer to something
/// that has a filename.
pub fn replace_file(path: impl AsRef<Path>, contents: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let mut partial_name = path
        .file_name()
        .ok_or(io::ErrorKind::InvalidInput)?
        .to_owned();
    partial_name.push(".partial");
    let partial = path.with_file_name(partial_name);

    fs::write(&partial, contents)?;
    fs::rename(&partial, path).inspect_err(|_| {
        fs::remove_file(&partial).ok();
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn video_extensions() {
        assert!(is_video_file("a/b.mp4"));
        assert!(is_video_file("b.MKV"));
        assert!(is_video_file("c.avi"));
        assert!(!is_video_file("c.jpg"));
        assert!(!is_video_file("mp4"));
    }

    #[test]
    fn collect_mixed() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("b.mkv"), b"")?;
        fs::write(dir.path().join("a.mp4"), b"")?;
        fs::write(dir.path().join("notes.txt"), b"")?;
        fs::create_dir(dir.path().join("nested.mp4"))?;

        let explicit = PathBuf::from("/some/where/explicit.txt");
        let videos: Vec<PathBuf> =
            collect_videos([dir.path().to_path_buf(), explicit.clone()])?;
        assert_eq!(
            vec![dir.path().join("a.mp4"), dir.path().join("b.mkv"), explicit],
            videos
        );
        Ok(())
    }

    #[test]
    fn optional_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rc");
        assert_eq!(None, read_optional_file(&path)?);
        fs::write(&path, "--rows 2")?;
        assert_eq!(Some("--rows 2".to_string()), read_optional_file(&path)?);
        Ok(())
    }

    #[test]
    fn replace_overwrites() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sheet.jpg");
        replace_file(&path, b"first")?;
        replace_file(&path, b"second")?;
        assert_eq!(b"second".to_vec(), fs::read(&path)?);
        assert!(!dir.path().join("sheet.jpg.partial").exists());
        Ok(())
    }
}
