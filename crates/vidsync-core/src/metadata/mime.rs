use std::path::Path;

/// Recognized video extensions (dot included) and their MIME types.
pub const VIDEO_MIME_TYPES: [(&str, &str); 9] = [
    (".flv", "video/x-flv"),
    (".mp4", "video/mp4"),
    (".ts", "video/MP2T"),
    (".3gp", "video/3gpp"),
    (".mov", "video/quicktime"),
    (".avi", "video/x-msvideo"),
    (".wmv", "video/x-ms-wmv"),
    (".mpg", "video/mpeg"),
    (".mpeg", "video/mpeg"),
];

/// Extension of `path` with its leading dot, e.g. `.mov`. Empty when there is none.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

pub fn mime_type_for_extension(ext: &str) -> Option<&'static str> {
    VIDEO_MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    mime_type_for_extension(&dotted_extension(path))
}

pub fn is_video_path(path: &Path) -> bool {
    mime_type_for_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(mime_type_for_path(Path::new("/w/a.mp4")), Some("video/mp4"));
        assert_eq!(mime_type_for_path(Path::new("b.mov")), Some("video/quicktime"));
        assert_eq!(mime_type_for_extension(".ts"), Some("video/MP2T"));
    }

    #[test]
    fn test_unrecognized_extension_is_absent() {
        assert_eq!(mime_type_for_path(Path::new("clip.mkv")), None);
        assert_eq!(mime_type_for_path(Path::new("README")), None);
        assert!(!is_video_path(Path::new("clip.mp4.lock")));
        assert!(!is_video_path(Path::new("clip.mp4.md5")));
    }

    #[test]
    fn test_extension_match_is_case_sensitive() {
        assert!(!is_video_path(Path::new("CLIP.MP4")));
    }
}
