//! Descriptor type predicates.
//!
//! Each predicate answers one question about a descriptor string and is
//! independent of the others. Predicates that look at file content open the
//! file read-only and return `false` on any I/O error; deciding that nothing
//! matched is left to the resolver.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

use image::ImageReader;
use regex::Regex;
use url::Url;

/// Enough leading bytes for every magic number `image` knows about.
const SNIFF_BYTES: usize = 64;

const VIDEO_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/mpeg",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-flv",
];

const STREAM_SCHEMES: &[&str] = &["rtsp://", "rtmp://"];

fn screen_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^screen:(\d+)$").expect("static screen token regex"))
}

fn glob_wrapper_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^glob\(([^)]+)\)$").expect("static glob wrapper regex"))
}

/// `http://` or `https://` URL with a host.
pub fn is_url(src: &str) -> bool {
    match Url::parse(src) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Existing regular file (symlinks followed).
pub fn is_file(src: &str) -> bool {
    Path::new(src).is_file()
}

/// Existing file or directory.
pub fn is_path(src: &str) -> bool {
    Path::new(src).exists()
}

/// Image decided by content, not by extension.
///
/// A matching signature is not enough: the header behind it must parse too.
/// Short signatures such as `P5` or `BM` otherwise match ordinary text.
pub fn is_image(src: &str) -> bool {
    let Ok(mut file) = File::open(src) else {
        return false;
    };
    let mut head = Vec::with_capacity(SNIFF_BYTES);
    if file
        .by_ref()
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut head)
        .is_err()
    {
        return false;
    }
    let Ok(format) = image::guess_format(&head) else {
        return false;
    };
    let Ok(file) = File::open(src) else {
        return false;
    };
    ImageReader::with_format(BufReader::new(file), format)
        .into_dimensions()
        .is_ok()
}

/// Video decided by the MIME type guessed from the extension.
pub fn is_video(src: &str) -> bool {
    mime_guess::from_path(src)
        .iter()
        .any(|mime| VIDEO_MIME_TYPES.contains(&mime.essence_str()))
}

pub fn is_point_cloud(src: &str) -> bool {
    has_extension(src, "pcd")
}

pub fn is_csv(src: &str) -> bool {
    has_extension(src, "csv")
}

/// `rtsp://` or `rtmp://` URI.
pub fn is_network_stream(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    STREAM_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

/// `screen:<index>` token.
pub fn is_screenshot_token(src: &str) -> bool {
    screen_index(src).is_some()
}

/// `glob(<pattern>)` wrapper.
pub fn is_glob_expression(src: &str) -> bool {
    glob_pattern(src).is_some()
}

/// Monitor index carried by a `screen:<index>` token.
pub fn screen_index(src: &str) -> Option<u32> {
    screen_token_regex()
        .captures(src)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Pattern carried by a `glob(<pattern>)` wrapper.
pub fn glob_pattern(src: &str) -> Option<&str> {
    glob_wrapper_regex()
        .captures(src)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn has_extension(src: &str, ext: &str) -> bool {
    Path::new(src)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::RgbImage::new(2, 2)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn url_requires_http_scheme() {
        assert!(is_url("https://example.com/a.png"));
        assert!(is_url("http://example.com/video.mp4"));
        assert!(!is_url("rtsp://camera/stream"));
        assert!(!is_url("/tmp/a.png"));
        assert!(!is_url("screen:0"));
    }

    #[test]
    fn image_is_sniffed_from_content() {
        let dir = tempfile::tempdir().unwrap();
        let disguised = dir.path().join("not_an_image.txt");
        std::fs::File::create(&disguised)
            .unwrap()
            .write_all(&png_bytes())
            .unwrap();
        let fake = dir.path().join("fake.png");
        std::fs::write(&fake, b"plain text").unwrap();

        assert!(is_image(disguised.to_str().unwrap()));
        assert!(!is_image(fake.to_str().unwrap()));
        assert!(!is_image(dir.path().join("missing.png").to_str().unwrap()));
    }

    #[test]
    fn short_signature_needs_a_parsable_header() {
        let dir = tempfile::tempdir().unwrap();
        let pnm_like = dir.path().join("labels.csv");
        std::fs::write(&pnm_like, b"P5,label\nP3_frames/a.png,cat\n").unwrap();
        let bmp_like = dir.path().join("notes.txt");
        std::fs::write(&bmp_like, b"BM is not a bitmap header\n").unwrap();
        let bare_signature = dir.path().join("stub.png");
        std::fs::write(&bare_signature, b"\x89PNG\r\n\x1a\n").unwrap();

        assert!(!is_image(pnm_like.to_str().unwrap()));
        assert!(!is_image(bmp_like.to_str().unwrap()));
        assert!(!is_image(bare_signature.to_str().unwrap()));
    }

    #[test]
    fn video_uses_mime_from_extension() {
        assert!(is_video("clip.mp4"));
        assert!(is_video("clip.MOV"));
        assert!(is_video("clip.avi"));
        assert!(is_video("clip.mpeg"));
        assert!(!is_video("clip.png"));
        assert!(!is_video("clip"));
    }

    #[test]
    fn extension_predicates() {
        assert!(is_point_cloud("scan.pcd"));
        assert!(!is_point_cloud("scan.ply"));
        assert!(is_csv("list.csv"));
        assert!(is_csv("LIST.CSV"));
        assert!(!is_csv("list.tsv"));
    }

    #[test]
    fn stream_prefixes() {
        assert!(is_network_stream("rtsp://192.168.1.100:554/stream"));
        assert!(is_network_stream("RTMP://live.example/app"));
        assert!(!is_network_stream("rtsp://"));
        assert!(!is_network_stream("http://example.com/stream"));
    }

    #[test]
    fn screen_tokens() {
        assert!(is_screenshot_token("screen:0"));
        assert_eq!(screen_index("screen:12"), Some(12));
        assert!(!is_screenshot_token("screen:"));
        assert!(!is_screenshot_token("screen:-1"));
        assert!(!is_screenshot_token("screen:a"));
    }

    #[test]
    fn glob_wrapper() {
        assert_eq!(glob_pattern("glob(images/*.png)"), Some("images/*.png"));
        assert!(is_glob_expression("glob(**/*.jpg)"));
        assert!(!is_glob_expression("images/*.png"));
        assert!(!is_glob_expression("glob()"));
        assert!(!is_glob_expression("glob(a/*.png"));
    }
}
