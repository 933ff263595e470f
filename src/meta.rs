use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::config::Rotation;

/// What the renderers need to know about one photo.
#[derive(Debug, Clone)]
pub struct PhotoMeta {
    pub path: PathBuf,
    /// Width and height as shown, after EXIF orientation and frame rotation.
    pub display_w: u32,
    pub display_h: u32,
    pub description: Option<String>,
    pub taken: Option<NaiveDateTime>,
}

/// Read the header for dimensions and EXIF for orientation, description and date.
pub fn read_photo_meta(path: &Path, rotation: Rotation) -> Result<PhotoMeta> {
    let (raw_w, raw_h) = image::image_dimensions(path)
        .with_context(|| format!("failed to read dimensions of {}", path.display()))?;
    let exif = read_exif(path);
    let orientation = exif.as_ref().and_then(orientation).unwrap_or(1);
    let description = exif
        .as_ref()
        .and_then(|e| ascii_field(e, exif::Tag::ImageDescription))
        .filter(|d| !d.is_empty());
    let taken = exif
        .as_ref()
        .and_then(|e| ascii_field(e, exif::Tag::DateTimeOriginal))
        .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y:%m:%d %H:%M:%S").ok());

    // Quarter turns from EXIF and from the frame cancel out when both apply.
    let swap = matches!(orientation, 5..=8) != rotation.is_quarter_turn();
    let (display_w, display_h) = if swap { (raw_h, raw_w) } else { (raw_w, raw_h) };
    Ok(PhotoMeta {
        path: path.to_path_buf(),
        display_w,
        display_h,
        description,
        taken,
    })
}

impl PhotoMeta {
    /// Caption line: description (or a title derived from the file name)
    /// followed by the capture date when known.
    pub fn caption(&self) -> String {
        let title = self
            .description
            .clone()
            .unwrap_or_else(|| title_from_path(&self.path));
        match self.taken {
            Some(taken) => format!("{title}  {}", taken.format("%Y/%m/%d")),
            None => title,
        }
    }
}

fn read_exif(path: &Path) -> Option<exif::Exif> {
    let f = fs::File::open(path).ok()?;
    let mut buf = BufReader::new(f);
    exif::Reader::new().read_from_container(&mut buf).ok()
}

fn orientation(exif: &exif::Exif) -> Option<u16> {
    use exif::{In, Tag, Value};
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    match &field.value {
        Value::Short(arr) if !arr.is_empty() => Some(arr[0]),
        Value::Long(arr) if !arr.is_empty() => u16::try_from(arr[0]).ok(),
        _ => None,
    }
}

fn ascii_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(parts) => parts
            .first()
            .map(|raw| String::from_utf8_lossy(raw).trim().to_string()),
        _ => None,
    }
}

/// File stem with the `_NN_DD-MM-YYYY` upload suffix removed and
/// underscores turned into spaces.
pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let trimmed = strip_upload_suffix(&stem);
    let title = trimmed.replace('_', " ").trim().to_string();
    if title.is_empty() { stem } else { title }
}

fn strip_upload_suffix(stem: &str) -> &str {
    const PATTERN: &[u8] = b"_##_##-##-####";
    let bytes = stem.as_bytes();
    if bytes.len() < PATTERN.len() {
        return stem;
    }
    let start = bytes.len() - PATTERN.len();
    let matches = bytes[start..]
        .iter()
        .zip(PATTERN)
        .all(|(b, p)| match p {
            b'#' => b.is_ascii_digit(),
            other => b == other,
        });
    if matches { &stem[..start] } else { stem }
}
