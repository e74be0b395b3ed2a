// src/engine/metadata.rs
//
// Metadata reader capability (EXIF via kamadak-exif) and the opaque
// key/value map carried alongside each encoding.

use crate::error::{BitmapError, Result};
use std::collections::BTreeMap;
use std::io::Cursor;

pub const EXIF_IMAGE_WIDTH: &str = "ExifImageWidth";
pub const EXIF_IMAGE_HEIGHT: &str = "ExifImageHeight";

/// Default orientation (top-left, no transform).
pub const DEFAULT_ORIENTATION: u16 = 1;

/// Opaque EXIF key/value snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExifMap(BTreeMap<String, String>);

impl ExifMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overwrite the pixel-dimension entries.
    pub fn set_image_dimensions(&mut self, width: u32, height: u32) {
        self.insert(EXIF_IMAGE_WIDTH, width.to_string());
        self.insert(EXIF_IMAGE_HEIGHT, height.to_string());
    }

    pub fn image_width(&self) -> Option<u32> {
        self.get(EXIF_IMAGE_WIDTH)?.trim().parse().ok()
    }

    pub fn image_height(&self) -> Option<u32> {
        self.get(EXIF_IMAGE_HEIGHT)?.trim().parse().ok()
    }
}

impl FromIterator<(String, String)> for ExifMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Reads orientation and EXIF fields from encoded bytes.
///
/// Bytes without any metadata are not an error: orientation is
/// [`DEFAULT_ORIENTATION`] and the map is empty. Callers absorb the errors
/// that remain.
pub trait MetadataReader: Send + Sync {
    fn read_orientation(&self, bytes: &[u8]) -> Result<u16>;
    fn read_metadata(&self, bytes: &[u8]) -> Result<ExifMap>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ExifMetadataReader;

impl ExifMetadataReader {
    fn read(bytes: &[u8]) -> Result<Option<exif::Exif>> {
        let mut cursor = Cursor::new(bytes);
        match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => Ok(Some(exif)),
            Err(exif::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(BitmapError::metadata_read_failed(e.to_string())),
        }
    }
}

impl MetadataReader for ExifMetadataReader {
    fn read_orientation(&self, bytes: &[u8]) -> Result<u16> {
        let Some(exif) = Self::read(bytes)? else {
            return Ok(DEFAULT_ORIENTATION);
        };
        let Some(field) = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) else {
            return Ok(DEFAULT_ORIENTATION);
        };
        // Short or Long depending on the writer
        let value = field
            .value
            .get_uint(0)
            .ok_or_else(|| BitmapError::metadata_read_failed("orientation is not an integer"))?;
        match u16::try_from(value) {
            Ok(orientation) if (1..=8).contains(&orientation) => Ok(orientation),
            _ => Err(BitmapError::metadata_read_failed(format!(
                "orientation {value} outside 1..=8"
            ))),
        }
    }

    fn read_metadata(&self, bytes: &[u8]) -> Result<ExifMap> {
        let Some(exif) = Self::read(bytes)? else {
            return Ok(ExifMap::new());
        };
        Ok(exif
            .fields()
            .filter(|field| field.ifd_num == exif::In::PRIMARY)
            .map(|field| {
                let key = match field.tag {
                    exif::Tag::PixelXDimension => EXIF_IMAGE_WIDTH.to_string(),
                    exif::Tag::PixelYDimension => EXIF_IMAGE_HEIGHT.to_string(),
                    tag => tag.to_string(),
                };
                (key, field.display_value().to_string())
            })
            .collect())
    }
}

/// Degrees of clockwise rotation that undo an EXIF orientation.
pub fn normalized_rotation(orientation: u16) -> u16 {
    match orientation {
        3 | 4 => 180,
        5 | 6 => 270,
        7 | 8 => 90,
        _ => 0,
    }
}
