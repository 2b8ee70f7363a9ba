// metadata.rs — 从嵌入的 XMP (GPano) 中读取裁剪/全景尺寸

use crate::geometry::{extract_attribute, find_bytes};
use thiserror::Error;

const XMP_START: &[u8] = b"<x:xmpmeta";
const XMP_END: &[u8] = b"</x:xmpmeta>";
const GPANO_PREFIX: &str = "GPano:";

const FULL_WIDTH: &str = "FullPanoWidthPixels";
const FULL_HEIGHT: &str = "FullPanoHeightPixels";
const CROPPED_WIDTH: &str = "CroppedAreaImageWidthPixels";
const CROPPED_HEIGHT: &str = "CroppedAreaImageHeightPixels";
const CROPPED_X: &str = "CroppedAreaLeftPixels";
const CROPPED_Y: &str = "CroppedAreaTopPixels";

/// Why no usable metadata came out of an image resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// No XMP block, or a block without any GPano field.
    #[error("no GPano metadata")]
    Absent,
    #[error("missing GPano:{0}")]
    MissingAttribute(&'static str),
    #[error("GPano:{attribute} is not an integer: {value:?}")]
    InvalidInteger { attribute: &'static str, value: String },
    /// The crop region does not fit inside the full panorama.
    #[error("crop region exceeds full panorama")]
    InvalidGeometry,
}

/// Full panorama size and where the captured image sits inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanoramaMetadata {
    pub full_width: u32,
    pub full_height: u32,
    pub cropped_width: u32,
    pub cropped_height: u32,
    pub cropped_x: u32,
    pub cropped_y: u32,
}

impl PanoramaMetadata {
    pub fn new(
        full_width: u32,
        full_height: u32,
        cropped_width: u32,
        cropped_height: u32,
        cropped_x: u32,
        cropped_y: u32,
    ) -> Result<Self, MetadataError> {
        let fits_x = cropped_x as u64 + cropped_width as u64 <= full_width as u64;
        let fits_y = cropped_y as u64 + cropped_height as u64 <= full_height as u64;
        if full_width == 0 || full_height == 0 || !fits_x || !fits_y {
            return Err(MetadataError::InvalidGeometry);
        }
        Ok(Self {
            full_width,
            full_height,
            cropped_width,
            cropped_height,
            cropped_x,
            cropped_y,
        })
    }

    /// The image is the whole panorama: crop == full, offset (0, 0).
    pub fn from_image_dimensions(width: u32, height: u32) -> Self {
        Self {
            full_width: width,
            full_height: height,
            cropped_width: width,
            cropped_height: height,
            cropped_x: 0,
            cropped_y: 0,
        }
    }

    pub fn is_cropped(&self) -> bool {
        self.cropped_width != self.full_width || self.cropped_height != self.full_height
    }
}

/// Parses GPano crop data from the raw bytes of an image resource.
///
/// Only the first `<x:xmpmeta>` block is considered. Every one of the six
/// fields must be present and integral.
pub fn parse_metadata(bytes: &[u8]) -> Result<PanoramaMetadata, MetadataError> {
    let start = find_bytes(bytes, XMP_START, 0).ok_or(MetadataError::Absent)?;
    let end = find_bytes(bytes, XMP_END, start).ok_or(MetadataError::Absent)?;
    let block = String::from_utf8_lossy(&bytes[start..end]);

    if !block.contains(GPANO_PREFIX) {
        return Err(MetadataError::Absent);
    }

    let field = |name: &'static str| -> Result<u32, MetadataError> {
        let key = format!("{}{}", GPANO_PREFIX, name);
        let raw = extract_attribute(&block, &key).ok_or(MetadataError::MissingAttribute(name))?;
        raw.trim()
            .parse::<u32>()
            .map_err(|_| MetadataError::InvalidInteger {
                attribute: name,
                value: raw.to_string(),
            })
    };

    PanoramaMetadata::new(
        field(FULL_WIDTH)?,
        field(FULL_HEIGHT)?,
        field(CROPPED_WIDTH)?,
        field(CROPPED_HEIGHT)?,
        field(CROPPED_X)?,
        field(CROPPED_Y)?,
    )
}

/// Metadata for an image of `width × height`, preferring embedded GPano
/// data when `use_metadata` is set and falling back to the raw dimensions.
pub fn resolve_metadata(bytes: &[u8], use_metadata: bool, width: u32, height: u32) -> PanoramaMetadata {
    if !use_metadata {
        return PanoramaMetadata::from_image_dimensions(width, height);
    }

    match parse_metadata(bytes) {
        Ok(meta) => {
            log::info!(
                "GPano metadata: full {}x{}, crop {}x{} at ({}, {})",
                meta.full_width,
                meta.full_height,
                meta.cropped_width,
                meta.cropped_height,
                meta.cropped_x,
                meta.cropped_y
            );
            meta
        }
        Err(MetadataError::Absent) => {
            log::debug!("no panorama metadata, using image size {}x{}", width, height);
            PanoramaMetadata::from_image_dimensions(width, height)
        }
        Err(e) => {
            log::warn!("ignoring malformed panorama metadata ({}), using image size", e);
            PanoramaMetadata::from_image_dimensions(width, height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xmp(attrs: &str) -> Vec<u8> {
        format!(
            "\u{ff}\u{d8}junk<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"><rdf:Description {}/></x:xmpmeta>trailer",
            attrs
        )
        .into_bytes()
    }

    const FULL: &str = r#"GPano:FullPanoWidthPixels="4000" GPano:FullPanoHeightPixels="2000" GPano:CroppedAreaImageWidthPixels="2000" GPano:CroppedAreaImageHeightPixels="2000" GPano:CroppedAreaLeftPixels="1000" GPano:CroppedAreaTopPixels="0""#;

    #[test]
    fn parses_all_six_fields() {
        let meta = parse_metadata(&xmp(FULL)).unwrap();
        assert_eq!(meta, PanoramaMetadata::new(4000, 2000, 2000, 2000, 1000, 0).unwrap());
        assert!(meta.is_cropped());
    }

    #[test]
    fn missing_block_is_absent() {
        assert_eq!(parse_metadata(b"plain jpeg bytes"), Err(MetadataError::Absent));
        assert_eq!(parse_metadata(b"<x:xmpmeta never closed"), Err(MetadataError::Absent));
    }

    #[test]
    fn block_without_gpano_is_absent() {
        let bytes = b"<x:xmpmeta><dc:title>hi</dc:title></x:xmpmeta>";
        assert_eq!(parse_metadata(bytes), Err(MetadataError::Absent));
    }

    #[test]
    fn marker_search_is_case_sensitive() {
        let bytes = xmp(FULL);
        let upper = String::from_utf8_lossy(&bytes).replace("x:xmpmeta", "X:XMPMETA");
        assert_eq!(parse_metadata(upper.as_bytes()), Err(MetadataError::Absent));
    }

    #[test]
    fn missing_field_fails() {
        let attrs = FULL.replace(r#"GPano:CroppedAreaTopPixels="0""#, "");
        assert_eq!(
            parse_metadata(&xmp(&attrs)),
            Err(MetadataError::MissingAttribute(CROPPED_Y))
        );
    }

    #[test]
    fn malformed_integer_fails_loudly() {
        let attrs = FULL.replace(r#"LeftPixels="1000""#, r#"LeftPixels="-12""#);
        assert!(matches!(
            parse_metadata(&xmp(&attrs)),
            Err(MetadataError::InvalidInteger { attribute: CROPPED_X, .. })
        ));
    }

    #[test]
    fn crop_outside_full_is_rejected() {
        assert_eq!(
            PanoramaMetadata::new(4000, 2000, 3500, 2000, 1000, 0),
            Err(MetadataError::InvalidGeometry)
        );
        assert_eq!(PanoramaMetadata::new(0, 0, 0, 0, 0, 0), Err(MetadataError::InvalidGeometry));
    }

    #[test]
    fn errors_describe_the_field() {
        let err = MetadataError::InvalidInteger {
            attribute: FULL_WIDTH,
            value: "wide".into(),
        };
        assert_eq!(err.to_string(), r#"GPano:FullPanoWidthPixels is not an integer: "wide""#);
        assert_eq!(MetadataError::MissingAttribute(CROPPED_X).to_string(), "missing GPano:CroppedAreaLeftPixels");
    }

    #[test]
    fn only_first_block_counts() {
        let mut bytes = b"<x:xmpmeta>nothing here</x:xmpmeta>".to_vec();
        bytes.extend(xmp(FULL));
        assert_eq!(parse_metadata(&bytes), Err(MetadataError::Absent));
    }

    #[test]
    fn resolve_falls_back_to_image_size() {
        let fallback = PanoramaMetadata::from_image_dimensions(3000, 1500);
        assert_eq!(resolve_metadata(b"no xmp", true, 3000, 1500), fallback);
        assert_eq!(fallback.cropped_x, 0);
        assert_eq!(fallback.cropped_width, 3000);

        let bad = xmp(&FULL.replace(r#"="4000""#, r#"="wide""#));
        assert_eq!(resolve_metadata(&bad, true, 3000, 1500), fallback);
    }

    #[test]
    fn resolve_skips_parsing_when_disabled() {
        let meta = resolve_metadata(&xmp(FULL), false, 640, 320);
        assert_eq!(meta, PanoramaMetadata::from_image_dimensions(640, 320));
    }
}
