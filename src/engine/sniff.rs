// src/engine/sniff.rs
//
// Magic-byte MIME detection.

/// MIME assigned before a source has been sniffed.
pub const UNKNOWN_MIME: &str = "unknown";

/// HEIC/HEIF type box: `ftypheic` at byte offset 4.
const HEIC_BOX: &[u8; 8] = b"ftypheic";
const RIFF: &[u8; 4] = b"RIFF";
const WEBP: &[u8; 4] = b"WEBP";

/// Four-byte leading signatures.
const SIGNATURES: &[([u8; 4], &str)] = &[
    ([0x89, 0x50, 0x4e, 0x47], "image/png"),
    ([0x47, 0x49, 0x46, 0x38], "image/gif"),
    ([0x42, 0x4d, 0x00, 0x00], "image/bmp"),
    // JFIF, EXIF, ICC, Adobe and SPIFF APP markers
    ([0xff, 0xd8, 0xff, 0xe0], "image/jpeg"),
    ([0xff, 0xd8, 0xff, 0xe1], "image/jpeg"),
    ([0xff, 0xd8, 0xff, 0xe2], "image/jpeg"),
    ([0xff, 0xd8, 0xff, 0xe3], "image/jpeg"),
    ([0xff, 0xd8, 0xff, 0xe8], "image/jpeg"),
    ([0x25, 0x50, 0x44, 0x46], "application/pdf"),
    ([0x75, 0xab, 0x5a, 0x6a], "application/pdf"),
    ([0x45, 0xe7, 0x1e, 0x8a], "application/pdf"),
];

/// Detect the MIME type of `buffer` from its magic bytes, returning
/// `fallback` when no signature matches.
///
/// The HEIC box header is checked first since it sits at offset 4, not 0.
/// A RIFF container is only WebP when bytes 8..12 read `WEBP`; WAV, AVI and
/// other RIFF payloads get the fallback.
pub fn detect_mime_type<'a>(buffer: &[u8], fallback: &'a str) -> &'a str {
    if buffer.get(4..12) == Some(HEIC_BOX.as_slice()) {
        return "image/heic";
    }

    let Some(head) = buffer.get(0..4) else {
        return fallback;
    };

    if head == RIFF.as_slice() {
        return match buffer.get(8..12) {
            Some(kind) if kind == WEBP.as_slice() => "image/webp",
            _ => fallback,
        };
    }

    SIGNATURES
        .iter()
        .find(|(magic, _)| magic.as_slice() == head)
        .map(|(_, mime)| *mime)
        .unwrap_or(fallback)
}

/// File extension for a MIME type, for callers naming saved outputs.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/bmp" => Some("bmp"),
        "image/webp" => Some("webp"),
        "image/jpeg" | "image/jpg" => Some("jpeg"),
        "image/heic" => Some("heic"),
        "image/svg+xml" => Some("svg"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}
