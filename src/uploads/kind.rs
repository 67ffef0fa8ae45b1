use std::path::Path;

use image::ImageFormat;
use mime::Mime;

/// Image formats accepted for previews and profile pictures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Svg,
}

const SVG_SNIFF_LEN: usize = 1024;

impl ImageKind {
    /// Detects the format from the leading bytes, the file name is not trusted
    pub fn detect(buffer: &[u8]) -> Option<ImageKind> {
        match image::guess_format(buffer) {
            Ok(ImageFormat::Png) => Some(ImageKind::Png),
            Ok(ImageFormat::Jpeg) => Some(ImageKind::Jpeg),
            Ok(ImageFormat::Gif) => Some(ImageKind::Gif),
            // SVG is text, the raster decoders know nothing about it
            _ if looks_like_svg(buffer) => Some(ImageKind::Svg),
            _ => None,
        }
    }

    pub fn mime(&self) -> Mime {
        match self {
            ImageKind::Png => mime::IMAGE_PNG,
            ImageKind::Jpeg => mime::IMAGE_JPEG,
            ImageKind::Gif => mime::IMAGE_GIF,
            ImageKind::Svg => mime::IMAGE_SVG,
        }
    }
}

fn looks_like_svg(buffer: &[u8]) -> bool {
    let head = &buffer[..buffer.len().min(SVG_SNIFF_LEN)];
    let text = String::from_utf8_lossy(head).to_lowercase();
    let text = text.trim_start_matches('\u{feff}').trim_start();

    (text.starts_with("<svg") || text.starts_with("<?xml") || text.starts_with("<!--") || text.starts_with("<!doctype svg"))
        && text.contains("<svg")
}

/// Content type used when serving a stored file, derived from its extension
pub fn content_type_for(path: &Path) -> Mime {
    let kind = match ImageFormat::from_path(path) {
        Ok(ImageFormat::Png) => Some(ImageKind::Png),
        Ok(ImageFormat::Jpeg) => Some(ImageKind::Jpeg),
        Ok(ImageFormat::Gif) => Some(ImageKind::Gif),
        _ => path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.eq_ignore_ascii_case("svg"))
            .map(|_| ImageKind::Svg),
    };

    kind.map(|kind| kind.mime()).unwrap_or(mime::APPLICATION_OCTET_STREAM)
}
