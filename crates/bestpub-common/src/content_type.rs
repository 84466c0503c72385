//! Content type lookup for files stored in the repository
//!
//! The repository keeps a MIME type on every content item. Cross-validation of
//! chapter folders counts files by type, so the mapping has to be stable for
//! the extensions found in book packages.

use mime::Mime;
use std::path::Path;

const XHTML: &str = "application/xhtml+xml";
const OPF: &str = "application/oebps-package+xml";

/// Guess the content type of a file from its extension (case-insensitive).
///
/// Unknown extensions map to `application/octet-stream`.
pub fn content_type_for(filename: &str) -> Mime {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => mime::APPLICATION_PDF,
        Some("xml") => mime::TEXT_XML,
        Some("xhtml") => parse_or_binary(XHTML),
        Some("html") | Some("htm") => mime::TEXT_HTML,
        Some("opf") => parse_or_binary(OPF),
        Some("css") => mime::TEXT_CSS,
        Some("js") => mime::APPLICATION_JAVASCRIPT,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("gif") => mime::IMAGE_GIF,
        Some("svg") => mime::IMAGE_SVG,
        Some("txt") => mime::TEXT_PLAIN,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// True for `application/pdf`
pub fn is_pdf(content_type: &Mime) -> bool {
    content_type.essence_str() == mime::APPLICATION_PDF.essence_str()
}

/// True for `text/xml` and `application/xml`
pub fn is_xml(content_type: &Mime) -> bool {
    matches!(content_type.essence_str(), "text/xml" | "application/xml")
}

fn parse_or_binary(raw: &str) -> Mime {
    raw.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type_for("9780080569437-chapter1.pdf"), mime::APPLICATION_PDF);
        assert_eq!(content_type_for("9780080569437.XML"), mime::TEXT_XML);
        assert_eq!(content_type_for("book.css"), mime::TEXT_CSS);
        assert_eq!(content_type_for("cover.JPG"), mime::IMAGE_JPEG);
        assert_eq!(content_type_for("toc.xhtml").essence_str(), XHTML);
        assert_eq!(content_type_for("package.opf").essence_str(), OPF);
    }

    #[test]
    fn test_unknown_extension_is_binary() {
        assert_eq!(content_type_for("README"), mime::APPLICATION_OCTET_STREAM);
        assert_eq!(content_type_for("font.otf"), mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_pdf_and_xml_predicates() {
        assert!(is_pdf(&mime::APPLICATION_PDF));
        assert!(!is_pdf(&mime::TEXT_XML));
        assert!(is_xml(&mime::TEXT_XML));
        assert!(is_xml(&"application/xml".parse().unwrap()));
        assert!(!is_xml(&content_type_for("toc.xhtml")));
    }
}
