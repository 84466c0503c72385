//! Master content XML splitting
//!
//! The chapter-xml taxonomy ships one master descriptor, `{isbn}.xml`,
//! holding the whole book. Every `<chapter>` element in it is copied into its
//! own `{isbn}-chapter{n}.xml` document (n is 1-based, in document order) so
//! that each chapter PDF has a matching chapter XML.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use tracing::debug;

use crate::error::{IngestError, IngestResult};

const CHAPTER_ELEMENT: &[u8] = b"chapter";
const XML_DECLARATION: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// One chapter cut out of the master descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDocument {
    /// 1-based chapter number
    pub number: usize,
    pub filename: String,
    pub data: Vec<u8>,
}

/// Splits a master descriptor into per-chapter XML documents
#[derive(Debug, Clone, Default)]
pub struct DescriptorSplitter;

impl DescriptorSplitter {
    pub fn new() -> Self {
        Self
    }

    /// Split `data` (the contents of `filename`) into one document per `<chapter>`
    pub fn split(&self, isbn: &str, filename: &str, data: &[u8]) -> IngestResult<Vec<ChapterDocument>> {
        let fail = |reason: String| IngestError::DescriptorSplit {
            filename: filename.to_string(),
            reason,
        };

        let mut reader = Reader::from_reader(data);
        let mut chapters = Vec::new();
        let mut current: Option<Writer<Vec<u8>>> = None;
        let mut depth = 0usize;

        loop {
            let event = reader.read_event().map_err(|e| {
                fail(format!("{} at byte {}", e, reader.error_position()))
            })?;

            match current.as_mut() {
                None => match event {
                    Event::Eof => break,
                    Event::Start(start) if start.local_name().as_ref() == CHAPTER_ELEMENT => {
                        let mut writer = Writer::new(XML_DECLARATION.to_vec());
                        writer
                            .write_event(Event::Start(start))
                            .map_err(|e| fail(e.to_string()))?;
                        depth = 1;
                        current = Some(writer);
                    },
                    Event::Empty(empty) if empty.local_name().as_ref() == CHAPTER_ELEMENT => {
                        let mut writer = Writer::new(XML_DECLARATION.to_vec());
                        writer
                            .write_event(Event::Empty(empty))
                            .map_err(|e| fail(e.to_string()))?;
                        chapters.push(chapter_document(isbn, chapters.len() + 1, writer.into_inner()));
                    },
                    _ => {},
                },
                Some(writer) => {
                    match &event {
                        Event::Eof => {
                            return Err(fail("document ended inside a chapter element".to_string()))
                        },
                        Event::Start(_) => depth += 1,
                        Event::End(_) => depth -= 1,
                        _ => {},
                    }
                    writer.write_event(event).map_err(|e| fail(e.to_string()))?;

                    if depth == 0 {
                        if let Some(writer) = current.take() {
                            chapters.push(chapter_document(isbn, chapters.len() + 1, writer.into_inner()));
                        }
                    }
                },
            }
        }

        debug!(descriptor = filename, chapters = chapters.len(), "Split content XML");
        Ok(chapters)
    }
}

fn chapter_document(isbn: &str, number: usize, data: Vec<u8>) -> ChapterDocument {
    ChapterDocument {
        number,
        filename: format!("{}-chapter{}.xml", isbn, number),
        data,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"<?xml version="1.0"?>
<book isbn="9780080569437">
  <title>Fluid Mechanics</title>
  <chapter id="c1"><title>Introduction</title><section><p>Flow</p></section></chapter>
  <chapter id="c2"><title>Viscosity</title></chapter>
  <chapter id="c3"/>
</book>"#;

    #[test]
    fn test_split_extracts_each_chapter_in_order() {
        let chapters = DescriptorSplitter::new()
            .split("9780080569437", "9780080569437.xml", DESCRIPTOR.as_bytes())
            .unwrap();

        assert_eq!(chapters.len(), 3);
        let names: Vec<&str> = chapters.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "9780080569437-chapter1.xml",
                "9780080569437-chapter2.xml",
                "9780080569437-chapter3.xml"
            ]
        );

        let first = String::from_utf8(chapters[0].data.clone()).unwrap();
        assert!(first.starts_with("<?xml"));
        assert!(first.contains(r#"<chapter id="c1">"#));
        assert!(first.contains("<section><p>Flow</p></section>"));
        assert!(first.trim_end().ends_with("</chapter>"));
        assert!(!first.contains("Viscosity"));

        let empty = String::from_utf8(chapters[2].data.clone()).unwrap();
        assert!(empty.contains(r#"<chapter id="c3"/>"#));
    }

    #[test]
    fn test_split_without_chapters() {
        let chapters = DescriptorSplitter::new()
            .split("9780080569437", "9780080569437.xml", b"<book><title>Empty</title></book>")
            .unwrap();
        assert!(chapters.is_empty());
    }

    #[test]
    fn test_split_rejects_malformed_descriptor() {
        let err = DescriptorSplitter::new()
            .split(
                "9780080569437",
                "9780080569437.xml",
                b"<book><chapter><title>Broken</chapter></book>",
            )
            .unwrap_err();

        assert!(matches!(err, IngestError::DescriptorSplit { .. }));
        assert_eq!(err.code(), "content_checker_split_xml_file");
    }
}
