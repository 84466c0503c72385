//! Archive entry classification
//!
//! Maps an archive-internal entry path to a destination category and the
//! filename it is stored under. Classification looks only at the entry's
//! immediate containing directory and its filename; it performs no I/O.
//!
//! Two taxonomies are supported, selected by configuration:
//!
//! | Taxonomy      | Archive directories                     | Package folders                                    |
//! |---------------|-----------------------------------------|----------------------------------------------------|
//! | `epub`        | `content`, `images`, `styles`           | `Chapters`, `Supplementary`, `Artwork`, `Styles`    |
//! | `chapter-xml` | `Adobe Chapters`, `Artwork`, `TFB XML`  | `Adobe Chapters`, `Supplementary`, `Artwork`, `TFB XML` |
//!
//! Entries at the archive root go to the package folder itself.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

/// Filename fragment that marks a chapter file
const CHAPTER_FILENAME_PART: &str = "chapter";

pub const CHAPTERS_FOLDER_NAME: &str = "Chapters";
pub const SUPPLEMENTARY_FOLDER_NAME: &str = "Supplementary";
pub const ARTWORK_FOLDER_NAME: &str = "Artwork";
pub const STYLES_FOLDER_NAME: &str = "Styles";
pub const ADOBE_CHAPTERS_FOLDER_NAME: &str = "Adobe Chapters";
pub const TFB_XML_FOLDER_NAME: &str = "TFB XML";

/// Destination category of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Entry at the archive root (e.g. `package.opf`)
    Root,
    Chapter,
    /// Non-chapter document such as a table of contents or cover page
    Supplementary,
    Artwork,
    Style,
    /// Master content XML describing the whole book
    Descriptor,
    /// Matches no rule; logged and dropped
    Unrecognized,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Root => "root",
            Category::Chapter => "chapter",
            Category::Supplementary => "supplementary",
            Category::Artwork => "artwork",
            Category::Style => "style",
            Category::Descriptor => "descriptor",
            Category::Unrecognized => "unrecognized",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a classified entry is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Directly into the package folder
    PackageRoot,
    /// Into the named sub-folder of the package folder
    Folder(&'static str),
    /// Not ingested
    Skip,
}

/// Result of classifying one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEntry {
    pub entry_path: String,
    /// Filename the entry is stored under
    pub filename: String,
    pub category: Category,
    pub destination: Destination,
}

impl ClassifiedEntry {
    pub fn is_ingested(&self) -> bool {
        self.destination != Destination::Skip
    }
}

/// A content taxonomy: the rule set routing archive entries to package folders
pub trait ContentTaxonomy: Debug + Send + Sync {
    /// Configuration name of the taxonomy
    fn name(&self) -> &'static str;

    /// Classify one archive entry path. Must be deterministic.
    fn classify(&self, entry_path: &str) -> ClassifiedEntry;

    /// Whether packages need descriptor and chapter count validation before completion
    fn requires_validation(&self) -> bool {
        false
    }
}

/// Split an entry path into (immediate containing directory, filename)
pub fn split_entry_path(entry_path: &str) -> (Option<&str>, &str) {
    let mut segments = entry_path.rsplit('/').filter(|s| !s.is_empty());
    let filename = segments.next().unwrap_or_default();
    (segments.next(), filename)
}

fn is_chapter_file(filename: &str) -> bool {
    filename.to_lowercase().contains(CHAPTER_FILENAME_PART)
}

fn has_extension(filename: &str, extension: &str) -> bool {
    filename.to_lowercase().ends_with(extension)
}

fn entry(entry_path: &str, filename: String, category: Category, destination: Destination) -> ClassifiedEntry {
    ClassifiedEntry {
        entry_path: entry_path.to_string(),
        filename,
        category,
        destination,
    }
}

/// Chapter filenames must look like `{isbn}-chapter{n}.{ext}`, so
/// `9780080569437_Chapter_1.pdf` becomes `9780080569437-chapter1.pdf`.
pub fn rename_chapter_file(filename: &str) -> String {
    filename.replace('_', "-").replace("Chapter-", "chapter")
}

/// EPUB-style layout: `content/`, `images/` and `styles/`, filenames preserved
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubTaxonomy;

impl EpubTaxonomy {
    const CONTENT_DIR: &'static str = "content";
    const ARTWORK_DIR: &'static str = "images";
    const STYLES_DIR: &'static str = "styles";
}

impl ContentTaxonomy for EpubTaxonomy {
    fn name(&self) -> &'static str {
        "epub"
    }

    fn classify(&self, entry_path: &str) -> ClassifiedEntry {
        let (dir_name, filename) = split_entry_path(entry_path);
        let name = filename.to_string();

        let Some(dir_name) = dir_name else {
            return entry(entry_path, name, Category::Root, Destination::PackageRoot);
        };

        if dir_name.eq_ignore_ascii_case(Self::CONTENT_DIR) {
            if is_chapter_file(filename) {
                entry(entry_path, name, Category::Chapter, Destination::Folder(CHAPTERS_FOLDER_NAME))
            } else if has_extension(filename, ".xhtml") {
                entry(
                    entry_path,
                    name,
                    Category::Supplementary,
                    Destination::Folder(SUPPLEMENTARY_FOLDER_NAME),
                )
            } else {
                entry(entry_path, name, Category::Unrecognized, Destination::Skip)
            }
        } else if dir_name.eq_ignore_ascii_case(Self::ARTWORK_DIR) {
            entry(entry_path, name, Category::Artwork, Destination::Folder(ARTWORK_FOLDER_NAME))
        } else if dir_name.eq_ignore_ascii_case(Self::STYLES_DIR) {
            entry(entry_path, name, Category::Style, Destination::Folder(STYLES_FOLDER_NAME))
        } else {
            entry(entry_path, name, Category::Unrecognized, Destination::Skip)
        }
    }
}

/// Chapter PDF + XML layout: `Adobe Chapters/`, `Artwork/` and `TFB XML/`.
///
/// Chapter files are renamed with [`rename_chapter_file`]; the master content
/// XML lands in `TFB XML` and completion requires validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChapterXmlTaxonomy;

impl ContentTaxonomy for ChapterXmlTaxonomy {
    fn name(&self) -> &'static str {
        "chapter-xml"
    }

    fn classify(&self, entry_path: &str) -> ClassifiedEntry {
        let (dir_name, filename) = split_entry_path(entry_path);

        let Some(dir_name) = dir_name else {
            return entry(entry_path, filename.to_string(), Category::Root, Destination::PackageRoot);
        };

        if dir_name.eq_ignore_ascii_case(ADOBE_CHAPTERS_FOLDER_NAME) {
            if is_chapter_file(filename) {
                entry(
                    entry_path,
                    rename_chapter_file(filename),
                    Category::Chapter,
                    Destination::Folder(ADOBE_CHAPTERS_FOLDER_NAME),
                )
            } else {
                entry(
                    entry_path,
                    filename.to_string(),
                    Category::Supplementary,
                    Destination::Folder(SUPPLEMENTARY_FOLDER_NAME),
                )
            }
        } else if dir_name.eq_ignore_ascii_case(ARTWORK_FOLDER_NAME) {
            entry(
                entry_path,
                filename.to_string(),
                Category::Artwork,
                Destination::Folder(ARTWORK_FOLDER_NAME),
            )
        } else if dir_name.eq_ignore_ascii_case(TFB_XML_FOLDER_NAME) && has_extension(filename, "xml") {
            entry(
                entry_path,
                filename.to_string(),
                Category::Descriptor,
                Destination::Folder(TFB_XML_FOLDER_NAME),
            )
        } else {
            entry(entry_path, filename.to_string(), Category::Unrecognized, Destination::Skip)
        }
    }

    fn requires_validation(&self) -> bool {
        true
    }
}

/// Configured taxonomy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Taxonomy {
    Epub,
    ChapterXml,
}

impl Taxonomy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Taxonomy::Epub => "epub",
            Taxonomy::ChapterXml => "chapter-xml",
        }
    }

    /// Build the rule set for this taxonomy
    pub fn build(&self) -> Arc<dyn ContentTaxonomy> {
        match self {
            Taxonomy::Epub => Arc::new(EpubTaxonomy),
            Taxonomy::ChapterXml => Arc::new(ChapterXmlTaxonomy),
        }
    }
}

impl FromStr for Taxonomy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "epub" => Ok(Taxonomy::Epub),
            "chapter-xml" | "chapter_xml" => Ok(Taxonomy::ChapterXml),
            _ => Err(format!(
                "Unknown taxonomy {:?}, expected 'epub' or 'chapter-xml'",
                s
            )),
        }
    }
}

impl std::fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_entry_path() {
        assert_eq!(split_entry_path("package.opf"), (None, "package.opf"));
        assert_eq!(split_entry_path("content/c1.xhtml"), (Some("content"), "c1.xhtml"));
        assert_eq!(
            split_entry_path("9780080569437/Adobe Chapters/c1.pdf"),
            (Some("Adobe Chapters"), "c1.pdf")
        );
    }

    #[test]
    fn test_epub_rules() {
        let taxonomy = EpubTaxonomy;

        let chapter = taxonomy.classify("content/9780486282146-chapter-1.xhtml");
        assert_eq!(chapter.category, Category::Chapter);
        assert_eq!(chapter.destination, Destination::Folder("Chapters"));
        assert_eq!(chapter.filename, "9780486282146-chapter-1.xhtml");

        let upper = taxonomy.classify("CONTENT/9780486282146-CHAPTER-2.xhtml");
        assert_eq!(upper.category, Category::Chapter);

        let toc = taxonomy.classify("content/toc.xhtml");
        assert_eq!(toc.category, Category::Supplementary);
        assert_eq!(toc.destination, Destination::Folder("Supplementary"));

        let stray = taxonomy.classify("content/notes.txt");
        assert_eq!(stray.category, Category::Unrecognized);
        assert!(!stray.is_ingested());

        assert_eq!(taxonomy.classify("images/cover.jpg").category, Category::Artwork);
        assert_eq!(taxonomy.classify("styles/book.css").category, Category::Style);
        assert_eq!(taxonomy.classify("fonts/serif.otf").category, Category::Unrecognized);

        let root = taxonomy.classify("package.opf");
        assert_eq!(root.category, Category::Root);
        assert_eq!(root.destination, Destination::PackageRoot);
    }

    #[test]
    fn test_epub_uses_immediate_directory() {
        let nested = EpubTaxonomy.classify("OEBPS/images/fig1.png");
        assert_eq!(nested.category, Category::Artwork);
    }

    #[test]
    fn test_rename_chapter_file() {
        assert_eq!(rename_chapter_file("9780080569437_Chapter_1.pdf"), "9780080569437-chapter1.pdf");
        assert_eq!(rename_chapter_file("9780080569437-chapter12.xml"), "9780080569437-chapter12.xml");
    }

    #[test]
    fn test_chapter_xml_rules() {
        let taxonomy = ChapterXmlTaxonomy;
        assert!(taxonomy.requires_validation());

        let chapter = taxonomy.classify("9780080569437/Adobe Chapters/9780080569437_Chapter_1.pdf");
        assert_eq!(chapter.category, Category::Chapter);
        assert_eq!(chapter.filename, "9780080569437-chapter1.pdf");
        assert_eq!(chapter.destination, Destination::Folder("Adobe Chapters"));

        let toc = taxonomy.classify("9780080569437/adobe chapters/9780080569437_TOC.pdf");
        assert_eq!(toc.category, Category::Supplementary);
        assert_eq!(toc.filename, "9780080569437_TOC.pdf");

        let artwork = taxonomy.classify("9780080569437/Artwork/fig_1.tif");
        assert_eq!(artwork.category, Category::Artwork);
        assert_eq!(artwork.filename, "fig_1.tif");

        let descriptor = taxonomy.classify("9780080569437/TFB XML/9780080569437.xml");
        assert_eq!(descriptor.category, Category::Descriptor);
        assert_eq!(descriptor.destination, Destination::Folder("TFB XML"));

        let readme = taxonomy.classify("9780080569437/TFB XML/readme.txt");
        assert_eq!(readme.category, Category::Unrecognized);
    }

    #[test]
    fn test_taxonomy_from_str() {
        assert_eq!("epub".parse::<Taxonomy>().unwrap(), Taxonomy::Epub);
        assert_eq!("Chapter-XML".parse::<Taxonomy>().unwrap(), Taxonomy::ChapterXml);
        assert!("pdf".parse::<Taxonomy>().is_err());
        assert_eq!(Taxonomy::ChapterXml.build().name(), "chapter-xml");
    }

    proptest! {
        #[test]
        fn prop_classification_is_deterministic(
            dir in prop::sample::select(vec!["", "content/", "images/", "styles/", "Adobe Chapters/", "TFB XML/", "misc/"]),
            stem in "[A-Za-z0-9_-]{1,20}",
            ext in prop::sample::select(vec!["xhtml", "pdf", "xml", "css", "jpg"]),
        ) {
            let path = format!("{}{}.{}", dir, stem, ext);
            for taxonomy in [Taxonomy::Epub.build(), Taxonomy::ChapterXml.build()] {
                let first = taxonomy.classify(&path);
                let second = taxonomy.classify(&path);
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(first.is_ingested(), first.category != Category::Unrecognized);
            }
        }
    }
}
