/// OpenDocument text extraction
///
/// Reads `content.xml` out of the package and turns every `text:p` and
/// `text:h` block into a unit. Inline elements such as `text:span` are kept as
/// markup inside the source. Like HTML this is one-way: the package cannot be
/// rebuilt from edited units.
use super::html::{has_translatable_content, strip_wrapper, HtmlUnit};
use super::xml::{XmlDocument, XmlElement, XmlNode};
use crate::config::ParseOptions;
use crate::encoding::Newline;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::TranslationUnit;
use std::io::{Cursor, Read};
use zip::read::ZipArchive;

const CONTENT: &str = "content.xml";
const BLOCKS: &[&str] = &["text:p", "text:h"];

fn zip_error(error: zip::result::ZipError) -> StoreError {
    StoreError::parse(FileFormat::Odf, 0, format!("invalid package: {}", error))
}

/// Character content of a block, with inline elements written as markup.
fn block_text(block: &XmlElement) -> String {
    let mut text = String::new();
    for node in &block.children {
        match node {
            XmlNode::Text(chunk) | XmlNode::CData(chunk) => text.push_str(chunk),
            XmlNode::Element(inline) => match inline.name.as_str() {
                "text:s" => {
                    let count = inline
                        .attribute("text:c")
                        .and_then(|c| c.parse::<usize>().ok())
                        .unwrap_or(1);
                    text.push_str(&" ".repeat(count));
                }
                "text:tab" => text.push('\t'),
                "text:line-break" => text.push('\n'),
                _ => text.push_str(&inline.to_xml()),
            },
            _ => {}
        }
    }
    text
}

#[derive(Debug, Default)]
pub struct OdfStore {
    core: StoreCore<HtmlUnit>,
    block_count: usize,
}

impl OdfStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> &[HtmlUnit] {
        &self.core.units
    }

    fn collect(&mut self, element: &XmlElement) {
        for child in element.elements() {
            if BLOCKS.contains(&child.name.as_str()) {
                self.add_block(&block_text(child));
            } else {
                self.collect(child);
            }
        }
    }

    fn add_block(&mut self, text: &str) {
        let text = strip_wrapper(text.trim());
        if !has_translatable_content(text) {
            return;
        }
        self.block_count += 1;
        let filename = self.core.metadata.filename.clone().unwrap_or_default();
        let mut unit = HtmlUnit::new(text);
        unit.add_location(&format!("{}:{}", filename, self.block_count));
        self.core.push(unit);
    }
}

impl TranslationStore for OdfStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Odf
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        self.core.push(HtmlUnit::new(source.as_str()))
    }

    /// Parses the text of `content.xml`.
    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        let document = XmlDocument::parse(raw, FileFormat::Odf)?;
        self.core.clear();
        self.block_count = 0;
        self.core.metadata.apply_options(options);
        self.collect(&document.root);
        log::debug!("odf: extracted {} blocks", self.block_count);
        Ok(self.core.check_duplicates(FileFormat::Odf))
    }

    /// Accepts a zipped package or a bare `content.xml`.
    fn parse_bytes(&mut self, raw: &[u8], options: &ParseOptions) -> Result<ParseReport, StoreError> {
        if !raw.starts_with(b"PK") {
            let (text, detected) = crate::encoding::decode(raw)?;
            let report = self.parse(&text, options)?;
            self.core.metadata.encoding = detected;
            self.core.metadata.newline = Newline::detect(raw);
            return Ok(report);
        }
        let mut archive = ZipArchive::new(Cursor::new(raw)).map_err(zip_error)?;
        let mut content = String::new();
        archive
            .by_name(CONTENT)
            .map_err(zip_error)?
            .read_to_string(&mut content)?;
        self.parse(&content, options)
    }

    fn serialize(&self) -> Result<String, StoreError> {
        Err(StoreError::unsupported(FileFormat::Odf, "serialize"))
    }
}
