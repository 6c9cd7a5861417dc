/// HTML text extraction (one-way)
///
/// Block-level elements and a handful of text-bearing attributes become
/// source-only units located as `filename:N`. Inline markup inside a block is
/// kept; a tag wrapping the whole block is stripped. Rebuilding the document
/// from translated units is not supported.
use crate::config::ParseOptions;
use crate::encoding::{self, Encoding, Newline};
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{TranslationUnit, UnitErrors};
use once_cell::sync::Lazy;
use regex::Regex;

/// Elements whose content forms one unit.
pub const BLOCK_TAGS: &[&str] = &[
    "p", "title", "h1", "h2", "h3", "h4", "h5", "h6", "th", "td", "div", "li", "dt", "dd",
    "address", "caption", "pre", "blockquote",
];

/// Attributes whose value is extracted as a unit of its own.
pub const TEXT_ATTRIBUTES: &[&str] = &["alt", "summary", "standby", "abbr", "content"];

/// Elements whose content is never text.
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)(?P<comment><!--.*?-->)|(?P<decl><[!?][^>]*>)|</\s*(?P<end>[A-Za-z][\w:.-]*)\s*>|<(?P<start>[A-Za-z][\w:.-]*)(?P<attrs>(?:\s+[^\s=/>]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+))?)*)\s*(?P<empty>/?)>"#,
    )
    .expect("valid HTML token regex")
});

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s=/>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+)))?"#)
        .expect("valid HTML attribute regex")
});

static WRAPPER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^<([A-Za-z][\w:.-]*)[^>]*>(.*)</([A-Za-z][\w:.-]*)\s*>$")
        .expect("valid wrapper tag regex")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]*charset\s*=\s*["']?([\w.:-]+)"#).expect("valid charset regex")
});

/// Strip a tag that encloses the whole text, repeatedly.
///
/// `<a href="x">Home</a>` becomes `Home`; `See <a href="x">Home</a>.` is
/// left alone.
pub fn strip_wrapper(text: &str) -> &str {
    let mut text = text.trim();
    while let Some(caps) = WRAPPER_RE.captures(text) {
        let (open, inner, close) = (&caps[1], caps.get(2), &caps[3]);
        let Some(inner) = inner else { break };
        if !open.eq_ignore_ascii_case(close)
            || inner.as_str().to_lowercase().contains(&format!("</{}", open.to_lowercase()))
        {
            break;
        }
        text = inner.as_str().trim();
    }
    text
}

/// Whether a snippet holds anything a translator needs to see.
pub fn has_translatable_content(text: &str) -> bool {
    let text = text.trim();
    if text.to_lowercase().contains("charset") && text.contains('=') {
        return false;
    }
    if text == "&nbsp;" {
        return false;
    }
    !TAG_RE.replace_all(text, "").trim().is_empty()
}

/// Charset named in a `<meta>` tag, if any.
pub fn declared_charset(raw: &str) -> Option<String> {
    CHARSET_RE
        .captures(raw)
        .map(|caps| caps[1].to_lowercase())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlUnit {
    source: String,
    target: Option<String>,
    locations: Vec<String>,
    errors: UnitErrors,
}

impl HtmlUnit {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.replace("\r\n", " ").replace(['\n', '\r'], " "),
            ..Default::default()
        }
    }
}

impl TranslationUnit for HtmlUnit {
    fn source(&self) -> Multistring {
        Multistring::from(self.source.as_str())
    }

    fn set_source(&mut self, source: Multistring) {
        self.source = source.as_str().to_string();
    }

    fn target(&self) -> Option<Multistring> {
        self.target.as_deref().map(Multistring::from)
    }

    fn set_target(&mut self, target: Option<Multistring>) {
        self.target = target.map(|t| t.as_str().to_string());
    }

    fn locations(&self) -> Vec<String> {
        self.locations.clone()
    }

    fn add_location(&mut self, location: &str) {
        self.locations.push(location.to_string());
    }

    fn add_error(&mut self, name: &str, message: &str) {
        self.errors.insert(name.to_string(), message.to_string());
    }

    fn errors(&self) -> UnitErrors {
        self.errors.clone()
    }
}

#[derive(Debug, Default)]
pub struct HtmlStore {
    core: StoreCore<HtmlUnit>,
    include_untagged: bool,
    block_count: usize,
}

/// Text gathered for the block being read.
struct Block {
    tag: Option<String>,
    text: String,
}

impl HtmlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also extract text that sits outside any block element.
    pub fn with_untagged_data(mut self) -> Self {
        self.include_untagged = true;
        self
    }

    pub fn units(&self) -> &[HtmlUnit] {
        &self.core.units
    }

    fn add_block(&mut self, text: &str) {
        let text = strip_wrapper(text);
        if !has_translatable_content(text) {
            return;
        }
        self.block_count += 1;
        let filename = self.core.metadata.filename.clone().unwrap_or_default();
        let mut unit = HtmlUnit::new(text);
        unit.add_location(&format!("{}:{}", filename, self.block_count));
        self.core.push(unit);
    }

    fn finish_block(&mut self, block: &mut Option<Block>) {
        if let Some(done) = block.take() {
            self.add_block(&done.text);
        }
    }
}

impl TranslationStore for HtmlStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        FileFormat::Html
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        self.core.push(HtmlUnit::new(source.as_str()))
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);
        self.block_count = 0;

        let mut block: Option<Block> = None;
        let mut position = 0;
        let mut skip_until: Option<String> = None;

        for caps in TOKEN_RE.captures_iter(raw) {
            let Some(whole) = caps.get(0) else { continue };
            let data = &raw[position..whole.start()];
            position = whole.end();

            if let Some(raw_tag) = &skip_until {
                if caps.name("end").map_or(false, |end| end.as_str().eq_ignore_ascii_case(raw_tag)) {
                    skip_until = None;
                }
                continue;
            }

            // Character data before this token
            if !data.is_empty() {
                match &mut block {
                    Some(current) => current.text.push_str(data),
                    None if self.include_untagged && !data.trim().is_empty() => {
                        block = Some(Block {
                            tag: None,
                            text: data.to_string(),
                        });
                    }
                    None => {}
                }
            }

            if caps.name("comment").is_some() || caps.name("decl").is_some() {
                continue;
            }

            if let Some(end) = caps.name("end") {
                let tag = end.as_str().to_lowercase();
                match &mut block {
                    Some(current) if current.tag.as_deref() == Some(tag.as_str()) => {
                        self.finish_block(&mut block)
                    }
                    Some(current) => current.text.push_str(&format!("</{}>", tag)),
                    None => {}
                }
                continue;
            }

            let Some(start) = caps.name("start") else { continue };
            let tag = start.as_str().to_lowercase();
            let attrs = caps.name("attrs").map_or("", |m| m.as_str());
            for attr in ATTR_RE.captures_iter(attrs) {
                let name = attr[1].to_lowercase();
                if TEXT_ATTRIBUTES.contains(&name.as_str()) {
                    let value = attr
                        .get(2)
                        .or_else(|| attr.get(3))
                        .or_else(|| attr.get(4))
                        .map_or("", |m| m.as_str());
                    self.add_block(value);
                }
            }

            let self_closing = caps.name("empty").map_or(false, |m| !m.as_str().is_empty());
            if !self_closing && BLOCK_TAGS.contains(&tag.as_str()) {
                self.finish_block(&mut block);
                block = Some(Block {
                    tag: Some(tag),
                    text: String::new(),
                });
            } else {
                if let Some(current) = &mut block {
                    current.text.push_str(whole.as_str());
                }
                if !self_closing && RAW_TEXT_TAGS.contains(&tag.as_str()) {
                    skip_until = Some(tag);
                }
            }
        }

        if skip_until.is_none() {
            let data = &raw[position..];
            if let Some(current) = &mut block {
                current.text.push_str(data);
            } else if self.include_untagged {
                self.add_block(data);
            }
        }
        self.finish_block(&mut block);
        Ok(ParseReport::default())
    }

    /// Honours a `<meta charset>` declaration over byte sniffing.
    fn parse_bytes(&mut self, raw: &[u8], options: &ParseOptions) -> Result<ParseReport, StoreError> {
        let detected = Encoding::detect(raw);
        let encoding = match declared_charset(&String::from_utf8_lossy(raw)).as_deref() {
            _ if detected.has_bom() => detected,
            Some("iso-8859-1" | "latin1" | "latin-1" | "windows-1252") => Encoding::Latin1,
            _ => detected,
        };
        let text = encoding::decode_as(raw, encoding)?;
        let report = self.parse(&text, options)?;
        self.core.metadata.encoding = encoding;
        self.core.metadata.newline = Newline::detect(raw);
        Ok(report)
    }

    fn serialize(&self) -> Result<String, StoreError> {
        Err(StoreError::unsupported(FileFormat::Html, "serialize"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Welcome</title>
<meta http-equiv="Content-Type" content="text/html; charset=utf-8">
<script>var p = "<p>not text</p>";</script></head>
<body>
<h1><a href="index.html">Home Page</a></h1>
<p>This is a link to the <a href="index.html">Home Page</a>.</p>
<img src="logo.png" alt="Company logo"/>
<div>&nbsp;</div>
<ul><li>First
item</li></ul>
</body></html>"#;

    fn parse(raw: &str) -> HtmlStore {
        let mut store = HtmlStore::new();
        store
            .parse(raw, &ParseOptions::default().with_filename("index.html"))
            .unwrap();
        store
    }

    #[test]
    fn extracts_blocks_and_attributes() {
        let store = parse(PAGE);
        let sources: Vec<String> = store.units().iter().map(|u| u.source().to_string()).collect();
        assert_eq!(
            sources,
            vec![
                "Welcome",
                "Home Page",
                "This is a link to the <a href=\"index.html\">Home Page</a>.",
                "Company logo",
                "First item",
            ]
        );
    }

    #[test]
    fn locations_are_sequential() {
        let store = parse(PAGE);
        assert_eq!(store.units()[0].locations(), vec!["index.html:1"]);
        assert_eq!(store.units()[4].locations(), vec!["index.html:5"]);
    }

    #[test]
    fn wrapper_only_stripped_when_it_encloses_everything() {
        assert_eq!(strip_wrapper("<b>bold</b>"), "bold");
        assert_eq!(strip_wrapper("<b>a</b> and <b>c</b>"), "<b>a</b> and <b>c</b>");
        assert_eq!(strip_wrapper("<i><b>both</b></i>"), "both");
    }

    #[test]
    fn untagged_text_is_optional() {
        let raw = "Loose text<p>Tagged</p>";
        assert_eq!(parse(raw).units().len(), 1);
        let mut store = HtmlStore::new().with_untagged_data();
        store.parse(raw, &ParseOptions::default()).unwrap();
        assert_eq!(store.units().len(), 2);
    }

    #[test]
    fn serialization_is_unsupported() {
        let err = parse(PAGE).serialize().unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedCapability {
                format: FileFormat::Html,
                ..
            }
        ));
    }

    #[test]
    fn meta_charset_selects_latin1() {
        let mut raw = b"<meta charset=\"iso-8859-1\"><p>Caf".to_vec();
        raw.extend_from_slice(&[0xE9, b'<', b'/', b'p', b'>']);
        let mut store = HtmlStore::new();
        store.parse_bytes(&raw, &ParseOptions::default()).unwrap();
        assert_eq!(store.units()[0].source(), "Café");
    }
}
