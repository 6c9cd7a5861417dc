/// Subtitle codecs: SubRip (`.srt`), MicroDVD (`.sub`) and SubStation Alpha (`.ssa`/`.ass`)
///
/// Dialogue text is not unique, so units are identified by their timecode
/// range. The text is a single value per cue (see [`Value`]).
use super::monolingual::Value;
use crate::config::ParseOptions;
use crate::error::StoreError;
use crate::formats::FileFormat;
use crate::multistring::Multistring;
use crate::store::{ParseReport, StoreCore, TranslationStore};
use crate::unit::{TranslationUnit, UnitErrors};
use chrono::{NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

static MICRODVD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{(\d+)\}\{(\d+)\}(.*)$").expect("valid MicroDVD cue regex"));

const SSA_DEFAULT_FORMAT: &str =
    "Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    SubRip,
    MicroDvd,
    SubStation,
}

impl Dialect {
    fn format(self) -> FileFormat {
        match self {
            Self::SubRip => FileFormat::Srt,
            Self::MicroDvd => FileFormat::Sub,
            Self::SubStation => FileFormat::Ssa,
        }
    }

    fn parse_time(self, text: &str) -> Option<NaiveTime> {
        let text = text.trim();
        match self {
            Self::SubRip => NaiveTime::parse_from_str(&text.replace('.', ","), "%H:%M:%S,%3f").ok(),
            Self::SubStation => NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok(),
            Self::MicroDvd => None,
        }
    }

    fn format_time(self, time: &NaiveTime) -> String {
        match self {
            Self::SubStation => format!(
                "{}:{:02}:{:02}.{:02}",
                time.hour(),
                time.minute(),
                time.second(),
                time.nanosecond() / 10_000_000
            ),
            _ => time.format("%H:%M:%S,%3f").to_string(),
        }
    }

    /// Line breaks inside a cue as the dialect writes them.
    fn line_break(self) -> &'static str {
        match self {
            Self::SubRip => "\n",
            Self::MicroDvd => "|",
            Self::SubStation => "\\N",
        }
    }
}

/// When a cue is shown: wall-clock times, or frame numbers for MicroDVD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpan {
    Clock { start: NaiveTime, end: NaiveTime },
    Frames { start: u64, end: u64 },
}

impl TimeSpan {
    fn zero(dialect: Dialect) -> Self {
        match dialect {
            Dialect::MicroDvd => Self::Frames { start: 0, end: 0 },
            _ => Self::Clock {
                start: NaiveTime::MIN,
                end: NaiveTime::MIN,
            },
        }
    }

    /// Render as the identity string, e.g. `00:00:01,000 --> 00:00:02,500`.
    pub fn render(&self, dialect: Dialect) -> String {
        match self {
            Self::Clock { start, end } => format!(
                "{} --> {}",
                dialect.format_time(start),
                dialect.format_time(end)
            ),
            Self::Frames { start, end } => format!("{{{}}}{{{}}}", start, end),
        }
    }

    /// Inverse of [`TimeSpan::render`].
    pub fn parse(text: &str, dialect: Dialect) -> Option<Self> {
        if dialect == Dialect::MicroDvd {
            let caps = MICRODVD_RE.captures(text.trim())?;
            return Some(Self::Frames {
                start: caps[1].parse().ok()?,
                end: caps[2].parse().ok()?,
            });
        }
        let (start, end) = text.split_once("-->")?;
        Some(Self::Clock {
            start: dialect.parse_time(start)?,
            end: dialect.parse_time(end)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleUnit {
    dialect: Dialect,
    pub span: TimeSpan,
    value: Value,
    /// SubStation columns other than the text, in file order.
    fields: Vec<String>,
    /// Unparsed lines (SubStation comments) written before this cue.
    prefix: Vec<String>,
    errors: UnitErrors,
}

impl SubtitleUnit {
    pub fn new(dialect: Dialect, span: TimeSpan, text: &str, template: bool) -> Self {
        Self {
            dialect,
            span,
            value: Value::new(text, template),
            fields: Vec::new(),
            prefix: Vec::new(),
            errors: UnitErrors::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.value.text
    }
}

impl TranslationUnit for SubtitleUnit {
    monolingual_unit_methods!();

    fn id(&self) -> String {
        self.span.render(self.dialect)
    }

    fn set_id(&mut self, id: &str) {
        if let Some(span) = TimeSpan::parse(id, self.dialect) {
            self.span = span;
        }
    }

    fn locations(&self) -> Vec<String> {
        vec![self.id()]
    }
}

#[derive(Debug, Default)]
pub struct SubtitleStore {
    core: StoreCore<SubtitleUnit>,
    dialect: Dialect,
    template: bool,
    /// SubStation script sections up to and including the event `Format:` line.
    header: Vec<String>,
    columns: Vec<String>,
    trailer: Vec<String>,
}

impl SubtitleStore {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn units(&self) -> &[SubtitleUnit] {
        &self.core.units
    }

    fn error(&self, line: usize, message: impl Into<String>) -> StoreError {
        StoreError::parse(self.dialect.format(), line, message)
    }

    fn parse_subrip(&mut self, raw: &str) -> Result<(), StoreError> {
        let mut lines = raw.lines().enumerate().peekable();
        while let Some((number, line)) = lines.next() {
            if line.trim().is_empty() {
                continue;
            }
            // Cue counter, then the timing line
            let (timing_number, timing) = if line.contains("-->") {
                (number, line)
            } else {
                lines
                    .next()
                    .ok_or_else(|| self.error(number + 1, "cue without timing line"))?
            };
            let span = TimeSpan::parse(timing, Dialect::SubRip)
                .ok_or_else(|| self.error(timing_number + 1, format!("invalid timing {:?}", timing)))?;

            let mut text = Vec::new();
            while let Some((_, line)) = lines.peek() {
                if line.trim().is_empty() {
                    break;
                }
                text.push(*line);
                lines.next();
            }
            self.core.push(SubtitleUnit::new(
                Dialect::SubRip,
                span,
                &text.join("\n"),
                self.template,
            ));
        }
        Ok(())
    }

    fn parse_microdvd(&mut self, raw: &str) -> Result<(), StoreError> {
        for (number, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let caps = MICRODVD_RE
                .captures(line)
                .ok_or_else(|| self.error(number + 1, format!("invalid cue {:?}", line)))?;
            let span = TimeSpan::Frames {
                start: caps[1].parse().map_err(|_| self.error(number + 1, "frame out of range"))?,
                end: caps[2].parse().map_err(|_| self.error(number + 1, "frame out of range"))?,
            };
            self.core.push(SubtitleUnit::new(
                Dialect::MicroDvd,
                span,
                &caps[3].replace('|', "\n"),
                self.template,
            ));
        }
        Ok(())
    }

    fn parse_substation(&mut self, raw: &str) -> Result<(), StoreError> {
        let mut in_events = false;
        let mut prefix = Vec::new();
        for (number, line) in raw.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with('[') {
                in_events = trimmed.eq_ignore_ascii_case("[events]");
            }

            if in_events && self.columns.is_empty() {
                if let Some(format) = trimmed.strip_prefix("Format:") {
                    self.columns = format.split(',').map(|c| c.trim().to_string()).collect();
                }
            }

            let Some(dialogue) = line.strip_prefix("Dialogue:").filter(|_| in_events) else {
                if self.core.units.is_empty() {
                    self.header.push(line.to_string());
                } else {
                    prefix.push(line.to_string());
                }
                continue;
            };

            if self.columns.is_empty() {
                self.columns = SSA_DEFAULT_FORMAT.split(", ").map(str::to_string).collect();
            }
            let fields: Vec<String> = dialogue
                .trim_start()
                .splitn(self.columns.len(), ',')
                .map(str::to_string)
                .collect();
            if fields.len() != self.columns.len() {
                return Err(self.error(number + 1, "dialogue line has too few fields"));
            }

            let column = |name: &str| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name));
            let (Some(start), Some(end), Some(text)) = (column("Start"), column("End"), column("Text"))
            else {
                return Err(self.error(number + 1, "event format lacks Start, End or Text"));
            };
            let parse_time = |value: &str| {
                Dialect::SubStation
                    .parse_time(value)
                    .ok_or_else(|| self.error(number + 1, format!("invalid time {:?}", value)))
            };
            let span = TimeSpan::Clock {
                start: parse_time(&fields[start])?,
                end: parse_time(&fields[end])?,
            };

            let mut unit = SubtitleUnit::new(
                Dialect::SubStation,
                span,
                &fields[text].replace("\\N", "\n"),
                self.template,
            );
            unit.fields = fields;
            unit.prefix = std::mem::take(&mut prefix);
            self.core.push(unit);
        }
        self.trailer = prefix;
        Ok(())
    }

    fn write_substation(&self, out: &mut String) {
        let header: Vec<String> = if self.header.is_empty() {
            vec![
                "[Script Info]".to_string(),
                "ScriptType: v4.00+".to_string(),
                String::new(),
                "[Events]".to_string(),
                format!("Format: {}", SSA_DEFAULT_FORMAT),
            ]
        } else {
            self.header.clone()
        };
        let columns: Vec<&str> = if self.columns.is_empty() {
            SSA_DEFAULT_FORMAT.split(", ").collect()
        } else {
            self.columns.iter().map(String::as_str).collect()
        };

        for line in &header {
            out.push_str(line);
            out.push('\n');
        }
        for unit in &self.core.units {
            for line in &unit.prefix {
                out.push_str(line);
                out.push('\n');
            }
            let fields: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let fallback = unit.fields.get(i).cloned().unwrap_or_default();
                    match (column.to_ascii_lowercase().as_str(), &unit.span) {
                        ("start", TimeSpan::Clock { start, .. }) => {
                            Dialect::SubStation.format_time(start)
                        }
                        ("end", TimeSpan::Clock { end, .. }) => Dialect::SubStation.format_time(end),
                        ("text", _) => unit.value.text.replace('\n', Dialect::SubStation.line_break()),
                        ("layer", _) | ("marginl", _) | ("marginr", _) | ("marginv", _)
                            if fallback.is_empty() =>
                        {
                            "0".to_string()
                        }
                        ("style", _) if fallback.is_empty() => "Default".to_string(),
                        _ => fallback,
                    }
                })
                .collect();
            out.push_str(&format!("Dialogue: {}\n", fields.join(",")));
        }
        for line in &self.trailer {
            out.push_str(line);
            out.push('\n');
        }
    }
}

impl TranslationStore for SubtitleStore {
    delegate_store_core!();

    fn format(&self) -> FileFormat {
        self.dialect.format()
    }

    fn add_source_unit(&mut self, source: Multistring) -> usize {
        let unit = SubtitleUnit::new(
            self.dialect,
            TimeSpan::zero(self.dialect),
            source.as_str(),
            self.template,
        );
        self.core.push(unit)
    }

    fn parse(&mut self, raw: &str, options: &ParseOptions) -> Result<ParseReport, StoreError> {
        self.core.clear();
        self.core.metadata.apply_options(options);
        self.template = options.template;
        self.header.clear();
        self.columns.clear();
        self.trailer.clear();

        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        match self.dialect {
            Dialect::SubRip => self.parse_subrip(raw)?,
            Dialect::MicroDvd => self.parse_microdvd(raw)?,
            Dialect::SubStation => self.parse_substation(raw)?,
        }
        Ok(self.core.check_duplicates(self.dialect.format()))
    }

    fn serialize(&self) -> Result<String, StoreError> {
        let mut out = String::new();
        match self.dialect {
            Dialect::SubRip => {
                for (i, unit) in self.core.units.iter().enumerate() {
                    out.push_str(&format!("{}\n{}\n{}\n\n", i + 1, unit.id(), unit.value.text));
                }
            }
            Dialect::MicroDvd => {
                for unit in &self.core.units {
                    let text = unit.value.text.replace('\n', Dialect::MicroDvd.line_break());
                    out.push_str(&format!("{}{}\n", unit.id(), text));
                }
            }
            Dialect::SubStation => self.write_substation(&mut out),
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:03,500\nHello there.\n\n2\n00:00:04,000 --> 00:00:06,000\nTwo\nlines\n\n";

    const SSA: &str = "[Script Info]\nTitle: Demo\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:02.50,Default,,0,0,0,,Hi, you\\Nthere\nComment: 0,0:00:03.00,0:00:04.00,Default,,0,0,0,,note\nDialogue: 0,0:00:05.00,0:00:06.00,Default,,0,0,0,,Bye\n";

    fn parse(dialect: Dialect, raw: &str) -> SubtitleStore {
        let mut store = SubtitleStore::new(dialect);
        store.parse(raw, &ParseOptions::default()).unwrap();
        store
    }

    #[test]
    fn subrip_cues_are_keyed_by_timecode() {
        let store = parse(Dialect::SubRip, SRT);
        let units = store.units();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].id(), "00:00:01,000 --> 00:00:03,500");
        assert_eq!(units[1].text(), "Two\nlines");
        assert_eq!(store.find_id("00:00:04,000 --> 00:00:06,000"), Some(1));
    }

    #[test]
    fn subrip_round_trip() {
        assert_eq!(parse(Dialect::SubRip, SRT).serialize().unwrap(), SRT);
    }

    #[test]
    fn identical_dialogue_keeps_distinct_ids() {
        let raw = "1\n00:00:01,000 --> 00:00:02,000\nYes.\n\n2\n00:00:03,000 --> 00:00:04,000\nYes.\n";
        let mut store = SubtitleStore::new(Dialect::SubRip);
        let report = store.parse(raw, &ParseOptions::default()).unwrap();
        assert!(report.is_clean());
        assert_ne!(store.units()[0].id(), store.units()[1].id());
    }

    #[test]
    fn bad_timing_is_a_parse_error() {
        let mut store = SubtitleStore::new(Dialect::SubRip);
        let err = store
            .parse("1\n00:00:xx,000 --> 00:00:02,000\nText\n", &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Parse { line: 2, .. }));
    }

    #[test]
    fn microdvd_frames_and_breaks() {
        let raw = "{10}{50}First|line\n{60}{90}Second\n";
        let store = parse(Dialect::MicroDvd, raw);
        assert_eq!(store.units()[0].id(), "{10}{50}");
        assert_eq!(store.units()[0].text(), "First\nline");
        assert_eq!(store.serialize().unwrap(), raw);
    }

    #[test]
    fn substation_keeps_header_and_comments() {
        let store = parse(Dialect::SubStation, SSA);
        let units = store.units();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text(), "Hi, you\nthere");
        assert_eq!(units[0].id(), "0:00:01.00 --> 0:00:02.50");
        assert_eq!(store.serialize().unwrap(), SSA);
    }

    #[test]
    fn set_id_moves_the_cue() {
        let mut store = SubtitleStore::new(Dialect::SubRip);
        let index = store.add_source_unit("Hi".into());
        store.unit_mut(index).unwrap().set_id("00:01:00,000 --> 00:01:02,000");
        assert_eq!(
            store.serialize().unwrap(),
            "1\n00:01:00,000 --> 00:01:02,000\nHi\n\n"
        );
    }
}
