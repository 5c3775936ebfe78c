// ASS/SSA document with verbatim round-tripping
//
// Every physical line is kept with its own terminator. Only Dialogue lines in
// [Events] are decoded; a Dialogue line is rebuilt on save only after its text
// has been changed, all other bytes are written back untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use super::{Entry, strip_bom, timecode};
use crate::error::{LipiError, Result};

static LEADING_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\{[^}]*\})+").expect("valid leading tag pattern"));

const DEFAULT_HEADER: &str = "[Script Info]
Title: Lipi Generated Subtitles
ScriptType: v4.00+
Collisions: Normal
PlayDepth: 0

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,2,2,10,10,10,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
";

/// Split text into its leading `{...}` override run and the remaining content
pub fn extract_leading_tags(text: &str) -> (&str, &str) {
    match LEADING_TAGS.find(text) {
        Some(m) => text.split_at(m.end()),
        None => ("", text),
    }
}

/// Encode line breaks as ASS hard breaks
pub fn escape_text(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\\N")
}

/// Decode ASS hard and soft break markers into line breaks
pub fn unescape_text(text: &str) -> String {
    text.replace("\\N", "\n").replace("\\n", "\n")
}

#[derive(Debug, Clone)]
enum Line {
    Raw(String),
    Dialogue(usize),
}

#[derive(Debug, Clone)]
struct Dialogue {
    /// `Dialogue:` with its surrounding whitespace
    prefix: String,
    fields: Vec<String>,
    /// Text field position under the Format line in force for this line
    text_column: usize,
    start: Duration,
    end: Duration,
    leading_tags: String,
    original_text: String,
    current_text: String,
    line: String,
    terminator: String,
    modified: bool,
}

impl Dialogue {
    fn rebuild(&self) -> String {
        format!("{}{}", self.prefix, self.fields.join(","))
    }
}

#[derive(Debug, Clone)]
pub struct AssDocument {
    bom: bool,
    lines: Vec<Line>,
    columns: Vec<String>,
    dialogues: Vec<Dialogue>,
}

#[derive(Debug, Clone, Copy)]
struct EventsFormat {
    count: usize,
    start: usize,
    end: usize,
    text: usize,
}

impl AssDocument {
    pub fn parse(content: &str) -> Result<Self> {
        let bom = content.starts_with('\u{feff}');
        let body = strip_bom(content);

        let mut lines = Vec::new();
        let mut dialogues = Vec::new();
        let mut columns: Vec<String> = Vec::new();
        let mut format: Option<EventsFormat> = None;
        let mut in_events = false;

        for (i, chunk) in body.split_inclusive('\n').enumerate() {
            let line_no = i + 1;
            let line = chunk.trim_end_matches(['\n', '\r']);
            let trimmed = line.trim();

            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                in_events = trimmed.eq_ignore_ascii_case("[events]");
                lines.push(Line::Raw(chunk.to_string()));
                continue;
            }

            if !in_events {
                lines.push(Line::Raw(chunk.to_string()));
                continue;
            }

            if let Some(rest) = strip_key(trimmed, "Format:") {
                columns = rest.split(',').map(|c| c.trim().to_string()).collect();
                format = Some(events_format(&columns, line_no)?);
                lines.push(Line::Raw(chunk.to_string()));
                continue;
            }

            if strip_key(trimmed, "Dialogue:").is_some() {
                let fmt = format.ok_or_else(|| {
                    LipiError::parse(line_no, "Dialogue line before the [Events] Format line")
                })?;
                let dialogue = parse_dialogue(line, chunk, fmt, line_no)?;
                lines.push(Line::Dialogue(dialogues.len()));
                dialogues.push(dialogue);
                continue;
            }

            lines.push(Line::Raw(chunk.to_string()));
        }

        if format.is_none() {
            return Err(LipiError::parse(
                body.lines().count().max(1),
                "missing Format line in [Events] section",
            ));
        }

        Ok(Self {
            bom,
            lines,
            columns,
            dialogues,
        })
    }

    /// New document with the default script header and style
    pub fn from_entries(entries: &[Entry]) -> Self {
        let mut content = String::from(DEFAULT_HEADER);
        for entry in entries {
            content.push_str(&format!(
                "Dialogue: 0,{},{},Default,,0,0,0,,{}\n",
                timecode::format_ass(entry.start),
                timecode::format_ass(entry.end),
                escape_text(&entry.text)
            ));
        }

        match Self::parse(&content) {
            Ok(doc) => doc,
            // Generated content always parses.
            Err(_) => Self::empty_with_default_header(),
        }
    }

    fn empty_with_default_header() -> Self {
        let columns: Vec<String> = ["Layer", "Start", "End", "Style", "Name", "MarginL", "MarginR", "MarginV", "Effect", "Text"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        Self {
            bom: false,
            lines: DEFAULT_HEADER
                .split_inclusive('\n')
                .map(|l| Line::Raw(l.to_string()))
                .collect(),
            columns,
            dialogues: Vec::new(),
        }
    }

    /// Column names of the [Events] Format line
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.dialogues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogues.is_empty()
    }

    /// Tag-stripped text with line breaks decoded
    pub fn entries(&self) -> Vec<Entry> {
        self.dialogues
            .iter()
            .enumerate()
            .map(|(i, d)| Entry {
                index: i + 1,
                start: d.start,
                end: d.end,
                text: unescape_text(&d.current_text),
            })
            .collect()
    }

    /// Leading override tags of the dialogue at `position`
    pub fn leading_tags(&self, position: usize) -> Result<&str> {
        Ok(&self.dialogue(position)?.leading_tags)
    }

    /// Tag-stripped text as it was when the file was parsed
    pub fn original_text(&self, position: usize) -> Result<&str> {
        Ok(&self.dialogue(position)?.original_text)
    }

    /// Replace the text, keeping the leading override tags
    pub fn set_text(&mut self, position: usize, text: &str) -> Result<()> {
        let escaped = escape_text(text);
        self.store_text(position, escaped)
    }

    /// Show the translation above the original: `tags + translated \N original`
    pub fn set_text_with_overlay(&mut self, position: usize, translated: &str) -> Result<()> {
        let original = self.dialogue(position)?.original_text.clone();
        let composed = format!("{}\\N{}", escape_text(translated), original);
        self.store_text(position, composed)
    }

    fn store_text(&mut self, position: usize, content: String) -> Result<()> {
        let dialogue = self.dialogue_mut(position)?;
        dialogue.fields[dialogue.text_column] = format!("{}{}", dialogue.leading_tags, content);
        dialogue.current_text = content;
        dialogue.modified = true;
        Ok(())
    }

    fn dialogue(&self, position: usize) -> Result<&Dialogue> {
        self.dialogues.get(position).ok_or(LipiError::IndexOutOfRange {
            index: position,
            len: self.dialogues.len(),
        })
    }

    fn dialogue_mut(&mut self, position: usize) -> Result<&mut Dialogue> {
        let len = self.dialogues.len();
        self.dialogues
            .get_mut(position)
            .ok_or(LipiError::IndexOutOfRange { index: position, len })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.bom {
            out.push('\u{feff}');
        }

        for line in &self.lines {
            match line {
                Line::Raw(raw) => out.push_str(raw),
                Line::Dialogue(i) => {
                    let d = &self.dialogues[*i];
                    if d.modified {
                        out.push_str(&d.rebuild());
                    } else {
                        out.push_str(&d.line);
                    }
                    out.push_str(&d.terminator);
                }
            }
        }
        out
    }
}

fn strip_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let head = line.get(..key.len())?;
    if head.eq_ignore_ascii_case(key) {
        line.get(key.len()..)
    } else {
        None
    }
}

fn column(columns: &[String], name: &str, line_no: usize) -> Result<usize> {
    columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(name))
        .ok_or_else(|| LipiError::parse(line_no, format!("Format line has no {} column", name)))
}

fn events_format(columns: &[String], line_no: usize) -> Result<EventsFormat> {
    Ok(EventsFormat {
        count: columns.len(),
        start: column(columns, "Start", line_no)?,
        end: column(columns, "End", line_no)?,
        text: column(columns, "Text", line_no)?,
    })
}

fn parse_dialogue(line: &str, chunk: &str, fmt: EventsFormat, line_no: usize) -> Result<Dialogue> {
    // Prefix runs through the colon and any whitespace after it.
    let colon = line.find(':').unwrap_or(0) + 1;
    let value_start = line[colon..]
        .find(|c: char| !c.is_whitespace())
        .map(|offset| colon + offset)
        .unwrap_or(line.len());
    let (prefix, values) = line.split_at(value_start);

    let fields: Vec<String> = values.splitn(fmt.count, ',').map(|f| f.to_string()).collect();
    if fields.len() < fmt.count {
        return Err(LipiError::parse(
            line_no,
            format!("Dialogue has {} fields, expected {}", fields.len(), fmt.count),
        ));
    }

    let start = timecode::parse_ass(&fields[fmt.start]).ok_or_else(|| {
        LipiError::parse(line_no, format!("invalid start time '{}'", fields[fmt.start].trim()))
    })?;
    let end = timecode::parse_ass(&fields[fmt.end]).ok_or_else(|| {
        LipiError::parse(line_no, format!("invalid end time '{}'", fields[fmt.end].trim()))
    })?;

    let (tags, content) = extract_leading_tags(&fields[fmt.text]);

    Ok(Dialogue {
        prefix: prefix.to_string(),
        start,
        end,
        leading_tags: tags.to_string(),
        original_text: content.to_string(),
        current_text: content.to_string(),
        line: line.to_string(),
        terminator: chunk[line.len()..].to_string(),
        modified: false,
        text_column: fmt.text,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[Script Info]
Title: Test Subtitles
ScriptType: v4.00+
PlayDepth: 0

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,2,2,10,10,10,1
Style: Italic,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,1,0,0,100,100,0,0,1,2,2,2,10,10,10,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
Dialogue: 0,0:00:01.00,0:00:04.00,Default,,0,0,0,,Hello, world!
Comment: 0,0:00:04.00,0:00:05.00,Default,,0,0,0,,not shown
Dialogue: 0,0:00:05.00,0:00:08.00,Italic,,0,0,0,,{\\pos(100,200)}Tagged text
Dialogue: 0,0:00:10.00,0:00:12.50,Default,,0,0,0,,Line with\\Nnewline.

[Fonts]
fontname: custom.ttf
";

    #[test]
    fn test_extract_leading_tags() {
        assert_eq!(
            extract_leading_tags("{\\an8}{\\fs24}Hello world"),
            ("{\\an8}{\\fs24}", "Hello world")
        );
        assert_eq!(extract_leading_tags("Hello world"), ("", "Hello world"));
        assert_eq!(
            extract_leading_tags("Hello {\\i1}world"),
            ("", "Hello {\\i1}world")
        );
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let doc = AssDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.render(), SAMPLE);

        let crlf = format!("\u{feff}{}", SAMPLE.replace('\n', "\r\n"));
        let doc = AssDocument::parse(&crlf).unwrap();
        assert_eq!(doc.render(), crlf);
    }

    #[test]
    fn test_entries_strip_tags_and_decode_breaks() {
        let doc = AssDocument::parse(SAMPLE).unwrap();
        let entries = doc.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "Hello, world!");
        assert_eq!(entries[1].text, "Tagged text");
        assert_eq!(entries[1].start, Duration::from_secs(5));
        assert_eq!(entries[2].text, "Line with\nnewline.");
        assert_eq!(entries[2].end, Duration::from_millis(12_500));
    }

    #[test]
    fn test_text_keeps_commas() {
        let doc = AssDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.original_text(0).unwrap(), "Hello, world!");
    }

    #[test]
    fn test_set_text_keeps_tags_and_other_lines() {
        let mut doc = AssDocument::parse(SAMPLE).unwrap();
        doc.set_text(1, "New\ntext").unwrap();
        let rendered = doc.render();
        assert!(rendered.contains(
            "Dialogue: 0,0:00:05.00,0:00:08.00,Italic,,0,0,0,,{\\pos(100,200)}New\\Ntext\n"
        ));
        assert_eq!(
            rendered.replace("{\\pos(100,200)}New\\Ntext", "{\\pos(100,200)}Tagged text"),
            SAMPLE
        );

        let mut again = doc.clone();
        again.set_text(1, "New\ntext").unwrap();
        assert_eq!(again.render(), rendered);
    }

    #[test]
    fn test_overlay() {
        let mut doc = AssDocument::parse(SAMPLE).unwrap();
        doc.set_text_with_overlay(1, "翻訳されたテキスト").unwrap();
        assert!(doc.render().contains(",,{\\pos(100,200)}翻訳されたテキスト\\NTagged text\n"));
    }

    #[test]
    fn test_field_count_error_names_line() {
        let content = "[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:02.00,Default\n";
        match AssDocument::parse(content) {
            Err(LipiError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_format_and_text_column() {
        assert!(AssDocument::parse("[Events]\nDialogue: 0,0:00:01.00,0:00:02.00,,x\n").is_err());
        assert!(AssDocument::parse("[Script Info]\nTitle: x\n").is_err());
        assert!(matches!(
            AssDocument::parse("[Events]\nFormat: Layer, Start, End, Style\n"),
            Err(LipiError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_each_dialogue_keeps_its_own_format() {
        let narrow_first = "[Events]\nFormat: Start, End, Text\nDialogue: 0:00:01.00,0:00:02.00,hi, there\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:03.00,0:00:04.00,Default,,0,0,0,,there\n";
        let mut doc = AssDocument::parse(narrow_first).unwrap();
        doc.set_text(0, "X").unwrap();
        doc.set_text(1, "Y").unwrap();
        assert_eq!(
            doc.render(),
            narrow_first
                .replace("0:00:02.00,hi, there", "0:00:02.00,X")
                .replace("Default,,0,0,0,,there", "Default,,0,0,0,,Y")
        );

        let wide_first = "[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,hello\nFormat: Start, End, Text\nDialogue: 0:00:03.00,0:00:04.00,there\n";
        let mut doc = AssDocument::parse(wide_first).unwrap();
        doc.set_text(0, "X").unwrap();
        doc.set_text(1, "Y").unwrap();
        assert_eq!(
            doc.render(),
            wide_first
                .replace("Default,,0,0,0,,hello", "Default,,0,0,0,,X")
                .replace("0:00:04.00,there", "0:00:04.00,Y")
        );
    }

    #[test]
    fn test_overflowing_time_is_parse_error() {
        let content = "[Events]\nFormat: Layer, Start, End, Text\nDialogue: 0,99999999999999999:00:00.00,0:00:02.00,x\n";
        assert!(matches!(
            AssDocument::parse(content),
            Err(LipiError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_text_column_lookup_is_case_insensitive() {
        let content = "[Events]\nformat: layer, start, end, text\nDialogue:0,0:00:01.00,0:00:02.00,a,b\n";
        let mut doc = AssDocument::parse(content).unwrap();
        assert_eq!(doc.entries()[0].text, "a,b");
        doc.set_text(0, "c").unwrap();
        assert_eq!(doc.render(), "[Events]\nformat: layer, start, end, text\nDialogue:0,0:00:01.00,0:00:02.00,c\n");
    }

    #[test]
    fn test_from_entries_uses_default_header() {
        let doc = AssDocument::from_entries(&[Entry {
            index: 1,
            start: Duration::from_millis(1_500),
            end: Duration::from_millis(3_000),
            text: "Two\nlines".to_string(),
        }]);
        let rendered = doc.render();
        assert!(rendered.starts_with("[Script Info]\nTitle: Lipi Generated Subtitles\n"));
        assert!(rendered.ends_with("Dialogue: 0,0:00:01.50,0:00:03.00,Default,,0,0,0,,Two\\Nlines\n"));
        assert_eq!(doc.entries()[0].text, "Two\nlines");
    }
}
