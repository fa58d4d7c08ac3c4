//! Inline markup for report paragraphs.
//!
//! Narrative text in the report uses a small tag vocabulary so individual words can be
//! emphasised without splitting paragraphs into separate elements:
//!
//! - `<b>bold</b>`
//! - `<i>italic</i>`
//! - `<font color="#RRGGBB">coloured</font>`
//! - the entities `&amp;`, `&lt;` and `&gt;`
//!
//! A bare `&` that does not start one of these entities is kept verbatim, so plain prose such
//! as "Education & R&D" needs no escaping.  Parsed text is represented as a list of [`Span`]s
//! that convert directly into [`genpdf`] styled strings.

use std::fmt;

use genpdf::elements::Paragraph;
use genpdf::style::{Color, Style, StyledString};

use crate::data::Rgb;

/// A slice of text together with inline style attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    bold: bool,
    italic: bool,
    color: Option<Color>,
}

impl Span {
    /// Creates a new span with the provided text and no styles applied.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns the raw text contained in this span.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }

    pub fn is_italic(&self) -> bool {
        self.italic
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    /// Marks the span as bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Marks the span as italic.
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Assigns a colour to the span.
    pub fn colored(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    fn to_style(&self) -> Style {
        let mut style = Style::new();
        if let Some(color) = self.color {
            style.set_color(color);
        }
        if self.bold {
            style.set_bold();
        }
        if self.italic {
            style.set_italic();
        }
        style
    }

    /// Converts the span to a [`StyledString`].
    pub fn to_styled_string(&self) -> StyledString {
        StyledString::new(self.text.clone(), self.to_style())
    }
}

impl From<&Span> for StyledString {
    fn from(span: &Span) -> Self {
        span.to_styled_string()
    }
}

impl From<Span> for StyledString {
    fn from(span: Span) -> Self {
        span.to_styled_string()
    }
}

/// Builds a `genpdf` paragraph from the given spans.
pub fn paragraph_from_spans<'a, I>(spans: I) -> Paragraph
where
    I: IntoIterator<Item = &'a Span>,
{
    let mut paragraph = Paragraph::default();
    for span in spans {
        paragraph.push(span.to_styled_string());
    }
    paragraph
}

/// Parse errors produced by [`parse_markup`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    index: usize,
    message: String,
}

impl ParseError {
    fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }

    /// Byte index in the original input string where the error was detected.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Human-readable description of the parsing error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.index)
    }
}

impl std::error::Error for ParseError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tag {
    Bold,
    Italic,
    Font,
}

impl Tag {
    fn name(self) -> &'static str {
        match self {
            Tag::Bold => "b",
            Tag::Italic => "i",
            Tag::Font => "font",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct StyleState {
    bold: bool,
    italic: bool,
    color: Option<Color>,
}

impl StyleState {
    fn to_span(self, text: String) -> Span {
        Span {
            text,
            bold: self.bold,
            italic: self.italic,
            color: self.color,
        }
    }
}

const ENTITIES: &[(&str, char)] = &[("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>')];

/// Parses inline markup into a list of [`Span`]s.
///
/// Adjacent text with identical styling is merged into a single span.  Tags must be properly
/// nested; any unknown, unbalanced or malformed tag yields a [`ParseError`] pointing at the
/// offending byte offset.
pub fn parse_markup(input: &str) -> Result<Vec<Span>, ParseError> {
    let mut spans: Vec<Span> = Vec::new();
    let mut stack: Vec<(Tag, StyleState, usize)> = Vec::new();
    let mut state = StyleState::default();
    let mut buffer = String::new();
    let mut index = 0;

    while index < input.len() {
        let rest = &input[index..];

        if rest.starts_with("</") {
            let end = tag_end(input, index)?;
            let name = input[index + 2..end].trim();
            match stack.pop() {
                Some((open, previous, _)) if open.name() == name => {
                    flush(&mut buffer, &mut spans, state);
                    state = previous;
                }
                Some((open, _, _)) => {
                    return Err(ParseError::new(
                        index,
                        format!("expected `</{}>` but found `</{}>`", open.name(), name),
                    ));
                }
                None => {
                    return Err(ParseError::new(
                        index,
                        format!("closing tag `</{name}>` without matching opening tag"),
                    ));
                }
            }
            index = end + 1;
            continue;
        }

        if rest.starts_with('<') {
            let end = tag_end(input, index)?;
            let (tag, next_state) = open_tag(&input[index + 1..end], index, state)?;
            flush(&mut buffer, &mut spans, state);
            stack.push((tag, state, index));
            state = next_state;
            index = end + 1;
            continue;
        }

        if rest.starts_with('&') {
            if let Some((entity, ch)) = ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity))
            {
                buffer.push(*ch);
                index += entity.len();
                continue;
            }
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        buffer.push(ch);
        index += ch.len_utf8();
    }

    if let Some((tag, _, opened_at)) = stack.pop() {
        return Err(ParseError::new(
            opened_at,
            format!("unterminated `<{}>` tag", tag.name()),
        ));
    }

    flush(&mut buffer, &mut spans, state);
    Ok(spans)
}

fn tag_end(input: &str, start: usize) -> Result<usize, ParseError> {
    input[start..]
        .find('>')
        .map(|offset| start + offset)
        .ok_or_else(|| ParseError::new(start, "tag is missing its closing `>`"))
}

fn open_tag(body: &str, index: usize, state: StyleState) -> Result<(Tag, StyleState), ParseError> {
    let body = body.trim();
    let (name, attributes) = match body.split_once(char::is_whitespace) {
        Some((name, attributes)) => (name, attributes.trim()),
        None => (body, ""),
    };

    let mut next = state;
    let tag = match name {
        "b" => {
            next.bold = true;
            Tag::Bold
        }
        "i" => {
            next.italic = true;
            Tag::Italic
        }
        "font" => {
            next.color = Some(font_color(attributes, index)?.to_genpdf());
            Tag::Font
        }
        other => {
            return Err(ParseError::new(
                index,
                format!("unsupported tag `<{other}>`; expected <b>, <i> or <font color=...>"),
            ));
        }
    };

    if tag != Tag::Font && !attributes.is_empty() {
        return Err(ParseError::new(
            index,
            format!("tag `<{name}>` does not take attributes"),
        ));
    }

    Ok((tag, next))
}

fn font_color(attributes: &str, index: usize) -> Result<Rgb, ParseError> {
    let value = attributes
        .strip_prefix("color=")
        .ok_or_else(|| ParseError::new(index, "`<font>` requires a `color` attribute"))?;
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    Rgb::from_hex(value).ok_or_else(|| {
        ParseError::new(
            index,
            format!("invalid colour `{value}`; use #RRGGBB hexadecimal digits"),
        )
    })
}

fn flush(buffer: &mut String, spans: &mut Vec<Span>, state: StyleState) {
    if buffer.is_empty() {
        return;
    }
    let text = std::mem::take(buffer);
    if let Some(last) = spans.last_mut() {
        if last.bold == state.bold && last.italic == state.italic && last.color == state.color {
            last.text.push_str(&text);
            return;
        }
    }
    spans.push(state.to_span(text));
}
