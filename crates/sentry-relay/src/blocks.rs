//! Slack Block Kit message layout.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Label used for the trailing "open in Sentry" link.
pub const LINK_LABEL: &str = "View in Sentry";

/// Slack rejects section text longer than this with `invalid_blocks`.
pub const MAX_TEXT_CHARS: usize = 3000;

/// Per-field limit inside a field-list section.
pub const MAX_FIELD_CHARS: usize = 2000;

/// Escape the three characters Slack treats as control sequences in
/// markdown text (`&`, `<`, `>`).
#[must_use]
pub fn escape_mrkdwn(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Cut `text` to at most `limit` characters, marking the cut with an ellipsis.
fn truncate(text: String, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text;
    }
    let mut cut: String = text.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// A labelled value inside a field-list section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub value: String,
}

impl Field {
    /// Render as Slack markdown: bold label, value on the next line.
    #[must_use]
    pub fn markdown(&self) -> String {
        format!("*{}:*\n{}", self.label, self.value)
    }
}

/// One unit of the outgoing message layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBlock {
    /// Section block with a single markdown text
    Text(String),
    /// Section block rendered as a two-column field grid
    Fields(Vec<Field>),
    /// Divider line
    Divider,
}

impl DisplayBlock {
    /// Markdown text section, truncated to [`MAX_TEXT_CHARS`].
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(truncate(text.into(), MAX_TEXT_CHARS))
    }

    /// Field grid from `(label, value)` pairs, order preserved. Rendered
    /// entries are truncated to [`MAX_FIELD_CHARS`].
    #[must_use]
    pub fn fields<I, L, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (L, V)>,
        L: Into<String>,
        V: Into<String>,
    {
        Self::Fields(
            entries
                .into_iter()
                .map(|(label, value)| {
                    let label = label.into();
                    // Leave room for the `*label:*\n` prefix.
                    let budget = MAX_FIELD_CHARS.saturating_sub(label.chars().count() + 4);
                    Field {
                        value: truncate(value.into(), budget),
                        label,
                    }
                })
                .collect(),
        )
    }

    /// Text section linking to `url`.
    ///
    /// `|` would end the URL part of the link early, so it is percent-encoded.
    #[must_use]
    pub fn link(url: &str) -> Self {
        let url = escape_mrkdwn(url).replace('|', "%7C");
        Self::Text(format!("<{url}|{LINK_LABEL}>"))
    }
}

impl Serialize for DisplayBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            Self::Text(text) => {
                map.serialize_entry("type", "section")?;
                map.serialize_entry("text", &SlackText::mrkdwn(text.clone()))?;
            }
            Self::Fields(fields) => {
                map.serialize_entry("type", "section")?;
                let fields: Vec<SlackText> = fields
                    .iter()
                    .map(|field| SlackText::mrkdwn(field.markdown()))
                    .collect();
                map.serialize_entry("fields", &fields)?;
            }
            Self::Divider => {
                map.serialize_entry("type", "divider")?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Serialize)]
struct SlackText {
    #[serde(rename = "type")]
    text_type: &'static str,
    text: String,
}

impl SlackText {
    fn mrkdwn(text: String) -> Self {
        Self {
            text_type: "mrkdwn",
            text,
        }
    }
}
