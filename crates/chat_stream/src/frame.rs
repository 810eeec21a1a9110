//! Wire lines and the frames they carry.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Prefix of a line carrying a JSON frame.
pub const DATA_PREFIX: &str = "data: ";

/// Lines starting with this are keep-alive comments.
pub const COMMENT_PREFIX: char = ':';

/// One JSON object from a `data: ` line. Every field is optional and
/// several may appear together; unknown fields are ignored.
///
/// Side data stays untyped until [`into_events`](Self::into_events) so a
/// bad item cannot take the rest of the line down with it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamFrame {
    pub content: Option<String>,

    #[serde(alias = "sideData", alias = "side_data")]
    pub citations: Option<Vec<Value>>,

    pub completed: Option<bool>,

    #[serde(alias = "errorMessage")]
    pub error: Option<String>,
}

impl StreamFrame {
    /// Events of this frame in dispatch order.
    ///
    /// An error suppresses every other field on the same line. Otherwise
    /// content, side data and completion follow independently. Side data
    /// items that do not fit `T` are dropped one by one.
    pub fn into_events<T: DeserializeOwned>(self) -> Vec<StreamEvent<T>> {
        if let Some(message) = self.error {
            return vec![StreamEvent::Error(message)];
        }

        let mut events = Vec::new();
        if let Some(content) = self.content.filter(|c| !c.is_empty()) {
            events.push(StreamEvent::Content(content));
        }
        let items = typed_items::<T>(self.citations.unwrap_or_default());
        if !items.is_empty() {
            events.push(StreamEvent::SideData(items));
        }
        if self.completed == Some(true) {
            events.push(StreamEvent::Complete);
        }
        events
    }
}

fn typed_items<T: DeserializeOwned>(raw: Vec<Value>) -> Vec<T> {
    raw.into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(item) => Some(item),
            Err(err) => {
                log::warn!("Skipping side data item: {}", err);
                None
            }
        })
        .collect()
}

/// Typed output of the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<T> {
    Content(String),
    SideData(Vec<T>),
    Complete,
    Error(String),
}

/// Classification of one wire line.
#[derive(Debug)]
pub enum Line {
    Blank,
    Comment,
    /// Not a data line; ignored.
    Other,
    Frame(StreamFrame),
    Malformed(serde_json::Error),
}

pub fn parse_line(raw: &str) -> Line {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if line.starts_with(COMMENT_PREFIX) {
        return Line::Comment;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Line::Other;
    };

    match serde_json::from_str(payload) {
        Ok(frame) => Line::Frame(frame),
        Err(err) => Line::Malformed(err),
    }
}
