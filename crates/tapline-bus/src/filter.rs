//! Topic filters with `+` / `#` wildcards.

use std::fmt;

use crate::error::{BusError, BusResult};

const SEPARATOR: char = '/';
const WILDCARD_SINGLE: &str = "+";
const WILDCARD_MULTI: &str = "#";

/// A segment in a topic filter.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterSegment {
    /// Matches this exact literal segment.
    Literal(String),
    /// `+`: exactly one segment.
    Single,
    /// `#`: zero or more segments (must be last).
    Multi,
}

/// A parsed subscription filter.
///
/// ```
/// use tapline_bus::TopicFilter;
///
/// let filter = TopicFilter::new("tap-1/keg/+/status").unwrap();
/// assert!(filter.matches("tap-1/keg/keg-a/status"));
/// assert!(!filter.matches("tap-1/keg/keg-a/event"));
///
/// let filter = TopicFilter::new("tap-1/#").unwrap();
/// assert!(filter.matches("tap-1"));
/// assert!(filter.matches("tap-1/ui/display"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    segments: Vec<FilterSegment>,
    original: String,
}

impl TopicFilter {
    /// Parse a filter string.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidFilter`] for empty filters, empty segments,
    /// a `#` that is not last, or wildcards embedded inside a segment.
    pub fn new(filter: impl Into<String>) -> BusResult<Self> {
        let original = filter.into();
        let invalid = |reason: &str| BusError::InvalidFilter {
            filter: original.clone(),
            reason: reason.to_string(),
        };

        if original.is_empty() {
            return Err(invalid("filter is empty"));
        }

        let parts: Vec<&str> = original.split(SEPARATOR).collect();
        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());

        for (position, part) in parts.iter().enumerate() {
            let segment = match *part {
                "" => return Err(invalid("empty segment")),
                WILDCARD_SINGLE => FilterSegment::Single,
                WILDCARD_MULTI if position == last => FilterSegment::Multi,
                WILDCARD_MULTI => return Err(invalid("'#' must be the last segment")),
                literal if literal.contains(['+', '#']) => {
                    return Err(invalid("wildcards must occupy a whole segment"));
                }
                literal => FilterSegment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self { segments, original })
    }

    /// Check whether a concrete topic matches this filter.
    pub fn matches(&self, topic: &str) -> bool {
        let mut topic_segments = topic.split(SEPARATOR);

        for segment in &self.segments {
            match segment {
                FilterSegment::Multi => return true,
                FilterSegment::Single => {
                    if topic_segments.next().is_none() {
                        return false;
                    }
                }
                FilterSegment::Literal(literal) => match topic_segments.next() {
                    Some(s) if s == literal => {}
                    _ => return false,
                },
            }
        }

        topic_segments.next().is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
