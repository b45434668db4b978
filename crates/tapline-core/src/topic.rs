//! Topic layout for tap traffic.
//!
//! Topics follow `{tap}/{domain}/{device?}/{channel}`:
//!
//! ```text
//! {tap}/ui/display             valve box → viewers
//! {tap}/ui/event               tap UI → valve box
//! {tap}/keg/{keg}/command      valve box → keg
//! {tap}/keg/{keg}/status       keg → valve box, aggregator
//! {tap}/keg/{keg}/event        keg → valve box, aggregator
//! ```

use std::fmt;

/// A parsed tap topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TapTopic {
    Display { tap: String },
    UiEvent { tap: String },
    KegCommand { tap: String, keg: String },
    KegStatus { tap: String, keg: String },
    KegEvent { tap: String, keg: String },
}

impl TapTopic {
    pub fn display(tap: &str) -> Self {
        Self::Display { tap: tap.to_string() }
    }

    pub fn ui_event(tap: &str) -> Self {
        Self::UiEvent { tap: tap.to_string() }
    }

    pub fn keg_command(tap: &str, keg: &str) -> Self {
        Self::KegCommand {
            tap: tap.to_string(),
            keg: keg.to_string(),
        }
    }

    pub fn keg_status(tap: &str, keg: &str) -> Self {
        Self::KegStatus {
            tap: tap.to_string(),
            keg: keg.to_string(),
        }
    }

    pub fn keg_event(tap: &str, keg: &str) -> Self {
        Self::KegEvent {
            tap: tap.to_string(),
            keg: keg.to_string(),
        }
    }

    /// Parse a concrete topic. Returns `None` for anything outside the layout.
    pub fn parse(topic: &str) -> Option<Self> {
        let segments: Vec<&str> = topic.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        match segments.as_slice() {
            [tap, "ui", "display"] => Some(Self::display(tap)),
            [tap, "ui", "event"] => Some(Self::ui_event(tap)),
            [tap, "keg", keg, "command"] => Some(Self::keg_command(tap, keg)),
            [tap, "keg", keg, "status"] => Some(Self::keg_status(tap, keg)),
            [tap, "keg", keg, "event"] => Some(Self::keg_event(tap, keg)),
            _ => None,
        }
    }

    /// The tap this topic belongs to.
    pub fn tap_id(&self) -> &str {
        match self {
            Self::Display { tap }
            | Self::UiEvent { tap }
            | Self::KegCommand { tap, .. }
            | Self::KegStatus { tap, .. }
            | Self::KegEvent { tap, .. } => tap,
        }
    }

    /// The keg segment, for keg-scoped topics.
    pub fn keg_id(&self) -> Option<&str> {
        match self {
            Self::KegCommand { keg, .. } | Self::KegStatus { keg, .. } | Self::KegEvent { keg, .. } => {
                Some(keg)
            }
            Self::Display { .. } | Self::UiEvent { .. } => None,
        }
    }
}

impl fmt::Display for TapTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display { tap } => write!(f, "{tap}/ui/display"),
            Self::UiEvent { tap } => write!(f, "{tap}/ui/event"),
            Self::KegCommand { tap, keg } => write!(f, "{tap}/keg/{keg}/command"),
            Self::KegStatus { tap, keg } => write!(f, "{tap}/keg/{keg}/status"),
            Self::KegEvent { tap, keg } => write!(f, "{tap}/keg/{keg}/event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_channel() {
        assert_eq!(TapTopic::parse("tap-1/ui/display"), Some(TapTopic::display("tap-1")));
        assert_eq!(TapTopic::parse("tap-1/ui/event"), Some(TapTopic::ui_event("tap-1")));
        assert_eq!(
            TapTopic::parse("tap-1/keg/keg-a/command"),
            Some(TapTopic::keg_command("tap-1", "keg-a"))
        );
        assert_eq!(
            TapTopic::parse("tap-1/keg/keg-a/status"),
            Some(TapTopic::keg_status("tap-1", "keg-a"))
        );
        assert_eq!(
            TapTopic::parse("tap-1/keg/keg-a/event"),
            Some(TapTopic::keg_event("tap-1", "keg-a"))
        );
    }

    #[test]
    fn rejects_foreign_topics() {
        assert_eq!(TapTopic::parse("tap-1/ui"), None);
        assert_eq!(TapTopic::parse("tap-1/keg/keg-a/telemetry"), None);
        assert_eq!(TapTopic::parse("tap-1//display"), None);
        assert_eq!(TapTopic::parse(""), None);
    }

    #[test]
    fn display_matches_parse() {
        let topic = TapTopic::keg_status("tap-9", "keg-z");
        assert_eq!(topic.to_string(), "tap-9/keg/keg-z/status");
        assert_eq!(TapTopic::parse(&topic.to_string()), Some(topic));
    }

    #[test]
    fn accessors() {
        let topic = TapTopic::keg_event("tap-2", "keg-b");
        assert_eq!(topic.tap_id(), "tap-2");
        assert_eq!(topic.keg_id(), Some("keg-b"));
        assert_eq!(TapTopic::ui_event("tap-2").keg_id(), None);
    }
}
