//! Stream identities, waveform records, and pick events.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one physical sensor at one site: network, station, location
/// and the band+instrument code, excluding the orientation letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    pub net: String,
    pub sta: String,
    pub loc: String,
    pub cha: String,
}

impl StreamKey {
    /// Empty location codes are carried as `"--"` so keys compare and
    /// display consistently however the transport spells them.
    pub fn new(
        net: impl Into<String>,
        sta: impl Into<String>,
        loc: impl Into<String>,
        cha: impl Into<String>,
    ) -> Self {
        let loc = loc.into();
        Self {
            net: net.into(),
            sta: sta.into(),
            loc: if loc.is_empty() { "--".to_string() } else { loc },
            cha: cha.into(),
        }
    }

    /// Split a full channel code (e.g. `HHZ`) into the band+instrument part
    /// and the trailing orientation letter.
    pub fn split_channel(
        net: &str,
        sta: &str,
        loc: &str,
        channel: &str,
    ) -> Option<(Self, Component)> {
        if channel.len() < 2 || !channel.is_ascii() {
            return None;
        }
        let (cha, comp) = channel.split_at(channel.len() - 1);
        let comp = comp.chars().next()?;
        Some((Self::new(net, sta, loc, cha), Component(comp)))
    }

    /// Full channel code for one component of this stream.
    pub fn channel_code(&self, component: Component) -> String {
        format!("{}{}", self.cha, component)
    }

    /// Location code as it appears on the wire (empty instead of `"--"`).
    pub fn wire_loc(&self) -> &str {
        if self.loc == "--" {
            ""
        } else {
            &self.loc
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.net, self.sta, self.loc, self.cha)
    }
}

/// One orientation channel (vertical/north/east or a numbered equivalent)
/// belonging to a [`StreamKey`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Component(pub char);

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<char> for Component {
    fn from(c: char) -> Self {
        Self(c)
    }
}

/// Half-open time range of waveform data needed around a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window opening `lead` before and closing `lag` after the pick time.
    pub fn around(time: DateTime<Utc>, lead: Duration, lag: Duration) -> Self {
        Self {
            start: time - lead,
            end: time + lag,
        }
    }

    /// Overlap test, not an exact-bounds test: a record partially covering
    /// the window counts in full.
    pub fn overlaps(&self, record: &Record) -> bool {
        record.end >= self.start && record.start <= self.end
    }
}

/// An immutable span of waveform samples for exactly one (stream, component)
/// pair. The payload is opaque; nothing here decodes samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: StreamKey,
    pub component: Component,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub payload: Bytes,
}

/// A detected phase onset carrying the sensor identity it fired on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub id: String,
    pub key: StreamKey,
    pub time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn record(start: i64, end: i64) -> Record {
        Record {
            key: StreamKey::new("GR", "FUR", "", "HH"),
            component: Component('Z'),
            start: t(start),
            end: t(end),
            payload: Bytes::from_static(b"\0\0"),
        }
    }

    #[test]
    fn empty_location_normalizes() {
        let key = StreamKey::new("GR", "FUR", "", "HH");
        assert_eq!(key.loc, "--");
        assert_eq!(key.wire_loc(), "");
        assert_eq!(key.to_string(), "GR.FUR.--.HH");
    }

    #[test]
    fn split_channel_takes_trailing_letter() {
        let (key, comp) = StreamKey::split_channel("GR", "FUR", "00", "HHZ").unwrap();
        assert_eq!(key, StreamKey::new("GR", "FUR", "00", "HH"));
        assert_eq!(comp, Component('Z'));
        assert_eq!(key.channel_code(comp), "HHZ");
    }

    #[test]
    fn split_channel_rejects_short_codes() {
        assert!(StreamKey::split_channel("GR", "FUR", "", "Z").is_none());
    }

    #[test]
    fn window_overlap_is_inclusive_at_the_edges() {
        let window = TimeWindow {
            start: t(100),
            end: t(200),
        };
        assert!(window.overlaps(&record(50, 100)));
        assert!(window.overlaps(&record(200, 250)));
        assert!(window.overlaps(&record(120, 180)));
        assert!(window.overlaps(&record(50, 250)));
        assert!(!window.overlaps(&record(50, 99)));
        assert!(!window.overlaps(&record(201, 250)));
    }
}
