//! JSON-lines wire messages shared by the live feeds and the archive client.
//!
//! Every message is one JSON object per line. Payload bytes ride along
//! base64-encoded and stay opaque end to end.

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pickwave_core::{ArchiveQuery, Pick, Record, StreamKey};

/// One waveform record on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMsg {
    pub net: String,
    pub sta: String,
    #[serde(default)]
    pub loc: String,
    /// Full channel code including the orientation letter, e.g. `HHZ`.
    pub cha: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Base64-encoded raw samples.
    pub data: String,
}

impl RecordMsg {
    pub fn into_record(self) -> Result<Record> {
        let (key, component) =
            StreamKey::split_channel(&self.net, &self.sta, &self.loc, &self.cha)
                .ok_or_else(|| anyhow!("malformed channel code: {:?}", self.cha))?;
        if self.end <= self.start {
            bail!("record for {key} ends at {} before it starts", self.end);
        }
        let payload = BASE64
            .decode(self.data.as_bytes())
            .context("invalid record payload encoding")?;
        Ok(Record {
            key,
            component,
            start: self.start,
            end: self.end,
            payload: payload.into(),
        })
    }

    pub fn from_record(record: &Record) -> Self {
        Self {
            net: record.key.net.clone(),
            sta: record.key.sta.clone(),
            loc: record.key.wire_loc().to_string(),
            cha: record.key.channel_code(record.component),
            start: record.start,
            end: record.end,
            data: BASE64.encode(&record.payload),
        }
    }
}

/// One pick event on the wire. The channel code may carry an orientation
/// letter; only the band+instrument part identifies the sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickMsg {
    pub id: String,
    pub net: String,
    pub sta: String,
    #[serde(default)]
    pub loc: String,
    pub cha: String,
    pub time: DateTime<Utc>,
}

impl PickMsg {
    pub fn into_pick(self) -> Result<Pick> {
        let band = self
            .cha
            .get(..2)
            .ok_or_else(|| anyhow!("malformed channel code: {:?}", self.cha))?;
        Ok(Pick {
            id: self.id,
            key: StreamKey::new(self.net, self.sta, self.loc, band),
            time: self.time,
        })
    }
}

/// Channel selector used in subscriptions and queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRef {
    pub net: String,
    pub sta: String,
    #[serde(default)]
    pub loc: String,
    pub cha: String,
}

/// Sent once after connecting to the record feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeMsg {
    pub streams: Vec<ChannelRef>,
    /// How far back the feed should start replaying.
    pub start: DateTime<Utc>,
}

/// One time-bounded channel request inside an archive query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRef {
    pub net: String,
    pub sta: String,
    #[serde(default)]
    pub loc: String,
    pub cha: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WindowRef {
    pub fn from_query(query: &ArchiveQuery) -> Self {
        Self {
            net: query.key.net.clone(),
            sta: query.key.sta.clone(),
            loc: query.key.wire_loc().to_string(),
            cha: query.key.channel_code(query.component),
            start: query.window.start,
            end: query.window.end,
        }
    }
}

/// Sent once after connecting to the archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMsg {
    pub streams: Vec<WindowRef>,
}

/// Terminates an archive response stream.
pub const END_OF_DATA: &str = "END";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pickwave_core::Component;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn record_round_trips_through_the_wire_format() {
        let record = Record {
            key: StreamKey::new("GR", "FUR", "", "HH"),
            component: Component('Z'),
            start: t(0),
            end: t(60),
            payload: bytes::Bytes::from_static(b"\x01\x02\x03"),
        };
        let msg = RecordMsg::from_record(&record);
        assert_eq!(msg.loc, "");
        assert_eq!(msg.cha, "HHZ");

        let line = serde_json::to_string(&msg).unwrap();
        let parsed: RecordMsg = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.into_record().unwrap(), record);
    }

    #[test]
    fn record_with_inverted_times_is_rejected() {
        let msg = RecordMsg {
            net: "GR".into(),
            sta: "FUR".into(),
            loc: "".into(),
            cha: "HHZ".into(),
            start: t(60),
            end: t(0),
            data: BASE64.encode(b"x"),
        };
        assert!(msg.into_record().is_err());
    }

    #[test]
    fn record_with_a_bare_component_code_is_rejected() {
        let msg = RecordMsg {
            net: "GR".into(),
            sta: "FUR".into(),
            loc: "".into(),
            cha: "Z".into(),
            start: t(0),
            end: t(60),
            data: BASE64.encode(b"x"),
        };
        assert!(msg.into_record().is_err());
    }

    #[test]
    fn pick_channel_collapses_to_the_band_code() {
        let msg = PickMsg {
            id: "p1".into(),
            net: "GR".into(),
            sta: "FUR".into(),
            loc: "".into(),
            cha: "HHZ".into(),
            time: t(0),
        };
        let pick = msg.into_pick().unwrap();
        assert_eq!(pick.key, StreamKey::new("GR", "FUR", "", "HH"));
    }
}
