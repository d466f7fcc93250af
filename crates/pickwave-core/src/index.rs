//! Pending acquisition requests, indexed by pick identity and stream key.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::error::EngineError;
use crate::types::{Component, Pick, Record, StreamKey, TimeWindow};

/// One outstanding waveform request born from a pick event.
///
/// The request is owned by the [`RequestIndex`] from creation until
/// retirement; archive dispatch works on a clone so the index stays the
/// single owner.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub pick: Pick,
    /// Required orientation components, copied from the inventory at
    /// creation time and fixed for the life of the request.
    pub components: Vec<Component>,
    pub window: TimeWindow,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub finished: bool,
    /// Records overlapping the window per component, attached on completion.
    pub data: HashMap<Component, Vec<Record>>,
}

impl PendingRequest {
    pub fn new(
        pick: Pick,
        components: Vec<Component>,
        window: TimeWindow,
        expire_after: Duration,
    ) -> Self {
        let created = Utc::now();
        Self {
            pick,
            components,
            window,
            created,
            expires: created + expire_after,
            finished: false,
            data: HashMap::new(),
        }
    }

    pub fn key(&self) -> &StreamKey {
        &self.pick.key
    }

    /// Required components that have no records attached.
    pub fn missing_components(&self) -> Vec<Component> {
        self.components
            .iter()
            .copied()
            .filter(|c| self.data.get(c).map_or(true, Vec::is_empty))
            .collect()
    }
}

/// Pending requests reachable by pick identity (unique) and by the stream
/// key they target (one-to-many, registration order preserved).
#[derive(Debug, Default)]
pub struct RequestIndex {
    by_pick: HashMap<String, PendingRequest>,
    by_key: HashMap<StreamKey, Vec<String>>,
}

impl RequestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert into both mappings. Re-delivery of a known pick identity is
    /// rejected and the existing request kept untouched.
    pub fn register(&mut self, request: PendingRequest) -> Result<(), EngineError> {
        if self.by_pick.contains_key(&request.pick.id) {
            return Err(EngineError::DuplicatePick(request.pick.id.clone()));
        }
        self.by_key
            .entry(request.key().clone())
            .or_default()
            .push(request.pick.id.clone());
        self.by_pick.insert(request.pick.id.clone(), request);
        self.assert_counts();
        Ok(())
    }

    /// Remove from both mappings. The archive completion path treats
    /// `NotFound` as "someone else finished first"; anywhere else it is a
    /// defect.
    pub fn retire(&mut self, pick_id: &str) -> Result<PendingRequest, EngineError> {
        let request = self
            .by_pick
            .remove(pick_id)
            .ok_or_else(|| EngineError::NotFound(pick_id.to_string()))?;
        let key = request.key().clone();
        if let Some(ids) = self.by_key.get_mut(&key) {
            ids.retain(|id| id != pick_id);
            if ids.is_empty() {
                self.by_key.remove(&key);
            }
        }
        self.assert_counts();
        Ok(request)
    }

    pub fn get(&self, pick_id: &str) -> Option<&PendingRequest> {
        self.by_pick.get(pick_id)
    }

    /// Pick identities currently targeting the key, in registration order.
    pub fn ids_for_key(&self, key: &StreamKey) -> Vec<String> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.by_pick.values()
    }

    pub fn len(&self) -> usize {
        self.by_pick.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pick.is_empty()
    }

    /// Both mappings must account for exactly the same requests; a mismatch
    /// signals accounting corruption, not expected data loss.
    fn assert_counts(&self) {
        debug_assert_eq!(
            self.by_pick.len(),
            self.by_key.values().map(Vec::len).sum::<usize>()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn request(id: &str, sta: &str) -> PendingRequest {
        let key = StreamKey::new("GR", sta, "", "HH");
        PendingRequest::new(
            Pick {
                id: id.to_string(),
                key,
                time: t(1000),
            },
            vec![Component('Z'), Component('N'), Component('E')],
            TimeWindow {
                start: t(880),
                end: t(1240),
            },
            Duration::seconds(1800),
        )
    }

    #[test]
    fn register_and_retire_keep_both_mappings_in_step() {
        let mut index = RequestIndex::new();
        index.register(request("p1", "FUR")).unwrap();
        index.register(request("p2", "FUR")).unwrap();
        index.register(request("p3", "WET")).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.ids_for_key(&StreamKey::new("GR", "FUR", "", "HH")), ["p1", "p2"]);

        let retired = index.retire("p1").unwrap();
        assert_eq!(retired.pick.id, "p1");
        assert_eq!(index.len(), 2);
        assert_eq!(index.ids_for_key(&StreamKey::new("GR", "FUR", "", "HH")), ["p2"]);

        index.retire("p2").unwrap();
        assert!(index.ids_for_key(&StreamKey::new("GR", "FUR", "", "HH")).is_empty());
    }

    #[test]
    fn duplicate_pick_is_rejected_and_the_original_kept() {
        let mut index = RequestIndex::new();
        index.register(request("p1", "FUR")).unwrap();

        let err = index.register(request("p1", "FUR")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicatePick(id) if id == "p1"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.ids_for_key(&StreamKey::new("GR", "FUR", "", "HH")).len(), 1);
    }

    #[test]
    fn retiring_an_unknown_pick_fails() {
        let mut index = RequestIndex::new();
        let err = index.retire("nope").unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn missing_components_reports_empty_and_absent_entries() {
        let mut req = request("p1", "FUR");
        req.data.insert(Component('Z'), vec![]);
        assert_eq!(
            req.missing_components(),
            vec![Component('Z'), Component('N'), Component('E')]
        );
    }
}
