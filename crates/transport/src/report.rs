//! Wire-shaped aggregates the IO bridge ships outbound: the deduplicated
//! anomaly report sent to the regulator, and the merged dashboard report
//! sent in reply to a query.

use std::collections::{BTreeMap, BTreeSet};

use protocol::{AlertKind, AlertRecord, InstanceId, InstanceKey, InstanceKind, QueryResultEntry, Zone};

/// The deduplicated id lists for one zone/kind combination:
/// `{switchIDList, serverIDList, linkIDList}` in the original wire shape.
/// Backed by `BTreeSet`s so every id list is both deduplicated and sorted,
/// satisfying "ids in a shipped anomaly report are unique within their
/// list" for free.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdLists {
    /// Switch ids flagged in this zone/kind.
    pub switch_ids: BTreeSet<u64>,
    /// Server ids flagged in this zone/kind.
    pub server_ids: BTreeSet<u64>,
    /// Link ids flagged in this zone/kind.
    pub link_ids: BTreeSet<(u64, u64)>,
}

impl IdLists {
    fn is_empty(&self) -> bool {
        self.switch_ids.is_empty() && self.server_ids.is_empty() && self.link_ids.is_empty()
    }

    fn insert(&mut self, alert: &AlertRecord) {
        if let Some(id) = alert.switch_id {
            let _ = self.switch_ids.insert(id);
        }
        if let Some(id) = alert.server_id {
            let _ = self.server_ids.insert(id);
        }
        if let Some(id) = alert.link_id {
            let _ = self.link_ids.insert(id);
        }
    }
}

/// Failure and abnormal id lists for a single zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneDetection {
    /// Instances that reported themselves inactive.
    pub failure: IdLists,
    /// Instances flagged by a metric rule.
    pub abnormal: IdLists,
}

/// The deduplicated anomaly report shipped to the regulator, built by
/// merging every `AlertRecord` drained from the `anom` channel since the
/// last shipment. Mirrors the original's
/// `{allZoneDetectionDict: {zone: {failure|abnormal: {switchIDList,
/// serverIDList, linkIDList}}}}` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnomalyReport {
    all_zone_detection_dict: BTreeMap<Zone, ZoneDetection>,
}

impl AnomalyReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one alert into the report, merging it into the id lists for
    /// its zone and kind.
    pub fn record(&mut self, alert: AlertRecord) {
        let zone_detection = self.all_zone_detection_dict.entry(alert.zone).or_default();
        let lists = match alert.kind {
            AlertKind::Failure => &mut zone_detection.failure,
            AlertKind::Abnormal => &mut zone_detection.abnormal,
        };
        lists.insert(&alert);
    }

    /// Returns true if every zone's id lists are empty. An empty report is
    /// elided from the wire rather than shipped.
    pub fn is_empty(&self) -> bool {
        self.all_zone_detection_dict.values().all(|zd| zd.failure.is_empty() && zd.abnormal.is_empty())
    }

    /// Iterates the per-zone detections carried by this report.
    pub fn zones(&self) -> impl Iterator<Item = (&Zone, &ZoneDetection)> {
        self.all_zone_detection_dict.iter()
    }
}

/// One instance's merged answer in a dashboard reply: its last payload and
/// current abnormal/failure flags, the same shape as `QueryResultEntry`.
pub type DashboardEntry = QueryResultEntry;

/// The merged `{Zone -> InstanceKind -> Id -> DashboardEntry}` report sent
/// back to the dashboard once every worker has answered a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardReport {
    entries: BTreeMap<Zone, BTreeMap<InstanceKind, BTreeMap<InstanceId, DashboardEntry>>>,
}

impl DashboardReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one instance's merged entry into the report.
    pub fn insert(&mut self, key: InstanceKey, entry: DashboardEntry) {
        let _ = self.entries.entry(key.zone).or_default().entry(key.kind).or_default().insert(key.id, entry);
    }

    /// Returns true if no instance was merged into this report.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|by_kind| by_kind.values().all(|by_id| by_id.is_empty()))
    }

    /// Iterates the per-zone, per-kind entries carried by this report.
    pub fn zones(&self) -> impl Iterator<Item = (&Zone, &BTreeMap<InstanceKind, BTreeMap<InstanceId, DashboardEntry>>)> {
        self.entries.iter()
    }
}
