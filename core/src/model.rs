//! Wire model: everything the simulation service sends us.
//!
//! Shapes follow the service's JSON schemas exactly. Ticks, runs and
//! scenarios are immutable once decoded; the view only ever replaces
//! them wholesale.

use crate::types::{GridPosition, RunId, ScenarioId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cell key (`"x:y"`) → cumulative visit count.
/// Ordered so that iteration, and therefore rendering, is deterministic.
pub type Heatmap = BTreeMap<String, u64>;

// ── Stage ──────────────────────────────────────────────────────────

/// Run lifecycle. Ordered and non-revisitable:
/// `Queued → WarmingUp → Running → {Completed | Failed | Cancelled}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStage {
    Queued,
    WarmingUp,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStage {
    /// Terminal stages are absorbing: no more ticks, no stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Position in the lifecycle. All terminal stages share the last rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::Queued    => 0,
            Self::WarmingUp => 1,
            Self::Running   => 2,
            Self::Completed | Self::Failed | Self::Cancelled => 3,
        }
    }

    /// Whether a push stream may be opened for a run last seen in `stage`.
    /// An unobserved stage (`None`) is optimistic.
    pub fn allows_stream(stage: Option<RunStage>) -> bool {
        matches!(stage, None | Some(Self::WarmingUp) | Some(Self::Running))
    }

    /// Merge a newly observed stage into a known one without ever moving
    /// backwards. Once terminal, the known stage sticks.
    pub fn advance(known: RunStage, observed: RunStage) -> RunStage {
        if known.is_terminal() || observed.rank() < known.rank() {
            known
        } else {
            observed
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Queued    => "QUEUED",
            Self::WarmingUp => "WARMING_UP",
            Self::Running   => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed    => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

// ── Layout and entities ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layout {
    pub width:          u32,
    pub height:         u32,
    pub cell_size:      u32,
    #[serde(default)]
    pub obstacles:      Vec<GridPosition>,
    #[serde(default)]
    pub pickup_zones:   Vec<GridPosition>,
    #[serde(default)]
    pub dropoff_zones:  Vec<GridPosition>,
    #[serde(default)]
    pub charging_zones: Vec<GridPosition>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Queued,
    Assigned,
    InTransit,
    Delivered,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub id:             String,
    pub position:       GridPosition,
    pub status:         PackageStatus,
    #[serde(default)]
    pub assigned_robot: Option<String>,
    #[serde(with = "wire_time")]
    pub created_at:     DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotState {
    Idle,
    Fetching,
    Delivering,
    Faulted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Robot {
    pub robot_id:      String,
    pub state:         RobotState,
    pub position:      GridPosition,
    #[serde(default = "full_battery")]
    pub battery_level: f64,
    #[serde(default)]
    pub current_job:   Option<String>,
    /// Planned path, next cell first. May be empty.
    #[serde(default)]
    pub path:          Vec<GridPosition>,
}

fn full_battery() -> f64 {
    1.0
}

/// A time-bounded claim on a cell. Rendered, never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub robot_id:   String,
    pub position:   GridPosition,
    #[serde(with = "wire_time")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationState {
    #[serde(default)]
    pub packages:     Vec<Package>,
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    #[serde(default)]
    pub robots:       Vec<Robot>,
    pub layout:       Layout,
}

// ── Metrics and events ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunMetrics {
    pub throughput_per_hour:        f64,
    pub sla_breaches:               u64,
    pub average_cycle_time_seconds: f64,
    pub active_robots:              u64,
    pub utilization:                f64,
    pub fault_ratio:                f64,
    pub queue_depth:                u64,
    pub delivered:                  u64,
    pub spawned:                    u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    #[serde(with = "wire_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind:      String,
    pub message:   String,
    /// Opaque to the client; shown verbatim.
    #[serde(default)]
    pub payload:   serde_json::Map<String, serde_json::Value>,
}

// ── Tick ───────────────────────────────────────────────────────────

/// One pushed simulation snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub stage:           RunStage,
    pub elapsed_seconds: f64,
    pub state:           SimulationState,
    #[serde(default)]
    pub metrics:         RunMetrics,
    #[serde(default)]
    pub heatmap:         Heatmap,
    #[serde(default)]
    pub recent_events:   Vec<TimelineEvent>,
}

impl Tick {
    /// Decode one stream message.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ── Runs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id:           RunId,
    pub scenario_id:  ScenarioId,
    pub stage:        RunStage,
    #[serde(with = "wire_time")]
    pub created_at:   DateTime<Utc>,
    #[serde(default, with = "wire_time::option")]
    pub started_at:   Option<DateTime<Utc>>,
    #[serde(default, with = "wire_time::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics:      RunMetrics,
    #[serde(default)]
    pub heatmap:      Heatmap,
    #[serde(default)]
    pub error:        Option<String>,
}

/// `GET /scenarios/runs/{id}`: the run plus its last snapshot and stored timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunDetail {
    #[serde(flatten)]
    pub run:      Run,
    #[serde(default)]
    pub state:    Option<SimulationState>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

// ── Scenarios ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetClass {
    pub name:                     String,
    pub speed_cells_per_tick:     f64,
    pub payload_capacity:         u32,
    pub battery_capacity_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetProfile {
    pub total_robots:       u32,
    #[serde(default)]
    pub classes:            Vec<FleetClass>,
    #[serde(default)]
    pub starting_positions: Vec<GridPosition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemandProfile {
    pub packages_per_hour: f64,
    #[serde(default)]
    pub priority_mix:      BTreeMap<String, f64>,
    #[serde(default)]
    pub sla_minutes:       BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationsProfile {
    pub shift_minutes:  u32,
    pub cadence_ms:     u32,
    pub warmup_minutes: u32,
    pub time_scale:     f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureProfile {
    pub fault_probability_per_hour: f64,
    pub mean_recovery_minutes:      f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationProfile {
    pub planner:             String,
    pub assignment_policy:   String,
    pub reservation_horizon: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HorizonProfile {
    pub duration_minutes:   u32,
    #[serde(default)]
    pub stop_on_completion: bool,
}

/// Body of `POST /scenarios/` and the `config` of every listed scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioConfig {
    pub name:         String,
    pub description:  String,
    pub layout:       Layout,
    pub fleet:        FleetProfile,
    pub demand:       DemandProfile,
    pub operations:   OperationsProfile,
    pub failures:     FailureProfile,
    pub optimization: OptimizationProfile,
    pub horizon:      HorizonProfile,
    #[serde(default)]
    pub metadata:     serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id:         ScenarioId,
    #[serde(with = "wire_time")]
    pub created_at: DateTime<Utc>,
    pub config:     ScenarioConfig,
}

// ── Timestamps ─────────────────────────────────────────────────────

/// The service emits naive UTC timestamps (`2024-05-01T10:00:00.123456`)
/// as well as RFC 3339 ones. Accept both; always write RFC 3339.
pub(crate) mod wire_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_service_timestamps_are_read_as_utc() {
        let parsed = wire_time::parse("2024-05-01T10:00:00.123456").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T10:00:00.123456+00:00");
        assert!(wire_time::parse("2024-05-01T10:00:00Z").is_some());
        assert!(wire_time::parse("yesterday").is_none());
    }

    #[test]
    fn stage_never_regresses() {
        use RunStage::*;
        assert_eq!(RunStage::advance(Running, WarmingUp), Running);
        assert_eq!(RunStage::advance(WarmingUp, Running), Running);
        assert_eq!(RunStage::advance(Completed, Running), Completed);
        assert_eq!(RunStage::advance(Cancelled, Failed), Cancelled);
        assert_eq!(RunStage::advance(Running, Failed), Failed);
    }

    #[test]
    fn stream_is_allowed_only_for_unknown_or_live_stages() {
        assert!(RunStage::allows_stream(None));
        assert!(RunStage::allows_stream(Some(RunStage::WarmingUp)));
        assert!(RunStage::allows_stream(Some(RunStage::Running)));
        assert!(!RunStage::allows_stream(Some(RunStage::Queued)));
        assert!(!RunStage::allows_stream(Some(RunStage::Completed)));
        assert!(!RunStage::allows_stream(Some(RunStage::Failed)));
        assert!(!RunStage::allows_stream(Some(RunStage::Cancelled)));
    }
}
