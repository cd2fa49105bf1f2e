//! Mission configuration
//!
//! Loaded from TOML. Every section and field has a default, so an empty file
//! is a valid configuration for the pickup mission:
//!
//! ```toml
//! phases = ["pickup", "finish"]
//!
//! [supervisor]
//! last_phase = 2
//!
//! [slots]
//! line_capacity = 20
//! upload = "padded"
//!
//! [marker]
//! on_reach = "rescan"
//!
//! [log]
//! filter = "info"
//! mission_log_dir = "."
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use robobot_mission_core::event::{ids, EventId, EVENT_CAPACITY};
use robobot_mission_core::phase::{
    FinishPhase, MarkerConfig, MarkerSeekPhase, Phase, PhaseId, PhaseRegistry, PickupConfig,
    PickupPhase, ReachPolicy,
};
use robobot_mission_core::slot::{SlotConfig, UploadMode};
use robobot_mission_core::snippet::{LineError, MissionLine, SNIPPET_MAX_LINES};
use robobot_mission_core::supervisor::{SupervisorConfig, IDLE_LINE};
use serde::Deserialize;

/// Errors from loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid mission line in [{field}]: {reason}")]
    Line { field: &'static str, reason: LineError },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Phase handler kinds selectable in `phases`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Pickup,
    Marker,
    Finish,
}

/// Configuration root.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub supervisor: SupervisorSection,
    pub slots: SlotsSection,
    pub pickup: PickupSection,
    pub marker: MarkerSection,
    /// Phase handlers in order, numbered from `supervisor.first_phase`
    pub phases: Vec<PhaseKind>,
    pub log: LogSection,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorSection::default(),
            slots: SlotsSection::default(),
            pickup: PickupSection::default(),
            marker: MarkerSection::default(),
            phases: vec![PhaseKind::Pickup, PhaseKind::Finish],
            log: LogSection::default(),
        }
    }
}

/// `[supervisor]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    pub first_phase: PhaseId,
    pub last_phase: PhaseId,
    pub poll_interval_ms: u32,
    pub heartbeat_checks: u32,
    pub heartbeat_retry_ms: u32,
    /// Heartbeats older than this do not count (ms)
    pub heartbeat_timeout_ms: u64,
    pub operator_go_event: EventId,
    pub all_stop_event: EventId,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        let d = SupervisorConfig::default();
        Self {
            first_phase: d.first_phase,
            last_phase: d.last_phase,
            poll_interval_ms: d.poll_interval_ms,
            heartbeat_checks: d.heartbeat_checks,
            heartbeat_retry_ms: d.heartbeat_retry_ms,
            heartbeat_timeout_ms: 1000,
            operator_go_event: d.operator_go_event,
            all_stop_event: d.all_stop_event,
        }
    }
}

/// Upload mode as written in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    #[default]
    Padded,
    Modify,
}

impl From<UploadKind> for UploadMode {
    fn from(kind: UploadKind) -> Self {
        match kind {
            UploadKind::Padded => UploadMode::Padded,
            UploadKind::Modify => UploadMode::Modify,
        }
    }
}

/// `[slots]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SlotsSection {
    pub line_capacity: usize,
    pub settle_ms: u32,
    pub upload: UploadKind,
    pub noop_line: String,
    pub idle_line: String,
}

impl Default for SlotsSection {
    fn default() -> Self {
        let d = SlotConfig::default();
        Self {
            line_capacity: d.line_capacity,
            settle_ms: d.settle_ms,
            upload: UploadKind::Padded,
            noop_line: d.noop_line.as_str().to_string(),
            idle_line: IDLE_LINE.to_string(),
        }
    }
}

/// `[pickup]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PickupSection {
    pub speed: f32,
    pub accel: f32,
    pub servo: u8,
    pub servo_up: i32,
    pub servo_grip: i32,
    pub bump_distance: f32,
    pub reposition_distance: f32,
    pub crossing_threshold: f32,
    pub detect_max_mm: f32,
    pub standoff: f32,
    pub max_retries: u8,
    pub search_event_base: EventId,
    pub approach_event: EventId,
    pub detection_poll_limit: u32,
}

impl Default for PickupSection {
    fn default() -> Self {
        let d = PickupConfig::default();
        Self {
            speed: d.speed,
            accel: d.accel,
            servo: d.servo,
            servo_up: d.servo_up,
            servo_grip: d.servo_grip,
            bump_distance: d.bump_distance,
            reposition_distance: d.reposition_distance,
            crossing_threshold: d.crossing_threshold,
            detect_max_mm: d.detect_max_mm,
            standoff: d.standoff,
            max_retries: d.max_retries,
            search_event_base: d.search_event_base,
            approach_event: d.approach_event,
            detection_poll_limit: d.detection_poll_limit,
        }
    }
}

impl From<&PickupSection> for PickupConfig {
    fn from(s: &PickupSection) -> Self {
        PickupConfig {
            speed: s.speed,
            accel: s.accel,
            servo: s.servo,
            servo_up: s.servo_up,
            servo_grip: s.servo_grip,
            bump_distance: s.bump_distance,
            reposition_distance: s.reposition_distance,
            crossing_threshold: s.crossing_threshold,
            detect_max_mm: s.detect_max_mm,
            standoff: s.standoff,
            max_retries: s.max_retries,
            search_event_base: s.search_event_base,
            approach_event: s.approach_event,
            detection_poll_limit: s.detection_poll_limit,
        }
    }
}

/// Reach policy as written in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnReach {
    Rescan,
    #[default]
    Stop,
}

/// `[marker]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarkerSection {
    pub event: EventId,
    pub standoff: f32,
    pub min_move: f32,
    pub max_turns: u32,
    pub turn_step: f32,
    pub approach_speed: f32,
    pub detect_max_mm: f32,
    pub detection_poll_limit: u32,
    pub on_reach: OnReach,
    pub stop_identity: Option<u32>,
}

impl Default for MarkerSection {
    fn default() -> Self {
        let d = MarkerConfig::default();
        Self {
            event: d.event,
            standoff: d.standoff,
            min_move: d.min_move,
            max_turns: d.max_turns,
            turn_step: d.turn_step,
            approach_speed: d.approach_speed,
            detect_max_mm: d.detect_max_mm,
            detection_poll_limit: d.detection_poll_limit,
            on_reach: OnReach::Stop,
            stop_identity: d.stop_identity,
        }
    }
}

impl From<&MarkerSection> for MarkerConfig {
    fn from(s: &MarkerSection) -> Self {
        MarkerConfig {
            event: s.event,
            standoff: s.standoff,
            min_move: s.min_move,
            max_turns: s.max_turns,
            turn_step: s.turn_step,
            approach_speed: s.approach_speed,
            detect_max_mm: s.detect_max_mm,
            detection_poll_limit: s.detection_poll_limit,
            on_reach: match s.on_reach {
                OnReach::Rescan => ReachPolicy::Rescan,
                OnReach::Stop => ReachPolicy::Stop,
            },
            stop_identity: s.stop_identity,
            ..MarkerConfig::default()
        }
    }
}

/// `[log]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Default tracing filter; `RUST_LOG` wins when set
    pub filter: String,
    /// Directory for `log_mission_<date>.txt`; no file when unset
    pub mission_log_dir: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            mission_log_dir: None,
        }
    }
}

impl MissionConfig {
    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.supervisor;
        if s.last_phase < s.first_phase {
            return Err(ConfigError::Invalid(format!(
                "last_phase {} is before first_phase {}",
                s.last_phase, s.first_phase
            )));
        }
        if self.slots.line_capacity == 0 || self.slots.line_capacity > SNIPPET_MAX_LINES {
            return Err(ConfigError::Invalid(format!(
                "line_capacity must be 1..={}, got {}",
                SNIPPET_MAX_LINES, self.slots.line_capacity
            )));
        }
        if s.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        self.line("slots.noop_line", &self.slots.noop_line)?;
        self.line("slots.idle_line", &self.slots.idle_line)?;

        let mut owners: BTreeMap<EventId, &'static str> = BTreeMap::new();
        for (id, owner) in self.event_ids() {
            if usize::from(id) >= EVENT_CAPACITY {
                return Err(ConfigError::Invalid(format!(
                    "{} event {} is out of range (max {})",
                    owner,
                    id,
                    EVENT_CAPACITY - 1
                )));
            }
            if let Some(other) = owners.insert(id, owner) {
                return Err(ConfigError::Invalid(format!(
                    "event {} is used by both {} and {}",
                    id, other, owner
                )));
            }
        }
        Ok(())
    }

    /// Every event id in use, with its owner.
    fn event_ids(&self) -> Vec<(EventId, &'static str)> {
        let mut used = vec![
            (self.supervisor.all_stop_event, "all-stop"),
            (self.supervisor.operator_go_event, "operator go"),
            (ids::SLOT_A_START, "slot A"),
            (ids::SLOT_B_START, "slot B"),
        ];
        if self.phases.contains(&PhaseKind::Pickup) {
            let pickup = PickupConfig::from(&self.pickup);
            used.extend(pickup.event_ids().map(|id| (id, "pickup")));
        }
        if self.phases.contains(&PhaseKind::Marker) {
            used.push((self.marker.event, "marker"));
        }
        used
    }

    fn line(&self, field: &'static str, text: &str) -> Result<MissionLine, ConfigError> {
        MissionLine::new(text).map_err(|reason| ConfigError::Line { field, reason })
    }

    pub fn supervisor_config(&self) -> Result<SupervisorConfig, ConfigError> {
        let s = &self.supervisor;
        Ok(SupervisorConfig {
            first_phase: s.first_phase,
            last_phase: s.last_phase,
            poll_interval_ms: s.poll_interval_ms,
            heartbeat_checks: s.heartbeat_checks,
            heartbeat_retry_ms: s.heartbeat_retry_ms,
            operator_go_event: s.operator_go_event,
            all_stop_event: s.all_stop_event,
            idle_line: self.line("slots.idle_line", &self.slots.idle_line)?,
            ..SupervisorConfig::default()
        })
    }

    /// Age after which a controller heartbeat no longer counts.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.supervisor.heartbeat_timeout_ms)
    }

    pub fn slot_config(&self) -> Result<SlotConfig, ConfigError> {
        Ok(SlotConfig {
            line_capacity: self.slots.line_capacity,
            settle_ms: self.slots.settle_ms,
            upload: self.slots.upload.into(),
            noop_line: self.line("slots.noop_line", &self.slots.noop_line)?,
            ..SlotConfig::default()
        })
    }

    /// Phase handlers numbered from `first_phase`.
    pub fn build_registry(&self) -> PhaseRegistry {
        let phases = self.phases.iter().map(|kind| -> Box<dyn Phase> {
            match kind {
                PhaseKind::Pickup => Box::new(PickupPhase::new(PickupConfig::from(&self.pickup))),
                PhaseKind::Marker => {
                    Box::new(MarkerSeekPhase::new(MarkerConfig::from(&self.marker)))
                }
                PhaseKind::Finish => Box::new(FinishPhase::new()),
            }
        });
        PhaseRegistry::from_sequence(self.supervisor.first_phase, phases)
    }
}
