//! Command dispatcher.
//!
//! Maps an operation name plus a JSON payload to a typed [`Operation`],
//! validates it, and routes it either to the [`GroupCoordinator`] or to a
//! per-device call on every addressed handle.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::group_coordinator::GroupCoordinator;
use crate::device::{DeviceHandle, DeviceRegistry, RawOffsets, Selection};
use crate::error::{DeviceFailure, LinkPlayError, LinkPlayResult};
use crate::linkplay::DeviceResult;
use crate::state::Config;

// ─────────────────────────────────────────────────────────────────────────────
// Operation kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Every operation the dispatcher accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Join,
    Unjoin,
    PlayPreset,
    Command,
    Snapshot,
    Restore,
    PlayTrack,
    SetGroupVolume,
    VolumeUp,
    VolumeDown,
}

impl OperationKind {
    pub const ALL: [OperationKind; 10] = [
        Self::Join,
        Self::Unjoin,
        Self::PlayPreset,
        Self::Command,
        Self::Snapshot,
        Self::Restore,
        Self::PlayTrack,
        Self::SetGroupVolume,
        Self::VolumeUp,
        Self::VolumeDown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Unjoin => "unjoin",
            Self::PlayPreset => "play_preset",
            Self::Command => "command",
            Self::Snapshot => "snapshot",
            Self::Restore => "restore",
            Self::PlayTrack => "play_track",
            Self::SetGroupVolume => "set_group_volume",
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = LinkPlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preset" => Ok(Self::PlayPreset),
            _ => Self::ALL
                .into_iter()
                .find(|kind| kind.as_str() == s)
                .ok_or_else(|| LinkPlayError::UnknownOperation(s.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Checks that serde cannot express (ranges, non-empty strings).
trait Validate {
    fn validate(&self) -> LinkPlayResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinPayload {
    #[serde(alias = "entity_id")]
    pub target_ids: Selection,
    #[serde(alias = "master")]
    pub leader_id: String,
}

impl Validate for JoinPayload {
    fn validate(&self) -> LinkPlayResult<()> {
        non_empty("leader_id", &self.leader_id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetPayload {
    #[serde(alias = "entity_id")]
    pub target_ids: Selection,
}

impl Validate for TargetPayload {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetPayload {
    #[serde(alias = "entity_id")]
    pub target_ids: Selection,
    #[serde(alias = "preset")]
    pub preset_number: u32,
}

impl Validate for PresetPayload {
    fn validate(&self) -> LinkPlayResult<()> {
        if self.preset_number == 0 {
            return Err(LinkPlayError::InvalidRequest(
                "preset_number must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandPayload {
    #[serde(alias = "entity_id")]
    pub target_ids: Selection,
    pub command: String,
    #[serde(default = "default_true")]
    pub notify: bool,
}

impl Validate for CommandPayload {
    fn validate(&self) -> LinkPlayResult<()> {
        non_empty("command", &self.command)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotPayload {
    #[serde(alias = "entity_id")]
    pub target_ids: Selection,
    #[serde(default = "default_true", alias = "switchinput")]
    pub switch_input: bool,
}

impl Validate for SnapshotPayload {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayTrackPayload {
    #[serde(alias = "entity_id")]
    pub target_id: String,
    /// Already-rendered track URL. Template rendering is the caller's job;
    /// the value is only trimmed before it is sent.
    pub track: String,
}

impl Validate for PlayTrackPayload {
    fn validate(&self) -> LinkPlayResult<()> {
        non_empty("target_id", &self.target_id)?;
        non_empty("track", &self.track)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupVolumePayload {
    #[serde(alias = "entity_id")]
    pub addressed_id: String,
    pub volume: f64,
    #[serde(default)]
    pub volume_offsets: RawOffsets,
}

impl Validate for GroupVolumePayload {
    fn validate(&self) -> LinkPlayResult<()> {
        non_empty("addressed_id", &self.addressed_id)?;
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(LinkPlayError::InvalidRequest(format!(
                "volume must be between 0.0 and 1.0, got {}",
                self.volume
            )));
        }
        Ok(())
    }
}

fn non_empty(field: &str, value: &str) -> LinkPlayResult<()> {
    if value.trim().is_empty() {
        return Err(LinkPlayError::InvalidRequest(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

fn parse_payload<T>(kind: OperationKind, payload: Value) -> LinkPlayResult<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(payload)
        .map_err(|e| LinkPlayError::InvalidRequest(format!("{}: {}", kind, e)))?;
    parsed.validate()?;
    Ok(parsed)
}

/// A validated operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Join(JoinPayload),
    Unjoin(TargetPayload),
    PlayPreset(PresetPayload),
    Command(CommandPayload),
    Snapshot(SnapshotPayload),
    Restore(TargetPayload),
    PlayTrack(PlayTrackPayload),
    SetGroupVolume(GroupVolumePayload),
    VolumeUp(TargetPayload),
    VolumeDown(TargetPayload),
}

impl Operation {
    /// Parses and validates the payload for `kind`.
    pub fn parse(kind: OperationKind, payload: Value) -> LinkPlayResult<Self> {
        Ok(match kind {
            OperationKind::Join => Self::Join(parse_payload(kind, payload)?),
            OperationKind::Unjoin => Self::Unjoin(parse_payload(kind, payload)?),
            OperationKind::PlayPreset => Self::PlayPreset(parse_payload(kind, payload)?),
            OperationKind::Command => Self::Command(parse_payload(kind, payload)?),
            OperationKind::Snapshot => Self::Snapshot(parse_payload(kind, payload)?),
            OperationKind::Restore => Self::Restore(parse_payload(kind, payload)?),
            OperationKind::PlayTrack => Self::PlayTrack(parse_payload(kind, payload)?),
            OperationKind::SetGroupVolume => Self::SetGroupVolume(parse_payload(kind, payload)?),
            OperationKind::VolumeUp => Self::VolumeUp(parse_payload(kind, payload)?),
            OperationKind::VolumeDown => Self::VolumeDown(parse_payload(kind, payload)?),
        })
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Join(_) => OperationKind::Join,
            Self::Unjoin(_) => OperationKind::Unjoin,
            Self::PlayPreset(_) => OperationKind::PlayPreset,
            Self::Command(_) => OperationKind::Command,
            Self::Snapshot(_) => OperationKind::Snapshot,
            Self::Restore(_) => OperationKind::Restore,
            Self::PlayTrack(_) => OperationKind::PlayTrack,
            Self::SetGroupVolume(_) => OperationKind::SetGroupVolume,
            Self::VolumeUp(_) => OperationKind::VolumeUp,
            Self::VolumeDown(_) => OperationKind::VolumeDown,
        }
    }
}

/// Per-device action for fan-out operations.
#[derive(Debug, Clone, Copy)]
enum DeviceAction<'a> {
    Preset(u32),
    Command { command: &'a str, notify: bool },
    Snapshot { switch_input: bool },
    Restore,
    VolumeUp,
    VolumeDown,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Routes operations to the coordinator or to individual devices.
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    coordinator: GroupCoordinator,
}

impl Dispatcher {
    pub fn new(registry: Arc<DeviceRegistry>, config: &Config) -> Self {
        let coordinator = GroupCoordinator::new(Arc::clone(&registry), config);
        Self {
            registry,
            coordinator,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &GroupCoordinator {
        &self.coordinator
    }

    /// Parses `name` and `payload`, then executes the operation.
    pub async fn dispatch(&self, name: &str, payload: Value) -> LinkPlayResult<()> {
        let kind: OperationKind = name.parse()?;
        let operation = Operation::parse(kind, payload)?;
        self.execute(operation).await
    }

    /// Executes an already validated operation.
    pub async fn execute(&self, operation: Operation) -> LinkPlayResult<()> {
        log::debug!("[Dispatcher] Executing {}", operation.kind());

        match operation {
            Operation::Join(p) => self.coordinator.join(&p.leader_id, &p.target_ids).await,
            Operation::Unjoin(p) => self.coordinator.unjoin(&p.target_ids).await,
            Operation::SetGroupVolume(p) => {
                self.coordinator
                    .set_group_volume(&p.addressed_id, p.volume, &p.volume_offsets)
                    .await
            }
            Operation::PlayTrack(p) => {
                let Some(device) = self.registry.find_one(&p.target_id) else {
                    log::warn!("[Dispatcher] play_track skipped: {} not found", p.target_id);
                    return Ok(());
                };
                device.play_track(p.track.trim()).await.map_err(|e| {
                    LinkPlayError::DeviceCalls(vec![DeviceFailure::new(device.id(), &e)])
                })
            }
            Operation::PlayPreset(p) => {
                self.fan_out(&p.target_ids, DeviceAction::Preset(p.preset_number))
                    .await
            }
            Operation::Command(p) => {
                let action = DeviceAction::Command {
                    command: &p.command,
                    notify: p.notify,
                };
                self.fan_out(&p.target_ids, action).await
            }
            Operation::Snapshot(p) => {
                let action = DeviceAction::Snapshot {
                    switch_input: p.switch_input,
                };
                self.fan_out(&p.target_ids, action).await
            }
            Operation::Restore(p) => self.fan_out(&p.target_ids, DeviceAction::Restore).await,
            Operation::VolumeUp(p) => self.fan_out(&p.target_ids, DeviceAction::VolumeUp).await,
            Operation::VolumeDown(p) => {
                self.fan_out(&p.target_ids, DeviceAction::VolumeDown).await
            }
        }
    }

    /// Applies `action` to every selected device in resolution order.
    async fn fan_out(&self, selection: &Selection, action: DeviceAction<'_>) -> LinkPlayResult<()> {
        let devices = self.registry.resolve(selection);
        if devices.is_empty() {
            log::warn!("[Dispatcher] No registered device matches {:?}", selection);
            return Ok(());
        }

        let mut failures = Vec::new();
        for device in &devices {
            log::debug!("[Dispatcher] {:?} -> {}", action, device.id());
            if let Err(e) = Self::apply(device, action).await {
                log::warn!("[Dispatcher] {:?} failed on {}: {}", action, device.id(), e);
                failures.push(DeviceFailure::new(device.id(), &e));
            }
        }
        LinkPlayError::from_failures(failures)
    }

    async fn apply(device: &DeviceHandle, action: DeviceAction<'_>) -> DeviceResult<()> {
        match action {
            DeviceAction::Preset(number) => device.preset(number).await,
            DeviceAction::Command { command, notify } => {
                let response = device.execute_command(command).await?;
                if notify {
                    log::info!(
                        "[Dispatcher] {} replied to {:?}: {}",
                        device.id(),
                        command,
                        response
                    );
                } else {
                    log::debug!(
                        "[Dispatcher] {} replied to {:?}: {}",
                        device.id(),
                        command,
                        response
                    );
                }
                Ok(())
            }
            DeviceAction::Snapshot { switch_input } => device.snapshot(switch_input).await,
            DeviceAction::Restore => device.restore().await,
            DeviceAction::VolumeUp => device.volume_up().await,
            DeviceAction::VolumeDown => device.volume_down().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::handle::test_support::{device, RecordingTransport};
    use crate::device::OffsetValue;
    use serde_json::json;

    fn dispatcher(ids: &[&str]) -> (Arc<RecordingTransport>, Dispatcher) {
        let transport = Arc::new(RecordingTransport::default());
        let registry = Arc::new(DeviceRegistry::new());
        for id in ids {
            registry.register(device(id, &transport));
        }
        (transport, Dispatcher::new(registry, &Config::default()))
    }

    #[test]
    fn operation_names_round_trip() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
        assert_eq!(
            "preset".parse::<OperationKind>().unwrap(),
            OperationKind::PlayPreset
        );
        assert!(matches!(
            "reboot".parse::<OperationKind>(),
            Err(LinkPlayError::UnknownOperation(_))
        ));
    }

    #[test]
    fn join_payload_accepts_original_field_names() {
        let op = Operation::parse(
            OperationKind::Join,
            json!({"entity_id": ["b", "c"], "master": "a"}),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::Join(JoinPayload {
                target_ids: Selection::ids(["b", "c"]),
                leader_id: "a".into(),
            })
        );
    }

    #[test]
    fn missing_and_unknown_fields_are_invalid() {
        let err = Operation::parse(OperationKind::Join, json!({"target_ids": "all"})).unwrap_err();
        assert!(matches!(err, LinkPlayError::InvalidRequest(_)));

        let err = Operation::parse(
            OperationKind::Unjoin,
            json!({"target_ids": "all", "force": true}),
        )
        .unwrap_err();
        assert!(matches!(err, LinkPlayError::InvalidRequest(_)));
    }

    #[test]
    fn defaults_are_applied() {
        let op = Operation::parse(
            OperationKind::Command,
            json!({"target_ids": "den", "command": "reboot"}),
        )
        .unwrap();
        let Operation::Command(p) = op else {
            panic!("expected command");
        };
        assert!(p.notify);

        let op = Operation::parse(OperationKind::Snapshot, json!({"target_ids": "all"})).unwrap();
        let Operation::Snapshot(p) = op else {
            panic!("expected snapshot");
        };
        assert!(p.switch_input);

        let op = Operation::parse(
            OperationKind::Snapshot,
            json!({"target_ids": "all", "switchinput": false}),
        )
        .unwrap();
        let Operation::Snapshot(p) = op else {
            panic!("expected snapshot");
        };
        assert!(!p.switch_input);
    }

    #[test]
    fn ranges_are_validated() {
        for payload in [
            json!({"addressed_id": "a", "volume": 1.2}),
            json!({"addressed_id": "a", "volume": -0.1}),
            json!({"addressed_id": "", "volume": 0.5}),
        ] {
            let err = Operation::parse(OperationKind::SetGroupVolume, payload).unwrap_err();
            assert!(matches!(err, LinkPlayError::InvalidRequest(_)));
        }

        let err = Operation::parse(
            OperationKind::PlayPreset,
            json!({"target_ids": "a", "preset_number": 0}),
        )
        .unwrap_err();
        assert!(matches!(err, LinkPlayError::InvalidRequest(_)));

        let err = Operation::parse(
            OperationKind::PlayPreset,
            json!({"target_ids": "a", "preset_number": -2}),
        )
        .unwrap_err();
        assert!(matches!(err, LinkPlayError::InvalidRequest(_)));

        let err = Operation::parse(
            OperationKind::PlayTrack,
            json!({"target_id": "a", "track": "  "}),
        )
        .unwrap_err();
        assert!(matches!(err, LinkPlayError::InvalidRequest(_)));
    }

    #[test]
    fn group_volume_payload_keeps_offset_shapes() {
        let op = Operation::parse(
            OperationKind::SetGroupVolume,
            json!({
                "entity_id": "living_room",
                "volume": 0.5,
                "volume_offsets": {"kitchen": -10, "bedroom": 0.2}
            }),
        )
        .unwrap();
        let Operation::SetGroupVolume(p) = op else {
            panic!("expected set_group_volume");
        };
        assert_eq!(p.volume_offsets["kitchen"], OffsetValue::Percent(-10));
        assert_eq!(p.volume_offsets["bedroom"], OffsetValue::Fraction(0.2));
    }

    #[tokio::test]
    async fn fan_out_runs_in_resolution_order_and_skips_unknown() {
        let (transport, dispatcher) = dispatcher(&["a", "b", "c"]);

        dispatcher
            .dispatch(
                "preset",
                json!({"target_ids": ["c", "ghost", "a"], "preset_number": 2}),
            )
            .await
            .unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                ("c.local".to_string(), "MCUKeyShortClick:2".to_string()),
                ("a.local".to_string(), "MCUKeyShortClick:2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn fan_out_failures_are_aggregated() {
        let (transport, dispatcher) = dispatcher(&["a", "b", "c"]);
        transport.fail_host("b.local");

        let err = dispatcher
            .dispatch("command", json!({"target_ids": "all", "command": "reboot"}))
            .await
            .unwrap_err();

        let LinkPlayError::DeviceCalls(failures) = err else {
            panic!("expected aggregated failures");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].device_id, "b");
        assert_eq!(transport.commands_to("c.local"), vec!["reboot"]);
    }

    #[tokio::test]
    async fn play_track_targets_one_device() {
        let (transport, dispatcher) = dispatcher(&["a", "b"]);

        dispatcher
            .dispatch(
                "play_track",
                json!({"entity_id": "b", "track": "http://radio.example/stream"}),
            )
            .await
            .unwrap();
        assert_eq!(
            transport.calls(),
            vec![(
                "b.local".to_string(),
                "setPlayerCmd:play:http://radio.example/stream".to_string()
            )]
        );

        dispatcher
            .dispatch("play_track", json!({"target_id": "ghost", "track": "x"}))
            .await
            .unwrap();
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn unknown_operation_touches_nothing() {
        let (transport, dispatcher) = dispatcher(&["a"]);
        let err = dispatcher
            .dispatch("factory_reset", json!({"target_ids": "all"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unknown_operation");
        assert!(transport.calls().is_empty());
    }
}
