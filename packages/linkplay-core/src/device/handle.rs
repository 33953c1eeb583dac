//! A single addressable LinkPlay device.
//!
//! A [`DeviceHandle`] owns the cached state of one speaker (volume, stored
//! offset, group role and membership) and performs the effectful calls for
//! it through a [`DeviceTransport`]. Group role and membership are only
//! changed by the handle's own join/unjoin operations, driven by the group
//! coordinator.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::linkplay::commands::{self, PlayerStatus, NETWORK_INPUT};
use crate::linkplay::retry::with_retry;
use crate::linkplay::{DeviceError, DeviceResult, DeviceTransport};

/// Role of a device within a multiroom group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Leader,
    Follower,
    #[default]
    Standalone,
}

/// State captured by [`DeviceHandle::snapshot`].
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    volume: f64,
    /// Input the device was on, when it could be determined.
    input: Option<String>,
    /// Whether the snapshot switched the device to network input.
    switched: bool,
}

#[derive(Debug, Default)]
struct DeviceState {
    volume: f64,
    volume_offset: f64,
    role: GroupRole,
    /// Authoritative only on a leader, where it lists the leader first.
    group: Vec<String>,
    leader_id: Option<String>,
    snapshot: Option<Snapshot>,
}

/// Serializable view of a device for the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub id: String,
    pub name: String,
    pub host: String,
    pub volume: f64,
    pub volume_offset: f64,
    pub role: GroupRole,
    pub group: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader_id: Option<String>,
}

/// Handle to one registered device.
pub struct DeviceHandle {
    id: String,
    name: String,
    host: String,
    transport: Arc<dyn DeviceTransport>,
    /// Step used by `volume_up`/`volume_down`, in device units (0-100).
    volume_step: u8,
    state: Mutex<DeviceState>,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl DeviceHandle {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        host: impl Into<String>,
        transport: Arc<dyn DeviceTransport>,
        volume_step: u8,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            host: host.into(),
            transport,
            volume_step,
            state: Mutex::new(DeviceState::default()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn role(&self) -> GroupRole {
        self.state.lock().role
    }

    pub fn is_leader(&self) -> bool {
        self.role() == GroupRole::Leader
    }

    /// Group membership, leader first. Empty unless this device leads a group.
    pub fn group(&self) -> Vec<String> {
        self.state.lock().group.clone()
    }

    /// Group members other than this device.
    pub fn followers(&self) -> Vec<String> {
        self.state
            .lock()
            .group
            .iter()
            .filter(|id| **id != self.id)
            .cloned()
            .collect()
    }

    /// Leader this device follows, if any.
    pub fn leader_id(&self) -> Option<String> {
        self.state.lock().leader_id.clone()
    }

    /// Last volume read from or written to the device.
    pub fn cached_volume(&self) -> f64 {
        self.state.lock().volume
    }

    pub fn volume_offset(&self) -> f64 {
        self.state.lock().volume_offset
    }

    /// Stores the offset applied on top of a group volume. Clamped to `[-1, 1]`.
    pub fn set_volume_offset(&self, offset: f64) {
        self.state.lock().volume_offset = offset.clamp(-1.0, 1.0);
    }

    pub fn status(&self) -> DeviceStatus {
        let state = self.state.lock();
        DeviceStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            host: self.host.clone(),
            volume: state.volume,
            volume_offset: state.volume_offset,
            role: state.role,
            group: state.group.clone(),
            leader_id: state.leader_id.clone(),
        }
    }

    async fn send(&self, command: &str) -> DeviceResult<String> {
        self.transport.send(&self.host, command).await
    }

    async fn player_status(&self) -> DeviceResult<PlayerStatus> {
        let body = self.send(commands::player_status()).await?;
        PlayerStatus::parse(&body)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Volume
    // ─────────────────────────────────────────────────────────────────────────

    /// Reads the current volume from the device and refreshes the cache.
    pub async fn volume(&self) -> DeviceResult<f64> {
        let volume = self.player_status().await?.volume()?;
        self.state.lock().volume = volume;
        Ok(volume)
    }

    /// Sets the device volume. The level is clamped to `[0.0, 1.0]`; the
    /// cache is only updated once the device accepted the command.
    pub async fn set_volume(&self, level: f64) -> DeviceResult<()> {
        let level = level.clamp(0.0, 1.0);
        self.send(&commands::set_volume(level)).await?;
        self.state.lock().volume = level;
        log::debug!("[Device] {} volume set to {:.2}", self.id, level);
        Ok(())
    }

    pub async fn volume_up(&self) -> DeviceResult<()> {
        let step = f64::from(self.volume_step) / 100.0;
        let current = self.volume().await?;
        self.set_volume(current + step).await
    }

    pub async fn volume_down(&self) -> DeviceResult<()> {
        let step = f64::from(self.volume_step) / 100.0;
        let current = self.volume().await?;
        self.set_volume(current - step).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grouping
    // ─────────────────────────────────────────────────────────────────────────

    /// Makes this device the leader of `members`.
    ///
    /// Each member is told to join this device's group; timeouts are retried.
    /// Members that fail are left out of the group and returned with their
    /// error. If this device already leads a group, successful members are
    /// appended to it.
    pub async fn join(&self, members: &[Arc<DeviceHandle>]) -> Vec<(String, DeviceError)> {
        let command = commands::join_group(&self.host);
        let mut joined = Vec::new();
        let mut failures = Vec::new();

        for member in members.iter().filter(|m| m.id != self.id) {
            let action = format!("join {} -> {}", member.id, self.id);
            let command = command.as_str();
            match with_retry(&action, move || member.send(command)).await {
                Ok(_) => {
                    member.attach(&self.id);
                    joined.push(member.id.clone());
                }
                Err(e) => {
                    log::warn!("[Device] {} could not join {}: {}", member.id, self.id, e);
                    failures.push((member.id.clone(), e));
                }
            }
        }

        if !joined.is_empty() {
            let mut state = self.state.lock();
            if state.role != GroupRole::Leader {
                state.group = vec![self.id.clone()];
            }
            for id in joined {
                if !state.group.contains(&id) {
                    state.group.push(id);
                }
            }
            state.role = GroupRole::Leader;
            state.leader_id = None;
            log::info!("[Device] {} now leads {:?}", self.id, state.group);
        }

        failures
    }

    /// Disbands the group this device leads.
    ///
    /// `followers` are the handles of the current followers; every one that
    /// still follows this device reverts to standalone.
    pub async fn unjoin_all(&self, followers: &[Arc<DeviceHandle>]) -> DeviceResult<()> {
        self.send(commands::ungroup()).await?;

        for follower in followers {
            if follower.leader_id().as_deref() == Some(self.id.as_str()) {
                follower.detach();
            }
        }
        self.detach();
        log::info!("[Device] {} disbanded its group", self.id);
        Ok(())
    }

    /// Leaves whatever group this device is in.
    ///
    /// Returns the id of the leader it followed, if known, so the caller can
    /// update that leader's membership.
    pub async fn unjoin_me(&self) -> DeviceResult<Option<String>> {
        self.send(commands::ungroup()).await?;
        let previous = self.detach();
        log::info!("[Device] {} left its group", self.id);
        Ok(previous)
    }

    /// Marks this device as following `leader_id`.
    pub(crate) fn attach(&self, leader_id: &str) {
        let mut state = self.state.lock();
        state.role = GroupRole::Follower;
        state.group.clear();
        state.leader_id = Some(leader_id.to_string());
    }

    /// Reverts to standalone, returning the previous leader if following one.
    pub(crate) fn detach(&self) -> Option<String> {
        let mut state = self.state.lock();
        state.role = GroupRole::Standalone;
        state.group.clear();
        state.leader_id.take()
    }

    /// Drops `member_id` from this leader's membership. A leader left without
    /// followers reverts to standalone.
    pub(crate) fn forget_member(&self, member_id: &str) {
        let mut state = self.state.lock();
        if state.role != GroupRole::Leader {
            return;
        }
        state.group.retain(|id| id != member_id);
        if state.group.iter().all(|id| *id == self.id) {
            state.role = GroupRole::Standalone;
            state.group.clear();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Playback
    // ─────────────────────────────────────────────────────────────────────────

    /// Triggers a stored preset (1-based).
    pub async fn preset(&self, number: u32) -> DeviceResult<()> {
        self.send(&commands::preset(number)).await?;
        Ok(())
    }

    /// Sends a raw API command and returns the device's reply.
    pub async fn execute_command(&self, command: &str) -> DeviceResult<String> {
        self.send(command).await
    }

    /// Starts playback of a URL.
    pub async fn play_track(&self, track: &str) -> DeviceResult<()> {
        self.send(&commands::play_url(track)).await?;
        Ok(())
    }

    /// Records volume and input so [`restore`](Self::restore) can return to
    /// them. With `switch_input`, a device on a non-network input is switched
    /// to network playback.
    pub async fn snapshot(&self, switch_input: bool) -> DeviceResult<()> {
        let status = self.player_status().await?;
        let volume = status.volume()?;
        let input = commands::input_for_mode(&status.mode).map(str::to_string);

        let switched = switch_input && input.as_deref().is_some_and(|i| i != NETWORK_INPUT);
        if switched {
            self.send(&commands::switch_mode(NETWORK_INPUT)).await?;
        }

        let mut state = self.state.lock();
        state.volume = volume;
        state.snapshot = Some(Snapshot {
            volume,
            input,
            switched,
        });
        Ok(())
    }

    /// Restores the last snapshot. Without one this is a logged no-op.
    pub async fn restore(&self) -> DeviceResult<()> {
        let Some(snapshot) = self.state.lock().snapshot.clone() else {
            log::warn!("[Device] {} has no snapshot to restore", self.id);
            return Ok(());
        };

        if snapshot.switched {
            if let Some(input) = &snapshot.input {
                self.send(&commands::switch_mode(input)).await?;
            }
        }
        self.set_volume(snapshot.volume).await?;
        self.state.lock().snapshot = None;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{device, RecordingTransport};
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn set_volume_clamps_and_caches() {
        let transport = Arc::new(RecordingTransport::default());
        let kitchen = device("kitchen", &transport);

        kitchen.set_volume(1.4).await.unwrap();
        assert_eq!(kitchen.cached_volume(), 1.0);
        kitchen.set_volume(-0.3).await.unwrap();
        assert_eq!(kitchen.cached_volume(), 0.0);

        assert_eq!(
            transport.commands_to("kitchen.local"),
            vec!["setPlayerCmd:vol:100", "setPlayerCmd:vol:0"]
        );
    }

    #[tokio::test]
    async fn failed_set_volume_keeps_cache() {
        let transport = Arc::new(RecordingTransport::default());
        let kitchen = device("kitchen", &transport);
        kitchen.set_volume(0.3).await.unwrap();

        transport.fail_host("kitchen.local");
        assert!(kitchen.set_volume(0.8).await.is_err());
        assert_eq!(kitchen.cached_volume(), 0.3);
    }

    #[tokio::test]
    async fn volume_reads_from_device() {
        let transport = Arc::new(RecordingTransport::default());
        transport.set_status("den.local", "10", 42);
        let den = device("den", &transport);

        assert!(approx(den.volume().await.unwrap(), 0.42));
        assert!(approx(den.cached_volume(), 0.42));
    }

    #[tokio::test]
    async fn volume_steps() {
        let transport = Arc::new(RecordingTransport::default());
        transport.set_status("den.local", "10", 50);
        let den = device("den", &transport);

        den.volume_up().await.unwrap();
        assert!(approx(den.cached_volume(), 0.55));
        den.volume_down().await.unwrap();
        assert!(approx(den.cached_volume(), 0.45));
    }

    #[test]
    fn offset_is_clamped() {
        let transport = Arc::new(RecordingTransport::default());
        let den = device("den", &transport);
        den.set_volume_offset(1.7);
        assert_eq!(den.volume_offset(), 1.0);
        den.set_volume_offset(-0.2);
        assert_eq!(den.volume_offset(), -0.2);
    }

    #[tokio::test]
    async fn join_sends_to_members_and_skips_self() {
        let transport = Arc::new(RecordingTransport::default());
        let a = device("a", &transport);
        let b = device("b", &transport);
        let c = device("c", &transport);

        let failures = a.join(&[a.clone(), b.clone(), c.clone()]).await;
        assert!(failures.is_empty());

        assert!(transport.commands_to("a.local").is_empty());
        assert_eq!(
            transport.commands_to("b.local"),
            vec!["ConnectMasterAp:JoinGroupMaster:etha.local:wifi0.0.0.0"]
        );
        assert_eq!(a.role(), GroupRole::Leader);
        assert_eq!(a.group(), vec!["a", "b", "c"]);
        assert_eq!(a.followers(), vec!["b", "c"]);
        assert_eq!(b.role(), GroupRole::Follower);
        assert_eq!(b.leader_id().as_deref(), Some("a"));
        assert!(b.group().is_empty());
    }

    #[tokio::test]
    async fn join_leaves_out_failed_members() {
        let transport = Arc::new(RecordingTransport::default());
        transport.fail_host("c.local");
        let a = device("a", &transport);
        let b = device("b", &transport);
        let c = device("c", &transport);

        let failures = a.join(&[b.clone(), c.clone()]).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "c");
        assert_eq!(a.group(), vec!["a", "b"]);
        assert_eq!(c.role(), GroupRole::Standalone);
    }

    #[tokio::test]
    async fn join_with_no_members_changes_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let a = device("a", &transport);
        assert!(a.join(&[a.clone()]).await.is_empty());
        assert_eq!(a.role(), GroupRole::Standalone);
        assert!(a.group().is_empty());
    }

    #[tokio::test]
    async fn joining_again_extends_the_group() {
        let transport = Arc::new(RecordingTransport::default());
        let a = device("a", &transport);
        let b = device("b", &transport);
        let c = device("c", &transport);

        a.join(&[b.clone()]).await;
        a.join(&[b.clone(), c.clone()]).await;
        assert_eq!(a.group(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn unjoin_all_releases_followers() {
        let transport = Arc::new(RecordingTransport::default());
        let a = device("a", &transport);
        let b = device("b", &transport);
        let c = device("c", &transport);
        a.join(&[b.clone(), c.clone()]).await;

        a.unjoin_all(&[b.clone(), c.clone()]).await.unwrap();
        for d in [&a, &b, &c] {
            assert_eq!(d.role(), GroupRole::Standalone);
            assert!(d.group().is_empty());
            assert!(d.leader_id().is_none());
        }
        assert_eq!(transport.commands_to("a.local"), vec!["multiroom:Ungroup"]);
    }

    #[tokio::test]
    async fn unjoin_me_reports_previous_leader() {
        let transport = Arc::new(RecordingTransport::default());
        let a = device("a", &transport);
        let b = device("b", &transport);
        a.join(&[b.clone()]).await;

        assert_eq!(b.unjoin_me().await.unwrap().as_deref(), Some("a"));
        assert_eq!(b.role(), GroupRole::Standalone);

        a.forget_member("b");
        assert_eq!(a.role(), GroupRole::Standalone);
        assert!(a.group().is_empty());
    }

    #[tokio::test]
    async fn snapshot_switches_input_and_restore_returns() {
        let transport = Arc::new(RecordingTransport::default());
        transport.set_status("den.local", "40", 30);
        let den = device("den", &transport);

        den.snapshot(true).await.unwrap();
        den.set_volume(0.8).await.unwrap();
        den.restore().await.unwrap();

        assert_eq!(
            transport.commands_to("den.local"),
            vec![
                "getPlayerStatus",
                "setPlayerCmd:switchmode:wifi",
                "setPlayerCmd:vol:80",
                "setPlayerCmd:switchmode:line-in",
                "setPlayerCmd:vol:30",
            ]
        );
        assert!(approx(den.cached_volume(), 0.3));
    }

    #[tokio::test]
    async fn snapshot_without_switch_keeps_input() {
        let transport = Arc::new(RecordingTransport::default());
        transport.set_status("den.local", "41", 20);
        let den = device("den", &transport);

        den.snapshot(false).await.unwrap();
        den.restore().await.unwrap();
        assert_eq!(
            transport.commands_to("den.local"),
            vec!["getPlayerStatus", "setPlayerCmd:vol:20"]
        );
    }

    #[tokio::test]
    async fn restore_without_snapshot_is_noop() {
        let transport = Arc::new(RecordingTransport::default());
        let den = device("den", &transport);
        den.restore().await.unwrap();
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn execute_command_returns_reply() {
        let transport = Arc::new(RecordingTransport::default());
        let den = device("den", &transport);
        assert_eq!(den.execute_command("reboot").await.unwrap(), "OK");
        den.preset(3).await.unwrap();
        den.play_track("http://radio/stream.mp3").await.unwrap();
        assert_eq!(
            transport.commands_to("den.local"),
            vec![
                "reboot",
                "MCUKeyShortClick:3",
                "setPlayerCmd:play:http://radio/stream.mp3"
            ]
        );
    }
}
