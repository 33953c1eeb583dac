//! Multiroom group coordination.
//!
//! Resolves membership and leadership from the [`DeviceRegistry`] and runs
//! join, unjoin and group-volume operations against the device handles.
//!
//! Device calls within one operation run sequentially, leader first, so the
//! order of side effects is deterministic. Calls are best-effort: a failing
//! device does not stop its siblings, and failures are reported together as
//! [`LinkPlayError::DeviceCalls`] once every device has been tried.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::device::offset::{apply_offset, normalize_offsets, RawOffsets};
use crate::device::{DeviceHandle, DeviceRegistry, GroupRole, Selection};
use crate::error::{DeviceFailure, LinkPlayError, LinkPlayResult};
use crate::state::Config;

/// How `unjoin` treats a selection mixing leaders and non-leaders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedUnjoinPolicy {
    /// Disband the selected leaders, then remove any selected device that
    /// still follows a group.
    #[default]
    DisbandThenRelease,
    /// Disband the selected leaders; other selected devices are ignored.
    LeadersOnly,
    /// Refuse the whole request without touching any device.
    Reject,
}

/// Runs group operations over the registered devices.
pub struct GroupCoordinator {
    registry: Arc<DeviceRegistry>,
    /// When set, `set_group_volume` only acts on an addressed leader.
    strict_leader_required: bool,
    mixed_unjoin: MixedUnjoinPolicy,
}

impl GroupCoordinator {
    pub fn new(registry: Arc<DeviceRegistry>, config: &Config) -> Self {
        Self {
            registry,
            strict_leader_required: config.strict_leader_required,
            mixed_unjoin: config.mixed_unjoin,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Join
    // ─────────────────────────────────────────────────────────────────────────

    /// Groups the selected devices under `leader_id`.
    ///
    /// An unknown leader makes this a no-op. The leader is never its own
    /// follower, so it is dropped from the member set. Members that were
    /// following another leader are removed from that leader's membership.
    pub async fn join(&self, leader_id: &str, selection: &Selection) -> LinkPlayResult<()> {
        let Some(leader) = self.registry.find_one(leader_id) else {
            log::warn!("[Coordinator] Join skipped: leader {} not found", leader_id);
            return Ok(());
        };

        let members: Vec<Arc<DeviceHandle>> = self
            .registry
            .resolve(selection)
            .into_iter()
            .filter(|d| d.id() != leader_id)
            .collect();

        if members.is_empty() {
            log::info!("[Coordinator] Join skipped: no members for {}", leader_id);
            return Ok(());
        }

        let previous_leaders: Vec<(String, Option<String>)> = members
            .iter()
            .map(|m| (m.id().to_string(), m.leader_id()))
            .collect();
        let leading_members: Vec<(String, Vec<String>)> = members
            .iter()
            .filter(|m| m.is_leader())
            .map(|m| (m.id().to_string(), m.followers()))
            .collect();
        let leader_was_following = leader.leader_id();

        log::info!(
            "[Coordinator] Joining {} device(s) to {}",
            members.len(),
            leader_id
        );
        let failures = leader.join(&members).await;
        let joined = |id: &str| !failures.iter().any(|(failed, _)| failed == id);

        for (member_id, previous) in previous_leaders {
            let Some(previous) = previous.filter(|p| p != leader_id) else {
                continue;
            };
            if !joined(&member_id) {
                continue;
            }
            if let Some(old_leader) = self.registry.find_one(&previous) {
                old_leader.forget_member(&member_id);
            }
        }

        // A leader that joined another group no longer leads its own.
        for (member_id, followers) in leading_members {
            if !joined(&member_id) {
                continue;
            }
            for follower in self.registry.resolve(&Selection::Ids(followers)) {
                if follower.leader_id().as_deref() == Some(member_id.as_str()) {
                    log::info!(
                        "[Coordinator] {} released: its leader {} joined {}",
                        follower.id(),
                        member_id,
                        leader_id
                    );
                    follower.detach();
                }
            }
        }

        if leader.is_leader() {
            if let Some(previous) = leader_was_following {
                if let Some(old_leader) = self.registry.find_one(&previous) {
                    log::info!(
                        "[Coordinator] {} left {} to lead its own group",
                        leader_id,
                        previous
                    );
                    old_leader.forget_member(leader_id);
                }
            }
        }

        LinkPlayError::from_failures(
            failures
                .iter()
                .map(|(id, e)| DeviceFailure::new(id, e))
                .collect(),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Unjoin
    // ─────────────────────────────────────────────────────────────────────────

    /// Breaks up groups for the selected devices.
    ///
    /// Without a leader in the selection, every selected device leaves its
    /// group on its own. With at least one leader, each selected leader
    /// disbands its group; selected non-leaders are then handled according
    /// to the configured [`MixedUnjoinPolicy`].
    pub async fn unjoin(&self, selection: &Selection) -> LinkPlayResult<()> {
        let devices = self.registry.resolve(selection);
        let (leaders, others): (Vec<_>, Vec<_>) =
            devices.into_iter().partition(|d| d.is_leader());

        let mut failures = Vec::new();

        if leaders.is_empty() {
            for device in &others {
                self.release(device, &mut failures).await;
            }
            return LinkPlayError::from_failures(failures);
        }

        if !others.is_empty() {
            match self.mixed_unjoin {
                MixedUnjoinPolicy::Reject => {
                    let ids: Vec<&str> = others.iter().map(|d| d.id()).collect();
                    return Err(LinkPlayError::InvalidRequest(format!(
                        "unjoin selection mixes leaders with non-leaders: {}",
                        ids.join(", ")
                    )));
                }
                MixedUnjoinPolicy::LeadersOnly => {
                    log::debug!(
                        "[Coordinator] Ignoring {} non-leader(s) in mixed unjoin",
                        others.len()
                    );
                }
                MixedUnjoinPolicy::DisbandThenRelease => {}
            }
        }

        for leader in &leaders {
            let followers = self.registry.resolve(&Selection::Ids(leader.followers()));
            if let Err(e) = leader.unjoin_all(&followers).await {
                log::warn!("[Coordinator] {} failed to disband: {}", leader.id(), e);
                failures.push(DeviceFailure::new(leader.id(), &e));
            }
        }

        if self.mixed_unjoin == MixedUnjoinPolicy::DisbandThenRelease {
            for device in others.iter().filter(|d| d.role() == GroupRole::Follower) {
                self.release(device, &mut failures).await;
            }
        }

        LinkPlayError::from_failures(failures)
    }

    /// Removes one device from its group and updates its former leader.
    async fn release(&self, device: &DeviceHandle, failures: &mut Vec<DeviceFailure>) {
        match device.unjoin_me().await {
            Ok(Some(leader_id)) => {
                if let Some(leader) = self.registry.find_one(&leader_id) {
                    leader.forget_member(device.id());
                }
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("[Coordinator] {} failed to leave group: {}", device.id(), e);
                failures.push(DeviceFailure::new(device.id(), &e));
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Group volume
    // ─────────────────────────────────────────────────────────────────────────

    /// Sets `target` on the addressed leader and `target + offset` on each
    /// other group member, clamped to `[0.0, 1.0]`.
    ///
    /// Offsets are validated before any device call; one out-of-range entry
    /// fails the whole operation with nothing applied. An unknown addressed
    /// device, or a non-leader in strict mode, skips the operation.
    ///
    /// Members are visited in group order after the leader. Each member's
    /// offset (default `0.0`) is stored before its volume is set.
    pub async fn set_group_volume(
        &self,
        addressed_id: &str,
        target: f64,
        raw_offsets: &RawOffsets,
    ) -> LinkPlayResult<()> {
        let offsets = normalize_offsets(raw_offsets)?;

        let Some(leader) = self.registry.find_one(addressed_id) else {
            log::warn!(
                "[Coordinator] Group volume skipped: device {} not found",
                addressed_id
            );
            return Ok(());
        };

        if self.strict_leader_required && !leader.is_leader() {
            log::warn!(
                "[Coordinator] Group volume skipped: {} is not a group leader",
                addressed_id
            );
            return Ok(());
        }

        if offsets.contains_key(addressed_id) {
            log::debug!(
                "[Coordinator] Ignoring offset supplied for leader {}",
                addressed_id
            );
        }

        log::info!(
            "[Coordinator] Setting group volume {:.2} via {}",
            target,
            addressed_id
        );

        let mut failures = Vec::new();
        if let Err(e) = leader.set_volume(target).await {
            log::warn!("[Coordinator] Failed to set volume on {}: {}", leader.id(), e);
            failures.push(DeviceFailure::new(leader.id(), &e));
        }

        for member_id in leader.followers() {
            let Some(member) = self.registry.find_one(&member_id) else {
                log::warn!(
                    "[Coordinator] Group member {} of {} is not registered",
                    member_id,
                    addressed_id
                );
                continue;
            };

            let offset = offsets.get(&member_id).copied().unwrap_or(0.0);
            member.set_volume_offset(offset);
            let level = apply_offset(target, offset);

            if let Err(e) = member.set_volume(level).await {
                log::warn!("[Coordinator] Failed to set volume on {}: {}", member_id, e);
                failures.push(DeviceFailure::new(&member_id, &e));
            }
        }

        LinkPlayError::from_failures(failures)
    }
}
