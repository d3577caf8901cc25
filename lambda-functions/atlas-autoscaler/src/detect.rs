use serde::Serialize;
use tracing::info;

use crate::cluster::ClusterDescription;
use crate::merge::{PlannedEdit, ScalingPlan};
use crate::request::ScalingRequest;
use crate::specs::SpecKind;

/// One live field that differs from what the request asks for.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub kind: SpecKind,
    pub field: &'static str,
    pub replication_spec: usize,
    pub region: String,
    pub live: String,
    pub requested: String,
}

/// Every requested field whose live value differs, compared within its own
/// node group.
///
/// Sizing the plan copies from the electable delta onto other node groups is
/// not compared. Regions without a sub-spec of the planned kind are skipped,
/// not counted as differences.
pub fn detect_changes(cluster: &ClusterDescription, plan: &ScalingPlan) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    for (replication_spec, region) in cluster.regions() {
        for PlannedEdit { kind, edit, .. } in plan.requested_edits() {
            let Some(live) = edit.current(*kind, region) else {
                continue;
            };
            if live == *edit {
                continue;
            }

            let change = FieldChange {
                kind: *kind,
                field: edit.name(),
                replication_spec,
                region: region.name().to_string(),
                live: live.to_string(),
                requested: edit.to_string(),
            };
            info!(
                kind = %change.kind,
                field = change.field,
                replication_spec = change.replication_spec,
                region = %change.region,
                live = %change.live,
                requested = %change.requested,
                "{} {} changed: {} -> {}",
                change.kind,
                change.field,
                change.live,
                change.requested
            );
            changes.push(change);
        }
    }

    changes
}

/// Whether applying `request` to `cluster` would change anything.
pub fn has_changes(cluster: &ClusterDescription, request: &ScalingRequest) -> bool {
    !detect_changes(cluster, &ScalingPlan::from_request(request)).is_empty()
}
