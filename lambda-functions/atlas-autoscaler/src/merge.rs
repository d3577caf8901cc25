//! Turns a scaling request into field assignments and applies them to the
//! live cluster document.
//!
//! The same assignments are made in every region config, so the plan is
//! built once from the request. The change detector reads the plan's
//! requested entries, so it only compares fields the merge will write.
//! Sizing copied from the electable delta onto other node groups is
//! written but never compared.

use std::fmt;

use tracing::{debug, warn};

use crate::cluster::{ClusterDescription, RegionConfig};
use crate::request::{ScalingRequest, SpecDelta};
use crate::specs::{NodeSizing, NodeSizingMut, SpecKind};

/// A single field assignment, carrying the value to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    InstanceSize(String),
    DiskIops(i32),
    EbsVolumeType(String),
    NodeCount(i32),
    MinInstanceSize(String),
    MaxInstanceSize(String),
}

impl FieldEdit {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstanceSize(_) => "instanceSize",
            Self::DiskIops(_) => "diskIOPS",
            Self::EbsVolumeType(_) => "ebsVolumeType",
            Self::NodeCount(_) => "nodeCount",
            Self::MinInstanceSize(_) => "minInstanceSize",
            Self::MaxInstanceSize(_) => "maxInstanceSize",
        }
    }

    fn same_field(&self, other: &FieldEdit) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// The live value of this edit's field, or `None` when the region has no
    /// sub-spec (or autoscaling block) of that kind.
    pub fn current(&self, kind: SpecKind, region: &RegionConfig) -> Option<FieldEdit> {
        match self {
            Self::InstanceSize(_) => region
                .spec(kind)
                .map(|s| Self::InstanceSize(s.instance_size().to_string())),
            Self::DiskIops(_) => region.spec(kind).map(|s| Self::DiskIops(s.disk_iops())),
            Self::EbsVolumeType(_) => region
                .spec(kind)
                .map(|s| Self::EbsVolumeType(s.ebs_volume_type().to_string())),
            Self::NodeCount(_) => region.spec(kind).map(|s| Self::NodeCount(s.node_count())),
            Self::MinInstanceSize(_) => region
                .compute_auto_scaling(kind)
                .map(|c| Self::MinInstanceSize(c.min_instance_size().to_string())),
            Self::MaxInstanceSize(_) => region
                .compute_auto_scaling(kind)
                .map(|c| Self::MaxInstanceSize(c.max_instance_size().to_string())),
        }
    }

    /// Write this edit into `region`. Returns `false` if the target is absent.
    pub fn apply(&self, kind: SpecKind, region: &mut RegionConfig) -> bool {
        let applied = match self {
            Self::InstanceSize(v) => region.spec_mut(kind).map(|s| s.set_instance_size(v)),
            Self::DiskIops(v) => region.spec_mut(kind).map(|s| s.set_disk_iops(*v)),
            Self::EbsVolumeType(v) => region.spec_mut(kind).map(|s| s.set_ebs_volume_type(v)),
            Self::NodeCount(v) => region.spec_mut(kind).map(|s| s.set_node_count(*v)),
            Self::MinInstanceSize(v) => region
                .compute_auto_scaling_mut(kind)
                .map(|c| c.set_min_instance_size(v)),
            Self::MaxInstanceSize(v) => region
                .compute_auto_scaling_mut(kind)
                .map(|c| c.set_max_instance_size(v)),
        };
        applied.is_some()
    }
}

impl fmt::Display for FieldEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstanceSize(v)
            | Self::EbsVolumeType(v)
            | Self::MinInstanceSize(v)
            | Self::MaxInstanceSize(v) => write!(f, "{}", v),
            Self::DiskIops(v) | Self::NodeCount(v) => write!(f, "{}", v),
        }
    }
}

/// One assignment in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEdit {
    pub kind: SpecKind,
    pub edit: FieldEdit,
    /// Copied from the electable delta rather than requested for `kind`.
    pub propagated: bool,
}

/// Ordered set of assignments derived from one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalingPlan {
    edits: Vec<PlannedEdit>,
}

impl ScalingPlan {
    pub fn from_request(request: &ScalingRequest) -> Self {
        let mut plan = Self::default();

        if let Some(delta) = &request.electable_specs {
            for edit in sizing_edits(delta) {
                plan.push(SpecKind::Electable, edit);
            }
            if delta.node_count != 0 {
                plan.push(SpecKind::Electable, FieldEdit::NodeCount(delta.node_count));
            }
            plan.push_auto_scale(SpecKind::Electable, delta);

            // Read replicas and analytics nodes track the primary's sizing.
            for kind in [SpecKind::ReadOnly, SpecKind::Analytics] {
                for edit in sizing_edits(delta) {
                    plan.insert(PlannedEdit {
                        kind,
                        edit,
                        propagated: true,
                    });
                }
            }
        }

        if let Some(delta) = &request.read_only_specs {
            ignore_fields(
                SpecKind::ReadOnly,
                &[
                    ("instanceSize", !delta.instance_size.is_empty()),
                    ("diskIOPS", delta.disk_iops != 0),
                    ("ebsVolumeType", !delta.ebs_volume_type.is_empty()),
                    ("autoScale", delta.auto_scale.is_some()),
                ],
            );
            if delta.node_count != 0 {
                plan.push(SpecKind::ReadOnly, FieldEdit::NodeCount(delta.node_count));
            }
        }

        if let Some(delta) = &request.analytics_specs {
            ignore_fields(
                SpecKind::Analytics,
                &[
                    ("diskIOPS", delta.disk_iops != 0),
                    ("ebsVolumeType", !delta.ebs_volume_type.is_empty()),
                ],
            );
            if !delta.instance_size.is_empty() {
                plan.push(
                    SpecKind::Analytics,
                    FieldEdit::InstanceSize(delta.instance_size.clone()),
                );
            }
            if delta.node_count != 0 {
                plan.push(SpecKind::Analytics, FieldEdit::NodeCount(delta.node_count));
            }
            plan.push_auto_scale(SpecKind::Analytics, delta);
        }

        plan
    }

    fn push(&mut self, kind: SpecKind, edit: FieldEdit) {
        self.insert(PlannedEdit {
            kind,
            edit,
            propagated: false,
        });
    }

    /// A later edit to the same kind and field replaces the earlier one.
    fn insert(&mut self, planned: PlannedEdit) {
        match self
            .edits
            .iter_mut()
            .find(|p| p.kind == planned.kind && p.edit.same_field(&planned.edit))
        {
            Some(existing) => *existing = planned,
            None => self.edits.push(planned),
        }
    }

    fn push_auto_scale(&mut self, kind: SpecKind, delta: &SpecDelta) {
        if !delta.min_instance_size().is_empty() {
            self.push(
                kind,
                FieldEdit::MinInstanceSize(delta.min_instance_size().to_string()),
            );
        }
        if !delta.max_instance_size().is_empty() {
            self.push(
                kind,
                FieldEdit::MaxInstanceSize(delta.max_instance_size().to_string()),
            );
        }
    }

    pub fn edits(&self) -> &[PlannedEdit] {
        &self.edits
    }

    /// Entries the request names for their own node group.
    pub fn requested_edits(&self) -> impl Iterator<Item = &PlannedEdit> {
        self.edits.iter().filter(|p| !p.propagated)
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply every entry to `region`, returning the requested entries that
    /// had nothing to write to.
    pub fn apply_to_region(&self, region: &mut RegionConfig) -> Vec<&PlannedEdit> {
        let mut skipped = Vec::new();
        for planned in &self.edits {
            if planned.edit.apply(planned.kind, region) {
                continue;
            }
            if planned.propagated {
                debug!(
                    "Region {} has no {}, skipping {}",
                    region.name(),
                    planned.kind,
                    planned.edit.name()
                );
            } else {
                warn!(
                    region = %region.name(),
                    kind = %planned.kind,
                    field = planned.edit.name(),
                    "Region {} has no {} target for requested {}, skipping",
                    region.name(),
                    planned.kind,
                    planned.edit.name()
                );
                skipped.push(planned);
            }
        }
        skipped
    }

    pub fn apply(&self, mut cluster: ClusterDescription) -> ClusterDescription {
        for region in cluster.regions_mut() {
            self.apply_to_region(region);
        }
        cluster
    }
}

/// Instance size, disk IOPS and EBS volume type edits for the fields `source` sets.
fn sizing_edits(source: &impl NodeSizing) -> Vec<FieldEdit> {
    let mut edits = Vec::new();
    if !source.instance_size().is_empty() {
        edits.push(FieldEdit::InstanceSize(source.instance_size().to_string()));
    }
    if source.disk_iops() != 0 {
        edits.push(FieldEdit::DiskIops(source.disk_iops()));
    }
    if !source.ebs_volume_type().is_empty() {
        edits.push(FieldEdit::EbsVolumeType(source.ebs_volume_type().to_string()));
    }
    edits
}

fn ignore_fields(kind: SpecKind, fields: &[(&str, bool)]) {
    for (field, requested) in fields {
        if *requested {
            warn!(
                kind = %kind,
                field = *field,
                "{}.{} cannot be set on its own and is ignored",
                kind,
                field
            );
        }
    }
}

/// Merge `request` into a copy of the live cluster. Only requested fields
/// change; node groups the request does not mention stay untouched.
pub fn apply_delta(cluster: ClusterDescription, request: &ScalingRequest) -> ClusterDescription {
    ScalingPlan::from_request(request).apply(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{AutoScalingSettings, ComputeAutoScaling, HardwareSpec, ReplicationSpec};
    use crate::request::AutoScaleBounds;

    fn hardware(size: &str, iops: i32, volume: &str, nodes: i32) -> HardwareSpec {
        HardwareSpec {
            instance_size: Some(size.to_string()),
            disk_iops: Some(iops),
            ebs_volume_type: Some(volume.to_string()),
            node_count: Some(nodes),
            ..Default::default()
        }
    }

    fn auto_scaling(min: &str, max: &str) -> AutoScalingSettings {
        AutoScalingSettings {
            compute: Some(ComputeAutoScaling {
                min_instance_size: Some(min.to_string()),
                max_instance_size: Some(max.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn region(name: &str) -> RegionConfig {
        RegionConfig {
            region_name: Some(name.to_string()),
            electable_specs: Some(hardware("M30", 3000, "STANDARD", 3)),
            read_only_specs: Some(hardware("M30", 3000, "STANDARD", 1)),
            analytics_specs: Some(hardware("M30", 3000, "STANDARD", 1)),
            auto_scaling: Some(auto_scaling("M30", "M50")),
            analytics_auto_scaling: Some(auto_scaling("M30", "M40")),
            ..Default::default()
        }
    }

    fn cluster(regions: Vec<RegionConfig>) -> ClusterDescription {
        ClusterDescription {
            name: Some("c1".to_string()),
            replication_specs: vec![ReplicationSpec {
                region_configs: regions,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn request() -> ScalingRequest {
        ScalingRequest::builder().project("p1").cluster("c1").build()
    }

    #[test]
    fn test_electable_delta_propagates_sizing() {
        let mut req = request();
        req.electable_specs = Some(SpecDelta::builder().instance_size("M40").build());

        let merged = apply_delta(cluster(vec![region("US_EAST_1")]), &req);
        let r = &merged.replication_specs[0].region_configs[0];

        assert_eq!(r.electable_specs.as_ref().unwrap().instance_size(), "M40");
        assert_eq!(r.read_only_specs.as_ref().unwrap().instance_size(), "M40");
        assert_eq!(r.analytics_specs.as_ref().unwrap().instance_size(), "M40");
        assert_eq!(r.read_only_specs.as_ref().unwrap().node_count(), 1);
    }

    #[test]
    fn test_propagation_uses_delta_not_merged_spec() {
        let mut req = request();
        req.electable_specs = Some(SpecDelta::builder().disk_iops(6000).build());

        let merged = apply_delta(cluster(vec![region("US_EAST_1")]), &req);
        let r = &merged.replication_specs[0].region_configs[0];

        let read_only = r.read_only_specs.as_ref().unwrap();
        assert_eq!(read_only.disk_iops(), 6000);
        assert_eq!(read_only.instance_size(), "M30");
        assert_eq!(read_only.ebs_volume_type(), "STANDARD");
    }

    #[test]
    fn test_electable_node_count_and_auto_scale() {
        let mut req = request();
        req.electable_specs = Some(SpecDelta {
            node_count: 5,
            auto_scale: Some(AutoScaleBounds::builder().max_instance_size("M80").build()),
            ..Default::default()
        });

        let merged = apply_delta(cluster(vec![region("US_EAST_1")]), &req);
        let r = &merged.replication_specs[0].region_configs[0];

        assert_eq!(r.electable_specs.as_ref().unwrap().node_count(), 5);
        assert_eq!(r.read_only_specs.as_ref().unwrap().node_count(), 1);
        let compute = r.compute_auto_scaling(SpecKind::Electable).unwrap();
        assert_eq!(compute.min_instance_size(), "M30");
        assert_eq!(compute.max_instance_size(), "M80");
    }

    #[test]
    fn test_read_only_delta_only_sets_node_count() {
        let mut req = request();
        req.read_only_specs = Some(SpecDelta::builder().node_count(5).instance_size("M60").build());

        let merged = apply_delta(cluster(vec![region("US_EAST_1")]), &req);
        let r = &merged.replication_specs[0].region_configs[0];

        let read_only = r.read_only_specs.as_ref().unwrap();
        assert_eq!(read_only.node_count(), 5);
        assert_eq!(read_only.instance_size(), "M30");
        assert_eq!(r.electable_specs, Some(hardware("M30", 3000, "STANDARD", 3)));
    }

    #[test]
    fn test_analytics_delta_is_independent() {
        let mut req = request();
        req.analytics_specs = Some(SpecDelta {
            instance_size: "M50".to_string(),
            node_count: 2,
            disk_iops: 9000,
            auto_scale: Some(AutoScaleBounds::builder().min_instance_size("M40").build()),
            ..Default::default()
        });

        let merged = apply_delta(cluster(vec![region("US_EAST_1")]), &req);
        let r = &merged.replication_specs[0].region_configs[0];

        let analytics = r.analytics_specs.as_ref().unwrap();
        assert_eq!(analytics.instance_size(), "M50");
        assert_eq!(analytics.node_count(), 2);
        assert_eq!(analytics.disk_iops(), 3000);
        assert_eq!(
            r.compute_auto_scaling(SpecKind::Analytics)
                .unwrap()
                .min_instance_size(),
            "M40"
        );
        assert_eq!(
            r.compute_auto_scaling(SpecKind::Electable)
                .unwrap()
                .min_instance_size(),
            "M30"
        );
    }

    #[test]
    fn test_analytics_size_overrides_propagation() {
        let mut req = request();
        req.electable_specs = Some(SpecDelta::builder().instance_size("M60").build());
        req.analytics_specs = Some(SpecDelta::builder().instance_size("M40").build());

        let plan = ScalingPlan::from_request(&req);
        let analytics_sizes: Vec<_> = plan
            .edits()
            .iter()
            .filter(|p| p.kind == SpecKind::Analytics && p.edit.name() == "instanceSize")
            .collect();
        assert_eq!(analytics_sizes.len(), 1);
        assert!(!analytics_sizes[0].propagated);

        let merged = plan.apply(cluster(vec![region("US_EAST_1")]));
        let r = &merged.replication_specs[0].region_configs[0];
        assert_eq!(r.electable_specs.as_ref().unwrap().instance_size(), "M60");
        assert_eq!(r.read_only_specs.as_ref().unwrap().instance_size(), "M60");
        assert_eq!(r.analytics_specs.as_ref().unwrap().instance_size(), "M40");
    }

    #[test]
    fn test_absent_kinds_are_untouched() {
        let mut req = request();
        req.electable_specs = Some(SpecDelta::builder().node_count(7).build());

        let live = cluster(vec![region("US_EAST_1"), region("EU_WEST_1")]);
        let merged = apply_delta(live.clone(), &req);

        for (before, after) in live.replication_specs[0]
            .region_configs
            .iter()
            .zip(&merged.replication_specs[0].region_configs)
        {
            assert_eq!(before.read_only_specs, after.read_only_specs);
            assert_eq!(before.analytics_specs, after.analytics_specs);
            assert_eq!(before.analytics_auto_scaling, after.analytics_auto_scaling);
            assert_eq!(after.electable_specs.as_ref().unwrap().node_count(), 7);
        }
    }

    #[test]
    fn test_missing_sub_specs_are_skipped() {
        let bare = RegionConfig {
            region_name: Some("US_WEST_2".to_string()),
            electable_specs: Some(hardware("M30", 3000, "STANDARD", 3)),
            ..Default::default()
        };
        let mut req = request();
        req.electable_specs = Some(SpecDelta {
            instance_size: "M40".to_string(),
            auto_scale: Some(AutoScaleBounds::builder().max_instance_size("M60").build()),
            ..Default::default()
        });
        req.analytics_specs = Some(SpecDelta::builder().node_count(1).build());

        let merged = apply_delta(cluster(vec![bare]), &req);
        let r = &merged.replication_specs[0].region_configs[0];

        assert_eq!(r.electable_specs.as_ref().unwrap().instance_size(), "M40");
        assert!(r.read_only_specs.is_none());
        assert!(r.analytics_specs.is_none());
        assert!(r.auto_scaling.is_none());
    }

    #[test]
    fn test_propagated_sizing_is_not_requested() {
        let mut req = request();
        req.electable_specs = Some(SpecDelta::builder().instance_size("M40").node_count(5).build());

        let plan = ScalingPlan::from_request(&req);
        let requested: Vec<_> = plan.requested_edits().collect();

        assert_eq!(plan.edits().len(), 4);
        assert_eq!(requested.len(), 2);
        assert!(requested.iter().all(|p| p.kind == SpecKind::Electable));
        assert!(plan
            .edits()
            .iter()
            .filter(|p| p.kind != SpecKind::Electable)
            .all(|p| p.propagated && p.edit == FieldEdit::InstanceSize("M40".to_string())));
    }

    #[test]
    fn test_requested_bounds_without_auto_scaling_block_are_reported() {
        let mut bare = region("US_EAST_1");
        bare.analytics_auto_scaling = None;
        bare.read_only_specs = None;

        let mut req = request();
        req.electable_specs = Some(SpecDelta::builder().instance_size("M40").build());
        req.analytics_specs = Some(SpecDelta {
            auto_scale: Some(AutoScaleBounds::builder().min_instance_size("M40").build()),
            ..Default::default()
        });

        let plan = ScalingPlan::from_request(&req);
        let skipped = plan.apply_to_region(&mut bare);

        // The propagated read-only size has no target either, but only the
        // requested bound is reported.
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].kind, SpecKind::Analytics);
        assert_eq!(skipped[0].edit, FieldEdit::MinInstanceSize("M40".to_string()));
        assert_eq!(bare.electable_specs.as_ref().unwrap().instance_size(), "M40");
    }

    #[test]
    fn test_empty_request_plan() {
        let plan = ScalingPlan::from_request(&request());
        assert!(plan.is_empty());
    }
}
