//! Live cluster document as returned by the Atlas Administration API.
//!
//! Only the attributes the scaler reads or rewrites are modelled. Everything
//! else is kept in each type's `extra` map and written back untouched, since
//! an update re-submits the whole document.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::specs::SpecKind;

/// Server-managed attributes that Atlas rejects on update.
pub const READ_ONLY_FIELDS: &[&str] = &[
    "connectionStrings",
    "createDate",
    "groupId",
    "id",
    "links",
    "mongoDBVersion",
    "stateName",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub replication_specs: Vec<ReplicationSpec>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClusterDescription {
    /// Drop the attributes Atlas owns so the document can be sent back as an update.
    pub fn strip_read_only_fields(&mut self) {
        for field in READ_ONLY_FIELDS {
            self.extra.remove(*field);
        }
    }

    /// All region configs across every replication spec, with the index of
    /// the replication spec each one belongs to.
    pub fn regions(&self) -> impl Iterator<Item = (usize, &RegionConfig)> {
        self.replication_specs
            .iter()
            .enumerate()
            .flat_map(|(i, spec)| spec.region_configs.iter().map(move |region| (i, region)))
    }

    pub fn regions_mut(&mut self) -> impl Iterator<Item = &mut RegionConfig> {
        self.replication_specs
            .iter_mut()
            .flat_map(|spec| spec.region_configs.iter_mut())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationSpec {
    #[serde(default)]
    pub region_configs: Vec<RegionConfig>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electable_specs: Option<HardwareSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_specs: Option<HardwareSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_specs: Option<HardwareSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaling: Option<AutoScalingSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_auto_scaling: Option<AutoScalingSettings>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegionConfig {
    pub fn name(&self) -> &str {
        self.region_name.as_deref().unwrap_or("unknown")
    }

    pub fn spec(&self, kind: SpecKind) -> Option<&HardwareSpec> {
        match kind {
            SpecKind::Electable => self.electable_specs.as_ref(),
            SpecKind::ReadOnly => self.read_only_specs.as_ref(),
            SpecKind::Analytics => self.analytics_specs.as_ref(),
        }
    }

    pub fn spec_mut(&mut self, kind: SpecKind) -> Option<&mut HardwareSpec> {
        match kind {
            SpecKind::Electable => self.electable_specs.as_mut(),
            SpecKind::ReadOnly => self.read_only_specs.as_mut(),
            SpecKind::Analytics => self.analytics_specs.as_mut(),
        }
    }

    /// Compute autoscaling block governing `kind`. Read-only nodes follow the
    /// electable autoscaling settings and have none of their own.
    pub fn compute_auto_scaling(&self, kind: SpecKind) -> Option<&ComputeAutoScaling> {
        let settings = match kind {
            SpecKind::Electable => self.auto_scaling.as_ref(),
            SpecKind::Analytics => self.analytics_auto_scaling.as_ref(),
            SpecKind::ReadOnly => None,
        };
        settings.and_then(|s| s.compute.as_ref())
    }

    pub fn compute_auto_scaling_mut(&mut self, kind: SpecKind) -> Option<&mut ComputeAutoScaling> {
        let settings = match kind {
            SpecKind::Electable => self.auto_scaling.as_mut(),
            SpecKind::Analytics => self.analytics_auto_scaling.as_mut(),
            SpecKind::ReadOnly => None,
        };
        settings.and_then(|s| s.compute.as_mut())
    }
}

/// Hardware of one node group in one region.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_size: Option<String>,

    #[serde(
        default,
        rename = "diskIOPS",
        skip_serializing_if = "Option::is_none"
    )]
    pub disk_iops: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebs_volume_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<i32>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalingSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComputeAutoScaling>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComputeAutoScaling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_instance_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instance_size: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComputeAutoScaling {
    pub fn min_instance_size(&self) -> &str {
        self.min_instance_size.as_deref().unwrap_or_default()
    }

    pub fn set_min_instance_size(&mut self, size: &str) {
        self.min_instance_size = Some(size.to_string());
    }

    pub fn max_instance_size(&self) -> &str {
        self.max_instance_size.as_deref().unwrap_or_default()
    }

    pub fn set_max_instance_size(&mut self, size: &str) {
        self.max_instance_size = Some(size.to_string());
    }
}
