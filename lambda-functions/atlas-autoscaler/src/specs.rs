use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cluster::HardwareSpec;
use crate::request::SpecDelta;

/// The three node groups a region config can hold.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecKind {
    #[serde(rename = "electableSpecs")]
    Electable,
    #[serde(rename = "readOnlySpecs")]
    ReadOnly,
    #[serde(rename = "analyticsSpecs")]
    Analytics,
}

impl SpecKind {
    pub const ALL: [SpecKind; 3] = [Self::Electable, Self::ReadOnly, Self::Analytics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electable => "electableSpecs",
            Self::ReadOnly => "readOnlySpecs",
            Self::Analytics => "analyticsSpecs",
        }
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sizing attributes shared by every node group, on both the request and the
/// live document. Unset values read as `""` or `0`.
pub trait NodeSizing {
    fn instance_size(&self) -> &str;
    fn disk_iops(&self) -> i32;
    fn ebs_volume_type(&self) -> &str;
    fn node_count(&self) -> i32;
}

pub trait NodeSizingMut: NodeSizing {
    fn set_instance_size(&mut self, size: &str);
    fn set_disk_iops(&mut self, iops: i32);
    fn set_ebs_volume_type(&mut self, volume_type: &str);
    fn set_node_count(&mut self, count: i32);
}

impl NodeSizing for HardwareSpec {
    fn instance_size(&self) -> &str {
        self.instance_size.as_deref().unwrap_or_default()
    }

    fn disk_iops(&self) -> i32 {
        self.disk_iops.unwrap_or_default()
    }

    fn ebs_volume_type(&self) -> &str {
        self.ebs_volume_type.as_deref().unwrap_or_default()
    }

    fn node_count(&self) -> i32 {
        self.node_count.unwrap_or_default()
    }
}

impl NodeSizingMut for HardwareSpec {
    fn set_instance_size(&mut self, size: &str) {
        self.instance_size = Some(size.to_string());
    }

    fn set_disk_iops(&mut self, iops: i32) {
        self.disk_iops = Some(iops);
    }

    fn set_ebs_volume_type(&mut self, volume_type: &str) {
        self.ebs_volume_type = Some(volume_type.to_string());
    }

    fn set_node_count(&mut self, count: i32) {
        self.node_count = Some(count);
    }
}

impl NodeSizing for SpecDelta {
    fn instance_size(&self) -> &str {
        &self.instance_size
    }

    fn disk_iops(&self) -> i32 {
        self.disk_iops
    }

    fn ebs_volume_type(&self) -> &str {
        &self.ebs_volume_type
    }

    fn node_count(&self) -> i32 {
        self.node_count
    }
}
