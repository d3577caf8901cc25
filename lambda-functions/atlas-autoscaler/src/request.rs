//! Inbound scaling event.
//!
//! Empty strings and zeros mean "not requested": there is no way to ask for
//! zero IOPS or an empty instance size.

use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ScalingError;
use crate::specs::SpecKind;

/// Decode `null` the same way as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct ScalingRequest {
    #[builder(default)]
    #[serde(default, deserialize_with = "null_as_default")]
    pub project: String,

    #[builder(default)]
    #[serde(default, deserialize_with = "null_as_default")]
    pub cluster: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electable_specs: Option<SpecDelta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_specs: Option<SpecDelta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_specs: Option<SpecDelta>,
}

#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct SpecDelta {
    #[builder(default)]
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub instance_size: String,

    #[builder(default)]
    #[serde(
        default,
        rename = "diskIOPS",
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_zero"
    )]
    pub disk_iops: i32,

    #[builder(default)]
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub ebs_volume_type: String,

    #[builder(default)]
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_zero"
    )]
    pub node_count: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scale: Option<AutoScaleBounds>,
}

#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct AutoScaleBounds {
    #[builder(default)]
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub min_instance_size: String,

    #[builder(default)]
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub max_instance_size: String,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

impl AutoScaleBounds {
    pub fn is_empty(&self) -> bool {
        self.min_instance_size.is_empty() && self.max_instance_size.is_empty()
    }
}

impl SpecDelta {
    /// Whether any field carries a value other than the "unchanged" sentinel.
    pub fn has_requested_fields(&self) -> bool {
        !self.instance_size.is_empty()
            || self.disk_iops != 0
            || !self.ebs_volume_type.is_empty()
            || self.node_count != 0
            || self.auto_scale.as_ref().is_some_and(|b| !b.is_empty())
    }

    pub fn min_instance_size(&self) -> &str {
        self.auto_scale
            .as_ref()
            .map(|b| b.min_instance_size.as_str())
            .unwrap_or_default()
    }

    pub fn max_instance_size(&self) -> &str {
        self.auto_scale
            .as_ref()
            .map(|b| b.max_instance_size.as_str())
            .unwrap_or_default()
    }
}

impl ScalingRequest {
    pub fn delta(&self, kind: SpecKind) -> Option<&SpecDelta> {
        match kind {
            SpecKind::Electable => self.electable_specs.as_ref(),
            SpecKind::ReadOnly => self.read_only_specs.as_ref(),
            SpecKind::Analytics => self.analytics_specs.as_ref(),
        }
    }

    /// Check the request can be acted on. No network call may happen before this.
    pub fn validate(self) -> Result<ValidRequest, ScalingError> {
        if self.project.trim().is_empty() || self.cluster.trim().is_empty() {
            return Err(ScalingError::Validation(
                "project and cluster must not be empty".to_string(),
            ));
        }

        let requested = SpecKind::ALL
            .iter()
            .filter_map(|kind| self.delta(*kind))
            .any(SpecDelta::has_requested_fields);

        if !requested {
            return Err(ScalingError::Validation(
                "at least one scaling parameter (instanceSize, diskIOPS, ebsVolumeType, nodeCount, autoScale) must be provided in any specs"
                    .to_string(),
            ));
        }

        Ok(ValidRequest(self))
    }
}

/// A request that passed [`ScalingRequest::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRequest(ScalingRequest);

impl std::ops::Deref for ValidRequest {
    type Target = ScalingRequest;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
