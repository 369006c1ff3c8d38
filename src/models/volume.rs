// Boot/block volume attachments and the per-region attachment index

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootVolumeAttachment {
    pub instance_id: String,
    pub boot_volume_id: String,
    #[serde(default)]
    pub compartment_id: String,
    #[serde(default)]
    pub availability_domain: String,
    pub lifecycle_state: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAttachment {
    pub instance_id: String,
    pub volume_id: String,
    pub lifecycle_state: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Which storage API owns a volume. Decided once from the identifier prefix, since a
/// boot volume can also be attached to another instance as a block volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VolumeRef {
    BootVolume(String),
    BlockVolume(String),
}

impl VolumeRef {
    /// `ocid1.bootvolume.*` or `ocid1.volume.*`; anything else is not a volume we can look up.
    pub fn from_volume_id(id: &str) -> Option<Self> {
        if id.starts_with("ocid1.bootvolume") {
            Some(VolumeRef::BootVolume(id.to_string()))
        } else if id.starts_with("ocid1.volume") {
            Some(VolumeRef::BlockVolume(id.to_string()))
        } else {
            None
        }
    }

    pub fn id(&self) -> &str {
        match self {
            VolumeRef::BootVolume(id) | VolumeRef::BlockVolume(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub instance_id: String,
    pub volume: VolumeRef,
    pub lifecycle_state: String,
}

/// Built once per region before any metric query; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AttachmentIndex {
    /// At most one boot attachment per instance (last write wins).
    pub boot: HashMap<String, Attachment>,
    /// Every block attachment per instance, in listing order.
    pub block: HashMap<String, Vec<Attachment>>,
}

impl AttachmentIndex {
    pub fn insert_boot(&mut self, attachment: Attachment) {
        self.boot.insert(attachment.instance_id.clone(), attachment);
    }

    pub fn insert_block(&mut self, attachment: Attachment) {
        self.block
            .entry(attachment.instance_id.clone())
            .or_default()
            .push(attachment);
    }

    pub fn boot_for(&self, instance_id: &str) -> Option<&Attachment> {
        self.boot.get(instance_id)
    }

    pub fn block_for(&self, instance_id: &str) -> &[Attachment] {
        self.block.get(instance_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// No boot attachments means no instances in this region.
    pub fn is_empty(&self) -> bool {
        self.boot.is_empty()
    }
}

/// Boot or block volume details (both APIs return the same fields we use).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: String,
    pub display_name: String,
    #[serde(default, rename = "sizeInGBs")]
    pub size_in_gbs: Option<i64>,
    #[serde(default, rename = "vpusPerGB")]
    pub vpus_per_gb: Option<i64>,
    /// Boot volumes only.
    #[serde(default)]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub operating_system: String,
    #[serde(default)]
    pub operating_system_version: String,
}
