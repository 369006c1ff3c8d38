// Instance & volume inventory: per-region attachment index, then per-instance details
// (shape flags, boot volume + image, block volumes).

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::cloud::{BlockStorageApi, CloudApi, ComputeApi, IdentityApi};
use crate::models::{
    Attachment, AttachmentIndex, BlockVolumeInfo, BootSummary, Compartment, Instance,
    InventoryRecord, NO_DATA, Volume, VolumeRef, burstable_label,
};
use crate::regions::image_region;

const DETACHED: &str = "DETACHED";

/// Per-instance integrity failure; reported and skipped, the run continues.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("instance {name} ({instance_id}) has no boot volume attachment")]
    MissingBootVolume { instance_id: String, name: String },
}

impl InventoryError {
    pub fn instance_id(&self) -> &str {
        match self {
            InventoryError::MissingBootVolume { instance_id, .. } => instance_id,
        }
    }
}

pub async fn list_instances<C>(compute: &C, compartment_id: &str) -> anyhow::Result<Vec<Instance>>
where
    C: ComputeApi + ?Sized,
{
    compute.list_instances(compartment_id).await
}

/// Lists boot and block attachments in every availability domain of every compartment.
/// Must run once per region, before any metric query for that region.
#[instrument(skip(client, compartments), fields(operation = "build_attachment_index", compartments = compartments.len()))]
pub async fn build_attachment_index<C>(
    client: &C,
    compartments: &[Compartment],
) -> anyhow::Result<AttachmentIndex>
where
    C: IdentityApi + ComputeApi + ?Sized,
{
    let mut index = AttachmentIndex::default();
    for compartment in compartments {
        for ad in client.list_availability_domains(&compartment.id).await? {
            for a in client
                .list_boot_volume_attachments(&ad.name, &compartment.id)
                .await?
            {
                if a.lifecycle_state == DETACHED {
                    continue;
                }
                index.insert_boot(Attachment {
                    instance_id: a.instance_id,
                    volume: VolumeRef::BootVolume(a.boot_volume_id),
                    lifecycle_state: a.lifecycle_state,
                });
            }

            for a in client.list_volume_attachments(&ad.name, &compartment.id).await? {
                if a.lifecycle_state == DETACHED {
                    continue;
                }
                let Some(volume) = VolumeRef::from_volume_id(&a.volume_id) else {
                    warn!(volume_id = %a.volume_id, instance_id = %a.instance_id, "unrecognized volume id, attachment ignored");
                    continue;
                };
                index.insert_block(Attachment {
                    instance_id: a.instance_id,
                    volume,
                    lifecycle_state: a.lifecycle_state,
                });
            }
        }
    }
    debug!(
        boot = index.boot.len(),
        block_instances = index.block.len(),
        "attachment index built"
    );
    Ok(index)
}

/// Joins an instance with its volumes and shape details.
/// Only a missing boot attachment is an error; failed volume, image, reservation or
/// host lookups are logged and leave `no_data` / omitted entries.
#[instrument(skip_all, fields(operation = "describe_instance", instance_id = %instance.id))]
pub async fn describe_instance<C>(
    client: &C,
    compartment: &Compartment,
    instance: Instance,
    index: &AttachmentIndex,
    now: DateTime<Utc>,
) -> Result<InventoryRecord, InventoryError>
where
    C: CloudApi,
{
    let Some(boot_attachment) = index.boot_for(&instance.id) else {
        return Err(InventoryError::MissingBootVolume {
            instance_id: instance.id.clone(),
            name: instance.name().to_string(),
        });
    };

    let boot = describe_boot(client, boot_attachment.volume.id()).await;
    let blocks = describe_blocks(client, &instance, index.block_for(&instance.id)).await;

    let burstable = burstable_label(
        instance
            .shape_config
            .as_ref()
            .and_then(|s| s.baseline_ocpu_utilization.as_deref()),
    );
    let preemptible = if instance.is_preemptible() { "yes" } else { "none" }.to_string();

    let capacity_reservation = match instance.capacity_reservation_id.as_deref() {
        Some(id) if !id.is_empty() => match client.get_capacity_reservation(id).await {
            Ok(r) => r.display_name.trim().to_string(),
            Err(e) => {
                warn!(error = %e, reservation_id = %id, "capacity reservation lookup failed");
                NO_DATA.to_string()
            }
        },
        _ => "none".to_string(),
    };

    let dedicated_host = match instance.dedicated_vm_host_id.as_deref() {
        Some(id) if !id.is_empty() => match client.get_dedicated_vm_host(id).await {
            Ok(h) => h.display_name.trim().to_string(),
            Err(e) => {
                warn!(error = %e, host_id = %id, "dedicated VM host lookup failed");
                NO_DATA.to_string()
            }
        },
        _ => "none".to_string(),
    };

    Ok(InventoryRecord {
        compartment: compartment.name.clone(),
        region: client.region().to_string(),
        age_days: instance.age_days(now),
        instance,
        burstable,
        preemptible,
        capacity_reservation,
        dedicated_host,
        boot,
        blocks,
    })
}

async fn describe_boot<C>(client: &C, boot_volume_id: &str) -> BootSummary
where
    C: CloudApi,
{
    let volume = match client.get_boot_volume(boot_volume_id).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, boot_volume_id = %boot_volume_id, "boot volume lookup failed");
            return BootSummary::default();
        }
    };

    let mut summary = BootSummary {
        size_in_gbs: volume.size_in_gbs,
        vpus_per_gb: volume.vpus_per_gb,
        ..BootSummary::default()
    };

    let Some(image_id) = volume.image_id.as_deref().filter(|id| !id.is_empty()) else {
        return summary;
    };

    // Boot volumes moved between regions keep the image id of their origin region.
    let origin = image_region(image_id).filter(|r| r != client.region());
    match client.get_image(image_id, origin.as_deref()).await {
        Ok(image) => {
            summary.image_name = image.display_name.trim().to_string();
            summary.os_name = image.operating_system;
            summary.os_version = image.operating_system_version;
        }
        Err(e) => {
            warn!(
                error = %e,
                boot_volume = %volume.display_name.trim(),
                image_id = %image_id,
                "image lookup failed"
            );
        }
    }
    summary
}

async fn describe_blocks<C>(
    client: &C,
    instance: &Instance,
    attachments: &[Attachment],
) -> Vec<BlockVolumeInfo>
where
    C: BlockStorageApi + ?Sized,
{
    let mut out = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let looked_up: anyhow::Result<Volume> = match &attachment.volume {
            VolumeRef::BootVolume(id) => client.get_boot_volume(id).await,
            VolumeRef::BlockVolume(id) => client.get_volume(id).await,
        };
        match looked_up {
            Ok(v) => out.push(BlockVolumeInfo {
                name: v.display_name.trim().to_string(),
                size_in_gbs: v.size_in_gbs.unwrap_or(0),
                vpus_per_gb: v.vpus_per_gb.unwrap_or(0),
            }),
            Err(e) => warn!(
                error = %e,
                instance = %instance.name(),
                volume_id = %attachment.volume.id(),
                "block volume lookup failed, omitted from summary"
            ),
        }
    }
    out
}
