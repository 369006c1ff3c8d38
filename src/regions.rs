// Region identifiers embedded in resource ids, and the short region keys older ids use.

const REGION_KEYS: &[(&str, &str)] = &[
    ("iad", "us-ashburn-1"),
    ("phx", "us-phoenix-1"),
    ("sjc", "us-sanjose-1"),
    ("ord", "us-chicago-1"),
    ("yyz", "ca-toronto-1"),
    ("yul", "ca-montreal-1"),
    ("gru", "sa-saopaulo-1"),
    ("vcp", "sa-vinhedo-1"),
    ("scl", "sa-santiago-1"),
    ("bog", "sa-bogota-1"),
    ("qro", "mx-queretaro-1"),
    ("mty", "mx-monterrey-1"),
    ("fra", "eu-frankfurt-1"),
    ("ams", "eu-amsterdam-1"),
    ("zrh", "eu-zurich-1"),
    ("mrs", "eu-marseille-1"),
    ("lin", "eu-milan-1"),
    ("arn", "eu-stockholm-1"),
    ("cdg", "eu-paris-1"),
    ("mad", "eu-madrid-1"),
    ("lhr", "uk-london-1"),
    ("cwl", "uk-cardiff-1"),
    ("nrt", "ap-tokyo-1"),
    ("kix", "ap-osaka-1"),
    ("icn", "ap-seoul-1"),
    ("yny", "ap-chuncheon-1"),
    ("bom", "ap-mumbai-1"),
    ("hyd", "ap-hyderabad-1"),
    ("syd", "ap-sydney-1"),
    ("mel", "ap-melbourne-1"),
    ("sin", "ap-singapore-1"),
    ("jed", "me-jeddah-1"),
    ("dxb", "me-dubai-1"),
    ("auh", "me-abudhabi-1"),
    ("jnb", "af-johannesburg-1"),
    ("mtz", "il-jerusalem-1"),
];

/// Full region name for a short key (`iad` -> `us-ashburn-1`); names pass through unchanged.
pub fn normalize_region(region: &str) -> String {
    let lower = region.to_ascii_lowercase();
    REGION_KEYS
        .iter()
        .find(|(key, _)| *key == lower)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or(lower)
}

/// Region segment of an image id (`ocid1.image.oc1.<region>.<unique>`), normalized.
/// `None` for region-less ids (`ocid1.image.oc1..<unique>`) and anything that is not an image id.
pub fn image_region(image_id: &str) -> Option<String> {
    let parts: Vec<&str> = image_id.split('.').collect();
    if parts.len() < 5 || parts[0] != "ocid1" || !parts[1].eq_ignore_ascii_case("image") {
        return None;
    }
    let region = parts[3];
    if region.is_empty() {
        None
    } else {
        Some(normalize_region(region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_region_reads_full_region_name() {
        assert_eq!(
            image_region("ocid1.image.oc1.sa-saopaulo-1.aaaaexample").as_deref(),
            Some("sa-saopaulo-1")
        );
    }

    #[test]
    fn image_region_maps_short_keys() {
        assert_eq!(
            image_region("ocid1.image.oc1.iad.aaaaexample").as_deref(),
            Some("us-ashburn-1")
        );
    }

    #[test]
    fn image_region_is_none_for_regionless_ids() {
        assert_eq!(image_region("ocid1.image.oc1..aaaaexample"), None);
        assert_eq!(image_region("ocid1.volume.oc1.iad.aaaa"), None);
        assert_eq!(image_region("garbage"), None);
    }

    #[test]
    fn normalize_region_keeps_unknown_names() {
        assert_eq!(normalize_region("us-ashburn-1"), "us-ashburn-1");
        assert_eq!(normalize_region("PHX"), "us-phoenix-1");
    }
}
