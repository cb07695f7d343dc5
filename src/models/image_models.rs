use serde::Serialize;

/// One image as seen in a listing, or a synthesized placeholder when a
/// container references an image the daemon no longer reports.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    /// truncated display id (12 hex chars)
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub size: String,
    pub created: String,
    /// true iff some running container references this image
    pub is_running: bool,
}

impl ImageRecord {
    /// Placeholder for a container whose image record is gone. The
    /// container keeps its visibility in the dashboard either way.
    pub fn placeholder(image_ref: &str, image_id: &str) -> Self {
        let (repository, tag) = split_image_ref(image_ref);
        ImageRecord {
            id: image_id.to_string(),
            repository,
            tag,
            size: "Unknown".to_string(),
            created: "Unknown".to_string(),
            is_running: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.size == "Unknown"
    }
}

/// Strip a "sha256:" prefix and truncate to the 12-char display form.
pub fn short_id(raw: &str) -> String {
    let stripped = raw.strip_prefix("sha256:").unwrap_or(raw);
    stripped.chars().take(12).collect()
}

/// Split an image reference into (repository, tag). The tag separator is
/// the last ':' after the last '/', so registry ports survive.
pub fn split_image_ref(image_ref: &str) -> (String, String) {
    let slash = image_ref.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image_ref[slash..].rfind(':') {
        Some(colon) => {
            let repo = &image_ref[..slash + colon];
            let tag = &image_ref[slash + colon + 1..];
            (
                if repo.is_empty() { "<none>" } else { repo }.to_string(),
                if tag.is_empty() { "<none>" } else { tag }.to_string(),
            )
        }
        None => (
            if image_ref.is_empty() { "<none>" } else { image_ref }.to_string(),
            "<none>".to_string(),
        ),
    }
}

pub fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}

/// Rough "docker images"-style age string.
pub fn created_since(created: i64, now: i64) -> String {
    let secs = (now - created).max(0);
    let (count, unit) = if secs < 60 {
        (secs, "second")
    } else if secs < 3600 {
        (secs / 60, "minute")
    } else if secs < 86_400 {
        (secs / 3600, "hour")
    } else if secs < 86_400 * 30 {
        (secs / 86_400, "day")
    } else if secs < 86_400 * 365 {
        (secs / (86_400 * 30), "month")
    } else {
        (secs / (86_400 * 365), "year")
    };
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_strips_digest_prefix() {
        assert_eq!(
            short_id("sha256:3f5dd6647bd1e5fcb1f56f3bb0472b426b644ea3510dc64d92e7fa24caf0b075"),
            "3f5dd6647bd1"
        );
        assert_eq!(short_id("abc123"), "abc123");
    }

    #[test]
    fn image_ref_split_handles_registry_ports() {
        assert_eq!(
            split_image_ref("registry.local:5000/team/app:v1.2.3"),
            ("registry.local:5000/team/app".to_string(), "v1.2.3".to_string())
        );
        assert_eq!(
            split_image_ref("nginx"),
            ("nginx".to_string(), "<none>".to_string())
        );
        assert_eq!(
            split_image_ref("nginx:latest"),
            ("nginx".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn placeholder_has_unknown_size_and_created() {
        let img = ImageRecord::placeholder("svc:v1.0.0", "deadbeef0000");
        assert!(img.is_placeholder());
        assert_eq!(img.repository, "svc");
        assert_eq!(img.tag, "v1.0.0");
        assert_eq!(img.created, "Unknown");
    }

    #[test]
    fn sizes_render_in_decimal_units() {
        assert_eq!(human_size(512), "512B");
        assert_eq!(human_size(1_500), "1.5kB");
        assert_eq!(human_size(142_000_000), "142.0MB");
    }

    #[test]
    fn age_string_picks_the_largest_unit() {
        assert_eq!(created_since(0, 90), "1 minute ago");
        assert_eq!(created_since(0, 86_400 * 3), "3 days ago");
        assert_eq!(created_since(0, 86_400 * 40), "1 month ago");
    }
}
