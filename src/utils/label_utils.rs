use std::sync::OnceLock;

use regex::Regex;

use crate::models::container_models::ContainerRecord;

/// Label schema consumed by the grouping engine. Label values always take
/// precedence over name parsing, field by field.
pub const SERVICE_LABEL: &str = "concord.service";
pub const VERSION_LABEL: &str = "concord.version";
pub const BUILD_LABEL: &str = "concord.build";

/// `(serviceName, version, build)` triple extracted from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub service: String,
    pub version: String,
    pub build: Option<String>,
}

static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Container names like `service-name-v1.2.3` or `service-name-1.2.3-1700000000`.
fn name_pattern() -> &'static Regex {
    NAME_PATTERN.get_or_init(|| Regex::new(r"^(.+?)-(v?\d+\.\d+\.\d+)(?:-(\d+))?$").unwrap())
}

/// Extract service identity from labels, falling back to the name
/// pattern per field, then to a best-effort default. No container is ever
/// left without a service name.
///
/// The name pattern is a documented heuristic: a service whose own name
/// embeds a version-like substring will split at the first match.
pub fn parse_identity(container: &ContainerRecord) -> ServiceIdentity {
    // Label values are taken verbatim; only an empty value falls through
    // to the next source.
    let label = |key: &str| {
        container
            .labels
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
    };

    let captures = name_pattern().captures(&container.name);

    let service = label(SERVICE_LABEL)
        .or_else(|| {
            captures
                .as_ref()
                .map(|caps| caps[1].to_string())
        })
        .unwrap_or_else(|| base_name(&container.name));

    let version = label(VERSION_LABEL)
        .or_else(|| {
            captures.as_ref().map(|caps| {
                let raw = &caps[2];
                if raw.starts_with('v') {
                    raw.to_string()
                } else {
                    format!("v{}", raw)
                }
            })
        })
        .unwrap_or_else(|| "latest".to_string());

    let build = label(BUILD_LABEL).or_else(|| {
        captures
            .as_ref()
            .and_then(|caps| caps.get(3))
            .map(|m| m.as_str().to_string())
    });

    ServiceIdentity {
        service,
        version,
        build,
    }
}

/// Last path segment before any tag suffix, e.g.
/// `registry.local/team/app:v1` becomes `app`.
fn base_name(name: &str) -> String {
    let before_tag = name.split(':').next().unwrap_or(name);
    before_tag
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::container_models::ContainerState;

    fn container(name: &str, labels: &[(&str, &str)]) -> ContainerRecord {
        ContainerRecord {
            id: "c0ffee000000".to_string(),
            name: name.to_string(),
            image: "ignored:latest".to_string(),
            image_id: "abc123def456".to_string(),
            state: ContainerState::Exited,
            status: String::new(),
            created: 0,
            ports: vec![],
            volumes: vec![],
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            command: String::new(),
        }
    }

    #[test]
    fn labels_win_over_name_parsing() {
        let c = container(
            "totally-unrelated-v9.9.9-123",
            &[
                (SERVICE_LABEL, "billing"),
                (VERSION_LABEL, "v2.4.0"),
                (BUILD_LABEL, "1700000000"),
            ],
        );
        let identity = parse_identity(&c);
        assert_eq!(identity.service, "billing");
        assert_eq!(identity.version, "v2.4.0");
        assert_eq!(identity.build.as_deref(), Some("1700000000"));
    }

    #[test]
    fn label_values_pass_through_verbatim() {
        let c = container(
            "web",
            &[(SERVICE_LABEL, "Billing Team "), (VERSION_LABEL, "2.4.0-rc1")],
        );
        let identity = parse_identity(&c);
        assert_eq!(identity.service, "Billing Team ");
        assert_eq!(identity.version, "2.4.0-rc1");

        // An empty value is no value: the next source takes over.
        let c = container("worker-2.1.0", &[(SERVICE_LABEL, "")]);
        assert_eq!(parse_identity(&c).service, "worker");
    }

    #[test]
    fn missing_label_fields_fall_back_individually() {
        let c = container("api-gateway-v1.2.3-42", &[(SERVICE_LABEL, "gateway")]);
        let identity = parse_identity(&c);
        assert_eq!(identity.service, "gateway");
        assert_eq!(identity.version, "v1.2.3");
        assert_eq!(identity.build.as_deref(), Some("42"));
    }

    #[test]
    fn name_pattern_extracts_prefix_version_build() {
        let identity = parse_identity(&container("my-web-app-v1.0.0-100", &[]));
        assert_eq!(identity.service, "my-web-app");
        assert_eq!(identity.version, "v1.0.0");
        assert_eq!(identity.build.as_deref(), Some("100"));
    }

    #[test]
    fn bare_version_is_normalized_with_leading_v() {
        let identity = parse_identity(&container("worker-2.1.0", &[]));
        assert_eq!(identity.service, "worker");
        assert_eq!(identity.version, "v2.1.0");
        assert_eq!(identity.build, None);
    }

    #[test]
    fn unparseable_names_get_best_effort_defaults() {
        let identity = parse_identity(&container("registry.local/team/app:v1", &[]));
        assert_eq!(identity.service, "app");
        assert_eq!(identity.version, "latest");
        assert_eq!(identity.build, None);

        let identity = parse_identity(&container("plain-name", &[]));
        assert_eq!(identity.service, "plain-name");
        assert_eq!(identity.version, "latest");
    }

    #[test]
    fn version_like_substring_in_service_name_misparses_as_documented() {
        // Heuristic limitation pinned on purpose: a deployable literally
        // named "kafka-2.8.0" still splits into service + version.
        let identity = parse_identity(&container("kafka-2.8.0", &[]));
        assert_eq!(identity.service, "kafka");
        assert_eq!(identity.version, "v2.8.0");

        // With two version-like tokens the trailing one wins the anchor.
        let identity = parse_identity(&container("app-v1.0.0-demo-v2.0.0", &[]));
        assert_eq!(identity.service, "app-v1.0.0-demo");
        assert_eq!(identity.version, "v2.0.0");
    }
}
