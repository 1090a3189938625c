//! Checks shared by several kinds. Kind specific checks live next to their
//! kind in [`crate::crd`].
use std::str::FromStr;

use eck_version::Version;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::{Resource, ResourceExt};
use serde_json::Value;

use crate::{
    commons::{association::Associated, config::ConfigSource, monitoring::Monitoring},
    constants::{DISABLE_DOWNGRADE_VALIDATION_ANNOTATION, NAME_MAX_LENGTH},
    field::{ErrorList, FieldError, FieldPath},
    quantity::Quantity,
    supported_versions::Product,
    validation::{Validate, ValidationContext, unknown_fields},
};

/// Resources running a versioned product.
pub trait Versioned {
    /// The raw `spec.version`.
    fn version(&self) -> &str;

    /// The product whose supported versions apply.
    fn product(&self) -> Product;
}

/// Resources configured inline or through a Secret.
pub trait Configurable {
    fn config(&self) -> Option<&Value>;
    fn config_ref(&self) -> Option<&ConfigSource>;
}

/// Resources shipping their metrics and logs to monitoring clusters.
pub trait Monitored: Versioned {
    fn monitoring(&self) -> Option<&Monitoring>;
}

pub fn version_path() -> FieldPath {
    FieldPath::new("spec").child("version")
}

/// Parses `version`, reporting a failure as an error on `spec.version`.
pub fn parse_version(version: &str) -> Result<Version, FieldError> {
    Version::from_str(version).map_err(|err| {
        FieldError::invalid(version_path(), version, format!("Invalid version: {err}"))
    })
}

pub fn no_unknown_fields<R: Validate>(_ctx: &ValidationContext, resource: &R) -> ErrorList {
    unknown_fields::check(resource.annotations(), R::open_api_schema())
}

pub fn name_length<R: Resource>(_ctx: &ValidationContext, resource: &R) -> ErrorList {
    let name = resource.meta().name.as_deref().unwrap_or_default();
    if name.len() > NAME_MAX_LENGTH {
        return vec![FieldError::too_long(
            FieldPath::new("metadata").child("name"),
            name,
            NAME_MAX_LENGTH,
        )];
    }
    ErrorList::new()
}

pub fn supported_version<R: Versioned>(ctx: &ValidationContext, resource: &R) -> ErrorList {
    let version = match parse_version(resource.version()) {
        Ok(version) => version,
        Err(err) => return vec![err],
    };

    match ctx.supported_versions.check(resource.product(), &version) {
        Ok(()) => ErrorList::new(),
        Err(err) => vec![FieldError::invalid(
            version_path(),
            resource.version(),
            format!("Unsupported version: {err}"),
        )],
    }
}

/// Returns `true` if the user opted out of the downgrade protection.
pub fn allows_downgrades<R: Resource>(resource: &R) -> bool {
    resource
        .annotations()
        .get(DISABLE_DOWNGRADE_VALIDATION_ANNOTATION)
        .is_some_and(|value| value == "true")
}

pub fn no_downgrade<R: Versioned + Resource>(
    _ctx: &ValidationContext,
    old: &R,
    new: &R,
) -> ErrorList {
    if allows_downgrades(new) || old.version().is_empty() {
        return ErrorList::new();
    }

    let (old_version, new_version) = match (parse_version(old.version()), parse_version(new.version())) {
        (Ok(old_version), Ok(new_version)) => (old_version, new_version),
        (Err(err), _) | (_, Err(err)) => return vec![err],
    };

    if new_version < old_version {
        tracing::debug!(
            old.version = %old_version,
            new.version = %new_version,
            "rejecting version downgrade"
        );
        return vec![FieldError::forbidden(
            version_path(),
            "Version downgrades are not supported",
        )];
    }

    ErrorList::new()
}

pub fn single_config_source<R: Configurable>(_ctx: &ValidationContext, resource: &R) -> ErrorList {
    at_most_one_of_both(
        (
            FieldPath::new("spec").child("config"),
            resource.config().is_some(),
        ),
        (
            FieldPath::new("spec").child("configRef"),
            resource.config_ref().is_some(),
        ),
        "Specify at most one of [`config`, `configRef`], not both",
    )
}

/// A `Forbidden` error on both paths if both fields are set.
pub fn at_most_one_of_both(
    (first, first_set): (FieldPath, bool),
    (second, second_set): (FieldPath, bool),
    detail: &str,
) -> ErrorList {
    if first_set && second_set {
        return vec![
            FieldError::forbidden(first, detail),
            FieldError::forbidden(second, detail),
        ];
    }
    ErrorList::new()
}

/// A `Forbidden` error on each set field if more than one of `options` is set.
/// The detail lists the set option names in declaration order.
pub fn at_most_one_of(parent: &FieldPath, options: &[(&str, bool)]) -> ErrorList {
    let set: Vec<&str> = options
        .iter()
        .filter(|(_, is_set)| *is_set)
        .map(|(name, _)| *name)
        .collect();

    if set.len() <= 1 {
        return ErrorList::new();
    }

    let detail = format!("Specify at most one of [{names}]", names = set.join(", "));

    set.into_iter()
        .map(|name| FieldError::forbidden(parent.child(name), &detail))
        .collect()
}

pub fn associations<R: Associated>(_ctx: &ValidationContext, resource: &R) -> ErrorList {
    resource
        .association_refs()
        .into_iter()
        .filter_map(|association| {
            association.selector.is_valid().err().map(|err| {
                FieldError::forbidden(
                    association.path,
                    format!("Invalid association reference: {err}"),
                )
            })
        })
        .collect()
}

pub fn monitoring<R: Monitored>(ctx: &ValidationContext, resource: &R) -> ErrorList {
    resource.monitoring().map_or_else(ErrorList::new, |monitoring| {
        monitoring.validate(
            resource.version(),
            &ctx.supported_versions.stack_monitoring_min,
        )
    })
}

/// Deprecation warning for the version of `resource`, if any.
pub fn deprecation_warnings<R: Versioned>(ctx: &ValidationContext, resource: &R) -> Vec<String> {
    Version::from_str(resource.version())
        .ok()
        .and_then(|version| {
            ctx.supported_versions
                .deprecation_warning(resource.product(), &version)
        })
        .into_iter()
        .collect()
}

/// Volume claim templates with their quantities replaced by plain numbers, so
/// that `1Ti` and `1024Gi` compare equal.
pub fn normalized_claims(claims: &[PersistentVolumeClaim]) -> Value {
    let mut claims = serde_json::to_value(claims).unwrap_or(Value::Null);

    if let Value::Array(claims) = &mut claims {
        for claim in claims {
            for pointer in [
                "/spec/resources/requests",
                "/spec/resources/limits",
                "/status/capacity",
            ] {
                if let Some(Value::Object(quantities)) = claim.pointer_mut(pointer) {
                    for quantity in quantities.values_mut() {
                        normalize_quantity(quantity);
                    }
                }
            }
        }
    }

    claims
}

fn normalize_quantity(value: &mut Value) {
    let parsed = value
        .as_str()
        .and_then(|quantity| Quantity::from_str(quantity).ok());
    if let Some(quantity) = parsed {
        *value = Value::from(quantity.as_base_units());
    }
}

/// An `Invalid` error if the templates differ semantically.
pub fn claims_unchanged(
    path: FieldPath,
    old: &[PersistentVolumeClaim],
    new: &[PersistentVolumeClaim],
) -> ErrorList {
    if normalized_claims(old) == normalized_claims(new) {
        return ErrorList::new();
    }

    vec![FieldError::invalid(
        path,
        new,
        "Volume claim templates cannot be modified",
    )]
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn claim(name: &str, storage: &str) -> PersistentVolumeClaim {
        serde_json::from_value(serde_json::json!({
            "metadata": {"name": name},
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "resources": {"requests": {"storage": storage}}
            }
        }))
        .expect("valid claim")
    }

    #[rstest]
    #[case(&[], &[], false)]
    #[case(&[("data", "1Ti")], &[("data", "1024Gi")], false)]
    #[case(&[("data", "1G")], &[("data", "1000M")], false)]
    #[case(&[("data", "1G")], &[("data", "1Gi")], true)]
    #[case(&[("data", "1Gi")], &[("data", "2Gi")], true)]
    #[case(&[("data", "1Gi")], &[("other", "1Gi")], true)]
    #[case(&[("data", "1Gi")], &[], true)]
    fn claims_unchanged_compares_semantically(
        #[case] old: &[(&str, &str)],
        #[case] new: &[(&str, &str)],
        #[case] rejected: bool,
    ) {
        let old: Vec<_> = old.iter().map(|(name, storage)| claim(name, storage)).collect();
        let new: Vec<_> = new.iter().map(|(name, storage)| claim(name, storage)).collect();

        let errors = claims_unchanged(FieldPath::new("spec").child("volumeClaimTemplates"), &old, &new);
        assert_eq!(!errors.is_empty(), rejected);
    }

    #[test]
    fn at_most_one_of_reports_every_set_option() {
        let errors = at_most_one_of(
            &FieldPath::new("spec"),
            &[("daemonSet", true), ("deployment", false), ("statefulSet", true)],
        );

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].to_string(),
            "spec.daemonSet: Forbidden: Specify at most one of [daemonSet, statefulSet]"
        );
        assert_eq!(errors[1].path.to_string(), "spec.statefulSet");
    }

    #[test]
    fn at_most_one_of_accepts_a_single_option() {
        assert!(
            at_most_one_of(&FieldPath::new("spec"), &[("daemonSet", true), ("deployment", false)])
                .is_empty()
        );
    }

    #[rstest]
    #[case("8.1.0", Ok(Version::new(8, 1, 0)))]
    #[case(
        "8.1",
        Err(r#"spec.version: Invalid value: "8.1": Invalid version: No Major.Minor.Patch elements found"#)
    )]
    fn parse_version_errors(#[case] input: &str, #[case] expected: Result<Version, &str>) {
        let parsed = parse_version(input).map_err(|err| err.to_string());
        assert_eq!(parsed, expected.map_err(str::to_owned));
    }
}
