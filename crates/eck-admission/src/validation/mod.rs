//! The validation pipeline: every kind declares ordered lists of checks, the
//! [`driver`] runs them for an admission operation and aggregates the field
//! errors into one outcome.
//!
//! Checks are plain functions. They only read their input and the immutable
//! [`ValidationContext`], so any number of reviews can be validated
//! concurrently.
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps;
use kube::{CustomResourceExt, Resource};
use serde::{Serialize, de::DeserializeOwned};

use crate::{field::ErrorList, supported_versions::SupportedVersions};

pub mod driver;
pub mod rules;
pub mod unknown_fields;

pub use driver::*;

/// Immutable configuration available to every check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationContext {
    pub supported_versions: SupportedVersions,
}

impl ValidationContext {
    pub fn new(supported_versions: SupportedVersions) -> Self {
        Self { supported_versions }
    }
}

/// Validates a new resource, on create and update.
pub type Check<R> = fn(&ValidationContext, &R) -> ErrorList;

/// Validates the transition from the old to the new resource, on update only.
pub type UpdateCheck<R> = fn(&ValidationContext, &R, &R) -> ErrorList;

/// Implemented by every custom resource kind admitted by the webhook.
pub trait Validate:
    Resource<DynamicType = ()> + CustomResourceExt + DeserializeOwned + Serialize + Clone + 'static
{
    /// Run in this order on create and update.
    fn base_checks() -> &'static [Check<Self>];

    /// Run in this order on update, before the base checks.
    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[]
    }

    /// The OpenAPI schema of the served version of the kind.
    fn open_api_schema() -> &'static JSONSchemaProps;

    /// Non-fatal findings returned alongside an accepted resource.
    fn warnings(&self, _ctx: &ValidationContext) -> Vec<String> {
        Vec::new()
    }
}

/// Extracts the OpenAPI schema of `R` from its generated CRD. Kinds without a
/// schema get an empty one, which disables unknown field detection.
pub fn schema_of<R>() -> JSONSchemaProps
where
    R: CustomResourceExt + Resource<DynamicType = ()>,
{
    let version = R::version(&());

    R::crd()
        .spec
        .versions
        .into_iter()
        .find(|served| served.name == version)
        .and_then(|served| served.schema)
        .and_then(|validation| validation.open_api_v3_schema)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use rstest::rstest;

    use super::*;
    use crate::crd::{
        agent::Agent, elasticsearch::v1::Elasticsearch, kibana::Kibana, logstash::Logstash,
    };

    /// Type-erases the check tables of a kind.
    fn check_tables<R: Validate>() -> (Box<dyn Any + Send + Sync>, Box<dyn Any + Send + Sync>) {
        (Box::new(R::base_checks()), Box::new(R::update_checks()))
    }

    fn base_check_count<R: Validate>() -> Option<usize> {
        let (base, _) = check_tables::<R>();
        base.downcast_ref::<&'static [Check<R>]>().map(|checks| checks.len())
    }

    fn update_check_count<R: Validate>() -> Option<usize> {
        let (_, update) = check_tables::<R>();
        update.downcast_ref::<&'static [UpdateCheck<R>]>().map(|checks| checks.len())
    }

    #[rstest]
    #[case::kibana(base_check_count::<Kibana>(), update_check_count::<Kibana>())]
    #[case::agent(base_check_count::<Agent>(), update_check_count::<Agent>())]
    #[case::elasticsearch(base_check_count::<Elasticsearch>(), update_check_count::<Elasticsearch>())]
    #[case::logstash(base_check_count::<Logstash>(), update_check_count::<Logstash>())]
    fn check_tables_outlive_validation(#[case] base: Option<usize>, #[case] update: Option<usize>) {
        assert!(base.is_some_and(|count| count > 0));
        assert!(update.is_some_and(|count| count > 0));
    }
}
