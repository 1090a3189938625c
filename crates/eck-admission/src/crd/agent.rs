//! Elastic Agent, running either standalone with a local configuration or
//! enrolled in Fleet.
use std::sync::LazyLock;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    commons::{
        association::{Associated, AssociationRef, AssociationType},
        config::{ConfigSource, SecretSource},
        http::HttpConfig,
        selector::ObjectSelector,
        status::DeploymentStatus,
        workload::{DaemonSetSpec, DeploymentSpec, StatefulSetSpec},
    },
    constants::DEFAULT_OUTPUT_NAME,
    field::{ErrorList, FieldError, FieldPath},
    supported_versions::Product,
    utils::raw_object_schema,
    validation::{
        Check, UpdateCheck, Validate, ValidationContext,
        rules::{self, Configurable, Versioned},
        schema_of,
    },
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "agent.k8s.elastic.co",
    version = "v1alpha1",
    kind = "Agent",
    namespaced,
    status = "DeploymentStatus",
    shortname = "agent"
)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// Version of the Agent.
    pub version: String,

    /// Elasticsearch clusters the Agent ships data to, each one becoming an
    /// output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elasticsearch_refs: Vec<Output>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Agent configuration, mutually exclusive with `configRef`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub config: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ConfigSource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secure_settings: Vec<SecretSource>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_set: Option<DaemonSetSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful_set: Option<StatefulSetSpec>,

    /// Only used when Fleet Server is enabled.
    #[serde(default)]
    pub http: HttpConfig,

    /// Defaults to `standalone`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<AgentMode>,

    #[serde(default)]
    pub fleet_server_enabled: bool,

    /// Kibana to set up Fleet in. Fleet mode only.
    #[serde(default)]
    pub kibana_ref: ObjectSelector,

    /// Fleet Server to enroll in. Fleet mode only.
    #[serde(default)]
    pub fleet_server_ref: ObjectSelector,

    /// Fleet policy to enroll in.
    #[serde(default, rename = "policyID", skip_serializing_if = "String::is_empty")]
    pub policy_id: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AgentMode {
    Standalone,
    Fleet,
}

/// An Elasticsearch cluster used as output of the Agent.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    #[serde(flatten)]
    pub selector: ObjectSelector,

    /// Name of the output in the Agent configuration.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_name: String,
}

impl AgentSpec {
    pub fn fleet_mode_enabled(&self) -> bool {
        self.mode == Some(AgentMode::Fleet)
    }

    pub fn standalone_mode_enabled(&self) -> bool {
        matches!(self.mode, None | Some(AgentMode::Standalone))
    }
}

impl Versioned for Agent {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        if self.spec.fleet_mode_enabled() {
            Product::AgentFleet
        } else {
            Product::AgentStandalone
        }
    }
}

impl Configurable for Agent {
    fn config(&self) -> Option<&Value> {
        self.spec.config.as_ref()
    }

    fn config_ref(&self) -> Option<&ConfigSource> {
        self.spec.config_ref.as_ref()
    }
}

impl Associated for Agent {
    fn association_refs(&self) -> Vec<AssociationRef> {
        let spec = FieldPath::new("spec");

        self.spec
            .elasticsearch_refs
            .iter()
            .map(|output| {
                AssociationRef::new(
                    AssociationType::Elasticsearch,
                    spec.child("elasticsearchRefs"),
                    &output.selector,
                )
                .multi()
            })
            .chain([
                AssociationRef::new(
                    AssociationType::Kibana,
                    spec.child("kibanaRef"),
                    &self.spec.kibana_ref,
                ),
                AssociationRef::new(
                    AssociationType::FleetServer,
                    spec.child("fleetServerRef"),
                    &self.spec.fleet_server_ref,
                ),
            ])
            .collect()
    }
}

impl Validate for Agent {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            check_policy_id,
            rules::no_unknown_fields::<Self>,
            rules::name_length::<Self>,
            rules::supported_version::<Self>,
            check_at_most_one_deployment_option,
            check_at_most_one_default_es_ref,
            check_es_refs_named,
            rules::single_config_source::<Self>,
            check_exactly_one_deployment_option,
            check_empty_config_in_fleet_mode,
            check_fleet_server_only_in_fleet_mode,
            check_http_config_only_for_fleet_server,
            check_fleet_server_or_fleet_server_ref,
            check_reference_set_for_mode,
            check_single_es_ref_in_fleet_mode,
            rules::associations::<Self>,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>, check_pvc_changes]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<Agent>);
        &SCHEMA
    }

    fn warnings(&self, ctx: &ValidationContext) -> Vec<String> {
        rules::deprecation_warnings(ctx, self)
    }
}

fn spec_path() -> FieldPath {
    FieldPath::new("spec")
}

fn check_policy_id(ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    let version = match rules::parse_version(&agent.spec.version) {
        Ok(version) => version,
        Err(err) => return vec![err],
    };

    if version >= ctx.supported_versions.policy_id_mandatory_from && agent.spec.policy_id.is_empty() {
        return vec![FieldError::required(
            spec_path().child("policyID"),
            "Agent policyID is mandatory",
        )];
    }
    ErrorList::new()
}

fn check_at_most_one_deployment_option(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    rules::at_most_one_of(&spec_path(), &deployment_options(&agent.spec))
}

fn check_exactly_one_deployment_option(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    let enabled = deployment_options(&agent.spec)
        .iter()
        .filter(|(_, enabled)| *enabled)
        .count();

    if enabled != 1 {
        return vec![FieldError::invalid_omit_value(
            spec_path(),
            "either daemonSet or deployment or statefulSet must be specified",
        )];
    }
    ErrorList::new()
}

fn deployment_options(spec: &AgentSpec) -> [(&'static str, bool); 3] {
    [
        ("daemonSet", spec.daemon_set.is_some()),
        ("deployment", spec.deployment.is_some()),
        ("statefulSet", spec.stateful_set.is_some()),
    ]
}

fn check_at_most_one_default_es_ref(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    let defaults = agent
        .spec
        .elasticsearch_refs
        .iter()
        .filter(|output| output.output_name == DEFAULT_OUTPUT_NAME)
        .count();

    if defaults > 1 {
        return vec![FieldError::forbidden(
            spec_path().child("elasticsearchRefs"),
            format!("only one elasticsearchRef may have the outputName '{DEFAULT_OUTPUT_NAME}'"),
        )];
    }
    ErrorList::new()
}

fn check_es_refs_named(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    // A single output does not need a name.
    if agent.spec.elasticsearch_refs.len() <= 1 {
        return ErrorList::new();
    }

    let namespace = agent.namespace().unwrap_or_default();
    let unnamed: Vec<String> = agent
        .spec
        .elasticsearch_refs
        .iter()
        .filter(|output| output.output_name.is_empty())
        .map(|output| output.selector.with_default_namespace(&namespace).to_string())
        .collect();

    if unnamed.is_empty() {
        return ErrorList::new();
    }

    vec![FieldError::forbidden(
        spec_path().child("elasticsearchRefs"),
        format!(
            "when declaring multiple refs all have to be named, missing outputName on [{unnamed}]",
            unnamed = unnamed.join(", ")
        ),
    )]
}

fn check_empty_config_in_fleet_mode(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    let mut errors = ErrorList::new();
    if !agent.spec.fleet_mode_enabled() {
        return errors;
    }

    if let Some(config) = &agent.spec.config {
        errors.push(FieldError::invalid(
            spec_path().child("config"),
            config,
            "remove config, it can't be set in fleet mode",
        ));
    }
    if let Some(config_ref) = &agent.spec.config_ref {
        errors.push(FieldError::invalid(
            spec_path().child("configRef"),
            config_ref,
            "remove configRef, it can't be set in fleet mode",
        ));
    }
    errors
}

fn check_fleet_server_only_in_fleet_mode(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    if agent.spec.standalone_mode_enabled() && agent.spec.fleet_server_enabled {
        return vec![FieldError::invalid(
            spec_path().child("fleetServerEnabled"),
            agent.spec.fleet_server_enabled,
            "disable Fleet Server, it can't be enabled in standalone mode",
        )];
    }
    ErrorList::new()
}

fn check_fleet_server_or_fleet_server_ref(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    if agent.spec.fleet_server_enabled && agent.spec.fleet_server_ref.is_defined() {
        return vec![FieldError::invalid_omit_value(
            spec_path(),
            "enable Fleet Server or specify Fleet Server reference, not both",
        )];
    }
    ErrorList::new()
}

fn check_http_config_only_for_fleet_server(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    if !agent.spec.fleet_server_enabled && !agent.spec.http.is_zero() {
        return vec![FieldError::invalid(
            spec_path().child("http"),
            &agent.spec.http,
            "don't specify http configuration, it can't be set when Fleet Server is not enabled",
        )];
    }
    ErrorList::new()
}

fn check_reference_set_for_mode(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    let spec = &agent.spec;
    let mut errors = ErrorList::new();

    if spec.standalone_mode_enabled() {
        if spec.fleet_server_ref.is_defined() {
            errors.push(FieldError::invalid(
                spec_path().child("fleetServerRef"),
                &spec.fleet_server_ref,
                "don't specify Fleet Server reference, it can't be set in standalone mode",
            ));
        }
        if spec.kibana_ref.is_defined() {
            errors.push(FieldError::invalid(
                spec_path().child("kibanaRef"),
                &spec.kibana_ref,
                "don't specify Kibana reference, it can't be set in standalone mode",
            ));
        }
    } else if !spec.fleet_server_enabled && !spec.elasticsearch_refs.is_empty() {
        errors.push(FieldError::invalid(
            spec_path().child("fleetServerEnabled"),
            spec.fleet_server_enabled,
            "remove Elasticsearch reference, it can't be enabled in fleet mode when Fleet Server is not enabled as well",
        ));
    }

    errors
}

fn check_single_es_ref_in_fleet_mode(_ctx: &ValidationContext, agent: &Agent) -> ErrorList {
    if agent.spec.fleet_mode_enabled() && agent.spec.elasticsearch_refs.len() > 1 {
        return vec![FieldError::invalid(
            spec_path().child("elasticsearchRefs"),
            &agent.spec.elasticsearch_refs,
            "don't specify more than one Elasticsearch reference, this is not supported in fleet mode",
        )];
    }
    ErrorList::new()
}

/// Volume claim templates of a StatefulSet cannot be updated.
fn check_pvc_changes(_ctx: &ValidationContext, old: &Agent, new: &Agent) -> ErrorList {
    let (Some(old_set), Some(new_set)) = (&old.spec.stateful_set, &new.spec.stateful_set) else {
        return ErrorList::new();
    };

    rules::claims_unchanged(
        spec_path().child("statefulSet").child("volumeClaimTemplates"),
        &old_set.volume_claim_templates,
        &new_set.volume_claim_templates,
    )
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::{
        constants::LAST_APPLIED_CONFIGURATION_ANNOTATION,
        crd::test_utils::{create_errors, resource},
        validation::{Admission, Outcome, validate},
    };

    fn agent(spec: &str) -> Agent {
        resource("agent.k8s.elastic.co/v1alpha1", "Agent", spec)
    }

    #[test]
    fn standalone_daemon_set() {
        assert_eq!(create_errors(&agent("{version: 7.10.0, daemonSet: {}}")), Vec::<String>::new());
    }

    #[rstest]
    #[case::fleet("{version: 8.1.0, mode: fleet, deployment: {}, kibanaRef: {name: kb}}")]
    #[case::fleet_server(indoc! {"
        version: 8.1.0
        mode: fleet
        fleetServerEnabled: true
        deployment: {}
        elasticsearchRefs: [{name: es}]
        kibanaRef: {name: kb}
        http: {tls: {selfSignedCertificate: {disabled: true}}}
    "})]
    #[case::policy_id("{version: 9.0.0, mode: fleet, policyID: eck-agent, deployment: {}}")]
    #[case::named_outputs(indoc! {"
        version: 8.1.0
        daemonSet: {}
        elasticsearchRefs:
          - {name: es1, outputName: default}
          - {name: es2, outputName: monitoring}
    "})]
    fn valid(#[case] spec: &str) {
        assert_eq!(create_errors(&agent(spec)), Vec::<String>::new());
    }

    #[rstest]
    #[case::mandatory_policy_id(
        "{version: 9.0.0, mode: fleet, deployment: {}}",
        &["spec.policyID: Required value: Agent policyID is mandatory"]
    )]
    #[case::mandatory_policy_id_for_snapshots(
        "{version: 9.0.0-SNAPSHOT, daemonSet: {}}",
        &["spec.policyID: Required value: Agent policyID is mandatory"]
    )]
    #[case::fleet_version_too_old(
        "{version: 7.13.2, mode: fleet, deployment: {}}",
        &[r#"spec.version: Invalid value: "7.13.2": Unsupported version: version 7.13.2 is lower than the lowest supported version of 7.14.0"#]
    )]
    #[case::no_deployment_option(
        "{version: 8.1.0}",
        &["spec: Invalid value: either daemonSet or deployment or statefulSet must be specified"]
    )]
    #[case::two_deployment_options(
        "{version: 8.1.0, daemonSet: {}, statefulSet: {}}",
        &[
            "spec.daemonSet: Forbidden: Specify at most one of [daemonSet, statefulSet]",
            "spec.statefulSet: Forbidden: Specify at most one of [daemonSet, statefulSet]",
            "spec: Invalid value: either daemonSet or deployment or statefulSet must be specified",
        ]
    )]
    #[case::fleet_server_in_standalone_mode(
        "{version: 8.1.0, daemonSet: {}, fleetServerEnabled: true}",
        &["spec.fleetServerEnabled: Invalid value: true: disable Fleet Server, it can't be enabled in standalone mode"]
    )]
    #[case::config_in_fleet_mode(
        "{version: 8.1.0, mode: fleet, deployment: {}, configRef: {secretName: cfg}}",
        &[r#"spec.configRef: Invalid value: {"secretName":"cfg"}: remove configRef, it can't be set in fleet mode"#]
    )]
    #[case::both_config_sources(
        "{version: 8.1.0, daemonSet: {}, config: {a: b}, configRef: {secretName: cfg}}",
        &[
            "spec.config: Forbidden: Specify at most one of [`config`, `configRef`], not both",
            "spec.configRef: Forbidden: Specify at most one of [`config`, `configRef`], not both",
        ]
    )]
    #[case::fleet_server_and_ref(
        "{version: 8.1.0, mode: fleet, deployment: {}, fleetServerEnabled: true, fleetServerRef: {name: fs}}",
        &["spec: Invalid value: enable Fleet Server or specify Fleet Server reference, not both"]
    )]
    #[case::refs_in_standalone_mode(
        "{version: 8.1.0, daemonSet: {}, kibanaRef: {name: kb}, fleetServerRef: {name: fs}}",
        &[
            r#"spec.fleetServerRef: Invalid value: {"name":"fs"}: don't specify Fleet Server reference, it can't be set in standalone mode"#,
            r#"spec.kibanaRef: Invalid value: {"name":"kb"}: don't specify Kibana reference, it can't be set in standalone mode"#,
        ]
    )]
    #[case::es_ref_without_fleet_server(
        "{version: 8.1.0, mode: fleet, deployment: {}, elasticsearchRefs: [{name: es}]}",
        &["spec.fleetServerEnabled: Invalid value: false: remove Elasticsearch reference, it can't be enabled in fleet mode when Fleet Server is not enabled as well"]
    )]
    #[case::invalid_association(
        "{version: 8.1.0, daemonSet: {}, elasticsearchRefs: [{name: es, secretName: es-ref}]}",
        &["spec.elasticsearchRefs: Forbidden: Invalid association reference: specify name or secretName, not both"]
    )]
    fn invalid(#[case] spec: &str, #[case] expected: &[&str]) {
        assert_eq!(create_errors(&agent(spec)), expected);
    }

    #[test]
    fn two_default_outputs() {
        let agent = agent(indoc! {"
            version: 8.1.0
            daemonSet: {}
            elasticsearchRefs:
              - {name: es1, outputName: default}
              - {name: es2, outputName: default}
        "});

        assert_eq!(
            create_errors(&agent),
            ["spec.elasticsearchRefs: Forbidden: only one elasticsearchRef may have the outputName 'default'"]
        );
    }

    #[test]
    fn unnamed_outputs() {
        let agent = agent(indoc! {"
            version: 8.1.0
            daemonSet: {}
            elasticsearchRefs:
              - {name: es1, outputName: default}
              - {name: es2}
              - {name: es3, namespace: other}
        "});

        assert_eq!(
            create_errors(&agent),
            ["spec.elasticsearchRefs: Forbidden: when declaring multiple refs all have to be named, missing outputName on [default/es2, other/es3]"]
        );
    }

    #[test]
    fn multiple_es_refs_in_fleet_mode() {
        let agent = agent(indoc! {"
            version: 8.1.0
            mode: fleet
            fleetServerEnabled: true
            deployment: {}
            elasticsearchRefs:
              - {name: es1, outputName: default}
              - {name: es2, outputName: other}
        "});

        let errors = create_errors(&agent);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("spec.elasticsearchRefs: Invalid value: "));
        assert!(errors[0].ends_with(
            "don't specify more than one Elasticsearch reference, this is not supported in fleet mode"
        ));
    }

    #[rstest]
    #[case::fleet_mode("{version: 8.1.0, mode: fleet, deployment: {}, http: {tls: {selfSignedCertificate: {disabled: true}}}}")]
    #[case::standalone_mode("{version: 8.1.0, daemonSet: {}, http: {service: {spec: {type: LoadBalancer}}}}")]
    fn http_config_without_fleet_server(#[case] spec: &str) {
        let errors = create_errors(&agent(spec));

        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].starts_with("spec.http: Invalid value: "), "{errors:?}");
        assert!(errors[0].ends_with(
            "don't specify http configuration, it can't be set when Fleet Server is not enabled"
        ));
    }

    #[rstest]
    #[case::known_fields(
        r#"{"apiVersion":"agent.k8s.elastic.co/v1alpha1","kind":"Agent","metadata":{"name":"test"},"spec":{"version":"8.1.0","daemonSet":{},"elasticsearchRefs":[{"name":"es","namespace":"elastic","outputName":"default"}]}}"#,
        &[]
    )]
    #[case::misspelled_output_name(
        r#"{"spec":{"version":"8.1.0","daemonSet":{},"elasticsearchRefs":[{"name":"es","outputNam":"default"}]}}"#,
        &[r#"spec.elasticsearchRefs[0].outputNam: Invalid value: "outputNam": unknown field found in the kubectl.kubernetes.io/last-applied-configuration annotation is unknown"#]
    )]
    fn unknown_fields_in_outputs(#[case] last_applied: &str, #[case] expected: &[&str]) {
        let mut agent = agent("{version: 8.1.0, daemonSet: {}, elasticsearchRefs: [{name: es}]}");
        agent.metadata.annotations = Some(
            [(
                LAST_APPLIED_CONFIGURATION_ANNOTATION.to_owned(),
                last_applied.to_owned(),
            )]
            .into(),
        );

        assert_eq!(create_errors(&agent), expected);
    }

    #[rstest]
    #[case::unchanged("1Gi", "1Gi", true)]
    #[case::same_size_other_unit("1Ti", "1024Gi", true)]
    #[case::resized("1Gi", "2Gi", false)]
    fn volume_claim_templates(#[case] old: &str, #[case] new: &str, #[case] accepted: bool) {
        let spec = |storage: &str| {
            format!(
                "{{version: 8.1.0, statefulSet: {{volumeClaimTemplates: [{{metadata: {{name: data}}, spec: {{resources: {{requests: {{storage: {storage}}}}}}}}}]}}}}"
            )
        };
        let (old, new) = (agent(&spec(old)), agent(&spec(new)));
        let outcome = validate(
            &ValidationContext::default(),
            Admission::Update {
                old: &old,
                new: &new,
            },
        );

        assert_eq!(outcome.is_accepted(), accepted);
        if let Outcome::Rejected(invalid) = outcome {
            assert_eq!(
                invalid.errors[0].path.to_string(),
                "spec.statefulSet.volumeClaimTemplates"
            );
        }
    }

    #[test]
    fn association_annotations() {
        let agent = agent(indoc! {"
            version: 8.1.0
            daemonSet: {}
            elasticsearchRefs:
              - {name: es1, outputName: default}
            kibanaRef: {name: kb}
        "});
        let refs = agent.association_refs();

        assert_eq!(refs.len(), 3);
        assert!(
            refs[0]
                .annotation_name("default")
                .starts_with("association.k8s.elastic.co/es-conf-")
        );
        assert_eq!(
            refs[1].annotation_name("default"),
            "association.k8s.elastic.co/kb-conf"
        );
        assert_eq!(
            refs[2].annotation_name("default"),
            "association.k8s.elastic.co/fs-conf"
        );
    }
}
