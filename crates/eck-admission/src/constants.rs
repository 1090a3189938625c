//! Annotation names and fixed limits shared by the checks.

/// Annotation written by `kubectl apply` holding the object as last applied
/// by the user.
pub const LAST_APPLIED_CONFIGURATION_ANNOTATION: &str =
    "kubectl.kubernetes.io/last-applied-configuration";

/// Set to `"true"` to allow a single version downgrade.
pub const DISABLE_DOWNGRADE_VALIDATION_ANNOTATION: &str =
    "eck.k8s.elastic.co/disable-downgrade-validation";

/// Maximum length of the name of a resource. Names of the objects managed for
/// a resource are derived from it and must stay within 63 characters.
pub const NAME_MAX_LENGTH: usize = 36;

/// Output name every Agent uses when no explicit output name is given.
pub const DEFAULT_OUTPUT_NAME: &str = "default";
