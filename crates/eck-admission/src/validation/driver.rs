use std::fmt::Display;

use kube::ResourceExt;

use crate::{
    field::{ErrorList, aggregate},
    validation::{Validate, ValidationContext},
};

/// The admission operation being validated, with the objects it carries.
#[derive(Clone, Copy, Debug)]
pub enum Admission<'a, R> {
    Create(&'a R),
    Update { old: &'a R, new: &'a R },
    Delete,
}

/// Result of validating one admission operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Accepted { warnings: Vec<String> },
    Rejected(InvalidResource),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// All field errors of a rejected resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidResource {
    pub group: String,
    pub kind: String,
    pub name: String,
    pub errors: ErrorList,
}

impl InvalidResource {
    fn new<R: Validate>(resource: &R, errors: ErrorList) -> Self {
        Self {
            group: R::group(&()).into_owned(),
            kind: R::kind(&()).into_owned(),
            name: resource.name_any(),
            errors,
        }
    }
}

impl Display for InvalidResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{kind}.{group} {name:?} is invalid: {errors}",
            kind = self.kind,
            group = self.group,
            name = self.name,
            errors = aggregate(&self.errors)
        )
    }
}

/// Validates one admission operation.
///
/// - Create runs the base checks.
/// - Update runs the update checks first and stops if any of them fails, so
///   that a forbidden transition is not buried under complaints about the new
///   spec. Otherwise it continues like create.
/// - Delete is always accepted.
///
/// Checks of a phase never short-circuit each other, all their errors are
/// reported in declaration order.
pub fn validate<R: Validate>(ctx: &ValidationContext, admission: Admission<'_, R>) -> Outcome {
    match admission {
        Admission::Create(new) => validate_new(ctx, new),
        Admission::Update { old, new } => {
            let errors: ErrorList = R::update_checks()
                .iter()
                .flat_map(|check| check(ctx, old, new))
                .collect();

            tracing::debug!(
                k8s.object.kind = %R::kind(&()),
                k8s.object.name = %new.name_any(),
                error.count = errors.len(),
                "ran update checks"
            );

            if errors.is_empty() {
                validate_new(ctx, new)
            } else {
                Outcome::Rejected(InvalidResource::new(new, errors))
            }
        }
        Admission::Delete => Outcome::Accepted {
            warnings: Vec::new(),
        },
    }
}

fn validate_new<R: Validate>(ctx: &ValidationContext, new: &R) -> Outcome {
    let errors: ErrorList = R::base_checks()
        .iter()
        .flat_map(|check| check(ctx, new))
        .collect();

    tracing::debug!(
        k8s.object.kind = %R::kind(&()),
        k8s.object.name = %new.name_any(),
        error.count = errors.len(),
        "ran base checks"
    );

    if errors.is_empty() {
        Outcome::Accepted {
            warnings: new.warnings(ctx),
        }
    } else {
        Outcome::Rejected(InvalidResource::new(new, errors))
    }
}
