//! Field-level validation errors, modelled after the Kubernetes
//! `apimachinery/pkg/util/validation/field` package so that rejections read
//! the same way as errors produced by the API server itself.
use std::fmt::{Display, Write};

use serde::Serialize;
use serde_json::Value;

/// A list of [`FieldError`]s as returned by a single check.
pub type ErrorList = Vec<FieldError>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Segment {
    Field(String),
    Index(usize),
    Key(String),
}

/// The path to a field inside a resource, for example
/// `spec.nodeSets[0].config`.
///
/// Paths are immutable: [`FieldPath::child`], [`FieldPath::index`] and
/// [`FieldPath::key`] return extended copies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Field(name.into())],
        }
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        self.with(Segment::Field(name.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.with(Segment::Index(index))
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        self.with(Segment::Key(key.into()))
    }

    fn with(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Key(key) => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

/// The kind of a [`FieldError`].
///
/// The [`Display`] implementation produces the human readable form used in
/// error messages, [`ErrorType::cause_reason`] the machine readable form used
/// in status causes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum ErrorType {
    #[strum(to_string = "Invalid value")]
    Invalid,

    #[strum(to_string = "Required value")]
    Required,

    #[strum(to_string = "Forbidden")]
    Forbidden,

    #[strum(to_string = "Too long")]
    TooLong,

    #[strum(to_string = "Internal error")]
    InternalError,
}

impl ErrorType {
    pub fn cause_reason(self) -> &'static str {
        match self {
            Self::Invalid => "FieldValueInvalid",
            Self::Required => "FieldValueRequired",
            Self::Forbidden => "FieldValueForbidden",
            Self::TooLong => "FieldValueTooLong",
            Self::InternalError => "InternalError",
        }
    }
}

/// A single validation failure attached to a field of the validated
/// resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: FieldPath,
    pub error_type: ErrorType,
    pub bad_value: Option<Value>,
    pub detail: String,
}

impl FieldError {
    /// The value at `path` is invalid. The value is echoed back to the user.
    pub fn invalid(path: FieldPath, bad_value: impl Serialize, detail: impl Into<String>) -> Self {
        Self {
            path,
            error_type: ErrorType::Invalid,
            bad_value: Some(serde_json::to_value(bad_value).unwrap_or(Value::Null)),
            detail: detail.into(),
        }
    }

    /// Like [`FieldError::invalid`], for values too large to be echoed back,
    /// for example a whole spec.
    pub fn invalid_omit_value(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            path,
            error_type: ErrorType::Invalid,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn required(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            path,
            error_type: ErrorType::Required,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn forbidden(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            path,
            error_type: ErrorType::Forbidden,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn too_long(path: FieldPath, bad_value: impl Serialize, max_length: usize) -> Self {
        Self {
            path,
            error_type: ErrorType::TooLong,
            bad_value: Some(serde_json::to_value(bad_value).unwrap_or(Value::Null)),
            detail: format!("must have at most {max_length} bytes"),
        }
    }

    pub fn internal(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            path,
            error_type: ErrorType::InternalError,
            bad_value: None,
            detail: detail.into(),
        }
    }

    /// Returns the message without the leading field path.
    pub fn body(&self) -> String {
        let mut body = self.error_type.to_string();

        if self.error_type == ErrorType::Invalid {
            let rendered = match &self.bad_value {
                Some(Value::String(value)) => Some(format!("{value:?}")),
                Some(value) => Some(value.to_string()),
                None => None,
            };
            if let Some(rendered) = rendered {
                let _ = write!(body, ": {rendered}");
            }
        }

        if !self.detail.is_empty() {
            let _ = write!(body, ": {detail}", detail = self.detail);
        }

        body
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{path}: {body}", path = self.path, body = self.body())
    }
}

/// Formats a list of errors the way the API server aggregates them: a single
/// error as is, several errors as a bracketed, comma separated list.
pub fn aggregate(errors: &[FieldError]) -> String {
    match errors {
        [] => String::new(),
        [error] => error.to_string(),
        errors => {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{joined}]")
        }
    }
}
