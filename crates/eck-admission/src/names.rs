//! Kubernetes object name rules, used to reject resources whose derived object
//! names would be refused by the API server.
//!
//! Adapted from `apimachinery/pkg/util/validation/validation.go`.
use std::{fmt::Display, sync::LazyLock};

use const_format::concatcp;
use regex::Regex;
use snafu::Snafu;

const DNS_1123_LABEL_MAX_LENGTH: usize = 63;
const DNS_1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const DNS_1123_LABEL_ERROR_MSG: &str = "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character";

const DNS_1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const DNS_1123_SUBDOMAIN_FMT: &str =
    concatcp!(DNS_1123_LABEL_FMT, "(\\.", DNS_1123_LABEL_FMT, ")*");
const DNS_1123_SUBDOMAIN_ERROR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

static DNS_1123_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DNS_1123_LABEL_FMT}$")).expect("failed to compile RFC 1123 label regex")
});

static DNS_1123_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DNS_1123_SUBDOMAIN_FMT}$"))
        .expect("failed to compile RFC 1123 subdomain regex")
});

/// All rules a name violates.
#[derive(Debug, PartialEq, Eq)]
pub struct Errors(Vec<Error>);

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("must be no more than {max_length} characters"))]
    TooLong { max_length: usize },

    #[snafu(display("{msg} (regex used for validation is {regex:?})"))]
    Regex {
        msg: &'static str,
        regex: &'static str,
    },
}

fn validate_str_length(value: &str, max_length: usize) -> Result<(), Error> {
    if value.len() > max_length {
        return TooLongSnafu { max_length }.fail();
    }
    Ok(())
}

fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    fmt: &'static str,
    msg: &'static str,
) -> Result<(), Error> {
    if regex.is_match(value) {
        return Ok(());
    }
    RegexSnafu { msg, regex: fmt }.fail()
}

fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result<(), Errors> {
    let errors: Vec<Error> = validations.into_iter().filter_map(Result::err).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// A lowercase DNS label, as required for Service and Pod host names.
pub fn is_dns_1123_label(value: &str) -> Result<(), Errors> {
    validate_all([
        validate_str_length(value, DNS_1123_LABEL_MAX_LENGTH),
        validate_str_regex(
            value,
            &DNS_1123_LABEL_REGEX,
            DNS_1123_LABEL_FMT,
            DNS_1123_LABEL_ERROR_MSG,
        ),
    ])
}

/// A lowercase DNS subdomain, as required for most object names.
pub fn is_dns_1123_subdomain(value: &str) -> Result<(), Errors> {
    validate_all([
        validate_str_length(value, DNS_1123_SUBDOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &DNS_1123_SUBDOMAIN_REGEX,
            DNS_1123_SUBDOMAIN_FMT,
            DNS_1123_SUBDOMAIN_ERROR_MSG,
        ),
    ])
}
