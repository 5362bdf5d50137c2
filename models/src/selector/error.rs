use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "Unable to parse label selector '{}': found an empty requirement",
        selector
    ))]
    EmptyRequirement { selector: String },

    #[snafu(display(
        "Unable to parse label selector '{}': unbalanced parentheses",
        selector
    ))]
    UnbalancedParentheses { selector: String },

    #[snafu(display(
        "Unable to parse label selector requirement '{}': expected 'key', '!key', 'key=value', 'key!=value', 'key in (values)' or 'key notin (values)'",
        requirement
    ))]
    InvalidRequirement { requirement: String },

    #[snafu(display("Invalid label key '{}': {}", key, reason))]
    InvalidKey { key: String, reason: String },

    #[snafu(display("Invalid label value '{}' for key '{}'", value, key))]
    InvalidValue { key: String, value: String },

    #[snafu(display(
        "Invalid requirement for label key '{}': the set of values for 'in' and 'notin' cannot be empty",
        key
    ))]
    EmptyValueSet { key: String },
}
