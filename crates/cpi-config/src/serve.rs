//! Transport lifecycle selection.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How many requests a single process serves before exiting.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ServeMode {
    /// Read one request, write one response, exit.
    #[default]
    Once,
    /// Stay resident and answer requests until the input closes.
    Continuous,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::once("once", ServeMode::Once)]
    #[case::continuous("continuous", ServeMode::Continuous)]
    #[case::mixed_case("Continuous", ServeMode::Continuous)]
    fn parses_serve_mode(#[case] text: &str, #[case] expected: ServeMode) {
        assert_eq!(ServeMode::from_str(text).expect("parse"), expected);
    }

    #[test]
    fn rejects_unknown_serve_mode() {
        assert!(ServeMode::from_str("forever").is_err());
    }

    #[test]
    fn displays_snake_case() {
        assert_eq!(ServeMode::Continuous.to_string(), "continuous");
    }
}
