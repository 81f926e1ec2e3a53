//! Text case profiles.
//!
//! A profile is a list of whitespace separated records, one element per line:
//!
//! ```text
//! * comment
//! SYSBASE 100
//! THSLACK G1 B1 1.06 0
//! THLINE  L12 B1 B2 0.01938 0.05917 0.0264
//! THLOAD  D2 B2 21.7 12.7
//! GENERCV G2 B2 40 1.045
//! ```
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::basic::{ecs::network::PowerGrid, error::PowerFlowError};

pub mod elements;
pub mod profile;

pub use elements::Element;
pub use profile::{Profile, Record};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: unknown record `{keyword}`")]
    UnknownRecord { line: usize, keyword: String },

    #[error("line {line}: missing field `{field}`")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: field `{field}` has invalid value `{value}`")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: branch `{name}` is defined twice")]
    DuplicateBranch { line: usize, name: String },

    #[error("line {line}: {source}")]
    Grid {
        line: usize,
        #[source]
        source: PowerFlowError,
    },

    #[error("cannot read profile: {0}")]
    Io(String),
}

/// Builds a grid from profile text.
///
/// Records are applied in order, so `SYSBASE` must precede the records whose
/// powers it scales.
pub fn load_profile(text: &str) -> Result<PowerGrid, ParseError> {
    let profile = Profile::parse(text);
    let mut grid = PowerGrid::default();
    for record in profile.records() {
        let element = Element::from_record(record)?;
        element.apply(&mut grid).map_err(|err| match err {
            PowerFlowError::DuplicateBranch(name) => ParseError::DuplicateBranch {
                line: record.line,
                name,
            },
            source => ParseError::Grid {
                line: record.line,
                source,
            },
        })?;
    }
    info!(
        records = profile.len(),
        buses = grid.bus_count(),
        branches = grid.branch_count(),
        "profile loaded"
    );
    Ok(grid)
}

pub fn load_profile_file(path: impl AsRef<Path>) -> Result<PowerGrid, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|e| ParseError::Io(e.to_string()))?;
    load_profile(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{ecs::network::PowerFlow, system::BusType};
    use approx::assert_abs_diff_eq;

    const SMALL: &str = "\
* two buses and a transformer
SYSBASE 100
THSLACK S1 A 1.02 0
THTRFO T1 A B 0.0 0.1 0.98
THLOAD D1 B 40 10
";

    #[test]
    fn small_profile_solves() {
        let mut grid = load_profile(SMALL).unwrap();
        assert_eq!(grid.bus_count(), 2);
        assert_eq!(grid.bus_kind("A").unwrap().kind(), BusType::Slack);
        assert!(grid.run_pf().unwrap().converged);
        // the 0.98 tap on the slack side raises B above the slack voltage
        let vb = grid.voltage("B").unwrap().norm();
        assert!(vb > 1.02);
        assert_abs_diff_eq!(vb, 1.0304, epsilon = 1e-3);
    }

    #[test]
    fn unknown_keyword_is_reported() {
        let err = load_profile("SYSBASE 100\nTHFOO x\n").err();
        assert_eq!(
            err,
            Some(ParseError::UnknownRecord {
                line: 2,
                keyword: "THFOO".into()
            })
        );
    }

    #[test]
    fn duplicate_branch_is_reported() {
        let text = "THLINE L1 A B 0 0.1 0\nTHLINE L1 B C 0 0.1 0\n";
        assert_eq!(
            load_profile(text).err(),
            Some(ParseError::DuplicateBranch {
                line: 2,
                name: "L1".into()
            })
        );
    }

    #[test]
    fn second_slack_on_same_bus_is_locked() {
        let text = "THSLACK S1 A 1.0\nTHSLACK S2 A 1.0\n";
        assert_eq!(
            load_profile(text).err(),
            Some(ParseError::Grid {
                line: 2,
                source: PowerFlowError::TypeLocked(BusType::Slack)
            })
        );
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_profile_file("/nonexistent/case.th"),
            Err(ParseError::Io(_))
        ));
    }
}
