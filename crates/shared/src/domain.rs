use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{raw}': expected an integer id")]
pub struct ParseIdError {
    kind: &'static str,
    raw: String,
}

macro_rules! id_newtype {
    ($name:ident, $kind:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                raw.trim().parse::<i64>().map($name).map_err(|_| ParseIdError {
                    kind: $kind,
                    raw: raw.to_string(),
                })
            }
        }
    };
}

id_newtype!(UserId, "user id");
id_newtype!(TrackId, "track id");
id_newtype!(AssignmentId, "assignment id");
id_newtype!(SubmissionId, "submission id");
id_newtype!(CommentId, "comment id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_integers() {
        assert_eq!(serde_json::to_string(&TrackId(7)).expect("encode"), "7");
        let decoded: AssignmentId = serde_json::from_str("42").expect("decode");
        assert_eq!(decoded, AssignmentId(42));
    }

    #[test]
    fn parses_ids_from_cli_input() {
        assert_eq!(" 42 ".parse::<AssignmentId>(), Ok(AssignmentId(42)));
        let err = "forty-two".parse::<TrackId>().expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "invalid track id 'forty-two': expected an integer id"
        );
    }
}
