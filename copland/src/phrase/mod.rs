//! # Copland phrase
//!
//! Module dedicated to the Copland phrase model. A phrase is a named
//! attestation protocol with typed arguments. A *base* phrase is a
//! template published by an APB manifest; an *actual* phrase is a
//! concrete request parsed against such a template.

pub mod bounds;
pub mod parse;

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

#[doc(inline)]
pub use self::{
    bounds::{copy_bounded, eval_bounds, match_phrase},
    parse::parse_args_kv,
};

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse Copland phrase {0}: template expected")]
    ParseWithoutTemplateError(String),
    #[error("cannot parse Copland phrase {0} with template for {1}")]
    ParseTermMismatchError(String, String),
    #[error("cannot parse Copland argument {0:?}: expected <name>=<value>")]
    ParseArgFormatError(String),
    #[error("cannot find argument {0} in template for {1}")]
    UnknownArgError(String, String),
    #[error("duplicate argument {0} in Copland phrase")]
    DuplicateArgError(String),
    #[error("wrong number of arguments for phrase {0}: expected {1}, got {2}")]
    ArgCountError(String, usize, usize),
    #[error("cannot parse integer argument {0}={1}")]
    ParseIntegerArgError(String, String),
    #[error("cannot parse place argument {0}={1}")]
    ParsePlaceArgError(String, String),
    #[error("cannot compile bound expression {1}")]
    CompileBoundError(#[source] regex::Error, String),
    #[error("phrase {0} is not bounded by {1}")]
    BoundMismatchError(String, String),
    #[error("cannot find bounding template for phrase {0}")]
    MatchPhraseError(String),
}

/// The kind of a phrase argument.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ArgKind {
    Integer,
    Place,
    String,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Place => write!(f, "place"),
            Self::String => write!(f, "string"),
        }
    }
}

/// The typed payload of a phrase argument.
///
/// The discriminant and the payload are inseparable: an argument is
/// never an untyped value.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub enum ArgValue {
    /// A signed 32-bit integer.
    Integer(i32),

    /// A place identifier: decimal text in `[0, 2^31)`.
    ///
    /// The text is stored verbatim (leading zeros included) so that
    /// serialisation round-trips and place comparisons stay
    /// byte-exact.
    Place(String),

    /// Arbitrary text.
    ///
    /// In an actual phrase this is the concrete value; in a template
    /// or bounder phrase it carries a POSIX-extended regular
    /// expression constraining accepted values.
    String(String),
}

impl ArgValue {
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Integer(_) => ArgKind::Integer,
            Self::Place(_) => ArgKind::Place,
            Self::String(_) => ArgKind::String,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(val) => write!(f, "{val}"),
            Self::Place(text) => f.write_str(text),
            Self::String(text) => f.write_str(text),
        }
    }
}

/// A named, typed argument of a Copland phrase.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct PhraseArg {
    /// The name of the argument, unique within its phrase.
    pub name: String,

    /// The typed payload of the argument.
    pub value: ArgValue,
}

impl PhraseArg {
    pub fn new(name: impl ToString, value: ArgValue) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

impl fmt::Display for PhraseArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// The role of a Copland phrase.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Role {
    /// A template, as published by an APB manifest.
    Base,

    /// A concrete request with values bound to a template's args.
    Actual,
}

/// A Copland phrase: a term with an ordered list of typed arguments.
///
/// Cloning produces an independent deep copy; actual phrases never
/// alias back into the template they were parsed against.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct CoplandPhrase {
    /// The base term of the phrase.
    pub term: String,

    /// Whether this phrase is a template or a concrete request.
    pub role: Role,

    /// The arguments of the phrase, in encountered order.
    pub args: Vec<PhraseArg>,
}

impl CoplandPhrase {
    /// Creates a new template phrase.
    pub fn base(term: impl ToString, args: Vec<PhraseArg>) -> Self {
        Self {
            term: term.to_string(),
            role: Role::Base,
            args,
        }
    }

    /// Creates a new concrete phrase.
    pub fn actual(term: impl ToString, args: Vec<PhraseArg>) -> Self {
        Self {
            term: term.to_string(),
            role: Role::Actual,
            args,
        }
    }

    /// Finds an argument of this phrase by name.
    pub fn find_arg(&self, name: &str) -> Option<&PhraseArg> {
        self.args.iter().find(|arg| arg.name == name)
    }

    /// Checks whether any argument of this phrase is place-kind.
    ///
    /// A base phrase carries no place identifiers, only the schema,
    /// so this is usually asked of an actual phrase.
    pub fn has_place_args(&self) -> bool {
        self.args
            .iter()
            .any(|arg| arg.value.kind() == ArgKind::Place)
    }
}

impl fmt::Display for CoplandPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.term)?;

        for (i, arg) in self.args.iter().enumerate() {
            let sep = if i == 0 { ':' } else { ',' };
            write!(f, "{sep}{arg}")?;
        }

        Ok(())
    }
}

/// A phrase template bound to the measurement specification it
/// executes against.
///
/// The nil UUID means unbound, which renders the pair invalid.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct PhraseSpecPair {
    /// The template phrase.
    pub copl: CoplandPhrase,

    /// The UUID of the bound measurement specification.
    pub spec_uuid: Uuid,
}

impl PhraseSpecPair {
    pub fn new(copl: CoplandPhrase, spec_uuid: Uuid) -> Self {
        Self { copl, spec_uuid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_arg_phrase() -> CoplandPhrase {
        CoplandPhrase::actual(
            "m",
            vec![
                PhraseArg::new("q", ArgValue::Place("7".into())),
                PhraseArg::new("p", ArgValue::Integer(3)),
            ],
        )
    }

    #[test]
    fn display_without_args() {
        let phrase = CoplandPhrase::actual("att", vec![]);
        assert_eq!(phrase.to_string(), "att");
    }

    #[test]
    fn display_preserves_encountered_order() {
        assert_eq!(two_arg_phrase().to_string(), "m:q=7,p=3");
    }

    #[test]
    fn display_keeps_place_text_verbatim() {
        let phrase = CoplandPhrase::actual(
            "up",
            vec![PhraseArg::new("loc", ArgValue::Place("007".into()))],
        );
        assert_eq!(phrase.to_string(), "up:loc=007");
    }

    #[test]
    fn has_place_args() {
        assert!(two_arg_phrase().has_place_args());
        assert!(!CoplandPhrase::actual(
            "att",
            vec![PhraseArg::new("n", ArgValue::Integer(1))]
        )
        .has_place_args());
    }
}
