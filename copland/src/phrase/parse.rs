//! # Copland phrase codec
//!
//! Module dedicated to parsing Copland phrases of the form
//! `term:arg1=value1,arg2=value2`. Parsing is template-directed: the
//! requested string is only accepted if its arguments resolve, by
//! name, against the typed schema of a base phrase.

use tracing::{debug, trace};

use super::{ArgValue, CoplandPhrase, Error, PhraseArg, Result, Role};

/// Splits a Copland phrase string into its term and its argument
/// list.
///
/// The split happens at the first colon; any later colon is literal
/// content of the argument list. An absent or empty argument list
/// yields `None`. No whitespace is trimmed: callers strip XML-derived
/// fields before invocation.
pub(crate) fn split(phrase_and_args: &str) -> (&str, Option<&str>) {
    match phrase_and_args.split_once(':') {
        None => (phrase_and_args, None),
        Some((term, "")) => (term, None),
        Some((term, args)) => (term, Some(args)),
    }
}

/// Counts the arguments of an argument list without parsing it.
///
/// The count is the number of `=` occurrences, which matches the real
/// argument count for every list the codec accepts. Used to probe
/// template arity before values are parsed.
pub(crate) fn count_args(args: &str) -> usize {
    args.bytes().filter(|b| *b == b'=').count()
}

/// Parses a single argument token against its template argument.
///
/// The value is converted according to the template kind: integers
/// are full-string signed 32-bit decimals, places are full-string
/// decimals in `[0, 2^31)` kept as text, strings are copied raw.
fn parse_arg(template: &PhraseArg, name: &str, value: &str) -> Result<PhraseArg> {
    let value = match &template.value {
        ArgValue::Integer(_) => {
            let parsed = value
                .parse::<i32>()
                .map_err(|_| Error::ParseIntegerArgError(name.to_owned(), value.to_owned()))?;
            ArgValue::Integer(parsed)
        }
        ArgValue::Place(_) => match value.parse::<i64>() {
            Ok(id) if (0..=i32::MAX as i64).contains(&id) => ArgValue::Place(value.to_owned()),
            _ => {
                return Err(Error::ParsePlaceArgError(name.to_owned(), value.to_owned()));
            }
        },
        ArgValue::String(_) => ArgValue::String(value.to_owned()),
    };

    Ok(PhraseArg::new(name, value))
}

impl CoplandPhrase {
    /// Parses a requested phrase string against a template.
    ///
    /// Arguments are resolved by name against the template schema but
    /// kept in the order they were encountered, so that serialising
    /// the parsed phrase reproduces the input. The parse fails when
    /// the argument count differs from the template arity, an
    /// argument name is unknown or duplicated, or a value does not
    /// convert to the template kind.
    pub fn parse(phrase_and_args: &str, template: &CoplandPhrase) -> Result<Self> {
        if template.role != Role::Base {
            return Err(Error::ParseWithoutTemplateError(phrase_and_args.to_owned()));
        }

        let (term, args) = split(phrase_and_args);

        if term != template.term {
            return Err(Error::ParseTermMismatchError(
                phrase_and_args.to_owned(),
                template.term.clone(),
            ));
        }

        let mut parsed_args: Vec<PhraseArg> = Vec::new();

        for token in args.map(|args| args.split(',')).into_iter().flatten() {
            let (name, value) = token
                .split_once('=')
                .ok_or_else(|| Error::ParseArgFormatError(token.to_owned()))?;

            // A value containing `=` would not survive a
            // serialise/parse round trip, so it is rejected here.
            if name.is_empty() || value.is_empty() || value.contains('=') {
                return Err(Error::ParseArgFormatError(token.to_owned()));
            }

            if parsed_args.iter().any(|arg| arg.name == name) {
                return Err(Error::DuplicateArgError(name.to_owned()));
            }

            let template_arg = template
                .find_arg(name)
                .ok_or_else(|| Error::UnknownArgError(name.to_owned(), template.term.clone()))?;

            parsed_args.push(parse_arg(template_arg, name, value)?);
        }

        if parsed_args.len() != template.args.len() {
            return Err(Error::ArgCountError(
                term.to_owned(),
                template.args.len(),
                parsed_args.len(),
            ));
        }

        trace!(phrase = phrase_and_args, "parsed Copland phrase");

        Ok(CoplandPhrase {
            term: term.to_owned(),
            role: Role::Actual,
            args: parsed_args,
        })
    }
}

/// Parses an argument list into key/value pairs, without a template.
///
/// Used by APBs to consume the argument list they receive on their
/// command line. An argument list without any `=` yields an empty
/// list.
pub fn parse_args_kv(args: &str) -> Result<Vec<(String, String)>> {
    if count_args(args) == 0 {
        debug!("no args to parse or arguments are in incorrect format");
        return Ok(Vec::new());
    }

    let mut pairs = Vec::new();

    for token in args.split(',') {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| Error::ParseArgFormatError(token.to_owned()))?;

        if key.is_empty() || value.is_empty() {
            return Err(Error::ParseArgFormatError(token.to_owned()));
        }

        pairs.push((key.to_owned(), value.to_owned()));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> CoplandPhrase {
        CoplandPhrase::base(
            "m",
            vec![
                PhraseArg::new("p", ArgValue::Integer(0)),
                PhraseArg::new("q", ArgValue::Place(String::new())),
            ],
        )
    }

    #[test]
    fn split_phrase_and_args() {
        assert_eq!(split("a:b=1,c=2"), ("a", Some("b=1,c=2")));
        assert_eq!(split("a"), ("a", None));
        assert_eq!(split("a:"), ("a", None));
        assert_eq!(split("a:b=x:y"), ("a", Some("b=x:y")));
    }

    #[test]
    fn count_args_by_equals() {
        assert_eq!(count_args("b=1,c=2"), 2);
        assert_eq!(count_args("b"), 0);
    }

    #[test]
    fn parse_no_args() {
        let template = CoplandPhrase::base("att", vec![]);
        let phrase = CoplandPhrase::parse("att", &template).unwrap();

        assert_eq!(phrase.role, Role::Actual);
        assert!(phrase.args.is_empty());
    }

    #[test]
    fn parse_keeps_encountered_order() {
        let phrase = CoplandPhrase::parse("m:q=7,p=3", &template()).unwrap();

        assert_eq!(phrase.args[0], PhraseArg::new("q", ArgValue::Place("7".into())));
        assert_eq!(phrase.args[1], PhraseArg::new("p", ArgValue::Integer(3)));
        assert_eq!(phrase.to_string(), "m:q=7,p=3");
    }

    #[test]
    fn parse_rejects_arity_mismatch() {
        assert!(matches!(
            CoplandPhrase::parse("m:p=3", &template()),
            Err(Error::ArgCountError(_, 2, 1))
        ));
    }

    #[test]
    fn parse_rejects_integer_overflow() {
        assert!(matches!(
            CoplandPhrase::parse("m:p=99999999999,q=7", &template()),
            Err(Error::ParseIntegerArgError(..))
        ));
    }

    #[test]
    fn parse_rejects_integer_with_trailing_garbage() {
        assert!(matches!(
            CoplandPhrase::parse("m:p=12abc,q=7", &template()),
            Err(Error::ParseIntegerArgError(..))
        ));
    }

    #[test]
    fn parse_rejects_negative_place() {
        assert!(matches!(
            CoplandPhrase::parse("m:p=3,q=-1", &template()),
            Err(Error::ParsePlaceArgError(..))
        ));
    }

    #[test]
    fn parse_keeps_place_text_verbatim() {
        let phrase = CoplandPhrase::parse("m:p=3,q=007", &template()).unwrap();
        assert_eq!(phrase.find_arg("q").unwrap().value, ArgValue::Place("007".into()));
    }

    #[test]
    fn parse_rejects_unknown_arg() {
        assert!(matches!(
            CoplandPhrase::parse("m:p=3,r=7", &template()),
            Err(Error::UnknownArgError(..))
        ));
    }

    #[test]
    fn parse_rejects_duplicate_arg() {
        assert!(matches!(
            CoplandPhrase::parse("m:p=3,p=4", &template()),
            Err(Error::DuplicateArgError(..))
        ));
    }

    #[test]
    fn parse_rejects_value_with_delimiter() {
        let template = CoplandPhrase::base(
            "att",
            vec![PhraseArg::new("s", ArgValue::String(String::new()))],
        );

        assert!(matches!(
            CoplandPhrase::parse("att:s=a=b", &template),
            Err(Error::ParseArgFormatError(..))
        ));
    }

    #[test]
    fn round_trip() {
        let template = CoplandPhrase::base(
            "att",
            vec![
                PhraseArg::new("n", ArgValue::Integer(0)),
                PhraseArg::new("loc", ArgValue::Place(String::new())),
                PhraseArg::new("s", ArgValue::String(String::new())),
            ],
        );

        for input in ["att:n=-4,loc=010,s=hello", "att:s=x,n=12,loc=0"] {
            let phrase = CoplandPhrase::parse(input, &template).unwrap();
            let rendered = phrase.to_string();

            assert_eq!(rendered, input);
            assert_eq!(CoplandPhrase::parse(&rendered, &template).unwrap(), phrase);
        }
    }

    #[test]
    fn args_kv() {
        assert_eq!(
            parse_args_kv("b=1,c=2").unwrap(),
            vec![("b".to_owned(), "1".to_owned()), ("c".to_owned(), "2".to_owned())],
        );
        assert_eq!(parse_args_kv("no equals here").unwrap(), vec![]);
        assert!(parse_args_kv("b=1,c").is_err());
        assert!(parse_args_kv("b=1,=2").is_err());
    }
}
