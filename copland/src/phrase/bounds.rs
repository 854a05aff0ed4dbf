//! # Copland phrase bounds
//!
//! Module dedicated to bounded equivalence between Copland phrases: a
//! concrete phrase is *bounded by* a template or bounder phrase when
//! its term, arity and argument names line up and every argument
//! value passes the per-kind bound.

use regex::Regex;
use tracing::debug;

use super::{ArgValue, CoplandPhrase, Error, PhraseSpecPair, Result};

/// Evaluates a string argument against the regular expression bound
/// carried by the bounder argument.
fn eval_str_bounds(value: &str, bound: &str) -> Result<()> {
    let regex =
        Regex::new(bound).map_err(|err| Error::CompileBoundError(err, bound.to_owned()))?;

    if regex.is_match(value) {
        Ok(())
    } else {
        debug!(value, bound, "argument not within bounds");
        Err(Error::BoundMismatchError(
            value.to_owned(),
            bound.to_owned(),
        ))
    }
}

/// Evaluates the bounds of a phrase against a bounder.
///
/// The phrase and the bounder must share the same term, the same
/// arity, and positionally identical argument names and kinds. Values
/// are then checked per kind: integers compare for equality, places
/// compare byte-exact on their stored text, and strings must match
/// the bounder's regular expression. The match is unanchored, so a
/// partial match passes; bounders needing a full-string match must
/// carry their own `^`/`$` anchors.
pub fn eval_bounds(phr: &CoplandPhrase, bounder: &CoplandPhrase) -> Result<()> {
    let mismatch = || Error::BoundMismatchError(phr.to_string(), bounder.to_string());

    if phr.term != bounder.term {
        debug!(phrase = %phr.term, bounder = %bounder.term, "terms did not match");
        return Err(mismatch());
    }

    if phr.args.len() != bounder.args.len() {
        debug!(phrase = %phr.term, "number of arguments did not match");
        return Err(mismatch());
    }

    for (phr_arg, bou_arg) in phr.args.iter().zip(&bounder.args) {
        if phr_arg.name != bou_arg.name {
            debug!(phrase = %phr.term, "argument names did not match");
            return Err(mismatch());
        }

        match (&phr_arg.value, &bou_arg.value) {
            (ArgValue::String(value), ArgValue::String(bound)) => {
                eval_str_bounds(value, bound)?;
            }
            (ArgValue::Place(id), ArgValue::Place(bound)) if id == bound => (),
            (ArgValue::Integer(val), ArgValue::Integer(bound)) if val == bound => (),
            _ => {
                debug!(phrase = %phr.term, arg = phr_arg.name, "argument not within bounds");
                return Err(mismatch());
            }
        }
    }

    Ok(())
}

/// Copies the phrases that are bounded by some member of the bounder
/// list into a new list.
///
/// Every copy is an independent deep copy, and the output preserves
/// the order of the input list.
pub fn copy_bounded(phrs: &[CoplandPhrase], bounders: &[CoplandPhrase]) -> Vec<CoplandPhrase> {
    phrs.iter()
        .filter(|phr| {
            bounders
                .iter()
                .any(|bounder| eval_bounds(phr, bounder).is_ok())
        })
        .cloned()
        .collect()
}

/// Finds the first template in a pair list that bounds the given
/// phrase.
pub fn match_phrase<'a>(
    phr: &CoplandPhrase,
    pairs: &'a [PhraseSpecPair],
) -> Result<&'a CoplandPhrase> {
    pairs
        .iter()
        .map(|pair| &pair.copl)
        .find(|copl| eval_bounds(phr, copl).is_ok())
        .ok_or_else(|| Error::MatchPhraseError(phr.to_string()))
}
