//! # APB manifest
//!
//! Module dedicated to the Copland section of APB manifests. Each
//! `<copland>` block of a manifest advertises one phrase template,
//! the measurement specification it binds to, and the place
//! information the APB is allowed to read. Parsing is best-effort:
//! malformed child entries are skipped with a warning, while a fatal
//! error (most notably a missing base term or an unknown measurement
//! specification) marks the whole APB invalid.

use roxmltree::Node;
use thiserror::Error;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::phrase::{self, parse, ArgKind, ArgValue, CoplandPhrase, PhraseArg, PhraseSpecPair};

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find Copland template matching phrase {0}")]
    FindTemplateError(String),
    #[error("cannot find APB advertising Copland phrase {0}")]
    FindApbError(String),
    #[error(transparent)]
    PhraseError(#[from] phrase::Error),
}

/// The place-directory fields an APB may read about one place.
///
/// The id matches the *name* of a place-kind phrase argument; the
/// permission list enumerates readable place-directory element
/// names. The place id field itself is always implicitly readable.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct PlacePerms {
    /// The name of the place argument these permissions apply to.
    pub id: String,

    /// The place-directory element names the APB may read.
    pub perms: Vec<String>,
}

/// An Attestation Protocol Block record.
///
/// An APB owns the phrase templates it advertises and the place
/// permissions attached to them. The record is built once from the
/// manifest and treated as read-only afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct Apb {
    /// The name of the APB.
    pub name: String,

    /// Whether the APB manifest parsed without fatal errors.
    ///
    /// Starts true and monotonically drops to false; an invalid APB
    /// is excluded from selection.
    pub valid: bool,

    /// The phrase templates advertised by the APB, in document order.
    pub phrase_specs: Vec<PhraseSpecPair>,

    /// The place permissions granted to the APB.
    pub place_permissions: Vec<PlacePerms>,
}

impl Apb {
    pub fn new(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            valid: true,
            phrase_specs: Vec::new(),
            place_permissions: Vec::new(),
        }
    }
}

/// Parses one `<arg>` entry of an arguments block.
///
/// The entry needs a name attribute and a recognised `<type>`; a
/// `<values>` element on a string argument carries the regular
/// expression bound, and is ignored for the other kinds.
fn parse_arg_entry(entry: Node) -> Option<PhraseArg> {
    let name = match entry.attribute("name") {
        Some(name) => name.trim(),
        None => {
            debug!("cannot read name of Copland argument");
            return None;
        }
    };

    if name.is_empty() {
        debug!("no name given to argument");
        return None;
    }

    let mut kind: Option<ArgKind> = None;
    let mut bound: Option<String> = None;

    for child in entry.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "type" => {
                let text = match child.text() {
                    Some(text) => text.trim(),
                    None => {
                        debug!("cannot get type information from Copland section");
                        continue;
                    }
                };

                match text {
                    "integer" => kind = Some(ArgKind::Integer),
                    "place" => kind = Some(ArgKind::Place),
                    "string" => kind = Some(ArgKind::String),
                    unknown => {
                        warn!(arg = name, kind = unknown, "unexpected type in argument block");
                    }
                }
            }
            "values" => match kind {
                None => {
                    warn!(arg = name, "values element before any argument type, skipping arg");
                    return None;
                }
                Some(ArgKind::String) => {
                    bound = child.text().map(|text| text.trim().to_owned());
                }
                Some(kind) => {
                    debug!(arg = name, %kind, "values element ignored for this argument kind");
                }
            },
            unknown => {
                warn!(arg = name, element = unknown, "unexpected element in argument block");
            }
        }
    }

    let value = match kind {
        Some(ArgKind::Integer) => ArgValue::Integer(0),
        Some(ArgKind::Place) => ArgValue::Place(String::new()),
        Some(ArgKind::String) => ArgValue::String(bound.unwrap_or_default()),
        None => {
            debug!(arg = name, "did not parse a type from the arg entry");
            return None;
        }
    };

    Some(PhraseArg::new(name, value))
}

/// Parses an `<arguments>` block into the template's argument schema,
/// in document order.
fn parse_arg_block(arg_block: Node) -> Vec<PhraseArg> {
    let mut args: Vec<PhraseArg> = Vec::new();

    for entry in arg_block.children().filter(Node::is_element) {
        if !entry.has_tag_name("arg") {
            warn!("non argument element found in argument list");
            continue;
        }

        let Some(arg) = parse_arg_entry(entry) else {
            warn!("unable to process argument entry");
            continue;
        };

        if args.iter().any(|known| known.name == arg.name) {
            warn!(arg = arg.name, "duplicate argument name in argument list, skipping");
            continue;
        }

        args.push(arg);
    }

    args
}

/// Parses one `<place>` entry of a places block.
fn parse_place_entry(entry: Node) -> Option<PlacePerms> {
    let id = match entry.attribute("id") {
        Some(id) => id.trim().to_owned(),
        None => {
            debug!("cannot read name of places argument");
            return None;
        }
    };

    let mut perms = Vec::new();

    for child in entry.children().filter(Node::is_element) {
        if !child.has_tag_name("info") {
            warn!(
                element = child.tag_name().name(),
                "unexpected element in info block"
            );
            continue;
        }

        match child.text() {
            Some(text) => perms.push(text.trim().to_owned()),
            None => debug!("cannot get info permission from Copland section"),
        }
    }

    Some(PlacePerms { id, perms })
}

/// Parses a `<places>` block, appending one [`PlacePerms`] per place
/// entry.
fn parse_place_block(place_block: Node, permissions: &mut Vec<PlacePerms>) {
    for entry in place_block.children().filter(Node::is_element) {
        if !entry.has_tag_name("place") {
            warn!("non place element found in places block");
            continue;
        }

        match parse_place_entry(entry) {
            Some(perms) => permissions.push(perms),
            None => warn!("unable to process place entry"),
        }
    }
}

/// Parses one `<copland>` block of an APB manifest, appending the
/// advertised template to the APB record.
///
/// The block's children are handled in any order, each meaningfully
/// at most once; duplicates keep the first occurrence with a warning
/// and unexpected elements are ignored. The measurement specification
/// UUID is looked up in the catalogue of known specifications; an
/// unknown UUID marks the APB invalid but the parse continues. A
/// missing base term invalidates the APB and no template is emitted.
pub fn parse_copland(apb: &mut Apb, copl_node: Node, catalog: &[Uuid]) {
    let mut term: Option<String> = None;
    let mut spec_uuid = Uuid::nil();
    let mut args: Vec<PhraseArg> = Vec::new();

    for child in copl_node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "phrase" => {
                if term.is_some() {
                    warn!(
                        apb = apb.name,
                        "multiple Copland phrases provided for the same Copland block"
                    );
                    continue;
                }

                match child.attribute("copland").map(str::trim) {
                    Some(attr) if !attr.is_empty() => term = Some(attr.to_owned()),
                    _ => {
                        warn!(apb = apb.name, "unable to read copland term from Copland block");
                        apb.valid = false;
                        return;
                    }
                }
            }
            "spec" => {
                if !spec_uuid.is_nil() {
                    warn!(
                        apb = apb.name,
                        "multiple measurement specs defined for the same Copland block"
                    );
                    continue;
                }

                let Some(attr) = child.attribute("uuid") else {
                    debug!("spec entry without UUID, skipping");
                    continue;
                };

                let Ok(uuid) = Uuid::parse_str(attr.trim()) else {
                    warn!(apb = apb.name, "invalid UUID in spec entry, skipping");
                    continue;
                };

                if !catalog.contains(&uuid) {
                    warn!(apb = apb.name, %uuid, "cannot find measurement spec with the given uuid");
                    apb.valid = false;
                    continue;
                }

                spec_uuid = uuid;
            }
            "arguments" => args = parse_arg_block(child),
            "places" => parse_place_block(child, &mut apb.place_permissions),
            unknown => {
                warn!(apb = apb.name, element = unknown, "malformed APB Copland entry");
            }
        }
    }

    match term {
        Some(term) => {
            trace!(apb = apb.name, term, "parsed Copland block");
            apb.phrase_specs
                .push(PhraseSpecPair::new(CoplandPhrase::base(term, args), spec_uuid));
        }
        None => {
            warn!(
                apb = apb.name,
                "did not find all required Copland fields required for parsing"
            );
            apb.valid = false;
        }
    }
}

/// Finds a template applicable to the given phrase string by shape.
///
/// The phrase is split and its argument count probed by counting `=`
/// occurrences; the first pair whose term and arity match wins. Used
/// for APB selection before any value is parsed.
pub fn find_template<'a>(
    phrase_and_args: &str,
    pairs: &'a [PhraseSpecPair],
) -> Result<&'a PhraseSpecPair> {
    let (term, args) = parse::split(phrase_and_args);
    let num_args = args.map(parse::count_args).unwrap_or(0);

    pairs
        .iter()
        .find(|pair| pair.copl.term == term && pair.copl.args.len() == num_args)
        .ok_or_else(|| Error::FindTemplateError(phrase_and_args.to_owned()))
}

/// Parses a phrase string against a list of template pairs.
pub fn parse_from_pairs(
    phrase_and_args: &str,
    pairs: &[PhraseSpecPair],
) -> Result<CoplandPhrase> {
    let template = find_template(phrase_and_args, pairs)?;
    Ok(CoplandPhrase::parse(phrase_and_args, &template.copl)?)
}

/// Parses a phrase string against the templates of a list of APBs.
///
/// APBs are scanned in order; the first valid APB whose catalogue can
/// parse the phrase wins.
pub fn parse_from_apbs(phrase_and_args: &str, apbs: &[Apb]) -> Result<CoplandPhrase> {
    debug!(phrase = phrase_and_args, "parsing Copland phrase");

    apbs.iter()
        .filter(|apb| apb.valid)
        .find_map(|apb| parse_from_pairs(phrase_and_args, &apb.phrase_specs).ok())
        .ok_or_else(|| Error::FindApbError(phrase_and_args.to_owned()))
}

/// Finds the APB able to service the given phrase string, along with
/// the template pair that matched.
///
/// APBs are scanned in order and invalid APBs are never selected.
pub fn find_apb<'a>(
    apbs: &'a [Apb],
    phrase_and_args: &str,
) -> Option<(&'a Apb, &'a PhraseSpecPair)> {
    apbs.iter().filter(|apb| apb.valid).find_map(|apb| {
        find_template(phrase_and_args, &apb.phrase_specs)
            .ok()
            .map(|pair| (apb, pair))
    })
}

/// Finds the APB able to service an already-parsed phrase.
///
/// Templates hold no concrete argument values, so the search matches
/// on term and argument count only.
pub fn find_apb_by_template<'a>(
    apbs: &'a [Apb],
    copl: &CoplandPhrase,
) -> Option<(&'a Apb, &'a PhraseSpecPair)> {
    apbs.iter().filter(|apb| apb.valid).find_map(|apb| {
        apb.phrase_specs
            .iter()
            .find(|pair| {
                pair.copl.term == copl.term && pair.copl.args.len() == copl.args.len()
            })
            .map(|pair| (apb, pair))
    })
}
