#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![doc = include_str!("../README.md")]

pub mod contract;
pub mod manifest;
pub mod phrase;
pub mod place;

#[doc(inline)]
pub use crate::{
    contract::{SubcontractVerifier, Verdict},
    manifest::{Apb, PlacePerms},
    phrase::{ArgKind, ArgValue, CoplandPhrase, PhraseArg, PhraseSpecPair, Role},
    place::{PlaceInfo, Scenario, COPLAND_PLACE_PERMS_FILE, PLACE_ID_FIELD},
};
