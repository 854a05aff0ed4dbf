//! # Places
//!
//! Module dedicated to Copland places: named remote endpoints whose
//! attributes live in a places directory XML maintained by the
//! Attestation Manager. The [`project`] submodule filters that
//! directory down to what one APB may read during one scenario; the
//! [`info`] submodule reads the filtered projection back through
//! typed accessors.

pub mod info;
pub mod project;

use std::{io, path::PathBuf};

use roxmltree::Node;
use thiserror::Error;

#[doc(inline)]
pub use self::{info::PlaceInfo, project::project_place_info};

/// The place-directory element holding the identifier of a place.
///
/// This field is always readable, whatever the permission list says.
pub const PLACE_ID_FIELD: &str = "place_id";

/// The name of the per-scenario place projection file, relative to
/// the scenario workdir.
pub const COPLAND_PLACE_PERMS_FILE: &str = "copland_place_perms.xml";

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read places file {1}")]
    ReadPlacesFileError(#[source] io::Error, PathBuf),
    #[error("cannot parse places XML from {1}")]
    ParsePlacesXmlError(#[source] roxmltree::Error, PathBuf),
    #[error("cannot create place projection file {1}")]
    CreateProjectionFileError(#[source] io::Error, PathBuf),
    #[error("cannot write place projection XML")]
    WriteProjectionError(#[source] quick_xml::Error),
    #[error("cannot flush place projection file")]
    FlushProjectionFileError(#[source] io::Error),
    #[error("cannot find place with id {0}")]
    FindPlaceError(String),
    #[error("duplicate place attribute {0} in place with id {1}")]
    DuplicatePlaceFieldError(String, String),
    #[error("cannot find place info field {0}")]
    FindFieldError(String),
    #[error("cannot find element {1} of place info field {0}")]
    FindFieldNthError(String, usize),
    #[error("cannot parse integer from place info field {0}: {1:?}")]
    ParseFieldIntError(String, String),
    #[error("output array too small for place info field {0}")]
    FillArrayLengthError(String),
}

/// Paths of the scenario the process is currently serving.
///
/// The workdir is the per-scenario scratch directory the projection
/// file lives in; the place file is the authoritative places
/// directory of the Attestation Manager, when one is configured.
/// Scenarios never share a workdir concurrently, and the projection
/// file is deleted together with it.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct Scenario {
    /// The working directory of the scenario.
    pub workdir: PathBuf,

    /// The path of the places directory XML, if any.
    pub place_file: Option<PathBuf>,
}

impl Scenario {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            place_file: None,
        }
    }

    /// Defines the places directory path, using the builder pattern.
    pub fn with_place_file(mut self, place_file: impl Into<PathBuf>) -> Self {
        self.place_file = Some(place_file.into());
        self
    }

    /// The path of the per-scenario place projection file.
    pub fn place_perms_path(&self) -> PathBuf {
        self.workdir.join(COPLAND_PLACE_PERMS_FILE)
    }
}

/// Extracts the identifier of a place element from its id field.
pub(crate) fn place_id<'a, 'input>(place_node: Node<'a, 'input>) -> Option<&'a str> {
    place_node
        .children()
        .filter(Node::is_element)
        .find(|node| node.has_tag_name(PLACE_ID_FIELD))
        .and_then(|node| node.text())
}
