//! # Place projection
//!
//! Module dedicated to projecting the places directory into a
//! per-scenario XML file. Only the places referenced by the
//! place-kind arguments of the requested phrase are projected, and
//! for each of them only the fields the APB holds permissions for.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
};

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use roxmltree::{Document, Node};
use tracing::{debug, trace, warn};

use super::{place_id, Error, Result, Scenario, PLACE_ID_FIELD};
use crate::{
    manifest::{Apb, PlacePerms},
    phrase::{ArgValue, CoplandPhrase},
};

fn write_event<W: Write>(writer: &mut Writer<W>, event: Event) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|err| Error::WriteProjectionError(err.into()))
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    write_event(writer, Event::Start(BytesStart::new(tag)))?;
    write_event(writer, Event::Text(BytesText::new(text)))?;
    write_event(writer, Event::End(BytesEnd::new(tag)))
}

/// Writes the permitted fields of one place element into the
/// projection.
///
/// The id field is always written. A field without element children
/// is written as a single text element; a field holding a list is
/// written with one text element per list entry.
fn write_place_info<W: Write>(
    writer: &mut Writer<W>,
    place_node: Node,
    perms: &PlacePerms,
) -> Result<()> {
    write_event(writer, Event::Start(BytesStart::new("place")))?;

    for field in place_node.children().filter(Node::is_element) {
        let tag = field.tag_name().name();

        let permitted = tag == PLACE_ID_FIELD || perms.perms.iter().any(|perm| perm == tag);
        if !permitted {
            debug!(field = tag, "permission for field missing, skipping");
            continue;
        }

        let entries: Vec<Node> = field.children().filter(Node::is_element).collect();

        if entries.is_empty() {
            write_text_element(writer, tag, field.text().unwrap_or_default())?;
        } else {
            write_event(writer, Event::Start(BytesStart::new(tag)))?;
            for entry in entries {
                trace!(entry = entry.tag_name().name(), "write list entry");
                write_text_element(
                    writer,
                    entry.tag_name().name(),
                    entry.text().unwrap_or_default(),
                )?;
            }
            write_event(writer, Event::End(BytesEnd::new(tag)))?;
        }
    }

    write_event(writer, Event::End(BytesEnd::new("place")))
}

/// Projects the place information the APB relies upon into the
/// per-scenario projection file.
///
/// For each place-kind argument of the phrase, the argument *name* is
/// looked up in the APB's place permissions and the argument *value*
/// in the places directory; the permitted fields of the matching
/// place are written out. A place argument without permissions is
/// skipped silently, a place missing from the directory is skipped
/// with a warning. Any write failure is fatal for the whole
/// projection and the caller must not trust the output file.
///
/// An APB without permissions, a scenario without a places file or a
/// phrase without place arguments short-circuit to success with no
/// file produced.
pub fn project_place_info(apb: &Apb, scen: &Scenario, phrase: &CoplandPhrase) -> Result<()> {
    if apb.place_permissions.is_empty() {
        debug!("no place information permissions given, bypassing the place query");
        return Ok(());
    }

    let Some(place_file) = &scen.place_file else {
        debug!("no place filename has been given, bypassing the place query");
        return Ok(());
    };

    if !phrase.has_place_args() {
        debug!("no place arguments in the phrase, bypassing the place query");
        return Ok(());
    }

    let text = fs::read_to_string(place_file)
        .map_err(|err| Error::ReadPlacesFileError(err, place_file.clone()))?;
    let doc = Document::parse(&text)
        .map_err(|err| Error::ParsePlacesXmlError(err, place_file.clone()))?;
    let root = doc.root_element();

    let path = scen.place_perms_path();
    debug!(path = %path.display(), "creating place projection file");

    let file =
        File::create(&path).map_err(|err| Error::CreateProjectionFileError(err, path.clone()))?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);

    write_event(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write_event(&mut writer, Event::Start(BytesStart::new("places")))?;

    for arg in &phrase.args {
        let ArgValue::Place(id) = &arg.value else {
            continue;
        };

        let Some(perms) = apb
            .place_permissions
            .iter()
            .find(|perms| perms.id == arg.name)
        else {
            trace!(label = arg.name, "no permissions for place argument, skipping");
            continue;
        };

        let place_node = root
            .children()
            .filter(Node::is_element)
            .find(|node| place_id(*node) == Some(id.as_str()));

        let Some(place_node) = place_node else {
            warn!(id, "place not found in places file");
            continue;
        };

        write_place_info(&mut writer, place_node, perms)?;
    }

    write_event(&mut writer, Event::End(BytesEnd::new("places")))?;

    writer
        .into_inner()
        .flush()
        .map_err(Error::FlushProjectionFileError)?;

    Ok(())
}
