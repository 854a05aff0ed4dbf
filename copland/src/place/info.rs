//! # Place info
//!
//! Module dedicated to reading projected place information back. A
//! [`PlaceInfo`] maps each projected field of one place to the
//! ordered list of its values and exposes typed accessors over them.

use std::{collections::HashMap, fs};

use roxmltree::{Document, Node};
use tracing::debug;

use super::{place_id, Error, Result, Scenario};

/// The projected information of one place, keyed by field name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlaceInfo {
    fields: HashMap<String, Vec<String>>,
}

impl PlaceInfo {
    /// Reads the place with the given id from the scenario's
    /// projection file.
    pub fn from_file(scen: &Scenario, id: &str) -> Result<Self> {
        let path = scen.place_perms_path();
        debug!(path = %path.display(), id, "looking for place info");

        let text = fs::read_to_string(&path)
            .map_err(|err| Error::ReadPlacesFileError(err, path.clone()))?;
        let doc =
            Document::parse(&text).map_err(|err| Error::ParsePlacesXmlError(err, path.clone()))?;

        Self::from_doc(&doc, id)
    }

    /// Collects the place with the given id from an already-parsed
    /// places document.
    ///
    /// A field holding a list stores its entries' text in document
    /// order; a leaf field stores the single-element list of its own
    /// text. Duplicate field names under the same place are an error.
    pub fn from_doc(doc: &Document, id: &str) -> Result<Self> {
        let place = doc
            .root_element()
            .children()
            .filter(Node::is_element)
            .find(|node| place_id(*node) == Some(id))
            .ok_or_else(|| Error::FindPlaceError(id.to_owned()))?;

        let mut fields: HashMap<String, Vec<String>> = HashMap::new();

        for field in place.children().filter(Node::is_element) {
            let key = field.tag_name().name().to_owned();

            if fields.contains_key(&key) {
                return Err(Error::DuplicatePlaceFieldError(key, id.to_owned()));
            }

            let mut values: Vec<String> = field
                .children()
                .filter(Node::is_element)
                .map(|entry| entry.text().unwrap_or_default().to_owned())
                .collect();

            if values.is_empty() {
                values.push(field.text().unwrap_or_default().to_owned());
            }

            fields.insert(key, values);
        }

        Ok(Self { fields })
    }

    /// Borrows the value list of a field.
    pub fn get_list(&self, field: &str) -> Result<&[String]> {
        self.fields
            .get(field)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::FindFieldError(field.to_owned()))
    }

    /// The first value of a field.
    pub fn get_string(&self, field: &str) -> Result<&str> {
        self.get_string_nth(field, 0)
    }

    /// The nth value of a field, zero indexed.
    pub fn get_string_nth(&self, field: &str, n: usize) -> Result<&str> {
        self.get_list(field)?
            .get(n)
            .map(String::as_str)
            .ok_or_else(|| Error::FindFieldNthError(field.to_owned(), n))
    }

    /// The first value of a field, as a signed 32-bit integer.
    pub fn get_int(&self, field: &str) -> Result<i32> {
        self.get_int_nth(field, 0)
    }

    /// The nth value of a field, as a signed 32-bit integer.
    pub fn get_int_nth(&self, field: &str, n: usize) -> Result<i32> {
        let value = self.get_string_nth(field, n)?;

        value
            .trim()
            .parse()
            .map_err(|_| Error::ParseFieldIntError(field.to_owned(), value.to_owned()))
    }

    /// The number of values of a field, zero when absent.
    pub fn list_length(&self, field: &str) -> usize {
        self.fields.get(field).map_or(0, Vec::len)
    }

    /// Fills the leading elements of a caller-sized slice with the
    /// integer values of a field.
    ///
    /// Exactly [`list_length`](Self::list_length) elements are
    /// filled; the rest of the slice is left untouched. On an absent
    /// field, a too-small slice or any element failing the integer
    /// parse, the whole slice is zeroed and the call fails.
    pub fn fill_int_array(&self, field: &str, out: &mut [i32]) -> Result<()> {
        let len = self.list_length(field);

        if len == 0 {
            out.fill(0);
            return Err(Error::FindFieldError(field.to_owned()));
        }

        if out.len() < len {
            out.fill(0);
            return Err(Error::FillArrayLengthError(field.to_owned()));
        }

        for (n, slot) in out.iter_mut().take(len).enumerate() {
            match self.get_int_nth(field, n) {
                Ok(value) => *slot = value,
                Err(err) => {
                    out.fill(0);
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACES: &str = concat!(
        "<places>",
        "<place>",
        "<place_id>P1</place_id>",
        "<host>h</host>",
        "<ports><port>80</port><port>443</port></ports>",
        "</place>",
        "</places>",
    );

    fn place_info() -> PlaceInfo {
        let doc = Document::parse(PLACES).unwrap();
        PlaceInfo::from_doc(&doc, "P1").unwrap()
    }

    #[test]
    fn missing_place_is_an_error() {
        let doc = Document::parse(PLACES).unwrap();
        assert!(matches!(
            PlaceInfo::from_doc(&doc, "P2"),
            Err(Error::FindPlaceError(..))
        ));
    }

    #[test]
    fn duplicate_fields_are_an_error() {
        let doc = Document::parse(
            "<places><place><place_id>P1</place_id><host>a</host><host>b</host></place></places>",
        )
        .unwrap();

        assert!(matches!(
            PlaceInfo::from_doc(&doc, "P1"),
            Err(Error::DuplicatePlaceFieldError(..))
        ));
    }

    #[test]
    fn string_accessors() {
        let info = place_info();

        assert_eq!(info.get_string("place_id").unwrap(), "P1");
        assert_eq!(info.get_string("host").unwrap(), "h");
        assert_eq!(info.get_string_nth("ports", 1).unwrap(), "443");
        assert!(info.get_string("missing").is_err());
        assert!(info.get_string_nth("ports", 2).is_err());
    }

    #[test]
    fn int_accessors() {
        let info = place_info();

        assert_eq!(info.get_int("ports").unwrap(), 80);
        assert_eq!(info.get_int_nth("ports", 1).unwrap(), 443);
        assert!(matches!(
            info.get_int("host"),
            Err(Error::ParseFieldIntError(..))
        ));
    }

    #[test]
    fn list_length_is_zero_when_absent() {
        let info = place_info();

        assert_eq!(info.list_length("ports"), 2);
        assert_eq!(info.list_length("host"), 1);
        assert_eq!(info.list_length("missing"), 0);
    }

    #[test]
    fn fill_int_array_fills_leading_elements() {
        let info = place_info();
        let mut out = [7; 3];

        info.fill_int_array("ports", &mut out).unwrap();

        assert_eq!(out, [80, 443, 7]);
    }

    #[test]
    fn fill_int_array_zeroes_output_on_failure() {
        let doc = Document::parse(
            "<places><place><place_id>P1</place_id>\
             <ports><port>80</port><port>oops</port></ports></place></places>",
        )
        .unwrap();
        let info = PlaceInfo::from_doc(&doc, "P1").unwrap();
        let mut out = [7; 2];

        assert!(info.fill_int_array("ports", &mut out).is_err());
        assert_eq!(out, [0, 0]);

        let mut missing = [7; 2];
        assert!(info.fill_int_array("missing", &mut missing).is_err());
        assert_eq!(missing, [0, 0]);
    }
}
