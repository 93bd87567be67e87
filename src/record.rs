//! Purpose: Parse one corpus line into a `BillRecord`.
//! Exports: `BillRecord`, `parse_line`, `version_from_filename`, `bill_schema`, `DELIMITER`.
//! Role: Pure per-line parsing; the extractor owns I/O and error policy.
//! Invariants: `primary_key` is always `state_year_docid_docversion`.
//! Invariants: Content bytes are decoded lossily; decode never fails a line.
//! Invariants: Identifier must have exactly six `/`-separated segments.
use bstr::ByteSlice;
use serde::Serialize;
use serde_json::{Value, json};

use crate::core::error::{Error, ErrorKind};

/// Separator between the document path and its text payload.
pub const DELIMITER: &str = "^^^";

const PATH_SEGMENTS: usize = 6;
const VERSION_SUFFIX: &str = ".txt";

/// One parsed bill document. Field order is the JSON key order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BillRecord {
    year: i32,
    state: String,
    docid: String,
    docversion: String,
    content: String,
    primary_key: String,
}

impl BillRecord {
    pub fn new(
        year: i32,
        state: impl Into<String>,
        docid: impl Into<String>,
        docversion: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let state = state.into();
        let docid = docid.into();
        let docversion = docversion.into();
        let primary_key = Self::derive_primary_key(&state, year, &docid, &docversion);
        Self {
            year,
            state,
            docid,
            docversion,
            content: content.into(),
            primary_key,
        }
    }

    pub fn derive_primary_key(state: &str, year: i32, docid: &str, docversion: &str) -> String {
        format!("{state}_{year}_{docid}_{docversion}")
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn docid(&self) -> &str {
        &self.docid
    }

    pub fn docversion(&self) -> &str {
        &self.docversion
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }
}

fn malformed(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Malformed).with_message(message)
}

/// Parse a single line (without its terminator).
///
/// Errors are `ErrorKind::Malformed`; callers attach the line number and path.
pub fn parse_line(line: &[u8]) -> Result<BillRecord, Error> {
    let Some(split) = line.find(DELIMITER) else {
        return Err(
            malformed(format!("missing `{DELIMITER}` delimiter")).with_hint(
                "Each line must look like `a/b/STATE/YEAR/DOCID/DOCID_VERSION.txt^^^TEXT`.",
            ),
        );
    };
    let (sid, rest) = (&line[..split], &line[split + DELIMITER.len()..]);
    if rest.find(DELIMITER).is_some() {
        return Err(malformed(format!("more than one `{DELIMITER}` delimiter")));
    }

    let sid = sid.to_str_lossy();
    let segments: Vec<&str> = sid.split('/').collect();
    let [_, _, state, year, docid, filename] = segments.as_slice() else {
        return Err(malformed(format!(
            "expected {PATH_SEGMENTS} path segments, found {}",
            segments.len()
        ))
        .with_hint("The identifier must have the form `a/b/STATE/YEAR/DOCID/FILENAME`."));
    };

    let docversion = version_from_filename(filename).ok_or_else(|| {
        malformed(format!("no `_` version separator in filename `{filename}`"))
    })?;

    let year = year.parse::<i32>().map_err(|err| {
        malformed(format!("year segment `{year}` is not an integer")).with_source(err)
    })?;

    Ok(BillRecord::new(
        year,
        *state,
        *docid,
        docversion,
        rest.to_str_lossy(),
    ))
}

/// Version label of a filename such as `HB5102_Introduced.txt`.
///
/// Everything after the first `_`, minus a trailing `.txt`.
pub fn version_from_filename(filename: &str) -> Option<&str> {
    let (_, version) = filename.split_once('_')?;
    Some(version.strip_suffix(VERSION_SUFFIX).unwrap_or(version))
}

/// Avro schema the downstream pipeline expects. Documentation only; never enforced.
pub fn bill_schema() -> Value {
    json!({
        "namespace": "bills",
        "type": "record",
        "name": "Bill",
        "fields": [
            {"name": "year", "type": "int"},
            {"name": "state", "type": "string"},
            {"name": "docid", "type": "string"},
            {"name": "docversion", "type": "string"},
            {"name": "content", "type": "string"},
            {"name": "primary_key", "type": "string"}
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::{BillRecord, bill_schema, parse_line, version_from_filename};
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn parses_reference_line() {
        let record =
            parse_line(b"bills/old/IL/2003/HB5102/HB5102_Introduced.txt^^^Some bill text.")
                .expect("parse");

        assert_eq!(record.year(), 2003);
        assert_eq!(record.state(), "IL");
        assert_eq!(record.docid(), "HB5102");
        assert_eq!(record.docversion(), "Introduced");
        assert_eq!(record.content(), "Some bill text.");
        assert_eq!(record.primary_key(), "IL_2003_HB5102_Introduced");

        let value = serde_json::to_value(&record).expect("json");
        assert_eq!(
            value,
            json!({
                "year": 2003,
                "state": "IL",
                "docid": "HB5102",
                "docversion": "Introduced",
                "content": "Some bill text.",
                "primary_key": "IL_2003_HB5102_Introduced"
            })
        );
    }

    #[test]
    fn serialized_keys_follow_field_order() {
        let record = BillRecord::new(1999, "CA", "SB1", "Enrolled", "x");
        let text = serde_json::to_string(&record).expect("json");
        assert_eq!(
            text,
            r#"{"year":1999,"state":"CA","docid":"SB1","docversion":"Enrolled","content":"x","primary_key":"CA_1999_SB1_Enrolled"}"#
        );
    }

    #[test]
    fn primary_key_is_reproducible_from_fields() {
        let record = parse_line(b"x/y/TX/2011/HB9/HB9_Engrossed.txt^^^body").expect("parse");
        assert_eq!(
            BillRecord::derive_primary_key(
                record.state(),
                record.year(),
                record.docid(),
                record.docversion()
            ),
            record.primary_key()
        );
    }

    #[test]
    fn primary_key_uses_parsed_year() {
        let record = parse_line(b"x/y/TX/+2011/HB9/HB9_Engrossed.txt^^^body").expect("parse");
        assert_eq!(record.primary_key(), "TX_2011_HB9_Engrossed");
    }

    #[test]
    fn version_extraction() {
        assert_eq!(
            version_from_filename("HB5102_Introduced.txt"),
            Some("Introduced")
        );
        assert_eq!(version_from_filename("HB1_Enrolled"), Some("Enrolled"));
        assert_eq!(
            version_from_filename("HB1_House_Amendment_1.txt"),
            Some("House_Amendment_1")
        );
        assert_eq!(version_from_filename("HB1_text.txt.txt"), Some("text.txt"));
        assert_eq!(version_from_filename("HB1.txt"), None);
    }

    #[test]
    fn invalid_utf8_content_is_replaced() {
        let mut line = b"a/b/IL/2003/HB1/HB1_Introduced.txt^^^bad ".to_vec();
        line.extend_from_slice(&[0xff, 0xfe]);
        line.extend_from_slice(b" bytes");

        let record = parse_line(&line).expect("parse");
        assert_eq!(record.content(), "bad \u{fffd}\u{fffd} bytes");
    }

    #[test]
    fn empty_content_is_allowed() {
        let record = parse_line(b"a/b/IL/2003/HB1/HB1_Introduced.txt^^^").expect("parse");
        assert_eq!(record.content(), "");
    }

    #[test]
    fn missing_delimiter_is_malformed() {
        let err = parse_line(b"a/b/IL/2003/HB1/HB1_Introduced.txt Some text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert!(err.message().unwrap().contains("delimiter"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn repeated_delimiter_is_malformed() {
        let err = parse_line(b"a/b/IL/2003/HB1/HB1_Introduced.txt^^^one^^^two").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let short = parse_line(b"IL/2003/HB1/HB1_Introduced.txt^^^text").unwrap_err();
        assert_eq!(short.kind(), ErrorKind::Malformed);
        assert!(short.message().unwrap().contains("found 4"));

        let long = parse_line(b"a/b/c/IL/2003/HB1/HB1_Introduced.txt^^^text").unwrap_err();
        assert_eq!(long.kind(), ErrorKind::Malformed);
        assert!(long.message().unwrap().contains("found 7"));
    }

    #[test]
    fn non_integer_year_is_malformed() {
        let err = parse_line(b"a/b/IL/20O3/HB1/HB1_Introduced.txt^^^text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert!(err.message().unwrap().contains("20O3"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn filename_without_version_is_malformed() {
        let err = parse_line(b"a/b/IL/2003/HB1/HB1.txt^^^text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn schema_lists_record_fields_in_order() {
        let schema = bill_schema();
        assert_eq!(schema["name"], "Bill");
        assert_eq!(schema["namespace"], "bills");
        let names: Vec<&str> = schema["fields"]
            .as_array()
            .expect("fields")
            .iter()
            .filter_map(|field| field["name"].as_str())
            .collect();
        assert_eq!(
            names,
            ["year", "state", "docid", "docversion", "content", "primary_key"]
        );
        assert_eq!(schema["fields"][0]["type"], "int");
    }
}
