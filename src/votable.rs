//! Generic tabular results parsed from VOTable payloads.
//!
//! TAP services return query results as VOTable XML. This module materializes
//! the TABLEDATA serialization into a [`Table`]: named columns and rows of
//! optional string cells (an empty or self-closed `<TD/>` is a null). Cells
//! are kept as strings; numeric columns are read through [`Table::f64`].
//!
//! Tables can also be serialized back to an inline VOTable, which is how
//! upload bindings are shipped with a query (all uploaded cells are typed as
//! variable-length char; the server casts inside ADQL as needed).

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use crate::tap::TapError;

/// A tabular query result with named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Creates an empty table with the given column names.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Protocol`] if the row arity does not match the
    /// column count.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<(), TapError> {
        if row.len() != self.columns.len() {
            return Err(TapError::protocol(format!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names, in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows, in result order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Index of a named column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value at `(row, column-name)`; `None` for nulls, unknown columns,
    /// and out-of-range rows.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Cell value at `(row, column-name)` parsed as a float.
    #[must_use]
    pub fn f64(&self, row: usize, column: &str) -> Option<f64> {
        self.value(row, column)?.parse().ok()
    }

    /// Parses the TABLEDATA serialization of a VOTable document.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Protocol`] if the document is not well-formed XML,
    /// declares no `FIELD` elements, or contains rows whose cell count does
    /// not match the field count.
    pub fn from_votable(xml: &str) -> Result<Self, TapError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        let mut row: Vec<Option<String>> = Vec::new();
        let mut in_td = false;
        let mut cell: Option<String> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| TapError::protocol(format!("malformed VOTable: {e}")))?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e)
                    if e.local_name().as_ref() == b"FIELD" =>
                {
                    let name = e
                        .try_get_attribute("name")
                        .map_err(|e| TapError::protocol(format!("malformed VOTable: {e}")))?
                        .ok_or_else(|| TapError::protocol("FIELD element without name"))?;
                    let name = name
                        .unescape_value()
                        .map_err(|e| TapError::protocol(format!("malformed VOTable: {e}")))?;
                    columns.push(name.into_owned());
                }
                Event::Start(ref e) if e.local_name().as_ref() == b"TR" => {
                    row = Vec::with_capacity(columns.len());
                }
                Event::Start(ref e) if e.local_name().as_ref() == b"TD" => {
                    in_td = true;
                    cell = None;
                }
                Event::Empty(ref e) if e.local_name().as_ref() == b"TD" => {
                    row.push(None);
                }
                Event::Text(ref t) if in_td => {
                    let text = t
                        .unescape()
                        .map_err(|e| TapError::protocol(format!("malformed VOTable: {e}")))?;
                    cell = Some(text.into_owned());
                }
                Event::End(ref e) if e.local_name().as_ref() == b"TD" => {
                    row.push(cell.take().filter(|s| !s.is_empty()));
                    in_td = false;
                }
                Event::End(ref e) if e.local_name().as_ref() == b"TR" => {
                    if row.len() != columns.len() {
                        return Err(TapError::protocol(format!(
                            "table row has {} cells but {} fields are declared",
                            row.len(),
                            columns.len()
                        )));
                    }
                    rows.push(std::mem::take(&mut row));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if columns.is_empty() {
            return Err(TapError::protocol("VOTable declares no FIELD elements"));
        }
        Ok(Self { columns, rows })
    }

    /// Serializes the table as an inline VOTable suitable for a TAP upload.
    #[must_use]
    pub fn to_votable(&self) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <VOTABLE version=\"1.3\" xmlns=\"http://www.ivoa.net/xml/VOTable/v1.3\">\n\
             <RESOURCE><TABLE>\n",
        );
        for column in &self.columns {
            out.push_str(&format!(
                "<FIELD name=\"{}\" datatype=\"char\" arraysize=\"*\"/>\n",
                escape(column.as_str())
            ));
        }
        out.push_str("<DATA><TABLEDATA>\n");
        for row in &self.rows {
            out.push_str("<TR>");
            for cell in row {
                match cell {
                    Some(value) => {
                        out.push_str("<TD>");
                        out.push_str(&escape(value.as_str()));
                        out.push_str("</TD>");
                    }
                    None => out.push_str("<TD/>"),
                }
            }
            out.push_str("</TR>\n");
        }
        out.push_str("</TABLEDATA></DATA>\n</TABLE></RESOURCE>\n</VOTABLE>\n");
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LIGHTCURVE_VOTABLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<VOTABLE version="1.3" xmlns="http://www.ivoa.net/xml/VOTable/v1.3">
<RESOURCE type="results">
<TABLE>
<FIELD name="jd_mid" datatype="double"/>
<FIELD name="bmag" datatype="float"/>
<FIELD name="bmagerr" datatype="float"/>
<DATA><TABLEDATA>
<TR><TD>2420000.5</TD><TD>11.25</TD><TD>0.12</TD></TR>
<TR><TD>2420001.5</TD><TD/><TD>0.15</TD></TR>
</TABLEDATA></DATA>
</TABLE>
</RESOURCE>
</VOTABLE>"#;

    #[test]
    fn test_parse_columns_and_rows() {
        let table = Table::from_votable(LIGHTCURVE_VOTABLE).unwrap();
        assert_eq!(table.columns(), ["jd_mid", "bmag", "bmagerr"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.value(0, "jd_mid"), Some("2420000.5"));
        assert_eq!(table.f64(0, "bmag"), Some(11.25));
    }

    #[test]
    fn test_empty_td_is_null() {
        let table = Table::from_votable(LIGHTCURVE_VOTABLE).unwrap();
        assert_eq!(table.value(1, "bmag"), None);
        assert_eq!(table.f64(1, "bmagerr"), Some(0.15));
    }

    #[test]
    fn test_unknown_column_and_row_are_none() {
        let table = Table::from_votable(LIGHTCURVE_VOTABLE).unwrap();
        assert_eq!(table.value(0, "vmag"), None);
        assert_eq!(table.value(99, "jd_mid"), None);
    }

    #[test]
    fn test_no_fields_is_an_error() {
        let result = Table::from_votable("<VOTABLE><RESOURCE/></VOTABLE>");
        assert!(matches!(result, Err(TapError::Protocol { .. })));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let result = Table::from_votable("<VOTABLE><FIELD name=");
        assert!(matches!(result, Err(TapError::Protocol { .. })));
    }

    #[test]
    fn test_row_arity_mismatch_is_an_error() {
        let xml = r#"<VOTABLE><FIELD name="a"/><FIELD name="b"/>
            <TABLEDATA><TR><TD>1</TD></TR></TABLEDATA></VOTABLE>"#;
        let result = Table::from_votable(xml);
        assert!(matches!(result, Err(TapError::Protocol { .. })));
    }

    #[test]
    fn test_push_row_validates_arity() {
        let mut table = Table::new(vec!["a".to_string(), "b".to_string()]);
        assert!(
            table
                .push_row(vec![Some("1".to_string()), None])
                .is_ok()
        );
        assert!(table.push_row(vec![Some("1".to_string())]).is_err());
    }

    #[test]
    fn test_to_votable_round_trips() {
        let mut table = Table::new(vec!["plate_id".to_string(), "note".to_string()]);
        table
            .push_row(vec![Some("12345".to_string()), Some("a < b".to_string())])
            .unwrap();
        table.push_row(vec![Some("12346".to_string()), None]).unwrap();

        let xml = table.to_votable();
        assert!(xml.contains(r#"<FIELD name="plate_id""#));
        assert!(xml.contains("a &lt; b"));

        let parsed = Table::from_votable(&xml).unwrap();
        assert_eq!(parsed, table);
    }
}
