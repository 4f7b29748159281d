use crate::error::{IngestError, IngestResult};
use crate::infraction::{Infraction, INFRACTION_FIELDS};

use super::csv::FieldSplitter;

/// Turns raw lines or pre-split fields into [`Infraction`]s.
///
/// The parser itself always reports a wrong field count as
/// [`IngestError::MalformedRecord`]; whether that drops the row or aborts the
/// run is decided by the caller's [`ErrorStrategy`](crate::config::ErrorStrategy).
#[derive(Debug, Clone, Default)]
pub struct RecordParser {
    splitter: FieldSplitter,
}

impl RecordParser {
    pub fn new(splitter: FieldSplitter) -> Self {
        Self { splitter }
    }

    /// Build an infraction from exactly eleven fields.
    pub fn parse(&self, fields: Vec<String>) -> IngestResult<Infraction> {
        let found = fields.len();
        let fields: [String; INFRACTION_FIELDS] =
            fields
                .try_into()
                .map_err(|_| IngestError::MalformedRecord {
                    expected: INFRACTION_FIELDS,
                    found,
                })?;
        Ok(Infraction::from_fields(fields))
    }

    /// Split and parse one input line.
    pub fn parse_line(&self, line: &str, row: usize) -> IngestResult<Infraction> {
        let fields = self.splitter.split(line, row)?;
        self.parse(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "***68492,20120101,192,STAND SIGNED TRANSIT STOP,60,0014,W/S,PARLIAMENT ST,S/O,VERNER LANE,ON";

    #[test]
    fn test_parse_sample_line() {
        let parser = RecordParser::default();
        let infraction = parser.parse_line(SAMPLE, 1).unwrap();

        assert_eq!(infraction.number(), "***68492");
        assert_eq!(infraction.code(), 192);
        assert_eq!(infraction.description(), "STAND SIGNED TRANSIT STOP");
        assert_eq!(infraction.fine(), 60);
        assert_eq!(infraction.province(), "ON");

        let address = infraction.location().address().unwrap();
        assert_eq!(address.raw(), "PARLIAMENT ST");
    }

    #[test]
    fn test_too_few_fields() {
        let parser = RecordParser::default();
        let err = parser.parse(Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::MalformedRecord {
                expected: 11,
                found: 0
            }
        ));
    }

    #[test]
    fn test_too_many_fields() {
        let parser = RecordParser::default();
        let line = format!("{},EXTRA", SAMPLE);
        let err = parser.parse_line(&line, 2).unwrap_err();
        assert!(matches!(err, IngestError::MalformedRecord { found: 12, .. }));
    }

    #[test]
    fn test_quoted_description_with_comma() {
        let parser = RecordParser::default();
        let line = "***11111,20120101,5,\"PARK, FAIL TO DEPOSIT FEE\",30,1200,NR,100 KING ST W,,,ON";
        let infraction = parser.parse_line(line, 3).unwrap();
        assert_eq!(infraction.description(), "PARK, FAIL TO DEPOSIT FEE");
        assert_eq!(infraction.fine(), 30);
        assert!(infraction.location().location_3.is_none());
    }

    #[test]
    fn test_empty_secondary_location_has_no_address() {
        let parser = RecordParser::default();
        let line = "***22222,20120101,5,PARK,30,1200,NR,,,,ON";
        let infraction = parser.parse_line(line, 4).unwrap();
        assert!(infraction.location().address().is_none());
    }
}
