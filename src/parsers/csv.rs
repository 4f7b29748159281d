use csv::ReaderBuilder;

use crate::error::{IngestError, IngestResult};

/// Splits one delimited line into fields, honouring CSV quoting.
///
/// Lines without a quote character take a plain split on the delimiter;
/// only quoted lines go through the `csv` reader.
#[derive(Debug, Clone)]
pub struct FieldSplitter {
    delimiter: u8,
}

impl FieldSplitter {
    pub fn new_csv() -> Self {
        Self { delimiter: b',' }
    }

    pub fn new_tsv() -> Self {
        Self { delimiter: b'\t' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Split `line` (already stripped of its terminator) into fields.
    /// `row` is only used for error reporting.
    pub fn split(&self, line: &str, row: usize) -> IngestResult<Vec<String>> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(IngestError::MalformedLine {
                row,
                reason: "empty line".to_string(),
            });
        }

        if !line.contains('"') {
            return Ok(line
                .split(self.delimiter as char)
                .map(str::to_string)
                .collect());
        }

        self.split_quoted(line, row)
    }

    fn split_quoted(&self, line: &str, row: usize) -> IngestResult<Vec<String>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes());

        match reader.records().next() {
            Some(Ok(record)) => Ok(record.iter().map(str::to_string).collect()),
            Some(Err(e)) => Err(IngestError::MalformedLine {
                row,
                reason: e.to_string(),
            }),
            None => Err(IngestError::MalformedLine {
                row,
                reason: "no record found".to_string(),
            }),
        }
    }
}

impl Default for FieldSplitter {
    fn default() -> Self {
        Self::new_csv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_split() {
        let splitter = FieldSplitter::new_csv();
        let fields = splitter.split("a,b,,d", 1).unwrap();
        assert_eq!(fields, ["a", "b", "", "d"]);
    }

    #[test]
    fn test_trailing_empty_field() {
        let splitter = FieldSplitter::new_csv();
        let fields = splitter.split("a,b,", 1).unwrap();
        assert_eq!(fields, ["a", "b", ""]);
    }

    #[test]
    fn test_strips_terminator() {
        let splitter = FieldSplitter::new_csv();
        let fields = splitter.split("a,b\r\n", 1).unwrap();
        assert_eq!(fields, ["a", "b"]);
    }

    #[test]
    fn test_quoted_fields() {
        let splitter = FieldSplitter::new_csv();
        let fields = splitter
            .split("\"John Smith\",\"Hello, world!\"", 1)
            .unwrap();
        assert_eq!(fields, ["John Smith", "Hello, world!"]);
    }

    #[test]
    fn test_escaped_quotes() {
        let splitter = FieldSplitter::new_csv();
        let fields = splitter
            .split("\"John\",\"He said \"\"hello\"\" to me\"", 1)
            .unwrap();
        assert_eq!(fields, ["John", "He said \"hello\" to me"]);
    }

    #[test]
    fn test_tsv() {
        let splitter = FieldSplitter::new_tsv();
        let fields = splitter.split("a\tb,c\td", 1).unwrap();
        assert_eq!(fields, ["a", "b,c", "d"]);
    }

    #[test]
    fn test_empty_line_is_malformed() {
        let splitter = FieldSplitter::new_csv();
        let err = splitter.split("", 7).unwrap_err();
        assert!(matches!(err, IngestError::MalformedLine { row: 7, .. }));
    }
}
