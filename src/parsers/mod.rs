pub mod coerce;
pub mod csv;
pub mod record;

pub use self::csv::FieldSplitter;
pub use record::RecordParser;
