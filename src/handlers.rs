//! Per-record handlers injected into the runners.

use std::sync::Arc;

use crate::address::AddressParser;
use crate::counter::GroupCounter;
use crate::infraction::Infraction;

/// Bucket for tickets whose location carries no street address.
pub const UNDEFINED_STREET: &str = "undefined";

/// Called once per successfully parsed record, from whichever worker thread
/// processed its batch.
pub trait RecordHandler: Send + Sync {
    fn handle(&self, record: &Infraction, row: usize);
}

impl<F> RecordHandler for F
where
    F: Fn(&Infraction, usize) + Send + Sync,
{
    fn handle(&self, record: &Infraction, row: usize) {
        self(record, row)
    }
}

/// Sums fines per normalized street name.
#[derive(Debug, Clone)]
pub struct SummarizeFinesByStreet {
    counter: Arc<GroupCounter>,
    parser: AddressParser,
}

impl SummarizeFinesByStreet {
    pub fn new(counter: Arc<GroupCounter>) -> Self {
        Self::with_parser(counter, AddressParser::default())
    }

    pub fn with_parser(counter: Arc<GroupCounter>, parser: AddressParser) -> Self {
        Self { counter, parser }
    }

    pub fn counter(&self) -> &Arc<GroupCounter> {
        &self.counter
    }
}

impl RecordHandler for SummarizeFinesByStreet {
    fn handle(&self, record: &Infraction, _row: usize) {
        match record.location().address_with(&self.parser) {
            Some(address) => self.counter.add(address.street_name(), record.fine()),
            None => self.counter.add(UNDEFINED_STREET, record.fine()),
        };
    }
}
