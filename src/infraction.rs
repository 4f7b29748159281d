//! Parking infraction records.
//!
//! Column layout of the municipal export:
//!
//! | # | field          | notes                                  |
//! |---|----------------|----------------------------------------|
//! | 1 | tag number     | first three characters masked with `*` |
//! | 2 | date           | `YYYYMMDD`                             |
//! | 3 | code           | numeric infraction code                |
//! | 4 | description    |                                        |
//! | 5 | fine           | dollars                                |
//! | 6 | time           | `HHMM`, 24-hour clock                  |
//! | 7 | location 1     | proximity code (AT, NR, OPP, N/S, ...) |
//! | 8 | location 2     | street address                         |
//! | 9 | location 3     | proximity code, optional               |
//! |10 | location 4     | street address, optional               |
//! |11 | province       | plate province or state                |

use crate::address::{Address, AddressParser};
use crate::parsers::coerce::lenient_i64;

pub const INFRACTION_FIELDS: usize = 11;

/// One parsed ticket. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Infraction {
    fields: [String; INFRACTION_FIELDS],
}

impl Infraction {
    /// Build from exactly eleven fields, in export column order.
    pub fn from_fields(fields: [String; INFRACTION_FIELDS]) -> Self {
        Self { fields }
    }

    pub fn number(&self) -> &str {
        &self.fields[0]
    }

    pub fn date(&self) -> &str {
        &self.fields[1]
    }

    /// Infraction code; non-numeric values coerce to 0.
    pub fn code(&self) -> i64 {
        lenient_i64(&self.fields[2])
    }

    pub fn description(&self) -> &str {
        &self.fields[3]
    }

    /// Fine in dollars; non-numeric values coerce to 0.
    pub fn fine(&self) -> i64 {
        lenient_i64(&self.fields[4])
    }

    pub fn time(&self) -> &str {
        &self.fields[5]
    }

    pub fn province(&self) -> &str {
        &self.fields[10]
    }

    /// Location fields 7-10. Rebuilt on every call.
    pub fn location(&self) -> Location<'_> {
        Location {
            location_1: non_empty(&self.fields[6]),
            location_2: non_empty(&self.fields[7]),
            location_3: non_empty(&self.fields[8]),
            location_4: non_empty(&self.fields[9]),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

fn non_empty(field: &str) -> Option<&str> {
    if field.is_empty() {
        None
    } else {
        Some(field)
    }
}

/// The four proximity/address fields of an [`Infraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'a> {
    pub location_1: Option<&'a str>,
    pub location_2: Option<&'a str>,
    pub location_3: Option<&'a str>,
    pub location_4: Option<&'a str>,
}

impl<'a> Location<'a> {
    pub fn new(
        location_1: Option<&'a str>,
        location_2: Option<&'a str>,
        location_3: Option<&'a str>,
        location_4: Option<&'a str>,
    ) -> Self {
        Self {
            location_1,
            location_2,
            location_3,
            location_4,
        }
    }

    /// Address derived from the second field; `None` when it is absent.
    pub fn address(&self) -> Option<Address> {
        self.address_with(&AddressParser::default())
    }

    pub fn address_with(&self, parser: &AddressParser) -> Option<Address> {
        self.location_2
            .map(|raw| Address::with_parser(raw, parser.clone()))
    }
}
