use crate::domain::order::OrderKind;
use crate::error::{OrderError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One user action in the replay log.
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Book,
    AcceptBooking,
    DeclineBooking,
    Offer,
    Counter,
    AcceptOffer,
    DeclineOffer,
    Pay,
    PayDirect,
    Paid,
    Show,
    Scan,
    Cancel,
    Overdue,
}

/// A row of the action log. Unused columns are left empty; `note` carries
/// the offer message or the handoff action name depending on the op.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ActionRecord {
    pub op: Op,
    pub order: String,
    pub actor: Option<String>,
    pub counterpart: Option<String>,
    pub kind: Option<OrderKind>,
    pub amount: Option<Decimal>,
    pub note: Option<String>,
}

/// Reads action records from a CSV source.
///
/// Wraps `csv::Reader` and yields `Result<ActionRecord>` lazily, so large
/// logs stream without being loaded whole. Whitespace is trimmed and
/// short rows tolerated.
pub struct ActionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ActionReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn actions(self) -> impl Iterator<Item = Result<ActionRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(OrderError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "op, order, actor, counterpart, kind, amount, note";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{HEADER}\nbook, o1, alice, bob, item, 50.0, \noffer, o1, alice, , , 40.0, can you do 40?"
        );
        let reader = ActionReader::new(data.as_bytes());
        let records: Vec<ActionRecord> = reader.actions().map(|r| r.unwrap()).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].op, Op::Book);
        assert_eq!(records[0].kind, Some(OrderKind::Item));
        assert_eq!(records[0].amount, Some(dec!(50.0)));
        assert_eq!(records[0].note, None);

        assert_eq!(records[1].op, Op::Offer);
        assert_eq!(records[1].actor.as_deref(), Some("alice"));
        assert_eq!(records[1].counterpart, None);
        assert_eq!(records[1].note.as_deref(), Some("can you do 40?"));
    }

    #[test]
    fn test_reader_scan_row() {
        let data = format!("{HEADER}\nscan, o1, bob, , , , delivery");
        let reader = ActionReader::new(data.as_bytes());
        let record = reader.actions().next().unwrap().unwrap();
        assert_eq!(record.op, Op::Scan);
        assert_eq!(record.note.as_deref(), Some("delivery"));
        assert_eq!(record.amount, None);
    }

    #[test]
    fn test_reader_unknown_op_is_an_error() {
        let data = format!("{HEADER}\nteleport, o1, alice, , , , ");
        let reader = ActionReader::new(data.as_bytes());
        let results: Vec<Result<ActionRecord>> = reader.actions().collect();
        assert!(results[0].is_err());
    }
}
