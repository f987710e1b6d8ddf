use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Expense,
    Payment,
    Transfer,
    Topup,
    Limits,
}

/// One line of an operations file. Members are referenced by email.
///
/// `amount` is the daily limit for `limits` rows, and `to` the member whose limits change.
#[derive(Debug, Deserialize)]
pub struct OperationRow {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub member: String,
    pub to: Option<String>,
    pub amount: Option<Decimal>,
    pub monthly_limit: Option<Decimal>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub method: Option<String>,
}

/// Parses an operations list in CSV format, yielding each row with its line number.
pub struct CsvOperationParser<R> {
    iter: DeserializeRecordsIntoIter<R, OperationRow>,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, Result<OperationRow, csv::Error>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}
