use std::{cell::RefCell, rc::Rc, str::from_utf8};

use family_ledger::{
    bin_utils::{Service, ServiceError},
    config::AppConfig,
    processor::ErrorKind,
    provider::ScriptedProvider,
};

const CONFIG: &str = include_str!("wallet.json");
const OPERATIONS: &str = include_str!("operations.csv");

#[test]
fn replay_operations() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let collected = Rc::clone(&errors);
    let mut output = Vec::new();
    let service = Service {
        config: AppConfig::from_json(CONFIG).unwrap(),
        input: OPERATIONS.as_bytes(),
        output: &mut output,
        provider: ScriptedProvider::default(),
        error_printer: Box::new(move |_line, err| collected.borrow_mut().push(err)),
    };
    service.run().unwrap();

    let errors = errors.borrow();
    let rejected: Vec<ErrorKind> = errors
        .iter()
        .filter_map(|err| match err {
            ServiceError::Process(err) => Some(err.kind()),
            _ => None,
        })
        .collect();
    assert_eq!(
        rejected,
        vec![
            ErrorKind::LimitExceeded,
            ErrorKind::InvalidAmount,
            ErrorKind::NotAuthorized,
            ErrorKind::InvalidInput
        ]
    );
    assert_eq!(errors.len(), 6);
    // invalid rows are reported, wallet rule rejections are only logged
    let reported: Vec<String> = errors
        .iter()
        .filter(|err| !err.is_rule_rejection())
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        reported,
        vec![
            "Top up amount 9999 is below the minimum of 10000",
            "Unknown member `nobody@example.com`",
            "A member cannot transfer to themselves",
            "`to` is required for Transfer",
        ]
    );
    assert!(errors.iter().any(|err| matches!(
        err,
        ServiceError::UnknownMember { email } if email == "nobody@example.com"
    )));
    assert!(errors.iter().any(|err| matches!(
        err,
        ServiceError::MissingField { field: "to", .. }
    )));

    // the date column depends on the clock, so compare the rest
    let mut reader = csv::Reader::from_reader(from_utf8(&output).unwrap().as_bytes());
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["date", "description", "category", "type", "amount", "status", "member"]
    );
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|record| record.unwrap().iter().skip(1).map(ToOwned::to_owned).collect())
        .collect();
    assert_eq!(
        rows,
        vec![
            vec!["Warung", "Food", "Payment", "20000", "Completed", "Bapak"],
            vec!["Car service", "Transport", "Expense", "250000", "Completed", "Ibu"],
            vec!["Top up via Credit Card", "Top Up", "Top Up", "50000", "Completed", "Bapak"],
            vec!["Transfer to Bapak", "Transfer", "Transfer", "50000", "Completed", "Ibu"],
            vec!["Weekly groceries", "Food", "Expense", "100000", "Completed", "Ibu"],
        ]
    );
}
