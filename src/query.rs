use rust_decimal::Decimal;

use crate::model::{Transaction, TransactionKind};

/// `None` for `category` or `kind` stands for "all".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub search: String,
    pub category: Option<String>,
    pub kind: Option<TransactionKind>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        let search = self.search.to_lowercase();
        let matches_search = search.is_empty()
            || tx.description.to_lowercase().contains(&search)
            || tx.category.to_lowercase().contains(&search);
        let matches_category = self
            .category
            .as_ref()
            .is_none_or(|category| &tx.category == category);
        let matches_kind = self.kind.is_none_or(|kind| tx.kind == kind);
        matches_search && matches_category && matches_kind
    }

    /// Keeps the incoming order.
    pub fn apply<'a>(
        &self,
        transactions: impl IntoIterator<Item = &'a Transaction>,
    ) -> FilteredTransactions {
        FilteredTransactions(
            transactions
                .into_iter()
                .filter(|tx| self.matches(tx))
                .cloned()
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredTransactions(pub Vec<Transaction>);

impl FilteredTransactions {
    pub fn count(&self) -> usize {
        self.0.len()
    }

    pub fn total_amount(&self) -> Decimal {
        self.0.iter().map(|tx| tx.amount).sum()
    }

    /// Zero for an empty set.
    pub fn average_amount(&self) -> Decimal {
        if self.0.is_empty() {
            Decimal::ZERO
        } else {
            self.total_amount() / Decimal::from(self.0.len())
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Transaction> {
        self.0
    }
}

/// Categories in order of first appearance.
pub fn distinct_categories<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for tx in transactions {
        if !categories.contains(&tx.category) {
            categories.push(tx.category.clone());
        }
    }
    categories
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::model::TransactionStatus;

    use super::*;

    fn tx(kind: TransactionKind, category: &str, description: &str, amount: u32) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            wallet_id: Uuid::nil(),
            from_member_id: Uuid::nil(),
            to_member_id: None,
            amount: Decimal::from(amount),
            kind,
            category: category.to_string(),
            description: description.to_string(),
            status: TransactionStatus::Completed,
            timestamp: Utc::now(),
        }
    }

    fn history() -> Vec<Transaction> {
        vec![
            tx(TransactionKind::TopUp, "Top Up", "Top up via Dana", 50_000),
            tx(TransactionKind::Expense, "Food", "Weekly groceries", 150_000),
            tx(TransactionKind::Transfer, "Transfer", "Transfer to Ibu", 20_000),
            tx(TransactionKind::Expense, "Transport", "Fuel", 100_000),
        ]
    }

    #[test]
    fn empty_filter_returns_everything_in_order() {
        let history = history();
        let filtered = TransactionFilter::default().apply(&history);
        assert_eq!(filtered.0, history);
    }

    #[test]
    fn filter_by_category() {
        let history = history();
        let filtered = TransactionFilter {
            category: Some("Food".to_string()),
            ..Default::default()
        }
        .apply(&history);
        assert_eq!(filtered.0, vec![history[1].clone()]);
    }

    #[test]
    fn filter_by_kind_and_search() {
        let history = history();
        let filter = TransactionFilter {
            search: "FUEL".to_string(),
            kind: Some(TransactionKind::Expense),
            ..Default::default()
        };
        let filtered = filter.apply(&history);
        assert_eq!(filtered.count(), 1);
        assert_eq!(filtered.0[0].description, "Fuel");

        // search also looks at the category
        let filtered = TransactionFilter {
            search: "transp".to_string(),
            ..Default::default()
        }
        .apply(&history);
        assert_eq!(filtered.count(), 1);
    }

    #[test]
    fn search_is_a_plain_substring() {
        let history = history();
        let filtered = TransactionFilter {
            search: " ".to_string(),
            ..Default::default()
        }
        .apply(&history);
        assert_eq!(filtered.count(), 3);
        assert!(filtered.iter().all(|tx| tx.description != "Fuel"));
    }

    #[test]
    fn aggregates() {
        let history = history();
        let expenses = TransactionFilter {
            kind: Some(TransactionKind::Expense),
            ..Default::default()
        }
        .apply(&history);
        assert_eq!(expenses.count(), 2);
        assert_eq!(expenses.total_amount(), Decimal::from(250_000));
        assert_eq!(expenses.average_amount(), Decimal::from(125_000));

        let none = TransactionFilter {
            kind: Some(TransactionKind::Payment),
            ..Default::default()
        }
        .apply(&history);
        assert_eq!(none.count(), 0);
        assert_eq!(none.total_amount(), Decimal::ZERO);
        assert_eq!(none.average_amount(), Decimal::ZERO);
    }

    #[test]
    fn categories_in_first_appearance_order() {
        let mut history = history();
        history.push(tx(TransactionKind::Expense, "Food", "Snacks", 5_000));
        assert_eq!(
            distinct_categories(&history),
            vec!["Top Up", "Food", "Transfer", "Transport"]
        );
    }
}
