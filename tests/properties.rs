use family_ledger::{
    config::{LedgerSettings, MemberSeed, WalletSeed},
    model::{Role, TransactionKind, TransactionStatus},
    processor::engine::LedgerEngine,
    provider::{ChargeOutcome, ScriptedProvider},
    store::in_memory::InMemoryStore,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Op {
    Expense { by_admin: bool, amount: u32 },
    Payment { by_admin: bool, amount: u32, approved: bool },
    Transfer { amount: u32 },
    TopUp { amount: u32 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<bool>(), 1u32..400_000).prop_map(|(by_admin, amount)| Op::Expense { by_admin, amount }),
        (any::<bool>(), 1u32..400_000, any::<bool>()).prop_map(|(by_admin, amount, approved)| {
            Op::Payment { by_admin, amount, approved }
        }),
        (1u32..1_000_000).prop_map(|amount| Op::Transfer { amount }),
        (1u32..200_000).prop_map(|amount| Op::TopUp { amount }),
    ]
}

fn seed(initial_balance: u32) -> WalletSeed {
    WalletSeed {
        name: "Keluarga".to_string(),
        currency: "IDR".to_string(),
        initial_balance: Decimal::from(initial_balance),
        members: vec![
            MemberSeed {
                name: "Bapak".to_string(),
                email: "bapak@example.com".to_string(),
                role: Role::Admin,
                daily_limit: Decimal::from(100_000),
                monthly_limit: Decimal::from(1_000_000),
            },
            MemberSeed {
                name: "Ibu".to_string(),
                email: "ibu@example.com".to_string(),
                role: Role::Member,
                daily_limit: Decimal::from(300_000),
                monthly_limit: Decimal::from(5_000_000),
            },
        ],
    }
}

proptest! {
    #[test]
    fn balance_is_conserved(initial in 0u32..3_000_000, ops in prop::collection::vec(op(), 0..40)) {
        let engine = LedgerEngine::new(InMemoryStore::new(), LedgerSettings::default());
        let ledger = engine.create_wallet(&seed(initial)).unwrap();
        let wallet_id = ledger.wallet.id;
        let (admin, ibu) = (ledger.members[0].id, ledger.members[1].id);
        let mut provider = ScriptedProvider::default();

        for op in ops {
            let before = engine.load(wallet_id).unwrap();
            let result = match op {
                Op::Expense { by_admin: true, amount } => {
                    engine.submit_expense(wallet_id, admin, Decimal::from(amount), "Food", "")
                }
                Op::Expense { by_admin: false, amount } => {
                    engine.submit_expense(wallet_id, ibu, Decimal::from(amount), "Food", "")
                }
                Op::Payment { by_admin, amount, approved } => {
                    let outcome = if approved {
                        ChargeOutcome::Approved
                    } else {
                        ChargeOutcome::Declined { reason: "declined".to_string() }
                    };
                    let member = if by_admin { admin } else { ibu };
                    let mut payment_provider = ScriptedProvider::new([outcome]);
                    engine.submit_payment(
                        wallet_id,
                        member,
                        Decimal::from(amount),
                        "Food",
                        "Warung",
                        &mut payment_provider,
                    )
                }
                Op::Transfer { amount } => {
                    engine.submit_transfer(wallet_id, ibu, admin, Decimal::from(amount), None)
                }
                Op::TopUp { amount } => {
                    engine.top_up(wallet_id, admin, Decimal::from(amount), "dana", &mut provider)
                }
            };
            let after = engine.load(wallet_id).unwrap();
            let rejected = match &result {
                Ok(tx) => tx.status == TransactionStatus::Failed,
                Err(_) => true,
            };
            if rejected {
                prop_assert_eq!(&after.wallet, &before.wallet);
                prop_assert_eq!(&after.members, &before.members);
                prop_assert_eq!(after.transactions.len(), before.transactions.len());
            }

            let member = after.member(ibu).unwrap();
            prop_assert!(member.current_daily_spent <= member.daily_limit);
            prop_assert!(after.wallet.balance >= Decimal::ZERO);
        }

        let ledger = engine.load(wallet_id).unwrap();
        let sum = |kind: TransactionKind| -> Decimal {
            ledger
                .transactions
                .iter()
                .filter(|tx| tx.kind == kind)
                .map(|tx| tx.amount)
                .sum()
        };
        prop_assert_eq!(
            ledger.wallet.balance,
            Decimal::from(initial)
                - sum(TransactionKind::Expense)
                - sum(TransactionKind::Payment)
                - sum(TransactionKind::Transfer)
                + sum(TransactionKind::TopUp)
        );
        let spent: Decimal = ledger
            .transactions
            .iter()
            .filter(|tx| {
                matches!(tx.kind, TransactionKind::Expense | TransactionKind::Payment)
                    && tx.from_member_id == ibu
            })
            .map(|tx| tx.amount)
            .sum();
        prop_assert_eq!(ledger.member(ibu).unwrap().current_daily_spent, spent);
    }
}
