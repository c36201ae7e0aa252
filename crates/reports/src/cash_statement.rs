use chrono::{DateTime, Utc};
use serde::Serialize;

use regdesk_core::Money;
use regdesk_finance::{CashMovement, CashRegister, MovementKind, MovementOrigin};

use crate::pdf::PdfDocument;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementLine {
    pub created_at: DateTime<Utc>,
    pub kind: MovementKind,
    pub origin: MovementOrigin,
    pub description: String,
    pub value: Money,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashStatementReport {
    pub register_name: String,
    pub generated_at: DateTime<Utc>,
    pub lines: Vec<StatementLine>,
    pub total_income: Money,
    pub total_expense: Money,
    pub final_balance: Money,
}

impl CashStatementReport {
    /// Running balance over the movements in chronological order.
    pub fn build(register: &CashRegister, movements: &[CashMovement], generated_at: DateTime<Utc>) -> Self {
        let mut ordered: Vec<&CashMovement> = movements.iter().collect();
        ordered.sort_by_key(|m| m.created_at());

        let mut balance = Money::zero();
        let mut total_income = Money::zero();
        let mut total_expense = Money::zero();
        let lines = ordered
            .into_iter()
            .map(|m| {
                balance += m.signed_value();
                match m.kind() {
                    MovementKind::Income => total_income += m.value(),
                    MovementKind::Expense => total_expense += m.value(),
                }
                StatementLine {
                    created_at: m.created_at(),
                    kind: m.kind(),
                    origin: m.origin(),
                    description: m.description().to_string(),
                    value: m.value(),
                    balance,
                }
            })
            .collect();

        Self {
            register_name: register.name().to_string(),
            generated_at,
            lines,
            total_income,
            total_expense,
            final_balance: balance,
        }
    }

    pub fn to_pdf(&self) -> Vec<u8> {
        let mut doc = PdfDocument::new(format!("Extrato - {}", self.register_name));
        doc.line(format!("Gerado em {}", self.generated_at.format("%d/%m/%Y %H:%M UTC")));
        doc.blank();
        for line in &self.lines {
            let sign = match line.kind {
                MovementKind::Income => "+",
                MovementKind::Expense => "-",
            };
            doc.line(format!(
                "{}  {}{}  saldo {}  {}",
                line.created_at.format("%d/%m/%Y"),
                sign,
                line.value,
                line.balance,
                line.description
            ));
        }
        doc.blank().heading("Totais");
        doc.line(format!("Entradas: {}", self.total_income));
        doc.line(format!("Saídas: {}", self.total_expense));
        doc.line(format!("Saldo final: {}", self.final_balance));
        doc.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use regdesk_core::RegionId;
    use regdesk_finance::NewCashMovement;

    #[test]
    fn running_balance_follows_time_order() {
        let start = Utc::now();
        let mut register = CashRegister::create("Caixa", RegionId::new(), start).unwrap();
        let mut apply = |kind, cents, minutes| {
            register
                .apply(
                    NewCashMovement {
                        kind,
                        origin: MovementOrigin::Manual,
                        value: Money::from_cents(cents),
                        description: "mov".to_string(),
                        reference_id: None,
                    },
                    start + Duration::minutes(minutes),
                )
                .unwrap()
        };
        let a = apply(MovementKind::Income, 1_000, 1);
        let b = apply(MovementKind::Expense, 400, 2);
        let c = apply(MovementKind::Income, 50, 3);

        let report = CashStatementReport::build(&register, &[c, a, b], Utc::now());
        let balances: Vec<i64> = report.lines.iter().map(|l| l.balance.cents()).collect();
        assert_eq!(balances, vec![1_000, 600, 650]);
        assert_eq!(report.total_income, Money::from_cents(1_050));
        assert_eq!(report.total_expense, Money::from_cents(400));
        assert_eq!(report.final_balance, register.balance());
    }
}
