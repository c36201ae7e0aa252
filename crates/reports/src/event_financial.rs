use chrono::{DateTime, Utc};
use serde::Serialize;

use regdesk_core::Money;
use regdesk_events::Event;
use regdesk_payments::{Payment, PaymentMethod, PaymentStatus};
use regdesk_tickets::{TicketSale, TicketSaleStatus};

use crate::pdf::PdfDocument;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub payments: usize,
    pub total: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinancialSummary {
    pub approved_total: Money,
    pub under_review_total: Money,
    pub refused_total: Money,
    /// Approved payments grouped by method; methods without payments are omitted.
    pub approved_by_method: Vec<MethodTotal>,
    pub tickets_sold: u32,
    pub tickets_total: Money,
    pub amount_collected: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFinancialReport {
    pub event_name: String,
    pub generated_at: DateTime<Utc>,
    pub summary: FinancialSummary,
}

impl EventFinancialReport {
    pub fn build(event: &Event, payments: &[Payment], sales: &[TicketSale], generated_at: DateTime<Utc>) -> Self {
        let mut summary = FinancialSummary {
            amount_collected: event.amount_collected(),
            ..FinancialSummary::default()
        };

        for payment in payments {
            match payment.status() {
                PaymentStatus::Approved => summary.approved_total += payment.total_value(),
                PaymentStatus::UnderReview => summary.under_review_total += payment.total_value(),
                PaymentStatus::Refused => summary.refused_total += payment.total_value(),
            }
        }

        summary.approved_by_method = PaymentMethod::ALL
            .iter()
            .filter_map(|method| {
                let approved: Vec<&Payment> = payments
                    .iter()
                    .filter(|p| p.status() == PaymentStatus::Approved && p.method() == *method)
                    .collect();
                (!approved.is_empty()).then(|| MethodTotal {
                    method: *method,
                    payments: approved.len(),
                    total: approved.iter().map(|p| p.total_value()).sum(),
                })
            })
            .collect();

        for sale in sales.iter().filter(|s| s.status() == TicketSaleStatus::Active) {
            summary.tickets_sold += sale.quantity();
            summary.tickets_total += sale.total_value();
        }

        Self {
            event_name: event.name().to_string(),
            generated_at,
            summary,
        }
    }

    pub fn to_pdf(&self) -> Vec<u8> {
        let s = &self.summary;
        let mut doc = PdfDocument::new(format!("Financeiro - {}", self.event_name));
        doc.line(format!("Gerado em {}", self.generated_at.format("%d/%m/%Y %H:%M UTC")));
        doc.blank().heading("Pagamentos de inscrições");
        doc.line(format!("Aprovados: {}", s.approved_total));
        doc.line(format!("Em análise: {}", s.under_review_total));
        doc.line(format!("Recusados: {}", s.refused_total));
        doc.blank().heading("Aprovados por forma de pagamento");
        if s.approved_by_method.is_empty() {
            doc.line("Nenhum pagamento aprovado");
        }
        for row in &s.approved_by_method {
            doc.line(format!("{}: {} pagamento(s), {}", method_label(row.method), row.payments, row.total));
        }
        doc.blank().heading("Ingressos");
        doc.line(format!("Vendidos: {}  Total: {}", s.tickets_sold, s.tickets_total));
        doc.blank().heading("Arrecadado no evento");
        doc.line(s.amount_collected.to_string());
        doc.render()
    }
}

fn method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Pix => "PIX",
        PaymentMethod::Cash => "Dinheiro",
        PaymentMethod::Transfer => "Transferência",
        PaymentMethod::CreditCard => "Cartão de crédito",
    }
}
