use chrono::{DateTime, Utc};
use serde::Serialize;

use regdesk_core::Money;
use regdesk_events::Event;
use regdesk_inscriptions::{Inscription, InscriptionStatus, Participant};

use crate::pdf::PdfDocument;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InscriptionLine {
    pub responsible: String,
    pub status: InscriptionStatus,
    pub total_value: Money,
    pub total_paid: Money,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InscriptionsSummary {
    pub inscriptions: usize,
    pub participants: usize,
    pub pending: usize,
    pub under_review: usize,
    pub paid: usize,
    pub cancelled: usize,
    pub expired: usize,
    pub total_value: Money,
    pub total_paid: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventInscriptionsReport {
    pub event_name: String,
    pub generated_at: DateTime<Utc>,
    pub lines: Vec<InscriptionLine>,
    pub summary: InscriptionsSummary,
}

impl EventInscriptionsReport {
    pub fn build(event: &Event, rows: &[(Inscription, Vec<Participant>)], generated_at: DateTime<Utc>) -> Self {
        let mut summary = InscriptionsSummary::default();
        let mut lines = Vec::with_capacity(rows.len());

        for (inscription, participants) in rows {
            summary.inscriptions += 1;
            summary.participants += participants.len();
            match inscription.status() {
                InscriptionStatus::Pending => summary.pending += 1,
                InscriptionStatus::UnderReview => summary.under_review += 1,
                InscriptionStatus::Paid => summary.paid += 1,
                InscriptionStatus::Cancelled => summary.cancelled += 1,
                InscriptionStatus::Expired => summary.expired += 1,
            }
            // Closed inscriptions are listed but not counted as owed.
            if !inscription.status().is_closed() {
                summary.total_value += inscription.total_value();
            }
            summary.total_paid += inscription.total_paid();

            lines.push(InscriptionLine {
                responsible: inscription.responsible().to_string(),
                status: inscription.status(),
                total_value: inscription.total_value(),
                total_paid: inscription.total_paid(),
                participants: participants.iter().map(|p| p.name().to_string()).collect(),
            });
        }

        Self {
            event_name: event.name().to_string(),
            generated_at,
            lines,
            summary,
        }
    }

    pub fn to_pdf(&self) -> Vec<u8> {
        let mut doc = PdfDocument::new(format!("Inscrições - {}", self.event_name));
        doc.line(format!("Gerado em {}", self.generated_at.format("%d/%m/%Y %H:%M UTC")));
        doc.blank();

        for (index, line) in self.lines.iter().enumerate() {
            doc.line(format!(
                "{}. {} [{}] total {} pago {}",
                index + 1,
                line.responsible,
                status_label(line.status),
                line.total_value,
                line.total_paid
            ));
            for name in &line.participants {
                doc.line(format!("    - {name}"));
            }
        }

        let s = &self.summary;
        doc.blank().heading("Resumo");
        doc.line(format!("Inscrições: {}  Participantes: {}", s.inscriptions, s.participants));
        doc.line(format!(
            "Pendentes: {}  Em análise: {}  Pagas: {}  Canceladas: {}  Expiradas: {}",
            s.pending, s.under_review, s.paid, s.cancelled, s.expired
        ));
        doc.line(format!("Valor total: {}  Valor pago: {}", s.total_value, s.total_paid));
        doc.render()
    }
}

fn status_label(status: InscriptionStatus) -> &'static str {
    match status {
        InscriptionStatus::Pending => "pendente",
        InscriptionStatus::UnderReview => "em análise",
        InscriptionStatus::Paid => "paga",
        InscriptionStatus::Cancelled => "cancelada",
        InscriptionStatus::Expired => "expirada",
    }
}
