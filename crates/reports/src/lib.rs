//! PDF reports.
//!
//! Each report is built in two steps: `build` computes a plain summary from
//! domain objects (easy to assert on), `to_pdf` lays it out with [`PdfDocument`].

pub mod cash_statement;
pub mod event_financial;
pub mod event_inscriptions;
pub mod pdf;

pub use cash_statement::{CashStatementReport, StatementLine};
pub use event_financial::{EventFinancialReport, FinancialSummary, MethodTotal};
pub use event_inscriptions::{EventInscriptionsReport, InscriptionLine, InscriptionsSummary};
pub use pdf::PdfDocument;
