//! Ticket sales for events that sell admission without an inscription.

pub mod sale;

pub use sale::{NewTicketSale, TicketSale, TicketSaleId, TicketSaleRecord, TicketSaleStatus};
