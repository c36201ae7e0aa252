//! Cash registers and their movements.
//!
//! Balances are only changed through [`CashRegister::apply`], which keeps the
//! register and its movement history consistent.

pub mod movement;
pub mod register;

pub use movement::{CashMovement, CashMovementId, CashMovementRecord, MovementKind, MovementOrigin, NewCashMovement};
pub use register::{CashRegister, CashRegisterId, CashRegisterRecord, CashRegisterStatus};
