//! Document lifecycle events, trigger binding and unit-of-work mechanics.
//!
//! Nothing in this crate performs IO. Hosts report what happened to a
//! document through [`DocumentEvent`]s inside an active [`UnitOfWork`];
//! [`Trigger`] implementations decide what to buffer, and listeners bound to
//! the unit of work act on the buffered state once it commits or rolls back.

pub mod event;
pub mod trigger;
pub mod unit_of_work;

pub use event::{DocumentEvent, Event};
pub use trigger::{Trigger, route};
pub use unit_of_work::{TransactionListener, UnitOfWork, UnitOfWorkError, UnitOfWorkState};
