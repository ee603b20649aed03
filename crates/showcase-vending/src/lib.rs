//! A vending machine model exercising the recorrer engine end to end.
//!
//! The machine sells one product for [`PRICE`] coins. The model exposes
//! four guarded steps: insert a coin, vend, refund the current credit, and
//! restock an empty machine. Generated runs hammer the machine with random
//! but always-legal operation sequences and the machine checks its own
//! bookkeeping after every mutation.

#![warn(missing_docs)]

use recorrer::{check, EngineError, Fault, ModelBuilder, ModelObject, StepDef};
use std::cell::RefCell;
use std::rc::Rc;

/// Coins one item costs
pub const PRICE: u32 = 3;

/// Items loaded per restock
pub const RESTOCK_AMOUNT: u32 = 5;

/// The system under test: a coin-operated vending machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendingMachine {
    credit: u32,
    stock: u32,
    coins_inserted: u32,
    coins_refunded: u32,
    items_dispensed: u32,
}

impl VendingMachine {
    /// A machine loaded with `stock` items and no credit
    #[must_use]
    pub const fn new(stock: u32) -> Self {
        Self {
            credit: 0,
            stock,
            coins_inserted: 0,
            coins_refunded: 0,
            items_dispensed: 0,
        }
    }

    /// Current unspent credit
    #[must_use]
    pub const fn credit(&self) -> u32 {
        self.credit
    }

    /// Items remaining
    #[must_use]
    pub const fn stock(&self) -> u32 {
        self.stock
    }

    /// Items dispensed over the machine's lifetime
    #[must_use]
    pub const fn items_dispensed(&self) -> u32 {
        self.items_dispensed
    }

    /// Accept one coin
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the bookkeeping no longer balances.
    pub fn insert_coin(&mut self) -> Result<(), Fault> {
        self.credit += 1;
        self.coins_inserted += 1;
        self.verify_books()
    }

    /// Dispense one item; requires enough credit and stock
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] on insufficient credit or stock, or when the
    /// bookkeeping no longer balances.
    pub fn vend(&mut self) -> Result<(), Fault> {
        check!(self.credit >= PRICE, "vend with credit {}", self.credit);
        check!(self.stock > 0, "vend from empty stock");
        self.credit -= PRICE;
        self.stock -= 1;
        self.items_dispensed += 1;
        self.verify_books()
    }

    /// Return the whole current credit
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the bookkeeping no longer balances.
    pub fn refund(&mut self) -> Result<(), Fault> {
        self.coins_refunded += self.credit;
        self.credit = 0;
        self.verify_books()
    }

    /// Reload an empty machine
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when called with stock remaining, or when the
    /// bookkeeping no longer balances.
    pub fn restock(&mut self) -> Result<(), Fault> {
        check!(self.stock == 0, "restock with {} items left", self.stock);
        self.stock = RESTOCK_AMOUNT;
        self.verify_books()
    }

    /// Every coin is either spent, refunded, or held as credit.
    fn verify_books(&self) -> Result<(), Fault> {
        check!(
            self.coins_inserted == self.items_dispensed * PRICE + self.coins_refunded + self.credit,
            "coin books out of balance: {self:?}"
        );
        Ok(())
    }
}

/// Build the vending model over a shared machine.
///
/// # Errors
///
/// Returns [`EngineError::ModelStructure`] if the registrations are
/// inconsistent; with this fixed catalogue that indicates a bug here.
pub fn vending_model(machine: &Rc<RefCell<VendingMachine>>) -> Result<ModelObject, EngineError> {
    let insert = Rc::clone(machine);
    let vend = Rc::clone(machine);
    let vend_guard = Rc::clone(machine);
    let refund = Rc::clone(machine);
    let refund_guard = Rc::clone(machine);
    let restock = Rc::clone(machine);
    let restock_guard = Rc::clone(machine);

    ModelBuilder::new("vending")
        .step(
            StepDef::new("insert_coin", move || insert.borrow_mut().insert_coin()).weight(4.0),
        )
        .step(
            StepDef::new("vend", move || vend.borrow_mut().vend())
                .guard(move || {
                    let m = vend_guard.borrow();
                    m.credit() >= PRICE && m.stock() > 0
                })
                .weight(2.0),
        )
        .step(
            StepDef::new("refund", move || refund.borrow_mut().refund())
                .guard(move || refund_guard.borrow().credit() > 0),
        )
        .step(
            StepDef::new("restock", move || restock.borrow_mut().restock())
                .guard(move || restock_guard.borrow().stock() == 0),
        )
        .build()
}
