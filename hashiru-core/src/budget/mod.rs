//! Two-dimensional budget controller: a resource budget (sized from detected RAM/VRAM at
//! startup) and an expense budget (a fixed ceiling), each independently enable-able.
//!
//! Resource sizing formula and can-spend/reserve/refund semantics are grounded on the
//! source system's `BudgetManager` (`round((ram_gb + vram_gb) / 16 * 100)`); VRAM detection
//! has no portable Rust equivalent without vendor SDKs, so it's treated as 0 unless
//! overridden (see `DESIGN.md`).

use std::sync::Mutex;

use sysinfo::System;

use crate::error::{BudgetDimension, HashiruError};

#[derive(Debug)]
struct BudgetState {
    total_resource_budget: f64,
    current_resource_usage: f64,
    total_expense_budget: f64,
    current_expense: f64,
    resource_enabled: bool,
    expense_enabled: bool,
}

/// Tracks and gates spend against a resource budget and an expense budget.
///
/// All mutation goes through a single mutex: reserve-then-commit races are not possible
/// since `reserve` both checks and debits while holding the lock.
pub struct BudgetController {
    state: Mutex<BudgetState>,
}

impl BudgetController {
    /// Builds a controller with the resource budget sized from the host's detected RAM
    /// (plus `vram_gb_override`, since VRAM isn't portably detectable) and the given
    /// expense ceiling.
    pub fn new(total_expense_budget: f64, vram_gb_override: f64) -> Self {
        let total_resource_budget = Self::detect_resource_budget(vram_gb_override);
        Self {
            state: Mutex::new(BudgetState {
                total_resource_budget,
                current_resource_usage: 0.0,
                total_expense_budget,
                current_expense: 0.0,
                resource_enabled: true,
                expense_enabled: true,
            }),
        }
    }

    /// `round((ram_gb + vram_gb) / 16 * 100)`, the source system's sizing formula.
    fn detect_resource_budget(vram_gb: f64) -> f64 {
        let mut sys = System::new();
        sys.refresh_memory();
        let ram_gb = sys.total_memory() as f64 / 1024f64.powi(3);
        ((ram_gb + vram_gb) / 16.0 * 100.0).round()
    }

    pub fn set_resource_enabled(&self, enabled: bool) {
        self.state.lock().unwrap().resource_enabled = enabled;
    }

    pub fn set_expense_enabled(&self, enabled: bool) {
        self.state.lock().unwrap().expense_enabled = enabled;
    }

    pub fn remaining_resource(&self) -> f64 {
        let s = self.state.lock().unwrap();
        s.total_resource_budget - s.current_resource_usage
    }

    pub fn remaining_expense(&self) -> f64 {
        let s = self.state.lock().unwrap();
        s.total_expense_budget - s.current_expense
    }

    pub fn can_spend_resource(&self, cost: f64) -> bool {
        let s = self.state.lock().unwrap();
        !s.resource_enabled || s.current_resource_usage + cost <= s.total_resource_budget
    }

    pub fn can_spend_expense(&self, cost: f64) -> bool {
        let s = self.state.lock().unwrap();
        !s.expense_enabled || s.current_expense + cost <= s.total_expense_budget
    }

    /// Checks and debits the resource budget atomically; `Err` leaves the budget unchanged.
    pub fn reserve_resource(&self, cost: f64) -> Result<(), HashiruError> {
        let mut s = self.state.lock().unwrap();
        if s.resource_enabled && s.current_resource_usage + cost > s.total_resource_budget {
            return Err(HashiruError::BudgetExceeded {
                dimension: BudgetDimension::Resource,
                requested: cost,
                remaining: s.total_resource_budget - s.current_resource_usage,
            });
        }
        s.current_resource_usage += cost;
        Ok(())
    }

    /// Checks and debits the expense budget atomically; `Err` leaves the budget unchanged.
    pub fn reserve_expense(&self, cost: f64) -> Result<(), HashiruError> {
        let mut s = self.state.lock().unwrap();
        if s.expense_enabled && s.current_expense + cost > s.total_expense_budget {
            return Err(HashiruError::BudgetExceeded {
                dimension: BudgetDimension::Expense,
                requested: cost,
                remaining: s.total_expense_budget - s.current_expense,
            });
        }
        s.current_expense += cost;
        Ok(())
    }

    /// Returns resource budget to the pool, e.g. when a created agent/tool is later deleted.
    pub fn refund_resource(&self, cost: f64) {
        let mut s = self.state.lock().unwrap();
        s.current_resource_usage = (s.current_resource_usage - cost).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> BudgetController {
        let mut c = BudgetController::new(10.0, 0.0);
        c.state.get_mut().unwrap().total_resource_budget = 100.0;
        c
    }

    #[test]
    fn reserve_within_budget_succeeds_and_debits() {
        let c = controller();
        c.reserve_resource(40.0).unwrap();
        assert_eq!(c.remaining_resource(), 60.0);
    }

    #[test]
    fn reserve_over_budget_fails_and_leaves_state_unchanged() {
        let c = controller();
        c.reserve_resource(40.0).unwrap();
        let err = c.reserve_resource(70.0).unwrap_err();
        assert!(matches!(err, HashiruError::BudgetExceeded { dimension: BudgetDimension::Resource, .. }));
        assert_eq!(c.remaining_resource(), 60.0);
    }

    #[test]
    fn disabled_dimension_always_allows_spend() {
        let c = controller();
        c.set_resource_enabled(false);
        c.reserve_resource(1000.0).unwrap();
    }

    #[test]
    fn expense_budget_gates_independently_of_resource_budget() {
        let c = controller();
        c.reserve_resource(1000.0).unwrap_err();
        c.reserve_expense(5.0).unwrap();
        assert_eq!(c.remaining_expense(), 5.0);
        c.reserve_expense(10.0).unwrap_err();
    }

    #[test]
    fn refund_resource_returns_budget_and_floors_at_zero() {
        let c = controller();
        c.reserve_resource(40.0).unwrap();
        c.refund_resource(100.0);
        assert_eq!(c.remaining_resource(), 100.0);
    }
}
