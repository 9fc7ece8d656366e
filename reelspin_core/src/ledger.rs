/// Player balance the orchestrator debits bets from and credits wins to.
pub trait Ledger: Send {
    /// Withdraw `amount`; returns false and changes nothing when funds are short.
    fn debit(&mut self, amount: u64) -> bool;

    fn credit(&mut self, amount: u64);

    fn balance(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryLedger {
    balance: u64,
}

impl InMemoryLedger {
    pub fn new(balance: u64) -> Self {
        Self { balance }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Ledger for InMemoryLedger {
    fn debit(&mut self, amount: u64) -> bool {
        match self.balance.checked_sub(amount) {
            Some(rest) => {
                self.balance = rest;
                true
            }
            None => false,
        }
    }

    fn credit(&mut self, amount: u64) {
        self.balance = self.balance.saturating_add(amount);
    }

    fn balance(&self) -> u64 {
        self.balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_refuses_overdraft() {
        let mut ledger = InMemoryLedger::new(15);
        assert!(ledger.debit(10));
        assert!(!ledger.debit(10));
        assert_eq!(ledger.balance(), 5);
        ledger.credit(100);
        assert_eq!(ledger.balance(), 105);
    }
}
