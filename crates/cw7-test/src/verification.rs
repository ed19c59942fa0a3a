//! Verification helpers for recorded device calls
//!
//! Provides assertion helpers over the call log of a [`MockDevice`](crate::MockDevice)

use thiserror::Error;

use crate::mock::Call;

/// Verification error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Expected call {expected} not found in {actual}")]
    CallNotFound { expected: String, actual: String },

    #[error("Call {call} was not expected but found at position {position}")]
    UnexpectedCall { call: String, position: usize },

    #[error("Expected {expected} calls of '{op}', found {actual}")]
    CountMismatch {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("Lock imbalance at position {position}: {reason}")]
    LockImbalance { position: usize, reason: String },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Call log verifier
pub struct CallVerifier {
    calls: Vec<Call>,
}

impl CallVerifier {
    pub fn new(calls: Vec<Call>) -> Self {
        Self { calls }
    }

    /// Verify that `expected` appears as a subsequence of the log
    pub fn assert_call_order(&self, expected: &[Call]) -> VerifyResult<()> {
        let mut remaining = self.calls.iter();
        for call in expected {
            if !remaining.any(|c| c == call) {
                return Err(VerificationError::CallNotFound {
                    expected: format!("{:?}", call),
                    actual: format!("{:?}", self.calls),
                });
            }
        }
        Ok(())
    }

    /// Verify that every lock is released before the next one and before the log ends
    pub fn assert_locks_balanced(&self) -> VerifyResult<()> {
        let mut held = None;
        for (position, call) in self.calls.iter().enumerate() {
            match call {
                Call::Lock(target) if held.is_some() => {
                    return Err(VerificationError::LockImbalance {
                        position,
                        reason: format!("{} locked while a lock is held", target),
                    })
                }
                Call::Lock(target) => held = Some(*target),
                Call::Unlock(target) if held != Some(*target) => {
                    return Err(VerificationError::LockImbalance {
                        position,
                        reason: format!("{} unlocked without a lock", target),
                    })
                }
                Call::Unlock(_) => held = None,
                Call::Close => held = None,
                _ if held.is_none() => {
                    return Err(VerificationError::LockImbalance {
                        position,
                        reason: format!("{} sent without a lock", call.op()),
                    })
                }
                _ => {}
            }
        }
        match held {
            Some(target) => Err(VerificationError::LockImbalance {
                position: self.calls.len(),
                reason: format!("{} still locked at the end", target),
            }),
            None => Ok(()),
        }
    }

    /// Verify that no call of `op` was made
    pub fn assert_not_called(&self, op: &str) -> VerifyResult<()> {
        match self.calls.iter().position(|c| c.op() == op) {
            Some(position) => Err(VerificationError::UnexpectedCall {
                call: format!("{:?}", self.calls[position]),
                position,
            }),
            None => Ok(()),
        }
    }

    /// Verify the number of calls of `op`
    pub fn assert_count(&self, op: &str, expected: usize) -> VerifyResult<()> {
        let actual = self.count(op);
        if actual != expected {
            return Err(VerificationError::CountMismatch {
                op: op.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.iter().filter(|c| c.op() == op).count()
    }

    /// Calls other than lock and unlock, in order
    pub fn operations(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| !matches!(c, Call::Lock(_) | Call::Unlock(_)))
            .collect()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }
}

/// Panics unless `expected` appears in order within `calls`
pub fn assert_call_order(calls: &[Call], expected: &[Call]) {
    if let Err(err) = CallVerifier::new(calls.to_vec()).assert_call_order(expected) {
        panic!("{}", err);
    }
}

/// Panics unless every operation in `calls` ran under its own lock
pub fn assert_locks_balanced(calls: &[Call]) {
    if let Err(err) = CallVerifier::new(calls.to_vec()).assert_locks_balanced() {
        panic!("{}", err);
    }
}
