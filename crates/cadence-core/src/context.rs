//! Per-execution context handed to factories when a cursor is bound.

use crate::circuit_breaker::CircuitBreaker;
use crate::config::EngineConfig;

#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    circuit_breaker: CircuitBreaker,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose breaker follows the configured timeout and throttle.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            circuit_breaker: cfg.circuit_breaker(),
        }
    }

    pub fn with_circuit_breaker(circuit_breaker: CircuitBreaker) -> Self {
        Self { circuit_breaker }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }
}
