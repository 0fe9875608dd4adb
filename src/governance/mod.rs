//! Governance modes and action gates
//!
//! - **mode**: STANDBY / DEMO / LIVE and the transition allow-list
//! - **gate**: pure `check_gate(mode, role, action)` predicates
//! - **store**: `ModeStore` trait and in-memory implementation
//! - **controller**: fail-closed mode resolution and compare-and-swap
//!   transitions

pub mod controller;
pub mod gate;
pub mod mode;
pub mod store;

pub use controller::GovernanceController;
pub use gate::{check_gate, evaluate_gate, GateAction, GateDecision, Role};
pub use mode::{transition, GovernanceMode, ModeCapabilities, ALLOWED_TRANSITIONS};
pub use store::{MemoryModeStore, ModeStore};
