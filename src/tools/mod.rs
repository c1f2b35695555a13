//! The tools the model can call.
//!
//! - `get_time`: current time in an IANA zone or the local zone
//! - `calc`: binary arithmetic on two numbers
//! - `explain_element`: AWS Console element explanation via a second model call

pub mod calculator;
pub mod clock;
pub mod element;

pub use calculator::{CalcArgs, CalcOp, CalcOutcome, Calculator, Operand};
pub use clock::{Clock, TimeArgs};
pub use element::{ElementDescriptor, ElementExplainer, ElementRequest};
