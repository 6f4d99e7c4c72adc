//! Swap form state.

pub mod form;

pub use form::{FormSnapshot, FormStateError, FormStatus, PriceApplied, SwapForm};
