//! Operations for model-based and fuzz testing.
//!
//! Operations represent every input a connection manager can receive. They
//! are generated by proptest or `cargo fuzz` and applied through
//! [`crate::SimDriver::apply`].

mod operation;

pub use operation::{CloseCode, FrameKind, Operation, SmallText};
