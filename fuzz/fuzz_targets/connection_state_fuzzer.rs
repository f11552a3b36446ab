//! Fuzz target for the connection state machine
//!
//! # Strategy
//!
//! - Arbitrary interleavings of caller operations (connect, disconnect,
//!   credential rotation, sends) with transport events (open, close with any
//!   code, unusable endpoint, inbound frames) and timer firings
//! - Stale links: events addressed to a link the manager already dropped
//! - Tight budgets: zero or one reconnect attempts, pong limits of 1
//!
//! # Invariants
//!
//! - At most one live link, never together with a pending reconnect
//! - Heartbeat armed exactly while connected
//! - Terminal states hold no socket and no timer
//! - Nothing is transmitted outside `Connected`

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_core::{ConnectionConfig, ReconnectPolicy};
use parley_harness::{InvariantRegistry, Operation, SimDriver};

#[derive(Debug, Arbitrary)]
struct Input {
    max_attempts: u8,
    missed_pong_limit: Option<u8>,
    ops: Vec<Operation>,
}

fuzz_target!(|input: Input| {
    let config = ConnectionConfig {
        heartbeat_interval: Duration::from_secs(30),
        missed_pong_limit: input.missed_pong_limit.map(|n| u32::from(n % 4) + 1),
        reconnect: ReconnectPolicy {
            max_attempts: u32::from(input.max_attempts % 8),
            base_interval: Duration::from_millis(3000),
        },
    };

    let mut driver = SimDriver::new(config).with_invariants(InvariantRegistry::standard());

    for op in &input.ops {
        driver.apply(op);
    }

    assert_eq!(driver.orphan_sends(), 0, "frames written without an open link");
});
