//! Fuzz target for RelayDriver event sequences
//!
//! Replays arbitrary connect / disconnect / frame sequences and checks the
//! driver against a set model after every step.
//!
//! # Invariants
//!
//! - The registry always equals the model set
//! - A duplicate connect is rejected and changes nothing
//! - Disconnecting an unknown session is a silent no-op
//! - An armed event from an active session broadcasts to exactly the model
//!   set (minus the sender when echo is off), payload untouched
//! - Any other event name never broadcasts
//! - Frames from unknown sessions are rejected

#![no_main]

use std::collections::BTreeSet;

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use relay_proto::{EVENT_FROM_CLIENT, EVENT_FROM_SERVER, Frame};
use relay_server::{DriverConfig, DriverError, RelayAction, RelayDriver, RelayEvent};

#[derive(Debug, Arbitrary)]
struct Scenario {
    echo_to_sender: bool,
    ops: Vec<Op>,
}

#[derive(Debug, Arbitrary)]
enum Op {
    Connect(u8),
    Disconnect(u8),
    Send { session: u8, armed: bool, payload: Vec<u8> },
}

fn broadcast(actions: &[RelayAction]) -> Option<(&[u64], &Frame)> {
    actions.iter().find_map(|a| match a {
        RelayAction::Broadcast { recipients, frame } => Some((recipients.as_slice(), frame)),
        RelayAction::Log { .. } => None,
    })
}

fuzz_target!(|scenario: Scenario| {
    let config = DriverConfig { echo_to_sender: scenario.echo_to_sender };
    let mut driver = RelayDriver::new(config);
    let mut model = BTreeSet::new();

    for op in scenario.ops {
        match op {
            Op::Connect(id) => {
                let id = u64::from(id);
                let result = driver.process_event(RelayEvent::ConnectionAccepted { session_id: id });
                if model.insert(id) {
                    assert!(result.is_ok());
                } else {
                    assert_eq!(result, Err(DriverError::SessionAlreadyExists(id)));
                }
            },

            Op::Disconnect(id) => {
                let id = u64::from(id);
                let was_active = model.remove(&id);
                let actions = driver
                    .process_event(RelayEvent::ConnectionClosed {
                        session_id: id,
                        reason: "fuzz".to_string(),
                    })
                    .expect("disconnect never fails");
                if !was_active {
                    assert!(actions.is_empty());
                }
            },

            Op::Send { session, armed, payload } => {
                let id = u64::from(session);
                let name = if armed { EVENT_FROM_CLIENT } else { "unarmed" };
                let payload = Bytes::from(payload);
                let frame = Frame::new(name, payload.clone()).expect("small frame");

                let result = driver.process_event(RelayEvent::FrameReceived { session_id: id, frame });

                if !model.contains(&id) {
                    assert_eq!(result, Err(DriverError::SessionNotFound(id)));
                    continue;
                }

                let actions = result.expect("active session");
                match (armed, broadcast(&actions)) {
                    (true, Some((recipients, relayed))) => {
                        let expected: Vec<u64> = model
                            .iter()
                            .copied()
                            .filter(|r| scenario.echo_to_sender || *r != id)
                            .collect();
                        assert_eq!(recipients, expected.as_slice());
                        assert_eq!(relayed.name(), EVENT_FROM_SERVER);
                        assert_eq!(relayed.payload(), &payload);
                    },
                    (false, None) => {},
                    (armed, got) => panic!("armed={armed} broadcast={got:?}"),
                }
            },
        }

        assert!(driver.sessions().eq(model.iter().copied()));
    }
});
