//! Typed relay events.
//!
//! Clients emit `eventFromClient` and receive `eventFromServer`. Values are
//! carried as CBOR; the server never looks inside.

use relay_proto::{EVENT_FROM_CLIENT, EVENT_FROM_SERVER, Frame, Payload};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::ClientError;

/// Build the frame a client sends to emit `value`.
pub fn client_event<T: Serialize + ?Sized>(value: &T) -> Result<Frame, ClientError> {
    let payload = Payload::from_value(value)?;
    Ok(Frame::new(EVENT_FROM_CLIENT, payload)?)
}

/// Decode the value carried by a relayed frame.
///
/// Fails with [`ClientError::UnexpectedEvent`] for anything but
/// `eventFromServer`.
pub fn server_event<T: DeserializeOwned>(frame: &Frame) -> Result<T, ClientError> {
    if frame.name() != EVENT_FROM_SERVER {
        return Err(ClientError::UnexpectedEvent(frame.name().to_string()));
    }

    Ok(Payload::from(frame.payload().clone()).to_value()?)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Cursor {
        x: i32,
        y: i32,
    }

    fn relayed(frame: &Frame) -> Frame {
        frame.renamed(EVENT_FROM_SERVER).unwrap()
    }

    #[test]
    fn client_event_uses_client_name() {
        let frame = client_event("hello").unwrap();
        assert_eq!(frame.name(), EVENT_FROM_CLIENT);
    }

    #[test]
    fn relayed_value_decodes_unchanged() {
        let sent = Cursor { x: 3, y: -4 };
        let frame = client_event(&sent).unwrap();

        let received: Cursor = server_event(&relayed(&frame)).unwrap();
        assert_eq!(received, sent);
    }

    #[test]
    fn client_frame_is_not_a_server_event() {
        let frame = client_event("hello").unwrap();

        let result = server_event::<String>(&frame);
        assert!(matches!(result, Err(ClientError::UnexpectedEvent(name)) if name == EVENT_FROM_CLIENT));
    }

    #[test]
    fn garbage_payload_fails_to_decode() {
        let frame = Frame::new(EVENT_FROM_SERVER, vec![0xff, 0xff]).unwrap();

        let result = server_event::<Cursor>(&frame);
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }

    proptest! {
        #[test]
        fn arbitrary_strings_survive_relay(s in ".*") {
            let frame = client_event(&s).unwrap();
            let received: String = server_event(&relayed(&frame)).unwrap();
            prop_assert_eq!(received, s);
        }
    }
}
