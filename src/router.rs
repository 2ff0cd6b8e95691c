//! Inbound frame router.
//!
//! For each frame off the transport stream:
//! 1. RESPONSE frames go to the correlator; unmatched ones become
//!    [`Event::Response`] so server-originated status notifications are
//!    not lost.
//! 2. Command frames are offered to the correlator as data replies.
//! 3. Anything left decodes to a domain event on the public stream.
//!
//! The router also owns the text-layer parsing: NUL-separated bodies,
//! `"dashId-deviceId"` target tuples, and the `vw`/`dw`/`aw` hardware
//! micro-protocol.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::compress;
use crate::correlator::Correlator;
use crate::event::{Event, Hooks};
use crate::protocol::{split_body, Command, Frame};

pub(crate) struct Router {
    correlator: Arc<Correlator>,
    events: broadcast::Sender<Event>,
    hooks: Arc<Hooks>,
}

impl Router {
    pub(crate) fn new(
        correlator: Arc<Correlator>,
        events: broadcast::Sender<Event>,
        hooks: Arc<Hooks>,
    ) -> Self {
        Self {
            correlator,
            events,
            hooks,
        }
    }

    /// Match one inbound frame to a pending request or a domain event.
    pub(crate) fn route(&self, frame: Frame) {
        match frame {
            Frame::Response { message_id, code } => {
                if !self.correlator.resolve_response(message_id, code) {
                    self.emit(Event::Response { message_id, code });
                }
            }
            frame @ Frame::Command { .. } => {
                if let Some(frame) = self.correlator.resolve_data(frame) {
                    if let Some(event) = decode_event(&frame) {
                        self.emit(event);
                    }
                }
            }
        }
    }

    pub(crate) fn emit(&self, event: Event) {
        // A send error only means no subscriber is listening right now.
        let _ = self.events.send(event.clone());
        self.hooks.dispatch(&event);
    }
}

/// Decode an unsolicited command frame into a domain event.
///
/// Frames that carry no meaningful notification return `None`.
pub(crate) fn decode_event(frame: &Frame) -> Option<Event> {
    let (command, payload) = match frame {
        Frame::Command {
            command, payload, ..
        } => (*command, payload),
        Frame::Response { .. } => return None,
    };

    match command {
        Command::Hardware
        | Command::HardwareResendFromBluetooth
        | Command::AppSync
        | Command::HardwareSync => {
            let fields = split_body(payload);
            let (target, rest) = fields.split_first()?;
            let (dash_id, device_id) = parse_target(target)?;
            Some(parse_hardware_body(dash_id, device_id, rest))
        }
        Command::SetWidgetProperty => {
            let fields = split_body(payload);
            if fields.len() < 4 {
                tracing::debug!(?fields, "malformed SET_WIDGET_PROPERTY body");
                return None;
            }
            let (dash_id, device_id) = parse_target(&fields[0])?;
            Some(Event::WidgetPropertyChanged {
                dash_id,
                device_id,
                pin: fields[1].clone(),
                property: fields[2].clone(),
                value: fields[3].clone(),
            })
        }
        Command::HardwareConnected => {
            let fields = split_body(payload);
            let (dash_id, device_id) = parse_target(fields.first()?)?;
            Some(Event::HardwareConnected { dash_id, device_id })
        }
        Command::DeviceOffline => {
            let fields = split_body(payload);
            let (dash_id, device_id) = parse_target(fields.first()?)?;
            Some(Event::HardwareDisconnected { dash_id, device_id })
        }
        Command::LoadProfileGzipped => match compress::decompress(payload) {
            Ok(json) => Some(Event::Profile {
                json: String::from_utf8_lossy(&json).into_owned(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "unsolicited profile payload failed to decompress");
                None
            }
        },
        Command::Internal => Some(Event::Internal {
            fields: split_body(payload),
        }),
        Command::OutdatedAppNotification => Some(Event::OutdatedApp {
            message: String::from_utf8_lossy(payload).into_owned(),
        }),
        Command::Ping => None,
        _ => Some(Event::Data {
            command,
            payload: payload.clone(),
        }),
    }
}

/// Parse a `"dashId-deviceId"` tuple; a bare `"dashId"` targets device 0.
fn parse_target(target: &str) -> Option<(i32, i32)> {
    match target.split_once('-') {
        Some((dash, device)) => Some((dash.parse().ok()?, device.parse().ok()?)),
        None => Some((target.parse().ok()?, 0)),
    }
}

/// Interpret the hardware micro-protocol after the target tuple.
fn parse_hardware_body(dash_id: i32, device_id: i32, fields: &[String]) -> Event {
    let fallback = || Event::HardwareMessage {
        dash_id,
        device_id,
        fields: fields.to_vec(),
    };

    let Some((op, args)) = fields.split_first() else {
        return fallback();
    };

    match op.as_str() {
        "vw" => {
            let Some((pin, values)) = args.split_first() else {
                return fallback();
            };
            let Ok(pin) = pin.parse() else {
                return fallback();
            };
            Event::VirtualPinUpdate {
                dash_id,
                device_id,
                pin,
                values: values.to_vec(),
            }
        }
        "dw" | "aw" => {
            let (Some(pin), Some(value)) = (args.first(), args.get(1)) else {
                return fallback();
            };
            let Ok(pin) = pin.parse() else {
                return fallback();
            };
            if op == "dw" {
                Event::DigitalPinUpdate {
                    dash_id,
                    device_id,
                    pin,
                    value: value.clone(),
                }
            } else {
                Event::AnalogPinUpdate {
                    dash_id,
                    device_id,
                    pin,
                    value: value.clone(),
                }
            }
        }
        _ => fallback(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::correlator::{Reply, RequestKind};
    use crate::protocol::ResponseCode;

    fn test_router() -> (Router, Arc<Correlator>, broadcast::Receiver<Event>) {
        let correlator = Arc::new(Correlator::new());
        let (events, rx) = broadcast::channel(64);
        let router = Router::new(correlator.clone(), events, Arc::new(Hooks::default()));
        (router, correlator, rx)
    }

    #[tokio::test]
    async fn test_matched_response_emits_no_event() {
        let (router, correlator, mut rx) = test_router();
        let (id, handle) = correlator
            .allocate(RequestKind::ResponseOnly, Duration::from_secs(10))
            .unwrap();

        router.route(Frame::response(id, ResponseCode::Ok));

        assert_eq!(handle.wait().await.unwrap(), Reply::Code(ResponseCode::Ok));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_unmatched_response_becomes_event() {
        let (router, _correlator, mut rx) = test_router();

        router.route(Frame::response(9, ResponseCode::ServerError));

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::Response {
                message_id: 9,
                code: ResponseCode::ServerError,
            }
        );
    }

    #[tokio::test]
    async fn test_data_reply_resolves_pending_not_event() {
        let (router, correlator, mut rx) = test_router();
        let (id, handle) = correlator
            .allocate(RequestKind::DataResponse, Duration::from_secs(10))
            .unwrap();

        let frame = Frame::command(Command::LoadProfileGzipped, id, Bytes::from_static(b"x"));
        router.route(frame.clone());

        assert_eq!(handle.wait().await.unwrap(), Reply::Data(frame));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_virtual_write_decoded() {
        let (router, _correlator, mut rx) = test_router();

        router.route(Frame::command(
            Command::Hardware,
            3,
            Bytes::from_static(b"1-0\0vw\x007\x00255"),
        ));

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::VirtualPinUpdate {
                dash_id: 1,
                device_id: 0,
                pin: 7,
                values: vec!["255".into()],
            }
        );
    }

    #[test]
    fn test_decode_digital_and_analog_writes() {
        let dw = Frame::command(Command::Hardware, 1, Bytes::from_static(b"2-1\0dw\x004\x001"));
        assert_eq!(
            decode_event(&dw),
            Some(Event::DigitalPinUpdate {
                dash_id: 2,
                device_id: 1,
                pin: 4,
                value: "1".into(),
            })
        );

        let aw = Frame::command(
            Command::Hardware,
            1,
            Bytes::from_static(b"2-1\0aw\x0014\x00768"),
        );
        assert_eq!(
            decode_event(&aw),
            Some(Event::AnalogPinUpdate {
                dash_id: 2,
                device_id: 1,
                pin: 14,
                value: "768".into(),
            })
        );
    }

    #[test]
    fn test_decode_multi_value_virtual_write() {
        let frame = Frame::command(
            Command::Hardware,
            1,
            Bytes::from_static(b"5-3\0vw\x002\x00100\x00200\x00300"),
        );
        assert_eq!(
            decode_event(&frame),
            Some(Event::VirtualPinUpdate {
                dash_id: 5,
                device_id: 3,
                pin: 2,
                values: vec!["100".into(), "200".into(), "300".into()],
            })
        );
    }

    #[test]
    fn test_bare_dash_id_targets_device_zero() {
        let frame = Frame::command(Command::Hardware, 1, Bytes::from_static(b"7\0vw\x001\x001"));
        assert_eq!(
            decode_event(&frame),
            Some(Event::VirtualPinUpdate {
                dash_id: 7,
                device_id: 0,
                pin: 1,
                values: vec!["1".into()],
            })
        );
    }

    #[test]
    fn test_non_write_hardware_becomes_message() {
        let frame = Frame::command(Command::Hardware, 1, Bytes::from_static(b"1-0\0vr\x005"));
        assert_eq!(
            decode_event(&frame),
            Some(Event::HardwareMessage {
                dash_id: 1,
                device_id: 0,
                fields: vec!["vr".into(), "5".into()],
            })
        );
    }

    #[test]
    fn test_unparsable_pin_falls_back_to_message() {
        let frame = Frame::command(
            Command::Hardware,
            1,
            Bytes::from_static(b"1-0\0vw\x00notapin\x001"),
        );
        assert!(matches!(
            decode_event(&frame),
            Some(Event::HardwareMessage { .. })
        ));
    }

    #[test]
    fn test_widget_property_decoded() {
        let frame = Frame::command(
            Command::SetWidgetProperty,
            1,
            Bytes::from_static(b"1-0\0V4\0label\0Temperature"),
        );
        assert_eq!(
            decode_event(&frame),
            Some(Event::WidgetPropertyChanged {
                dash_id: 1,
                device_id: 0,
                pin: "V4".into(),
                property: "label".into(),
                value: "Temperature".into(),
            })
        );
    }

    #[test]
    fn test_malformed_widget_property_dropped() {
        let frame = Frame::command(
            Command::SetWidgetProperty,
            1,
            Bytes::from_static(b"1-0\0V4"),
        );
        assert_eq!(decode_event(&frame), None);
    }

    #[test]
    fn test_connect_and_offline_events() {
        let up = Frame::command(Command::HardwareConnected, 1, Bytes::from_static(b"3-2"));
        assert_eq!(
            decode_event(&up),
            Some(Event::HardwareConnected {
                dash_id: 3,
                device_id: 2,
            })
        );

        let down = Frame::command(Command::DeviceOffline, 1, Bytes::from_static(b"3-2"));
        assert_eq!(
            decode_event(&down),
            Some(Event::HardwareDisconnected {
                dash_id: 3,
                device_id: 2,
            })
        );
    }

    #[test]
    fn test_app_sync_parses_like_hardware() {
        let frame = Frame::command(
            Command::AppSync,
            1,
            Bytes::from_static(b"1-0\0vw\x009\x0042"),
        );
        assert_eq!(
            decode_event(&frame),
            Some(Event::VirtualPinUpdate {
                dash_id: 1,
                device_id: 0,
                pin: 9,
                values: vec!["42".into()],
            })
        );
    }

    #[test]
    fn test_internal_and_outdated_app() {
        let internal = Frame::command(
            Command::Internal,
            1,
            Bytes::from_static(b"rtc\x001633024800"),
        );
        assert_eq!(
            decode_event(&internal),
            Some(Event::Internal {
                fields: vec!["rtc".into(), "1633024800".into()],
            })
        );

        let outdated = Frame::command(
            Command::OutdatedAppNotification,
            1,
            Bytes::from_static(b"please update"),
        );
        assert_eq!(
            decode_event(&outdated),
            Some(Event::OutdatedApp {
                message: "please update".into(),
            })
        );
    }

    #[test]
    fn test_other_commands_become_data_events() {
        let frame = Frame::command(Command::GetDevices, 1, Bytes::from_static(b"[]"));
        assert_eq!(
            decode_event(&frame),
            Some(Event::Data {
                command: Command::GetDevices,
                payload: Bytes::from_static(b"[]"),
            })
        );
    }

    #[test]
    fn test_parse_target_rejects_garbage() {
        assert_eq!(parse_target("1-2"), Some((1, 2)));
        assert_eq!(parse_target("9"), Some((9, 0)));
        assert_eq!(parse_target("x-2"), None);
        assert_eq!(parse_target("1-y"), None);
        assert_eq!(parse_target(""), None);
    }
}
