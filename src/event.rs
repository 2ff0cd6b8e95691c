//! Domain events and callback hooks.
//!
//! Events are broadcast to every subscriber; the optional [`Hooks`] set
//! is invoked after the broadcast yield, on the router task.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{BlynkError, Result};
use crate::protocol::{Command, ResponseCode};

/// Connection lifecycle state, reported through
/// [`Event::ConnectionState`] and [`Hooks::on_connection_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Up,
    Reconnecting,
}

/// A domain event produced by the inbound router or the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `vw` hardware write.
    VirtualPinUpdate {
        dash_id: i32,
        device_id: i32,
        pin: u16,
        values: Vec<String>,
    },
    /// `dw` hardware write.
    DigitalPinUpdate {
        dash_id: i32,
        device_id: i32,
        pin: u16,
        value: String,
    },
    /// `aw` hardware write.
    AnalogPinUpdate {
        dash_id: i32,
        device_id: i32,
        pin: u16,
        value: String,
    },
    /// SET_WIDGET_PROPERTY pushed by the server.
    WidgetPropertyChanged {
        dash_id: i32,
        device_id: i32,
        pin: String,
        property: String,
        value: String,
    },
    /// A board attached to its dashboard.
    HardwareConnected { dash_id: i32, device_id: i32 },
    /// A board went offline.
    HardwareDisconnected { dash_id: i32, device_id: i32 },
    /// Hardware-channel message that is not a pin write
    /// (`vr`, bridge traffic, custom commands).
    HardwareMessage {
        dash_id: i32,
        device_id: i32,
        fields: Vec<String>,
    },
    /// Decompressed user profile JSON.
    Profile { json: String },
    /// Reply payload of a data-returning request without a dedicated
    /// event shape, and unsolicited data-carrying frames.
    Data { command: Command, payload: Bytes },
    /// A RESPONSE that matched no pending request, or the OK result of
    /// a status-reply request.
    Response { message_id: u16, code: ResponseCode },
    /// BLYNK_INTERNAL notification fields.
    Internal { fields: Vec<String> },
    /// Server advises the app version is too old.
    OutdatedApp { message: String },
    /// REGISTER completed.
    Registered,
    /// Controller lifecycle transition.
    ConnectionState(ConnectionState),
    /// Reconnect attempt `attempt` is starting.
    Reconnecting { attempt: u32 },
    /// Session re-established and re-authenticated after an outage.
    Reconnected,
    /// Session ended; no further frames will be emitted.
    Disconnected,
}

impl Event {
    /// Deserialize the JSON payload of a [`Event::Profile`] or
    /// [`Event::Data`] reply into a typed record.
    pub fn decode_record<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes: &[u8] = match self {
            Event::Profile { json } => json.as_bytes(),
            Event::Data { payload, .. } => payload,
            other => {
                return Err(BlynkError::Decode(format!(
                    "no record payload in {other:?}"
                )))
            }
        };
        serde_json::from_slice(bytes).map_err(|e| BlynkError::Decode(e.to_string()))
    }
}

type PinHook = Box<dyn Fn(i32, i32, u16, &[String]) + Send + Sync>;
type TargetHook = Box<dyn Fn(i32, i32) + Send + Sync>;

/// Optional callback hooks, invoked on the router task after the event
/// is broadcast. Keep them cheap; slow hooks delay frame routing.
#[derive(Default)]
pub struct Hooks {
    pub(crate) on_virtual_pin: Option<PinHook>,
    pub(crate) on_digital_pin: Option<PinHook>,
    pub(crate) on_analog_pin: Option<PinHook>,
    pub(crate) on_widget_property: Option<Box<dyn Fn(i32, i32, &str, &str, &str) + Send + Sync>>,
    pub(crate) on_hardware_connected: Option<TargetHook>,
    pub(crate) on_hardware_disconnected: Option<TargetHook>,
    pub(crate) on_hardware_message: Option<Box<dyn Fn(i32, i32, &[String]) + Send + Sync>>,
    pub(crate) on_connection_state: Option<Box<dyn Fn(ConnectionState) + Send + Sync>>,
}

impl Hooks {
    /// Invoke the hook matching `event`, if any.
    pub(crate) fn dispatch(&self, event: &Event) {
        match event {
            Event::VirtualPinUpdate {
                dash_id,
                device_id,
                pin,
                values,
            } => {
                if let Some(hook) = &self.on_virtual_pin {
                    hook(*dash_id, *device_id, *pin, values);
                }
            }
            Event::DigitalPinUpdate {
                dash_id,
                device_id,
                pin,
                value,
            } => {
                if let Some(hook) = &self.on_digital_pin {
                    hook(*dash_id, *device_id, *pin, std::slice::from_ref(value));
                }
            }
            Event::AnalogPinUpdate {
                dash_id,
                device_id,
                pin,
                value,
            } => {
                if let Some(hook) = &self.on_analog_pin {
                    hook(*dash_id, *device_id, *pin, std::slice::from_ref(value));
                }
            }
            Event::WidgetPropertyChanged {
                dash_id,
                device_id,
                pin,
                property,
                value,
            } => {
                if let Some(hook) = &self.on_widget_property {
                    hook(*dash_id, *device_id, pin, property, value);
                }
            }
            Event::HardwareConnected { dash_id, device_id } => {
                if let Some(hook) = &self.on_hardware_connected {
                    hook(*dash_id, *device_id);
                }
            }
            Event::HardwareDisconnected { dash_id, device_id } => {
                if let Some(hook) = &self.on_hardware_disconnected {
                    hook(*dash_id, *device_id);
                }
            }
            Event::HardwareMessage {
                dash_id,
                device_id,
                fields,
            } => {
                if let Some(hook) = &self.on_hardware_message {
                    hook(*dash_id, *device_id, fields);
                }
            }
            Event::ConnectionState(state) => {
                if let Some(hook) = &self.on_connection_state {
                    hook(*state);
                }
            }
            _ => {}
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_virtual_pin", &self.on_virtual_pin.is_some())
            .field("on_digital_pin", &self.on_digital_pin.is_some())
            .field("on_analog_pin", &self.on_analog_pin.is_some())
            .field("on_widget_property", &self.on_widget_property.is_some())
            .field(
                "on_hardware_connected",
                &self.on_hardware_connected.is_some(),
            )
            .field(
                "on_hardware_disconnected",
                &self.on_hardware_disconnected.is_some(),
            )
            .field("on_hardware_message", &self.on_hardware_message.is_some())
            .field("on_connection_state", &self.on_connection_state.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_dispatch_virtual_pin_hook() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = hits.clone();
        let hooks = Hooks {
            on_virtual_pin: Some(Box::new(move |dash, device, pin, values| {
                assert_eq!((dash, device, pin), (1, 0, 7));
                assert_eq!(values, ["255"]);
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        };

        hooks.dispatch(&Event::VirtualPinUpdate {
            dash_id: 1,
            device_id: 0,
            pin: 7,
            values: vec!["255".into()],
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_without_hooks_is_noop() {
        let hooks = Hooks::default();
        hooks.dispatch(&Event::Disconnected);
        hooks.dispatch(&Event::HardwareConnected {
            dash_id: 1,
            device_id: 2,
        });
    }

    #[test]
    fn test_decode_record() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct Device {
            id: i32,
            name: String,
        }

        let event = Event::Data {
            command: Command::GetDevices,
            payload: Bytes::from_static(br#"[{"id":1,"name":"esp32"}]"#),
        };
        let devices: Vec<Device> = event.decode_record().unwrap();
        assert_eq!(
            devices,
            vec![Device {
                id: 1,
                name: "esp32".into(),
            }]
        );

        let err = Event::Disconnected.decode_record::<Vec<Device>>();
        assert!(matches!(err, Err(BlynkError::Decode(_))));
    }

    #[test]
    fn test_connection_state_hook() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = hits.clone();
        let hooks = Hooks {
            on_connection_state: Some(Box::new(move |state| {
                assert_eq!(state, ConnectionState::Up);
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        };

        hooks.dispatch(&Event::ConnectionState(ConnectionState::Up));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
