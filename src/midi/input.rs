//! MIDI input: connects to a MIDI device and mirrors its held keys into a [`SharedKeys`].

use std::io;

use log::info;
use midir::{MidiInput as MidirInput, MidiInputConnection};

use super::mapping::{parse_key_event, HeldNotes};
use crate::keys::SharedKeys;
use crate::note::KeyMap;

/// Active MIDI input connection. Dropping it disconnects.
pub struct MidiKeySource {
    _connection: MidiInputConnection<HeldNotes>,
    port_name: String,
}

impl MidiKeySource {
    /// Start listening on a MIDI port.
    /// Finds a port whose name contains `device_name` (or the first available port).
    pub fn start(
        device_name: Option<&str>,
        channel_filter: Option<u8>,
        keymap: KeyMap,
        keys: SharedKeys,
    ) -> io::Result<Self> {
        let midi_in = MidirInput::new("keyfall")
            .map_err(|e| io::Error::other(format!("MIDI init: {e}")))?;

        let ports = midi_in.ports();
        if ports.is_empty() {
            return Err(io::Error::other("no MIDI input ports available"));
        }

        let (port, port_name) = if let Some(name_filter) = device_name {
            ports
                .iter()
                .find_map(|p| {
                    let name = midi_in.port_name(p).unwrap_or_default();
                    name.contains(name_filter).then(|| (p.clone(), name))
                })
                .ok_or_else(|| {
                    io::Error::other(format!("MIDI device matching '{name_filter}' not found"))
                })?
        } else {
            let p = ports[0].clone();
            let name = midi_in
                .port_name(&p)
                .unwrap_or_else(|_| "unknown".to_string());
            (p, name)
        };

        let connection = midi_in
            .connect(
                &port,
                "keyfall-keys",
                move |_timestamp, msg, held: &mut HeldNotes| {
                    if let Some(event) = parse_key_event(msg, channel_filter) {
                        if held.apply(event) {
                            keys.publish(held.snapshot());
                        }
                    }
                },
                HeldNotes::new(keymap),
            )
            .map_err(|e| io::Error::other(format!("MIDI connect: {e}")))?;

        info!("listening for keys on MIDI port '{port_name}'");
        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    /// Get the connected port name.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// List all available MIDI input device names.
    pub fn list_devices() -> Vec<String> {
        let Ok(midi_in) = MidirInput::new("keyfall-list") else {
            return Vec::new();
        };
        midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect()
    }
}
