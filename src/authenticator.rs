//! Command dispatch for the CTAP2 CBOR channel.
//!
//! An [`Authenticator`] routes decoded commands to registered handlers
//! and serves `authenticatorGetInfo` itself from its settings record.
//! The credential operations (makeCredential, getAssertion, ...) are
//! deliberately not implemented here: the application registers them,
//! and this layer stays free of cryptography and storage.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::cbor::{self, Value};
use crate::ctap2::get_info::Settings;
use crate::ctap2::{Error, Operation};

/// A registered CTAP2 command handler.
///
/// Receives the decoded CBOR argument (an empty map when the request had
/// no argument bytes) and returns the complete response, status byte
/// included. The dispatcher never rewrites handler output.
pub trait Handler {
    fn handle(&mut self, args: &Value) -> Vec<u8>;
}

impl<F: FnMut(&Value) -> Vec<u8>> Handler for F {
    fn handle(&mut self, args: &Value) -> Vec<u8> {
        self(args)
    }
}

/// The CTAP2 command router.
pub struct Authenticator {
    settings: Settings,
    handlers: Vec<(u8, Box<dyn Handler>)>,
}

impl Authenticator {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            handlers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register `handler` for a command byte, replacing any previous
    /// registration. `authenticatorGetInfo` (0x04) is served internally
    /// and cannot be shadowed.
    pub fn register(&mut self, command: u8, handler: impl Handler + 'static) {
        self.handlers.retain(|(registered, _)| *registered != command);
        self.handlers.push((command, Box::new(handler)));
    }

    /// Process one CTAPHID CBOR payload: `command byte ‖ CBOR argument`.
    ///
    /// Always produces a response; errors come back as their single
    /// status byte.
    pub fn cbor(&mut self, request: &[u8]) -> Vec<u8> {
        let Some((&command, argument_bytes)) = request.split_first() else {
            return alloc::vec![Error::InvalidLength as u8];
        };

        let argument = if argument_bytes.is_empty() {
            Value::empty_map()
        } else {
            match cbor::decode_all(argument_bytes) {
                Ok(value) => value,
                Err(_err) => {
                    debug_now!("CBOR argument rejected: {:?}", _err);
                    return alloc::vec![Error::InvalidCbor as u8];
                }
            }
        };

        if Operation::try_from(command) == Ok(Operation::GetInfo) {
            debug_now!("CTAP2.GI");
            return self.get_info();
        }

        match self
            .handlers
            .iter_mut()
            .find(|(registered, _)| *registered == command)
        {
            Some((_, handler)) => {
                debug_now!("CTAP2 0x{:02x}", command);
                handler.handle(&argument)
            }
            None => {
                debug_now!("unhandled CTAP2 operation 0x{:02x}", command);
                alloc::vec![Error::InvalidCommand as u8]
            }
        }
    }

    fn get_info(&self) -> Vec<u8> {
        match cbor::encode(&self.settings.to_cbor()) {
            Ok(body) => {
                let mut response = Vec::with_capacity(1 + body.len());
                response.push(Error::Success as u8);
                response.extend_from_slice(&body);
                response
            }
            // unreachable for any settings record this crate can build
            Err(_) => alloc::vec![Error::Other as u8],
        }
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_is_invalid_length() {
        let mut authenticator = Authenticator::default();
        assert_eq!(authenticator.cbor(&[]), [Error::InvalidLength as u8]);
    }

    #[test]
    fn unregistered_command_is_invalid_command() {
        let mut authenticator = Authenticator::default();
        assert_eq!(authenticator.cbor(&[0x01]), [Error::InvalidCommand as u8]);
    }

    #[test]
    fn malformed_argument_is_invalid_cbor() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x01, |_: &Value| alloc::vec![0x00]);
        // truncated map
        assert_eq!(
            authenticator.cbor(&[0x01, 0xA1, 0x01]),
            [Error::InvalidCbor as u8]
        );
        // trailing bytes after the argument
        assert_eq!(
            authenticator.cbor(&[0x01, 0x00, 0x00]),
            [Error::InvalidCbor as u8]
        );
    }

    #[test]
    fn handler_output_is_verbatim() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x02, |_: &Value| alloc::vec![0x99, 0xAA, 0xBB]);
        assert_eq!(authenticator.cbor(&[0x02]), [0x99, 0xAA, 0xBB]);
    }

    #[test]
    fn bare_command_byte_decodes_as_empty_map() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x0B, |args: &Value| {
            assert_eq!(*args, Value::empty_map());
            alloc::vec![Error::Success as u8]
        });
        assert_eq!(authenticator.cbor(&[0x0B]), [Error::Success as u8]);
    }

    #[test]
    fn handler_receives_decoded_argument() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x06, |args: &Value| {
            match args.get(&Value::Unsigned(1)) {
                Some(Value::Unsigned(2)) => alloc::vec![Error::Success as u8],
                _ => alloc::vec![Error::MissingParameter as u8],
            }
        });
        // {1: 2}
        assert_eq!(
            authenticator.cbor(&[0x06, 0xA1, 0x01, 0x02]),
            [Error::Success as u8]
        );
    }

    #[test]
    fn get_info_cannot_be_shadowed() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x04, |_: &Value| alloc::vec![0xFF]);
        let response = authenticator.cbor(&[0x04]);
        assert_eq!(response[0], Error::Success as u8);
        assert!(response.len() > 1);
    }

    #[test]
    fn vendor_commands_are_registrable() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x50, |_: &Value| alloc::vec![Error::Success as u8, 0x01]);
        assert_eq!(
            authenticator.cbor(&[0x50]),
            [Error::Success as u8, 0x01]
        );
    }

    #[test]
    fn registration_replaces_previous_handler() {
        let mut authenticator = Authenticator::default();
        authenticator.register(0x01, |_: &Value| alloc::vec![0x01]);
        authenticator.register(0x01, |_: &Value| alloc::vec![0x02]);
        assert_eq!(authenticator.cbor(&[0x01]), [0x02]);
    }
}
