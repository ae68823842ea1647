//! The `authenticatorGetInfo` settings record.
//!
//! One field per response map key (0x01..=0x18). Only populated fields
//! appear in the encoded response; [`Settings::to_cbor`] builds the
//! integer-keyed map and the canonical encoder takes care of ordering.

use alloc::vec::Vec as DynVec;

use crate::cbor::Value;
use crate::{Bytes, String, Vec};

/// An algorithm descriptor as reported in the `algorithms` (0x0A) list.
///
/// The `type` member is fixed to `"public-key"`; `alg` is a COSE
/// algorithm identifier (e.g. -7 for ES256).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PublicKeyCredentialParameters {
    pub alg: i32,
}

impl PublicKeyCredentialParameters {
    pub const ES256: Self = Self { alg: -7 };
    pub const EDDSA: Self = Self { alg: -8 };

    fn to_cbor(self) -> Value {
        Value::Map(alloc::vec![
            (Value::from("alg"), Value::from(self.alg)),
            (Value::from("type"), Value::from("public-key")),
        ])
    }
}

/// The `options` (0x04) member.
///
/// The five always-reported flags mirror what this authenticator core
/// can state unconditionally; the remaining members are emitted only when
/// set, since their absence carries meaning for clients.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CtapOptions {
    pub rk: bool,
    pub up: bool,
    pub plat: bool,
    pub make_cred_uv_not_rqd: bool,
    pub no_mc_ga_permissions_with_client_pin: bool,
    /// Capability to perform UV *within the authenticator*, for instance
    /// with biometrics or on-device PIN entry.
    pub uv: Option<bool>,
    pub client_pin: Option<bool>,
    pub cred_mgmt: Option<bool>,
    pub large_blobs: Option<bool>,
    pub always_uv: Option<bool>,
    pub pin_uv_auth_token: Option<bool>,
}

impl Default for CtapOptions {
    fn default() -> Self {
        Self {
            rk: false,
            up: true,
            plat: false,
            make_cred_uv_not_rqd: false,
            no_mc_ga_permissions_with_client_pin: false,
            uv: None,
            client_pin: None,
            cred_mgmt: None,
            large_blobs: None,
            always_uv: None,
            pin_uv_auth_token: None,
        }
    }
}

impl CtapOptions {
    fn to_cbor(&self) -> Value {
        let mut entries = DynVec::new();
        entries.push((Value::from("rk"), Value::from(self.rk)));
        entries.push((Value::from("up"), Value::from(self.up)));
        entries.push((Value::from("plat"), Value::from(self.plat)));
        entries.push((
            Value::from("makeCredUvNotRqd"),
            Value::from(self.make_cred_uv_not_rqd),
        ));
        entries.push((
            Value::from("noMcGaPermissionsWithClientPin"),
            Value::from(self.no_mc_ga_permissions_with_client_pin),
        ));
        for (name, flag) in [
            ("uv", self.uv),
            ("clientPin", self.client_pin),
            ("credMgmt", self.cred_mgmt),
            ("largeBlobs", self.large_blobs),
            ("alwaysUv", self.always_uv),
            ("pinUvAuthToken", self.pin_uv_auth_token),
        ] {
            if let Some(flag) = flag {
                entries.push((Value::from(name), Value::from(flag)));
            }
        }
        Value::Map(entries)
    }
}

/// The `certifications` (0x13) member.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct Certifications {
    pub fips_cmvp_2: Option<u8>,
    pub fips_cmvp_3: Option<u8>,
    pub fips_cmvp_2_phy: Option<u8>,
    pub fips_cmvp_3_phy: Option<u8>,
    pub cc_eal: Option<u8>,
    pub fido: Option<u8>,
}

impl Certifications {
    fn to_cbor(&self) -> Value {
        let mut entries = DynVec::new();
        for (name, level) in [
            ("FIPS-CMVP-2", self.fips_cmvp_2),
            ("FIPS-CMVP-3", self.fips_cmvp_3),
            ("FIPS-CMVP-2-PHY", self.fips_cmvp_2_phy),
            ("FIPS-CMVP-3-PHY", self.fips_cmvp_3_phy),
            ("CC-EAL", self.cc_eal),
            ("FIDO", self.fido),
        ] {
            if let Some(level) = level {
                entries.push((Value::from(name), Value::from(level)));
            }
        }
        Value::Map(entries)
    }
}

/// Everything an authenticator reports through `authenticatorGetInfo`.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct Settings {
    // 0x01
    pub versions: Vec<String<12>, 4>,
    // 0x02
    pub extensions: Option<Vec<String<13>, 4>>,
    // 0x03
    pub aaguid: Bytes<16>,
    // 0x04
    pub options: Option<CtapOptions>,
    // 0x05
    pub max_msg_size: Option<u32>,
    // 0x06
    pub pin_uv_auth_protocols: Option<Vec<u8, 2>>,
    // 0x07
    pub max_credential_count_in_list: Option<u32>,
    // 0x08
    pub max_credential_id_length: Option<u32>,
    // 0x09
    pub transports: Option<Vec<String<8>, 4>>,
    // 0x0A
    pub algorithms: Option<Vec<PublicKeyCredentialParameters, 8>>,
    // 0x0B
    pub max_serialized_large_blob_array: Option<u32>,
    // 0x0C
    pub force_pin_change: Option<bool>,
    // 0x0D
    pub min_pin_length: Option<u32>,
    // 0x0E
    pub firmware_version: Option<u32>,
    // 0x0F
    pub max_cred_blob_length: Option<u32>,
    // 0x10
    pub max_rpids_for_set_min_pin_length: Option<u32>,
    // 0x11
    pub preferred_platform_uv_attempts: Option<u32>,
    // 0x12
    pub uv_modality: Option<u32>,
    // 0x13
    pub certifications: Option<Certifications>,
    // 0x14
    pub remaining_discoverable_credentials: Option<u32>,
    // 0x15
    pub vendor_prototype_config_commands: Option<Vec<u64, 4>>,
    // 0x16
    pub attestation_formats: Option<Vec<String<8>, 4>>,
    // 0x17
    pub uv_count_since_last_pin_entry: Option<u32>,
    // 0x18
    pub long_touch_for_reset: Option<bool>,
}

impl Settings {
    /// A minimal record: the mandatory members plus nothing else.
    pub fn new(versions: Vec<String<12>, 4>, aaguid: Bytes<16>) -> Self {
        Self {
            versions,
            extensions: None,
            aaguid,
            options: None,
            max_msg_size: None,
            pin_uv_auth_protocols: None,
            max_credential_count_in_list: None,
            max_credential_id_length: None,
            transports: None,
            algorithms: None,
            max_serialized_large_blob_array: None,
            force_pin_change: None,
            min_pin_length: None,
            firmware_version: None,
            max_cred_blob_length: None,
            max_rpids_for_set_min_pin_length: None,
            preferred_platform_uv_attempts: None,
            uv_modality: None,
            certifications: None,
            remaining_discoverable_credentials: None,
            vendor_prototype_config_commands: None,
            attestation_formats: None,
            uv_count_since_last_pin_entry: None,
            long_touch_for_reset: None,
        }
    }

    /// Build the integer-keyed response map. Absent members are omitted.
    pub fn to_cbor(&self) -> Value {
        let mut entries: DynVec<(Value, Value)> = DynVec::new();
        let mut put = |key: u64, value: Value| entries.push((Value::Unsigned(key), value));

        put(0x01, text_list(&self.versions));
        if let Some(extensions) = &self.extensions {
            put(0x02, text_list(extensions));
        }
        put(0x03, Value::from(&self.aaguid[..]));
        if let Some(options) = &self.options {
            put(0x04, options.to_cbor());
        }
        if let Some(n) = self.max_msg_size {
            put(0x05, Value::from(n as u64));
        }
        if let Some(protocols) = &self.pin_uv_auth_protocols {
            put(
                0x06,
                Value::Array(protocols.iter().map(|&p| Value::from(p)).collect()),
            );
        }
        if let Some(n) = self.max_credential_count_in_list {
            put(0x07, Value::from(n as u64));
        }
        if let Some(n) = self.max_credential_id_length {
            put(0x08, Value::from(n as u64));
        }
        if let Some(transports) = &self.transports {
            put(0x09, text_list(transports));
        }
        if let Some(algorithms) = &self.algorithms {
            put(
                0x0A,
                Value::Array(algorithms.iter().map(|a| a.to_cbor()).collect()),
            );
        }
        if let Some(n) = self.max_serialized_large_blob_array {
            put(0x0B, Value::from(n as u64));
        }
        if let Some(flag) = self.force_pin_change {
            put(0x0C, Value::from(flag));
        }
        if let Some(n) = self.min_pin_length {
            put(0x0D, Value::from(n as u64));
        }
        if let Some(n) = self.firmware_version {
            put(0x0E, Value::from(n as u64));
        }
        if let Some(n) = self.max_cred_blob_length {
            put(0x0F, Value::from(n as u64));
        }
        if let Some(n) = self.max_rpids_for_set_min_pin_length {
            put(0x10, Value::from(n as u64));
        }
        if let Some(n) = self.preferred_platform_uv_attempts {
            put(0x11, Value::from(n as u64));
        }
        if let Some(n) = self.uv_modality {
            put(0x12, Value::from(n as u64));
        }
        if let Some(certifications) = &self.certifications {
            put(0x13, certifications.to_cbor());
        }
        if let Some(n) = self.remaining_discoverable_credentials {
            put(0x14, Value::from(n as u64));
        }
        if let Some(commands) = &self.vendor_prototype_config_commands {
            put(
                0x15,
                Value::Array(commands.iter().map(|&c| Value::from(c)).collect()),
            );
        }
        if let Some(formats) = &self.attestation_formats {
            put(0x16, text_list(formats));
        }
        if let Some(n) = self.uv_count_since_last_pin_entry {
            put(0x17, Value::from(n as u64));
        }
        if let Some(flag) = self.long_touch_for_reset {
            put(0x18, Value::from(flag));
        }

        Value::Map(entries)
    }
}

impl Default for Settings {
    /// The defaults of a bare USB-transported FIDO 2.1 authenticator:
    /// ES256 only, no PIN, no extensions.
    fn default() -> Self {
        let mut versions = Vec::new();
        versions.push(String::from("FIDO_2_1")).ok();

        let mut aaguid = Bytes::new();
        for i in 0..16u8 {
            aaguid.push(i).ok();
        }

        let mut transports = Vec::new();
        transports.push(String::from("usb")).ok();

        let mut algorithms = Vec::new();
        algorithms.push(PublicKeyCredentialParameters::ES256).ok();

        let mut settings = Self::new(versions, aaguid);
        settings.options = Some(CtapOptions::default());
        settings.transports = Some(transports);
        settings.algorithms = Some(algorithms);
        settings
    }
}

fn text_list<const N: usize, const M: usize>(list: &Vec<String<N>, M>) -> Value {
    Value::Array(list.iter().map(|s| Value::from(s.as_str())).collect())
}
