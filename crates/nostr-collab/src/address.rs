//! NIP-19 address codec for `naddr` (document addresses) and `npub` (single keys).
//!
//! Pure and deterministic: no I/O, and `decode_naddr(&encode_naddr(&a)?)? == a`
//! for any well-formed address, with relay hint order preserved.

use nostr_sdk::nostr::nips::nip01::Coordinate;
use nostr_sdk::nostr::nips::nip19::{FromBech32, Nip19Coordinate, ToBech32};
use nostr_sdk::prelude::{Kind, PublicKey, RelayUrl};
use serde::{Deserialize, Serialize};

use crate::events::{coordinate, is_hex_pubkey};
use crate::Error;

const HRP_NADDR: &str = "naddr";
const HRP_NPUB: &str = "npub";

/// Prefixes NIP-19 assigns. Anything else is not an address at all.
const KNOWN_HRPS: [&str; 7] = ["npub", "nsec", "note", "nprofile", "nevent", "naddr", "nrelay"];

/// TLV values carry a one-byte length.
const MAX_TLV_LEN: usize = u8::MAX as usize;

/// Structured form of an `naddr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPointer {
    pub kind: u16,
    pub pubkey: String,
    pub identifier: String,
    pub relays: Vec<String>,
}

impl AddressPointer {
    pub fn new(kind: u16, pubkey: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            pubkey: pubkey.into(),
            identifier: identifier.into(),
            relays: Vec::new(),
        }
    }

    pub fn with_relays(mut self, relays: Vec<String>) -> Self {
        self.relays = relays;
        self
    }

    pub fn coordinate(&self) -> String {
        coordinate(self.kind, &self.pubkey, &self.identifier)
    }

    pub fn to_naddr(&self) -> Result<String, Error> {
        encode_naddr(self)
    }
}

pub fn encode_naddr(address: &AddressPointer) -> Result<String, Error> {
    check_tlv_len("identifier", &address.identifier)?;
    let public_key = parse_hex_key(&address.pubkey)?;
    let relays = address
        .relays
        .iter()
        .map(|relay| {
            check_tlv_len("relay hint", relay)?;
            RelayUrl::parse(relay)
                .map_err(|err| Error::MalformedAddress(format!("relay hint {relay}: {err}")))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let mut coordinate = Coordinate::new(Kind::from(address.kind), public_key);
    coordinate.identifier = address.identifier.clone();

    Nip19Coordinate::new(coordinate, relays)
        .to_bech32()
        .map_err(|err| Error::MalformedAddress(err.to_string()))
}

pub fn decode_naddr(value: &str) -> Result<AddressPointer, Error> {
    let value = value.trim();
    expect_prefix(value, HRP_NADDR)?;
    let decoded = Nip19Coordinate::from_bech32(value)
        .map_err(|err| Error::MalformedAddress(err.to_string()))?;

    Ok(AddressPointer {
        kind: decoded.coordinate.kind.as_u16(),
        pubkey: decoded.coordinate.public_key.to_hex(),
        identifier: decoded.coordinate.identifier.clone(),
        relays: decoded
            .relays
            .iter()
            .map(|relay| relay.to_string().trim_end_matches('/').to_string())
            .collect(),
    })
}

pub fn encode_npub(pubkey: &str) -> Result<String, Error> {
    parse_hex_key(pubkey)?
        .to_bech32()
        .map_err(|err| Error::MalformedAddress(err.to_string()))
}

/// Returns the lowercase hex key.
pub fn decode_npub(value: &str) -> Result<String, Error> {
    let value = value.trim();
    expect_prefix(value, HRP_NPUB)?;
    let public_key =
        PublicKey::from_bech32(value).map_err(|err| Error::MalformedAddress(err.to_string()))?;
    Ok(public_key.to_hex())
}

/// Human-readable part check. A different NIP-19 prefix is a type mismatch;
/// anything else is malformed.
fn expect_prefix(value: &str, expected: &'static str) -> Result<(), Error> {
    let (hrp, _) = value
        .rsplit_once('1')
        .ok_or_else(|| Error::MalformedAddress("missing bech32 separator".to_string()))?;
    let hrp = hrp.to_ascii_lowercase();
    if hrp == expected {
        return Ok(());
    }
    if KNOWN_HRPS.contains(&hrp.as_str()) {
        return Err(Error::WrongAddressType {
            expected: expected.to_string(),
            actual: hrp,
        });
    }
    Err(Error::MalformedAddress(format!("unknown prefix {hrp:?}")))
}

fn parse_hex_key(pubkey: &str) -> Result<PublicKey, Error> {
    if !is_hex_pubkey(pubkey) {
        return Err(Error::MalformedAddress(format!(
            "pubkey must be 64 hex chars: {pubkey}"
        )));
    }
    PublicKey::from_hex(&pubkey.to_ascii_lowercase())
        .map_err(|err| Error::MalformedAddress(format!("pubkey {pubkey}: {err}")))
}

fn check_tlv_len(field: &str, value: &str) -> Result<(), Error> {
    if value.len() > MAX_TLV_LEN {
        return Err(Error::MalformedAddress(format!(
            "{field} is {} bytes, limit is {MAX_TLV_LEN}",
            value.len()
        )));
    }
    Ok(())
}
