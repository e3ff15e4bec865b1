//! Advertisement payload parsing.
//!
//! A raw advertisement is a sequence of AD structures, each laid out as
//! `[length][type][data; length - 1]`. A zero length marks the end of the
//! significant part; a structure running past the end of the buffer ends
//! parsing without error.

use uuid::Uuid;

/// AD type: incomplete list of 16-bit service UUIDs.
pub const AD_INCOMPLETE_UUID16: u8 = 0x02;
/// AD type: complete list of 16-bit service UUIDs.
pub const AD_COMPLETE_UUID16: u8 = 0x03;
/// AD type: incomplete list of 32-bit service UUIDs.
pub const AD_INCOMPLETE_UUID32: u8 = 0x04;
/// AD type: complete list of 32-bit service UUIDs.
pub const AD_COMPLETE_UUID32: u8 = 0x05;
/// AD type: incomplete list of 128-bit service UUIDs.
pub const AD_INCOMPLETE_UUID128: u8 = 0x06;
/// AD type: complete list of 128-bit service UUIDs.
pub const AD_COMPLETE_UUID128: u8 = 0x07;
/// AD type: shortened local name.
pub const AD_SHORT_LOCAL_NAME: u8 = 0x08;
/// AD type: complete local name.
pub const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;

const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// Expand a 16- or 32-bit assigned number onto the Bluetooth base UUID.
///
/// # Examples
///
/// ```
/// use blescan_scanner::advertising::uuid_from_short;
///
/// let heart_rate = uuid_from_short(0x180D);
/// assert_eq!(heart_rate.to_string(), "0000180d-0000-1000-8000-00805f9b34fb");
/// ```
pub fn uuid_from_short(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | (u128::from(short) << 96))
}

/// One AD structure borrowed from a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    /// AD type byte.
    pub ad_type: u8,

    /// Data following the type byte.
    pub data: &'a [u8],
}

/// Iterator over the AD structures of a payload.
#[derive(Debug, Clone)]
pub struct AdStructures<'a> {
    remaining: &'a [u8],
}

impl<'a> AdStructures<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { remaining: payload }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = AdStructure<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&length, rest) = self.remaining.split_first()?;
        let length = usize::from(length);

        if length == 0 || length > rest.len() {
            self.remaining = &[];
            return None;
        }

        let (structure, rest) = rest.split_at(length);
        self.remaining = rest;

        Some(AdStructure {
            ad_type: structure[0],
            data: &structure[1..],
        })
    }
}

/// Collect every service UUID advertised in a payload.
pub fn service_uuids(payload: &[u8]) -> Vec<Uuid> {
    let mut uuids = Vec::new();

    for structure in AdStructures::new(payload) {
        match structure.ad_type {
            AD_INCOMPLETE_UUID16 | AD_COMPLETE_UUID16 => {
                uuids.extend(
                    structure
                        .data
                        .chunks_exact(2)
                        .map(|c| uuid_from_short(u32::from(u16::from_le_bytes([c[0], c[1]])))),
                );
            }
            AD_INCOMPLETE_UUID32 | AD_COMPLETE_UUID32 => {
                uuids.extend(
                    structure
                        .data
                        .chunks_exact(4)
                        .map(|c| uuid_from_short(u32::from_le_bytes([c[0], c[1], c[2], c[3]]))),
                );
            }
            AD_INCOMPLETE_UUID128 | AD_COMPLETE_UUID128 => {
                for chunk in structure.data.chunks_exact(16) {
                    let mut bytes = [0u8; 16];
                    bytes.copy_from_slice(chunk);
                    // Little-endian on air
                    bytes.reverse();
                    uuids.push(Uuid::from_bytes(bytes));
                }
            }
            _ => {}
        }
    }

    uuids
}

/// Extract the local name, preferring the complete name over the shortened one.
pub fn local_name(payload: &[u8]) -> Option<String> {
    let mut short = None;

    for structure in AdStructures::new(payload) {
        match structure.ad_type {
            AD_COMPLETE_LOCAL_NAME => {
                return Some(String::from_utf8_lossy(structure.data).into_owned());
            }
            AD_SHORT_LOCAL_NAME if short.is_none() => {
                short = Some(String::from_utf8_lossy(structure.data).into_owned());
            }
            _ => {}
        }
    }

    short
}
