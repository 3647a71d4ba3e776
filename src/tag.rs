//! The decoded/read tag record passed between the codec core and whatever
//! owns persistence and display.

use serde::{Deserialize, Serialize};

/// Which protocol a [`TagInfo`] was decoded with, or is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolId {
    Em4100,
    H10301,
}

impl ProtocolId {
    pub fn name(self) -> &'static str {
        match self {
            ProtocolId::Em4100 => "EM4100",
            ProtocolId::H10301 => "H10301",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EM4100" => Some(ProtocolId::Em4100),
            "H10301" => Some(ProtocolId::H10301),
            _ => None,
        }
    }

    /// UID length in bytes for this protocol.
    pub fn uid_len(self) -> usize {
        match self {
            ProtocolId::Em4100 => 5,
            ProtocolId::H10301 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modulation {
    Ask,
    Fsk2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Manchester,
    Biphase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardFormat {
    None,
    Hid26,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagStatus {
    Empty,
    Ok,
    Error,
}

/// A decoded (or to-be-written) tag: UID plus enough protocol metadata to
/// re-encode it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagInfo {
    pub uid: Vec<u8>,
    pub protocol: ProtocolId,
    pub bitrate: u16,
    pub modulation: Modulation,
    pub encoding: Encoding,
    pub card_format: CardFormat,
    pub status: TagStatus,
    pub filename: Option<String>,
    pub filepath: Option<String>,
}

impl TagInfo {
    pub fn em4100(uid: [u8; 5], bitrate: u16) -> Self {
        Self {
            uid: uid.to_vec(),
            protocol: ProtocolId::Em4100,
            bitrate,
            modulation: Modulation::Ask,
            encoding: Encoding::Manchester,
            card_format: CardFormat::None,
            status: TagStatus::Ok,
            filename: None,
            filepath: None,
        }
    }

    pub fn h10301(uid: [u8; 3]) -> Self {
        Self {
            uid: uid.to_vec(),
            protocol: ProtocolId::H10301,
            bitrate: 0,
            modulation: Modulation::Fsk2,
            encoding: Encoding::Biphase,
            card_format: CardFormat::Hid26,
            status: TagStatus::Ok,
            filename: None,
            filepath: None,
        }
    }

    /// Space-separated hex UID, e.g. `"DE AD BE EF 01"`.
    pub fn uid_hex(&self) -> String {
        self.uid
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn facility_code(&self) -> Option<u8> {
        if self.protocol == ProtocolId::H10301 {
            self.uid.first().copied()
        } else {
            None
        }
    }

    pub fn card_number(&self) -> Option<u16> {
        if self.protocol == ProtocolId::H10301 && self.uid.len() == 3 {
            Some(u16::from_be_bytes([self.uid[1], self.uid[2]]))
        } else {
            None
        }
    }
}

/// Compare only the protocol's declared UID length, not the whole buffer.
///
/// The original firmware's write-verify compared `data_size` bytes of
/// memory starting at `uid[0]`; doing the same here (rather than
/// `data_size + 1`) avoids reading a byte past the UID for protocols whose
/// `data_size` is not one less than a round allocation.
pub fn write_verify(written: &TagInfo, readback: &TagInfo) -> bool {
    if written.protocol != readback.protocol {
        return false;
    }
    let n = written.protocol.uid_len();
    written.uid.len() >= n
        && readback.uid.len() >= n
        && written.uid[..n] == readback.uid[..n]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_hex_formats_upper_case_space_separated() {
        let tag = TagInfo::em4100([0xde, 0xad, 0xbe, 0xef, 0x01], 64);
        assert_eq!(tag.uid_hex(), "DE AD BE EF 01");
    }

    #[test]
    fn write_verify_compares_exactly_data_size_bytes() {
        let mut written = TagInfo::h10301([0x2e, 0x12, 0x34]);
        let mut readback = written.clone();
        readback.uid.push(0xFF); // trailing garbage byte must not matter
        assert!(write_verify(&written, &readback));
        written.uid[0] = 0x00;
        assert!(!write_verify(&written, &readback));
    }
}
