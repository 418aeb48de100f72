//! Version profiles: the fixed bundle of field widths, record sizes, cipher
//! variant and default keys tied to an archive format version.
//!
//! A profile is chosen exactly once (from the header on decode, from the
//! caller's options on encode) and passed down; nothing dispatches on the
//! version number after that point.

use crate::cipher::{
    ChaChaCipher, ClassicCipher, ClassicParams, EntryCipher, KnownKey, WOLF_CHACHA_V1_KEY,
    WOLF_V2_01_KEY, WOLF_V2_10_KEY, WOLF_V2_20_KEY, WOLF_V2_225_KEY, WOLF_V3_00_KEY,
    WOLF_V3_14_KEY, WOLF_V3_31_KEY, WOLF_V3_50_KEY,
};
use crate::error::{Error, Result};
use crate::types::FLAG_CHACHA;

/// Width of the size and offset fields inside the directory block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    /// 32-bit fields (v5).
    Narrow,
    /// 64-bit fields (v6 and later).
    Wide,
}

/// One supported combination of layout and cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionProfile {
    V5,
    V6,
    V8Classic,
    V8ChaCha,
}

const V5_CLASSIC: ClassicParams = ClassicParams {
    scale: 0,
    shift: 0,
    rotate: false,
};

const V6_CLASSIC: ClassicParams = ClassicParams {
    scale: 2,
    shift: 5,
    rotate: true,
};

const V8_CLASSIC: ClassicParams = ClassicParams {
    scale: 3,
    shift: 9,
    rotate: true,
};

const V5_KNOWN: &[KnownKey] = &[
    KnownKey {
        release: "Wolf RPG v2.01",
        material: &WOLF_V2_01_KEY,
    },
    KnownKey {
        release: "Wolf RPG v2.10",
        material: &WOLF_V2_10_KEY,
    },
];

const V6_KNOWN: &[KnownKey] = &[KnownKey {
    release: "Wolf RPG v2.20",
    material: &WOLF_V2_20_KEY,
}];

const V8_CLASSIC_KNOWN: &[KnownKey] = &[
    KnownKey {
        release: "Wolf RPG v2.225",
        material: WOLF_V2_225_KEY,
    },
    KnownKey {
        release: "Wolf RPG v3.00",
        material: WOLF_V3_00_KEY,
    },
    KnownKey {
        release: "Wolf RPG v3.14",
        material: WOLF_V3_14_KEY,
    },
    KnownKey {
        release: "Wolf RPG v3.31",
        material: WOLF_V3_31_KEY,
    },
    KnownKey {
        release: "Wolf RPG v3.50",
        material: WOLF_V3_50_KEY,
    },
];

const V8_CHACHA_KNOWN: &[KnownKey] = &[KnownKey {
    release: "Wolf RPG ChaCha v1",
    material: WOLF_CHACHA_V1_KEY,
}];

impl VersionProfile {
    /// Select the profile recorded in an archive header.
    pub fn from_header(version: u16, code_flags: u32) -> Result<Self> {
        match version {
            5 => Ok(VersionProfile::V5),
            // v7 changed nothing we model over v6.
            6 | 7 => Ok(VersionProfile::V6),
            8 => Ok(if code_flags & FLAG_CHACHA != 0 {
                VersionProfile::V8ChaCha
            } else {
                VersionProfile::V8Classic
            }),
            other => Err(Error::UnsupportedVersion(other)),
        }
    }

    /// Version number written to the header.
    pub fn version_number(&self) -> u16 {
        match self {
            VersionProfile::V5 => 5,
            VersionProfile::V6 => 6,
            VersionProfile::V8Classic | VersionProfile::V8ChaCha => 8,
        }
    }

    pub fn width(&self) -> FieldWidth {
        match self {
            VersionProfile::V5 => FieldWidth::Narrow,
            _ => FieldWidth::Wide,
        }
    }

    /// Size of the fixed header on disk.
    pub fn header_len(&self) -> u64 {
        match self.width() {
            FieldWidth::Narrow => 32,
            FieldWidth::Wide => 64,
        }
    }

    /// Whether file entries carry the entropy-tail size field.
    pub fn has_huffman_sizes(&self) -> bool {
        matches!(self, VersionProfile::V8Classic | VersionProfile::V8ChaCha)
    }

    pub fn uses_chacha(&self) -> bool {
        matches!(self, VersionProfile::V8ChaCha)
    }

    /// Serialized size of one file table record.
    pub fn file_entry_len(&self) -> u64 {
        let w = match self.width() {
            FieldWidth::Narrow => 4u64,
            FieldWidth::Wide => 8,
        };
        // name offset, 5 size/offset fields, attributes, 3 timestamps,
        // plus the huffman size on v8.
        let base = w * 6 + 4 + 24;
        if self.has_huffman_sizes() {
            base + w
        } else {
            base
        }
    }

    /// Serialized size of one directory table record.
    pub fn dir_entry_len(&self) -> u64 {
        match self.width() {
            FieldWidth::Narrow => 16,
            FieldWidth::Wide => 32,
        }
    }

    /// Build the cipher for a caller-supplied key.
    pub fn cipher_for(&self, key: &[u8]) -> EntryCipher {
        match self {
            VersionProfile::V8ChaCha => EntryCipher::ChaCha(ChaChaCipher::derive(key)),
            _ => EntryCipher::Classic(ClassicCipher::derive(key, self.classic_params())),
        }
    }

    /// Build the cipher for the version's stock key.
    pub fn default_cipher(&self) -> EntryCipher {
        self.known_cipher(&self.known_keys()[0])
    }

    /// Keys the editor shipped for this profile, most common first.
    pub fn known_keys(&self) -> &'static [KnownKey] {
        match self {
            VersionProfile::V5 => V5_KNOWN,
            VersionProfile::V6 => V6_KNOWN,
            VersionProfile::V8Classic => V8_CLASSIC_KNOWN,
            VersionProfile::V8ChaCha => V8_CHACHA_KNOWN,
        }
    }

    /// Build the cipher for one of [`Self::known_keys`]. The v5/v6 stock
    /// keys are raw keystream state; the v8 entries are key material.
    pub fn known_cipher(&self, key: &KnownKey) -> EntryCipher {
        match self {
            VersionProfile::V5 | VersionProfile::V6 => {
                let mut state = [0u8; 12];
                state.copy_from_slice(key.material);
                EntryCipher::Classic(ClassicCipher::from_state(state, self.classic_params()))
            }
            VersionProfile::V8Classic | VersionProfile::V8ChaCha => self.cipher_for(key.material),
        }
    }

    fn classic_params(&self) -> ClassicParams {
        match self {
            VersionProfile::V5 => V5_CLASSIC,
            VersionProfile::V6 => V6_CLASSIC,
            VersionProfile::V8Classic | VersionProfile::V8ChaCha => V8_CLASSIC,
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::VersionProfile;
    use crate::error::Error;
    use crate::types::FLAG_CHACHA;

    #[test]
    fn header_versions_map_to_profiles() {
        assert_eq!(
            VersionProfile::from_header(5, 0).unwrap(),
            VersionProfile::V5
        );
        assert_eq!(
            VersionProfile::from_header(6, 0).unwrap(),
            VersionProfile::V6
        );
        assert_eq!(
            VersionProfile::from_header(7, 0).unwrap(),
            VersionProfile::V6
        );
        assert_eq!(
            VersionProfile::from_header(8, 0).unwrap(),
            VersionProfile::V8Classic
        );
        assert_eq!(
            VersionProfile::from_header(8, FLAG_CHACHA).unwrap(),
            VersionProfile::V8ChaCha
        );
    }

    #[test]
    fn unknown_versions_are_refused() {
        assert!(matches!(
            VersionProfile::from_header(4, 0),
            Err(Error::UnsupportedVersion(4))
        ));
        assert!(matches!(
            VersionProfile::from_header(9, 0),
            Err(Error::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn record_sizes_match_the_layouts() {
        assert_eq!(VersionProfile::V5.file_entry_len(), 52);
        assert_eq!(VersionProfile::V6.file_entry_len(), 76);
        assert_eq!(VersionProfile::V8Classic.file_entry_len(), 84);
        assert_eq!(VersionProfile::V5.dir_entry_len(), 16);
        assert_eq!(VersionProfile::V8ChaCha.dir_entry_len(), 32);
        assert_eq!(VersionProfile::V5.header_len(), 32);
        assert_eq!(VersionProfile::V6.header_len(), 64);
    }

    #[test]
    fn every_profile_has_a_stock_key() {
        for profile in [
            VersionProfile::V5,
            VersionProfile::V6,
            VersionProfile::V8Classic,
            VersionProfile::V8ChaCha,
        ] {
            assert!(!profile.known_keys().is_empty());
            let _ = profile.default_cipher();
        }
    }
}
