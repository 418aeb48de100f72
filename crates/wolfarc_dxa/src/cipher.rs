//! Keystream ciphers applied to payloads and the directory block.
//!
//! Two variants exist across format versions. The classic cipher (v5 through
//! v7, and v8 archives without the ChaCha flag) folds the password into a
//! twelve byte state and indexes it from the byte's logical offset. Newer v8
//! archives carry a 44 byte key split into a ChaCha20 key and nonce. Both
//! transforms XOR a position-derived keystream, so applying one twice at the
//! same offset restores the input.
//!
//! The well-known keys the Wolf RPG Editor shipped with over the years are
//! exposed as [`KnownKey`] so a decoder can walk them when the caller has no
//! key of their own.

use chacha20::ChaCha20;
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};

/// Classic cipher state width.
pub const CLASSIC_KEY_LEN: usize = 12;
/// ChaCha key material: 32 key bytes followed by a 12 byte nonce.
pub const CHACHA_KEY_LEN: usize = 44;

/// Fold constants mixed into the password during derivation.
const ROTATION: [u8; CLASSIC_KEY_LEN] = [
    0x85, 0x5A, 0xC3, 0x2E, 0x91, 0x0B, 0x67, 0xF0, 0x4D, 0xA6, 0x38, 0x19,
];

/// Per-version constants of the classic keystream index
/// `(p + scale * p + shift [+ p]) mod 12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassicParams {
    pub scale: u64,
    pub shift: u64,
    /// Rotate the state by `p mod 12` on top of the index expression.
    pub rotate: bool,
}

/// Classic 12-byte keystream cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassicCipher {
    state: [u8; CLASSIC_KEY_LEN],
    params: ClassicParams,
}

impl ClassicCipher {
    /// Fold an arbitrary-length password into the cipher state.
    pub fn derive(password: &[u8], params: ClassicParams) -> Self {
        debug_assert!(!password.is_empty());
        let mut state = [0u8; CLASSIC_KEY_LEN];
        for (i, slot) in state.iter_mut().enumerate() {
            *slot = password[i % password.len()] ^ ROTATION[i];
        }
        Self { state, params }
    }

    /// Install raw state bytes, bypassing derivation. The editor's built-in
    /// keys are stored in this form.
    pub fn from_state(state: [u8; CLASSIC_KEY_LEN], params: ClassicParams) -> Self {
        Self { state, params }
    }

    /// XOR the keystream over `buf`, which logically starts at `offset`.
    pub fn apply_at(&self, buf: &mut [u8], offset: u64) {
        for (i, byte) in buf.iter_mut().enumerate() {
            let p = offset.wrapping_add(i as u64);
            let mut index = p
                .wrapping_add(self.params.scale.wrapping_mul(p))
                .wrapping_add(self.params.shift);
            if self.params.rotate {
                index = index.wrapping_add(p);
            }
            *byte ^= self.state[(index % CLASSIC_KEY_LEN as u64) as usize];
        }
    }
}

/// ChaCha20 keystream cipher for v8 archives with the ChaCha flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaChaCipher {
    key: [u8; 32],
    nonce: [u8; 12],
}

impl ChaChaCipher {
    /// Partition 44 bytes of key material into key and nonce. Shorter
    /// material is cycled until the full width is covered.
    pub fn derive(material: &[u8]) -> Self {
        debug_assert!(!material.is_empty());
        let mut full = [0u8; CHACHA_KEY_LEN];
        for (i, slot) in full.iter_mut().enumerate() {
            *slot = material[i % material.len()];
        }
        let mut key = [0u8; 32];
        let mut nonce = [0u8; 12];
        key.copy_from_slice(&full[..32]);
        nonce.copy_from_slice(&full[32..]);
        Self { key, nonce }
    }

    /// XOR the keystream over `buf` starting at absolute byte `offset`.
    pub fn apply_at(&self, buf: &mut [u8], offset: u64) {
        let mut chacha = ChaCha20::new(&self.key.into(), &self.nonce.into());
        chacha.seek(offset);
        chacha.apply_keystream(buf);
    }
}

/// The cipher selected for one archive, applied to every region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryCipher {
    /// Archive written with the no-encryption flag.
    Plain,
    Classic(ClassicCipher),
    ChaCha(ChaChaCipher),
}

impl EntryCipher {
    pub fn is_plain(&self) -> bool {
        matches!(self, EntryCipher::Plain)
    }

    /// XOR the keystream over `buf` at logical `offset`. Involutory: a second
    /// application with the same arguments restores the original bytes.
    pub fn apply_at(&self, buf: &mut [u8], offset: u64) {
        match self {
            EntryCipher::Plain => {}
            EntryCipher::Classic(c) => c.apply_at(buf, offset),
            EntryCipher::ChaCha(c) => c.apply_at(buf, offset),
        }
    }
}

/// A key the editor is known to have shipped, with the release it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct KnownKey {
    pub release: &'static str,
    pub material: &'static [u8],
}

/// Wolf RPG v2.01 archive key (also the v5 default).
pub const WOLF_V2_01_KEY: [u8; CLASSIC_KEY_LEN] = [
    0x0f, 0x53, 0xe1, 0x3e, 0x04, 0x37, 0x12, 0x17, 0x60, 0x0f, 0x53, 0xe1,
];

/// Wolf RPG v2.10 archive key.
pub const WOLF_V2_10_KEY: [u8; CLASSIC_KEY_LEN] = [
    0x4c, 0xd9, 0x2a, 0xb7, 0x28, 0x9b, 0xac, 0x07, 0x3e, 0x77, 0xec, 0x4c,
];

/// Wolf RPG v2.20 archive key (also the v6 default).
pub const WOLF_V2_20_KEY: [u8; CLASSIC_KEY_LEN] = [
    0x38, 0x50, 0x40, 0x28, 0x72, 0x4f, 0x21, 0x70, 0x3b, 0x73, 0x35, 0x38,
];

/// Wolf RPG v2.225 pass-phrase (also the v8 classic default).
pub const WOLF_V2_225_KEY: &[u8] = b"WLFRPrO!p(;s5((8P@((UFWlu$#5(=";

/// Wolf RPG v3.00 key material.
pub const WOLF_V3_00_KEY: &[u8] = &[
    0x0F, 0x53, 0xE1, 0x3E, 0x8E, 0xB5, 0x41, 0x91, 0x52, 0x16, 0x55, 0xAE, 0x34, 0xC9, 0x8F,
    0x79, 0x59, 0x2F, 0x59, 0x6B, 0x95, 0x19, 0x9B, 0x1B, 0x35, 0x9A, 0x2F, 0xDE, 0xC9, 0x7C,
    0x12, 0x96, 0xC3, 0x14, 0xB5, 0x0F, 0x53, 0xE1, 0x3E, 0x8E,
];

/// Wolf RPG v3.14 key material.
pub const WOLF_V3_14_KEY: &[u8] = &[
    0x31, 0xF9, 0x01, 0x36, 0xA3, 0xE3, 0x8D, 0x3C, 0x7B, 0xC3, 0x7D, 0x25, 0xAD, 0x63, 0x28,
    0x19, 0x1B, 0xF7, 0x8E, 0x6C, 0xC4, 0xE5, 0xE2, 0x76, 0x82, 0xEA, 0x4F, 0xED, 0x61, 0xDA,
    0xE0, 0x44, 0x5B, 0xB6, 0x46, 0x3B, 0x06, 0xD5, 0xCE, 0xB6, 0x78, 0x58, 0xD0, 0x7C, 0x82,
];

/// Wolf RPG v3.31 key material.
pub const WOLF_V3_31_KEY: &[u8] = &[
    0xCA, 0x08, 0x4C, 0x5D, 0x17, 0x0D, 0xDA, 0xA1, 0xD7, 0x27, 0xC8, 0x41, 0x54, 0x38, 0x82,
    0x32, 0x54, 0xB7, 0xF9, 0x46, 0x8E, 0x13, 0x6B, 0xCA, 0xD0, 0x5C, 0x95, 0x95, 0xE2, 0xDC,
    0x03, 0x53, 0x60, 0x9B, 0x4A, 0x38, 0x17, 0xF3, 0x69, 0x59, 0xA4, 0xC7, 0x9A, 0x43, 0x63,
    0xE6, 0x54, 0xAF, 0xDB, 0xBB, 0x43, 0x58,
];

/// Wolf RPG v3.50 key material.
pub const WOLF_V3_50_KEY: &[u8] = &[
    0xD2, 0x84, 0xCE, 0x28, 0xCE, 0x88, 0x82, 0xE4, 0x2A, 0x18, 0x2E, 0x4C, 0x06, 0xB4, 0xEA,
    0x84, 0x06, 0xB8, 0xC6, 0x88, 0x5A, 0xA0, 0x9E, 0x7C, 0x56, 0x40, 0xBA, 0x34, 0x52, 0xCC,
    0xC6, 0x7C, 0x2E, 0x14, 0x12, 0x68, 0xFE, 0x5C, 0x76, 0x94, 0x86, 0x78, 0x8E, 0x4C, 0xBE,
    0x88, 0x66, 0x9C, 0x1E, 0xE0, 0x8E, 0x6C,
];

/// Wolf RPG ChaCha key material: 32 key bytes followed by the 12 byte nonce.
pub const WOLF_CHACHA_V1_KEY: &[u8] = &[
    0xC9, 0x82, 0xF8, 0xB4, 0x2C, 0x93, 0x9E, 0x83, 0x0E, 0xBC, 0xBC, 0x92, 0x68, 0x8D, 0x59,
    0xA1, 0x4A, 0x9E, 0x7F, 0xB0, 0xAC, 0xAF, 0x1D, 0x8F, 0x8E, 0xB8, 0x3B, 0x9E, 0xE8, 0x89,
    0xD9, 0xAD, 0xFF, 0xBC, 0x2D, 0xAB, 0x9D, 0x8B, 0x0F, 0xB4, 0xBB, 0x9A, 0x69, 0x85,
];

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{
        ChaChaCipher, ClassicCipher, ClassicParams, EntryCipher, WOLF_CHACHA_V1_KEY,
        WOLF_V2_01_KEY,
    };

    const V5_PARAMS: ClassicParams = ClassicParams {
        scale: 0,
        shift: 0,
        rotate: false,
    };

    const V6_PARAMS: ClassicParams = ClassicParams {
        scale: 2,
        shift: 5,
        rotate: true,
    };

    #[test]
    fn classic_is_involutory() {
        let cipher = ClassicCipher::derive(b"k1", V6_PARAMS);
        let original: Vec<u8> = (0..=255).collect();
        let mut buf = original.clone();
        cipher.apply_at(&mut buf, 12345);
        assert_ne!(buf, original);
        cipher.apply_at(&mut buf, 12345);
        assert_eq!(buf, original);
    }

    #[test]
    fn classic_v5_streams_the_raw_state() {
        // With scale 0, shift 0 and no rotation the keystream is the state
        // cycled from offset zero, which is what the editor's stock v5 keys
        // decrypt against.
        let cipher = ClassicCipher::from_state(WOLF_V2_01_KEY, V5_PARAMS);
        let mut buf = vec![0u8; 24];
        cipher.apply_at(&mut buf, 0);
        assert_eq!(&buf[..12], &WOLF_V2_01_KEY);
        assert_eq!(&buf[12..], &WOLF_V2_01_KEY);
    }

    #[test]
    fn classic_offset_selects_the_same_stream_position() {
        let cipher = ClassicCipher::derive(b"password", V6_PARAMS);
        let mut whole = vec![0xAAu8; 64];
        cipher.apply_at(&mut whole, 0);

        let mut tail = vec![0xAAu8; 24];
        cipher.apply_at(&mut tail, 40);
        assert_eq!(tail, whole[40..]);
    }

    #[test]
    fn chacha_is_involutory() {
        let cipher = ChaChaCipher::derive(WOLF_CHACHA_V1_KEY);
        let original = b"Hello, World! This is a test message.".to_vec();
        let mut buf = original.clone();
        cipher.apply_at(&mut buf, 1000);
        assert_ne!(buf, original);
        cipher.apply_at(&mut buf, 1000);
        assert_eq!(buf, original);
    }

    #[test]
    fn chacha_offset_selects_the_same_stream_position() {
        let cipher = ChaChaCipher::derive(WOLF_CHACHA_V1_KEY);
        // Straddle a 64 byte block boundary.
        let mut whole = vec![0u8; 200];
        cipher.apply_at(&mut whole, 0);

        let mut tail = vec![0u8; 100];
        cipher.apply_at(&mut tail, 100);
        assert_eq!(tail, whole[100..]);
    }

    #[test]
    fn chacha_short_material_is_cycled() {
        let a = ChaChaCipher::derive(b"abc");
        let b = ChaChaCipher::derive(b"abcabc");
        assert_eq!(a, b);
    }

    #[test]
    fn plain_cipher_leaves_bytes_alone() {
        let mut buf = vec![1u8, 2, 3];
        EntryCipher::Plain.apply_at(&mut buf, 99);
        assert_eq!(buf, vec![1, 2, 3]);
    }

    #[test]
    fn different_offsets_differ() {
        let cipher = ChaChaCipher::derive(WOLF_CHACHA_V1_KEY);
        let mut a = vec![0u8; 16];
        let mut b = vec![0u8; 16];
        cipher.apply_at(&mut a, 0);
        cipher.apply_at(&mut b, 64);
        assert_ne!(a, b);
    }
}
