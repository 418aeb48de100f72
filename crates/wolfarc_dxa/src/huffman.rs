//! Canonical prefix coding for the entropy tail of v8 payloads.
//!
//! The coded blob is self delimiting: a little-endian header with the
//! uncompressed tail size and a serialized frequency table, then the
//! MSB-first code stream. Both sides derive code lengths from the table with
//! the same deterministic construction (two-queue merge, ties resolved
//! toward the leaf queue) and assign canonical codes sorted by length first,
//! symbol value ascending. Code lengths are capped at [`MAX_CODE_LEN`] bits
//! by halving the frequencies before serialization, so the stored table is
//! always the one the lengths were derived from.

use std::collections::VecDeque;

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Longest admissible canonical code.
pub const MAX_CODE_LEN: u8 = 15;

const TABLE_HEADER: usize = 6;
const TABLE_ENTRY: usize = 5;

/// Entropy-code a whole buffer.
pub fn encode(input: &[u8]) -> Vec<u8> {
    debug_assert!(input.len() <= u32::MAX as usize);

    let mut out = Vec::with_capacity(input.len() / 2 + 64);
    out.extend_from_slice(&(input.len() as u32).to_le_bytes());
    if input.is_empty() {
        out.extend_from_slice(&0u16.to_le_bytes());
        return out;
    }

    let mut freq = [0u64; 256];
    for &b in input {
        freq[b as usize] += 1;
    }
    let (scaled, lengths) = limited_lengths(&freq);

    let symbols: Vec<usize> = (0..256).filter(|&s| scaled[s] > 0).collect();
    out.extend_from_slice(&(symbols.len() as u16).to_le_bytes());
    for &s in &symbols {
        out.push(s as u8);
        out.extend_from_slice(&(scaled[s] as u32).to_le_bytes());
    }
    if symbols.len() == 1 {
        // A lone symbol needs no code stream at all.
        return out;
    }

    let codes = canonical_codes(&lengths);
    let mut bits = BitWriter::with_capacity(input.len() / 2);
    for &b in input {
        let code = codes[b as usize];
        bits.write_bits(code.bits, u32::from(code.len));
    }
    out.extend_from_slice(&bits.into_bytes());
    out
}

/// Expand a blob produced by [`encode`].
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < TABLE_HEADER {
        return Err(Error::InvalidCodeTree("table header truncated"));
    }
    let original = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let count = u16::from_le_bytes([data[4], data[5]]) as usize;
    if original == 0 {
        return if count == 0 {
            Ok(Vec::new())
        } else {
            Err(Error::InvalidCodeTree("nonempty table for an empty tail"))
        };
    }
    if count == 0 || count > 256 {
        return Err(Error::InvalidCodeTree("symbol count out of range"));
    }
    let table_end = TABLE_HEADER + count * TABLE_ENTRY;
    if data.len() < table_end {
        return Err(Error::InvalidCodeTree("frequency table truncated"));
    }

    let mut freq = [0u64; 256];
    let mut prev: i32 = -1;
    for i in 0..count {
        let at = TABLE_HEADER + i * TABLE_ENTRY;
        let sym = data[at];
        if i32::from(sym) <= prev {
            return Err(Error::InvalidCodeTree("symbols not ascending"));
        }
        prev = i32::from(sym);
        let f = u32::from_le_bytes([data[at + 1], data[at + 2], data[at + 3], data[at + 4]]);
        if f == 0 {
            return Err(Error::InvalidCodeTree("zero frequency entry"));
        }
        freq[sym as usize] = u64::from(f);
    }

    if count == 1 {
        return Ok(vec![data[TABLE_HEADER]; original]);
    }

    let (_, lengths) = limited_lengths(&freq);

    // Canonical ranges: codes of one length are contiguous, so a symbol is
    // identified by (length, code - first code of that length).
    let mut ordered: Vec<usize> = (0..256).filter(|&s| lengths[s] > 0).collect();
    ordered.sort_by_key(|&s| (lengths[s], s));
    let max = MAX_CODE_LEN as usize;
    let mut first_code = [0u32; MAX_CODE_LEN as usize + 1];
    let mut first_index = [0usize; MAX_CODE_LEN as usize + 1];
    let mut per_len = [0u32; MAX_CODE_LEN as usize + 1];
    {
        let mut code = 0u32;
        let mut prev_len = 0u8;
        for (i, &s) in ordered.iter().enumerate() {
            let len = lengths[s];
            code <<= len - prev_len;
            if per_len[len as usize] == 0 {
                first_code[len as usize] = code;
                first_index[len as usize] = i;
            }
            per_len[len as usize] += 1;
            code += 1;
            prev_len = len;
        }
    }

    let mut bits = BitReader::new(&data[table_end..]);
    let mut out = Vec::with_capacity(original);
    while out.len() < original {
        let mut code = 0u32;
        let mut len = 0usize;
        loop {
            code = (code << 1) | u32::from(bits.read_bit()?);
            len += 1;
            if len > max {
                return Err(Error::InvalidCodeTree("code exceeds the length limit"));
            }
            let n = per_len[len];
            if n > 0 && code >= first_code[len] && code < first_code[len] + n {
                let index = first_index[len] + (code - first_code[len]) as usize;
                out.push(ordered[index] as u8);
                break;
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, Default)]
struct Code {
    bits: u32,
    len: u8,
}

/// Scale frequencies until every code fits [`MAX_CODE_LEN`] bits and a u32
/// table entry, then return the scaled table with its code lengths.
fn limited_lengths(freq: &[u64; 256]) -> ([u64; 256], [u8; 256]) {
    let mut f = *freq;
    loop {
        let lengths = build_lengths(&f);
        let deepest = lengths.iter().copied().max().unwrap_or(0);
        if deepest <= MAX_CODE_LEN && f.iter().all(|&x| x <= u64::from(u32::MAX)) {
            return (f, lengths);
        }
        for x in f.iter_mut() {
            if *x > 0 {
                *x = (*x + 1) / 2;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    freq: u64,
    kids: Option<(usize, usize)>,
    symbol: u16,
}

fn pop_min(arena: &[Node], leaves: &mut VecDeque<usize>, merged: &mut VecDeque<usize>) -> usize {
    let take_leaf = match (leaves.front(), merged.front()) {
        (Some(&l), Some(&m)) => arena[l].freq <= arena[m].freq,
        (Some(_), None) => true,
        _ => false,
    };
    if take_leaf {
        leaves.pop_front().expect("leaf queue checked above")
    } else {
        merged
            .pop_front()
            .expect("both queues cannot drain while nodes remain to merge")
    }
}

/// Two-queue Huffman construction over the nonzero symbols.
fn build_lengths(freq: &[u64; 256]) -> [u8; 256] {
    let mut lengths = [0u8; 256];
    let mut leaves: Vec<(u64, usize)> = freq
        .iter()
        .enumerate()
        .filter(|(_, &f)| f > 0)
        .map(|(s, &f)| (f, s))
        .collect();
    if leaves.len() <= 1 {
        return lengths;
    }
    leaves.sort_unstable();

    let mut arena: Vec<Node> = leaves
        .iter()
        .map(|&(f, s)| Node {
            freq: f,
            kids: None,
            symbol: s as u16,
        })
        .collect();
    let mut leaf_queue: VecDeque<usize> = (0..arena.len()).collect();
    let mut merge_queue: VecDeque<usize> = VecDeque::new();

    while leaf_queue.len() + merge_queue.len() > 1 {
        let a = pop_min(&arena, &mut leaf_queue, &mut merge_queue);
        let b = pop_min(&arena, &mut leaf_queue, &mut merge_queue);
        arena.push(Node {
            freq: arena[a].freq + arena[b].freq,
            kids: Some((a, b)),
            symbol: 0,
        });
        merge_queue.push_back(arena.len() - 1);
    }

    let root = merge_queue[0];
    let mut stack = vec![(root, 0u8)];
    while let Some((idx, depth)) = stack.pop() {
        match arena[idx].kids {
            Some((a, b)) => {
                stack.push((a, depth + 1));
                stack.push((b, depth + 1));
            }
            None => lengths[arena[idx].symbol as usize] = depth,
        }
    }
    lengths
}

/// Canonical code assignment: sorted by (length, symbol), each code one more
/// than the previous, left shifted when the length grows.
fn canonical_codes(lengths: &[u8; 256]) -> [Code; 256] {
    let mut symbols: Vec<usize> = (0..256).filter(|&s| lengths[s] > 0).collect();
    symbols.sort_by_key(|&s| (lengths[s], s));

    let mut table = [Code::default(); 256];
    let mut code = 0u32;
    let mut prev_len = 0u8;
    for &s in &symbols {
        code <<= lengths[s] - prev_len;
        table[s] = Code {
            bits: code,
            len: lengths[s],
        };
        code += 1;
        prev_len = lengths[s];
    }
    table
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{build_lengths, decode, encode, limited_lengths, MAX_CODE_LEN};
    use crate::error::Error;

    #[test]
    fn roundtrip_text() {
        let input = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let blob = encode(&input);
        assert!(blob.len() < input.len());
        assert_eq!(decode(&blob).unwrap(), input);
    }

    #[test]
    fn roundtrip_empty() {
        let blob = encode(&[]);
        assert_eq!(blob, vec![0, 0, 0, 0, 0, 0]);
        assert_eq!(decode(&blob).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn roundtrip_single_symbol() {
        let input = vec![0x41u8; 5000];
        let blob = encode(&input);
        // header + one table entry, no code stream
        assert_eq!(blob.len(), 11);
        assert_eq!(decode(&blob).unwrap(), input);
    }

    #[test]
    fn roundtrip_every_byte_value() {
        let input: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let blob = encode(&input);
        assert_eq!(decode(&blob).unwrap(), input);
    }

    #[test]
    fn skewed_distribution_roundtrips() {
        let mut input = vec![b'a'; 10_000];
        input.extend_from_slice(b"bcdefgh");
        let blob = encode(&input);
        assert_eq!(decode(&blob).unwrap(), input);
    }

    #[test]
    fn fibonacci_frequencies_are_length_limited() {
        // Fibonacci counts produce a maximally skewed tree; unscaled it would
        // need one code per merge level, far past the cap.
        let mut freq = [0u64; 256];
        let (mut a, mut b) = (1u64, 1u64);
        for s in 0..24 {
            freq[s] = a;
            let next = a + b;
            a = b;
            b = next;
        }
        let unlimited = build_lengths(&freq);
        assert!(unlimited.iter().copied().max().unwrap() > MAX_CODE_LEN);

        let (scaled, limited) = limited_lengths(&freq);
        assert!(limited.iter().copied().max().unwrap() <= MAX_CODE_LEN);
        // The scaled table still covers every original symbol.
        for s in 0..24 {
            assert!(scaled[s] > 0);
        }
    }

    #[test]
    fn unsorted_table_is_rejected() {
        let mut blob = encode(b"abcabcabc");
        // Swap the first two symbol slots so they are no longer ascending.
        blob.swap(6, 11);
        assert!(matches!(decode(&blob), Err(Error::InvalidCodeTree(_))));
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let mut blob = encode(b"abcabcabc");
        blob[7..11].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(decode(&blob), Err(Error::InvalidCodeTree(_))));
    }

    #[test]
    fn truncated_stream_is_detected() {
        let input = b"some text that is long enough to span several bytes".to_vec();
        let blob = encode(&input);
        let cut = &blob[..blob.len() - 2];
        assert!(matches!(decode(cut), Err(Error::TruncatedStream)));
    }
}
