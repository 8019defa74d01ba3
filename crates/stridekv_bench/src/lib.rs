//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::seq::SliceRandom;
use rand::Rng;
use stridekv_core::Key;

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Keys `0..count` in random order.
pub fn shuffled_keys(count: usize) -> Vec<Key> {
    let mut keys: Vec<Key> = (0..count as Key).collect();
    keys.shuffle(&mut rand::thread_rng());
    keys
}

/// Keys paired with random values of `payload_size` bytes.
pub fn generate_entries(count: usize, payload_size: usize) -> Vec<(Key, Vec<u8>)> {
    shuffled_keys(count)
        .into_iter()
        .map(|key| (key, random_data(payload_size)))
        .collect()
}

/// Packs values into one tape with their offsets and lengths.
///
/// This is the layout the strided write path consumes without copying.
pub fn pack_tape(values: &[Vec<u8>]) -> (Vec<u8>, Vec<u32>, Vec<u32>) {
    let mut tape = Vec::with_capacity(values.iter().map(Vec::len).sum());
    let mut offsets = Vec::with_capacity(values.len());
    let mut lengths = Vec::with_capacity(values.len());
    for value in values {
        offsets.push(tape.len() as u32);
        lengths.push(value.len() as u32);
        tape.extend_from_slice(value);
    }
    (tape, offsets, lengths)
}
