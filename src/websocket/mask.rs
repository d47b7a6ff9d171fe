/// XOR `data` with the mask keystream starting at keystream position `offset`, returning the
/// position to continue from on the next chunk of the same frame.  Whole words are processed
/// four bytes at a time.
pub(crate) fn apply_mask(data: &mut [u8], key: [u8; 4], offset: usize) -> usize {
    let shift = offset % 4;
    let key = [
        key[shift],
        key[(shift + 1) % 4],
        key[(shift + 2) % 4],
        key[(shift + 3) % 4],
    ];
    let word = u32::from_ne_bytes(key);

    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let value = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ word;
        chunk.copy_from_slice(&value.to_ne_bytes());
    }
    for (b, k) in chunks.into_remainder().iter_mut().zip(key) {
        *b ^= k;
    }

    (offset + data.len()) % 4
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;

    const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    #[test]
    fn test_rfc_sample() {
        // "Hello" masked with 37 fa 21 3d
        let mut data = [0x7f, 0x9f, 0x4d, 0x51, 0x58];
        apply_mask(&mut data, KEY, 0);
        assert_eq!(&data, b"Hello");
    }

    #[test]
    fn test_chunked_unmask_matches_whole() {
        let plain: Vec<u8> = (0..=250u8).collect();
        let mut whole = plain.clone();
        apply_mask(&mut whole, KEY, 0);

        for split in [1usize, 3, 4, 5, 7, 64] {
            let mut pieces = plain.clone();
            let mut offset = 0;
            for chunk in pieces.chunks_mut(split) {
                offset = apply_mask(chunk, KEY, offset);
            }
            assert_eq!(pieces, whole, "split {}", split);
        }

        // masking twice restores the input
        apply_mask(&mut whole, KEY, 0);
        assert_eq!(whole, plain);
    }
}
