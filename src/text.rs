//! String payload decoding for text records and font face names

use byteorder::{ByteOrder, LittleEndian};

/// Windows-1252 code points for 0x80..=0x9F; the rest of the upper half is Latin-1
const WINANSI_HIGH: [char; 32] = [
    '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž', '\u{8F}',
    '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9D}', 'ž', 'Ÿ',
];

/// Decode an ANSI (Windows-1252) string, stopping at the first NUL
pub fn decode_ansi(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| match b {
            0x80..=0x9F => WINANSI_HIGH[(b - 0x80) as usize],
            _ => b as char,
        })
        .collect()
}

/// Decode up to `max_chars` UTF-16LE code units, stopping at the first NUL
///
/// Unpaired surrogates become U+FFFD.
pub fn decode_utf16(bytes: &[u8], max_chars: usize) -> String {
    let units = bytes
        .chunks_exact(2)
        .take(max_chars)
        .map(LittleEndian::read_u16)
        .take_while(|&u| u != 0);
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
