//! # Text Symbols
//!
//! Character-level symbol table used to turn transcripts into token ids and
//! back again for display.
//!
//! Id 0 is padding and id 1 marks the end of a sequence.

use std::collections::HashMap;
use std::sync::OnceLock;

pub const PAD: char = '_';
pub const EOS: char = '~';
pub const PAD_ID: u32 = 0;
pub const EOS_ID: u32 = 1;

const CHARACTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!'(),-.:;? ";

fn symbols() -> &'static [char] {
    static SYMBOLS: OnceLock<Vec<char>> = OnceLock::new();
    SYMBOLS.get_or_init(|| {
        let mut symbols = vec![PAD, EOS];
        symbols.extend(CHARACTERS.chars());
        symbols
    })
}

fn symbol_to_id() -> &'static HashMap<char, u32> {
    static LOOKUP: OnceLock<HashMap<char, u32>> = OnceLock::new();
    LOOKUP.get_or_init(|| {
        symbols()
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u32))
            .collect()
    })
}

/// Number of distinct symbols
pub fn vocab_size() -> usize {
    symbols().len()
}

/// Encode a transcript, skipping unknown characters and appending EOS
pub fn text_to_sequence(text: &str) -> Vec<u32> {
    let lookup = symbol_to_id();
    let mut ids: Vec<u32> = text
        .chars()
        .filter(|c| *c != PAD && *c != EOS)
        .filter_map(|c| lookup.get(&c).copied())
        .collect();
    ids.push(EOS_ID);
    ids
}

/// Decode token ids for display
///
/// Padding is dropped and decoding stops at the first EOS.
pub fn sequence_to_text(ids: &[u32]) -> String {
    let table = symbols();
    ids.iter()
        .take_while(|&&id| id != EOS_ID)
        .filter(|&&id| id != PAD_ID)
        .filter_map(|&id| table.get(id as usize))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_appends_eos() {
        let ids = text_to_sequence("Hi");
        assert_eq!(ids.len(), 3);
        assert_eq!(*ids.last().unwrap(), EOS_ID);
        assert!(ids.iter().all(|&id| (id as usize) < vocab_size()));
    }

    #[test]
    fn test_decode_recovers_text() {
        let text = "Hello, world!";
        assert_eq!(sequence_to_text(&text_to_sequence(text)), text);
    }

    #[test]
    fn test_unknown_characters_skipped() {
        assert_eq!(sequence_to_text(&text_to_sequence("a#b")), "ab");
        assert_eq!(sequence_to_text(&[5, 9999, 6]), sequence_to_text(&[5, 6]));
    }

    #[test]
    fn test_decode_stops_at_eos_and_drops_padding() {
        let mut ids = text_to_sequence("ok");
        ids.extend([PAD_ID, PAD_ID, 10]);
        assert_eq!(sequence_to_text(&ids), "ok");
        assert_eq!(sequence_to_text(&[PAD_ID, 2, PAD_ID]), "A");
    }
}
