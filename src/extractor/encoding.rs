//! Mojibake repair for double-decoded UTF-8 text (bytes misread as
//! cp1252 and re-encoded). A flat, ordered search-and-replace: each
//! pattern is the cp1252 rendering of the target's UTF-8 bytes, with
//! the 0x80..0x9F range going through the Windows-1252 table (the five
//! unmapped bytes surface as C1 controls). Order matters: the bare `Â`
//! rule must run after every two-character `Â` pattern.

/// (mojibake, repaired) pairs, applied in order. Entries with
/// invisible second bytes (NBSP, soft hyphen, C1 controls) are written
/// as escapes.
const REPLACEMENTS: &[(&str, &str)] = &[
    ("â€™", "’"),
    ("â‚¬", "€"),
    ("â€š", "‚"),
    ("â€ž", "„"),
    ("â€¦", "…"),
    ("â€°", "‰"),
    ("â€¹", "‹"),
    ("â€˜", "‘"),
    ("â€œ", "“"),
    ("â€¢", "•"),
    ("â€“", "–"),
    ("â€”", "—"),
    ("â„¢", "™"),
    ("â€º", "›"),
    ("Ë†", "ˆ"),
    ("â€\u{a0}", "†"),
    ("Æ’", "ƒ"),
    ("Å’", "Œ"),
    ("Å½", "Ž"),
    ("â€\u{9d}", "”"),
    ("Ëœ", "˜"),
    ("Å“", "œ"),
    ("Å¾", "ž"),
    ("Å¸", "Ÿ"),
    ("Å¡", "š"),
    ("Â¡", "¡"),
    ("Â¢", "¢"),
    ("Â£", "£"),
    ("Â¤", "¤"),
    ("Â¥", "¥"),
    ("Â¦", "¦"),
    ("Â§", "§"),
    ("Â¨", "¨"),
    ("Â©", "©"),
    ("Âª", "ª"),
    ("Â«", "«"),
    ("Â¬", "¬"),
    ("Â\u{ad}", " "),
    ("Â®", "®"),
    ("Â¯", "¯"),
    ("Â°", "°"),
    ("Â±", "±"),
    ("Â²", "²"),
    ("Â³", "³"),
    ("Â´", "´"),
    ("Âµ", "µ"),
    ("Â¶", "¶"),
    ("Â·", "·"),
    ("Â¸", "¸"),
    ("Â¹", "¹"),
    ("Âº", "º"),
    ("Â»", "»"),
    ("Â¼", "¼"),
    ("Â½", "½"),
    ("Â¾", "¾"),
    ("Â¿", "¿"),
    ("ÃŽ", "Î"),
    ("Ã\u{8f}", "Ï"),
    ("Ã\u{90}", "Ð"),
    ("Ã‘", "Ñ"),
    ("Ã’", "Ò"),
    ("Ã“", "Ó"),
    ("Ã”", "Ô"),
    ("Ã•", "Õ"),
    ("Ã–", "Ö"),
    ("Ã—", "×"),
    ("Ã˜", "Ø"),
    ("Ã™", "Ù"),
    ("Ãš", "Ú"),
    ("Ã›", "Û"),
    ("Ãœ", "Ü"),
    ("Ã\u{9d}", "Ý"),
    ("Ãž", "Þ"),
    ("ÃŸ", "ß"),
    ("Ã\u{a0}", "à"),
    ("Ã¡", "á"),
    ("Ã¢", "â"),
    ("Ã£", "ã"),
    ("Ã¤", "ä"),
    ("Ã¥", "å"),
    ("Ã¦", "æ"),
    ("Ã§", "ç"),
    ("Ã¨", "è"),
    ("Ã©", "é"),
    ("Ãª", "ê"),
    ("Ã«", "ë"),
    ("Ã¬", "ì"),
    ("Ã\u{ad}", "í"),
    ("Ã®", "î"),
    ("Ã¯", "ï"),
    ("Ã°", "ð"),
    ("Ã±", "ñ"),
    ("Ã²", "ò"),
    ("Ã³", "ó"),
    ("Ã´", "ô"),
    ("Ãµ", "õ"),
    ("Ã¶", "ö"),
    ("Ã·", "÷"),
    ("Ã¸", "ø"),
    ("Ã¹", "ù"),
    ("Ãº", "ú"),
    ("Ã»", "û"),
    ("Ã¼", "ü"),
    ("Ã½", "ý"),
    ("Ã¾", "þ"),
    ("Ã¿", "ÿ"),
    ("Ã€", "À"),
    ("Ã\u{81}", "Á"),
    ("Ã‚", "Â"),
    ("Ãƒ", "Ã"),
    ("Ã„", "Ä"),
    ("Ã…", "Å"),
    ("Ã†", "Æ"),
    ("Ã‡", "Ç"),
    ("Ãˆ", "È"),
    ("Ã‰", "É"),
    ("ÃŠ", "Ê"),
    ("Ã‹", "Ë"),
    ("ÃŒ", "Ì"),
    // Stray lead bytes last, once every two-character pattern has run.
    ("Â", ""),
    ("Å\u{a0}", "Š"),
    ("Ã\u{8d}", "Í"),
];

/// Reverse double-decoded UTF-8 in `text`. Clean text passes through
/// with a single allocation and no replacements.
pub fn repair_mojibake(text: &str) -> String {
    let mut result = text.to_string();
    for (bad, good) in REPLACEMENTS {
        if result.contains(bad) {
            result = result.replace(bad, good);
        }
    }
    result
}
