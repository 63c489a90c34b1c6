//! Character encoding resolution for RTF codepages.
//!
//! RTF identifies byte-to-character mappings two ways: directly by Windows
//! codepage number (`\ansicpgN`, `\cpgN`) and indirectly by charset id
//! (`\fcharsetN` in the font table). This module resolves both to static
//! `encoding_rs` encodings for decoding hex-escaped and literal byte runs.

use encoding_rs::Encoding;

/// Map a Windows codepage identifier to an `encoding_rs` encoding.
///
/// Supports the codepages that appear in Outlook-generated RTF streams.
/// Returns `None` for unregistered codepages; callers treat that as a
/// validation failure or fall back along the font → `\ansicpg` → charset
/// keyword chain.
///
/// The match compiles to an efficient jump table and the returned encoding
/// references are static, so no allocation occurs.
#[inline]
pub fn codepage_to_encoding(codepage: u32) -> Option<&'static Encoding> {
    match codepage {
        // DOS codepages
        437 => Some(encoding_rs::IBM866), // IBM866 (closest available to CP437)
        850 => Some(encoding_rs::IBM866), // DOS Latin 1 (approximation)
        866 => Some(encoding_rs::IBM866), // DOS Cyrillic

        // Windows codepages (Western scripts)
        874 => Some(encoding_rs::WINDOWS_874),   // Thai
        1250 => Some(encoding_rs::WINDOWS_1250), // Central European
        1251 => Some(encoding_rs::WINDOWS_1251), // Cyrillic
        1252 => Some(encoding_rs::WINDOWS_1252), // Western European (default ANSI)
        1253 => Some(encoding_rs::WINDOWS_1253), // Greek
        1254 => Some(encoding_rs::WINDOWS_1254), // Turkish
        1255 => Some(encoding_rs::WINDOWS_1255), // Hebrew
        1256 => Some(encoding_rs::WINDOWS_1256), // Arabic
        1257 => Some(encoding_rs::WINDOWS_1257), // Baltic
        1258 => Some(encoding_rs::WINDOWS_1258), // Vietnamese

        // East Asian codepages
        932 => Some(encoding_rs::SHIFT_JIS), // Japanese Shift-JIS
        936 => Some(encoding_rs::GBK),       // Simplified Chinese (GB2312/GBK)
        949 => Some(encoding_rs::EUC_KR),    // Korean
        950 => Some(encoding_rs::BIG5),      // Traditional Chinese (Big5)
        1361 => Some(encoding_rs::EUC_KR),   // Korean Johab (approximation)
        20932 => Some(encoding_rs::EUC_JP),  // Japanese EUC-JP
        54936 => Some(encoding_rs::GB18030), // Chinese GB18030 (superset of GBK)

        // ISO 8859 series
        28591 => Some(encoding_rs::WINDOWS_1252), // ISO-8859-1 approximation
        28592 => Some(encoding_rs::ISO_8859_2),   // Latin 2 (Central European)
        28595 => Some(encoding_rs::ISO_8859_5),   // Cyrillic
        28597 => Some(encoding_rs::ISO_8859_7),   // Greek
        28605 => Some(encoding_rs::ISO_8859_15),  // Latin 9 (Western European with Euro)

        // KOI8 series
        20866 => Some(encoding_rs::KOI8_R), // KOI8-R (Russian)
        21866 => Some(encoding_rs::KOI8_U), // KOI8-U (Ukrainian)

        // Macintosh
        10000 => Some(encoding_rs::MACINTOSH),      // Mac Roman
        10007 => Some(encoding_rs::X_MAC_CYRILLIC), // Mac Cyrillic

        // Unicode
        1200 => Some(encoding_rs::UTF_16LE), // UTF-16 Little Endian
        1201 => Some(encoding_rs::UTF_16BE), // UTF-16 Big Endian
        65001 => Some(encoding_rs::UTF_8),   // UTF-8

        // Unregistered codepage
        _ => None,
    }
}

/// Map an RTF `\fcharsetN` identifier to a Windows codepage.
///
/// Per the RTF specification's charset table. `None` covers DEFAULT (1),
/// SYMBOL (2), and OEM (255), which name no byte-to-character mapping of
/// their own; fonts carrying them decode through the document-level codepage.
#[inline]
pub fn charset_to_codepage(charset: i32) -> Option<u32> {
    match charset {
        0 => Some(1252),   // ANSI
        77 => Some(10000), // Mac Roman
        128 => Some(932),  // Shift-JIS
        129 => Some(949),  // Hangul
        130 => Some(1361), // Johab
        134 => Some(936),  // GB2312
        136 => Some(950),  // Big5
        161 => Some(1253), // Greek
        162 => Some(1254), // Turkish
        163 => Some(1258), // Vietnamese
        177 => Some(1255), // Hebrew
        178 => Some(1256), // Arabic
        186 => Some(1257), // Baltic
        204 => Some(1251), // Russian
        222 => Some(874),  // Thai
        238 => Some(1250), // Eastern European
        254 => Some(437),  // PC 437
        _ => None,         // DEFAULT, SYMBOL, OEM, or unknown
    }
}
