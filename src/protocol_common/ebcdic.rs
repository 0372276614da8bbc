//! EBCDIC codepage tables
//!
//! Each supported CCSID is a fixed 256-entry table built once into a
//! process-wide registry. National variants of CCSID 37 are expressed as the
//! positions where they differ from it, plus the positions they leave
//! undefined; the Euro variants (114x) add U+20AC at 0x9F on top of their base
//! table. CCSID 930 carries its single-byte plane only, so SO/SI are rejected.
//!
//! Conversions never substitute a replacement character. A byte or character
//! without a mapping is a [`CharacterConversionError`] and the caller decides
//! what to do with it.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::CharacterConversionError;

/// CCSID 37 (US/Canada), byte to Unicode
const CP037: [char; 256] = [
    // 0x00-0x0F: Control characters
    '\x00', '\x01', '\x02', '\x03', '\u{009C}', '\t', '\u{0086}', '\x7F',
    '\u{0097}', '\u{008D}', '\u{008E}', '\x0B', '\x0C', '\r', '\x0E', '\x0F',
    // 0x10-0x1F
    '\x10', '\x11', '\x12', '\x13', '\u{009D}', '\u{0085}', '\x08', '\u{0087}',
    '\x18', '\x19', '\u{0092}', '\u{008F}', '\x1C', '\x1D', '\x1E', '\x1F',
    // 0x20-0x2F
    '\u{0080}', '\u{0081}', '\u{0082}', '\u{0083}', '\u{0084}', '\n', '\x17', '\x1B',
    '\u{0088}', '\u{0089}', '\u{008A}', '\u{008B}', '\u{008C}', '\x05', '\x06', '\x07',
    // 0x30-0x3F
    '\u{0090}', '\u{0091}', '\x16', '\u{0093}', '\u{0094}', '\u{0095}', '\u{0096}', '\x04',
    '\u{0098}', '\u{0099}', '\u{009A}', '\u{009B}', '\x14', '\x15', '\u{009E}', '\x1A',
    // 0x40-0x4F
    ' ', '\u{00A0}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E1}', '\u{00E3}', '\u{00E5}',
    '\u{00E7}', '\u{00F1}', '\u{00A2}', '.', '<', '(', '+', '|',
    // 0x50-0x5F
    '&', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{00EC}', '\u{00DF}', '!', '$', '*', ')', ';', '\u{00AC}',
    // 0x60-0x6F
    '-', '/', '\u{00C2}', '\u{00C4}', '\u{00C0}', '\u{00C1}', '\u{00C3}', '\u{00C5}',
    '\u{00C7}', '\u{00D1}', '\u{00A6}', ',', '%', '_', '>', '?',
    // 0x70-0x7F
    '\u{00F8}', '\u{00C9}', '\u{00CA}', '\u{00CB}', '\u{00C8}', '\u{00CD}', '\u{00CE}', '\u{00CF}',
    '\u{00CC}', '`', ':', '#', '@', '\'', '=', '"',
    // 0x80-0x8F
    '\u{00D8}', 'a', 'b', 'c', 'd', 'e', 'f', 'g',
    'h', 'i', '\u{00AB}', '\u{00BB}', '\u{00F0}', '\u{00FD}', '\u{00FE}', '\u{00B1}',
    // 0x90-0x9F
    '\u{00B0}', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
    'q', 'r', '\u{00AA}', '\u{00BA}', '\u{00E6}', '\u{00B8}', '\u{00C6}', '\u{00A4}',
    // 0xA0-0xAF
    '\u{00B5}', '~', 's', 't', 'u', 'v', 'w', 'x',
    'y', 'z', '\u{00A1}', '\u{00BF}', '\u{00D0}', '\u{00DD}', '\u{00DE}', '\u{00AE}',
    // 0xB0-0xBF
    '^', '\u{00A3}', '\u{00A5}', '\u{00B7}', '\u{00A9}', '\u{00A7}', '\u{00B6}', '\u{00BC}',
    '\u{00BD}', '\u{00BE}', '[', ']', '\u{00AF}', '\u{00A8}', '\u{00B4}', '\u{00D7}',
    // 0xC0-0xCF
    '{', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', '\u{00AD}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00F3}', '\u{00F5}',
    // 0xD0-0xDF
    '}', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'Q', 'R', '\u{00B9}', '\u{00FB}', '\u{00FC}', '\u{00F9}', '\u{00FA}', '\u{00FF}',
    // 0xE0-0xEF
    '\\', '\u{00F7}', 'S', 'T', 'U', 'V', 'W', 'X',
    'Y', 'Z', '\u{00B2}', '\u{00D4}', '\u{00D6}', '\u{00D2}', '\u{00D3}', '\u{00D5}',
    // 0xF0-0xFF
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '\u{00B3}', '\u{00DB}', '\u{00DC}', '\u{00D9}', '\u{00DA}', '\u{009F}',
];

/// CCSID 273 (Germany/Austria)
const CP273_DIFF: &[(u8, char)] = &[
    (0x43, '{'), (0x4A, 'Ä'), (0x4F, '!'), (0x59, '~'), (0x5A, 'Ü'), (0x5F, '^'),
    (0x63, '['), (0x6A, 'ö'), (0x7C, '§'), (0xA1, 'ß'), (0xB0, '¢'), (0xB5, '@'),
    (0xBA, '¬'), (0xBB, '|'), (0xC0, 'ä'), (0xCC, '¦'), (0xD0, 'ü'), (0xDC, '}'),
    (0xE0, 'Ö'), (0xEC, '\\'), (0xFC, ']'),
];

/// CCSID 280 (Italy)
const CP280_DIFF: &[(u8, char)] = &[
    (0x44, '{'), (0x48, '\\'), (0x4A, '°'), (0x4F, '!'), (0x51, ']'), (0x54, '}'),
    (0x58, '~'), (0x5A, 'é'), (0x5F, '^'), (0x6A, 'ò'), (0x79, 'ù'), (0x7B, '£'),
    (0x7C, '§'), (0x90, '['), (0xA1, 'ì'), (0xB0, '¢'), (0xB1, '#'), (0xB5, '@'),
    (0xBA, '¬'), (0xBB, '|'), (0xC0, 'à'), (0xCD, '¦'), (0xD0, 'è'), (0xDD, '`'),
    (0xE0, 'ç'),
];

/// CCSID 284 (Spain/Latin America)
const CP284_DIFF: &[(u8, char)] = &[
    (0x49, '¦'), (0x4A, '['), (0x5A, ']'), (0x69, '#'), (0x6A, 'ñ'), (0x7B, 'Ñ'),
    (0xA1, '¨'), (0xB0, '¢'), (0xBA, '^'), (0xBB, '!'), (0xBD, '~'),
];

/// CCSID 297 (France)
const CP297_DIFF: &[(u8, char)] = &[
    (0x44, '@'), (0x48, '\\'), (0x4A, '°'), (0x4F, '!'), (0x51, '{'), (0x54, '}'),
    (0x5A, '§'), (0x5F, '^'), (0x6A, 'ù'), (0x79, 'µ'), (0x7B, '£'), (0x7C, 'à'),
    (0x90, '['), (0xA0, '`'), (0xA1, '¨'), (0xB0, '¢'), (0xB1, '#'), (0xB5, ']'),
    (0xBA, '¬'), (0xBB, '|'), (0xBD, '~'), (0xC0, 'é'), (0xD0, 'è'), (0xDD, '¦'),
    (0xE0, 'ç'),
];

/// CCSID 500 (International Latin-1)
const CP500_DIFF: &[(u8, char)] = &[
    (0x4A, '['), (0x4F, '!'), (0x5A, ']'), (0x5F, '^'), (0xB0, '¢'), (0xBA, '¬'),
    (0xBB, '|'),
];

/// CCSID 277 (Denmark, Norway)
const CP277_DIFF: &[(u8, char)] = &[
    (0x47, '}'), (0x4A, '#'), (0x4F, '!'), (0x5A, '¤'), (0x5B, 'Å'), (0x5F, '^'),
    (0x67, '$'), (0x6A, 'ø'), (0x70, '¦'), (0x7B, 'Æ'), (0x7C, 'Ø'), (0x80, '@'),
    (0x9C, '{'), (0x9E, '['), (0x9F, ']'), (0xA1, 'ü'), (0xB0, '¢'), (0xBA, '¬'),
    (0xBB, '|'), (0xC0, 'æ'), (0xD0, 'å'), (0xDC, '~'),
];

/// CCSID 278 (Finland, Sweden)
const CP278_DIFF: &[(u8, char)] = &[
    (0x43, '{'), (0x47, '}'), (0x4A, '§'), (0x4F, '!'), (0x51, '`'), (0x5A, '¤'),
    (0x5B, 'Å'), (0x5F, '^'), (0x63, '#'), (0x67, '$'), (0x6A, 'ö'), (0x79, 'é'),
    (0x7B, 'Ä'), (0x7C, 'Ö'), (0x9F, ']'), (0xA1, 'ü'), (0xB0, '¢'), (0xB5, '['),
    (0xBA, '¬'), (0xBB, '|'), (0xC0, 'ä'), (0xCC, '¦'), (0xD0, 'å'), (0xDC, '~'),
    (0xEC, '@'),
];

/// CCSID 285 (United Kingdom)
const CP285_DIFF: &[(u8, char)] = &[
    (0x4A, '$'), (0x5B, '£'), (0xA1, '‾'), (0xB0, '¢'), (0xB1, '['), (0xBA, '^'),
    (0xBC, '~'),
];

/// CCSID 871 (Iceland)
const CP871_DIFF: &[(u8, char)] = &[
    (0x4A, 'þ'), (0x4F, '!'), (0x5A, 'Æ'), (0x5F, 'Ö'), (0x79, 'ð'), (0x7C, 'Ð'),
    (0x8C, '`'), (0x8E, '{'), (0x9C, '}'), (0x9E, ']'), (0xA1, 'ö'), (0xAC, '@'),
    (0xAE, '['), (0xB0, '¢'), (0xBA, '¬'), (0xBB, '|'), (0xBE, '\\'), (0xC0, 'Þ'),
    (0xCC, '~'), (0xD0, 'æ'), (0xE0, '´'), (0xEC, '^'),
];

/// CCSID 1026 (Turkey Latin-5)
const CP1026_DIFF: &[(u8, char)] = &[
    (0x48, '{'), (0x4A, 'Ç'), (0x4F, '!'), (0x5A, 'Ğ'), (0x5B, 'İ'), (0x5F, '^'),
    (0x68, '['), (0x6A, 'ş'), (0x79, 'ı'), (0x7B, 'Ö'), (0x7C, 'Ş'), (0x7F, 'Ü'),
    (0x8C, '}'), (0x8D, '`'), (0x8E, '¦'), (0x9D, '˛'), (0xA1, 'ö'), (0xAC, ']'),
    (0xAD, '$'), (0xAE, '@'), (0xB0, '¢'), (0xBA, '¬'), (0xBB, '|'), (0xBC, '\u{2014}'),
    (0xC0, 'ç'), (0xCC, '~'), (0xD0, 'ğ'), (0xDC, '\\'), (0xE0, 'ü'), (0xEC, '#'),
    (0xFC, '"'),
];

/// CCSID 870 (Latin-2 multilingual)
const CP870_DIFF: &[(u8, char)] = &[
    (0x44, 'ţ'), (0x46, 'ă'), (0x47, 'č'), (0x49, 'ć'), (0x4A, '['), (0x4F, '!'),
    (0x52, 'ę'), (0x54, 'ů'), (0x57, 'ľ'), (0x58, 'ĺ'), (0x5A, ']'), (0x5F, '^'),
    (0x64, '˝'), (0x66, 'Ă'), (0x67, 'Č'), (0x69, 'Ć'), (0x6A, '|'), (0x70, 'ˇ'),
    (0x72, 'Ę'), (0x74, 'Ů'), (0x77, 'Ľ'), (0x78, 'Ĺ'), (0x80, '˘'), (0x8A, 'ś'),
    (0x8B, 'ň'), (0x8C, 'đ'), (0x8E, 'ř'), (0x8F, 'ş'), (0x9A, 'ł'), (0x9B, 'ń'),
    (0x9C, 'š'), (0x9E, '˛'), (0xA0, 'ą'), (0xAA, 'Ś'), (0xAB, 'Ň'), (0xAC, 'Đ'),
    (0xAE, 'Ř'), (0xAF, 'Ş'), (0xB0, '·'), (0xB1, 'Ą'), (0xB2, 'ż'), (0xB3, 'Ţ'),
    (0xB4, 'Ż'), (0xB6, 'ž'), (0xB7, 'ź'), (0xB8, 'Ž'), (0xB9, 'Ź'), (0xBA, 'Ł'),
    (0xBB, 'Ń'), (0xBC, 'Š'), (0xCD, 'ŕ'), (0xCF, 'ő'), (0xDA, 'Ě'), (0xDB, 'ű'),
    (0xDD, 'ť'), (0xDF, 'ě'), (0xEA, 'ď'), (0xED, 'Ŕ'), (0xEF, 'Ő'), (0xFA, 'Ď'),
    (0xFB, 'Ű'), (0xFD, 'Ť'),
];

/// CCSID 1112 (Baltic)
const CP1112_DIFF: &[(u8, char)] = &[
    (0x42, 'š'), (0x44, 'ą'), (0x45, 'į'), (0x46, 'ū'), (0x48, 'ē'), (0x49, 'ž'),
    (0x52, 'ę'), (0x53, 'ė'), (0x54, 'č'), (0x55, 'ų'), (0x56, '„'), (0x57, '“'),
    (0x58, 'ģ'), (0x62, 'Š'), (0x64, 'Ą'), (0x65, 'Į'), (0x66, 'Ū'), (0x68, 'Ē'),
    (0x69, 'Ž'), (0x72, 'Ę'), (0x73, 'Ė'), (0x74, 'Č'), (0x75, 'Ų'), (0x76, 'Ī'),
    (0x77, 'Ļ'), (0x78, 'Ģ'), (0x8C, 'ā'), (0x8D, 'ż'), (0x8E, 'ń'), (0x9A, 'Ŗ'),
    (0x9B, 'ŗ'), (0x9D, 'ķ'), (0xAA, '”'), (0xAB, 'ź'), (0xAC, 'Ā'), (0xAD, 'Ż'),
    (0xAE, 'Ń'), (0xB2, 'ī'), (0xBC, 'Ź'), (0xBD, 'Ķ'), (0xBE, 'ļ'), (0xCB, 'ō'),
    (0xCD, 'ņ'), (0xDB, 'ć'), (0xDD, 'ł'), (0xDE, 'ś'), (0xDF, '’'), (0xEB, 'Ō'),
    (0xED, 'Ņ'), (0xFB, 'Ć'), (0xFD, 'Ł'), (0xFE, 'Ś'),
];

/// CCSID 424 (Hebrew)
const CP424_DIFF: &[(u8, char)] = &[
    (0x41, 'א'), (0x42, 'ב'), (0x43, 'ג'), (0x44, 'ד'), (0x45, 'ה'), (0x46, 'ו'),
    (0x47, 'ז'), (0x48, 'ח'), (0x49, 'ט'), (0x51, 'י'), (0x52, 'ך'), (0x53, 'כ'),
    (0x54, 'ל'), (0x55, 'ם'), (0x56, 'מ'), (0x57, 'ן'), (0x58, 'נ'), (0x59, 'ס'),
    (0x62, 'ע'), (0x63, 'ף'), (0x64, 'פ'), (0x65, 'ץ'), (0x66, 'צ'), (0x67, 'ק'),
    (0x68, 'ר'), (0x69, 'ש'), (0x71, 'ת'), (0x74, '\u{00A0}'), (0x78, '⇔'),
];

/// Positions left undefined in CCSID 424
const CP424_UNDEFINED: &[u8] = &[
    0x70, 0x72, 0x73, 0x75, 0x76, 0x77, 0x80, 0x8C, 0x8D, 0x8E, 0x8F, 0x9A,
    0x9B, 0x9C, 0x9E, 0xAA, 0xAB, 0xAC, 0xAD, 0xAE, 0xCB, 0xCC, 0xCD, 0xCE,
    0xCF, 0xDB, 0xDC, 0xDD, 0xDE, 0xDF, 0xEB, 0xEC, 0xED, 0xEE, 0xEF, 0xFB,
    0xFC, 0xFD, 0xFE,
];

/// CCSID 875 (Greek)
const CP875_DIFF: &[(u8, char)] = &[
    (0x41, 'Α'), (0x42, 'Β'), (0x43, 'Γ'), (0x44, 'Δ'), (0x45, 'Ε'), (0x46, 'Ζ'),
    (0x47, 'Η'), (0x48, 'Θ'), (0x49, 'Ι'), (0x4A, '['), (0x4F, '!'), (0x51, 'Κ'),
    (0x52, 'Λ'), (0x53, 'Μ'), (0x54, 'Ν'), (0x55, 'Ξ'), (0x56, 'Ο'), (0x57, 'Π'),
    (0x58, 'Ρ'), (0x59, 'Σ'), (0x5A, ']'), (0x5F, '^'), (0x62, 'Τ'), (0x63, 'Υ'),
    (0x64, 'Φ'), (0x65, 'Χ'), (0x66, 'Ψ'), (0x67, 'Ω'), (0x68, 'Ϊ'), (0x69, 'Ϋ'),
    (0x70, '¨'), (0x71, 'Ά'), (0x72, 'Έ'), (0x73, 'Ή'), (0x74, '∇'), (0x75, 'Ί'),
    (0x76, 'Ό'), (0x77, 'Ύ'), (0x78, 'Ώ'), (0x80, '΅'), (0x8A, 'α'), (0x8B, 'β'),
    (0x8C, 'γ'), (0x8D, 'δ'), (0x8E, 'ε'), (0x8F, 'ζ'), (0x9A, 'η'), (0x9B, 'θ'),
    (0x9C, 'ι'), (0x9D, 'κ'), (0x9E, 'λ'), (0x9F, 'μ'), (0xA0, '´'), (0xAA, 'ν'),
    (0xAB, 'ξ'), (0xAC, 'ο'), (0xAD, 'π'), (0xAE, 'ρ'), (0xAF, 'σ'), (0xB0, '£'),
    (0xB1, 'ά'), (0xB2, 'έ'), (0xB3, 'ή'), (0xB4, 'ϊ'), (0xB5, 'ί'), (0xB6, 'ό'),
    (0xB7, 'ύ'), (0xB8, 'ϋ'), (0xB9, 'ώ'), (0xBA, 'ς'), (0xBB, 'τ'), (0xBC, 'υ'),
    (0xBD, 'φ'), (0xBE, 'χ'), (0xBF, 'ψ'), (0xCB, 'ω'), (0xCC, 'ΐ'), (0xCD, 'ΰ'),
    (0xCE, '‘'), (0xCF, '―'), (0xDA, '±'), (0xDB, '½'), (0xDD, '·'), (0xDE, '’'),
    (0xDF, '¦'), (0xEB, '§'), (0xEE, '«'), (0xEF, '¬'), (0xFB, '©'), (0xFE, '»'),
];

const CP875_UNDEFINED: &[u8] = &[
    0x6A, 0xDC, 0xE1, 0xEC, 0xED, 0xFC, 0xFD,
];

/// CCSID 1025 (Cyrillic multilingual)
const CP1025_DIFF: &[(u8, char)] = &[
    (0x42, 'ђ'), (0x43, 'ѓ'), (0x44, 'ё'), (0x45, 'є'), (0x46, 'ѕ'), (0x47, 'і'),
    (0x48, 'ї'), (0x49, 'ј'), (0x4A, '['), (0x4F, '!'), (0x51, 'љ'), (0x52, 'њ'),
    (0x53, 'ћ'), (0x54, 'ќ'), (0x55, 'ў'), (0x56, 'џ'), (0x57, 'Ъ'), (0x58, '№'),
    (0x59, 'Ђ'), (0x5A, ']'), (0x5F, '^'), (0x62, 'Ѓ'), (0x63, 'Ё'), (0x64, 'Є'),
    (0x65, 'Ѕ'), (0x66, 'І'), (0x67, 'Ї'), (0x68, 'Ј'), (0x69, 'Љ'), (0x6A, '|'),
    (0x70, 'Њ'), (0x71, 'Ћ'), (0x72, 'Ќ'), (0x73, '\u{00AD}'), (0x74, 'Ў'), (0x75, 'Џ'),
    (0x76, 'ю'), (0x77, 'а'), (0x78, 'б'), (0x80, 'ц'), (0x8A, 'д'), (0x8B, 'е'),
    (0x8C, 'ф'), (0x8D, 'г'), (0x8E, 'х'), (0x8F, 'и'), (0x90, 'й'), (0x9A, 'к'),
    (0x9B, 'л'), (0x9C, 'м'), (0x9D, 'н'), (0x9E, 'о'), (0x9F, 'п'), (0xA0, 'я'),
    (0xAA, 'р'), (0xAB, 'с'), (0xAC, 'т'), (0xAD, 'у'), (0xAE, 'ж'), (0xAF, 'в'),
    (0xB0, 'ь'), (0xB1, 'ы'), (0xB2, 'з'), (0xB3, 'ш'), (0xB4, 'э'), (0xB5, 'щ'),
    (0xB6, 'ч'), (0xB7, 'ъ'), (0xB8, 'Ю'), (0xB9, 'А'), (0xBA, 'Б'), (0xBB, 'Ц'),
    (0xBC, 'Д'), (0xBD, 'Е'), (0xBE, 'Ф'), (0xBF, 'Г'), (0xCA, 'Х'), (0xCB, 'И'),
    (0xCC, 'Й'), (0xCD, 'К'), (0xCE, 'Л'), (0xCF, 'М'), (0xDA, 'Н'), (0xDB, 'О'),
    (0xDC, 'П'), (0xDD, 'Я'), (0xDE, 'Р'), (0xDF, 'С'), (0xE1, '§'), (0xEA, 'Т'),
    (0xEB, 'У'), (0xEC, 'Ж'), (0xED, 'В'), (0xEE, 'Ь'), (0xEF, 'Ы'), (0xFA, 'З'),
    (0xFB, 'Ш'), (0xFC, 'Э'), (0xFD, 'Щ'), (0xFE, 'Ч'),
];

const EURO: &[(u8, char)] = &[(0x9F, '€')];

/// Single-byte plane of CCSID 930 (Japanese Katakana extended). Positions not
/// listed here are undefined.
const CP930_SBCS: &[(u8, char)] = &[
    (0x40, ' '),
    (0x41, '\u{FF61}'), (0x42, '\u{FF62}'), (0x43, '\u{FF63}'), (0x44, '\u{FF64}'),
    (0x45, '\u{FF65}'), (0x46, '\u{FF66}'), (0x47, '\u{FF67}'), (0x48, '\u{FF68}'),
    (0x49, '\u{FF69}'), (0x4A, '£'), (0x4B, '.'), (0x4C, '<'), (0x4D, '('),
    (0x4E, '+'), (0x4F, '|'),
    (0x50, '&'), (0x51, '\u{FF6A}'), (0x52, '\u{FF6B}'), (0x53, '\u{FF6C}'),
    (0x54, '\u{FF6D}'), (0x55, '\u{FF6E}'), (0x56, '\u{FF6F}'), (0x58, '\u{FF70}'),
    (0x5A, '!'), (0x5B, '¥'), (0x5C, '*'), (0x5D, ')'), (0x5E, ';'), (0x5F, '¬'),
    (0x60, '-'), (0x61, '/'), (0x62, 'a'), (0x63, 'b'), (0x64, 'c'), (0x65, 'd'),
    (0x66, 'e'), (0x67, 'f'), (0x68, 'g'), (0x69, 'h'), (0x6B, ','), (0x6C, '%'),
    (0x6D, '_'), (0x6E, '>'), (0x6F, '?'),
    (0x70, '['), (0x71, 'i'), (0x72, 'j'), (0x73, 'k'), (0x74, 'l'), (0x75, 'm'),
    (0x76, 'n'), (0x77, 'o'), (0x78, 'p'), (0x79, '`'), (0x7A, ':'), (0x7B, '#'),
    (0x7C, '@'), (0x7D, '\''), (0x7E, '='), (0x7F, '"'),
    (0x80, ']'), (0x81, '\u{FF71}'), (0x82, '\u{FF72}'), (0x83, '\u{FF73}'),
    (0x84, '\u{FF74}'), (0x85, '\u{FF75}'), (0x86, '\u{FF76}'), (0x87, '\u{FF77}'),
    (0x88, '\u{FF78}'), (0x89, '\u{FF79}'), (0x8A, '\u{FF7A}'), (0x8B, 'q'),
    (0x8C, '\u{FF7B}'), (0x8D, '\u{FF7C}'), (0x8E, '\u{FF7D}'), (0x8F, '\u{FF7E}'),
    (0x90, '\u{FF7F}'), (0x91, '\u{FF80}'), (0x92, '\u{FF81}'), (0x93, '\u{FF82}'),
    (0x94, '\u{FF83}'), (0x95, '\u{FF84}'), (0x96, '\u{FF85}'), (0x97, '\u{FF86}'),
    (0x98, '\u{FF87}'), (0x99, '\u{FF88}'), (0x9A, '\u{FF89}'), (0x9B, 'r'),
    (0x9D, '\u{FF8A}'), (0x9E, '\u{FF8B}'), (0x9F, '\u{FF8C}'),
    (0xA0, '~'), (0xA1, '\u{203E}'), (0xA2, '\u{FF8D}'), (0xA3, '\u{FF8E}'),
    (0xA4, '\u{FF8F}'), (0xA5, '\u{FF90}'), (0xA6, '\u{FF91}'), (0xA7, '\u{FF92}'),
    (0xA8, '\u{FF93}'), (0xA9, '\u{FF94}'), (0xAA, '\u{FF95}'), (0xAB, 's'),
    (0xAC, '\u{FF96}'), (0xAD, '\u{FF97}'), (0xAE, '\u{FF98}'), (0xAF, '\u{FF99}'),
    (0xB0, '^'), (0xB3, 't'), (0xB4, 'u'), (0xB5, 'v'), (0xB6, 'w'), (0xB7, 'x'),
    (0xB8, 'y'), (0xB9, 'z'), (0xBA, '\u{FF9A}'), (0xBB, '\u{FF9B}'),
    (0xBC, '\u{FF9C}'), (0xBD, '\u{FF9D}'), (0xBE, '\u{FF9E}'), (0xBF, '\u{FF9F}'),
    (0xC0, '{'), (0xC1, 'A'), (0xC2, 'B'), (0xC3, 'C'), (0xC4, 'D'), (0xC5, 'E'),
    (0xC6, 'F'), (0xC7, 'G'), (0xC8, 'H'), (0xC9, 'I'),
    (0xD0, '}'), (0xD1, 'J'), (0xD2, 'K'), (0xD3, 'L'), (0xD4, 'M'), (0xD5, 'N'),
    (0xD6, 'O'), (0xD7, 'P'), (0xD8, 'Q'), (0xD9, 'R'),
    (0xE0, '$'), (0xE2, 'S'), (0xE3, 'T'), (0xE4, 'U'), (0xE5, 'V'), (0xE6, 'W'),
    (0xE7, 'X'), (0xE8, 'Y'), (0xE9, 'Z'),
    (0xF0, '0'), (0xF1, '1'), (0xF2, '2'), (0xF3, '3'), (0xF4, '4'), (0xF5, '5'),
    (0xF6, '6'), (0xF7, '7'), (0xF8, '8'), (0xF9, '9'),
];

/// Shift-out: following bytes are double-byte characters
pub const SHIFT_OUT: u8 = 0x0E;
/// Shift-in: back to single-byte characters
pub const SHIFT_IN: u8 = 0x0F;

/// One EBCDIC code page
#[derive(Debug)]
pub struct CodePage {
    ccsid: u16,
    description: &'static str,
    to_unicode: [Option<char>; 256],
    to_ebcdic: HashMap<char, u8>,
    /// SO/SI switch to a double-byte plane this table does not carry
    double_byte: bool,
}

impl CodePage {
    fn from_table(ccsid: u16, description: &'static str, table: [Option<char>; 256]) -> Self {
        let mut to_ebcdic = HashMap::with_capacity(256);
        for (byte, entry) in table.iter().enumerate() {
            if let Some(ch) = entry {
                // First position wins when a table repeats a character
                to_ebcdic.entry(*ch).or_insert(byte as u8);
            }
        }
        Self { ccsid, description, to_unicode: table, to_ebcdic, double_byte: false }
    }

    fn latin(ccsid: u16, description: &'static str, overlays: &[&[(u8, char)]]) -> Self {
        Self::derived(ccsid, description, overlays, &[])
    }

    /// CCSID 37 with `overlays` applied and `undefined` positions removed
    fn derived(ccsid: u16, description: &'static str, overlays: &[&[(u8, char)]], undefined: &[u8]) -> Self {
        let mut table = CP037.map(Some);
        for overlay in overlays {
            for &(byte, ch) in overlay.iter() {
                table[byte as usize] = Some(ch);
            }
        }
        for &byte in undefined {
            table[byte as usize] = None;
        }
        Self::from_table(ccsid, description, table)
    }

    fn katakana(ccsid: u16, description: &'static str) -> Self {
        let mut table = [None; 256];
        // Controls are shared with the Latin pages
        for byte in 0x00..0x40 {
            table[byte] = Some(CP037[byte]);
        }
        table[SHIFT_OUT as usize] = None;
        table[SHIFT_IN as usize] = None;
        for &(byte, ch) in CP930_SBCS {
            table[byte as usize] = Some(ch);
        }
        Self { double_byte: true, ..Self::from_table(ccsid, description, table) }
    }

    /// Look up a built-in code page
    pub fn for_ccsid(ccsid: u16) -> Result<&'static CodePage, CharacterConversionError> {
        REGISTRY
            .get(&ccsid)
            .ok_or(CharacterConversionError::UnsupportedCcsid { ccsid })
    }

    pub fn ccsid(&self) -> u16 {
        self.ccsid
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Whether SO/SI are reserved for a double-byte plane. Only the
    /// single-byte plane of such pages is available.
    pub fn is_double_byte(&self) -> bool {
        self.double_byte
    }

    /// Convert one EBCDIC byte
    pub fn to_unicode(&self, byte: u8) -> Result<char, CharacterConversionError> {
        if self.double_byte && (byte == SHIFT_OUT || byte == SHIFT_IN) {
            return Err(CharacterConversionError::DoubleByteUnsupported { ccsid: self.ccsid, byte });
        }
        self.to_unicode[byte as usize]
            .ok_or(CharacterConversionError::UnmappableByte { ccsid: self.ccsid, byte })
    }

    /// Convert one character
    pub fn to_ebcdic(&self, ch: char) -> Result<u8, CharacterConversionError> {
        self.to_ebcdic
            .get(&ch)
            .copied()
            .ok_or(CharacterConversionError::UnmappableChar { ccsid: self.ccsid, ch })
    }

    /// Convert a byte slice, failing on the first unmapped byte
    pub fn decode(&self, bytes: &[u8]) -> Result<String, CharacterConversionError> {
        bytes.iter().map(|&b| self.to_unicode(b)).collect()
    }

    /// Convert a string, failing on the first unmapped character
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, CharacterConversionError> {
        text.chars().map(|c| self.to_ebcdic(c)).collect()
    }

    /// Every character this page can represent
    pub fn mapped_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.to_unicode.iter().filter_map(|entry| *entry)
    }
}

const CP037_DESCRIPTION: &str = "USA, Canada, Netherlands, Portugal, Brazil, Australia, New Zealand";

static CP037_PAGE: Lazy<CodePage> = Lazy::new(|| CodePage::latin(37, CP037_DESCRIPTION, &[]));

static REGISTRY: Lazy<HashMap<u16, CodePage>> = Lazy::new(|| {
    let pages = vec![
        CodePage::latin(37, CP037_DESCRIPTION, &[]),
        CodePage::latin(273, "Austria, Germany", &[CP273_DIFF]),
        CodePage::latin(277, "Denmark, Norway", &[CP277_DIFF]),
        CodePage::latin(278, "Finland, Sweden", &[CP278_DIFF]),
        CodePage::latin(280, "Italy", &[CP280_DIFF]),
        CodePage::latin(284, "Spain, Latin America", &[CP284_DIFF]),
        CodePage::latin(285, "United Kingdom", &[CP285_DIFF]),
        CodePage::latin(297, "France", &[CP297_DIFF]),
        CodePage::derived(424, "Hebrew", &[CP424_DIFF], CP424_UNDEFINED),
        CodePage::latin(500, "International Latin-1", &[CP500_DIFF]),
        CodePage::latin(870, "Latin-2 multilingual", &[CP870_DIFF]),
        CodePage::latin(871, "Iceland", &[CP871_DIFF]),
        CodePage::derived(875, "Greek", &[CP875_DIFF], CP875_UNDEFINED),
        CodePage::katakana(930, "Japan Katakana extended (single-byte plane)"),
        CodePage::latin(1025, "Cyrillic multilingual", &[CP1025_DIFF]),
        CodePage::latin(1026, "Turkey Latin-5", &[CP1026_DIFF]),
        CodePage::latin(1112, "Baltic multilingual", &[CP1112_DIFF]),
        CodePage::latin(1140, "USA, Canada with Euro", &[EURO]),
        CodePage::latin(1141, "Austria, Germany with Euro", &[CP273_DIFF, EURO]),
        CodePage::latin(1144, "Italy with Euro", &[CP280_DIFF, EURO]),
        CodePage::latin(1145, "Spain, Latin America with Euro", &[CP284_DIFF, EURO]),
        CodePage::latin(1147, "France with Euro", &[CP297_DIFF, EURO]),
        CodePage::latin(1148, "International Latin-1 with Euro", &[CP500_DIFF, EURO]),
    ];
    pages.into_iter().map(|page| (page.ccsid, page)).collect()
});

/// CCSID 37, used where no session CCSID applies
pub fn default_page() -> &'static CodePage {
    &CP037_PAGE
}

/// Convert one EBCDIC byte in the given CCSID
pub fn to_unicode(ccsid: u16, byte: u8) -> Result<char, CharacterConversionError> {
    CodePage::for_ccsid(ccsid)?.to_unicode(byte)
}

/// Convert one character into the given CCSID
pub fn to_ebcdic(ccsid: u16, ch: char) -> Result<u8, CharacterConversionError> {
    CodePage::for_ccsid(ccsid)?.to_ebcdic(ch)
}

/// Sorted list of built-in CCSIDs
pub fn supported_ccsids() -> Vec<u16> {
    let mut ccsids: Vec<u16> = REGISTRY.keys().copied().collect();
    ccsids.sort_unstable();
    ccsids
}
