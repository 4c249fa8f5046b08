// common.rs — console printing, token parsing and block checksums

use crc::{Crc, CRC_16_IBM_3740};

// ============================================================
// Console output
// ============================================================
// Engine code keeps the printf-style call sites; output goes through the
// `log` facade so the host decides where it ends up.

pub fn com_printf(msg: &str) {
    log::info!("{}", msg.trim_end_matches('\n'));
}

/// Developer-only print.
pub fn com_dprintf(msg: &str) {
    log::debug!("{}", msg.trim_end_matches('\n'));
}

/// Warning print for recoverable content problems.
pub fn com_wprintf(msg: &str) {
    log::warn!("{}", msg.trim_end_matches('\n'));
}

// ============================================================
// Token parsing
// ============================================================

/// Parse the next whitespace separated token out of `data`, advancing it.
/// Quoted strings are returned without their quotes and `//` comments are
/// skipped. Returns `None` when the input is exhausted.
pub fn com_parse(data: &mut &str) -> Option<String> {
    let mut rest = *data;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            *data = rest;
            return None;
        }
        // skip // comments
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |nl| &after[nl + 1..]);
            continue;
        }
        break;
    }

    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"').unwrap_or(quoted.len());
        let token = quoted[..end].to_string();
        *data = quoted.get(end + 1..).unwrap_or("");
        return Some(token);
    }

    let end = rest.find(|c: char| c.is_whitespace()).unwrap_or(rest.len());
    let token = rest[..end].to_string();
    *data = &rest[end..];
    Some(token)
}

// ============================================================
// Checksums
// ============================================================

/// 16-bit CCITT CRC (polynomial 0x1021, initial 0xffff).
const CRC_CALC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Compute the CRC of an entire block of data.
pub fn crc_block(data: &[u8]) -> u16 {
    CRC_CALC.checksum(data)
}

// ============================================================
// Tests
// ============================================================
