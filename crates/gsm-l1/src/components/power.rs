//! MS power-control code tables, GSM 05.05 4.1.1.

use gsm_config::Band;

/// Power control codes for GSM400, GSM850, EGSM900.
static POWER_COMMAND_LOW_BAND: [i32; 32] = [
    39, 39, 39, 37, // 0-3
    35, 33, 31, 29, // 4-7
    27, 25, 23, 21, // 8-11
    19, 17, 15, 13, // 12-15
    11, 9, 7, 5, // 16-19
    5, 5, 5, 5, // 20-23
    5, 5, 5, 5, // 24-27
    5, 5, 5, 5, // 28-31
];

/// Power control codes for DCS1800.
static POWER_COMMAND_1800: [i32; 32] = [
    30, 28, 26, 24, // 0-3
    22, 20, 18, 16, // 4-7
    14, 12, 10, 8, // 8-11
    6, 4, 2, 0, // 12-15
    0, 0, 0, 0, // 16-19
    0, 0, 0, 0, // 20-23
    0, 0, 0, 0, // 24-27
    0, 36, 24, 23, // 28-31
];

/// Power control codes for PCS1900.
static POWER_COMMAND_1900: [i32; 32] = [
    30, 28, 26, 24, // 0-3
    22, 20, 18, 16, // 4-7
    14, 12, 10, 8, // 8-11
    6, 4, 2, 0, // 12-15
    0, 0, 0, 0, // 16-19
    0, 0, 0, 0, // 20-23
    0, 0, 0, 0, // 24-27
    0, 0, 0, 0, // 28-31
];

fn pick_table(band: Band) -> &'static [i32; 32] {
    match band {
        Band::Gsm400 | Band::Gsm850 | Band::Egsm900 => &POWER_COMMAND_LOW_BAND,
        Band::Dcs1800 => &POWER_COMMAND_1800,
        Band::Pcs1900 => &POWER_COMMAND_1900,
    }
}

/// MS transmit power in dBm for a 5-bit power-control code.
pub fn decode_power(band: Band, code: u8) -> i32 {
    pick_table(band)[code as usize & 0x1f]
}

/// Given a power level in dBm, encode the control code. Returns the first
/// code matching exactly, otherwise the minimum-error code.
pub fn encode_power(band: Band, power: i32) -> u8 {
    let table = pick_table(band);
    let mut min_err = (power - table[0]).unsigned_abs();
    let mut code = 0u8;
    for i in 1..32 {
        let this_err = (power - table[i]).unsigned_abs();
        if this_err == 0 {
            return i as u8;
        }
        if this_err < min_err {
            min_err = this_err;
            code = i as u8;
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_inverse_for_unique_levels() {
        for band in [Band::Egsm900, Band::Dcs1800, Band::Pcs1900] {
            let table = pick_table(band);
            for code in 0..32u8 {
                let dbm = table[code as usize];
                let unique = table.iter().filter(|&&p| p == dbm).count() == 1;
                if unique {
                    assert_eq!(encode_power(band, dbm), code);
                }
                // Representable levels always survive the roundtrip
                assert_eq!(decode_power(band, encode_power(band, dbm)), dbm);
            }
        }
    }

    #[test]
    fn test_encode_picks_nearest() {
        // 34 dBm sits between 33 (code 5) and 35 (code 4) in the low band
        let code = encode_power(Band::Egsm900, 34);
        assert!(code == 4 || code == 5);
        // Far above the table clamps to the maximum representable
        assert_eq!(decode_power(Band::Egsm900, encode_power(Band::Egsm900, 50)), 39);
    }

    #[test]
    fn test_band_sharing() {
        assert_eq!(decode_power(Band::Gsm850, 10), decode_power(Band::Egsm900, 10));
        assert_ne!(decode_power(Band::Dcs1800, 0), decode_power(Band::Egsm900, 0));
    }
}
