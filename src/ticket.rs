//! Public ticket numbers: `LP{YY}{MM}{DD}-{XXXXXX}`.

use rand::Rng;
use time::{Date, OffsetDateTime};

const PREFIX: &str = "LP";
const SUFFIX_LEN: usize = 6;
const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a ticket number dated with the current UTC day.
pub fn generate_ticket_number() -> String {
    ticket_number_for(OffsetDateTime::now_utc().date(), &mut rand::thread_rng())
}

pub fn ticket_number_for<R: Rng + ?Sized>(date: Date, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();

    format!(
        "{PREFIX}{:02}{:02}{:02}-{suffix}",
        date.year().rem_euclid(100),
        u8::from(date.month()),
        date.day()
    )
}

/// Canonical form used for lookups. Stored tickets are always uppercase.
pub fn normalize(ticket_number: &str) -> String {
    ticket_number.trim().to_ascii_uppercase()
}

pub fn is_well_formed(ticket_number: &str) -> bool {
    let Some(rest) = ticket_number.strip_prefix(PREFIX) else {
        return false;
    };
    let Some((date, suffix)) = rest.split_once('-') else {
        return false;
    };

    date.len() == 6
        && date.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| SUFFIX_CHARSET.contains(&b))
}
