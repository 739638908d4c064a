use chrono::{Days, NaiveDate, NaiveTime};
use rand::Rng;

use crate::models::catalog::{Column, TypeFamily};

use super::query::{CompareOp, Literal};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_TOKEN_LEN: usize = 8;
const MAX_DAY_OFFSET: u64 = 5 * 365;

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}

fn random_token<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

fn random_date<R: Rng + ?Sized>(rng: &mut R) -> NaiveDate {
    let base = reference_date();
    base.checked_add_days(Days::new(rng.random_range(0..=MAX_DAY_OFFSET)))
        .unwrap_or(base)
}

fn random_time<R: Rng + ?Sized>(rng: &mut R) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(rng.random_range(0..86_400), 0)
        .unwrap_or_default()
}

/// A placeholder value that is valid for the column's type: small positive
/// numbers, short alphanumeric tokens that fit the declared length, and
/// dates within five years of 2020-01-01. `LIKE` gets a prefix pattern.
pub(crate) fn literal_for<R: Rng + ?Sized>(rng: &mut R, column: &Column, op: CompareOp) -> Literal {
    match column.type_family() {
        TypeFamily::Integer => Literal::Integer(rng.random_range(1..=1000)),
        TypeFamily::Decimal => Literal::Decimal(rng.random_range(0..100_000) as f64 / 100.0),
        TypeFamily::Character => {
            let max = column
                .max_length
                .and_then(|l| usize::try_from(l).ok())
                .unwrap_or(MAX_TOKEN_LEN)
                .clamp(1, MAX_TOKEN_LEN);
            if op == CompareOp::Like {
                let prefix_len = rng.random_range(1..=max.min(3));
                Literal::Text(format!("{}%", random_token(rng, prefix_len)))
            } else {
                let len = rng.random_range(1..=max);
                Literal::Text(random_token(rng, len))
            }
        }
        TypeFamily::Boolean => Literal::Boolean(rng.random_bool(0.5)),
        TypeFamily::Date => Literal::Date(random_date(rng)),
        TypeFamily::Timestamp => {
            let date = random_date(rng);
            Literal::Timestamp(date.and_time(random_time(rng)))
        }
        TypeFamily::Time => Literal::Time(random_time(rng)),
        // Not reachable from the engine, which only compares typed columns.
        TypeFamily::Other => Literal::Text(random_token(rng, MAX_TOKEN_LEN)),
    }
}
