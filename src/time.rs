// Copyright 2015 Brian Smith.
//
// Permission to use, copy, modify, and/or distribute this software for any
// purpose with or without fee is hereby granted, provided that the above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHORS DISCLAIM ALL WARRANTIES
// WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE AUTHORS BE LIABLE FOR
// ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
// ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
// OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.

//! Time sources and conversions into the library's time type.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Error;

/// A source of the current time.
///
/// Every time-dependent decision (certificate validity windows, CRL
/// freshness, cache polling) reads the time through this trait so that it can
/// be pinned in tests.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// A [`Clock`] backed by the system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub(crate) fn from_ymdhms_utc(
    year: u32,
    month: u32,
    day_of_month: u32,
    hours: u32,
    minutes: u32,
    seconds: u32,
) -> Result<DateTime<Utc>, Error> {
    let year = i32::try_from(year).map_err(|_| Error::BadDerTime)?;
    NaiveDate::from_ymd_opt(year, month, day_of_month)
        .and_then(|date| date.and_hms_opt(hours, minutes, seconds))
        .map(|naive| naive.and_utc())
        .ok_or(Error::BadDerTime)
}
