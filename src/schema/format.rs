// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Checks for the `format` keyword. Formats that are not recognized, or whose
//! cargo feature is disabled, always pass.

#![allow(clippy::expect_used)] // built-in expressions are constants

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$"
    )
    .expect("EMAIL should be a valid regex");
    static ref HOSTNAME: Regex = Regex::new(
        r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$"
    )
    .expect("HOSTNAME should be a valid regex");
}

/// Returns whether `s` satisfies `format`.
pub fn is_valid(format: &str, s: &str) -> bool {
    match format {
        "email" => EMAIL.is_match(s),
        "hostname" => s.len() <= 253 && HOSTNAME.is_match(s),
        "ipv4" => s.parse::<std::net::Ipv4Addr>().is_ok(),
        "ipv6" => s.parse::<std::net::Ipv6Addr>().is_ok(),
        #[cfg(feature = "net")]
        "cidr" => s.parse::<ipnet::IpNet>().is_ok(),
        #[cfg(feature = "time")]
        "date" => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        #[cfg(feature = "time")]
        "time" => {
            chrono::NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
                || chrono::DateTime::parse_from_rfc3339(&format!("1970-01-01T{s}")).is_ok()
        }
        #[cfg(feature = "time")]
        "date-time" => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
        #[cfg(feature = "url")]
        "uri" | "url" => url::Url::parse(s).is_ok(),
        #[cfg(feature = "uuid")]
        "uuid" => uuid::Uuid::try_parse(s).is_ok(),
        _ => true,
    }
}
