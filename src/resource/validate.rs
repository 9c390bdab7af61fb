//! Field validators
//!
//! Validators push into a [`Diagnostics`] instead of returning early, so a
//! single pass reports every problem with an argument set.

use super::schema::Diagnostics;
use crate::resourceid::ResourceId;
use regex::Regex;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::OnceLock;
use uuid::Uuid;

const MAX_TAGS: usize = 50;
const MAX_TAG_KEY_LENGTH: usize = 512;
const MAX_TAG_VALUE_LENGTH: usize = 256;

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| {
        Regex::new(pattern).unwrap_or_else(|e| panic!("Invalid built-in pattern {}: {}", pattern, e))
    })
}

fn check(diags: &mut Diagnostics, field: &str, value: &str, re: &Regex, rule: &str) {
    if !re.is_match(value) {
        diags.push(field, format!("{:?} is invalid: {}", value, rule));
    }
}

pub fn resource_group_name(diags: &mut Diagnostics, field: &str, value: &str) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = compiled(&RE, r"^[-\w._()]{1,90}$");
    check(
        diags,
        field,
        value,
        re,
        "1-90 characters: letters, digits, underscores, hyphens, periods and parentheses",
    );
    if value.ends_with('.') {
        diags.push(field, "must not end with a period");
    }
}

pub fn batch_account_name(diags: &mut Diagnostics, field: &str, value: &str) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = compiled(&RE, r"^[a-z0-9]{3,24}$");
    check(diags, field, value, re, "3-24 lowercase letters and digits");
}

pub fn batch_pool_name(diags: &mut Diagnostics, field: &str, value: &str) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = compiled(&RE, r"^[a-zA-Z0-9_-]{1,64}$");
    check(
        diags,
        field,
        value,
        re,
        "1-64 letters, digits, underscores and hyphens",
    );
}

pub fn storage_account_name(diags: &mut Diagnostics, field: &str, value: &str) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = compiled(&RE, r"^[a-z0-9]{3,24}$");
    check(diags, field, value, re, "3-24 lowercase letters and digits");
}

/// Virtual network and subnet names
pub fn network_name(diags: &mut Diagnostics, field: &str, value: &str) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = compiled(&RE, r"^[a-zA-Z0-9]([\w.-]{0,78}\w)?$");
    check(
        diags,
        field,
        value,
        re,
        "1-80 characters, start with a letter or digit and end with a letter, digit or underscore",
    );
}

/// ISO 8601 time duration such as `PT15M`
pub fn duration(diags: &mut Diagnostics, field: &str, value: &str) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = compiled(&RE, r"^PT(\d+H)?(\d+M)?(\d+(\.\d+)?S)?$");
    if value == "PT" || !re.is_match(value) {
        diags.push(field, format!("{:?} is not an ISO 8601 duration like PT15M", value));
    }
}

/// Subscription ids are GUIDs
pub fn is_subscription_id(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

pub fn subscription_id(diags: &mut Diagnostics, field: &str, value: &str) {
    if value.is_empty() {
        diags.push(field, "no subscription configured");
    } else if !is_subscription_id(value) {
        diags.push(field, format!("{:?} is invalid: must be a GUID", value));
    }
}

pub fn not_empty(diags: &mut Diagnostics, field: &str, value: &str) {
    if value.trim().is_empty() {
        diags.push(field, "must not be empty");
    }
}

pub fn location(diags: &mut Diagnostics, field: &str, value: &str) {
    if normalize_location(value).is_empty() {
        diags.push(field, "must not be empty");
    }
}

/// `West Europe` -> `westeurope`
pub fn normalize_location(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn tags(diags: &mut Diagnostics, field: &str, tags: &BTreeMap<String, String>) {
    if tags.len() > MAX_TAGS {
        diags.push(
            field,
            format!("at most {} tags are allowed, got {}", MAX_TAGS, tags.len()),
        );
    }
    for (key, value) in tags {
        if key.is_empty() || key.chars().count() > MAX_TAG_KEY_LENGTH {
            diags.push(
                field,
                format!("tag key {:?} must be 1-{} characters", key, MAX_TAG_KEY_LENGTH),
            );
        }
        if value.chars().count() > MAX_TAG_VALUE_LENGTH {
            diags.push(
                field,
                format!(
                    "value of tag {:?} must be at most {} characters",
                    key, MAX_TAG_VALUE_LENGTH
                ),
            );
        }
    }
}

/// `10.0.0.0/16` or `fd00::/8`
pub fn cidr(diags: &mut Diagnostics, field: &str, value: &str) {
    let Some((addr, prefix)) = value.split_once('/') else {
        diags.push(field, format!("{:?} is not in CIDR notation", value));
        return;
    };

    let Ok(addr) = addr.parse::<IpAddr>() else {
        diags.push(field, format!("{:?} has an invalid address", value));
        return;
    };

    let max = if addr.is_ipv4() { 32 } else { 128 };
    match prefix.parse::<u8>() {
        Ok(p) if p <= max => {}
        _ => diags.push(
            field,
            format!("{:?} has an invalid prefix length (0-{})", value, max),
        ),
    }
}

pub fn ip_address(diags: &mut Diagnostics, field: &str, value: &str) {
    if value.parse::<IpAddr>().is_err() {
        diags.push(field, format!("{:?} is not an IP address", value));
    }
}

/// Strictly decode a reference to another resource
pub fn resource_id<I: ResourceId>(diags: &mut Diagnostics, field: &str, value: &str) {
    if let Err(e) = I::parse(value) {
        diags.push(field, e.to_string());
    }
}
