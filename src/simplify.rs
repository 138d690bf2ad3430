//! Address simplification for display labels.
//!
//! Reverse-geocoding responses carry verbose administrative addresses
//! ("广东省深圳市南山区科技园路10号腾讯大厦"). This module reduces them to a
//! short label, preferring a named point of interest ("腾讯大厦") over the
//! administrative chain. Pure string processing, no I/O.
//!
//! All lengths are measured in characters, not bytes; the inputs are
//! predominantly CJK.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::provider::AddressComponent;
use crate::UNKNOWN_LOCATION;

/// Maximum label length before truncation with `...`.
const MAX_LABEL_CHARS: usize = 25;

static COUNTRY_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new("^(中华人民共和国|中国)").unwrap());

/// Administrative prefix strippers, applied once each, in order. Each removes
/// the shortest leading run ending in its unit suffix.
static ADMIN_PREFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["省", "市", "区", "县", "街道", "镇", "乡"]
        .iter()
        .map(|unit| Regex::new(&format!("^(.*?{unit})")).unwrap())
        .collect()
});

/// POI extraction pattern families, tried in order; the last capture group of
/// the first valid match wins.
static POI_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // house number + POI name: "220号南湖公园" -> "南湖公园"
        Regex::new(r"^.*?(\d+号?\s*)(.+)$").unwrap(),
        // road + house number + POI name: "某某道784号麦佳汇" -> "麦佳汇"
        Regex::new(r"^.*?[路街道大街]\s*\d+号?\s*(.+)$").unwrap(),
        // road + POI name: "中山路肯德基" -> "肯德基"
        Regex::new(r"^.*?[路街道大街]\s*(.+)$").unwrap(),
    ]
});

static PURE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static BARE_ROAD_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new("^[路街道大街巷弄]$").unwrap());
static BARE_COMPASS: Lazy<Regex> = Lazy::new(|| Regex::new("^[东南西北中]$").unwrap());

/// Baseline used to detect whether POI extraction changed anything: the
/// original address with everything through the first township/street
/// character removed.
static STREET_BASELINE: Lazy<Regex> = Lazy::new(|| Regex::new("^.*?[乡镇街道]").unwrap());

static SEGMENT_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new("[,，、]").unwrap());
static FILLER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(附近|周边|内部|地下|地上|室内|室外)").unwrap());
static FILLER_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new("(附近|周边|内部|地下|地上|室内|室外)$").unwrap());
static UNIT_NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+号?-?\d*[室房间层楼]?)").unwrap());
static HOUSE_NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+号?\s*)").unwrap());
static PARKING_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new("(停车场|停车位|车位)$").unwrap());

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn is_valid_poi(candidate: &str) -> bool {
    let len = char_len(candidate);
    len > 0
        && len <= MAX_LABEL_CHARS
        && !PURE_DIGITS.is_match(candidate)
        && !BARE_ROAD_TYPE.is_match(candidate)
        && !BARE_COMPASS.is_match(candidate)
}

/// Reduce a formatted reverse-geocoding address to a short display label.
///
/// Strips the administrative chain, extracts a POI name when one of the
/// known patterns applies, falls back to segment splitting and filler
/// stripping, truncates to 25 characters, and finally falls back to the
/// structured components or the "unknown location" sentinel.
///
/// # Example
/// ```
/// use trip_geocoder::simplify_formatted_address;
///
/// let label = simplify_formatted_address("广东省深圳市南山区科技园路10号腾讯大厦", None);
/// assert_eq!(label, "腾讯大厦");
/// ```
pub fn simplify_formatted_address(
    formatted_address: &str,
    component: Option<&AddressComponent>,
) -> String {
    if formatted_address.is_empty() {
        return UNKNOWN_LOCATION.to_string();
    }

    let mut simplified = COUNTRY_PREFIX.replace(formatted_address, "").into_owned();
    for prefix in ADMIN_PREFIXES.iter() {
        simplified = prefix.replace(&simplified, "").into_owned();
    }
    simplified = simplified.trim().to_string();

    if !simplified.is_empty() {
        // POI extraction: first pattern whose last capture group passes the
        // validity checks wins.
        for pattern in POI_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(&simplified) {
                if let Some(last) = caps.get(caps.len() - 1) {
                    let extracted = last.as_str().trim();
                    if is_valid_poi(extracted) {
                        simplified = extracted.to_string();
                        break;
                    }
                }
            }
        }

        // No POI extracted: the result still equals the stripped-street
        // baseline, so try coarser simplification.
        let baseline = STREET_BASELINE
            .replace(formatted_address, "")
            .trim()
            .to_string();
        if simplified == baseline {
            if char_len(&simplified) > 20 {
                let parts: Vec<&str> = SEGMENT_SPLIT.split(&simplified).collect();
                if parts.len() > 1 {
                    let last = parts[parts.len() - 1].trim();
                    let last_len = char_len(last);
                    if last_len > 0 && last_len <= 20 {
                        simplified = last.to_string();
                    }
                }
            }

            simplified = FILLER_PREFIX.replace(&simplified, "").into_owned();
            simplified = FILLER_SUFFIX.replace(&simplified, "").into_owned();
            simplified = UNIT_NUMBER_PREFIX.replace(&simplified, "").into_owned();
            simplified = HOUSE_NUMBER_PREFIX.replace(&simplified, "").into_owned();
            simplified = PARKING_SUFFIX.replace(&simplified, "").into_owned();
            simplified = simplified.trim().to_string();
        }

        if char_len(&simplified) > MAX_LABEL_CHARS {
            let truncated: String = simplified.chars().take(MAX_LABEL_CHARS).collect();
            simplified = format!("{}...", truncated);
        }
    }

    // Too short to be a meaningful label: rebuild from the structured
    // components, then give up.
    if char_len(&simplified) < 2 {
        simplified = component
            .map(|c| join_components(&[&c.district, &c.township, &c.street]))
            .unwrap_or_default();
        if simplified.is_empty() {
            return UNKNOWN_LOCATION.to_string();
        }
    }

    simplified
}

/// Concatenate component fields, skipping empty values and the literal `[]`
/// the provider emits for absent fields.
pub(crate) fn join_components(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty() && **part != "[]")
        .copied()
        .collect()
}

static CITY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^(中国|北京市|上海市|广州市|深圳市|杭州市|南京市|武汉市|成都市|重庆市)").unwrap()
});
static PLAIN_ADMIN_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new("(市|区|县|镇|街道|路|街|巷|号)$").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TOKEN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,，\s]+").unwrap());

/// Simplify a plain-text database address without any network enhancement.
///
/// Strips known city-name prefixes and a trailing administrative suffix, and
/// keeps only the first two comma-delimited tokens when the result runs long.
/// Used by the trip title generator's no-network path.
pub fn simplify_plain_address(address: Option<&str>) -> String {
    let Some(address) = address else {
        return UNKNOWN_LOCATION.to_string();
    };
    if address.is_empty() {
        return UNKNOWN_LOCATION.to_string();
    }

    let mut simplified = CITY_PREFIX.replace(address, "").into_owned();
    simplified = PLAIN_ADMIN_SUFFIX.replace(&simplified, "").into_owned();
    simplified = WHITESPACE_RUN.replace_all(&simplified, " ").into_owned();
    simplified = simplified.trim().to_string();

    if char_len(&simplified) > 12 {
        let parts: Vec<&str> = TOKEN_SPLIT.split(&simplified).collect();
        simplified = parts.iter().take(2).copied().collect();
    }

    if simplified.is_empty() {
        UNKNOWN_LOCATION.to_string()
    } else {
        simplified
    }
}
