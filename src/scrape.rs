//! Field extraction for the directory's HTML fragments.
//!
//! The remote pages are machine-generated with a stable shape, so extraction
//! scans for known marker strings instead of parsing a DOM. Markers are kept
//! byte-for-byte identical to what the source emits; entity decoding happens
//! once, before scanning.

use serde::Deserialize;

use crate::types::Employee;

/// Substring of `s` strictly between the first `start` and the next `end`.
/// Empty string when either marker is missing.
pub fn find_between<'a>(s: &'a str, start: &str, end: &str) -> &'a str {
    let Some(i) = s.find(start) else { return "" };
    let rest = &s[i + start.len()..];
    let Some(j) = rest.find(end) else { return "" };
    &rest[..j]
}

/// Decode the HTML entities the directory actually emits: the five named
/// ones plus numeric references. Unknown entities pass through unchanged.
pub fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        // Bytewise scan: ';' is ASCII, and a fixed byte window sliced as a
        // &str could split a multi-byte character.
        let Some(semi) = rest.as_bytes().iter().take(12).position(|&b| b == b';') else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            "nbsp" => out.push(' '),
            _ if entity.starts_with('#') => {
                let code = if let Some(hex) = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    entity[1..].parse::<u32>().ok()
                };
                match code.and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => out.push_str(&rest[..semi + 1]),
                }
            }
            _ => out.push_str(&rest[..semi + 1]),
        }
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    out
}

/// Split a comma-separated cell. Only the cell as a whole is trimmed;
/// individual values keep their surrounding whitespace, as the consumers of
/// the stored comma-joined form expect the cell verbatim.
fn split_list(cell: &str) -> Vec<String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Vec::new();
    }
    cell.split(',').map(|v| v.to_string()).collect()
}

/// Strip the `?v=...` cache-buster from an avatar URL.
fn strip_query(url: &str) -> &str {
    match url.find('?') {
        Some(i) => &url[..i],
        None => url,
    }
}

/// Extract an employee's fields from one unescaped directory row.
///
/// idr, parent and created_at are not present in the row; the caller fills
/// them from the surrounding entry.
pub fn parse_employee(unescaped: &str) -> Employee {
    let tabnum = find_between(unescaped, r#"data-tabnum=""#, r#"""#);
    let avatar = strip_query(find_between(unescaped, r#"<img src=""#, r#"""#));
    let name = find_between(unescaped, r#"<td width="300" class="s_1">"#, "<span").trim();
    let phone = find_between(unescaped, r#"<span class="s_3">вн</span> <b>"#, "</b>").trim();
    let mobile = find_between(unescaped, r#"<td width="130" class="s_2">"#, "</td>").trim();
    let email = find_between(unescaped, r#"<a href="mailto:"#, r#"""#).trim();
    let grade = find_between(unescaped, r#"<td colspan="4"class="s_4">"#, "</td>").trim();

    Employee {
        tabnum: tabnum.to_string(),
        name: name.to_string(),
        phone: split_list(phone),
        mobile: split_list(mobile),
        email: email.to_string(),
        avatar: avatar.to_string(),
        grade: grade.to_string(),
        ..Employee::default()
    }
}

/// Resolve the middle name from the full-name search page: the fragment lists
/// candidates; the match is the one whose name starts with the employee's
/// short name AND whose avatar equals the employee's. Empty when no candidate
/// matches.
pub fn parse_mid_name(employee: &Employee, unescaped: &str) -> String {
    for chunk in unescaped.split("</div><div class=sotr_td3") {
        let avatar = strip_query(find_between(chunk, r#"alt="" src=""#, r#"""#));
        let full = find_between(chunk, "onclick=\"searchG('", "', 'sotrSearchList')").trim();
        if let Some(mid) = full.strip_prefix(employee.name.as_str()) {
            if avatar == employee.avatar {
                return mid.trim().to_string();
            }
        }
    }
    String::new()
}

/// Mobile-lookup endpoint payload: `{"data": "...", "success": true}`.
#[derive(Debug, Deserialize)]
pub struct MobileLookup {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub success: bool,
}

/// Parse the mobile-lookup JSON. `data` is trimmed; commas separate numbers.
pub fn parse_mobile(body: &str) -> serde_json::Result<MobileLookup> {
    let mut m: MobileLookup = serde_json::from_str(body)?;
    m.data = m.data.trim().to_string();
    Ok(m)
}
