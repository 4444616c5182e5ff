use orgdex::scrape::{find_between, parse_employee, parse_mid_name, parse_mobile, unescape};
use orgdex::types::Employee;

const ROW: &str = concat!(
    r#"<tr class="sotr" data-tabnum="100500">"#,
    r#"<td><img src="/photos/100500.jpg?v=42"></td>"#,
    r#"<td width="300" class="s_1">Иванов Иван <span class="s_3">вн</span> <b>1234,5678</b></td>"#,
    r#"<td width="130" class="s_2">+79000000000,+79000000001</td>"#,
    r#"<td><a href="mailto:ivanov@corp.example">ivanov@corp.example</a></td>"#,
    r#"<td colspan="4"class="s_4">инженер</td>"#,
    "</tr>",
);

#[test]
fn employee_row_fields() {
    let emp = parse_employee(ROW);
    assert_eq!(emp.tabnum, "100500");
    assert_eq!(emp.name, "Иванов Иван");
    assert_eq!(emp.avatar, "/photos/100500.jpg");
    assert_eq!(emp.phone, vec!["1234", "5678"]);
    assert_eq!(emp.mobile, vec!["+79000000000", "+79000000001"]);
    assert_eq!(emp.email, "ivanov@corp.example");
    assert_eq!(emp.grade, "инженер");
}

#[test]
fn list_cells_split_without_per_item_trim() {
    let row = concat!(
        r#"<td width="300" class="s_1">x <span class="s_3">вн</span> "#,
        r#"<b> 1234, 5678 </b></td>"#,
    );
    let emp = parse_employee(row);
    // The cell is trimmed as a whole; spacing inside stays.
    assert_eq!(emp.phone, vec!["1234", " 5678"]);
}

#[test]
fn employee_row_missing_markers() {
    let emp = parse_employee("<tr><td>nothing recognizable</td></tr>");
    assert_eq!(emp.tabnum, "");
    assert_eq!(emp.name, "");
    assert!(emp.phone.is_empty());
    assert!(emp.mobile.is_empty());
}

#[test]
fn mid_name_matches_on_name_prefix_and_avatar() {
    let page = concat!(
        r#"<div class=sotr_td3><img alt="" src="/photos/999.jpg?v=1">"#,
        r#"<a onclick="searchG('Иванов Иван Петрович', 'sotrSearchList')">x</a>"#,
        r#"</div><div class=sotr_td3><img alt="" src="/photos/100500.jpg?v=7">"#,
        r#"<a onclick="searchG('Иванов Иван Иванович', 'sotrSearchList')">x</a></div>"#,
    );
    let emp = Employee {
        name: "Иванов Иван".to_string(),
        avatar: "/photos/100500.jpg".to_string(),
        ..Employee::default()
    };
    assert_eq!(parse_mid_name(&emp, page), "Иванович");

    // Same names but no avatar match: ambiguity stays unresolved.
    let other = Employee {
        name: "Иванов Иван".to_string(),
        avatar: "/photos/111.jpg".to_string(),
        ..Employee::default()
    };
    assert_eq!(parse_mid_name(&other, page), "");
}

#[test]
fn unescape_entities() {
    assert_eq!(unescape("Tom &amp; Jerry"), "Tom & Jerry");
    assert_eq!(unescape("&lt;b&gt;&quot;x&quot;&apos;&nbsp;"), "<b>\"x\"' ");
    assert_eq!(unescape("&#1048;&#x432;"), "Ив");
    assert_eq!(unescape("&unknown;"), "&unknown;");
    assert_eq!(unescape("a & b"), "a & b");
    assert_eq!(unescape("no entities"), "no entities");
}

#[test]
fn unescape_multibyte_text_near_the_entity_window() {
    // Cyrillic right after an entity puts multi-byte characters inside the
    // semicolon lookahead window.
    assert_eq!(unescape("&amp;Иванов Иван"), "&Иванов Иван");
    assert_eq!(unescape("&Иванов"), "&Иванов");
    assert_eq!(unescape("Иванов &amp; Петров"), "Иванов & Петров");
}

#[test]
fn find_between_basics() {
    assert_eq!(find_between("a[x]b", "[", "]"), "x");
    assert_eq!(find_between("a[x", "[", "]"), "");
    assert_eq!(find_between("ab", "[", "]"), "");
    assert_eq!(find_between("[1][2]", "[", "]"), "1");
}

#[test]
fn mobile_lookup_payload() {
    let m = parse_mobile(r#"{"data": " +79001112233,+79001112234 ", "success": true}"#).unwrap();
    assert!(m.success);
    assert_eq!(m.data, "+79001112233,+79001112234");

    let m = parse_mobile(r#"{"success": false}"#).unwrap();
    assert!(!m.success);
    assert_eq!(m.data, "");

    assert!(parse_mobile("not json").is_err());
}
