//! Delimited-text roster import and export.
//!
//! Fields are split on bare commas. Quoting is not interpreted on import, so a
//! comma inside a value shifts the following columns.

/// Roster file parsing.
pub mod import;
/// Attendance report, backup and template generation.
pub mod export;

/// Byte-order mark prepended to every export so spreadsheet tools pick UTF-8.
pub const BOM: char = '\u{FEFF}';

/// Name column label.
pub const NAME: &str = "이름";
/// Affiliation column label.
pub const AFFILIATION: &str = "소속";
/// Position column label.
pub const POSITION: &str = "직급";
/// Email column label.
pub const EMAIL: &str = "이메일";
/// Contact column label.
pub const CONTACT: &str = "연락처";
/// Older contact label still found in hand-made rosters.
pub const CONTACT_ALIAS: &str = "전화번호";
/// Optional memo column label.
pub const MEMO: &str = "메모";
/// Optional category column label.
pub const CATEGORY: &str = "구분";

/// Columns every imported roster must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = [NAME, AFFILIATION, POSITION, EMAIL, CONTACT];

fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

pub(crate) fn with_bom(lines: Vec<String>) -> String {
    let mut out = String::new();
    out.push(BOM);
    out.push_str(&lines.join("\n"));
    out
}

/// Wraps a value in double quotes, doubling embedded quotes.
pub(crate) fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
