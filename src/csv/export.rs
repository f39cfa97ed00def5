use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};

use crate::core::store::RosterStore;

use super::{AFFILIATION, CONTACT, EMAIL, MEMO, NAME, POSITION, with_bom};

/// Attendance column value for visitors who checked in.
pub const ATTENDED: &str = "참석";
/// Attendance column value for visitors who did not.
pub const NOT_ATTENDED: &str = "미참석";
/// Filename of the blank import template.
pub const TEMPLATE_FILENAME: &str = "visitor_template.csv";

/// Renders a check-in time as `YYYY-MM-DD 오전|오후 hh:mm:ss` in `offset`.
pub fn format_checked_in_at(at: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = at.with_timezone(&offset);
    let hour = local.hour();
    let meridiem = if hour >= 12 { "오후" } else { "오전" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!(
        "{} {meridiem} {display_hour:02}:{:02}:{:02}",
        local.format("%Y-%m-%d"),
        local.minute(),
        local.second()
    )
}

/// Full-roster attendance report, one row per visitor regardless of status.
pub fn attendance_report(store: &RosterStore, offset: FixedOffset) -> String {
    let header = [NAME, AFFILIATION, POSITION, EMAIL, CONTACT, "참석여부", "참석시간", MEMO].join(",");
    let mut lines = vec![header];

    for v in store.visitors() {
        let status = if v.is_checked_in() { ATTENDED } else { NOT_ATTENDED };
        let time = v
            .checked_in_at
            .map(|at| format_checked_in_at(at, offset))
            .unwrap_or_default();
        let fields: [&str; 8] = [
            &v.name,
            &v.affiliation,
            &v.position,
            &v.email,
            &v.contact,
            status,
            &time,
            v.memo.as_deref().unwrap_or(""),
        ];
        lines.push(fields.join(","));
    }

    with_bom(lines)
}

pub fn attendance_filename(event_name: &str, date: NaiveDate) -> String {
    format!("{event_name}_참석체크_{}.csv", date.format("%Y-%m-%d"))
}

/// Registration columns only, in import order, so the file can be re-imported as is.
pub fn backup_csv(store: &RosterStore) -> String {
    let mut lines = vec![[NAME, AFFILIATION, POSITION, EMAIL, CONTACT].join(",")];
    lines.extend(store.visitors().into_iter().map(|v| {
        let fields: [&str; 5] = [&v.name, &v.affiliation, &v.position, &v.email, &v.contact];
        fields.join(",")
    }));
    with_bom(lines)
}

pub fn backup_filename(event_name: &str, date: NaiveDate) -> String {
    format!("{event_name}_원본백업_{}.csv", date.format("%Y-%m-%d"))
}

/// Import template with two example rows.
pub fn template_csv() -> String {
    with_bom(vec![
        [NAME, AFFILIATION, POSITION, EMAIL, CONTACT].join(","),
        "홍길동,마케팅팀,팀장,hong@example.com,010-1234-5678".to_string(),
        "김영희,개발팀,사원,kim@example.com,010-8765-4321".to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).expect("offset")
    }

    #[test]
    fn afternoon_uses_twelve_hour_clock() {
        let at = Utc.with_ymd_and_hms(2025, 3, 20, 6, 4, 5).unwrap();
        assert_eq!(format_checked_in_at(at, kst()), "2025-03-20 오후 03:04:05");
    }

    #[test]
    fn midnight_and_noon_show_twelve() {
        let midnight = Utc.with_ymd_and_hms(2025, 3, 19, 15, 0, 0).unwrap();
        assert_eq!(format_checked_in_at(midnight, kst()), "2025-03-20 오전 12:00:00");

        let noon = Utc.with_ymd_and_hms(2025, 3, 20, 3, 30, 9).unwrap();
        assert_eq!(format_checked_in_at(noon, kst()), "2025-03-20 오후 12:30:09");
    }

    #[test]
    fn filenames_embed_event_and_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        assert_eq!(attendance_filename("신제품 설명회", date), "신제품 설명회_참석체크_2025-03-20.csv");
        assert_eq!(backup_filename("신제품 설명회", date), "신제품 설명회_원본백업_2025-03-20.csv");
    }

    #[test]
    fn template_imports_cleanly() {
        let rows = crate::csv::import::parse_roster(&template_csv()).expect("template parses");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "홍길동");
    }
}
