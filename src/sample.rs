//! Sample roster generation for rehearsals and demos.

use rand::{Rng, seq::SliceRandom};

use crate::csv::{AFFILIATION, CONTACT, EMAIL, NAME, POSITION, with_bom};

const NAMES: [&str; 10] = [
    "김민준", "이서연", "박지훈", "최수아", "정도윤", "강하은", "윤민서", "임준호", "한지민", "오현우",
];
const DEPARTMENTS: [&str; 10] = [
    "마케팅부", "개발팀", "인사팀", "영업부", "기획팀", "디자인팀", "재무팀", "고객지원팀", "연구소", "총무팀",
];
const POSITIONS: [&str; 10] = ["사원", "대리", "과장", "차장", "부장", "팀장", "실장", "이사", "상무", "전무"];

/// Chance that a row reuses an earlier name when homonyms are requested.
pub const HOMONYM_PROBABILITY: f64 = 0.3;

/// Builds an importable roster of `count` random visitors.
pub fn generate_sample_csv<R: Rng>(count: usize, include_homonyms: bool, rng: &mut R) -> String {
    let mut used: Vec<&str> = Vec::new();
    let mut lines = vec![[NAME, AFFILIATION, POSITION, EMAIL, CONTACT].join(",")];

    for _ in 0..count {
        let reuse = include_homonyms && !used.is_empty() && rng.gen_bool(HOMONYM_PROBABILITY);
        let name = match used.choose(rng) {
            Some(name) if reuse => *name,
            _ => {
                let name = NAMES[rng.gen_range(0..NAMES.len())];
                if !used.contains(&name) {
                    used.push(name);
                }
                name
            }
        };

        let department = DEPARTMENTS[rng.gen_range(0..DEPARTMENTS.len())];
        let position = POSITIONS[rng.gen_range(0..POSITIONS.len())];
        let email = format!("{name}{}@example.com", rng.gen_range(0..1000));
        let contact = format!(
            "010-{}-{}",
            rng.gen_range(1000..10000),
            rng.gen_range(1000..10000)
        );
        lines.push(format!("{name},{department},{position},{email},{contact}"));
    }

    with_bom(lines)
}

pub fn sample_filename(count: usize) -> String {
    format!("sample_visitors_{count}.csv")
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::csv::import::parse_roster;

    #[test]
    fn sample_imports_with_requested_row_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let text = generate_sample_csv(25, true, &mut rng);
        let rows = parse_roster(&text).expect("sample parses");
        assert_eq!(rows.len(), 25);
        assert!(rows.iter().all(|r| r.email.ends_with("@example.com")));
        assert!(rows.iter().all(|r| r.contact.starts_with("010-")));
    }

    #[test]
    fn homonyms_appear_when_names_run_out() {
        let mut rng = StdRng::seed_from_u64(1);
        let rows = parse_roster(&generate_sample_csv(40, true, &mut rng)).expect("parse");
        let distinct: std::collections::BTreeSet<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert!(distinct.len() < rows.len());
    }
}
