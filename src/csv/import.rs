use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{
    types::Category,
    visitor::{RosterRow, non_blank},
};

use super::{AFFILIATION, BOM, CATEGORY, CONTACT, CONTACT_ALIAS, EMAIL, MEMO, NAME, POSITION, split_fields};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("only .csv files can be imported: {0}")]
    NotCsv(PathBuf),
    #[error("invalid CSV format: expected a header row and at least one data row")]
    InvalidFormat,
    #[error("CSV header is missing required columns: {}", .missing.join(", "))]
    HeaderMismatch { missing: Vec<&'static str> },
    #[error("failed to read roster file: {0}")]
    Io(#[from] std::io::Error),
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeaderMap {
    name: usize,
    affiliation: usize,
    position: usize,
    email: usize,
    contact: usize,
    memo: Option<usize>,
    category: Option<usize>,
}

impl HeaderMap {
    fn resolve(headers: &[&str]) -> Result<Self, ImportError> {
        let find = |label: &str| headers.iter().position(|h| *h == label);

        let name = find(NAME);
        let affiliation = find(AFFILIATION);
        let position = find(POSITION);
        let email = find(EMAIL);
        let contact = find(CONTACT).or_else(|| find(CONTACT_ALIAS));

        match (name, affiliation, position, email, contact) {
            (Some(name), Some(affiliation), Some(position), Some(email), Some(contact)) => Ok(Self {
                name,
                affiliation,
                position,
                email,
                contact,
                memo: find(MEMO),
                category: find(CATEGORY),
            }),
            _ => {
                let missing = [
                    (NAME, name),
                    (AFFILIATION, affiliation),
                    (POSITION, position),
                    (EMAIL, email),
                    (CONTACT, contact),
                ]
                .into_iter()
                .filter_map(|(label, idx)| idx.is_none().then_some(label))
                .collect();
                Err(ImportError::HeaderMismatch { missing })
            }
        }
    }

    fn row(&self, values: &[&str]) -> RosterRow {
        let cell = |idx: usize| values.get(idx).copied().unwrap_or_default().to_string();
        RosterRow {
            name: cell(self.name),
            affiliation: cell(self.affiliation),
            position: cell(self.position),
            email: cell(self.email),
            contact: cell(self.contact),
            memo: self
                .memo
                .and_then(|idx| values.get(idx))
                .and_then(|v| non_blank(v)),
            category: self
                .category
                .and_then(|idx| values.get(idx))
                .map(|v| v.parse().unwrap_or(Category::General))
                .unwrap_or_default(),
        }
    }
}

/// Parses roster text. Either every valid row is returned or an error is, never a partial roster.
pub fn parse_roster(text: &str) -> Result<Vec<RosterRow>, ImportError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let lines: Vec<&str> = text.split('\n').filter(|line| !line.trim().is_empty()).collect();

    if lines.len() < 2 {
        return Err(ImportError::InvalidFormat);
    }

    let headers = split_fields(lines[0]);
    let map = HeaderMap::resolve(&headers)?;

    let rows: Vec<RosterRow> = lines[1..]
        .iter()
        .map(|line| map.row(&split_fields(line)))
        .filter(|row| !row.name.is_empty())
        .collect();

    log::debug!("parsed {} roster rows from {} data lines", rows.len(), lines.len() - 1);
    Ok(rows)
}

/// Reads and parses a roster file. Anything without a `.csv` extension is refused unread.
pub fn import_file(path: impl AsRef<Path>) -> Result<Vec<RosterRow>, ImportError> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(ImportError::NotCsv(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path)?;
    parse_roster(&text)
}
