//! Group upload parsing.
//!
//! Expected header: `name,birth_date,gender,type` (Portuguese aliases
//! `nome,nascimento,sexo,tipo` are accepted). Every line is validated and all
//! failures are reported together.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use thiserror::Error;

use regdesk_accounts::Gender;
use regdesk_events::TypeInscription;

use crate::cache::StagedParticipant;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadLineError {
    /// 1-based line number in the file (the header is line 1).
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupUploadError {
    #[error("the uploaded file has no participants")]
    Empty,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("{} line(s) failed validation", .0.len())]
    Lines(Vec<UploadLineError>),
}

struct Columns {
    name: usize,
    birth_date: usize,
    gender: usize,
    kind: usize,
}

impl Columns {
    fn resolve(header: &StringRecord) -> Result<Self, GroupUploadError> {
        let find = |aliases: &[&str]| {
            header
                .iter()
                .position(|h| aliases.iter().any(|a| h.trim().eq_ignore_ascii_case(a)))
                .ok_or_else(|| GroupUploadError::InvalidHeader(format!("missing column '{}'", aliases[0])))
        };

        Ok(Self {
            name: find(&["name", "nome"])?,
            birth_date: find(&["birth_date", "nascimento", "data_nascimento"])?,
            gender: find(&["gender", "sexo", "genero"])?,
            kind: find(&["type", "tipo"])?,
        })
    }
}

/// Parse a group CSV and price each line against the event's inscription types.
pub fn parse_group_csv(
    data: &[u8],
    types: &[TypeInscription],
) -> Result<Vec<StagedParticipant>, GroupUploadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let header = reader
        .headers()
        .map_err(|e| GroupUploadError::InvalidHeader(e.to_string()))?
        .clone();
    if header.iter().all(|h| h.is_empty()) {
        return Err(GroupUploadError::Empty);
    }
    let columns = Columns::resolve(&header)?;

    let mut participants = Vec::new();
    let mut errors = Vec::new();

    for (index, result) in reader.records().enumerate() {
        // Blank lines are skipped by the reader, so the index alone drifts.
        let fallback = index + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(fallback, |p| p.line() as usize);
                errors.push(UploadLineError { line, message: e.to_string() });
                continue;
            }
        };
        let line = record.position().map_or(fallback, |p| p.line() as usize);
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        match parse_line(&record, &columns, types) {
            Ok(participant) => participants.push(participant),
            Err(message) => errors.push(UploadLineError { line, message }),
        }
    }

    if !errors.is_empty() {
        return Err(GroupUploadError::Lines(errors));
    }
    if participants.is_empty() {
        return Err(GroupUploadError::Empty);
    }
    Ok(participants)
}

fn parse_line(
    record: &StringRecord,
    columns: &Columns,
    types: &[TypeInscription],
) -> Result<StagedParticipant, String> {
    let field = |idx: usize| record.get(idx).unwrap_or("");

    let name = field(columns.name);
    if name.is_empty() {
        return Err("name is required".to_string());
    }

    let birth_date = parse_date(field(columns.birth_date))?;

    let gender = field(columns.gender)
        .parse::<Gender>()
        .map_err(|_| format!("invalid gender '{}'", field(columns.gender)))?;

    let raw_type = field(columns.kind);
    let kind = types
        .iter()
        .find(|t| t.matches_description(raw_type))
        .ok_or_else(|| format!("unknown inscription type '{raw_type}'"))?;

    Ok(StagedParticipant {
        name: name.to_string(),
        birth_date,
        gender,
        type_inscription_id: kind.id_typed(),
        type_description: kind.description().to_string(),
        value: kind.value(),
        account_participant_id: None,
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("invalid birth date '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regdesk_core::Money;
    use regdesk_events::{EventId, NewTypeInscription};

    fn types() -> Vec<TypeInscription> {
        let event = EventId::new();
        vec![
            TypeInscription::create(
                event,
                NewTypeInscription { description: "Adulto".to_string(), value: Money::from_cents(15_000) },
            )
            .unwrap(),
            TypeInscription::create(
                event,
                NewTypeInscription { description: "Crianca".to_string(), value: Money::from_cents(5_000) },
            )
            .unwrap(),
        ]
    }

    #[test]
    fn parses_valid_file_with_both_date_formats() {
        let csv = "name,birth_date,gender,type\nAna,1990-04-12,F,adulto\nPedro,03/02/2015,male,CRIANCA\n";
        let parsed = parse_group_csv(csv.as_bytes(), &types()).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].value, Money::from_cents(15_000));
        assert_eq!(parsed[1].birth_date, NaiveDate::from_ymd_opt(2015, 2, 3).unwrap());
        assert_eq!(parsed[1].type_description, "Crianca");
    }

    #[test]
    fn accepts_portuguese_headers() {
        let csv = "nome,nascimento,sexo,tipo\nAna,1990-04-12,feminino,Adulto\n";
        assert_eq!(parse_group_csv(csv.as_bytes(), &types()).unwrap().len(), 1);
    }

    #[test]
    fn collects_every_line_error() {
        let csv = "name,birth_date,gender,type\n,1990-04-12,F,Adulto\nAna,12-04-1990,F,Adulto\nBia,1990-04-12,X,Idoso\n";
        match parse_group_csv(csv.as_bytes(), &types()) {
            Err(GroupUploadError::Lines(lines)) => {
                assert_eq!(lines.iter().map(|l| l.line).collect::<Vec<_>>(), vec![2, 3, 4]);
                assert!(lines[1].message.contains("birth date"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn blank_lines_do_not_shift_reported_line_numbers() {
        let csv = "name,birth_date,gender,type\n\nAna,bad,F,Adulto\n";
        match parse_group_csv(csv.as_bytes(), &types()) {
            Err(GroupUploadError::Lines(lines)) => {
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].line, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_headerless_files() {
        assert_eq!(parse_group_csv(b"", &types()), Err(GroupUploadError::Empty));
        assert_eq!(parse_group_csv(b"name,birth_date,gender,type\n", &types()), Err(GroupUploadError::Empty));
        assert!(matches!(
            parse_group_csv(b"name,gender\nAna,F\n", &types()),
            Err(GroupUploadError::InvalidHeader(_))
        ));
    }
}
