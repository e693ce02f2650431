//! Line format:
//! `<house_number> <cardinal> <road_number> <road_type> <x> <y> <price> <area> <rooms> <bathrooms> <features...>`
//!
//! The features field runs to the end of the line and may contain spaces.

use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use crate::{Address, Point, Record, RecordError};

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.house_number, self.cardinal, self.road_number, self.road_type
        )
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:.2} {:.2} {} {}",
            self.address,
            self.position.x,
            self.position.y,
            self.price,
            self.area,
            self.room_count,
            self.bathroom_count
        )?;
        if !self.features.is_empty() {
            write!(f, " {}", self.features)?;
        }
        Ok(())
    }
}

/// Whitespace field cursor over a single line.
struct Fields<'a> {
    rest: &'a str,
}

impl<'a> Fields<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    fn text(&mut self, field: &'static str) -> Result<&'a str, RecordError> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            return Err(RecordError::MissingField(field));
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (value, rest) = trimmed.split_at(end);
        self.rest = rest;
        Ok(value)
    }

    fn number<T: FromStr>(&mut self, field: &'static str) -> Result<T, RecordError> {
        let raw = self.text(field)?;
        parse_field(field, raw)
    }

    fn float(&mut self, field: &'static str) -> Result<f64, RecordError> {
        let raw = self.text(field)?;
        let value: f64 = parse_field(field, raw)?;
        if !value.is_finite() {
            return Err(RecordError::NonFinite {
                field,
                value: raw.to_string(),
            });
        }
        Ok(value)
    }

    fn remainder(self) -> &'a str {
        self.rest.trim()
    }
}

fn parse_field<T: FromStr>(field: &'static str, raw: &str) -> Result<T, RecordError> {
    raw.parse().map_err(|_| RecordError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

impl FromStr for Record {
    type Err = RecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::new(line);
        let address = Address {
            house_number: fields.text("house_number")?.to_string(),
            cardinal: fields.text("cardinal")?.to_string(),
            road_number: fields.text("road_number")?.to_string(),
            road_type: fields.text("road_type")?.to_string(),
        };
        let x = fields.float("pos_x")?;
        let y = fields.float("pos_y")?;
        let price = fields.float("price")?;
        let area = fields.float("area")?;
        let room_count = fields.number("room_count")?;
        let bathroom_count = fields.number("bathroom_count")?;
        Ok(Record {
            address,
            position: Point::new(x, y),
            price,
            area,
            room_count,
            bathroom_count,
            features: fields.remainder().to_string(),
        })
    }
}

/// Read every record from `reader`, one per line. Blank lines are skipped.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<Record>, RecordError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = line.parse().map_err(|e| RecordError::AtLine {
            line: idx + 1,
            source: Box::new(e),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write `records` to `writer`, one line each.
pub fn write_records<W: Write>(mut writer: W, records: &[Record]) -> Result<(), RecordError> {
    for record in records {
        writeln!(writer, "{record}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "1234 sw 46th st 120.5 88.25 412500.00 1850.75 4 2 Pool, Home Office";

    #[test]
    fn parses_all_fields() {
        let rec: Record = LINE.parse().unwrap();
        assert_eq!(rec.address.house_number, "1234");
        assert_eq!(rec.address.cardinal, "sw");
        assert_eq!(rec.address.road_number, "46th");
        assert_eq!(rec.address.road_type, "st");
        assert_eq!(rec.position, Point::new(120.5, 88.25));
        assert_eq!(rec.price, 412500.0);
        assert_eq!(rec.area, 1850.75);
        assert_eq!(rec.room_count, 4);
        assert_eq!(rec.bathroom_count, 2);
        assert_eq!(rec.features, "Pool, Home Office");
    }

    #[test]
    fn display_matches_line_format() {
        let rec: Record = LINE.parse().unwrap();
        assert_eq!(rec.to_string(), LINE);
    }

    #[test]
    fn price_has_two_decimals() {
        let rec = Record {
            price: 1000.0 / 3.0,
            ..Default::default()
        };
        assert!(rec.to_string().contains(" 333.33 "));
    }

    #[test]
    fn features_may_be_empty() {
        let rec: Record = "1 ne 2nd ave 0 0 10.00 50.00 1 1\r".parse().unwrap();
        assert_eq!(rec.features, "");
        assert_eq!(rec.to_string(), "1 ne 2nd ave 0 0 10.00 50.00 1 1");
    }

    #[test]
    fn missing_field_is_named() {
        let err = "1 ne 2nd ave 0 0 10.00".parse::<Record>().unwrap_err();
        assert!(matches!(err, RecordError::MissingField("area")));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = "1 ne 2nd ave zero 0 10 5 1 1".parse::<Record>().unwrap_err();
        assert!(matches!(err, RecordError::InvalidNumber { field: "pos_x", .. }));

        let err = "1 ne 2nd ave 0 0 NaN 5 1 1".parse::<Record>().unwrap_err();
        match err {
            RecordError::NonFinite { field, value } => {
                assert_eq!(field, "price");
                assert_eq!(value, "NaN");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = "1 ne 2nd ave 0 0 10 5 -1 1".parse::<Record>().unwrap_err();
        assert!(matches!(err, RecordError::InvalidNumber { field: "room_count", .. }));
    }

    #[test]
    fn read_skips_blank_lines_and_reports_line_numbers() {
        let input = format!("{LINE}\n\n{LINE}\n");
        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let input = format!("{LINE}\n\n1 sw\n");
        match read_records(input.as_bytes()).unwrap_err() {
            RecordError::AtLine { line, source } => {
                assert_eq!(line, 3);
                assert!(matches!(*source, RecordError::MissingField("road_number")));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn write_then_read_preserves_records() {
        let records: Vec<Record> = vec![
            LINE.parse().unwrap(),
            "9 se 1st ave 3 4 99.99 60.00 2 1 Fireplace".parse().unwrap(),
        ];
        let mut buf = Vec::new();
        write_records(&mut buf, &records).unwrap();
        assert_eq!(read_records(buf.as_slice()).unwrap(), records);
    }
}
