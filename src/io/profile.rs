use std::str::FromStr;

use super::ParseError;

/// One non-comment line of a profile, split on whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based line number in the source text.
    pub line: usize,
    pub tokens: Vec<String>,
}

impl Record {
    pub fn keyword(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or_default()
    }

    pub fn str_field(&self, idx: usize, field: &'static str) -> Result<&str, ParseError> {
        self.tokens
            .get(idx)
            .map(String::as_str)
            .ok_or(ParseError::MissingField {
                line: self.line,
                field,
            })
    }

    pub fn f64_field(&self, idx: usize, field: &'static str) -> Result<f64, ParseError> {
        let raw = self.str_field(idx, field)?;
        self.number(raw, field)
    }

    /// Trailing optional numeric field.
    pub fn opt_f64_field(&self, idx: usize, field: &'static str) -> Result<Option<f64>, ParseError> {
        self.tokens
            .get(idx)
            .map(|raw| self.number(raw, field))
            .transpose()
    }

    fn number(&self, raw: &str, field: &'static str) -> Result<f64, ParseError> {
        raw.parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| ParseError::InvalidNumber {
                line: self.line,
                field,
                value: raw.to_owned(),
            })
    }
}

/// A tokenized case description.
///
/// Empty lines and lines whose first token starts with `*` are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    records: Vec<Record>,
}

impl Profile {
    pub fn parse(text: &str) -> Self {
        let records = text
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let tokens: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
                match tokens.first() {
                    None => None,
                    Some(first) if first.starts_with('*') => None,
                    Some(_) => Some(Record {
                        line: idx + 1,
                        tokens,
                    }),
                }
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromStr for Profile {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Profile::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_dropped() {
        let profile = Profile::parse("* header\n\n  SYSBASE   100\n*THLOAD x\nTHLOAD L1 B1 10 5\n");
        assert_eq!(profile.len(), 2);
        assert_eq!(profile.records()[0].line, 3);
        assert_eq!(profile.records()[0].tokens, vec!["SYSBASE", "100"]);
        assert_eq!(profile.records()[1].keyword(), "THLOAD");
        assert_eq!(profile.records()[1].line, 5);
    }

    #[test]
    fn field_errors_carry_line_numbers() {
        let profile = Profile::parse("THLOAD L1 B1 ten\n");
        let rec = &profile.records()[0];
        assert_eq!(rec.str_field(2, "bus").unwrap(), "B1");
        assert_eq!(
            rec.f64_field(3, "P"),
            Err(ParseError::InvalidNumber {
                line: 1,
                field: "P",
                value: "ten".into()
            })
        );
        assert_eq!(
            rec.f64_field(4, "Q"),
            Err(ParseError::MissingField { line: 1, field: "Q" })
        );
        assert_eq!(rec.opt_f64_field(4, "Irated"), Ok(None));
    }
}
