//! Argument parsing shared by command handlers.
//!
//! Commands take positional arguments followed by optional `--flag value` pairs.

use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

use chrono::NaiveDate;
use estate_core::FilterState;
use estate_domain::{TimeInterval, TimeUnit};

use super::context::CommandError;

pub struct Args<'a> {
    positional: Vec<&'a str>,
    flags: HashMap<String, &'a str>,
    switches: HashSet<String>,
}

impl<'a> Args<'a> {
    pub fn parse(raw: &[&'a str]) -> Result<Self, CommandError> {
        Self::parse_with_switches(raw, &[])
    }

    /// Like [`Args::parse`], but the named flags take no value.
    pub fn parse_with_switches(raw: &[&'a str], known: &[&str]) -> Result<Self, CommandError> {
        let mut positional = Vec::new();
        let mut flags = HashMap::new();
        let mut switches = HashSet::new();
        let mut iter = raw.iter().copied();
        while let Some(token) = iter.next() {
            match token.strip_prefix("--") {
                Some(name) if known.iter().any(|known| known.eq_ignore_ascii_case(name)) => {
                    switches.insert(name.to_ascii_lowercase());
                }
                Some(name) if !name.is_empty() => {
                    let value = iter
                        .next()
                        .ok_or_else(|| CommandError::usage(format!("flag --{} needs a value", name)))?;
                    flags.insert(name.to_ascii_lowercase(), value);
                }
                _ => positional.push(token),
            }
        }
        Ok(Self {
            positional,
            flags,
            switches,
        })
    }

    pub fn switch(&self, name: &str) -> bool {
        self.switches.contains(name)
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.positional.get(index).copied()
    }

    pub fn required(&self, index: usize, name: &str) -> Result<&'a str, CommandError> {
        self.get(index)
            .ok_or_else(|| CommandError::usage(format!("missing <{}>", name)))
    }

    /// Positional arguments from `index` onwards joined with spaces.
    pub fn rest(&self, index: usize) -> Option<String> {
        let rest = self.positional.get(index..)?;
        (!rest.is_empty()).then(|| rest.join(" "))
    }

    pub fn flag(&self, name: &str) -> Option<&'a str> {
        self.flags.get(name).copied()
    }

    pub fn flag_parsed<T>(&self, name: &str) -> Result<Option<T>, CommandError>
    where
        T: FromStr<Err = String>,
    {
        self.flag(name).map(parse_label).transpose()
    }

    pub fn flag_date(&self, name: &str) -> Result<Option<NaiveDate>, CommandError> {
        self.flag(name).map(|raw| parse_date(name, raw)).transpose()
    }

    pub fn flag_amount(&self, name: &str) -> Result<Option<f64>, CommandError> {
        self.flag(name).map(|raw| parse_amount(name, raw)).transpose()
    }

    /// Listing filters: `--search --status --from --to --min --max --sort --order --page --limit`.
    pub fn filter_state(&self) -> Result<FilterState, CommandError> {
        let pairs = FILTER_FLAGS
            .iter()
            .filter_map(|(flag, key)| self.flag(flag).map(|value| (*key, value)));
        Ok(FilterState::from_query(pairs)?)
    }
}

const FILTER_FLAGS: [(&str, &str); 10] = [
    ("search", "search"),
    ("status", "status"),
    ("from", "from"),
    ("to", "to"),
    ("min", "minAmount"),
    ("max", "maxAmount"),
    ("sort", "sortBy"),
    ("order", "sortOrder"),
    ("page", "page"),
    ("limit", "limit"),
];

pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CommandError::usage(format!("{} must be a date in YYYY-MM-DD form", field)))
}

pub fn parse_amount(field: &str, raw: &str) -> Result<f64, CommandError> {
    let value: f64 = raw
        .trim()
        .replace(',', "")
        .parse()
        .map_err(|_| CommandError::usage(format!("{} must be a number", field)))?;
    if !value.is_finite() {
        return Err(CommandError::usage(format!("{} must be a finite number", field)));
    }
    Ok(value)
}

pub fn parse_label<T>(raw: &str) -> Result<T, CommandError>
where
    T: FromStr<Err = String>,
{
    raw.parse().map_err(CommandError::InvalidArguments)
}

/// `monthly`, `quarterly`, `yearly`, `weekly`, or `<n>-<unit>` such as `2-months`.
pub fn parse_interval(raw: &str) -> Result<TimeInterval, CommandError> {
    let normalized = raw.trim().to_ascii_lowercase();
    let (every, unit) = match normalized.as_str() {
        "daily" => (1, TimeUnit::Day),
        "weekly" => (1, TimeUnit::Week),
        "monthly" => (1, TimeUnit::Month),
        "quarterly" => (3, TimeUnit::Month),
        "yearly" | "annually" => (1, TimeUnit::Year),
        other => {
            let (count, unit) = other
                .split_once('-')
                .ok_or_else(|| CommandError::usage(format!("unknown billing interval `{}`", raw)))?;
            let every: u32 = count
                .parse()
                .ok()
                .filter(|every| *every > 0)
                .ok_or_else(|| CommandError::usage("interval count must be a positive number"))?;
            let unit = match unit.trim_end_matches('s') {
                "day" => TimeUnit::Day,
                "week" => TimeUnit::Week,
                "month" => TimeUnit::Month,
                "year" => TimeUnit::Year,
                _ => return Err(CommandError::usage(format!("unknown interval unit `{}`", unit))),
            };
            (every, unit)
        }
    };
    Ok(TimeInterval { every, unit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_split_from_positionals() {
        let raw = ["Harbour", "--due", "2025-02-01", "HV"];
        let args = Args::parse(&raw).unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args.get(1), Some("HV"));
        assert_eq!(
            args.flag_date("due").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 1)
        );
        assert!(Args::parse(&["--due"]).is_err());

        let args = Args::parse_with_switches(&["--draft", "A1"], &["draft"]).unwrap();
        assert!(args.switch("draft"));
        assert_eq!(args.get(0), Some("A1"));
    }

    #[test]
    fn intervals_accept_names_and_counts() {
        assert_eq!(parse_interval("quarterly").unwrap().every, 3);
        let interval = parse_interval("2-weeks").unwrap();
        assert_eq!((interval.every, interval.unit), (2, TimeUnit::Week));
        assert!(parse_interval("0-months").is_err());
        assert!(parse_interval("fortnightly").is_err());
    }

    #[test]
    fn filter_flags_map_onto_query_keys() {
        let raw = ["--search", "harbour", "--min", "100", "--page", "2"];
        let state = Args::parse(&raw).unwrap().filter_state().unwrap();
        assert_eq!(state.search.as_deref(), Some("harbour"));
        assert_eq!(state.amount_min, Some(100.0));
        assert_eq!(state.page, 2);
        assert!(Args::parse(&["--page", "0"]).unwrap().filter_state().is_err());
    }

    #[test]
    fn amounts_reject_garbage() {
        assert_eq!(parse_amount("rent", "1,500.50").unwrap(), 1500.5);
        assert!(parse_amount("rent", "NaN").is_err());
        assert!(parse_amount("rent", "abc").is_err());
    }
}
