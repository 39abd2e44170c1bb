use chrono::NaiveDate;
use serde_json::Value;

use super::{parse_list, scalar_text};
use crate::error::AdminError;

/// 2^63; whole floats outside [-2^63, 2^63) do not fit an i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Typed view over request params. Every accessor takes the accepted aliases
/// for one field, canonical name first; the first alias with a non-null value
/// wins.
#[derive(Clone, Copy)]
pub struct Params<'a> {
    raw: &'a Value,
}

impl<'a> Params<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &'a Value {
        self.raw
    }

    fn lookup(&self, aliases: &[&str]) -> Option<&'a Value> {
        aliases
            .iter()
            .filter_map(|a| self.raw.get(*a))
            .find(|v| !v.is_null())
    }

    fn name<'n>(aliases: &[&'n str]) -> &'n str {
        aliases.first().copied().unwrap_or("value")
    }

    pub fn opt_text(&self, aliases: &[&str]) -> Option<String> {
        self.lookup(aliases)
            .and_then(scalar_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn required_text(&self, aliases: &[&str]) -> Result<String, AdminError> {
        self.opt_text(aliases).ok_or_else(|| {
            AdminError::bad_params(format!("{} must not be empty", Self::name(aliases)))
        })
    }

    /// Empty and null become `None`. Anything else must be a whole number.
    pub fn int(&self, aliases: &[&str]) -> Result<Option<i64>, AdminError> {
        let Some(v) = self.lookup(aliases) else {
            return Ok(None);
        };
        let bad = || AdminError::bad_params(format!("{} must be a whole number", Self::name(aliases)));
        match v {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Some(i)),
                None => n
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(f))
                    .map(|f| Some(f as i64))
                    .ok_or_else(bad),
            },
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| bad()),
            _ => Err(bad()),
        }
    }

    /// Empty and null become `None`. Non-finite and non-numeric input is rejected.
    pub fn number(&self, aliases: &[&str]) -> Result<Option<f64>, AdminError> {
        let Some(v) = self.lookup(aliases) else {
            return Ok(None);
        };
        let bad = || AdminError::bad_params(format!("{} must be a number", Self::name(aliases)));
        match v {
            Value::Number(n) => n.as_f64().map(Some).ok_or_else(bad),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Some(f)),
                _ => Err(bad()),
            },
            _ => Err(bad()),
        }
    }

    pub fn flag(&self, aliases: &[&str], default: bool) -> Result<bool, AdminError> {
        match self.lookup(aliases) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) if n.as_i64() == Some(0) => Ok(false),
            Some(Value::Number(n)) if n.as_i64() == Some(1) => Ok(true),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                "" => Ok(default),
                _ => Err(AdminError::bad_params(format!(
                    "{} must be boolean",
                    Self::name(aliases)
                ))),
            },
            Some(_) => Err(AdminError::bad_params(format!(
                "{} must be boolean",
                Self::name(aliases)
            ))),
        }
    }

    pub fn list(&self, aliases: &[&str]) -> Vec<String> {
        self.lookup(aliases).map(parse_list).unwrap_or_default()
    }

    /// `YYYY-MM-DD`, normalized.
    pub fn date(&self, aliases: &[&str]) -> Result<Option<String>, AdminError> {
        let Some(s) = self.opt_text(aliases) else {
            return Ok(None);
        };
        // Datetime values from the intake form carry a time part; keep the date.
        let day = s.get(..10).unwrap_or(&s);
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map(|d| Some(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| {
                AdminError::bad_params(format!("{} must be a YYYY-MM-DD date", Self::name(aliases)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_resolve_in_order() {
        let raw = json!({ "course_name": "BCA", "course": null });
        let p = Params::new(&raw);
        assert_eq!(
            p.opt_text(&["courseName", "course", "course_name"]),
            Some("BCA".to_string())
        );
    }

    #[test]
    fn numbers_reject_garbage_instead_of_propagating() {
        let raw = json!({ "semester": "abc", "amount": "NaN", "blank": "", "fee": "1500" });
        let p = Params::new(&raw);
        assert!(p.int(&["semester"]).is_err());
        assert!(p.number(&["amount"]).is_err());
        assert_eq!(p.int(&["blank"]).expect("blank"), None);
        assert_eq!(p.number(&["fee"]).expect("fee"), Some(1500.0));
        assert_eq!(p.int(&["missing"]).expect("missing"), None);
    }

    #[test]
    fn whole_floats_must_fit_an_integer() {
        let raw = json!({ "semester": 2.0, "huge": 1e300, "tiny": -1e19 });
        let p = Params::new(&raw);
        assert_eq!(p.int(&["semester"]).expect("2.0"), Some(2));
        assert_eq!(p.int(&["huge"]).expect_err("1e300").code(), "bad_params");
        assert!(p.int(&["tiny"]).is_err());
    }

    #[test]
    fn dates_are_normalized() {
        let raw = json!({ "paidOn": "2024-06-01T10:15:00Z", "bad": "01/06/2024" });
        let p = Params::new(&raw);
        assert_eq!(
            p.date(&["paidOn"]).expect("date"),
            Some("2024-06-01".to_string())
        );
        assert!(p.date(&["bad"]).is_err());
    }
}
