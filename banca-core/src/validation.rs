//! Field-level request validation.
//!
//! Checks accumulate into a [`Validator`] so that a client receives every
//! problem with a request at once instead of one per round trip.

use crate::error::{CoreError, FieldError, Result};

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(FieldError {
                field: field.to_string(),
                message: message.into(),
            });
        }
        self
    }

    pub fn required(&mut self, value: &str, field: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, "is required")
    }

    pub fn max_len(&mut self, value: &str, field: &str, max: usize) -> &mut Self {
        self.check(
            value.chars().count() <= max,
            field,
            format!("must be at most {} characters", max),
        )
    }

    pub fn optional_max_len(&mut self, value: Option<&str>, field: &str, max: usize) -> &mut Self {
        match value {
            Some(v) => self.max_len(v, field, max),
            None => self,
        }
    }

    pub fn email(&mut self, value: Option<&str>, field: &str) -> &mut Self {
        match value {
            Some(v) if !v.is_empty() => self.check(is_email(v), field, "must be a valid email"),
            _ => self,
        }
    }

    /// Merge the errors of `inner`, prefixing their fields with e.g. `lines[2]`.
    pub fn nested(&mut self, prefix: &str, inner: Validator) -> &mut Self {
        for e in inner.errors {
            self.errors.push(FieldError {
                field: format!("{}.{}", prefix, e.field),
                message: e.message,
            });
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(self.errors))
        }
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

pub fn is_ip_address(value: &str) -> bool {
    value.parse::<std::net::IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_all_errors() {
        let mut v = Validator::new();
        v.required("", "name").max_len("abcdef", "code", 3).check(true, "ok", "never");

        match v.finish() {
            Err(CoreError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "name");
                assert_eq!(errors[1].field, "code");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_nested_prefix() {
        let mut inner = Validator::new();
        inner.required(" ", "betNumber");
        let mut outer = Validator::new();
        outer.nested("lines[0]", inner);

        let err = outer.finish().unwrap_err();
        assert!(err.to_string().contains("lines[0].betNumber"));
    }

    #[test]
    fn test_email_and_ip() {
        let mut v = Validator::new();
        v.email(Some("ana@banca.do"), "email").email(None, "other");
        assert!(v.is_valid());
        v.email(Some("ana@"), "email");
        assert!(!v.is_valid());

        assert!(is_ip_address("10.0.0.1"));
        assert!(is_ip_address("::1"));
        assert!(!is_ip_address("10.0.0"));
    }
}
