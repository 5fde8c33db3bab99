use std::fmt;

/// Family and given name, written as a PN value "Family^Given"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonName {
    pub family: String,
    pub given: String,
}

impl PersonName {
    pub fn new(family: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            given: given.into(),
        }
    }

    /// Parse the first two components of a PN value
    pub fn parse(value: &str) -> Self {
        let mut parts = value.trim_end_matches(['\0', ' ']).split('^');
        Self {
            family: parts.next().unwrap_or_default().trim().to_string(),
            given: parts.next().unwrap_or_default().trim().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.family.is_empty() && self.given.is_empty()
    }

    pub fn to_dicom(&self) -> String {
        if self.given.is_empty() {
            self.family.clone()
        } else {
            format!("{}^{}", self.family, self.given)
        }
    }
}

impl fmt::Display for PersonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dicom())
    }
}
