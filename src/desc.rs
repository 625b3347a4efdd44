//! Metric family descriptors.
//!
//! A [`Descriptor`] is the immutable identity of a metric family: its name, help
//! text and label schema. Descriptors are shared as `Arc<Descriptor>` so callers can
//! tell a reused descriptor from a rebuilt one with [`Arc::ptr_eq`].
//!
//! Construction never fails. Invalid names are recorded on the descriptor and
//! reported as [`CacheError::InvalidMetric`](crate::CacheError::InvalidMetric) when a
//! snapshot is built from it.

use std::collections::HashMap;
use std::fmt;

/// Constant label set, as accepted by `prometheus::Opts::const_labels`.
pub type Labels = HashMap<String, String>;

/// Immutable identity of a metric family.
#[derive(Clone)]
pub struct Descriptor {
    name: String,
    help: String,
    variable_labels: Vec<String>,
    /// Sorted by label name.
    const_labels: Vec<(String, String)>,
    error: Option<String>,
}

impl Descriptor {
    /// Build a descriptor, recording (not returning) any validation error.
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        help: impl Into<String>,
        variable_labels: &[S],
        const_labels: &Labels,
    ) -> Self {
        let name = name.into();
        let help = help.into();
        let variable_labels: Vec<String> = variable_labels
            .iter()
            .map(|l| {
                let l: &str = l.as_ref();
                l.to_string()
            })
            .collect();
        let mut const_labels: Vec<(String, String)> = const_labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        const_labels.sort_by(|a, b| a.0.cmp(&b.0));

        let error = validate(&name, &help, &variable_labels, &const_labels);
        Self {
            name,
            help,
            variable_labels,
            const_labels,
            error,
        }
    }

    /// Fully-qualified metric family name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// Variable label names in declaration order.
    pub fn variable_labels(&self) -> &[String] {
        &self.variable_labels
    }

    /// Constant label pairs, sorted by label name.
    pub fn const_labels(&self) -> &[(String, String)] {
        &self.const_labels
    }

    /// The validation error recorded at construction, if any.
    pub fn validation_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether this descriptor was built from the given help text and label schema.
    ///
    /// Variable labels compare in order; constant labels compare as a set, by value.
    /// The name is not compared since the cache is keyed by it.
    pub fn is_content_equal<S: AsRef<str>>(
        &self,
        help: &str,
        variable_labels: &[S],
        const_labels: &Labels,
    ) -> bool {
        if self.help != help
            || self.variable_labels.len() != variable_labels.len()
            || self.const_labels.len() != const_labels.len()
        {
            return false;
        }
        let vars_equal = self
            .variable_labels
            .iter()
            .zip(variable_labels)
            .all(|(ours, theirs)| {
                let theirs: &str = theirs.as_ref();
                ours == theirs
            });
        vars_equal
            && self
                .const_labels
                .iter()
                .all(|(k, v)| const_labels.get(k) == Some(v))
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.help == other.help
            && self.variable_labels == other.variable_labels
            && self.const_labels == other.const_labels
    }
}

impl Eq for Descriptor {}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("help", &self.help)
            .field("variable_labels", &self.variable_labels)
            .field("const_labels", &self.const_labels)
            .field("error", &self.error)
            .finish()
    }
}

/// Valid chars: `[a-zA-Z_:]` first, `[a-zA-Z0-9_:]` for the rest.
pub(crate) fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Valid chars: `[a-zA-Z_]` first, `[a-zA-Z0-9_]` for the rest. `__` is reserved.
pub(crate) fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate(
    name: &str,
    help: &str,
    variable_labels: &[String],
    const_labels: &[(String, String)],
) -> Option<String> {
    if !is_valid_metric_name(name) {
        return Some(format!("{:?} is not a valid metric name", name));
    }
    if help.is_empty() {
        return Some(format!("help text for {:?} is empty", name));
    }
    let mut seen: Vec<&str> = Vec::with_capacity(variable_labels.len() + const_labels.len());
    let all = const_labels
        .iter()
        .map(|(k, _)| k.as_str())
        .chain(variable_labels.iter().map(String::as_str));
    for label in all {
        if !is_valid_label_name(label) {
            return Some(format!(
                "{:?} is not a valid label name for metric {:?}",
                label, name
            ));
        }
        if seen.contains(&label) {
            return Some(format!(
                "duplicate label name {:?} for metric {:?}",
                label, name
            ));
        }
        seen.push(label);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_content_equal() {
        let consts = labels(&[("zone", "a"), ("env", "prod")]);
        let desc = Descriptor::new("http_requests_total", "Requests", &["method"], &consts);

        assert!(desc.is_content_equal("Requests", &["method"], &consts));
        assert!(!desc.is_content_equal("Other help", &["method"], &consts));
        assert!(!desc.is_content_equal("Requests", &["code"], &consts));
        assert!(!desc.is_content_equal("Requests", &["method", "code"], &consts));
        assert!(!desc.is_content_equal("Requests", &["method"], &labels(&[("zone", "a")])));
        assert!(!desc.is_content_equal(
            "Requests",
            &["method"],
            &labels(&[("zone", "b"), ("env", "prod")])
        ));
    }

    #[test]
    fn test_variable_label_order_matters() {
        let desc = Descriptor::new("m", "help", &["a", "b"], &Labels::new());
        assert!(desc.is_content_equal("help", &["a", "b"], &Labels::new()));
        assert!(!desc.is_content_equal("help", &["b", "a"], &Labels::new()));
    }

    #[test]
    fn test_const_labels_sorted() {
        let desc = Descriptor::new("m", "help", &[] as &[&str], &labels(&[("z", "1"), ("a", "2")]));
        let names: Vec<&str> = desc.const_labels().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["a", "z"]);
    }

    #[test]
    fn test_validation_recorded() {
        let ok = Descriptor::new("ok_metric", "help", &["code"], &Labels::new());
        assert!(ok.validation_error().is_none());

        let bad_name = Descriptor::new("0bad", "help", &[] as &[&str], &Labels::new());
        assert!(bad_name.validation_error().is_some());

        let no_help = Descriptor::new("m", "", &[] as &[&str], &Labels::new());
        assert!(no_help.validation_error().is_some());

        let reserved = Descriptor::new("m", "help", &["__name__"], &Labels::new());
        assert!(reserved.validation_error().is_some());

        let dup = Descriptor::new("m", "help", &["a"], &labels(&[("a", "x")]));
        assert!(dup.validation_error().unwrap().contains("duplicate"));
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_metric_name("ns:sub_metric"));
        assert!(is_valid_metric_name("_x1"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("my-app"));
        assert!(is_valid_label_name("code"));
        assert!(!is_valid_label_name("a:b"));
        assert!(!is_valid_label_name("1a"));
    }
}
