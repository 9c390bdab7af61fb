//! Per-type id formats
//!
//! An [`IdFormat`] is a `const` list of segments. Typed ids declare one and
//! get parsing, rendering and their ARM resource type from it.

use super::IdError;

pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const RESOURCE_GROUPS: &str = "resourceGroups";
pub const PROVIDERS: &str = "providers";

/// Namespace used for ids that have no `providers` segment
const RESOURCES_NAMESPACE: &str = "Microsoft.Resources";

/// One unit of an id format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// `/{keyword}/{value}`, the value is user supplied and stored as `field`
    Keyed {
        keyword: &'static str,
        field: &'static str,
    },
    /// `/providers/{namespace}`, fixed
    Provider(&'static str),
}

impl Segment {
    pub const fn keyed(keyword: &'static str, field: &'static str) -> Self {
        Segment::Keyed { keyword, field }
    }

    pub const fn provider(namespace: &'static str) -> Self {
        Segment::Provider(namespace)
    }
}

/// Fixed format of one resource type's id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdFormat {
    segments: &'static [Segment],
}

impl IdFormat {
    pub const fn new(segments: &'static [Segment]) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &'static [Segment] {
        self.segments
    }

    /// Names of the user-supplied fields, in order
    pub fn fields(&self) -> Vec<&'static str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Keyed { field, .. } => Some(*field),
                Segment::Provider(_) => None,
            })
            .collect()
    }

    /// Human readable template, e.g. `/subscriptions/{subscriptionId}/...`
    pub fn template(&self) -> String {
        let mut out = String::new();
        for segment in self.segments {
            match segment {
                Segment::Keyed { keyword, field } => {
                    out.push('/');
                    out.push_str(keyword);
                    out.push_str("/{");
                    out.push_str(field);
                    out.push('}');
                }
                Segment::Provider(namespace) => {
                    out.push('/');
                    out.push_str(PROVIDERS);
                    out.push('/');
                    out.push_str(namespace);
                }
            }
        }
        out
    }

    /// ARM resource type, e.g. `Microsoft.Batch/batchAccounts/pools`
    pub fn arm_type(&self) -> String {
        let mut namespace = None;
        let mut types = Vec::new();
        let mut last_keyword = "";

        for segment in self.segments {
            match segment {
                Segment::Provider(ns) => namespace = Some(*ns),
                Segment::Keyed { keyword, .. } => {
                    last_keyword = keyword;
                    if namespace.is_some() {
                        types.push(*keyword);
                    }
                }
            }
        }

        match namespace {
            Some(ns) => format!("{}/{}", ns, types.join("/")),
            None => format!("{}/{}", RESOURCES_NAMESPACE, last_keyword),
        }
    }

    /// Substitute values into the format without checking them
    pub(crate) fn render(&self, values: &[&str]) -> String {
        let mut values = values.iter();
        let mut out = String::new();
        for segment in self.segments {
            out.push('/');
            match segment {
                Segment::Keyed { keyword, .. } => {
                    out.push_str(keyword);
                    out.push('/');
                    out.push_str(values.next().copied().unwrap_or_default());
                }
                Segment::Provider(namespace) => {
                    out.push_str(PROVIDERS);
                    out.push('/');
                    out.push_str(namespace);
                }
            }
        }
        out
    }

    /// Encode values into an id, rejecting a wrong count or empty values
    pub fn format(&self, values: &[&str]) -> Result<String, IdError> {
        let fields = self.fields();
        let rendered = self.render(values);

        if values.len() != fields.len() {
            return Err(IdError::malformed(
                &rendered,
                format!("expected {} values, got {}", fields.len(), values.len()),
            ));
        }
        if let Some((field, _)) = fields.iter().zip(values).find(|(_, v)| v.is_empty()) {
            return Err(IdError::malformed(
                &rendered,
                format!("value for `{}` is empty", field),
            ));
        }
        if let Some((field, _)) = fields.iter().zip(values).find(|(_, v)| v.contains('/')) {
            return Err(IdError::malformed(
                &rendered,
                format!("value for `{}` contains `/`", field),
            ));
        }

        Ok(rendered)
    }

    /// Decode an id string against this format
    pub fn parse(&self, input: &str) -> Result<ParsedId, IdError> {
        if input.is_empty() {
            return Err(IdError::malformed(input, "id is empty"));
        }

        let path = input.strip_prefix('/').unwrap_or(input);
        let mut components = path.split('/');
        let mut values = Vec::with_capacity(self.segments.len());

        for segment in self.segments {
            match *segment {
                Segment::Keyed { keyword, field } => {
                    expect_keyword(input, &mut components, keyword)?;
                    match components.next() {
                        Some(value) if !value.is_empty() => {
                            values.push((field, value.to_string()));
                        }
                        _ => {
                            return Err(IdError::malformed(
                                input,
                                format!("segment `{}` has no value for `{}`", keyword, field),
                            ))
                        }
                    }
                }
                Segment::Provider(namespace) => {
                    expect_keyword(input, &mut components, PROVIDERS)?;
                    expect_keyword(input, &mut components, namespace)?;
                }
            }
        }

        let remaining: Vec<&str> = components.collect();
        check_remaining(input, &remaining)?;

        Ok(ParsedId {
            input: input.to_string(),
            values,
        })
    }
}

/// Consume the next component and require it to be exactly `keyword`
pub(crate) fn expect_keyword<'a>(
    input: &str,
    components: &mut impl Iterator<Item = &'a str>,
    keyword: &str,
) -> Result<(), IdError> {
    match components.next() {
        Some(found) if found == keyword => Ok(()),
        None | Some("") => Err(IdError::malformed(
            input,
            format!("missing segment `{}`", keyword),
        )),
        Some(found) if found.eq_ignore_ascii_case(keyword) => Err(IdError::malformed(
            input,
            format!("segment `{}` must be spelled `{}`", found, keyword),
        )),
        Some(found) => Err(IdError::malformed(
            input,
            format!("expected segment `{}`, found `{}`", keyword, found),
        )),
    }
}

/// Leftover components: empty ones are a malformed path, anything else is trailing content
pub(crate) fn check_remaining(input: &str, remaining: &[&str]) -> Result<(), IdError> {
    if remaining.is_empty() {
        return Ok(());
    }
    if remaining.iter().any(|c| c.is_empty()) {
        return Err(IdError::malformed(input, "empty path segment"));
    }
    Err(IdError::unexpected(input, remaining))
}

/// Field values decoded by [`IdFormat::parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId {
    input: String,
    values: Vec<(&'static str, String)>,
}

impl ParsedId {
    /// The string this was decoded from
    pub fn input(&self) -> &str {
        &self.input
    }

    /// (field, value) pairs in format order
    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.values
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Remove and return a field's value
    pub fn take(&mut self, field: &str) -> Result<String, IdError> {
        match self.values.iter().position(|(name, _)| *name == field) {
            Some(idx) => Ok(self.values.remove(idx).1),
            None => Err(IdError::malformed(
                &self.input,
                format!("no value for `{}`", field),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: IdFormat = IdFormat::new(&[
        Segment::keyed(SUBSCRIPTIONS, "subscriptionId"),
        Segment::keyed(RESOURCE_GROUPS, "resourceGroupName"),
        Segment::provider("Microsoft.Batch"),
        Segment::keyed("batchAccounts", "batchAccountName"),
        Segment::keyed("pools", "poolName"),
    ]);

    const GROUP: IdFormat = IdFormat::new(&[
        Segment::keyed(SUBSCRIPTIONS, "subscriptionId"),
        Segment::keyed(RESOURCE_GROUPS, "resourceGroupName"),
    ]);

    const POOL_ID: &str =
        "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Batch/batchAccounts/acct/pools/p1";

    #[test]
    fn test_template_and_arm_type() {
        assert_eq!(
            POOL.template(),
            "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.Batch/batchAccounts/{batchAccountName}/pools/{poolName}"
        );
        assert_eq!(POOL.arm_type(), "Microsoft.Batch/batchAccounts/pools");
        assert_eq!(GROUP.arm_type(), "Microsoft.Resources/resourceGroups");
    }

    #[test]
    fn test_parse_extracts_values_in_order() {
        let parsed = POOL.parse(POOL_ID).unwrap();
        let fields: Vec<&str> = parsed.pairs().iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, POOL.fields());
        assert_eq!(parsed.get("poolName"), Some("p1"));
        assert_eq!(parsed.get("batchAccountName"), Some("acct"));
    }

    #[test]
    fn test_leading_slash_is_optional() {
        let parsed = GROUP.parse("subscriptions/sub1/resourceGroups/rg1").unwrap();
        assert_eq!(parsed.get("resourceGroupName"), Some("rg1"));
    }

    #[test]
    fn test_wrong_namespace_is_malformed() {
        let err = POOL
            .parse("/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Storage/batchAccounts/acct/pools/p1")
            .unwrap_err();
        assert!(matches!(err, IdError::MalformedIdentifier { .. }));
    }

    #[test]
    fn test_namespace_case_is_strict() {
        let err = POOL
            .parse("/subscriptions/sub1/resourceGroups/rg1/providers/microsoft.batch/batchAccounts/acct/pools/p1")
            .unwrap_err();
        assert!(err.to_string().contains("must be spelled `Microsoft.Batch`"));
    }

    #[test]
    fn test_trailing_slash_after_complete_id_is_malformed() {
        let err = GROUP.parse("/subscriptions/sub1/resourceGroups/rg1/").unwrap_err();
        assert!(matches!(err, IdError::MalformedIdentifier { .. }));
    }

    #[test]
    fn test_double_slash_is_malformed() {
        let err = GROUP.parse("/subscriptions//resourceGroups/rg1").unwrap_err();
        assert!(matches!(err, IdError::MalformedIdentifier { .. }));
    }

    #[test]
    fn test_extra_segments_are_unexpected() {
        let err = GROUP
            .parse("/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Batch")
            .unwrap_err();
        assert_eq!(
            err,
            IdError::UnexpectedSegments {
                input: "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Batch".into(),
                remaining: "providers/Microsoft.Batch".into(),
            }
        );
    }

    #[test]
    fn test_format_rejects_bad_values() {
        assert!(GROUP.format(&["sub1"]).is_err());
        assert!(GROUP.format(&["sub1", ""]).is_err());
        assert!(GROUP.format(&["sub1", "a/b"]).is_err());
        assert_eq!(
            GROUP.format(&["sub1", "rg1"]).unwrap(),
            "/subscriptions/sub1/resourceGroups/rg1"
        );
    }

    #[test]
    fn test_take_missing_field() {
        let mut parsed = GROUP.parse("/subscriptions/sub1/resourceGroups/rg1").unwrap();
        assert_eq!(parsed.take("subscriptionId").unwrap(), "sub1");
        assert!(parsed.take("subscriptionId").is_err());
    }
}
