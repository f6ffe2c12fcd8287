//! # Slug expressions
//!
//! Roles and permissions are named by dot-segmented slugs such as
//! `post.edit.title`. Authorization queries are slug expressions: one or more
//! terms separated by `|` (logical OR), where a term may end in `.*` to match
//! every slug below that prefix.
//!
//! ```text
//! expr    := term ('|' term)*
//! term    := segment ('.' segment)* ['.' '*']
//! segment := [a-z_-]+
//! ```
//!
//! Examples:
//!   "post.edit"                  - exactly `post.edit`
//!   "post.edit|post.publish"     - either slug
//!   "post.edit.*"                - `post.edit.title`, `post.edit.body`, ... (not `post.edit`)
//!
//! Parsing splits a term list into fully qualified slugs (matched by
//! equality) and partially qualified prefixes (matched by `LIKE 'prefix%'`),
//! so a store only runs a pattern scan when the expression has wildcards.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::error::{RbacError, RbacResult};

/// Maximum length of a slug, name or description.
pub const MAX_LENGTH: usize = 254;

/// Column names the engine builds predicates against.
pub mod column {
    /// Slug column of the role and permission tables.
    pub const SLUG: &str = "slug";
    /// Role slug column of assignment and binding tables.
    pub const ROLE_SLUG: &str = "role_slug";
    /// Permission slug column of assignment and binding tables.
    pub const PERMISSION_SLUG: &str = "permission_slug";
}

static SLUG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_-]+(\.[a-z_-]+)*$").unwrap());
static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z_ \-]+$").unwrap());
static DESCRIPTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_.,' \-]+$").unwrap());

/// The kinds of text value the engine validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlugKind {
    /// Role or permission slug.
    Slug,
    /// Display name.
    Name,
    /// Free-text description.
    Description,
}

impl SlugKind {
    /// Get string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slug => "slug",
            Self::Name => "name",
            Self::Description => "description",
        }
    }

    /// Human-readable description of the allowed characters.
    pub fn charset(&self) -> &'static str {
        match self {
            Self::Slug => "a-z_- (segments separated by '.')",
            Self::Name => "a-zA-Z_- and space",
            Self::Description => "a-zA-Z_.,-' and space",
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            Self::Slug => &SLUG_REGEX,
            Self::Name => &NAME_REGEX,
            Self::Description => &DESCRIPTION_REGEX,
        }
    }
}

impl fmt::Display for SlugKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a slug, name or description.
///
/// # Arguments
///
/// * `value` - The text to validate
/// * `kind` - Which rules to apply
///
/// # Returns
///
/// `RbacError::Validation` naming the kind and its allowed charset when
/// `value` is empty, longer than [`MAX_LENGTH`], or uses other characters.
///
/// # Example
///
/// ```
/// use platform_access::slug::{validate_or_fail, SlugKind};
///
/// assert!(validate_or_fail("post.edit.title", SlugKind::Slug).is_ok());
/// assert!(validate_or_fail("Post.Edit", SlugKind::Slug).is_err());
/// assert!(validate_or_fail("Edit Posts", SlugKind::Name).is_ok());
/// ```
pub fn validate_or_fail(value: &str, kind: SlugKind) -> RbacResult<()> {
    if value.len() > MAX_LENGTH {
        return Err(RbacError::validation(
            kind,
            format!("{} must be less than {} characters", kind, MAX_LENGTH + 1),
        ));
    }

    if !kind.regex().is_match(value) {
        return Err(RbacError::validation(
            kind,
            format!("the allowed characters for {} must match {}", kind, kind.charset()),
        ));
    }

    Ok(())
}

/// A parsed slug expression.
///
/// Terms are deduplicated by exact string equality and split into fully
/// qualified slugs and wildcard prefixes (`post.edit.*` is kept as the
/// prefix `post.edit.`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlugExpression {
    fully_qualified: Vec<String>,
    partially_qualified: Vec<String>,
}

impl SlugExpression {
    /// Parse a `|`-separated expression.
    ///
    /// An empty string parses to an expression that matches nothing.
    ///
    /// # Example
    ///
    /// ```
    /// use platform_access::SlugExpression;
    ///
    /// let expr = SlugExpression::parse("post.edit|post.publish.*").unwrap();
    /// assert_eq!(expr.fully_qualified(), ["post.edit"]);
    /// assert_eq!(expr.partially_qualified(), ["post.publish."]);
    ///
    /// // AND-composition is not supported
    /// assert!(SlugExpression::parse("post.edit,post.publish").is_err());
    /// ```
    pub fn parse(raw: &str) -> RbacResult<Self> {
        if raw.is_empty() {
            return Ok(Self::default());
        }

        if raw.contains(',') {
            return Err(RbacError::InvalidExpression(format!(
                "'{}': comma-separated (AND) expressions are not supported, use '|' for OR",
                raw
            )));
        }

        Self::from_terms(raw.split('|'))
    }

    /// Build an expression from a sequence of terms.
    ///
    /// Each element is a single term; elements are not split on `|`.
    pub fn from_slugs<I>(slugs: I) -> RbacResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self::from_terms(slugs)
    }

    /// Expression matching exactly one slug, with no wildcard allowed.
    pub fn single(slug: &str) -> RbacResult<Self> {
        if slug.contains('*') {
            return Err(RbacError::InvalidExpression(format!(
                "'{}': wildcards are not accepted for a single lookup",
                slug
            )));
        }
        validate_or_fail(slug, SlugKind::Slug)?;

        Ok(Self {
            fully_qualified: vec![slug.to_string()],
            partially_qualified: Vec::new(),
        })
    }

    fn from_terms<I>(terms: I) -> RbacResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut expr = Self::default();

        for term in terms {
            let term = term.as_ref();
            if term.is_empty() {
                return Err(RbacError::InvalidExpression(
                    "empty term in slug expression".to_string(),
                ));
            }

            if let Some(base) = term.strip_suffix(".*") {
                if base.contains('*') {
                    return Err(Self::misplaced_wildcard(term));
                }
                validate_or_fail(base, SlugKind::Slug)?;
                let prefix = format!("{}.", base);
                if !expr.partially_qualified.contains(&prefix) {
                    expr.partially_qualified.push(prefix);
                }
            } else {
                if term.contains('*') {
                    return Err(Self::misplaced_wildcard(term));
                }
                validate_or_fail(term, SlugKind::Slug)?;
                if !expr.fully_qualified.iter().any(|s| s == term) {
                    expr.fully_qualified.push(term.to_string());
                }
            }
        }

        Ok(expr)
    }

    fn misplaced_wildcard(term: &str) -> RbacError {
        RbacError::InvalidExpression(format!(
            "'{}': the wildcard is only allowed as a whole final segment ('.*')",
            term
        ))
    }

    /// Slugs matched by equality.
    pub fn fully_qualified(&self) -> &[String] {
        &self.fully_qualified
    }

    /// Prefixes matched by wildcard, each ending in `.`.
    pub fn partially_qualified(&self) -> &[String] {
        &self.partially_qualified
    }

    /// Check if any term is fully qualified.
    pub fn has_fully_qualified(&self) -> bool {
        !self.fully_qualified.is_empty()
    }

    /// Check if any term is a wildcard.
    pub fn has_partially_qualified(&self) -> bool {
        !self.partially_qualified.is_empty()
    }

    /// Check if the expression has no terms at all.
    pub fn is_empty(&self) -> bool {
        self.fully_qualified.is_empty() && self.partially_qualified.is_empty()
    }

    /// Build the matching predicate against `column`.
    ///
    /// The predicate reads as `column IN (fully) OR column LIKE 'p1%' OR ...`
    /// and is always false when the expression is empty.
    pub fn build_predicate(&self, column: &str) -> SlugPredicate {
        SlugPredicate {
            column: column.to_string(),
            exact: self.fully_qualified.clone(),
            prefixes: self.partially_qualified.clone(),
        }
    }
}

/// Conversion into a [`SlugExpression`].
///
/// Strings are parsed as `|`-separated expressions; slices, vectors and
/// arrays are treated as sequences of individual terms.
pub trait IntoSlugExpression {
    /// Perform the conversion, validating every term.
    fn into_slug_expression(self) -> RbacResult<SlugExpression>;
}

impl IntoSlugExpression for SlugExpression {
    fn into_slug_expression(self) -> RbacResult<SlugExpression> {
        Ok(self)
    }
}

impl IntoSlugExpression for &SlugExpression {
    fn into_slug_expression(self) -> RbacResult<SlugExpression> {
        Ok(self.clone())
    }
}

impl IntoSlugExpression for &str {
    fn into_slug_expression(self) -> RbacResult<SlugExpression> {
        SlugExpression::parse(self)
    }
}

impl IntoSlugExpression for String {
    fn into_slug_expression(self) -> RbacResult<SlugExpression> {
        SlugExpression::parse(&self)
    }
}

impl IntoSlugExpression for &String {
    fn into_slug_expression(self) -> RbacResult<SlugExpression> {
        SlugExpression::parse(self)
    }
}

impl<S: AsRef<str>> IntoSlugExpression for &[S] {
    fn into_slug_expression(self) -> RbacResult<SlugExpression> {
        SlugExpression::from_slugs(self)
    }
}

impl<S: AsRef<str>> IntoSlugExpression for Vec<S> {
    fn into_slug_expression(self) -> RbacResult<SlugExpression> {
        SlugExpression::from_slugs(self)
    }
}

impl<S: AsRef<str>, const N: usize> IntoSlugExpression for [S; N] {
    fn into_slug_expression(self) -> RbacResult<SlugExpression> {
        SlugExpression::from_slugs(self)
    }
}

/// A slug expression bound to a column.
///
/// Stores compile it to SQL (`IN` plus escaped `LIKE` patterns) or evaluate
/// it in memory with [`SlugPredicate::matches`]; both agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugPredicate {
    column: String,
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl SlugPredicate {
    /// Column the predicate applies to.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Slugs matched by equality (the `IN` list).
    pub fn exact(&self) -> &[String] {
        &self.exact
    }

    /// Prefixes matched by wildcard.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Check if the predicate can match nothing.
    pub fn is_always_false(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    /// `LIKE` patterns for the prefixes, for use with `ESCAPE '\'`.
    ///
    /// `_` is a single-character wildcard in `LIKE` and slugs may contain it,
    /// so it is escaped along with `%` and the escape character itself.
    ///
    /// # Example
    ///
    /// ```
    /// use platform_access::SlugExpression;
    ///
    /// let predicate = SlugExpression::parse("blog_post.*").unwrap().build_predicate("slug");
    /// assert_eq!(predicate.like_patterns(), vec![r"blog\_post.%".to_string()]);
    /// ```
    pub fn like_patterns(&self) -> Vec<String> {
        self.prefixes
            .iter()
            .map(|prefix| {
                let mut pattern = String::with_capacity(prefix.len() + 2);
                for c in prefix.chars() {
                    if matches!(c, '\\' | '%' | '_') {
                        pattern.push('\\');
                    }
                    pattern.push(c);
                }
                pattern.push('%');
                pattern
            })
            .collect()
    }

    /// Evaluate the predicate against a slug.
    ///
    /// # Example
    ///
    /// ```
    /// use platform_access::SlugExpression;
    ///
    /// let predicate = SlugExpression::parse("post.edit.*").unwrap().build_predicate("slug");
    /// assert!(predicate.matches("post.edit.title"));
    /// assert!(!predicate.matches("post.edit"));
    /// assert!(!predicate.matches("post.publish"));
    /// ```
    pub fn matches(&self, slug: &str) -> bool {
        self.exact.iter().any(|s| s == slug)
            || self
                .prefixes
                .iter()
                .any(|prefix| slug.starts_with(prefix.as_str()))
    }
}
