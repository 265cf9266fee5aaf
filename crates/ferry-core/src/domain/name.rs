//! File names: the accepted format, sanitization, and public-id derivation.

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::ids::PublicId;

const SEPARATOR: char = '-';
const FALLBACK_STEM: &str = "file";

/// The single file class the store accepts.
///
/// `suffix` is kept lowercase and includes the leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFormat {
    suffix: String,
    content_type: String,
}

impl FileFormat {
    pub fn new(
        suffix: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let suffix = suffix.into().to_lowercase();
        let well_formed = suffix.len() > 1
            && suffix.starts_with('.')
            && suffix[1..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.');
        if !well_formed {
            return Err(ConfigError::InvalidSuffix(suffix));
        }

        let content_type = content_type.into();
        if content_type.trim().is_empty() {
            return Err(ConfigError::InvalidContentType(content_type));
        }

        Ok(Self {
            suffix,
            content_type,
        })
    }

    /// Format for a suffix, with the content type guessed from it.
    pub fn from_suffix(suffix: impl Into<String>) -> Result<Self, ConfigError> {
        let suffix = suffix.into();
        let content_type = guess_content_type(&suffix);
        Self::new(suffix, content_type)
    }

    pub fn pdf() -> Self {
        Self {
            suffix: ".pdf".to_string(),
            content_type: "application/pdf".to_string(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// True when `name` ends with the suffix (case-insensitively) and has a
    /// non-empty stem in front of it.
    pub fn accepts(&self, name: &str) -> bool {
        self.strip_suffix(name).is_some_and(|stem| !stem.is_empty())
    }

    fn strip_suffix<'a>(&self, name: &'a str) -> Option<&'a str> {
        let split = name.len().checked_sub(self.suffix.len())?;
        let tail = name.get(split..)?;
        tail.eq_ignore_ascii_case(&self.suffix)
            .then(|| &name[..split])
    }

    /// Derive the public identifier for `original_name`.
    ///
    /// Lowercases, replaces characters outside `[a-z0-9._-]` with `-`,
    /// collapses runs of `-`, trims `.`, `_` and `-` at both ends of the
    /// stem, and appends the suffix if it was missing. Pure and deterministic.
    pub fn derive_public_id(&self, original_name: &str) -> PublicId {
        let lowered = original_name.to_lowercase();
        let stem = self.strip_suffix(&lowered).unwrap_or(&lowered);

        let mut normalized = normalize_stem(stem);
        if normalized.is_empty() {
            normalized.push_str(FALLBACK_STEM);
        }
        normalized.push_str(&self.suffix);
        PublicId::from_normalized(normalized)
    }
}

impl Default for FileFormat {
    fn default() -> Self {
        Self::pdf()
    }
}

/// Free-function form of [`FileFormat::derive_public_id`].
pub fn derive_public_id(original_name: &str, format: &FileFormat) -> PublicId {
    format.derive_public_id(original_name)
}

/// Characters outside `[a-z0-9._]` become `-`, and runs of `-` collapse
/// into one. `.` and `_` are kept as they are, repeats included.
fn normalize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = match c {
            'a'..='z' | '0'..='9' | '.' | '_' => c,
            _ => SEPARATOR,
        };
        if c == SEPARATOR && out.ends_with(SEPARATOR) {
            continue;
        }
        out.push(c);
    }
    out.trim_matches(|c| matches!(c, '.' | '_' | '-')).to_string()
}

fn guess_content_type(suffix: &str) -> &'static str {
    match suffix.to_lowercase().as_str() {
        ".pdf" => "application/pdf",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".txt" => "text/plain; charset=utf-8",
        ".zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Strip a caller-supplied file name down to a safe download label.
///
/// Keeps only the last path component, drops control characters and
/// surrounding whitespace, and removes leading dots. Everything else is
/// preserved verbatim. Returns `None` when nothing usable is left.
pub fn sanitize_file_name(claimed: &str) -> Option<String> {
    let base = claimed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim_start();

    (!cleaned.is_empty()).then(|| cleaned.to_string())
}
