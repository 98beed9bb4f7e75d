// Pin lessons to one PyTorch documentation version

use anyhow::{bail, Result};
use regex::{NoExpand, Regex};

const FRONTMATTER_VERSION_PATTERN: &str = r#"pytorchVersion:\s*"[\d.]+""#;
const DOCS_LINK_PATTERN: &str = r"pytorch\.org/docs/[\d.]+/";

pub struct VersionRewriter {
    frontmatter_version: Regex,
    docs_link: Regex,
}

impl VersionRewriter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            frontmatter_version: Regex::new(FRONTMATTER_VERSION_PATTERN)?,
            docs_link: Regex::new(DOCS_LINK_PATTERN)?,
        })
    }

    /// Rewrite the `pytorchVersion` field and every versioned docs link.
    /// Returns `None` when the lesson already matches `version`.
    pub fn rewrite(&self, lesson: &str, version: &str) -> Result<Option<String>> {
        if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
            bail!("Invalid PyTorch version '{}': expected digits and dots", version);
        }

        let field = format!("pytorchVersion: \"{}\"", version);
        let link = format!("pytorch.org/docs/{}/", version);
        let updated = self
            .frontmatter_version
            .replace_all(lesson, NoExpand(&field));
        let updated = self.docs_link.replace_all(&updated, NoExpand(&link));

        Ok((updated != lesson).then(|| updated.into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_field_and_links() {
        let lesson = "---\ntitle: Tensors\npytorchVersion: \"2.1\"\n---\n\
                      See https://pytorch.org/docs/2.1/tensors.html and \
                      https://pytorch.org/docs/2.0.1/torch.html\n";
        let updated = VersionRewriter::new().unwrap().rewrite(lesson, "2.3").unwrap().unwrap();

        assert!(updated.contains("pytorchVersion: \"2.3\""));
        assert!(updated.contains("https://pytorch.org/docs/2.3/tensors.html"));
        assert!(updated.contains("https://pytorch.org/docs/2.3/torch.html"));
        assert!(!updated.contains("2.1"));
    }

    #[test]
    fn test_unchanged_lesson_is_none() {
        let rewriter = VersionRewriter::new().unwrap();
        let lesson = "---\npytorchVersion: \"2.3\"\n---\nhttps://pytorch.org/docs/stable/nn.html\n";
        assert_eq!(rewriter.rewrite(lesson, "2.3").unwrap(), None);
    }

    #[test]
    fn test_rejects_malformed_version() {
        let rewriter = VersionRewriter::new().unwrap();
        assert!(rewriter.rewrite("pytorchVersion: \"2.1\"", "latest").is_err());
        assert!(rewriter.rewrite("pytorchVersion: \"2.1\"", "").is_err());
    }
}
