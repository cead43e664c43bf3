//! Discovery vocabulary and host/URL patterns.
//!
//! All of this is data: the defaults below cover the portals we crawl and
//! every list can be replaced from the `discovery` section of `sites.json`.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::catalog::identity::normalize_text;

/// Hard ceiling for intermediate-page recursion regardless of configuration.
pub const MAX_FOLLOW_DEPTH: u8 = 2;

/// Longest cell/list-item text considered by the container heuristic.
pub const MAX_CONTAINER_TEXT_CHARS: usize = 400;

/// Serializable discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// File extensions (without dot) that mark a URL as a document.
    pub document_extensions: Vec<String>,
    /// Words/phrases whose presence in link or container text marks a document.
    pub vocabulary: Vec<String>,
    /// URL path/query fragments used by document servers.
    pub document_path_segments: Vec<String>,
    /// Regexes matched against the host of pages that only link onward.
    pub intermediate_hosts: Vec<String>,
    /// Regexes matched against full URLs that are never documents.
    pub denylist: Vec<String>,
    /// Depth bound for following intermediate pages (clamped to 2).
    pub max_depth: u8,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            document_extensions: owned(&[
                "pdf", "doc", "docx", "odt", "rtf", "xls", "xlsx", "ods", "ppt", "pptx", "zip",
                "rar", "7z",
            ]),
            vocabulary: owned(&[
                "regulamento",
                "anexo",
                "formulario",
                "minuta",
                "guia",
                "guiao",
                "manual",
                "documento",
                "documentacao",
                "descarregar",
                "transferir",
                "download",
                "ficheiro",
                "termos de referencia",
                "caderno de encargos",
                "call text",
                "terms of reference",
                "guidelines",
            ]),
            document_path_segments: owned(&[
                "/documents/",
                "/documentos/",
                "/ficheiros/",
                "/anexos/",
                "/uploads/",
                "/files/",
                "/media/",
                "/download",
                "getfile",
                "getdocument",
                "/api/documentos",
                "attachment",
            ]),
            intermediate_hosts: owned(&[
                r"(^|\.)compete2030\.gov\.pt$",
                r"(^|\.)norte2030\.pt$",
                r"(^|\.)centro2030\.pt$",
                r"(^|\.)lisboa2030\.pt$",
                r"(^|\.)alentejo2030\.pt$",
                r"(^|\.)algarve2030\.pt$",
                r"(^|\.)pessoas2030\.gov\.pt$",
                r"(^|\.)sustentavel2030\.gov\.pt$",
            ]),
            denylist: owned(&[
                r"/(politica-de-privacidade|privacidade|privacy|cookies|termos-e-condicoes|terms|contactos|contacts|faq|mapa-do-site|sitemap|acessibilidade|accessibility|login|registo|newsletter)(/|\?|$)",
                r"(^|[/.])(facebook|twitter|x|linkedin|youtube|instagram|flickr)\.com/",
                r"\.(jpe?g|png|gif|svg|webp|ico|css|js)(\?|$)",
                r"/feed/?$",
            ]),
            max_depth: MAX_FOLLOW_DEPTH,
        }
    }
}

impl DiscoveryConfig {
    /// Compiles the configuration into matchers.
    ///
    /// # Errors
    ///
    /// Returns the first invalid host or denylist regex.
    pub fn compile(&self) -> Result<DiscoveryRules, regex::Error> {
        let compile_all = |patterns: &[String]| -> Result<Vec<Regex>, regex::Error> {
            patterns
                .iter()
                .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
                .collect()
        };
        Ok(DiscoveryRules {
            extensions: self
                .document_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            vocabulary: self
                .vocabulary
                .iter()
                .map(|v| normalize_text(v))
                .filter(|v| !v.is_empty())
                .collect(),
            path_segments: self
                .document_path_segments
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            intermediate_hosts: compile_all(&self.intermediate_hosts)?,
            denylist: compile_all(&self.denylist)?,
            max_depth: self.max_depth.min(MAX_FOLLOW_DEPTH),
        })
    }
}

/// Compiled discovery matchers.
#[derive(Debug, Clone)]
pub struct DiscoveryRules {
    extensions: Vec<String>,
    vocabulary: Vec<String>,
    path_segments: Vec<String>,
    intermediate_hosts: Vec<Regex>,
    denylist: Vec<Regex>,
    max_depth: u8,
}

impl Default for DiscoveryRules {
    /// Rules compiled from [`DiscoveryConfig::default`].
    ///
    /// # Panics
    ///
    /// Panics if a built-in pattern fails to compile. User-supplied patterns
    /// go through [`DiscoveryConfig::compile`], which returns an error instead.
    fn default() -> Self {
        DiscoveryConfig::default()
            .compile()
            .unwrap_or_else(|e| panic!("built-in discovery patterns must compile: {e}"))
    }
}

impl DiscoveryRules {
    /// Effective recursion bound.
    #[must_use]
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    /// Returns true when the URL itself looks like a document (extension or server path).
    #[must_use]
    pub fn is_document_url(&self, url: &Url) -> bool {
        if let Some(ext) = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|last| last.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            && self.extensions.contains(&ext)
        {
            return true;
        }
        let mut haystack = url.path().to_ascii_lowercase();
        if let Some(query) = url.query() {
            haystack.push('?');
            haystack.push_str(&query.to_ascii_lowercase());
        }
        self.path_segments
            .iter()
            .any(|segment| haystack.contains(segment.as_str()))
    }

    /// Returns true when visible text contains a document-indicative term.
    #[must_use]
    pub fn is_indicative_text(&self, text: &str) -> bool {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return false;
        }
        let padded = format!(" {normalized} ");
        self.vocabulary.iter().any(|term| {
            padded.contains(&format!(" {term} "))
                || padded.contains(&format!(" {term}s "))
                || padded.contains(&format!(" {term}es "))
        }) || self
            .extensions
            .iter()
            .any(|ext| padded.contains(&format!(" {ext} ")))
    }

    /// Returns true when the URL matches the generic-navigation denylist.
    #[must_use]
    pub fn is_denied(&self, url: &Url) -> bool {
        let text = url.as_str();
        self.denylist.iter().any(|re| re.is_match(text))
    }

    /// Returns true when the URL's host is an intermediate-results host.
    #[must_use]
    pub fn is_intermediate(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| {
            let host = host.to_ascii_lowercase();
            self.intermediate_hosts.iter().any(|re| re.is_match(&host))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(value: &str) -> Url {
        Url::parse(value).unwrap()
    }

    #[test]
    fn test_document_url_by_extension_and_segment() {
        let rules = DiscoveryRules::default();
        assert!(rules.is_document_url(&url("https://example.gov/x/Aviso.PDF")));
        assert!(rules.is_document_url(&url("https://example.gov/api/documentos/17")));
        assert!(rules.is_document_url(&url("https://example.gov/GetFile.aspx?id=3")));
        assert!(!rules.is_document_url(&url("https://example.gov/avisos/aberto")));
    }

    #[test]
    fn test_indicative_text_ignores_accents_and_plurals() {
        let rules = DiscoveryRules::default();
        assert!(rules.is_indicative_text("Formulário de candidatura"));
        assert!(rules.is_indicative_text("Anexos"));
        assert!(rules.is_indicative_text("Regulamentos"));
        assert!(rules.is_indicative_text("Versão PDF"));
        assert!(!rules.is_indicative_text("Ver mais"));
        assert!(!rules.is_indicative_text(""));
    }

    #[test]
    fn test_denylist_and_intermediate() {
        let rules = DiscoveryRules::default();
        assert!(rules.is_denied(&url("https://example.gov/politica-de-privacidade/")));
        assert!(rules.is_denied(&url("https://www.facebook.com/share?u=x")));
        assert!(rules.is_denied(&url("https://example.gov/logo.png")));
        assert!(!rules.is_denied(&url("https://example.gov/docs/aviso.pdf")));
        assert!(rules.is_intermediate(&url("https://www.norte2030.pt/avisos/12")));
        assert!(!rules.is_intermediate(&url("https://example.gov/")));
    }

    #[test]
    fn test_config_overrides_and_depth_clamp() {
        let config: DiscoveryConfig = serde_json::from_str(
            r#"{ "vocabulary": ["edital"], "intermediate_hosts": ["^landing\\.test$"], "max_depth": 9 }"#,
        )
        .unwrap();
        assert_eq!(config.document_extensions, DiscoveryConfig::default().document_extensions);
        let rules = config.compile().unwrap();
        assert_eq!(rules.max_depth(), MAX_FOLLOW_DEPTH);
        assert!(rules.is_indicative_text("Edital"));
        assert!(!rules.is_indicative_text("Regulamento"));
        assert!(rules.is_intermediate(&url("http://landing.test/x")));
    }

    #[test]
    fn test_builtin_patterns_compile() {
        assert!(DiscoveryConfig::default().compile().is_ok());
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let config = DiscoveryConfig {
            denylist: vec!["(".to_string()],
            ..DiscoveryConfig::default()
        };
        assert!(config.compile().is_err());
    }
}
