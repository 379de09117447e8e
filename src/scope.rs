//! Scope matcher
//!
//! Decides whether an IP or FQDN may be probed. Each category is configured
//! with exact literals, an optional file of extra literals and a list of
//! regular expressions. A category with none of these is unconstrained and
//! matches everything.

use crate::config::ScopeSettings;
use crate::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Kind of identifier a scope rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Ip,
    Fqdn,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Ip, Category::Fqdn];

    /// `Ip` when the identifier is an IP literal, `Fqdn` otherwise
    pub fn infer(identifier: &str) -> Self {
        if identifier.parse::<IpAddr>().is_ok() {
            Category::Ip
        } else {
            Category::Fqdn
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Ip => write!(f, "ip"),
            Category::Fqdn => write!(f, "fqdn"),
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ip" | "ips" => Ok(Category::Ip),
            "fqdn" | "fqdns" => Ok(Category::Fqdn),
            other => Err(Error::config(format!(
                "invalid scope category `{}`, use: ip, fqdn",
                other
            ))),
        }
    }
}

/// Configured scope for one category
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeRule {
    /// Exact identifiers
    pub list: Vec<String>,
    /// File with one identifier per line, appended to `list`
    pub file: Option<PathBuf>,
    /// Patterns matched anywhere in the identifier
    pub regex: Vec<String>,
}

impl ScopeRule {
    fn scope_file(&self) -> Option<&Path> {
        self.file
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// True when no literal, file or pattern is configured
    pub fn is_unconstrained(&self) -> bool {
        self.list.is_empty() && self.scope_file().is_none() && self.regex.is_empty()
    }

    pub(crate) fn problems(&self, category: Category) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some(path) = self.scope_file() {
            if !path.is_file() {
                problems.push(format!(
                    "scope.{}.file {} not found",
                    category,
                    path.display()
                ));
            }
        }
        for pattern in &self.regex {
            if let Err(e) = Regex::new(pattern) {
                problems.push(format!("scope.{}.regex `{}`: {}", category, pattern, e));
            }
        }

        problems
    }

    /// Configured literals plus the lines of the scope file
    fn literals(&self) -> Result<HashSet<String>> {
        let mut literals: HashSet<String> = self.list.iter().cloned().collect();

        if let Some(path) = self.scope_file() {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
            literals.extend(
                content
                    .lines()
                    .map(|line| line.trim_end_matches(|c: char| c == '\r' || c == '\n'))
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
        }

        Ok(literals)
    }
}

/// One category, with its file read and patterns compiled
#[derive(Debug, Clone)]
struct CompiledScope {
    literals: HashSet<String>,
    patterns: Vec<Regex>,
}

impl CompiledScope {
    fn compile(rule: &ScopeRule) -> Result<Self> {
        let patterns = rule
            .regex
            .iter()
            .map(|p| Regex::new(p).map_err(|e| Error::config(format!("regex `{}`: {}", p, e))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            literals: rule.literals()?,
            patterns,
        })
    }

    fn matches(&self, identifier: &str) -> bool {
        if self.literals.contains(identifier) {
            return true;
        }
        if self.patterns.iter().any(|re| re.is_match(identifier)) {
            return true;
        }
        self.literals.is_empty() && self.patterns.is_empty()
    }
}

/// Scope check consulted before any target is probed.
///
/// Built once at configuration load; afterwards it is immutable and can be
/// shared between scanner tasks.
#[derive(Debug, Clone)]
pub struct ScopeMatcher {
    ip: CompiledScope,
    fqdn: CompiledScope,
    any_defined: bool,
}

impl ScopeMatcher {
    pub fn new(settings: &ScopeSettings) -> Result<Self> {
        let problems: Vec<String> = Category::ALL
            .iter()
            .flat_map(|category| settings.rule(*category).problems(*category))
            .collect();
        if !problems.is_empty() {
            return Err(Error::Configuration(problems));
        }

        Ok(Self {
            ip: CompiledScope::compile(&settings.ip)?,
            fqdn: CompiledScope::compile(&settings.fqdn)?,
            any_defined: Category::ALL
                .iter()
                .any(|category| !settings.rule(*category).is_unconstrained()),
        })
    }

    fn compiled(&self, category: Category) -> &CompiledScope {
        match category {
            Category::Ip => &self.ip,
            Category::Fqdn => &self.fqdn,
        }
    }

    pub fn is_in_scope(&self, identifier: &str, category: Category) -> bool {
        self.compiled(category).matches(identifier)
    }

    /// False when neither category has any literal, file or pattern
    pub fn has_any_scope_defined(&self) -> bool {
        self.any_defined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(ip: ScopeRule, fqdn: ScopeRule) -> ScopeMatcher {
        ScopeMatcher::new(&ScopeSettings { ip, fqdn }).unwrap()
    }

    fn literals(values: &[&str]) -> ScopeRule {
        ScopeRule {
            list: values.iter().map(|v| v.to_string()).collect(),
            ..Default::default()
        }
    }

    fn patterns(values: &[&str]) -> ScopeRule {
        ScopeRule {
            regex: values.iter().map(|v| v.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unscoped_category_matches_everything() {
        let m = matcher(ScopeRule::default(), ScopeRule::default());
        assert!(m.is_in_scope("10.0.0.1", Category::Ip));
        assert!(m.is_in_scope("anything.example", Category::Fqdn));
        assert!(m.is_in_scope("", Category::Fqdn));
        assert!(!m.has_any_scope_defined());
    }

    #[test]
    fn test_literal_match() {
        let m = matcher(literals(&["10.0.0.1"]), ScopeRule::default());
        assert!(m.is_in_scope("10.0.0.1", Category::Ip));
        assert!(!m.is_in_scope("10.0.0.2", Category::Ip));
        assert!(!m.is_in_scope("10.0.0.10", Category::Ip));
        // the fqdn category stays unscoped
        assert!(m.is_in_scope("example.com", Category::Fqdn));
        assert!(m.has_any_scope_defined());
    }

    #[test]
    fn test_literal_wins_over_non_matching_regex() {
        let rule = ScopeRule {
            list: vec!["api.other.org".to_string()],
            regex: vec![r"\.example\.com$".to_string()],
            ..Default::default()
        };
        let m = matcher(ScopeRule::default(), rule);
        assert!(m.is_in_scope("api.other.org", Category::Fqdn));
        assert!(m.is_in_scope("www.example.com", Category::Fqdn));
        assert!(!m.is_in_scope("www.other.org", Category::Fqdn));
    }

    #[test]
    fn test_regex_matches_anywhere() {
        let m = matcher(ScopeRule::default(), patterns(&["tesla"]));
        assert!(m.is_in_scope("shop.tesla.com", Category::Fqdn));
        assert!(m.is_in_scope("teslamotors.cn", Category::Fqdn));
        assert!(!m.is_in_scope("example.com", Category::Fqdn));
    }

    #[test]
    fn test_regex_only_scope_is_not_permissive() {
        let m = matcher(patterns(&[r"^192\.168\."]), ScopeRule::default());
        assert!(m.is_in_scope("192.168.1.20", Category::Ip));
        assert!(!m.is_in_scope("8.8.8.8", Category::Ip));
    }

    #[test]
    fn test_scope_file_literals() {
        let path = std::env::temp_dir().join(format!("scope-{}.txt", uuid::Uuid::new_v4()));
        fs::write(&path, "a.example.com\r\nb.example.com\n\n").unwrap();
        let rule = ScopeRule {
            list: vec!["c.example.com".to_string()],
            file: Some(path.clone()),
            ..Default::default()
        };
        let m = matcher(ScopeRule::default(), rule);
        fs::remove_file(&path).ok();

        assert!(m.is_in_scope("a.example.com", Category::Fqdn));
        assert!(m.is_in_scope("b.example.com", Category::Fqdn));
        assert!(m.is_in_scope("c.example.com", Category::Fqdn));
        assert!(!m.is_in_scope("d.example.com", Category::Fqdn));
        assert!(!m.is_in_scope("", Category::Fqdn));
    }

    #[test]
    fn test_empty_scope_file_counts_as_defined_but_matches_all() {
        let path = std::env::temp_dir().join(format!("scope-{}.txt", uuid::Uuid::new_v4()));
        fs::write(&path, "").unwrap();
        let rule = ScopeRule {
            file: Some(path.clone()),
            ..Default::default()
        };
        let m = matcher(rule, ScopeRule::default());
        fs::remove_file(&path).ok();

        assert!(m.has_any_scope_defined());
        assert!(m.is_in_scope("1.2.3.4", Category::Ip));
    }

    #[test]
    fn test_missing_scope_file_is_fatal() {
        let rule = ScopeRule {
            file: Some(PathBuf::from("/nonexistent/scope.txt")),
            ..Default::default()
        };
        let err = ScopeMatcher::new(&ScopeSettings {
            ip: rule,
            fqdn: ScopeRule::default(),
        })
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("scope.ip.file"));
    }

    #[test]
    fn test_non_utf8_scope_file_is_configuration_error() {
        let path = std::env::temp_dir().join(format!("scope-{}.txt", uuid::Uuid::new_v4()));
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let rule = ScopeRule {
            file: Some(path.clone()),
            ..Default::default()
        };
        let err = ScopeMatcher::new(&ScopeSettings {
            ip: ScopeRule::default(),
            fqdn: rule,
        })
        .unwrap_err();
        fs::remove_file(&path).ok();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_empty_file_path_is_ignored() {
        let rule = ScopeRule {
            file: Some(PathBuf::new()),
            ..Default::default()
        };
        assert!(rule.is_unconstrained());
    }

    #[test]
    fn test_invalid_regex_is_fatal() {
        let err = ScopeMatcher::new(&ScopeSettings {
            ip: ScopeRule::default(),
            fqdn: patterns(&["[unclosed"]),
        })
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_has_any_scope_defined_per_category() {
        assert!(matcher(ScopeRule::default(), patterns(&["x"])).has_any_scope_defined());
        assert!(matcher(literals(&["1.1.1.1"]), ScopeRule::default()).has_any_scope_defined());
    }

    #[test]
    fn test_matcher_from_config_file_without_proxy_sources() {
        let path = std::env::temp_dir().join(format!("scope-{}.toml", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            "version = 2\n[proxy]\nactivate = true\n[proxy.links]\n\"http://127.0.0.1:9/list.txt\" = \"http\"\n[scope.fqdn]\nlist = [\"api.example.com\"]\n",
        )
        .unwrap();
        let settings = crate::config::Settings::load(&path).unwrap();
        fs::remove_file(&path).ok();

        let m = ScopeMatcher::new(&settings.scope).unwrap();
        assert!(m.has_any_scope_defined());
        assert!(m.is_in_scope("api.example.com", Category::Fqdn));
        assert!(!m.is_in_scope("www.example.com", Category::Fqdn));
    }

    #[test]
    fn test_category_parsing_and_inference() {
        assert_eq!("IPs".parse::<Category>().unwrap(), Category::Ip);
        assert_eq!("fqdn".parse::<Category>().unwrap(), Category::Fqdn);
        assert!("host".parse::<Category>().is_err());
        assert_eq!(Category::infer("10.1.2.3"), Category::Ip);
        assert_eq!(Category::infer("::1"), Category::Ip);
        assert_eq!(Category::infer("example.com"), Category::Fqdn);
    }
}
