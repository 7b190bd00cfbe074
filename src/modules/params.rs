//! # Parameter schemes and resolution.
//!
//! A [`ParamScheme`] declares, in order, every parameter a module accepts:
//! its code, default value, whether it is mandatory, its command-line prefix
//! and its [`ParamKind`]. [`ParamScheme::resolve`] turns partial user values
//! into a complete [`Params`] map; [`ParamScheme::render`] turns a complete map
//! into argv fragments.
//!
//! ## Rendering rules
//! ```text
//! Value, empty prefix          → [value]
//! Value, prefix ends with '='  → [prefix+value]
//! Value, other prefix          → [prefix, value]      ([prefix] if value is empty)
//! Flag, truthy value           → [prefix]
//! ```
//! A `Value` parameter is skipped when its value is empty and it is not mandatory.
//! A `Flag` is truthy for `true`, `yes`, `on`, `1` (case-insensitive).

use std::collections::BTreeMap;

use crate::error::ModuleError;

/// Current parameter values keyed by parameter code.
pub type Params = BTreeMap<String, String>;

/// How a parameter renders on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParamKind {
    /// Prefix plus value.
    #[default]
    Value,
    /// Bare switch, present when the value is truthy.
    Flag,
}

/// Declaration of one parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter code (key in [`Params`]).
    pub code: String,
    /// Value used when none is supplied.
    pub default: String,
    /// Whether the parameter must resolve to a non-empty value.
    pub mandatory: bool,
    /// Command-line prefix, e.g. `-c` or `--ports=`.
    pub prefix: String,
    /// Rendering kind.
    pub kind: ParamKind,
}

impl ParamSpec {
    /// Optional value parameter.
    pub fn value(code: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            default: String::new(),
            mandatory: false,
            prefix: prefix.into(),
            kind: ParamKind::Value,
        }
    }

    /// Flag parameter, off unless a default says otherwise.
    pub fn flag(code: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::Flag,
            ..Self::value(code, prefix)
        }
    }

    /// Sets the default value.
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    /// Marks the parameter as mandatory.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

/// Ordered set of parameter declarations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParamScheme {
    specs: Vec<ParamSpec>,
}

impl ParamScheme {
    /// Empty scheme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a declaration; a later declaration with the same code replaces the earlier one in place.
    pub fn with(mut self, spec: ParamSpec) -> Self {
        match self.specs.iter_mut().find(|s| s.code == spec.code) {
            Some(slot) => *slot = spec,
            None => self.specs.push(spec),
        }
        self
    }

    /// Declarations in scheme order.
    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    /// Looks up one declaration.
    pub fn get(&self, code: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|s| s.code == code)
    }

    /// Resolves partial values into a complete map.
    ///
    /// Every declared code ends up present. Supplied values win, otherwise the
    /// default is used. Unknown codes and mandatory parameters left empty are errors.
    pub fn resolve(&self, module: &str, partial: &Params) -> Result<Params, ModuleError> {
        if let Some(code) = partial.keys().find(|code| self.get(code).is_none()) {
            return Err(ModuleError::UnknownParam {
                module: module.to_string(),
                code: code.clone(),
            });
        }

        let mut resolved = Params::new();
        for spec in &self.specs {
            let value = partial
                .get(&spec.code)
                .filter(|v| !v.is_empty())
                .unwrap_or(&spec.default);
            if spec.mandatory && value.is_empty() {
                return Err(ModuleError::MissingParam {
                    module: module.to_string(),
                    code: spec.code.clone(),
                });
            }
            resolved.insert(spec.code.clone(), value.clone());
        }
        Ok(resolved)
    }

    /// Renders resolved values into argv fragments, in scheme order.
    pub fn render(&self, params: &Params) -> Vec<String> {
        let mut argv = Vec::new();
        for spec in &self.specs {
            let value = params.get(&spec.code).map(String::as_str).unwrap_or("");
            match spec.kind {
                ParamKind::Flag => {
                    if is_truthy(value) && !spec.prefix.is_empty() {
                        argv.push(spec.prefix.clone());
                    }
                }
                ParamKind::Value => {
                    if value.is_empty() && !spec.mandatory {
                        continue;
                    }
                    if spec.prefix.is_empty() {
                        argv.push(value.to_string());
                    } else if spec.prefix.ends_with('=') {
                        argv.push(format!("{}{}", spec.prefix, value));
                    } else {
                        argv.push(spec.prefix.clone());
                        if !value.is_empty() {
                            argv.push(value.to_string());
                        }
                    }
                }
            }
        }
        argv
    }
}

/// Whether a flag value switches the flag on.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> ParamScheme {
        ParamScheme::new()
            .with(ParamSpec::value("count", "-c").default_value("1").mandatory())
            .with(ParamSpec::flag("alive", "-a").default_value("yes"))
            .with(ParamSpec::flag("quiet", "-q"))
            .with(ParamSpec::value("ports", "--ports="))
            .with(ParamSpec::value("iface", "-i"))
            .with(ParamSpec::value("filter", "").default_value("arp"))
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolve_fills_every_code() {
        let resolved = scheme().resolve("probe", &params(&[("iface", "eth0")])).unwrap();
        assert_eq!(resolved.len(), 6);
        assert_eq!(resolved["count"], "1");
        assert_eq!(resolved["iface"], "eth0");
        assert_eq!(resolved["quiet"], "");
    }

    #[test]
    fn resolve_rejects_unknown_codes() {
        let err = scheme()
            .resolve("probe", &params(&[("colour", "red")]))
            .unwrap_err();
        assert_eq!(err.as_label(), "module_unknown_param");
    }

    #[test]
    fn mandatory_without_default_is_missing() {
        let s = ParamScheme::new().with(ParamSpec::value("target", "").mandatory());
        let err = s.resolve("probe", &Params::new()).unwrap_err();
        assert_eq!(err.as_label(), "module_missing_param");
    }

    #[test]
    fn render_follows_prefix_rules_in_scheme_order() {
        let s = scheme();
        let resolved = s
            .resolve("probe", &params(&[("ports", "22,80"), ("quiet", "off")]))
            .unwrap();
        assert_eq!(s.render(&resolved), vec!["-c", "1", "-a", "--ports=22,80", "arp"]);
    }

    #[test]
    fn truthy_values() {
        for v in ["true", "YES", " on ", "1"] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["", "0", "no", "enabled"] {
            assert!(!is_truthy(v), "{v}");
        }
    }
}
