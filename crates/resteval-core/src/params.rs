//! Declarative parameter schema and sanitization.
//!
//! Every algorithm declares its tunables as [`ParamSpec`]s. Raw run
//! parameters are coerced against that schema: missing or malformed values
//! take the default, numeric strings are accepted, integers are rounded then
//! clamped, and odd-constrained integers are bumped to the next odd value.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use resteval_state::RunParams;

/// Key selecting a named preset in the raw parameters.
pub const PRESET_KEY: &str = "preset";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Int { odd: bool },
    Float,
    Bool,
}

/// One tunable: name, default, inclusive bounds, kind.
///
/// Booleans store `0.0`/`1.0` in `default` and ignore the bounds. Odd
/// integers must declare an odd `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn int(name: &'static str, default: i64, min: i64, max: i64) -> Self {
        Self {
            name,
            default: default as f64,
            min: min as f64,
            max: max as f64,
            kind: ParamKind::Int { odd: false },
        }
    }

    pub const fn odd_int(name: &'static str, default: i64, min: i64, max: i64) -> Self {
        Self {
            name,
            default: default as f64,
            min: min as f64,
            max: max as f64,
            kind: ParamKind::Int { odd: true },
        }
    }

    pub const fn float(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            default,
            min,
            max,
            kind: ParamKind::Float,
        }
    }

    pub const fn flag(name: &'static str, default: bool) -> Self {
        Self {
            name,
            default: if default { 1.0 } else { 0.0 },
            min: 0.0,
            max: 1.0,
            kind: ParamKind::Bool,
        }
    }

    fn default_value(&self) -> ParamValue {
        match self.kind {
            ParamKind::Int { .. } => ParamValue::Int(self.default as i64),
            ParamKind::Float => ParamValue::Float(self.default),
            ParamKind::Bool => ParamValue::Bool(self.default != 0.0),
        }
    }

    /// Coerce one raw value; `None` means "use the default".
    pub fn coerce(&self, raw: &Value) -> Option<ParamValue> {
        match self.kind {
            ParamKind::Bool => as_bool(raw).map(ParamValue::Bool),
            ParamKind::Float => {
                as_number(raw).map(|v| ParamValue::Float(v.clamp(self.min, self.max)))
            }
            ParamKind::Int { odd } => as_number(raw).map(|v| {
                let mut n = (v.round().clamp(self.min, self.max)) as i64;
                if odd && n % 2 == 0 {
                    n += 1;
                }
                ParamValue::Int(n)
            }),
        }
    }
}

fn as_number(raw: &Value) -> Option<f64> {
    let v = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn as_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// A named overlay of parameter values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub values: &'static [(&'static str, f64)],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Int(n) => n as f64,
            ParamValue::Float(v) => v,
            ParamValue::Bool(b) => f64::from(u8::from(b)),
        }
    }

    pub fn to_json(&self) -> Value {
        match *self {
            ParamValue::Int(n) => Value::from(n),
            ParamValue::Float(v) => Value::from(v),
            ParamValue::Bool(b) => Value::from(b),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Schema-complete parameter set: every declared name has a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedParams {
    values: BTreeMap<&'static str, ParamValue>,
    preset: Option<&'static str>,
}

impl SanitizedParams {
    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).copied()
    }

    pub fn int(&self, name: &str) -> i64 {
        self.get(name).map(|v| v.as_f64() as i64).unwrap_or(0)
    }

    pub fn float(&self, name: &str) -> f64 {
        self.get(name).map(|v| v.as_f64()).unwrap_or(0.0)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).map(|v| v.as_f64() != 0.0).unwrap_or(false)
    }

    /// Preset that was applied, if any.
    pub fn preset(&self) -> Option<&'static str> {
        self.preset
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ParamValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_json()))
                .collect(),
        )
    }
}

/// Apply defaults, then the selected preset, then explicit values.
pub fn sanitize(schema: &[ParamSpec], presets: &[Preset], raw: &RunParams) -> SanitizedParams {
    let mut out = SanitizedParams::default();
    for spec in schema {
        out.values.insert(spec.name, spec.default_value());
    }

    let wanted = raw
        .get(PRESET_KEY)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase());
    if let Some(preset) = wanted.and_then(|w| presets.iter().find(|p| p.name == w)) {
        for (name, value) in preset.values {
            if let Some(spec) = schema.iter().find(|s| s.name == *name) {
                if let Some(v) = spec.coerce(&Value::from(*value)) {
                    out.values.insert(spec.name, v);
                }
            }
        }
        out.preset = Some(preset.name);
    }

    for spec in schema {
        if let Some(v) = raw.get(spec.name).and_then(|r| spec.coerce(r)) {
            out.values.insert(spec.name, v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const SCHEMA: &[ParamSpec] = &[
        ParamSpec::odd_int("ksize", 5, 3, 31),
        ParamSpec::float("sigma", 1.2, 0.1, 10.0),
        ParamSpec::flag("refine", true),
    ];
    const PRESETS: &[Preset] = &[
        Preset {
            name: "speed",
            values: &[("ksize", 3.0), ("refine", 0.0)],
        },
        Preset {
            name: "quality",
            values: &[("ksize", 9.0), ("sigma", 2.0)],
        },
    ];

    fn raw(pairs: &[(&str, Value)]) -> RunParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn missing_values_take_defaults() {
        let p = sanitize(SCHEMA, PRESETS, &RunParams::new());
        assert_eq!(p.int("ksize"), 5);
        assert_eq!(p.float("sigma"), 1.2);
        assert!(p.flag("refine"));
        assert!(p.preset().is_none());
    }

    #[test]
    fn coercion_rules() {
        let p = sanitize(
            SCHEMA,
            PRESETS,
            &raw(&[
                ("ksize", json!("8")),
                ("sigma", json!(99)),
                ("refine", json!("off")),
            ]),
        );
        assert_eq!(p.int("ksize"), 9);
        assert_eq!(p.float("sigma"), 10.0);
        assert!(!p.flag("refine"));
    }

    #[test]
    fn malformed_values_fall_back() {
        let p = sanitize(
            SCHEMA,
            PRESETS,
            &raw(&[
                ("ksize", json!([1, 2])),
                ("sigma", json!("abc")),
                ("refine", json!({"a": 1})),
            ]),
        );
        assert_eq!(p, sanitize(SCHEMA, PRESETS, &RunParams::new()));
    }

    #[test]
    fn rounding_then_clamping() {
        let p = sanitize(SCHEMA, PRESETS, &raw(&[("ksize", json!(6.6))]));
        assert_eq!(p.int("ksize"), 7);
        let p = sanitize(SCHEMA, PRESETS, &raw(&[("ksize", json!(-40))]));
        assert_eq!(p.int("ksize"), 3);
        let p = sanitize(SCHEMA, PRESETS, &raw(&[("ksize", json!(1000))]));
        assert_eq!(p.int("ksize"), 31);
    }

    #[test]
    fn preset_overlays_then_explicit_wins() {
        let p = sanitize(SCHEMA, PRESETS, &raw(&[("preset", json!("Speed"))]));
        assert_eq!(p.int("ksize"), 3);
        assert!(!p.flag("refine"));
        assert_eq!(p.preset(), Some("speed"));

        let p = sanitize(
            SCHEMA,
            PRESETS,
            &raw(&[("preset", json!("quality")), ("ksize", json!(13))]),
        );
        assert_eq!(p.int("ksize"), 13);
        assert_eq!(p.float("sigma"), 2.0);
    }

    #[test]
    fn unknown_preset_is_ignored() {
        let p = sanitize(SCHEMA, PRESETS, &raw(&[("preset", json!("turbo"))]));
        assert!(p.preset().is_none());
        assert_eq!(p.int("ksize"), 5);
    }

    fn any_json() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<f64>().prop_map(|v| serde_json::Number::from_f64(v)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            any::<bool>().prop_map(Value::from),
            ".{0,8}".prop_map(Value::from),
            Just(Value::Null),
        ]
    }

    proptest! {
        #[test]
        fn sanitized_values_stay_in_schema(k in any_json(), s in any_json(), r in any_json()) {
            let p = sanitize(SCHEMA, PRESETS, &raw(&[("ksize", k), ("sigma", s), ("refine", r)]));
            let ksize = p.int("ksize");
            prop_assert!((3..=31).contains(&ksize));
            prop_assert_eq!(ksize % 2, 1);
            let sigma = p.float("sigma");
            prop_assert!((0.1..=10.0).contains(&sigma));
        }
    }
}
