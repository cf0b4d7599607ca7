//! FHIR Parameters model, used for operation outputs such as `$lookup`

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(default)]
    pub parameter: Vec<ParametersParameter>,
}

fn default_resource_type() -> String {
    "Parameters".to_string()
}

/// One named parameter; only the value[x] types the service emits are modelled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParametersParameter {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_integer: Option<i64>,
}

impl ParametersParameter {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_string: None,
            value_code: None,
            value_uri: None,
            value_integer: None,
        }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self {
            resource_type: default_resource_type(),
            parameter: Vec::new(),
        }
    }

    pub fn string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut p = ParametersParameter::named(name);
        p.value_string = Some(value.into());
        self.parameter.push(p);
        self
    }

    pub fn code(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut p = ParametersParameter::named(name);
        p.value_code = Some(value.into());
        self.parameter.push(p);
        self
    }

    pub fn uri(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut p = ParametersParameter::named(name);
        p.value_uri = Some(value.into());
        self.parameter.push(p);
        self
    }

    /// Find a parameter by name
    pub fn get(&self, name: &str) -> Option<&ParametersParameter> {
        self.parameter.iter().find(|p| p.name == name)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_emits_typed_values() {
        let params = Parameters::new()
            .string("name", "NAMASTE")
            .code("code", "NAM001")
            .uri("system", "http://terminology.india.gov.in/namaste");

        let json = params.to_value();
        assert_eq!(json["resourceType"], "Parameters");
        assert_eq!(json["parameter"][0]["valueString"], "NAMASTE");
        assert_eq!(json["parameter"][1]["valueCode"], "NAM001");
        assert!(json["parameter"][1].get("valueString").is_none());
        assert_eq!(
            params.get("system").and_then(|p| p.value_uri.as_deref()),
            Some("http://terminology.india.gov.in/namaste")
        );
    }
}
