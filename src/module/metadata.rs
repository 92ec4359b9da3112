//! The metadata image of a compiled module.
//!
//! An image lists the module's name, the modules it links against and its type
//! table. Images are stored as JSON or YAML; [`ModuleMetadata::decode`] sniffs
//! which one it was given.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type table and link information of one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Module name, also used to resolve it as a dependency
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Names of the modules this one links against
    #[serde(default)]
    pub references: Vec<String>,
    /// All types defined by the module
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

/// The kind of a type definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Struct,
    Enum,
}

/// A single type definition from the type table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Short type name (e.g. `UserController`)
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub kind: TypeKind,
    /// Whether the type is visible outside its module
    #[serde(default = "default_exported")]
    pub exported: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Qualified name of the base type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Qualified names of directly implemented interfaces
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Route prefix for entry-point types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Enum variant names
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub operations: Vec<OperationDef>,
}

fn default_exported() -> bool {
    true
}

/// A data member of a class or struct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub optional: bool,
}

/// HTTP methods an operation can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Infers the method from a conventional operation-name prefix
    /// (`GetUser` is GET, `DeleteOrder` is DELETE).
    pub fn from_operation_name(name: &str) -> Option<Self> {
        const PREFIXES: [(&str, HttpMethod); 7] = [
            ("Get", HttpMethod::Get),
            ("Post", HttpMethod::Post),
            ("Put", HttpMethod::Put),
            ("Delete", HttpMethod::Delete),
            ("Patch", HttpMethod::Patch),
            ("Options", HttpMethod::Options),
            ("Head", HttpMethod::Head),
        ];

        PREFIXES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, method)| *method)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an operation parameter is bound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
}

/// A public member of an entry-point type exposed as an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    /// Return type, `None` for void
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ParameterLocation>,
    #[serde(default)]
    pub optional: bool,
}

impl TypeDef {
    /// Fully qualified name (`Namespace.Name`, or just `Name`).
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, self.name),
            _ => self.name.clone(),
        }
    }

    /// Interfaces count as abstract regardless of the flag.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract || self.kind == TypeKind::Interface
    }
}

impl ModuleMetadata {
    /// Decodes a metadata image, choosing JSON when the content starts with `{`
    /// and YAML otherwise.
    pub fn decode(content: &str) -> Result<Self, String> {
        let trimmed = content.trim_start_matches('\u{feff}').trim_start();
        if trimmed.is_empty() {
            return Err("metadata image is empty".to_string());
        }

        if trimmed.starts_with('{') {
            serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON metadata: {}", e))
        } else {
            serde_yaml::from_str(trimmed).map_err(|e| format!("invalid YAML metadata: {}", e))
        }
    }
}

/// Short name of a qualified type name (`A.B.Controller` -> `Controller`).
pub fn short_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_yaml_with_defaults() {
        let yaml = r#"
name: Shop.Api
types:
  - name: UserController
    namespace: Shop.Api.Controllers
    base: Web.Http.ApiController
"#;
        let module = ModuleMetadata::decode(yaml).unwrap();
        assert_eq!(module.name, "Shop.Api");
        assert!(module.references.is_empty());

        let ty = &module.types[0];
        assert_eq!(ty.full_name(), "Shop.Api.Controllers.UserController");
        assert_eq!(ty.kind, TypeKind::Class);
        assert!(ty.exported);
        assert!(!ty.is_abstract());
        assert_eq!(ty.base.as_deref(), Some("Web.Http.ApiController"));
    }

    #[test]
    fn test_decode_json() {
        let json = r#"{"name": "Lib", "references": ["Core"], "types": [{"name": "Thing", "abstract": true}]}"#;
        let module = ModuleMetadata::decode(json).unwrap();
        assert_eq!(module.references, vec!["Core".to_string()]);
        assert!(module.types[0].is_abstract());
        assert_eq!(module.types[0].full_name(), "Thing");
    }

    #[test]
    fn test_decode_rejects_empty_and_garbage() {
        assert!(ModuleMetadata::decode("").is_err());
        assert!(ModuleMetadata::decode("   \n").is_err());
        assert!(ModuleMetadata::decode("{ not json").is_err());
        assert!(ModuleMetadata::decode("\u{7f}ELF\u{2}\u{1}").is_err());
    }

    #[test]
    fn test_interfaces_are_abstract() {
        let yaml = "name: M\ntypes:\n  - name: IRepository\n    kind: interface\n";
        let module = ModuleMetadata::decode(yaml).unwrap();
        assert!(module.types[0].is_abstract());
    }

    #[test]
    fn test_operation_with_parameters() {
        let yaml = r#"
name: M
types:
  - name: OrderController
    operations:
      - name: GetOrder
        route: orders/{id}
        parameters:
          - { name: id, type: int }
        returns: Order
      - name: CancelOrder
        method: DELETE
        parameters:
          - { name: reason, type: string, location: header, optional: true }
"#;
        let module = ModuleMetadata::decode(yaml).unwrap();
        let ops = &module.types[0].operations;
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].parameters[0].type_name, "int");
        assert_eq!(ops[0].method, None);
        assert_eq!(ops[1].method, Some(HttpMethod::Delete));
        assert_eq!(ops[1].parameters[0].location, Some(ParameterLocation::Header));
        assert!(ops[1].parameters[0].optional);
    }

    #[test]
    fn test_method_from_operation_name() {
        assert_eq!(HttpMethod::from_operation_name("GetUsers"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::from_operation_name("DeleteUser"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::from_operation_name("Register"), None);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("System.Web.Mvc.IController"), "IController");
        assert_eq!(short_name("Controller"), "Controller");
    }
}
