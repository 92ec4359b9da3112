use crate::module::metadata::{short_name, TypeDef, TypeKind};
use crate::module::LoadedModule;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Schema generator - converts type expressions from module metadata to OpenAPI schemas
pub struct SchemaGenerator<'m> {
    /// Loaded module used for looking up type definitions
    module: &'m LoadedModule,
    /// Generated component schemas, keyed by component name
    schemas: BTreeMap<String, Schema>,
    /// Qualified type name -> component name
    component_names: HashMap<String, String>,
    /// Track types currently being generated to detect circular references
    resolving: HashSet<String>,
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "date-time")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Required field names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for dictionary types
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    /// Enum values for enum types
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Reference to another schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl Schema {
    pub fn primitive(schema_type: &str, format: Option<&str>) -> Self {
        Schema {
            schema_type: Some(schema_type.to_string()),
            format: format.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn reference(component: &str) -> Self {
        Schema {
            reference: Some(format!("#/components/schemas/{}", component)),
            ..Default::default()
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    pub fn object() -> Self {
        Schema::primitive("object", None)
    }
}

/// Wrappers whose single argument is the actual payload
const TASK_WRAPPERS: [&str; 3] = ["Task", "ValueTask", "ActionResult"];
/// Generic collections rendered as arrays
const ARRAY_WRAPPERS: [&str; 7] = [
    "List",
    "IList",
    "IEnumerable",
    "ICollection",
    "IReadOnlyList",
    "IReadOnlyCollection",
    "HashSet",
];
const DICTIONARY_WRAPPERS: [&str; 3] = ["Dictionary", "IDictionary", "IReadOnlyDictionary"];
/// Return types that carry no documented content
const VOID_TYPES: [&str; 6] = [
    "void",
    "Task",
    "ValueTask",
    "IHttpActionResult",
    "IActionResult",
    "HttpResponseMessage",
];

impl<'m> SchemaGenerator<'m> {
    pub fn new(module: &'m LoadedModule) -> Self {
        debug!("Initializing SchemaGenerator for module {}", module.name());
        Self {
            module,
            schemas: BTreeMap::new(),
            component_names: HashMap::new(),
            resolving: HashSet::new(),
        }
    }

    /// Whether a return type carries no body.
    pub fn is_void(type_expr: &str) -> bool {
        VOID_TYPES.contains(&short_name(type_expr.trim()))
    }

    /// Whether the type binds from a single value (path or query string).
    pub fn is_simple(&self, type_expr: &str) -> bool {
        let (inner, _) = split_nullable(type_expr.trim());
        primitive_schema(inner).is_some()
            || self
                .lookup(inner)
                .map(|t| t.kind == TypeKind::Enum)
                .unwrap_or(false)
    }

    /// Whether the type expression is nullable (`T?` or `Nullable<T>`).
    pub fn is_nullable(type_expr: &str) -> bool {
        split_nullable(type_expr.trim()).1
    }

    /// Generate a schema for a type expression
    pub fn generate_schema(&mut self, type_expr: &str) -> Schema {
        let expr = type_expr.trim();
        debug!("Generating schema for type: {}", expr);

        let (expr, nullable) = split_nullable(expr);
        let mut schema = self.generate_non_nullable(expr);
        if nullable && schema.reference.is_none() {
            schema.nullable = Some(true);
        }
        schema
    }

    fn generate_non_nullable(&mut self, expr: &str) -> Schema {
        if let Some(schema) = primitive_schema(expr) {
            return schema;
        }

        // byte[] is a binary payload, not an array of integers
        if let Some(element) = expr.strip_suffix("[]") {
            if matches!(strip_system(element.trim()), "byte" | "Byte") {
                return Schema::primitive("string", Some("byte"));
            }
            return Schema::array(self.generate_schema(element));
        }

        if let Some((outer, args)) = split_generic(expr) {
            let outer = short_name(outer);
            if TASK_WRAPPERS.contains(&outer) && args.len() == 1 {
                return self.generate_schema(args[0]);
            }
            if ARRAY_WRAPPERS.contains(&outer) && args.len() == 1 {
                return Schema::array(self.generate_schema(args[0]));
            }
            if DICTIONARY_WRAPPERS.contains(&outer) && args.len() == 2 {
                let value = self.generate_schema(args[1]);
                return Schema {
                    additional_properties: Some(Box::new(value)),
                    ..Schema::object()
                };
            }
            warn!("Unsupported generic type {}, using its definition name", expr);
            return self.generate_named(outer);
        }

        self.generate_named(expr)
    }

    /// Generate a component schema for a named type and return a reference to it
    fn generate_named(&mut self, name: &str) -> Schema {
        let Some(def) = self.lookup(name) else {
            warn!("Could not resolve type: {}", name);
            return Schema::object();
        };

        let full_name = def.full_name();
        let component = self.component_name(&full_name, &def.name);

        if self.schemas.contains_key(&component) || self.resolving.contains(&full_name) {
            return Schema::reference(&component);
        }

        self.resolving.insert(full_name.clone());
        let schema = match def.kind {
            TypeKind::Enum => Schema {
                enum_values: Some(def.variants.clone()),
                ..Schema::primitive("string", None)
            },
            _ => self.generate_object_schema(def),
        };
        self.resolving.remove(&full_name);

        debug!("Generated component schema {}", component);
        self.schemas.insert(component.clone(), schema);
        Schema::reference(&component)
    }

    /// Build an object schema from the fields of a type and all of its bases
    fn generate_object_schema(&mut self, def: &'m TypeDef) -> Schema {
        let module: &'m LoadedModule = self.module;

        // Base fields first, the type's own fields last so they win on name clashes
        let mut chain: Vec<&'m TypeDef> = module
            .ancestors(def)
            .iter()
            .filter_map(|name| module.find_type(name))
            .collect();
        chain.reverse();
        chain.push(def);

        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        for ty in chain {
            for field in &ty.fields {
                let schema = self.generate_schema(&field.type_name);
                if !field.optional && !Self::is_nullable(&field.type_name) {
                    if !required.contains(&field.name) {
                        required.push(field.name.clone());
                    }
                } else {
                    required.retain(|r| r != &field.name);
                }
                properties.insert(field.name.clone(), schema);
            }
        }

        Schema {
            properties: Some(properties),
            required: if required.is_empty() { None } else { Some(required) },
            ..Schema::object()
        }
    }

    /// Find a type by qualified name, falling back to a unique short-name match
    fn lookup(&self, name: &str) -> Option<&'m TypeDef> {
        let module: &'m LoadedModule = self.module;
        if let Some(def) = module.find_type(name) {
            return Some(def);
        }

        let mut candidates = module
            .types()
            .iter()
            .chain(module.dependencies().iter().flat_map(|m| m.types.iter()))
            .filter(|t| t.name == name);
        let first = candidates.next()?;
        if candidates.next().is_some() {
            warn!("Type name {} is ambiguous, using {}", name, first.full_name());
        }
        Some(first)
    }

    /// Short names are used as component names unless another type already took it
    fn component_name(&mut self, full_name: &str, short: &str) -> String {
        if let Some(existing) = self.component_names.get(full_name) {
            return existing.clone();
        }
        let taken = self.component_names.values().any(|c| c == short);
        let component = if taken {
            full_name.to_string()
        } else {
            short.to_string()
        };
        self.component_names
            .insert(full_name.to_string(), component.clone());
        component
    }

    /// Get all generated component schemas
    pub fn get_schemas(&self) -> &BTreeMap<String, Schema> {
        &self.schemas
    }

    pub fn into_schemas(self) -> BTreeMap<String, Schema> {
        self.schemas
    }
}

fn strip_system(name: &str) -> &str {
    name.strip_prefix("System.").unwrap_or(name)
}

/// Splits `T?` and `Nullable<T>` into `(T, true)`.
fn split_nullable(expr: &str) -> (&str, bool) {
    if let Some(inner) = expr.strip_suffix('?') {
        return (inner.trim(), true);
    }
    if let Some((outer, args)) = split_generic(expr) {
        if short_name(outer) == "Nullable" && args.len() == 1 {
            return (args[0], true);
        }
    }
    (expr, false)
}

/// Splits `Outer<A, B<C>>` into `("Outer", ["A", "B<C>"])`.
fn split_generic(expr: &str) -> Option<(&str, Vec<&str>)> {
    let open = expr.find('<')?;
    let inner = expr.strip_suffix('>')?.get(open + 1..)?;
    let outer = expr[..open].trim();

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(inner[start..].trim());
    Some((outer, args))
}

/// Maps built-in type names (short or `System.` qualified) to schemas
fn primitive_schema(expr: &str) -> Option<Schema> {
    let schema = match strip_system(expr) {
        "string" | "String" | "char" | "Char" => Schema::primitive("string", None),
        "Guid" => Schema::primitive("string", Some("uuid")),
        "DateTime" | "DateTimeOffset" => Schema::primitive("string", Some("date-time")),
        "TimeSpan" => Schema::primitive("string", Some("duration")),
        "Uri" => Schema::primitive("string", Some("uri")),
        "byte" | "Byte" | "sbyte" | "SByte" | "short" | "Int16" | "ushort" | "UInt16"
        | "int" | "Int32" => Schema::primitive("integer", Some("int32")),
        "uint" | "UInt32" | "long" | "Int64" | "ulong" | "UInt64" => {
            Schema::primitive("integer", Some("int64"))
        }
        "float" | "Single" => Schema::primitive("number", Some("float")),
        "double" | "Double" => Schema::primitive("number", Some("double")),
        "decimal" | "Decimal" => Schema::primitive("number", Some("decimal")),
        "bool" | "Boolean" => Schema::primitive("boolean", None),
        "object" | "Object" => Schema::object(),
        _ => return None,
    };
    Some(schema)
}
