use crate::module::metadata::{HttpMethod, OperationDef, ParameterLocation, TypeDef};
use crate::schema_generator::{Schema, SchemaGenerator};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// URL template used for operations without an explicit route
pub const DEFAULT_URL_TEMPLATE: &str = "api/{controller}/{action}/{id?}";

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Info,
    /// One tag per entry-point type
    tags: Vec<Tag>,
    /// Qualified names of the controllers already added
    controllers: HashSet<String>,
    /// Paths collection (URL path -> PathItem)
    paths: BTreeMap<String, PathItem>,
    /// Template applied to operations without a route
    url_template: String,
    /// Suffix stripped from controller names for tags and templates
    controller_suffix: String,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI Tag object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }

    /// All operations of this path in a fixed method order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.post,
            &self.put,
            &self.delete,
            &self.patch,
            &self.options,
            &self.head,
        ]
        .into_iter()
        .flatten()
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Parameters (path, query, header)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query, header)
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    /// Content types and their schemas
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemas: Option<BTreeMap<String, Schema>>,
}

/// Complete API document returned to callers.
///
/// Built inside the worker, serialized to JSON for the trip across the
/// isolation boundary and deserialized again on the caller side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl ApiDocument {
    /// Iterates `(path, operation)` pairs across the whole document
    pub fn operations(&self) -> impl Iterator<Item = (&str, &Operation)> {
        self.paths
            .iter()
            .flat_map(|(path, item)| item.operations().map(move |op| (path.as_str(), op)))
    }
}

fn json_content(schema: Schema) -> BTreeMap<String, MediaType> {
    let mut content = BTreeMap::new();
    content.insert("application/json".to_string(), MediaType { schema });
    content
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: "Generated API".to_string(),
                version: "1.0.0".to_string(),
                description: None,
            },
            tags: Vec::new(),
            controllers: HashSet::new(),
            paths: BTreeMap::new(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            controller_suffix: "Controller".to_string(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    pub fn with_controller_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.controller_suffix = suffix.into();
        self
    }

    /// Controller name used in tags, operation ids and `{controller}` placeholders
    pub fn controller_name<'a>(&self, controller: &'a TypeDef) -> &'a str {
        match controller.name.strip_suffix(&self.controller_suffix) {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => &controller.name,
        }
    }

    /// Add every operation of an entry-point type to the document.
    ///
    /// Adding the same controller twice is a no-op.
    pub fn add_controller(&mut self, controller: &TypeDef, schema_gen: &mut SchemaGenerator) {
        let name = self.controller_name(controller).to_string();
        if !self.controllers.insert(controller.full_name()) {
            debug!("Controller {} already added", controller.full_name());
            return;
        }
        debug!(
            "Adding controller {} with {} operations",
            controller.full_name(),
            controller.operations.len()
        );

        // Same-named controllers from different namespaces share a tag
        if !self.tags.iter().any(|t| t.name == name) {
            self.tags.push(Tag {
                name: name.clone(),
                description: None,
            });
        }

        for op in &controller.operations {
            self.add_operation(controller, &name, op, schema_gen);
        }
    }

    fn add_operation(
        &mut self,
        controller: &TypeDef,
        controller_name: &str,
        op: &OperationDef,
        schema_gen: &mut SchemaGenerator,
    ) {
        let method = op
            .method
            .or_else(|| HttpMethod::from_operation_name(&op.name))
            .unwrap_or(HttpMethod::Post);
        let path = self.operation_path(controller, controller_name, op);
        debug!("Adding operation: {} {}", method, path);

        let path_params = path_parameters(&path);
        let mut parameters = Vec::new();
        let mut request_body = None;

        for p in &op.parameters {
            let location = p.location.unwrap_or_else(|| {
                if path_params.iter().any(|name| name == &p.name) {
                    ParameterLocation::Path
                } else if schema_gen.is_simple(&p.type_name) {
                    ParameterLocation::Query
                } else {
                    ParameterLocation::Body
                }
            });

            let schema = schema_gen.generate_schema(&p.type_name);
            let optional = p.optional || SchemaGenerator::is_nullable(&p.type_name);
            let location = match location {
                ParameterLocation::Body => {
                    if request_body.is_some() {
                        warn!(
                            "Operation {} has more than one body parameter, ignoring {}",
                            op.name, p.name
                        );
                    } else {
                        request_body = Some(RequestBody {
                            required: !optional,
                            content: json_content(schema),
                        });
                    }
                    continue;
                }
                ParameterLocation::Path => "path",
                ParameterLocation::Query => "query",
                ParameterLocation::Header => "header",
            };

            parameters.push(Parameter {
                name: p.name.clone(),
                location: location.to_string(),
                // Path parameters are always required
                required: location == "path" || !optional,
                schema,
            });
        }

        let response = match op.returns.as_deref() {
            Some(returns) if !SchemaGenerator::is_void(returns) => Response {
                description: String::new(),
                content: Some(json_content(schema_gen.generate_schema(returns))),
            },
            _ => Response {
                description: String::new(),
                content: None,
            },
        };
        let mut responses = BTreeMap::new();
        responses.insert("200".to_string(), response);

        let operation = Operation {
            tags: vec![controller_name.to_string()],
            summary: op.summary.clone(),
            operation_id: Some(format!("{}_{}", controller_name, op.name)),
            parameters: if parameters.is_empty() { None } else { Some(parameters) },
            request_body,
            responses,
        };

        let slot = self.paths.entry(path.clone()).or_default().slot(method);
        if slot.is_some() {
            warn!("Duplicate operation {} {}, keeping the first one", method, path);
        } else {
            *slot = Some(operation);
        }
    }

    /// Computes the OpenAPI path of an operation from its route, the controller's
    /// route prefix or the URL template.
    fn operation_path(&self, controller: &TypeDef, controller_name: &str, op: &OperationDef) -> String {
        let route = match (controller.route.as_deref(), op.route.as_deref()) {
            (_, Some(r)) if r.starts_with('/') => r.to_string(),
            (Some(prefix), Some(r)) => format!("{}/{}", prefix, r),
            (None, Some(r)) => r.to_string(),
            (Some(prefix), None) => prefix.to_string(),
            (None, None) => self.url_template.clone(),
        };

        let route = route
            .replace("[controller]", controller_name)
            .replace("{controller}", controller_name)
            .replace("[action]", &op.name)
            .replace("{action}", &op.name);

        let segments: Vec<String> = route
            .split('/')
            .filter(|s| !s.is_empty())
            .filter_map(|segment| normalize_segment(segment, op))
            .collect();

        format!("/{}", segments.join("/"))
    }

    /// Build the final OpenAPI document
    pub fn build(self, schema_gen: SchemaGenerator) -> ApiDocument {
        debug!("Building final OpenAPI document");

        let schemas = schema_gen.into_schemas();
        let components = if !schemas.is_empty() {
            Some(Components {
                schemas: Some(schemas),
            })
        } else {
            None
        };

        ApiDocument {
            openapi: "3.0.0".to_string(),
            info: self.info,
            tags: self.tags,
            paths: self.paths,
            components,
        }
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrites `{id:int}` to `{id}` and drops optional `{x?}` placeholders the
/// operation has no parameter for.
fn normalize_segment(segment: &str, op: &OperationDef) -> Option<String> {
    let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
        return Some(segment.to_string());
    };

    let optional = inner.ends_with('?');
    let name = inner
        .trim_end_matches('?')
        .split(':')
        .next()
        .unwrap_or_default();

    if optional && !op.parameters.iter().any(|p| p.name == name) {
        return None;
    }
    Some(format!("{{{}}}", name))
}

/// Names of `{param}` placeholders in a path
fn path_parameters(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|s| s.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .map(str::to_string)
        .collect()
}
