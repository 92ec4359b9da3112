//! Document generation seam.
//!
//! The worker hands resolved entry points to a [`DocumentGenerator`] and ships
//! whatever text it returns back to the caller. The crate's own implementation
//! builds an OpenAPI 3.0 document from the operations declared in the module
//! metadata.

use crate::error::{Error, Result};
use crate::module::metadata::TypeDef;
use crate::module::LoadedModule;
use crate::openapi_builder::{OpenApiBuilder, DEFAULT_URL_TEMPLATE};
use crate::schema_generator::SchemaGenerator;
use crate::serializer::serialize_json;
use crate::settings::GeneratorSettings;
use log::{debug, info};

/// Turns resolved entry-point types into a serialized API document.
pub trait DocumentGenerator {
    /// # Errors
    ///
    /// Implementations report their own failures as [`Error::GenerationFailure`].
    fn generate(
        &self,
        module: &LoadedModule,
        entry_points: &[&TypeDef],
        settings: &GeneratorSettings,
    ) -> Result<String>;
}

/// Builds an OpenAPI document from the operations of each entry point.
///
/// Recognised options: `title`, `version`, `description` and
/// `defaultUrlTemplate`. Anything else in the option bag is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationDocumentGenerator;

impl DocumentGenerator for OperationDocumentGenerator {
    fn generate(
        &self,
        module: &LoadedModule,
        entry_points: &[&TypeDef],
        settings: &GeneratorSettings,
    ) -> Result<String> {
        info!(
            "Generating document for {} entry points of {}",
            entry_points.len(),
            module.name()
        );

        let title = settings
            .option_str("title")
            .map(str::to_string)
            .unwrap_or_else(|| module.name().to_string());
        let version = settings.option_str("version").unwrap_or("1.0.0").to_string();
        let description = settings.option_str("description").map(str::to_string);
        let template = settings
            .option_str("defaultUrlTemplate")
            .unwrap_or(DEFAULT_URL_TEMPLATE);

        let mut schema_gen = SchemaGenerator::new(module);
        let mut builder = OpenApiBuilder::new()
            .with_info(title, version, description)
            .with_url_template(template);

        for entry_point in entry_points {
            builder.add_controller(entry_point, &mut schema_gen);
        }

        let document = builder.build(schema_gen);
        debug!("Document has {} paths", document.paths.len());

        serialize_json(&document).map_err(|e| Error::generation(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::metadata::ModuleMetadata;
    use crate::serializer::deserialize_document;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn module() -> LoadedModule {
        let yaml = r#"
name: Shop.Api
version: 2.1.0
types:
  - name: HealthController
    operations:
      - { name: GetStatus, returns: string }
"#;
        LoadedModule::new(
            PathBuf::from("shop.module"),
            ModuleMetadata::decode(yaml).unwrap(),
            Vec::new(),
        )
    }

    #[test]
    fn test_defaults_come_from_the_module() {
        let module = module();
        let settings = GeneratorSettings::new("shop.module");
        let entry_points: Vec<&TypeDef> = module.types().iter().collect();

        let text = OperationDocumentGenerator
            .generate(&module, &entry_points, &settings)
            .unwrap();
        let document = deserialize_document(&text).unwrap();

        assert_eq!(document.openapi, "3.0.0");
        assert_eq!(document.info.title, "Shop.Api");
        assert_eq!(document.info.version, "1.0.0");
        assert!(document.paths.contains_key("/api/Health/GetStatus"));
    }

    #[test]
    fn test_options_are_applied() {
        let module = module();
        let settings = GeneratorSettings::new("shop.module")
            .with_option("title", "Shop")
            .with_option("version", "3.0")
            .with_option("description", "Storefront")
            .with_option("defaultUrlTemplate", "v1/{controller}/{action}")
            .with_option("unknown", 42);
        let entry_points: Vec<&TypeDef> = module.types().iter().collect();

        let text = OperationDocumentGenerator
            .generate(&module, &entry_points, &settings)
            .unwrap();
        let document = deserialize_document(&text).unwrap();

        assert_eq!(document.info.title, "Shop");
        assert_eq!(document.info.version, "3.0");
        assert_eq!(document.info.description.as_deref(), Some("Storefront"));
        assert!(document.paths.contains_key("/v1/Health/GetStatus"));
    }

    #[test]
    fn test_no_entry_points_gives_empty_document() {
        let module = module();
        let settings = GeneratorSettings::new("shop.module");
        let text = OperationDocumentGenerator.generate(&module, &[], &settings).unwrap();
        let document = deserialize_document(&text).unwrap();
        assert!(document.paths.is_empty());
        assert!(document.tags.is_empty());
    }
}
