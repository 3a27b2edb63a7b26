//! Binding code generation.
//!
//! A [`Generator`] walks the immutable [`DeclModel`] and produces the seven
//! C++ fragments plus the function entries of the signature catalog.
//! Emission goes through the statement model in [`builder`] and the
//! [`printer`].

pub mod builder;
pub mod class;
pub mod function;
pub mod namespace;
pub mod printer;
pub mod typemap;

use tracing::debug;

use crate::config::GeneratorConfig;
use crate::errors::DeclbindResult;
use crate::models::DeclModel;
use crate::store::catalog::SignatureCatalog;

use self::builder::Item;
use self::printer::render_items;

/// The generated C++ fragments, one string per output file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneratedSources {
    pub include: String,
    pub funcs: String,
    pub enums: String,
    pub types: String,
    pub type_reg: String,
    pub ns_reg: String,
    pub type_publish: String,
}

impl GeneratedSources {
    /// `(file suffix, contents)` pairs in output order.
    pub fn fragments(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("include", self.include.as_str()),
            ("funcs", self.funcs.as_str()),
            ("enums", self.enums.as_str()),
            ("types", self.types.as_str()),
            ("type_reg", self.type_reg.as_str()),
            ("ns_reg", self.ns_reg.as_str()),
            ("type_publish", self.type_publish.as_str()),
        ]
    }
}

/// Generation context: the resolved model, the configuration and the
/// catalog being filled.
pub struct Generator<'a> {
    model: &'a DeclModel,
    config: &'a GeneratorConfig,
    catalog: SignatureCatalog,
}

impl<'a> Generator<'a> {
    /// `catalog` carries the class and constant entries recorded during
    /// classification; function entries are added while emitting.
    pub fn new(model: &'a DeclModel, config: &'a GeneratorConfig, catalog: SignatureCatalog) -> Self {
        Self {
            model,
            config,
            catalog,
        }
    }

    pub fn generate(mut self) -> DeclbindResult<(GeneratedSources, SignatureCatalog)> {
        let model = self.model;
        let mut out = GeneratedSources {
            include: self.gen_includes(),
            ..Default::default()
        };

        // Type declarations sorted by name, implementations in declaration
        // order so base types register before their derivatives.
        let mut types: Vec<Item> = Vec::new();
        let mut sorted: Vec<&String> = model.classes.keys().collect();
        sorted.sort();
        for name in sorted {
            if let Some(class) = model.classes.get(name) {
                types.extend(self.gen_type_decl(class));
            }
        }
        for class in model.classes.values() {
            types.extend(self.gen_class(class)?);
            if !class.ismap {
                out.type_reg.push_str(&format!("MKTYPE2({});\n", class.name));
                out.type_publish.push_str(&format!(
                    "PUBLISH_OBJECT(\"{0}\", pyopencv_{0}_Type);\n",
                    class.name
                ));
            }
        }
        out.types = render_items(&types);

        let mut funcs: Vec<Item> = Vec::new();
        let mut ns_reg: Vec<Item> = Vec::new();
        for (ns_name, ns) in &model.namespaces {
            if !self.is_module_namespace(ns_name) {
                debug!(namespace = %ns_name, "outside the module root, skipped");
                continue;
            }
            for id in ns.funcs.values() {
                let func = model.func(*id);
                if func.isconstructor {
                    continue;
                }
                funcs.push(Item::Function(self.gen_function(func)?));
            }
            ns_reg.extend(self.gen_namespace(ns_name, ns));
        }
        ns_reg.extend(self.gen_namespaces_reg());
        out.funcs = render_items(&funcs);
        out.ns_reg = render_items(&ns_reg);

        let mut enums: Vec<&String> = model.enums.values().collect();
        enums.sort();
        let enum_items: Vec<Item> = enums
            .into_iter()
            .flat_map(|name| self.gen_enum_reg(name))
            .collect();
        out.enums = render_items(&enum_items);

        debug!(
            classes = model.classes.len(),
            namespaces = model.namespaces.len(),
            symbols = self.catalog.len(),
            "generation finished"
        );
        Ok((out, self.catalog))
    }

    fn gen_includes(&self) -> String {
        let marker = self.config.include_marker.as_str();
        let mut out = String::new();
        for header in &self.model.headers {
            if let Some(pos) = header.rfind(marker) {
                out.push_str(&format!("#include \"{}\"\n", &header[pos..]));
            }
        }
        out
    }

    fn is_module_namespace(&self, ns_name: &str) -> bool {
        ns_name.split('.').next() == Some(self.config.module_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassInfo, FuncInfo, DeclRecord, Namespace};

    fn model_with_headers(headers: &[&str]) -> DeclModel {
        DeclModel {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_includes_cut_at_marker() {
        let config = GeneratorConfig::default();
        let model = model_with_headers(&[
            "/src/modules/core/include/opencv2/core.hpp",
            "/src/shadow/local.hpp",
        ]);
        let (out, _) = Generator::new(&model, &config, SignatureCatalog::new())
            .generate()
            .unwrap();
        assert_eq!(out.include, "#include \"opencv2/core.hpp\"\n");
    }

    #[test]
    fn test_registration_in_declaration_order() {
        let config = GeneratorConfig::default();
        let mut model = DeclModel::default();
        for qualified in ["cv.Zeta", "cv.Alpha"] {
            let class = ClassInfo::new(qualified, None, &config).unwrap();
            model.classes.insert(class.name.clone(), class);
        }
        let (out, _) = Generator::new(&model, &config, SignatureCatalog::new())
            .generate()
            .unwrap();
        assert_eq!(out.type_reg, "MKTYPE2(Zeta);\nMKTYPE2(Alpha);\n");
        assert!(out
            .type_publish
            .starts_with("PUBLISH_OBJECT(\"Zeta\", pyopencv_Zeta_Type);\n"));
        // Declarations are sorted by name.
        let alpha = out.types.find("struct pyopencv_Alpha_t").unwrap();
        let zeta = out.types.find("struct pyopencv_Zeta_t").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_foreign_namespaces_are_not_emitted() {
        let config = GeneratorConfig::default();
        let mut model = DeclModel::default();
        let decl = DeclRecord {
            name: "other.helper".to_string(),
            base: "void".to_string(),
            ..Default::default()
        };
        let mut func = FuncInfo::new("", "helper", "other::helper", false, "other", false);
        func.add_variant(&decl, false, &config.types).unwrap();
        model.funcs.push(func);
        let mut ns = Namespace::default();
        ns.funcs.insert("helper".to_string(), crate::models::FuncId(0));
        model.namespaces.insert("other".to_string(), ns);

        let (out, catalog) = Generator::new(&model, &config, SignatureCatalog::new())
            .generate()
            .unwrap();
        assert!(out.funcs.is_empty());
        assert!(!out.ns_reg.contains("methods_other"));
        assert!(catalog.is_empty());
    }
}
