//! Namespace registry: method and constant tables, submodule registration
//! and enum conversion glue.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{normalize_class_name, Namespace};

use super::builder::{Expr, Function, Item, Stmt};
use super::Generator;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());

/// Upper-case alias of a camel-case constant name (`FooBarBaz` ->
/// `FOO_BAR_BAZ`), or `None` when the name is already in that form.
pub fn constant_alias(name: &str) -> Option<String> {
    let alias = CAMEL_BOUNDARY.replace_all(name, "${1}_${2}").to_uppercase();
    (alias != name).then_some(alias)
}

impl Generator<'_> {
    /// Method and constant tables of one namespace.
    pub fn gen_namespace(&self, ns_name: &str, ns: &Namespace) -> Vec<Item> {
        let wname = normalize_class_name(ns_name, &self.config.module_name);

        let mut methods: Vec<String> = ns
            .funcs
            .values()
            .map(|id| self.model.func(*id))
            .filter(|func| !func.isconstructor)
            .map(|func| self.tab_entry(func))
            .collect();
        methods.push("{NULL, NULL}".to_string());

        let mut consts = Vec::with_capacity(ns.consts.len() + 1);
        for (name, cname) in &ns.consts {
            consts.push(format!("{{\"{name}\", static_cast<long>({cname})}},"));
            if let Some(alias) = constant_alias(name) {
                consts.push(format!("{{\"{alias}\", static_cast<long>({cname})}},"));
            }
        }
        consts.push("{NULL, 0}".to_string());

        vec![
            Item::Initializer {
                decl: format!("static PyMethodDef methods_{wname}[]"),
                rows: methods,
            },
            Item::Initializer {
                decl: format!("static ConstDef consts_{wname}[]"),
                rows: consts,
            },
        ]
    }

    /// `init_submodules`, registering every namespace under the module root.
    pub fn gen_namespaces_reg(&self) -> Vec<Item> {
        let module = &self.config.module_name;
        let body = self
            .model
            .namespaces
            .keys()
            .filter(|ns_name| self.is_module_namespace(ns_name))
            .map(|ns_name| {
                let wname = normalize_class_name(ns_name, module);
                let suffix = &ns_name[module.len()..];
                Stmt::expr(Expr::call(
                    "init_submodule",
                    vec![
                        Expr::ident("root"),
                        Expr::raw(format!("MODULESTR\"{suffix}\"")),
                        Expr::ident(format!("methods_{wname}")),
                        Expr::ident(format!("consts_{wname}")),
                    ],
                ))
            })
            .collect();
        vec![Item::Function(Function::new(
            "static void init_submodules(PyObject * root)",
            body,
        ))]
    }

    /// Conversion glue for one enum, given its qualified dotted name.
    pub fn gen_enum_reg(&self, enum_name: &str) -> Vec<Item> {
        let module = &self.config.module_name;
        let segments: Vec<&str> = enum_name.split('.').collect();
        // `enum class Flags` declared as `cv.Flags.Flags`.
        let enum_name = match segments.as_slice() {
            [.., outer, inner] if outer == inner => segments[..segments.len() - 1].join("."),
            _ => enum_name.to_string(),
        };
        let wname = normalize_class_name(&enum_name, module);
        let cname = enum_name.replace('.', "::");

        let prefix = format!("{module}.");
        let unprefixed = enum_name.strip_prefix(prefix.as_str()).unwrap_or(&enum_name);
        let mut items = Vec::new();
        if unprefixed != wname {
            items.push(Item::Line(format!("typedef {cname} {wname};")));
        }
        items.push(Item::Line(format!("CV_PY_FROM_ENUM({wname});")));
        items.push(Item::Line(format!("CV_PY_TO_ENUM({wname});")));
        items.push(Item::Blank);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::printer::render_items;
    use crate::config::GeneratorConfig;
    use crate::models::DeclModel;
    use crate::store::catalog::SignatureCatalog;

    #[test]
    fn test_constant_alias() {
        assert_eq!(constant_alias("FooBarBaz").as_deref(), Some("FOO_BAR_BAZ"));
        assert_eq!(constant_alias("FOO_BAR_BAZ"), None);
        assert_eq!(constant_alias("Flags_Default").as_deref(), Some("FLAGS_DEFAULT"));
        assert_eq!(constant_alias("ml_SVM_LINEAR").as_deref(), Some("ML_SVM_LINEAR"));
    }

    #[test]
    fn test_const_table_sorted_with_aliases() {
        let config = GeneratorConfig::default();
        let model = DeclModel::default();
        let gen = Generator::new(&model, &config, SignatureCatalog::new());
        let mut ns = Namespace::default();
        ns.consts.insert("NORM_L2".to_string(), "cv::NORM_L2".to_string());
        ns.consts.insert("BorderReflect".to_string(), "cv::BorderReflect".to_string());
        let text = render_items(&gen.gen_namespace("cv", &ns));
        assert!(text.contains(
            "static ConstDef consts_cv[] =\n{\n    {\"BorderReflect\", static_cast<long>(cv::BorderReflect)},\n    {\"BORDER_REFLECT\", static_cast<long>(cv::BorderReflect)},\n    {\"NORM_L2\", static_cast<long>(cv::NORM_L2)},\n    {NULL, 0}\n};"
        ));
        assert!(text.contains("static PyMethodDef methods_cv[] =\n{\n    {NULL, NULL}\n};"));
    }

    #[test]
    fn test_submodule_registration() {
        let config = GeneratorConfig::default();
        let mut model = DeclModel::default();
        for ns in ["cv", "cv.ml", "other"] {
            model.namespaces.insert(ns.to_string(), Namespace::default());
        }
        let gen = Generator::new(&model, &config, SignatureCatalog::new());
        let text = render_items(&gen.gen_namespaces_reg());
        assert!(text.starts_with("static void init_submodules(PyObject * root)\n{\n"));
        assert!(text.contains("    init_submodule(root, MODULESTR\"\", methods_cv, consts_cv);\n"));
        assert!(text.contains("    init_submodule(root, MODULESTR\".ml\", methods_ml, consts_ml);\n"));
        assert!(!text.contains("other"));
    }

    #[test]
    fn test_enum_registration() {
        let config = GeneratorConfig::default();
        let model = DeclModel::default();
        let gen = Generator::new(&model, &config, SignatureCatalog::new());

        let plain = render_items(&gen.gen_enum_reg("cv.BorderTypes"));
        assert_eq!(plain, "CV_PY_FROM_ENUM(BorderTypes);\nCV_PY_TO_ENUM(BorderTypes);\n\n");

        let nested = render_items(&gen.gen_enum_reg("cv.ml.SVM.Types"));
        assert!(nested.starts_with("typedef cv::ml::SVM::Types ml_SVM_Types;\n"));

        let scoped = render_items(&gen.gen_enum_reg("cv.AccessFlag.AccessFlag"));
        assert_eq!(scoped, "CV_PY_FROM_ENUM(AccessFlag);\nCV_PY_TO_ENUM(AccessFlag);\n\n");
    }
}
