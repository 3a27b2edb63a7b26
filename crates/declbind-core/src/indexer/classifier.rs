//! Routing declaration records into the class / function / namespace model.

use tracing::debug;

use crate::config::GeneratorConfig;
use crate::errors::{DeclbindError, DeclbindResult};
use crate::models::{normalize_class_name, ClassInfo, DeclBatch, DeclModel, DeclRecord, FuncInfo};
use crate::store::catalog::{SignatureCatalog, SignatureEntry};

/// Kind of a record, read from the prefix of its qualified name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Const,
    Enum,
    Function,
}

/// Split a record name into its kind and the bare qualified name.
pub fn decl_kind(name: &str) -> (DeclKind, &str) {
    let name = name.trim();
    if let Some(rest) = name
        .strip_prefix("struct ")
        .or_else(|| name.strip_prefix("class "))
    {
        (DeclKind::Class, rest.trim())
    } else if let Some(rest) = name.strip_prefix("const ") {
        (DeclKind::Const, rest.trim())
    } else if name.starts_with("enum ") {
        (DeclKind::Enum, name.rsplit(' ').next().unwrap_or(name))
    } else {
        (DeclKind::Function, name)
    }
}

/// Single classification pass over every record of every batch.
pub struct Classifier<'a> {
    config: &'a GeneratorConfig,
    model: DeclModel,
    catalog: SignatureCatalog,
}

impl<'a> Classifier<'a> {
    /// The module root is always a known namespace, so batches that list
    /// none (bare record arrays) still classify against it.
    pub fn new(config: &'a GeneratorConfig) -> Self {
        let mut model = DeclModel::default();
        model.known_namespaces.insert(config.module_name.clone());
        Self {
            config,
            model,
            catalog: SignatureCatalog::new(),
        }
    }

    /// Register the batch's namespaces, then classify its records.
    pub fn add_batch(&mut self, batch: &DeclBatch) -> DeclbindResult<()> {
        self.model
            .known_namespaces
            .extend(batch.namespaces.iter().cloned());
        if !batch.decls.is_empty() {
            self.model.headers.extend(batch.headers.iter().cloned());
        }
        for decl in &batch.decls {
            self.classify(decl)?;
        }
        Ok(())
    }

    pub fn classify(&mut self, decl: &DeclRecord) -> DeclbindResult<()> {
        match decl_kind(&decl.name) {
            (DeclKind::Class, name) => self.add_class(name, decl),
            (DeclKind::Const, name) => self.add_const(name, &decl.base),
            (DeclKind::Enum, name) => self.add_enum(name, decl),
            (DeclKind::Function, _) => self.add_func(decl),
        }
    }

    pub fn finish(self) -> (DeclModel, SignatureCatalog) {
        (self.model, self.catalog)
    }

    fn add_class(&mut self, name: &str, decl: &DeclRecord) -> DeclbindResult<()> {
        let class = ClassInfo::new(name, Some(decl), self.config)?;
        if self.model.classes.contains_key(&class.name) {
            return Err(DeclbindError::DuplicateClass {
                name: class.name,
                cname: class.cname,
            });
        }
        self.catalog.record(
            &class.cname,
            SignatureEntry::Class {
                name: format!("{}.{}", self.config.module_name, class.wname),
            },
        );
        debug!(class = %class.name, base = ?class.base, "registered class");
        self.model.classes.insert(class.name.clone(), class);
        Ok(())
    }

    fn add_const(&mut self, name: &str, value: &str) -> DeclbindResult<()> {
        let cname = name.replace('.', "::");
        let (namespace, mut classes, bare) = self.model.split_decl_name(name);
        let namespace = namespace.join(".");
        classes.push(bare);
        let flat = classes.join("_");

        let consts = &mut self.model.namespaces.entry(namespace.clone()).or_default().consts;
        if consts.contains_key(&flat) {
            return Err(DeclbindError::DuplicateConstant { name: flat, cname });
        }
        consts.insert(flat.clone(), cname.clone());
        self.catalog.record(
            &cname,
            SignatureEntry::Constant {
                name: format!("{namespace}.{flat}"),
                value: value.to_string(),
            },
        );
        Ok(())
    }

    fn add_enum(&mut self, name: &str, decl: &DeclRecord) -> DeclbindResult<()> {
        let wname = normalize_class_name(name, &self.config.module_name);
        if !wname.ends_with("<unnamed>") {
            self.model.enums.insert(wname, name.to_string());
        }
        for member in &decl.members {
            let const_name = member.ty.replace("const ", "");
            self.add_const(const_name.trim(), &member.name)?;
        }
        Ok(())
    }

    fn add_func(&mut self, decl: &DeclRecord) -> DeclbindResult<()> {
        let rules = &self.config.types;
        let (namespace, classes, barename) = self.model.split_decl_name(&decl.name);
        let mut cname = namespace
            .iter()
            .chain(classes.iter())
            .chain(std::iter::once(&barename))
            .cloned()
            .collect::<Vec<_>>()
            .join("::");
        let mut name = barename.clone();
        let (classname, bareclassname) = match classes.last() {
            Some(last) => {
                let qualified = namespace
                    .iter()
                    .chain(classes.iter())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(".");
                (normalize_class_name(&qualified, &self.config.module_name), last.as_str())
            }
            None => (String::new(), ""),
        };
        let namespace = namespace.join(".");

        let isconstructor = !bareclassname.is_empty() && name == bareclassname;
        let mut is_static = false;
        let mut isphantom = false;
        for m in &decl.modifiers {
            if m == "/S" {
                is_static = true;
            } else if m == "/phantom" {
                isphantom = true;
                cname = cname.replace("::", "_");
            } else if let Some(custom) = m.strip_prefix('=') {
                name = custom.to_string();
            } else if let Some(mappable) = m.strip_prefix("/mappable=") {
                self.model
                    .class_mut(&classname)?
                    .mappables
                    .push(mappable.to_string());
                return Ok(());
            }
        }

        if isconstructor {
            let mut parts: Vec<&str> = classes[..classes.len() - 1].iter().map(String::as_str).collect();
            parts.push(&name);
            name = parts.join("_");
        }

        let id = if is_static {
            let id = self.model.class_method(&classname, &name, || {
                FuncInfo::new(&classname, &name, &cname, isconstructor, &namespace, true)
            })?;
            self.model.func_mut(id).add_variant(decl, isphantom, rules)?;

            let mut flat: Vec<&str> = classes.iter().map(String::as_str).collect();
            flat.push(&name);
            let global = flat.join("_");
            let gid = self.model.namespace_func(&namespace, &global, || {
                FuncInfo::new("", &global, &cname, isconstructor, &namespace, false)
            });
            self.model.func_mut(gid).add_variant(decl, isphantom, rules)?;
            id
        } else if !classname.is_empty() && !isconstructor {
            if !isphantom {
                cname = barename.clone();
            }
            let id = self.model.class_method(&classname, &name, || {
                FuncInfo::new(&classname, &name, &cname, isconstructor, &namespace, false)
            })?;
            self.model.func_mut(id).add_variant(decl, isphantom, rules)?;
            id
        } else {
            let id = self.model.namespace_func(&namespace, &name, || {
                FuncInfo::new(&classname, &name, &cname, isconstructor, &namespace, false)
            });
            self.model.func_mut(id).add_variant(decl, isphantom, rules)?;
            id
        };

        if !classname.is_empty() && isconstructor {
            self.model.class_mut(&classname)?.constructor = Some(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeclMember;

    fn record(name: &str, base: &str, mods: &[&str], members: Vec<DeclMember>) -> DeclRecord {
        DeclRecord {
            name: name.to_string(),
            base: base.to_string(),
            modifiers: mods.iter().map(|m| m.to_string()).collect(),
            members,
            ..Default::default()
        }
    }

    fn member(ty: &str, name: &str) -> DeclMember {
        DeclMember {
            ty: ty.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn batch(decls: Vec<DeclRecord>) -> DeclBatch {
        DeclBatch {
            namespaces: vec!["cv".to_string(), "cv.ml".to_string()],
            headers: vec!["/inc/opencv2/core.hpp".to_string()],
            decls,
        }
    }

    #[test]
    fn test_decl_kind_prefixes() {
        assert_eq!(decl_kind("class cv.Foo"), (DeclKind::Class, "cv.Foo"));
        assert_eq!(decl_kind("struct cv.Bar"), (DeclKind::Class, "cv.Bar"));
        assert_eq!(decl_kind("const cv.BAZ"), (DeclKind::Const, "cv.BAZ"));
        assert_eq!(decl_kind("enum cv.Flags"), (DeclKind::Enum, "cv.Flags"));
        assert_eq!(decl_kind("enum class cv.Mode"), (DeclKind::Enum, "cv.Mode"));
        assert_eq!(decl_kind("cv.add"), (DeclKind::Function, "cv.add"));
    }

    #[test]
    fn test_static_method_registered_twice() {
        let config = GeneratorConfig::default();
        let mut classifier = Classifier::new(&config);
        classifier
            .add_batch(&batch(vec![
                record("class cv.ml.SVM", "", &[], vec![]),
                record("cv.ml.SVM.create", "Ptr_SVM", &["/S"], vec![]),
            ]))
            .unwrap();
        let (model, _) = classifier.finish();

        let class = &model.classes["ml_SVM"];
        let method = model.func(class.methods["create"]);
        assert!(method.is_static);
        assert_eq!(method.cname, "cv::ml::SVM::create");
        assert_eq!(method.variants.len(), 1);

        let ns = &model.namespaces["cv.ml"];
        let global = model.func(ns.funcs["SVM_create"]);
        assert!(!global.is_static);
        assert!(global.classname.is_empty());
        assert_eq!(global.cname, "cv::ml::SVM::create");
        assert_eq!(global.variants.len(), 1);
    }

    #[test]
    fn test_constructor_and_methods() {
        let config = GeneratorConfig::default();
        let mut classifier = Classifier::new(&config);
        classifier
            .add_batch(&batch(vec![
                record("class cv.Foo", "", &[], vec![]),
                record("cv.Foo.Foo", "", &[], vec![]),
                record("cv.Foo.Foo", "", &[], vec![member("int", "n")]),
                record("cv.Foo.run", "void", &[], vec![]),
                record("cv.Foo.run", "void", &["=execute"], vec![]),
            ]))
            .unwrap();
        let (model, _) = classifier.finish();
        let class = &model.classes["Foo"];
        let ctor = model.func(class.constructor.unwrap());
        assert!(ctor.isconstructor);
        assert_eq!(ctor.variants.len(), 2);
        assert_eq!(ctor.cname, "cv::Foo::Foo");
        assert!(model.namespaces["cv"].funcs.contains_key("Foo"));

        let run = model.func(class.methods["run"]);
        assert_eq!(run.cname, "run");
        assert!(class.methods.contains_key("execute"));
    }

    #[test]
    fn test_mappable_and_phantom() {
        let config = GeneratorConfig::default();
        let mut classifier = Classifier::new(&config);
        classifier
            .add_batch(&batch(vec![
                record("class cv.Foo", "", &[], vec![]),
                record("cv.Foo.operator Rect", "", &["/mappable=Rect"], vec![]),
                record("cv.Foo.clone", "Foo", &["/phantom"], vec![]),
            ]))
            .unwrap();
        let (model, _) = classifier.finish();
        let class = &model.classes["Foo"];
        assert_eq!(class.mappables, vec!["Rect"]);
        assert!(!class.methods.contains_key("operator Rect"));
        let clone = model.func(class.methods["clone"]);
        assert_eq!(clone.cname, "cv_Foo_clone");
        assert!(clone.variants[0].isphantom);
    }

    #[test]
    fn test_enum_constants_and_catalog() {
        let config = GeneratorConfig::default();
        let mut classifier = Classifier::new(&config);
        classifier
            .add_batch(&batch(vec![
                record(
                    "enum cv.BorderTypes",
                    "",
                    &[],
                    vec![member("const cv.BORDER_CONSTANT", "0"), member("const cv.BORDER_REPLICATE", "1")],
                ),
                record("enum cv.<unnamed>", "", &[], vec![member("const cv.FLAG_X", "4")]),
                record("class cv.ml.SVM", "", &[], vec![]),
                record("const cv.ml.SVM.LINEAR", "0", &[], vec![]),
            ]))
            .unwrap();
        let (model, catalog) = classifier.finish();
        assert_eq!(model.enums.len(), 1);
        assert_eq!(model.enums["BorderTypes"], "cv.BorderTypes");
        assert_eq!(model.namespaces["cv"].consts["BORDER_REPLICATE"], "cv::BORDER_REPLICATE");
        assert!(model.namespaces["cv"].consts.contains_key("FLAG_X"));
        assert_eq!(model.namespaces["cv.ml"].consts["SVM_LINEAR"], "cv::ml::SVM::LINEAR");

        assert_eq!(
            catalog.get("cv::ml::SVM::LINEAR").unwrap()[0],
            SignatureEntry::Constant {
                name: "cv.ml.SVM_LINEAR".to_string(),
                value: "0".to_string(),
            }
        );
        assert_eq!(catalog.get("cv::ml::SVM").unwrap()[0].name(), "cv.ml_SVM");
    }

    #[test]
    fn test_duplicates_are_fatal() {
        let config = GeneratorConfig::default();
        let mut classifier = Classifier::new(&config);
        classifier.classify(&record("class cv.Foo", "", &[], vec![])).unwrap();
        let err = classifier
            .classify(&record("struct cv.Foo", "", &[], vec![]))
            .unwrap_err();
        assert!(matches!(err, DeclbindError::DuplicateClass { .. }));

        classifier.classify(&record("const cv.A", "1", &[], vec![])).unwrap();
        let err = classifier.classify(&record("const cv.A", "2", &[], vec![])).unwrap_err();
        assert!(matches!(err, DeclbindError::DuplicateConstant { .. }));
    }

    #[test]
    fn test_unknown_owning_class_is_fatal() {
        let config = GeneratorConfig::default();
        let mut classifier = Classifier::new(&config);
        let err = classifier
            .add_batch(&batch(vec![record("cv.Missing.run", "void", &[], vec![])]))
            .unwrap_err();
        assert!(matches!(err, DeclbindError::UnknownClass(_)));
    }
}
