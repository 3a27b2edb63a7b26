//! Shared typed models: raw declaration records and the resolved
//! class / function / namespace model built from them.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use tracing::warn;

use crate::codegen::typemap::TypeRules;
use crate::config::{GeneratorConfig, MultiBasePolicy};
use crate::errors::{DeclbindError, DeclbindResult};

// ---------------------------------------------------------------------------
// Raw declaration records
// ---------------------------------------------------------------------------

/// One member of a declaration record: a function argument, a class
/// property, or an enum constant.
///
/// For arguments and properties `ty` is the type token and `name` the member
/// name. Enum constants reuse the layout with the qualified constant name in
/// `ty` and its value in `name`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclMember {
    pub ty: String,
    pub name: String,
    pub default_value: String,
    pub modifiers: Vec<String>,
}

/// A declaration record as produced by the header parser.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclRecord {
    /// Qualified dotted name with an optional kind prefix
    /// (`class cv.Foo`, `const cv.BAR`, `enum cv.Flags`, `cv.foo`).
    pub name: String,
    /// Base list for classes, value for constants, return type for functions.
    pub base: String,
    pub modifiers: Vec<String>,
    pub members: Vec<DeclMember>,
    pub rettype: Option<String>,
    pub docstring: String,
}

/// A batch of records from one input source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclBatch {
    pub namespaces: Vec<String>,
    pub headers: Vec<String>,
    pub decls: Vec<DeclRecord>,
}

// ---------------------------------------------------------------------------
// Name helpers
// ---------------------------------------------------------------------------

/// Strip the `<root>.` prefix and flatten the remaining dots.
pub fn normalize_class_name(name: &str, root: &str) -> String {
    let prefix = format!("{root}.");
    name.strip_prefix(prefix.as_str())
        .unwrap_or(name)
        .replace('.', "_")
}

/// `Ptr_cuda_Stream` -> `Ptr<cuda::Stream>`.
pub fn handle_ptr(ty: &str) -> String {
    match ty.strip_prefix("Ptr_") {
        Some(rest) => format!("Ptr<{}>", rest.split('_').collect::<Vec<_>>().join("::")),
        None => ty.to_string(),
    }
}

// ---------------------------------------------------------------------------
// ArgInfo
// ---------------------------------------------------------------------------

/// Array annotation of an argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArraySpec {
    /// `/A <len>`: a literal length or the name of a counter argument.
    Counted(String),
    /// `/CA <cvt>`: converted as a whole, no counter.
    Converted(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgInfo {
    pub ty: String,
    pub name: String,
    pub default_value: String,
    pub inputarg: bool,
    pub outputarg: bool,
    pub returnarg: bool,
    pub array: Option<ArraySpec>,
}

impl ArgInfo {
    pub fn from_member(member: &DeclMember) -> Self {
        let mut arg = ArgInfo {
            ty: handle_ptr(&member.ty),
            name: member.name.clone(),
            default_value: member.default_value.clone(),
            inputarg: true,
            outputarg: false,
            returnarg: false,
            array: None,
        };
        for m in &member.modifiers {
            if m == "/O" {
                arg.inputarg = false;
                arg.outputarg = true;
                arg.returnarg = true;
            } else if m == "/IO" {
                arg.inputarg = true;
                arg.outputarg = true;
                arg.returnarg = true;
            } else if let Some(len) = m.strip_prefix("/A") {
                arg.array = Some(ArraySpec::Counted(len.trim().to_string()));
            } else if let Some(cvt) = m.strip_prefix("/CA") {
                arg.array = Some(ArraySpec::Converted(cvt.trim().to_string()));
            }
        }
        arg
    }

    /// Name of the argument (or literal) holding this array's length.
    pub fn array_counter(&self) -> Option<&str> {
        match &self.array {
            Some(ArraySpec::Counted(len)) => Some(len.as_str()),
            _ => None,
        }
    }

    /// The `ArgInfo("name", is_output)` literal handed to converters.
    pub fn crepr(&self) -> String {
        format!("ArgInfo(\"{}\", {})", self.name, u8::from(self.outputarg))
    }
}

// ---------------------------------------------------------------------------
// PropInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropInfo {
    pub ty: String,
    pub name: String,
    pub readonly: bool,
}

impl PropInfo {
    pub fn from_member(member: &DeclMember) -> Self {
        Self {
            ty: member.ty.replace('*', "_ptr"),
            name: member.name.clone(),
            readonly: !member.modifiers.iter().any(|m| m.contains("/RW")),
        }
    }
}

// ---------------------------------------------------------------------------
// ClassInfo
// ---------------------------------------------------------------------------

/// Index of a function in [`DeclModel::funcs`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub usize);

#[derive(Clone, Debug)]
pub struct ClassInfo {
    /// Native name, `::`-qualified.
    pub cname: String,
    /// Normalized name, unique across the model.
    pub name: String,
    /// Name exposed to the host language.
    pub wname: String,
    /// Last segment of the qualified name.
    pub sname: String,
    pub base: Option<String>,
    pub ismap: bool,
    pub issimple: bool,
    pub isalgorithm: bool,
    pub props: Vec<PropInfo>,
    pub mappables: Vec<String>,
    pub methods: BTreeMap<String, FuncId>,
    pub constructor: Option<FuncId>,
}

impl ClassInfo {
    pub fn new(
        qualified: &str,
        decl: Option<&DeclRecord>,
        config: &GeneratorConfig,
    ) -> DeclbindResult<Self> {
        let name = normalize_class_name(qualified, &config.module_name);
        let mut info = ClassInfo {
            cname: qualified.replace('.', "::"),
            wname: name.clone(),
            name,
            sname: qualified.rsplit('.').next().unwrap_or(qualified).to_string(),
            base: None,
            ismap: false,
            issimple: false,
            isalgorithm: false,
            props: Vec::new(),
            mappables: Vec::new(),
            methods: BTreeMap::new(),
            constructor: None,
        };
        let mut customname = false;

        if let Some(decl) = decl {
            let bases: Vec<&str> = decl.base.split_whitespace().skip(1).collect();
            if bases.len() > 1 {
                let listed = bases.join(" ");
                match config.multi_base {
                    MultiBasePolicy::Reject => {
                        return Err(DeclbindError::MultipleBases {
                            class: info.name.clone(),
                            bases: listed,
                        });
                    }
                    MultiBasePolicy::FirstWithWarning => {
                        warn!(
                            class = %info.name,
                            bases = %listed,
                            "class has more than one base class; only the first is used"
                        );
                    }
                }
            }
            if let Some(first) = bases.first() {
                let prefix = config.native_root_prefix();
                let trimmed = first.trim_matches(',');
                let base = trimmed.strip_prefix(prefix.as_str()).unwrap_or(trimmed);
                if config.is_polymorphic_root(base) {
                    info.isalgorithm = true;
                }
                info.base = Some(base.replace("::", "_"));
            }

            for m in &decl.modifiers {
                if let Some(custom) = m.strip_prefix('=') {
                    info.wname = custom.to_string();
                    customname = true;
                } else if m == "/Map" {
                    info.ismap = true;
                } else if m == "/Simple" {
                    info.issimple = true;
                }
            }
            info.props = decl.members.iter().map(PropInfo::from_member).collect();
        }

        if !customname {
            if let Some(stripped) = info.wname.strip_prefix("Cv") {
                info.wname = stripped.to_string();
            }
        }
        Ok(info)
    }

    /// Member access operator on the held value.
    pub fn access_op(&self) -> &'static str {
        if self.issimple {
            "."
        } else {
            "->"
        }
    }
}

// ---------------------------------------------------------------------------
// FuncVariant
// ---------------------------------------------------------------------------

/// One argument as exposed to the host-language caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSiteArg {
    pub name: String,
    /// Index into [`FuncVariant::args`].
    pub argno: usize,
    /// Output-only heavy argument surfaced as an optional parameter.
    pub heavy_output: bool,
}

/// One value handed back to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputValue {
    pub name: String,
    /// `None` for the native return value and the implicit constructor self.
    pub argno: Option<usize>,
}

/// Call-site layout of a variant's arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSiteLayout {
    pub args: Vec<CallSiteArg>,
    pub first_optional: usize,
    pub returns: Vec<OutputValue>,
}

/// Partition `args` into the call-site list, first-optional boundary and
/// return-flagged outputs.
pub fn build_call_site(
    args: &[ArgInfo],
    array_counters: &BTreeMap<String, Vec<String>>,
    rules: &TypeRules,
    func: &str,
    class: &str,
) -> DeclbindResult<CallSiteLayout> {
    let mut call_site: Vec<CallSiteArg> = Vec::new();
    let mut pending_heavy: Vec<CallSiteArg> = Vec::new();
    let mut returns = Vec::new();
    let mut first_optional = usize::MAX;

    for (argno, arg) in args.iter().enumerate() {
        if array_counters.contains_key(&arg.name) {
            continue;
        }
        if rules.is_forbidden(&arg.ty) {
            return Err(DeclbindError::ForbiddenArgType {
                ty: arg.ty.clone(),
                arg: arg.name.clone(),
                func: func.to_string(),
                class: class.to_string(),
            });
        }
        if rules.is_ignored(&arg.ty) {
            continue;
        }
        if arg.returnarg {
            returns.push(OutputValue {
                name: arg.name.clone(),
                argno: Some(argno),
            });
        }
        if !arg.inputarg && rules.is_heavy(&arg.ty) {
            pending_heavy.push(CallSiteArg {
                name: arg.name.clone(),
                argno,
                heavy_output: true,
            });
            continue;
        }
        if !arg.inputarg {
            continue;
        }
        if !arg.default_value.is_empty() {
            first_optional = first_optional.min(call_site.len());
            call_site.append(&mut pending_heavy);
        }
        call_site.push(CallSiteArg {
            name: arg.name.clone(),
            argno,
            heavy_output: false,
        });
    }
    if !pending_heavy.is_empty() {
        first_optional = first_optional.min(call_site.len());
        call_site.append(&mut pending_heavy);
    }
    first_optional = first_optional.min(call_site.len());

    Ok(CallSiteLayout {
        args: call_site,
        first_optional,
        returns,
    })
}

/// Render the caller-supplied arguments with nested optional brackets:
/// `a, b[, c[, d]]`. Deferred heavy outputs are not rendered.
pub fn render_arg_str(args: &[CallSiteArg], first_optional: usize) -> String {
    let visible = |range: &[CallSiteArg]| -> Vec<String> {
        range
            .iter()
            .filter(|a| !a.heavy_output)
            .map(|a| a.name.clone())
            .collect()
    };
    let required = visible(&args[..first_optional]);
    let optional = visible(&args[first_optional..]);

    let mut parts = vec![required.join(", ")];
    parts.extend(optional.iter().cloned());
    let mut rendered = parts.join("[, ");
    rendered.push_str(&"]".repeat(optional.len()));
    rendered
}

#[derive(Clone, Debug)]
pub struct FuncVariant {
    /// Exposed name.
    pub name: String,
    /// Normalized owning class name, empty for free functions.
    pub classname: String,
    pub args: Vec<ArgInfo>,
    /// `None` when the native function returns nothing.
    pub rettype: Option<String>,
    pub isconstructor: bool,
    pub isphantom: bool,
    pub docstring: String,
    /// Counter argument name -> array arguments it measures.
    pub array_counters: BTreeMap<String, Vec<String>>,
    pub call_site: Vec<CallSiteArg>,
    pub first_optional: usize,
    pub outputs: Vec<OutputValue>,
    pub arg_str: String,
    pub return_str: String,
    pub prototype: String,
}

impl FuncVariant {
    pub fn new(
        classname: &str,
        name: &str,
        decl: &DeclRecord,
        isconstructor: bool,
        isphantom: bool,
        rules: &TypeRules,
    ) -> DeclbindResult<Self> {
        let declared = match decl.rettype.as_deref() {
            Some(rt) if !rt.is_empty() => rt.to_string(),
            _ => handle_ptr(&decl.base),
        };
        let rettype = match declared.as_str() {
            "" | "void" => None,
            _ => Some(declared),
        };

        let args: Vec<ArgInfo> = decl.members.iter().map(ArgInfo::from_member).collect();
        let mut array_counters: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for arg in &args {
            if let Some(counter) = arg.array_counter() {
                array_counters
                    .entry(counter.to_string())
                    .or_default()
                    .push(arg.name.clone());
            }
        }

        let layout = build_call_site(&args, &array_counters, rules, name, classname)?;

        let mut outputs = layout.returns;
        if rettype.is_some() {
            outputs.insert(
                0,
                OutputValue {
                    name: "retval".to_string(),
                    argno: None,
                },
            );
        } else if isconstructor && outputs.is_empty() {
            outputs.push(OutputValue {
                name: "self".to_string(),
                argno: None,
            });
        }

        let return_str = if isconstructor {
            format!("<{} object>", classname.strip_prefix("Cv").unwrap_or(classname))
        } else if outputs.is_empty() {
            "None".to_string()
        } else {
            outputs
                .iter()
                .map(|o| o.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let arg_str = render_arg_str(&layout.args, layout.first_optional);
        let prototype = format!("{name}({arg_str}) -> {return_str}");

        Ok(FuncVariant {
            name: name.to_string(),
            classname: classname.to_string(),
            args,
            rettype,
            isconstructor,
            isphantom,
            docstring: decl.docstring.clone(),
            array_counters,
            call_site: layout.args,
            first_optional: layout.first_optional,
            outputs,
            arg_str,
            return_str,
            prototype,
        })
    }

    /// Whether argument `argno` is parsed from the caller's arguments.
    pub fn is_call_site(&self, argno: usize) -> bool {
        self.call_site.iter().any(|a| a.argno == argno)
    }

    /// Number of optional call-site parameters.
    pub fn optional_count(&self) -> usize {
        self.call_site.len() - self.first_optional
    }
}

// ---------------------------------------------------------------------------
// FuncInfo / Namespace
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct FuncInfo {
    pub classname: String,
    pub name: String,
    /// Native callable symbol.
    pub cname: String,
    pub isconstructor: bool,
    pub namespace: String,
    pub is_static: bool,
    pub variants: Vec<FuncVariant>,
}

impl FuncInfo {
    pub fn new(
        classname: &str,
        name: &str,
        cname: &str,
        isconstructor: bool,
        namespace: &str,
        is_static: bool,
    ) -> Self {
        Self {
            classname: classname.to_string(),
            name: name.to_string(),
            cname: cname.to_string(),
            isconstructor,
            namespace: namespace.to_string(),
            is_static,
            variants: Vec::new(),
        }
    }

    pub fn add_variant(
        &mut self,
        decl: &DeclRecord,
        isphantom: bool,
        rules: &TypeRules,
    ) -> DeclbindResult<()> {
        let variant = FuncVariant::new(
            &self.classname,
            &self.name,
            decl,
            self.isconstructor,
            isphantom,
            rules,
        )?;
        self.variants.push(variant);
        Ok(())
    }

    /// Name of the generated C++ wrapper function.
    pub fn wrapper_name(&self) -> String {
        let mut name = self.name.clone();
        let classname = if self.classname.is_empty() {
            String::new()
        } else {
            if name.contains('[') {
                name = "getelem".to_string();
            }
            format!("{}_", self.classname)
        };
        if self.is_static {
            name.push_str("_static");
        }
        format!(
            "pyopencv_{}_{}{}",
            self.namespace.replace('.', "_"),
            classname,
            name
        )
    }

    /// Exposed name of the function (taken from its first variant).
    pub fn exposed_name(&self) -> &str {
        self.variants
            .first()
            .map(|v| v.name.as_str())
            .unwrap_or(self.name.as_str())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Namespace {
    pub funcs: BTreeMap<String, FuncId>,
    /// Flattened constant name -> native symbol.
    pub consts: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// DeclModel
// ---------------------------------------------------------------------------

/// The full model built by classification; immutable during emission.
#[derive(Clone, Debug, Default)]
pub struct DeclModel {
    /// Classes keyed by normalized name, in declaration order.
    pub classes: IndexMap<String, ClassInfo>,
    pub funcs: Vec<FuncInfo>,
    pub namespaces: BTreeMap<String, Namespace>,
    /// Normalized enum name -> qualified declaration name.
    pub enums: BTreeMap<String, String>,
    pub known_namespaces: HashSet<String>,
    pub headers: Vec<String>,
}

impl DeclModel {
    pub fn func(&self, id: FuncId) -> &FuncInfo {
        &self.funcs[id.0]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut FuncInfo {
        &mut self.funcs[id.0]
    }

    pub fn class(&self, name: &str) -> DeclbindResult<&ClassInfo> {
        self.classes
            .get(name)
            .ok_or_else(|| DeclbindError::UnknownClass(name.to_string()))
    }

    pub fn class_mut(&mut self, name: &str) -> DeclbindResult<&mut ClassInfo> {
        self.classes
            .get_mut(name)
            .ok_or_else(|| DeclbindError::UnknownClass(name.to_string()))
    }

    /// Split a dotted name into (namespace, class chain, bare name): trailing
    /// segments move from the namespace into the class chain until the
    /// remaining prefix is a known namespace.
    pub fn split_decl_name(&self, name: &str) -> (Vec<String>, Vec<String>, String) {
        let mut chunks: Vec<String> = name.split('.').map(str::to_string).collect();
        let bare = chunks.pop().unwrap_or_default();
        let mut namespace = chunks;
        let mut classes = Vec::new();
        while !namespace.is_empty() && !self.known_namespaces.contains(&namespace.join(".")) {
            if let Some(segment) = namespace.pop() {
                classes.insert(0, segment);
            }
        }
        (namespace, classes, bare)
    }

    /// Method `name` of class `classname`, created by `make` on first use.
    pub fn class_method(
        &mut self,
        classname: &str,
        name: &str,
        make: impl FnOnce() -> FuncInfo,
    ) -> DeclbindResult<FuncId> {
        let next = FuncId(self.funcs.len());
        let id = {
            let class = self.class_mut(classname)?;
            *class.methods.entry(name.to_string()).or_insert(next)
        };
        if id == next {
            self.funcs.push(make());
        }
        Ok(id)
    }

    /// Function `name` of `namespace`, created by `make` on first use.
    pub fn namespace_func(
        &mut self,
        namespace: &str,
        name: &str,
        make: impl FnOnce() -> FuncInfo,
    ) -> FuncId {
        let next = FuncId(self.funcs.len());
        let id = *self
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .funcs
            .entry(name.to_string())
            .or_insert(next);
        if id == next {
            self.funcs.push(make());
        }
        id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
