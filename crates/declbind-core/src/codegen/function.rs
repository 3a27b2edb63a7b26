//! Function wrappers: argument marshalling, the native call, return
//! marshalling, overload trial and method-table rows.

use crate::errors::{DeclbindError, DeclbindResult};
use crate::models::{normalize_class_name, ClassInfo, FuncInfo, FuncVariant};
use crate::store::catalog::SignatureEntry;

use super::builder::{Expr, Function, Stmt};
use super::printer::escape_c_string;
use super::typemap::{lookup, rewrite_default};
use super::Generator;

/// How one native argument is handed to `PyArg_ParseTupleAndKeywords`.
struct ParseSlot {
    format: char,
    target: String,
}

impl Generator<'_> {
    /// Generate the wrapper function for `func` and record its catalog
    /// entries.
    pub fn gen_function(&mut self, func: &FuncInfo) -> DeclbindResult<Function> {
        let model = self.model;
        let class = if func.classname.is_empty() {
            None
        } else {
            Some(model.class(&func.classname)?)
        };
        let mut body = vec![
            Stmt::Using(func.namespace.replace('.', "::")),
            Stmt::Blank,
        ];
        let mut fullname = func.name.clone();
        if let Some(class) = class {
            if !func.isconstructor {
                if !func.is_static {
                    body.extend(self_check(class));
                }
                fullname = format!("{}.{}", class.wname, func.name);
            }
        }

        let mut attempts = Vec::with_capacity(func.variants.len());
        for variant in &func.variants {
            attempts.push(self.gen_variant(func, class, variant, &fullname)?);
        }
        match attempts.len() {
            1 => body.extend(attempts.remove(0)),
            _ => body.push(Stmt::FirstSuccess {
                attempts,
                reset: Expr::call("PyErr_Clear", vec![]),
            }),
        }
        body.push(Stmt::Blank);
        body.push(Stmt::ret(Expr::raw(if func.isconstructor { "-1" } else { "NULL" })));

        self.record_signatures(func, class);
        Ok(Function::new(self.wrapper_prototype(func, class), body))
    }

    fn wrapper_prototype(&self, func: &FuncInfo, class: Option<&ClassInfo>) -> String {
        let wrapper = func.wrapper_name();
        match class {
            Some(class) if func.isconstructor => format!(
                "static int {wrapper}(pyopencv_{}_t* self, PyObject* args, PyObject* kw)",
                class.name
            ),
            Some(_) => format!("static PyObject* {wrapper}(PyObject* self, PyObject* args, PyObject* kw)"),
            None => format!("static PyObject* {wrapper}(PyObject* , PyObject* args, PyObject* kw)"),
        }
    }

    fn gen_variant(
        &self,
        func: &FuncInfo,
        class: Option<&ClassInfo>,
        variant: &FuncVariant,
        fullname: &str,
    ) -> DeclbindResult<Vec<Stmt>> {
        let rules = &self.config.types;
        let ismethod = class.is_some() && !func.isconstructor;
        let mut decls: Vec<Stmt> = Vec::new();
        let mut conversions: Vec<Expr> = Vec::new();
        let mut call_args: Vec<Expr> = Vec::new();
        let mut slots: Vec<Option<ParseSlot>> = Vec::with_capacity(variant.args.len());

        if variant.isphantom && ismethod && !func.is_static {
            call_args.push(Expr::ident("_self_"));
        }

        for (argno, arg) in variant.args.iter().enumerate() {
            if rules.is_ignored(&arg.ty) {
                let default = if !arg.default_value.is_empty() {
                    arg.default_value.clone()
                } else if arg.ty.ends_with('*') {
                    "0".to_string()
                } else {
                    return Err(DeclbindError::MissingDefault {
                        ty: arg.ty.clone(),
                        arg: arg.name.clone(),
                        func: func.name.clone(),
                    });
                };
                call_args.push(Expr::raw(default));
                slots.push(None);
                continue;
            }

            let mut ty = arg.ty.clone();
            let mut by_address = false;
            let mut fallback_default = String::new();
            if rules.is_pass_by_value(&ty) {
                ty.pop();
                by_address = true;
                if ty.ends_with('*') {
                    fallback_default = "0".to_string();
                }
            }
            if self.is_enum_type(&func.namespace, &arg.ty) {
                fallback_default = format!("static_cast<{}>(0)", arg.ty);
            }

            let mapping = lookup(&ty, &fallback_default);
            let mut target = arg.name.clone();
            if variant.is_call_site(argno) && mapping.is_object() {
                let holder = format!("pyobj_{}", arg.name);
                decls.push(Stmt::decl("PyObject*", holder.as_str(), Some(Expr::raw("NULL"))));
                let converter = if arg.ty == "char" {
                    "convert_to_char"
                } else {
                    "pyopencv_to"
                };
                let dest = if arg.ty == "char" {
                    Expr::addr_of(Expr::ident(arg.name.as_str()))
                } else {
                    Expr::ident(arg.name.as_str())
                };
                conversions.push(Expr::call(
                    converter,
                    vec![Expr::ident(holder.as_str()), dest, Expr::raw(arg.crepr())],
                ));
                target = holder;
            }
            slots.push(Some(ParseSlot {
                format: mapping.format,
                target,
            }));

            let mut default = if arg.default_value.is_empty() {
                mapping.default.clone()
            } else {
                rewrite_default(&ty, &arg.default_value)
            };
            if mapping.is_object() && default == format!("{ty}()") {
                default.clear();
            }
            if arg.outputarg && !arg.inputarg {
                default.clear();
            }
            let init = (!default.is_empty()).then(|| Expr::raw(default));
            decls.push(Stmt::decl(mapping.storage.as_str(), arg.name.as_str(), init));

            let passed = Expr::ident(arg.name.as_str());
            call_args.push(if by_address { Expr::addr_of(passed) } else { passed });
        }

        let mut then: Vec<Stmt> = self.array_counter_assignments(variant);
        if func.isconstructor {
            let class = match class {
                Some(class) => class,
                None => return Err(DeclbindError::UnknownClass(func.classname.clone())),
            };
            then.extend(constructor_call(func, class, variant, call_args));
        } else {
            let target = if !variant.isphantom && ismethod && !func.is_static {
                format!("_self_->{}", func.cname)
            } else {
                func.cname.clone()
            };
            let mut call = Expr::call(target, call_args);
            if let Some(rettype) = &variant.rettype {
                decls.push(Stmt::decl(rettype.as_str(), "retval", None));
                call = Expr::assign(Expr::ident("retval"), call);
            }
            then.push(Stmt::expr(Expr::call("ERRWRAP2", vec![call])));
        }
        then.push(return_stmt(func, variant));

        let mut stmts = decls;
        stmts.push(Stmt::Blank);
        if variant.call_site.is_empty() {
            stmts.push(Stmt::if_then(
                Expr::raw("PyObject_Size(args) == 0 && (!kw || PyObject_Size(kw) == 0)"),
                then,
            ));
        } else {
            let keywords: Vec<String> = variant
                .call_site
                .iter()
                .map(|a| format!("\"{}\"", a.name))
                .collect();
            stmts.push(Stmt::decl(
                "const char*",
                "keywords[]",
                Some(Expr::raw(format!("{{ {}, NULL }}", keywords.join(", ")))),
            ));

            let mut fmtspec = String::new();
            let mut parse_args = vec![
                Expr::ident("args"),
                Expr::ident("kw"),
                Expr::raw(""),
                Expr::raw("(char**)keywords"),
            ];
            for (i, a) in variant.call_site.iter().enumerate() {
                if i == variant.first_optional {
                    fmtspec.push('|');
                }
                if let Some(Some(slot)) = slots.get(a.argno) {
                    fmtspec.push(slot.format);
                    parse_args.push(Expr::addr_of(Expr::ident(slot.target.as_str())));
                }
            }
            fmtspec.push(':');
            fmtspec.push_str(fullname);
            parse_args[2] = Expr::str(fmtspec);

            let mut chain = vec![Expr::call("PyArg_ParseTupleAndKeywords", parse_args)];
            chain.extend(conversions);
            let cond = if chain.len() == 1 {
                chain.remove(0)
            } else {
                Expr::AndLines(chain)
            };
            stmts.push(Stmt::if_then(cond, then));
        }
        Ok(stmts)
    }

    fn is_enum_type(&self, namespace: &str, ty: &str) -> bool {
        let qualified = normalize_class_name(&format!("{namespace}.{ty}"), &self.config.module_name);
        self.model.enums.contains_key(ty) || self.model.enums.contains_key(&qualified)
    }

    /// `counter = static_cast<T>(array.size());` for every counter argument.
    fn array_counter_assignments(&self, variant: &FuncVariant) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        for (counter, arrays) in &variant.array_counters {
            let Some(counter_arg) = variant.args.iter().find(|a| &a.name == counter) else {
                continue;
            };
            let Some(array) = arrays.first() else {
                continue;
            };
            let storage = lookup(&counter_arg.ty, "").storage;
            stmts.push(Stmt::expr(Expr::assign(
                Expr::ident(counter.as_str()),
                Expr::raw(format!("static_cast<{storage}>({array}.size())")),
            )));
        }
        stmts
    }

    /// One method-table row listing every distinct prototype with its
    /// docstring.
    pub fn tab_entry(&self, func: &FuncInfo) -> String {
        let mut prototypes: Vec<String> = Vec::new();
        let mut docstrings: Vec<&str> = Vec::new();
        let mut have_empty_constructor = false;
        for v in &func.variants {
            if v.call_site.is_empty() && func.isconstructor {
                have_empty_constructor = true;
            }
            if !prototypes.contains(&v.prototype) {
                prototypes.push(v.prototype.clone());
                docstrings.push(v.docstring.as_str());
            }
        }

        // `Class() -> obj` plus `Class(args) -> obj` reads as `Class([args]) -> obj`.
        if have_empty_constructor && func.variants.len() == 2 {
            let idx = usize::from(!func.variants[1].call_site.is_empty());
            let proto = &func.variants[idx].prototype;
            if let (Some(open), Some(close)) = (proto.find('('), proto.rfind(')')) {
                prototypes = vec![format!(
                    "{}[{}]{}",
                    &proto[..=open],
                    &proto[open + 1..close],
                    &proto[close..]
                )];
            }
        }

        let mut doc = String::new();
        for (prototype, body) in prototypes.iter().zip(docstrings) {
            let lines: Vec<String> = body.split('\n').map(|l| format!(".   {l}")).collect();
            doc.push_str(&format!("{prototype}\n{}\n\n\n\n", lines.join("\n")));
        }
        let doc = xml_char_refs(&escape_c_string(doc.trim()));

        format!(
            "{{\"{}\", CV_PY_FN_WITH_KW_({}, {}), \"{}\"}},",
            func.exposed_name(),
            func.wrapper_name(),
            if func.is_static { "METH_STATIC" } else { "0" },
            doc
        )
    }

    fn record_signatures(&mut self, func: &FuncInfo, class: Option<&ClassInfo>) {
        let module = &self.config.module_name;
        let exposed = func.exposed_name();
        let mut symbol = func.cname.clone();
        let name = match class {
            Some(class) if func.isconstructor => format!("{module}.{}", class.wname),
            Some(class) if func.is_static => {
                format!("{}.{}_{}", func.namespace, class.sname, exposed)
            }
            Some(class) => {
                symbol = format!("{}::{}", class.cname, func.cname);
                format!("{module}.{}.{}", class.wname, exposed)
            }
            None => format!("{}.{}", func.namespace, exposed),
        };
        for v in &func.variants {
            self.catalog.record(
                &symbol,
                SignatureEntry::Function {
                    name: name.clone(),
                    arg: v.arg_str.clone(),
                    ret: v.return_str.clone(),
                },
            );
        }
    }
}

/// Extract `_self_` from the Python object or fail with a type error.
fn self_check(class: &ClassInfo) -> Vec<Stmt> {
    let holder = format!("((pyopencv_{}_t*)self)->v", class.name);
    let extract = if class.isalgorithm {
        format!("dynamic_cast<{}*>({holder}.get())", class.cname)
    } else if class.issimple {
        format!("&{holder}")
    } else {
        format!("{holder}.get()")
    };
    vec![
        Stmt::decl(format!("{}*", class.cname), "_self_", Some(Expr::raw("NULL"))),
        Stmt::if_then(
            Expr::call(
                "PyObject_TypeCheck",
                vec![
                    Expr::ident("self"),
                    Expr::raw(format!("&pyopencv_{}_Type", class.name)),
                ],
            ),
            vec![Stmt::expr(Expr::assign(Expr::ident("_self_"), Expr::raw(extract)))],
        ),
        Stmt::if_then(
            Expr::not(Expr::ident("_self_")),
            vec![Stmt::ret(Expr::call(
                "failmsgp",
                vec![Expr::str(format!(
                    "Incorrect type of self (must be '{}' or its derivative)",
                    class.name
                ))],
            ))],
        ),
    ]
}

fn constructor_call(
    func: &FuncInfo,
    class: &ClassInfo,
    variant: &FuncVariant,
    args: Vec<Expr>,
) -> Vec<Stmt> {
    let factory = func.cname.replace("::", "_");
    if class.issimple {
        let init = if variant.isphantom {
            Expr::call(class.cname.as_str(), vec![Expr::call(factory, args)])
        } else {
            Expr::call(class.cname.as_str(), args)
        };
        return vec![Stmt::if_then(
            Expr::ident("self"),
            vec![Stmt::expr(Expr::call(
                "ERRWRAP2",
                vec![Expr::new_in(Some("&(self->v)"), init)],
            ))],
        )];
    }

    let created = if variant.isphantom {
        Expr::call(factory, args)
    } else {
        Expr::new_in(None, Expr::call(class.cname.as_str(), args))
    };
    vec![
        Stmt::Comment("init Ptr with placement new".to_string()),
        Stmt::expr(Expr::new_in(
            Some("&(self->v)"),
            Expr::call(format!("Ptr<{}>", class.cname), vec![]),
        )),
        Stmt::if_then(
            Expr::ident("self"),
            vec![Stmt::expr(Expr::call(
                "ERRWRAP2",
                vec![Expr::call("self->v.reset", vec![created])],
            ))],
        ),
    ]
}

fn return_stmt(func: &FuncInfo, variant: &FuncVariant) -> Stmt {
    if func.isconstructor {
        return Stmt::ret(Expr::raw("0"));
    }
    match variant.outputs.as_slice() {
        [] => Stmt::expr(Expr::raw("Py_RETURN_NONE")),
        [single] => Stmt::ret(Expr::call(
            "pyopencv_from",
            vec![Expr::ident(single.name.as_str())],
        )),
        many => {
            let mut values = vec![Expr::str(format!("({})", "N".repeat(many.len())))];
            values.extend(
                many.iter()
                    .map(|o| Expr::call("pyopencv_from", vec![Expr::ident(o.name.as_str())])),
            );
            Stmt::ret(Expr::call("Py_BuildValue", values))
        }
    }
}

/// Replace non-ASCII characters with XML character references.
fn xml_char_refs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            out.push_str(&format!("&#{};", u32::from(c)));
        }
    }
    out
}
